//! Ticket Registrar — turns a positive detection into a support ticket.
//!
//! One write against the ticket store, no retries. A failed write means the
//! escalation could not be recorded and nobody may be notified about it.

use crate::collaborators::{CollaboratorError, NewTicket, TicketStore};
use crate::types::{EscalationDetection, TicketRef};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum TicketError {
    #[error("detection does not call for escalation")]
    NotEscalated,

    #[error("ticket store write failed: {0}")]
    StoreFailed(#[from] CollaboratorError),
}

pub struct TicketRegistrar {
    store: Arc<dyn TicketStore>,
}

impl TicketRegistrar {
    pub fn new(store: Arc<dyn TicketStore>) -> Self {
        Self { store }
    }

    /// Create the ticket for an escalated turn.
    ///
    /// The number lookup runs after the write; if it fails the ticket still
    /// exists, so the ticket id stands in as the display number.
    pub async fn create_ticket(
        &self,
        session_id: &str,
        customer_id: Option<&str>,
        detection: &EscalationDetection,
    ) -> Result<TicketRef, TicketError> {
        if !detection.should_escalate {
            return Err(TicketError::NotEscalated);
        }

        let mut metadata = detection.metadata.clone();
        metadata.insert("trigger".into(), json!(detection.trigger.to_string()));
        metadata.insert("is_urgent".into(), json!(detection.is_urgent));
        metadata.insert("source".into(), json!("chatbot"));

        let ticket = NewTicket {
            customer_id: customer_id.map(str::to_string),
            session_id: session_id.to_string(),
            reason: detection.reason.clone(),
            priority: detection.priority,
            metadata,
        };

        let ticket_id = self.store.create_ticket(ticket).await.map_err(|e| {
            warn!(session_id, error = %e, "support ticket creation failed");
            TicketError::StoreFailed(e)
        })?;
        debug!(session_id, ticket_id = %ticket_id, "support ticket written");

        let ticket_number = match self.store.get_ticket_number(&ticket_id).await {
            Ok(number) => number,
            Err(e) => {
                warn!(
                    ticket_id = %ticket_id,
                    error = %e,
                    "ticket number lookup failed, using ticket id"
                );
                ticket_id.clone()
            }
        };

        info!(
            session_id,
            ticket_id = %ticket_id,
            ticket_number = %ticket_number,
            priority = %detection.priority,
            trigger = %detection.trigger,
            "support ticket created"
        );

        Ok(TicketRef {
            ticket_id,
            ticket_number,
        })
    }
}
