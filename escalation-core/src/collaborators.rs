//! External collaborator interfaces.
//!
//! The ticket store, staff directory, transports and audit log live outside
//! this crate. Everything here is consumed through these traits so the
//! orchestrator can be driven by HTTP bridges in production and by the
//! in-memory implementations in [`crate::memory`] for dry runs and tests.

use crate::types::{EscalationPriority, Metadata, NotifyChannel, StaffMember};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by any external collaborator
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Fields written when a support ticket is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTicket {
    pub customer_id: Option<String>,
    pub session_id: String,
    pub reason: String,
    pub priority: EscalationPriority,
    pub metadata: Metadata,
}

#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Persist a ticket and return its id.
    async fn create_ticket(&self, ticket: NewTicket) -> Result<String, CollaboratorError>;

    /// Human-facing ticket number for an existing ticket.
    async fn get_ticket_number(&self, ticket_id: &str) -> Result<String, CollaboratorError>;
}

#[async_trait]
pub trait StaffDirectory: Send + Sync {
    async fn list_staff_by_roles(
        &self,
        roles: &[&str],
    ) -> Result<Vec<StaffMember>, CollaboratorError>;
}

#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), CollaboratorError>;
}

#[async_trait]
pub trait SmsTransport: Send + Sync {
    async fn send_sms(&self, to: &str, body: &str) -> Result<(), CollaboratorError>;
}

#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send_push(&self, token: &str, title: &str, body: &str)
        -> Result<(), CollaboratorError>;
}

#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(
        &self,
        user_id: &str,
        ticket_id: &str,
        channel: NotifyChannel,
        metadata: Metadata,
    ) -> Result<(), CollaboratorError>;
}
