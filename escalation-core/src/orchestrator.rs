//! Escalation Orchestrator — one call per conversation turn.
//!
//! ```text
//! Classify ──no match──────────────────────────────► escalated = false
//!    │
//!    └─match─► CreateTicket ──failure──────────────► escalated = false
//!                  │
//!                  └─ok─► ResolveStaff ─► Dispatch ─► escalated = true
//! ```
//!
//! Dispatch results never change `escalated`: once the ticket exists the
//! conversation has been handed off, however many notifications landed.

use crate::classifier::{classify, TurnSignals};
use crate::collaborators::{StaffDirectory, TicketStore};
use crate::config::EscalationConfig;
use crate::dispatcher::health::DegradationLevel;
use crate::dispatcher::Dispatcher;
use crate::registrar::TicketRegistrar;
use crate::staff::StaffResolver;
use crate::types::{EscalationPriority, EscalationTrigger, NotifyChannel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const REASON_NOT_NEEDED: &str = "No escalation needed";
pub const REASON_TICKET_FAILED: &str = "Failed to create support ticket";

/// Inputs for one conversational turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationRequest {
    pub session_id: String,
    #[serde(default)]
    pub customer_id: Option<String>,
    pub message: String,
    pub confidence: f64,
    #[serde(default)]
    pub failure_count: u32,
}

/// What the conversation handler gets back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationOutcome {
    pub escalated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_number: Option<String>,
    pub reason: String,
    pub trigger: EscalationTrigger,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<EscalationPriority>,
    /// Successful staff notifications; informational only.
    pub notifications_sent: usize,
    /// How well each channel used for this escalation reached staff.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub channel_levels: BTreeMap<NotifyChannel, DegradationLevel>,
}

impl EscalationOutcome {
    fn not_escalated(reason: &str, trigger: EscalationTrigger) -> Self {
        Self {
            escalated: false,
            ticket_id: None,
            ticket_number: None,
            reason: reason.to_string(),
            trigger,
            priority: None,
            notifications_sent: 0,
            channel_levels: BTreeMap::new(),
        }
    }
}

pub struct EscalationOrchestrator {
    registrar: TicketRegistrar,
    staff: StaffResolver,
    dispatcher: Dispatcher,
}

impl EscalationOrchestrator {
    pub fn new(
        tickets: Arc<dyn TicketStore>,
        directory: Arc<dyn StaffDirectory>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            registrar: TicketRegistrar::new(tickets),
            staff: StaffResolver::new(directory),
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Evaluate a turn and, if needed, hand it off to staff. Never fails.
    pub async fn escalate_conversation(
        &self,
        request: &EscalationRequest,
        config: &EscalationConfig,
    ) -> EscalationOutcome {
        let session_id = request.session_id.as_str();
        let detection = classify(
            &TurnSignals {
                message: &request.message,
                confidence: request.confidence,
                failure_count: request.failure_count,
                customer_id: request.customer_id.as_deref(),
            },
            config,
        );

        if !detection.should_escalate {
            debug!(session_id, "no escalation trigger matched");
            return EscalationOutcome::not_escalated(REASON_NOT_NEEDED, detection.trigger);
        }

        info!(
            session_id,
            trigger = %detection.trigger,
            priority = %detection.priority,
            reason = %detection.reason,
            "escalating conversation"
        );

        let ticket = match self
            .registrar
            .create_ticket(session_id, request.customer_id.as_deref(), &detection)
            .await
        {
            Ok(ticket) => ticket,
            Err(e) => {
                warn!(session_id, error = %e, "escalation could not be recorded");
                return EscalationOutcome::not_escalated(REASON_TICKET_FAILED, detection.trigger);
            }
        };

        let staff = self.staff.resolve_eligible_staff().await;
        let report = self
            .dispatcher
            .dispatch(
                &ticket,
                detection.priority,
                &detection.reason,
                &staff,
                &config.notify_channels,
            )
            .await;

        info!(
            session_id,
            ticket_id = %ticket.ticket_id,
            ticket_number = %ticket.ticket_number,
            staff = staff.len(),
            notifications = report.delivered.len(),
            "conversation escalated"
        );

        EscalationOutcome {
            escalated: true,
            ticket_id: Some(ticket.ticket_id),
            ticket_number: Some(ticket.ticket_number),
            reason: detection.reason,
            trigger: detection.trigger,
            priority: Some(detection.priority),
            notifications_sent: report.delivered.len(),
            channel_levels: report.channels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Transports;
    use crate::memory::{
        InMemoryAuditLog, InMemoryTicketStore, RecordingTransport, StaticStaffDirectory,
    };
    use crate::types::StaffMember;

    fn request(message: &str) -> EscalationRequest {
        EscalationRequest {
            session_id: "sess-1".into(),
            customer_id: Some("cust-1".into()),
            message: message.into(),
            confidence: 0.95,
            failure_count: 0,
        }
    }

    fn orchestrator(
        store: Arc<InMemoryTicketStore>,
        staff: Vec<StaffMember>,
        transport: Arc<RecordingTransport>,
    ) -> EscalationOrchestrator {
        let transports = Transports::default()
            .with_email(transport.clone())
            .with_sms(transport);
        EscalationOrchestrator::new(
            store,
            Arc::new(StaticStaffDirectory::new(staff)),
            Dispatcher::new(transports, Arc::new(InMemoryAuditLog::new())),
        )
    }

    fn admin(id: &str) -> StaffMember {
        StaffMember {
            role: Some("admin".into()),
            ..StaffMember::new(id).with_email(format!("{id}@example.com"))
        }
    }

    #[tokio::test]
    async fn test_neutral_turn_is_not_escalated() {
        let store = Arc::new(InMemoryTicketStore::new());
        let transport = Arc::new(RecordingTransport::new());
        let orch = orchestrator(store.clone(), vec![admin("a")], transport.clone());

        let outcome = orch
            .escalate_conversation(&request("What time do you open?"), &EscalationConfig::default())
            .await;

        assert!(!outcome.escalated);
        assert_eq!(outcome.reason, REASON_NOT_NEEDED);
        assert_eq!(outcome.trigger, EscalationTrigger::None);
        assert!(store.tickets().is_empty());
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_escalation_creates_ticket_and_notifies() {
        let store = Arc::new(InMemoryTicketStore::new());
        let transport = Arc::new(RecordingTransport::new());
        let orch = orchestrator(store.clone(), vec![admin("a"), admin("b")], transport.clone());

        let outcome = orch
            .escalate_conversation(&request("There is a burst pipe!"), &EscalationConfig::default())
            .await;

        assert!(outcome.escalated);
        assert_eq!(outcome.ticket_number.as_deref(), Some("1001"));
        assert_eq!(outcome.priority, Some(EscalationPriority::Urgent));
        assert_eq!(outcome.notifications_sent, 2);
        assert_eq!(store.tickets().len(), 1);
        assert!(transport.sent()[0].subject.contains("#1001"));
    }

    #[tokio::test]
    async fn test_no_staff_still_escalates() {
        let store = Arc::new(InMemoryTicketStore::new());
        let transport = Arc::new(RecordingTransport::new());
        let orch = orchestrator(store, vec![], transport);

        let outcome = orch
            .escalate_conversation(&request("get me a manager"), &EscalationConfig::default())
            .await;

        assert!(outcome.escalated);
        assert!(outcome.ticket_id.is_some());
        assert_eq!(outcome.notifications_sent, 0);
    }

    #[tokio::test]
    async fn test_unavailable_directory_still_escalates() {
        let store = Arc::new(InMemoryTicketStore::new());
        let transport = Arc::new(RecordingTransport::new());
        let orch = EscalationOrchestrator::new(
            store.clone(),
            Arc::new(StaticStaffDirectory::unavailable()),
            Dispatcher::new(
                Transports::default().with_email(transport.clone()),
                Arc::new(InMemoryAuditLog::new()),
            ),
        );

        let outcome = orch
            .escalate_conversation(&request("gas leak in unit 4"), &EscalationConfig::default())
            .await;

        assert!(outcome.escalated);
        assert_eq!(outcome.trigger, EscalationTrigger::UrgentIssue);
        assert_eq!(store.tickets().len(), 1);
        assert_eq!(outcome.notifications_sent, 0);
        assert!(outcome.channel_levels.is_empty());
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_outcome_reports_channel_levels() {
        let store = Arc::new(InMemoryTicketStore::new());
        let transport = Arc::new(RecordingTransport::new().failing_on(NotifyChannel::Sms));
        let staff = vec![admin("a").with_phone("+15550100")];
        let orch = orchestrator(store, staff, transport);

        let outcome = orch
            .escalate_conversation(&request("I want a refund"), &EscalationConfig::default())
            .await;

        assert!(outcome.escalated);
        assert_eq!(outcome.notifications_sent, 1);
        assert_eq!(outcome.channel_levels[&NotifyChannel::Email], DegradationLevel::Full);
        assert_eq!(
            outcome.channel_levels[&NotifyChannel::Sms],
            DegradationLevel::Unavailable
        );
    }

    #[test]
    fn test_outcome_json_omits_missing_ticket() {
        let outcome =
            EscalationOutcome::not_escalated(REASON_TICKET_FAILED, EscalationTrigger::UrgentIssue);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["escalated"], serde_json::json!(false));
        assert!(json.get("ticket_id").is_none());
        assert!(json.get("channel_levels").is_none());
        assert_eq!(json["reason"], serde_json::json!("Failed to create support ticket"));
    }
}
