//! Chat Escalation Library
//!
//! Decides from a single conversational turn whether a human must take over,
//! records the handoff as a support ticket, and pages available staff across
//! channels without letting one failed channel affect the others or the chat.
//!
//! # Components
//!
//! - [`classifier`]: ordered rule table, pure and deterministic
//! - [`config`]: thresholds, VIP list, channels, keyword tables
//! - [`registrar`]: positive detection → support ticket
//! - [`staff`]: eligible staff lookup (admin, manager, dispatcher)
//! - [`dispatcher`]: concurrent settle-all notification fan-out
//! - [`orchestrator`]: sequences the above, never fails
//!
//! # Usage
//!
//! ```rust,ignore
//! use escalation_core::{EscalationConfig, EscalationOrchestrator, EscalationRequest};
//!
//! let outcome = orchestrator.escalate_conversation(&request, &config).await;
//! if outcome.escalated {
//!     println!("handed off as ticket #{}", outcome.ticket_number.unwrap_or_default());
//! }
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod classifier;
pub mod collaborators;
pub mod config;
pub mod dispatcher;
pub mod memory;
pub mod orchestrator;
pub mod registrar;
pub mod staff;
pub mod types;

pub use classifier::{detect_escalation, KeywordCategory, Rule, RuleCheck, TurnSignals, RULES};
pub use collaborators::{
    AuditLog, CollaboratorError, EmailTransport, NewTicket, PushTransport, SmsTransport,
    StaffDirectory, TicketStore,
};
pub use config::{ConfigError, EscalationConfig, KeywordTables};
pub use dispatcher::health::{ChannelHealth, ChannelTally, DegradationLevel, LevelChange};
pub use dispatcher::{DispatchConfig, DispatchError, DispatchReport, Dispatcher, Transports};
pub use orchestrator::{EscalationOrchestrator, EscalationOutcome, EscalationRequest};
pub use registrar::{TicketError, TicketRegistrar};
pub use staff::{StaffResolver, ELIGIBLE_ROLES};
pub use types::{
    EscalationDetection, EscalationPriority, EscalationTrigger, Metadata, NotificationOutcome,
    NotificationRecord, NotifyChannel, StaffMember, TicketRef,
};
