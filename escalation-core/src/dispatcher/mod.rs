//! Notification Dispatcher — settle-all fan-out to staff
//!
//! ```text
//! staff × enabled channels (with contact info + transport)
//!   └─ tokio::spawn(send → timeout → audit append) × N
//!         │
//!         ▼
//!   join_all(handles)   every task settles, no fail-fast
//!         │
//!         ├─ successes → returned records
//!         ├─ failures  → warn! + audit, excluded
//!         └─ per-channel tally → HealthBoard (level changes logged per ticket)
//! ```
//!
//! The send and the audit append are each bounded by the channel timeout, so
//! a stalled provider or audit store cannot hold up the join.
//!
//! Tasks are spawned detached: dropping the caller's future does not abort
//! sends already in flight, since the ticket exists and partial notification
//! beats none.

pub mod health;
pub mod message;

use crate::collaborators::{
    AuditLog, CollaboratorError, EmailTransport, PushTransport, SmsTransport,
};
use crate::types::{
    EscalationPriority, Metadata, NotificationOutcome, NotificationRecord, NotifyChannel,
    StaffMember, TicketRef,
};
use futures::future::join_all;
use health::{ChannelHealth, ChannelTally, DegradationLevel, HealthBoard};
use message::NotificationMessage;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Upper bound on a single channel send, and on its audit append.
pub const DEFAULT_CHANNEL_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("transport failed: {0}")]
    Transport(#[from] CollaboratorError),

    #[error("send timed out after {0:?}")]
    Timeout(Duration),

    #[error("send task aborted: {0}")]
    TaskAborted(String),
}

/// Transports available to the dispatcher. A missing transport disables its
/// channel even when the config enables it.
#[derive(Clone, Default)]
pub struct Transports {
    pub email: Option<Arc<dyn EmailTransport>>,
    pub sms: Option<Arc<dyn SmsTransport>>,
    pub push: Option<Arc<dyn PushTransport>>,
}

impl Transports {
    pub fn with_email(mut self, transport: Arc<dyn EmailTransport>) -> Self {
        self.email = Some(transport);
        self
    }

    pub fn with_sms(mut self, transport: Arc<dyn SmsTransport>) -> Self {
        self.sms = Some(transport);
        self
    }

    pub fn with_push(mut self, transport: Arc<dyn PushTransport>) -> Self {
        self.push = Some(transport);
        self
    }

    fn sender(&self, channel: NotifyChannel) -> Option<Sender> {
        match channel {
            NotifyChannel::Email => self.email.clone().map(Sender::Email),
            NotifyChannel::Sms => self.sms.clone().map(Sender::Sms),
            NotifyChannel::Push => self.push.clone().map(Sender::Push),
        }
    }
}

enum Sender {
    Email(Arc<dyn EmailTransport>),
    Sms(Arc<dyn SmsTransport>),
    Push(Arc<dyn PushTransport>),
}

impl Sender {
    async fn send(&self, to: &str, message: &NotificationMessage) -> Result<(), CollaboratorError> {
        match self {
            Self::Email(t) => t.send_email(to, &message.subject, &message.html_body).await,
            Self::Sms(t) => t.send_sms(to, &message.text_body).await,
            Self::Push(t) => t.send_push(to, &message.subject, &message.text_body).await,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub channel_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            channel_timeout: DEFAULT_CHANNEL_TIMEOUT,
        }
    }
}

/// One (staff member, channel) send, owned by its own task.
struct SendTask {
    user_id: String,
    address: String,
    channel: NotifyChannel,
    ticket: TicketRef,
    priority: EscalationPriority,
    sender: Sender,
    message: Arc<NotificationMessage>,
    audit: Arc<dyn AuditLog>,
    timeout: Duration,
}

impl SendTask {
    async fn run(self) -> (NotificationRecord, Result<(), DispatchError>) {
        let start = Instant::now();
        let result = match tokio::time::timeout(
            self.timeout,
            self.sender.send(&self.address, &self.message),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(DispatchError::Transport(e)),
            Err(_) => Err(DispatchError::Timeout(self.timeout)),
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let outcome = if result.is_ok() {
            NotificationOutcome::Success
        } else {
            NotificationOutcome::Failure
        };

        let mut metadata = Metadata::new();
        metadata.insert("ticket_number".into(), json!(self.ticket.ticket_number));
        metadata.insert("priority".into(), json!(self.priority.to_string()));
        metadata.insert("outcome".into(), json!(outcome));
        metadata.insert("elapsed_ms".into(), json!(elapsed_ms));

        match &result {
            Ok(()) => debug!(
                user_id = %self.user_id,
                channel = %self.channel,
                ticket_id = %self.ticket.ticket_id,
                elapsed_ms,
                "notification delivered"
            ),
            Err(e) => {
                metadata.insert("error".into(), json!(e.to_string()));
                warn!(
                    user_id = %self.user_id,
                    channel = %self.channel,
                    ticket_id = %self.ticket.ticket_id,
                    error = %e,
                    "notification failed"
                );
            }
        }

        let appended = tokio::time::timeout(
            self.timeout,
            self.audit.append(
                &self.user_id,
                &self.ticket.ticket_id,
                self.channel,
                metadata.clone(),
            ),
        )
        .await;
        match appended {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(
                user_id = %self.user_id,
                channel = %self.channel,
                ticket_id = %self.ticket.ticket_id,
                error = %e,
                "notification audit append failed"
            ),
            Err(_) => warn!(
                user_id = %self.user_id,
                channel = %self.channel,
                ticket_id = %self.ticket.ticket_id,
                timeout = ?self.timeout,
                "notification audit append timed out"
            ),
        }

        let record = NotificationRecord {
            user_id: self.user_id,
            ticket_id: self.ticket.ticket_id,
            channel: self.channel,
            outcome,
            metadata,
            recorded_at: chrono::Utc::now(),
        };
        (record, result)
    }
}

/// Result of one fan-out.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    /// Successful sends only.
    pub delivered: Vec<NotificationRecord>,
    /// Reach of every channel that attempted at least one send.
    pub channels: BTreeMap<NotifyChannel, DegradationLevel>,
}

pub struct Dispatcher {
    transports: Transports,
    audit: Arc<dyn AuditLog>,
    config: DispatchConfig,
    health: Mutex<HealthBoard>,
}

impl Dispatcher {
    pub fn new(transports: Transports, audit: Arc<dyn AuditLog>) -> Self {
        Self::with_config(transports, audit, DispatchConfig::default())
    }

    pub fn with_config(
        transports: Transports,
        audit: Arc<dyn AuditLog>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            transports,
            audit,
            config,
            health: Mutex::new(HealthBoard::default()),
        }
    }

    /// Health of every channel that has attempted at least one send.
    pub fn channel_health(&self) -> Vec<ChannelHealth> {
        self.health
            .lock()
            .map(|board| board.snapshot())
            .unwrap_or_default()
    }

    /// Notify every reachable staff member on every enabled channel.
    ///
    /// Returns only the successful records; failures are logged and audited.
    pub async fn notify_staff(
        &self,
        ticket: &TicketRef,
        priority: EscalationPriority,
        reason: &str,
        staff: &[StaffMember],
        channels: &BTreeSet<NotifyChannel>,
    ) -> Vec<NotificationRecord> {
        self.dispatch(ticket, priority, reason, staff, channels)
            .await
            .delivered
    }

    /// [`Dispatcher::notify_staff`] plus the per-channel reach of this fan-out.
    pub async fn dispatch(
        &self,
        ticket: &TicketRef,
        priority: EscalationPriority,
        reason: &str,
        staff: &[StaffMember],
        channels: &BTreeSet<NotifyChannel>,
    ) -> DispatchReport {
        let message = Arc::new(message::render(&ticket.ticket_number, priority, reason));

        let mut labels = Vec::new();
        let mut handles = Vec::new();
        for member in staff {
            for &channel in channels {
                let Some(address) = member.contact_for(channel) else {
                    continue;
                };
                let Some(sender) = self.transports.sender(channel) else {
                    debug!(channel = %channel, "channel enabled but no transport configured");
                    continue;
                };

                let task = SendTask {
                    user_id: member.id.clone(),
                    address: address.to_string(),
                    channel,
                    ticket: ticket.clone(),
                    priority,
                    sender,
                    message: message.clone(),
                    audit: self.audit.clone(),
                    timeout: self.config.channel_timeout,
                };
                labels.push((member.id.clone(), channel));
                handles.push(tokio::spawn(task.run()));
            }
        }

        if handles.is_empty() {
            info!(ticket_id = %ticket.ticket_id, "no reachable staff for escalation");
            return DispatchReport::default();
        }

        let attempted = handles.len();
        let settled = join_all(handles).await;

        let mut delivered = Vec::new();
        let mut tallies: BTreeMap<NotifyChannel, ChannelTally> = BTreeMap::new();
        for ((user_id, channel), joined) in labels.into_iter().zip(settled) {
            let tally = tallies.entry(channel).or_default();
            match joined {
                Ok((record, Ok(()))) => {
                    tally.add(Ok(()));
                    delivered.push(record);
                }
                Ok((_, Err(e))) => tally.add(Err(&e.to_string())),
                Err(join_err) => {
                    let e = DispatchError::TaskAborted(join_err.to_string());
                    warn!(
                        user_id = %user_id,
                        channel = %channel,
                        ticket_id = %ticket.ticket_id,
                        error = %e,
                        "notification failed"
                    );
                    tally.add(Err(&e.to_string()));
                }
            }
        }

        if let Ok(mut board) = self.health.lock() {
            board.observe(&ticket.ticket_id, &tallies);
        }

        info!(
            ticket_id = %ticket.ticket_id,
            attempted,
            delivered = delivered.len(),
            "staff notification fan-out settled"
        );
        DispatchReport {
            delivered,
            channels: tallies
                .into_iter()
                .map(|(channel, tally)| (channel, tally.level()))
                .collect(),
        }
    }
}
