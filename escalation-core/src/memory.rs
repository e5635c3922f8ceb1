//! In-memory collaborators for dry runs and tests.

use crate::collaborators::{
    AuditLog, CollaboratorError, EmailTransport, NewTicket, PushTransport, SmsTransport,
    StaffDirectory, TicketStore,
};
use crate::types::{Metadata, NotifyChannel, StaffMember};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;

/// First ticket number handed out by [`InMemoryTicketStore`].
const FIRST_TICKET_NUMBER: u64 = 1001;

/// Ticket store backed by a vector.
pub struct InMemoryTicketStore {
    tickets: Mutex<Vec<(String, NewTicket)>>,
    numbers: Mutex<HashMap<String, String>>,
    next_number: AtomicU64,
    fail_writes: bool,
    serve_numbers: bool,
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self {
            tickets: Mutex::new(Vec::new()),
            numbers: Mutex::new(HashMap::new()),
            next_number: AtomicU64::new(FIRST_TICKET_NUMBER),
            fail_writes: false,
            serve_numbers: true,
        }
    }

    /// A store whose writes are always rejected.
    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::new()
        }
    }

    /// Accept writes but fail every number lookup.
    pub fn without_numbers(mut self) -> Self {
        self.serve_numbers = false;
        self
    }

    /// Snapshot of `(ticket_id, ticket)` pairs in creation order.
    pub fn tickets(&self) -> Vec<(String, NewTicket)> {
        self.tickets.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

impl Default for InMemoryTicketStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn create_ticket(&self, ticket: NewTicket) -> Result<String, CollaboratorError> {
        if self.fail_writes {
            return Err(CollaboratorError::Rejected(
                "ticket store is read-only".to_string(),
            ));
        }

        let ticket_id = uuid::Uuid::new_v4().to_string();
        let number = self.next_number.fetch_add(1, Ordering::SeqCst).to_string();

        self.numbers
            .lock()
            .map_err(|_| CollaboratorError::Unavailable("number index poisoned".into()))?
            .insert(ticket_id.clone(), number);
        self.tickets
            .lock()
            .map_err(|_| CollaboratorError::Unavailable("ticket table poisoned".into()))?
            .push((ticket_id.clone(), ticket));

        Ok(ticket_id)
    }

    async fn get_ticket_number(&self, ticket_id: &str) -> Result<String, CollaboratorError> {
        if !self.serve_numbers {
            return Err(CollaboratorError::Unavailable(
                "ticket numbers not served".to_string(),
            ));
        }
        self.numbers
            .lock()
            .map_err(|_| CollaboratorError::Unavailable("number index poisoned".into()))?
            .get(ticket_id)
            .cloned()
            .ok_or_else(|| CollaboratorError::NotFound(ticket_id.to_string()))
    }
}

/// Fixed staff list filtered by each member's `role`.
#[derive(Default)]
pub struct StaticStaffDirectory {
    staff: Vec<StaffMember>,
    unavailable: bool,
}

impl StaticStaffDirectory {
    pub fn new(staff: Vec<StaffMember>) -> Self {
        Self {
            staff,
            unavailable: false,
        }
    }

    /// A directory whose every lookup fails.
    pub fn unavailable() -> Self {
        Self {
            staff: Vec::new(),
            unavailable: true,
        }
    }
}

#[async_trait]
impl StaffDirectory for StaticStaffDirectory {
    async fn list_staff_by_roles(
        &self,
        roles: &[&str],
    ) -> Result<Vec<StaffMember>, CollaboratorError> {
        if self.unavailable {
            return Err(CollaboratorError::Unavailable(
                "staff directory offline".to_string(),
            ));
        }
        Ok(self
            .staff
            .iter()
            .filter(|s| s.role.as_deref().is_some_and(|r| roles.contains(&r)))
            .cloned()
            .collect())
    }
}

/// One appended audit entry.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub user_id: String,
    pub ticket_id: String,
    pub channel: NotifyChannel,
    pub metadata: Metadata,
}

#[derive(Default)]
pub struct InMemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn append(
        &self,
        user_id: &str,
        ticket_id: &str,
        channel: NotifyChannel,
        metadata: Metadata,
    ) -> Result<(), CollaboratorError> {
        self.entries
            .lock()
            .map_err(|_| CollaboratorError::Unavailable("audit log poisoned".into()))?
            .push(AuditEntry {
                user_id: user_id.to_string(),
                ticket_id: ticket_id.to_string(),
                channel,
                metadata,
            });
        Ok(())
    }
}

/// A message handed to [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub channel: NotifyChannel,
    pub to: String,
    /// Email subject or push title; empty for SMS.
    pub subject: String,
    pub body: String,
}

/// Transport for every channel that logs and records each send.
///
/// Channels listed with [`RecordingTransport::failing_on`] reject their sends
/// after recording the attempt; an optional delay simulates a slow provider.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<SentMessage>>,
    failing: BTreeSet<NotifyChannel>,
    delay: Option<Duration>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, channel: NotifyChannel) -> Self {
        self.failing.insert(channel);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every attempted send, including rejected ones.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sent_on(&self, channel: NotifyChannel) -> Vec<SentMessage> {
        self.sent()
            .into_iter()
            .filter(|m| m.channel == channel)
            .collect()
    }

    async fn deliver(&self, message: SentMessage) -> Result<(), CollaboratorError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let channel = message.channel;
        info!(channel = %channel, to = %message.to, subject = %message.subject, "notification recorded");
        self.sent
            .lock()
            .map_err(|_| CollaboratorError::Unavailable("transport poisoned".into()))?
            .push(message);

        if self.failing.contains(&channel) {
            return Err(CollaboratorError::Rejected(format!(
                "{channel} provider rejected the message"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl EmailTransport for RecordingTransport {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), CollaboratorError> {
        self.deliver(SentMessage {
            channel: NotifyChannel::Email,
            to: to.to_string(),
            subject: subject.to_string(),
            body: html_body.to_string(),
        })
        .await
    }
}

#[async_trait]
impl SmsTransport for RecordingTransport {
    async fn send_sms(&self, to: &str, body: &str) -> Result<(), CollaboratorError> {
        self.deliver(SentMessage {
            channel: NotifyChannel::Sms,
            to: to.to_string(),
            subject: String::new(),
            body: body.to_string(),
        })
        .await
    }
}

#[async_trait]
impl PushTransport for RecordingTransport {
    async fn send_push(
        &self,
        token: &str,
        title: &str,
        body: &str,
    ) -> Result<(), CollaboratorError> {
        self.deliver(SentMessage {
            channel: NotifyChannel::Push,
            to: token.to_string(),
            subject: title.to_string(),
            body: body.to_string(),
        })
        .await
    }
}
