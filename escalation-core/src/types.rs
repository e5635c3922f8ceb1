//! Escalation value types shared by the classifier, registrar and dispatcher.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Audit metadata attached to detections, tickets and notification records.
///
/// Ordered so that identical inputs serialize identically.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// The condition that caused an escalation decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationTrigger {
    LowConfidence,
    CustomerFrustration,
    RepeatedFailure,
    ExplicitRequest,
    VipCustomer,
    KeywordMatch,
    UrgentIssue,
    /// Negative decision: nothing fired.
    None,
}

impl std::fmt::Display for EscalationTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LowConfidence => write!(f, "low_confidence"),
            Self::CustomerFrustration => write!(f, "customer_frustration"),
            Self::RepeatedFailure => write!(f, "repeated_failure"),
            Self::ExplicitRequest => write!(f, "explicit_request"),
            Self::VipCustomer => write!(f, "vip_customer"),
            Self::KeywordMatch => write!(f, "keyword_match"),
            Self::UrgentIssue => write!(f, "urgent_issue"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Ticket severity, ordered `Low < Medium < High < Urgent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl EscalationPriority {
    /// Severity marker embedded in every staff notification.
    pub fn marker(self) -> &'static str {
        match self {
            Self::Urgent => "🚨 URGENT",
            Self::High => "🔴 HIGH",
            Self::Medium => "🟡 MEDIUM",
            Self::Low => "🟢 LOW",
        }
    }
}

impl std::fmt::Display for EscalationPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Urgent => write!(f, "urgent"),
        }
    }
}

/// Result of classifying one conversational turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationDetection {
    pub should_escalate: bool,
    pub trigger: EscalationTrigger,
    pub priority: EscalationPriority,
    /// Human-readable explanation naming the matched keyword or value.
    pub reason: String,
    pub is_urgent: bool,
    pub metadata: Metadata,
}

impl EscalationDetection {
    /// The detection produced when no rule matches.
    pub fn none() -> Self {
        Self {
            should_escalate: false,
            trigger: EscalationTrigger::None,
            priority: EscalationPriority::Low,
            reason: String::new(),
            is_urgent: false,
            metadata: Metadata::new(),
        }
    }
}

/// Notification channel a staff member can be reached on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyChannel {
    Email,
    Sms,
    Push,
}

impl NotifyChannel {
    pub const ALL: [NotifyChannel; 3] = [Self::Email, Self::Sms, Self::Push];
}

impl std::fmt::Display for NotifyChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Email => write!(f, "email"),
            Self::Sms => write!(f, "sms"),
            Self::Push => write!(f, "push"),
        }
    }
}

impl std::str::FromStr for NotifyChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(Self::Email),
            "sms" => Ok(Self::Sms),
            "push" => Ok(Self::Push),
            other => Err(format!("unknown notification channel '{other}'")),
        }
    }
}

/// A staff member eligible for escalation notifications.
///
/// Contact fields are optional; a missing field means the channel is
/// unreachable for this person, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub push_token: Option<String>,
}

impl StaffMember {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_push_token(mut self, token: impl Into<String>) -> Self {
        self.push_token = Some(token.into());
        self
    }

    /// Address for `channel`, if populated and non-blank.
    pub fn contact_for(&self, channel: NotifyChannel) -> Option<&str> {
        let field = match channel {
            NotifyChannel::Email => self.email.as_deref(),
            NotifyChannel::Sms => self.phone.as_deref(),
            NotifyChannel::Push => self.push_token.as_deref(),
        };
        field.map(str::trim).filter(|s| !s.is_empty())
    }
}

/// Handle to a ticket that exists in the ticket store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRef {
    pub ticket_id: String,
    pub ticket_number: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationOutcome {
    Success,
    Failure,
}

/// Audit entry for one attempted (staff, channel) send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub user_id: String,
    pub ticket_id: String,
    pub channel: NotifyChannel,
    pub outcome: NotificationOutcome,
    pub metadata: Metadata,
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}

impl NotificationRecord {
    pub fn is_success(&self) -> bool {
        self.outcome == NotificationOutcome::Success
    }
}
