//! Escalation configuration: thresholds, VIP list, channels and keyword tables.
//!
//! The config is supplied per invocation and never mutated by the classifier.
//! Keyword lists are plain data so deployments (and tests) can swap them
//! without touching the rule order.

use crate::types::NotifyChannel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("confidence_threshold must be within [0, 1], got {0}")]
    ConfidenceThresholdOutOfRange(f64),

    #[error("failure_count_threshold must be at least 1, got {0}")]
    FailureThresholdTooLow(u32),
}

/// Keyword lists for the four text-based rules, matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordTables {
    pub urgent: Vec<String>,
    pub complaint: Vec<String>,
    pub explicit_request: Vec<String>,
    pub frustration: Vec<String>,
}

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl KeywordTables {
    /// Tables with every list empty; only the non-text rules can fire.
    pub fn empty() -> Self {
        Self {
            urgent: Vec::new(),
            complaint: Vec::new(),
            explicit_request: Vec::new(),
            frustration: Vec::new(),
        }
    }
}

impl Default for KeywordTables {
    fn default() -> Self {
        Self {
            urgent: owned(&[
                "emergency",
                "urgent",
                "flooding",
                "flooded",
                "burst pipe",
                "water everywhere",
                "fire",
                "smoke",
                "gas leak",
                "sparking",
                "mold",
                "sewage",
                "safety",
                "dangerous",
                "injured",
            ]),
            complaint: owned(&[
                "refund",
                "chargeback",
                "lawsuit",
                "attorney",
                "lawyer",
                "bbb",
                "better business bureau",
                "cancel service",
                "cancel my service",
                "dispute",
            ]),
            explicit_request: owned(&[
                "speak to",
                "talk to",
                "real person",
                "human",
                "agent",
                "representative",
                "manager",
                "supervisor",
                "call me",
            ]),
            frustration: owned(&[
                "terrible",
                "awful",
                "horrible",
                "furious",
                "angry",
                "unacceptable",
                "ridiculous",
                "worst",
                "frustrated",
                "fed up",
            ]),
        }
    }
}

fn default_confidence_threshold() -> f64 {
    0.6
}

fn default_failure_count_threshold() -> u32 {
    3
}

fn default_channels() -> BTreeSet<NotifyChannel> {
    [NotifyChannel::Email, NotifyChannel::Sms].into_iter().collect()
}

/// Per-invocation escalation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationConfig {
    /// Confidence strictly below this escalates as `low_confidence`.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// Failure counts at or above this escalate as `repeated_failure`.
    #[serde(default = "default_failure_count_threshold")]
    pub failure_count_threshold: u32,
    #[serde(default)]
    pub vip_customer_ids: BTreeSet<String>,
    #[serde(default = "default_channels")]
    pub notify_channels: BTreeSet<NotifyChannel>,
    #[serde(default)]
    pub keywords: KeywordTables,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            failure_count_threshold: default_failure_count_threshold(),
            vip_customer_ids: BTreeSet::new(),
            notify_channels: default_channels(),
            keywords: KeywordTables::default(),
        }
    }
}

impl EscalationConfig {
    pub fn with_vip(mut self, customer_id: impl Into<String>) -> Self {
        self.vip_customer_ids.insert(customer_id.into());
        self
    }

    pub fn with_channels(mut self, channels: impl IntoIterator<Item = NotifyChannel>) -> Self {
        self.notify_channels = channels.into_iter().collect();
        self
    }

    pub fn with_keywords(mut self, keywords: KeywordTables) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn is_vip(&self, customer_id: &str) -> bool {
        self.vip_customer_ids.contains(customer_id)
    }

    /// Check numeric ranges. The classifier itself tolerates any values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::ConfidenceThresholdOutOfRange(
                self.confidence_threshold,
            ));
        }
        if self.failure_count_threshold < 1 {
            return Err(ConfigError::FailureThresholdTooLow(
                self.failure_count_threshold,
            ));
        }
        Ok(())
    }
}
