//! Trigger Classifier — ordered rule table, first match wins
//!
//! Pure function of (message, confidence, failure count, customer id, config).
//! The order of [`RULES`] decides which priority a message receives when more
//! than one condition holds, so it is part of the contract:
//!
//! ```text
//! 1. urgent keywords        → urgent_issue          (urgent)
//! 2. complaint keywords     → customer_frustration  (high)
//! 3. explicit-request words → explicit_request      (high)
//! 4. frustration keywords   → customer_frustration  (high)
//! 5. VIP customer           → vip_customer          (high)
//! 6. confidence < threshold → low_confidence        (medium)
//! 7. failures ≥ threshold   → repeated_failure      (medium)
//! otherwise                 → none                  (low)
//! ```

use crate::config::{EscalationConfig, KeywordTables};
use crate::types::{EscalationDetection, EscalationPriority, EscalationTrigger, Metadata};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Which keyword list a text rule consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordCategory {
    Urgent,
    Complaint,
    ExplicitRequest,
    Frustration,
}

impl KeywordCategory {
    fn list<'a>(&self, tables: &'a KeywordTables) -> &'a [String] {
        match self {
            Self::Urgent => &tables.urgent,
            Self::Complaint => &tables.complaint,
            Self::ExplicitRequest => &tables.explicit_request,
            Self::Frustration => &tables.frustration,
        }
    }

    fn describe(&self, keyword: &str) -> String {
        match self {
            Self::Urgent => format!("Urgent issue reported: \"{keyword}\""),
            Self::Complaint => format!("Complaint or refund request: \"{keyword}\""),
            Self::ExplicitRequest => format!("Customer asked for a human: \"{keyword}\""),
            Self::Frustration => format!("Customer frustration detected: \"{keyword}\""),
        }
    }
}

impl std::fmt::Display for KeywordCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Urgent => write!(f, "urgent"),
            Self::Complaint => write!(f, "complaint"),
            Self::ExplicitRequest => write!(f, "explicit_request"),
            Self::Frustration => write!(f, "frustration"),
        }
    }
}

/// The condition a rule tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleCheck {
    Keywords(KeywordCategory),
    VipCustomer,
    LowConfidence,
    RepeatedFailure,
}

/// One row of the rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub check: RuleCheck,
    pub trigger: EscalationTrigger,
    pub priority: EscalationPriority,
}

/// Evaluation order. Rules after the first match are never consulted.
pub const RULES: [Rule; 7] = [
    Rule {
        check: RuleCheck::Keywords(KeywordCategory::Urgent),
        trigger: EscalationTrigger::UrgentIssue,
        priority: EscalationPriority::Urgent,
    },
    Rule {
        check: RuleCheck::Keywords(KeywordCategory::Complaint),
        trigger: EscalationTrigger::CustomerFrustration,
        priority: EscalationPriority::High,
    },
    Rule {
        check: RuleCheck::Keywords(KeywordCategory::ExplicitRequest),
        trigger: EscalationTrigger::ExplicitRequest,
        priority: EscalationPriority::High,
    },
    Rule {
        check: RuleCheck::Keywords(KeywordCategory::Frustration),
        trigger: EscalationTrigger::CustomerFrustration,
        priority: EscalationPriority::High,
    },
    Rule {
        check: RuleCheck::VipCustomer,
        trigger: EscalationTrigger::VipCustomer,
        priority: EscalationPriority::High,
    },
    Rule {
        check: RuleCheck::LowConfidence,
        trigger: EscalationTrigger::LowConfidence,
        priority: EscalationPriority::Medium,
    },
    Rule {
        check: RuleCheck::RepeatedFailure,
        trigger: EscalationTrigger::RepeatedFailure,
        priority: EscalationPriority::Medium,
    },
];

/// Signals observed for a single conversational turn.
#[derive(Debug, Clone, Copy)]
pub struct TurnSignals<'a> {
    pub message: &'a str,
    pub confidence: f64,
    pub failure_count: u32,
    pub customer_id: Option<&'a str>,
}

/// First keyword of `keywords` (in list order) contained in `lowered`.
fn first_keyword<'a>(lowered: &str, keywords: &'a [String]) -> Option<&'a str> {
    keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .find(|k| lowered.contains(k.to_lowercase().as_str()))
}

impl Rule {
    /// Reason and audit metadata when this rule matches the turn.
    fn evaluate(
        &self,
        signals: &TurnSignals<'_>,
        lowered: &str,
        config: &EscalationConfig,
    ) -> Option<(String, Metadata)> {
        let mut metadata = Metadata::new();
        match self.check {
            RuleCheck::Keywords(category) => {
                let keyword = first_keyword(lowered, category.list(&config.keywords))?;
                metadata.insert("keyword".into(), json!(keyword));
                metadata.insert("keyword_category".into(), json!(category.to_string()));
                Some((category.describe(keyword), metadata))
            }
            RuleCheck::VipCustomer => {
                let customer_id = signals.customer_id.filter(|id| config.is_vip(id))?;
                metadata.insert("customer_id".into(), json!(customer_id));
                Some((format!("VIP customer {customer_id}"), metadata))
            }
            RuleCheck::LowConfidence => {
                // NaN compares false and never escalates here.
                if !(signals.confidence < config.confidence_threshold) {
                    return None;
                }
                metadata.insert("confidence".into(), json!(signals.confidence));
                metadata.insert("threshold".into(), json!(config.confidence_threshold));
                Some((
                    format!(
                        "Low confidence score {:.2} below threshold {:.2}",
                        signals.confidence, config.confidence_threshold
                    ),
                    metadata,
                ))
            }
            RuleCheck::RepeatedFailure => {
                if signals.failure_count < config.failure_count_threshold {
                    return None;
                }
                metadata.insert("failure_count".into(), json!(signals.failure_count));
                metadata.insert("threshold".into(), json!(config.failure_count_threshold));
                Some((
                    format!(
                        "{} failed responses (threshold {})",
                        signals.failure_count, config.failure_count_threshold
                    ),
                    metadata,
                ))
            }
        }
    }
}

/// Classify one turn against the rule table.
pub fn classify(signals: &TurnSignals<'_>, config: &EscalationConfig) -> EscalationDetection {
    let lowered = signals.message.to_lowercase();

    for rule in &RULES {
        if let Some((reason, metadata)) = rule.evaluate(signals, &lowered, config) {
            return EscalationDetection {
                should_escalate: true,
                trigger: rule.trigger,
                priority: rule.priority,
                reason,
                is_urgent: rule.priority == EscalationPriority::Urgent,
                metadata,
            };
        }
    }

    EscalationDetection::none()
}

/// Decide whether a turn needs a human. Deterministic and side-effect-free.
pub fn detect_escalation(
    message: &str,
    confidence: f64,
    failure_count: u32,
    customer_id: Option<&str>,
    config: &EscalationConfig,
) -> EscalationDetection {
    classify(
        &TurnSignals {
            message,
            confidence,
            failure_count,
            customer_id,
        },
        config,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EscalationConfig {
        EscalationConfig::default()
    }

    fn neutral(message: &str, config: &EscalationConfig) -> EscalationDetection {
        detect_escalation(message, 1.0, 0, None, config)
    }

    #[test]
    fn test_neutral_message_does_not_escalate() {
        let d = neutral("Can I book a cleaning for Tuesday?", &config());
        assert!(!d.should_escalate);
        assert_eq!(d.trigger, EscalationTrigger::None);
        assert_eq!(d.priority, EscalationPriority::Low);
        assert!(d.reason.is_empty());
        assert!(d.metadata.is_empty());
    }

    #[test]
    fn test_urgent_beats_complaint() {
        let d = neutral("My basement is flooding and I want a refund", &config());
        assert_eq!(d.trigger, EscalationTrigger::UrgentIssue);
        assert_eq!(d.priority, EscalationPriority::Urgent);
        assert!(d.is_urgent);
        assert_eq!(d.metadata["keyword"], json!("flooding"));
    }

    #[test]
    fn test_complaint_beats_explicit_request() {
        let d = neutral("Let me speak to someone about my refund", &config());
        assert_eq!(d.trigger, EscalationTrigger::CustomerFrustration);
        assert_eq!(d.metadata["keyword_category"], json!("complaint"));
    }

    #[test]
    fn test_explicit_request_beats_frustration() {
        let d = neutral("This is terrible, get me a supervisor", &config());
        assert_eq!(d.trigger, EscalationTrigger::ExplicitRequest);
        assert_eq!(d.priority, EscalationPriority::High);
        assert!(!d.is_urgent);
    }

    #[test]
    fn test_frustration_keyword() {
        let d = neutral("Honestly this is UNACCEPTABLE", &config());
        assert_eq!(d.trigger, EscalationTrigger::CustomerFrustration);
        assert_eq!(d.metadata["keyword"], json!("unacceptable"));
        assert!(d.reason.contains("unacceptable"));
    }

    #[test]
    fn test_frustration_beats_vip() {
        let cfg = config().with_vip("vip-1");
        let d = detect_escalation("awful service", 1.0, 0, Some("vip-1"), &cfg);
        assert_eq!(d.trigger, EscalationTrigger::CustomerFrustration);
    }

    #[test]
    fn test_vip_customer() {
        let cfg = config().with_vip("vip-1");
        let d = detect_escalation("When is my next visit?", 1.0, 0, Some("vip-1"), &cfg);
        assert_eq!(d.trigger, EscalationTrigger::VipCustomer);
        assert_eq!(d.priority, EscalationPriority::High);
        assert_eq!(d.metadata["customer_id"], json!("vip-1"));
    }

    #[test]
    fn test_vip_beats_low_confidence() {
        let cfg = config().with_vip("vip-1");
        let d = detect_escalation("hello", 0.1, 10, Some("vip-1"), &cfg);
        assert_eq!(d.trigger, EscalationTrigger::VipCustomer);
    }

    #[test]
    fn test_non_vip_customer_falls_through() {
        let cfg = config().with_vip("vip-1");
        let d = detect_escalation("hello", 1.0, 0, Some("regular-7"), &cfg);
        assert!(!d.should_escalate);
    }

    #[test]
    fn test_confidence_threshold_is_strict() {
        let cfg = config();
        let at = detect_escalation("hello", cfg.confidence_threshold, 0, None, &cfg);
        assert!(!at.should_escalate);

        let below = detect_escalation("hello", cfg.confidence_threshold - 0.01, 0, None, &cfg);
        assert_eq!(below.trigger, EscalationTrigger::LowConfidence);
        assert_eq!(below.priority, EscalationPriority::Medium);
        assert_eq!(below.metadata["threshold"], json!(0.6));
    }

    #[test]
    fn test_low_confidence_beats_repeated_failure() {
        let d = detect_escalation("hello", 0.2, 5, None, &config());
        assert_eq!(d.trigger, EscalationTrigger::LowConfidence);
    }

    #[test]
    fn test_repeated_failure_at_threshold() {
        let cfg = config();
        let below = detect_escalation("hello", 1.0, cfg.failure_count_threshold - 1, None, &cfg);
        assert!(!below.should_escalate);

        let at = detect_escalation("hello", 1.0, cfg.failure_count_threshold, None, &cfg);
        assert_eq!(at.trigger, EscalationTrigger::RepeatedFailure);
        assert_eq!(at.metadata["failure_count"], json!(3));
        assert_eq!(at.reason, "3 failed responses (threshold 3)");
    }

    #[test]
    fn test_nan_confidence_does_not_escalate() {
        let d = detect_escalation("hello", f64::NAN, 0, None, &config());
        assert!(!d.should_escalate);
    }

    #[test]
    fn test_injected_keywords_replace_defaults() {
        let tables = KeywordTables {
            urgent: vec!["meltdown".into()],
            ..KeywordTables::empty()
        };
        let cfg = config().with_keywords(tables);
        assert!(!neutral("flooding and a refund please", &cfg).should_escalate);
        assert_eq!(
            neutral("reactor MELTDOWN", &cfg).trigger,
            EscalationTrigger::UrgentIssue
        );
    }

    #[test]
    fn test_blank_keywords_never_match() {
        let tables = KeywordTables {
            complaint: vec!["".into(), "   ".into()],
            ..KeywordTables::empty()
        };
        let cfg = config().with_keywords(tables);
        assert!(!neutral("anything at all", &cfg).should_escalate);
    }

    #[test]
    fn test_first_listed_keyword_reported() {
        let tables = KeywordTables {
            urgent: vec!["fire".into(), "smoke".into()],
            ..KeywordTables::empty()
        };
        let cfg = config().with_keywords(tables);
        let d = neutral("smoke and fire in the attic", &cfg);
        assert_eq!(d.metadata["keyword"], json!("fire"));
    }

    #[test]
    fn test_rule_table_order() {
        let triggers: Vec<EscalationTrigger> = RULES.iter().map(|r| r.trigger).collect();
        assert_eq!(
            triggers,
            vec![
                EscalationTrigger::UrgentIssue,
                EscalationTrigger::CustomerFrustration,
                EscalationTrigger::ExplicitRequest,
                EscalationTrigger::CustomerFrustration,
                EscalationTrigger::VipCustomer,
                EscalationTrigger::LowConfidence,
                EscalationTrigger::RepeatedFailure,
            ]
        );
        assert_eq!(RULES[0].check, RuleCheck::Keywords(KeywordCategory::Urgent));
        assert_eq!(RULES[1].check, RuleCheck::Keywords(KeywordCategory::Complaint));
        // Priorities never increase down the table.
        assert!(RULES.windows(2).all(|w| w[0].priority >= w[1].priority));
    }

    #[test]
    fn test_detection_is_deterministic() {
        let cfg = config().with_vip("vip-1");
        let a = detect_escalation("I want a refund", 0.3, 4, Some("vip-1"), &cfg);
        let b = detect_escalation("I want a refund", 0.3, 4, Some("vip-1"), &cfg);
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}
