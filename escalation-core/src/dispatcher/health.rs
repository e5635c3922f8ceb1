//! Channel health — how well each channel reached staff, per escalation.
//!
//! A fan-out is judged per channel as a whole: every addressed staff member
//! reached, some reached, or nobody reached. The board keeps the latest
//! verdict per channel and reports changes against the ticket that caused
//! them, so a provider that stops delivering shows up on the escalation where
//! it happened.
//!
//! ```text
//! delivered == attempted   → Full
//! 0 < delivered < attempted → Partial
//! delivered == 0           → Unavailable
//! ```

use crate::types::NotifyChannel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// How much of a channel's reach worked in a fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationLevel {
    Full,
    Partial,
    Unavailable,
}

impl std::fmt::Display for DegradationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Partial => write!(f, "partial"),
            Self::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Sends on one channel during one fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelTally {
    pub attempted: u32,
    pub delivered: u32,
    pub last_error: Option<String>,
}

impl ChannelTally {
    pub fn add(&mut self, result: Result<(), &str>) {
        self.attempted += 1;
        match result {
            Ok(()) => self.delivered += 1,
            Err(e) => self.last_error = Some(e.to_string()),
        }
    }

    pub fn level(&self) -> DegradationLevel {
        if self.delivered == self.attempted {
            DegradationLevel::Full
        } else if self.delivered == 0 {
            DegradationLevel::Unavailable
        } else {
            DegradationLevel::Partial
        }
    }
}

/// Running view of one channel across escalations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelHealth {
    pub channel: NotifyChannel,
    /// Verdict of the most recent fan-out that used this channel.
    pub level: DegradationLevel,
    /// Consecutive fan-outs in which at least one staff member was missed.
    pub degraded_streak: u32,
    pub attempted: u64,
    pub delivered: u64,
    pub last_error: Option<String>,
    /// Ticket whose fan-out produced `level`.
    pub last_ticket_id: String,
    pub since: DateTime<Utc>,
}

impl ChannelHealth {
    /// Share of sends that reached staff, 1.0 before any send.
    pub fn delivery_rate(&self) -> f64 {
        if self.attempted == 0 {
            1.0
        } else {
            self.delivered as f64 / self.attempted as f64
        }
    }
}

/// A channel whose level differs from its previous fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelChange {
    pub channel: NotifyChannel,
    pub from: DegradationLevel,
    pub to: DegradationLevel,
}

#[derive(Debug, Default)]
pub struct HealthBoard {
    channels: BTreeMap<NotifyChannel, ChannelHealth>,
}

impl HealthBoard {
    /// Fold one fan-out's tallies into the board. A channel seen for the
    /// first time is compared against `Full`.
    pub fn observe(
        &mut self,
        ticket_id: &str,
        tallies: &BTreeMap<NotifyChannel, ChannelTally>,
    ) -> Vec<LevelChange> {
        let now = Utc::now();
        let mut changes = Vec::new();

        for (&channel, tally) in tallies {
            let level = tally.level();
            let health = self.channels.entry(channel).or_insert_with(|| ChannelHealth {
                channel,
                level: DegradationLevel::Full,
                degraded_streak: 0,
                attempted: 0,
                delivered: 0,
                last_error: None,
                last_ticket_id: ticket_id.to_string(),
                since: now,
            });

            health.attempted += u64::from(tally.attempted);
            health.delivered += u64::from(tally.delivered);
            health.last_ticket_id = ticket_id.to_string();
            if level == DegradationLevel::Full {
                health.degraded_streak = 0;
            } else {
                health.degraded_streak += 1;
                health.last_error = tally.last_error.clone();
            }

            if level == health.level {
                continue;
            }
            let change = LevelChange {
                channel,
                from: health.level,
                to: level,
            };
            if level > health.level {
                warn!(
                    channel = %channel,
                    ticket_id,
                    from = %change.from,
                    to = %change.to,
                    delivered = tally.delivered,
                    attempted = tally.attempted,
                    error = tally.last_error.as_deref().unwrap_or(""),
                    "notification channel degraded"
                );
            } else {
                info!(
                    channel = %channel,
                    ticket_id,
                    from = %change.from,
                    to = %change.to,
                    "notification channel recovered"
                );
            }
            health.level = level;
            health.since = now;
            changes.push(change);
        }
        changes
    }

    pub fn get(&self, channel: NotifyChannel) -> Option<&ChannelHealth> {
        self.channels.get(&channel)
    }

    pub fn snapshot(&self) -> Vec<ChannelHealth> {
        self.channels.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tally(delivered: u32, failed: u32) -> ChannelTally {
        let mut t = ChannelTally::default();
        for _ in 0..delivered {
            t.add(Ok(()));
        }
        for _ in 0..failed {
            t.add(Err("carrier rejected"));
        }
        t
    }

    fn round(entries: &[(NotifyChannel, ChannelTally)]) -> BTreeMap<NotifyChannel, ChannelTally> {
        entries.iter().cloned().collect()
    }

    #[test]
    fn test_tally_level_reflects_reach() {
        assert_eq!(tally(3, 0).level(), DegradationLevel::Full);
        assert_eq!(tally(2, 1).level(), DegradationLevel::Partial);
        assert_eq!(tally(0, 2).level(), DegradationLevel::Unavailable);
        assert_eq!(tally(0, 2).last_error.as_deref(), Some("carrier rejected"));
    }

    #[test]
    fn test_degradation_is_reported_against_ticket() {
        let mut board = HealthBoard::default();
        let changes = board.observe("t-1", &round(&[(NotifyChannel::Sms, tally(0, 1))]));
        assert_eq!(
            changes,
            vec![LevelChange {
                channel: NotifyChannel::Sms,
                from: DegradationLevel::Full,
                to: DegradationLevel::Unavailable,
            }]
        );
        let sms = board.get(NotifyChannel::Sms).unwrap();
        assert_eq!(sms.last_ticket_id, "t-1");
        assert_eq!(sms.degraded_streak, 1);
    }

    #[test]
    fn test_steady_level_reports_nothing() {
        let mut board = HealthBoard::default();
        assert!(board
            .observe("t-1", &round(&[(NotifyChannel::Email, tally(2, 0))]))
            .is_empty());
        assert!(board
            .observe("t-2", &round(&[(NotifyChannel::Email, tally(1, 0))]))
            .is_empty());
        let email = board.get(NotifyChannel::Email).unwrap();
        assert_eq!(email.attempted, 3);
        assert_eq!(email.delivery_rate(), 1.0);
    }

    #[test]
    fn test_full_reach_clears_streak_and_recovers() {
        let mut board = HealthBoard::default();
        board.observe("t-1", &round(&[(NotifyChannel::Push, tally(1, 1))]));
        board.observe("t-2", &round(&[(NotifyChannel::Push, tally(0, 2))]));
        assert_eq!(board.get(NotifyChannel::Push).unwrap().degraded_streak, 2);

        let changes = board.observe("t-3", &round(&[(NotifyChannel::Push, tally(2, 0))]));
        assert_eq!(changes[0].from, DegradationLevel::Unavailable);
        assert_eq!(changes[0].to, DegradationLevel::Full);
        let push = board.get(NotifyChannel::Push).unwrap();
        assert_eq!(push.degraded_streak, 0);
        assert!((push.delivery_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unused_channel_is_not_tracked() {
        let mut board = HealthBoard::default();
        board.observe("t-1", &round(&[(NotifyChannel::Email, tally(1, 0))]));
        assert!(board.get(NotifyChannel::Push).is_none());
        assert_eq!(board.snapshot().len(), 1);
    }
}
