//! Urgency Classifier: maps SLA arithmetic to a dashboard level.
//!
//! Rules, first match wins:
//! 1. ON_HOLD → `paused`
//! 2. remaining ≤ 0 → `breached`
//! 3. remaining ≤ warning window → `at_risk`
//! 4. otherwise → `on_track`
//!
//! Closed tickets carry the snapshot taken when they closed, and that
//! snapshot is returned unchanged from then on, even if the policy changes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::calculator::{deadline_at, measure};
use crate::error::ConfigurationError;
use crate::policy::SlaPolicy;
use crate::ticket::{ServiceTicket, TicketStatus};

/// SLA health level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    /// Comfortably inside the budget.
    OnTrack,
    /// Inside the warning window.
    AtRisk,
    /// Budget exhausted.
    Breached,
    /// Clock frozen by a hold.
    Paused,
}

impl UrgencyLevel {
    pub const ALL: [UrgencyLevel; 4] = [
        UrgencyLevel::OnTrack,
        UrgencyLevel::AtRisk,
        UrgencyLevel::Breached,
        UrgencyLevel::Paused,
    ];
}

impl std::fmt::Display for UrgencyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OnTrack => write!(f, "on_track"),
            Self::AtRisk => write!(f, "at_risk"),
            Self::Breached => write!(f, "breached"),
            Self::Paused => write!(f, "paused"),
        }
    }
}

impl std::str::FromStr for UrgencyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "on_track" => Ok(Self::OnTrack),
            "at_risk" => Ok(Self::AtRisk),
            "breached" => Ok(Self::Breached),
            "paused" => Ok(Self::Paused),
            other => Err(format!("unknown urgency level '{other}'")),
        }
    }
}

/// Point-in-time SLA health of a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrgencySnapshot {
    pub level: UrgencyLevel,
    pub elapsed_secs: i64,
    /// Negative when overdue.
    pub remaining_secs: i64,
    pub budget_secs: i64,
    pub held_secs: i64,
    pub warning_secs: i64,
    /// `None` while a hold has frozen the clock.
    pub deadline_at: Option<DateTime<Utc>>,
    pub as_of: DateTime<Utc>,
}

impl UrgencySnapshot {
    pub fn elapsed(&self) -> Duration {
        Duration::seconds(self.elapsed_secs)
    }

    pub fn remaining(&self) -> Duration {
        Duration::seconds(self.remaining_secs)
    }

    pub fn budget(&self) -> Duration {
        Duration::seconds(self.budget_secs)
    }
}

/// Level for a status and remaining time.
pub fn level_for(status: TicketStatus, remaining_secs: i64, warning_secs: i64) -> UrgencyLevel {
    if status == TicketStatus::OnHold {
        UrgencyLevel::Paused
    } else if remaining_secs <= 0 {
        UrgencyLevel::Breached
    } else if remaining_secs <= warning_secs {
        UrgencyLevel::AtRisk
    } else {
        UrgencyLevel::OnTrack
    }
}

/// Classify `ticket` at `now`. Pure: identical inputs give identical output.
pub fn classify(
    ticket: &ServiceTicket,
    policy: &SlaPolicy,
    now: DateTime<Utc>,
) -> Result<UrgencySnapshot, ConfigurationError> {
    if let Some(frozen) = &ticket.sla_outcome {
        return Ok(frozen.clone());
    }
    evaluate(ticket, policy, now)
}

/// Classification ignoring any frozen outcome.
pub(crate) fn evaluate(
    ticket: &ServiceTicket,
    policy: &SlaPolicy,
    now: DateTime<Utc>,
) -> Result<UrgencySnapshot, ConfigurationError> {
    let m = measure(ticket, policy, now)?;
    let warning_secs = policy.warning_secs_for(ticket.priority)?;

    Ok(UrgencySnapshot {
        level: level_for(ticket.status, m.remaining_secs, warning_secs),
        elapsed_secs: m.elapsed_secs,
        remaining_secs: m.remaining_secs,
        budget_secs: m.budget_secs,
        held_secs: m.held_secs,
        warning_secs,
        deadline_at: deadline_at(ticket, policy)?,
        as_of: m.as_of,
    })
}

/// Freeze the outcome of a ticket that just closed at `at`.
pub(crate) fn seal_outcome(
    ticket: &mut ServiceTicket,
    policy: &SlaPolicy,
    at: DateTime<Utc>,
) -> Result<(), ConfigurationError> {
    if ticket.is_terminal() && ticket.sla_outcome.is_none() {
        ticket.sla_outcome = Some(evaluate(ticket, policy, at)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::state_machine::{self, apply};
    use crate::ticket::Priority;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn at(minutes: i64) -> DateTime<Utc> {
        t0() + Duration::minutes(minutes)
    }

    fn critical_policy() -> SlaPolicy {
        SlaPolicy::standard().with_warning_override(Priority::Critical, Duration::minutes(15))
    }

    fn assigned(priority: Priority) -> ServiceTicket {
        let ticket = ServiceTicket::new("t-1", "SR-1", priority, t0());
        state_machine::assign(&ticket, "eng-1", t0()).unwrap()
    }

    #[test]
    fn test_level_rules_in_order() {
        assert_eq!(level_for(TicketStatus::OnHold, -500, 60), UrgencyLevel::Paused);
        assert_eq!(level_for(TicketStatus::InProgress, 0, 60), UrgencyLevel::Breached);
        assert_eq!(level_for(TicketStatus::InProgress, 60, 60), UrgencyLevel::AtRisk);
        assert_eq!(level_for(TicketStatus::InProgress, 61, 60), UrgencyLevel::OnTrack);
    }

    #[test]
    fn test_critical_ticket_progression() {
        let ticket = assigned(Priority::Critical);
        let policy = critical_policy();

        assert_eq!(classify(&ticket, &policy, at(60)).unwrap().level, UrgencyLevel::OnTrack);

        let risk = classify(&ticket, &policy, at(110)).unwrap();
        assert_eq!(risk.level, UrgencyLevel::AtRisk);
        assert_eq!(risk.remaining(), Duration::minutes(10));

        let late = classify(&ticket, &policy, at(125)).unwrap();
        assert_eq!(late.level, UrgencyLevel::Breached);
        assert_eq!(late.remaining(), Duration::minutes(-5));
        assert_eq!(late.budget(), Duration::hours(2));
    }

    #[test]
    fn test_on_hold_is_paused_even_when_overdue() {
        let ticket = assigned(Priority::Critical);
        let held = state_machine::transition(&ticket, TicketStatus::OnHold, at(130), None).unwrap();
        let snap = classify(&held, &critical_policy(), at(200)).unwrap();
        assert_eq!(snap.level, UrgencyLevel::Paused);
        assert!(snap.remaining_secs < 0);
    }

    #[test]
    fn test_classify_is_pure() {
        let ticket = assigned(Priority::Urgent);
        let policy = SlaPolicy::standard();
        for minutes in [0, 59, 300, 301, 360, 999] {
            let a = classify(&ticket, &policy, at(minutes)).unwrap();
            let b = classify(&ticket, &policy, at(minutes)).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_sealed_outcome_ignores_policy_changes() {
        let mut ticket = assigned(Priority::Critical);
        ticket = state_machine::transition(&ticket, TicketStatus::OnTheWay, at(5), None).unwrap();
        ticket = state_machine::transition(&ticket, TicketStatus::InProgress, at(10), None).unwrap();
        ticket = apply(&ticket, TicketStatus::Completed, at(100), None).unwrap();

        let policy = critical_policy();
        seal_outcome(&mut ticket, &policy, at(100)).unwrap();
        let sealed = classify(&ticket, &policy, at(100)).unwrap();
        assert_eq!(sealed.level, UrgencyLevel::OnTrack);

        let stricter = SlaPolicy::standard().with_budget(Priority::Critical, Duration::minutes(30));
        let later = classify(&ticket, &stricter, at(10_000)).unwrap();
        assert_eq!(later, sealed);
    }

    #[test]
    fn test_seal_is_noop_for_open_tickets() {
        let mut ticket = assigned(Priority::Normal);
        seal_outcome(&mut ticket, &SlaPolicy::standard(), at(5)).unwrap();
        assert!(ticket.sla_outcome().is_none());
    }

    #[test]
    fn test_level_parse_and_display() {
        for level in UrgencyLevel::ALL {
            assert_eq!(level.to_string().parse::<UrgencyLevel>().unwrap(), level);
        }
        assert_eq!("at-risk".parse::<UrgencyLevel>().unwrap(), UrgencyLevel::AtRisk);
    }
}
