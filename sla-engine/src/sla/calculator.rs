//! SLA Calculator: hold-aware elapsed, remaining and deadline arithmetic.
//!
//! ```text
//! held      = Σ closed holds + (now − open hold start, only while ON_HOLD)
//! elapsed   = (now − created_at) − held
//! remaining = budget(priority) − elapsed          (negative = overdue by)
//! ```
//!
//! `now` is clamped to the close instant of a completed or cancelled ticket,
//! so a closed ticket's numbers never move again. All values are whole
//! seconds; holds are clipped to the measurement instant.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::policy::{SlaPolicy, MAX_BUDGET_SECS};
use crate::ticket::{ServiceTicket, TicketStatus};

/// SLA arithmetic for one ticket at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaMeasurement {
    pub budget_secs: i64,
    pub elapsed_secs: i64,
    pub held_secs: i64,
    pub remaining_secs: i64,
    /// The instant actually measured (after clamping).
    pub as_of: DateTime<Utc>,
}

impl SlaMeasurement {
    pub fn remaining(&self) -> Duration {
        Duration::seconds(self.remaining_secs)
    }

    pub fn is_overdue(&self) -> bool {
        self.remaining_secs <= 0
    }
}

/// Instant the ticket's clock is read at: `now`, or the close instant once
/// the ticket is closed.
pub fn effective_now(ticket: &ServiceTicket, now: DateTime<Utc>) -> DateTime<Utc> {
    match ticket.closed_at() {
        Some(closed) => closed.min(now),
        None => now,
    }
}

/// Seconds spent on hold up to `at`.
pub fn held_secs(ticket: &ServiceTicket, at: DateTime<Utc>) -> i64 {
    ticket
        .hold_intervals
        .iter()
        .filter_map(|hold| {
            let end = match hold.ended_at {
                Some(end) => end,
                // An open interval only freezes the clock while actually on hold.
                None if ticket.status == TicketStatus::OnHold => at,
                None => return None,
            };
            let start = hold.started_at.min(at);
            Some((end.min(at) - start).num_seconds().max(0))
        })
        .sum()
}

/// Hold-excluded seconds since creation, read at `now` (clamped).
pub fn effective_elapsed_secs(ticket: &ServiceTicket, now: DateTime<Utc>) -> i64 {
    let at = effective_now(ticket, now);
    let wall = (at - ticket.created_at).num_seconds().max(0);
    (wall - held_secs(ticket, at)).max(0)
}

/// Full measurement at `now`.
pub fn measure(
    ticket: &ServiceTicket,
    policy: &SlaPolicy,
    now: DateTime<Utc>,
) -> Result<SlaMeasurement, ConfigurationError> {
    let budget_secs = policy.budget_secs_for(ticket.priority)?;
    let as_of = effective_now(ticket, now);
    let held = held_secs(ticket, as_of);
    let elapsed = effective_elapsed_secs(ticket, as_of);

    Ok(SlaMeasurement {
        budget_secs,
        elapsed_secs: elapsed,
        held_secs: held,
        remaining_secs: budget_secs - elapsed,
        as_of,
    })
}

/// Remaining budget at `now`; negative means overdue by that much.
pub fn remaining(
    ticket: &ServiceTicket,
    policy: &SlaPolicy,
    now: DateTime<Utc>,
) -> Result<Duration, ConfigurationError> {
    measure(ticket, policy, now).map(|m| m.remaining())
}

/// Wall-clock instant at which hold-excluded elapsed time reaches the budget.
///
/// Walks the hold intervals in order; `None` while an open hold has frozen
/// the clock before the budget ran out.
pub fn deadline_at(
    ticket: &ServiceTicket,
    policy: &SlaPolicy,
) -> Result<Option<DateTime<Utc>>, ConfigurationError> {
    let mut budget_left = policy.budget_secs_for(ticket.priority)?;
    let mut cursor = ticket.created_at;

    for hold in &ticket.hold_intervals {
        let running = (hold.started_at - cursor).num_seconds().max(0);
        if running >= budget_left {
            return project(ticket, cursor, budget_left).map(Some);
        }
        match hold.ended_at {
            Some(end) => {
                budget_left -= running;
                cursor = end.max(cursor);
            }
            None if ticket.status == TicketStatus::OnHold => return Ok(None),
            None => {}
        }
    }

    project(ticket, cursor, budget_left).map(Some)
}

/// `cursor + budget_left`, refusing budgets no calendar can hold.
fn project(
    ticket: &ServiceTicket,
    cursor: DateTime<Utc>,
    budget_left: i64,
) -> Result<DateTime<Utc>, ConfigurationError> {
    Duration::try_seconds(budget_left)
        .and_then(|left| cursor.checked_add_signed(left))
        .ok_or(ConfigurationError::BudgetOutOfRange {
            priority: ticket.priority,
            seconds: budget_left,
            max: MAX_BUDGET_SECS,
        })
}

/// When the ticket breached, if it has by `now`.
pub fn breached_at(
    ticket: &ServiceTicket,
    policy: &SlaPolicy,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, ConfigurationError> {
    let measurement = measure(ticket, policy, now)?;
    if !measurement.is_overdue() {
        return Ok(None);
    }
    Ok(Some(
        deadline_at(ticket, policy)?.unwrap_or(measurement.as_of),
    ))
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

    fn assigned(priority: Priority) -> ServiceTicket {
        let ticket = ServiceTicket::new("t-1", "SR-1", priority, t0());
        state_machine::assign(&ticket, "eng-1", t0()).unwrap()
    }

    fn hold(ticket: &ServiceTicket, from: i64, to: i64) -> ServiceTicket {
        let held = state_machine::transition(ticket, TicketStatus::OnHold, at(from), None).unwrap();
        state_machine::resume(&held, at(to)).unwrap()
    }

    #[test]
    fn test_no_holds_elapsed_is_wall_time() {
        let ticket = assigned(Priority::Critical);
        let policy = SlaPolicy::standard();
        let m = measure(&ticket, &policy, at(110)).unwrap();
        assert_eq!(m.elapsed_secs, 110 * 60);
        assert_eq!(m.held_secs, 0);
        assert_eq!(m.remaining_secs, 10 * 60);
    }

    #[test]
    fn test_overdue_is_negative_not_clamped() {
        let ticket = assigned(Priority::Critical);
        let rem = remaining(&ticket, &SlaPolicy::standard(), at(125)).unwrap();
        assert_eq!(rem, Duration::minutes(-5));
    }

    #[test]
    fn test_closed_hold_excluded() {
        let ticket = hold(&assigned(Priority::Normal), 60, 240);
        let m = measure(&ticket, &SlaPolicy::standard(), at(23 * 60)).unwrap();
        assert_eq!(m.held_secs, 3 * 3600);
        assert_eq!(m.elapsed_secs, 20 * 3600);
        assert_eq!(m.remaining_secs, 4 * 3600);
    }

    #[test]
    fn test_open_hold_freezes_clock() {
        let ticket = assigned(Priority::Urgent);
        let held = state_machine::transition(&ticket, TicketStatus::OnHold, at(30), None).unwrap();
        let policy = SlaPolicy::standard();
        let a = measure(&held, &policy, at(60)).unwrap();
        let b = measure(&held, &policy, at(600)).unwrap();
        assert_eq!(a.elapsed_secs, 30 * 60);
        assert_eq!(a.remaining_secs, b.remaining_secs);
        assert!(b.held_secs > a.held_secs);
    }

    #[test]
    fn test_completed_clamps_now() {
        let mut ticket = assigned(Priority::Critical);
        ticket = state_machine::transition(&ticket, TicketStatus::OnTheWay, at(10), None).unwrap();
        ticket = state_machine::transition(&ticket, TicketStatus::InProgress, at(20), None).unwrap();
        ticket = apply(&ticket, TicketStatus::Completed, at(90), None).unwrap();

        let policy = SlaPolicy::standard();
        let at_close = remaining(&ticket, &policy, at(90)).unwrap();
        for later in [91, 300, 10_000, 1_000_000] {
            assert_eq!(remaining(&ticket, &policy, at(later)).unwrap(), at_close);
        }
        assert_eq!(at_close, Duration::minutes(30));
    }

    #[test]
    fn test_cancelled_clamps_now() {
        let ticket = assigned(Priority::Urgent);
        let cancelled = apply(&ticket, TicketStatus::Cancelled, at(45), None).unwrap();
        let m = measure(&cancelled, &SlaPolicy::standard(), at(5000)).unwrap();
        assert_eq!(m.as_of, at(45));
        assert_eq!(m.elapsed_secs, 45 * 60);
    }

    #[test]
    fn test_query_before_hold_ignores_future_hold() {
        let ticket = hold(&assigned(Priority::Normal), 60, 240);
        let m = measure(&ticket, &SlaPolicy::standard(), at(30)).unwrap();
        assert_eq!(m.held_secs, 0);
        assert_eq!(m.elapsed_secs, 30 * 60);
    }

    #[test]
    fn test_deadline_shifts_by_holds() {
        let policy = SlaPolicy::standard();
        let plain = assigned(Priority::Critical);
        assert_eq!(deadline_at(&plain, &policy).unwrap(), Some(at(120)));

        let held = hold(&plain, 30, 75);
        assert_eq!(deadline_at(&held, &policy).unwrap(), Some(at(165)));
    }

    #[test]
    fn test_deadline_unknown_while_frozen() {
        let ticket = assigned(Priority::Critical);
        let held = state_machine::transition(&ticket, TicketStatus::OnHold, at(30), None).unwrap();
        assert_eq!(deadline_at(&held, &SlaPolicy::standard()).unwrap(), None);
    }

    #[test]
    fn test_breached_at_is_the_crossing_instant() {
        let policy = SlaPolicy::standard();
        let ticket = hold(&assigned(Priority::Critical), 30, 60);
        assert_eq!(breached_at(&ticket, &policy, at(140)).unwrap(), None);
        assert_eq!(breached_at(&ticket, &policy, at(200)).unwrap(), Some(at(150)));
    }

    #[test]
    fn test_breach_before_hold_still_reported() {
        let policy = SlaPolicy::standard();
        let ticket = assigned(Priority::Critical);
        let held = state_machine::transition(&ticket, TicketStatus::OnHold, at(130), None).unwrap();
        assert_eq!(breached_at(&held, &policy, at(300)).unwrap(), Some(at(120)));
    }

    #[test]
    fn test_unvalidated_huge_budget_is_an_error() {
        let policy = SlaPolicy::standard()
            .with_budget(Priority::Normal, Duration::seconds(150_000_000_000_000 * 60));
        let ticket = assigned(Priority::Normal);
        assert!(matches!(
            deadline_at(&ticket, &policy).unwrap_err(),
            ConfigurationError::BudgetOutOfRange {
                priority: Priority::Normal,
                ..
            }
        ));
        assert!(crate::sla::classify(&ticket, &policy, at(10)).is_err());
    }

    #[test]
    fn test_missing_budget_surfaces() {
        let policy = SlaPolicy::new(crate::policy::WarningThreshold::BeforeDeadline { seconds: 60 })
            .with_budget(Priority::Normal, Duration::hours(24));
        let ticket = assigned(Priority::Critical);
        assert!(matches!(
            measure(&ticket, &policy, at(1)).unwrap_err(),
            ConfigurationError::MissingBudget { .. }
        ));
    }
}
