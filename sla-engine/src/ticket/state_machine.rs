//! Ticket State Machine: legal transitions and hold bookkeeping.
//!
//! Pure validation: every function takes a ticket by reference and returns
//! the next ticket, leaving the input untouched on failure. This module is
//! the only writer of `status`, `hold_intervals`, `pre_hold_status` and the
//! transition log.
//!
//! ```text
//! NEW         → ASSIGNED (engineer required) | CANCELLED
//! ASSIGNED    → ON_THE_WAY | ON_HOLD | CANCELLED
//! ON_THE_WAY  → IN_PROGRESS | ON_HOLD
//! IN_PROGRESS → COMPLETED (finalizer only) | ON_HOLD
//! ON_HOLD     → <status held before the hold>
//! COMPLETED, CANCELLED → (terminal)
//! ```

use chrono::{DateTime, Utc};
use tracing::debug;

use super::types::{HoldInterval, ServiceTicket, StatusTransition, TicketStatus};

/// Rejected status change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// The edge is not in the transition table.
    #[error("illegal transition {from} → {to}")]
    Illegal { from: TicketStatus, to: TicketStatus },

    /// NEW → ASSIGNED attempted without an engineer.
    #[error("an engineer must be assigned to leave NEW")]
    EngineerRequired,

    /// COMPLETED requested through the plain transition path.
    #[error("COMPLETED can only be entered through the completion finalizer")]
    CompletionRequiresFinalizer,

    /// Resume requested on a ticket that is not on hold. With no hold to
    /// leave, the ticket would stay where it is, so `to == from`.
    #[error("cannot resume {from} → {to}: ticket is not ON_HOLD")]
    NotOnHold { from: TicketStatus, to: TicketStatus },

    /// A change was requested on a closed ticket. `to` is the status the
    /// change would have produced.
    #[error("ticket is {from}; no further changes are accepted (requested {to})")]
    Closed { from: TicketStatus, to: TicketStatus },

    /// The requested instant precedes the ticket's latest recorded event.
    #[error("change at {at} precedes the latest recorded event at {latest}")]
    OutOfOrder {
        at: DateTime<Utc>,
        latest: DateTime<Utc>,
    },
}

impl TransitionError {
    /// The rejected `(from, to)` edge, for errors that concern one.
    pub fn edge(&self) -> Option<(TicketStatus, TicketStatus)> {
        match *self {
            Self::Illegal { from, to }
            | Self::NotOnHold { from, to }
            | Self::Closed { from, to } => Some((from, to)),
            Self::EngineerRequired => Some((TicketStatus::New, TicketStatus::Assigned)),
            Self::CompletionRequiresFinalizer => {
                Some((TicketStatus::InProgress, TicketStatus::Completed))
            }
            Self::OutOfOrder { .. } => None,
        }
    }
}

/// Static transition table. ON_HOLD lists every resumable status; the
/// ticket-aware check narrows it to the recorded pre-hold status.
pub fn can_transition(from: TicketStatus, to: TicketStatus) -> bool {
    use TicketStatus::*;

    matches!(
        (from, to),
        (New, Assigned)
            | (New, Cancelled)
            | (Assigned, OnTheWay)
            | (Assigned, OnHold)
            | (Assigned, Cancelled)
            | (OnTheWay, InProgress)
            | (OnTheWay, OnHold)
            | (InProgress, Completed)
            | (InProgress, OnHold)
            | (OnHold, Assigned)
            | (OnHold, OnTheWay)
            | (OnHold, InProgress)
    )
}

/// Whether `ticket` may move to `to` right now.
pub fn can_transition_ticket(ticket: &ServiceTicket, to: TicketStatus) -> bool {
    if ticket.status == TicketStatus::OnHold {
        return ticket.pre_hold_status == Some(to);
    }
    can_transition(ticket.status, to)
}

/// Move `ticket` to `to` at `at`.
///
/// NEW → ASSIGNED goes through [`assign`] and IN_PROGRESS → COMPLETED goes
/// through the completion finalizer; both are rejected here.
pub fn transition(
    ticket: &ServiceTicket,
    to: TicketStatus,
    at: DateTime<Utc>,
    reason: Option<&str>,
) -> Result<ServiceTicket, TransitionError> {
    if to == TicketStatus::Completed && ticket.status == TicketStatus::InProgress {
        return Err(TransitionError::CompletionRequiresFinalizer);
    }
    if to == TicketStatus::Assigned && ticket.status == TicketStatus::New {
        return Err(TransitionError::EngineerRequired);
    }
    apply(ticket, to, at, reason)
}

/// NEW → ASSIGNED, recording the engineer in the same step.
pub fn assign(
    ticket: &ServiceTicket,
    engineer_id: &str,
    at: DateTime<Utc>,
) -> Result<ServiceTicket, TransitionError> {
    let engineer_id = engineer_id.trim();
    if engineer_id.is_empty() {
        return Err(TransitionError::EngineerRequired);
    }
    if !can_transition_ticket(ticket, TicketStatus::Assigned) || ticket.status != TicketStatus::New
    {
        return Err(TransitionError::Illegal {
            from: ticket.status,
            to: TicketStatus::Assigned,
        });
    }

    let mut staged = ticket.clone();
    staged.assigned_engineer_id = Some(engineer_id.to_string());
    apply(&staged, TicketStatus::Assigned, at, None)
}

/// ON_HOLD → whatever status was suspended.
pub fn resume(ticket: &ServiceTicket, at: DateTime<Utc>) -> Result<ServiceTicket, TransitionError> {
    if ticket.status != TicketStatus::OnHold {
        if ticket.status.is_terminal() {
            return Err(TransitionError::Closed {
                from: ticket.status,
                to: ticket.status,
            });
        }
        return Err(TransitionError::NotOnHold {
            from: ticket.status,
            to: ticket.status,
        });
    }
    let Some(target) = ticket.pre_hold_status else {
        // A hold without a recorded origin cannot be resumed anywhere legal.
        return Err(TransitionError::Illegal {
            from: TicketStatus::OnHold,
            to: TicketStatus::OnHold,
        });
    };
    apply(ticket, target, at, None)
}

/// Unchecked-entry transition used by the public helpers and the finalizer.
pub(crate) fn apply(
    ticket: &ServiceTicket,
    to: TicketStatus,
    at: DateTime<Utc>,
    reason: Option<&str>,
) -> Result<ServiceTicket, TransitionError> {
    let from = ticket.status;

    if !can_transition_ticket(ticket, to) {
        return Err(TransitionError::Illegal { from, to });
    }

    let latest = ticket.last_event_at();
    if at < latest {
        return Err(TransitionError::OutOfOrder { at, latest });
    }

    if from == TicketStatus::New && to != TicketStatus::Cancelled {
        let has_engineer = ticket
            .assigned_engineer_id
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty());
        if !has_engineer {
            return Err(TransitionError::EngineerRequired);
        }
    }

    let reason = reason
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(String::from);

    let mut next = ticket.clone();

    if from == TicketStatus::OnHold {
        if let Some(open) = next.hold_intervals.last_mut().filter(|h| h.is_open()) {
            open.ended_at = Some(at);
        }
        next.pre_hold_status = None;
    }

    match to {
        TicketStatus::OnHold => {
            next.pre_hold_status = Some(from);
            next.hold_intervals
                .push(HoldInterval::open(at, reason.clone()));
        }
        TicketStatus::Completed => next.completed_at = Some(at),
        TicketStatus::Cancelled => {
            next.cancelled_at = Some(at);
            next.cancel_reason = reason.clone();
        }
        _ => {}
    }

    next.status = to;
    next.transitions.push(StatusTransition {
        from,
        to,
        at,
        reason,
    });

    debug!(ticket_id = %next.id, %from, %to, "Ticket transitioned");
    Ok(next)
}
