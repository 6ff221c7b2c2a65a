//! Lifecycle Orchestrator: turns intents into validated ticket changes.
//!
//! The orchestrator is pure: it takes a ticket, an intent, the policy in
//! force and the instant of the change, and returns the next ticket plus its
//! urgency. Loading, locking, saving and event publication belong to
//! [`TicketDesk`](crate::desk::TicketDesk).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::completion::{CompletionFinalizer, CompletionRequest};
use crate::error::EngineResult;
use crate::policy::SlaPolicy;
use crate::sla::calculator::measure;
use crate::sla::classifier::{classify, seal_outcome};
use crate::sla::UrgencySnapshot;
use crate::ticket::state_machine::{self, TransitionError};
use crate::ticket::{EngineerId, Priority, PriorityChange, ServiceTicket, TicketStatus};

/// A requested change to one ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum LifecycleIntent {
    Assign { engineer_id: EngineerId },
    StartTravel,
    StartWork,
    Hold { reason: String },
    Resume,
    Complete(CompletionRequest),
    Cancel { reason: String },
    Reprioritize {
        priority: Priority,
        #[serde(default)]
        reason: Option<String>,
    },
}

impl LifecycleIntent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Assign { .. } => "assign",
            Self::StartTravel => "start_travel",
            Self::StartWork => "start_work",
            Self::Hold { .. } => "hold",
            Self::Resume => "resume",
            Self::Complete(_) => "complete",
            Self::Cancel { .. } => "cancel",
            Self::Reprioritize { .. } => "reprioritize",
        }
    }
}

/// The ticket after an accepted intent, with its urgency at that instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleOutcome {
    pub ticket: ServiceTicket,
    pub urgency: UrgencySnapshot,
}

/// Applies intents through the state machine and completion finalizer.
#[derive(Debug, Clone)]
pub struct LifecycleOrchestrator {
    finalizer: CompletionFinalizer,
}

impl LifecycleOrchestrator {
    pub fn new(finalizer: CompletionFinalizer) -> Self {
        Self { finalizer }
    }

    /// Apply `intent` to `ticket` at `at`. Errors leave nothing changed.
    pub fn apply(
        &self,
        ticket: &ServiceTicket,
        intent: &LifecycleIntent,
        policy: &SlaPolicy,
        at: DateTime<Utc>,
    ) -> EngineResult<LifecycleOutcome> {
        let next = match intent {
            LifecycleIntent::Assign { engineer_id } => {
                state_machine::assign(ticket, engineer_id, at)?
            }
            LifecycleIntent::StartTravel => {
                state_machine::transition(ticket, TicketStatus::OnTheWay, at, None)?
            }
            LifecycleIntent::StartWork => {
                state_machine::transition(ticket, TicketStatus::InProgress, at, None)?
            }
            LifecycleIntent::Hold { reason } => {
                state_machine::transition(ticket, TicketStatus::OnHold, at, Some(reason.as_str()))?
            }
            LifecycleIntent::Resume => state_machine::resume(ticket, at)?,
            LifecycleIntent::Complete(request) => {
                self.finalizer.finalize(ticket, request, policy, at)?
            }
            LifecycleIntent::Cancel { reason } => {
                let mut next =
                    state_machine::transition(ticket, TicketStatus::Cancelled, at, Some(reason.as_str()))?;
                seal_outcome(&mut next, policy, at)?;
                info!(ticket_id = %next.id, reason = %reason, "Ticket cancelled");
                next
            }
            LifecycleIntent::Reprioritize { priority, reason } => {
                reprioritize(ticket, *priority, reason.as_deref(), policy, at)?
            }
        };

        let urgency = classify(&next, policy, at)?;
        debug!(
            ticket_id = %next.id,
            intent = intent.name(),
            level = %urgency.level,
            remaining_secs = urgency.remaining_secs,
            "Intent applied"
        );
        Ok(LifecycleOutcome {
            ticket: next,
            urgency,
        })
    }

    pub fn assign(
        &self,
        ticket: &ServiceTicket,
        engineer_id: &str,
        policy: &SlaPolicy,
        at: DateTime<Utc>,
    ) -> EngineResult<LifecycleOutcome> {
        let intent = LifecycleIntent::Assign {
            engineer_id: engineer_id.to_string(),
        };
        self.apply(ticket, &intent, policy, at)
    }

    pub fn start_travel(
        &self,
        ticket: &ServiceTicket,
        policy: &SlaPolicy,
        at: DateTime<Utc>,
    ) -> EngineResult<LifecycleOutcome> {
        self.apply(ticket, &LifecycleIntent::StartTravel, policy, at)
    }

    pub fn start_work(
        &self,
        ticket: &ServiceTicket,
        policy: &SlaPolicy,
        at: DateTime<Utc>,
    ) -> EngineResult<LifecycleOutcome> {
        self.apply(ticket, &LifecycleIntent::StartWork, policy, at)
    }

    pub fn hold(
        &self,
        ticket: &ServiceTicket,
        reason: &str,
        policy: &SlaPolicy,
        at: DateTime<Utc>,
    ) -> EngineResult<LifecycleOutcome> {
        let intent = LifecycleIntent::Hold {
            reason: reason.to_string(),
        };
        self.apply(ticket, &intent, policy, at)
    }

    pub fn resume(
        &self,
        ticket: &ServiceTicket,
        policy: &SlaPolicy,
        at: DateTime<Utc>,
    ) -> EngineResult<LifecycleOutcome> {
        self.apply(ticket, &LifecycleIntent::Resume, policy, at)
    }

    pub fn complete(
        &self,
        ticket: &ServiceTicket,
        request: CompletionRequest,
        policy: &SlaPolicy,
        at: DateTime<Utc>,
    ) -> EngineResult<LifecycleOutcome> {
        self.apply(ticket, &LifecycleIntent::Complete(request), policy, at)
    }

    pub fn cancel(
        &self,
        ticket: &ServiceTicket,
        reason: &str,
        policy: &SlaPolicy,
        at: DateTime<Utc>,
    ) -> EngineResult<LifecycleOutcome> {
        let intent = LifecycleIntent::Cancel {
            reason: reason.to_string(),
        };
        self.apply(ticket, &intent, policy, at)
    }

    pub fn reprioritize(
        &self,
        ticket: &ServiceTicket,
        priority: Priority,
        reason: Option<&str>,
        policy: &SlaPolicy,
        at: DateTime<Utc>,
    ) -> EngineResult<LifecycleOutcome> {
        let intent = LifecycleIntent::Reprioritize {
            priority,
            reason: reason.map(String::from),
        };
        self.apply(ticket, &intent, policy, at)
    }
}

/// Change the priority of an open ticket, keeping accrued elapsed time.
fn reprioritize(
    ticket: &ServiceTicket,
    priority: Priority,
    reason: Option<&str>,
    policy: &SlaPolicy,
    at: DateTime<Utc>,
) -> EngineResult<ServiceTicket> {
    if ticket.is_terminal() {
        // Priority changes keep the status, so the requested edge is a loop.
        return Err(TransitionError::Closed {
            from: ticket.status,
            to: ticket.status,
        }
        .into());
    }
    let latest = ticket.last_event_at();
    if at < latest {
        return Err(TransitionError::OutOfOrder { at, latest }.into());
    }
    // Budget must exist before anything is recorded.
    policy.budget_secs_for(priority)?;

    if priority == ticket.priority {
        return Ok(ticket.clone());
    }

    let mut next = ticket.clone();
    next.priority_changes.push(PriorityChange {
        from: ticket.priority,
        to: priority,
        at,
        reason: reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(String::from),
    });
    next.priority = priority;

    // Lifted out of breach: a later breach is a new occurrence.
    if next.breach_notified_at.is_some() && !measure(&next, policy, at)?.is_overdue() {
        next.breach_notified_at = None;
    }

    info!(
        ticket_id = %next.id,
        from = %ticket.priority,
        to = %priority,
        "Ticket reprioritized"
    );
    Ok(next)
}
