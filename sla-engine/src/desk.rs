//! Ticket desk: the id-keyed service every caller goes through.
//!
//! Each mutation follows the same sequence:
//!
//! ```text
//! lock(ticket) → load(+version) → policy.current() → clock.now()
//!   → orchestrate → detect breach → save(expected version) → publish
//! ```
//!
//! Mutations of one ticket are serialized by [`TicketLocks`]; a stale save
//! surfaces as [`EngineError::ConcurrencyConflict`]. Reads take no ticket
//! lock and never publish.

use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::SharedClock;
use crate::completion::{CompletionFinalizer, CompletionRequest, FeedbackLinkMinter};
use crate::dashboard::{rank, TicketUrgency, UrgencyFilter, UrgencySummary};
use crate::error::{ConfigurationError, EngineError, EngineResult};
use crate::events::{LifecycleEvent, SharedEventBus};
use crate::lifecycle::{LifecycleIntent, LifecycleOrchestrator, LifecycleOutcome};
use crate::policy::{PolicyHandle, SlaPolicy};
use crate::sla::calculator::breached_at;
use crate::sla::{classify, UrgencySnapshot};
use crate::store::{SharedTicketStore, StoreError, TicketLocks, VersionedTicket};
use crate::ticket::{Priority, ServiceTicket, TicketStatus};

/// Input for [`TicketDesk::create_ticket`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTicket {
    /// Explicit human-readable number; generated when `None`.
    pub ticket_no: Option<String>,
    pub priority: Priority,
}

impl NewTicket {
    pub fn new(priority: Priority) -> Self {
        Self {
            ticket_no: None,
            priority,
        }
    }

    pub fn with_ticket_no(mut self, ticket_no: impl Into<String>) -> Self {
        self.ticket_no = Some(ticket_no.into());
        self
    }
}

#[derive(Debug, Default)]
struct DailySequence {
    day: Option<NaiveDate>,
    last: u32,
}

impl DailySequence {
    fn next(&mut self, now: DateTime<Utc>) -> String {
        let today = now.date_naive();
        if self.day != Some(today) {
            self.day = Some(today);
            self.last = 0;
        }
        self.last += 1;
        format!("SR-{}-{:04}", today.format("%Y%m%d"), self.last)
    }
}

/// Service façade over store, clock, policy and event bus.
pub struct TicketDesk {
    store: SharedTicketStore,
    clock: SharedClock,
    policy: PolicyHandle,
    events: SharedEventBus,
    orchestrator: LifecycleOrchestrator,
    locks: TicketLocks,
    sequence: Mutex<DailySequence>,
}

impl TicketDesk {
    pub fn new(
        store: SharedTicketStore,
        clock: SharedClock,
        policy: PolicyHandle,
        events: SharedEventBus,
        minter: FeedbackLinkMinter,
    ) -> Self {
        Self {
            store,
            clock,
            policy,
            events,
            orchestrator: LifecycleOrchestrator::new(CompletionFinalizer::new(minter)),
            locks: TicketLocks::new(),
            sequence: Mutex::new(DailySequence::default()),
        }
    }

    /// The live policy handle; replacing its policy affects the next call.
    pub fn policy(&self) -> &PolicyHandle {
        &self.policy
    }

    pub fn events(&self) -> &SharedEventBus {
        &self.events
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Open a ticket in NEW with `created_at = now`.
    pub fn create_ticket(&self, request: NewTicket) -> EngineResult<LifecycleOutcome> {
        let policy = self.policy.current();
        let now = self.clock.now();
        // Refuse tickets whose priority has no budget.
        policy.budget_secs_for(request.priority)?;

        let ticket_no = match request
            .ticket_no
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
        {
            Some(explicit) => explicit.to_string(),
            None => self
                .sequence
                .lock()
                .map_err(|_| StoreError::LockPoisoned)?
                .next(now),
        };

        let ticket = ServiceTicket::new(
            Uuid::new_v4().to_string(),
            ticket_no,
            request.priority,
            now,
        );
        let urgency = classify(&ticket, &policy, now)?;
        self.store.insert(ticket.clone())?;

        info!(
            ticket_id = %ticket.id,
            ticket_no = %ticket.ticket_no,
            priority = %ticket.priority(),
            "Ticket created"
        );
        Ok(LifecycleOutcome { ticket, urgency })
    }

    pub fn assign(&self, ticket_id: &str, engineer_id: &str) -> EngineResult<LifecycleOutcome> {
        self.apply(
            ticket_id,
            LifecycleIntent::Assign {
                engineer_id: engineer_id.to_string(),
            },
        )
    }

    pub fn start_travel(&self, ticket_id: &str) -> EngineResult<LifecycleOutcome> {
        self.apply(ticket_id, LifecycleIntent::StartTravel)
    }

    pub fn start_work(&self, ticket_id: &str) -> EngineResult<LifecycleOutcome> {
        self.apply(ticket_id, LifecycleIntent::StartWork)
    }

    pub fn hold(&self, ticket_id: &str, reason: &str) -> EngineResult<LifecycleOutcome> {
        self.apply(
            ticket_id,
            LifecycleIntent::Hold {
                reason: reason.to_string(),
            },
        )
    }

    pub fn resume(&self, ticket_id: &str) -> EngineResult<LifecycleOutcome> {
        self.apply(ticket_id, LifecycleIntent::Resume)
    }

    pub fn complete(
        &self,
        ticket_id: &str,
        request: CompletionRequest,
    ) -> EngineResult<LifecycleOutcome> {
        self.apply(ticket_id, LifecycleIntent::Complete(request))
    }

    pub fn cancel(&self, ticket_id: &str, reason: &str) -> EngineResult<LifecycleOutcome> {
        self.apply(
            ticket_id,
            LifecycleIntent::Cancel {
                reason: reason.to_string(),
            },
        )
    }

    pub fn reprioritize(
        &self,
        ticket_id: &str,
        priority: Priority,
        reason: Option<&str>,
    ) -> EngineResult<LifecycleOutcome> {
        self.apply(
            ticket_id,
            LifecycleIntent::Reprioritize {
                priority,
                reason: reason.map(String::from),
            },
        )
    }

    /// Apply any intent to the ticket with `ticket_id`.
    pub fn apply(
        &self,
        ticket_id: &str,
        intent: LifecycleIntent,
    ) -> EngineResult<LifecycleOutcome> {
        // Unknown ids fail here and never get a lock entry.
        self.store.load(ticket_id)?;
        let lock = self.locks.lock_for(ticket_id)?;
        let _guard = lock.lock().map_err(|_| StoreError::LockPoisoned)?;

        let VersionedTicket { ticket, version } = self.store.load(ticket_id)?;
        let policy = self.policy.current();
        let now = self.clock.now();

        let mut outcome = match self.orchestrator.apply(&ticket, &intent, &policy, now) {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!(
                    ticket_id,
                    intent = intent.name(),
                    kind = %e.kind(),
                    error = %e,
                    "Intent rejected"
                );
                return Err(e);
            }
        };

        let mut pending = Vec::new();
        if let Some(event) = stamp_breach(&mut outcome.ticket, &policy, now)? {
            pending.push(event);
        }
        if ticket.status() != TicketStatus::Completed
            && outcome.ticket.status() == TicketStatus::Completed
        {
            if let (Some(link), Some(completed_at)) =
                (outcome.ticket.feedback(), outcome.ticket.completed_at())
            {
                pending.push(LifecycleEvent::TicketCompleted {
                    ticket_id: outcome.ticket.id.clone(),
                    ticket_no: outcome.ticket.ticket_no.clone(),
                    feedback_url: link.url.clone(),
                    completed_at,
                });
            }
        }

        self.save(&outcome.ticket, version)?;
        for event in pending {
            self.events.publish(event);
        }
        Ok(outcome)
    }

    /// Stamp and publish every breach not yet notified. This is the polling
    /// entry point for alerting.
    pub fn sweep_breaches(&self) -> EngineResult<Vec<LifecycleEvent>> {
        let policy = self.policy.current();
        let now = self.clock.now();
        let mut published = Vec::new();

        for candidate in self.store.list()? {
            if candidate.is_terminal() || candidate.breach_notified_at().is_some() {
                continue;
            }
            if breached_at(&candidate, &policy, now)?.is_none() {
                continue;
            }

            let lock = self.locks.lock_for(&candidate.id)?;
            let _guard = lock.lock().map_err(|_| StoreError::LockPoisoned)?;

            // Re-read under the lock; a mutation may have raced the listing.
            let VersionedTicket {
                mut ticket,
                version,
            } = self.store.load(&candidate.id)?;
            let Some(event) = stamp_breach(&mut ticket, &policy, now)? else {
                continue;
            };

            match self.save(&ticket, version) {
                Ok(()) => {
                    self.events.publish(event.clone());
                    published.push(event);
                }
                Err(EngineError::ConcurrencyConflict { .. }) => {
                    // Picked up again on the next sweep.
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        if !published.is_empty() {
            info!(count = published.len(), "Breach sweep published events");
        }
        Ok(published)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn get_ticket(&self, ticket_id: &str) -> EngineResult<ServiceTicket> {
        Ok(self.store.load(ticket_id)?.ticket)
    }

    /// Current urgency of one ticket.
    pub fn get_urgency(&self, ticket_id: &str) -> EngineResult<UrgencySnapshot> {
        let ticket = self.store.load(ticket_id)?.ticket;
        Ok(classify(&ticket, &self.policy.current(), self.clock.now())?)
    }

    /// Matching tickets, most urgent first.
    pub fn list_by_urgency(&self, filter: &UrgencyFilter) -> EngineResult<Vec<TicketUrgency>> {
        let tickets = self.store.list()?;
        Ok(rank(
            &tickets,
            &self.policy.current(),
            self.clock.now(),
            filter,
        )?)
    }

    /// Tile counts for the matching tickets.
    pub fn urgency_summary(&self, filter: &UrgencyFilter) -> EngineResult<UrgencySummary> {
        Ok(self.list_by_urgency(filter)?.iter().collect())
    }

    fn save(&self, ticket: &ServiceTicket, version: u64) -> EngineResult<()> {
        match self.store.save(ticket.clone(), version) {
            Ok(_) => Ok(()),
            Err(e) => {
                let e = EngineError::from(e);
                if e.is_retryable() {
                    warn!(ticket_id = %ticket.id, error = %e, "Concurrent modification detected");
                }
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for TicketDesk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketDesk")
            .field("policy", &self.policy)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

/// Mark a newly breached ticket as notified, returning the event to publish.
fn stamp_breach(
    ticket: &mut ServiceTicket,
    policy: &SlaPolicy,
    now: DateTime<Utc>,
) -> Result<Option<LifecycleEvent>, ConfigurationError> {
    if ticket.breach_notified_at.is_some() {
        return Ok(None);
    }
    let Some(breached) = breached_at(ticket, policy, now)? else {
        return Ok(None);
    };

    ticket.breach_notified_at = Some(now);
    warn!(
        ticket_id = %ticket.id,
        ticket_no = %ticket.ticket_no,
        priority = %ticket.priority,
        breached_at = %breached,
        "SLA breached"
    );
    Ok(Some(LifecycleEvent::TicketBreached {
        ticket_id: ticket.id.clone(),
        ticket_no: ticket.ticket_no.clone(),
        priority: ticket.priority,
        breached_at: breached,
        detected_at: now,
    }))
}
