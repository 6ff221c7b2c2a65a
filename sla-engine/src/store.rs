//! Ticket persistence seam.
//!
//! The engine only needs three things from storage: insert a new ticket,
//! load a ticket together with its version, and save a ticket only if the
//! version has not moved. [`InMemoryTicketStore`] is the reference
//! implementation used by the desk, the CLI and the tests.
//!
//! [`TicketLocks`] serializes mutations of one ticket inside a process; the
//! version check catches writers outside that lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::debug;

use crate::ticket::{ServiceTicket, TicketId};

/// Error type for ticket store operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("ticket not found: {0}")]
    NotFound(TicketId),

    #[error("ticket {ticket_id} changed underneath (expected version {expected}, found {actual})")]
    VersionConflict {
        ticket_id: TicketId,
        expected: u64,
        actual: u64,
    },

    #[error("ticket already exists: {0}")]
    Duplicate(TicketId),

    #[error("Lock poisoned")]
    LockPoisoned,
}

/// Result type for ticket store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// A ticket plus the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedTicket {
    pub ticket: ServiceTicket,
    pub version: u64,
}

/// Storage for service tickets with optimistic versioning.
pub trait TicketStore: Send + Sync {
    /// Store a new ticket at version 1.
    fn insert(&self, ticket: ServiceTicket) -> StoreResult<u64>;

    /// Load a ticket and its current version.
    fn load(&self, ticket_id: &str) -> StoreResult<VersionedTicket>;

    /// Replace a ticket if its version is still `expected_version`;
    /// returns the new version.
    fn save(&self, ticket: ServiceTicket, expected_version: u64) -> StoreResult<u64>;

    /// All tickets, in no particular order.
    fn list(&self) -> StoreResult<Vec<ServiceTicket>>;
}

/// Shared reference to a ticket store
pub type SharedTicketStore = Arc<dyn TicketStore>;

/// `HashMap`-backed store.
#[derive(Debug, Default)]
pub struct InMemoryTicketStore {
    tickets: RwLock<HashMap<TicketId, VersionedTicket>>,
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tickets.read().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TicketStore for InMemoryTicketStore {
    fn insert(&self, ticket: ServiceTicket) -> StoreResult<u64> {
        let mut tickets = self.tickets.write().map_err(|_| StoreError::LockPoisoned)?;
        if tickets.contains_key(&ticket.id) {
            return Err(StoreError::Duplicate(ticket.id));
        }
        debug!(ticket_id = %ticket.id, "Ticket inserted");
        tickets.insert(ticket.id.clone(), VersionedTicket { ticket, version: 1 });
        Ok(1)
    }

    fn load(&self, ticket_id: &str) -> StoreResult<VersionedTicket> {
        let tickets = self.tickets.read().map_err(|_| StoreError::LockPoisoned)?;
        tickets
            .get(ticket_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(ticket_id.to_string()))
    }

    fn save(&self, ticket: ServiceTicket, expected_version: u64) -> StoreResult<u64> {
        let mut tickets = self.tickets.write().map_err(|_| StoreError::LockPoisoned)?;
        let entry = tickets
            .get_mut(&ticket.id)
            .ok_or_else(|| StoreError::NotFound(ticket.id.clone()))?;

        if entry.version != expected_version {
            return Err(StoreError::VersionConflict {
                ticket_id: ticket.id,
                expected: expected_version,
                actual: entry.version,
            });
        }

        entry.version += 1;
        entry.ticket = ticket;
        debug!(ticket_id = %entry.ticket.id, version = entry.version, "Ticket saved");
        Ok(entry.version)
    }

    fn list(&self) -> StoreResult<Vec<ServiceTicket>> {
        let tickets = self.tickets.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(tickets.values().map(|v| v.ticket.clone()).collect())
    }
}

/// Per-ticket mutual exclusion.
///
/// Entries are never evicted; one unit mutex per existing ticket id ever
/// mutated.
#[derive(Debug, Default)]
pub struct TicketLocks {
    locks: Mutex<HashMap<TicketId, Arc<Mutex<()>>>>,
}

impl TicketLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ticket ids that have a lock.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The mutex guarding `ticket_id`. Callers hold its guard for the whole
    /// load-mutate-save sequence.
    pub fn lock_for(&self, ticket_id: &str) -> StoreResult<Arc<Mutex<()>>> {
        let mut locks = self.locks.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(Arc::clone(
            locks
                .entry(ticket_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        ))
    }
}
