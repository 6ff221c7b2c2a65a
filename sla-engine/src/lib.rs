//! Service Ticket SLA Engine
//!
//! This library is the single source of truth for service-ticket lifecycle
//! and SLA health:
//! - A ticket state machine with hold/resume bookkeeping
//! - Hold-aware SLA arithmetic (elapsed, remaining, projected deadline)
//! - Urgency classification for dashboards and alerts
//! - Completion finalization with one-time feedback links
//! - An id-keyed desk service with per-ticket serialization and breach events
//!
//! # Ticket Flow
//!
//! ```text
//! NEW → ASSIGNED → ON_THE_WAY → IN_PROGRESS → COMPLETED
//!  │       │  ▲        │  ▲         │  ▲
//!  │       ▼  │        ▼  │         ▼  │
//!  │      ON_HOLD     ON_HOLD      ON_HOLD      (resume returns to the held state)
//!  │       │
//!  └───────┴──→ CANCELLED
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use sla_engine::{
//!     EventBus, FeedbackLinkMinter, InMemoryTicketStore, NewTicket, PolicyHandle, Priority,
//!     SlaPolicy, SystemClock, TicketDesk,
//! };
//! use std::sync::Arc;
//!
//! let desk = TicketDesk::new(
//!     Arc::new(InMemoryTicketStore::new()),
//!     Arc::new(SystemClock),
//!     PolicyHandle::new(SlaPolicy::standard())?,
//!     EventBus::new().shared(),
//!     FeedbackLinkMinter::new("https://desk.example.com/feedback"),
//! );
//!
//! let created = desk.create_ticket(NewTicket::new(Priority::Critical))?;
//! let assigned = desk.assign(&created.ticket.id, "eng-7")?;
//! println!("{} is {}", assigned.ticket.ticket_no, assigned.urgency.level);
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod clock;
pub mod completion;
pub mod config;
pub mod dashboard;
pub mod desk;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod policy;
pub mod sla;
pub mod store;
pub mod ticket;

// Re-export clock types
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};

// Re-export configuration types
pub use config::{DeskConfig, FeedbackConfig};
pub use policy::{PolicyHandle, SlaPolicy, WarningThreshold};

// Re-export error types
pub use error::{ConfigurationError, EngineError, EngineResult, ErrorKind};

// Re-export ticket model and state machine
pub use ticket::state_machine::{self, TransitionError};
pub use ticket::{
    EngineerId, EvidenceRef, FeedbackLink, HoldInterval, Priority, PriorityChange, Resolution,
    ServiceTicket, StatusTransition, TicketId, TicketStatus,
};

// Re-export SLA computation types
pub use sla::{classify, SlaMeasurement, UrgencyLevel, UrgencySnapshot};

// Re-export completion types
pub use completion::{
    CompletionField, CompletionFinalizer, CompletionRequest, FeedbackLinkMinter, FieldError,
    ValidationErrors,
};

// Re-export orchestration types
pub use desk::{NewTicket, TicketDesk};
pub use lifecycle::{LifecycleIntent, LifecycleOrchestrator, LifecycleOutcome};

// Re-export read-side types
pub use dashboard::{TicketUrgency, UrgencyFilter, UrgencySummary};

// Re-export store types
pub use store::{
    InMemoryTicketStore, SharedTicketStore, StoreError, StoreResult, TicketLocks, TicketStore,
    VersionedTicket,
};

// Re-export event types
pub use events::{EventBus, LifecycleEvent, SharedEventBus};
