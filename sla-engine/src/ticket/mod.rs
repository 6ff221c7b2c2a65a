//! Service ticket model and lifecycle state machine.

pub mod state_machine;
pub mod types;

pub use state_machine::{can_transition, can_transition_ticket, TransitionError};
pub use types::{
    EngineerId, EvidenceRef, FeedbackLink, HoldInterval, Priority, PriorityChange, Resolution,
    ServiceTicket, StatusTransition, TicketId, TicketStatus,
};
