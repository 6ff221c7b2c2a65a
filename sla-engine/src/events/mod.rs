//! Lifecycle notifications for alerting and feedback delivery.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │  TicketDesk  │────▶│  Event Bus   │────▶│  Subscribers │
//! │ (after save) │     │  (broadcast) │     │   (recv)     │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! Events are published only after the ticket change is stored, and each
//! breach or completion is published once.

pub mod bus;
pub mod types;

pub use bus::{EventBus, SharedEventBus};
pub use types::LifecycleEvent;
