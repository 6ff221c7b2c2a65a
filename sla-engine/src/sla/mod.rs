//! SLA arithmetic and urgency classification.

pub mod calculator;
pub mod classifier;

pub use calculator::{
    breached_at, deadline_at, effective_elapsed_secs, effective_now, held_secs, measure,
    remaining, SlaMeasurement,
};
pub use classifier::{classify, level_for, UrgencyLevel, UrgencySnapshot};
