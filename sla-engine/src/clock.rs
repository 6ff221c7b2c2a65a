//! Injectable time source.
//!
//! All engine time flows through [`Clock`] so SLA arithmetic is reproducible
//! in tests and replays. Instants are truncated to whole seconds at the
//! source; every SLA duration is therefore an exact integer second count.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Duration, SubsecRound, Utc};

/// Supplies the current time.
pub trait Clock: Send + Sync {
    /// Current instant, truncated to whole seconds.
    fn now(&self) -> DateTime<Utc>;
}

/// Shared reference to a clock.
pub type SharedClock = Arc<dyn Clock>;

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now().trunc_subsecs(0)
    }
}

/// A clock that only moves when told to. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(RwLock::new(start.trunc_subsecs(0))),
        }
    }

    /// Jump to an absolute instant.
    pub fn set(&self, at: DateTime<Utc>) {
        let mut now = self.now.write().unwrap_or_else(PoisonError::into_inner);
        *now = at.trunc_subsecs(0);
    }

    /// Move forward (or backward, for a negative delta).
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write().unwrap_or_else(PoisonError::into_inner);
        *now = (*now + by).trunc_subsecs(0);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(PoisonError::into_inner)
    }
}
