//! Hot-swappable policy reference.
//!
//! The desk reads [`PolicyHandle::current`] at the start of every call, so a
//! replaced policy applies to the next operation without a restart. A
//! reload that fails validation leaves the previous policy in place.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{info, warn};

use super::SlaPolicy;
use crate::config::DeskConfig;
use crate::error::ConfigurationError;

/// Shared, replaceable SLA policy.
#[derive(Debug, Clone)]
pub struct PolicyHandle {
    inner: Arc<RwLock<Arc<SlaPolicy>>>,
}

impl PolicyHandle {
    /// Wrap a validated policy.
    pub fn new(policy: SlaPolicy) -> Result<Self, ConfigurationError> {
        policy.validate()?;
        Ok(Self {
            inner: Arc::new(RwLock::new(Arc::new(policy))),
        })
    }

    /// Load the `[sla]` section of a desk configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigurationError> {
        Self::new(DeskConfig::from_file(path)?.sla)
    }

    /// The policy in force right now.
    pub fn current(&self) -> Arc<SlaPolicy> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap in a new policy after validating it.
    pub fn replace(&self, policy: SlaPolicy) -> Result<Arc<SlaPolicy>, ConfigurationError> {
        if let Err(e) = policy.validate() {
            warn!(error = %e, "Rejected SLA policy update");
            return Err(e);
        }
        let policy = Arc::new(policy);
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&policy);
        info!("SLA policy replaced");
        Ok(policy)
    }

    /// Re-read the policy from a desk configuration file.
    pub fn reload_from_file(&self, path: &Path) -> Result<Arc<SlaPolicy>, ConfigurationError> {
        let config = match DeskConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "SLA policy reload failed; keeping current policy");
                return Err(e);
            }
        };
        let policy = self.replace(config.sla)?;
        info!(path = %path.display(), "SLA policy reloaded");
        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::WarningThreshold;
    use crate::ticket::Priority;
    use chrono::Duration;

    #[test]
    fn test_new_rejects_invalid_policy() {
        let policy = SlaPolicy::new(WarningThreshold::BeforeDeadline { seconds: 60 })
            .with_budget(Priority::Normal, Duration::hours(24));
        assert!(PolicyHandle::new(policy).is_err());
    }

    #[test]
    fn test_replace_is_visible_through_clones() {
        let handle = PolicyHandle::new(SlaPolicy::standard()).unwrap();
        let reader = handle.clone();

        let tighter = SlaPolicy::standard().with_budget(Priority::Critical, Duration::hours(1));
        handle.replace(tighter).unwrap();

        assert_eq!(
            reader.current().budget_for(Priority::Critical).unwrap(),
            Duration::hours(1)
        );
    }

    #[test]
    fn test_failed_replace_keeps_previous() {
        let handle = PolicyHandle::new(SlaPolicy::standard()).unwrap();
        let broken = SlaPolicy::standard().with_budget(Priority::Critical, Duration::hours(48));
        assert!(handle.replace(broken).is_err());
        assert_eq!(
            handle.current().budget_for(Priority::Critical).unwrap(),
            Duration::hours(2)
        );
    }

    #[test]
    fn test_snapshot_survives_replace() {
        let handle = PolicyHandle::new(SlaPolicy::standard()).unwrap();
        let before = handle.current();
        handle
            .replace(SlaPolicy::standard().with_budget(Priority::Urgent, Duration::hours(4)))
            .unwrap();
        assert_eq!(before.budget_for(Priority::Urgent).unwrap(), Duration::hours(6));
    }
}
