//! SLA Policy Table: priority → response budget, plus the warning window.
//!
//! Policies are plain values passed into every computation. Operators load
//! them from configuration (see [`crate::config`]) and swap them at runtime
//! through a [`PolicyHandle`].
//!
//! # Defaults
//!
//! | Priority | Budget | Warning |
//! |---|---|---|
//! | NORMAL | 24h | last 1h |
//! | URGENT | 6h | last 1h |
//! | CRITICAL | 2h | last 1h |

pub mod handle;

use std::collections::BTreeMap;

use chrono::Duration;

use crate::error::ConfigurationError;
use crate::ticket::Priority;

pub use handle::PolicyHandle;

/// Longest budget a policy may configure: five years.
pub const MAX_BUDGET_SECS: i64 = 5 * 365 * 24 * 3600;

/// When a ticket turns `at_risk`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WarningThreshold {
    /// Fixed window before the deadline.
    BeforeDeadline { seconds: i64 },
    /// Fraction of the priority's budget, in (0, 1).
    FractionOfBudget(f64),
}

/// Priority budgets and warning thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct SlaPolicy {
    budgets: BTreeMap<Priority, i64>,
    warning: WarningThreshold,
    warning_overrides: BTreeMap<Priority, i64>,
}

impl SlaPolicy {
    /// Empty policy with the given warning threshold. Budgets are added with
    /// [`SlaPolicy::with_budget`].
    pub fn new(warning: WarningThreshold) -> Self {
        Self {
            budgets: BTreeMap::new(),
            warning,
            warning_overrides: BTreeMap::new(),
        }
    }

    /// NORMAL=24h, URGENT=6h, CRITICAL=2h, warning in the last hour.
    pub fn standard() -> Self {
        Self::new(WarningThreshold::BeforeDeadline { seconds: 3600 })
            .with_budget(Priority::Normal, Duration::hours(24))
            .with_budget(Priority::Urgent, Duration::hours(6))
            .with_budget(Priority::Critical, Duration::hours(2))
    }

    /// Set the budget for a priority.
    pub fn with_budget(mut self, priority: Priority, budget: Duration) -> Self {
        self.budgets.insert(priority, budget.num_seconds());
        self
    }

    /// Set a fixed warning window for one priority, overriding the default.
    pub fn with_warning_override(mut self, priority: Priority, window: Duration) -> Self {
        self.warning_overrides
            .insert(priority, window.num_seconds());
        self
    }

    /// Default warning threshold.
    pub fn warning(&self) -> WarningThreshold {
        self.warning
    }

    /// Budget for `priority`. Never defaults.
    pub fn budget_for(&self, priority: Priority) -> Result<Duration, ConfigurationError> {
        self.budget_secs_for(priority).map(Duration::seconds)
    }

    /// Budget for `priority` in whole seconds.
    pub fn budget_secs_for(&self, priority: Priority) -> Result<i64, ConfigurationError> {
        self.budgets
            .get(&priority)
            .copied()
            .ok_or(ConfigurationError::MissingBudget { priority })
    }

    /// Warning window for `priority`.
    pub fn warning_threshold_for(&self, priority: Priority) -> Result<Duration, ConfigurationError> {
        self.warning_secs_for(priority).map(Duration::seconds)
    }

    /// Warning window for `priority` in whole seconds.
    pub fn warning_secs_for(&self, priority: Priority) -> Result<i64, ConfigurationError> {
        let budget = self.budget_secs_for(priority)?;
        if let Some(window) = self.warning_overrides.get(&priority) {
            return Ok(*window);
        }
        Ok(match self.warning {
            WarningThreshold::BeforeDeadline { seconds } => seconds,
            WarningThreshold::FractionOfBudget(fraction) => (budget as f64 * fraction).floor() as i64,
        })
    }

    /// Check every invariant an operator-supplied policy must satisfy:
    /// every budget positive and at most [`MAX_BUDGET_SECS`], budgets
    /// strictly shrinking as priority rises, warning windows non-negative
    /// and inside the budget.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for priority in Priority::ALL {
            let seconds = self.budget_secs_for(priority)?;
            if seconds <= 0 {
                return Err(ConfigurationError::NonPositiveBudget { priority, seconds });
            }
            if seconds > MAX_BUDGET_SECS {
                return Err(ConfigurationError::BudgetOutOfRange {
                    priority,
                    seconds,
                    max: MAX_BUDGET_SECS,
                });
            }
        }

        for pair in Priority::ALL.windows(2) {
            let (lower, higher) = (pair[0], pair[1]);
            if self.budget_secs_for(higher)? >= self.budget_secs_for(lower)? {
                return Err(ConfigurationError::BudgetOrder { higher, lower });
            }
        }

        if let WarningThreshold::FractionOfBudget(fraction) = self.warning {
            if !(fraction > 0.0 && fraction < 1.0) {
                return Err(ConfigurationError::invalid_warning(format!(
                    "fraction_of_budget must be between 0 and 1 (got {fraction})"
                )));
            }
        }

        for priority in Priority::ALL {
            let window = self.warning_secs_for(priority)?;
            let budget = self.budget_secs_for(priority)?;
            if window < 0 {
                return Err(ConfigurationError::invalid_warning(format!(
                    "warning window for {priority} is negative"
                )));
            }
            if window >= budget {
                return Err(ConfigurationError::invalid_warning(format!(
                    "warning window for {priority} ({window}s) must be shorter than its budget ({budget}s)"
                )));
            }
        }

        Ok(())
    }
}

impl Default for SlaPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_policy_is_valid() {
        let policy = SlaPolicy::standard();
        policy.validate().unwrap();
        assert_eq!(policy.budget_for(Priority::Normal).unwrap(), Duration::hours(24));
        assert_eq!(policy.budget_for(Priority::Urgent).unwrap(), Duration::hours(6));
        assert_eq!(policy.budget_for(Priority::Critical).unwrap(), Duration::hours(2));
    }

    #[test]
    fn test_missing_budget_never_defaults() {
        let policy = SlaPolicy::new(WarningThreshold::BeforeDeadline { seconds: 900 })
            .with_budget(Priority::Normal, Duration::hours(24));
        assert_eq!(
            policy.budget_for(Priority::Critical).unwrap_err(),
            ConfigurationError::MissingBudget {
                priority: Priority::Critical
            }
        );
        assert!(policy.warning_threshold_for(Priority::Critical).is_err());
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_budget_order_is_enforced() {
        let policy = SlaPolicy::standard().with_budget(Priority::Critical, Duration::hours(6));
        assert_eq!(
            policy.validate().unwrap_err(),
            ConfigurationError::BudgetOrder {
                higher: Priority::Critical,
                lower: Priority::Urgent
            }
        );
    }

    #[test]
    fn test_ordering_holds_for_configured_policies() {
        for (normal, urgent, critical) in [(24, 6, 2), (48, 8, 4), (72, 24, 1)] {
            let policy = SlaPolicy::standard()
                .with_budget(Priority::Normal, Duration::hours(normal))
                .with_budget(Priority::Urgent, Duration::hours(urgent))
                .with_budget(Priority::Critical, Duration::hours(critical))
                .with_warning_override(Priority::Critical, Duration::minutes(15));
            policy.validate().unwrap();
            let n = policy.budget_for(Priority::Normal).unwrap();
            let u = policy.budget_for(Priority::Urgent).unwrap();
            let c = policy.budget_for(Priority::Critical).unwrap();
            assert!(n > u && u > c);
        }
    }

    #[test]
    fn test_fraction_warning() {
        let policy = SlaPolicy::standard().with_budget(Priority::Critical, Duration::hours(2));
        let policy = SlaPolicy {
            warning: WarningThreshold::FractionOfBudget(0.25),
            ..policy
        };
        policy.validate().unwrap();
        assert_eq!(
            policy.warning_threshold_for(Priority::Critical).unwrap(),
            Duration::minutes(30)
        );
        assert_eq!(
            policy.warning_threshold_for(Priority::Normal).unwrap(),
            Duration::hours(6)
        );
    }

    #[test]
    fn test_fraction_out_of_range_rejected() {
        let policy = SlaPolicy {
            warning: WarningThreshold::FractionOfBudget(1.5),
            ..SlaPolicy::standard()
        };
        assert!(matches!(
            policy.validate().unwrap_err(),
            ConfigurationError::InvalidWarning { .. }
        ));
    }

    #[test]
    fn test_override_wins_over_default_window() {
        let policy = SlaPolicy::standard()
            .with_warning_override(Priority::Critical, Duration::minutes(15));
        assert_eq!(
            policy.warning_threshold_for(Priority::Critical).unwrap(),
            Duration::minutes(15)
        );
        assert_eq!(
            policy.warning_threshold_for(Priority::Urgent).unwrap(),
            Duration::hours(1)
        );
    }

    #[test]
    fn test_warning_must_fit_inside_budget() {
        let policy = SlaPolicy::standard()
            .with_warning_override(Priority::Critical, Duration::hours(2));
        assert!(matches!(
            policy.validate().unwrap_err(),
            ConfigurationError::InvalidWarning { .. }
        ));
    }

    #[test]
    fn test_budget_upper_bound() {
        let policy = SlaPolicy::standard().with_budget(Priority::Normal, Duration::days(6 * 365));
        assert_eq!(
            policy.validate().unwrap_err(),
            ConfigurationError::BudgetOutOfRange {
                priority: Priority::Normal,
                seconds: 6 * 365 * 24 * 3600,
                max: MAX_BUDGET_SECS,
            }
        );

        let longest = SlaPolicy::standard()
            .with_budget(Priority::Normal, Duration::seconds(MAX_BUDGET_SECS));
        longest.validate().unwrap();
    }
}
