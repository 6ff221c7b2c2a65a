//! Desk configuration loaded from TOML.
//!
//! ```toml
//! [sla.budget_minutes]
//! normal = 1440
//! urgent = 360
//! critical = 120
//!
//! [sla.warning]
//! minutes_before_deadline = 60      # or: fraction_of_budget = 0.1
//!
//! [sla.warning.per_priority]
//! critical = 15
//!
//! [feedback]
//! base_url = "https://desk.example.com/feedback"
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `SLA_DESK_POLICY_PATH` | `sla-desk.toml` | Configuration file location |
//! | `SLA_DESK_FEEDBACK_BASE_URL` | `http://localhost:8080/feedback` | Overrides `[feedback].base_url` |

use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::Deserialize;

use crate::error::ConfigurationError;
use crate::policy::{SlaPolicy, WarningThreshold, MAX_BUDGET_SECS};
use crate::ticket::Priority;

const DEFAULT_CONFIG_PATH: &str = "sla-desk.toml";
const DEFAULT_FEEDBACK_BASE_URL: &str = "http://localhost:8080/feedback";

/// Where feedback links point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackConfig {
    /// Prefix for minted feedback URLs; the token is appended as a path segment.
    pub base_url: String,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("SLA_DESK_FEEDBACK_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_FEEDBACK_BASE_URL.into()),
        }
    }
}

impl FeedbackConfig {
    fn validate(&self) -> Result<(), ConfigurationError> {
        let url = self.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigurationError::InvalidFeedback {
                message: format!("base_url must be an http(s) URL (got '{url}')"),
            });
        }
        Ok(())
    }
}

/// Complete desk configuration.
#[derive(Debug, Clone)]
pub struct DeskConfig {
    pub sla: SlaPolicy,
    pub feedback: FeedbackConfig,
}

impl DeskConfig {
    /// Configuration file to use: explicit path, then `SLA_DESK_POLICY_PATH`,
    /// then `sla-desk.toml` in the working directory.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        std::env::var("SLA_DESK_POLICY_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Load and validate a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigurationError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigurationError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigurationError> {
        let raw: RawDeskConfig =
            toml::from_str(content).map_err(|e| ConfigurationError::parse(e.to_string()))?;

        let sla = raw.sla.into_policy()?;
        sla.validate()?;

        // Environment wins over the file so deployments can repoint links.
        let feedback = match (std::env::var("SLA_DESK_FEEDBACK_BASE_URL").ok(), raw.feedback) {
            (Some(base_url), _) => FeedbackConfig { base_url },
            (None, Some(file)) => FeedbackConfig {
                base_url: file.base_url,
            },
            (None, None) => FeedbackConfig::default(),
        };
        feedback.validate()?;

        Ok(Self { sla, feedback })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDeskConfig {
    sla: RawSla,
    #[serde(default)]
    feedback: Option<RawFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFeedback {
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSla {
    budget_minutes: PriorityMinutes,
    warning: RawWarning,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PriorityMinutes {
    normal: Option<i64>,
    urgent: Option<i64>,
    critical: Option<i64>,
}

impl PriorityMinutes {
    fn get(&self, priority: Priority) -> Option<i64> {
        match priority {
            Priority::Normal => self.normal,
            Priority::Urgent => self.urgent,
            Priority::Critical => self.critical,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawWarning {
    minutes_before_deadline: Option<i64>,
    fraction_of_budget: Option<f64>,
    #[serde(default)]
    per_priority: PriorityMinutes,
}

impl RawSla {
    fn into_policy(self) -> Result<SlaPolicy, ConfigurationError> {
        let warning = match (
            self.warning.minutes_before_deadline,
            self.warning.fraction_of_budget,
        ) {
            (Some(minutes), None) => WarningThreshold::BeforeDeadline {
                seconds: minutes.checked_mul(60).ok_or_else(|| {
                    ConfigurationError::invalid_warning(format!(
                        "minutes_before_deadline is out of range (got {minutes})"
                    ))
                })?,
            },
            (None, Some(fraction)) => WarningThreshold::FractionOfBudget(fraction),
            (Some(_), Some(_)) => {
                return Err(ConfigurationError::invalid_warning(
                    "set only one of minutes_before_deadline and fraction_of_budget",
                ))
            }
            (None, None) => {
                return Err(ConfigurationError::invalid_warning(
                    "one of minutes_before_deadline or fraction_of_budget is required",
                ))
            }
        };

        let mut policy = SlaPolicy::new(warning);
        for priority in Priority::ALL {
            if let Some(minutes) = self.budget_minutes.get(priority) {
                let budget =
                    Duration::try_minutes(minutes).ok_or(ConfigurationError::BudgetOutOfRange {
                        priority,
                        seconds: minutes.saturating_mul(60),
                        max: MAX_BUDGET_SECS,
                    })?;
                policy = policy.with_budget(priority, budget);
            }
            if let Some(minutes) = self.warning.per_priority.get(priority) {
                let window = Duration::try_minutes(minutes).ok_or_else(|| {
                    ConfigurationError::invalid_warning(format!(
                        "warning window for {priority} is out of range (got {minutes} minutes)"
                    ))
                })?;
                policy = policy.with_warning_override(priority, window);
            }
        }
        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[sla.budget_minutes]
normal = 1440
urgent = 360
critical = 120

[sla.warning]
minutes_before_deadline = 60

[sla.warning.per_priority]
critical = 15

[feedback]
base_url = "https://desk.example.com/feedback"
"#;

    #[test]
    fn test_parse_sample() {
        let config = DeskConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(
            config.sla.budget_for(Priority::Critical).unwrap(),
            Duration::hours(2)
        );
        assert_eq!(
            config.sla.warning_threshold_for(Priority::Critical).unwrap(),
            Duration::minutes(15)
        );
        assert_eq!(
            config.sla.warning_threshold_for(Priority::Normal).unwrap(),
            Duration::hours(1)
        );
    }

    #[test]
    fn test_missing_priority_is_configuration_error() {
        let text = SAMPLE.replace("critical = 120\n", "");
        let err = DeskConfig::from_toml_str(&text).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::MissingBudget {
                priority: Priority::Critical
            }
        );
    }

    #[test]
    fn test_inverted_budgets_rejected() {
        let text = SAMPLE.replace("urgent = 360", "urgent = 2000");
        assert!(matches!(
            DeskConfig::from_toml_str(&text).unwrap_err(),
            ConfigurationError::BudgetOrder { .. }
        ));
    }

    #[test]
    fn test_both_warning_forms_rejected() {
        let text = SAMPLE.replace(
            "minutes_before_deadline = 60",
            "minutes_before_deadline = 60\nfraction_of_budget = 0.1",
        );
        assert!(matches!(
            DeskConfig::from_toml_str(&text).unwrap_err(),
            ConfigurationError::InvalidWarning { .. }
        ));
    }

    #[test]
    fn test_fraction_warning_form() {
        let text = SAMPLE
            .replace("minutes_before_deadline = 60", "fraction_of_budget = 0.1")
            .replace("[sla.warning.per_priority]\ncritical = 15\n", "");
        let config = DeskConfig::from_toml_str(&text).unwrap();
        assert_eq!(
            config.sla.warning_threshold_for(Priority::Urgent).unwrap(),
            Duration::minutes(36)
        );
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let text = format!("{SAMPLE}\n[extra]\nkey = 1\n");
        assert!(matches!(
            DeskConfig::from_toml_str(&text).unwrap_err(),
            ConfigurationError::Parse { .. }
        ));
    }

    #[test]
    fn test_oversized_warning_minutes_rejected() {
        let text = SAMPLE.replace(
            "minutes_before_deadline = 60",
            "minutes_before_deadline = 9223372036854775807",
        );
        assert!(matches!(
            DeskConfig::from_toml_str(&text).unwrap_err(),
            ConfigurationError::InvalidWarning { .. }
        ));

        let text = SAMPLE.replace("critical = 15", "critical = 9223372036854775807");
        assert!(matches!(
            DeskConfig::from_toml_str(&text).unwrap_err(),
            ConfigurationError::InvalidWarning { .. }
        ));
    }

    #[test]
    fn test_oversized_budget_rejected() {
        // Representable, but far beyond any plausible SLA.
        let text = SAMPLE.replace("normal = 1440", "normal = 150000000000000");
        assert!(matches!(
            DeskConfig::from_toml_str(&text).unwrap_err(),
            ConfigurationError::BudgetOutOfRange {
                priority: Priority::Normal,
                ..
            }
        ));

        // Not even representable as a duration.
        let text = SAMPLE.replace("normal = 1440", "normal = 9223372036854775807");
        assert!(matches!(
            DeskConfig::from_toml_str(&text).unwrap_err(),
            ConfigurationError::BudgetOutOfRange {
                priority: Priority::Normal,
                ..
            }
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = DeskConfig::from_file(file.path()).unwrap();
        assert!(config.sla.validate().is_ok());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = DeskConfig::from_file(Path::new("/nonexistent/sla-desk.toml")).unwrap_err();
        assert!(matches!(err, ConfigurationError::Io { .. }));
    }

    #[test]
    fn test_resolve_path_prefers_explicit() {
        let path = DeskConfig::resolve_path(Some(Path::new("/etc/desk.toml")));
        assert_eq!(path, PathBuf::from("/etc/desk.toml"));
    }
}
