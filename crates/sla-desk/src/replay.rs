//! Scripted replays against an in-memory desk with a manual clock.
//!
//! A script is JSON:
//!
//! ```json
//! {
//!   "start": "2026-03-02T09:00:00Z",
//!   "steps": [
//!     { "ticket": "a", "action": "create", "priority": "CRITICAL" },
//!     { "ticket": "a", "action": "assign", "engineer_id": "eng-7" },
//!     { "after_minutes": 125, "action": "sweep" }
//!   ]
//! }
//! ```
//!
//! `after_minutes` advances the clock before the step runs. Engine
//! rejections are part of the report; only malformed scripts abort.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sla_engine::{
    CompletionRequest, DeskConfig, EngineResult, ErrorKind, EventBus, FeedbackLinkMinter,
    InMemoryTicketStore, LifecycleEvent, LifecycleIntent, LifecycleOutcome, ManualClock,
    NewTicket, PolicyHandle, Priority, TicketDesk, TicketId, TicketStatus, UrgencySnapshot,
};
use tracing::{debug, info};

/// A full replay script.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplayScript {
    pub start: DateTime<Utc>,
    pub steps: Vec<ReplayStep>,
}

impl ReplayScript {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read replay script {}", path.display()))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("failed to parse replay script")
    }
}

/// One timed step.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayStep {
    /// Minutes to advance the clock before this step.
    #[serde(default)]
    pub after_minutes: i64,
    /// Script-local alias of the ticket the step acts on.
    #[serde(default)]
    pub ticket: Option<String>,
    #[serde(flatten)]
    pub action: ReplayAction,
}

/// What a step does.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReplayAction {
    Create {
        priority: Priority,
        #[serde(default)]
        ticket_no: Option<String>,
    },
    Assign {
        engineer_id: String,
    },
    StartTravel,
    StartWork,
    Hold {
        reason: String,
    },
    Resume,
    Complete(CompletionRequest),
    Cancel {
        reason: String,
    },
    Reprioritize {
        priority: Priority,
        #[serde(default)]
        reason: Option<String>,
    },
    Sweep,
}

impl ReplayAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Sweep => "sweep",
            other => other.intent().map(|i| i.name()).unwrap_or("unknown"),
        }
    }

    /// The lifecycle intent this step maps to, if it is one.
    fn intent(&self) -> Option<LifecycleIntent> {
        Some(match self {
            Self::Assign { engineer_id } => LifecycleIntent::Assign {
                engineer_id: engineer_id.clone(),
            },
            Self::StartTravel => LifecycleIntent::StartTravel,
            Self::StartWork => LifecycleIntent::StartWork,
            Self::Hold { reason } => LifecycleIntent::Hold {
                reason: reason.clone(),
            },
            Self::Resume => LifecycleIntent::Resume,
            Self::Complete(request) => LifecycleIntent::Complete(request.clone()),
            Self::Cancel { reason } => LifecycleIntent::Cancel {
                reason: reason.clone(),
            },
            Self::Reprioritize { priority, reason } => LifecycleIntent::Reprioritize {
                priority: *priority,
                reason: reason.clone(),
            },
            Self::Create { .. } | Self::Sweep => return None,
        })
    }
}

/// Result of one step.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StepResult {
    Applied {
        ticket_no: String,
        status: TicketStatus,
        urgency: UrgencySnapshot,
    },
    Rejected {
        kind: ErrorKind,
        message: String,
    },
    Swept {
        breaches: usize,
    },
}

/// What happened at one step, including events published during it.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub at: DateTime<Utc>,
    pub ticket: Option<String>,
    pub action: &'static str,
    pub result: StepResult,
    pub events: Vec<LifecycleEvent>,
}

/// Run `script` against a fresh in-memory desk configured by `config`.
pub fn run(script: &ReplayScript, config: &DeskConfig) -> Result<Vec<StepReport>> {
    let clock = ManualClock::new(script.start);
    let desk = TicketDesk::new(
        Arc::new(InMemoryTicketStore::new()),
        Arc::new(clock.clone()),
        PolicyHandle::new(config.sla.clone()).context("invalid SLA policy")?,
        EventBus::new().shared(),
        FeedbackLinkMinter::new(config.feedback.base_url.clone()),
    );
    let mut events = desk.events().subscribe();
    let mut aliases: HashMap<String, TicketId> = HashMap::new();
    let mut reports = Vec::with_capacity(script.steps.len());

    info!(steps = script.steps.len(), start = %script.start, "Replay starting");

    for (index, step) in script.steps.iter().enumerate() {
        if step.after_minutes != 0 {
            clock.advance(Duration::minutes(step.after_minutes));
        }

        let result = match &step.action {
            ReplayAction::Create {
                priority,
                ticket_no,
            } => {
                let mut request = NewTicket::new(*priority);
                if let Some(no) = ticket_no {
                    request = request.with_ticket_no(no.clone());
                }
                let outcome = desk.create_ticket(request);
                if let (Ok(created), Some(alias)) = (&outcome, &step.ticket) {
                    if aliases
                        .insert(alias.clone(), created.ticket.id.clone())
                        .is_some()
                    {
                        bail!("step {index}: ticket alias '{alias}' created twice");
                    }
                }
                outcome_result(outcome)
            }
            ReplayAction::Sweep => match desk.sweep_breaches() {
                Ok(published) => StepResult::Swept {
                    breaches: published.len(),
                },
                Err(e) => rejected(&e),
            },
            action => {
                let alias = step
                    .ticket
                    .as_deref()
                    .with_context(|| format!("step {index}: '{}' needs a ticket", action.name()))?;
                let ticket_id = aliases
                    .get(alias)
                    .with_context(|| format!("step {index}: unknown ticket alias '{alias}'"))?;
                let Some(intent) = action.intent() else {
                    bail!("step {index}: '{}' is not a lifecycle action", action.name());
                };
                outcome_result(desk.apply(ticket_id, intent))
            }
        };

        let mut published = Vec::new();
        while let Ok(event) = events.try_recv() {
            published.push(event);
        }

        debug!(index, action = step.action.name(), "Replay step done");
        reports.push(StepReport {
            index,
            at: desk.now(),
            ticket: step.ticket.clone(),
            action: step.action.name(),
            result,
            events: published,
        });
    }

    Ok(reports)
}

fn outcome_result(outcome: EngineResult<LifecycleOutcome>) -> StepResult {
    match outcome {
        Ok(outcome) => StepResult::Applied {
            ticket_no: outcome.ticket.ticket_no.clone(),
            status: outcome.ticket.status(),
            urgency: outcome.urgency,
        },
        Err(e) => rejected(&e),
    }
}

fn rejected(e: &sla_engine::EngineError) -> StepResult {
    StepResult::Rejected {
        kind: e.kind(),
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sla_engine::{SlaPolicy, UrgencyLevel};

    fn config() -> DeskConfig {
        DeskConfig {
            sla: SlaPolicy::standard()
                .with_warning_override(Priority::Critical, chrono::Duration::minutes(15)),
            feedback: sla_engine::FeedbackConfig {
                base_url: "https://desk.example.com/feedback".into(),
            },
        }
    }

    const SCRIPT: &str = r#"{
        "start": "2026-03-02T09:00:00Z",
        "steps": [
            { "ticket": "a", "action": "create", "priority": "CRITICAL" },
            { "ticket": "a", "action": "assign", "engineer_id": "eng-7" },
            { "ticket": "a", "action": "start_work" },
            { "after_minutes": 110, "ticket": "a", "action": "start_travel" },
            { "after_minutes": 15, "action": "sweep" },
            { "after_minutes": 5, "ticket": "a", "action": "start_work" },
            { "ticket": "a", "action": "complete", "resolution_notes": "done",
              "evidence_before": "b", "evidence_after": "" }
        ]
    }"#;

    #[test]
    fn test_parse_script() {
        let script = ReplayScript::from_json(SCRIPT).unwrap();
        assert_eq!(script.steps.len(), 7);
        assert_eq!(
            script.steps[0].action,
            ReplayAction::Create {
                priority: Priority::Critical,
                ticket_no: None
            }
        );
        assert_eq!(script.steps[3].after_minutes, 110);
        assert!(matches!(script.steps[6].action, ReplayAction::Complete(_)));
    }

    #[test]
    fn test_run_reports_each_step() {
        let script = ReplayScript::from_json(SCRIPT).unwrap();
        let reports = run(&script, &config()).unwrap();
        assert_eq!(reports.len(), 7);

        // start_work straight from ASSIGNED is illegal.
        assert!(matches!(
            reports[2].result,
            StepResult::Rejected {
                kind: ErrorKind::IllegalTransition,
                ..
            }
        ));

        match &reports[3].result {
            StepResult::Applied { urgency, .. } => assert_eq!(urgency.level, UrgencyLevel::AtRisk),
            other => panic!("unexpected {other:?}"),
        }

        // Breach found by the sweep, published once.
        assert!(matches!(reports[4].result, StepResult::Swept { breaches: 1 }));
        assert_eq!(reports[4].events.len(), 1);
        assert!(reports[5].events.is_empty());

        assert!(matches!(
            reports[6].result,
            StepResult::Rejected {
                kind: ErrorKind::Validation,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_alias_aborts() {
        let script = ReplayScript::from_json(
            r#"{"start":"2026-03-02T09:00:00Z","steps":[{"ticket":"x","action":"resume"}]}"#,
        )
        .unwrap();
        let err = run(&script, &config()).unwrap_err();
        assert!(err.to_string().contains("unknown ticket alias"));
    }
}
