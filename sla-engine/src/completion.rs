//! Completion Finalizer: evidence checks and one-time feedback links.
//!
//! Completion has preconditions a plain transition does not: resolution
//! notes and before/after evidence must be present, each reported as its
//! own field error. The status flip itself is delegated to the state
//! machine, so a ticket that is not IN_PROGRESS is rejected there.
//!
//! A feedback link is minted exactly once. Finalizing an already-completed
//! ticket returns [`EngineError::AlreadyCompleted`] carrying the original
//! link, so links already shared with a customer stay valid.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::policy::SlaPolicy;
use crate::sla::classifier::seal_outcome;
use crate::ticket::state_machine;
use crate::ticket::{EvidenceRef, FeedbackLink, Resolution, ServiceTicket, TicketStatus};

/// What the engineer submits to close a ticket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub resolution_notes: String,
    #[serde(default)]
    pub parts_replaced: Option<String>,
    #[serde(default)]
    pub evidence_before: Option<EvidenceRef>,
    #[serde(default)]
    pub evidence_after: Option<EvidenceRef>,
}

impl CompletionRequest {
    pub fn new(resolution_notes: impl Into<String>) -> Self {
        Self {
            resolution_notes: resolution_notes.into(),
            ..Default::default()
        }
    }

    pub fn parts(mut self, parts: impl Into<String>) -> Self {
        self.parts_replaced = Some(parts.into());
        self
    }

    pub fn evidence_before(mut self, evidence: impl Into<EvidenceRef>) -> Self {
        self.evidence_before = Some(evidence.into());
        self
    }

    pub fn evidence_after(mut self, evidence: impl Into<EvidenceRef>) -> Self {
        self.evidence_after = Some(evidence.into());
        self
    }

    /// Check every precondition, collecting one error per failing field.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut fields = Vec::new();

        if self.resolution_notes.trim().is_empty() {
            fields.push(FieldError::new(
                CompletionField::ResolutionNotes,
                "resolution notes are required",
            ));
        }
        if present(&self.evidence_before).is_none() {
            fields.push(FieldError::new(
                CompletionField::EvidenceBefore,
                "before-work evidence is missing",
            ));
        }
        if present(&self.evidence_after).is_none() {
            fields.push(FieldError::new(
                CompletionField::EvidenceAfter,
                "after-work evidence is missing",
            ));
        }

        if fields.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors { fields })
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// A completion form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionField {
    ResolutionNotes,
    EvidenceBefore,
    EvidenceAfter,
}

impl std::fmt::Display for CompletionField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ResolutionNotes => write!(f, "resolution_notes"),
            Self::EvidenceBefore => write!(f, "evidence_before"),
            Self::EvidenceAfter => write!(f, "evidence_after"),
        }
    }
}

/// One failed precondition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: CompletionField,
    pub message: String,
}

impl FieldError {
    pub fn new(field: CompletionField, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// All failed completion preconditions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("cannot complete: {}", summarize(.fields))]
pub struct ValidationErrors {
    pub fields: Vec<FieldError>,
}

impl ValidationErrors {
    /// Whether `field` failed.
    pub fn contains(&self, field: CompletionField) -> bool {
        self.fields.iter().any(|f| f.field == field)
    }
}

fn summarize(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| f.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Mints feedback tokens and URLs.
#[derive(Debug, Clone)]
pub struct FeedbackLinkMinter {
    base_url: String,
}

impl FeedbackLinkMinter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim().trim_end_matches('/').to_string(),
        }
    }

    /// Fresh link with a random 128-bit token.
    pub fn mint(&self) -> FeedbackLink {
        let token = Uuid::new_v4().simple().to_string();
        FeedbackLink {
            url: format!("{}/{}", self.base_url, token),
            token,
        }
    }
}

/// Validates completion input and performs the IN_PROGRESS → COMPLETED step.
#[derive(Debug, Clone)]
pub struct CompletionFinalizer {
    minter: FeedbackLinkMinter,
}

impl CompletionFinalizer {
    pub fn new(minter: FeedbackLinkMinter) -> Self {
        Self { minter }
    }

    /// Complete `ticket` at `at`, returning the closed ticket. The input is
    /// never modified.
    pub fn finalize(
        &self,
        ticket: &ServiceTicket,
        request: &CompletionRequest,
        policy: &SlaPolicy,
        at: DateTime<Utc>,
    ) -> EngineResult<ServiceTicket> {
        if ticket.status == TicketStatus::Completed {
            return Err(EngineError::AlreadyCompleted {
                ticket_id: ticket.id.clone(),
                feedback: ticket.feedback.clone(),
            });
        }

        if let Err(errors) = request.validate() {
            warn!(
                ticket_id = %ticket.id,
                fields = ?errors.fields.iter().map(|f| f.field).collect::<Vec<_>>(),
                "Completion rejected"
            );
            return Err(errors.into());
        }

        let mut next = state_machine::apply(ticket, TicketStatus::Completed, at, None)?;

        next.resolution = Some(Resolution {
            notes: request.resolution_notes.trim().to_string(),
            parts_replaced: present(&request.parts_replaced).map(String::from),
            evidence_before: present(&request.evidence_before)
                .map(String::from)
                .unwrap_or_default(),
            evidence_after: present(&request.evidence_after)
                .map(String::from)
                .unwrap_or_default(),
        });
        seal_outcome(&mut next, policy, at)?;
        let link = self.minter.mint();
        info!(ticket_id = %next.id, feedback_url = %link.url, "Ticket completed");
        next.feedback = Some(link);

        Ok(next)
    }
}
