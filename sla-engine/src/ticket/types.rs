//! Service ticket aggregate and its value types.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sla::UrgencySnapshot;

/// Unique identifier for tickets
pub type TicketId = String;

/// Identifier of a field service engineer
pub type EngineerId = String;

/// Opaque handle to an uploaded piece of evidence (photo, scan, ...)
pub type EvidenceRef = String;

/// Ticket priority. Determines the SLA budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Normal,
    Urgent,
    Critical,
}

impl Priority {
    /// All priorities, least to most severe.
    pub const ALL: [Priority; 3] = [Priority::Normal, Priority::Urgent, Priority::Critical];
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "NORMAL"),
            Self::Urgent => write!(f, "URGENT"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "urgent" => Ok(Self::Urgent),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown priority '{other}'")),
        }
    }
}

/// Operational status of a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    /// Logged, nobody assigned yet.
    New,
    /// Engineer assigned.
    Assigned,
    /// Engineer travelling to site.
    OnTheWay,
    /// Work under way on site.
    InProgress,
    /// Work suspended; SLA clock frozen.
    OnHold,
    /// Finished with evidence; terminal.
    Completed,
    /// Withdrawn; terminal.
    Cancelled,
}

impl TicketStatus {
    /// Whether this is a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f, "NEW"),
            Self::Assigned => write!(f, "ASSIGNED"),
            Self::OnTheWay => write!(f, "ON_THE_WAY"),
            Self::InProgress => write!(f, "IN_PROGRESS"),
            Self::OnHold => write!(f, "ON_HOLD"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// A span during which the ticket's SLA clock was frozen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldInterval {
    pub started_at: DateTime<Utc>,
    /// `None` while the hold is still open.
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl HoldInterval {
    pub(crate) fn open(started_at: DateTime<Utc>, reason: Option<String>) -> Self {
        Self {
            started_at,
            ended_at: None,
            reason,
        }
    }

    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// A recorded status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub from: TicketStatus,
    pub to: TicketStatus,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// A recorded priority change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityChange {
    pub from: Priority,
    pub to: Priority,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// What the engineer reported when closing the ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parts_replaced: Option<String>,
    pub evidence_before: EvidenceRef,
    pub evidence_after: EvidenceRef,
}

/// Customer feedback reference minted at completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackLink {
    pub token: String,
    pub url: String,
}

/// The ticket aggregate.
///
/// Lifecycle fields are crate-private: only the state machine, the
/// completion finalizer and the desk service write them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceTicket {
    pub id: TicketId,
    /// Human-readable number, immutable once assigned.
    pub ticket_no: String,
    pub(crate) priority: Priority,
    pub(crate) status: TicketStatus,
    pub(crate) created_at: DateTime<Utc>,
    #[serde(default)]
    pub(crate) assigned_engineer_id: Option<EngineerId>,
    #[serde(default)]
    pub(crate) hold_intervals: Vec<HoldInterval>,
    /// Status to return to on resume; set only while ON_HOLD.
    #[serde(default)]
    pub(crate) pre_hold_status: Option<TicketStatus>,
    #[serde(default)]
    pub(crate) completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub(crate) cancelled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub(crate) cancel_reason: Option<String>,
    #[serde(default)]
    pub(crate) resolution: Option<Resolution>,
    #[serde(default)]
    pub(crate) feedback: Option<FeedbackLink>,
    /// Urgency frozen at close; answers "did we meet SLA".
    #[serde(default)]
    pub(crate) sla_outcome: Option<UrgencySnapshot>,
    #[serde(default)]
    pub(crate) breach_notified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub(crate) transitions: Vec<StatusTransition>,
    #[serde(default)]
    pub(crate) priority_changes: Vec<PriorityChange>,
}

impl ServiceTicket {
    /// Create a ticket in NEW.
    pub fn new(
        id: impl Into<TicketId>,
        ticket_no: impl Into<String>,
        priority: Priority,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            ticket_no: ticket_no.into(),
            priority,
            status: TicketStatus::New,
            created_at,
            assigned_engineer_id: None,
            hold_intervals: Vec::new(),
            pre_hold_status: None,
            completed_at: None,
            cancelled_at: None,
            cancel_reason: None,
            resolution: None,
            feedback: None,
            sla_outcome: None,
            breach_notified_at: None,
            transitions: Vec::new(),
            priority_changes: Vec::new(),
        }
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn status(&self) -> TicketStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn assigned_engineer_id(&self) -> Option<&str> {
        self.assigned_engineer_id.as_deref()
    }

    pub fn hold_intervals(&self) -> &[HoldInterval] {
        &self.hold_intervals
    }

    pub fn pre_hold_status(&self) -> Option<TicketStatus> {
        self.pre_hold_status
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    pub fn resolution(&self) -> Option<&Resolution> {
        self.resolution.as_ref()
    }

    pub fn feedback(&self) -> Option<&FeedbackLink> {
        self.feedback.as_ref()
    }

    pub fn sla_outcome(&self) -> Option<&UrgencySnapshot> {
        self.sla_outcome.as_ref()
    }

    pub fn breach_notified_at(&self) -> Option<DateTime<Utc>> {
        self.breach_notified_at
    }

    pub fn transitions(&self) -> &[StatusTransition] {
        &self.transitions
    }

    pub fn priority_changes(&self) -> &[PriorityChange] {
        &self.priority_changes
    }

    /// Whether the ticket is COMPLETED or CANCELLED.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Completion or cancellation instant, whichever closed the ticket.
    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at.or(self.cancelled_at)
    }

    /// The hold interval that is still open, if any.
    pub fn open_hold(&self) -> Option<&HoldInterval> {
        self.hold_intervals.last().filter(|h| h.is_open())
    }

    /// Latest instant recorded on the ticket. New events may not precede it.
    pub fn last_event_at(&self) -> DateTime<Utc> {
        let transition = self.transitions.last().map(|t| t.at);
        let reprioritized = self.priority_changes.last().map(|c| c.at);
        [Some(self.created_at), transition, reprioritized]
            .into_iter()
            .flatten()
            .max()
            .unwrap_or(self.created_at)
    }

    /// Compact status line.
    pub fn status_line(&self) -> String {
        format!(
            "[{}] {} {} | engineer={} | holds={}",
            self.status,
            self.ticket_no,
            self.priority,
            self.assigned_engineer_id.as_deref().unwrap_or("-"),
            self.hold_intervals.len(),
        )
    }
}
