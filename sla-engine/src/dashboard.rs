//! Read-side views for dashboards: ranked urgency rows and summary tiles.
//!
//! Everything here is computed from stored tickets, the current policy and
//! one instant; nothing is written back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::policy::SlaPolicy;
use crate::sla::{classify, UrgencyLevel, UrgencySnapshot};
use crate::ticket::{EngineerId, Priority, ServiceTicket, TicketId, TicketStatus};

/// Which tickets a dashboard wants. An empty filter selects every open
/// ticket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrgencyFilter {
    #[serde(default)]
    pub levels: Option<Vec<UrgencyLevel>>,
    #[serde(default)]
    pub priorities: Option<Vec<Priority>>,
    #[serde(default)]
    pub engineer_id: Option<EngineerId>,
    /// Include COMPLETED and CANCELLED tickets.
    #[serde(default)]
    pub include_closed: bool,
}

impl UrgencyFilter {
    /// Create a new empty filter (matches all open tickets)
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by urgency levels
    pub fn levels(mut self, levels: Vec<UrgencyLevel>) -> Self {
        self.levels = Some(levels);
        self
    }

    /// Filter by priorities
    pub fn priorities(mut self, priorities: Vec<Priority>) -> Self {
        self.priorities = Some(priorities);
        self
    }

    /// Only tickets assigned to `engineer_id`
    pub fn engineer(mut self, engineer_id: &str) -> Self {
        self.engineer_id = Some(engineer_id.to_string());
        self
    }

    pub fn include_closed(mut self, include: bool) -> Self {
        self.include_closed = include;
        self
    }

    fn admits_ticket(&self, ticket: &ServiceTicket) -> bool {
        if !self.include_closed && ticket.is_terminal() {
            return false;
        }
        if let Some(ref priorities) = self.priorities {
            if !priorities.contains(&ticket.priority()) {
                return false;
            }
        }
        if let Some(ref engineer) = self.engineer_id {
            if ticket.assigned_engineer_id() != Some(engineer.as_str()) {
                return false;
            }
        }
        true
    }

    fn admits_level(&self, level: UrgencyLevel) -> bool {
        self.levels
            .as_ref()
            .map_or(true, |levels| levels.contains(&level))
    }
}

/// One dashboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketUrgency {
    pub ticket_id: TicketId,
    pub ticket_no: String,
    pub priority: Priority,
    pub status: TicketStatus,
    pub assigned_engineer_id: Option<EngineerId>,
    pub urgency: UrgencySnapshot,
}

/// Tile counts per urgency level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrgencySummary {
    pub on_track: usize,
    pub at_risk: usize,
    pub breached: usize,
    pub paused: usize,
    pub total: usize,
}

impl UrgencySummary {
    pub fn count(&self, level: UrgencyLevel) -> usize {
        match level {
            UrgencyLevel::OnTrack => self.on_track,
            UrgencyLevel::AtRisk => self.at_risk,
            UrgencyLevel::Breached => self.breached,
            UrgencyLevel::Paused => self.paused,
        }
    }

    fn record(&mut self, level: UrgencyLevel) {
        match level {
            UrgencyLevel::OnTrack => self.on_track += 1,
            UrgencyLevel::AtRisk => self.at_risk += 1,
            UrgencyLevel::Breached => self.breached += 1,
            UrgencyLevel::Paused => self.paused += 1,
        }
        self.total += 1;
    }
}

impl<'a> FromIterator<&'a TicketUrgency> for UrgencySummary {
    fn from_iter<I: IntoIterator<Item = &'a TicketUrgency>>(iter: I) -> Self {
        let mut summary = Self::default();
        for row in iter {
            summary.record(row.urgency.level);
        }
        summary
    }
}

/// Classify and rank `tickets` at `now`, most urgent first.
///
/// Rows are ordered by remaining seconds ascending, so the most overdue
/// ticket leads; ties fall back to ticket number.
pub fn rank<'a>(
    tickets: impl IntoIterator<Item = &'a ServiceTicket>,
    policy: &SlaPolicy,
    now: DateTime<Utc>,
    filter: &UrgencyFilter,
) -> Result<Vec<TicketUrgency>, ConfigurationError> {
    let mut rows = Vec::new();
    for ticket in tickets {
        if !filter.admits_ticket(ticket) {
            continue;
        }
        let urgency = classify(ticket, policy, now)?;
        if !filter.admits_level(urgency.level) {
            continue;
        }
        rows.push(TicketUrgency {
            ticket_id: ticket.id.clone(),
            ticket_no: ticket.ticket_no.clone(),
            priority: ticket.priority(),
            status: ticket.status(),
            assigned_engineer_id: ticket.assigned_engineer_id().map(String::from),
            urgency,
        });
    }

    rows.sort_by(|a, b| {
        a.urgency
            .remaining_secs
            .cmp(&b.urgency.remaining_secs)
            .then_with(|| a.ticket_no.cmp(&b.ticket_no))
    });
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::state_machine;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn at(minutes: i64) -> DateTime<Utc> {
        t0() + Duration::minutes(minutes)
    }

    fn assigned(id: &str, priority: Priority, engineer: &str) -> ServiceTicket {
        let ticket = ServiceTicket::new(id, format!("SR-{id}"), priority, t0());
        state_machine::assign(&ticket, engineer, t0()).unwrap()
    }

    fn board() -> Vec<ServiceTicket> {
        let held = state_machine::transition(
            &assigned("c", Priority::Urgent, "eng-2"),
            TicketStatus::OnHold,
            at(10),
            Some("parts"),
        )
        .unwrap();
        let cancelled = state_machine::transition(
            &assigned("d", Priority::Normal, "eng-1"),
            TicketStatus::Cancelled,
            at(5),
            None,
        )
        .unwrap();
        vec![
            assigned("a", Priority::Normal, "eng-1"),
            assigned("b", Priority::Critical, "eng-1"),
            held,
            cancelled,
        ]
    }

    #[test]
    fn test_rank_orders_most_urgent_first() {
        let tickets = board();
        let rows = rank(&tickets, &SlaPolicy::standard(), at(130), &UrgencyFilter::new()).unwrap();
        let order: Vec<&str> = rows.iter().map(|r| r.ticket_id.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
        assert_eq!(rows[0].urgency.level, UrgencyLevel::Breached);
    }

    #[test]
    fn test_filters_compose() {
        let tickets = board();
        let policy = SlaPolicy::standard();

        let mine = rank(&tickets, &policy, at(30), &UrgencyFilter::new().engineer("eng-1")).unwrap();
        assert_eq!(mine.len(), 2);

        let paused = UrgencyFilter::new().levels(vec![UrgencyLevel::Paused]);
        let rows = rank(&tickets, &policy, at(30), &paused).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ticket_id, "c");

        let with_closed = UrgencyFilter::new()
            .priorities(vec![Priority::Normal])
            .include_closed(true);
        assert_eq!(rank(&tickets, &policy, at(30), &with_closed).unwrap().len(), 2);
    }

    #[test]
    fn test_summary_counts() {
        let tickets = board();
        let rows = rank(&tickets, &SlaPolicy::standard(), at(130), &UrgencyFilter::new()).unwrap();
        let summary: UrgencySummary = rows.iter().collect();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.breached, 1);
        assert_eq!(summary.paused, 1);
        assert_eq!(summary.on_track, 1);
        assert_eq!(summary.count(UrgencyLevel::AtRisk), 0);
    }
}
