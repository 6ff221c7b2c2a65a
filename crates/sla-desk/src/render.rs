//! Plain-text rendering for terminal output.

use std::fmt::Write;

use sla_engine::{
    LifecycleEvent, Priority, SlaPolicy, TicketUrgency, UrgencyLevel, UrgencySummary,
    WarningThreshold,
};

use crate::replay::{StepReport, StepResult};

/// `1h50m`, `-0h05m`, `26h00m`.
pub fn format_secs(secs: i64) -> String {
    let sign = if secs < 0 { "-" } else { "" };
    let abs = secs.unsigned_abs();
    format!("{}{}h{:02}m", sign, abs / 3600, (abs % 3600) / 60)
}

/// Budget and warning window per priority.
pub fn policy_table(policy: &SlaPolicy) -> anyhow::Result<String> {
    let mut out = String::new();
    writeln!(out, "{:<10} {:>8} {:>8}", "PRIORITY", "BUDGET", "WARNING")?;
    for priority in Priority::ALL.iter().rev() {
        writeln!(
            out,
            "{:<10} {:>8} {:>8}",
            priority.to_string(),
            format_secs(policy.budget_secs_for(*priority)?),
            format_secs(policy.warning_secs_for(*priority)?),
        )?;
    }
    match policy.warning() {
        WarningThreshold::BeforeDeadline { seconds } => {
            writeln!(out, "default warning: last {}", format_secs(seconds))?
        }
        WarningThreshold::FractionOfBudget(fraction) => {
            writeln!(out, "default warning: last {:.0}% of budget", fraction * 100.0)?
        }
    }
    Ok(out)
}

fn level_marker(level: UrgencyLevel) -> &'static str {
    match level {
        UrgencyLevel::OnTrack => " ",
        UrgencyLevel::AtRisk => "!",
        UrgencyLevel::Breached => "X",
        UrgencyLevel::Paused => "=",
    }
}

/// Dashboard rows, most urgent first.
pub fn urgency_rows(rows: &[TicketUrgency]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "  {:<18} {:<9} {:<12} {:<9} {:>9} {:<10} DEADLINE",
        "TICKET", "PRIORITY", "STATUS", "LEVEL", "REMAINING", "ENGINEER"
    );
    for row in rows {
        let deadline = row
            .urgency
            .deadline_at
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".into());
        let _ = writeln!(
            out,
            "{} {:<18} {:<9} {:<12} {:<9} {:>9} {:<10} {}",
            level_marker(row.urgency.level),
            row.ticket_no,
            row.priority.to_string(),
            row.status.to_string(),
            row.urgency.level.to_string(),
            format_secs(row.urgency.remaining_secs),
            row.assigned_engineer_id.as_deref().unwrap_or("-"),
            deadline,
        );
    }
    out
}

/// One-line tile counts.
pub fn summary_line(summary: &UrgencySummary) -> String {
    format!(
        "on_track={} at_risk={} breached={} paused={} total={}",
        summary.on_track, summary.at_risk, summary.breached, summary.paused, summary.total
    )
}

fn event_line(event: &LifecycleEvent) -> String {
    match event {
        LifecycleEvent::TicketBreached {
            ticket_no,
            breached_at,
            ..
        } => format!("event ticket_breached {} at {}", ticket_no, breached_at.to_rfc3339()),
        LifecycleEvent::TicketCompleted {
            ticket_no,
            feedback_url,
            ..
        } => format!("event ticket_completed {} feedback={}", ticket_no, feedback_url),
    }
}

/// A replay step and the events it produced.
pub fn step_lines(report: &StepReport) -> String {
    let mut out = String::new();
    let ticket = report.ticket.as_deref().unwrap_or("-");
    let head = format!(
        "#{:<3} {} {:<13} {:<6}",
        report.index,
        report.at.format("%m-%d %H:%M"),
        report.action,
        ticket
    );
    let body = match &report.result {
        StepResult::Applied {
            ticket_no,
            status,
            urgency,
        } => format!(
            "ok   {} {} {} remaining={}",
            ticket_no,
            status,
            urgency.level,
            format_secs(urgency.remaining_secs)
        ),
        StepResult::Rejected { kind, message } => format!("FAIL {}: {}", kind, message),
        StepResult::Swept { breaches } => format!("ok   {} new breach(es)", breaches),
    };
    let _ = writeln!(out, "{} {}", head, body);
    for event in &report.events {
        let _ = writeln!(out, "      {}", event_line(event));
    }
    out
}
