//! Plain-text rendering for everything the CLI prints about tickets.

use std::fmt::Write;

use crate::types::{AcceptanceCriteria, SprintReport, SprintRow, Ticket, TrackerField};
use crate::utils::format_number;

pub const SPRINT_STATS_HEADER: &str = "--- Story Points by Sprint ---";

/// `8 SP` when everything is closed, `3 / 8 SP` otherwise.
pub fn format_story_points(closed: f64, total: f64) -> String {
    if closed == total {
        format!("{} SP", format_number(total))
    } else {
        format!("{} / {} SP", format_number(closed), format_number(total))
    }
}

fn sprint_line(row: &SprintRow) -> String {
    format!("{}: {}", row.name, format_story_points(row.closed, row.total))
}

pub fn render_sprint_stats(report: &SprintReport) -> String {
    let mut lines = vec![SPRINT_STATS_HEADER.to_string()];
    lines.extend(report.rows.iter().map(sprint_line));
    lines.extend(report.average_excl_last.iter().map(sprint_line));
    lines.extend(report.average.iter().map(sprint_line));
    lines.join("\n")
}

/// Render a titled ticket list sorted by key, or nothing for an empty list.
pub fn render_tickets(title: &str, tickets: &[Ticket], base_url: &str) -> Option<String> {
    if tickets.is_empty() {
        return None;
    }

    let mut sorted: Vec<&Ticket> = tickets.iter().collect();
    sorted.sort_by(|a, b| a.key.cmp(&b.key));

    let base_url = base_url.trim_end_matches('/');
    let mut lines = vec![title.to_string()];
    for ticket in sorted {
        let points = if ticket.story_points != 0.0 {
            format!(" ({} SP)", format_number(ticket.story_points))
        } else {
            String::new()
        };
        lines.push(format!(
            "{}: {} [{}]{} - {}/browse/{}",
            ticket.key, ticket.summary, ticket.status, points, base_url, ticket.key
        ));
    }
    Some(lines.join("\n"))
}

/// Render a ticket's description and acceptance criteria as markdown.
pub fn render_story(ticket: &Ticket) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}: {}\n", ticket.key, ticket.summary);

    if let Some(description) = ticket.description.as_deref().filter(|d| !d.is_empty()) {
        let _ = writeln!(out, "## Description");
        let _ = writeln!(out, "{description}\n");
    }

    match &ticket.acceptance_criteria {
        Some(AcceptanceCriteria::Checklist(items)) if !items.is_empty() => {
            let _ = writeln!(out, "## Acceptance Criteria");
            for item in items {
                if item.is_header {
                    let _ = writeln!(out, "\n### {}", item.text);
                    continue;
                }
                // Continuation lines are indented to stay inside the bullet.
                let mut lines = item.text.lines();
                if let Some(first) = lines.next() {
                    let _ = writeln!(out, "- {first}");
                    for line in lines {
                        let _ = writeln!(out, "  {line}");
                    }
                }
            }
            out.push('\n');
        }
        Some(AcceptanceCriteria::Text(text)) if !text.is_empty() => {
            let _ = writeln!(out, "## Acceptance Criteria");
            let _ = writeln!(out, "{text}\n");
        }
        _ => {}
    }

    out
}

/// List the fields that look like story points, sprint or acceptance criteria.
pub fn render_field_candidates(fields: &[TrackerField]) -> String {
    let sections = [
        ("Story Points", "Story Point"),
        ("Sprint", "Sprint"),
        ("Acceptance Criteria", "Acceptance"),
    ];

    let mut out = String::new();
    for (title, needle) in sections {
        let _ = writeln!(out, "\n--- Potential {title} Fields ---");
        for field in fields.iter().filter(|f| f.name.contains(needle)) {
            let _ = writeln!(out, "Name: {}, ID: {}", field.name, field.id);
        }
    }
    out
}
