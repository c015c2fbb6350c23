//! Story points per sprint.
//!
//! Sprints are ordered by name, and that order also stands in for recency: the
//! "excl. last" average drops the sprint whose name sorts last, assuming it is
//! the one still in progress. Names that do not sort chronologically will make
//! that average skip the wrong sprint.

use std::collections::BTreeMap;

use crate::types::{NO_SPRINT, SprintReport, SprintRow, Ticket};

pub const AVERAGE_LABEL: &str = "Average sprint";
pub const AVERAGE_EXCL_LAST_LABEL: &str = "Average sprint (excl. last)";

pub fn aggregate(tickets: &[Ticket], closed_statuses: &[String]) -> SprintReport {
    let mut by_sprint: BTreeMap<&str, SprintRow> = BTreeMap::new();

    for ticket in tickets {
        let row = by_sprint
            .entry(ticket.sprint.as_str())
            .or_insert_with(|| SprintRow {
                name: ticket.sprint.clone(),
                ..Default::default()
            });

        row.total += ticket.story_points;
        if ticket.is_closed(closed_statuses) {
            row.closed += ticket.story_points;
        }
    }

    let rows: Vec<SprintRow> = by_sprint.into_values().collect();
    let real_sprints: Vec<&SprintRow> = rows.iter().filter(|r| r.name != NO_SPRINT).collect();

    let average_excl_last = match real_sprints.split_last() {
        Some((_, earlier)) if !earlier.is_empty() => {
            Some(mean_row(AVERAGE_EXCL_LAST_LABEL, earlier))
        }
        _ => None,
    };
    let average = (!real_sprints.is_empty()).then(|| mean_row(AVERAGE_LABEL, &real_sprints));

    SprintReport {
        rows,
        average_excl_last,
        average,
    }
}

fn mean_row(label: &str, rows: &[&SprintRow]) -> SprintRow {
    let count = rows.len() as f64;
    SprintRow {
        name: label.to_string(),
        total: rows.iter().map(|r| r.total).sum::<f64>() / count,
        closed: rows.iter().map(|r| r.closed).sum::<f64>() / count,
    }
}
