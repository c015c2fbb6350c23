//! Personal hours ledger, stored as TOML tables keyed by ISO date.
//!
//! ```toml
//! ["2026-01-09"]
//! common = 1.5
//! PROJ-123 = 2.0
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::data_dir;
use crate::types::Ticket;
use crate::utils::{format_day, format_number, week_of};

const WEEK_SEPARATOR: &str = "=======================";
const NO_HOURS_THIS_WEEK: &str = "No hours tracked this week.";

pub fn hours_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("hours.toml"))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HoursLedger {
    days: BTreeMap<String, BTreeMap<String, f64>>,
}

impl HoursLedger {
    /// Load the ledger, or an empty one if the file does not exist yet.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read hours file {}", path.display()));
            }
        };

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse hours file {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize hours")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write hours file {}", path.display()))?;
        debug!(path = %path.display(), "saved hours ledger");
        Ok(())
    }

    pub fn add(&mut self, day: NaiveDate, ticket: &str, hours: f64) {
        *self
            .days
            .entry(day.to_string())
            .or_default()
            .entry(ticket.to_string())
            .or_insert(0.0) += hours;
    }

    #[cfg(test)]
    pub fn hours(&self, day: NaiveDate, ticket: &str) -> Option<f64> {
        self.day(day)?.get(ticket).copied()
    }

    fn day(&self, day: NaiveDate) -> Option<&BTreeMap<String, f64>> {
        self.days.get(&day.to_string()).filter(|entries| !entries.is_empty())
    }

    /// Hours booked on a ticket across every recorded day.
    pub fn ticket_total(&self, ticket: &str) -> f64 {
        self.days
            .values()
            .filter_map(|entries| entries.get(ticket))
            .sum()
    }
}

/// Entries of one day, the common label first and everything else by name.
fn sorted_entries<'a>(
    entries: &'a BTreeMap<String, f64>,
    common_label: &str,
) -> Vec<(&'a str, f64)> {
    let mut sorted: Vec<(&str, f64)> = entries.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    sorted.sort_by(|(a, _), (b, _)| (*a != common_label, *a).cmp(&(*b != common_label, *b)));
    sorted
}

fn entry_line(key: &str, hours: f64, lookup: &dyn Fn(&str) -> Option<Ticket>) -> String {
    match lookup(key) {
        Some(ticket) => format!(
            "{key}: {}h - {} [{}]",
            format_number(hours),
            ticket.summary,
            ticket.status
        ),
        None => format!("{key}: {}h", format_number(hours)),
    }
}

/// Render the hours booked on `days`.
///
/// The long form prints a block per day with a day total and closes with the
/// weekly total. The short form prints one line per day. Days without entries
/// are skipped in both.
pub fn render_week(
    ledger: &HoursLedger,
    days: &[NaiveDate],
    common_label: &str,
    short: bool,
    lookup: &dyn Fn(&str) -> Option<Ticket>,
) -> String {
    let mut lines = Vec::new();
    let mut week_total = 0.0;
    let mut any_entries = false;

    for &day in days {
        let Some(entries) = ledger.day(day) else {
            continue;
        };
        any_entries = true;
        let sorted = sorted_entries(entries, common_label);

        if short {
            let parts: Vec<String> = sorted
                .iter()
                .map(|(key, hours)| format!("{key}: {}h", format_number(*hours)))
                .collect();
            lines.push(format!("{}: {}", format_day(day), parts.join(", ")));
            continue;
        }

        lines.push(String::new());
        lines.push(format!("--- Hours for {} ---", format_day(day)));
        let mut day_total = 0.0;
        for (key, hours) in sorted {
            lines.push(entry_line(key, hours, lookup));
            day_total += hours;
        }
        lines.push(format!("Day Total: {}h", format_number(day_total)));
        week_total += day_total;
    }

    if short {
        if !any_entries {
            lines.push(NO_HOURS_THIS_WEEK.to_string());
        }
    } else if week_total > 0.0 {
        lines.push(String::new());
        lines.push(WEEK_SEPARATOR.to_string());
        lines.push(format!("Weekly Total: {}h", format_number(week_total)));
    } else {
        lines.push(String::new());
        lines.push(NO_HOURS_THIS_WEEK.to_string());
    }

    lines.join("\n")
}

pub fn render_ticket_total(
    ledger: &HoursLedger,
    ticket: &str,
    lookup: &dyn Fn(&str) -> Option<Ticket>,
) -> String {
    entry_line(ticket, ledger.ticket_total(ticket), lookup)
}

/// What `storytrail hours` was asked to do.
#[derive(Debug, Clone, Default)]
pub struct HoursRequest {
    pub ticket: Option<String>,
    pub add: Option<f64>,
    pub log: bool,
    pub short: bool,
    pub total: bool,
}

/// Apply a request to the ledger at `path` and return what should be printed.
///
/// The ticket defaults to the common label. Adding always books on `today`,
/// and adding zero hours counts as not adding. With `total` only the ticket total is shown; otherwise the week log is shown
/// whenever it was asked for or nothing was added.
pub fn run(
    request: &HoursRequest,
    path: &Path,
    common_label: &str,
    today: NaiveDate,
    lookup: &dyn Fn(&str) -> Option<Ticket>,
) -> Result<String> {
    let mut ledger = HoursLedger::load(path)?;
    let ticket = request.ticket.as_deref().unwrap_or(common_label);
    let add = request.add.filter(|hours| *hours != 0.0);
    let mut output = Vec::new();

    if let Some(hours) = add {
        if !hours.is_finite() {
            bail!("Hours must be a finite number, got {hours}");
        }
        ledger.add(today, ticket, hours);
        ledger.save(path)?;
        output.push(format!(
            "Added {}h to {ticket} for {today}.",
            format_number(hours)
        ));
    }

    if request.total {
        output.push(render_ticket_total(&ledger, ticket, lookup));
    } else if request.log || request.short || add.is_none() {
        output.push(render_week(
            &ledger,
            &week_of(today),
            common_label,
            request.short,
            lookup,
        ));
    }

    Ok(output.join("\n"))
}
