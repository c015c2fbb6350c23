use std::io::{BufRead, Write};

use anyhow::{Context, Result, bail};

use crate::cache::TicketCache;
use crate::config::Config;
use crate::jira::{DEFAULT_SEARCH_LIMIT, IssueTracker};
use crate::pipeline::{ASSIGNED_OPEN_JQL, fetch_and_cache};
use crate::types::Ticket;

const PROMPT: &str = "\nEnter the indices of tickets you want to track (comma-separated), or 'all', or press Enter to skip: ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Nothing,
    All,
    Indices {
        valid: Vec<usize>,
        out_of_range: Vec<i64>,
    },
}

/// Parse the answer to the selection prompt for a list of `count` tickets.
pub fn parse_selection(input: &str, count: usize) -> Result<Selection> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Selection::Nothing);
    }
    if input.eq_ignore_ascii_case("all") {
        return Ok(Selection::All);
    }

    let mut valid = Vec::new();
    let mut out_of_range = Vec::new();
    for part in input.split(',') {
        let Ok(index) = part.trim().parse::<i64>() else {
            bail!("Invalid input. Please enter numbers or 'all'.");
        };
        match usize::try_from(index) {
            Ok(i) if i < count => valid.push(i),
            _ => out_of_range.push(index),
        }
    }

    Ok(Selection::Indices {
        valid,
        out_of_range,
    })
}

/// Open tickets assigned to the current user that are not tracked yet.
pub async fn untracked_assigned(
    tracker: &dyn IssueTracker,
    cache: &TicketCache,
    config: &Config,
) -> Result<Vec<Ticket>> {
    let assigned = fetch_and_cache(
        tracker,
        cache,
        ASSIGNED_OPEN_JQL,
        &config.jira.fields,
        DEFAULT_SEARCH_LIMIT,
    )
    .await
    .context("Failed to fetch tickets assigned to you")?;

    Ok(assigned
        .into_iter()
        .filter(|t| !config.is_tracked(&t.key))
        .collect())
}

/// Show the candidates, read one answer and add the chosen tickets to `config`.
///
/// Returns the keys that were newly tracked.
pub fn prompt_selection(
    candidates: &[Ticket],
    config: &mut Config,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> Result<Vec<String>> {
    writeln!(output, "\nUntracked tickets assigned to you:")?;
    for (i, ticket) in candidates.iter().enumerate() {
        writeln!(
            output,
            "[{i}] {}: {} ({})",
            ticket.key, ticket.summary, ticket.status
        )?;
    }
    write!(output, "{PROMPT}")?;
    output.flush()?;

    let mut answer = String::new();
    input
        .read_line(&mut answer)
        .context("Failed to read selection")?;

    let chosen: Vec<&Ticket> = match parse_selection(&answer, candidates.len())? {
        Selection::Nothing => {
            writeln!(output, "No tickets added.")?;
            return Ok(Vec::new());
        }
        Selection::All => candidates.iter().collect(),
        Selection::Indices {
            valid,
            out_of_range,
        } => {
            for index in out_of_range {
                writeln!(output, "Invalid index: {index}")?;
            }
            valid.into_iter().map(|i| &candidates[i]).collect()
        }
    };

    if chosen.is_empty() {
        writeln!(output, "No valid tickets selected.")?;
        return Ok(Vec::new());
    }

    let mut added = Vec::new();
    for ticket in chosen {
        if config.track(&ticket.key) {
            writeln!(output, "Added {} to tracking.", ticket.key)?;
            added.push(ticket.key.clone());
        }
    }
    Ok(added)
}

pub async fn run_track(
    tracker: &dyn IssueTracker,
    cache: &TicketCache,
    config: &mut Config,
) -> Result<()> {
    println!("Fetching open tickets assigned to you...");
    let candidates = untracked_assigned(tracker, cache, config).await?;

    if candidates.is_empty() {
        println!("No new untracked tickets found assigned to you.");
        return Ok(());
    }

    let stdin = std::io::stdin();
    let added = prompt_selection(
        &candidates,
        config,
        &mut stdin.lock(),
        &mut std::io::stdout(),
    )?;

    if !added.is_empty() {
        config.save(false)?;
    }
    Ok(())
}
