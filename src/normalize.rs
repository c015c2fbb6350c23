//! Turns raw tracker issues into [`Ticket`]s.
//!
//! Tracker custom fields are loosely typed: the sprint field alone shows up as
//! a list of objects on newer servers and as a list of `toString()` dumps on
//! older ones. Everything here works on the opaque JSON values and never fails
//! on an unexpected shape, except for the issue status which every ticket needs.

use std::sync::LazyLock;

use anyhow::{Result, bail};
use regex::Regex;
use simd_json::{OwnedValue, StaticNode};

use crate::types::{AcceptanceCriteria, ChecklistItem, FieldMapping, NO_SPRINT, RawIssue, Ticket};

static LEGACY_SPRINT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"name=([^,\]]*)").expect("valid sprint name pattern"));

/// The shapes a single sprint entry can take.
#[derive(Debug, PartialEq)]
enum SprintEntry<'a> {
    /// `{"id": 12, "name": "Sprint 3", ...}`
    Structured(&'a str),
    /// `com.atlassian.greenhopper.service.sprint.Sprint@1f[id=12,name=Sprint 3,...]`
    Serialized(&'a str),
    Opaque(&'a OwnedValue),
}

impl<'a> SprintEntry<'a> {
    fn classify(value: &'a OwnedValue) -> Self {
        match value {
            OwnedValue::Object(obj) => match obj.get("name") {
                Some(OwnedValue::String(name)) => SprintEntry::Structured(name),
                _ => SprintEntry::Opaque(value),
            },
            OwnedValue::String(s) => SprintEntry::Serialized(s),
            _ => SprintEntry::Opaque(value),
        }
    }

    fn display_name(&self) -> String {
        match self {
            SprintEntry::Structured(name) => name.to_string(),
            SprintEntry::Serialized(raw) => LEGACY_SPRINT_NAME
                .captures(raw)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| raw.to_string()),
            SprintEntry::Opaque(value) => display_value(value),
        }
    }
}

/// Resolve the sprint an issue currently belongs to.
///
/// Issues carried over between sprints list every sprint they were part of;
/// the last entry is the current one.
pub fn extract_sprint_name(issue: &RawIssue, sprint_field: Option<&str>) -> String {
    let Some(field) = sprint_field else {
        return NO_SPRINT.to_string();
    };

    match issue.field(field) {
        Some(OwnedValue::Array(entries)) => entries
            .last()
            .map(|last| SprintEntry::classify(last).display_name())
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| NO_SPRINT.to_string()),
        _ => NO_SPRINT.to_string(),
    }
}

pub fn normalize_issue(issue: &RawIssue, mapping: &FieldMapping) -> Result<Ticket> {
    let status = match issue.field("status") {
        Some(OwnedValue::Object(status)) => match status.get("name") {
            Some(OwnedValue::String(name)) => name.clone(),
            _ => bail!("Issue {} has a status without a name", issue.key),
        },
        _ => bail!("Issue {} has no status", issue.key),
    };

    let summary = match issue.field("summary") {
        Some(value) => display_value(value),
        None => String::new(),
    };

    let story_points = mapping
        .story_points
        .as_deref()
        .and_then(|field| issue.field(field))
        .and_then(value_as_points)
        .unwrap_or(0.0)
        .max(0.0);

    let description = issue.field("description").map(display_value);

    let acceptance_criteria = mapping
        .acceptance_criteria
        .as_deref()
        .and_then(|field| issue.field(field))
        .map(parse_acceptance_criteria);

    Ok(Ticket {
        key: issue.key.clone(),
        summary,
        status,
        story_points,
        sprint: extract_sprint_name(issue, mapping.sprint.as_deref()),
        description,
        acceptance_criteria,
    })
}

fn parse_acceptance_criteria(value: &OwnedValue) -> AcceptanceCriteria {
    match value {
        OwnedValue::Array(items) => {
            AcceptanceCriteria::Checklist(items.iter().map(parse_checklist_item).collect())
        }
        other => AcceptanceCriteria::Text(display_value(other)),
    }
}

fn parse_checklist_item(value: &OwnedValue) -> ChecklistItem {
    let OwnedValue::Object(obj) = value else {
        return ChecklistItem {
            text: display_value(value),
            is_header: false,
        };
    };

    let text = obj
        .get("text")
        .or_else(|| obj.get("name"))
        .map(display_value)
        .unwrap_or_else(|| display_value(value));
    let is_header = matches!(
        obj.get("isHeader").or_else(|| obj.get("is_header")),
        Some(OwnedValue::Static(StaticNode::Bool(true)))
    );

    ChecklistItem { text, is_header }
}

fn value_as_points(value: &OwnedValue) -> Option<f64> {
    let points = match value {
        OwnedValue::Static(StaticNode::F64(f)) => Some(*f),
        OwnedValue::Static(StaticNode::I64(i)) => Some(*i as f64),
        OwnedValue::Static(StaticNode::U64(u)) => Some(*u as f64),
        OwnedValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    points.filter(|p| p.is_finite())
}

/// Strings render bare; everything else renders as JSON.
fn display_value(value: &OwnedValue) -> String {
    match value {
        OwnedValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}
