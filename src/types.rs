use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Sprint name used when a ticket has no sprint data.
pub const NO_SPRINT: &str = "No Sprint";

/// One tracked issue, as normalized from the tracker and persisted in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub key: String,
    pub summary: String,
    pub status: String,
    pub story_points: f64,
    pub sprint: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub acceptance_criteria: Option<AcceptanceCriteria>,
}

impl Ticket {
    pub fn is_closed(&self, closed_statuses: &[String]) -> bool {
        closed_statuses.iter().any(|s| s == &self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AcceptanceCriteria {
    Checklist(Vec<ChecklistItem>),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub text: String,
    #[serde(default, alias = "isHeader")]
    pub is_header: bool,
}

/// Which tracker custom fields hold the values we care about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_points: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceptance_criteria: Option<String>,
}

/// An issue as returned by the tracker: a key plus loosely typed fields.
#[derive(Debug, Clone, Deserialize)]
pub struct RawIssue {
    pub key: String,
    #[serde(default)]
    pub fields: BTreeMap<String, simd_json::OwnedValue>,
}

impl RawIssue {
    /// Look up a field, treating JSON null the same as a missing field.
    pub fn field(&self, name: &str) -> Option<&simd_json::OwnedValue> {
        match self.fields.get(name) {
            Some(simd_json::OwnedValue::Static(simd_json::StaticNode::Null)) | None => None,
            Some(value) => Some(value),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub issues: Vec<RawIssue>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrackerField {
    pub id: String,
    pub name: String,
}

/// Story points accumulated for one sprint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SprintRow {
    pub name: String,
    pub total: f64,
    pub closed: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SprintReport {
    pub rows: Vec<SprintRow>,
    pub average_excl_last: Option<SprintRow>,
    pub average: Option<SprintRow>,
}
