use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cache::{TicketCache, reconcile};
use crate::config::Config;
use crate::jira::IssueTracker;
use crate::normalize::normalize_issue;
use crate::types::{FieldMapping, Ticket};

pub const AUTHORED_OPEN_JQL: &str = "reporter = currentUser() AND statusCategory != Done";
pub const ASSIGNED_OPEN_JQL: &str = "assignee = currentUser() AND statusCategory != Done";

/// Run a query, normalize every issue and write each one to the cache.
///
/// Tickets come back in the order the tracker returned them. A single issue
/// that cannot be normalized fails the whole call.
pub async fn fetch_and_cache(
    tracker: &dyn IssueTracker,
    cache: &TicketCache,
    jql: &str,
    mapping: &FieldMapping,
    limit: usize,
) -> Result<Vec<Ticket>> {
    let issues = tracker.search(jql, limit).await?;

    let mut tickets = Vec::with_capacity(issues.len());
    for issue in &issues {
        let ticket = normalize_issue(issue, mapping)?;
        cache.save(&ticket)?;
        tickets.push(ticket);
    }

    info!(jql, count = tickets.len(), "fetched tickets");
    Ok(tickets)
}

pub fn keys_query(keys: &[String]) -> String {
    format!("key in ({})", keys.join(","))
}

/// Load every tracked ticket, refetching the ones whose cached copy may be stale.
pub async fn refresh_tracked(
    tracker: &dyn IssueTracker,
    cache: &TicketCache,
    config: &Config,
) -> Result<Vec<Ticket>> {
    let partition = reconcile(cache, &config.tickets, &config.jira.closed_statuses);
    let mut tickets = partition.fresh;

    if !partition.to_refetch.is_empty() {
        println!(
            "Refreshing {} ticket(s) from Jira: {}",
            partition.to_refetch.len(),
            partition.to_refetch.join(", ")
        );
        let fetched = fetch_and_cache(
            tracker,
            cache,
            &keys_query(&partition.to_refetch),
            &config.jira.fields,
            partition.to_refetch.len(),
        )
        .await
        .context("Failed to refresh tracked tickets")?;
        tickets.extend(fetched);
    }

    Ok(tickets)
}

/// Open tickets reported by the current user that are not already known.
///
/// This is an optional extra in the report, so failures are reported and
/// swallowed.
pub async fn fetch_authored(
    tracker: &dyn IssueTracker,
    cache: &TicketCache,
    known: &[Ticket],
    mapping: &FieldMapping,
    limit: usize,
) -> Vec<Ticket> {
    match fetch_and_cache(tracker, cache, AUTHORED_OPEN_JQL, mapping, limit).await {
        Ok(authored) => authored
            .into_iter()
            .filter(|ticket| !known.iter().any(|k| k.key == ticket.key))
            .collect(),
        Err(e) => {
            warn!(error = %format!("{e:#}"), "authored ticket lookup failed");
            println!("Could not fetch authored tickets: {e:#}");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RawIssue, TrackerField};
    use anyhow::bail;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// In-memory tracker that answers every search with the same issues.
    struct FakeTracker {
        issues: Vec<RawIssue>,
        fail: bool,
        searches: Mutex<Vec<(String, usize)>>,
    }

    impl FakeTracker {
        fn new(json: &[&str]) -> Self {
            let issues = json
                .iter()
                .map(|j| {
                    let mut bytes = j.as_bytes().to_vec();
                    simd_json::from_slice(&mut bytes).unwrap()
                })
                .collect();
            Self {
                issues,
                fail: false,
                searches: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(&[])
            }
        }

        fn searches(&self) -> Vec<(String, usize)> {
            self.searches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl IssueTracker for FakeTracker {
        async fn search(&self, jql: &str, max_results: usize) -> Result<Vec<RawIssue>> {
            self.searches
                .lock()
                .unwrap()
                .push((jql.to_string(), max_results));
            if self.fail {
                bail!("Unauthorized (check the Jira token)");
            }
            Ok(self.issues.clone())
        }

        async fn issue(&self, key: &str) -> Result<RawIssue> {
            self.issues
                .iter()
                .find(|i| i.key == key)
                .cloned()
                .context("Not found")
        }

        async fn fields(&self) -> Result<Vec<TrackerField>> {
            Ok(Vec::new())
        }
    }

    fn issue_json(key: &str, status: &str, points: f64, sprint: &str) -> String {
        format!(
            r#"{{"key":"{key}","fields":{{"summary":"Summary {key}","status":{{"name":"{status}"}},
                "customfield_1":{points},"customfield_2":[{{"name":"{sprint}"}}]}}}}"#
        )
    }

    fn mapping() -> FieldMapping {
        FieldMapping {
            story_points: Some("customfield_1".to_string()),
            sprint: Some("customfield_2".to_string()),
            acceptance_criteria: None,
        }
    }

    fn config(tickets: &[&str]) -> Config {
        let mut config = Config::default();
        config.tickets = tickets.iter().map(|t| t.to_string()).collect();
        config.jira.fields = mapping();
        config
    }

    fn cached(key: &str, status: &str) -> Ticket {
        Ticket {
            key: key.to_string(),
            summary: "Cached".to_string(),
            status: status.to_string(),
            story_points: 1.0,
            sprint: "Sprint 1".to_string(),
            description: None,
            acceptance_criteria: None,
        }
    }

    #[tokio::test]
    async fn fetch_normalizes_caches_and_keeps_order() {
        let dir = TempDir::new().unwrap();
        let cache = TicketCache::new(dir.path());
        let b = issue_json("PROJ-2", "Open", 3.0, "Sprint 2");
        let a = issue_json("PROJ-1", "Done", 5.0, "Sprint 1");
        let tracker = FakeTracker::new(&[&b, &a]);

        let tickets = fetch_and_cache(&tracker, &cache, "project = PROJ", &mapping(), 10)
            .await
            .unwrap();

        let keys: Vec<_> = tickets.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, vec!["PROJ-2", "PROJ-1"]);
        assert_eq!(tickets[1].story_points, 5.0);
        assert_eq!(tickets[0].sprint, "Sprint 2");
        assert_eq!(cache.load("PROJ-1"), Some(tickets[1].clone()));
        assert_eq!(cache.load("PROJ-2"), Some(tickets[0].clone()));
        assert_eq!(tracker.searches(), vec![("project = PROJ".to_string(), 10)]);
    }

    #[tokio::test]
    async fn fetch_aborts_on_unnormalizable_issue() {
        let dir = TempDir::new().unwrap();
        let cache = TicketCache::new(dir.path());
        let good = issue_json("PROJ-1", "Open", 1.0, "Sprint 1");
        let tracker = FakeTracker::new(&[&good, r#"{"key":"PROJ-2","fields":{"summary":"x"}}"#]);

        let err = fetch_and_cache(&tracker, &cache, "q", &mapping(), 10)
            .await
            .unwrap_err();

        assert!(format!("{err}").contains("PROJ-2"));
    }

    #[tokio::test]
    async fn refresh_only_fetches_stale_keys() {
        let dir = TempDir::new().unwrap();
        let cache = TicketCache::new(dir.path());
        cache.save(&cached("PROJ-1", "Done")).unwrap();
        cache.save(&cached("PROJ-2", "Open")).unwrap();
        let refreshed = issue_json("PROJ-2", "In Review", 2.0, "Sprint 3");
        let new = issue_json("PROJ-3", "Open", 1.0, "Sprint 3");
        let tracker = FakeTracker::new(&[&refreshed, &new]);

        let tickets = refresh_tracked(&tracker, &cache, &config(&["PROJ-1", "PROJ-2", "PROJ-3"]))
            .await
            .unwrap();

        assert_eq!(
            tracker.searches(),
            vec![("key in (PROJ-2,PROJ-3)".to_string(), 2)]
        );
        let keys: Vec<_> = tickets.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, vec!["PROJ-1", "PROJ-2", "PROJ-3"]);
        assert_eq!(tickets[0].summary, "Cached");
        assert_eq!(cache.load("PROJ-2").unwrap().status, "In Review");
    }

    #[tokio::test]
    async fn refresh_skips_tracker_when_everything_is_closed() {
        let dir = TempDir::new().unwrap();
        let cache = TicketCache::new(dir.path());
        cache.save(&cached("PROJ-1", "Done")).unwrap();
        cache.save(&cached("PROJ-2", "Closed")).unwrap();
        let tracker = FakeTracker::failing();

        let tickets = refresh_tracked(&tracker, &cache, &config(&["PROJ-1", "PROJ-2"]))
            .await
            .unwrap();

        assert_eq!(tickets.len(), 2);
        assert!(tracker.searches().is_empty());
    }

    #[tokio::test]
    async fn refresh_failure_propagates() {
        let dir = TempDir::new().unwrap();
        let cache = TicketCache::new(dir.path());
        let tracker = FakeTracker::failing();

        let err = refresh_tracked(&tracker, &cache, &config(&["PROJ-1"]))
            .await
            .unwrap_err();

        assert!(format!("{err:#}").contains("Failed to refresh tracked tickets"));
    }

    #[tokio::test]
    async fn authored_excludes_known_tickets() {
        let dir = TempDir::new().unwrap();
        let cache = TicketCache::new(dir.path());
        let known = issue_json("PROJ-1", "Open", 1.0, "Sprint 1");
        let mine = issue_json("PROJ-9", "Open", 2.0, "Sprint 1");
        let tracker = FakeTracker::new(&[&known, &mine]);

        let authored =
            fetch_authored(&tracker, &cache, &[cached("PROJ-1", "Open")], &mapping(), 50).await;

        assert_eq!(authored.len(), 1);
        assert_eq!(authored[0].key, "PROJ-9");
        assert_eq!(tracker.searches()[0].0, AUTHORED_OPEN_JQL);
    }

    #[tokio::test]
    async fn authored_failure_degrades_to_empty() {
        let dir = TempDir::new().unwrap();
        let cache = TicketCache::new(dir.path());
        let tracker = FakeTracker::failing();

        let authored = fetch_authored(&tracker, &cache, &[], &mapping(), 50).await;

        assert!(authored.is_empty());
    }

    #[test]
    fn keys_query_joins_keys() {
        let keys = vec!["A-1".to_string(), "B-2".to_string()];
        assert_eq!(keys_query(&keys), "key in (A-1,B-2)");
    }
}
