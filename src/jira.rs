use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Url;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use simd_json::OwnedValue;
use tracing::debug;

use crate::config::Config;
use crate::reqwest_simd_json::ResponseSimdJsonExt;
use crate::types::{RawIssue, SearchResponse, TrackerField};

/// Jira's own default page size for searches.
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The slice of the tracker API the rest of the tool needs.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Run a JQL query, returning at most `max_results` issues in server order.
    async fn search(&self, jql: &str, max_results: usize) -> Result<Vec<RawIssue>>;

    async fn issue(&self, key: &str) -> Result<RawIssue>;

    /// List every field the server knows about, custom fields included.
    async fn fields(&self) -> Result<Vec<TrackerField>>;
}

/// Jira REST v2 client authenticated with a personal access token.
pub struct JiraClient {
    base_url: String,
    token: String,
    http: reqwest::Client,
}

impl JiraClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("storytrail/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            http,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate_base()?;
        Self::new(&config.jira.url, &config.jira.token)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let raw = format!("{}/rest/api/2/{path}", self.base_url);
        Url::parse(&raw).with_context(|| format!("Invalid Jira URL: {raw}"))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!(%url, "jira request");
        let response = self
            .http
            .get(url.clone())
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to reach Jira at {}", self.base_url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(%url, status = status.as_u16(), "jira request failed");
            bail!("{}", describe_error(status.as_u16(), &body));
        }

        response.simd_json().await
    }
}

#[async_trait]
impl IssueTracker for JiraClient {
    async fn search(&self, jql: &str, max_results: usize) -> Result<Vec<RawIssue>> {
        let limit = max_results.to_string();
        let base = self.endpoint("search")?;
        let url = Url::parse_with_params(base.as_str(), [("jql", jql), ("maxResults", limit.as_str())])
            .context("Failed to build search URL")?;

        let response: SearchResponse = self
            .get_json(url)
            .await
            .with_context(|| format!("Search failed: {jql}"))?;
        Ok(response.issues)
    }

    async fn issue(&self, key: &str) -> Result<RawIssue> {
        let url = self.endpoint(&format!("issue/{}", urlencoding::encode(key)))?;
        self.get_json(url)
            .await
            .with_context(|| format!("Failed to fetch issue {key}"))
    }

    async fn fields(&self) -> Result<Vec<TrackerField>> {
        let url = self.endpoint("field")?;
        self.get_json(url).await.context("Failed to list Jira fields")
    }
}

/// Jira reports errors as `{"errorMessages": [...], "errors": {"field": "msg"}}`.
fn parse_error_messages(body: &str) -> Option<String> {
    if !body.trim_start().starts_with('{') {
        return None;
    }

    let mut bytes = body.as_bytes().to_vec();
    let OwnedValue::Object(obj) = simd_json::from_slice::<OwnedValue>(&mut bytes).ok()? else {
        return None;
    };

    let mut messages: Vec<String> = Vec::new();
    if let Some(OwnedValue::Array(list)) = obj.get("errorMessages") {
        messages.extend(list.iter().filter_map(|m| match m {
            OwnedValue::String(s) => Some(s.clone()),
            _ => None,
        }));
    }
    if let Some(OwnedValue::Object(errors)) = obj.get("errors") {
        let mut field_errors: Vec<String> = errors
            .iter()
            .filter_map(|(field, msg)| match msg {
                OwnedValue::String(s) => Some(format!("{field}: {s}")),
                _ => None,
            })
            .collect();
        field_errors.sort();
        messages.extend(field_errors);
    }

    if messages.is_empty() {
        None
    } else {
        Some(messages.join("; "))
    }
}

fn describe_error(status: u16, body: &str) -> String {
    let detail = parse_error_messages(body);
    let with_detail = |label: &str| match &detail {
        Some(msg) => format!("{label}: {msg}"),
        None => label.to_string(),
    };

    match status {
        400 => with_detail("Bad request"),
        401 => "Unauthorized (check the Jira token)".to_string(),
        403 => with_detail("Forbidden"),
        404 => with_detail("Not found"),
        429 => "Rate limited by Jira".to_string(),
        500..=599 => with_detail(&format!("Jira server error ({status})")),
        _ => with_detail(&format!("Error {status}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn error_messages_are_extracted() {
        let body = r#"{"errorMessages":["Issue does not exist"],"errors":{}}"#;
        assert_eq!(describe_error(404, body), "Not found: Issue does not exist");

        let body = r#"{"errorMessages":[],"errors":{"jql":"bad query"}}"#;
        assert_eq!(describe_error(400, body), "Bad request: jql: bad query");
    }

    #[test]
    fn non_json_bodies_fall_back_to_status() {
        assert_eq!(describe_error(404, "<html>nope</html>"), "Not found");
        assert_eq!(
            describe_error(401, ""),
            "Unauthorized (check the Jira token)"
        );
        assert_eq!(describe_error(502, ""), "Jira server error (502)");
        assert_eq!(describe_error(418, ""), "Error 418");
    }

    #[tokio::test]
    async fn search_sends_query_and_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/search"))
            .and(query_param("jql", "key in (PROJ-1)"))
            .and(query_param("maxResults", "1"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"startAt":0,"total":1,"issues":[
                    {"key":"PROJ-1","fields":{"summary":"Hi","status":{"name":"Open"}}}
                ]}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let client = JiraClient::new(&format!("{}/", server.uri()), "secret").unwrap();
        let issues = client.search("key in (PROJ-1)", 1).await.unwrap();

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].key, "PROJ-1");
        assert!(issues[0].field("summary").is_some());
    }

    #[tokio::test]
    async fn issue_not_found_reports_jira_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/issue/PROJ-404"))
            .respond_with(ResponseTemplate::new(404).set_body_string(
                r#"{"errorMessages":["Issue Does Not Exist"],"errors":{}}"#,
            ))
            .mount(&server)
            .await;

        let client = JiraClient::new(&server.uri(), "secret").unwrap();
        let err = client.issue("PROJ-404").await.unwrap_err();
        let msg = format!("{err:#}");

        assert!(msg.contains("PROJ-404"), "unexpected error message: {msg}");
        assert!(msg.contains("Issue Does Not Exist"), "unexpected error message: {msg}");
    }

    #[tokio::test]
    async fn fields_are_listed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/field"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"id":"summary","name":"Summary","custom":false},
                    {"id":"customfield_10002","name":"Story Points","custom":true}]"#,
            ))
            .mount(&server)
            .await;

        let client = JiraClient::new(&server.uri(), "secret").unwrap();
        let fields = client.fields().await.unwrap();

        assert_eq!(fields.len(), 2);
        assert_eq!(fields[1].id, "customfield_10002");
        assert_eq!(fields[1].name, "Story Points");
    }
}
