use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::types::FieldMapping;

pub const DEFAULT_COMMON_LABEL: &str = "common";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Ticket keys included in the report and sprint statistics.
    #[serde(default)]
    pub tickets: Vec<String>,
    /// Default bucket for hours not booked on a ticket.
    #[serde(default = "default_common_label")]
    pub common_label: String,
    #[serde(default)]
    pub jira: JiraConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JiraConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_closed_statuses")]
    pub closed_statuses: Vec<String>,
    #[serde(default)]
    pub fields: FieldMapping,
}

fn default_common_label() -> String {
    DEFAULT_COMMON_LABEL.to_string()
}

fn default_closed_statuses() -> Vec<String> {
    vec!["Done".to_string(), "Closed".to_string()]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tickets: Vec::new(),
            common_label: default_common_label(),
            jira: JiraConfig::default(),
        }
    }
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            closed_statuses: default_closed_statuses(),
            fields: FieldMapping::default(),
        }
    }
}

#[cfg(test)]
thread_local! {
    static TEST_CONFIG_PATH: std::cell::RefCell<Option<PathBuf>> = const { std::cell::RefCell::new(None) };
}

#[cfg(test)]
pub fn set_test_config_path(path: PathBuf) {
    TEST_CONFIG_PATH.with(|p| *p.borrow_mut() = Some(path));
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        #[cfg(test)]
        {
            if let Some(path) = TEST_CONFIG_PATH.with(|p| p.borrow().clone()) {
                return Ok(path);
            }
        }

        Ok(dirs::home_dir()
            .context("Could not find home directory")?
            .join(".storytrail.toml"))
    }

    pub fn load() -> Result<Option<Config>> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;

        Ok(Some(config))
    }

    /// Like [`Config::load`], but a missing file is an error pointing at `config init`.
    pub fn load_required() -> Result<Config> {
        match Self::load()? {
            Some(config) => Ok(config),
            None => bail!(
                "No configuration found at {}. Run 'storytrail config init' to create one.",
                Self::config_path()?.display()
            ),
        }
    }

    pub fn save(&self, silent: bool) -> Result<()> {
        let config_path = Self::config_path()?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, content).context("Failed to write config file")?;

        if !silent {
            println!("✅ Configuration saved to: {}", config_path.display());
        }

        Ok(())
    }

    /// Checks the settings needed to talk to Jira at all.
    pub fn validate_base(&self) -> Result<()> {
        if self.jira.url.is_empty() || self.jira.token.is_empty() {
            bail!(
                "Jira url or token missing in {}",
                Self::config_path()?.display()
            );
        }
        Ok(())
    }

    /// Checks the settings needed to build tickets and sprint statistics.
    pub fn validate_full(&self) -> Result<()> {
        self.validate_base()?;
        let fields = &self.jira.fields;
        if is_blank(&fields.story_points) || is_blank(&fields.sprint) {
            bail!(
                "Jira fields (story_points, sprint) missing in {}",
                Self::config_path()?.display()
            );
        }
        Ok(())
    }

    pub fn is_tracked(&self, key: &str) -> bool {
        self.tickets.iter().any(|t| t == key)
    }

    /// Start tracking a ticket. Returns false if it was already tracked.
    pub fn track(&mut self, key: &str) -> bool {
        if self.is_tracked(key) {
            return false;
        }
        self.tickets.push(key.to_string());
        true
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

// CLI helper functions
pub fn create_default_config(overwrite: bool) -> Result<()> {
    let config = Config::default();
    if !fs::exists(Config::config_path()?)? || overwrite {
        config.save(true)?;

        println!("📝 Created default configuration file.");
        println!("📍 Set your Jira server and token:");
        println!("   storytrail config set url https://jira.example.com");
        println!("   storytrail config set token ...");
        println!("🔎 Then look up the custom field ids with:");
        println!("   storytrail fields");
        println!("or edit");
        println!("   {}", Config::config_path()?.display());
    } else {
        println!("Configuration already exists.  Pass `--overwrite` to overwrite.");
    }

    Ok(())
}

pub fn show_config() -> Result<()> {
    match Config::load()? {
        Some(config) => {
            let unset = |v: &Option<String>| v.clone().unwrap_or_else(|| "Not set".to_string());
            println!("🔧 Current configuration:");
            println!(
                "   Jira URL: {}",
                if config.jira.url.is_empty() {
                    "Not set"
                } else {
                    config.jira.url.as_str()
                }
            );
            println!(
                "   Jira Token: {}",
                if config.jira.token.is_empty() {
                    "Not set"
                } else {
                    "Set"
                }
            );
            println!("   Story Points Field: {}", unset(&config.jira.fields.story_points));
            println!("   Sprint Field: {}", unset(&config.jira.fields.sprint));
            println!(
                "   Acceptance Criteria Field: {}",
                unset(&config.jira.fields.acceptance_criteria)
            );
            println!("   Closed Statuses: {}", config.jira.closed_statuses.join(", "));
            println!("   Common Label: {}", config.common_label);
            println!("   Tracked Tickets: {}", config.tickets.len());
        }
        None => {
            println!("❌ No configuration file found.");
            println!("   Run 'storytrail config init' to create one.");
        }
    }
    Ok(())
}

pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let mut config = Config::load()?.unwrap_or_default();

    match key {
        "url" => config.jira.url = value.trim().trim_end_matches('/').to_string(),
        "token" => config.jira.token = value.trim().to_string(),
        "story-points-field" => config.jira.fields.story_points = optional(value),
        "sprint-field" => config.jira.fields.sprint = optional(value),
        "acceptance-criteria-field" => config.jira.fields.acceptance_criteria = optional(value),
        "common-label" => {
            let label = value.trim();
            if label.is_empty() {
                bail!("Common label cannot be empty");
            }
            config.common_label = label.to_string();
        }
        "closed-statuses" => {
            config.jira.closed_statuses = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        _ => bail!("Unknown config key: {}", key),
    }

    config.save(false)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_config() -> (TempDir, PathBuf) {
        let dir = TempDir::new().expect("tempdir");
        let config_path = dir.path().join(".storytrail.toml");
        set_test_config_path(config_path.clone());
        (dir, config_path)
    }

    #[test]
    fn default_config_round_trip() {
        let (_dir, _path) = setup_test_config();
        create_default_config(true).expect("create_default_config");

        let loaded = Config::load()
            .expect("load config")
            .expect("config should exist");

        assert_eq!(loaded.jira.url, "");
        assert_eq!(loaded.jira.closed_statuses, vec!["Done", "Closed"]);
        assert_eq!(loaded.common_label, "common");
        assert!(loaded.tickets.is_empty());
        assert_eq!(loaded.jira.fields, FieldMapping::default());
    }

    #[test]
    fn missing_file_loads_as_none() {
        let (_dir, _path) = setup_test_config();

        assert!(Config::load().expect("load config").is_none());
        let err = Config::load_required().unwrap_err();
        assert!(format!("{err}").contains("config init"));
    }

    #[test]
    fn full_config_parses() {
        let (_dir, path) = setup_test_config();
        fs::write(
            &path,
            r#"
tickets = ["T-1"]

[jira]
url = "https://jira.example.com"
token = "secret"

[jira.fields]
story_points = "customfield_123"
sprint = "customfield_456"
"#,
        )
        .unwrap();

        let config = Config::load().unwrap().unwrap();
        assert_eq!(config.jira.fields.story_points.as_deref(), Some("customfield_123"));
        assert_eq!(config.jira.fields.sprint.as_deref(), Some("customfield_456"));
        assert_eq!(config.jira.fields.acceptance_criteria, None);
        assert_eq!(config.tickets, vec!["T-1"]);
        assert!(config.validate_full().is_ok());
    }

    #[test]
    fn permissive_load_without_jira_section() {
        let (_dir, path) = setup_test_config();
        fs::write(&path, "common_label = \"Testing\"\ntickets = [\"T-1\"]\n").unwrap();

        let config = Config::load().unwrap().unwrap();
        assert_eq!(config.common_label, "Testing");
        assert_eq!(config.tickets, vec!["T-1"]);
        assert_eq!(config.jira.url, "");
        assert_eq!(config.jira.fields.story_points, None);
        assert_eq!(config.jira.closed_statuses, vec!["Done", "Closed"]);
    }

    #[test]
    fn validation_reports_missing_pieces() {
        let (_dir, _path) = setup_test_config();
        let mut config = Config::default();

        let err = config.validate_base().unwrap_err();
        assert!(format!("{err}").contains("url or token"));

        config.jira.url = "https://jira.example.com".to_string();
        config.jira.token = "secret".to_string();
        config.jira.fields.story_points = Some("customfield_123".to_string());
        assert!(config.validate_base().is_ok());

        let err = config.validate_full().unwrap_err();
        assert!(format!("{err}").contains("story_points, sprint"));

        config.jira.fields.sprint = Some("   ".to_string());
        assert!(config.validate_full().is_err());

        config.jira.fields.sprint = Some("customfield_456".to_string());
        assert!(config.validate_full().is_ok());
    }

    #[test]
    fn track_skips_duplicates() {
        let mut config = Config::default();

        assert!(config.track("PROJ-1"));
        assert!(!config.track("PROJ-1"));
        assert!(config.track("PROJ-2"));
        assert_eq!(config.tickets, vec!["PROJ-1", "PROJ-2"]);
    }

    #[test]
    fn set_config_value_behaviour() {
        let (_dir, _path) = setup_test_config();
        create_default_config(true).expect("create_default_config");

        set_config_value("url", "https://jira.example.com/").expect("set url");
        set_config_value("token", "TEST_TOKEN").expect("set token");
        set_config_value("story-points-field", "customfield_1").expect("set sp field");
        set_config_value("sprint-field", "customfield_2").expect("set sprint field");
        set_config_value("acceptance-criteria-field", "customfield_3").expect("set ac field");
        set_config_value("common-label", "meetings").expect("set common-label");
        set_config_value("closed-statuses", "Done, Closed , Won't Do,").expect("set statuses");

        let cfg = Config::load()
            .expect("load config")
            .expect("config should exist");

        assert_eq!(cfg.jira.url, "https://jira.example.com");
        assert_eq!(cfg.jira.token, "TEST_TOKEN");
        assert_eq!(cfg.jira.fields.story_points.as_deref(), Some("customfield_1"));
        assert_eq!(cfg.jira.fields.sprint.as_deref(), Some("customfield_2"));
        assert_eq!(cfg.jira.fields.acceptance_criteria.as_deref(), Some("customfield_3"));
        assert_eq!(cfg.common_label, "meetings");
        assert_eq!(cfg.jira.closed_statuses, vec!["Done", "Closed", "Won't Do"]);

        set_config_value("acceptance-criteria-field", "").expect("clear ac field");
        let cfg = Config::load().unwrap().unwrap();
        assert_eq!(cfg.jira.fields.acceptance_criteria, None);

        let err = set_config_value("unknown-key", "value").unwrap_err();
        let msg = format!("{err}");
        assert!(
            msg.contains("Unknown config key"),
            "unexpected error message: {msg}"
        );
        let err = set_config_value("common-label", " ").unwrap_err();
        assert!(format!("{err}").contains("cannot be empty"));
    }
}
