//! Configuration file loading and validation.
//!
//! The config is a JSON document:
//!
//! ```json
//! {
//!   "jira": {
//!     "server": "https://jira.example.com",
//!     "username": "joca-bot",
//!     "password": "secret"
//!   },
//!   "projects": [
//!     {
//!       "key": "OPS",
//!       "ical": "https://calendar.example.com/oncall.ics",
//!       "regex": "On call: (\\w+)"
//!     }
//!   ]
//! }
//! ```
//!
//! Optional fields: `timeout_secs` (HTTP timeout, default 30),
//! `stop_on_first_match` (default `false`) and, per project, `tie_break`
//! (`earliest_start` or `last_in_feed`).

use std::collections::HashSet;
use std::env;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::ConfigError;

/// Default location of the config file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/joca.conf";

/// Environment variable overriding `jira.password`.
const ENV_JIRA_PASSWORD: &str = "JOCA_JIRA_PASSWORD";

/// Default timeout for HTTP requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// How to pick one event when several are active at the same instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// The active event that started first; feed order breaks equal starts.
    #[default]
    EarliestStart,
    /// The active event that appears last in the feed.
    LastInFeed,
}

/// Jira connection settings.
#[derive(Clone)]
pub struct JiraSettings {
    /// Base URL without trailing slash (e.g. `https://jira.example.com`).
    pub server: String,
    /// Basic auth username.
    pub username: String,
    /// Basic auth password or API token.
    pub password: String,
}

impl fmt::Debug for JiraSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JiraSettings")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A Jira project whose lead follows an on-call calendar.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    /// Upper-cased project key (e.g. `OPS`).
    pub key: String,
    /// ICS feed URL.
    pub ical: Url,
    /// Pattern applied to the active event's summary; group 1 is the username.
    pub pattern: Regex,
    /// Overlapping-event policy.
    pub tie_break: TieBreak,
}

/// Validated run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub jira: JiraSettings,
    pub projects: Vec<ProjectConfig>,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// Stop the whole run as soon as one project already has the right lead.
    pub stop_on_first_match: bool,
}

impl Config {
    /// Read, parse and validate the config file at `path`, then apply
    /// environment overrides.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file is unreadable, malformed or invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::from_json(&text)?;
        config.apply_env_overrides();

        debug!(
            path = %path.display(),
            projects = config.projects.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse and validate a JSON config document.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the document is malformed or invalid.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(text)?;
        raw.validate()
    }

    fn apply_env_overrides(&mut self) {
        if let Some(password) = env::var(ENV_JIRA_PASSWORD).ok().filter(|s| !s.is_empty()) {
            debug!("Using Jira password from {ENV_JIRA_PASSWORD}");
            self.jira.password = password;
        }
    }
}

// =========================================================================
// On-disk schema
// =========================================================================

#[derive(Debug, Deserialize)]
struct RawConfig {
    jira: RawJira,
    projects: Vec<RawProject>,
    #[serde(default)]
    timeout_secs: Option<u64>,
    #[serde(default)]
    stop_on_first_match: bool,
}

#[derive(Debug, Deserialize)]
struct RawJira {
    server: String,
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct RawProject {
    key: String,
    ical: String,
    regex: String,
    #[serde(default)]
    tie_break: TieBreak,
}

impl RawConfig {
    fn validate(self) -> Result<Config, ConfigError> {
        let server = self.jira.server.trim().trim_end_matches('/').to_string();
        Url::parse(&server).map_err(|source| ConfigError::InvalidUrl {
            field: "jira.server".to_string(),
            source,
        })?;

        if self.jira.username.trim().is_empty() {
            return Err(ConfigError::Invalid("jira.username is empty".to_string()));
        }

        if self.projects.is_empty() {
            return Err(ConfigError::Invalid("no projects configured".to_string()));
        }

        let timeout_secs = self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let mut projects = Vec::with_capacity(self.projects.len());
        for raw in self.projects {
            let project = raw.validate()?;
            if !seen.insert(project.key.clone()) {
                return Err(ConfigError::Invalid(format!(
                    "project {} is configured more than once",
                    project.key
                )));
            }
            projects.push(project);
        }

        Ok(Config {
            jira: JiraSettings {
                server,
                username: self.jira.username,
                password: self.jira.password,
            },
            projects,
            timeout: Duration::from_secs(timeout_secs),
            stop_on_first_match: self.stop_on_first_match,
        })
    }
}

impl RawProject {
    fn validate(self) -> Result<ProjectConfig, ConfigError> {
        let key = self.key.trim().to_uppercase();
        if key.is_empty() {
            return Err(ConfigError::Invalid("project key is empty".to_string()));
        }
        if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ConfigError::Invalid(format!(
                "project key {key:?} may only contain letters, digits and underscores"
            )));
        }

        let ical = Url::parse(self.ical.trim()).map_err(|source| ConfigError::InvalidUrl {
            field: format!("projects.{key}.ical"),
            source,
        })?;

        let pattern = Regex::new(&self.regex).map_err(|source| ConfigError::InvalidRegex {
            project: key.clone(),
            source,
        })?;
        // Group 0 is the whole match.
        if pattern.captures_len() < 2 {
            return Err(ConfigError::MissingCaptureGroup { project: key });
        }

        Ok(ProjectConfig {
            key,
            ical,
            pattern,
            tie_break: self.tie_break,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    // Use a mutex to serialize tests that modify environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn sample(projects: &str) -> String {
        format!(
            r#"{{
                "jira": {{
                    "server": "https://jira.example.com/",
                    "username": "bot",
                    "password": "hunter2"
                }},
                "projects": {projects}
            }}"#
        )
    }

    fn one_project(key: &str, ical: &str, regex: &str) -> String {
        let project = serde_json::json!([{ "key": key, "ical": ical, "regex": regex }]);
        sample(&project.to_string())
    }

    #[test]
    fn test_parse_minimal_config() {
        let json = one_project("ops", "https://cal.example.com/oncall.ics", r"On call: (\w+)");
        let config = Config::from_json(&json).unwrap();

        assert_eq!(config.jira.server, "https://jira.example.com");
        assert_eq!(config.jira.username, "bot");
        assert_eq!(config.jira.password, "hunter2");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(!config.stop_on_first_match);

        assert_eq!(config.projects.len(), 1);
        let project = &config.projects[0];
        assert_eq!(project.key, "OPS");
        assert_eq!(project.ical.as_str(), "https://cal.example.com/oncall.ics");
        assert_eq!(project.tie_break, TieBreak::EarliestStart);
    }

    #[test]
    fn test_parse_optional_fields() {
        let json = r#"{
            "jira": {"server": "https://jira.example.com", "username": "bot", "password": "x"},
            "timeout_secs": 5,
            "stop_on_first_match": true,
            "projects": [
                {"key": "OPS", "ical": "https://cal.example.com/a.ics", "regex": "(\\w+)", "tie_break": "last_in_feed"}
            ]
        }"#;
        let config = Config::from_json(json).unwrap();

        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(config.stop_on_first_match);
        assert_eq!(config.projects[0].tie_break, TieBreak::LastInFeed);
    }

    #[test]
    fn test_regex_without_capture_group_rejected() {
        let json = one_project("OPS", "https://cal.example.com/a.ics", r"On call: \w+");
        let err = Config::from_json(&json).unwrap_err();
        assert!(
            matches!(err, ConfigError::MissingCaptureGroup { ref project } if project == "OPS"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let json = one_project("OPS", "https://cal.example.com/a.ics", r"On call: (\w+");
        let err = Config::from_json(&json).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRegex { .. }));
    }

    #[test]
    fn test_invalid_ical_url_rejected() {
        let json = one_project("OPS", "not a url", r"(\w+)");
        let err = Config::from_json(&json).unwrap_err();
        match err {
            ConfigError::InvalidUrl { field, .. } => assert_eq!(field, "projects.OPS.ical"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_server_url_rejected() {
        let json = r#"{
            "jira": {"server": "jira.example.com", "username": "bot", "password": "x"},
            "projects": [{"key": "OPS", "ical": "https://cal.example.com/a.ics", "regex": "(\\w+)"}]
        }"#;
        let err = Config::from_json(json).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { ref field, .. } if field == "jira.server"));
    }

    #[test]
    fn test_empty_projects_rejected() {
        let err = Config::from_json(&sample("[]")).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let projects = serde_json::json!([
            {"key": "OPS", "ical": "https://cal.example.com/a.ics", "regex": "(\\w+)"},
            {"key": "ops", "ical": "https://cal.example.com/b.ics", "regex": "(\\w+)"}
        ]);
        let err = Config::from_json(&sample(&projects.to_string())).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_bad_project_key_rejected() {
        let json = one_project("OPS/1", "https://cal.example.com/a.ics", r"(\w+)");
        assert!(matches!(
            Config::from_json(&json).unwrap_err(),
            ConfigError::Invalid(_)
        ));
    }

    #[test]
    fn test_missing_field_is_parse_error() {
        let json = r#"{"jira": {"server": "https://jira.example.com", "username": "bot"}, "projects": []}"#;
        assert!(matches!(
            Config::from_json(json).unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let json = r#"{
            "jira": {"server": "https://jira.example.com", "username": "bot", "password": "x"},
            "timeout_secs": 0,
            "projects": [{"key": "OPS", "ical": "https://cal.example.com/a.ics", "regex": "(\\w+)"}]
        }"#;
        assert!(matches!(
            Config::from_json(json).unwrap_err(),
            ConfigError::Invalid(_)
        ));
    }

    #[test]
    fn test_debug_redacts_password() {
        let json = one_project("OPS", "https://cal.example.com/a.ics", r"(\w+)");
        let config = Config::from_json(&json).unwrap();
        let rendered = format!("{:?}", config.jira);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_load_from_file_with_env_override() {
        let _lock = ENV_MUTEX.lock().unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        let json = one_project("OPS", "https://cal.example.com/a.ics", r"(\w+)");
        file.write_all(json.as_bytes()).unwrap();

        env::remove_var(ENV_JIRA_PASSWORD);
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.jira.password, "hunter2");

        env::set_var(ENV_JIRA_PASSWORD, "from-env");
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.jira.password, "from-env");

        // Clean up
        env::remove_var(ENV_JIRA_PASSWORD);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/nonexistent/joca.conf").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("/nonexistent/joca.conf"));
    }
}
