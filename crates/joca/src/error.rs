//! Error types for configuration, Jira, calendar and sync operations.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors raised while loading or validating the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Config file is not valid JSON or does not have the expected shape
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field is present but unusable
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// Project regex does not compile
    #[error("Project {project}: invalid regex: {source}")]
    InvalidRegex {
        project: String,
        source: regex::Error,
    },

    /// Project regex has nothing to extract
    #[error("Project {project}: regex must contain at least one capture group")]
    MissingCaptureGroup { project: String },

    /// Server or feed URL does not parse
    #[error("Invalid URL for {field}: {source}")]
    InvalidUrl {
        field: String,
        source: url::ParseError,
    },
}

/// Errors that can occur when talking to the Jira REST API.
#[derive(Debug, Error)]
pub enum JiraError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Jira answered with a non-success status
    #[error("Jira API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Project exists but has no lead we can identify
    #[error("Project {0} has no lead")]
    NoLead(String),

    /// Response body did not deserialize
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors that can occur when fetching or parsing an ICS feed.
#[derive(Debug, Error)]
pub enum CalendarError {
    /// Feed download failed
    #[error("Failed to fetch calendar: {0}")]
    Fetch(#[from] reqwest::Error),

    /// Feed server answered with a non-success status
    #[error("Calendar feed {url} returned status {status}")]
    Status { status: u16, url: String },

    /// Feed body is not valid iCalendar
    #[error("Failed to parse calendar: {0}")]
    Parse(String),
}

/// Errors that prevent determining who is on call.
#[derive(Debug, Error)]
pub enum OnCallError {
    #[error(transparent)]
    Calendar(#[from] CalendarError),

    #[error(transparent)]
    Jira(#[from] JiraError),

    /// No event brackets the evaluation instant
    #[error("No calendar event is active at {at}")]
    NoActiveEvent { at: DateTime<Utc> },

    /// The active event's summary did not yield a capture
    #[error("Summary {summary:?} does not match the configured pattern")]
    NoMatch { summary: String },

    /// Jira knows no assignable user for the extracted name
    #[error("No assignable user matching {candidate:?} in project {project}")]
    NoAssignableUser { candidate: String, project: String },
}

/// Errors that abort syncing a single project.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Reading or writing the project failed
    #[error("Jira: {0}")]
    Jira(#[from] JiraError),

    /// On-call lead could not be resolved
    #[error("On-call resolution: {0}")]
    OnCall(#[from] OnCallError),
}
