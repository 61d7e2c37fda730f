//! Jira On Call Assignee.
//!
//! Keeps the lead of one or more Jira projects pointed at whoever is on call
//! according to an iCalendar feed. A run is a single sequential pass:
//!
//! - read the project's current lead from Jira
//! - download the on-call ICS feed and find the event active right now
//! - pull a username out of that event's summary with a configured regex
//! - canonicalize it through Jira's assignable-user search
//! - update the project lead when it differs
//!
//! # Usage
//!
//! ```no_run
//! use std::process::ExitCode;
//!
//! use joca::{http_client_builder, init_http_client, Config, SyncOptions, Syncer};
//!
//! # async fn run() -> anyhow::Result<ExitCode> {
//! let config = Config::load("/etc/joca.conf")?;
//! let http = match init_http_client(http_client_builder(config.timeout)) {
//!     Ok(client) => client,
//!     Err(code) => return Ok(ExitCode::from(code)),
//! };
//! let syncer = Syncer::new(config, http, SyncOptions::default());
//!
//! let report = syncer.run(chrono::Utc::now()).await;
//! Ok(ExitCode::from(report.exit_code()))
//! # }
//! ```
//!
//! # Exit status
//!
//! - `0`: every project was already correct, updated, or (dry run) would be
//!   updated
//! - `1`: the config could not be loaded, or a project failed, or Jira
//!   refused a lead update with a non-200 status
//! - `71` (`EX_OSERR`): the HTTP client could not be initialized
//!
//! # Configuration
//!
//! See [`config`] for the file format. `JOCA_JIRA_PASSWORD` overrides the
//! password stored in the file.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod calendar;
pub mod config;
pub mod error;
pub mod jira;
pub mod oncall;
pub mod sync;

use std::time::Duration;

use tracing::error;

pub use calendar::{CalendarClient, CalendarEvent};
pub use config::{Config, JiraSettings, ProjectConfig, TieBreak};
pub use error::{CalendarError, ConfigError, JiraError, OnCallError, SyncError};
pub use jira::{JiraClient, UserKey};
pub use oncall::{OnCall, OnCallResolver};
pub use sync::{ProjectResult, SyncOptions, SyncOutcome, SyncReport, Syncer};

/// Exit code used when the process cannot set up its HTTP stack (`EX_OSERR`).
pub const EX_OSERR: u8 = 71;

/// Client builder for the HTTP client shared by the Jira and calendar calls.
#[must_use]
pub fn http_client_builder(timeout: Duration) -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("joca/", env!("CARGO_PKG_VERSION")))
}

/// Build the shared HTTP client.
///
/// # Errors
/// Returns error if the TLS backend or client cannot be initialized.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    http_client_builder(timeout).build()
}

/// Build the shared HTTP client, mapping failure to the process exit code.
///
/// # Errors
/// Returns [`EX_OSERR`] when the client cannot be built.
pub fn init_http_client(builder: reqwest::ClientBuilder) -> Result<reqwest::Client, u8> {
    builder.build().map_err(|e| {
        error!(error = %e, "Failed to initialize HTTP client");
        EX_OSERR
    })
}
