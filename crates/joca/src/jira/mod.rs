//! Jira REST client for project leads.
//!
//! Covers the three calls the sync needs:
//!
//! - read a project's current lead (`GET /rest/api/2/project/{key}`)
//! - search users assignable to a project
//!   (`GET /rest/api/2/user/assignable/multiProjectSearch`)
//! - set a project's lead (`PUT /rest/api/latest/project/{key}`)
//!
//! All calls use basic authentication.

mod client;
mod models;

pub use client::JiraClient;
pub use models::*;
