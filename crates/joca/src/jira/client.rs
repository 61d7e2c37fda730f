//! Jira REST API client implementation.
//!
//! Reads go through `/rest/api/2`, the lead update through `/rest/api/latest`.

use std::io::{self, Write};

use reqwest::{Client, StatusCode};
use tracing::{debug, instrument, warn};

use super::models::{Project, UpdateLeadRequest, User, UserKey};
use crate::config::JiraSettings;
use crate::error::JiraError;

/// Page size for the assignable-user search.
const SEARCH_MAX_RESULTS: &str = "50";

/// Jira client authenticated with basic auth.
#[derive(Clone)]
pub struct JiraClient {
    /// HTTP client.
    client: Client,
    /// Server base URL without trailing slash.
    server: String,
    /// Basic auth username.
    username: String,
    /// Basic auth password.
    password: String,
}

impl JiraClient {
    /// Create a Jira client on top of a shared HTTP client.
    #[must_use]
    pub fn new(client: Client, settings: &JiraSettings) -> Self {
        Self {
            client,
            server: settings.server.trim_end_matches('/').to_string(),
            username: settings.username.clone(),
            password: settings.password.clone(),
        }
    }

    /// Make an authenticated GET request and decode the JSON body.
    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, JiraError> {
        let url = format!("{}{path}", self.server);
        debug!(url = %url, "GET request");

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .query(query)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Handle API response, parsing JSON or error.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, JiraError> {
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            serde_json::from_str(&text).map_err(|e| {
                warn!(error = %e, body = %text, "Failed to parse Jira response");
                JiraError::Serialization(e)
            })
        } else {
            Err(JiraError::Api {
                status: status.as_u16(),
                message: text,
            })
        }
    }

    /// Fetch a project's metadata.
    #[instrument(skip(self))]
    pub async fn project(&self, project_key: &str) -> Result<Project, JiraError> {
        let key = project_key.to_uppercase();
        self.get(&format!("/rest/api/2/project/{key}"), &[]).await
    }

    /// Return the user key of a project's current lead.
    ///
    /// # Errors
    /// Returns [`JiraError::NoLead`] when the project has no identifiable lead.
    #[instrument(skip(self))]
    pub async fn project_lead(&self, project_key: &str) -> Result<UserKey, JiraError> {
        let project = self.project(project_key).await?;
        let lead = project
            .lead
            .as_ref()
            .and_then(User::user_key)
            .ok_or_else(|| JiraError::NoLead(project.key.clone()))?;

        debug!(project = %project.key, lead = %lead, "Current project lead");
        Ok(lead)
    }

    /// Search users matching `username` that can be assigned issues in the
    /// project, in Jira's relevance order.
    #[instrument(skip(self))]
    pub async fn search_assignable_users(
        &self,
        username: &str,
        project_key: &str,
    ) -> Result<Vec<User>, JiraError> {
        let users: Vec<User> = self
            .get(
                "/rest/api/2/user/assignable/multiProjectSearch",
                &[
                    ("username", username),
                    ("projectKeys", project_key),
                    ("startAt", "0"),
                    ("maxResults", SEARCH_MAX_RESULTS),
                ],
            )
            .await?;

        debug!(count = users.len(), "Assignable users found");
        Ok(users)
    }

    /// Set the project lead.
    ///
    /// Returns `Ok(true)` on HTTP 200. Any other status is reported on
    /// standard output (status line, then body) and returns `Ok(false)`;
    /// only transport failures are errors.
    #[instrument(skip(self, lead), fields(lead = %lead))]
    pub async fn update_project_lead(
        &self,
        project_key: &str,
        lead: &UserKey,
    ) -> Result<bool, JiraError> {
        let url = format!("{}/rest/api/latest/project/{project_key}", self.server);
        debug!(url = %url, "PUT request");

        let response = self
            .client
            .put(&url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&UpdateLeadRequest {
                lead: lead.as_str(),
            })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::OK {
            return Ok(true);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(status = %status, body = %body, "Jira rejected project lead update");
        if let Err(e) = write_update_response(&mut io::stdout().lock(), status, &body) {
            warn!(error = %e, "Failed to write rejected update to stdout");
        }
        Ok(false)
    }
}

/// Write a lead-update response for the operator: nothing on 200, otherwise
/// the numeric status on one line and the body on the next.
fn write_update_response(out: &mut impl Write, status: StatusCode, body: &str) -> io::Result<()> {
    if status == StatusCode::OK {
        return Ok(());
    }
    writeln!(out, "{}", status.as_u16())?;
    writeln!(out, "{body}")
}
