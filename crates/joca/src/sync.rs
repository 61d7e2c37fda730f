//! Per-project lead synchronization.
//!
//! Projects are processed one at a time, in config order. A failing project
//! is logged and recorded; the run moves on to the next one.

use chrono::{DateTime, Utc};
use tracing::{error, info, instrument, warn};

use crate::calendar::CalendarClient;
use crate::config::{Config, ProjectConfig};
use crate::error::SyncError;
use crate::jira::{JiraClient, UserKey};
use crate::oncall::OnCallResolver;

/// Run-time switches that are not part of the config file.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Resolve and compare, but never write.
    pub dry_run: bool,
    /// End the run at the first project whose lead is already correct.
    pub stop_on_first_match: bool,
}

/// What happened to one project.
#[derive(Debug)]
pub enum SyncOutcome {
    /// Lead already matched the on-call user.
    Unchanged { lead: UserKey },
    /// Lead was changed.
    Updated { from: UserKey, to: UserKey },
    /// Jira answered the update with a non-200 status.
    Rejected { from: UserKey, to: UserKey },
    /// Dry run: the lead would have been changed.
    WouldUpdate { from: UserKey, to: UserKey },
    /// The project could not be synced.
    Failed(SyncError),
}

impl SyncOutcome {
    /// Whether this outcome should make the run exit non-zero.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Rejected { .. } | Self::Failed(_))
    }
}

/// Outcome for a single project.
#[derive(Debug)]
pub struct ProjectResult {
    pub project: String,
    pub outcome: SyncOutcome,
}

/// Summary of a whole run.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub results: Vec<ProjectResult>,
    /// The run ended early on an already-correct project.
    pub stopped_early: bool,
}

impl SyncReport {
    /// Process exit code: 1 when any processed project failed or was
    /// rejected, 0 otherwise. Stopping early does not hide earlier failures.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        u8::from(self.results.iter().any(|r| r.outcome.is_failure()))
    }

    /// Number of projects whose lead was written successfully.
    #[must_use]
    pub fn updated(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, SyncOutcome::Updated { .. }))
            .count()
    }

    /// Number of projects that ended in failure.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome.is_failure())
            .count()
    }
}

/// Drives a sync run over every configured project.
pub struct Syncer {
    config: Config,
    jira: JiraClient,
    calendar: CalendarClient,
    options: SyncOptions,
}

impl Syncer {
    /// Create a syncer. `stop_on_first_match` is enabled if either the
    /// config or `options` asks for it.
    #[must_use]
    pub fn new(config: Config, http: reqwest::Client, mut options: SyncOptions) -> Self {
        options.stop_on_first_match |= config.stop_on_first_match;
        let jira = JiraClient::new(http.clone(), &config.jira);
        let calendar = CalendarClient::new(http);
        Self {
            config,
            jira,
            calendar,
            options,
        }
    }

    /// Sync every project against the schedule at `now`.
    pub async fn run(&self, now: DateTime<Utc>) -> SyncReport {
        if self.options.stop_on_first_match {
            warn!("stop_on_first_match enabled: the run ends at the first project that needs no change");
        }

        let mut report = SyncReport::default();

        for project in &self.config.projects {
            let outcome = match self.sync_project(project, now).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(project = %project.key, error = %e, "Failed to sync project");
                    SyncOutcome::Failed(e)
                }
            };

            let unchanged = matches!(outcome, SyncOutcome::Unchanged { .. });
            report.results.push(ProjectResult {
                project: project.key.clone(),
                outcome,
            });

            if unchanged && self.options.stop_on_first_match {
                info!(project = %project.key, "Lead already correct, stopping run");
                report.stopped_early = true;
                break;
            }
        }

        info!(
            projects = report.results.len(),
            updated = report.updated(),
            failed = report.failed(),
            "Sync run finished"
        );
        report
    }

    #[instrument(skip_all, fields(project = %project.key))]
    async fn sync_project(
        &self,
        project: &ProjectConfig,
        now: DateTime<Utc>,
    ) -> Result<SyncOutcome, SyncError> {
        let current = self.jira.project_lead(&project.key).await?;
        let on_call = OnCallResolver::new(&self.calendar, &self.jira)
            .resolve(project, now)
            .await?;

        if current == on_call.user {
            info!(lead = %current, "Project lead already matches on-call");
            return Ok(SyncOutcome::Unchanged { lead: current });
        }

        if self.options.dry_run {
            info!(from = %current, to = %on_call.user, "Dry run: would update project lead");
            return Ok(SyncOutcome::WouldUpdate {
                from: current,
                to: on_call.user,
            });
        }

        let accepted = self
            .jira
            .update_project_lead(&project.key, &on_call.user)
            .await?;

        if accepted {
            info!(from = %current, to = %on_call.user, "Project lead updated");
            Ok(SyncOutcome::Updated {
                from: current,
                to: on_call.user,
            })
        } else {
            Ok(SyncOutcome::Rejected {
                from: current,
                to: on_call.user,
            })
        }
    }
}
