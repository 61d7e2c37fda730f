//! On-call resolution: who should lead a project at a given instant.

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{debug, instrument, warn};

use crate::calendar::{CalendarClient, CalendarEvent};
use crate::config::{ProjectConfig, TieBreak};
use crate::error::OnCallError;
use crate::jira::{JiraClient, User, UserKey};

/// Resolved on-call user for a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnCall {
    /// Name extracted from the event summary
    pub candidate: String,
    /// Jira user key the candidate resolved to
    pub user: UserKey,
    /// Summary of the event the candidate came from
    pub summary: String,
}

/// Pick the event active at `at` according to `tie_break`.
#[must_use]
pub fn active_event(
    events: &[CalendarEvent],
    at: DateTime<Utc>,
    tie_break: TieBreak,
) -> Option<&CalendarEvent> {
    let active = events.iter().filter(|e| e.contains(at));
    match tie_break {
        // min_by_key keeps the first of equal starts
        TieBreak::EarliestStart => active.min_by_key(|e| e.start),
        TieBreak::LastInFeed => active.last(),
    }
}

/// Apply `pattern` to `summary` and return capture group 1.
#[must_use]
pub fn extract_candidate(pattern: &Regex, summary: &str) -> Option<String> {
    pattern
        .captures(summary)?
        .get(1)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolves a project's on-call user from its calendar and Jira.
pub struct OnCallResolver<'a> {
    calendar: &'a CalendarClient,
    jira: &'a JiraClient,
}

impl<'a> OnCallResolver<'a> {
    #[must_use]
    pub fn new(calendar: &'a CalendarClient, jira: &'a JiraClient) -> Self {
        Self { calendar, jira }
    }

    /// Determine the user who should lead `project` at `at`.
    ///
    /// Downloads the project's feed, selects the active event, extracts the
    /// candidate name from its summary and canonicalizes it through the
    /// assignable-user search (first result wins).
    #[instrument(skip_all, fields(project = %project.key, at = %at))]
    pub async fn resolve(
        &self,
        project: &ProjectConfig,
        at: DateTime<Utc>,
    ) -> Result<OnCall, OnCallError> {
        let events = self.calendar.fetch_events(&project.ical).await?;

        let active_count = events.iter().filter(|e| e.contains(at)).count();
        if active_count > 1 {
            warn!(
                active = active_count,
                tie_break = ?project.tie_break,
                "Multiple on-call events overlap"
            );
        }

        let event = active_event(&events, at, project.tie_break)
            .ok_or(OnCallError::NoActiveEvent { at })?;

        let candidate = extract_candidate(&project.pattern, &event.summary).ok_or_else(|| {
            OnCallError::NoMatch {
                summary: event.summary.clone(),
            }
        })?;
        debug!(candidate = %candidate, uid = ?event.uid, "Extracted on-call candidate");

        let users = self
            .jira
            .search_assignable_users(&candidate, &project.key)
            .await?;
        let user = users
            .first()
            .and_then(User::user_key)
            .ok_or_else(|| OnCallError::NoAssignableUser {
                candidate: candidate.clone(),
                project: project.key.clone(),
            })?;

        Ok(OnCall {
            candidate,
            user,
            summary: event.summary.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn event(summary: &str, start: &str, end: &str) -> CalendarEvent {
        CalendarEvent {
            uid: None,
            summary: summary.to_string(),
            start: utc(start),
            end: utc(end),
        }
    }

    fn rotation() -> Vec<CalendarEvent> {
        vec![
            event("On call: alice", "2024-01-01T09:00:00Z", "2024-01-08T09:00:00Z"),
            event("On call: bob", "2024-01-08T09:00:00Z", "2024-01-15T09:00:00Z"),
        ]
    }

    #[test]
    fn test_active_event_second_of_two() {
        let events = rotation();
        let active = active_event(&events, utc("2024-01-10T12:00:00Z"), TieBreak::default());
        assert_eq!(active.unwrap().summary, "On call: bob");
    }

    #[test]
    fn test_active_event_handover_instant_belongs_to_next() {
        let events = rotation();
        let active = active_event(&events, utc("2024-01-08T09:00:00Z"), TieBreak::default());
        assert_eq!(active.unwrap().summary, "On call: bob");
    }

    #[test]
    fn test_no_active_event() {
        let events = rotation();
        assert!(active_event(&events, utc("2024-02-01T00:00:00Z"), TieBreak::default()).is_none());
        assert!(active_event(&[], utc("2024-01-02T00:00:00Z"), TieBreak::LastInFeed).is_none());
    }

    #[test]
    fn test_overlap_earliest_start_wins() {
        let events = vec![
            event("Override: carol", "2024-01-03T00:00:00Z", "2024-01-04T00:00:00Z"),
            event("On call: alice", "2024-01-01T09:00:00Z", "2024-01-08T09:00:00Z"),
        ];
        let at = utc("2024-01-03T12:00:00Z");

        let earliest = active_event(&events, at, TieBreak::EarliestStart).unwrap();
        assert_eq!(earliest.summary, "On call: alice");

        let last = active_event(&events, at, TieBreak::LastInFeed).unwrap();
        assert_eq!(last.summary, "On call: alice");

        let reversed: Vec<_> = events.into_iter().rev().collect();
        let last = active_event(&reversed, at, TieBreak::LastInFeed).unwrap();
        assert_eq!(last.summary, "Override: carol");
    }

    #[test]
    fn test_overlap_equal_start_keeps_feed_order() {
        let events = vec![
            event("On call: dave", "2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z"),
            event("On call: erin", "2024-01-01T00:00:00Z", "2024-01-03T00:00:00Z"),
        ];
        let at = utc("2024-01-01T06:00:00Z");
        assert_eq!(
            active_event(&events, at, TieBreak::EarliestStart).unwrap().summary,
            "On call: dave"
        );
        assert_eq!(
            active_event(&events, at, TieBreak::LastInFeed).unwrap().summary,
            "On call: erin"
        );
    }

    #[test]
    fn test_extract_candidate() {
        let pattern = Regex::new(r"On call: (\w+)").unwrap();
        assert_eq!(
            extract_candidate(&pattern, "Primary On call: alice (week 1)"),
            Some("alice".to_string())
        );
        assert_eq!(extract_candidate(&pattern, "Holiday"), None);
    }

    #[test]
    fn test_extract_candidate_optional_group_not_matched() {
        let pattern = Regex::new(r"On call(?:: (\w+))?").unwrap();
        assert_eq!(extract_candidate(&pattern, "On call"), None);
    }
}
