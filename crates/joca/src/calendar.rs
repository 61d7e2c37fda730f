//! On-call ICS feed download and event extraction.
//!
//! Only `VEVENT` components are read, and from each only its summary, UID
//! and active window. Recurrence rules are not expanded. Dates are accepted
//! as:
//!
//! - UTC date-times (`20240101T090000Z`)
//! - date-times with a `TZID` parameter (IANA names)
//! - floating date-times, taken in the host's local time zone
//! - `VALUE=DATE` dates, starting at local midnight
//!
//! An event with no `DTEND` ends at `DTSTART + DURATION`.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use ical::parser::ical::component::IcalEvent;
use ical::property::Property;
use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use crate::error::CalendarError;

/// `DATE-TIME` layout without the trailing `Z`.
const DATE_TIME_FORMAT: &str = "%Y%m%dT%H%M%S";

/// `DATE` layout.
const DATE_FORMAT: &str = "%Y%m%d";

/// A calendar event with a resolved active window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    /// Event unique identifier (UID)
    pub uid: Option<String>,
    /// Event summary/title
    pub summary: String,
    /// Inclusive start
    pub start: DateTime<Utc>,
    /// Exclusive end
    pub end: DateTime<Utc>,
}

impl CalendarEvent {
    /// Whether the event brackets `at` (`start <= at < end`).
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

/// Downloads and parses ICS feeds.
#[derive(Clone)]
pub struct CalendarClient {
    client: Client,
}

impl CalendarClient {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Fetch an ICS feed with a plain GET and return its events.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch_events(&self, url: &Url) -> Result<Vec<CalendarEvent>, CalendarError> {
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CalendarError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let text = response.text().await?;
        let events = parse_ics(&text)?;
        debug!(count = events.len(), "Parsed calendar events");
        Ok(events)
    }
}

/// Parse ICS text into events, in feed order.
///
/// Events without a usable start or end are skipped.
pub fn parse_ics(text: &str) -> Result<Vec<CalendarEvent>, CalendarError> {
    let reader = ical::IcalParser::new(text.as_bytes());
    let mut events = Vec::new();

    for calendar in reader {
        let calendar = calendar.map_err(|e| CalendarError::Parse(e.to_string()))?;

        for event in &calendar.events {
            match parse_event(event) {
                Some(parsed) => events.push(parsed),
                None => debug!(
                    uid = ?property_value(&event.properties, "UID"),
                    "Skipping event without a usable time window"
                ),
            }
        }
    }

    Ok(events)
}

fn parse_event(event: &IcalEvent) -> Option<CalendarEvent> {
    let mut summary = None;
    let mut uid = None;
    let mut start = None;
    let mut end = None;
    let mut duration = None;

    for property in &event.properties {
        match property.name.to_ascii_uppercase().as_str() {
            "SUMMARY" => summary.clone_from(&property.value),
            "UID" => uid.clone_from(&property.value),
            "DTSTART" => start = parse_date_property(property),
            "DTEND" => end = parse_date_property(property),
            "DURATION" => duration = property.value.as_deref().and_then(parse_duration),
            _ => {}
        }
    }

    let start = start?;
    let end = match end {
        Some(end) => end,
        None => start.checked_add_signed(duration?)?,
    };

    Some(CalendarEvent {
        uid,
        summary: summary.unwrap_or_default(),
        start,
        end,
    })
}

fn property_value<'a>(properties: &'a [Property], name: &str) -> Option<&'a str> {
    properties
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(name))
        .and_then(|p| p.value.as_deref())
}

fn param<'a>(property: &'a Property, name: &str) -> Option<&'a str> {
    property
        .params
        .as_ref()?
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, values)| values.first())
        .map(|v| v.trim_matches('"'))
}

fn parse_date_property(property: &Property) -> Option<DateTime<Utc>> {
    let value = property.value.as_deref()?.trim();
    let date_only = param(property, "VALUE").is_some_and(|v| v.eq_ignore_ascii_case("DATE"))
        || !value.contains(['T', 't']);
    parse_ical_datetime(value, param(property, "TZID"), date_only)
}

/// Parse an iCalendar `DATE` or `DATE-TIME` value into UTC.
///
/// `tzid` applies to floating values; UTC values (`...Z`) ignore it. An
/// unknown `tzid` falls back to the host's local zone.
#[must_use]
pub fn parse_ical_datetime(
    value: &str,
    tzid: Option<&str>,
    date_only: bool,
) -> Option<DateTime<Utc>> {
    if date_only {
        let date = NaiveDate::parse_from_str(value, DATE_FORMAT).ok()?;
        return localize(&date.and_hms_opt(0, 0, 0)?, tzid);
    }

    if let Some(utc) = value.strip_suffix('Z').or_else(|| value.strip_suffix('z')) {
        let naive = NaiveDateTime::parse_from_str(utc, DATE_TIME_FORMAT).ok()?;
        return Some(Utc.from_utc_datetime(&naive));
    }

    let naive = NaiveDateTime::parse_from_str(value, DATE_TIME_FORMAT).ok()?;
    localize(&naive, tzid)
}

fn localize(naive: &NaiveDateTime, tzid: Option<&str>) -> Option<DateTime<Utc>> {
    let tz = tzid.and_then(|name| {
        let parsed = name.trim_start_matches('/').parse::<Tz>().ok();
        if parsed.is_none() {
            debug!(tzid = name, "Unknown TZID, using local time");
        }
        parsed
    });

    match tz {
        Some(tz) => tz
            .from_local_datetime(naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc)),
        None => Local
            .from_local_datetime(naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc)),
    }
}

/// Parse an iCalendar `DURATION` value (`P1W`, `PT8H`, `-P1DT12H`, ...).
#[must_use]
pub fn parse_duration(value: &str) -> Option<TimeDelta> {
    let value = value.trim();
    let (negative, rest) = if let Some(rest) = value.strip_prefix('-') {
        (true, rest)
    } else {
        (false, value.strip_prefix('+').unwrap_or(value))
    };
    let rest = rest.strip_prefix('P')?;

    let mut seconds: i64 = 0;
    let mut digits = String::new();
    let mut in_time = false;
    let mut seen_component = false;

    for c in rest.chars() {
        match c {
            '0'..='9' => digits.push(c),
            'T' if !in_time && digits.is_empty() => in_time = true,
            'W' | 'D' | 'H' | 'M' | 'S' => {
                let amount: i64 = digits.parse().ok()?;
                digits.clear();
                let unit = match (c, in_time) {
                    ('W', false) => 604_800,
                    ('D', false) => 86_400,
                    ('H', true) => 3_600,
                    ('M', true) => 60,
                    ('S', true) => 1,
                    _ => return None,
                };
                seconds = seconds.checked_add(amount.checked_mul(unit)?)?;
                seen_component = true;
            }
            _ => return None,
        }
    }

    if !digits.is_empty() || !seen_component {
        return None;
    }

    let delta = TimeDelta::try_seconds(seconds)?;
    Some(if negative { -delta } else { delta })
}
