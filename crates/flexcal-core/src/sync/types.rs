//! Calendar-side event types.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{CalendarError, ValidationError};
use crate::event::{Event, TimeSpan};

/// An event as read from the external calendar.
///
/// Calendar events carry no window, so they always come back as fixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEvent {
    pub external_id: String,
    pub summary: String,
    pub span: TimeSpan,
}

impl RemoteEvent {
    pub fn into_event(self) -> Result<Event, ValidationError> {
        Ok(Event::fixed(self.summary, self.span)?.with_external_id(self.external_id))
    }
}

/// One listing of a calendar range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteListing {
    pub events: Vec<RemoteEvent>,
    /// External ids of events cancelled in the range.
    pub cancelled: Vec<String>,
}

/// Page of `events.list`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GcalEventPage {
    #[serde(default)]
    pub items: Vec<GcalEvent>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GcalEvent {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub start: Option<GcalTime>,
    #[serde(default)]
    pub end: Option<GcalTime>,
}

/// Either a timed (`dateTime`) or an all-day (`date`) boundary.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GcalTime {
    pub date_time: Option<String>,
    pub date: Option<String>,
}

impl GcalTime {
    /// All-day dates resolve to local midnight in `tz`.
    fn resolve(&self, tz: &Tz) -> Result<DateTime<Utc>, CalendarError> {
        if let Some(dt) = &self.date_time {
            return DateTime::parse_from_rfc3339(dt)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| CalendarError::Malformed(format!("dateTime '{dt}': {e}")));
        }
        if let Some(date) = &self.date {
            let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map_err(|e| CalendarError::Malformed(format!("date '{date}': {e}")))?;
            return tz
                .from_local_datetime(&day.and_time(NaiveTime::MIN))
                .earliest()
                .map(|t| t.with_timezone(&Utc))
                .ok_or_else(|| CalendarError::Malformed(format!("no local midnight on {date}")));
        }
        Err(CalendarError::Malformed("time has neither dateTime nor date".into()))
    }
}

impl GcalEvent {
    pub fn is_cancelled(&self) -> bool {
        self.status.as_deref() == Some("cancelled")
    }

    pub fn into_remote(self, tz: &Tz) -> Result<RemoteEvent, CalendarError> {
        let missing =
            |field: &str| CalendarError::Malformed(format!("event {} has no {field}", self.id));
        let start = self.start.as_ref().ok_or_else(|| missing("start"))?.resolve(tz)?;
        let end = self.end.as_ref().ok_or_else(|| missing("end"))?.resolve(tz)?;
        let span = TimeSpan::new(start, end)
            .map_err(|e| CalendarError::Malformed(format!("event {}: {e}", self.id)))?;

        let summary = self
            .summary
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "(untitled)".to_string());

        Ok(RemoteEvent {
            external_id: self.id,
            summary,
            span,
        })
    }
}
