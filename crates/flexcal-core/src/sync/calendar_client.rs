//! Google Calendar v3 client.

use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};
use url::Url;

use super::types::{GcalEventPage, RemoteListing};
use super::CalendarService;
use crate::error::CalendarError;
use crate::event::Event;
use crate::storage::CalendarConfig;

const PAGE_SIZE: &str = "250";

/// Blocking Google Calendar client authenticated with a bearer token.
///
/// Obtaining and refreshing the token is the caller's job.
pub struct GoogleCalendarClient {
    http: Client,
    api_base: String,
    calendar_id: String,
    token: String,
    tz: Tz,
}

#[derive(Deserialize)]
struct Created {
    id: String,
}

impl GoogleCalendarClient {
    /// Create a client for the calendar in `config`.
    ///
    /// `tz` is sent with every written event and used for all-day events read back.
    pub fn new(config: &CalendarConfig, token: impl Into<String>, tz: Tz) -> Self {
        Self {
            http: Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            calendar_id: config.calendar_id.clone(),
            token: token.into(),
            tz,
        }
    }

    fn events_url(&self) -> Result<Url, CalendarError> {
        Ok(Url::parse(&format!(
            "{}/calendars/{}/events",
            self.api_base,
            urlencoding::encode(&self.calendar_id)
        ))?)
    }

    fn event_url(&self, external_id: &str) -> Result<Url, CalendarError> {
        Ok(Url::parse(&format!(
            "{}/calendars/{}/events/{}",
            self.api_base,
            urlencoding::encode(&self.calendar_id),
            urlencoding::encode(external_id)
        ))?)
    }

    /// Map non-success statuses to errors. 404 and 410 mean the event is gone.
    fn check(response: Response, external_id: Option<&str>) -> Result<Response, CalendarError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if let (Some(id), StatusCode::NOT_FOUND | StatusCode::GONE) = (external_id, status) {
            return Err(CalendarError::NotFound(id.to_string()));
        }
        let message = response.text().unwrap_or_default();
        Err(CalendarError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

impl CalendarService for GoogleCalendarClient {
    fn list_events(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<RemoteListing, CalendarError> {
        let mut listing = RemoteListing::default();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.events_url()?;
            {
                let mut query = url.query_pairs_mut();
                query
                    .append_pair("timeMin", &from.to_rfc3339_opts(SecondsFormat::Secs, true))
                    .append_pair("timeMax", &to.to_rfc3339_opts(SecondsFormat::Secs, true))
                    .append_pair("singleEvents", "true")
                    .append_pair("orderBy", "startTime")
                    .append_pair("showDeleted", "true")
                    .append_pair("maxResults", PAGE_SIZE);
                if let Some(token) = &page_token {
                    query.append_pair("pageToken", token);
                }
            }

            let response = self.http.get(url).bearer_auth(&self.token).send()?;
            let page: GcalEventPage = Self::check(response, None)?.json()?;

            for item in page.items {
                if item.is_cancelled() {
                    listing.cancelled.push(item.id);
                    continue;
                }
                let id = item.id.clone();
                match item.into_remote(&self.tz) {
                    Ok(remote) => listing.events.push(remote),
                    Err(e) => warn!(external_id = %id, error = %e, "skipping calendar event"),
                }
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(
            events = listing.events.len(),
            cancelled = listing.cancelled.len(),
            "calendar range listed"
        );
        Ok(listing)
    }

    fn insert_event(&self, event: &Event) -> Result<String, CalendarError> {
        let response = self
            .http
            .post(self.events_url()?)
            .bearer_auth(&self.token)
            .json(&to_gcal_event(event, &self.tz))
            .send()?;
        let created: Created = Self::check(response, None)?.json()?;
        info!(external_id = %created.id, summary = event.summary(), "calendar event created");
        Ok(created.id)
    }

    fn update_event(&self, external_id: &str, event: &Event) -> Result<(), CalendarError> {
        let response = self
            .http
            .patch(self.event_url(external_id)?)
            .bearer_auth(&self.token)
            .json(&to_gcal_event(event, &self.tz))
            .send()?;
        Self::check(response, Some(external_id))?;
        info!(%external_id, summary = event.summary(), "calendar event updated");
        Ok(())
    }

    fn patch_event(
        &self,
        external_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(), CalendarError> {
        let response = self
            .http
            .patch(self.event_url(external_id)?)
            .bearer_auth(&self.token)
            .json(&to_gcal_patch(start, end, &self.tz))
            .send()?;
        Self::check(response, Some(external_id))?;
        debug!(%external_id, %start, %end, "calendar event patched");
        Ok(())
    }

    fn delete_event(&self, external_id: &str) -> Result<(), CalendarError> {
        let response = self
            .http
            .delete(self.event_url(external_id)?)
            .bearer_auth(&self.token)
            .send()?;
        Self::check(response, Some(external_id))?;
        info!(%external_id, "calendar event deleted");
        Ok(())
    }
}

fn gcal_time(t: DateTime<Utc>, tz: &Tz) -> serde_json::Value {
    json!({
        "dateTime": t.with_timezone(tz).to_rfc3339_opts(SecondsFormat::Secs, false),
        "timeZone": tz.name(),
    })
}

/// Request body for `events.insert`, also sent as a full edit.
pub fn to_gcal_event(event: &Event, tz: &Tz) -> serde_json::Value {
    json!({
        "summary": event.summary(),
        "start": gcal_time(event.start(), tz),
        "end": gcal_time(event.end(), tz),
        "reminders": {"useDefault": true},
    })
}

/// Request body for `events.patch` moving an event.
pub fn to_gcal_patch(start: DateTime<Utc>, end: DateTime<Utc>, tz: &Tz) -> serde_json::Value {
    json!({
        "start": gcal_time(start, tz),
        "end": gcal_time(end, tz),
    })
}
