//! External calendar synchronization.
//!
//! [`CalendarService`] is the seam between the scheduler and a remote
//! calendar. [`GoogleCalendarClient`] implements it over the Google
//! Calendar REST API; [`EventManager`] keeps the local store aligned with it.

pub mod calendar_client;
mod manager;
pub mod types;

pub use calendar_client::{to_gcal_event, to_gcal_patch, GoogleCalendarClient};
pub use manager::{EventManager, PullSummary};
pub use types::{RemoteEvent, RemoteListing};

use chrono::{DateTime, Utc};

use crate::error::CalendarError;
use crate::event::Event;

/// Remote calendar operations keyed by external event id.
pub trait CalendarService {
    /// Events intersecting `[from, to)` plus ids cancelled in that range.
    fn list_events(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<RemoteListing, CalendarError>;

    /// Create `event` remotely and return its external id.
    fn insert_event(&self, event: &Event) -> Result<String, CalendarError>;

    /// Replace the summary and times of an existing remote event.
    fn update_event(&self, external_id: &str, event: &Event) -> Result<(), CalendarError>;

    /// Move an existing remote event.
    fn patch_event(
        &self,
        external_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(), CalendarError>;

    fn delete_event(&self, external_id: &str) -> Result<(), CalendarError>;
}
