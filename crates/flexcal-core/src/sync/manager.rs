//! Keeps the local event database and the external calendar aligned.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::CalendarService;
use crate::error::{CalendarError, Result, StoreError, ValidationError};
use crate::event::{Event, EventId, EventKind};
use crate::storage::{EventDb, EventStatus};

/// Outcome of [`EventManager::pull`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PullSummary {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
}

/// Writes events to both sides and pulls remote changes into the database.
pub struct EventManager<'a, C: CalendarService + ?Sized> {
    db: &'a EventDb,
    calendar: &'a C,
}

impl<'a, C: CalendarService + ?Sized> EventManager<'a, C> {
    pub fn new(db: &'a EventDb, calendar: &'a C) -> Self {
        Self { db, calendar }
    }

    /// Record a new event locally and, unless it already has one, remotely.
    ///
    /// Returns the stored event with its id and external id set. If the
    /// local insert fails after the remote one succeeded, the remote event
    /// is deleted again.
    pub fn submit(&self, event: Event) -> Result<Event> {
        event.validate()?;

        let event = match event.external_id() {
            Some(_) => event,
            None => {
                let external_id = self.calendar.insert_event(&event)?;
                event.with_external_id(external_id)
            }
        };

        match self.db.insert_event(&event) {
            Ok(id) => Ok(event.with_id(id)),
            Err(e) => {
                if let Some(external_id) = event.external_id() {
                    if let Err(undo) = self.calendar.delete_event(external_id) {
                        warn!(
                            %external_id,
                            error = %undo,
                            "failed to remove orphaned calendar event"
                        );
                    }
                }
                Err(e.into())
            }
        }
    }

    /// Replace a stored event's summary, placement and window on both sides.
    ///
    /// `event` must carry the id of a stored event; its external id is taken
    /// from the stored row. A calendar failure restores the stored row.
    /// Switching between fixed and flexible removes the event and submits it
    /// again, so the returned event has a new external id.
    pub fn edit(&self, event: Event) -> Result<Event> {
        let id = event.id().ok_or(ValidationError::MissingId)?;
        event.validate()?;
        let stored = self.db.get_event(id)?;

        if stored.is_flexible() != event.is_flexible() {
            debug!(%id, "event kind changed, replacing");
            self.remove(id)?;
            return self.submit(detached(&event)?);
        }

        let mut event = event;
        event.set_external_id(stored.external_id().map(str::to_string));
        self.db.update_event(&event)?;

        if let Some(external_id) = event.external_id() {
            if let Err(e) = self.calendar.update_event(external_id, &event) {
                warn!(%external_id, error = %e, "calendar update failed, restoring event");
                if let Err(undo) = self.db.update_event(&stored) {
                    error!(%id, error = %undo, "failed to restore edited event");
                }
                return Err(e.into());
            }
        }

        info!(%id, summary = event.summary(), "event edited");
        Ok(event)
    }

    /// Delete an event from the calendar (if synchronized) and the database.
    pub fn remove(&self, id: EventId) -> Result<()> {
        let event = self.db.get_event(id)?;
        if let Some(external_id) = event.external_id() {
            match self.calendar.delete_event(external_id) {
                Ok(()) => {}
                Err(CalendarError::NotFound(_)) => {
                    debug!(%external_id, "calendar event already gone");
                }
                Err(e) => return Err(e.into()),
            }
        }
        self.db.delete_event(id)?;
        Ok(())
    }

    /// Bring remote changes in `[from, to)` into the database.
    ///
    /// New remote events are stored as fixed. A modified event that was
    /// flexible stays flexible while its new placement still fits its
    /// window; otherwise it becomes fixed at the remote placement.
    pub fn pull(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<PullSummary> {
        let listing = self.calendar.list_events(from, to)?;
        let mut summary = PullSummary::default();

        for remote in listing.events {
            let incoming = remote.into_event()?;
            match self.db.event_status(&incoming)? {
                EventStatus::New => {
                    self.db.insert_event(&incoming)?;
                    summary.inserted += 1;
                }
                EventStatus::Modified => {
                    let external_id = incoming.external_id().unwrap_or_default();
                    let stored = self.db.get_by_external_id(external_id)?;
                    self.db.update_event(&merge(&stored, incoming)?)?;
                    summary.updated += 1;
                }
                EventStatus::Unchanged => summary.unchanged += 1,
            }
        }

        for external_id in &listing.cancelled {
            match self.db.get_by_external_id(external_id) {
                Ok(stored) => {
                    if let Some(id) = stored.id() {
                        self.db.delete_event(id)?;
                        summary.deleted += 1;
                    }
                }
                Err(StoreError::ExternalIdNotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        info!(
            inserted = summary.inserted,
            updated = summary.updated,
            deleted = summary.deleted,
            unchanged = summary.unchanged,
            "calendar pulled"
        );
        Ok(summary)
    }
}

/// Copy of `event` without its id and external id.
fn detached(event: &Event) -> Result<Event> {
    Ok(match event.kind() {
        EventKind::Flexible { window } => {
            Event::flexible(event.summary(), event.span(), window)?
        }
        EventKind::Fixed => Event::fixed(event.summary(), event.span())?,
    })
}

/// Apply a remote edit to the stored event, keeping its id.
fn merge(stored: &Event, incoming: Event) -> Result<Event> {
    let span = incoming.span();
    let merged = match stored.kind() {
        EventKind::Flexible { window } if window.contains(&span) => {
            Event::flexible(incoming.summary(), span, window)?
        }
        _ => Event::fixed(incoming.summary(), span)?,
    };

    let merged = match incoming.external_id() {
        Some(external_id) => merged.with_external_id(external_id),
        None => merged,
    };
    Ok(match stored.id() {
        Some(id) => merged.with_id(id),
        None => merged,
    })
}
