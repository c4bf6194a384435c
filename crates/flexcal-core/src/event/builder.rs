//! Builders turning user input into validated events.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::model::{Event, TimeSpan};
use crate::error::{Result, SchedulerError, ValidationError};
use crate::storage::EventStore;
use crate::timeline::SlotFinder;

fn require_summary(summary: &str) -> Result<(), ValidationError> {
    if summary.trim().is_empty() {
        return Err(ValidationError::EmptySummary);
    }
    Ok(())
}

/// Builder for fixed events.
pub struct FixedEventBuilder;

impl FixedEventBuilder {
    /// Create a fixed event from its start and end.
    pub fn build(summary: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Event> {
        require_summary(summary)?;
        let span = TimeSpan::new(start, end)?;
        Ok(Event::fixed(summary, span)?)
    }
}

/// Builder for flexible events.
///
/// New flexible events are placed in the earliest gap of their window that
/// no recorded event occupies.
pub struct FlexibleEventBuilder<'a, S: EventStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: EventStore + ?Sized> FlexibleEventBuilder<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Create a flexible event of `duration_minutes` inside `[valid_start, valid_end]`.
    ///
    /// # Errors
    /// - [`SchedulerError::InvalidWindow`] if the window cannot hold the duration,
    ///   checked before the store is queried
    /// - [`SchedulerError::NoAvailableSlot`] if every gap is too short
    /// - [`SchedulerError::StoreUnavailable`] if the range query fails
    pub fn build(
        &self,
        summary: &str,
        valid_start: DateTime<Utc>,
        valid_end: DateTime<Utc>,
        duration_minutes: i64,
    ) -> Result<Event> {
        require_summary(summary)?;
        let finder = SlotFinder::new(valid_start, valid_end, duration_minutes)?;

        let mut clashes = self.store.fetch_events_in_range(valid_start, valid_end)?;
        clashes.sort_by_key(|e| (e.start(), e.end()));
        let occupied: Vec<TimeSpan> = clashes.iter().map(Event::span).collect();
        debug!(summary, occupied = occupied.len(), "placing flexible event");

        let slot = finder
            .find(&occupied)
            .into_slot()
            .ok_or(SchedulerError::NoAvailableSlot {
                valid_start,
                valid_end,
                duration_minutes,
            })?;

        let window = TimeSpan::new(valid_start, valid_end)?;
        let event = Event::flexible(summary, slot, window)?;
        info!(%event, "placed flexible event");
        Ok(event)
    }

    /// Rebuild a flexible event whose placement is already known
    /// (read back from storage or the calendar).
    pub fn with_placement(summary: &str, span: TimeSpan, window: TimeSpan) -> Result<Event> {
        require_summary(summary)?;
        Ok(Event::flexible(summary, span, window)?)
    }
}
