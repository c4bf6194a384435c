//! In-process event store.

use chrono::{DateTime, Utc};

use super::{EventStore, PlacementUpdate};
use crate::error::StoreError;
use crate::event::{Event, EventId, TimeSpan};

/// Vector-backed [`EventStore`] for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventStore {
    events: Vec<Event>,
    next_id: i64,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `event` under a fresh id and return the id.
    pub fn insert(&mut self, event: Event) -> EventId {
        self.next_id += 1;
        let id = EventId(self.next_id);
        self.events.push(event.with_id(id));
        id
    }

    pub fn get(&self, id: EventId) -> Option<&Event> {
        self.events.iter().find(|e| e.id() == Some(id))
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn position(&self, id: EventId) -> Result<usize, StoreError> {
        self.events
            .iter()
            .position(|e| e.id() == Some(id))
            .ok_or(StoreError::NotFound(id))
    }

    fn relocated(
        &self,
        index: usize,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Event, StoreError> {
        let mut event = self.events[index].clone();
        let row_id = event.id().map(|id| id.0).unwrap_or_default();
        let corrupt = |message: String| StoreError::CorruptRow {
            id: row_id,
            message,
        };
        let span = TimeSpan::new(start, end).map_err(|e| corrupt(e.to_string()))?;
        if span.duration_minutes() != event.duration_minutes() {
            return Err(corrupt("placement changes the event duration".into()));
        }
        event.relocate(start).map_err(|e| corrupt(e.to_string()))?;
        Ok(event)
    }
}

impl EventStore for MemoryEventStore {
    fn fetch_events_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Event>, StoreError> {
        let mut found: Vec<Event> = self
            .events
            .iter()
            .filter(|e| e.start() < to && e.end() > from)
            .cloned()
            .collect();
        found.sort_by_key(|e| (e.start(), e.end()));
        Ok(found)
    }

    fn upsert_placement(
        &mut self,
        id: EventId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let index = self.position(id)?;
        self.events[index] = self.relocated(index, start, end)?;
        Ok(())
    }

    fn apply_placements(&mut self, updates: &[PlacementUpdate]) -> Result<(), StoreError> {
        // Validate everything before touching any event.
        let mut staged = Vec::with_capacity(updates.len());
        for update in updates {
            let index = self.position(update.id)?;
            staged.push((index, self.relocated(index, update.start, update.end)?));
        }
        for (index, event) in staged {
            self.events[index] = event;
        }
        Ok(())
    }
}
