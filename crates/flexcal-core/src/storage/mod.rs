mod config;
pub mod event_db;
mod memory;
pub mod migrations;

pub use config::{CalendarConfig, Config, OptimizerConfig};
pub use event_db::{EventDb, EventFilter, EventStatus, OrderBy};
pub use memory::MemoryEventStore;

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::event::{Event, EventId};

/// A new placement for a stored event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementUpdate {
    pub id: EventId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Keyed event storage with range queries.
///
/// Implementations must return flexible events with their window populated.
pub trait EventStore {
    /// Events whose interval intersects `[from, to)`, ordered by start time.
    fn fetch_events_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Event>, StoreError>;

    /// Overwrite the placement of one event.
    fn upsert_placement(
        &mut self,
        id: EventId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Apply several placements so that either all or none take effect.
    ///
    /// The default applies them one by one; stores with transactions should
    /// override it.
    fn apply_placements(&mut self, updates: &[PlacementUpdate]) -> Result<(), StoreError> {
        for update in updates {
            self.upsert_placement(update.id, update.start, update.end)?;
        }
        Ok(())
    }
}

/// Returns `~/.config/flexcal[-dev]/` based on FLEXCAL_ENV.
///
/// Set FLEXCAL_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, StoreError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("FLEXCAL_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("flexcal-dev")
    } else {
        base_dir.join("flexcal")
    };

    std::fs::create_dir_all(&dir).map_err(|e| StoreError::DataDir(e.to_string()))?;
    Ok(dir)
}
