//! SQLite-based event storage.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::{data_dir, migrations, EventStore, PlacementUpdate};
use crate::error::StoreError;
use crate::event::{Event, EventId, TimeSpan};

/// Which events a query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventFilter {
    #[default]
    All,
    Fixed,
    Flexible,
}

impl EventFilter {
    fn clause(self) -> &'static str {
        match self {
            EventFilter::All => "1 = 1",
            EventFilter::Fixed => "is_flexible = 0",
            EventFilter::Flexible => "is_flexible = 1",
        }
    }
}

/// Result ordering for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderBy {
    /// Event start, then event end.
    #[default]
    Start,
    /// Window start, then window end.
    WindowStart,
    /// Window end, then window start.
    WindowEnd,
}

impl OrderBy {
    fn clause(self) -> &'static str {
        match self {
            OrderBy::Start => "start_time, end_time",
            OrderBy::WindowStart => "valid_start, valid_end",
            OrderBy::WindowEnd => "valid_end, valid_start",
        }
    }
}

/// How a calendar copy of an event compares with the stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    New,
    Modified,
    Unchanged,
}

/// Format an instant for storage. Fixed width keeps string order chronological.
fn format_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_time(id: i64, s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::CorruptRow {
            id,
            message: format!("bad timestamp '{s}': {e}"),
        })
}

const EVENT_COLUMNS: &str =
    "id, summary, is_flexible, start_time, end_time, valid_start, valid_end, external_id";

/// Raw `events` row.
struct EventRow {
    id: i64,
    summary: String,
    is_flexible: bool,
    start_time: String,
    end_time: String,
    valid_start: String,
    valid_end: String,
    external_id: Option<String>,
}

impl EventRow {
    fn from_row(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(0)?,
            summary: row.get(1)?,
            is_flexible: row.get(2)?,
            start_time: row.get(3)?,
            end_time: row.get(4)?,
            valid_start: row.get(5)?,
            valid_end: row.get(6)?,
            external_id: row.get(7)?,
        })
    }

    fn into_event(self) -> Result<Event, StoreError> {
        let id = self.id;
        let corrupt = |message: String| StoreError::CorruptRow { id, message };

        let span = TimeSpan::new(
            parse_time(id, &self.start_time)?,
            parse_time(id, &self.end_time)?,
        )
        .map_err(|e| corrupt(e.to_string()))?;

        let event = if self.is_flexible {
            let window = TimeSpan::new(
                parse_time(id, &self.valid_start)?,
                parse_time(id, &self.valid_end)?,
            )
            .map_err(|e| corrupt(e.to_string()))?;
            Event::flexible(self.summary, span, window)
        } else {
            Event::fixed(self.summary, span)
        }
        .map_err(|e| corrupt(e.to_string()))?;

        let event = event.with_id(EventId(id));
        Ok(match self.external_id {
            Some(external_id) => event.with_external_id(external_id),
            None => event,
        })
    }
}

/// Write a placement through `conn`, checking it against the stored window.
fn write_placement(
    conn: &Connection,
    id: EventId,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<(), StoreError> {
    let mut event = load_event(conn, id)?;
    let corrupt = |message: String| StoreError::CorruptRow { id: id.0, message };

    let span = TimeSpan::new(start, end).map_err(|e| corrupt(e.to_string()))?;
    if span.duration_minutes() != event.duration_minutes() {
        return Err(corrupt("placement changes the event duration".into()));
    }
    event.relocate(start).map_err(|e| corrupt(e.to_string()))?;

    conn.execute(
        "UPDATE events
         SET start_time = ?1, end_time = ?2, last_updated = ?3
         WHERE id = ?4",
        params![format_time(start), format_time(end), format_time(Utc::now()), id.0],
    )?;
    debug!(%id, %span, "placement written");
    Ok(())
}

fn load_event(conn: &Connection, id: EventId) -> Result<Event, StoreError> {
    let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1");
    conn.query_row(&sql, [id.0], EventRow::from_row)
        .optional()?
        .ok_or(StoreError::NotFound(id))?
        .into_event()
}

/// SQLite database for events.
///
/// Stores both kinds of event; the window columns of a fixed event repeat
/// its own start and end.
pub struct EventDb {
    conn: Connection,
    timezone: String,
}

impl EventDb {
    /// Open the event database at `~/.config/flexcal/events.db`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StoreError> {
        Self::open_at(data_dir()?.join("events.db"))
    }

    /// Open (creating if needed) the database at `path`.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        migrations::migrate(&conn).map_err(|e| StoreError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn,
            timezone: "UTC".to_string(),
        })
    }

    /// Timezone name recorded alongside new and updated rows.
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    /// Insert `event` and return its new id.
    ///
    /// # Errors
    /// [`StoreError::DuplicateExternalId`] if an event with the same external id exists.
    pub fn insert_event(&self, event: &Event) -> Result<EventId, StoreError> {
        if let Some(external_id) = event.external_id() {
            if self.find_id_by_external_id(external_id)?.is_some() {
                return Err(StoreError::DuplicateExternalId(external_id.to_string()));
            }
        }

        let window = event.window();
        self.conn.execute(
            "INSERT INTO events (summary, is_flexible, start_time, end_time, duration,
                                 valid_start, valid_end, timezone, external_id, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                event.summary(),
                event.is_flexible(),
                format_time(event.start()),
                format_time(event.end()),
                event.duration_minutes(),
                format_time(window.start),
                format_time(window.end),
                self.timezone,
                event.external_id(),
                format_time(Utc::now()),
            ],
        )?;

        let id = EventId(self.conn.last_insert_rowid());
        info!(%id, summary = event.summary(), "event stored");
        Ok(id)
    }

    pub fn get_event(&self, id: EventId) -> Result<Event, StoreError> {
        load_event(&self.conn, id)
    }

    pub fn get_by_external_id(&self, external_id: &str) -> Result<Event, StoreError> {
        let id = self
            .find_id_by_external_id(external_id)?
            .ok_or_else(|| StoreError::ExternalIdNotFound(external_id.to_string()))?;
        self.get_event(id)
    }

    fn find_id_by_external_id(&self, external_id: &str) -> Result<Option<EventId>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id FROM events WHERE external_id = ?1 LIMIT 1",
                [external_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
            .map(EventId))
    }

    /// Overwrite every column of a stored event, including its window.
    pub fn update_event(&self, event: &Event) -> Result<(), StoreError> {
        let id = event
            .id()
            .ok_or_else(|| StoreError::QueryFailed("cannot update an event without id".into()))?;
        let window = event.window();
        let changed = self.conn.execute(
            "UPDATE events
             SET summary = ?1, is_flexible = ?2, start_time = ?3, end_time = ?4, duration = ?5,
                 valid_start = ?6, valid_end = ?7, timezone = ?8, external_id = ?9,
                 last_updated = ?10
             WHERE id = ?11",
            params![
                event.summary(),
                event.is_flexible(),
                format_time(event.start()),
                format_time(event.end()),
                event.duration_minutes(),
                format_time(window.start),
                format_time(window.end),
                self.timezone,
                event.external_id(),
                format_time(Utc::now()),
                id.0,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    pub fn delete_event(&self, id: EventId) -> Result<(), StoreError> {
        let deleted = self.conn.execute("DELETE FROM events WHERE id = ?1", [id.0])?;
        if deleted == 0 {
            return Err(StoreError::NotFound(id));
        }
        info!(%id, "event deleted");
        Ok(())
    }

    /// Record the calendar id of an event created before it was synchronized.
    pub fn set_external_id(&self, id: EventId, external_id: &str) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE events SET external_id = ?1 WHERE id = ?2",
            params![external_id, id.0],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    /// Events that have not ended by `now`.
    pub fn upcoming_events(
        &self,
        now: DateTime<Utc>,
        limit: usize,
        filter: EventFilter,
        order: OrderBy,
    ) -> Result<Vec<Event>, StoreError> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events
             WHERE end_time >= ?1 AND {}
             ORDER BY {}
             LIMIT ?2",
            filter.clause(),
            order.clause()
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_events(&sql, params![format_time(now), limit])
    }

    /// Events intersecting `[from, to)`.
    pub fn events_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        filter: EventFilter,
        order: OrderBy,
    ) -> Result<Vec<Event>, StoreError> {
        if from >= to {
            return Err(StoreError::QueryFailed(format!(
                "range start {from} must be before range end {to}"
            )));
        }
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events
             WHERE start_time < ?2 AND end_time > ?1 AND {}
             ORDER BY {}",
            filter.clause(),
            order.clause()
        );
        self.query_events(&sql, params![format_time(from), format_time(to)])
    }

    fn query_events(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Event>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, EventRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(EventRow::into_event).collect()
    }

    /// Compare a calendar copy of an event with the stored row sharing its external id.
    pub fn event_status(&self, event: &Event) -> Result<EventStatus, StoreError> {
        let Some(external_id) = event.external_id() else {
            return Ok(EventStatus::New);
        };

        let stored: Option<(String, String, String)> = self
            .conn
            .query_row(
                "SELECT summary, start_time, end_time FROM events WHERE external_id = ?1 LIMIT 1",
                [external_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        Ok(match stored {
            None => EventStatus::New,
            Some((summary, start, end))
                if summary == event.summary()
                    && start == format_time(event.start())
                    && end == format_time(event.end()) =>
            {
                EventStatus::Unchanged
            }
            Some(_) => EventStatus::Modified,
        })
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(usize::try_from(n).unwrap_or_default())
    }
}

impl EventStore for EventDb {
    fn fetch_events_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Event>, StoreError> {
        self.events_in_range(from, to, EventFilter::All, OrderBy::Start)
    }

    fn upsert_placement(
        &mut self,
        id: EventId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        write_placement(&self.conn, id, start, end)
    }

    fn apply_placements(&mut self, updates: &[PlacementUpdate]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        for update in updates {
            write_placement(&tx, update.id, update.start, update.end)?;
        }
        tx.commit()?;
        Ok(())
    }
}
