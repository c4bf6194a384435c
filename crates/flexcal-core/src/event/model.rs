//! Fixed and flexible calendar events.
//!
//! An [`Event`] is either pinned to its own interval ([`EventKind::Fixed`])
//! or free to move inside a permitted window ([`EventKind::Flexible`]).
//! Fields are private so that every construction and every relocation
//! goes through the invariant checks in [`Event::validate`].

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Store-assigned event key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub i64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeSpan {
    /// Create a span, rejecting `end <= start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ValidationError> {
        if end <= start {
            return Err(ValidationError::InvalidTimeRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Span of `minutes` starting at `start`.
    pub fn starting_at(start: DateTime<Utc>, minutes: i64) -> Result<Self, ValidationError> {
        Self::new(start, start + Duration::minutes(minutes))
    }

    /// Length in whole minutes.
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// Whether the two spans share any instant.
    pub fn overlaps(&self, other: &TimeSpan) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether `other` lies entirely within this span.
    pub fn contains(&self, other: &TimeSpan) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start.format("%Y-%m-%d %H:%M"), self.end.format("%H:%M"))
    }
}

/// Placement semantics of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// Immovable; the permitted window is the event itself.
    Fixed,
    /// Relocatable anywhere inside `window`.
    Flexible { window: TimeSpan },
}

/// A calendar event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    id: Option<EventId>,
    summary: String,
    span: TimeSpan,
    kind: EventKind,
    external_id: Option<String>,
}

impl Event {
    /// Create a fixed event occupying `span`.
    pub fn fixed(summary: impl Into<String>, span: TimeSpan) -> Result<Self, ValidationError> {
        let event = Self {
            id: None,
            summary: summary.into(),
            span,
            kind: EventKind::Fixed,
            external_id: None,
        };
        event.validate()?;
        Ok(event)
    }

    /// Create a flexible event placed at `span` inside `window`.
    pub fn flexible(
        summary: impl Into<String>,
        span: TimeSpan,
        window: TimeSpan,
    ) -> Result<Self, ValidationError> {
        let event = Self {
            id: None,
            summary: summary.into(),
            span,
            kind: EventKind::Flexible { window },
            external_id: None,
        };
        event.validate()?;
        Ok(event)
    }

    pub fn with_id(mut self, id: EventId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn id(&self) -> Option<EventId> {
        self.id
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.span.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.span.end
    }

    pub fn span(&self) -> TimeSpan {
        self.span
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }

    pub fn set_external_id(&mut self, external_id: Option<String>) {
        self.external_id = external_id;
    }

    pub fn is_flexible(&self) -> bool {
        matches!(self.kind, EventKind::Flexible { .. })
    }

    /// Permitted window. For fixed events this is the event's own span.
    pub fn window(&self) -> TimeSpan {
        match self.kind {
            EventKind::Fixed => self.span,
            EventKind::Flexible { window } => window,
        }
    }

    pub fn valid_start(&self) -> DateTime<Utc> {
        self.window().start
    }

    pub fn valid_end(&self) -> DateTime<Utc> {
        self.window().end
    }

    /// Duration in whole minutes.
    pub fn duration_minutes(&self) -> i64 {
        self.span.duration_minutes()
    }

    pub fn overlaps(&self, other: &Event) -> bool {
        self.span.overlaps(&other.span)
    }

    /// Move a flexible event so it starts at `start`, keeping its duration.
    ///
    /// Fixed events cannot be relocated. On error the event is unchanged.
    pub fn relocate(&mut self, start: DateTime<Utc>) -> Result<(), ValidationError> {
        if !self.is_flexible() {
            return Err(ValidationError::InvalidValue {
                field: "start".into(),
                message: format!("fixed event '{}' cannot be relocated", self.summary),
            });
        }

        let previous = self.span;
        self.span = TimeSpan::new(start, start + (previous.end - previous.start))?;
        if let Err(e) = self.validate() {
            self.span = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Check every invariant of the event.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.summary.trim().is_empty() {
            return Err(ValidationError::EmptySummary);
        }
        if self.span.end <= self.span.start {
            return Err(ValidationError::InvalidTimeRange {
                start: self.span.start,
                end: self.span.end,
            });
        }

        // Containment also guarantees the window can hold the duration.
        let window = self.window();
        if !window.contains(&self.span) {
            return Err(ValidationError::OutsideWindow {
                start: self.span.start,
                end: self.span.end,
                valid_start: window.start,
                valid_end: window.end,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            EventKind::Fixed => write!(f, "Fixed event {} ({})", self.summary, self.span),
            EventKind::Flexible { window } => write!(
                f,
                "Flexible event {} ({}) (valid range: {})",
                self.summary, self.span, window
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 2, hour, minute, 0).unwrap()
    }

    fn span(h1: u32, m1: u32, h2: u32, m2: u32) -> TimeSpan {
        TimeSpan::new(at(h1, m1), at(h2, m2)).unwrap()
    }

    #[test]
    fn fixed_event_window_is_its_own_span() {
        let event = Event::fixed("Standup", span(16, 0, 17, 0)).unwrap();
        assert!(!event.is_flexible());
        assert_eq!(event.valid_start(), at(16, 0));
        assert_eq!(event.valid_end(), at(17, 0));
        assert_eq!(event.duration_minutes(), 60);
    }

    #[test]
    fn flexible_event_keeps_window() {
        let event = Event::flexible("Gym", span(16, 0, 16, 30), span(16, 0, 22, 0)).unwrap();
        assert!(event.is_flexible());
        assert_eq!(event.window(), span(16, 0, 22, 0));
        assert_eq!(event.duration_minutes(), 30);
    }

    #[test]
    fn rejects_empty_summary() {
        let err = Event::fixed("  ", span(9, 0, 10, 0)).unwrap_err();
        assert_eq!(err, ValidationError::EmptySummary);
    }

    #[test]
    fn rejects_inverted_span() {
        assert!(matches!(
            TimeSpan::new(at(10, 0), at(9, 0)),
            Err(ValidationError::InvalidTimeRange { .. })
        ));
        assert!(TimeSpan::new(at(10, 0), at(10, 0)).is_err());
    }

    #[test]
    fn rejects_span_outside_window() {
        let err = Event::flexible("Read", span(8, 30, 9, 30), span(9, 0, 12, 0)).unwrap_err();
        assert!(matches!(err, ValidationError::OutsideWindow { .. }));
    }

    #[test]
    fn relocate_moves_within_window() {
        let mut event = Event::flexible("Read", span(9, 0, 9, 30), span(9, 0, 12, 0)).unwrap();
        event.relocate(at(11, 0)).unwrap();
        assert_eq!(event.span(), span(11, 0, 11, 30));
    }

    #[test]
    fn relocate_outside_window_leaves_event_untouched() {
        let mut event = Event::flexible("Read", span(9, 0, 9, 30), span(9, 0, 12, 0)).unwrap();
        assert!(event.relocate(at(11, 45)).is_err());
        assert_eq!(event.span(), span(9, 0, 9, 30));
    }

    #[test]
    fn fixed_events_do_not_relocate() {
        let mut event = Event::fixed("Dentist", span(9, 0, 10, 0)).unwrap();
        assert!(event.relocate(at(11, 0)).is_err());
        assert_eq!(event.start(), at(9, 0));
    }

    #[test]
    fn overlap_is_half_open() {
        let a = Event::fixed("A", span(9, 0, 10, 0)).unwrap();
        let b = Event::fixed("B", span(10, 0, 11, 0)).unwrap();
        let c = Event::fixed("C", span(9, 59, 10, 30)).unwrap();
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
    }

    #[test]
    fn serializes_kind_as_tag() {
        let event = Event::flexible("Gym", span(16, 0, 16, 30), span(16, 0, 22, 0))
            .unwrap()
            .with_id(EventId(7))
            .with_external_id("g-123");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"]["kind"], "flexible");
        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
