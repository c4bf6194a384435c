//! Discrete-time overlap model for one day.
//!
//! The day is cut into slots of `slot_minutes`. Every flexible event becomes
//! an item whose candidates are the slot-aligned start minutes that keep it
//! inside its window; fixed events become pinned items with a single
//! candidate. Pairs that can collide carry the list of candidate
//! combinations that overlap, which the solver turns into linkage
//! constraints.
//!
//! With `n` items and `S` slots the model has at most `n·S + n²/2`
//! variables. Linkage rows are grouped per candidate, `O(n²·S)` of them,
//! but they range over `O(n²·S²)` conflicting combinations. Coarser slots
//! or fewer events per day are the only remedies.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{Result, ValidationError};
use crate::event::{Event, EventId, EventKind, TimeSpan};
use crate::storage::OptimizerConfig;
use crate::timeline::DayWindow;

/// One event as seen by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelItem {
    pub event_id: EventId,
    /// False for fixed events and for skipped flexible events.
    pub movable: bool,
    /// Length in minutes, rounded up.
    pub duration_minutes: i64,
    /// Start offsets in minutes since midnight, ascending.
    pub candidates: Vec<i64>,
    /// Index of the candidate matching the stored placement.
    pub current: Option<usize>,
}

impl ModelItem {
    fn pinned(event_id: EventId, start_minute: i64, duration_minutes: i64) -> Self {
        Self {
            event_id,
            movable: false,
            duration_minutes,
            candidates: vec![start_minute],
            current: Some(0),
        }
    }

    /// Whether candidate `a` of `self` and candidate `b` of `other` overlap.
    pub fn collides(&self, a: usize, other: &ModelItem, b: usize) -> bool {
        let (sa, sb) = (self.candidates[a], other.candidates[b]);
        sa < sb + other.duration_minutes && sb < sa + self.duration_minutes
    }
}

/// Overlap linkage between two items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairLink {
    pub first: usize,
    pub second: usize,
    /// Candidate index pairs `(first, second)` whose intervals overlap.
    pub conflicts: Vec<(usize, usize)>,
}

impl PairLink {
    /// Conflicts grouped by the first item's candidate.
    pub fn by_first(&self) -> BTreeMap<usize, Vec<usize>> {
        let mut grouped: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for &(a, b) in &self.conflicts {
            grouped.entry(a).or_default().push(b);
        }
        grouped
    }

    /// Conflicts grouped by the second item's candidate.
    pub fn by_second(&self) -> BTreeMap<usize, Vec<usize>> {
        let mut grouped: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for &(a, b) in &self.conflicts {
            grouped.entry(b).or_default().push(a);
        }
        grouped
    }
}

/// A built model, ready for a [`PlacementSolver`](super::PlacementSolver).
#[derive(Debug, Clone)]
pub struct OverlapModel {
    pub day: DayWindow,
    pub slot_minutes: i64,
    pub slot_count: i64,
    /// Items ordered by event id.
    pub items: Vec<ModelItem>,
    /// Only pairs that can collide and contain at least one movable item.
    pub pairs: Vec<PairLink>,
    /// Flexible events left where they are because no candidate fits or
    /// they reach past midnight on either side.
    pub skipped: Vec<EventId>,
}

impl OverlapModel {
    pub fn movable_count(&self) -> usize {
        self.items.iter().filter(|i| i.movable).count()
    }

    /// Placement variables plus one overlap indicator per linked pair.
    pub fn variable_count(&self) -> usize {
        let placement: usize = self
            .items
            .iter()
            .filter(|i| i.movable)
            .map(|i| i.candidates.len())
            .sum();
        placement + self.pairs.len()
    }

    /// Single-placement rows, one linkage row per conflicting candidate on
    /// either side of a pair, and the overlap cap.
    pub fn constraint_count(&self) -> usize {
        let linkage: usize = self
            .pairs
            .iter()
            .map(|p| p.by_first().len() + p.by_second().len())
            .sum();
        self.movable_count() + linkage + 1
    }

    /// Candidate choices that keep every item where it currently is.
    ///
    /// Items whose placement is not a candidate get their first candidate.
    pub fn current_choices(&self) -> Vec<usize> {
        self.items.iter().map(|i| i.current.unwrap_or(0)).collect()
    }

    /// Number of overlapping pairs under `choices` (one index per item).
    pub fn count_overlaps(&self, choices: &[usize]) -> usize {
        self.pairs
            .iter()
            .filter(|p| p.conflicts.contains(&(choices[p.first], choices[p.second])))
            .count()
    }

    /// Start instant of candidate `choice` of item `item`.
    pub fn start_of(&self, item: usize, choice: usize) -> DateTime<Utc> {
        self.day.at_minute(self.items[item].candidates[choice])
    }
}

/// Translates a day's events into an [`OverlapModel`].
pub struct ModelBuilder<'a> {
    config: &'a OptimizerConfig,
    day: &'a DayWindow,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(config: &'a OptimizerConfig, day: &'a DayWindow) -> Self {
        Self { config, day }
    }

    /// Build the model for `events`. Every event must have an id.
    pub fn build(&self, events: &[Event]) -> Result<OverlapModel> {
        self.config
            .validate()
            .map_err(|e| ValidationError::InvalidValue {
                field: "optimizer.slot_minutes".into(),
                message: e.to_string(),
            })?;
        let g = i64::from(self.config.slot_minutes);

        let mut ordered = Vec::with_capacity(events.len());
        for event in events {
            let id = event.id().ok_or(ValidationError::MissingId)?;
            ordered.push((id, event));
        }
        ordered.sort_by_key(|(id, _)| *id);

        let mut items = Vec::with_capacity(ordered.len());
        let mut skipped = Vec::new();
        for (id, event) in ordered {
            let start = floor_minute(self.day, event.start());
            let length = ceil_minute(self.day, event.end()) - start;

            match event.kind() {
                EventKind::Flexible { .. } if !self.day.span().contains(&event.span()) => {
                    debug!(%id, span = %event.span(), "event crosses the day boundary, pinning");
                    skipped.push(id);
                    items.push(ModelItem::pinned(id, start, length));
                }
                EventKind::Flexible { window } => {
                    let duration = ceil_minutes(event.span());
                    let candidates = self.candidate_starts(window, duration, g);
                    if candidates.is_empty() {
                        debug!(%id, %window, "no slot-aligned placement inside window, skipping");
                        skipped.push(id);
                        items.push(ModelItem::pinned(id, start, length));
                        continue;
                    }
                    let current = candidates
                        .iter()
                        .position(|&c| self.day.at_minute(c) == event.start());
                    items.push(ModelItem {
                        event_id: id,
                        movable: true,
                        duration_minutes: duration,
                        candidates,
                        current,
                    });
                }
                EventKind::Fixed if self.config.respect_fixed_events => {
                    items.push(ModelItem::pinned(id, start, length));
                }
                EventKind::Fixed => {}
            }
        }

        let pairs = link_pairs(&items);
        let model = OverlapModel {
            day: *self.day,
            slot_minutes: g,
            slot_count: self.day.minutes() / g,
            items,
            pairs,
            skipped,
        };
        debug!(
            date = %self.day.date,
            items = model.items.len(),
            movable = model.movable_count(),
            variables = model.variable_count(),
            constraints = model.constraint_count(),
            "overlap model built"
        );
        Ok(model)
    }

    /// Slot-aligned start minutes keeping `[start, start + duration)` inside
    /// `window` clamped to the day. Rounds inward at both ends.
    fn candidate_starts(&self, window: TimeSpan, duration: i64, g: i64) -> Vec<i64> {
        let lo = ceil_minute(self.day, window.start).max(0);
        let hi = floor_minute(self.day, window.end).min(self.day.minutes());

        let first = (lo + g - 1).div_euclid(g);
        let last = (hi - duration).div_euclid(g);
        (first..=last).map(|t| t * g).collect()
    }
}

fn floor_minute(day: &DayWindow, t: DateTime<Utc>) -> i64 {
    (t - day.midnight).num_seconds().div_euclid(60)
}

fn ceil_minute(day: &DayWindow, t: DateTime<Utc>) -> i64 {
    let secs = (t - day.midnight).num_seconds();
    secs.div_euclid(60) + i64::from(secs.rem_euclid(60) > 0)
}

fn ceil_minutes(span: TimeSpan) -> i64 {
    let secs = (span.end - span.start).num_seconds();
    secs.div_euclid(60) + i64::from(secs.rem_euclid(60) > 0)
}

fn link_pairs(items: &[ModelItem]) -> Vec<PairLink> {
    let mut pairs = Vec::new();
    for first in 0..items.len() {
        for second in first + 1..items.len() {
            let (a, b) = (&items[first], &items[second]);
            if !a.movable && !b.movable {
                continue;
            }

            let mut conflicts = Vec::new();
            for ca in 0..a.candidates.len() {
                for cb in 0..b.candidates.len() {
                    if a.collides(ca, b, cb) {
                        conflicts.push((ca, cb));
                    }
                }
            }
            if !conflicts.is_empty() {
                pairs.push(PairLink {
                    first,
                    second,
                    conflicts,
                });
            }
        }
    }
    pairs
}
