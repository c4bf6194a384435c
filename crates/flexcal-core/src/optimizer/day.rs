//! Whole-day re-packing of flexible events.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{error, info, warn};

use super::model::{ModelBuilder, OverlapModel};
use super::solver::{Assignment, IlpSolver, PlacementSolver};
use crate::error::Result;
use crate::event::{Event, EventId, TimeSpan};
use crate::storage::{EventStore, OptimizerConfig, PlacementUpdate};
use crate::sync::CalendarService;
use crate::timeline::DayWindow;

/// One flexible event moved by the optimizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relocation {
    pub id: EventId,
    pub external_id: Option<String>,
    pub summary: String,
    pub from: TimeSpan,
    pub to: TimeSpan,
}

/// Result of optimizing (or planning) one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptimizationReport {
    pub day: NaiveDate,
    /// Overlapping pairs left after optimization.
    pub overlaps: usize,
    pub relocations: Vec<Relocation>,
    /// Flexible events with no slot-aligned placement inside the day; left
    /// untouched.
    pub skipped: Vec<EventId>,
}

/// Re-packs the flexible events of one day to minimize overlaps.
///
/// Holds the store exclusively for the duration of a pass. Callers must not
/// run two passes over the same day concurrently.
pub struct DayOptimizer<'a, S, C, P = IlpSolver>
where
    S: EventStore + ?Sized,
    C: CalendarService + ?Sized,
    P: PlacementSolver,
{
    store: &'a mut S,
    calendar: &'a C,
    solver: P,
    config: OptimizerConfig,
}

impl<'a, S, C> DayOptimizer<'a, S, C, IlpSolver>
where
    S: EventStore + ?Sized,
    C: CalendarService + ?Sized,
{
    pub fn new(store: &'a mut S, calendar: &'a C, config: OptimizerConfig) -> Self {
        Self {
            store,
            calendar,
            solver: IlpSolver,
            config,
        }
    }
}

impl<'a, S, C, P> DayOptimizer<'a, S, C, P>
where
    S: EventStore + ?Sized,
    C: CalendarService + ?Sized,
    P: PlacementSolver,
{
    /// Swap the placement solver.
    pub fn with_solver<Q: PlacementSolver>(self, solver: Q) -> DayOptimizer<'a, S, C, Q> {
        DayOptimizer {
            store: self.store,
            calendar: self.calendar,
            solver,
            config: self.config,
        }
    }

    /// Compute the optimal placements for `day` without writing anything.
    pub fn plan_day(&self, day: &DayWindow) -> Result<OptimizationReport> {
        let events = self.store.fetch_events_in_range(day.midnight, day.next_midnight)?;
        let model = ModelBuilder::new(&self.config, day).build(&events)?;
        let assignment = self.solver.solve(&model)?;
        Ok(report(&model, &assignment, &events))
    }

    /// Optimize `day` and write every changed placement to the store and
    /// the calendar.
    ///
    /// Either every relocation is applied or none is: a failed calendar
    /// patch reverts the patches already sent and the store batch.
    pub fn optimize_day(&mut self, day: &DayWindow) -> Result<OptimizationReport> {
        let report = self.plan_day(day)?;
        if report.relocations.is_empty() {
            info!(date = %report.day, overlaps = report.overlaps, "day already optimal");
            return Ok(report);
        }

        let forward: Vec<PlacementUpdate> = report
            .relocations
            .iter()
            .map(|r| PlacementUpdate {
                id: r.id,
                start: r.to.start,
                end: r.to.end,
            })
            .collect();
        self.store.apply_placements(&forward)?;

        let mut patched: Vec<&Relocation> = Vec::with_capacity(report.relocations.len());
        for relocation in &report.relocations {
            let Some(external_id) = relocation.external_id.as_deref() else {
                continue;
            };
            if let Err(e) = self
                .calendar
                .patch_event(external_id, relocation.to.start, relocation.to.end)
            {
                warn!(%external_id, error = %e, "calendar patch failed, reverting day");
                self.revert(&report.relocations, &patched);
                return Err(e.into());
            }
            patched.push(relocation);
        }

        for r in &report.relocations {
            info!(
                id = %r.id,
                summary = %r.summary,
                from = %r.from,
                to = %r.to,
                "event relocated"
            );
        }
        info!(
            date = %report.day,
            overlaps = report.overlaps,
            relocated = report.relocations.len(),
            "day optimized"
        );
        Ok(report)
    }

    /// Undo a partially mirrored pass. Failures here are logged only; the
    /// caller still sees the error that triggered the revert.
    fn revert(&mut self, relocations: &[Relocation], patched: &[&Relocation]) {
        for relocation in patched.iter().rev() {
            if let Some(external_id) = relocation.external_id.as_deref() {
                if let Err(e) = self.calendar.patch_event(
                    external_id,
                    relocation.from.start,
                    relocation.from.end,
                ) {
                    error!(%external_id, error = %e, "failed to restore calendar event");
                }
            }
        }

        let backward: Vec<PlacementUpdate> = relocations
            .iter()
            .map(|r| PlacementUpdate {
                id: r.id,
                start: r.from.start,
                end: r.from.end,
            })
            .collect();
        if let Err(e) = self.store.apply_placements(&backward) {
            error!(error = %e, "failed to restore stored placements");
        }
    }
}

fn report(model: &OverlapModel, assignment: &Assignment, events: &[Event]) -> OptimizationReport {
    let by_id: HashMap<EventId, &Event> = events
        .iter()
        .filter_map(|e| e.id().map(|id| (id, e)))
        .collect();

    let mut relocations = Vec::new();
    for (index, item) in model.items.iter().enumerate() {
        if !item.movable {
            continue;
        }
        let Some(event) = by_id.get(&item.event_id) else {
            continue;
        };
        let start = model.start_of(index, assignment.choices[index]);
        if start == event.start() {
            continue;
        }
        let from = event.span();
        relocations.push(Relocation {
            id: item.event_id,
            external_id: event.external_id().map(str::to_string),
            summary: event.summary().to_string(),
            from,
            to: TimeSpan {
                start,
                end: start + (from.end - from.start),
            },
        });
    }

    OptimizationReport {
        day: model.day.date,
        overlaps: assignment.overlaps,
        relocations,
        skipped: model.skipped.clone(),
    }
}
