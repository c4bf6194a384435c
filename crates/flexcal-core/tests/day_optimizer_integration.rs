//! End-to-end tests for day optimization over the SQLite store.

use std::cell::{Cell, RefCell};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use flexcal_core::storage::{EventFilter, OptimizerConfig, OrderBy};
use flexcal_core::sync::RemoteListing;
use flexcal_core::{
    CalendarError, CalendarService, DayOptimizer, DayWindow, Event, EventDb, EventStore,
    FlexibleEventBuilder, SchedulerError, TimeSpan,
};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 10, 27).unwrap()
}

fn day() -> DayWindow {
    DayWindow::for_date(date(), &Utc).unwrap()
}

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 27, hour, minute, 0).unwrap()
}

fn span(h1: u32, m1: u32, h2: u32, m2: u32) -> TimeSpan {
    TimeSpan::new(at(h1, m1), at(h2, m2)).unwrap()
}

#[derive(Default)]
struct MockCalendar {
    patches: RefCell<Vec<(String, TimeSpan)>>,
    calls: Cell<usize>,
    fail_on: Option<usize>,
}

impl CalendarService for MockCalendar {
    fn list_events(
        &self,
        _: DateTime<Utc>,
        _: DateTime<Utc>,
    ) -> Result<RemoteListing, CalendarError> {
        Ok(RemoteListing::default())
    }

    fn insert_event(&self, _: &Event) -> Result<String, CalendarError> {
        Ok("unused".into())
    }

    fn update_event(&self, _: &str, _: &Event) -> Result<(), CalendarError> {
        Ok(())
    }

    fn patch_event(
        &self,
        id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(), CalendarError> {
        let call = self.calls.get() + 1;
        self.calls.set(call);
        if self.fail_on == Some(call) {
            return Err(CalendarError::Api {
                status: 503,
                message: "down".into(),
            });
        }
        self.patches
            .borrow_mut()
            .push((id.to_string(), TimeSpan { start, end }));
        Ok(())
    }

    fn delete_event(&self, _: &str) -> Result<(), CalendarError> {
        Ok(())
    }
}

fn open_db(dir: &TempDir) -> EventDb {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    EventDb::open_at(dir.path().join("events.db")).unwrap()
}

fn placements(db: &EventDb) -> Vec<(String, TimeSpan)> {
    db.events_in_range(at(0, 0), at(23, 59), EventFilter::All, OrderBy::Start)
        .unwrap()
        .into_iter()
        .map(|e| (e.summary().to_string(), e.span()))
        .collect()
}

#[test]
fn overlapping_windows_are_separated() {
    let dir = TempDir::new().unwrap();
    let mut db = open_db(&dir);
    db.insert_event(
        &Event::flexible("Run", span(9, 30, 10, 30), span(9, 0, 11, 0))
            .unwrap()
            .with_external_id("run"),
    )
    .unwrap();
    db.insert_event(
        &Event::flexible("Swim", span(10, 0, 11, 0), span(10, 0, 12, 0))
            .unwrap()
            .with_external_id("swim"),
    )
    .unwrap();

    let calendar = MockCalendar::default();
    let report = DayOptimizer::new(&mut db, &calendar, OptimizerConfig::default())
        .optimize_day(&day())
        .unwrap();

    assert_eq!(report.overlaps, 0);
    assert_eq!(report.day, date());
    let stored = placements(&db);
    assert!(!stored[0].1.overlaps(&stored[1].1));
    assert_eq!(calendar.patches.borrow().len(), report.relocations.len());
}

#[test]
fn single_event_has_no_overlap() {
    let dir = TempDir::new().unwrap();
    let mut db = open_db(&dir);
    let read = Event::flexible("Read", span(14, 0, 14, 45), span(13, 0, 17, 0)).unwrap();
    db.insert_event(&read).unwrap();

    let calendar = MockCalendar::default();
    let report = DayOptimizer::new(&mut db, &calendar, OptimizerConfig::default())
        .optimize_day(&day())
        .unwrap();
    assert_eq!(report.overlaps, 0);
    assert!(report.relocations.is_empty());
}

#[test]
fn second_run_is_a_no_op() {
    let dir = TempDir::new().unwrap();
    let mut db = open_db(&dir);
    for name in ["A", "B", "C"] {
        let event = Event::flexible(name, span(9, 0, 9, 30), span(9, 0, 11, 0)).unwrap();
        db.insert_event(&event).unwrap();
    }
    db.insert_event(&Event::fixed("Standup", span(9, 30, 9, 45)).unwrap())
        .unwrap();

    let calendar = MockCalendar::default();
    let mut optimizer = DayOptimizer::new(&mut db, &calendar, OptimizerConfig::default());
    let first = optimizer.optimize_day(&day()).unwrap();
    assert_eq!(first.overlaps, 0);
    assert!(!first.relocations.is_empty());

    let second = optimizer.optimize_day(&day()).unwrap();
    assert!(second.relocations.is_empty());
    assert_eq!(second.overlaps, 0);
}

#[test]
fn calendar_failure_leaves_day_untouched() {
    let dir = TempDir::new().unwrap();
    let mut db = open_db(&dir);
    db.insert_event(&Event::fixed("Call", span(9, 0, 10, 0)).unwrap()).unwrap();
    for (name, placed) in [("A", span(9, 0, 9, 30)), ("B", span(9, 30, 10, 0))] {
        db.insert_event(
            &Event::flexible(name, placed, span(9, 0, 11, 0))
                .unwrap()
                .with_external_id(name.to_lowercase()),
        )
        .unwrap();
    }
    let before = placements(&db);

    let calendar = MockCalendar { fail_on: Some(2), ..MockCalendar::default() };
    let err = DayOptimizer::new(&mut db, &calendar, OptimizerConfig::default())
        .optimize_day(&day())
        .unwrap_err();

    assert!(matches!(err, SchedulerError::CalendarServiceUnavailable(_)));
    assert_eq!(placements(&db), before);
}

#[test]
fn builder_and_optimizer_share_the_store() {
    let dir = TempDir::new().unwrap();
    let mut db = open_db(&dir);
    db.insert_event(&Event::fixed("Lunch", span(12, 0, 13, 0)).unwrap()).unwrap();

    let event = FlexibleEventBuilder::new(&db)
        .build("Walk", at(11, 30), at(14, 0), 45)
        .unwrap();
    assert_eq!(event.span(), span(13, 0, 13, 45));
    db.insert_event(&event).unwrap();

    let overlapping = db.fetch_events_in_range(at(12, 30), at(13, 30)).unwrap();
    assert_eq!(overlapping.len(), 2);

    let calendar = MockCalendar::default();
    let report = DayOptimizer::new(&mut db, &calendar, OptimizerConfig::default())
        .plan_day(&day())
        .unwrap();
    assert_eq!(report.overlaps, 0);
    assert!(report.relocations.is_empty());
}

#[test]
fn short_dst_day_is_optimized_in_local_time() {
    let tz = chrono_tz::Europe::London;
    let spring_date = NaiveDate::from_ymd_opt(2025, 3, 30).unwrap();
    let spring = DayWindow::for_date(spring_date, &tz).unwrap();
    assert_eq!(spring.minutes(), 1380);

    let dir = TempDir::new().unwrap();
    let mut db = open_db(&dir);
    let window = TimeSpan::new(spring.at_minute(600), spring.at_minute(720)).unwrap();
    for name in ["X", "Y"] {
        let placed = TimeSpan::starting_at(window.start, 60).unwrap();
        db.insert_event(&Event::flexible(name, placed, window).unwrap()).unwrap();
    }

    let calendar = MockCalendar::default();
    let report = DayOptimizer::new(&mut db, &calendar, OptimizerConfig::default())
        .optimize_day(&spring)
        .unwrap();
    assert_eq!(report.overlaps, 0);
    assert_eq!(report.relocations.len(), 1);
    assert_eq!(report.relocations[0].to.start, spring.at_minute(660));
}
