//! Property tests for the earliest-fit slot finder.
//!
//! Every boundary is a whole minute, so a minute-by-minute scan is an exact
//! reference for "earliest valid placement".

use chrono::{DateTime, Duration, TimeZone, Utc};
use flexcal_core::{SlotFinder, TimeSpan};
use proptest::prelude::*;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 27, 6, 0, 0).unwrap()
}

fn minute(m: i64) -> DateTime<Utc> {
    base() + Duration::minutes(m)
}

#[derive(Debug, Clone)]
struct Case {
    valid_start: i64,
    valid_end: i64,
    duration: i64,
    occupied: Vec<(i64, i64)>,
}

impl Case {
    fn finder(&self) -> SlotFinder {
        SlotFinder::new(
            minute(self.valid_start),
            minute(self.valid_end),
            self.duration,
        )
        .unwrap()
    }

    fn spans(&self) -> Vec<TimeSpan> {
        let mut spans: Vec<TimeSpan> = self
            .occupied
            .iter()
            .map(|&(s, e)| TimeSpan::new(minute(s), minute(e)).unwrap())
            .collect();
        spans.sort_by_key(|s| s.start);
        spans
    }

    fn is_free(&self, start: i64) -> bool {
        let end = start + self.duration;
        self.occupied.iter().all(|&(s, e)| !(start < e && s < end))
    }

    /// Earliest free start by exhaustive scan.
    fn reference(&self) -> Option<i64> {
        (self.valid_start..=self.valid_end - self.duration).find(|&s| self.is_free(s))
    }
}

fn arb_case() -> impl Strategy<Value = Case> {
    (0i64..600, 1i64..240)
        .prop_flat_map(|(start, len)| {
            (
                Just(start),
                Just(len),
                1i64..=len,
                prop::collection::vec((-60i64..900, 1i64..180), 0..8),
            )
        })
        .prop_map(|(start, len, duration, raw)| Case {
            valid_start: start,
            valid_end: start + len,
            duration,
            occupied: raw.into_iter().map(|(s, l)| (s, s + l)).collect(),
        })
}

proptest! {
    #[test]
    fn found_slot_is_sound(case in arb_case()) {
        let finder = case.finder();
        let search = finder.find(&case.spans());
        if search.found {
            let slot = search.slot;
            prop_assert!(slot.start >= minute(case.valid_start));
            prop_assert!(slot.end <= minute(case.valid_end));
            prop_assert_eq!(slot.duration_minutes(), case.duration);
            for span in case.spans() {
                prop_assert!(!slot.overlaps(&span), "{} overlaps {}", slot, span);
            }
        }
    }

    #[test]
    fn found_slot_is_earliest(case in arb_case()) {
        let finder = case.finder();
        let search = finder.find(&case.spans());
        if let Some(expected) = case.reference() {
            prop_assert!(search.found);
            prop_assert_eq!(search.slot.start, minute(expected));
        }
    }

    #[test]
    fn search_is_complete(case in arb_case()) {
        let finder = case.finder();
        let search = finder.find(&case.spans());
        prop_assert_eq!(search.found, case.reference().is_some());
        if !search.found {
            prop_assert_eq!(search.slot.start, minute(case.valid_start));
            prop_assert_eq!(search.slot.end, minute(case.valid_start + case.duration));
        }
    }

    #[test]
    fn oversized_duration_is_rejected(start in 0i64..600, len in 1i64..240, extra in 1i64..60) {
        prop_assert!(SlotFinder::new(minute(start), minute(start + len), len + extra).is_err());
    }
}
