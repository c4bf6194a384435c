//! Earliest-fit slot search inside a permitted window.
//!
//! The window edges act as sentinel intervals: gaps are scanned from
//! `valid_start` to the first occupied interval, between consecutive
//! occupied intervals, and from the last one to `valid_end`. A placement is
//! always anchored to the start of a gap.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SchedulerError};
use crate::event::TimeSpan;

/// A free interval between two occupied intervals (or a window edge).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gap {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl Gap {
    /// Get duration in minutes
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }

    /// Whether a placement of `minutes` anchored at the gap start fits.
    pub fn can_fit(&self, minutes: i64) -> bool {
        self.start_time + Duration::minutes(minutes) <= self.end_time
    }
}

/// Outcome of a slot search.
///
/// When `found` is false, `slot` is the fallback `valid_start .. valid_start + duration`
/// and must not be treated as a free placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSearch {
    pub slot: TimeSpan,
    pub found: bool,
}

impl SlotSearch {
    /// The slot, if one was found.
    pub fn into_slot(self) -> Option<TimeSpan> {
        self.found.then_some(self.slot)
    }
}

/// Finds the earliest free placement of a fixed duration inside a window.
#[derive(Debug, Clone, Copy)]
pub struct SlotFinder {
    valid_start: DateTime<Utc>,
    valid_end: DateTime<Utc>,
    duration: Duration,
}

impl SlotFinder {
    /// Validate the window before any search runs.
    ///
    /// # Errors
    /// [`SchedulerError::InvalidWindow`] when `valid_start >= valid_end`, the
    /// duration is not positive, or the duration exceeds the window.
    pub fn new(
        valid_start: DateTime<Utc>,
        valid_end: DateTime<Utc>,
        duration_minutes: i64,
    ) -> Result<Self> {
        let invalid = || SchedulerError::InvalidWindow {
            valid_start,
            valid_end,
            duration_minutes,
        };

        if valid_start >= valid_end || duration_minutes <= 0 {
            return Err(invalid());
        }
        let duration = Duration::minutes(duration_minutes);
        if duration > valid_end - valid_start {
            return Err(invalid());
        }

        Ok(Self {
            valid_start,
            valid_end,
            duration,
        })
    }

    pub fn window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.valid_start, self.valid_end)
    }

    pub fn duration_minutes(&self) -> i64 {
        self.duration.num_minutes()
    }

    /// Candidate gaps in chronological order.
    ///
    /// A gap starts at the furthest end seen so far, so an interval nested
    /// inside an earlier, longer one never opens a gap inside it.
    pub fn gaps(&self, occupied: &[TimeSpan]) -> Vec<Gap> {
        let mut sorted = occupied.to_vec();
        sorted.sort_by_key(|span| (span.start, span.end));

        let mut gaps = Vec::with_capacity(sorted.len() + 1);
        let mut last_end = self.valid_start;

        for i in 0..=sorted.len() {
            if i > 0 {
                last_end = last_end.max(sorted[i - 1].end);
            }
            let boundary = if i == sorted.len() {
                self.valid_end
            } else {
                sorted[i].start.min(self.valid_end)
            };
            if boundary > last_end {
                gaps.push(Gap {
                    start_time: last_end,
                    end_time: boundary,
                });
            }
        }

        gaps
    }

    /// Find the earliest placement that overlaps none of `occupied`.
    pub fn find(&self, occupied: &[TimeSpan]) -> SlotSearch {
        let minutes = self.duration.num_minutes();

        if let Some(gap) = self.gaps(occupied).into_iter().find(|gap| gap.can_fit(minutes)) {
            let slot = TimeSpan {
                start: gap.start_time,
                end: gap.start_time + self.duration,
            };
            debug!(%slot, "found free slot");
            return SlotSearch { slot, found: true };
        }

        debug!(
            valid_start = %self.valid_start,
            valid_end = %self.valid_end,
            minutes,
            "no free slot in window"
        );
        SlotSearch {
            slot: TimeSpan {
                start: self.valid_start,
                end: self.valid_start + self.duration,
            },
            found: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 5, hour, minute, 0).unwrap()
    }

    fn span(h1: u32, m1: u32, h2: u32, m2: u32) -> TimeSpan {
        TimeSpan::new(at(h1, m1), at(h2, m2)).unwrap()
    }

    #[test]
    fn empty_window_places_at_start() {
        let finder = SlotFinder::new(at(9, 0), at(10, 0), 30).unwrap();
        let result = finder.find(&[]);
        assert!(result.found);
        assert_eq!(result.slot, span(9, 0, 9, 30));
    }

    #[test]
    fn overlapping_occupied_intervals_are_skipped() {
        let finder = SlotFinder::new(at(11, 45), at(20, 30), 30).unwrap();
        let occupied = [span(12, 0, 18, 0), span(14, 0, 20, 0)];
        let result = finder.find(&occupied);
        assert!(result.found);
        assert_eq!(result.slot, span(20, 0, 20, 30));
    }

    #[test]
    fn duration_longer_than_window_is_invalid() {
        let err = SlotFinder::new(at(14, 0), at(15, 0), 90).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidWindow { duration_minutes: 90, .. }));
    }

    #[test]
    fn inverted_window_is_invalid() {
        assert!(matches!(
            SlotFinder::new(at(15, 0), at(14, 0), 10),
            Err(SchedulerError::InvalidWindow { .. })
        ));
        assert!(SlotFinder::new(at(14, 0), at(14, 0), 0).is_err());
        assert!(SlotFinder::new(at(14, 0), at(15, 0), 0).is_err());
    }

    #[test]
    fn duration_equal_to_window_is_valid() {
        let finder = SlotFinder::new(at(14, 0), at(15, 0), 60).unwrap();
        assert_eq!(finder.find(&[]).slot, span(14, 0, 15, 0));
    }

    #[test]
    fn no_gap_falls_back_to_window_start() {
        let finder = SlotFinder::new(at(11, 45), at(20, 15), 30).unwrap();
        let occupied = [span(12, 0, 18, 0), span(14, 0, 20, 0)];
        let result = finder.find(&occupied);
        assert!(!result.found);
        assert_eq!(result.slot, span(11, 45, 12, 15));
        assert_eq!(result.into_slot(), None);
    }

    #[test]
    fn picks_first_gap_that_fits() {
        let finder = SlotFinder::new(at(9, 0), at(17, 0), 45).unwrap();
        let occupied = [span(9, 0, 10, 0), span(10, 30, 11, 0), span(12, 0, 13, 0)];
        let result = finder.find(&occupied);
        assert_eq!(result.slot, span(11, 0, 11, 45));
    }

    #[test]
    fn nested_interval_does_not_open_a_gap() {
        let finder = SlotFinder::new(at(12, 0), at(21, 0), 30).unwrap();
        let occupied = [span(12, 0, 20, 0), span(13, 0, 14, 0)];
        let result = finder.find(&occupied);
        assert_eq!(result.slot, span(20, 0, 20, 30));
    }

    #[test]
    fn unsorted_input_is_handled() {
        let finder = SlotFinder::new(at(9, 0), at(12, 0), 30).unwrap();
        let occupied = [span(10, 0, 12, 0), span(9, 0, 9, 30)];
        assert_eq!(finder.find(&occupied).slot, span(9, 30, 10, 0));
    }

    #[test]
    fn interval_past_window_end_blocks_tail() {
        let finder = SlotFinder::new(at(9, 0), at(10, 0), 30).unwrap();
        let occupied = [span(9, 15, 11, 0)];
        assert!(!finder.find(&occupied).found);
    }

    #[test]
    fn gaps_are_chronological() {
        let finder = SlotFinder::new(at(8, 0), at(18, 0), 15).unwrap();
        let gaps = finder.gaps(&[span(9, 0, 10, 0), span(12, 0, 13, 0)]);
        let starts: Vec<_> = gaps.iter().map(|g| g.start_time).collect();
        assert_eq!(starts, vec![at(8, 0), at(10, 0), at(13, 0)]);
        assert_eq!(gaps[1].duration_minutes(), 120);
    }
}
