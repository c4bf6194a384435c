//! Calendar day boundaries.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::error::ValidationError;
use crate::event::TimeSpan;

/// One local calendar day, midnight to next midnight, as UTC instants.
///
/// Days are not always 1440 minutes long: a daylight-saving transition
/// makes them 1380 or 1500.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub date: NaiveDate,
    pub midnight: DateTime<Utc>,
    pub next_midnight: DateTime<Utc>,
}

impl DayWindow {
    /// The day `date` in `tz`.
    ///
    /// # Errors
    /// Fails when local midnight does not exist in `tz` on that date.
    pub fn for_date<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Result<Self, ValidationError> {
        let midnight = local_midnight(date, tz)?;
        let next_date = date.succ_opt().ok_or_else(|| ValidationError::InvalidValue {
            field: "date".into(),
            message: format!("{date} has no following day"),
        })?;
        let next_midnight = local_midnight(next_date, tz)?;

        Ok(Self {
            date,
            midnight,
            next_midnight,
        })
    }

    /// The local day containing `instant`.
    pub fn containing<Tz: TimeZone>(
        instant: DateTime<Utc>,
        tz: &Tz,
    ) -> Result<Self, ValidationError> {
        Self::for_date(instant.with_timezone(tz).date_naive(), tz)
    }

    pub fn span(&self) -> TimeSpan {
        TimeSpan {
            start: self.midnight,
            end: self.next_midnight,
        }
    }

    /// Length of the day in minutes.
    pub fn minutes(&self) -> i64 {
        (self.next_midnight - self.midnight).num_minutes()
    }

    /// Whole minutes elapsed since midnight (negative before the day starts).
    pub fn minute_of_day(&self, instant: DateTime<Utc>) -> i64 {
        (instant - self.midnight).num_minutes()
    }

    /// The instant `minute` minutes after midnight.
    pub fn at_minute(&self, minute: i64) -> DateTime<Utc> {
        self.midnight + Duration::minutes(minute)
    }
}

fn local_midnight<Tz: TimeZone>(
    date: NaiveDate,
    tz: &Tz,
) -> Result<DateTime<Utc>, ValidationError> {
    tz.from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| ValidationError::InvalidValue {
            field: "date".into(),
            message: format!("midnight does not exist on {date} in this timezone"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utc_day_is_1440_minutes() {
        let date = NaiveDate::from_ymd_opt(2025, 10, 27).unwrap();
        let day = DayWindow::for_date(date, &Utc).unwrap();
        assert_eq!(day.minutes(), 1440);
        assert_eq!(day.minute_of_day(day.at_minute(615)), 615);
    }

    #[test]
    fn london_midnight_in_summer_is_previous_utc_evening() {
        let date = NaiveDate::from_ymd_opt(2025, 8, 5).unwrap();
        let day = DayWindow::for_date(date, &chrono_tz::Europe::London).unwrap();
        assert_eq!(
            day.midnight,
            Utc.with_ymd_and_hms(2025, 8, 4, 23, 0, 0).unwrap()
        );
    }

    #[test]
    fn daylight_saving_days_change_length() {
        let tz = chrono_tz::Europe::London;
        let date = |m, d| NaiveDate::from_ymd_opt(2025, m, d).unwrap();
        let spring = DayWindow::for_date(date(3, 30), &tz).unwrap();
        let autumn = DayWindow::for_date(date(10, 26), &tz).unwrap();
        assert_eq!(spring.minutes(), 1380);
        assert_eq!(autumn.minutes(), 1500);
    }

    #[test]
    fn containing_uses_local_date() {
        let tz = chrono_tz::Europe::London;
        let instant = Utc.with_ymd_and_hms(2025, 8, 4, 23, 30, 0).unwrap();
        let day = DayWindow::containing(instant, &tz).unwrap();
        assert_eq!(day.date, NaiveDate::from_ymd_opt(2025, 8, 5).unwrap());
        assert_eq!(day.minute_of_day(instant), 30);
    }
}
