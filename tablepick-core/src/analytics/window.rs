//! Calendar time windows
//!
//! All window math runs through a [`ReportClock`]: a frozen "now" plus a
//! fixed UTC offset for the reporting timezone. Metrics become pure
//! functions of (events, clock), so tests pin the clock instead of
//! sleeping or mocking the system time.
//!
//! Windows are calendar-based, not rolling: "today" starts at local
//! midnight, "this week" on Monday, and every range is half-open
//! `[start, end)`. One convention throughout; weekday labels are the only
//! place a Sunday-first order appears, and that is presentation only.

use chrono::{DateTime, Datelike, Duration, FixedOffset, Local, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// A frozen reporting instant with its timezone offset.
#[derive(Debug, Clone, Copy)]
pub struct ReportClock {
    /// The instant "now" is evaluated at
    pub now: DateTime<Utc>,
    /// Offset of the reporting timezone
    pub offset: FixedOffset,
}

impl ReportClock {
    /// Clock at the current instant in the system's local timezone.
    pub fn system() -> Self {
        let now = Local::now();
        Self {
            now: now.with_timezone(&Utc),
            offset: *now.offset(),
        }
    }

    /// Clock pinned to an arbitrary instant and offset, for tests and
    /// reproducible reports.
    pub fn fixed(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self { now, offset }
    }

    /// Calendar date of `ts` in the reporting timezone.
    pub fn local_date(&self, ts: DateTime<Utc>) -> NaiveDate {
        ts.with_timezone(&self.offset).date_naive()
    }

    /// Today's calendar date.
    pub fn today(&self) -> NaiveDate {
        self.local_date(self.now)
    }

    /// The UTC instant at which `date` begins in the reporting timezone.
    pub fn day_start(&self, date: NaiveDate) -> DateTime<Utc> {
        let local_midnight = date.and_time(NaiveTime::MIN);
        // Fixed offsets never produce ambiguous local times, so the
        // conversion is a plain subtraction.
        Utc.from_utc_datetime(
            &(local_midnight - Duration::seconds(self.offset.local_minus_utc() as i64)),
        )
    }

    /// Start of the current local day.
    pub fn start_of_today(&self) -> DateTime<Utc> {
        self.day_start(self.today())
    }

    /// Start of the current week (Monday 00:00 local).
    pub fn start_of_week(&self) -> DateTime<Utc> {
        let today = self.today();
        let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
        self.day_start(monday)
    }

    /// Start of the current month.
    pub fn start_of_month(&self) -> DateTime<Utc> {
        let today = self.today();
        self.day_start(today.with_day(1).unwrap_or(today))
    }

    /// Start of the current year.
    pub fn start_of_year(&self) -> DateTime<Utc> {
        let today = self.today();
        self.day_start(today.with_day(1).and_then(|d| d.with_month(1)).unwrap_or(today))
    }

    /// Local hour of day (0-23) of `ts`.
    pub fn hour_of(&self, ts: DateTime<Utc>) -> usize {
        ts.with_timezone(&self.offset).hour() as usize
    }

    /// Weekday of `ts`, indexed Sunday = 0 through Saturday = 6.
    pub fn weekday_index(&self, ts: DateTime<Utc>) -> usize {
        ts.with_timezone(&self.offset)
            .weekday()
            .num_days_from_sunday() as usize
    }
}

/// A reporting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    /// Since local midnight
    Today,
    /// Since Monday 00:00 local
    ThisWeek,
    /// Since the 1st of the current month
    ThisMonth,
    /// Since January 1st of the current year
    ThisYear,
    /// The last N calendar days, including today
    LastDays(u32),
    /// Explicit half-open window `[start, end)`
    Custom {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl TimeRange {
    /// Resolve to a concrete half-open `[start, end)` window.
    pub fn bounds(&self, clock: &ReportClock) -> (DateTime<Utc>, DateTime<Utc>) {
        match self {
            TimeRange::Today => (clock.start_of_today(), clock.now),
            TimeRange::ThisWeek => (clock.start_of_week(), clock.now),
            TimeRange::ThisMonth => (clock.start_of_month(), clock.now),
            TimeRange::ThisYear => (clock.start_of_year(), clock.now),
            TimeRange::LastDays(days) => {
                let days = (*days).max(1);
                let first = clock.today() - Duration::days(days as i64 - 1);
                (clock.day_start(first), clock.now)
            }
            TimeRange::Custom { start, end } => (*start, *end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock_at(rfc3339: &str, offset_hours: i32) -> ReportClock {
        let now = DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc);
        ReportClock::fixed(now, FixedOffset::east_opt(offset_hours * 3600).unwrap())
    }

    #[test]
    fn test_day_start_respects_offset() {
        // 2026-03-10 01:30 in UTC+8 is still 2026-03-09 in UTC.
        let clock = clock_at("2026-03-09T17:30:00Z", 8);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2026, 3, 10).unwrap());
        // Local midnight of March 10 is 16:00 UTC on March 9.
        assert_eq!(
            clock.start_of_today().to_rfc3339(),
            "2026-03-09T16:00:00+00:00"
        );
    }

    #[test]
    fn test_week_starts_monday() {
        // 2026-03-11 is a Wednesday.
        let clock = clock_at("2026-03-11T12:00:00Z", 0);
        let week_start = clock.start_of_week();
        assert_eq!(week_start.to_rfc3339(), "2026-03-09T00:00:00+00:00");
        assert_eq!(clock.local_date(week_start).weekday(), chrono::Weekday::Mon);
    }

    #[test]
    fn test_last_days_includes_today() {
        let clock = clock_at("2026-03-11T12:00:00Z", 0);
        let (start, end) = TimeRange::LastDays(7).bounds(&clock);
        assert_eq!(start.to_rfc3339(), "2026-03-05T00:00:00+00:00");
        assert_eq!(end, clock.now);
    }

    #[test]
    fn test_month_and_year_starts() {
        let clock = clock_at("2026-03-11T12:00:00Z", 0);
        assert_eq!(
            clock.start_of_month().to_rfc3339(),
            "2026-03-01T00:00:00+00:00"
        );
        assert_eq!(
            clock.start_of_year().to_rfc3339(),
            "2026-01-01T00:00:00+00:00"
        );
    }

    #[test]
    fn test_hour_and_weekday_in_local_time() {
        // 23:30 UTC on Saturday = 07:30 Sunday in UTC+8.
        let clock = clock_at("2026-03-11T12:00:00Z", 8);
        let ts = DateTime::parse_from_rfc3339("2026-03-07T23:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(clock.hour_of(ts), 7);
        assert_eq!(clock.weekday_index(ts), 0);
    }
}
