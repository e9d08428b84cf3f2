//! Pure metric computations
//!
//! Every function here is a pure read over a slice of events plus a
//! [`ReportClock`]; nothing touches storage or the network. The same code
//! serves the remote summary (over fetched events) and the local export
//! (over the journal).
//!
//! | Metric | Definition |
//! |--------|------------|
//! | UV | distinct `user_id` among the events |
//! | Conversion rate | users with `draw_clicked` / users with `app_launch`, percent |
//! | Share rate | users with `share_clicked` / users with `draw_clicked`, percent |
//! | Weekly active | distinct users with `draw_clicked` since Monday 00:00 local |
//! | Retention(N) | of users active N days ago, the share also active the next day |
//! | Channel stats | event count per `utm_source`, missing source bucketed as `direct` |
//! | Active hours | event count per local hour of day |
//! | Weekday distribution | event count per local weekday, Sunday-first |
//! | Trend | per-day `{date, uv, events}` for the last N days |
//! | Top results | most frequent `draw_result` names |
//!
//! Rates are percentages; a zero denominator yields 0, never an error.

use std::collections::{BTreeMap, HashSet};

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::types::{Event, EventKind};

use super::window::ReportClock;

/// Channel bucket for events without a `utm_source`.
pub const DIRECT_CHANNEL: &str = "direct";

/// One day of the trend series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    /// Local calendar date
    pub date: NaiveDate,
    /// Distinct users that day
    pub uv: u64,
    /// Events that day
    pub events: u64,
}

/// One entry of the draw-result leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultCount {
    /// Display name of the drawn restaurant
    pub name: String,
    /// How often it was drawn
    pub count: u64,
}

/// Distinct users among `events`.
pub fn unique_visitors(events: &[Event]) -> u64 {
    events
        .iter()
        .map(|e| e.user_id.as_str())
        .collect::<HashSet<_>>()
        .len() as u64
}

/// Distinct users that produced an event of `kind`.
pub fn users_with_kind<'a>(events: &'a [Event], kind: EventKind) -> HashSet<&'a str> {
    events
        .iter()
        .filter(|e| e.kind == kind)
        .map(|e| e.user_id.as_str())
        .collect()
}

/// Percentage `numer / denom * 100`, 0 when the denominator is 0.
pub fn rate(numer: usize, denom: usize) -> f64 {
    if denom == 0 {
        0.0
    } else {
        numer as f64 / denom as f64 * 100.0
    }
}

/// Users that drew, as a share of users that launched the app.
pub fn conversion_rate(events: &[Event]) -> f64 {
    let launched = users_with_kind(events, EventKind::AppLaunch);
    let drew = users_with_kind(events, EventKind::DrawClicked);
    rate(drew.len(), launched.len())
}

/// Users that shared, as a share of users that drew.
pub fn share_rate(events: &[Event]) -> f64 {
    let drew = users_with_kind(events, EventKind::DrawClicked);
    let shared = users_with_kind(events, EventKind::ShareClicked);
    rate(shared.len(), drew.len())
}

/// Distinct users with a `draw_clicked` event since the start of the
/// current week.
pub fn active_users_weekly(events: &[Event], clock: &ReportClock) -> u64 {
    let week_start = clock.start_of_week();
    events
        .iter()
        .filter(|e| e.kind == EventKind::DrawClicked && e.timestamp >= week_start)
        .map(|e| e.user_id.as_str())
        .collect::<HashSet<_>>()
        .len() as u64
}

/// Event count per acquisition channel (`utm_source`), with unattributed
/// events bucketed under [`DIRECT_CHANNEL`].
pub fn channel_stats(events: &[Event]) -> BTreeMap<String, u64> {
    let mut stats = BTreeMap::new();
    for event in events {
        let channel = event
            .attribution
            .utm_source
            .as_deref()
            .unwrap_or(DIRECT_CHANNEL);
        *stats.entry(channel.to_string()).or_insert(0) += 1;
    }
    stats
}

/// Event count per local hour of day.
pub fn active_hours(events: &[Event], clock: &ReportClock) -> [u64; 24] {
    let mut hours = [0u64; 24];
    for event in events {
        hours[clock.hour_of(event.timestamp)] += 1;
    }
    hours
}

/// Event count per local weekday, indexed Sunday = 0 through Saturday = 6.
pub fn weekday_distribution(events: &[Event], clock: &ReportClock) -> [u64; 7] {
    let mut days = [0u64; 7];
    for event in events {
        days[clock.weekday_index(event.timestamp)] += 1;
    }
    days
}

/// The `k` most frequent `draw_result` names, descending by count, ties
/// broken alphabetically.
pub fn top_draw_results(events: &[Event], k: usize) -> Vec<ResultCount> {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for event in events.iter().filter(|e| e.kind == EventKind::DrawResult) {
        if let Some(name) = event.property("result").and_then(|v| v.as_str()) {
            *counts.entry(name).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<ResultCount> = counts
        .into_iter()
        .map(|(name, count)| ResultCount {
            name: name.to_string(),
            count,
        })
        .collect();
    // BTreeMap iteration is already alphabetical, so a stable sort by
    // count keeps the alphabetical tie-break.
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(k);
    ranked
}

/// Per-day `{date, uv, events}` for the last `days` days including today,
/// oldest first. Days without events appear with zeros.
pub fn trend_series(events: &[Event], clock: &ReportClock, days: u32) -> Vec<TrendPoint> {
    let days = days.max(1);
    let today = clock.today();
    let first = today - Duration::days(days as i64 - 1);

    let mut by_day: BTreeMap<NaiveDate, (HashSet<&str>, u64)> = BTreeMap::new();
    for event in events {
        let date = clock.local_date(event.timestamp);
        if date >= first && date <= today {
            let entry = by_day.entry(date).or_default();
            entry.0.insert(event.user_id.as_str());
            entry.1 += 1;
        }
    }

    (0..days as i64)
        .map(|i| {
            let date = first + Duration::days(i);
            let (uv, count) = by_day
                .get(&date)
                .map(|(users, count)| (users.len() as u64, *count))
                .unwrap_or((0, 0));
            TrendPoint {
                date,
                uv,
                events: count,
            }
        })
        .collect()
}

/// Day-N retention, percent.
///
/// Cohort: users with any event on `today - n` days. Returned: the share
/// of the cohort with any event on the following day. An empty cohort
/// yields 0.
pub fn retention_rate(events: &[Event], clock: &ReportClock, n: u32) -> f64 {
    let target = clock.today() - Duration::days(n as i64);
    let next = target + Duration::days(1);

    let mut cohort: HashSet<&str> = HashSet::new();
    let mut next_day: HashSet<&str> = HashSet::new();
    for event in events {
        let date = clock.local_date(event.timestamp);
        if date == target {
            cohort.insert(event.user_id.as_str());
        } else if date == next {
            next_day.insert(event.user_id.as_str());
        }
    }

    let returned = cohort.iter().filter(|u| next_day.contains(*u)).count();
    rate(returned, cohort.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::AttributionRecord;
    use chrono::{DateTime, FixedOffset, Utc};

    fn clock_at(rfc3339: &str) -> ReportClock {
        let now = DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc);
        ReportClock::fixed(now, FixedOffset::east_opt(0).unwrap())
    }

    fn event_at(kind: EventKind, user_id: &str, rfc3339: &str) -> Event {
        Event {
            kind,
            user_id: user_id.to_string(),
            session_id: "session_test".to_string(),
            timestamp: DateTime::parse_from_rfc3339(rfc3339)
                .unwrap()
                .with_timezone(&Utc),
            attribution: AttributionRecord::default(),
            properties: None,
        }
    }

    fn with_source(mut event: Event, source: Option<&str>) -> Event {
        event.attribution.utm_source = source.map(|s| s.to_string());
        event
    }

    fn with_result(mut event: Event, name: &str) -> Event {
        event.properties = Some(
            [("result".to_string(), serde_json::json!(name))]
                .into_iter()
                .collect(),
        );
        event
    }

    #[test]
    fn test_unique_visitors_dedupes() {
        let events = vec![
            event_at(EventKind::PageView, "u1", "2026-03-10T10:00:00Z"),
            event_at(EventKind::PageView, "u1", "2026-03-10T11:00:00Z"),
            event_at(EventKind::PageView, "u2", "2026-03-10T12:00:00Z"),
        ];
        assert_eq!(unique_visitors(&events), 2);
    }

    #[test]
    fn test_conversion_rate_zero_denominator() {
        // Draws without a single app_launch: rate is 0, not an error.
        let events = vec![
            event_at(EventKind::DrawClicked, "u1", "2026-03-10T10:00:00Z"),
            event_at(EventKind::DrawClicked, "u2", "2026-03-10T10:00:00Z"),
        ];
        assert_eq!(conversion_rate(&events), 0.0);
    }

    #[test]
    fn test_conversion_and_share_rates() {
        let events = vec![
            event_at(EventKind::AppLaunch, "u1", "2026-03-10T10:00:00Z"),
            event_at(EventKind::AppLaunch, "u2", "2026-03-10T10:00:00Z"),
            event_at(EventKind::AppLaunch, "u3", "2026-03-10T10:00:00Z"),
            event_at(EventKind::AppLaunch, "u4", "2026-03-10T10:00:00Z"),
            event_at(EventKind::DrawClicked, "u1", "2026-03-10T10:05:00Z"),
            event_at(EventKind::DrawClicked, "u2", "2026-03-10T10:05:00Z"),
            event_at(EventKind::ShareClicked, "u1", "2026-03-10T10:10:00Z"),
        ];
        // 2 of 4 launchers drew; 1 of 2 drawers shared.
        assert_eq!(conversion_rate(&events), 50.0);
        assert_eq!(share_rate(&events), 50.0);
    }

    #[test]
    fn test_channel_bucketing() {
        let base = event_at(EventKind::PageView, "u1", "2026-03-10T10:00:00Z");
        let events = vec![
            with_source(base.clone(), Some("kol")),
            with_source(base.clone(), None),
            with_source(base, Some("kol")),
        ];
        let stats = channel_stats(&events);
        assert_eq!(stats["kol"], 2);
        assert_eq!(stats[DIRECT_CHANNEL], 1);
    }

    #[test]
    fn test_top_results_ranking() {
        let base = event_at(EventKind::DrawResult, "u1", "2026-03-10T10:00:00Z");
        let events: Vec<Event> = ["A", "B", "A", "C", "A", "B"]
            .iter()
            .map(|name| with_result(base.clone(), name))
            .collect();

        let top = top_draw_results(&events, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0], ResultCount { name: "A".to_string(), count: 3 });
        assert_eq!(top[1], ResultCount { name: "B".to_string(), count: 2 });
    }

    #[test]
    fn test_top_results_ignores_other_kinds() {
        let events = vec![with_result(
            event_at(EventKind::PageView, "u1", "2026-03-10T10:00:00Z"),
            "A",
        )];
        assert!(top_draw_results(&events, 5).is_empty());
    }

    #[test]
    fn test_retention_half_returned() {
        // user1 active on day 0 and day 1; user2 only on day 0.
        let clock = clock_at("2026-03-11T12:00:00Z");
        let events = vec![
            event_at(EventKind::PageView, "user1", "2026-03-10T09:00:00Z"),
            event_at(EventKind::PageView, "user2", "2026-03-10T09:30:00Z"),
            event_at(EventKind::PageView, "user1", "2026-03-11T09:00:00Z"),
        ];
        assert_eq!(retention_rate(&events, &clock, 1), 50.0);
    }

    #[test]
    fn test_retention_empty_cohort() {
        let clock = clock_at("2026-03-11T12:00:00Z");
        assert_eq!(retention_rate(&[], &clock, 7), 0.0);
    }

    #[test]
    fn test_trend_includes_empty_days() {
        let clock = clock_at("2026-03-11T12:00:00Z");
        let events = vec![
            event_at(EventKind::PageView, "u1", "2026-03-09T10:00:00Z"),
            event_at(EventKind::PageView, "u2", "2026-03-09T11:00:00Z"),
            event_at(EventKind::PageView, "u1", "2026-03-11T08:00:00Z"),
            // Outside the window, must not be counted.
            event_at(EventKind::PageView, "u9", "2026-03-01T08:00:00Z"),
        ];

        let trend = trend_series(&events, &clock, 3);
        assert_eq!(trend.len(), 3);
        assert_eq!(trend[0].date, NaiveDate::from_ymd_opt(2026, 3, 9).unwrap());
        assert_eq!((trend[0].uv, trend[0].events), (2, 2));
        assert_eq!((trend[1].uv, trend[1].events), (0, 0));
        assert_eq!((trend[2].uv, trend[2].events), (1, 1));
    }

    #[test]
    fn test_weekly_active_counts_draws_since_monday() {
        // Wednesday March 11; the week started Monday March 9.
        let clock = clock_at("2026-03-11T12:00:00Z");
        let events = vec![
            event_at(EventKind::DrawClicked, "u1", "2026-03-10T10:00:00Z"),
            event_at(EventKind::DrawClicked, "u1", "2026-03-11T10:00:00Z"),
            // Last week's draw and this week's page view both excluded.
            event_at(EventKind::DrawClicked, "u2", "2026-03-08T10:00:00Z"),
            event_at(EventKind::PageView, "u3", "2026-03-10T10:00:00Z"),
        ];
        assert_eq!(active_users_weekly(&events, &clock), 1);
    }

    #[test]
    fn test_hour_and_weekday_histograms() {
        let clock = clock_at("2026-03-11T12:00:00Z");
        let events = vec![
            // Tuesday March 10, 10:00 and 10:30.
            event_at(EventKind::PageView, "u1", "2026-03-10T10:00:00Z"),
            event_at(EventKind::PageView, "u2", "2026-03-10T10:30:00Z"),
            // Sunday March 8, 22:00.
            event_at(EventKind::PageView, "u3", "2026-03-08T22:00:00Z"),
        ];

        let hours = active_hours(&events, &clock);
        assert_eq!(hours[10], 2);
        assert_eq!(hours[22], 1);
        assert_eq!(hours.iter().sum::<u64>(), 3);

        let days = weekday_distribution(&events, &clock);
        assert_eq!(days[0], 1); // Sunday
        assert_eq!(days[2], 2); // Tuesday
    }
}
