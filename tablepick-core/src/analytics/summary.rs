//! Summary assembly
//!
//! Composes the pure metrics into one report bundle, either by fanning
//! out concurrent reads against an [`EventStore`] or purely over an
//! in-memory event slice (the local journal).
//!
//! Failure contract: the windowed event fetch is the backbone of the
//! report and its failure fails the summary. Every auxiliary query
//! degrades independently to a zero/empty default with a logged warning,
//! so one slow or broken query never blanks the whole dashboard.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::collector::EventStore;
use crate::config::ReportConfig;
use crate::error::Result;
use crate::types::{Event, EventKind};

use super::metrics::{self, ResultCount, TrendPoint};
use super::window::{ReportClock, TimeRange};

/// Tunables for summary assembly.
#[derive(Debug, Clone, Copy)]
pub struct SummaryOptions {
    /// Days covered by the trend series
    pub trend_days: u32,
    /// Raw recent events included for display
    pub recent_limit: usize,
    /// Entries in the draw-result leaderboard
    pub top_results: usize,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            trend_days: 7,
            recent_limit: 50,
            top_results: 5,
        }
    }
}

impl From<&ReportConfig> for SummaryOptions {
    fn from(config: &ReportConfig) -> Self {
        Self {
            trend_days: config.trend_days,
            recent_limit: config.recent_limit,
            top_results: config.top_results,
        }
    }
}

/// Headline numbers of a summary.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SummaryTotals {
    /// Distinct users in the window
    pub total_uv: u64,
    /// Distinct users since local midnight
    pub today_uv: u64,
    /// Events in the window
    pub total_events: u64,
    /// `draw_clicked` events in the window
    pub draw_count: u64,
    /// `share_clicked` events in the window
    pub share_count: u64,
    /// `favorite_added` events in the window
    pub favorite_count: u64,
    /// Drawing users as a share of launching users, percent
    pub conversion_rate: f64,
    /// Sharing users as a share of drawing users, percent
    pub share_rate: f64,
    /// Distinct users drawing since the start of the week
    pub active_users: u64,
    /// Day-2 retention, percent
    pub retention_day2: f64,
    /// Day-7 retention, percent
    pub retention_day7: f64,
}

/// The full report bundle handed to the UI layer.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsSummary {
    /// Window start (inclusive)
    pub window_start: DateTime<Utc>,
    /// Window end (exclusive)
    pub window_end: DateTime<Utc>,
    /// Headline numbers
    pub totals: SummaryTotals,
    /// Event count per acquisition channel
    pub channels: std::collections::BTreeMap<String, u64>,
    /// Event count per local hour of day
    pub active_hours: [u64; 24],
    /// Event count per local weekday, Sunday-first
    pub weekdays: [u64; 7],
    /// Daily trend, oldest first
    pub trend: Vec<TrendPoint>,
    /// Draw-result leaderboard
    pub top_results: Vec<ResultCount>,
    /// Raw recent events for display, newest first
    pub recent_events: Vec<Event>,
}

/// Unwrap an auxiliary query result, degrading to the default on failure.
fn or_default<T: Default>(what: &str, result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(query = what, error = %e, "summary query failed, using default");
            T::default()
        }
    }
}

/// Assemble a summary for `range` by fanning out concurrent reads
/// against `store`.
///
/// Only the windowed event fetch can fail the call; every other query
/// degrades to zero/empty. The reads are independent and unsynchronized,
/// so concurrent writes may land between them.
pub async fn fetch_summary(
    store: &dyn EventStore,
    range: TimeRange,
    clock: &ReportClock,
    opts: &SummaryOptions,
) -> Result<AnalyticsSummary> {
    let (start, end) = range.bounds(clock);

    let today = clock.today();
    let trend_days = opts.trend_days.max(1);
    let trend_start = clock.day_start(today - Duration::days(trend_days as i64 - 1));

    // Retention cohorts are full local days.
    let ret2_cohort_start = clock.day_start(today - Duration::days(2));
    let ret2_next_start = clock.day_start(today - Duration::days(1));
    let ret7_cohort_start = clock.day_start(today - Duration::days(7));
    let ret7_next_start = clock.day_start(today - Duration::days(6));
    let ret7_next_end = clock.day_start(today - Duration::days(5));

    let (
        window_events,
        today_users,
        launch_users,
        draw_users,
        share_users,
        weekly_draw_users,
        recent_events,
        trend_events,
        ret2_cohort,
        ret2_next,
        ret7_cohort,
        ret7_next,
    ) = tokio::join!(
        store.events_between(start, end),
        store.user_ids_between(clock.start_of_today(), clock.now),
        store.user_ids_with_kind(EventKind::AppLaunch, None),
        store.user_ids_with_kind(EventKind::DrawClicked, None),
        store.user_ids_with_kind(EventKind::ShareClicked, None),
        store.user_ids_with_kind(EventKind::DrawClicked, Some(clock.start_of_week())),
        store.recent_events(opts.recent_limit),
        store.events_between(trend_start, clock.now),
        store.user_ids_between(ret2_cohort_start, ret2_next_start),
        store.user_ids_between(ret2_next_start, clock.day_start(today)),
        store.user_ids_between(ret7_cohort_start, ret7_next_start),
        store.user_ids_between(ret7_next_start, ret7_next_end),
    );

    // The primary fetch failing means there is nothing to report on.
    let window_events = window_events?;

    let today_users = or_default("today_uv", today_users);
    let launch_users = or_default("launch_users", launch_users);
    let draw_users = or_default("draw_users", draw_users);
    let share_users = or_default("share_users", share_users);
    let weekly_draw_users = or_default("weekly_active", weekly_draw_users);
    let recent_events = or_default("recent_events", recent_events);
    let trend_events = or_default("trend", trend_events);
    let ret2_cohort = or_default("retention2_cohort", ret2_cohort);
    let ret2_next = or_default("retention2_next", ret2_next);
    let ret7_cohort = or_default("retention7_cohort", ret7_cohort);
    let ret7_next = or_default("retention7_next", ret7_next);

    let ret2_returned = ret2_cohort.intersection(&ret2_next).count();
    let ret7_returned = ret7_cohort.intersection(&ret7_next).count();

    let totals = SummaryTotals {
        total_uv: metrics::unique_visitors(&window_events),
        today_uv: today_users.len() as u64,
        total_events: window_events.len() as u64,
        draw_count: count_kind(&window_events, EventKind::DrawClicked),
        share_count: count_kind(&window_events, EventKind::ShareClicked),
        favorite_count: count_kind(&window_events, EventKind::FavoriteAdded),
        conversion_rate: metrics::rate(draw_users.len(), launch_users.len()),
        share_rate: metrics::rate(share_users.len(), draw_users.len()),
        active_users: weekly_draw_users.len() as u64,
        retention_day2: metrics::rate(ret2_returned, ret2_cohort.len()),
        retention_day7: metrics::rate(ret7_returned, ret7_cohort.len()),
    };

    Ok(AnalyticsSummary {
        window_start: start,
        window_end: end,
        totals,
        channels: metrics::channel_stats(&window_events),
        active_hours: metrics::active_hours(&window_events, clock),
        weekdays: metrics::weekday_distribution(&window_events, clock),
        trend: metrics::trend_series(&trend_events, clock, trend_days),
        top_results: metrics::top_draw_results(&window_events, opts.top_results),
        recent_events,
    })
}

/// [`fetch_summary`] over an explicit `[start, end)` window.
pub async fn fetch_summary_custom(
    store: &dyn EventStore,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    clock: &ReportClock,
    opts: &SummaryOptions,
) -> Result<AnalyticsSummary> {
    fetch_summary(store, TimeRange::Custom { start, end }, clock, opts).await
}

/// Assemble a summary purely from an in-memory event slice (the local
/// journal). Infallible; same shape as the remote path.
pub fn local_summary(
    events: &[Event],
    range: TimeRange,
    clock: &ReportClock,
    opts: &SummaryOptions,
) -> AnalyticsSummary {
    let (start, end) = range.bounds(clock);

    let windowed: Vec<Event> = events
        .iter()
        .filter(|e| e.timestamp >= start && e.timestamp < end)
        .cloned()
        .collect();

    let today_start = clock.start_of_today();
    let today_uv = metrics::unique_visitors(
        &events
            .iter()
            .filter(|e| e.timestamp >= today_start)
            .cloned()
            .collect::<Vec<_>>(),
    );

    let mut recent_events: Vec<Event> = windowed.clone();
    recent_events.sort_by_key(|e| std::cmp::Reverse(e.timestamp));
    recent_events.truncate(opts.recent_limit);

    let totals = SummaryTotals {
        total_uv: metrics::unique_visitors(&windowed),
        today_uv,
        total_events: windowed.len() as u64,
        draw_count: count_kind(&windowed, EventKind::DrawClicked),
        share_count: count_kind(&windowed, EventKind::ShareClicked),
        favorite_count: count_kind(&windowed, EventKind::FavoriteAdded),
        conversion_rate: metrics::conversion_rate(&windowed),
        share_rate: metrics::share_rate(&windowed),
        active_users: metrics::active_users_weekly(events, clock),
        retention_day2: metrics::retention_rate(events, clock, 2),
        retention_day7: metrics::retention_rate(events, clock, 7),
    };

    AnalyticsSummary {
        window_start: start,
        window_end: end,
        totals,
        channels: metrics::channel_stats(&windowed),
        active_hours: metrics::active_hours(&windowed, clock),
        weekdays: metrics::weekday_distribution(&windowed, clock),
        trend: metrics::trend_series(events, clock, opts.trend_days.max(1)),
        top_results: metrics::top_draw_results(&windowed, opts.top_results),
        recent_events,
    }
}

fn count_kind(events: &[Event], kind: EventKind) -> u64 {
    events.iter().filter(|e| e.kind == kind).count() as u64
}
