//! Aggregation engine
//!
//! Read-side analytics over stored events. Three layers:
//!
//! - [`window`]: calendar time-window math with an injectable clock
//! - [`metrics`]: pure metric functions over event slices
//! - [`summary`]: fan-out assembly of the full report bundle
//!
//! Nothing in here mutates state; the engine is a pure consumer of the
//! event stores defined in [`crate::collector`] and [`crate::db`].

pub mod metrics;
pub mod summary;
pub mod window;

pub use metrics::{ResultCount, TrendPoint, DIRECT_CHANNEL};
pub use summary::{
    fetch_summary, fetch_summary_custom, local_summary, AnalyticsSummary, SummaryOptions,
    SummaryTotals,
};
pub use window::{ReportClock, TimeRange};
