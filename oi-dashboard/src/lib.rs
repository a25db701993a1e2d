/// OI Dashboard - Shared Library
///
/// Building blocks of the `oi-dashboard` binary:
/// - config: symbols, refresh speed and staleness threshold from the environment
/// - feed: background task polling the option chain on a timer
/// - app: selected symbol plus the last-known-good snapshot
/// - widget: ratatui rendering of metrics, strike chart and status line
pub mod app;
pub mod config;
pub mod feed;
pub mod widget;

pub use app::App;
pub use config::DashboardConfig;
pub use feed::{FeedControl, FeedStatus, FeedUpdate, spawn_oi_feed};
pub use widget::render_dashboard;
