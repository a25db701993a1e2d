//! Dashboard state owned by the render loop.

use std::time::Duration;

use chrono::{DateTime, Utc};
use oi_data::{Freshness, SnapshotState};

use crate::config::{DashboardConfig, clamp_refresh};
use crate::feed::{FeedControl, FeedStatus, FeedUpdate};

/// Selected symbol, refresh speed and the retained snapshot of the selected symbol.
#[derive(Debug, Clone)]
pub struct App {
    config: DashboardConfig,
    symbol_index: usize,
    refresh: Duration,
    state: SnapshotState,
    feed_status: FeedStatus,
}

impl App {
    pub fn new(config: DashboardConfig) -> Self {
        let refresh = config.refresh;
        let state = SnapshotState::new(config.symbols.first().cloned().unwrap_or_default());

        Self {
            config,
            symbol_index: 0,
            refresh,
            state,
            feed_status: FeedStatus::Idle,
        }
    }

    pub fn symbols(&self) -> &[String] {
        &self.config.symbols
    }

    pub fn symbol(&self) -> &str {
        self.state.symbol()
    }

    pub fn refresh(&self) -> Duration {
        self.refresh
    }

    pub fn state(&self) -> &SnapshotState {
        &self.state
    }

    pub fn feed_status(&self) -> FeedStatus {
        self.feed_status
    }

    pub fn set_feed_status(&mut self, status: FeedStatus) {
        self.feed_status = status;
    }

    pub fn stale_after(&self) -> Duration {
        self.config.stale_threshold(self.refresh)
    }

    pub fn freshness(&self, now: DateTime<Utc>) -> Freshness {
        self.state.freshness(now, self.stale_after())
    }

    pub fn control(&self) -> FeedControl {
        FeedControl {
            symbol: self.symbol().to_string(),
            refresh: self.refresh,
        }
    }

    /// Select the next configured symbol. The retained snapshot belonged to the previous
    /// symbol, so it is dropped.
    pub fn next_symbol(&mut self) {
        if self.config.symbols.len() < 2 {
            return;
        }
        self.symbol_index = (self.symbol_index + 1) % self.config.symbols.len();
        self.state.reset(self.config.symbols[self.symbol_index].clone());
    }

    /// Shorten the refresh interval by one second. Returns whether it changed.
    pub fn faster(&mut self) -> bool {
        self.set_refresh_secs(self.refresh.as_secs().saturating_sub(1))
    }

    /// Lengthen the refresh interval by one second. Returns whether it changed.
    pub fn slower(&mut self) -> bool {
        self.set_refresh_secs(self.refresh.as_secs() + 1)
    }

    fn set_refresh_secs(&mut self, secs: u64) -> bool {
        let refresh = clamp_refresh(secs);
        let changed = refresh != self.refresh;
        self.refresh = refresh;
        changed
    }

    /// Apply a poll outcome. Outcomes for a symbol that is no longer selected are ignored.
    pub fn apply(&mut self, update: FeedUpdate) -> bool {
        if update.symbol != self.symbol() {
            return false;
        }
        self.state.record(update.result, update.finished_at);
        true
    }
}
