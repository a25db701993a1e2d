use crate::{aggregate::Snapshot, error::FetchError};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// How current the retained snapshot is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// No snapshot captured yet
    Waiting,
    /// Latest poll succeeded within the staleness threshold
    Fresh,
    /// Latest poll failed, or the snapshot is older than the staleness threshold
    Stale,
}

/// Caller-owned record of the last-known-good [`Snapshot`] of one symbol.
///
/// A failed poll never clears the retained snapshot, it only records the error so the
/// display can keep showing the old figures with a staleness indicator.
#[derive(Debug, Clone, Default)]
pub struct SnapshotState {
    symbol: String,
    latest: Option<Snapshot>,
    last_error: Option<FetchError>,
    last_attempt_at: Option<DateTime<Utc>>,
    consecutive_failures: u32,
}

impl SnapshotState {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.latest.as_ref()
    }

    pub fn last_error(&self) -> Option<&FetchError> {
        self.last_error.as_ref()
    }

    pub fn last_attempt_at(&self) -> Option<DateTime<Utc>> {
        self.last_attempt_at
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Record the outcome of a poll finished at `at`.
    pub fn record(&mut self, result: Result<Snapshot, FetchError>, at: DateTime<Utc>) {
        self.last_attempt_at = Some(at);
        match result {
            Ok(snapshot) => {
                self.latest = Some(snapshot);
                self.last_error = None;
                self.consecutive_failures = 0;
            }
            Err(error) => {
                self.last_error = Some(error);
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            }
        }
    }

    /// Forget everything and start tracking `symbol`.
    pub fn reset(&mut self, symbol: impl Into<String>) {
        *self = Self::new(symbol);
    }

    /// Age of the retained snapshot at `now`, if any.
    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.latest
            .as_ref()
            .map(|snapshot| (now - snapshot.captured_at).to_std().unwrap_or_default())
    }

    pub fn freshness(&self, now: DateTime<Utc>, stale_after: Duration) -> Freshness {
        match self.age(now) {
            None => Freshness::Waiting,
            Some(_) if self.last_error.is_some() => Freshness::Stale,
            Some(age) if age > stale_after => Freshness::Stale,
            Some(_) => Freshness::Fresh,
        }
    }
}
