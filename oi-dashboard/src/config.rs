/// Dashboard configuration
///
/// Read from environment variables by the binary, see [`DashboardConfig::from_env`].
use std::{path::PathBuf, time::Duration};

/// Allowed refresh interval range, in seconds.
pub const MIN_REFRESH_SECS: u64 = 1;
pub const MAX_REFRESH_SECS: u64 = 10;

/// Dashboard configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardConfig {
    /// Index symbols the selector cycles through
    pub symbols: Vec<String>,
    /// Delay between the end of one poll and the start of the next
    pub refresh: Duration,
    /// Age after which the retained snapshot is flagged stale (`None` = 3 x refresh)
    pub stale_after: Option<Duration>,
    /// File receiving tracing output (the terminal belongs to the UI)
    pub log_file: PathBuf,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["NIFTY".to_string(), "BANKNIFTY".to_string()],
            refresh: Duration::from_secs(3),
            stale_after: None,
            log_file: PathBuf::from("oi-dashboard.log"),
        }
    }
}

impl DashboardConfig {
    /// Build from `OI_SYMBOLS`, `OI_REFRESH_SECS`, `OI_STALE_SECS` and `OI_LOG_FILE`.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let symbols = std::env::var("OI_SYMBOLS")
            .ok()
            .map(|raw| parse_symbols(&raw))
            .filter(|symbols| !symbols.is_empty())
            .unwrap_or(defaults.symbols);

        let refresh = std::env::var("OI_REFRESH_SECS")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .map(clamp_refresh)
            .unwrap_or(defaults.refresh);

        let stale_after = std::env::var("OI_STALE_SECS")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .map(Duration::from_secs);

        let log_file = std::env::var("OI_LOG_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.log_file);

        Self {
            symbols,
            refresh,
            stale_after,
            log_file,
        }
    }

    /// Set the symbols the selector cycles through
    pub fn with_symbols<S: Into<String>>(mut self, symbols: impl IntoIterator<Item = S>) -> Self {
        self.symbols = symbols.into_iter().map(Into::into).collect();
        self
    }

    /// Set refresh interval, clamped to the allowed range
    pub fn with_refresh_secs(mut self, secs: u64) -> Self {
        self.refresh = clamp_refresh(secs);
        self
    }

    /// Set an explicit staleness threshold
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = Some(stale_after);
        self
    }

    /// Staleness threshold for the given refresh interval.
    pub fn stale_threshold(&self, refresh: Duration) -> Duration {
        self.stale_after.unwrap_or(refresh * 3)
    }
}

/// Clamp a refresh interval in seconds to [`MIN_REFRESH_SECS`]..=[`MAX_REFRESH_SECS`].
pub fn clamp_refresh(secs: u64) -> Duration {
    Duration::from_secs(secs.clamp(MIN_REFRESH_SECS, MAX_REFRESH_SECS))
}

fn parse_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}
