//! # OI-Data
//! Option chain open interest poller for NSE index options.
//!
//! A poll establishes a cookie-primed HTTP session, requests the option chain of one symbol,
//! validates the response shape once, and reduces the per-strike records into an immutable
//! [`Snapshot`] of call open interest, put open interest and the put/call ratio.
//!
//! Transient failures are retried a bounded number of times with a fixed or exponential
//! [`Backoff`]; on exhaustion the last [`FetchError`] is returned. The caller keeps its
//! last-known-good snapshot in a [`SnapshotState`].
//!
//! ```no_run
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), oi_data::FetchError> {
//! let snapshot = oi_data::poll("NIFTY", Duration::from_secs(10), 3).await?;
//! println!("calls {} puts {} pcr {}", snapshot.calls_oi, snapshot.puts_oi, snapshot.pcr);
//! # Ok(())
//! # }
//! ```

/// Aggregation of option records into a [`Snapshot`].
pub mod aggregate;

/// Typed option chain response.
pub mod chain;

/// Poller configuration and upstream constants.
pub mod config;

/// All [`Error`](std::error::Error)s generated while polling.
pub mod error;

/// Bounded-retry poller and the [`ChainSource`] seam.
pub mod poller;

/// Cookie-primed HTTP session against the NSE site.
pub mod session;

/// Caller-owned last-known-good snapshot tracking.
pub mod state;

pub use aggregate::{LegPolicy, Snapshot, StrikeOi, aggregate, aggregate_with, put_call_ratio};
pub use chain::{OptionChainResponse, OptionLeg, OptionRecord};
pub use config::{Backoff, PollerConfig};
pub use error::FetchError;
pub use poller::{ChainSource, OiPoller, poll};
pub use session::NseSession;
pub use state::{Freshness, SnapshotState};
