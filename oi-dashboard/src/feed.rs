//! Background poll loop feeding the dashboard.
//!
//! One task owns the [`OiPoller`] and polls sequentially, so a session is never used by two
//! polls at once. Control changes arrive on a `watch` channel. A symbol change abandons the
//! in-flight poll and polls the new symbol at once; a refresh change only reschedules the
//! next poll relative to when the last one finished.

use std::time::Duration;

use chrono::{DateTime, Utc};
use oi_data::{ChainSource, FetchError, OiPoller, Snapshot};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info};

/// What the feed should poll, and how often.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedControl {
    pub symbol: String,
    pub refresh: Duration,
}

/// Outcome of one poll.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedUpdate {
    pub symbol: String,
    pub result: Result<Snapshot, FetchError>,
    pub finished_at: DateTime<Utc>,
}

/// Poll loop status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    /// A poll (including its retries) is in flight
    Fetching,
    /// Sleeping until the next poll
    Idle,
    /// The loop has exited
    Stopped,
}

enum PollOutcome {
    Finished(Result<Snapshot, FetchError>),
    Switched(FeedControl),
    Closed,
}

/// Spawn the poll loop.
///
/// The loop exits when the control sender or the update receiver is dropped.
pub fn spawn_oi_feed<Source>(
    poller: OiPoller<Source>,
    mut control_rx: watch::Receiver<FeedControl>,
    update_tx: mpsc::Sender<FeedUpdate>,
    status_tx: watch::Sender<FeedStatus>,
) -> JoinHandle<()>
where
    Source: ChainSource + 'static,
{
    tokio::spawn(async move {
        info!("Starting open interest feed");
        let mut control = control_rx.borrow_and_update().clone();

        'feed: loop {
            let _ = status_tx.send(FeedStatus::Fetching);
            let outcome = tokio::select! {
                result = poller.poll(&control.symbol) => PollOutcome::Finished(result),
                switched = symbol_change(&mut control_rx, &control.symbol) => match switched {
                    Some(next) => PollOutcome::Switched(next),
                    None => PollOutcome::Closed,
                },
            };

            let result = match outcome {
                PollOutcome::Finished(result) => result,
                PollOutcome::Switched(next) => {
                    debug!(
                        from = %control.symbol,
                        to = %next.symbol,
                        "Symbol changed, abandoning in-flight poll"
                    );
                    control = next;
                    continue;
                }
                PollOutcome::Closed => {
                    info!("Control sender dropped, stopping open interest feed");
                    break;
                }
            };

            let finished = Instant::now();
            let update = FeedUpdate {
                symbol: control.symbol.clone(),
                result,
                finished_at: Utc::now(),
            };
            if update_tx.send(update).await.is_err() {
                info!("Update receiver dropped, stopping open interest feed");
                break;
            }

            // Pick up refresh changes made while polling
            let latest = control_rx.borrow_and_update().clone();
            let switched = latest.symbol != control.symbol;
            control = latest;
            if switched {
                continue;
            }

            let _ = status_tx.send(FeedStatus::Idle);
            loop {
                tokio::select! {
                    _ = sleep_until(finished + control.refresh) => break,
                    changed = control_rx.changed() => {
                        if changed.is_err() {
                            info!("Control sender dropped, stopping open interest feed");
                            break 'feed;
                        }
                        let latest = control_rx.borrow_and_update().clone();
                        let switched = latest.symbol != control.symbol;
                        control = latest;
                        if switched {
                            debug!(symbol = %control.symbol, "Symbol changed, polling immediately");
                            break;
                        }
                        debug!(refresh = ?control.refresh, "Refresh changed, rescheduling next poll");
                    }
                }
            }
        }

        let _ = status_tx.send(FeedStatus::Stopped);
    })
}

/// Resolve once the controlled symbol differs from `symbol`, or `None` if the sender is gone.
async fn symbol_change(
    control_rx: &mut watch::Receiver<FeedControl>,
    symbol: &str,
) -> Option<FeedControl> {
    loop {
        control_rx.changed().await.ok()?;
        let control = control_rx.borrow_and_update().clone();
        if control.symbol != symbol {
            return Some(control);
        }
    }
}
