use crate::{
    aggregate::{LegPolicy, Snapshot},
    chain::OptionChainResponse,
    config::{Backoff, PollerConfig},
    error::FetchError,
    session::NseSession,
};
use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Source of raw option chains for a symbol.
#[async_trait]
pub trait ChainSource: Send + Sync {
    async fn fetch_chain(&self, symbol: &str) -> Result<OptionChainResponse, FetchError>;
}

/// Polls a [`ChainSource`] with a bounded number of attempts and reduces the chain into a
/// [`Snapshot`].
///
/// Between failed attempts the poller sleeps according to its [`Backoff`]. Once the attempts
/// are exhausted the last [`FetchError`] is returned to the caller, which decides whether to
/// keep showing its previous snapshot.
#[derive(Debug, Clone)]
pub struct OiPoller<Source = NseSession> {
    source: Source,
    max_retries: u32,
    backoff: Backoff,
    leg_policy: LegPolicy,
}

impl OiPoller<NseSession> {
    /// Construct a poller backed by a cookie-primed [`NseSession`].
    pub fn from_config(config: PollerConfig) -> Result<Self, FetchError> {
        let (max_retries, backoff, leg_policy) =
            (config.max_retries, config.backoff, config.leg_policy);

        Ok(Self {
            source: NseSession::new(config)?,
            max_retries,
            backoff,
            leg_policy,
        })
    }
}

impl<Source> OiPoller<Source>
where
    Source: ChainSource,
{
    pub fn new(source: Source, config: &PollerConfig) -> Self {
        Self {
            source,
            max_retries: config.max_retries,
            backoff: config.backoff,
            leg_policy: config.leg_policy,
        }
    }

    /// Number of attempts a single [`poll`](Self::poll) makes at most.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Which records contribute to the snapshot sums.
    pub fn leg_policy(&self) -> LegPolicy {
        self.leg_policy
    }

    /// Fetch and aggregate the option chain of `symbol`.
    pub async fn poll(&self, symbol: &str) -> Result<Snapshot, FetchError> {
        let max_attempts = self.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match self.source.fetch_chain(symbol).await {
                Ok(chain) => {
                    let snapshot = Snapshot::from_chain(&chain, self.leg_policy, Utc::now());
                    info!(
                        symbol,
                        attempt,
                        calls_oi = snapshot.calls_oi,
                        puts_oi = snapshot.puts_oi,
                        pcr = %snapshot.pcr,
                        "captured open interest snapshot"
                    );
                    return Ok(snapshot);
                }
                Err(error) => error,
            };

            if !error.is_recoverable() || attempt >= max_attempts {
                warn!(
                    symbol,
                    attempt,
                    max_attempts,
                    %error,
                    "option chain poll failed, giving up"
                );
                return Err(error);
            }

            let delay = self.backoff.delay(attempt);
            warn!(
                symbol,
                attempt,
                max_attempts,
                rate_limited = error.is_rate_limited(),
                backoff_ms = delay.as_millis() as u64,
                %error,
                "option chain poll failed, retrying"
            );
            sleep(delay).await;
        }
    }
}

/// Poll the NSE option chain of `symbol` once, with up to `max_retries` attempts.
///
/// `http_timeout` bounds both the cookie priming and the data request. Retries use the
/// default fixed backoff.
pub async fn poll(
    symbol: &str,
    http_timeout: Duration,
    max_retries: u32,
) -> Result<Snapshot, FetchError> {
    OiPoller::from_config(one_shot_config(http_timeout, max_retries))?
        .poll(symbol)
        .await
}

fn one_shot_config(http_timeout: Duration, max_retries: u32) -> PollerConfig {
    PollerConfig::default()
        .with_http_timeout(http_timeout)
        .with_max_retries(max_retries)
}
