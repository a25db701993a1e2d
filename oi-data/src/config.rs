use crate::aggregate::LegPolicy;
use std::{str::FromStr, time::Duration};

/// Root page of the NSE site, requested first to obtain anti-bot cookies.
pub const NSE_BASE_URL: &str = "https://www.nseindia.com";

/// Option chain endpoint, relative to the base url.
pub const OPTION_CHAIN_PATH: &str = "/api/option-chain-indices";

/// The upstream rejects requests that do not look like they come from a browser.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

/// Delay between failed poll attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Sleep the same duration after every failed attempt.
    Fixed(Duration),
    /// Double the delay after every failed attempt, starting at `initial`, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { initial, max } => {
                let factor = 1u32
                    .checked_shl(attempt.saturating_sub(1))
                    .unwrap_or(u32::MAX);
                initial.saturating_mul(factor).min(max)
            }
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Fixed(Duration::from_secs(3))
    }
}

/// Option chain poller configuration
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Provider root url, used for cookie priming and as base for the data endpoint
    pub base_url: String,
    /// User-Agent sent with every request
    pub user_agent: String,
    /// Timeout of the cookie priming request
    pub prime_timeout: Duration,
    /// Timeout of the option chain request
    pub request_timeout: Duration,
    /// Total number of attempts per poll (a value of 0 still makes one attempt)
    pub max_retries: u32,
    /// Delay between attempts
    pub backoff: Backoff,
    /// Which records contribute to the sums
    pub leg_policy: LegPolicy,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            base_url: NSE_BASE_URL.to_string(),
            user_agent: BROWSER_USER_AGENT.to_string(),
            prime_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            max_retries: 3,
            backoff: Backoff::default(),
            leg_policy: LegPolicy::default(),
        }
    }
}

impl PollerConfig {
    /// Create a new configuration with a custom base url
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Build a configuration from `OI_*` environment variables, falling back to defaults.
    ///
    /// - `OI_BASE_URL`
    /// - `OI_PRIME_TIMEOUT_MS`, `OI_HTTP_TIMEOUT_MS`
    /// - `OI_MAX_RETRIES`
    /// - `OI_BACKOFF` (`fixed` | `exponential`), `OI_BACKOFF_MS`, `OI_BACKOFF_MAX_MS`
    /// - `OI_LEG_POLICY` (`any` | `both`)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let backoff_ms = env_parse::<u64>("OI_BACKOFF_MS").unwrap_or(3_000);
        let backoff = match std::env::var("OI_BACKOFF").as_deref() {
            Ok("exponential") => Backoff::Exponential {
                initial: Duration::from_millis(backoff_ms),
                max: Duration::from_millis(env_parse("OI_BACKOFF_MAX_MS").unwrap_or(30_000)),
            },
            _ => Backoff::Fixed(Duration::from_millis(backoff_ms)),
        };

        let leg_policy = match std::env::var("OI_LEG_POLICY").as_deref() {
            Ok("both") => LegPolicy::BothLegs,
            _ => LegPolicy::AnyLeg,
        };

        Self {
            base_url: std::env::var("OI_BASE_URL").unwrap_or(defaults.base_url),
            user_agent: defaults.user_agent,
            prime_timeout: env_parse("OI_PRIME_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.prime_timeout),
            request_timeout: env_parse("OI_HTTP_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
            max_retries: env_parse("OI_MAX_RETRIES").unwrap_or(defaults.max_retries),
            backoff,
            leg_policy,
        }
    }

    /// Set the User-Agent header
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the priming request timeout
    pub fn with_prime_timeout(mut self, timeout: Duration) -> Self {
        self.prime_timeout = timeout;
        self
    }

    /// Set the option chain request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set both the priming and the option chain request timeout
    pub fn with_http_timeout(self, timeout: Duration) -> Self {
        self.with_prime_timeout(timeout).with_request_timeout(timeout)
    }

    /// Set the number of attempts per poll
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the backoff between attempts
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set the record selection policy
    pub fn with_leg_policy(mut self, leg_policy: LegPolicy) -> Self {
        self.leg_policy = leg_policy;
        self
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|value| value.trim().parse().ok())
}
