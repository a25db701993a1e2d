//! Reduce option chain records into aggregate open interest and a put/call ratio.

use crate::chain::{OptionChainResponse, OptionRecord};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Number of decimal places the put/call ratio is rounded to.
pub const PCR_DECIMAL_PLACES: u32 = 2;

/// Which [`OptionRecord`]s contribute to the open interest sums.
#[derive(
    Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Deserialize, Serialize, derive_more::Display,
)]
pub enum LegPolicy {
    /// Every present leg counts. Records carrying neither leg are dropped.
    #[default]
    #[display("any-leg")]
    AnyLeg,
    /// Only records carrying both a call and a put leg count.
    #[display("both-legs")]
    BothLegs,
}

impl LegPolicy {
    fn accepts(&self, record: &OptionRecord) -> bool {
        match self {
            LegPolicy::AnyLeg => record.has_any_leg(),
            LegPolicy::BothLegs => record.has_both_legs(),
        }
    }
}

/// Open interest of one strike, summed over every expiry the chain reports for it.
#[derive(Copy, Clone, PartialEq, Debug, Deserialize, Serialize, derive_more::Constructor)]
pub struct StrikeOi {
    pub strike: f64,
    pub calls_oi: u64,
    pub puts_oi: u64,
}

impl StrikeOi {
    pub fn total(&self) -> u64 {
        self.calls_oi.saturating_add(self.puts_oi)
    }
}

/// Aggregate open interest figures captured from one successful poll.
///
/// A `Snapshot` is never mutated: the next poll produces a new one that supersedes it.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct Snapshot {
    pub calls_oi: u64,
    pub puts_oi: u64,
    /// `puts_oi / max(1, calls_oi)` rounded to [`PCR_DECIMAL_PLACES`].
    pub pcr: Decimal,
    /// Per-strike rows that contributed to the sums, ordered by strike.
    pub strikes: Vec<StrikeOi>,
    pub underlying_value: Option<f64>,
    pub nearest_expiry: Option<String>,
    pub captured_at: DateTime<Utc>,
}

impl Snapshot {
    /// Build a [`Snapshot`] from a parsed option chain response.
    pub fn from_chain(
        chain: &OptionChainResponse,
        policy: LegPolicy,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            underlying_value: chain.records.underlying_value,
            nearest_expiry: chain.records.expiry_dates.first().cloned(),
            ..aggregate_with(&chain.records.data, policy, captured_at)
        }
    }
}

/// Aggregate `records` with the default [`LegPolicy::AnyLeg`].
pub fn aggregate(records: &[OptionRecord], captured_at: DateTime<Utc>) -> Snapshot {
    aggregate_with(records, LegPolicy::default(), captured_at)
}

/// Aggregate `records`, skipping those the `policy` does not accept.
pub fn aggregate_with(
    records: &[OptionRecord],
    policy: LegPolicy,
    captured_at: DateTime<Utc>,
) -> Snapshot {
    let strikes = records
        .iter()
        .filter(|record| policy.accepts(record))
        .map(|record| {
            StrikeOi::new(
                record.strike_price,
                record.call.map_or(0, |leg| leg.open_interest),
                record.put.map_or(0, |leg| leg.open_interest),
            )
        })
        .sorted_by(|a, b| a.strike.total_cmp(&b.strike))
        .coalesce(|prev, next| {
            if prev.strike == next.strike {
                Ok(StrikeOi::new(
                    prev.strike,
                    prev.calls_oi.saturating_add(next.calls_oi),
                    prev.puts_oi.saturating_add(next.puts_oi),
                ))
            } else {
                Err((prev, next))
            }
        })
        .collect::<Vec<_>>();

    let (calls_oi, puts_oi) = strikes.iter().fold((0u64, 0u64), |(calls, puts), strike| {
        (
            calls.saturating_add(strike.calls_oi),
            puts.saturating_add(strike.puts_oi),
        )
    });

    Snapshot {
        calls_oi,
        puts_oi,
        pcr: put_call_ratio(puts_oi, calls_oi),
        strikes,
        underlying_value: None,
        nearest_expiry: None,
        captured_at,
    }
}

/// `puts_oi / max(1, calls_oi)` rounded half-to-even to [`PCR_DECIMAL_PLACES`].
pub fn put_call_ratio(puts_oi: u64, calls_oi: u64) -> Decimal {
    (Decimal::from(puts_oi) / Decimal::from(calls_oi.max(1)))
        .round_dp_with_strategy(PCR_DECIMAL_PLACES, RoundingStrategy::MidpointNearestEven)
}
