use crate::error::FetchError;
use serde::{Deserialize, Serialize};

/// Option chain response returned by the NSE `option-chain-indices` endpoint.
///
/// Only the fields the poller reads are modelled, unknown fields are ignored. A body that
/// does not match this shape is rejected once, here, as [`FetchError::MalformedResponse`].
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct OptionChainResponse {
    pub records: OptionChainRecords,
}

impl OptionChainResponse {
    /// Parse a raw response body.
    pub fn from_slice(body: &[u8]) -> Result<Self, FetchError> {
        serde_json::from_slice(body).map_err(FetchError::from)
    }
}

/// `records` section of an [`OptionChainResponse`].
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct OptionChainRecords {
    #[serde(rename = "expiryDates", default)]
    pub expiry_dates: Vec<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(rename = "underlyingValue", default)]
    pub underlying_value: Option<f64>,
    pub data: Vec<OptionRecord>,
}

/// One strike of the chain, with optional call (`CE`) and put (`PE`) legs.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct OptionRecord {
    #[serde(rename = "strikePrice")]
    pub strike_price: f64,
    #[serde(rename = "expiryDate", default)]
    pub expiry_date: Option<String>,
    #[serde(rename = "CE", default)]
    pub call: Option<OptionLeg>,
    #[serde(rename = "PE", default)]
    pub put: Option<OptionLeg>,
}

impl OptionRecord {
    pub fn new(strike_price: f64, call_oi: Option<u64>, put_oi: Option<u64>) -> Self {
        Self {
            strike_price,
            expiry_date: None,
            call: call_oi.map(OptionLeg::new),
            put: put_oi.map(OptionLeg::new),
        }
    }

    pub fn has_both_legs(&self) -> bool {
        self.call.is_some() && self.put.is_some()
    }

    pub fn has_any_leg(&self) -> bool {
        self.call.is_some() || self.put.is_some()
    }
}

/// Call or put leg of an [`OptionRecord`].
#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize, Serialize, derive_more::Constructor)]
pub struct OptionLeg {
    #[serde(rename = "openInterest", deserialize_with = "de_open_interest")]
    pub open_interest: u64,
}

/// Deserialize an open interest figure sent either as an integer or as a whole float
/// (eg/ `1250` or `1250.0`) into a `u64`.
fn de_open_interest<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawOpenInterest {
        Integer(u64),
        Float(f64),
    }

    match RawOpenInterest::deserialize(deserializer)? {
        RawOpenInterest::Integer(value) => Ok(value),
        RawOpenInterest::Float(value) if value.is_finite() && value >= 0.0 => {
            Ok(value.round() as u64)
        }
        RawOpenInterest::Float(value) => Err(serde::de::Error::custom(format!(
            "open interest must be a non-negative number, got {value}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_de_option_chain_response() {
        let input = r#"
        {
            "records": {
                "expiryDates": ["26-Dec-2024", "02-Jan-2025"],
                "timestamp": "20-Dec-2024 15:30:00",
                "underlyingValue": 23587.5,
                "strikePrices": [23500, 23600],
                "data": [
                    {
                        "strikePrice": 23500,
                        "expiryDate": "26-Dec-2024",
                        "CE": { "strikePrice": 23500, "openInterest": 120000, "lastPrice": 180.5 },
                        "PE": { "strikePrice": 23500, "openInterest": 90000.0, "lastPrice": 95.1 }
                    },
                    {
                        "strikePrice": 23600,
                        "expiryDate": "26-Dec-2024",
                        "PE": { "openInterest": 4500 }
                    }
                ]
            },
            "filtered": { "CE": { "totOI": 1 }, "PE": { "totOI": 2 } }
        }
        "#;

        let actual = serde_json::from_str::<OptionChainResponse>(input).unwrap();

        assert_eq!(actual.records.expiry_dates.len(), 2);
        assert_eq!(actual.records.underlying_value, Some(23587.5));
        assert_eq!(actual.records.data.len(), 2);

        let first = &actual.records.data[0];
        assert_eq!(first.strike_price, 23500.0);
        assert_eq!(first.expiry_date.as_deref(), Some("26-Dec-2024"));
        assert_eq!(first.call, Some(OptionLeg::new(120000)));
        assert_eq!(first.put, Some(OptionLeg::new(90000)));
        assert!(first.has_both_legs());

        let second = &actual.records.data[1];
        assert_eq!(second.call, None);
        assert_eq!(second.put, Some(OptionLeg::new(4500)));
        assert!(!second.has_both_legs());
        assert!(second.has_any_leg());
    }

    #[test]
    fn test_de_option_chain_response_minimal_shape() {
        let input = r#"{"records":{"data":[{"strikePrice":100}]}}"#;

        let actual = OptionChainResponse::from_slice(input.as_bytes()).unwrap();

        assert!(actual.records.expiry_dates.is_empty());
        assert_eq!(actual.records.timestamp, None);
        assert_eq!(actual.records.data, vec![OptionRecord::new(100.0, None, None)]);
        assert!(!actual.records.data[0].has_any_leg());
    }

    #[test]
    fn test_de_option_chain_response_rejects_bad_shapes() {
        struct TestCase {
            input: &'static str,
        }

        let tests = vec![
            TestCase {
                // TC0: not json (eg/ a bot-check html page)
                input: "<html>Access Denied</html>",
            },
            TestCase {
                // TC1: empty object returned when the session lacks cookies
                input: "{}",
            },
            TestCase {
                // TC2: records without data
                input: r#"{"records":{"timestamp":"x"}}"#,
            },
            TestCase {
                // TC3: data is not an array
                input: r#"{"records":{"data":{"strikePrice":100}}}"#,
            },
            TestCase {
                // TC4: leg present but missing openInterest
                input: r#"{"records":{"data":[{"strikePrice":100,"CE":{"lastPrice":1.0}}]}}"#,
            },
            TestCase {
                // TC5: negative open interest
                input: r#"{"records":{"data":[{"strikePrice":100,"PE":{"openInterest":-5}}]}}"#,
            },
            TestCase {
                // TC6: open interest sent as a string
                input: r#"{"records":{"data":[{"strikePrice":100,"PE":{"openInterest":"5"}}]}}"#,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = OptionChainResponse::from_slice(test.input.as_bytes());
            assert!(
                matches!(actual, Err(FetchError::MalformedResponse(_))),
                "TC{} failed: {:?}",
                index,
                actual
            );
        }
    }
}
