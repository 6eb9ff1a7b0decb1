//! Shared helpers for interpreting partner responses.

use std::collections::HashSet;

use error_stack::{Report, ResultExt};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as Json};

use crate::error::BidBridgeError;

use super::types::{NormalizedBid, WireRequest};

/// Conventional bid lifetime in seconds when a partner declares none.
pub const DEFAULT_TTL_SECONDS: u32 = 300;

/// Parse a raw response body into a partner's typed response.
///
/// An empty or whitespace-only body means "no bids" and yields `Ok(None)`.
///
/// # Errors
///
/// Returns [`BidBridgeError::InvalidResponse`] when the body is not valid
/// JSON for `T`.
pub fn parse_body<T: DeserializeOwned>(
    partner: &str,
    body: &str,
) -> Result<Option<T>, Report<BidBridgeError>> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(body)
        .map(Some)
        .change_context(BidBridgeError::invalid_response(
            partner,
            "response body is not valid JSON for this partner",
        ))
}

/// Keep only bids that correlate to the request and satisfy the canonical
/// invariants. Dropped bids are logged at debug level; order is preserved.
#[must_use]
pub fn retain_acceptable(
    partner: &str,
    bids: Vec<NormalizedBid>,
    request: &WireRequest,
) -> Vec<NormalizedBid> {
    let sent: HashSet<&str> = request.bids.iter().map(|b| b.bid_id.as_str()).collect();

    bids.into_iter()
        .filter(|bid| {
            if !sent.contains(bid.request_id.as_str()) {
                log::debug!(
                    "{partner}: dropping bid for unknown request id '{}'",
                    bid.request_id
                );
                return false;
            }
            match check_invariants(bid) {
                Ok(()) => true,
                Err(reason) => {
                    log::debug!(
                        "{partner}: dropping bid for '{}': {reason}",
                        bid.request_id
                    );
                    false
                }
            }
        })
        .collect()
}

fn check_invariants(bid: &NormalizedBid) -> Result<(), &'static str> {
    if !bid.cpm.is_finite() || bid.cpm < 0.0 {
        return Err("cpm must be finite and non-negative");
    }
    if bid.width == 0 || bid.height == 0 {
        return Err("width and height must be positive");
    }
    if bid.ttl == 0 {
        return Err("ttl must be positive");
    }
    if bid.currency.is_empty() {
        return Err("currency is empty");
    }
    if !bid.creative.has_payload() {
        return Err("creative payload is empty");
    }
    Ok(())
}

/// First candidate that is present and non-empty.
#[must_use]
pub fn first_non_empty<I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = Option<String>>,
{
    candidates
        .into_iter()
        .flatten()
        .find(|candidate| !candidate.is_empty())
}

/// Wrap partner passthrough metadata under the partner's namespaced key.
#[must_use]
pub fn namespaced(partner: &str, value: Json) -> Map<String, Json> {
    let mut ext = Map::new();
    if !value.is_null() {
        ext.insert(partner.to_string(), value);
    }
    ext
}

/// Partners send numbers as strings, strings as numbers, and sometimes
/// neither. These helpers read a value if it can be read and give `None`
/// otherwise.
pub mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value as Json;

    #[must_use]
    pub fn to_f64(value: &Json) -> Option<f64> {
        match value {
            Json::Number(n) => n.as_f64(),
            Json::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn to_u32(value: &Json) -> Option<u32> {
        to_f64(value)
            .filter(|v| v.is_finite() && *v >= 0.0 && *v <= f64::from(u32::MAX))
            .map(|v| v as u32)
    }

    #[must_use]
    pub fn to_string(value: &Json) -> Option<String> {
        match value {
            Json::String(s) => Some(s.clone()),
            Json::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// # Errors
    ///
    /// Only fails when the input is not valid JSON at all.
    pub fn f64_opt<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        Ok(to_f64(&Json::deserialize(deserializer)?))
    }

    /// # Errors
    ///
    /// Only fails when the input is not valid JSON at all.
    pub fn u32_opt<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
        Ok(to_u32(&Json::deserialize(deserializer)?))
    }

    /// # Errors
    ///
    /// Only fails when the input is not valid JSON at all.
    pub fn string_opt<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        Ok(to_string(&Json::deserialize(deserializer)?))
    }

    /// A list of strings, skipping anything that is not a string.
    ///
    /// # Errors
    ///
    /// Only fails when the input is not valid JSON at all.
    pub fn strings<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        Ok(match Json::deserialize(deserializer)? {
            Json::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Json::String(s) if !s.is_empty() => Some(s),
                    _ => None,
                })
                .collect(),
            Json::String(s) if !s.is_empty() => vec![s],
            _ => Vec::new(),
        })
    }
}
