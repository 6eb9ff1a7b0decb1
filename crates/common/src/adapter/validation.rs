//! Shared checks for partner validation gates.

use serde_json::Value as Json;

use super::types::BidRequest;

/// True when `params[key]` is a usable identifier.
///
/// Missing keys, `null`, empty or whitespace-only strings, zero numbers and
/// `"0"` all count as absent.
#[must_use]
pub fn has_required_id(bid: &BidRequest, key: &str) -> bool {
    bid.params.get(key).is_some_and(is_present_id)
}

/// True when every key in `keys` is a usable identifier.
#[must_use]
pub fn has_required_ids(bid: &BidRequest, keys: &[&str]) -> bool {
    keys.iter().all(|key| has_required_id(bid, key))
}

fn is_present_id(value: &Json) -> bool {
    match value {
        Json::String(s) => {
            let trimmed = s.trim();
            !trimmed.is_empty() && trimmed != "0"
        }
        Json::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::tests::banner_bid;
    use serde_json::json;

    #[test]
    fn test_required_id_rejects_empty_and_zero() {
        let bid = banner_bid(
            "b1",
            json!({
                "empty": "",
                "blank": "  ",
                "zero": 0,
                "zeroStr": "0",
                "null": null,
                "obj": {"a": 1},
                "ok": "10433394",
                "num": 123
            }),
        );
        for key in ["empty", "blank", "zero", "zeroStr", "null", "obj", "missing"] {
            assert!(!has_required_id(&bid, key), "{key} should be rejected");
        }
        assert!(has_required_id(&bid, "ok"));
        assert!(has_required_id(&bid, "num"));
    }

    #[test]
    fn test_required_ids_needs_all() {
        let bid = banner_bid("b1", json!({"publisherId": "1212"}));
        assert!(!has_required_ids(&bid, &["publisherId", "zoneId"]));
        assert!(has_required_ids(&bid, &["publisherId"]));
    }
}
