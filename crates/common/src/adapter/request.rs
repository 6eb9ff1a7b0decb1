//! Shared helpers for building partner wire requests.
//!
//! Everything here is deterministic: maps are ordered and nothing reads a
//! clock or a random source, so building the same batch twice yields
//! byte-identical bodies.

use std::collections::BTreeMap;

use error_stack::{Report, ResultExt};
use serde::Serialize;
use serde_json::{Map, Value as Json};

use crate::error::BidBridgeError;

use super::types::{NativeAsset, NativeParams, Size};

/// Normalized key/value targeting: every value is a non-empty list of
/// non-empty strings.
pub type Targeting = BTreeMap<String, Vec<String>>;

/// Explicit width/height object used on the wire instead of `[w, h]` arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WireSize {
    pub width: u32,
    pub height: u32,
}

impl From<Size> for WireSize {
    fn from(size: Size) -> Self {
        Self {
            width: size.width,
            height: size.height,
        }
    }
}

#[must_use]
pub fn size_objects(sizes: &[Size]) -> Vec<WireSize> {
    sizes.iter().copied().map(WireSize::from).collect()
}

/// Normalize free-form targeting.
///
/// Empty strings, `null`, objects and empty sequences are dropped. Scalars
/// become one-element sequences. Sequences lose their empty and `null`
/// members and numbers are stringified; a sequence left empty is dropped.
#[must_use]
pub fn normalize_targeting(raw: &Map<String, Json>) -> Targeting {
    raw.iter()
        .filter_map(|(key, value)| targeting_values(value).map(|values| (key.clone(), values)))
        .collect()
}

fn targeting_values(value: &Json) -> Option<Vec<String>> {
    let values: Vec<String> = match value {
        Json::Array(items) => items.iter().filter_map(scalar_string).collect(),
        other => scalar_string(other).into_iter().collect(),
    };
    (!values.is_empty()).then_some(values)
}

fn scalar_string(value: &Json) -> Option<String> {
    match value {
        Json::String(s) if !s.is_empty() => Some(s.clone()),
        Json::Number(n) => Some(n.to_string()),
        Json::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Merge global targeting under bid-level targeting. Bid-level values win
/// for identical keys.
#[must_use]
pub fn merge_targeting(global: &Targeting, bid_level: &Targeting) -> Targeting {
    let mut merged = global.clone();
    merged.extend(bid_level.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Percent-encode each iframe frame individually and join them with commas.
#[must_use]
pub fn encode_referer_stack(stack: &[String]) -> String {
    stack
        .iter()
        .map(|frame| urlencoding::encode(frame).into_owned())
        .collect::<Vec<_>>()
        .join(",")
}

/// Map native requirement flags onto a partner's asset names.
///
/// Assets without a partner name are skipped. Image size constraints become
/// lists of [`WireSize`].
#[must_use]
pub fn map_native_layout(
    params: &NativeParams,
    names: &[(NativeAsset, &'static str)],
) -> Map<String, Json> {
    let mut layout = Map::new();
    for (asset, requirement) in params {
        let Some((_, name)) = names.iter().find(|(candidate, _)| candidate == asset) else {
            continue;
        };

        let mut entry = Map::new();
        entry.insert("required".to_string(), Json::Bool(requirement.required));
        if !requirement.sizes.is_empty() {
            let sizes: Vec<Json> = requirement
                .sizes
                .iter()
                .map(|size| serde_json::json!({"width": size.width, "height": size.height}))
                .collect();
            entry.insert("sizes".to_string(), Json::Array(sizes));
        }
        if let Some(len) = requirement.len {
            entry.insert("max_length".to_string(), Json::from(len));
        }
        layout.insert((*name).to_string(), Json::Object(entry));
    }
    layout
}

/// Serialize a partner request body.
///
/// # Errors
///
/// Returns an error if the body cannot be serialized to JSON.
pub fn serialize_body<T: Serialize>(
    partner: &str,
    body: &T,
) -> Result<String, Report<BidBridgeError>> {
    serde_json::to_string(body).change_context(BidBridgeError::Serialization {
        message: format!("Failed to serialize {partner} request body"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::types::NativeRequirement;
    use serde_json::json;

    fn as_map(value: Json) -> Map<String, Json> {
        match value {
            Json::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_normalize_targeting_filters_empty_values() {
        let targeting = normalize_targeting(&as_map(json!({
            "a": [],
            "b": null,
            "c": "",
            "d": ["", ""],
            "e": [0, 1, null],
            "f": 0,
            "g": ["x", "y", ""],
            "h": {"foo": "bar"},
            "i": "val"
        })));

        for key in ["a", "b", "c", "d", "h"] {
            assert!(!targeting.contains_key(key), "{key} should be dropped");
        }
        assert_eq!(targeting["e"], vec!["0", "1"]);
        assert_eq!(targeting["f"], vec!["0"]);
        assert_eq!(targeting["g"], vec!["x", "y"]);
        assert_eq!(targeting["i"], vec!["val"]);
    }

    #[test]
    fn test_merge_targeting_bid_level_wins() {
        let global = Targeting::from([
            ("xt".to_string(), vec!["CONFIG".to_string()]),
            ("tl".to_string(), vec!["all".to_string()]),
        ]);
        let bid_level = Targeting::from([("xt".to_string(), vec!["BID".to_string()])]);

        let merged = merge_targeting(&global, &bid_level);
        assert_eq!(merged["xt"], vec!["BID"]);
        assert_eq!(merged["tl"], vec!["all"]);
    }

    #[test]
    fn test_encode_referer_stack_encodes_each_frame() {
        let stack = vec![
            "http://example.com/page.html".to_string(),
            "http://example.com/iframe1.html".to_string(),
        ];
        assert_eq!(
            encode_referer_stack(&stack),
            "http%3A%2F%2Fexample.com%2Fpage.html,http%3A%2F%2Fexample.com%2Fiframe1.html"
        );
        assert_eq!(encode_referer_stack(&[]), "");
    }

    #[test]
    fn test_map_native_layout_renames_and_nests_sizes() {
        let params = NativeParams::from([
            (
                NativeAsset::Image,
                NativeRequirement {
                    required: true,
                    sizes: vec![Size::new(100, 100)],
                    len: None,
                },
            ),
            (NativeAsset::Cta, NativeRequirement::default()),
            (NativeAsset::Other, NativeRequirement::default()),
        ]);
        let layout = map_native_layout(
            &params,
            &[(NativeAsset::Image, "main_image"), (NativeAsset::Cta, "ctatext")],
        );
        assert_eq!(
            Json::Object(layout),
            json!({
                "main_image": {"required": true, "sizes": [{"width": 100, "height": 100}]},
                "ctatext": {"required": false}
            })
        );
    }

    #[test]
    fn test_size_objects() {
        let sizes = size_objects(&[Size::new(300, 250)]);
        assert_eq!(
            serde_json::to_value(sizes).expect("should serialize"),
            json!([{"width": 300, "height": 250}])
        );
    }
}
