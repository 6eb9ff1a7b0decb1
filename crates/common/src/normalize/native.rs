//! Native normalization.
//!
//! Two partner shapes are supported: named asset objects (each partner maps
//! its own key names) and OpenRTB Native 1.x asset arrays.

use serde_json::{Map, Value as Json};

use crate::adapter::response::lenient;
use crate::adapter::types::{NativeAsset, NativeAssets, NativeImage};

/// Keys of an image object in a partner's native payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeImageFields {
    pub url: &'static str,
    pub width: &'static str,
    pub height: &'static str,
}

impl NativeImageFields {
    pub const STANDARD: Self = Self {
        url: "url",
        width: "width",
        height: "height",
    };
}

/// How a partner names the fields of a named-asset native payload.
#[derive(Debug, Clone, Copy)]
pub struct NativeFieldMap {
    /// Text assets, as (canonical asset, partner key).
    pub text: &'static [(NativeAsset, &'static str)],
    pub image: &'static str,
    pub icon: &'static str,
    pub image_fields: NativeImageFields,
    /// Object holding the click URL and click trackers.
    pub link: &'static str,
    pub link_url: &'static str,
    pub click_trackers: &'static str,
    pub impression_trackers: &'static str,
    pub javascript_trackers: &'static str,
}

impl NativeFieldMap {
    /// Map a named-asset payload. Absent or non-textual assets stay `None`.
    #[must_use]
    pub fn extract(&self, raw: &Map<String, Json>) -> NativeAssets {
        let mut assets = NativeAssets::default();

        for (asset, key) in self.text {
            if let Some(value) = raw.get(*key).and_then(lenient::to_string) {
                set_text(&mut assets, *asset, value);
            }
        }

        assets.image = raw
            .get(self.image)
            .and_then(|image| read_image(image, &self.image_fields));
        assets.icon = raw
            .get(self.icon)
            .and_then(|icon| read_image(icon, &self.image_fields));

        if let Some(link) = raw.get(self.link) {
            assets.click_url = link.get(self.link_url).and_then(non_empty_string);
            assets.click_trackers = string_list(link.get(self.click_trackers));
        }
        assets.impression_trackers = string_list(raw.get(self.impression_trackers));
        assets.javascript_trackers = raw.get(self.javascript_trackers).and_then(non_empty_string);

        assets
    }
}

/// Map an OpenRTB Native 1.x response (either `{"native": {...}}` or the
/// bare native object). Returns `None` when the value is not a native
/// response at all.
#[must_use]
pub fn from_openrtb(value: &Json) -> Option<NativeAssets> {
    let native = value.get("native").unwrap_or(value);
    let assets_list = native.get("assets")?.as_array()?;

    let mut assets = NativeAssets::default();
    for asset in assets_list {
        if let Some(text) = asset.pointer("/title/text").and_then(non_empty_string) {
            assets.title = Some(text);
        } else if let Some(img) = asset.get("img") {
            let image = read_image(
                img,
                &NativeImageFields {
                    url: "url",
                    width: "w",
                    height: "h",
                },
            );
            // Image type 1 is an icon; everything else is a main image.
            if img.get("type").and_then(Json::as_u64) == Some(1) {
                assets.icon = assets.icon.or(image);
            } else {
                assets.image = assets.image.or(image);
            }
        } else if let Some(data) = asset.get("data") {
            let Some(value) = data.get("value").and_then(lenient::to_string) else {
                continue;
            };
            if let Some(kind) = data.get("type").and_then(Json::as_u64).and_then(data_asset) {
                set_text(&mut assets, kind, value);
            }
        }
    }

    if let Some(link) = native.get("link") {
        assets.click_url = link.get("url").and_then(non_empty_string);
        assets.click_trackers = string_list(link.get("clicktrackers"));
    }
    assets.impression_trackers = string_list(native.get("imptrackers"));
    assets.javascript_trackers = native.get("jstracker").and_then(non_empty_string);
    assets.privacy_link = native.get("privacy").and_then(non_empty_string);

    Some(assets)
}

/// OpenRTB Native data asset type ids.
fn data_asset(kind: u64) -> Option<NativeAsset> {
    Some(match kind {
        1 => NativeAsset::SponsoredBy,
        2 => NativeAsset::Body,
        3 => NativeAsset::Rating,
        4 => NativeAsset::Likes,
        5 => NativeAsset::Downloads,
        6 => NativeAsset::Price,
        7 => NativeAsset::SalePrice,
        8 => NativeAsset::Phone,
        9 => NativeAsset::Address,
        10 => NativeAsset::Body2,
        11 => NativeAsset::DisplayUrl,
        12 => NativeAsset::Cta,
        _ => return None,
    })
}

fn set_text(assets: &mut NativeAssets, asset: NativeAsset, value: String) {
    let slot = match asset {
        NativeAsset::Title => &mut assets.title,
        NativeAsset::Body => &mut assets.body,
        NativeAsset::Body2 => &mut assets.body2,
        NativeAsset::Cta => &mut assets.cta,
        NativeAsset::Rating => &mut assets.rating,
        NativeAsset::Price => &mut assets.price,
        NativeAsset::SalePrice => &mut assets.sale_price,
        NativeAsset::Phone => &mut assets.phone,
        NativeAsset::Address => &mut assets.address,
        NativeAsset::Likes => &mut assets.likes,
        NativeAsset::Downloads => &mut assets.downloads,
        NativeAsset::SponsoredBy => &mut assets.sponsored_by,
        NativeAsset::DisplayUrl => &mut assets.display_url,
        NativeAsset::PrivacyLink => &mut assets.privacy_link,
        NativeAsset::ClickUrl => &mut assets.click_url,
        NativeAsset::Image | NativeAsset::Icon | NativeAsset::Other => return,
    };
    *slot = Some(value);
}

fn read_image(value: &Json, fields: &NativeImageFields) -> Option<NativeImage> {
    let url = value.get(fields.url).and_then(non_empty_string)?;
    Some(NativeImage {
        url,
        width: value.get(fields.width).and_then(lenient::to_u32),
        height: value.get(fields.height).and_then(lenient::to_u32),
    })
}

fn non_empty_string(value: &Json) -> Option<String> {
    value.as_str().filter(|s| !s.is_empty()).map(str::to_string)
}

fn string_list(value: Option<&Json>) -> Vec<String> {
    match value {
        Some(Json::Array(items)) => items.iter().filter_map(non_empty_string).collect(),
        Some(Json::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FIELDS: NativeFieldMap = NativeFieldMap {
        text: &[
            (NativeAsset::Title, "title"),
            (NativeAsset::Body, "desc"),
            (NativeAsset::Cta, "ctatext"),
            (NativeAsset::Rating, "rating"),
        ],
        image: "main_img",
        icon: "icon",
        image_fields: NativeImageFields::STANDARD,
        link: "link",
        link_url: "url",
        click_trackers: "click_trackers",
        impression_trackers: "impression_trackers",
        javascript_trackers: "javascript_trackers",
    };

    #[test]
    fn test_named_assets_missing_cta_stays_absent() {
        let raw = json!({
            "title": "Native Creative",
            "desc": "Cool description",
            "rating": 5,
            "main_img": {"url": "https://cdn.example/img.png", "width": 2352, "height": "1516"},
            "link": {"url": "https://www.example.com"}
        });
        let assets = FIELDS.extract(raw.as_object().expect("object"));

        assert_eq!(assets.title.as_deref(), Some("Native Creative"));
        assert_eq!(assets.rating.as_deref(), Some("5"));
        assert_eq!(assets.cta, None);
        assert_eq!(
            assets.image,
            Some(NativeImage {
                url: "https://cdn.example/img.png".to_string(),
                width: Some(2352),
                height: Some(1516),
            })
        );
        assert!(assets.click_trackers.is_empty());
        assert!(assets.impression_trackers.is_empty());
    }

    #[test]
    fn test_named_assets_keep_explicit_empty_text() {
        let raw = json!({"title": ""});
        let assets = FIELDS.extract(raw.as_object().expect("object"));
        assert_eq!(assets.title.as_deref(), Some(""));
    }

    #[test]
    fn test_openrtb_native() {
        let adm = json!({
            "native": {
                "assets": [
                    {"id": 1, "title": {"text": "Native Title"}},
                    {"id": 2, "img": {"url": "img-url", "h": 90, "w": 728}},
                    {"id": 3, "img": {"url": "icon-url", "type": 1}},
                    {"id": 4, "data": {"type": 12, "value": "Buy"}}
                ],
                "link": {"url": "https://native.example", "clicktrackers": ["https://ct.example"]},
                "imptrackers": ["https://imp.example"],
                "jstracker": "tracker"
            }
        });
        let assets = from_openrtb(&adm).expect("native response");

        assert_eq!(assets.title.as_deref(), Some("Native Title"));
        assert_eq!(assets.image.as_ref().map(|i| i.url.as_str()), Some("img-url"));
        assert_eq!(assets.image.as_ref().and_then(|i| i.width), Some(728));
        assert_eq!(assets.icon.as_ref().map(|i| i.url.as_str()), Some("icon-url"));
        assert_eq!(assets.cta.as_deref(), Some("Buy"));
        assert_eq!(assets.click_url.as_deref(), Some("https://native.example"));
        assert_eq!(assets.click_trackers, vec!["https://ct.example"]);
        assert_eq!(assets.impression_trackers, vec!["https://imp.example"]);
        assert_eq!(assets.javascript_trackers.as_deref(), Some("tracker"));
        assert_eq!(assets.body, None);
    }

    #[test]
    fn test_openrtb_native_rejects_non_native() {
        assert!(from_openrtb(&json!({"foo": "bar"})).is_none());
        assert!(from_openrtb(&json!("<div></div>")).is_none());
    }
}
