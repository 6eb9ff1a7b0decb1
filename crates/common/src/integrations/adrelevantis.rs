//! Adrelevantis bid adapter.
//!
//! Adrelevantis runs an AppNexus-style endpoint: one POST per batch carrying
//! `tags[]`, answered with `tags[]` correlated by `uuid`.

use std::sync::Arc;

use error_stack::Report;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use validator::Validate;

use crate::adapter::provider::BidAdapter;
use crate::adapter::request::{self, size_objects, WireSize};
use crate::adapter::response::{self, lenient, DEFAULT_TTL_SECONDS};
use crate::adapter::types::{
    BidMeta, BidRequest, BidderRequest, Creative, MediaType, NativeAsset, NormalizedBid,
    ServerResponse, Size, VideoContext, WireRequest, DEFAULT_CURRENCY,
};
use crate::adapter::validation::{has_required_id, has_required_ids};
use crate::error::BidBridgeError;
use crate::normalize::native::{NativeFieldMap, NativeImageFields};
use crate::normalize::video::{
    outstream_renderer, video_creative, RendererDefaults, VideoCandidates, VideoSource,
};
use crate::normalize::{banner_creative, declared_media_type, PixelStyle};
use crate::privacy::{ConsentContext, CoppaEncoding};
use crate::settings::{PartnerConfig, PrivacyConfig, Settings};

const PARTNER_CODE: &str = "adrelevantis";
const SDK_SOURCE: &str = "pbjs";

/// Video parameters the endpoint accepts from `params.video`.
const VIDEO_TARGETING: &[&str] = &[
    "id",
    "mimes",
    "minduration",
    "maxduration",
    "startdelay",
    "skippable",
    "playback_method",
    "frameworks",
];

/// User parameters the endpoint accepts from `params.user`.
const USER_PARAMS: &[&str] = &["age", "externalUid", "segments", "gender", "dnt", "language"];

/// Device identifiers accepted from `params.app.device_id`.
const APP_DEVICE_IDS: &[&str] = &["idfa", "aaid", "md5udid", "sha1udid", "windowsadid"];

const NATIVE_LAYOUT: &[(NativeAsset, &str)] = &[
    (NativeAsset::Title, "title"),
    (NativeAsset::Body, "description"),
    (NativeAsset::Body2, "desc2"),
    (NativeAsset::Image, "main_image"),
    (NativeAsset::Icon, "icon"),
    (NativeAsset::Cta, "ctatext"),
    (NativeAsset::Rating, "rating"),
    (NativeAsset::SponsoredBy, "sponsored_by"),
    (NativeAsset::PrivacyLink, "privacy_link"),
    (NativeAsset::DisplayUrl, "displayurl"),
    (NativeAsset::Address, "address"),
    (NativeAsset::Downloads, "downloads"),
    (NativeAsset::Likes, "likes"),
    (NativeAsset::Phone, "phone"),
    (NativeAsset::Price, "price"),
    (NativeAsset::SalePrice, "saleprice"),
];

const NATIVE_RESPONSE: NativeFieldMap = NativeFieldMap {
    text: &[
        (NativeAsset::Title, "title"),
        (NativeAsset::Body, "desc"),
        (NativeAsset::Body2, "desc2"),
        (NativeAsset::Cta, "ctatext"),
        (NativeAsset::Rating, "rating"),
        (NativeAsset::SponsoredBy, "sponsored"),
        (NativeAsset::PrivacyLink, "privacy_link"),
        (NativeAsset::DisplayUrl, "displayurl"),
        (NativeAsset::Likes, "likes"),
        (NativeAsset::Downloads, "downloads"),
        (NativeAsset::Price, "price"),
        (NativeAsset::SalePrice, "saleprice"),
        (NativeAsset::Phone, "phone"),
        (NativeAsset::Address, "address"),
    ],
    image: "main_img",
    icon: "icon",
    image_fields: NativeImageFields::STANDARD,
    link: "link",
    link_url: "url",
    click_trackers: "click_trackers",
    impression_trackers: "impression_trackers",
    javascript_trackers: "javascriptTrackers",
};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the Adrelevantis partner.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct AdrelevantisConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_endpoint")]
    #[validate(url)]
    pub endpoint: String,

    /// Version reported in the request's `sdk` block.
    #[serde(default = "default_sdk_version")]
    #[validate(length(min = 1))]
    pub sdk_version: String,
}

fn default_enabled() -> bool {
    true
}

fn default_endpoint() -> String {
    "https://ssp.adrelevantis.com/prebid".to_string()
}

fn default_sdk_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

impl Default for AdrelevantisConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            endpoint: default_endpoint(),
            sdk_version: default_sdk_version(),
        }
    }
}

impl PartnerConfig for AdrelevantisConfig {
    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

// ============================================================================
// Request wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct AdrelevantisRequest {
    tags: Vec<Tag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<Map<String, Json>>,
    sdk: Sdk,
    #[serde(skip_serializing_if = "Option::is_none")]
    member_id: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    app: Option<AppPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    device: Option<Map<String, Json>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gdpr_consent: Option<GdprPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    us_privacy: Option<String>,
    referrer_detection: ReferrerDetection,
    #[serde(skip_serializing_if = "Option::is_none")]
    fpd: Option<FirstPartyData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schain: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    eids: Option<Vec<Json>>,
}

#[derive(Debug, Serialize)]
struct Tag {
    sizes: Vec<WireSize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    primary_size: Option<WireSize>,
    ad_types: Vec<MediaType>,
    uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reserve: Option<f64>,
    allow_smaller_sizes: bool,
    use_pmt_rule: bool,
    prebid: bool,
    disable_psa: bool,
    hb_source: u8,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    keywords: Vec<Keyword>,
    #[serde(skip_serializing_if = "Option::is_none")]
    video: Option<Map<String, Json>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    native: Option<NativeTag>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    private_sizes: Vec<WireSize>,
}

#[derive(Debug, Serialize, PartialEq)]
struct Keyword {
    key: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    value: Vec<String>,
}

#[derive(Debug, Serialize)]
struct NativeTag {
    layouts: Vec<Map<String, Json>>,
}

#[derive(Debug, Serialize)]
struct Sdk {
    source: &'static str,
    version: String,
}

#[derive(Debug, Serialize)]
struct AppPayload {
    appid: Json,
}

#[derive(Debug, Serialize)]
struct GdprPayload {
    consent_string: String,
    consent_required: bool,
}

#[derive(Debug, Serialize)]
struct ReferrerDetection {
    rd_ref: String,
    rd_top: bool,
    rd_ifs: u32,
    rd_stk: String,
}

#[derive(Debug, Serialize)]
struct FirstPartyData {
    #[serde(skip_serializing_if = "Option::is_none")]
    keywords: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<Json>,
}

// ============================================================================
// Response wire types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct AdrelevantisResponse {
    #[serde(default)]
    tags: Vec<Json>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseTag {
    #[serde(default, deserialize_with = "lenient::string_opt")]
    uuid: Option<String>,
    #[serde(default)]
    nobid: bool,
    #[serde(default)]
    ads: Vec<Json>,
}

#[derive(Debug, Default, Deserialize)]
struct TagAd {
    #[serde(default, deserialize_with = "lenient::string_opt")]
    ad_type: Option<String>,
    #[serde(default)]
    buyer_member_id: Option<Json>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    creative_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::f64_opt")]
    cpm: Option<f64>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    deal_id: Option<String>,
    #[serde(default)]
    deal_priority: Option<Json>,
    #[serde(default)]
    deal_code: Option<Json>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    advertiser_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    notify_url: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    renderer_url: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    renderer_id: Option<String>,
    #[serde(default)]
    renderer_config: Option<Json>,
    #[serde(default)]
    rtb: Option<Rtb>,
}

#[derive(Debug, Default, Deserialize)]
struct Rtb {
    #[serde(default)]
    banner: Option<RtbBanner>,
    #[serde(default)]
    video: Option<RtbVideo>,
    #[serde(default)]
    native: Option<Map<String, Json>>,
    #[serde(default)]
    trackers: Vec<RtbTracker>,
}

#[derive(Debug, Default, Deserialize)]
struct RtbBanner {
    #[serde(default, deserialize_with = "lenient::string_opt")]
    content: Option<String>,
    #[serde(default, deserialize_with = "lenient::u32_opt")]
    width: Option<u32>,
    #[serde(default, deserialize_with = "lenient::u32_opt")]
    height: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RtbVideo {
    #[serde(default, deserialize_with = "lenient::string_opt")]
    content: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    asset_url: Option<String>,
    #[serde(default, deserialize_with = "lenient::u32_opt")]
    player_width: Option<u32>,
    #[serde(default, deserialize_with = "lenient::u32_opt")]
    player_height: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RtbTracker {
    #[serde(default, deserialize_with = "lenient::strings")]
    impression_urls: Vec<String>,
}

impl TagAd {
    fn media_type(&self) -> Option<MediaType> {
        match self.ad_type.as_deref() {
            Some(declared) => declared_media_type(PARTNER_CODE, declared),
            None => Some(MediaType::Banner),
        }
    }

    fn impression_url(&self) -> Option<String> {
        let url = self
            .rtb
            .as_ref()?
            .trackers
            .first()?
            .impression_urls
            .first()?;
        Some(
            urlencoding::decode(url)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| url.clone()),
        )
    }

    fn renderer_defaults(&self) -> RendererDefaults {
        let config = match &self.renderer_config {
            Some(Json::Object(config)) => config.clone(),
            Some(Json::String(raw)) => serde_json::from_str(raw).unwrap_or_default(),
            _ => Map::new(),
        };
        RendererDefaults {
            url: self.renderer_url.clone(),
            id: self.renderer_id.clone(),
            config,
        }
    }

    /// Partner passthrough under the `adrelevantis` key.
    fn passthrough(&self) -> Json {
        let mut ext = Map::new();
        for (key, value) in [
            ("buyerMemberId", &self.buyer_member_id),
            ("dealPriority", &self.deal_priority),
            ("dealCode", &self.deal_code),
        ] {
            if let Some(value) = value.as_ref().filter(|v| !v.is_null()) {
                ext.insert(key.to_string(), value.clone());
            }
        }
        if ext.is_empty() {
            Json::Null
        } else {
            Json::Object(ext)
        }
    }
}

// ============================================================================
// Request helpers
// ============================================================================

/// `params.keywords` as `[{key, value}]`. Object values are dropped; keys
/// whose values are all empty are kept without a value.
fn keywords(raw: &Map<String, Json>) -> Vec<Keyword> {
    raw.iter()
        .filter_map(|(key, value)| {
            let value = match value {
                Json::Object(_) => return None,
                Json::Array(items) => items.iter().filter_map(keyword_value).collect(),
                other => keyword_value(other).into_iter().collect(),
            };
            Some(Keyword {
                key: key.clone(),
                value,
            })
        })
        .collect()
}

fn keyword_value(value: &Json) -> Option<String> {
    match value {
        Json::String(s) if !s.is_empty() => Some(s.clone()),
        Json::Number(n) => Some(n.to_string()),
        Json::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Keep the whitelisted keys of an object parameter.
fn whitelisted(value: Option<&Json>, keys: &[&str]) -> Map<String, Json> {
    let Some(Json::Object(object)) = value else {
        return Map::new();
    };
    object
        .iter()
        .filter(|(key, value)| keys.contains(&key.as_str()) && !value.is_null())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// `[w, h]` or `[[w, h], ...]` into size objects.
fn parse_sizes(value: Option<&Json>) -> Vec<WireSize> {
    let Some(value) = value else {
        return Vec::new();
    };
    if let Ok(pair) = serde_json::from_value::<Size>(value.clone()) {
        return vec![pair.into()];
    }
    serde_json::from_value::<Vec<Size>>(value.clone())
        .map(|sizes| size_objects(&sizes))
        .unwrap_or_default()
}

/// Numeric ids go out as numbers, everything else as given.
fn numeric_id(value: &Json) -> Json {
    match value {
        Json::String(s) => s.trim().parse::<u64>().map_or_else(|_| value.clone(), Json::from),
        other => other.clone(),
    }
}

fn build_tag(bid: &BidRequest) -> Tag {
    let requested = bid.media_types.requested();
    let ad_types = if requested.is_empty() {
        vec![MediaType::Banner]
    } else {
        requested
    };

    let mut sizes = size_objects(&bid.effective_sizes());
    if sizes.is_empty() && ad_types.contains(&MediaType::Native) {
        sizes.push(WireSize {
            width: 1,
            height: 1,
        });
    }

    let mut video = whitelisted(bid.param("video"), VIDEO_TARGETING);
    if bid.media_types.video.is_some() && bid.renderer.is_some() {
        video.insert("custom_renderer_present".to_string(), Json::Bool(true));
    }

    let native = bid.media_types.native.as_ref().map(|params| {
        let mut layout = request::map_native_layout(params, NATIVE_LAYOUT);
        layout.insert("privacy_supported".to_string(), Json::Bool(true));
        NativeTag {
            layouts: vec![layout],
        }
    });

    Tag {
        primary_size: sizes.first().copied(),
        sizes,
        ad_types,
        uuid: bid.bid_id.clone(),
        id: bid.param("placementId").map(numeric_id),
        code: bid.param_string("invCode"),
        reserve: bid.param("reserve").and_then(lenient::to_f64),
        allow_smaller_sizes: bid
            .param("allowSmallerSizes")
            .and_then(Json::as_bool)
            .unwrap_or(false),
        use_pmt_rule: bid
            .param("usePaymentRule")
            .and_then(Json::as_bool)
            .unwrap_or(false),
        prebid: true,
        disable_psa: true,
        hb_source: 1,
        keywords: match bid.param("keywords") {
            Some(Json::Object(raw)) => keywords(raw),
            _ => Vec::new(),
        },
        video: (!video.is_empty()).then_some(video),
        native,
        private_sizes: parse_sizes(bid.param("privateSizes")),
    }
}

// ============================================================================
// Adapter
// ============================================================================

/// Adrelevantis bid adapter.
pub struct AdrelevantisAdapter {
    config: AdrelevantisConfig,
    privacy: PrivacyConfig,
}

impl AdrelevantisAdapter {
    #[must_use]
    pub fn new(config: AdrelevantisConfig, privacy: PrivacyConfig) -> Self {
        Self { config, privacy }
    }

    fn build_body(
        &self,
        bids: &[BidRequest],
        bidder_request: &BidderRequest,
    ) -> AdrelevantisRequest {
        let consent = ConsentContext::new(bidder_request, &self.privacy);
        let referer = &bidder_request.referer_info;

        let mut user = bids
            .iter()
            .map(|bid| whitelisted(bid.param("user"), USER_PARAMS))
            .find(|user| !user.is_empty())
            .unwrap_or_default();
        if let Some(coppa) = consent.coppa_value(CoppaEncoding::Boolean) {
            user.insert("coppa".to_string(), coppa);
        }

        let app = bids.iter().find_map(|bid| bid.param("app"));
        let app_payload = app
            .and_then(|app| app.get("id"))
            .filter(|id| !id.is_null())
            .map(|id| AppPayload { appid: id.clone() });
        let device = app.and_then(|app| {
            let mut device = Map::new();
            let ids = whitelisted(app.get("device_id"), APP_DEVICE_IDS);
            if !ids.is_empty() {
                device.insert("device_id".to_string(), Json::Object(ids));
            }
            if let Some(geo) = app.get("geo").filter(|geo| geo.is_object()) {
                device.insert("geo".to_string(), geo.clone());
            }
            (!device.is_empty()).then_some(device)
        });

        let fpd = FirstPartyData {
            keywords: bidder_request.ortb2_value("/site/keywords").cloned(),
            category: bidder_request
                .ortb2_value("/site/ext/data/category")
                .cloned(),
        };

        let rd_ref = referer
            .topmost_location
            .as_deref()
            .or(referer.page_url())
            .map(|location| urlencoding::encode(location).into_owned())
            .unwrap_or_default();

        AdrelevantisRequest {
            tags: bids.iter().map(build_tag).collect(),
            user: (!user.is_empty()).then_some(user),
            sdk: Sdk {
                source: SDK_SOURCE,
                version: self.config.sdk_version.clone(),
            },
            member_id: bids
                .iter()
                .find_map(|bid| bid.param("member"))
                .map(numeric_id),
            app: app_payload,
            device,
            gdpr_consent: consent.gdpr.as_ref().map(|gdpr| GdprPayload {
                consent_string: gdpr.consent_string.clone().unwrap_or_default(),
                consent_required: gdpr.applies,
            }),
            us_privacy: consent.us_privacy().map(str::to_string),
            referrer_detection: ReferrerDetection {
                rd_ref,
                rd_top: referer.reached_top,
                rd_ifs: referer.num_iframes,
                rd_stk: request::encode_referer_stack(&referer.stack),
            },
            fpd: (fpd.keywords.is_some() || fpd.category.is_some()).then_some(fpd),
            schain: consent.schain.clone(),
            eids: bids
                .iter()
                .find_map(|bid| bid.user_id_as_eids.clone().filter(|eids| !eids.is_empty())),
        }
    }

    fn to_normalized_bid(ad: &TagAd, bid: &BidRequest) -> Option<NormalizedBid> {
        let Some(cpm) = ad.cpm else {
            log::debug!("{PARTNER_CODE}: ad for '{}' has no cpm, dropping", bid.bid_id);
            return None;
        };
        let media_type = ad.media_type()?;
        let rtb = ad.rtb.as_ref()?;
        let slot_size = bid.effective_sizes().first().copied();

        let (creative, size) = match media_type {
            MediaType::Banner => {
                let banner = rtb.banner.as_ref()?;
                let pixel = ad.impression_url();
                let creative = banner_creative(
                    banner.content.as_deref()?,
                    pixel
                        .as_deref()
                        .map(|url| (url, PixelStyle::HiddenContainer)),
                )?;
                let size = banner
                    .width
                    .zip(banner.height)
                    .map(|(width, height)| Size::new(width, height))
                    .or(slot_size);
                (creative, size)
            }
            MediaType::Video => {
                let video = rtb.video.as_ref()?;
                let Some(source) = VideoSource::classify(&VideoCandidates {
                    inline_xml: video.content.as_deref(),
                    asset_url: video.asset_url.as_deref(),
                    notify_url: ad.notify_url.as_deref(),
                    ..VideoCandidates::default()
                }) else {
                    log::debug!(
                        "{PARTNER_CODE}: video ad for '{}' has no content, dropping",
                        bid.bid_id
                    );
                    return None;
                };
                let renderer = (bid.video_context() == Some(VideoContext::Outstream))
                    .then(|| outstream_renderer(&ad.renderer_defaults(), bid.renderer.as_ref()))
                    .flatten();
                let size = video
                    .player_width
                    .zip(video.player_height)
                    .map(|(width, height)| Size::new(width, height))
                    .or(slot_size);
                (
                    video_creative(source, ad.notify_url.clone(), renderer),
                    size,
                )
            }
            MediaType::Native => {
                let native = NATIVE_RESPONSE.extract(rtb.native.as_ref()?);
                (
                    Creative::Native { native },
                    Some(slot_size.unwrap_or(Size::new(1, 1))),
                )
            }
        };

        let size = size.unwrap_or(Size::new(0, 0));
        Some(NormalizedBid {
            request_id: bid.bid_id.clone(),
            cpm,
            currency: DEFAULT_CURRENCY.to_string(),
            width: size.width,
            height: size.height,
            creative_id: ad.creative_id.clone().unwrap_or_default(),
            deal_id: ad.deal_id.clone().filter(|deal| !deal.is_empty()),
            ttl: DEFAULT_TTL_SECONDS,
            net_revenue: true,
            creative,
            meta: BidMeta {
                advertiser_id: ad.advertiser_id.clone().filter(|id| !id.is_empty()),
                ..BidMeta::default()
            },
            ext: response::namespaced(PARTNER_CODE, ad.passthrough()),
        })
    }
}

impl BidAdapter for AdrelevantisAdapter {
    fn code(&self) -> &'static str {
        PARTNER_CODE
    }

    fn supports_media_type(&self, _media_type: MediaType) -> bool {
        true
    }

    fn is_bid_request_valid(&self, bid: &BidRequest) -> bool {
        has_required_id(bid, "placementId") || has_required_ids(bid, &["member", "invCode"])
    }

    fn build_requests(
        &self,
        bids: &[BidRequest],
        bidder_request: &BidderRequest,
    ) -> Result<Vec<WireRequest>, Report<BidBridgeError>> {
        let body = self.build_body(bids, bidder_request);
        let data = request::serialize_body(PARTNER_CODE, &body)?;
        Ok(vec![WireRequest::post(
            self.config.endpoint.clone(),
            data,
            bids.to_vec(),
        )])
    }

    fn parse_response(
        &self,
        response: &ServerResponse,
        request: &WireRequest,
    ) -> Result<Vec<NormalizedBid>, Report<BidBridgeError>> {
        let Some(body) =
            response::parse_body::<AdrelevantisResponse>(PARTNER_CODE, &response.body)?
        else {
            return Ok(Vec::new());
        };

        let mut bids = Vec::new();
        for entry in body.tags {
            let tag: ResponseTag = match serde_json::from_value(entry) {
                Ok(tag) => tag,
                Err(e) => {
                    log::debug!("{PARTNER_CODE}: skipping malformed tag: {e}");
                    continue;
                }
            };
            if tag.nobid {
                continue;
            }
            let Some(bid) = tag.uuid.as_deref().and_then(|uuid| request.find_bid(uuid)) else {
                log::debug!("{PARTNER_CODE}: tag {:?} does not match a bid request", tag.uuid);
                continue;
            };
            let ad = tag
                .ads
                .into_iter()
                .filter_map(|ad| serde_json::from_value::<TagAd>(ad).ok())
                .find(|ad| ad.rtb.is_some());
            let Some(ad) = ad else {
                log::debug!("{PARTNER_CODE}: tag '{}' has no rtb ad", bid.bid_id);
                continue;
            };
            if let Some(normalized) = Self::to_normalized_bid(&ad, bid) {
                bids.push(normalized);
            }
        }
        Ok(bids)
    }
}

// ============================================================================
// Registration
// ============================================================================

/// Register the Adrelevantis adapter if it is configured and enabled.
#[must_use]
pub fn register_adapter(settings: &Settings) -> Vec<Arc<dyn BidAdapter>> {
    match settings.partner_config::<AdrelevantisConfig>(PARTNER_CODE) {
        Ok(Some(config)) => {
            log::info!(
                "Registering Adrelevantis adapter (endpoint: {})",
                config.endpoint
            );
            vec![Arc::new(AdrelevantisAdapter::new(
                config,
                settings.privacy.clone(),
            ))]
        }
        Ok(None) => {
            log::debug!("Adrelevantis partner not configured or disabled");
            Vec::new()
        }
        Err(e) => {
            log::error!("Failed to load Adrelevantis configuration: {:?}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::types::{RefererInfo, SyncOptions, Vast};
    use crate::adapter::{build, interpret, negotiate};
    use crate::test_support::tests::{bid_from_json, bidder_request, bidder_request_with_gdpr};
    use serde_json::json;

    const BID_ID: &str = "30b31c1838de1e";
    const ENDPOINT: &str = "https://ssp.adrelevantis.com/prebid";

    fn adapter() -> AdrelevantisAdapter {
        AdrelevantisAdapter::new(AdrelevantisConfig::default(), PrivacyConfig::default())
    }

    fn base_bid() -> Json {
        json!({
            "bidId": BID_ID,
            "adUnitCode": "adunit-code",
            "sizes": [[300, 250], [300, 600]],
            "params": {"placementId": "10433394"}
        })
    }

    fn bid_with(overrides: Json) -> BidRequest {
        let mut value = base_bid();
        if let (Some(base), Json::Object(extra)) = (value.as_object_mut(), overrides) {
            base.extend(extra);
        }
        bid_from_json(value)
    }

    fn payload_for(bids: &[BidRequest], bidder_request: &BidderRequest) -> Json {
        let requests = build(&adapter(), bids, bidder_request);
        assert_eq!(requests.len(), 1, "should build one batch request");
        serde_json::from_str(&requests[0].data).expect("body should be JSON")
    }

    fn payload(bid: BidRequest) -> Json {
        payload_for(&[bid], &BidderRequest::default())
    }

    fn request_for(bid: BidRequest) -> WireRequest {
        WireRequest::post(ENDPOINT, String::new(), vec![bid])
    }

    fn banner_response() -> Json {
        json!({
            "version": "3.0.0",
            "tags": [{
                "uuid": "3db3773286ee59",
                "tag_id": 10433394,
                "auction_id": "4534722592064951574",
                "nobid": false,
                "no_ad_url": "http://lax1-ib.adnxs.com/no-ad",
                "timeout_ms": 10000,
                "ad_profile_id": 27079,
                "ads": [{
                    "content_source": "rtb",
                    "ad_type": "banner",
                    "buyer_member_id": 958,
                    "creative_id": 29681110,
                    "media_type_id": 1,
                    "media_subtype_id": 1,
                    "cpm": 0.5,
                    "cpm_publisher_currency": 0.5,
                    "publisher_currency_code": "$",
                    "client_initiated_ad_counting": true,
                    "rtb": {
                        "banner": {"content": "<!-- Creative -->", "width": 300, "height": 250},
                        "trackers": [{"impression_urls": ["http://lax1-ib.adnxs.com/impression"], "video_events": {}}]
                    }
                }]
            }]
        })
    }

    fn slot(bid_id: &str, extra: Json) -> BidRequest {
        let mut value = json!({"bidId": bid_id, "adUnitCode": "code"});
        if let (Some(base), Json::Object(extra)) = (value.as_object_mut(), extra) {
            base.extend(extra);
        }
        bid_from_json(value)
    }

    #[test]
    fn test_is_bid_request_valid() {
        let adapter = adapter();
        assert!(adapter.is_bid_request_valid(&bid_with(json!({}))));
        assert!(!adapter.is_bid_request_valid(&bid_with(json!({"params": {"placementId": 0}}))));
        assert!(adapter.is_bid_request_valid(&bid_with(
            json!({"params": {"member": "958", "invCode": "ABCD"}})
        )));
    }

    #[test]
    fn test_build_endpoint_and_sdk() {
        let requests = build(&adapter(), &[bid_with(json!({}))], &bidder_request());
        assert_eq!(requests[0].url, ENDPOINT);
        assert_eq!(requests[0].method, crate::adapter::types::HttpMethod::Post);

        let body = payload(bid_with(json!({})));
        assert_eq!(
            body["sdk"],
            json!({"source": "pbjs", "version": env!("CARGO_PKG_VERSION")})
        );
        assert_eq!(body["tags"][0]["hb_source"], 1);
        assert_eq!(body["tags"][0]["id"], 10433394);
        assert_eq!(body["tags"][0]["uuid"], BID_ID);
        assert_eq!(body["tags"][0]["primary_size"], json!({"width": 300, "height": 250}));
    }

    #[test]
    fn test_build_private_sizes() {
        let body = payload(bid_with(
            json!({"params": {"placementId": "10433394", "privateSizes": [300, 250]}}),
        ));
        assert_eq!(
            body["tags"][0]["private_sizes"],
            json!([{"width": 300, "height": 250}])
        );
    }

    #[test]
    fn test_build_ad_types() {
        for media_type in ["banner", "video", "native"] {
            let body = payload(bid_with(json!({"mediaTypes": {media_type: {}}})));
            assert_eq!(body["tags"][0]["ad_types"], json!([media_type]));
        }
        let body = payload(bid_with(json!({"mediaTypes": {"video": {"context": "outstream"}}})));
        assert_eq!(body["tags"][0]["ad_types"], json!(["video"]));
    }

    #[test]
    fn test_build_video_params_whitelisted() {
        let body = payload(bid_with(json!({
            "params": {"placementId": "10433394", "video": {"id": 123, "minduration": 100, "foobar": "invalid"}}
        })));
        assert_eq!(body["tags"][0]["video"], json!({"id": 123, "minduration": 100}));
    }

    #[test]
    fn test_build_flags_custom_renderer() {
        let video = json!({
            "mediaTypes": {"video": {"context": "outstream", "mimes": ["video/mp4"]}},
            "params": {
                "placementId": "10433394",
                "video": {"skippable": true, "playback_method": ["auto_play_sound_off"]}
            }
        });
        let mut with_renderer = video.clone();
        with_renderer["renderer"] = json!({"url": "http://test.renderer.url"});
        let mut second = video;
        second["bidId"] = json!("second");

        let body = payload_for(
            &[bid_with(with_renderer), bid_with(second)],
            &BidderRequest::default(),
        );
        assert_eq!(
            body["tags"][0]["video"],
            json!({"skippable": true, "playback_method": ["auto_play_sound_off"], "custom_renderer_present": true})
        );
        assert_eq!(
            body["tags"][1]["video"],
            json!({"skippable": true, "playback_method": ["auto_play_sound_off"]})
        );
    }

    #[test]
    fn test_build_user_params_whitelisted() {
        let body = payload(bid_with(json!({
            "params": {"placementId": "10433394", "user": {"externalUid": "123", "foobar": "invalid"}}
        })));
        assert_eq!(body["user"], json!({"externalUid": "123"}));
    }

    #[test]
    fn test_build_first_party_data() {
        let bidder_request = BidderRequest {
            ortb2: json!({"site": {"keywords": "US Open", "ext": {"data": {"category": "sports/tennis"}}}}),
            ..BidderRequest::default()
        };
        let body = payload_for(&[bid_with(json!({}))], &bidder_request);
        assert_eq!(body["fpd"]["keywords"], "US Open");
        assert_eq!(body["fpd"]["category"], "sports/tennis");

        let body = payload(bid_with(json!({})));
        assert!(body.get("fpd").is_none());
    }

    #[test]
    fn test_build_native_layout() {
        let body = payload(bid_with(json!({
            "mediaTypes": {"native": {
                "title": {"required": true},
                "body": {"required": true},
                "body2": {"required": true},
                "image": {"required": true, "sizes": [100, 100]},
                "icon": {"required": true},
                "cta": {"required": false},
                "rating": {"required": true},
                "sponsoredBy": {"required": true},
                "privacyLink": {"required": true},
                "displayUrl": {"required": true},
                "address": {"required": true},
                "downloads": {"required": true},
                "likes": {"required": true},
                "phone": {"required": true},
                "price": {"required": true},
                "salePrice": {"required": true}
            }}
        })));

        assert_eq!(
            body["tags"][0]["native"]["layouts"][0],
            json!({
                "title": {"required": true},
                "description": {"required": true},
                "desc2": {"required": true},
                "main_image": {"required": true, "sizes": [{"width": 100, "height": 100}]},
                "icon": {"required": true},
                "ctatext": {"required": false},
                "rating": {"required": true},
                "sponsored_by": {"required": true},
                "privacy_link": {"required": true},
                "displayurl": {"required": true},
                "address": {"required": true},
                "downloads": {"required": true},
                "likes": {"required": true},
                "phone": {"required": true},
                "price": {"required": true},
                "saleprice": {"required": true},
                "privacy_supported": true
            })
        );
        assert_eq!(body["tags"][0]["hb_source"], 1);
    }

    #[test]
    fn test_build_native_without_sizes_uses_placeholder() {
        let mut bid = bid_with(json!({"mediaTypes": {"native": {"image": {"required": true}}}}));
        let body = payload(bid.clone());
        assert_eq!(
            body["tags"][0]["sizes"],
            json!([{"width": 300, "height": 250}, {"width": 300, "height": 600}])
        );

        bid.sizes.clear();
        let body = payload(bid);
        assert_eq!(body["tags"][0]["sizes"], json!([{"width": 1, "height": 1}]));
    }

    #[test]
    fn test_build_keywords() {
        let body = payload(bid_with(json!({
            "params": {
                "placementId": "10433394",
                "keywords": {
                    "single": "val",
                    "singleArr": ["val"],
                    "singleArrNum": [5],
                    "multiValMixed": ["value1", 2, "value3"],
                    "singleValNum": 123,
                    "emptyStr": "",
                    "emptyArr": [""],
                    "badValue": {"foo": "bar"}
                }
            }
        })));

        // Keys come out in sorted order.
        assert_eq!(
            body["tags"][0]["keywords"],
            json!([
                {"key": "emptyArr"},
                {"key": "emptyStr"},
                {"key": "multiValMixed", "value": ["value1", "2", "value3"]},
                {"key": "single", "value": ["val"]},
                {"key": "singleArr", "value": ["val"]},
                {"key": "singleArrNum", "value": ["5"]},
                {"key": "singleValNum", "value": ["123"]}
            ])
        );
    }

    #[test]
    fn test_build_payment_rule() {
        let body = payload(bid_with(
            json!({"params": {"placementId": "10433394", "usePaymentRule": true}}),
        ));
        assert_eq!(body["tags"][0]["use_pmt_rule"], true);
    }

    #[test]
    fn test_build_gdpr_consent() {
        let consent = "BOJ8RZsOJ8RZsABAB8AAAAAZ+A==";
        let body = payload_for(&[bid_with(json!({}))], &bidder_request_with_gdpr(consent));
        assert_eq!(body["gdpr_consent"]["consent_string"], consent);
        assert_eq!(body["gdpr_consent"]["consent_required"], true);
    }

    #[test]
    fn test_build_app_parameters() {
        let body = payload(bid_with(json!({
            "params": {
                "placementId": "10433394",
                "app": {
                    "id": "B1O2W3M4AN.com.prebid.webview",
                    "geo": {"lat": 40.0964439, "lng": -75.3009142},
                    "device_id": {
                        "idfa": "4D12078D-3246-4DA4-AD5E-7610481E7AE",
                        "aaid": "38400000-8cf0-11bd-b23e-10b96e40000d",
                        "md5udid": "5756ae9022b2ea1e47d84fead75220c8",
                        "sha1udid": "4DFAA92388699AC6539885AEF1719293879985BF",
                        "windowsadid": "750c6be243f1c4b5c9912b95a5742fc5"
                    }
                }
            }
        })));

        assert_eq!(body["app"], json!({"appid": "B1O2W3M4AN.com.prebid.webview"}));
        assert_eq!(
            body["device"]["device_id"],
            json!({
                "aaid": "38400000-8cf0-11bd-b23e-10b96e40000d",
                "idfa": "4D12078D-3246-4DA4-AD5E-7610481E7AE",
                "md5udid": "5756ae9022b2ea1e47d84fead75220c8",
                "sha1udid": "4DFAA92388699AC6539885AEF1719293879985BF",
                "windowsadid": "750c6be243f1c4b5c9912b95a5742fc5"
            })
        );
        assert_eq!(body["device"]["geo"], json!({"lat": 40.0964439, "lng": -75.3009142}));
    }

    #[test]
    fn test_build_referrer_detection() {
        let bidder_request = BidderRequest {
            referer_info: RefererInfo {
                topmost_location: Some("http://example.com/page.html".to_string()),
                reached_top: true,
                num_iframes: 2,
                stack: vec![
                    "http://example.com/page.html".to_string(),
                    "http://example.com/iframe1.html".to_string(),
                    "http://example.com/iframe2.html".to_string(),
                ],
                ..RefererInfo::default()
            },
            ..BidderRequest::default()
        };
        let body = payload_for(&[bid_with(json!({}))], &bidder_request);
        assert_eq!(
            body["referrer_detection"],
            json!({
                "rd_ref": "http%3A%2F%2Fexample.com%2Fpage.html",
                "rd_top": true,
                "rd_ifs": 2,
                "rd_stk": "http%3A%2F%2Fexample.com%2Fpage.html,http%3A%2F%2Fexample.com%2Fiframe1.html,http%3A%2F%2Fexample.com%2Fiframe2.html"
            })
        );
    }

    #[test]
    fn test_build_coppa() {
        let adapter = AdrelevantisAdapter::new(
            AdrelevantisConfig::default(),
            PrivacyConfig {
                coppa: true,
                schain: None,
            },
        );
        let requests = build(&adapter, &[bid_with(json!({}))], &BidderRequest::default());
        let body: Json = serde_json::from_str(&requests[0].data).expect("body should be JSON");
        assert_eq!(body["user"]["coppa"], true);

        let body = payload(bid_with(json!({})));
        assert!(body.get("user").is_none());
    }

    #[test]
    fn test_interpret_banner() {
        let request = request_for(slot("3db3773286ee59", json!({})));
        let bids = interpret(&adapter(), &ServerResponse::from_json(&banner_response()), &request);

        assert_eq!(bids.len(), 1);
        let bid = &bids[0];
        assert_eq!(bid.request_id, "3db3773286ee59");
        assert_eq!(bid.cpm, 0.5);
        assert_eq!(bid.creative_id, "29681110");
        assert_eq!(bid.deal_id, None);
        assert_eq!((bid.width, bid.height), (300, 250));
        assert_eq!(
            bid.ad(),
            Some("<!-- Creative --><div style=\"position:absolute;left:0px;top:0px;visibility:hidden;\"><img src=\"http://lax1-ib.adnxs.com/impression\"></div>")
        );
        assert_eq!(bid.media_type(), MediaType::Banner);
        assert_eq!(bid.currency, "USD");
        assert_eq!(bid.ttl, 300);
        assert!(bid.net_revenue);
        assert_eq!(bid.partner_ext(PARTNER_CODE), Some(&json!({"buyerMemberId": 958})));
    }

    #[test]
    fn test_interpret_without_cpm_yields_no_bid() {
        let mut body = banner_response();
        body["tags"][0]["ads"][0]
            .as_object_mut()
            .expect("should be an ad object")
            .remove("cpm");
        let request = request_for(slot("3db3773286ee59", json!({})));

        let bids = interpret(&adapter(), &ServerResponse::from_json(&body), &request);
        assert!(bids.is_empty(), "should not turn a missing cpm into a zero bid");
    }

    #[test]
    fn test_interpret_nobid() {
        let body = json!({
            "version": "0.0.1",
            "tags": [{"uuid": "84ab500420319d", "tag_id": 5976557, "auction_id": "297492697822162468", "nobid": true}]
        });
        let request = request_for(slot("84ab500420319d", json!({})));
        assert!(interpret(&adapter(), &ServerResponse::from_json(&body), &request).is_empty());
    }

    #[test]
    fn test_interpret_outstream_video() {
        let body = json!({
            "tags": [{
                "uuid": "84ab500420319d",
                "ads": [{
                    "ad_type": "video",
                    "cpm": 0.5,
                    "notify_url": "imptracker.com",
                    "renderer_url": "renderer.js",
                    "rtb": {"video": {"content": "<!-- Creative -->"}}
                }]
            }]
        });
        let request = request_for(slot(
            "84ab500420319d",
            json!({
                "mediaTypes": {"video": {"context": "outstream", "playerSize": [640, 480]}},
                "renderer": {"options": {"adText": "configured"}}
            }),
        ));

        let bids = interpret(&adapter(), &ServerResponse::from_json(&body), &request);
        assert_eq!(bids.len(), 1);
        let Creative::Video(video) = &bids[0].creative else {
            panic!("expected a video creative");
        };
        assert_eq!(video.vast, Vast::VastXml("<!-- Creative -->".to_string()));
        assert_eq!(video.vast_imp_url.as_deref(), Some("imptracker.com"));
        let renderer = video.renderer.as_ref().expect("outstream renderer");
        assert_eq!(renderer.url, "renderer.js");
        assert_eq!(Json::Object(renderer.config.clone()), json!({"adText": "configured"}));
        assert_eq!((bids[0].width, bids[0].height), (640, 480));
    }

    #[test]
    fn test_interpret_outstream_without_content_is_dropped() {
        let mut body = banner_response();
        body["tags"][0]["ads"][0]["ad_type"] = json!("video");
        body["tags"][0]["ads"][0]["rtb"]["video"] = json!({});
        body["tags"][0]["ads"][0]["renderer_url"] = json!("renderer.js");
        let request = request_for(slot(
            "3db3773286ee59",
            json!({"mediaTypes": {"video": {"context": "outstream", "playerSize": [640, 480]}}}),
        ));
        assert!(interpret(&adapter(), &ServerResponse::from_json(&body), &request).is_empty());
    }

    #[test]
    fn test_interpret_instream_video() {
        let body = json!({
            "tags": [{
                "uuid": "84ab500420319d",
                "ads": [{
                    "ad_type": "video",
                    "cpm": 0.5,
                    "notify_url": "imptracker.com",
                    "rtb": {"video": {"asset_url": "https://sample.vastURL.com/here/vid"}}
                }]
            }]
        });
        let request = request_for(slot(
            "84ab500420319d",
            json!({"mediaTypes": {"video": {"context": "instream", "playerSize": [640, 480]}}}),
        ));

        let bids = interpret(&adapter(), &ServerResponse::from_json(&body), &request);
        let Creative::Video(video) = &bids[0].creative else {
            panic!("expected a video creative");
        };
        assert_eq!(
            video.vast,
            Vast::VastUrl(
                "imptracker.com&redir=https%3A%2F%2Fsample.vastURL.com%2Fhere%2Fvid".to_string()
            )
        );
        assert_eq!(video.vast_imp_url.as_deref(), Some("imptracker.com"));
        assert!(video.renderer.is_none());
    }

    #[test]
    fn test_interpret_native() {
        let mut body = banner_response();
        body["tags"][0]["ads"][0]["ad_type"] = json!("native");
        body["tags"][0]["ads"][0]["rtb"]["native"] = json!({
            "title": "Native Creative",
            "desc": "Cool description great stuff",
            "desc2": "Additional body text",
            "ctatext": "Do it",
            "sponsored": "AppNexus",
            "icon": {"width": 0, "height": 0, "url": "https://cdn.adnxs.com/icon.png"},
            "main_img": {"width": 2352, "height": 1516, "url": "https://cdn.adnxs.com/img.png"},
            "link": {
                "url": "https://www.appnexus.com",
                "fallback_url": "",
                "click_trackers": ["https://nym1-ib.adnxs.com/click"]
            },
            "impression_trackers": ["https://example.com"],
            "rating": "5",
            "displayurl": "https://AppNexus.com/?url=display_url",
            "likes": "38908320",
            "downloads": "874983",
            "price": "9.99",
            "saleprice": "FREE",
            "phone": "1234567890",
            "address": "28 W 23rd St, New York, NY 10010",
            "privacy_link": "https://appnexus.com/?url=privacy_url",
            "javascriptTrackers": "<script type='text/javascript' async='true' src='https://cdn.adnxs.com/v/s/152/trk.js'></script>"
        });
        let request = request_for(slot("3db3773286ee59", json!({})));

        let bids = interpret(&adapter(), &ServerResponse::from_json(&body), &request);
        let native = bids[0].native().expect("native payload");
        assert_eq!(native.title.as_deref(), Some("Native Creative"));
        assert_eq!(native.body.as_deref(), Some("Cool description great stuff"));
        assert_eq!(native.body2.as_deref(), Some("Additional body text"));
        assert_eq!(native.cta.as_deref(), Some("Do it"));
        assert_eq!(native.sponsored_by.as_deref(), Some("AppNexus"));
        assert_eq!(
            native.image.as_ref().map(|image| image.url.as_str()),
            Some("https://cdn.adnxs.com/img.png")
        );
        assert_eq!(native.click_url.as_deref(), Some("https://www.appnexus.com"));
        assert_eq!(native.click_trackers, vec!["https://nym1-ib.adnxs.com/click"]);
        assert_eq!(native.sale_price.as_deref(), Some("FREE"));
        assert!(native.javascript_trackers.is_some());
        assert_eq!((bids[0].width, bids[0].height), (1, 1));
    }

    #[test]
    fn test_interpret_deal_and_advertiser() {
        let mut body = banner_response();
        body["tags"][0]["ads"][0]["deal_priority"] = json!("high");
        body["tags"][0]["ads"][0]["deal_code"] = json!("123");
        body["tags"][0]["ads"][0]["advertiser_id"] = json!("123");
        let request = request_for(slot("3db3773286ee59", json!({})));

        let bids = interpret(&adapter(), &ServerResponse::from_json(&body), &request);
        assert_eq!(
            bids[0].partner_ext(PARTNER_CODE),
            Some(&json!({"buyerMemberId": 958, "dealPriority": "high", "dealCode": "123"}))
        );
        assert_eq!(bids[0].meta.advertiser_id.as_deref(), Some("123"));
    }

    #[test]
    fn test_declares_no_user_syncs() {
        let syncs = negotiate(
            &adapter(),
            &SyncOptions {
                iframe_enabled: true,
                pixel_enabled: true,
            },
            &[ServerResponse::from_json(&banner_response())],
            None,
            None,
        );
        assert!(syncs.is_empty());
    }
}
