//! Canonical model shared by every partner adapter.
//!
//! Inputs ([`BidRequest`], [`BidderRequest`]) are owned by the auction
//! scheduler for the duration of one auction. Outputs ([`WireRequest`],
//! [`NormalizedBid`], [`SyncDirective`]) are transient values produced and
//! consumed within that auction.

use std::collections::BTreeMap;
use std::fmt;

use derive_more::Display;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as Json};

/// Default currency for prices when a partner does not declare one.
pub const DEFAULT_CURRENCY: &str = "USD";

// ============================================================================
// Inputs
// ============================================================================

/// A width × height pair.
///
/// Canonical inputs carry sizes as `[w, h]` arrays; wire formats use
/// [`crate::adapter::request::WireSize`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u32; 2]", into = "[u32; 2]")]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl From<[u32; 2]> for Size {
    fn from([width, height]: [u32; 2]) -> Self {
        Self { width, height }
    }
}

impl From<Size> for [u32; 2] {
    fn from(size: Size) -> Self {
        [size.width, size.height]
    }
}

/// Media type enumeration.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[display("banner")]
    Banner,
    #[display("video")]
    Video,
    #[display("native")]
    Native,
}

impl MediaType {
    /// Parse a partner-declared media type name. Unknown names yield `None`.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "banner" | "display" => Some(Self::Banner),
            "video" => Some(Self::Video),
            "native" => Some(Self::Native),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BannerParams {
    #[serde(default)]
    pub sizes: Vec<Size>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoContext {
    Instream,
    Outstream,
    Adpod,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<VideoContext>,
    #[serde(default, deserialize_with = "one_or_many_sizes")]
    pub player_size: Vec<Size>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mimes: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Json>,
}

/// Canonical native asset names used in requirement maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NativeAsset {
    Title,
    Body,
    Body2,
    Cta,
    Image,
    Icon,
    Rating,
    Price,
    SalePrice,
    Phone,
    Address,
    Likes,
    Downloads,
    SponsoredBy,
    DisplayUrl,
    PrivacyLink,
    ClickUrl,
    #[serde(other)]
    Other,
}

/// Requirement flags for one native asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NativeRequirement {
    #[serde(default)]
    pub required: bool,
    /// Pixel-size constraint for image assets.
    #[serde(
        default,
        deserialize_with = "one_or_many_sizes",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub sizes: Vec<Size>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub len: Option<u32>,
}

pub type NativeParams = BTreeMap<NativeAsset, NativeRequirement>;

/// Media types requested for one slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaTypes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<BannerParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native: Option<NativeParams>,
}

impl MediaTypes {
    /// Requested media types in canonical order.
    #[must_use]
    pub fn requested(&self) -> Vec<MediaType> {
        let mut types = Vec::new();
        if self.banner.is_some() {
            types.push(MediaType::Banner);
        }
        if self.video.is_some() {
            types.push(MediaType::Video);
        }
        if self.native.is_some() {
            types.push(MediaType::Native);
        }
        types
    }
}

/// Caller-declared renderer. Its presence means the caller renders outstream
/// video itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RendererSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub options: Map<String, Json>,
}

/// One slot's demand for a bid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidRequest {
    #[serde(deserialize_with = "deserialize_id")]
    pub bid_id: String,
    #[serde(default)]
    pub ad_unit_code: String,
    #[serde(default)]
    pub sizes: Vec<Size>,
    #[serde(default)]
    pub media_types: MediaTypes,
    /// Partner-specific parameters, validated only by that partner.
    #[serde(default)]
    pub params: Map<String, Json>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id_as_eids: Option<Vec<Json>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renderer: Option<RendererSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ortb2_imp: Option<Json>,
}

impl BidRequest {
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&Json> {
        self.params.get(key).filter(|value| !value.is_null())
    }

    /// A string parameter, accepting numbers as their decimal form.
    #[must_use]
    pub fn param_string(&self, key: &str) -> Option<String> {
        match self.param(key)? {
            Json::String(s) => Some(s.clone()),
            Json::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Sizes for this slot: explicit sizes, then banner sizes, then the video
    /// player size.
    #[must_use]
    pub fn effective_sizes(&self) -> Vec<Size> {
        if !self.sizes.is_empty() {
            return self.sizes.clone();
        }
        if let Some(banner) = self.media_types.banner.as_ref() {
            if !banner.sizes.is_empty() {
                return banner.sizes.clone();
            }
        }
        self.media_types
            .video
            .as_ref()
            .map(|video| video.player_size.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn video_context(&self) -> Option<VideoContext> {
        self.media_types.video.as_ref().and_then(|v| v.context)
    }

    /// Transaction id from the slot's first-party data.
    #[must_use]
    pub fn transaction_id(&self) -> Option<&str> {
        self.ortb2_imp
            .as_ref()
            .and_then(|imp| imp.pointer("/ext/tid"))
            .and_then(Json::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GdprConsent {
    #[serde(rename = "gdprApplies", default)]
    pub applies: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consent_string: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefererInfo {
    /// Resolved page URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topmost_location: Option<String>,
    #[serde(default)]
    pub reached_top: bool,
    #[serde(default)]
    pub num_iframes: u32,
    /// Iframe nesting stack, outermost first.
    #[serde(default)]
    pub stack: Vec<String>,
}

impl RefererInfo {
    /// The page URL, falling back to the topmost reachable location.
    #[must_use]
    pub fn page_url(&self) -> Option<&str> {
        self.page
            .as_deref()
            .or(self.topmost_location.as_deref())
            .filter(|page| !page.is_empty())
    }

    /// The page host, from `domain` or parsed out of the page URL.
    #[must_use]
    pub fn page_domain(&self) -> Option<String> {
        if let Some(domain) = self.domain.as_deref().filter(|d| !d.is_empty()) {
            return Some(domain.to_string());
        }
        let page = self.page_url()?;
        url::Url::parse(page)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
    }
}

/// Auction-scoped context shared by every request sent to one partner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidderRequest {
    #[serde(default)]
    pub auction_id: String,
    /// Auction timeout in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gdpr_consent: Option<GdprConsent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usp_consent: Option<String>,
    #[serde(default, skip_serializing_if = "Json::is_null")]
    pub ortb2: Json,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ortb2_imp: Option<Json>,
    #[serde(default)]
    pub referer_info: RefererInfo,
}

impl BidderRequest {
    /// Look up a value in the first-party data by JSON pointer (e.g.
    /// `"/site/keywords"`).
    #[must_use]
    pub fn ortb2_value(&self, pointer: &str) -> Option<&Json> {
        self.ortb2.pointer(pointer).filter(|value| !value.is_null())
    }
}

// ============================================================================
// Wire requests and responses
// ============================================================================

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[display("GET")]
    Get,
    #[display("POST")]
    Post,
}

/// A partner-specific HTTP request descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRequest {
    pub method: HttpMethod,
    pub url: String,
    /// Serialized body in the partner's own format. Empty for GET requests.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data: String,
    /// The bid requests this wire request represents.
    #[serde(default)]
    pub bids: Vec<BidRequest>,
}

impl WireRequest {
    #[must_use]
    pub fn get(url: impl Into<String>, bids: Vec<BidRequest>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            data: String::new(),
            bids,
        }
    }

    #[must_use]
    pub fn post(url: impl Into<String>, data: String, bids: Vec<BidRequest>) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            data,
            bids,
        }
    }

    /// Find the originating bid request by id.
    #[must_use]
    pub fn find_bid(&self, bid_id: &str) -> Option<&BidRequest> {
        self.bids.iter().find(|bid| bid.bid_id == bid_id)
    }
}

/// A raw partner response as collected by the transport.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerResponse {
    /// Raw response body. May be empty or unparseable.
    #[serde(default)]
    pub body: String,
    /// The wire request this response answers, when the scheduler kept it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<WireRequest>,
}

impl ServerResponse {
    #[must_use]
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            request: None,
        }
    }

    #[must_use]
    pub fn from_json(body: &Json) -> Self {
        Self::new(body.to_string())
    }

    #[must_use]
    pub fn with_request(mut self, request: WireRequest) -> Self {
        self.request = Some(request);
        self
    }
}

// ============================================================================
// Normalized output
// ============================================================================

/// Image asset of a native creative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativeImage {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Canonical native asset bundle.
///
/// Absent assets stay `None` so renderers can tell "absent" from "empty".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeAssets {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cta: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsored_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privacy_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloads: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub likes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<NativeImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<NativeImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub click_url: Option<String>,
    pub click_trackers: Vec<String>,
    pub impression_trackers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub javascript_trackers: Option<String>,
}

impl NativeAssets {
    /// True when no renderable asset is present (trackers alone don't count).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.body.is_none()
            && self.image.is_none()
            && self.icon.is_none()
            && self.click_url.is_none()
    }
}

/// The VAST payload of a video bid. The two shapes are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Vast {
    VastXml(String),
    VastUrl(String),
}

impl Vast {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::VastXml(value) | Self::VastUrl(value) => value,
        }
    }
}

/// Renderer configuration for outstream video.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Renderer {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub config: Map<String, Json>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoCreative {
    #[serde(flatten)]
    pub vast: Vast,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vast_imp_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renderer: Option<Renderer>,
}

/// Exactly one creative payload, tagged by media type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mediaType", rename_all = "lowercase")]
pub enum Creative {
    Banner { ad: String },
    Video(VideoCreative),
    Native { native: NativeAssets },
}

impl Creative {
    #[must_use]
    pub const fn media_type(&self) -> MediaType {
        match self {
            Self::Banner { .. } => MediaType::Banner,
            Self::Video(_) => MediaType::Video,
            Self::Native { .. } => MediaType::Native,
        }
    }

    /// True when the payload carries something renderable.
    #[must_use]
    pub fn has_payload(&self) -> bool {
        match self {
            Self::Banner { ad } => !ad.trim().is_empty(),
            Self::Video(video) => !video.vast.as_str().trim().is_empty(),
            Self::Native { native } => !native.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BidMeta {
    pub advertiser_domains: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advertiser_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub click_url: Option<String>,
}

/// Canonical bid returned to the auction scheduler.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedBid {
    pub request_id: String,
    pub cpm: f64,
    pub currency: String,
    pub width: u32,
    pub height: u32,
    pub creative_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deal_id: Option<String>,
    pub ttl: u32,
    pub net_revenue: bool,
    #[serde(flatten)]
    pub creative: Creative,
    pub meta: BidMeta,
    /// Partner passthrough metadata, keyed by partner code.
    #[serde(flatten)]
    pub ext: Map<String, Json>,
}

impl NormalizedBid {
    #[must_use]
    pub const fn media_type(&self) -> MediaType {
        self.creative.media_type()
    }

    #[must_use]
    pub fn ad(&self) -> Option<&str> {
        match &self.creative {
            Creative::Banner { ad } => Some(ad),
            _ => None,
        }
    }

    #[must_use]
    pub fn vast(&self) -> Option<&Vast> {
        match &self.creative {
            Creative::Video(video) => Some(&video.vast),
            _ => None,
        }
    }

    #[must_use]
    pub fn native(&self) -> Option<&NativeAssets> {
        match &self.creative {
            Creative::Native { native } => Some(native),
            _ => None,
        }
    }

    /// Partner passthrough metadata for `partner`.
    #[must_use]
    pub fn partner_ext(&self, partner: &str) -> Option<&Json> {
        self.ext.get(partner)
    }
}

// ============================================================================
// User syncs
// ============================================================================

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncType {
    #[display("iframe")]
    Iframe,
    #[display("image")]
    Image,
}

/// A partner's declared sync target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncDirective {
    #[serde(rename = "type")]
    pub sync_type: SyncType,
    pub url: String,
}

impl SyncDirective {
    #[must_use]
    pub fn new(sync_type: SyncType, url: impl Into<String>) -> Self {
        Self {
            sync_type,
            url: url.into(),
        }
    }
}

/// Which sync types the publisher permits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOptions {
    #[serde(default)]
    pub iframe_enabled: bool,
    #[serde(default)]
    pub pixel_enabled: bool,
}

impl SyncOptions {
    #[must_use]
    pub const fn allows(&self, sync_type: SyncType) -> bool {
        match sync_type {
            SyncType::Iframe => self.iframe_enabled,
            SyncType::Image => self.pixel_enabled,
        }
    }
}

// ============================================================================
// Serde helpers
// ============================================================================

/// Accept bid ids sent as either strings or integers.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct IdVisitor;

    impl Visitor<'_> for IdVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or integer id")
        }

        fn visit_str<E>(self, value: &str) -> Result<String, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_string<E>(self, value: String) -> Result<String, E>
        where
            E: de::Error,
        {
            Ok(value)
        }

        fn visit_i64<E>(self, value: i64) -> Result<String, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_u64<E>(self, value: u64) -> Result<String, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }
    }

    deserializer.deserialize_any(IdVisitor)
}

/// Accept either a single `[w, h]` pair or a list of pairs.
fn one_or_many_sizes<'de, D>(deserializer: D) -> Result<Vec<Size>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One([u32; 2]),
        Many(Vec<[u32; 2]>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(pair)) => vec![Size::from(pair)],
        Some(OneOrMany::Many(pairs)) => pairs.into_iter().map(Size::from).collect(),
        None => Vec::new(),
    })
}
