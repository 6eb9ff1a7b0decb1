//! Adhese bid adapter.
//!
//! One POST per batch to the account's JSON endpoint. Slots are correlated
//! back to bid requests by slot name (`{location}-{format}`).

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use error_stack::Report;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as Json};
use validator::Validate;

use crate::adapter::provider::BidAdapter;
use crate::adapter::request::{self, merge_targeting, normalize_targeting, Targeting};
use crate::adapter::response::{self, lenient};
use crate::adapter::types::{
    BidMeta, BidRequest, BidderRequest, GdprConsent, MediaType, NormalizedBid, ServerResponse,
    SyncDirective, SyncOptions, SyncType, WireRequest, DEFAULT_CURRENCY,
};
use crate::adapter::validation::has_required_ids;
use crate::error::BidBridgeError;
use crate::normalize::video::{video_creative, VideoCandidates, VideoSource};
use crate::normalize::{banner_creative, declared_media_type, PixelStyle};
use crate::privacy::{self, ConsentContext, SyncParamNames};
use crate::settings::{PartnerConfig, PrivacyConfig, Settings};

const PARTNER_CODE: &str = "adhese";
const TTL_SECONDS: u32 = 360;
/// Origin of ads served by Adhese itself rather than a connected SSP.
const ADHESE_ORIGIN: &str = "JERLICIA";

const SYNC_PARAMS: SyncParamNames = SyncParamNames {
    gdpr: "gdpr",
    consent: "consentString",
    us_privacy: None,
    coppa: None,
};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the Adhese partner.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct AdheseConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Bid endpoint; `{account}` is replaced with the bid's account.
    #[serde(default = "default_endpoint_template")]
    #[validate(contains(pattern = "{account}"))]
    pub endpoint_template: String,

    #[serde(default = "default_sync_url")]
    #[validate(url)]
    pub sync_url: String,

    /// Ask Adhese to return video as a cached VAST URL rather than markup.
    #[serde(default = "default_vast_content_as_url")]
    pub vast_content_as_url: bool,

    /// Targeting sent with every request; bid-level values win.
    #[serde(default)]
    pub global_targets: Map<String, Json>,
}

fn default_enabled() -> bool {
    true
}

fn default_endpoint_template() -> String {
    "https://ads-{account}.adhese.com/json".to_string()
}

fn default_sync_url() -> String {
    "https://user-sync.adhese.com/iframe/user_sync.html".to_string()
}

fn default_vast_content_as_url() -> bool {
    true
}

impl Default for AdheseConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            endpoint_template: default_endpoint_template(),
            sync_url: default_sync_url(),
            vast_content_as_url: default_vast_content_as_url(),
            global_targets: Map::new(),
        }
    }
}

impl PartnerConfig for AdheseConfig {
    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AdheseRequest {
    slots: Vec<AdheseSlot>,
    parameters: Targeting,
    vast_content_as_url: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<AdheseUser>,
}

#[derive(Debug, Serialize)]
struct AdheseSlot {
    slotname: String,
    parameters: Targeting,
}

#[derive(Debug, Serialize)]
struct AdheseUser {
    ext: AdheseUserExt,
}

#[derive(Debug, Serialize)]
struct AdheseUserExt {
    eids: Vec<Json>,
}

/// One ad in the response array.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdheseAd {
    #[serde(default, deserialize_with = "lenient::string_opt")]
    origin: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    origin_instance: Option<String>,
    #[serde(default)]
    origin_data: Option<Json>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    slot_name: Option<String>,
    #[serde(rename = "slotID", default, deserialize_with = "lenient::string_opt")]
    slot_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    ad_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    ad_format: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    adspace_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    lib_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    order_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    advertiser_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    priority: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    order_property: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    viewable_impression_counter: Option<String>,
    #[serde(default, deserialize_with = "lenient::u32_opt")]
    width: Option<u32>,
    #[serde(default, deserialize_with = "lenient::u32_opt")]
    height: Option<u32>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    ext: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    body: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    tag: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    impression_counter: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    cached_body_url: Option<String>,
    #[serde(default)]
    extension: AdheseExtension,
    #[serde(default, deserialize_with = "lenient::strings")]
    adomain: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdheseExtension {
    #[serde(default)]
    prebid: Option<AdhesePrebidExtension>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    media_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AdhesePrebidExtension {
    #[serde(default)]
    cpm: Option<AdheseCpm>,
}

#[derive(Debug, Default, Deserialize)]
struct AdheseCpm {
    #[serde(default, deserialize_with = "lenient::f64_opt")]
    amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    currency: Option<String>,
}

impl AdheseAd {
    fn is_adhese_ad(&self) -> bool {
        match self.origin.as_deref() {
            None | Some("") => true,
            Some(origin) => origin == ADHESE_ORIGIN,
        }
    }

    /// Markup to render. Adhese ads carry it in `body` for script/HTML/XML
    /// creatives and in `tag` otherwise.
    fn markup(&self) -> Option<&str> {
        let body = self.body.as_deref().filter(|b| !b.is_empty());
        if !self.is_adhese_ad() {
            return body;
        }
        let body_is_markup = self.ext.as_deref() == Some("js")
            && body.is_some_and(|b| {
                ["<script", "<SCRIPT", "<html", "<HTML", "<?xml"]
                    .iter()
                    .any(|marker| b.contains(marker))
            });
        if body_is_markup {
            body
        } else {
            self.tag.as_deref()
        }
    }

    /// First bid of the SSP's OpenRTB seat, if the ad carries one.
    fn ssp_bid(&self) -> Option<&Json> {
        self.origin_data.as_ref()?.pointer("/seatbid/0/bid/0")
    }

    fn creative_id(&self) -> Option<String> {
        if self.is_adhese_ad() {
            return self.id.clone();
        }
        response::first_non_empty([
            self.ssp_bid()
                .and_then(|bid| bid.get("crid"))
                .and_then(lenient::to_string),
            self.origin.clone(),
        ])
    }

    fn deal_id(&self) -> Option<String> {
        let deal = if self.is_adhese_ad() {
            self.order_id.clone()
        } else {
            self.ssp_bid()
                .and_then(|bid| bid.get("dealid"))
                .and_then(lenient::to_string)
        };
        deal.filter(|d| !d.is_empty())
    }

    /// Passthrough metadata under the `adhese` key.
    fn passthrough(&self) -> Json {
        if self.is_adhese_ad() {
            let mut origin_data = Map::new();
            let fields = [
                ("adFormat", &self.ad_format),
                ("adId", &self.id),
                ("adType", &self.ad_type),
                ("adspaceId", &self.adspace_id),
                ("libId", &self.lib_id),
                ("orderProperty", &self.order_property),
                ("priority", &self.priority),
                ("viewableImpressionCounter", &self.viewable_impression_counter),
                ("slotId", &self.slot_id),
                ("slotName", &self.slot_name),
                ("advertiserId", &self.advertiser_id),
            ];
            for (key, value) in fields {
                if let Some(value) = value {
                    origin_data.insert(key.to_string(), Json::String(value.clone()));
                }
            }
            return json!({
                "origin": "",
                "originInstance": "",
                "originData": origin_data,
            });
        }

        let origin_data = match &self.origin_data {
            Some(Json::Object(data)) => {
                let mut data = data.clone();
                for (key, value) in [
                    ("adType", &self.ad_type),
                    ("slotId", &self.slot_id),
                    ("slotName", &self.slot_name),
                ] {
                    if let Some(value) = value {
                        data.insert(key.to_string(), Json::String(value.clone()));
                    }
                }
                data
            }
            _ => Map::new(),
        };
        json!({
            "origin": self.origin.clone().unwrap_or_default(),
            "originInstance": self.origin_instance.clone().unwrap_or_default(),
            "originData": origin_data,
        })
    }
}

// ============================================================================
// Adapter
// ============================================================================

/// Adhese bid adapter.
pub struct AdheseAdapter {
    config: AdheseConfig,
    privacy: PrivacyConfig,
}

impl AdheseAdapter {
    #[must_use]
    pub fn new(config: AdheseConfig, privacy: PrivacyConfig) -> Self {
        Self { config, privacy }
    }

    fn slot_name(bid: &BidRequest) -> String {
        format!(
            "{}-{}",
            bid.param_string("location").unwrap_or_default(),
            bid.param_string("format").unwrap_or_default()
        )
    }

    fn bid_targeting(bid: &BidRequest) -> Targeting {
        match bid.param("data") {
            Some(Json::Object(data)) => normalize_targeting(data),
            _ => Targeting::new(),
        }
    }

    /// Request-level parameters: configured global targets under the
    /// consent string (`xt`) and base64url page URL (`xf`).
    fn request_parameters(&self, consent: &ConsentContext, page: Option<&str>) -> Targeting {
        let global = normalize_targeting(&self.config.global_targets);
        let mut bid_level = Targeting::new();
        if let Some(consent_string) = consent.consent_string() {
            bid_level.insert("xt".to_string(), vec![consent_string.to_string()]);
        }
        if let Some(page) = page {
            bid_level.insert("xf".to_string(), vec![URL_SAFE_NO_PAD.encode(page)]);
        }
        merge_targeting(&global, &bid_level)
    }

    fn endpoint(&self, account: &str) -> String {
        self.config.endpoint_template.replace("{account}", account)
    }

    fn to_normalized_bid(&self, ad: &AdheseAd, bid: &BidRequest) -> Option<NormalizedBid> {
        let media_type = match ad.extension.media_type.as_deref() {
            Some(declared) => declared_media_type(PARTNER_CODE, declared)?,
            None => MediaType::Banner,
        };

        let creative = match media_type {
            MediaType::Banner => banner_creative(
                ad.markup()?,
                ad.impression_counter
                    .as_deref()
                    .map(|url| (url, PixelStyle::CollapsedImage)),
            )?,
            MediaType::Video => {
                let source = VideoSource::classify(&VideoCandidates {
                    cached_url: ad.cached_body_url.as_deref(),
                    inline_xml: ad.markup(),
                    ..VideoCandidates::default()
                })?;
                video_creative(source, None, None)
            }
            MediaType::Native => {
                log::debug!("{PARTNER_CODE}: native ads are not supported, dropping");
                return None;
            }
        };

        let cpm = ad.extension.prebid.as_ref().and_then(|p| p.cpm.as_ref());
        Some(NormalizedBid {
            request_id: bid.bid_id.clone(),
            cpm: cpm.and_then(|c| c.amount).unwrap_or(0.0),
            currency: cpm
                .and_then(|c| c.currency.clone())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            width: ad.width.unwrap_or_default(),
            height: ad.height.unwrap_or_default(),
            creative_id: ad.creative_id().unwrap_or_default(),
            deal_id: ad.deal_id(),
            ttl: TTL_SECONDS,
            net_revenue: true,
            creative,
            meta: BidMeta {
                advertiser_domains: ad.adomain.clone(),
                ..BidMeta::default()
            },
            ext: response::namespaced(PARTNER_CODE, ad.passthrough()),
        })
    }

    /// Account to sync for: from the response body when it names one,
    /// otherwise from the request it answers.
    fn sync_account(response: &ServerResponse) -> Option<String> {
        let from_body = serde_json::from_str::<Json>(&response.body)
            .ok()
            .and_then(|body| body.get("account").and_then(lenient::to_string));
        let from_request = || {
            response
                .request
                .as_ref()
                .and_then(|request| request.bids.first())
                .and_then(|bid| bid.param_string("account"))
        };
        from_body.or_else(from_request).filter(|a| !a.is_empty())
    }
}

impl BidAdapter for AdheseAdapter {
    fn code(&self) -> &'static str {
        PARTNER_CODE
    }

    fn supports_media_type(&self, media_type: MediaType) -> bool {
        matches!(media_type, MediaType::Banner | MediaType::Video)
    }

    fn is_bid_request_valid(&self, bid: &BidRequest) -> bool {
        has_required_ids(bid, &["account", "location", "format"])
    }

    fn build_requests(
        &self,
        bids: &[BidRequest],
        bidder_request: &BidderRequest,
    ) -> Result<Vec<WireRequest>, Report<BidBridgeError>> {
        let account = bids
            .first()
            .and_then(|bid| bid.param_string("account"))
            .ok_or_else(|| {
                Report::new(BidBridgeError::adapter(PARTNER_CODE, "batch has no account"))
            })?;

        let consent = ConsentContext::new(bidder_request, &self.privacy);
        let slots = bids
            .iter()
            .map(|bid| AdheseSlot {
                slotname: Self::slot_name(bid),
                parameters: Self::bid_targeting(bid),
            })
            .collect();
        let eids = bids
            .iter()
            .find_map(|bid| bid.user_id_as_eids.clone().filter(|eids| !eids.is_empty()));

        let body = AdheseRequest {
            slots,
            parameters: self
                .request_parameters(&consent, bidder_request.referer_info.page_url()),
            vast_content_as_url: self.config.vast_content_as_url,
            user: eids.map(|eids| AdheseUser {
                ext: AdheseUserExt { eids },
            }),
        };

        log::info!(
            "{PARTNER_CODE}: requesting bids for {} slots (account: {account})",
            bids.len()
        );

        let data = request::serialize_body(PARTNER_CODE, &body)?;
        Ok(vec![WireRequest::post(
            self.endpoint(&account),
            data,
            bids.to_vec(),
        )])
    }

    fn parse_response(
        &self,
        response: &ServerResponse,
        request: &WireRequest,
    ) -> Result<Vec<NormalizedBid>, Report<BidBridgeError>> {
        let Some(body) = response::parse_body::<Json>(PARTNER_CODE, &response.body)? else {
            return Ok(Vec::new());
        };
        let Json::Array(entries) = body else {
            log::debug!("{PARTNER_CODE}: response is not an ad list, no bids");
            return Ok(Vec::new());
        };

        let mut bids = Vec::new();
        for entry in entries {
            let ad: AdheseAd = match serde_json::from_value(entry) {
                Ok(ad) => ad,
                Err(e) => {
                    log::debug!("{PARTNER_CODE}: skipping malformed ad: {e}");
                    continue;
                }
            };
            let Some(slot_name) = ad.slot_name.as_deref() else {
                log::debug!("{PARTNER_CODE}: skipping ad without slot name");
                continue;
            };
            let Some(bid) = request.bids.iter().find(|b| Self::slot_name(b) == slot_name) else {
                log::debug!("{PARTNER_CODE}: no bid request for slot '{slot_name}'");
                continue;
            };
            if let Some(normalized) = self.to_normalized_bid(&ad, bid) {
                bids.push(normalized);
            }
        }

        log::info!("{PARTNER_CODE}: returned {} bids", bids.len());
        Ok(bids)
    }

    fn user_syncs(
        &self,
        options: &SyncOptions,
        responses: &[ServerResponse],
        gdpr_consent: Option<&GdprConsent>,
        usp_consent: Option<&str>,
    ) -> Vec<SyncDirective> {
        if !options.iframe_enabled {
            return Vec::new();
        }
        let Some(account) = responses.first().and_then(Self::sync_account) else {
            return Vec::new();
        };

        let consent = ConsentContext::for_sync(gdpr_consent, usp_consent, &self.privacy);
        let mut pairs = vec![("account".to_string(), account)];
        pairs.extend(privacy::encode_query(&consent, &SYNC_PARAMS));

        vec![SyncDirective::new(
            SyncType::Iframe,
            privacy::append_query(&self.config.sync_url, &pairs),
        )]
    }
}

// ============================================================================
// Registration
// ============================================================================

/// Register the Adhese adapter if it is configured and enabled.
#[must_use]
pub fn register_adapter(settings: &Settings) -> Vec<Arc<dyn BidAdapter>> {
    match settings.partner_config::<AdheseConfig>(PARTNER_CODE) {
        Ok(Some(config)) => {
            log::info!(
                "Registering Adhese adapter (endpoint: {})",
                config.endpoint_template
            );
            vec![Arc::new(AdheseAdapter::new(config, settings.privacy.clone()))]
        }
        Ok(None) => {
            log::debug!("Adhese partner not configured or disabled");
            Vec::new()
        }
        Err(e) => {
            log::error!("Failed to load Adhese configuration: {:?}", e);
            Vec::new()
        }
    }
}
