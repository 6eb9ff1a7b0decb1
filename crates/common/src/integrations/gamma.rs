//! Gamma bid adapter.
//!
//! Gamma takes one GET per slot and answers each with a single OpenRTB-like
//! object whose `id` echoes the bid id.

use std::sync::Arc;

use error_stack::Report;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::adapter::provider::BidAdapter;
use crate::adapter::response::{self, lenient, DEFAULT_TTL_SECONDS};
use crate::adapter::types::{
    BidMeta, BidRequest, BidderRequest, GdprConsent, MediaType, NormalizedBid, ServerResponse,
    SyncDirective, SyncOptions, SyncType, WireRequest, DEFAULT_CURRENCY,
};
use crate::adapter::validation::has_required_ids;
use crate::error::BidBridgeError;
use crate::normalize::video::{video_creative, VideoCandidates, VideoSource};
use crate::normalize::{banner_creative, declared_media_type};
use crate::openrtb::SeatBid;
use crate::privacy::{self, ConsentContext, SyncParamNames};
use crate::settings::{PartnerConfig, PrivacyConfig, Settings};

const PARTNER_CODE: &str = "gamma";
const VIDEO_TTL_SECONDS: u32 = 3600;

/// Configuration for the Gamma partner.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct GammaConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_endpoint")]
    #[validate(url)]
    pub endpoint: String,

    #[serde(default = "default_sync_url")]
    #[validate(url)]
    pub sync_url: String,
}

fn default_enabled() -> bool {
    true
}

fn default_endpoint() -> String {
    "https://hb.gammaplatform.com/adx/request".to_string()
}

fn default_sync_url() -> String {
    "https://cm-supply-web.gammaplatform.com/adx/usersync".to_string()
}

impl Default for GammaConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            endpoint: default_endpoint(),
            sync_url: default_sync_url(),
        }
    }
}

impl PartnerConfig for GammaConfig {
    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Gamma's response envelope. `seatbid[0].bid[0]` carries the creative;
/// video bids add `vastUrl`/`vastXml` next to the usual OpenRTB fields.
#[derive(Debug, Default, Deserialize)]
struct GammaResponse {
    #[serde(default, deserialize_with = "lenient::string_opt")]
    id: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient::string_opt")]
    media_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    cur: Option<String>,
    #[serde(default)]
    seatbid: Vec<SeatBid>,
}

/// Gamma bid adapter.
pub struct GammaAdapter {
    config: GammaConfig,
    privacy: PrivacyConfig,
}

impl GammaAdapter {
    #[must_use]
    pub fn new(config: GammaConfig, privacy: PrivacyConfig) -> Self {
        Self { config, privacy }
    }

    fn request_url(&self, bid: &BidRequest, page: &str) -> String {
        let pairs = [
            ("wid", bid.param_string("siteId").unwrap_or_default()),
            ("zid", bid.param_string("zoneId").unwrap_or_default()),
            ("hb", "pbjs".to_string()),
            ("bidid", bid.bid_id.clone()),
            ("urf", page.to_string()),
        ]
        .map(|(key, value)| (key.to_string(), value));
        privacy::append_query(&self.config.endpoint, &pairs)
    }
}

impl BidAdapter for GammaAdapter {
    fn code(&self) -> &'static str {
        PARTNER_CODE
    }

    fn supports_media_type(&self, media_type: MediaType) -> bool {
        matches!(media_type, MediaType::Banner | MediaType::Video)
    }

    fn is_bid_request_valid(&self, bid: &BidRequest) -> bool {
        has_required_ids(bid, &["siteId", "zoneId"])
    }

    fn build_requests(
        &self,
        bids: &[BidRequest],
        bidder_request: &BidderRequest,
    ) -> Result<Vec<WireRequest>, Report<BidBridgeError>> {
        let page = bidder_request.referer_info.page_url().unwrap_or_default();
        Ok(bids
            .iter()
            .map(|bid| WireRequest::get(self.request_url(bid, page), vec![bid.clone()]))
            .collect())
    }

    fn parse_response(
        &self,
        response: &ServerResponse,
        _request: &WireRequest,
    ) -> Result<Vec<NormalizedBid>, Report<BidBridgeError>> {
        let Some(body) = response::parse_body::<GammaResponse>(PARTNER_CODE, &response.body)? else {
            return Ok(Vec::new());
        };
        let Some(request_id) = body.id.filter(|id| !id.is_empty()) else {
            log::debug!("{PARTNER_CODE}: response has no id, no bids");
            return Ok(Vec::new());
        };
        let Some(bid) = body.seatbid.first().and_then(|seat| seat.bid.first()) else {
            log::debug!("{PARTNER_CODE}: response for '{request_id}' has no seat bid");
            return Ok(Vec::new());
        };
        let Some(cpm) = bid.price else {
            log::debug!("{PARTNER_CODE}: bid for '{request_id}' has no price, dropping");
            return Ok(Vec::new());
        };

        let media_type = match body.media_type.as_deref() {
            Some(declared) => match declared_media_type(PARTNER_CODE, declared) {
                Some(media_type) => media_type,
                None => return Ok(Vec::new()),
            },
            None => MediaType::Banner,
        };

        let extra_string = |key: &str| bid.extra.get(key).and_then(lenient::to_string);
        let (creative, ttl) = match media_type {
            MediaType::Video => {
                let vast_url = extra_string("vastUrl");
                let vast_xml = extra_string("vastXml");
                let Some(source) = VideoSource::classify(&VideoCandidates {
                    cached_url: vast_url.as_deref(),
                    inline_xml: vast_xml.as_deref(),
                    ..VideoCandidates::default()
                }) else {
                    log::debug!("{PARTNER_CODE}: video bid without VAST, dropping");
                    return Ok(Vec::new());
                };
                (video_creative(source, None, None), VIDEO_TTL_SECONDS)
            }
            MediaType::Banner => {
                let Some(creative) = bid.adm.as_deref().and_then(|adm| banner_creative(adm, None))
                else {
                    log::debug!("{PARTNER_CODE}: banner bid without markup, dropping");
                    return Ok(Vec::new());
                };
                let ttl = bid
                    .extra
                    .get("ttl")
                    .and_then(lenient::to_u32)
                    .filter(|ttl| *ttl > 0)
                    .unwrap_or(DEFAULT_TTL_SECONDS);
                (creative, ttl)
            }
            MediaType::Native => {
                log::debug!("{PARTNER_CODE}: native is not supported, dropping");
                return Ok(Vec::new());
            }
        };

        Ok(vec![NormalizedBid {
            request_id,
            cpm,
            currency: body
                .cur
                .filter(|cur| !cur.is_empty())
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            width: bid.w.unwrap_or_default(),
            height: bid.h.unwrap_or_default(),
            creative_id: response::first_non_empty([bid.adid.clone(), bid.id.clone()])
                .unwrap_or_default(),
            deal_id: bid.dealid.clone().filter(|deal| !deal.is_empty()),
            ttl,
            net_revenue: true,
            creative,
            meta: BidMeta {
                advertiser_domains: bid.adomain.clone(),
                ..BidMeta::default()
            },
            ext: serde_json::Map::new(),
        }])
    }

    fn user_syncs(
        &self,
        options: &SyncOptions,
        responses: &[ServerResponse],
        gdpr_consent: Option<&GdprConsent>,
        usp_consent: Option<&str>,
    ) -> Vec<SyncDirective> {
        if !options.iframe_enabled || responses.is_empty() {
            return Vec::new();
        }
        let consent = ConsentContext::for_sync(gdpr_consent, usp_consent, &self.privacy);
        vec![SyncDirective::new(
            SyncType::Iframe,
            privacy::append_consent(&self.config.sync_url, &consent, &SyncParamNames::STANDARD),
        )]
    }
}

/// Register the Gamma adapter if it is configured and enabled.
#[must_use]
pub fn register_adapter(settings: &Settings) -> Vec<Arc<dyn BidAdapter>> {
    match settings.partner_config::<GammaConfig>(PARTNER_CODE) {
        Ok(Some(config)) => {
            log::info!("Registering Gamma adapter (endpoint: {})", config.endpoint);
            vec![Arc::new(GammaAdapter::new(config, settings.privacy.clone()))]
        }
        Ok(None) => {
            log::debug!("Gamma partner not configured or disabled");
            Vec::new()
        }
        Err(e) => {
            log::error!("Failed to load Gamma configuration: {:?}", e);
            Vec::new()
        }
    }
}
