//! AdTrue bid adapter.
//!
//! AdTrue speaks a subset of OpenRTB 2.5: one POST per batch, responses as
//! `seatbid[].bid[]` with the media type inferred from the markup.

use std::sync::Arc;

use error_stack::Report;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};
use validator::Validate;

use crate::adapter::provider::BidAdapter;
use crate::adapter::request;
use crate::adapter::response::{self, lenient, DEFAULT_TTL_SECONDS};
use crate::adapter::types::{
    BidMeta, BidRequest, BidderRequest, Creative, GdprConsent, MediaType, NativeAsset,
    NativeParams, NormalizedBid, ServerResponse, SyncDirective, SyncOptions, SyncType,
    WireRequest, DEFAULT_CURRENCY,
};
use crate::adapter::validation::has_required_ids;
use crate::error::BidBridgeError;
use crate::normalize::native::from_openrtb;
use crate::normalize::video::{video_creative, VideoCandidates, VideoSource};
use crate::normalize::{banner_creative, looks_like_vast};
use crate::openrtb::{
    self, Banner, Format, Imp, Native, OpenRtbRequest, OpenRtbResponse, Publisher, Regs, RegsExt,
    RequestExt, Site, Source, SourceExt, User, UserExt, Video, WrapperExt,
};
use crate::privacy::{self, ConsentContext, CoppaEncoding, SyncParamNames};
use crate::settings::{PartnerConfig, PrivacyConfig, Settings};

const PARTNER_CODE: &str = "adtrue";
/// Page URL marker that turns on AdTrue's test mode.
const TEST_MODE_MARKER: &str = "adtrueTest=true";

const SYNC_PARAMS: SyncParamNames = SyncParamNames {
    coppa: Some("coppa"),
    ..SyncParamNames::STANDARD
};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the AdTrue partner.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct AdTrueConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_endpoint")]
    #[validate(url)]
    pub endpoint: String,

    #[serde(default = "default_currency")]
    #[validate(length(min = 3, max = 3))]
    pub currency: String,
}

fn default_enabled() -> bool {
    true
}

fn default_endpoint() -> String {
    "https://hb.adtrue.com/prebid/auction".to_string()
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

impl Default for AdTrueConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            endpoint: default_endpoint(),
            currency: default_currency(),
        }
    }
}

impl PartnerConfig for AdTrueConfig {
    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

// ============================================================================
// Request building
// ============================================================================

/// Native 1.2 request asset ids, one per canonical asset.
fn native_asset_spec(asset: NativeAsset) -> Option<(u32, Json)> {
    let data = |id: u32, kind: u32| Some((id, json!({"data": {"type": kind}})));
    match asset {
        NativeAsset::Title => Some((1, json!({"title": {"len": 140}}))),
        NativeAsset::Image => Some((2, json!({"img": {"type": 3}}))),
        NativeAsset::Icon => Some((3, json!({"img": {"type": 1}}))),
        NativeAsset::SponsoredBy => data(4, 1),
        NativeAsset::Body => data(5, 2),
        NativeAsset::Rating => data(6, 3),
        NativeAsset::Likes => data(7, 4),
        NativeAsset::Downloads => data(8, 5),
        NativeAsset::Price => data(9, 6),
        NativeAsset::SalePrice => data(10, 7),
        NativeAsset::Phone => data(11, 8),
        NativeAsset::Address => data(12, 9),
        NativeAsset::Body2 => data(13, 10),
        NativeAsset::DisplayUrl => data(14, 11),
        NativeAsset::Cta => data(15, 12),
        NativeAsset::PrivacyLink | NativeAsset::ClickUrl | NativeAsset::Other => None,
    }
}

/// Serialize native requirements as an OpenRTB Native 1.2 request.
fn native_request(params: &NativeParams) -> String {
    let assets: Vec<Json> = params
        .iter()
        .filter_map(|(asset, requirement)| {
            let (id, mut spec) = native_asset_spec(*asset)?;
            let object = spec.as_object_mut()?;
            object.insert("id".to_string(), Json::from(id));
            object.insert("required".to_string(), Json::from(u8::from(requirement.required)));
            if let Some(len) = requirement.len {
                if let Some(title) = object.get_mut("title") {
                    title["len"] = Json::from(len);
                }
            }
            if let (Some(size), Some(img)) = (requirement.sizes.first(), object.get_mut("img")) {
                img["w"] = Json::from(size.width);
                img["h"] = Json::from(size.height);
            }
            Some(spec)
        })
        .collect();
    json!({"ver": "1.2", "assets": assets}).to_string()
}

fn build_imp(bid: &BidRequest, secure: bool) -> Imp {
    let sizes = bid.effective_sizes();
    let formats: Vec<Format> = sizes
        .iter()
        .map(|size| Format {
            w: size.width,
            h: size.height,
        })
        .collect();

    let requested = bid.media_types.requested();
    let wants_banner = requested.is_empty() || requested.contains(&MediaType::Banner);
    let banner = wants_banner.then(|| Banner {
        w: sizes.first().map(|size| size.width),
        h: sizes.first().map(|size| size.height),
        format: formats,
    });

    let video = bid.media_types.video.as_ref().map(|params| {
        let player = params.player_size.first();
        Video {
            w: player.map(|size| size.width),
            h: player.map(|size| size.height),
            mimes: params.mimes.clone(),
            extra: params
                .extra
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        }
    });

    let native = bid.media_types.native.as_ref().map(|params| Native {
        request: native_request(params),
        ver: Some("1.2".to_string()),
    });

    Imp {
        id: bid.bid_id.clone(),
        tagid: bid.param_string("zoneId"),
        bidfloor: bid.param("reserve").and_then(lenient::to_f64),
        banner,
        video,
        native,
        secure: Some(u8::from(secure)),
        ..Imp::default()
    }
}

// ============================================================================
// Adapter
// ============================================================================

/// AdTrue bid adapter.
pub struct AdTrueAdapter {
    config: AdTrueConfig,
    privacy: PrivacyConfig,
}

impl AdTrueAdapter {
    #[must_use]
    pub fn new(config: AdTrueConfig, privacy: PrivacyConfig) -> Self {
        Self { config, privacy }
    }

    fn build_body(&self, bids: &[BidRequest], bidder_request: &BidderRequest) -> OpenRtbRequest {
        let consent = ConsentContext::new(bidder_request, &self.privacy);
        let referer = &bidder_request.referer_info;
        let page = referer.page_url();
        let secure = page.is_some_and(|page| page.starts_with("https://"));
        let transaction_id = bids
            .iter()
            .find_map(|bid| bid.transaction_id())
            .map(str::to_string);
        let eids = bids
            .iter()
            .find_map(|bid| bid.user_id_as_eids.clone().filter(|eids| !eids.is_empty()));

        let user_ext = UserExt {
            consent: consent.consent_string().map(str::to_string),
            eids,
        };
        let user = (user_ext.consent.is_some() || user_ext.eids.is_some())
            .then_some(User { ext: Some(user_ext) });

        let regs_ext = RegsExt {
            gdpr: consent.gdpr.as_ref().map(|_| consent.gdpr_flag()),
            us_privacy: consent.us_privacy().map(str::to_string),
        };
        let has_regs_ext = regs_ext.gdpr.is_some() || regs_ext.us_privacy.is_some();
        let coppa = consent.coppa_value(CoppaEncoding::Integer);
        let regs = (coppa.is_some() || has_regs_ext).then(|| Regs {
            coppa,
            ext: has_regs_ext.then_some(regs_ext),
        });

        let id = if bidder_request.auction_id.is_empty() {
            bids.first().map(|bid| bid.bid_id.clone()).unwrap_or_default()
        } else {
            bidder_request.auction_id.clone()
        };

        OpenRtbRequest {
            id,
            imp: bids.iter().map(|bid| build_imp(bid, secure)).collect(),
            at: 1,
            cur: vec![self.config.currency.clone()],
            tmax: bidder_request.timeout,
            site: Some(Site {
                domain: Some(referer.page_domain().unwrap_or_default()),
                page: page.map(str::to_string),
                referrer: referer.referrer.clone().filter(|r| !r.is_empty()),
                publisher: bids
                    .first()
                    .and_then(|bid| bid.param_string("publisherId"))
                    .map(|id| Publisher { id }),
            }),
            user,
            regs,
            source: Some(Source {
                tid: transaction_id.clone(),
                ext: consent.schain.clone().map(|schain| SourceExt {
                    schain: Some(schain),
                }),
            }),
            test: page
                .is_some_and(|page| page.contains(TEST_MODE_MARKER))
                .then_some(1),
            ext: Some(RequestExt {
                wrapper: Some(WrapperExt { transaction_id }),
            }),
            ..OpenRtbRequest::default()
        }
    }

    fn to_normalized_bid(
        bid: &openrtb::Bid,
        currency: &str,
        request: &WireRequest,
    ) -> Option<NormalizedBid> {
        let Some(request_id) = bid.impid.clone() else {
            log::debug!("{PARTNER_CODE}: skipping bid without impid");
            return None;
        };
        let Some(price) = bid.price else {
            log::debug!("{PARTNER_CODE}: skipping bid '{request_id}' without price");
            return None;
        };
        let adm = bid.adm.as_deref().unwrap_or_default();

        let creative = match serde_json::from_str::<Json>(adm)
            .ok()
            .as_ref()
            .and_then(from_openrtb)
        {
            Some(native) => Creative::Native { native },
            None if looks_like_vast(adm) => {
                let source = VideoSource::classify(&VideoCandidates {
                    inline_xml: Some(adm),
                    ..VideoCandidates::default()
                })?;
                video_creative(source, None, None)
            }
            None => banner_creative(adm, None)?,
        };

        // Native creatives often carry no dimensions; fall back to the slot.
        let slot_size = request
            .find_bid(&request_id)
            .and_then(|slot| slot.effective_sizes().first().copied());
        let width = bid.w.filter(|w| *w > 0).or(slot_size.map(|s| s.width));
        let height = bid.h.filter(|h| *h > 0).or(slot_size.map(|s| s.height));

        Some(NormalizedBid {
            request_id,
            cpm: price,
            currency: currency.to_string(),
            width: width.unwrap_or_default(),
            height: height.unwrap_or_default(),
            creative_id: response::first_non_empty([bid.crid.clone(), bid.id.clone()])
                .unwrap_or_default(),
            deal_id: bid.dealid.clone().filter(|deal| !deal.is_empty()),
            ttl: DEFAULT_TTL_SECONDS,
            net_revenue: true,
            creative,
            meta: BidMeta {
                advertiser_domains: bid.adomain.clone(),
                click_url: bid.adomain.first().cloned(),
                ..BidMeta::default()
            },
            ext: response::namespaced(
                PARTNER_CODE,
                bid.id
                    .as_ref()
                    .map_or(Json::Null, |id| json!({"partnerImpId": id})),
            ),
        })
    }

    /// `publisherId` and `zoneId` of the request a response answers.
    fn sync_ids(response: &ServerResponse) -> Vec<(String, String)> {
        let Some(first) = response
            .request
            .as_ref()
            .and_then(|request| request.bids.first())
        else {
            return Vec::new();
        };
        ["publisherId", "zoneId"]
            .iter()
            .filter_map(|key| {
                first
                    .param_string(key)
                    .map(|value| ((*key).to_string(), value))
            })
            .collect()
    }
}

impl BidAdapter for AdTrueAdapter {
    fn code(&self) -> &'static str {
        PARTNER_CODE
    }

    fn supports_media_type(&self, _media_type: MediaType) -> bool {
        true
    }

    fn is_bid_request_valid(&self, bid: &BidRequest) -> bool {
        has_required_ids(bid, &["publisherId", "zoneId"])
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
        let Some(body) = response::parse_body::<OpenRtbResponse>(PARTNER_CODE, &response.body)?
        else {
            return Ok(Vec::new());
        };
        let currency = body
            .cur
            .clone()
            .filter(|cur| !cur.is_empty())
            .unwrap_or_else(|| self.config.currency.clone());

        Ok(body
            .seatbid
            .iter()
            .flat_map(|seat| seat.bid.iter())
            .filter_map(|bid| Self::to_normalized_bid(bid, &currency, request))
            .collect())
    }

    fn user_syncs(
        &self,
        _options: &SyncOptions,
        responses: &[ServerResponse],
        gdpr_consent: Option<&GdprConsent>,
        usp_consent: Option<&str>,
    ) -> Vec<SyncDirective> {
        let consent = ConsentContext::for_sync(gdpr_consent, usp_consent, &self.privacy);
        let consent_pairs = privacy::encode_query(&consent, &SYNC_PARAMS);

        let mut directives = Vec::new();
        for response in responses {
            let Ok(body) = serde_json::from_str::<OpenRtbResponse>(&response.body) else {
                continue;
            };
            let Some(ext) = body.ext else {
                continue;
            };

            let mut pairs = Self::sync_ids(response);
            pairs.extend(consent_pairs.iter().cloned());

            for cookie_sync in ext.cookie_sync {
                let sync_type = match cookie_sync.sync_type {
                    Some(1) => SyncType::Iframe,
                    Some(2) => SyncType::Image,
                    other => {
                        log::debug!("{PARTNER_CODE}: ignoring cookie sync of type {other:?}");
                        continue;
                    }
                };
                if cookie_sync.url.is_empty() {
                    continue;
                }
                directives.push(SyncDirective::new(
                    sync_type,
                    privacy::append_query(&cookie_sync.url, &pairs),
                ));
            }
        }
        directives
    }
}

// ============================================================================
// Registration
// ============================================================================

/// Register the AdTrue adapter if it is configured and enabled.
#[must_use]
pub fn register_adapter(settings: &Settings) -> Vec<Arc<dyn BidAdapter>> {
    match settings.partner_config::<AdTrueConfig>(PARTNER_CODE) {
        Ok(Some(config)) => {
            log::info!("Registering AdTrue adapter (endpoint: {})", config.endpoint);
            vec![Arc::new(AdTrueAdapter::new(config, settings.privacy.clone()))]
        }
        Ok(None) => {
            log::debug!("AdTrue partner not configured or disabled");
            Vec::new()
        }
        Err(e) => {
            log::error!("Failed to load AdTrue configuration: {:?}", e);
            Vec::new()
        }
    }
}
