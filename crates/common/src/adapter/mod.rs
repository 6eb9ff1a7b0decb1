//! Bid adapter framework.
//!
//! Partners implement [`BidAdapter`]. Callers use the four contract functions
//! in this module ([`filter_valid`], [`build`], [`interpret`], [`negotiate`]),
//! which wrap the partner hooks, turn partner failures into empty results and
//! enforce the invariants every partner must honor.
//!
//! Note: Individual partner adapters are located in the `integrations` module
//! (e.g., `crate::integrations::adhese`, `crate::integrations::adtrue`).

use std::sync::Arc;

use crate::settings::Settings;

pub mod provider;
pub mod registry;
pub mod request;
pub mod response;
pub mod sync;
pub mod types;
pub mod validation;

pub use provider::BidAdapter;
pub use registry::AdapterRegistry;
pub use types::{
    BidRequest, BidderRequest, Creative, GdprConsent, MediaType, NormalizedBid, ServerResponse,
    SyncDirective, SyncOptions, SyncType, WireRequest,
};

/// Type alias for adapter builder functions.
type AdapterBuilder = fn(&Settings) -> Vec<Arc<dyn BidAdapter>>;

/// Returns the list of all available adapter builder functions.
///
/// Each builder checks the settings for its partner's configuration and
/// returns the adapter when it is enabled.
fn adapter_builders() -> &'static [AdapterBuilder] {
    &[
        crate::integrations::adhese::register_adapter,
        crate::integrations::adrelevantis::register_adapter,
        crate::integrations::adtrue::register_adapter,
        crate::integrations::gamma::register_adapter,
    ]
}

/// Build a registry holding every partner adapter enabled in `settings`.
#[must_use]
pub fn build_registry(settings: &Settings) -> AdapterRegistry {
    log::info!("Building bid adapter registry");

    let mut registry = AdapterRegistry::new();
    for builder in adapter_builders() {
        for adapter in builder(settings) {
            registry.register(adapter);
        }
    }

    log::info!("Bid adapter registry built with {} adapters", registry.len());
    registry
}

/// True unless every media type the slot requests is one the partner cannot
/// serve. Slots that declare no media types are left to the partner.
fn serves_some_media_type(adapter: &dyn BidAdapter, bid: &BidRequest) -> bool {
    let requested = bid.media_types.requested();
    requested.is_empty()
        || requested
            .into_iter()
            .any(|media_type| adapter.supports_media_type(media_type))
}

/// Keep the bid requests the partner accepts, in their original order.
///
/// A slot is dropped when it only requests media types the partner does not
/// serve, or when the partner rejects its params.
#[must_use]
pub fn filter_valid(adapter: &dyn BidAdapter, bids: &[BidRequest]) -> Vec<BidRequest> {
    bids.iter()
        .filter(|bid| {
            if !serves_some_media_type(adapter, bid) {
                log::debug!(
                    "{}: bid request '{}' only requests unsupported media types",
                    adapter.code(),
                    bid.bid_id
                );
                return false;
            }
            let valid = adapter.is_bid_request_valid(bid);
            if !valid {
                log::debug!(
                    "{}: bid request '{}' is missing required params",
                    adapter.code(),
                    bid.bid_id
                );
            }
            valid
        })
        .cloned()
        .collect()
}

/// Serialize a validated batch into the partner's wire requests.
///
/// An empty batch yields no requests. A partner failure is logged and yields
/// no requests.
#[must_use]
pub fn build(
    adapter: &dyn BidAdapter,
    bids: &[BidRequest],
    bidder_request: &BidderRequest,
) -> Vec<WireRequest> {
    if bids.is_empty() {
        return Vec::new();
    }

    match adapter.build_requests(bids, bidder_request) {
        Ok(requests) => {
            log::debug!(
                "{}: built {} wire requests for {} bids",
                adapter.code(),
                requests.len(),
                bids.len()
            );
            requests
        }
        Err(e) => {
            log::error!("{}: failed to build requests: {:?}", adapter.code(), e);
            Vec::new()
        }
    }
}

/// Interpret a partner response. Never fails: unparseable bodies and
/// malformed entries yield fewer (possibly zero) bids.
///
/// Every returned bid correlates to a bid id in `request`, carries a media
/// type the partner serves and satisfies the canonical invariants. Partner
/// order is preserved.
#[must_use]
pub fn interpret(
    adapter: &dyn BidAdapter,
    response: &ServerResponse,
    request: &WireRequest,
) -> Vec<NormalizedBid> {
    match adapter.parse_response(response, request) {
        Ok(bids) => {
            let bids = bids
                .into_iter()
                .filter(|bid| {
                    let media_type = bid.media_type();
                    let supported = adapter.supports_media_type(media_type);
                    if !supported {
                        log::debug!(
                            "{}: dropping {media_type} bid for '{}', media type not supported",
                            adapter.code(),
                            bid.request_id
                        );
                    }
                    supported
                })
                .collect();
            let bids = response::retain_acceptable(adapter.code(), bids, request);
            log::debug!("{}: interpreted {} bids", adapter.code(), bids.len());
            bids
        }
        Err(e) => {
            log::warn!("{}: failed to interpret response: {:?}", adapter.code(), e);
            Vec::new()
        }
    }
}

/// Collect the partner's user-sync directives after an auction.
///
/// Types the publisher disallows are dropped and exact duplicates removed.
/// No responses means no syncs.
#[must_use]
pub fn negotiate(
    adapter: &dyn BidAdapter,
    options: &SyncOptions,
    responses: &[ServerResponse],
    gdpr_consent: Option<&GdprConsent>,
    usp_consent: Option<&str>,
) -> Vec<SyncDirective> {
    if responses.is_empty() || (!options.iframe_enabled && !options.pixel_enabled) {
        return Vec::new();
    }

    let directives = adapter.user_syncs(options, responses, gdpr_consent, usp_consent);
    sync::filter_directives(adapter.code(), options, directives)
}
