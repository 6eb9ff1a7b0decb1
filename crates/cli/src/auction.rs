//! Commands that drive one partner adapter against local JSON fixtures.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use bid_bridge_common::adapter::{
    self, BidAdapter, BidRequest, BidderRequest, GdprConsent, ServerResponse, SyncOptions,
    WireRequest,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::load_settings;
use crate::error::CliError;

/// Consent signals passed to `syncs`.
#[derive(Debug, Default)]
pub struct SyncConsent {
    pub gdpr_applies: bool,
    pub consent: Option<String>,
    pub usp: Option<String>,
}

impl SyncConsent {
    fn gdpr(&self) -> Option<GdprConsent> {
        (self.gdpr_applies || self.consent.is_some()).then(|| GdprConsent {
            applies: self.gdpr_applies,
            consent_string: self.consent.clone(),
        })
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| CliError::Fixture(format!("{}: {}", path.display(), e)))
}

fn read_bidder_request(path: Option<&Path>) -> Result<BidderRequest, CliError> {
    path.map_or_else(|| Ok(BidderRequest::default()), read_json)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn find_adapter(
    config: Option<&Path>,
    partner: &str,
    verbose: bool,
) -> Result<Arc<dyn BidAdapter>, CliError> {
    let settings = load_settings(config, verbose)?;
    adapter::build_registry(&settings)
        .get(partner)
        .ok_or_else(|| CliError::UnknownPartner(partner.to_string()))
}

/// Validate, then build the wire requests for the bids in `bids`.
fn build_requests(
    adapter: &dyn BidAdapter,
    bids: &Path,
    bidder_request: Option<&Path>,
) -> Result<Vec<WireRequest>, CliError> {
    let bids: Vec<BidRequest> = read_json(bids)?;
    let bidder_request = read_bidder_request(bidder_request)?;
    let valid = adapter::filter_valid(adapter, &bids);
    log::debug!("{} of {} bids passed validation", valid.len(), bids.len());
    Ok(adapter::build(adapter, &valid, &bidder_request))
}

/// Print the bids the partner accepts.
pub fn validate(
    config: Option<&Path>,
    partner: &str,
    bids: &Path,
    verbose: bool,
) -> Result<(), CliError> {
    let adapter = find_adapter(config, partner, verbose)?;
    let bids: Vec<BidRequest> = read_json(bids)?;
    print_json(&adapter::filter_valid(adapter.as_ref(), &bids))
}

/// Print the wire requests built for the valid bids.
pub fn build(
    config: Option<&Path>,
    partner: &str,
    bids: &Path,
    bidder_request: Option<&Path>,
    verbose: bool,
) -> Result<(), CliError> {
    let adapter = find_adapter(config, partner, verbose)?;
    print_json(&build_requests(adapter.as_ref(), bids, bidder_request)?)
}

/// Build the requests, then interpret `response` against the first one.
pub fn interpret(
    config: Option<&Path>,
    partner: &str,
    bids: &Path,
    bidder_request: Option<&Path>,
    response: &Path,
    verbose: bool,
) -> Result<(), CliError> {
    let adapter = find_adapter(config, partner, verbose)?;
    let requests = build_requests(adapter.as_ref(), bids, bidder_request)?;
    let request = requests
        .first()
        .ok_or_else(|| CliError::NoRequests(partner.to_string()))?;

    let body = fs::read_to_string(response)?;
    let bids = adapter::interpret(adapter.as_ref(), &ServerResponse::new(body), request);
    print_json(&bids)
}

/// Print the sync directives for one response.
///
/// When `bids` is given the response is attached to the first request built
/// from them, so partners that read the originating request can use it.
pub fn syncs(
    config: Option<&Path>,
    partner: &str,
    response: &Path,
    bids: Option<&Path>,
    options: SyncOptions,
    consent: &SyncConsent,
    verbose: bool,
) -> Result<(), CliError> {
    let adapter = find_adapter(config, partner, verbose)?;

    let mut server_response = ServerResponse::new(fs::read_to_string(response)?);
    if let Some(bids) = bids {
        if let Some(request) = build_requests(adapter.as_ref(), bids, None)?.into_iter().next() {
            server_response = server_response.with_request(request);
        }
    }

    let gdpr = consent.gdpr();
    let directives = adapter::negotiate(
        adapter.as_ref(),
        &options,
        &[server_response],
        gdpr.as_ref(),
        consent.usp.as_deref(),
    );
    print_json(&directives)
}
