//! Trait definition for bid adapters.

use error_stack::Report;

use crate::error::BidBridgeError;

use super::types::{
    BidRequest, BidderRequest, GdprConsent, MediaType, NormalizedBid, ServerResponse,
    SyncDirective, SyncOptions, WireRequest,
};

/// Trait implemented by every demand partner (Adhese, AdTrue, Gamma, etc.).
///
/// Partner hooks may fail; the contract functions in [`crate::adapter`] wrap
/// them, log failures and enforce the shared invariants, so callers should go
/// through those rather than invoking the hooks directly.
pub trait BidAdapter: Send + Sync {
    /// Unique partner code (e.g., "adhese", "adtrue").
    fn code(&self) -> &'static str;

    /// Check if this partner can serve a specific media type.
    fn supports_media_type(&self, media_type: MediaType) -> bool {
        matches!(media_type, MediaType::Banner)
    }

    /// Check that the partner's required identifiers are present.
    ///
    /// Must be pure and must never reject on optional fields.
    fn is_bid_request_valid(&self, bid: &BidRequest) -> bool;

    /// Serialize a validated, non-empty batch into the partner's wire format.
    ///
    /// Implementations must be deterministic: identical input yields
    /// byte-identical request bodies.
    fn build_requests(
        &self,
        bids: &[BidRequest],
        bidder_request: &BidderRequest,
    ) -> Result<Vec<WireRequest>, Report<BidBridgeError>>;

    /// Parse a raw partner response into canonical bids.
    ///
    /// `request` is the wire request the response answers; bids are
    /// correlated against its `bids`.
    fn parse_response(
        &self,
        response: &ServerResponse,
        request: &WireRequest,
    ) -> Result<Vec<NormalizedBid>, Report<BidBridgeError>>;

    /// Declare the partner's user-sync targets.
    ///
    /// Filtering by [`SyncOptions`] and de-duplication happen in
    /// [`crate::adapter::negotiate`]; partners may still skip work for types
    /// that are not allowed.
    fn user_syncs(
        &self,
        _options: &SyncOptions,
        _responses: &[ServerResponse],
        _gdpr_consent: Option<&GdprConsent>,
        _usp_consent: Option<&str>,
    ) -> Vec<SyncDirective> {
        Vec::new()
    }
}
