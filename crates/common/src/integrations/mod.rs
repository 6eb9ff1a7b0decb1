//! Partner bid adapters.
//!
//! Each partner module carries its configuration type, its
//! [`crate::adapter::BidAdapter`] implementation and a `register_adapter`
//! builder that [`crate::adapter::build_registry`] calls with the loaded
//! settings.

pub mod adhese;
pub mod adrelevantis;
pub mod adtrue;
pub mod gamma;
