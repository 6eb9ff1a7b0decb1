//! Bid adapter protocol translation layer.
//!
//! This crate lets independent demand partners take part in one uniform
//! auction. Each partner implements [`adapter::BidAdapter`] to validate,
//! serialize and parse its own wire protocol, while the free functions in
//! [`adapter`] enforce the shared invariants around every partner hook.
//!
//! # Modules
//!
//! - [`adapter`]: Canonical model, the partner trait, registry and shared helpers
//! - [`error`]: Error types and error handling utilities
//! - [`integrations`]: Built-in partner adapters
//! - [`normalize`]: Media-type normalization for banner, video and native creatives
//! - [`openrtb`]: OpenRTB subset used by OpenRTB-speaking partners
//! - [`privacy`]: Consent and privacy signal encoding
//! - [`settings`]: Configuration management and validation
//! - [`test_support`]: Testing utilities and fixtures

pub mod adapter;
pub mod error;
pub mod integrations;
pub mod normalize;
pub mod openrtb;
pub mod privacy;
pub mod settings;
