//! Error types for the bid adapter translation layer.
//!
//! Fallible internals return [`error_stack::Report<BidBridgeError>`]. The public
//! adapter contracts in [`crate::adapter`] never surface these to the auction
//! scheduler; they are logged and converted into empty results instead.

use core::error::Error;

use derive_more::Display;

/// Errors raised while translating between the canonical model and a
/// partner's wire format.
#[derive(Debug, Display)]
pub enum BidBridgeError {
    /// Settings could not be loaded, parsed or validated.
    #[display("Configuration error: {message}")]
    Configuration { message: String },

    /// A partner adapter failed to construct a wire request.
    #[display("Adapter error for {partner}: {message}")]
    Adapter { partner: String, message: String },

    /// A partner response body could not be interpreted.
    #[display("Invalid response from {partner}: {message}")]
    InvalidResponse { partner: String, message: String },

    /// A canonical value could not be (de)serialized.
    #[display("Serialization error: {message}")]
    Serialization { message: String },
}

impl Error for BidBridgeError {}

impl BidBridgeError {
    /// Shorthand for an [`BidBridgeError::Adapter`] error.
    pub fn adapter(partner: &str, message: impl Into<String>) -> Self {
        Self::Adapter {
            partner: partner.to_string(),
            message: message.into(),
        }
    }

    /// Shorthand for an [`BidBridgeError::InvalidResponse`] error.
    pub fn invalid_response(partner: &str, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            partner: partner.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use error_stack::Report;

    #[test]
    fn test_error_display() {
        assert_eq!(
            BidBridgeError::Configuration {
                message: "missing".into()
            }
            .to_string(),
            "Configuration error: missing"
        );
        assert_eq!(
            BidBridgeError::adapter("adtrue", "boom").to_string(),
            "Adapter error for adtrue: boom"
        );
        assert_eq!(
            BidBridgeError::invalid_response("gamma", "not json").to_string(),
            "Invalid response from gamma: not json"
        );
    }

    #[test]
    fn test_error_wraps_in_report() {
        let report = Report::new(BidBridgeError::Serialization {
            message: "bad body".into(),
        });
        assert!(format!("{report:?}").contains("bad body"));
    }
}
