//! Consent and privacy signal encoding.
//!
//! GDPR, US privacy and COPPA are carried independently: one regime being
//! absent never changes how another is encoded. COPPA is site-wide and comes
//! from [`PrivacyConfig`], never from the bid request.

use serde_json::Value as Json;

use crate::adapter::types::{BidderRequest, GdprConsent};
use crate::settings::PrivacyConfig;

/// Privacy view of one auction, derived from the bidder request and the
/// shared configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsentContext {
    pub gdpr: Option<GdprConsent>,
    pub us_privacy: Option<String>,
    pub coppa: bool,
    /// Seller chain, passed through verbatim.
    pub schain: Option<Json>,
}

impl ConsentContext {
    #[must_use]
    pub fn new(bidder_request: &BidderRequest, privacy: &PrivacyConfig) -> Self {
        let schain = bidder_request
            .ortb2_value("/source/ext/schain")
            .or_else(|| bidder_request.ortb2_value("/source/schain"))
            .cloned()
            .or_else(|| privacy.schain.clone());

        Self {
            gdpr: bidder_request.gdpr_consent.clone(),
            us_privacy: non_empty(bidder_request.usp_consent.as_deref()),
            coppa: privacy.coppa,
            schain,
        }
    }

    /// Context for user-sync negotiation, where only the consent signals
    /// handed to the negotiator are known.
    #[must_use]
    pub fn for_sync(
        gdpr: Option<&GdprConsent>,
        us_privacy: Option<&str>,
        privacy: &PrivacyConfig,
    ) -> Self {
        Self {
            gdpr: gdpr.cloned(),
            us_privacy: non_empty(us_privacy),
            coppa: privacy.coppa,
            schain: None,
        }
    }

    #[must_use]
    pub fn gdpr_applies(&self) -> bool {
        self.gdpr.as_ref().is_some_and(|gdpr| gdpr.applies)
    }

    /// `1` when GDPR applies, `0` otherwise (including when unknown).
    #[must_use]
    pub fn gdpr_flag(&self) -> u8 {
        u8::from(self.gdpr_applies())
    }

    /// The consent string, when one was supplied and is non-empty.
    #[must_use]
    pub fn consent_string(&self) -> Option<&str> {
        self.gdpr
            .as_ref()
            .and_then(|gdpr| gdpr.consent_string.as_deref())
            .filter(|consent| !consent.is_empty())
    }

    #[must_use]
    pub fn us_privacy(&self) -> Option<&str> {
        self.us_privacy.as_deref()
    }

    /// COPPA value for a request body, or `None` when COPPA is off and the
    /// field must be omitted.
    #[must_use]
    pub fn coppa_value(&self, encoding: CoppaEncoding) -> Option<Json> {
        self.coppa.then(|| encoding.encode(true))
    }
}

/// How a partner spells a true COPPA flag in its request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoppaEncoding {
    /// `1`
    Integer,
    /// `true`
    Boolean,
}

impl CoppaEncoding {
    #[must_use]
    pub fn encode(self, flag: bool) -> Json {
        match self {
            Self::Integer => Json::from(u8::from(flag)),
            Self::Boolean => Json::Bool(flag),
        }
    }
}

/// Query parameter names a partner uses for consent in sync URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncParamNames {
    pub gdpr: &'static str,
    pub consent: &'static str,
    pub us_privacy: Option<&'static str>,
    pub coppa: Option<&'static str>,
}

impl SyncParamNames {
    pub const STANDARD: Self = Self {
        gdpr: "gdpr",
        consent: "gdpr_consent",
        us_privacy: Some("us_privacy"),
        coppa: None,
    };
}

/// Encode the consent signals as query pairs, in a fixed order.
///
/// Every named parameter is emitted even when its signal is absent: GDPR as
/// `0`, strings as empty values, COPPA as `0`.
#[must_use]
pub fn encode_query(context: &ConsentContext, names: &SyncParamNames) -> Vec<(String, String)> {
    let mut pairs = vec![
        (names.gdpr.to_string(), context.gdpr_flag().to_string()),
        (
            names.consent.to_string(),
            context.consent_string().unwrap_or_default().to_string(),
        ),
    ];
    if let Some(name) = names.us_privacy {
        pairs.push((
            name.to_string(),
            context.us_privacy().unwrap_or_default().to_string(),
        ));
    }
    if let Some(name) = names.coppa {
        pairs.push((name.to_string(), u8::from(context.coppa).to_string()));
    }
    pairs
}

/// Append query pairs to `url`, keeping any query it already has.
#[must_use]
pub fn append_query(url: &str, pairs: &[(String, String)]) -> String {
    if pairs.is_empty() {
        return url.to_string();
    }

    match url::Url::parse(url) {
        Ok(mut parsed) => {
            {
                let mut query = parsed.query_pairs_mut();
                for (key, value) in pairs {
                    query.append_pair(key, value);
                }
            }
            parsed.to_string()
        }
        Err(_) => {
            let mut out = url.to_string();
            for (key, value) in pairs {
                out.push(if out.contains('?') { '&' } else { '?' });
                out.push_str(&urlencoding::encode(key));
                out.push('=');
                out.push_str(&urlencoding::encode(value));
            }
            out
        }
    }
}

/// Append the consent signals to a sync URL using the partner's names.
#[must_use]
pub fn append_consent(url: &str, context: &ConsentContext, names: &SyncParamNames) -> String {
    append_query(url, &encode_query(context, names))
}

/// Read consent signals back out of a URL produced by [`append_consent`].
#[must_use]
pub fn decode_query(url: &str, names: &SyncParamNames) -> ConsentContext {
    let mut context = ConsentContext::default();
    let Ok(parsed) = url::Url::parse(url) else {
        return context;
    };

    let mut applies = None;
    let mut consent = None;
    for (key, value) in parsed.query_pairs() {
        if key == names.gdpr {
            applies = Some(value == "1");
        } else if key == names.consent {
            consent = non_empty(Some(&value));
        } else if Some(key.as_ref()) == names.us_privacy {
            context.us_privacy = non_empty(Some(&value));
        } else if Some(key.as_ref()) == names.coppa {
            context.coppa = value == "1";
        }
    }

    if applies.is_some() || consent.is_some() {
        context.gdpr = Some(GdprConsent {
            applies: applies.unwrap_or(false),
            consent_string: consent,
        });
    }
    context
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gdpr(applies: bool, consent: &str) -> GdprConsent {
        GdprConsent {
            applies,
            consent_string: Some(consent.to_string()),
        }
    }

    #[test]
    fn test_absent_signals_encode_as_defaults() {
        let context = ConsentContext::default();
        let names = SyncParamNames {
            coppa: Some("coppa"),
            ..SyncParamNames::STANDARD
        };
        let url = append_consent(
            "https://hb.adtrue.com/prebid/usersync?bidder=adtrue",
            &context,
            &names,
        );
        assert_eq!(
            url,
            "https://hb.adtrue.com/prebid/usersync?bidder=adtrue&gdpr=0&gdpr_consent=&us_privacy=&coppa=0"
        );
    }

    #[test]
    fn test_gdpr_and_usp_are_independent() {
        let privacy = PrivacyConfig::default();
        let context = ConsentContext::for_sync(Some(&gdpr(true, "X")), None, &privacy);
        let pairs = encode_query(&context, &SyncParamNames::STANDARD);
        assert_eq!(
            pairs,
            vec![
                ("gdpr".to_string(), "1".to_string()),
                ("gdpr_consent".to_string(), "X".to_string()),
                ("us_privacy".to_string(), String::new()),
            ]
        );

        let context = ConsentContext::for_sync(None, Some("1YNN"), &privacy);
        let url = append_consent("https://sync.example/s", &context, &SyncParamNames::STANDARD);
        assert!(url.contains("gdpr=0"));
        assert!(url.contains("us_privacy=1YNN"));
    }

    #[test]
    fn test_consent_string_is_query_encoded() {
        let context = ConsentContext::for_sync(
            Some(&gdpr(true, "BOJ8RZsOJ8RZsABAB8AAAAAZ+A==")),
            None,
            &PrivacyConfig::default(),
        );
        let url = append_consent("https://sync.example/s", &context, &SyncParamNames::STANDARD);
        assert!(url.contains("gdpr_consent=BOJ8RZsOJ8RZsABAB8AAAAAZ%2BA%3D%3D"));

        let decoded = decode_query(&url, &SyncParamNames::STANDARD);
        assert_eq!(decoded.consent_string(), Some("BOJ8RZsOJ8RZsABAB8AAAAAZ+A=="));
        assert!(decoded.gdpr_applies());
    }

    #[test]
    fn test_decode_reads_partner_names() {
        let names = SyncParamNames {
            gdpr: "gdpr",
            consent: "consentString",
            us_privacy: None,
            coppa: Some("coppa"),
        };
        let decoded = decode_query(
            "https://user-sync.example/sync?account=demo&gdpr=1&consentString=CS&coppa=1",
            &names,
        );
        assert_eq!(decoded.consent_string(), Some("CS"));
        assert!(decoded.coppa);
        assert!(decoded.us_privacy().is_none());
    }

    #[test]
    fn test_coppa_encoding_and_omission() {
        let mut context = ConsentContext::default();
        assert_eq!(context.coppa_value(CoppaEncoding::Integer), None);

        context.coppa = true;
        assert_eq!(context.coppa_value(CoppaEncoding::Integer), Some(json!(1)));
        assert_eq!(context.coppa_value(CoppaEncoding::Boolean), Some(json!(true)));
    }

    #[test]
    fn test_schain_prefers_first_party_data() {
        let privacy = PrivacyConfig {
            coppa: false,
            schain: Some(json!({"ver": "1.0", "complete": 0})),
        };
        let mut bidder_request = BidderRequest::default();
        assert_eq!(
            ConsentContext::new(&bidder_request, &privacy).schain,
            Some(json!({"ver": "1.0", "complete": 0}))
        );

        bidder_request.ortb2 = json!({"source": {"ext": {"schain": {"ver": "1.0", "complete": 1}}}});
        assert_eq!(
            ConsentContext::new(&bidder_request, &privacy).schain,
            Some(json!({"ver": "1.0", "complete": 1}))
        );
    }

    #[test]
    fn test_append_query_without_absolute_url() {
        let pairs = vec![("a".to_string(), "b c".to_string())];
        assert_eq!(append_query("/sync", &pairs), "/sync?a=b%20c");
        assert_eq!(append_query("/sync?x=1", &pairs), "/sync?x=1&a=b%20c");
    }
}
