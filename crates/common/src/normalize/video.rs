//! Video normalization.
//!
//! A partner may describe a video creative as a cached VAST URL, inline VAST
//! XML, or a raw asset URL that has to be wrapped on the fly. Exactly one is
//! surfaced, in that order of preference.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value as Json};

use crate::adapter::types::{Creative, Renderer, RendererSpec, Vast, VideoCreative};

static VAST_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<\s*vast[\s>]").expect("VAST tag regex should compile"));

/// True when `markup` contains a VAST root element.
#[must_use]
pub fn looks_like_vast(markup: &str) -> bool {
    VAST_TAG.is_match(markup)
}

/// The single source a video creative is served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    /// VAST cached by the partner, referenced by URL.
    CachedUrl(String),
    /// VAST document delivered inline.
    InlineXml(String),
    /// A media asset that must be wrapped through the partner's notify URL.
    AssetUrl {
        url: String,
        notify_url: Option<String>,
    },
}

/// Candidate fields a partner response may carry for one video bid.
#[derive(Debug, Clone, Copy, Default)]
pub struct VideoCandidates<'a> {
    pub cached_url: Option<&'a str>,
    pub inline_xml: Option<&'a str>,
    pub asset_url: Option<&'a str>,
    pub notify_url: Option<&'a str>,
}

impl VideoSource {
    /// Pick the preferred source. Empty strings count as absent.
    #[must_use]
    pub fn classify(candidates: &VideoCandidates<'_>) -> Option<Self> {
        fn present(value: Option<&str>) -> Option<&str> {
            value.filter(|v| !v.trim().is_empty())
        }

        if let Some(url) = present(candidates.cached_url) {
            return Some(Self::CachedUrl(url.to_string()));
        }
        if let Some(xml) = present(candidates.inline_xml) {
            return Some(Self::InlineXml(xml.to_string()));
        }
        present(candidates.asset_url).map(|url| Self::AssetUrl {
            url: url.to_string(),
            notify_url: present(candidates.notify_url).map(str::to_string),
        })
    }

    #[must_use]
    pub fn into_vast(self) -> Vast {
        match self {
            Self::CachedUrl(url) => Vast::VastUrl(url),
            Self::InlineXml(xml) => Vast::VastXml(xml),
            Self::AssetUrl {
                url,
                notify_url: Some(notify),
            } => Vast::VastUrl(format!("{notify}&redir={}", urlencoding::encode(&url))),
            Self::AssetUrl {
                url,
                notify_url: None,
            } => Vast::VastUrl(url),
        }
    }
}

/// Partner-side renderer defaults for outstream video.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RendererDefaults {
    pub url: Option<String>,
    pub id: Option<String>,
    pub config: Map<String, Json>,
}

/// Merge partner renderer config with caller options. The caller wins field
/// by field.
#[must_use]
pub fn merge_renderer_config(
    partner: &Map<String, Json>,
    caller: Option<&RendererSpec>,
) -> Map<String, Json> {
    let mut merged = partner.clone();
    if let Some(caller) = caller {
        for (key, value) in &caller.options {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// Renderer for an outstream response, or `None` when no renderer URL is
/// known from either side.
#[must_use]
pub fn outstream_renderer(
    defaults: &RendererDefaults,
    caller: Option<&RendererSpec>,
) -> Option<Renderer> {
    let url = defaults
        .url
        .clone()
        .filter(|url| !url.is_empty())
        .or_else(|| caller.and_then(|c| c.url.clone()))?;

    Some(Renderer {
        url,
        id: defaults.id.clone(),
        config: merge_renderer_config(&defaults.config, caller),
    })
}

/// Build a video creative from a classified source.
#[must_use]
pub fn video_creative(
    source: VideoSource,
    vast_imp_url: Option<String>,
    renderer: Option<Renderer>,
) -> Creative {
    Creative::Video(VideoCreative {
        vast: source.into_vast(),
        vast_imp_url: vast_imp_url.filter(|url| !url.is_empty()),
        renderer,
    })
}
