use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapter::response::lenient;

/// Minimal subset of an OpenRTB 2.x bid request, enough for partners that
/// speak OpenRTB.
///
/// Extension maps are ordered so serialized bodies are stable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenRtbRequest {
    /// Unique ID of the bid request.
    pub id: String,
    pub imp: Vec<Imp>,
    /// Auction type: 1 = first price.
    pub at: u8,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cur: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmax: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<Site>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regs: Option<Regs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<RequestExt>,
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Imp {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tagid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bidfloor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<Banner>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<Video>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native: Option<Native>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Banner {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub w: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub format: Vec<Format>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Format {
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Video {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub w: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mimes: Vec<String>,
    /// Remaining video parameters (protocols, durations, placement, ...).
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Native impression. `request` is a serialized Native 1.x request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Native {
    pub request: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ver: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Site {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<Publisher>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Publisher {
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<UserExt>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserExt {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eids: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Regs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coppa: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<RegsExt>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegsExt {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gdpr: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub us_privacy: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Source {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<SourceExt>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceExt {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schain: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestExt {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrapper: Option<WrapperExt>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WrapperExt {
    #[serde(rename = "transactionId", skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

/// Minimal subset of an OpenRTB 2.x bid response.
///
/// Scalar fields are read leniently: partners send numbers as strings and
/// the other way around.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenRtbResponse {
    #[serde(default, deserialize_with = "lenient::string_opt")]
    pub id: Option<String>,
    #[serde(default)]
    pub seatbid: Vec<SeatBid>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    pub cur: Option<String>,
    #[serde(default)]
    pub ext: Option<ResponseExt>,
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseExt {
    #[serde(default)]
    pub cookie_sync: Vec<CookieSync>,
}

/// A sync target declared in a response. `type` 1 is an iframe, 2 an image.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CookieSync {
    #[serde(rename = "type", default, deserialize_with = "lenient::u32_opt")]
    pub sync_type: Option<u32>,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeatBid {
    #[serde(default)]
    pub bid: Vec<Bid>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    pub seat: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Bid {
    #[serde(default, deserialize_with = "lenient::string_opt")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    pub impid: Option<String>,
    #[serde(default, deserialize_with = "lenient::f64_opt")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    pub adm: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    pub adid: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    pub crid: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    pub dealid: Option<String>,
    #[serde(default, deserialize_with = "lenient::u32_opt")]
    pub w: Option<u32>,
    #[serde(default, deserialize_with = "lenient::u32_opt")]
    pub h: Option<u32>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub adomain: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    pub nurl: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_opt")]
    pub burl: Option<String>,
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, Value>,
}
