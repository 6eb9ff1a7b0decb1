//! Media-type normalization.
//!
//! Partners describe creatives in many shapes. These helpers turn them into
//! exactly one canonical [`Creative`] per bid.

use crate::adapter::types::MediaType;

pub mod banner;
pub mod native;
pub mod video;

pub use banner::{banner_creative, impression_pixel, PixelStyle};
pub use native::{NativeFieldMap, NativeImageFields};
pub use video::{looks_like_vast, RendererDefaults, VideoSource};

pub use crate::adapter::types::Creative;

/// Resolve a partner-declared media type.
///
/// Unknown names are logged and yield `None` so the entry can be dropped.
#[must_use]
pub fn declared_media_type(partner: &str, declared: &str) -> Option<MediaType> {
    let media_type = MediaType::parse(declared);
    if media_type.is_none() {
        log::warn!("{partner}: unknown media type '{declared}', dropping entry");
    }
    media_type
}
