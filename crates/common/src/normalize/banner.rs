//! Banner normalization.

use crate::adapter::types::Creative;

/// Markup convention for an appended impression pixel. Every style renders
/// a zero-footprint, non-visible image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelStyle {
    /// `<img src='..' style='height:1px; width:1px; margin: -1px -1px; display:none;'/>`
    CollapsedImage,
    /// A hidden absolutely-positioned `<div>` wrapping a plain `<img>`.
    HiddenContainer,
}

/// Render an impression pixel for `url` in the given style.
#[must_use]
pub fn impression_pixel(url: &str, style: PixelStyle) -> String {
    match style {
        PixelStyle::CollapsedImage => format!(
            "<img src='{}' style='height:1px; width:1px; margin: -1px -1px; display:none;'/>",
            url.replace('\'', "%27")
        ),
        PixelStyle::HiddenContainer => format!(
            "<div style=\"position:absolute;left:0px;top:0px;visibility:hidden;\"><img src=\"{}\"></div>",
            url.replace('"', "%22")
        ),
    }
}

/// Build a banner creative, appending an impression pixel when the partner
/// supplied a tracker URL.
///
/// Returns `None` when there is no markup, so the bid can be dropped.
#[must_use]
pub fn banner_creative(markup: &str, pixel: Option<(&str, PixelStyle)>) -> Option<Creative> {
    if markup.trim().is_empty() {
        return None;
    }

    let mut ad = markup.to_string();
    if let Some((url, style)) = pixel.filter(|(url, _)| !url.is_empty()) {
        ad.push_str(&impression_pixel(url, style));
    }
    Some(Creative::Banner { ad })
}
