//! Public types and constants for the summary renderer.

use std::path::Path;

/// Output encoding of the summary image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    #[default]
    Png,
    Svg,
}

impl ImageFormat {
    /// `.svg` → SVG, anything else → PNG.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("svg") => ImageFormat::Svg,
            _ => ImageFormat::Png,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Svg => "image/svg+xml",
        }
    }
}

/// Knobs for [`super::render`].
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub width: u32,
    pub height: u32,
    /// Number of countries shown as bars.
    pub top_n: usize,
    pub format: ImageFormat,
    /// Locale tag for number labels, e.g. `"en"` or `"de"`.
    pub locale: String,
    pub title: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 600,
            top_n: DEFAULT_TOP_N,
            format: ImageFormat::Png,
            locale: "en".into(),
            title: "Top countries by estimated GDP".into(),
        }
    }
}

/// Bars drawn when the caller does not say otherwise.
pub const DEFAULT_TOP_N: usize = 10;
