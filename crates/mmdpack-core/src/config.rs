use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Font stack injected into SVG markup before rasterization so labels don't depend on whatever
/// the engine picked.
pub const DEFAULT_FONT_FAMILY: &str = r#"-apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, "Helvetica Neue", Arial, "Noto Sans", "PingFang SC", "Microsoft YaHei", sans-serif"#;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RasterStrategy {
    /// Re-encode the SVG markup and rasterize it from a data URI.
    #[default]
    Vector,
    /// Hand the rendered element to an element-capture backend.
    Capture,
}

impl std::str::FromStr for RasterStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vector" => Ok(Self::Vector),
            "capture" => Ok(Self::Capture),
            other => Err(Error::Config {
                message: format!("unknown raster strategy {other:?} (expected vector|capture)"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConverterConfig {
    pub scale: f32,
    pub background: String,
    pub font_family: String,
    pub fallback_width: f32,
    pub fallback_height: f32,
    pub archive_prefix: String,
    pub strategy: RasterStrategy,
    pub fence_language: String,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            scale: 3.0,
            background: "#ffffff".to_string(),
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            fallback_width: 800.0,
            fallback_height: 600.0,
            archive_prefix: "mermaid_charts".to_string(),
            strategy: RasterStrategy::Vector,
            fence_language: "mermaid".to_string(),
        }
    }
}

impl ConverterConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(config_error(format!("scale must be > 0, got {}", self.scale)));
        }
        for (name, value) in [
            ("fallbackWidth", self.fallback_width),
            ("fallbackHeight", self.fallback_height),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(config_error(format!("{name} must be > 0, got {value}")));
            }
        }
        if parse_opaque_color(&self.background).is_none() {
            return Err(config_error(format!(
                "invalid background color {:?}: expected an opaque color (white, black, #rgb or #rrggbb)",
                self.background
            )));
        }
        if self.archive_prefix.trim().is_empty() {
            return Err(config_error("archivePrefix must not be empty".to_string()));
        }
        if self.fence_language.trim().is_empty() {
            return Err(config_error("fenceLanguage must not be empty".to_string()));
        }
        Ok(())
    }

    /// Background as RGBA bytes (alpha is always 255). Falls back to white if the config was never
    /// validated.
    pub fn background_rgba(&self) -> [u8; 4] {
        let [r, g, b] = parse_opaque_color(&self.background).unwrap_or([255, 255, 255]);
        [r, g, b, 255]
    }
}

fn config_error(message: String) -> Error {
    Error::Config { message }
}

/// Parses the background colors a PNG export can use: `white`, `black`, `#rgb` and `#rrggbb`.
///
/// Anything carrying transparency is rejected; exported bitmaps always have an opaque background.
pub fn parse_opaque_color(text: &str) -> Option<[u8; 3]> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("white") {
        return Some([255, 255, 255]);
    }
    if text.eq_ignore_ascii_case("black") {
        return Some([0, 0, 0]);
    }

    let hex = text.strip_prefix('#')?;
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let value = u32::from_str_radix(hex, 16).ok()?;
    match hex.len() {
        3 => Some([value >> 8, value >> 4, value].map(|nibble| ((nibble & 0xf) * 0x11) as u8)),
        6 => Some([value >> 16, value >> 8, value].map(|byte| (byte & 0xff) as u8)),
        _ => None,
    }
}
