//! SVG → PNG rasterization.
//!
//! Two strategies are available:
//! - element capture: hand the rendered element to an [`ElementCapture`] backend
//! - vector-to-raster: normalise the markup, load it through a data URI and draw it onto a white
//!   surface at `scale`. The base64 data URI is tried first; if it can't be decoded or drawn the
//!   same markup is retried exactly once as a percent-encoded data URI.
//!
//! The result is a [`RasterOutcome`], which records whether the fallback was needed.

mod capture;
mod data_uri;
mod markup;

pub use capture::{CaptureError, CaptureOptions, ElementCapture, ElementRef, SvgElementCapture};
pub use data_uri::{DataUriEncoding, ImageDecoder, SvgImageDecoder, decode_data_uri, encode_data_uri};
pub use markup::{PreparedMarkup, prepare_markup};

use mmdpack_core::{ConverterConfig, DiagramRecord, RasterStrategy};
use std::sync::{Arc, LazyLock};

static SYSTEM_FONTS: LazyLock<Arc<usvg::fontdb::Database>> = LazyLock::new(|| {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    tracing::debug!(faces = db.len(), "loaded system fonts");
    Arc::new(db)
});

/// Runs `f` with usvg options that share one lazily loaded system font database.
pub(crate) fn with_usvg_options<T>(f: impl FnOnce(&usvg::Options) -> T) -> T {
    let mut opt = usvg::Options::default();
    opt.fontdb = Arc::clone(&SYSTEM_FONTS);
    // Only used where the markup names no family at all.
    opt.font_family = "Arial".to_string();
    f(&opt)
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RasterError {
    #[error("invalid SVG markup: {0}")]
    InvalidMarkup(String),
    #[error("diagram has no rendered markup")]
    MissingMarkup,
    #[error("failed to decode {encoding} data URI: {message}")]
    Decode {
        encoding: DataUriEncoding,
        message: String,
    },
    #[error("failed to allocate {width}x{height} raster surface")]
    SurfaceAlloc { width: u32, height: u32 },
    #[error("failed to encode PNG")]
    PngEncode,
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("rasterization failed ({primary}); percent-encoded retry failed too ({fallback})")]
    Exhausted {
        primary: Box<RasterError>,
        fallback: Box<RasterError>,
    },
}

pub type Result<T> = std::result::Result<T, RasterError>;

#[derive(Debug, Clone, PartialEq)]
pub struct RasterOptions {
    pub scale: f32,
    /// Straight RGBA; expected to be opaque.
    pub background: [u8; 4],
    pub font_family: String,
    pub fallback_width: f32,
    pub fallback_height: f32,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self::from_config(&ConverterConfig::default())
    }
}

impl RasterOptions {
    pub fn from_config(config: &ConverterConfig) -> Self {
        Self {
            scale: config.scale,
            background: config.background_rgba(),
            font_family: config.font_family.clone(),
            fallback_width: config.fallback_width,
            fallback_height: config.fallback_height,
        }
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub(crate) fn background_color(&self) -> tiny_skia::Color {
        let [r, g, b, a] = self.background;
        tiny_skia::Color::from_rgba8(r, g, b, a)
    }
}

/// An encoded PNG plus its pixel size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum RasterOutcome {
    /// The first attempt succeeded.
    Primary(Bitmap),
    /// The base64 attempt failed and the percent-encoded retry succeeded.
    FallbackUsed {
        bitmap: Bitmap,
        primary_error: RasterError,
    },
    Failed(RasterError),
}

impl RasterOutcome {
    pub fn bitmap(&self) -> Option<&Bitmap> {
        match self {
            Self::Primary(bitmap) | Self::FallbackUsed { bitmap, .. } => Some(bitmap),
            Self::Failed(_) => None,
        }
    }

    pub fn used_fallback(&self) -> bool {
        matches!(self, Self::FallbackUsed { .. })
    }

    pub fn into_result(self) -> Result<Bitmap> {
        match self {
            Self::Primary(bitmap) | Self::FallbackUsed { bitmap, .. } => Ok(bitmap),
            Self::Failed(err) => Err(err),
        }
    }
}

/// Converts rendered diagrams into PNG bitmaps.
pub struct Rasterizer {
    options: RasterOptions,
    strategy: RasterStrategy,
    decoder: Box<dyn ImageDecoder + Send + Sync>,
    capture: Box<dyn ElementCapture + Send + Sync>,
}

impl std::fmt::Debug for Rasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rasterizer")
            .field("options", &self.options)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl Default for Rasterizer {
    fn default() -> Self {
        Self::new(RasterOptions::default())
    }
}

impl Rasterizer {
    pub fn new(options: RasterOptions) -> Self {
        Self {
            options,
            strategy: RasterStrategy::Vector,
            decoder: Box::new(SvgImageDecoder),
            capture: Box::new(SvgElementCapture),
        }
    }

    pub fn from_config(config: &ConverterConfig) -> Self {
        Self::new(RasterOptions::from_config(config)).with_strategy(config.strategy)
    }

    pub fn with_strategy(mut self, strategy: RasterStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Replaces the data-URI decoder used by the vector strategy.
    pub fn with_decoder(mut self, decoder: impl ImageDecoder + Send + Sync + 'static) -> Self {
        self.decoder = Box::new(decoder);
        self
    }

    /// Replaces the element-capture backend used by the capture strategy.
    pub fn with_capture(mut self, capture: impl ElementCapture + Send + Sync + 'static) -> Self {
        self.capture = Box::new(capture);
        self
    }

    pub fn options(&self) -> &RasterOptions {
        &self.options
    }

    pub fn strategy(&self) -> RasterStrategy {
        self.strategy
    }

    /// Rasterizes a rendered record with the configured strategy.
    pub fn rasterize_record(&self, record: &DiagramRecord) -> RasterOutcome {
        match self.strategy {
            RasterStrategy::Capture => match ElementRef::from_record(record) {
                Some(element) => self.capture_element(element),
                None => RasterOutcome::Failed(RasterError::MissingMarkup),
            },
            RasterStrategy::Vector => match record.rendered_markup() {
                Some(markup) => self.rasterize_markup(markup),
                None => RasterOutcome::Failed(RasterError::MissingMarkup),
            },
        }
    }

    /// Element-capture strategy.
    pub fn capture_element(&self, element: ElementRef<'_>) -> RasterOutcome {
        let options = CaptureOptions {
            scale: self.options.scale,
            background: self.options.background,
        };
        let png = match self.capture.capture(element, &options) {
            Ok(png) => png,
            Err(err) => {
                tracing::warn!(target_id = element.target_id, "element capture failed: {err}");
                return RasterOutcome::Failed(err.into());
            }
        };
        let Some((width, height)) = png_dimensions(&png) else {
            return RasterOutcome::Failed(
                CaptureError::Failed("capture backend returned a non-PNG buffer".to_string())
                    .into(),
            );
        };
        RasterOutcome::Primary(Bitmap { width, height, png })
    }

    /// Vector-to-raster strategy with the percent-encoding fallback.
    pub fn rasterize_markup(&self, markup: &str) -> RasterOutcome {
        let prepared = match prepare_markup(markup, &self.options) {
            Ok(prepared) => prepared,
            Err(err) => return RasterOutcome::Failed(err),
        };

        let primary_error = match self.draw_via(&prepared, DataUriEncoding::Base64) {
            Ok(bitmap) => return RasterOutcome::Primary(bitmap),
            Err(err) => err,
        };
        tracing::warn!("base64 rasterization failed, retrying percent-encoded: {primary_error}");

        match self.draw_via(&prepared, DataUriEncoding::Percent) {
            Ok(bitmap) => RasterOutcome::FallbackUsed {
                bitmap,
                primary_error,
            },
            Err(fallback) => RasterOutcome::Failed(RasterError::Exhausted {
                primary: Box::new(primary_error),
                fallback: Box::new(fallback),
            }),
        }
    }

    fn draw_via(&self, prepared: &PreparedMarkup, encoding: DataUriEncoding) -> Result<Bitmap> {
        let uri = encode_data_uri(&prepared.svg, encoding);
        let tree = self.decoder.decode(&uri)?;
        let frame = Frame::sized(prepared.width, prepared.height);
        draw_tree(&tree, frame, self.options.scale, self.options.background_color())
    }
}

/// The user-space rectangle that ends up on the surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Frame {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Frame {
    pub(crate) fn sized(width: f32, height: f32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
        }
    }
}

/// Draws `frame` of `tree` onto a `background`-filled surface of `frame * scale` pixels.
pub(crate) fn draw_tree(
    tree: &usvg::Tree,
    frame: Frame,
    scale: f32,
    background: tiny_skia::Color,
) -> Result<Bitmap> {
    let width_px = (frame.width * scale).round().max(1.0) as u32;
    let height_px = (frame.height * scale).round().max(1.0) as u32;

    let mut pixmap = tiny_skia::Pixmap::new(width_px, height_px).ok_or(
        RasterError::SurfaceAlloc {
            width: width_px,
            height: height_px,
        },
    )?;
    pixmap.fill(background);

    let transform = tiny_skia::Transform::from_scale(scale, scale).pre_translate(-frame.x, -frame.y);
    resvg::render(tree, transform, &mut pixmap.as_mut());

    let png = pixmap.encode_png().map_err(|_| RasterError::PngEncode)?;
    tracing::debug!(width = width_px, height = height_px, bytes = png.len(), "rasterized");
    Ok(Bitmap {
        width: width_px,
        height: height_px,
        png,
    })
}

/// Pixel size of an encoded PNG; `None` if the bytes don't decode.
pub fn png_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    let pixmap = tiny_skia::Pixmap::decode_png(bytes).ok()?;
    Some((pixmap.width(), pixmap.height()))
}
