//! Copying a single rendered PNG to a clipboard.

pub const PNG_MIME: &str = "image/png";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClipboardError {
    #[error("Clipboard is not available in this environment")]
    Unsupported,
    #[error("Clipboard access denied: {0}")]
    Denied(String),
    #[error("Clipboard write failed: {0}")]
    Failed(String),
}

/// Somewhere a `(mime, bytes)` pair can be placed.
pub trait ClipboardSink {
    fn write(&mut self, mime: &str, bytes: &[u8]) -> Result<(), ClipboardError>;
}

impl<S: ClipboardSink + ?Sized> ClipboardSink for &mut S {
    fn write(&mut self, mime: &str, bytes: &[u8]) -> Result<(), ClipboardError> {
        (**self).write(mime, bytes)
    }
}

/// The desktop clipboard via `arboard`. PNG payloads are decoded and written as an image.
#[cfg(feature = "clipboard")]
pub struct SystemClipboard {
    inner: arboard::Clipboard,
}

#[cfg(feature = "clipboard")]
impl SystemClipboard {
    pub fn new() -> Result<Self, ClipboardError> {
        let inner = arboard::Clipboard::new().map_err(map_arboard_error)?;
        Ok(Self { inner })
    }
}

#[cfg(feature = "clipboard")]
impl ClipboardSink for SystemClipboard {
    fn write(&mut self, mime: &str, bytes: &[u8]) -> Result<(), ClipboardError> {
        if mime != PNG_MIME {
            return Err(ClipboardError::Failed(format!("unsupported payload type {mime}")));
        }
        let pixmap = tiny_skia::Pixmap::decode_png(bytes)
            .map_err(|err| ClipboardError::Failed(format!("PNG decode: {err}")))?;

        let mut rgba = Vec::with_capacity(pixmap.data().len());
        for px in pixmap.pixels() {
            let c = px.demultiply();
            rgba.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }

        self.inner
            .set_image(arboard::ImageData {
                width: pixmap.width() as usize,
                height: pixmap.height() as usize,
                bytes: std::borrow::Cow::Owned(rgba),
            })
            .map_err(map_arboard_error)
    }
}

#[cfg(feature = "clipboard")]
fn map_arboard_error(err: arboard::Error) -> ClipboardError {
    match err {
        arboard::Error::ClipboardNotSupported => ClipboardError::Unsupported,
        arboard::Error::ClipboardOccupied => ClipboardError::Denied(err.to_string()),
        other => ClipboardError::Failed(other.to_string()),
    }
}
