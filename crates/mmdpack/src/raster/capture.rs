use super::markup::declared_size;
use super::{Frame, draw_tree, with_usvg_options};
use mmdpack_core::DiagramRecord;

/// A rendered diagram as the capture backend sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementRef<'a> {
    pub target_id: &'a str,
    pub markup: &'a str,
}

impl<'a> ElementRef<'a> {
    /// `None` unless the record rendered successfully.
    pub fn from_record(record: &'a DiagramRecord) -> Option<Self> {
        Some(Self {
            target_id: record.render_target_id()?,
            markup: record.rendered_markup()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureOptions {
    pub scale: f32,
    /// Straight RGBA.
    pub background: [u8; 4],
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("element {0} is not available for capture")]
    ElementNotFound(String),
    #[error("element capture failed: {0}")]
    Failed(String),
}

/// The screenshot boundary: a rendered element in, an encoded PNG out.
pub trait ElementCapture {
    fn capture(
        &self,
        element: ElementRef<'_>,
        options: &CaptureOptions,
    ) -> Result<Vec<u8>, CaptureError>;
}

/// Captures an element by drawing its SVG directly with `resvg`.
///
/// The surface takes the size the root `<svg>` declares (`width`/`height`, then `viewBox`, as
/// resolved by usvg). A root that declares no size at all is cropped to its drawn content.
#[derive(Debug, Clone, Copy, Default)]
pub struct SvgElementCapture;

impl ElementCapture for SvgElementCapture {
    fn capture(
        &self,
        element: ElementRef<'_>,
        options: &CaptureOptions,
    ) -> Result<Vec<u8>, CaptureError> {
        let failed = |err: &dyn std::fmt::Display| {
            CaptureError::Failed(format!("{}: {err}", element.target_id))
        };

        let declared = {
            let doc = roxmltree::Document::parse(element.markup).map_err(|err| failed(&err))?;
            let root = doc.root_element();
            if root.tag_name().name() != "svg" {
                return Err(CaptureError::ElementNotFound(element.target_id.to_string()));
            }
            declared_size(root)
        };

        let tree = with_usvg_options(|opt| usvg::Tree::from_str(element.markup, opt))
            .map_err(|err| failed(&err))?;
        let frame = match declared {
            (None, None) => content_frame(&tree),
            _ => None,
        }
        .unwrap_or_else(|| Frame::sized(tree.size().width(), tree.size().height()));

        let [r, g, b, a] = options.background;
        let background = tiny_skia::Color::from_rgba8(r, g, b, a);
        draw_tree(&tree, frame, options.scale, background)
            .map(|bitmap| bitmap.png)
            .map_err(|err| failed(&err))
    }
}

/// Stroke bounds of everything drawn, or `None` when there is nothing visible to frame.
fn content_frame(tree: &usvg::Tree) -> Option<Frame> {
    let bbox = tree.root().abs_stroke_bounding_box();
    let drawable = |len: f32| len.is_finite() && len > 0.0;
    (drawable(bbox.width()) && drawable(bbox.height())).then(|| Frame {
        x: bbox.x(),
        y: bbox.y(),
        width: bbox.width().max(1.0),
        height: bbox.height().max(1.0),
    })
}
