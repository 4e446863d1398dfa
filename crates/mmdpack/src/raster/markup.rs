use super::{RasterError, RasterOptions, Result};
use regex::Regex;
use std::fmt::Write as _;
use std::sync::LazyLock;

const SVG_NS: &str = "http://www.w3.org/2000/svg";

static SIZE_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\s(?:width|height)\s*=\s*(?:"[^"]*"|'[^']*')"#).unwrap());

/// SVG markup normalised for rasterization, with the intrinsic size it now declares.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedMarkup {
    pub svg: String,
    pub width: f32,
    pub height: f32,
}

/// Normalises rendered markup so any SVG loader draws it the same way:
///
/// - intrinsic size comes from `width`/`height`, then the `viewBox`, then the configured
///   fallback (800×600 by default); each axis is resolved independently
/// - explicit `width`/`height` attributes are written back onto the root
/// - a default SVG namespace is declared when missing
/// - a `<style>` forcing the configured font stack is inserted as the root's first child
pub fn prepare_markup(markup: &str, options: &RasterOptions) -> Result<PreparedMarkup> {
    let doc = roxmltree::Document::parse(markup)
        .map_err(|err| RasterError::InvalidMarkup(err.to_string()))?;
    let root = doc.root_element();
    if root.tag_name().name() != "svg" {
        return Err(RasterError::InvalidMarkup(format!(
            "root element is <{}>, expected <svg>",
            root.tag_name().name()
        )));
    }

    let (width, height) = declared_size(root);
    let width = width.unwrap_or(options.fallback_width);
    let height = height.unwrap_or(options.fallback_height);
    let needs_xmlns = root.tag_name().namespace().is_none();

    let start = root.range().start;
    let tag_end = start_tag_end(markup, start)
        .ok_or_else(|| RasterError::InvalidMarkup("unterminated root start tag".to_string()))?;
    let self_closing = markup[..tag_end].ends_with('/');
    let attrs_end = if self_closing { tag_end - 1 } else { tag_end };
    let start_tag = SIZE_ATTR_RE.replace_all(&markup[start..attrs_end], "");

    let mut svg = String::with_capacity(markup.len() + options.font_family.len() + 128);
    svg.push_str(&markup[..start]);
    svg.push_str(start_tag.trim_end());
    let _ = write!(svg, r#" width="{width}" height="{height}""#);
    if needs_xmlns {
        let _ = write!(svg, r#" xmlns="{SVG_NS}""#);
    }
    svg.push('>');
    let _ = write!(
        svg,
        "<style>* {{ font-family: {} !important; }}</style>",
        escape_xml_text(&options.font_family)
    );
    if self_closing {
        svg.push_str("</svg>");
    }
    svg.push_str(&markup[tag_end + 1..]);

    Ok(PreparedMarkup { svg, width, height })
}

/// Size the root `<svg>` declares, per axis: `width`/`height` first, then the `viewBox`.
pub(crate) fn declared_size(root: roxmltree::Node<'_, '_>) -> (Option<f32>, Option<f32>) {
    let view_box = root.attribute("viewBox").and_then(parse_view_box);
    let width = root
        .attribute("width")
        .and_then(parse_length)
        .or(view_box.map(|(w, _)| w));
    let height = root
        .attribute("height")
        .and_then(parse_length)
        .or(view_box.map(|(_, h)| h));
    (width, height)
}

/// Byte index of the `>` closing the start tag that begins at `start`, skipping quoted values.
fn start_tag_end(text: &str, start: usize) -> Option<usize> {
    let mut quote = None;
    for (i, b) in text.as_bytes().iter().enumerate().skip(start) {
        match (quote, *b) {
            (None, b'"' | b'\'') => quote = Some(*b),
            (Some(q), b) if b == q => quote = None,
            (None, b'>') => return Some(i),
            _ => {}
        }
    }
    None
}

/// Absolute lengths only: a bare number or `px`. Percentages and font-relative units fall through
/// to the viewBox.
fn parse_length(raw: &str) -> Option<f32> {
    let raw = raw.trim();
    let number = raw.strip_suffix("px").unwrap_or(raw).trim_end();
    let value = number.parse::<f32>().ok()?;
    (value.is_finite() && value > 0.0).then_some(value)
}

fn parse_view_box(raw: &str) -> Option<(f32, f32)> {
    let parts: Vec<&str> = raw
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|part| !part.is_empty())
        .collect();
    let [_, _, w, h] = parts.as_slice() else {
        return None;
    };
    let width = w.parse::<f32>().ok()?;
    let height = h.parse::<f32>().ok()?;
    (width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0)
        .then_some((width, height))
}

fn escape_xml_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
