use super::{RasterError, Result, with_usvg_options};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use std::fmt;

const SVG_MIME: &str = "image/svg+xml";

// `encodeURIComponent` leaves these unescaped; quotes are escaped on purpose so the URI can sit
// inside any attribute.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataUriEncoding {
    Base64,
    Percent,
}

impl fmt::Display for DataUriEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Base64 => "base64",
            Self::Percent => "percent-encoded",
        })
    }
}

pub fn encode_data_uri(svg: &str, encoding: DataUriEncoding) -> String {
    match encoding {
        DataUriEncoding::Base64 => format!("data:{SVG_MIME};base64,{}", STANDARD.encode(svg)),
        DataUriEncoding::Percent => {
            format!("data:{SVG_MIME},{}", utf8_percent_encode(svg, URI_COMPONENT))
        }
    }
}

/// Splits an SVG data URI and decodes its payload to raw bytes.
pub fn decode_data_uri(uri: &str) -> Result<(DataUriEncoding, Vec<u8>)> {
    let malformed = |encoding, message: &str| RasterError::Decode {
        encoding,
        message: message.to_string(),
    };

    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| malformed(DataUriEncoding::Percent, "not a data URI"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| malformed(DataUriEncoding::Percent, "missing payload separator"))?;

    let encoding = if header.ends_with(";base64") {
        DataUriEncoding::Base64
    } else {
        DataUriEncoding::Percent
    };
    if !header.starts_with(SVG_MIME) {
        return Err(malformed(encoding, "media type is not image/svg+xml"));
    }

    let bytes = match encoding {
        DataUriEncoding::Base64 => STANDARD
            .decode(payload)
            .map_err(|err| malformed(encoding, &err.to_string()))?,
        DataUriEncoding::Percent => percent_decode_str(payload).collect(),
    };
    Ok((encoding, bytes))
}

/// Loads an SVG data URI into a drawable tree (the "offscreen image" step).
pub trait ImageDecoder {
    fn decode(&self, data_uri: &str) -> Result<usvg::Tree>;
}

/// Decodes data URIs with `usvg` against the system font database.
#[derive(Debug, Clone, Copy, Default)]
pub struct SvgImageDecoder;

impl ImageDecoder for SvgImageDecoder {
    fn decode(&self, data_uri: &str) -> Result<usvg::Tree> {
        let (encoding, bytes) = decode_data_uri(data_uri)?;
        with_usvg_options(|opt| usvg::Tree::from_data(&bytes, opt)).map_err(|err| {
            RasterError::Decode {
                encoding,
                message: err.to_string(),
            }
        })
    }
}
