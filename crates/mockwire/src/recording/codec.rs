//! Line-fragment codec for captured responses.
//!
//! A raw response is split on `\r\n`. Text fragments are kept as-is; gzip
//! members are stored decompressed and flagged so replay can recompress them.

use crate::error::{MockError, Result};
use flate2::bufread::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

pub const LINE_DELIMITER: &[u8] = b"\r\n";

/// A response split into storable text fragments
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodedResponse {
    pub lines: Vec<String>,
    /// 1-based indices into `lines` of fragments that were gzip members
    pub gzip: Vec<usize>,
}

/// Gzip-compress with the settings replay uses.
pub fn gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Decompress exactly one gzip member spanning all of `data`.
pub fn gunzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    if !decoder.into_inner().is_empty() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "trailing bytes after gzip member",
        ));
    }
    Ok(out)
}

/// Byte ranges of the fragments between `\r\n` delimiters. Never empty.
fn fragment_ranges(raw: &[u8]) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i + 1 < raw.len() {
        if raw[i..].starts_with(LINE_DELIMITER) {
            ranges.push((start, i));
            i += LINE_DELIMITER.len();
            start = i;
        } else {
            i += 1;
        }
    }
    ranges.push((start, raw.len()));
    ranges
}

/// Inflate the shortest run of fragments starting at `ranges[0]` that forms one
/// gzip member. Returns the text and the number of fragments consumed.
fn inflate_member(
    raw: &[u8],
    ranges: &[(usize, usize)],
    index: usize,
) -> Result<(String, usize)> {
    let start = ranges[0].0;
    for (consumed, &(_, end)) in ranges.iter().enumerate() {
        if let Ok(inflated) = gunzip(&raw[start..end]) {
            let text = String::from_utf8(inflated).map_err(|_| MockError::CorruptFragment {
                index,
                reason: "decompressed fragment is not valid UTF-8".to_string(),
            })?;
            return Ok((text, consumed + 1));
        }
    }
    Err(MockError::CorruptFragment {
        index,
        reason: "fragment is neither UTF-8 text nor a gzip member".to_string(),
    })
}

/// Split a raw response into text fragments, inflating gzip members.
pub fn decode_response(raw: &[u8]) -> Result<DecodedResponse> {
    let ranges = fragment_ranges(raw);
    let mut decoded = DecodedResponse::default();

    let mut i = 0;
    while i < ranges.len() {
        let (start, end) = ranges[i];
        let index = decoded.lines.len() + 1;
        match std::str::from_utf8(&raw[start..end]) {
            Ok(text) => {
                decoded.lines.push(text.to_string());
                i += 1;
            }
            Err(_) => {
                let (text, consumed) = inflate_member(raw, &ranges[i..], index)?;
                decoded.lines.push(text);
                decoded.gzip.push(index);
                i += consumed;
            }
        }
    }

    Ok(decoded)
}

/// Rebuild raw response bytes, recompressing flagged fragments.
///
/// Fails when a gzip index does not point at a fragment.
pub fn encode_response(
    lines: &[String],
    gzip_indices: &[usize],
) -> std::result::Result<Vec<u8>, String> {
    if let Some(bad) = gzip_indices
        .iter()
        .find(|&&idx| idx == 0 || idx > lines.len())
    {
        return Err(format!(
            "gzip index {bad} out of range for {} response fragments",
            lines.len()
        ));
    }

    let mut out = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        if idx > 0 {
            out.extend_from_slice(LINE_DELIMITER);
        }
        if gzip_indices.contains(&(idx + 1)) {
            let compressed = gzip(line.as_bytes())
                .map_err(|e| format!("failed to recompress fragment {}: {e}", idx + 1))?;
            out.extend_from_slice(&compressed);
        } else {
            out.extend_from_slice(line.as_bytes());
        }
    }
    Ok(out)
}
