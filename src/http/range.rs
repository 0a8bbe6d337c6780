//! HTTP Range request parsing module
//!
//! Range header parsing for resumable downloads, following RFC 7233 for the
//! `bytes` unit. Every comma-separated unit is validated but only the first
//! satisfiable one is served; `multipart/byteranges` is not produced.

use crate::error::{TransferError, TransferResult};

/// A contiguous `[start, start + length)` window of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte offset
    pub start: u64,
    /// Number of bytes in the window
    pub length: u64,
}

impl ByteRange {
    pub const fn new(start: u64, length: u64) -> Self {
        Self { start, length }
    }

    /// Offset of the last byte, as written in `Content-Range`
    ///
    /// Only meaningful for non-empty ranges.
    pub const fn last(&self) -> u64 {
        self.start + self.length.saturating_sub(1)
    }

    /// `Content-Range` value for a partial response against `size`
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{size}", self.start, self.last())
    }
}

/// Parse an HTTP Range header against a resource of `size` bytes
///
/// Supported unit formats:
/// - `bytes=start-end` - Specific range, `end` clamped to the last byte
/// - `bytes=start-` - From start to end of file
/// - `bytes=-suffix` - Last suffix bytes
///
/// # Returns
/// * `Ok(None)` - Empty header, serve the full content
/// * `Ok(Some(range))` - The first range parsed from the header
/// * `Err(MalformedRange)` - Header syntax is invalid
/// * `Err(RangeNotSatisfiable)` - No unit overlaps the resource
///
/// # Examples
/// ```
/// use rust_fileserver::http::range::{parse_range_header, ByteRange};
///
/// let range = parse_range_header("bytes=-100", 1000).unwrap();
/// assert_eq!(range, Some(ByteRange::new(900, 100)));
///
/// assert_eq!(parse_range_header("", 1000).unwrap(), None);
/// ```
pub fn parse_range_header(header: &str, size: u64) -> TransferResult<Option<ByteRange>> {
    if header.is_empty() {
        return Ok(None);
    }

    let Some(units) = header.strip_prefix("bytes=") else {
        return Err(TransferError::MalformedRange);
    };

    let mut first = None;
    let mut no_overlap = false;

    for unit in units.split(',').map(str::trim).filter(|u| !u.is_empty()) {
        match parse_unit(unit, size)? {
            Some(range) => {
                first.get_or_insert(range);
            }
            None => no_overlap = true,
        }
    }

    if first.is_none() && no_overlap {
        return Err(TransferError::RangeNotSatisfiable);
    }

    Ok(first)
}

/// Parse one comma-separated unit, `None` when it starts past the end
fn parse_unit(unit: &str, size: u64) -> TransferResult<Option<ByteRange>> {
    let (start_str, end_str) = unit.split_once('-').ok_or(TransferError::MalformedRange)?;
    let (start_str, end_str) = (start_str.trim(), end_str.trim());

    // Suffix range: "-500" means last 500 bytes
    if start_str.is_empty() {
        return parse_suffix_range(end_str, size).map(Some);
    }

    parse_standard_range(start_str, end_str, size)
}

/// Parse suffix range (e.g., "-500")
fn parse_suffix_range(suffix_str: &str, size: u64) -> TransferResult<ByteRange> {
    // Suffix larger than file is valid, the whole file is used
    let length = parse_offset(suffix_str)?.min(size);
    Ok(ByteRange::new(size - length, length))
}

/// Parse standard range (e.g., "0-99" or "100-")
fn parse_standard_range(
    start_str: &str,
    end_str: &str,
    size: u64,
) -> TransferResult<Option<ByteRange>> {
    let start = parse_offset(start_str)?;

    // Start at or beyond the end does not overlap
    if start >= size {
        return Ok(None);
    }

    if end_str.is_empty() {
        return Ok(Some(ByteRange::new(start, size - start)));
    }

    let end = parse_offset(end_str)?;
    if start > end {
        return Err(TransferError::MalformedRange);
    }

    let end = end.min(size - 1);
    Ok(Some(ByteRange::new(start, end - start + 1)))
}

fn parse_offset(s: &str) -> TransferResult<u64> {
    s.parse::<u64>().map_err(|_| TransferError::MalformedRange)
}
