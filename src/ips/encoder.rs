// IPS encoder: diff detection, hunk merging, and serialization.
//
// Three passes over the input pair:
//   1. Scan source and target in parallel, collecting changed-byte ranges.
//      A range tracks whether it is still a uniform run (`can_rle`); a run
//      longer than one byte that sees a differing byte is closed intact and
//      the differing byte opens a fresh range.
//   2. Greedy merge: a range is folded into its zero-gap predecessor when
//      the merged encoding is no larger than the two separate encodings.
//      Merged ranges carry mixed content and lose RLE eligibility.
//   3. Serialize each range as a regular or RLE hunk, whichever is smaller,
//      between the header and trailer tokens.

use thiserror::Error;

use super::diag::{DiagnosticSink, LogSink};
use super::format::{HEADER, MAX_OFFSET, TRAILER, format_hex};

/// 3-byte offset + 2-byte length, before the payload.
const REGULAR_OVERHEAD: usize = 5;

/// 3-byte offset + 2-byte zero sentinel + 2-byte run length + 1 fill byte.
const RLE_SIZE: usize = 7;

/// Largest payload the 16-bit length field can carry.
const MAX_HUNK_LEN: usize = u16::MAX as usize;

// ---------------------------------------------------------------------------
// Encoder error and options
// ---------------------------------------------------------------------------

/// Error creating an IPS patch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CreateError {
    /// The format cannot express truncation or extension, so source and
    /// target must be the same size.
    #[error("source size {source_len} does not match target size {target_len}")]
    SizeMismatch {
        source_len: usize,
        target_len: usize,
    },
}

/// Encoder configuration.
#[derive(Debug, Clone, Copy)]
pub struct CreateOptions {
    /// Whether RLE hunks may be emitted at all.
    pub use_rle: bool,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self { use_rle: true }
    }
}

// ---------------------------------------------------------------------------
// Changed-byte ranges
// ---------------------------------------------------------------------------

/// A contiguous span of source/target differences, pre-serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ByteRange {
    offset: usize,
    bytes: Vec<u8>,
    /// True while every byte seen so far equals the first.
    can_rle: bool,
}

impl ByteRange {
    fn at(offset: usize) -> Self {
        Self {
            offset,
            bytes: Vec::new(),
            can_rle: true,
        }
    }

    /// One past the last changed offset.
    fn end(&self) -> usize {
        self.offset + self.bytes.len()
    }

    fn regular_size(&self) -> usize {
        REGULAR_OVERHEAD + self.bytes.len()
    }

    /// A uniform run encodes as RLE only when that is no larger than the
    /// regular form.
    fn rle_eligible(&self) -> bool {
        self.can_rle && RLE_SIZE <= self.regular_size()
    }

    /// Encoded size assuming RLE is taken whenever eligible. The merge pass
    /// sizes ranges this way regardless of the `use_rle` option, matching
    /// the byte-for-byte output of the reference fixtures.
    fn encoded_size(&self) -> usize {
        if self.rle_eligible() {
            RLE_SIZE
        } else {
            self.regular_size()
        }
    }
}

/// Pass 1: collect changed-byte ranges from a parallel scan.
fn scan_ranges(source: &[u8], target: &[u8]) -> Vec<ByteRange> {
    let mut ranges = Vec::new();
    let mut current: Option<ByteRange> = None;

    for (i, (&s, &t)) in source.iter().zip(target.iter()).enumerate() {
        if s == t {
            // Range ends are exclusive of matching bytes.
            if let Some(done) = current.take() {
                ranges.push(done);
            }
            continue;
        }

        let mut range = match current.take() {
            None => ByteRange::at(i),
            Some(mut range) => {
                if range.can_rle && range.bytes.first() != Some(&t) {
                    if range.bytes.len() > 1 {
                        // A broken uniform run is kept as its own range so
                        // it stays RLE-encodable; the differing byte starts
                        // a fresh candidate.
                        ranges.push(range);
                        ByteRange::at(i)
                    } else {
                        range.can_rle = false;
                        range
                    }
                } else {
                    range
                }
            }
        };

        range.bytes.push(t);
        if range.bytes.len() == MAX_HUNK_LEN {
            // The length field is 16-bit; close here and let the next
            // differing byte open a new range.
            ranges.push(range);
        } else {
            current = Some(range);
        }
    }

    if let Some(done) = current {
        ranges.push(done);
    }
    ranges
}

/// Pass 2: fold zero-gap neighbors together when the merged encoding is no
/// larger than the sum of the parts.
fn merge_ranges(ranges: Vec<ByteRange>) -> Vec<ByteRange> {
    let mut merged: Vec<ByteRange> = Vec::with_capacity(ranges.len());

    for range in ranges {
        let mergeable = match merged.last() {
            Some(prev) if prev.end() == range.offset => {
                let combined_len = prev.bytes.len() + range.bytes.len();
                combined_len <= MAX_HUNK_LEN
                    && REGULAR_OVERHEAD + combined_len
                        <= prev.encoded_size() + range.encoded_size()
            }
            _ => false,
        };

        if mergeable {
            if let Some(mut prev) = merged.pop() {
                prev.can_rle = false;
                prev.bytes.extend_from_slice(&range.bytes);
                merged.push(prev);
                continue;
            }
        }
        merged.push(range);
    }
    merged
}

/// Pass 3: serialize one range as a regular or RLE hunk.
fn emit_range(
    patch: &mut Vec<u8>,
    range: &ByteRange,
    use_rle: bool,
    sink: &mut dyn DiagnosticSink,
) {
    // Offsets beyond the 3-byte field wrap; the over-ceiling warning has
    // already been issued by then.
    let offset = (range.offset & MAX_OFFSET as usize) as u32;
    patch.extend_from_slice(&offset.to_be_bytes()[1..]);

    if use_rle && range.rle_eligible() {
        let fill = range.bytes.first().copied().unwrap_or(0);
        sink.emit(&format!(
            "Write {} for {} bytes at offset {}",
            format_hex(u32::from(fill), 1),
            range.bytes.len(),
            format_hex(offset, 3)
        ));
        patch.extend_from_slice(&[0x00, 0x00]);
        patch.extend_from_slice(&(range.bytes.len() as u16).to_be_bytes());
        patch.push(fill);
    } else {
        sink.emit(&format!(
            "Write {} bytes at offset {}",
            range.bytes.len(),
            format_hex(offset, 3)
        ));
        patch.extend_from_slice(&(range.bytes.len() as u16).to_be_bytes());
        patch.extend_from_slice(&range.bytes);
    }
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// Create an IPS patch transforming `source` into `target`.
///
/// Diagnostics go to the `log` facade at debug level; use [`create_with`]
/// to supply a sink or disable RLE hunks.
pub fn create(source: &[u8], target: &[u8]) -> Result<Vec<u8>, CreateError> {
    create_with(source, target, CreateOptions::default(), &mut LogSink)
}

/// Create an IPS patch, emitting one diagnostic line per hunk.
///
/// Source and target must be the same length. A length beyond the 3-byte
/// address ceiling produces a warning through the sink but is not fatal:
/// hunks below the ceiling still come out fine.
pub fn create_with(
    source: &[u8],
    target: &[u8],
    options: CreateOptions,
    sink: &mut dyn DiagnosticSink,
) -> Result<Vec<u8>, CreateError> {
    if source.len() != target.len() {
        return Err(CreateError::SizeMismatch {
            source_len: source.len(),
            target_len: target.len(),
        });
    }

    if target.len() > MAX_OFFSET as usize {
        sink.emit(&format!("Warning: file exceeds {MAX_OFFSET} byte limit"));
    }

    let ranges = merge_ranges(scan_ranges(source, target));

    let body: usize = ranges.iter().map(ByteRange::encoded_size).sum();
    let mut patch = Vec::with_capacity(HEADER.len() + body + TRAILER.len());
    patch.extend_from_slice(&HEADER);
    for range in &ranges {
        emit_range(&mut patch, range, options.use_rle, sink);
    }
    patch.extend_from_slice(&TRAILER);
    Ok(patch)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
