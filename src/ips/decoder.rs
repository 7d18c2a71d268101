// IPS decoder: patch parsing and application.
//
// A forward-only single pass over the patch buffer. `HunkReader` owns the
// cursor and yields one parsed hunk at a time; `apply_with` replays the
// hunks onto a private copy of the source and returns it. The source
// buffer itself is never mutated.
//
// Trailing bytes after a valid trailer are tolerated and reported through
// the diagnostic sink; every other structural problem is a terminal error.

use thiserror::Error;

use super::diag::{DiagnosticSink, LogSink};
use super::format::{self, HEADER, TRAILER, format_hex};

// ---------------------------------------------------------------------------
// Decoder error
// ---------------------------------------------------------------------------

/// Error applying an IPS patch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApplyError {
    /// The patch buffer's first 5 bytes are not the header token.
    #[error("patch file does not have a PATCH header")]
    MissingHeader,

    /// A read would consume bytes beyond the patch buffer's end.
    #[error("unexpected end of file: tried to read {wanted} bytes at 0x{position:06x}")]
    UnexpectedEof { wanted: usize, position: usize },

    /// A hunk's write range exceeds the source buffer's length.
    #[error("source file is {source_len} bytes: cannot write {length} bytes at offset 0x{offset:06x}")]
    OutOfRangeWrite {
        offset: u32,
        length: usize,
        source_len: usize,
    },
}

// ---------------------------------------------------------------------------
// Hunk model
// ---------------------------------------------------------------------------

/// The write a hunk describes: literal replacement bytes or a repeated fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HunkPayload<'a> {
    /// Regular hunk: the bytes to copy verbatim.
    Literal(&'a [u8]),
    /// RLE hunk: `value` repeated `length` times.
    Run { length: u16, value: u8 },
}

impl HunkPayload<'_> {
    /// Number of target bytes this payload writes.
    pub fn len(&self) -> usize {
        match self {
            Self::Literal(bytes) => bytes.len(),
            Self::Run { length, .. } => usize::from(*length),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One parsed patch record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hunk<'a> {
    /// Target offset, 0..=0xFFFFFF.
    pub offset: u32,
    pub payload: HunkPayload<'a>,
}

impl Hunk<'_> {
    /// One past the last target byte this hunk writes.
    pub fn end(&self) -> usize {
        self.offset as usize + self.payload.len()
    }
}

// ---------------------------------------------------------------------------
// Hunk reader
// ---------------------------------------------------------------------------

/// Cursor over a patch buffer, yielding hunks until the trailer token.
///
/// The trailer is only recognized at a hunk boundary; a patch that runs out
/// of bytes without one fails with [`ApplyError::UnexpectedEof`].
pub struct HunkReader<'a> {
    patch: &'a [u8],
    pos: usize,
    finished: bool,
}

impl<'a> HunkReader<'a> {
    /// Validate the header and position the cursor at the first hunk.
    pub fn new(patch: &'a [u8]) -> Result<Self, ApplyError> {
        let mut reader = Self {
            patch,
            pos: 0,
            finished: false,
        };
        match reader.take(HEADER.len()) {
            Ok(head) if head == HEADER => Ok(reader),
            _ => Err(ApplyError::MissingHeader),
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ApplyError> {
        if self.pos + len > self.patch.len() {
            return Err(ApplyError::UnexpectedEof {
                wanted: len,
                position: self.pos,
            });
        }
        let start = self.pos;
        self.pos += len;
        Ok(&self.patch[start..self.pos])
    }

    /// Parse the next hunk, or `None` once the trailer has been reached.
    pub fn next_hunk(&mut self) -> Result<Option<Hunk<'a>>, ApplyError> {
        if self.finished {
            return Ok(None);
        }

        let head = self.take(3)?;
        if head == TRAILER {
            self.finished = true;
            return Ok(None);
        }

        let offset = format::be_to_u32(head);
        let length = format::be_to_u32(self.take(2)?);

        let payload = if length != 0 {
            HunkPayload::Literal(self.take(length as usize)?)
        } else {
            // Zero length is the RLE sentinel.
            let run = format::be_to_u32(self.take(2)?) as u16;
            let value = self.take(1)?[0];
            HunkPayload::Run { length: run, value }
        };

        Ok(Some(Hunk { offset, payload }))
    }

    /// Current cursor position in the patch buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Whether the trailer token has been consumed.
    pub fn finished(&self) -> bool {
        self.finished
    }

    /// Bytes left after the trailer. Nonzero means trailing garbage, which
    /// is tolerated but worth reporting.
    pub fn trailing_bytes(&self) -> usize {
        self.patch.len() - self.pos
    }
}

// ---------------------------------------------------------------------------
// Apply
// ---------------------------------------------------------------------------

/// Apply an IPS patch to `source`, returning the reconstructed target.
///
/// Diagnostics go to the `log` facade at debug level; use [`apply_with`] to
/// supply a sink.
pub fn apply(source: &[u8], patch: &[u8]) -> Result<Vec<u8>, ApplyError> {
    apply_with(source, patch, &mut LogSink)
}

/// Apply an IPS patch to `source`, emitting one diagnostic line per hunk.
///
/// Fails rather than returning partial data: the target buffer is only
/// handed back after every hunk has been validated and replayed.
pub fn apply_with(
    source: &[u8],
    patch: &[u8],
    sink: &mut dyn DiagnosticSink,
) -> Result<Vec<u8>, ApplyError> {
    let mut reader = HunkReader::new(patch)?;
    let mut target = source.to_vec();

    while let Some(hunk) = reader.next_hunk()? {
        let start = hunk.offset as usize;
        let end = hunk.end();
        if end > source.len() {
            return Err(ApplyError::OutOfRangeWrite {
                offset: hunk.offset,
                length: hunk.payload.len(),
                source_len: source.len(),
            });
        }

        match hunk.payload {
            HunkPayload::Literal(bytes) => {
                sink.emit(&format!(
                    "Write {} bytes at offset {}",
                    bytes.len(),
                    format_hex(hunk.offset, 3)
                ));
                target[start..end].copy_from_slice(bytes);
            }
            HunkPayload::Run { length, value } => {
                sink.emit(&format!(
                    "Write {} for {} bytes at offset {}",
                    format_hex(u32::from(value), 1),
                    length,
                    format_hex(hunk.offset, 3)
                ));
                target[start..end].fill(value);
            }
        }
    }

    sink.emit("EOF");
    let trailing = reader.trailing_bytes();
    if trailing > 0 {
        sink.emit(&format!("{trailing} unprocessed patch bytes"));
    }

    Ok(target)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn patch(body: &[u8]) -> Vec<u8> {
        let mut p = HEADER.to_vec();
        p.extend_from_slice(body);
        p.extend_from_slice(&TRAILER);
        p
    }

    fn collect_apply(source: &[u8], patch: &[u8]) -> (Result<Vec<u8>, ApplyError>, Vec<String>) {
        let mut lines = Vec::new();
        let result = apply_with(source, patch, &mut |m: &str| lines.push(m.to_string()));
        (result, lines)
    }

    #[test]
    fn empty_patch_is_identity() {
        let source = [1u8, 2, 3, 4];
        let target = apply(&source, &patch(&[])).unwrap();
        assert_eq!(target, source);
    }

    #[test]
    fn regular_hunk_overwrites_bytes() {
        let source = [0u8; 6];
        // offset 2, length 3, payload AA BB CC
        let p = patch(&[0x00, 0x00, 0x02, 0x00, 0x03, 0xAA, 0xBB, 0xCC]);
        let target = apply(&source, &p).unwrap();
        assert_eq!(target, [0x00, 0x00, 0xAA, 0xBB, 0xCC, 0x00]);
    }

    #[test]
    fn rle_hunk_fills_run() {
        let source = [0u8; 5];
        // offset 1, zero sentinel, run 3, fill FF
        let p = patch(&[0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x03, 0xFF]);
        let target = apply(&source, &p).unwrap();
        assert_eq!(target, [0x00, 0xFF, 0xFF, 0xFF, 0x00]);
    }

    #[test]
    fn source_buffer_is_not_mutated() {
        let source = vec![0u8; 4];
        let p = patch(&[0x00, 0x00, 0x00, 0x00, 0x01, 0x99]);
        let target = apply(&source, &p).unwrap();
        assert_eq!(target[0], 0x99);
        assert_eq!(source, vec![0u8; 4]);
    }

    #[test]
    fn missing_header_is_rejected() {
        assert_eq!(apply(&[0u8; 4], b"PETCHEOF"), Err(ApplyError::MissingHeader));
        assert_eq!(apply(&[0u8; 4], b""), Err(ApplyError::MissingHeader));
        assert_eq!(apply(&[0u8; 4], b"PATC"), Err(ApplyError::MissingHeader));
    }

    #[test]
    fn truncated_hunk_is_unexpected_eof() {
        // Header, then only 2 bytes where an offset (3) is required.
        let mut p = HEADER.to_vec();
        p.extend_from_slice(&[0x00, 0x01]);
        assert_eq!(
            apply(&[0u8; 16], &p),
            Err(ApplyError::UnexpectedEof {
                wanted: 3,
                position: 5
            })
        );
    }

    #[test]
    fn truncated_payload_is_unexpected_eof() {
        // Regular hunk declares 4 payload bytes but provides 1.
        let mut p = HEADER.to_vec();
        p.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x04, 0xAA]);
        assert_eq!(
            apply(&[0u8; 16], &p),
            Err(ApplyError::UnexpectedEof {
                wanted: 4,
                position: 10
            })
        );
    }

    #[test]
    fn patch_without_trailer_is_unexpected_eof() {
        // A well-formed hunk but no EOF token afterwards.
        let mut p = HEADER.to_vec();
        p.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x01, 0xAA]);
        assert_eq!(
            apply(&[0u8; 4], &p),
            Err(ApplyError::UnexpectedEof {
                wanted: 3,
                position: 11
            })
        );
    }

    #[test]
    fn out_of_range_regular_write_is_rejected() {
        // offset 3, length 2 against a 4-byte source.
        let p = patch(&[0x00, 0x00, 0x03, 0x00, 0x02, 0xAA, 0xBB]);
        assert_eq!(
            apply(&[0u8; 4], &p),
            Err(ApplyError::OutOfRangeWrite {
                offset: 3,
                length: 2,
                source_len: 4
            })
        );
    }

    #[test]
    fn out_of_range_rle_write_is_rejected() {
        // offset 2, run 5 against a 4-byte source.
        let p = patch(&[0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x05, 0xFF]);
        assert_eq!(
            apply(&[0u8; 4], &p),
            Err(ApplyError::OutOfRangeWrite {
                offset: 2,
                length: 5,
                source_len: 4
            })
        );
    }

    #[test]
    fn trailing_bytes_are_tolerated_and_reported() {
        let mut p = patch(&[]);
        p.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        let (result, lines) = collect_apply(&[0u8; 4], &p);
        assert_eq!(result.unwrap(), vec![0u8; 4]);
        assert!(lines.contains(&"EOF".to_string()));
        assert!(lines.contains(&"4 unprocessed patch bytes".to_string()));
    }

    #[test]
    fn diagnostics_describe_each_hunk() {
        let source = [0u8; 8];
        let mut body = vec![0x00, 0x00, 0x01, 0x00, 0x02, 0xAA, 0xBB];
        body.extend_from_slice(&[0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x03, 0xFF]);
        let (result, lines) = collect_apply(&source, &patch(&body));
        result.unwrap();
        assert_eq!(
            lines,
            vec![
                "Write 2 bytes at offset 0x000001",
                "Write 0xff for 3 bytes at offset 0x000004",
                "EOF",
            ]
        );
    }

    #[test]
    fn hunk_reader_yields_parsed_hunks() {
        let body = [
            0x00, 0x00, 0x01, 0x00, 0x02, 0xAA, 0xBB, // regular
            0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x03, 0xFF, // RLE
        ];
        let p = patch(&body);
        let mut reader = HunkReader::new(&p).unwrap();

        let first = reader.next_hunk().unwrap().unwrap();
        assert_eq!(first.offset, 1);
        assert_eq!(first.payload, HunkPayload::Literal(&[0xAA, 0xBB]));
        assert_eq!(first.end(), 3);

        let second = reader.next_hunk().unwrap().unwrap();
        assert_eq!(second.offset, 4);
        assert_eq!(
            second.payload,
            HunkPayload::Run {
                length: 3,
                value: 0xFF
            }
        );

        assert!(reader.next_hunk().unwrap().is_none());
        assert!(reader.finished());
        assert_eq!(reader.trailing_bytes(), 0);
        // Exhausted readers stay exhausted.
        assert!(reader.next_hunk().unwrap().is_none());
    }

    #[test]
    fn error_messages_render_hex_positions() {
        let err = ApplyError::OutOfRangeWrite {
            offset: 0x1F,
            length: 9,
            source_len: 4,
        };
        assert_eq!(
            err.to_string(),
            "source file is 4 bytes: cannot write 9 bytes at offset 0x00001f"
        );

        let err = ApplyError::UnexpectedEof {
            wanted: 2,
            position: 0xAB,
        };
        assert_eq!(
            err.to_string(),
            "unexpected end of file: tried to read 2 bytes at 0x0000ab"
        );
    }
}
