// File-level helpers for creating and applying IPS patches.
//
// Provides `create_file()` and `apply_file()` convenience functions that
// read whole files, run the in-memory codec, and write the result.
// Optionally computes SHA-256 integrity digests (feature-gated behind
// `file-io`), including a precondition check of the source digest before
// applying a patch.

use std::io;
use std::path::Path;

use thiserror::Error;

#[cfg(feature = "file-io")]
use sha2::{Digest, Sha256};

use crate::ips::decoder::{self, ApplyError, HunkReader};
use crate::ips::diag::LogSink;
use crate::ips::encoder::{self, CreateError, CreateOptions};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `create_file()`.
#[derive(Debug, Clone)]
pub struct CreateStats {
    /// Source file size in bytes.
    pub source_size: u64,
    /// Target file size in bytes.
    pub target_size: u64,
    /// Patch output size in bytes.
    pub patch_size: u64,
    /// Number of hunks written.
    pub hunks: u64,
    /// SHA-256 of the source file (if `file-io` is enabled).
    pub source_sha256: Option<[u8; 32]>,
    /// SHA-256 of the target file (if `file-io` is enabled).
    pub target_sha256: Option<[u8; 32]>,
    /// SHA-256 of the patch output (if `file-io` is enabled).
    pub patch_sha256: Option<[u8; 32]>,
}

/// Statistics returned by `apply_file()`.
#[derive(Debug, Clone)]
pub struct ApplyStats {
    /// Source file size in bytes.
    pub source_size: u64,
    /// Patch file size in bytes.
    pub patch_size: u64,
    /// Reconstructed output size in bytes.
    pub output_size: u64,
    /// Number of hunks applied.
    pub hunks: u64,
    /// SHA-256 of the source file (if `file-io` is enabled).
    pub source_sha256: Option<[u8; 32]>,
    /// SHA-256 of the patch file (if `file-io` is enabled).
    pub patch_sha256: Option<[u8; 32]>,
    /// SHA-256 of the reconstructed output (if `file-io` is enabled).
    pub output_sha256: Option<[u8; 32]>,
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Options for `create_file()`.
#[derive(Debug, Clone, Copy)]
pub struct CreateFileOptions {
    /// Whether RLE hunks may be emitted.
    pub use_rle: bool,
    /// Run the codec and compute stats, but write nothing.
    pub dry_run: bool,
}

impl Default for CreateFileOptions {
    fn default() -> Self {
        Self {
            use_rle: true,
            dry_run: false,
        }
    }
}

/// Options for `apply_file()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyFileOptions {
    /// Run the codec and compute stats, but write nothing.
    pub dry_run: bool,
    /// Fail unless the source file's SHA-256 matches this digest.
    #[cfg(feature = "file-io")]
    pub expected_source_sha256: Option<[u8; 32]>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for file-level operations.
#[derive(Debug, Error)]
pub enum IoError {
    /// I/O error (file open, read, write).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Patch creation error.
    #[error("create error: {0}")]
    Create(#[from] CreateError),
    /// Patch application error.
    #[error("apply error: {0}")]
    Apply(#[from] ApplyError),
    /// The source file does not match the expected digest.
    #[cfg(feature = "file-io")]
    #[error("source SHA-256 mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
}

// ---------------------------------------------------------------------------
// Digest helpers
// ---------------------------------------------------------------------------

#[cfg(feature = "file-io")]
fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Render a digest as lowercase hex.
pub fn digest_hex(digest: &[u8; 32]) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Parse a 64-character hex string into a digest.
pub fn parse_digest(s: &str) -> Option<[u8; 32]> {
    let s = s.trim();
    if s.len() != 64 {
        return None;
    }
    let mut digest = [0u8; 32];
    for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
        let pair = std::str::from_utf8(chunk).ok()?;
        digest[i] = u8::from_str_radix(pair, 16).ok()?;
    }
    Some(digest)
}

/// Count the hunks in an already-validated patch buffer.
fn count_hunks(patch: &[u8]) -> u64 {
    let mut hunks = 0;
    if let Ok(mut reader) = HunkReader::new(patch) {
        while let Ok(Some(_)) = reader.next_hunk() {
            hunks += 1;
        }
    }
    hunks
}

// ---------------------------------------------------------------------------
// create_file
// ---------------------------------------------------------------------------

/// Create an IPS patch from a source file and target file, writing to
/// `patch_path`.
///
/// Both inputs are read fully into memory; the format addresses at most
/// 16 MiB so this is never a concern in practice. When the `file-io`
/// feature is enabled, SHA-256 digests of all three buffers are returned.
pub fn create_file(
    source_path: &Path,
    target_path: &Path,
    patch_path: &Path,
    opts: CreateFileOptions,
) -> Result<CreateStats, IoError> {
    let source = std::fs::read(source_path)?;
    let target = std::fs::read(target_path)?;

    let patch = encoder::create_with(
        &source,
        &target,
        CreateOptions {
            use_rle: opts.use_rle,
        },
        &mut LogSink,
    )?;

    if !opts.dry_run {
        std::fs::write(patch_path, &patch)?;
    }

    #[cfg(feature = "file-io")]
    let (source_sha256, target_sha256, patch_sha256) = (
        Some(sha256(&source)),
        Some(sha256(&target)),
        Some(sha256(&patch)),
    );
    #[cfg(not(feature = "file-io"))]
    let (source_sha256, target_sha256, patch_sha256) = (None, None, None);

    Ok(CreateStats {
        source_size: source.len() as u64,
        target_size: target.len() as u64,
        patch_size: patch.len() as u64,
        hunks: count_hunks(&patch),
        source_sha256,
        target_sha256,
        patch_sha256,
    })
}

// ---------------------------------------------------------------------------
// apply_file
// ---------------------------------------------------------------------------

/// Apply an IPS patch file to a source file, writing to `output_path`.
///
/// When the `file-io` feature is enabled, SHA-256 digests are computed and
/// the source digest is checked against `expected_source_sha256` before any
/// patching happens.
pub fn apply_file(
    source_path: &Path,
    patch_path: &Path,
    output_path: &Path,
    opts: ApplyFileOptions,
) -> Result<ApplyStats, IoError> {
    let source = std::fs::read(source_path)?;
    let patch = std::fs::read(patch_path)?;

    #[cfg(feature = "file-io")]
    let (source_sha256, patch_sha256) = (Some(sha256(&source)), Some(sha256(&patch)));
    #[cfg(not(feature = "file-io"))]
    let (source_sha256, patch_sha256): (Option<[u8; 32]>, Option<[u8; 32]>) = (None, None);

    #[cfg(feature = "file-io")]
    if let (Some(expected), Some(actual)) = (opts.expected_source_sha256, source_sha256)
        && expected != actual
    {
        return Err(IoError::ChecksumMismatch {
            expected: digest_hex(&expected),
            actual: digest_hex(&actual),
        });
    }

    let output = decoder::apply_with(&source, &patch, &mut LogSink)?;

    if !opts.dry_run {
        std::fs::write(output_path, &output)?;
    }

    #[cfg(feature = "file-io")]
    let output_sha256 = Some(sha256(&output));
    #[cfg(not(feature = "file-io"))]
    let output_sha256 = None;

    Ok(ApplyStats {
        source_size: source.len() as u64,
        patch_size: patch.len() as u64,
        output_size: output.len() as u64,
        hunks: count_hunks(&patch),
        source_sha256,
        patch_sha256,
        output_sha256,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
