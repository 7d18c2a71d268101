// IPS patch format implementation.
//
// This module provides encoding and decoding of the IPS binary patch
// format: a fixed "PATCH" header, a sequence of hunks (literal bytes or
// run-length-encoded fills at 3-byte big-endian offsets), and an "EOF"
// trailer.
//
// # Modules
//
// - `format`  — Wire constants and big-endian/hex primitives
// - `diag`    — Injectable diagnostic sink for per-hunk reporting
// - `decoder` — Patch parsing and application (apply)
// - `encoder` — Diff detection, hunk merging, and serialization (create)

pub mod decoder;
pub mod diag;
pub mod encoder;
pub mod format;

// Re-export key types for convenience.
pub use decoder::{ApplyError, Hunk, HunkPayload, HunkReader, apply, apply_with};
pub use diag::{DiagnosticSink, LogSink};
pub use encoder::{CreateError, CreateOptions, create, create_with};
pub use format::{HEADER, MAX_OFFSET, TRAILER};
