//! Ipsdelta: IPS binary patch encoding/decoding in Rust.
//!
//! The crate provides:
//! - A pure-Rust IPS codec (`ips`): hunk diffing, RLE selection, hunk merging
//! - File-oriented helpers with integrity digests (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```
//! use ipsdelta::ips::{decoder, encoder};
//!
//! let source = b"hello old world";
//! let target = b"hello new world";
//!
//! let patch = encoder::create(source, target).unwrap();
//! let decoded = decoder::apply(source, &patch).unwrap();
//! assert_eq!(decoded, target);
//! ```

pub mod io;
pub mod ips;

#[cfg(feature = "cli")]
pub mod cli;
