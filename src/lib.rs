//! sdiff: greedy byte-level diff/patch in Rust.
//!
//! A patch records the target's length and MD5 digest followed by a stream
//! of Equal / Insert / Delete commands. Delete commands carry the base bytes
//! they skip, so applying a patch to the wrong base fails loudly instead of
//! producing garbage.
//!
//! The crate provides:
//! - The patch data model and bit-exact wire codec (`patch`)
//! - The greedy differencer (`diff`) and the verifying applier (`apply`)
//! - Pluggable whole-patch compression (`compress`)
//! - In-memory and stream pipelines (`engine`)
//! - File-oriented helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! use sdiff::engine::{self, PatchOptions};
//!
//! let old = b"hello old world";
//! let new = b"hello new world";
//!
//! let opts = PatchOptions::default();
//! let blob = engine::create(new, old, &opts).unwrap();
//! let rebuilt = engine::apply(&blob, old, &opts).unwrap();
//! assert_eq!(rebuilt, new);
//! ```

pub mod apply;
pub mod compress;
pub mod diff;
pub mod engine;
pub mod error;
pub mod io;
pub mod patch;

#[cfg(feature = "cli")]
pub mod cli;

pub use apply::{ApplyOptions, apply, apply_bytes, apply_with_options};
pub use compress::{CompressBackend, Compression};
pub use diff::{DEFAULT_LOOKAHEAD, DiffOptions, diff, diff_with_options};
pub use engine::PatchOptions;
pub use error::PatchError;
pub use patch::{Command, Patch, PatchHeader};
