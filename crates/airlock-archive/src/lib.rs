//! Manifest-driven verification and safe extraction of extension bundles.
//!
//! # Architecture
//!
//! - `sanitize.rs` - Member path normalization (zip-slip prevention)
//! - `bundle.rs` - ZIP container indexed by sanitized member name
//! - `manifest.rs` - JSON manifest loading
//! - `verify.rs` - Existence, size and SHA-256 checks
//! - `extract.rs` - Selective extraction of manifest members
//! - `tarball.rs` - Gzip tarball unpacking with wrapper stripping

pub use bundle::Bundle;
pub use error::{Error, ErrorKind, Result, render_findings};
pub use extract::{ExtractOptions, ExtractReport, extract_archive, extract_entries};
pub use manifest::{ManifestEntry, load_manifest, parse_manifest};
pub use sanitize::{
    PathViolation, SanitizedPath, Violation, sanitize_member, sanitize_path,
    sanitize_symlink_target,
};
pub use tarball::{UnpackReport, detect_wrapper, unpack_stripped, unpack_tar_gz_stripped};
pub use verify::{
    Finding, VerificationMode, check_integrity, ensure_members_present, verify_entries,
};

mod bundle;
mod error;
mod extract;
mod manifest;
mod sanitize;
mod tarball;
mod verify;
