//! Content verification primitives for archive members.
//!
//! Hashing is incremental: digests are computed as data streams through a
//! [`VerifiedReader`], so a member is never buffered whole in memory.
//!
//! # Example
//!
//! ```
//! use airlock_verify::{hash_reader, Sha256Hasher};
//!
//! let (digest, bytes) = hash_reader(&b"hello world"[..], Sha256Hasher::new()).unwrap();
//! assert_eq!(bytes, 11);
//! assert_eq!(digest, Sha256Hasher::digest_hex(b"hello world"));
//! ```

pub use self::error::{Result, VerifyError};
pub use self::hasher::{Hasher, Sha256Hasher};
pub use self::reader::{VerifiedReader, hash_reader};

mod error;
mod hasher;
mod reader;
