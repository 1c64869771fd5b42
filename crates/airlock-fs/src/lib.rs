//! Filesystem primitives for deployment steps that must be safe to retry.
//!
//! Everything here copies before it deletes: backups may live on another
//! filesystem than the data they protect, so a plain rename is never assumed
//! to work.

mod error;
mod guard;
mod path;
pub mod primitives;

pub use error::{Error, Result};
pub use guard::{ensure_paths, ensure_writable_dir};
pub use path::{is_within, resolve_lenient};
pub use primitives::{
    copy_dir_all, copy_file_with_metadata, copy_path, copy_symlink, is_executable, latest_mtime,
    make_executable, remove_path, replace_file, write_marker,
};
