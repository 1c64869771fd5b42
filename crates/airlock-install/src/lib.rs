//! Reconciling a live extensions directory and preseeding the remote server.
//!
//! - [`plan_replacements`] decides which installed extensions a deployment
//!   displaces.
//! - [`backup_and_remove`] moves them into a timestamped backup session.
//! - [`preseed_server`] installs a server tarball under its commit directory,
//!   idempotently.
//! - [`ExtensionInstaller`] hands extracted packages to the editor CLI.

mod backup;
mod error;
mod extension;
mod installer;
mod plan;
mod preseed;

pub use backup::{BackupSession, backup_and_remove, ensure_backup_outside};
pub use error::{BackupFailure, Error, ErrorKind, Result};
pub use extension::{
    ExtensionRule, InstalledExtension, scan_installed, split_name, strip_package_extension,
};
pub use installer::{CodeCli, ExtensionInstaller, InstallOutcome, find_packages, install_packages};
pub use plan::{ReplaceMode, desired_versions, plan_from_manifest, plan_replacements};
pub use preseed::{
    COMPLETION_MARKER, MANDATORY_FILES, OPTIONAL_FILES, PreseedOutcome, PreseedTarget,
    SERVER_TARBALL, prepare_bundle_from_zip, preseed_server, validate_commit,
    validate_commit_tree,
};
