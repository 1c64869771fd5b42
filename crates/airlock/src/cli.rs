use std::path::PathBuf;

use airlock_archive::VerificationMode;
use airlock_install::{ExtensionRule, ReplaceMode};
use airlock_log::Level;
use clap::Parser;

/// Deploy a VSCode extension bundle onto an airgapped host.
///
/// Values given here override the system configuration and the file passed
/// with `--config`; extension rules are appended to the configured lists.
#[derive(Clone, Debug, Parser)]
#[command(name = "airlock", version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
pub struct Cli {
    /// TOML configuration file layered over the system configuration
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// URL or local path of the extension bundle ZIP
    #[arg(long, value_name = "URL")]
    pub archive_url: Option<String>,

    /// URL or local path of the manifest; defaults to manifest.json next to the archive
    #[arg(long, value_name = "URL")]
    pub manifest_url: Option<String>,

    /// Extra download attempts after the first failure
    #[arg(long)]
    pub retries: Option<u32>,

    /// Extensions directory to deploy into
    #[arg(long, value_name = "DIR")]
    pub target_dir: Option<PathBuf>,

    /// NONE, WARN or ERROR
    #[arg(long, value_name = "MODE")]
    pub verify_integrity: Option<VerificationMode>,

    /// Check everything but write nothing
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
    pub dry_run: Option<bool>,

    /// DEBUG, INFO, WARNING or ERROR
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<Level>,

    /// Also write the log to this file
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Only consider these extensions when replacing
    #[arg(long, num_args = 1.., value_name = "ID[@VER]")]
    pub include_extensions: Vec<ExtensionRule>,

    /// Never replace these extensions
    #[arg(long, num_args = 1.., value_name = "ID[@VER]")]
    pub exclude_extensions: Vec<ExtensionRule>,

    /// Where displaced extensions are moved
    #[arg(long, value_name = "DIR")]
    pub backup_dir: Option<PathBuf>,

    /// Working directory for downloads and staging
    #[arg(long, value_name = "DIR")]
    pub temp_dir: Option<PathBuf>,

    /// NONE, REPLACE or CLEAN
    #[arg(long, value_name = "MODE")]
    pub replace_mode: Option<ReplaceMode>,

    /// Install the remote server for --vscode-commit from the bundle
    #[arg(long)]
    pub preseed_server: bool,

    /// Client commit hash, as printed by `code --version`
    #[arg(long, value_name = "HASH")]
    pub vscode_commit: Option<String>,

    /// Fetch the server tarball from here instead of the bundle
    #[arg(long, value_name = "URL")]
    pub server_tarball_url: Option<String>,

    /// Editor CLI used to install each extracted package
    #[arg(long, value_name = "PATH")]
    pub code_cli: Option<PathBuf>,
}
