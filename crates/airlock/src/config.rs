//! Layered configuration: built-in defaults, the system file, the user's
//! `--config` file, then command-line overrides.

use std::path::{Path, PathBuf};

use airlock_archive::VerificationMode;
use airlock_install::{ExtensionRule, ReplaceMode};
use airlock_log::Level;
use figment::Figment;
use figment::providers::{Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cli::Cli;

pub const SYSTEM_CONFIG: &str = "/etc/airlock/config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file '{0}' does not exist")]
    Missing(PathBuf),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),
    #[error("'{0}' must be set")]
    Required(&'static str),
    #[error("invalid value for '{key}': {reason}")]
    Value { key: &'static str, reason: String },
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub plan: PlanConfig,
    pub deployment: DeploymentConfig,
    pub logging: LoggingConfig,
    pub server: ServerConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub archive_url: Option<String>,
    /// Defaults to `manifest.json` next to the archive.
    pub manifest_url: Option<String>,
    pub retries: u32,
    pub server_tarball_url: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            archive_url: None,
            manifest_url: None,
            retries: 3,
            server_tarball_url: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanConfig {
    pub replace_mode: ReplaceMode,
    pub backup_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub include_extensions: Vec<ExtensionRule>,
    pub exclude_extensions: Vec<ExtensionRule>,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            replace_mode: ReplaceMode::None,
            backup_dir: home_join(".vscode/extensions-backup"),
            temp_dir: std::env::temp_dir().join("airlock"),
            include_extensions: Vec::new(),
            exclude_extensions: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    pub target_dir: PathBuf,
    pub verify_integrity: VerificationMode,
    pub dry_run: bool,
    /// Editor CLI used to install extracted packages; extract directly when unset.
    pub code_cli: Option<PathBuf>,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            target_dir: home_join(".vscode/extensions"),
            verify_integrity: VerificationMode::Error,
            dry_run: false,
            code_cli: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub preseed: bool,
    pub commit: Option<String>,
    pub install_root: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            preseed: false,
            commit: None,
            install_root: home_join(".vscode-server/bin"),
        }
    }
}

fn home_join(relative: &str) -> PathBuf {
    home::home_dir().unwrap_or_default().join(relative)
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home::home_dir().map_or_else(|| path.to_path_buf(), |home| home.join(rest)),
        Err(_) => path.to_path_buf(),
    }
}

impl Config {
    /// Merge defaults, `system` (skipped when absent) and `user` (must exist).
    pub fn load(system: Option<&Path>, user: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(system) = system {
            figment = figment.merge(Toml::file(system));
        }
        if let Some(user) = user {
            if !user.is_file() {
                return Err(ConfigError::Missing(user.to_path_buf()));
            }
            figment = figment.merge(Toml::file(user));
        }

        let mut config: Config = figment.extract().map_err(Box::new)?;
        config.expand_paths();
        Ok(config)
    }

    /// Apply command-line overrides. Scalars replace; rule lists extend.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(url) = &cli.archive_url {
            self.source.archive_url = Some(url.clone());
        }
        if let Some(url) = &cli.manifest_url {
            self.source.manifest_url = Some(url.clone());
        }
        if let Some(retries) = cli.retries {
            self.source.retries = retries;
        }
        if let Some(url) = &cli.server_tarball_url {
            self.source.server_tarball_url = Some(url.clone());
        }

        if let Some(mode) = cli.replace_mode {
            self.plan.replace_mode = mode;
        }
        if let Some(dir) = &cli.backup_dir {
            self.plan.backup_dir = dir.clone();
        }
        if let Some(dir) = &cli.temp_dir {
            self.plan.temp_dir = dir.clone();
        }
        self.plan.include_extensions.extend(cli.include_extensions.iter().cloned());
        self.plan.exclude_extensions.extend(cli.exclude_extensions.iter().cloned());

        if let Some(dir) = &cli.target_dir {
            self.deployment.target_dir = dir.clone();
        }
        if let Some(mode) = cli.verify_integrity {
            self.deployment.verify_integrity = mode;
        }
        if let Some(dry_run) = cli.dry_run {
            self.deployment.dry_run = dry_run;
        }
        if let Some(code) = &cli.code_cli {
            self.deployment.code_cli = Some(code.clone());
        }

        if let Some(level) = cli.log_level {
            self.logging.level = level.as_filter().to_string();
        }
        if let Some(file) = &cli.log_file {
            self.logging.file = Some(file.clone());
        }

        if cli.preseed_server {
            self.server.preseed = true;
        }
        if let Some(commit) = &cli.vscode_commit {
            self.server.commit = Some(commit.clone());
        }

        self.expand_paths();
    }

    fn expand_paths(&mut self) {
        self.plan.backup_dir = expand_home(&self.plan.backup_dir);
        self.plan.temp_dir = expand_home(&self.plan.temp_dir);
        self.deployment.target_dir = expand_home(&self.deployment.target_dir);
        self.deployment.code_cli = self.deployment.code_cli.as_deref().map(expand_home);
        self.logging.file = self.logging.file.as_deref().map(expand_home);
        self.server.install_root = expand_home(&self.server.install_root);
    }

    pub fn log_level(&self) -> Result<Level, ConfigError> {
        self.logging.level.parse().map_err(|reason| ConfigError::Value {
            key: "logging.level",
            reason,
        })
    }

    /// Check the settings a run cannot do without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.archive_url.as_deref().is_none_or(|u| u.trim().is_empty()) {
            return Err(ConfigError::Required("source.archive_url"));
        }
        if self.server.preseed && self.server.commit.is_none() {
            return Err(ConfigError::Required("server.commit"));
        }
        self.log_level()?;
        Ok(())
    }

    pub fn manifest_url(&self) -> Option<String> {
        if let Some(url) = &self.source.manifest_url {
            return Some(url.clone());
        }
        let archive = self.source.archive_url.as_deref()?;
        Some(match archive.rfind(['/', '\\']) {
            Some(idx) => format!("{}manifest.json", &archive[..=idx]),
            None => "manifest.json".to_string(),
        })
    }
}
