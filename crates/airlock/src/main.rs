mod cli;
mod config;
mod logging;
mod orchestrator;

use std::path::Path;
use std::process::ExitCode;

use airlock_archive::ErrorKind;
use airlock_fetch::HttpFetcher;
use airlock_install::CodeCli;
use airlock_log::{Logger, TracingLogger};
use clap::Parser;

use crate::cli::Cli;
use crate::config::{Config, ConfigError, SYSTEM_CONFIG};
use crate::orchestrator::Deployment;

fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::Configuration => 2,
        ErrorKind::PathViolation => 3,
        ErrorKind::Manifest => 4,
        ErrorKind::ArchiveIncomplete => 5,
        ErrorKind::CorruptArchive => 6,
        ErrorKind::IntegrityFailure => 7,
        ErrorKind::IncompleteInstall => 8,
        ErrorKind::Io => 1,
    }
}

fn classify(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<ConfigError>().is_some() {
        return exit_code(ErrorKind::Configuration);
    }
    if let Some(e) = err.downcast_ref::<airlock_archive::Error>() {
        return exit_code(e.kind());
    }
    if let Some(e) = err.downcast_ref::<airlock_install::Error>() {
        return exit_code(e.kind());
    }
    1
}

fn deploy(cli: &Cli) -> anyhow::Result<()> {
    let mut config = Config::load(Some(Path::new(SYSTEM_CONFIG)), cli.config.as_deref())?;
    config.apply_cli(cli);

    logging::init(config.log_level()?, config.logging.file.as_deref())?;
    let log = TracingLogger;

    let fetcher = HttpFetcher::new(config.source.retries)?;
    let installer = config
        .deployment
        .code_cli
        .as_ref()
        .map(|program| CodeCli::new(program, &config.deployment.target_dir));

    let mut deployment = Deployment::new(&config, &fetcher, &log);
    if let Some(installer) = &installer {
        deployment = deployment.with_installer(installer);
    }

    let summary = deployment.run()?;
    if let Some(backup) = &summary.backup {
        log.info(&format!("displaced extensions saved in {}", backup.display()));
    }
    if let Some(server) = &summary.server {
        log.info(&format!("remote server ready at {}", server.display()));
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match deploy(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = classify(&err);
            if tracing::dispatcher::has_been_set() {
                tracing::error!("{err:#}");
            } else {
                eprintln!("airlock: {err:#}");
            }
            ExitCode::from(code)
        }
    }
}
