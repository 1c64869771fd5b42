//! One deployment run, start to finish.
//!
//! Order matters: paths are guarded before anything is fetched, victims are
//! backed up before the new bundle is extracted, and the staging area is
//! removed only after every step succeeded.

use std::path::{Path, PathBuf};

use airlock_archive::{ExtractOptions, extract_archive};
use airlock_fetch::Fetcher;
use airlock_install::{
    ExtensionInstaller, ReplaceMode, backup_and_remove, ensure_backup_outside, find_packages,
    install_packages, plan_from_manifest, prepare_bundle_from_zip, preseed_server,
};
use airlock_log::Logger;
use anyhow::Context;

use crate::config::{Config, ConfigError};

const DOWNLOAD_DIR: &str = "download";
const STAGING_DIR: &str = "staging";

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub displaced: usize,
    pub backup: Option<PathBuf>,
    pub extracted: usize,
    pub installed: usize,
    pub server: Option<PathBuf>,
}

pub struct Deployment<'a> {
    config: &'a Config,
    fetcher: &'a dyn Fetcher,
    installer: Option<&'a dyn ExtensionInstaller>,
    log: &'a dyn Logger,
}

impl<'a> Deployment<'a> {
    pub fn new(config: &'a Config, fetcher: &'a dyn Fetcher, log: &'a dyn Logger) -> Self {
        Self {
            config,
            fetcher,
            installer: None,
            log,
        }
    }

    pub fn with_installer(mut self, installer: &'a dyn ExtensionInstaller) -> Self {
        self.installer = Some(installer);
        self
    }

    fn temp(&self, name: &str) -> PathBuf {
        self.config.plan.temp_dir.join(name)
    }

    fn guard_paths(&self) -> anyhow::Result<()> {
        let plan = &self.config.plan;
        let target = &self.config.deployment.target_dir;

        airlock_fs::ensure_writable_dir(&plan.temp_dir)?;
        if plan.replace_mode != ReplaceMode::None {
            ensure_backup_outside(&plan.backup_dir, target)?;
        }
        if self.config.deployment.dry_run {
            return Ok(());
        }

        let mut paths = vec![target.clone()];
        if plan.replace_mode != ReplaceMode::None {
            paths.push(plan.backup_dir.clone());
        }
        if self.config.server.preseed {
            paths.push(self.config.server.install_root.clone());
        }
        airlock_fs::ensure_paths(&paths)?;
        Ok(())
    }

    fn fetch_inputs(&self) -> anyhow::Result<(PathBuf, PathBuf)> {
        let source = &self.config.source;
        let archive_url = source
            .archive_url
            .as_deref()
            .ok_or(ConfigError::Required("source.archive_url"))?;
        let manifest_url = self
            .config
            .manifest_url()
            .ok_or(ConfigError::Required("source.manifest_url"))?;

        let downloads = self.temp(DOWNLOAD_DIR);
        let manifest = self
            .fetcher
            .fetch(&manifest_url, &downloads, self.log)
            .with_context(|| format!("failed to fetch manifest from {manifest_url}"))?;
        let archive = self
            .fetcher
            .fetch(archive_url, &downloads, self.log)
            .with_context(|| format!("failed to fetch archive from {archive_url}"))?;
        Ok((archive, manifest))
    }

    fn reconcile(&self, manifest: &Path, summary: &mut Summary) -> anyhow::Result<()> {
        let plan = &self.config.plan;
        let target = &self.config.deployment.target_dir;

        let victims = plan_from_manifest(
            plan.replace_mode,
            target,
            manifest,
            &plan.include_extensions,
            &plan.exclude_extensions,
            self.log,
        )?;
        summary.displaced = victims.len();

        if self.config.deployment.dry_run {
            for victim in &victims {
                self.log
                    .info(&format!("dry run: would back up {}", victim.path.display()));
            }
            return Ok(());
        }

        let session =
            backup_and_remove(&victims, target, &plan.backup_dir, plan.replace_mode, self.log)?;
        summary.backup = session.map(|s| s.directory);
        Ok(())
    }

    fn preseed(&self, archive: &Path) -> anyhow::Result<Option<PathBuf>> {
        let server = &self.config.server;
        if !server.preseed {
            return Ok(None);
        }
        let commit = server
            .commit
            .as_deref()
            .ok_or(ConfigError::Required("server.commit"))?;

        if self.config.deployment.dry_run {
            self.log.info(&format!(
                "dry run: would preseed server {commit} into {}",
                server.install_root.display()
            ));
            return Ok(None);
        }

        let tarball = match &self.config.source.server_tarball_url {
            Some(url) => self
                .fetcher
                .fetch(url, &self.temp(DOWNLOAD_DIR), self.log)
                .with_context(|| format!("failed to fetch server tarball from {url}"))?,
            None => prepare_bundle_from_zip(archive, commit, &self.temp(STAGING_DIR))?,
        };

        let (target, outcome) = preseed_server(&tarball, &server.install_root, commit, self.log)?;
        self.log.debug(&format!("preseed outcome: {outcome:?}"));
        Ok(Some(target.directory))
    }

    fn cleanup(&self) {
        for name in [STAGING_DIR, DOWNLOAD_DIR] {
            let path = self.temp(name);
            if let Err(e) = airlock_fs::remove_path(&path) {
                self.log
                    .warning(&format!("could not remove {}: {e}", path.display()));
            }
        }
    }

    pub fn run(&self) -> anyhow::Result<Summary> {
        let deployment = &self.config.deployment;
        let mut summary = Summary::default();

        self.config.validate()?;
        self.guard_paths()?;
        let (archive, manifest) = self.fetch_inputs()?;

        self.reconcile(&manifest, &mut summary)?;

        let options = ExtractOptions::new()
            .dry_run(deployment.dry_run)
            .verification(deployment.verify_integrity);
        let destination = match self.installer {
            Some(_) => self.temp(STAGING_DIR).join("extensions"),
            None => deployment.target_dir.clone(),
        };
        let report = extract_archive(&archive, &manifest, &destination, &options, self.log)?;
        summary.extracted = report.count;

        if let Some(installer) = self.installer {
            if !deployment.dry_run && report.count > 0 {
                let packages = find_packages(&destination)?;
                summary.installed = install_packages(installer, &packages, self.log)?;
            }
        }

        summary.server = self.preseed(&archive)?;

        self.cleanup();
        self.log.info(&format!(
            "deployment finished: {} extracted, {} displaced, {} installed",
            summary.extracted, summary.displaced, summary.installed
        ));
        Ok(summary)
    }
}
