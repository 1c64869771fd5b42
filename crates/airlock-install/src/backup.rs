//! Backup sessions for displaced extensions.
//!
//! Every victim is copied into the session before any original is deleted.
//! Moves are copy-then-delete, never rename, since the backup root may be on
//! another filesystem.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use airlock_log::Logger;
use chrono::{DateTime, Utc};

use crate::error::{BackupFailure, Error, Result};
use crate::extension::InstalledExtension;
use crate::plan::ReplaceMode;

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

#[derive(Clone, Debug)]
pub struct BackupSession {
    pub timestamp: DateTime<Utc>,
    pub mode: ReplaceMode,
    pub directory: PathBuf,
}

impl BackupSession {
    /// Create `<root>/<timestamp>_<mode>`, suffixing `_1`, `_2`, ... until
    /// the name is free.
    pub fn create(root: &Path, mode: ReplaceMode, timestamp: DateTime<Utc>) -> Result<Self> {
        fs::create_dir_all(root)?;
        let base = format!("{}_{}", timestamp.format(TIMESTAMP_FORMAT), mode);

        let mut attempt = 0u32;
        loop {
            let name = match attempt {
                0 => base.clone(),
                n => format!("{base}_{n}"),
            };
            let directory = root.join(name);
            match fs::create_dir(&directory) {
                Ok(()) => {
                    return Ok(Self {
                        timestamp,
                        mode,
                        directory,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Fail with a configuration error when `backup_root` is `target` or lies
/// beneath it. Nothing is created or modified.
pub fn ensure_backup_outside(backup_root: &Path, target: &Path) -> Result<()> {
    if airlock_fs::is_within(backup_root, target)? {
        return Err(Error::Configuration(format!(
            "backup directory '{}' must not be inside target directory '{}'",
            backup_root.display(),
            target.display()
        )));
    }
    Ok(())
}

/// Move `victims` out of `target` into a fresh session under `backup_root`.
///
/// Returns `None` when there is nothing to move; no session is created in
/// that case. Per-victim failures do not undo earlier moves; they are logged
/// individually and returned together as [`Error::Backup`].
pub fn backup_and_remove(
    victims: &[InstalledExtension],
    target: &Path,
    backup_root: &Path,
    mode: ReplaceMode,
    log: &dyn Logger,
) -> Result<Option<BackupSession>> {
    ensure_backup_outside(backup_root, target)?;

    if victims.is_empty() {
        log.debug("no extensions to back up");
        return Ok(None);
    }

    let session = BackupSession::create(backup_root, mode, Utc::now())?;
    log.info(&format!(
        "backing up {} extension(s) to {}",
        victims.len(),
        session.directory.display()
    ));

    let mut failures = Vec::new();
    let mut copied = Vec::with_capacity(victims.len());
    for victim in victims {
        let Some(name) = victim.path.file_name() else {
            continue;
        };
        let dest = session.directory.join(name);
        match airlock_fs::copy_path(&victim.path, &dest) {
            Ok(()) => {
                log.debug(&format!("copied {} -> {}", victim.path.display(), dest.display()));
                copied.push(victim);
            }
            Err(source) => {
                log.error(&format!("failed to back up {}: {source}", victim.path.display()));
                failures.push(BackupFailure {
                    path: victim.path.clone(),
                    source,
                });
            }
        }
    }

    for victim in copied {
        match airlock_fs::remove_path(&victim.path) {
            Ok(()) => log.info(&format!("moved {victim} to backup")),
            Err(source) => {
                log.error(&format!(
                    "backed up but could not remove {}: {source}",
                    victim.path.display()
                ));
                failures.push(BackupFailure {
                    path: victim.path.clone(),
                    source,
                });
            }
        }
    }

    if failures.is_empty() {
        Ok(Some(session))
    } else {
        Err(Error::Backup { failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::extension::scan_installed;
    use airlock_log::NoopLogger;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn session_names_carry_timestamp_and_mode() {
        let dir = tempdir().unwrap();
        let at = Utc.with_ymd_and_hms(2024, 10, 1, 12, 30, 5).unwrap();

        let first = BackupSession::create(dir.path(), ReplaceMode::Clean, at).unwrap();
        let second = BackupSession::create(dir.path(), ReplaceMode::Clean, at).unwrap();
        let third = BackupSession::create(dir.path(), ReplaceMode::Clean, at).unwrap();

        assert_eq!(first.directory, dir.path().join("20241001T123005Z_clean"));
        assert_eq!(second.directory, dir.path().join("20241001T123005Z_clean_1"));
        assert_eq!(third.directory, dir.path().join("20241001T123005Z_clean_2"));
    }

    #[test]
    fn nested_backup_root_is_rejected_before_mutation() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("extensions");
        fs::create_dir(&target).unwrap();
        fs::create_dir(target.join("foo.bar-1.0.0")).unwrap();
        let victims = scan_installed(&target).unwrap();

        let err = backup_and_remove(
            &victims,
            &target,
            &target.join("backups"),
            ReplaceMode::Clean,
            &NoopLogger,
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(target.join("foo.bar-1.0.0").exists());
        assert!(!target.join("backups").exists());
    }

    #[test]
    fn no_victims_creates_no_session() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("backups");

        let session =
            backup_and_remove(&[], &dir.path().join("t"), &root, ReplaceMode::Replace, &NoopLogger)
                .unwrap();
        assert!(session.is_none());
        assert!(!root.exists());
    }

    #[test]
    fn victims_are_moved_with_contents() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("extensions");
        let ext = target.join("foo.bar-1.0.0");
        fs::create_dir_all(ext.join("out")).unwrap();
        fs::write(ext.join("package.json"), b"{}").unwrap();
        fs::write(ext.join("out/main.js"), b"console.log(1)").unwrap();
        fs::write(target.join("baz.qux-2.0.0.vsix"), b"pkg").unwrap();
        let victims = scan_installed(&target).unwrap();

        let session = backup_and_remove(
            &victims,
            &target,
            &dir.path().join("backups"),
            ReplaceMode::Clean,
            &NoopLogger,
        )
        .unwrap()
        .unwrap();

        assert!(!ext.exists());
        assert!(!target.join("baz.qux-2.0.0.vsix").exists());
        assert_eq!(
            fs::read(session.directory.join("foo.bar-1.0.0/out/main.js")).unwrap(),
            b"console.log(1)"
        );
        assert_eq!(fs::read(session.directory.join("baz.qux-2.0.0.vsix")).unwrap(), b"pkg");
    }

    #[test]
    fn a_vanished_victim_is_reported_and_others_still_move() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("extensions");
        fs::create_dir_all(target.join("keep.me-1.0.0")).unwrap();
        let mut victims = scan_installed(&target).unwrap();
        victims.push(InstalledExtension {
            id: "gone.away".into(),
            version: Some("1.0.0".into()),
            path: target.join("gone.away-1.0.0"),
        });

        let err = backup_and_remove(
            &victims,
            &target,
            &dir.path().join("backups"),
            ReplaceMode::Clean,
            &NoopLogger,
        )
        .unwrap_err();

        match err {
            Error::Backup { failures } => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].path, target.join("gone.away-1.0.0"));
            }
            other => panic!("expected Backup error, got {other:?}"),
        }
        assert!(!target.join("keep.me-1.0.0").exists());
    }
}
