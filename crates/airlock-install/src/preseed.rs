//! Offline installation of the remote-development server, keyed by commit.
//!
//! A commit directory is complete only when it contains the zero-byte marker
//! `0`. A directory without the marker is a leftover from an interrupted run
//! and is deleted, never repaired in place.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use airlock_archive::{Bundle, unpack_tar_gz_stripped};
use airlock_log::Logger;

use crate::error::{Error, Result};

pub const COMPLETION_MARKER: &str = "0";
pub const SERVER_TARBALL: &str = "server-linux-x64.tar.gz";

/// Runtime binary and CLI entry point; without them the server cannot start.
pub const MANDATORY_FILES: &[&str] = &["node", "bin/code-server"];
/// Startup script some server builds omit.
pub const OPTIONAL_FILES: &[&str] = &["server.sh"];

/// Validate that `commit` is usable as a single directory name.
pub fn validate_commit(commit: &str) -> Result<()> {
    let valid = !commit.is_empty()
        && commit != "."
        && commit != ".."
        && commit
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidCommit(commit.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreseedTarget {
    pub commit: String,
    pub directory: PathBuf,
    pub marker: PathBuf,
}

impl PreseedTarget {
    pub fn new(install_root: impl AsRef<Path>, commit: &str) -> Result<Self> {
        validate_commit(commit)?;
        let directory = install_root.as_ref().join(commit);
        let marker = directory.join(COMPLETION_MARKER);
        Ok(Self {
            commit: commit.to_string(),
            directory,
            marker,
        })
    }

    pub fn is_complete(&self) -> bool {
        self.marker.is_file()
    }

    fn exists(&self) -> bool {
        fs::symlink_metadata(&self.directory).is_ok()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreseedOutcome {
    /// The marker was already present; nothing was touched.
    AlreadyComplete,
    /// The tarball was unpacked into an absent directory.
    Installed,
    /// A partial directory was deleted and the install redone.
    Recovered,
}

/// Unpack `tarball` into `<install_root>/<commit>` unless already complete.
pub fn preseed_server(
    tarball: &Path,
    install_root: &Path,
    commit: &str,
    log: &dyn Logger,
) -> Result<(PreseedTarget, PreseedOutcome)> {
    let target = PreseedTarget::new(install_root, commit)?;

    if target.is_complete() {
        log.info(&format!(
            "server for commit {commit} already installed at {}",
            target.directory.display()
        ));
        return Ok((target, PreseedOutcome::AlreadyComplete));
    }

    let outcome = if target.exists() {
        log.warning(&format!(
            "removing partial server install at {}",
            target.directory.display()
        ));
        airlock_fs::remove_path(&target.directory)?;
        PreseedOutcome::Recovered
    } else {
        PreseedOutcome::Installed
    };

    fs::create_dir_all(&target.directory)?;
    log.info(&format!(
        "unpacking {} into {}",
        tarball.display(),
        target.directory.display()
    ));
    if let Err(e) = install_tree(tarball, &target, log) {
        discard_marker(&target, log)?;
        return Err(e);
    }

    let mandatory: Vec<_> = MANDATORY_FILES.iter().map(|f| target.directory.join(f)).collect();
    airlock_fs::write_marker(&target.marker, airlock_fs::latest_mtime(&mandatory))?;
    log.info(&format!("server for commit {commit} ready at {}", target.directory.display()));

    Ok((target, outcome))
}

/// Only a validated tree gets a marker; one shipped inside the tarball is
/// dropped so an interrupted or invalid unpack never reads as complete.
fn install_tree(tarball: &Path, target: &PreseedTarget, log: &dyn Logger) -> Result<()> {
    unpack_tar_gz_stripped(tarball, &target.directory, log)?;
    discard_marker(target, log)?;
    mark_executables(&target.directory, log)?;
    validate_commit_tree(&target.directory)
}

fn discard_marker(target: &PreseedTarget, log: &dyn Logger) -> Result<()> {
    if fs::symlink_metadata(&target.marker).is_ok() {
        log.warning(&format!(
            "discarding unexpected completion marker {}",
            target.marker.display()
        ));
        airlock_fs::remove_path(&target.marker)?;
    }
    Ok(())
}

fn mark_executables(dir: &Path, log: &dyn Logger) -> Result<()> {
    let mut missing = Vec::new();
    for name in MANDATORY_FILES {
        let path = dir.join(name);
        if path.is_file() {
            airlock_fs::make_executable(&path)?;
        } else {
            missing.push(name.to_string());
        }
    }
    if !missing.is_empty() {
        return Err(Error::IncompleteInstall {
            dir: dir.to_path_buf(),
            missing,
        });
    }

    for name in OPTIONAL_FILES {
        let path = dir.join(name);
        if path.is_file() {
            airlock_fs::make_executable(&path)?;
        } else {
            log.debug(&format!("optional server file {name} not present"));
        }
    }
    Ok(())
}

/// Check every mandatory file exists and is executable, reporting all
/// problems at once.
pub fn validate_commit_tree(dir: &Path) -> Result<()> {
    let missing: Vec<String> = MANDATORY_FILES
        .iter()
        .filter(|name| !airlock_fs::is_executable(dir.join(name)))
        .map(|name| name.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::IncompleteInstall {
            dir: dir.to_path_buf(),
            missing,
        })
    }
}

/// Copy the server tarball for `commit` out of a bundle ZIP.
///
/// The member may sit under `vscode-server/<commit>/` with or without a
/// leading `bundle/`. Only that member is read. The result is written to
/// `<outdir>/vscode-server/<commit>/server-linux-x64.tar.gz`.
pub fn prepare_bundle_from_zip(zip: &Path, commit: &str, outdir: &Path) -> Result<PathBuf> {
    validate_commit(commit)?;
    let mut bundle = Bundle::open(zip)?;

    let relative = format!("vscode-server/{commit}/{SERVER_TARBALL}");
    let candidates = [relative.clone(), format!("bundle/{relative}")];
    let Some(member) = candidates.iter().find(|c| bundle.contains(c)) else {
        return Err(Error::MissingServerArchive {
            archive: zip.to_path_buf(),
            commit: commit.to_string(),
        });
    };

    let dest = outdir.join("vscode-server").join(commit).join(SERVER_TARBALL);
    let parent = dest.parent().unwrap_or(outdir);
    fs::create_dir_all(parent)?;

    let partial = parent.join(format!(".{SERVER_TARBALL}.part"));
    let mut reader = bundle.member_reader(member)?;
    let copied = File::create(&partial)
        .and_then(|mut out| io::copy(&mut reader, &mut out).map(|_| ()))
        .and_then(|()| fs::rename(&partial, &dest));
    if let Err(e) = copied {
        let _ = fs::remove_file(&partial);
        return Err(e.into());
    }
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use airlock_log::NoopLogger;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;

    #[test]
    fn commit_must_be_a_single_segment() {
        assert!(validate_commit("a1b2c3d4e5").is_ok());
        assert!(validate_commit("1.95.0-stable").is_ok());
        for bad in ["", ".", "..", "a/b", "../x", "a b", "c:\\x"] {
            assert!(matches!(validate_commit(bad), Err(Error::InvalidCommit(_))), "{bad}");
        }
    }

    #[test]
    fn target_paths_follow_the_commit() {
        let target = PreseedTarget::new("/home/u/.vscode-server/bin", "abc123").unwrap();
        assert_eq!(target.directory, Path::new("/home/u/.vscode-server/bin/abc123"));
        assert_eq!(target.marker, Path::new("/home/u/.vscode-server/bin/abc123/0"));
    }

    #[test]
    fn validate_reports_every_missing_file() {
        let dir = tempdir().unwrap();
        match validate_commit_tree(dir.path()) {
            Err(Error::IncompleteInstall { missing, .. }) => {
                assert_eq!(missing, vec!["node", "bin/code-server"]);
            }
            other => panic!("expected IncompleteInstall, got {other:?}"),
        }
    }

    fn zip_with(path: &Path, entries: &[(&str, &[u8])]) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, data) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn bundle_prefix_is_optional_and_stripped() {
        let dir = tempdir().unwrap();
        let zip = dir.path().join("bundle.zip");
        zip_with(
            &zip,
            &[
                ("bundle/vscode-server/abc/server-linux-x64.tar.gz", b"tarball"),
                ("bundle/extensions/a.vsix", b"a"),
            ],
        );
        let out = dir.path().join("out");

        let dest = prepare_bundle_from_zip(&zip, "abc", &out).unwrap();

        assert_eq!(dest, out.join("vscode-server/abc/server-linux-x64.tar.gz"));
        assert_eq!(fs::read(&dest).unwrap(), b"tarball");
        assert!(!out.join("bundle").exists());
        assert!(!out.join("extensions").exists());
    }

    #[test]
    fn missing_server_member_is_reported() {
        let dir = tempdir().unwrap();
        let zip = dir.path().join("bundle.zip");
        zip_with(&zip, &[("vscode-server/other/server-linux-x64.tar.gz", b"x")]);

        let err = prepare_bundle_from_zip(&zip, "abc", dir.path()).unwrap_err();
        assert!(matches!(err, Error::MissingServerArchive { .. }));
    }

    #[test]
    fn unreadable_zip_is_corrupt() {
        let dir = tempdir().unwrap();
        let zip = dir.path().join("bundle.zip");
        fs::write(&zip, b"nope").unwrap();

        let err = prepare_bundle_from_zip(&zip, "abc", dir.path()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::CorruptArchive);
    }

    #[test]
    fn invalid_commit_fails_before_touching_disk() {
        let dir = tempdir().unwrap();
        let err = preseed_server(&dir.path().join("none.tar.gz"), dir.path(), "../up", &NoopLogger)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCommit(_)));
    }
}
