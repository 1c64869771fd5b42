//! Gzip-compressed tarball unpacking with wrapper-directory stripping.
//!
//! Server tarballs conventionally carry every entry under one top-level
//! directory (`vscode-server-linux-x64/...`). Unpacking detects that wrapper
//! in a first pass and strips it in a second, so the contents land directly
//! in the destination.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use airlock_log::Logger;
use flate2::read::GzDecoder;
use tar::EntryType;

use crate::error::{Error, Result};
use crate::sanitize::{PathViolation, Violation, sanitize_member, sanitize_symlink_target};

#[derive(Clone, Debug, Default)]
pub struct UnpackReport {
    pub files: usize,
    pub directories: usize,
    pub links: usize,
    /// Entries of unsupported types, by archive path.
    pub skipped: Vec<String>,
}

/// Archive-root entries such as `./` carry no content.
fn is_root_entry(raw: &str) -> bool {
    raw.chars().all(|c| c == '.' || c == '/')
}

fn entry_name<R: Read>(entry: &tar::Entry<'_, R>) -> Option<std::result::Result<String, PathViolation>> {
    let raw = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
    if is_root_entry(&raw) {
        return None;
    }
    Some(sanitize_member(&raw))
}

/// Return the single top-level directory shared by every entry, if any.
pub fn detect_wrapper<R: Read>(reader: R, label: &str) -> Result<Option<String>> {
    let mut archive = tar::Archive::new(reader);
    let mut roots = BTreeSet::new();
    let mut nested = false;

    for entry in archive.entries().map_err(|e| Error::corrupt(label, e))? {
        let entry = entry.map_err(|e| Error::corrupt(label, e))?;
        let Some(name) = entry_name(&entry) else {
            continue;
        };
        let name = name?;
        match name.split_once('/') {
            Some((root, _)) => {
                nested = true;
                roots.insert(root.to_string());
            }
            None if entry.header().entry_type().is_dir() => {
                roots.insert(name);
            }
            None => return Ok(None),
        }
        if roots.len() > 1 {
            return Ok(None);
        }
    }

    Ok(if nested { roots.into_iter().next() } else { None })
}

fn strip<'a>(name: &'a str, wrapper: Option<&str>) -> Option<&'a str> {
    match wrapper {
        Some(wrapper) if name == wrapper => None,
        Some(wrapper) => Some(
            name.strip_prefix(wrapper)
                .and_then(|rest| rest.strip_prefix('/'))
                .unwrap_or(name),
        ),
        None => Some(name),
    }
}

/// Unpack a tar stream into `dest`, removing `wrapper` from every path.
///
/// Member paths are sanitized and any violation aborts the unpack. Symlinks
/// must resolve inside `dest`, and no entry is written through a symlink
/// created earlier in the same archive. Hardlinks are resolved against the
/// stripped layout. Other entry types are skipped with a warning.
pub fn unpack_stripped<R: Read>(
    reader: R,
    dest: &Path,
    wrapper: Option<&str>,
    label: &str,
    log: &dyn Logger,
) -> Result<UnpackReport> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.set_preserve_mtime(true);

    let mut report = UnpackReport::default();
    fs::create_dir_all(dest).map_err(|e| extraction_failed(dest, e))?;

    for entry in archive.entries().map_err(|e| Error::corrupt(label, e))? {
        let mut entry = entry.map_err(|e| Error::corrupt(label, e))?;
        let Some(name) = entry_name(&entry) else {
            continue;
        };
        let name = name?;
        let Some(relative) = strip(&name, wrapper) else {
            continue;
        };
        ensure_no_symlink_parent(dest, relative)?;
        let out = dest.join(relative);

        let kind = entry.header().entry_type();
        match kind {
            EntryType::Directory => {
                fs::create_dir_all(&out).map_err(|e| extraction_failed(&out, e))?;
                report.directories += 1;
            }
            EntryType::Regular | EntryType::Continuous | EntryType::GNUSparse => {
                ensure_parent(&out)?;
                replace_existing(&out)?;
                entry.unpack(&out).map_err(|e| extraction_failed(&out, e))?;
                report.files += 1;
            }
            EntryType::Symlink => {
                let target = link_target(&entry, label)?;
                sanitize_symlink_target(&target, &out, dest)?;
                ensure_parent(&out)?;
                create_symlink(&target, &out, log)?;
                report.links += 1;
            }
            EntryType::Link => {
                let target = link_target(&entry, label)?;
                let target_name = sanitize_member(&target.to_string_lossy())?;
                let source = match strip(&target_name, wrapper) {
                    Some(stripped) => {
                        ensure_no_symlink_parent(dest, stripped)?;
                        dest.join(stripped)
                    }
                    None => dest.to_path_buf(),
                };
                ensure_parent(&out)?;
                replace_existing(&out)?;
                fs::hard_link(&source, &out).map_err(|e| extraction_failed(&out, e))?;
                report.links += 1;
            }
            other => {
                log.warning(&format!("skipping unsupported tar entry '{name}' ({other:?})"));
                report.skipped.push(name);
            }
        }
    }

    log.debug(&format!(
        "unpacked {label}: {} file(s), {} dir(s), {} link(s)",
        report.files, report.directories, report.links
    ));
    Ok(report)
}

/// Unpack a `.tar.gz` file into `dest`, stripping its wrapper directory.
pub fn unpack_tar_gz_stripped(
    archive: impl AsRef<Path>,
    dest: impl AsRef<Path>,
    log: &dyn Logger,
) -> Result<UnpackReport> {
    let archive = archive.as_ref();
    let label = archive.display().to_string();

    let wrapper = detect_wrapper(open_gz(archive, &label)?, &label)?;
    if let Some(wrapper) = &wrapper {
        log.debug(&format!("stripping wrapper directory '{wrapper}' from {label}"));
    }
    unpack_stripped(open_gz(archive, &label)?, dest.as_ref(), wrapper.as_deref(), &label, log)
}

fn open_gz(path: &Path, label: &str) -> Result<GzDecoder<BufReader<File>>> {
    let file = File::open(path).map_err(|e| Error::corrupt(label, e))?;
    Ok(GzDecoder::new(BufReader::new(file)))
}

fn link_target<R: Read>(entry: &tar::Entry<'_, R>, label: &str) -> Result<PathBuf> {
    match entry.link_name() {
        Ok(Some(target)) => Ok(target.into_owned()),
        Ok(None) => Err(Error::corrupt(
            label,
            std::io::Error::new(std::io::ErrorKind::InvalidData, "link entry without a target"),
        )),
        Err(e) => Err(Error::corrupt(label, e)),
    }
}

/// Fail when an existing parent of `relative` below `dest` is a symlink.
fn ensure_no_symlink_parent(dest: &Path, relative: &str) -> Result<()> {
    let Some((parents, _)) = relative.rsplit_once('/') else {
        return Ok(());
    };
    let mut current = dest.to_path_buf();
    for segment in parents.split('/') {
        current.push(segment);
        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => {
                return Err(PathViolation {
                    path: relative.to_string(),
                    reason: Violation::ThroughSymlink,
                }
                .into());
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| extraction_failed(parent, e))?;
    }
    Ok(())
}

fn replace_existing(path: &Path) -> Result<()> {
    if fs::symlink_metadata(path).is_ok() {
        airlock_fs::remove_path(path)?;
    }
    Ok(())
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path, _log: &dyn Logger) -> Result<()> {
    replace_existing(link)?;
    std::os::unix::fs::symlink(target, link).map_err(|e| extraction_failed(link, e))
}

#[cfg(not(unix))]
fn create_symlink(target: &Path, link: &Path, log: &dyn Logger) -> Result<()> {
    log.warning(&format!(
        "symlinks unsupported on this platform; skipping {} -> {}",
        link.display(),
        target.display()
    ));
    Ok(())
}

fn extraction_failed(path: &Path, source: std::io::Error) -> Error {
    Error::ExtractionFailed {
        path: path.to_path_buf(),
        source,
    }
}
