//! Selective extraction of manifest-approved members.
//!
//! Only members named by the manifest are written; anything else the archive
//! happens to carry is ignored. Each file is streamed into a sibling temp file
//! and renamed into place, so a failed run never leaves a half-written member
//! under its final name.

use std::fs::{self, File};
use std::io::{self, Read, Seek};
use std::path::{Path, PathBuf};

use airlock_log::Logger;

use crate::bundle::Bundle;
use crate::error::{Error, Result};
use crate::manifest::{ManifestEntry, load_manifest};
use crate::sanitize::sanitize_path;
use crate::verify::{Finding, VerificationMode, check_integrity};

#[derive(Clone, Copy, Debug, Default)]
pub struct ExtractOptions {
    pub dry_run: bool,
    pub verification: VerificationMode,
}

impl ExtractOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn verification(mut self, mode: VerificationMode) -> Self {
        self.verification = mode;
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct ExtractReport {
    /// Members written, or that would have been written under dry-run.
    pub count: usize,
    /// Destination of every file written; empty under dry-run.
    pub files: Vec<PathBuf>,
    /// Findings tolerated under `VerificationMode::Warn`.
    pub findings: Vec<Finding>,
    pub dry_run: bool,
}

/// Open `archive`, load `manifest`, then verify and extract.
///
/// The archive is opened first so an unreadable container is reported as
/// `CorruptArchive` before the manifest is even looked at.
pub fn extract_archive(
    archive: impl AsRef<Path>,
    manifest: impl AsRef<Path>,
    target: impl AsRef<Path>,
    options: &ExtractOptions,
    log: &dyn Logger,
) -> Result<ExtractReport> {
    let mut bundle = Bundle::open(archive)?;
    let entries = load_manifest(manifest)?;
    extract_entries(&mut bundle, &entries, target.as_ref(), options, log)
}

/// Verify `entries` against `bundle` and extract them under `target`.
pub fn extract_entries<R: Read + Seek>(
    bundle: &mut Bundle<R>,
    entries: &[ManifestEntry],
    target: &Path,
    options: &ExtractOptions,
    log: &dyn Logger,
) -> Result<ExtractReport> {
    if entries.is_empty() {
        log.info("manifest lists no files; nothing to extract");
        return Ok(ExtractReport {
            dry_run: options.dry_run,
            ..Default::default()
        });
    }

    let findings = check_integrity(bundle, entries, options.verification, log)?;

    let mut planned = Vec::with_capacity(entries.len());
    for entry in entries {
        planned.push(sanitize_path(&entry.member, target)?);
    }

    if options.dry_run {
        log.info(&format!(
            "dry run: would extract {} member(s) to {}",
            planned.len(),
            target.display()
        ));
        return Ok(ExtractReport {
            count: planned.len(),
            files: Vec::new(),
            findings,
            dry_run: true,
        });
    }

    fs::create_dir_all(target).map_err(|e| Error::ExtractionFailed {
        path: target.to_path_buf(),
        source: e,
    })?;

    let mut files = Vec::with_capacity(planned.len());
    for sanitized in &planned {
        if bundle.is_dir(&sanitized.member)? {
            fs::create_dir_all(&sanitized.resolved).map_err(|e| Error::ExtractionFailed {
                path: sanitized.resolved.clone(),
                source: e,
            })?;
            continue;
        }

        let reader = bundle.member_reader(&sanitized.member)?;
        write_streamed(reader, &sanitized.resolved)?;
        log.debug(&format!("extracted {}", sanitized.member));
        files.push(sanitized.resolved.clone());
    }

    log.info(&format!("extracted {} member(s) to {}", planned.len(), target.display()));
    Ok(ExtractReport {
        count: planned.len(),
        files,
        findings,
        dry_run: false,
    })
}

fn write_streamed(mut reader: impl Read, dest: &Path) -> Result<()> {
    let parent = dest.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(parent).map_err(|e| Error::ExtractionFailed {
        path: parent.to_path_buf(),
        source: e,
    })?;

    let file_name = dest.file_name().unwrap_or_default().to_string_lossy();
    let partial = parent.join(format!(".{file_name}.part"));

    let written = File::create(&partial).and_then(|mut out| {
        io::copy(&mut reader, &mut out)?;
        out.sync_all()
    });
    let renamed = written.and_then(|()| fs::rename(&partial, dest));

    renamed.map_err(|e| {
        let _ = fs::remove_file(&partial);
        Error::ExtractionFailed {
            path: dest.to_path_buf(),
            source: e,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use airlock_log::NoopLogger;
    use std::io::{Cursor, Write};
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;

    fn bundle_of(entries: &[(&str, &[u8])]) -> Bundle<Cursor<Vec<u8>>> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        let mut cursor = writer.finish().unwrap();
        cursor.set_position(0);
        Bundle::from_reader(cursor, "test.zip").unwrap()
    }

    fn entry(member: &str) -> ManifestEntry {
        ManifestEntry {
            member: member.to_string(),
            size: None,
            sha256: None,
        }
    }

    #[test]
    fn extracts_only_manifest_members() {
        let dir = tempdir().unwrap();
        let mut bundle = bundle_of(&[
            ("keep/a.vsix", b"a"),
            ("extra.sh", b"echo hi"),
            ("b.vsix", b"b"),
        ]);
        let entries = [entry("keep/a.vsix"), entry("b.vsix")];
        let options = ExtractOptions::new().verification(VerificationMode::None);

        let report = extract_entries(&mut bundle, &entries, dir.path(), &options, &NoopLogger).unwrap();

        assert_eq!(report.count, 2);
        assert_eq!(fs::read(dir.path().join("keep/a.vsix")).unwrap(), b"a");
        assert_eq!(fs::read(dir.path().join("b.vsix")).unwrap(), b"b");
        assert!(!dir.path().join("extra.sh").exists());
        assert!(!dir.path().join("keep/.a.vsix.part").exists());
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("not-yet");
        let mut bundle = bundle_of(&[("a.vsix", b"a")]);
        let options = ExtractOptions::new()
            .dry_run(true)
            .verification(VerificationMode::Warn);

        let report = extract_entries(&mut bundle, &[entry("a.vsix")], &target, &options, &NoopLogger).unwrap();

        assert!(report.dry_run);
        assert_eq!(report.count, 1);
        assert_eq!(report.findings.len(), 1);
        assert!(!target.exists());
    }

    #[test]
    fn dry_run_still_checks_existence() {
        let dir = tempdir().unwrap();
        let mut bundle = bundle_of(&[("a.vsix", b"a")]);
        let options = ExtractOptions::new().dry_run(true);

        let result = extract_entries(&mut bundle, &[entry("b.vsix")], dir.path(), &options, &NoopLogger);
        assert!(matches!(result, Err(Error::ArchiveIncomplete { .. })));
    }

    #[test]
    fn integrity_failure_writes_nothing() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("target");
        let mut bundle = bundle_of(&[("a.vsix", b"a"), ("b.vsix", b"b")]);
        let entries = [
            ManifestEntry {
                member: "a.vsix".into(),
                size: Some(1),
                sha256: Some(airlock_verify::Sha256Hasher::digest_hex(b"a")),
            },
            entry("b.vsix"),
        ];

        let result = extract_entries(&mut bundle, &entries, &target, &ExtractOptions::new(), &NoopLogger);
        assert!(matches!(result, Err(Error::IntegrityFailure { .. })));
        assert!(!target.exists());
    }

    #[test]
    fn empty_manifest_is_a_no_op() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("target");
        let mut bundle = bundle_of(&[("a.vsix", b"a")]);

        let report = extract_entries(&mut bundle, &[], &target, &ExtractOptions::new(), &NoopLogger).unwrap();
        assert_eq!(report.count, 0);
        assert!(!target.exists());
    }

    #[test]
    fn existing_files_are_replaced() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.vsix"), b"old contents").unwrap();
        let mut bundle = bundle_of(&[("a.vsix", b"new")]);
        let options = ExtractOptions::new().verification(VerificationMode::None);

        extract_entries(&mut bundle, &[entry("a.vsix")], dir.path(), &options, &NoopLogger).unwrap();
        assert_eq!(fs::read(dir.path().join("a.vsix")).unwrap(), b"new");
    }
}
