use std::io;
use std::path::PathBuf;

use crate::sanitize::PathViolation;
use crate::verify::Finding;

/// Failure categories surfaced to the orchestrator, one per exit path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    PathViolation,
    Manifest,
    ArchiveIncomplete,
    CorruptArchive,
    IntegrityFailure,
    Configuration,
    IncompleteInstall,
    Io,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    PathViolation(#[from] PathViolation),

    #[error("invalid manifest '{path}': {reason}")]
    Manifest { path: PathBuf, reason: String },

    #[error("archive incomplete, missing members: {}", .missing.join(", "))]
    ArchiveIncomplete { missing: Vec<String> },

    #[error("archive '{archive}' is corrupt or unreadable: {source}")]
    CorruptArchive {
        archive: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("failed to read archive member '{member}': {source}")]
    Archive {
        member: String,
        source: zip::result::ZipError,
    },

    #[error("integrity verification failed:\n{}", render_findings(.findings))]
    IntegrityFailure { findings: Vec<Finding> },

    #[error("failed to extract '{path}': {source}")]
    ExtractionFailed { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Fs(#[from] airlock_fs::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PathViolation(_) => ErrorKind::PathViolation,
            Self::Manifest { .. } => ErrorKind::Manifest,
            Self::ArchiveIncomplete { .. } => ErrorKind::ArchiveIncomplete,
            Self::CorruptArchive { .. } | Self::Archive { .. } => ErrorKind::CorruptArchive,
            Self::IntegrityFailure { .. } => ErrorKind::IntegrityFailure,
            Self::ExtractionFailed { .. } | Self::Fs(_) | Self::Io(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn manifest(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Manifest {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn corrupt(
        archive: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::CorruptArchive {
            archive: archive.into(),
            source: Box::new(source),
        }
    }
}

/// One finding per line.
pub fn render_findings(findings: &[Finding]) -> String {
    findings
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

pub type Result<T> = std::result::Result<T, Error>;
