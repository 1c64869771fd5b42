use std::fmt;
use std::path::PathBuf;

pub use airlock_archive::ErrorKind;

/// One victim that could not be moved into the backup session.
#[derive(Debug)]
pub struct BackupFailure {
    pub path: PathBuf,
    pub source: airlock_fs::Error,
}

impl fmt::Display for BackupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.source)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("incomplete install in '{dir}', missing or not executable: {}", .missing.join(", "))]
    IncompleteInstall { dir: PathBuf, missing: Vec<String> },

    #[error("backup failed for {} item(s):\n{}", .failures.len(), render_failures(.failures))]
    Backup { failures: Vec<BackupFailure> },

    #[error("no server tarball for commit '{commit}' in '{archive}'")]
    MissingServerArchive { archive: PathBuf, commit: String },

    #[error("invalid commit identifier '{0}'")]
    InvalidCommit(String),

    #[error("failed to run '{program}': {source}")]
    Installer {
        program: String,
        source: std::io::Error,
    },

    #[error("installing '{package}' exited with {status}:\n{output}")]
    InstallFailed {
        package: PathBuf,
        status: String,
        output: String,
    },

    #[error(transparent)]
    Archive(#[from] airlock_archive::Error),

    #[error(transparent)]
    Fs(#[from] airlock_fs::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) | Self::InvalidCommit(_) => ErrorKind::Configuration,
            Self::IncompleteInstall { .. } => ErrorKind::IncompleteInstall,
            Self::MissingServerArchive { .. } => ErrorKind::ArchiveIncomplete,
            Self::Archive(e) => e.kind(),
            Self::Backup { .. }
            | Self::Installer { .. }
            | Self::InstallFailed { .. }
            | Self::Fs(_)
            | Self::Io(_) => ErrorKind::Io,
        }
    }
}

fn render_failures(failures: &[BackupFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

pub type Result<T> = std::result::Result<T, Error>;
