use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read '{path}': {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("failed to write '{path}': {source}")]
    Write { path: PathBuf, source: std::io::Error },

    #[error("failed to remove '{path}': {source}")]
    Remove { path: PathBuf, source: std::io::Error },

    #[error("failed to set permissions on '{path}': {source}")]
    Permissions { path: PathBuf, source: std::io::Error },

    #[error("destination already exists: '{0}'")]
    AlreadyExists(PathBuf),

    #[error("directory is not writable: '{path}': {source}")]
    NotWritable { path: PathBuf, source: std::io::Error },
}

impl Error {
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Read { path, .. }
            | Self::Write { path, .. }
            | Self::Remove { path, .. }
            | Self::Permissions { path, .. }
            | Self::NotWritable { path, .. } => path,
            Self::AlreadyExists(path) => path,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
