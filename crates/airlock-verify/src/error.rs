use std::io;

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("failed to read data for hashing: {0}")]
    Read(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, VerifyError>;
