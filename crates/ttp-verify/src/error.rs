use std::path::PathBuf;

use ttp_load::LoadFailure;

/// Errors that stop a verification run before any finding is produced.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Load(#[from] LoadFailure),

    #[error("unknown validation profile '{0}' (expected lenient, standard or strict)")]
    UnknownProfile(String),
}

pub type Result<T> = std::result::Result<T, VerifyError>;
