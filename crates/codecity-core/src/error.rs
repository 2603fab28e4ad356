use std::path::PathBuf;

use thiserror::Error;

/// Failures of the source loading side of an analysis.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk {}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("syntax error in {} at line {line}", path.display())]
    Syntax { path: PathBuf, line: usize },

    #[error("{} has no package clause", path.display())]
    MissingPackage { path: PathBuf },

    #[error("remote project locators are not supported: {0}")]
    RemoteUnsupported(String),

    #[error("project path does not exist: {}", .0.display())]
    NotFound(PathBuf),
}

impl SourceError {
    /// The first `SourceError` in the cause chain of `err`.
    pub fn find(err: &anyhow::Error) -> Option<&SourceError> {
        err.chain().find_map(|cause| cause.downcast_ref::<SourceError>())
    }
}
