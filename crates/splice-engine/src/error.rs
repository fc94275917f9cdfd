use std::path::PathBuf;

use ts::TsError;

/// Fatal errors of a single analysis run.
///
/// Stream defects and reconciliation inconsistencies are not errors; they
/// are collected into the report.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no transport stream packets could be read from `{path}`")]
    StreamUnreadable { path: String },

    #[error("failed to load configuration `{}`: {reason}", path.display())]
    ConfigLoad { path: PathBuf, reason: String },

    #[error("{tool} unavailable: {reason}")]
    CollaboratorUnavailable { tool: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport stream error: {0}")]
    Ts(#[from] TsError),
}

impl Error {
    pub fn stream_unreadable(path: impl Into<String>) -> Self {
        Self::StreamUnreadable { path: path.into() }
    }

    pub fn config_load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn collaborator(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CollaboratorUnavailable {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// True for errors that only affect the current file of a batch.
    pub fn is_per_file(&self) -> bool {
        !matches!(self, Self::ConfigLoad { .. })
    }
}
