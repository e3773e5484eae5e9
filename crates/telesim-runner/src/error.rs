//! Error types for the engine boundary.

use std::path::PathBuf;
use telesim_ber::BerError;
use telesim_common::Cancelled;
use telesim_link::LinkError;
use telesim_model::ModelError;
use telesim_phy::PhyError;
use thiserror::Error;

/// Coarse classification of a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad modulation tag, antenna layout, emitter list, grid, ...
    Configuration,
    /// The numeric backend could not be used.
    Dependency,
    /// A channel or grid did not have the expected dimensions.
    Shape,
    /// The run was stopped through its cancel token.
    Cancelled,
    /// Reading or writing files.
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Dependency => "dependency",
            ErrorKind::Shape => "shape",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Io => "io",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while running requests.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The request could not be loaded or validated.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// A Monte-Carlo experiment failed.
    #[error(transparent)]
    Ber(#[from] BerError),

    /// A radio map failed.
    #[error(transparent)]
    Link(#[from] LinkError),

    /// Writing results failed.
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serializing results failed.
    #[error("Failed to serialize results: {0}")]
    Serialize(String),
}

impl RunnerError {
    /// Classify the error for the failure result and metrics.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RunnerError::Model(e) => match e {
                ModelError::Io { .. } => ErrorKind::Io,
                ModelError::Phy(p) => phy_kind(p),
                ModelError::Link(l) => link_kind(l),
                _ => ErrorKind::Configuration,
            },
            RunnerError::Ber(e) => match e {
                BerError::Phy(p) => phy_kind(p),
                BerError::Cancelled(_) => ErrorKind::Cancelled,
                BerError::InvalidParameter(_) => ErrorKind::Configuration,
            },
            RunnerError::Link(e) => link_kind(e),
            RunnerError::Io { .. } => ErrorKind::Io,
            RunnerError::Serialize(_) => ErrorKind::Io,
        }
    }
}

impl From<Cancelled> for RunnerError {
    fn from(c: Cancelled) -> Self {
        RunnerError::Ber(BerError::Cancelled(c))
    }
}

fn phy_kind(e: &PhyError) -> ErrorKind {
    match e {
        PhyError::BackendUnavailable(_) => ErrorKind::Dependency,
        PhyError::ShapeMismatch { .. } => ErrorKind::Shape,
        _ => ErrorKind::Configuration,
    }
}

fn link_kind(e: &LinkError) -> ErrorKind {
    match e {
        LinkError::ShapeMismatch { .. } => ErrorKind::Shape,
        LinkError::Cancelled(_) => ErrorKind::Cancelled,
        _ => ErrorKind::Configuration,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let e: RunnerError = BerError::Phy(PhyError::NonSquareOrder(32)).into();
        assert_eq!(e.kind(), ErrorKind::Configuration);

        let e: RunnerError = BerError::Phy(PhyError::BackendUnavailable("gpu".into())).into();
        assert_eq!(e.kind(), ErrorKind::Dependency);

        let e: RunnerError = BerError::Phy(PhyError::ShapeMismatch {
            what: "received",
            expected: 4,
            actual: 2,
        })
        .into();
        assert_eq!(e.kind(), ErrorKind::Shape);

        let e: RunnerError = LinkError::Cancelled(Cancelled::Requested).into();
        assert_eq!(e.kind(), ErrorKind::Cancelled);

        let e: RunnerError = ModelError::InvalidRequest("x".into()).into();
        assert_eq!(e.kind(), ErrorKind::Configuration);

        let e: RunnerError = Cancelled::Requested.into();
        assert_eq!(e.kind(), ErrorKind::Cancelled);
    }
}
