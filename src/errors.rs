//! Error kinds shared across the repository engine
//!
//! Commands bubble failures up as `anyhow::Error`; the kinds below are the
//! domain failures that carry a defined exit code. `main` downcasts the
//! error chain to an `RvsError` to decide between an expected failure
//! (exit 1) and a fatal one (exit 128).

use std::path::PathBuf;
use thiserror::Error;

/// Exit code for expected, user-recoverable failures.
pub const EXIT_FAILURE: i32 = 1;

/// Exit code for fatal failures (corrupt repository, unknown revision).
pub const EXIT_FATAL: i32 = 128;

#[derive(Debug, Error)]
pub enum RvsError {
    #[error("not a rvs repository (or any of the parent directories): .rvs")]
    NotARepository,

    #[error("repository corrupt: {0}")]
    RepositoryCorrupt(String),

    #[error("'{0}' is not a valid ref name")]
    InvalidRef(String),

    #[error("short object id {0} is ambiguous")]
    AmbiguousRef(String),

    #[error("ambiguous argument '{0}': unknown revision or path not in the working tree")]
    UnknownRev(String),

    #[error("your local changes would be overwritten by {0}")]
    DirtyWorkingTree(String),

    #[error("Automatic merge failed; fix conflicts and then commit the result.")]
    MergeConflict,

    #[error("nothing to commit, working tree clean")]
    NothingToCommit,

    #[error("'{}' is outside repository", .0.display())]
    PathOutsideRepo(PathBuf),

    #[error("Unable to create index lock: File exists.")]
    IndexLocked,

    #[error("'{}' is locked", .0.display())]
    WorktreeLocked(PathBuf),

    #[error("'{}' already exists", .0.display())]
    WorktreeExists(PathBuf),

    #[error("a branch named '{0}' already exists")]
    BranchExists(String),

    #[error("the branch '{0}' is not fully merged")]
    BranchNotFullyMerged(String),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Usage(String),
}

impl RvsError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RvsError::Io {
            path: path.into(),
            source,
        }
    }

    /// Exit code this failure maps to.
    pub fn exit_code(&self) -> i32 {
        match self {
            RvsError::DirtyWorkingTree(_)
            | RvsError::MergeConflict
            | RvsError::NothingToCommit
            | RvsError::IndexLocked
            | RvsError::WorktreeLocked(_)
            | RvsError::WorktreeExists(_)
            | RvsError::BranchExists(_)
            | RvsError::BranchNotFullyMerged(_)
            | RvsError::Usage(_) => EXIT_FAILURE,
            RvsError::NotARepository
            | RvsError::RepositoryCorrupt(_)
            | RvsError::InvalidRef(_)
            | RvsError::AmbiguousRef(_)
            | RvsError::UnknownRev(_)
            | RvsError::PathOutsideRepo(_)
            | RvsError::Io { .. } => EXIT_FATAL,
        }
    }

    /// Failures the command already reported on its own output; `main`
    /// must not print them a second time.
    pub fn already_reported(&self) -> bool {
        matches!(
            self,
            RvsError::NothingToCommit | RvsError::MergeConflict | RvsError::DirtyWorkingTree(_)
        )
    }
}
