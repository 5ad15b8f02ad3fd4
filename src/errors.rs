//! Typed error hierarchy for the codedrop agent.
//!
//! Three enums cover the three fallible subsystems:
//! - `WriteError` — per-file failures in the file writer
//! - `VcsError` — git operation failures (swallowed at the workflow layer)
//! - `ChannelError` — clipboard tool failures
//!
//! Build validation deliberately has no error type: a build that cannot even
//! be launched counts as a pass (fail-open), and a failing build is an
//! outcome, not an error.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from writing a single file payload. A `WriteError` never aborts
/// the surrounding batch; the file is skipped and excluded from the
/// modified set.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("payload path {path:?} escapes the project root")]
    ContainmentViolation { path: String },

    #[error("syntax check rejected {path:?}")]
    SyntaxRejected { path: String },

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the VCS workflow.
#[derive(Debug, Error)]
pub enum VcsError {
    #[error("git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("failed to run git: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("git push failed: {detail}")]
    PushFailed { detail: String },
}

/// Errors from the shared text channel (clipboard) abstraction.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("failed to run {tool}: {source}")]
    Tool {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with status {status}")]
    ToolStatus { tool: String, status: i32 },
}
