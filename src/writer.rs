//! Atomic file writing for parsed payloads.
//!
//! Every write goes through three gates:
//! 1. containment — the payload path must stay inside the project root
//! 2. optional pre-write syntax check — extensions registered in the
//!    checker map are compiled in check-only mode from a scratch file
//! 3. atomic replace — content lands in a temp file in the target directory
//!    and is renamed over the final path, so a crash mid-write never leaves
//!    a half-written file visible.
//!
//! A failed write skips that file; it never aborts the batch.

use crate::errors::WriteError;
use crate::payload::FilePayload;
use std::collections::HashMap;
use std::io::Write as _;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Registry mapping a file extension to a check-only compiler invocation.
/// The scratch file path is appended as the final argument.
#[derive(Debug, Clone, Default)]
pub struct SyntaxCheckers {
    by_ext: HashMap<String, Vec<String>>,
}

impl SyntaxCheckers {
    pub fn new(by_ext: HashMap<String, Vec<String>>) -> Self {
        Self { by_ext }
    }

    pub fn lookup(&self, ext: &str) -> Option<&[String]> {
        self.by_ext.get(ext).map(Vec::as_slice)
    }
}

pub struct FileWriter {
    root: PathBuf,
    checkers: SyntaxCheckers,
}

impl FileWriter {
    pub fn new(root: impl AsRef<Path>, checkers: SyntaxCheckers) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            checkers,
        }
    }

    /// Write one payload under the project root. On success the file at
    /// `root/payload.path` holds exactly `payload.content`; on failure the
    /// tree is unchanged.
    pub async fn write(&self, payload: &FilePayload) -> Result<(), WriteError> {
        let target = self.contained_path(&payload.path)?;

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|source| WriteError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        if let Some(ext) = target.extension().and_then(|e| e.to_str())
            && let Some(check_cmd) = self.checkers.lookup(ext)
            && !syntax_check(check_cmd, ext, &payload.content).await?
        {
            return Err(WriteError::SyntaxRejected {
                path: payload.path.clone(),
            });
        }

        atomic_write(&target, &payload.content)?;
        debug!("wrote {}", target.display());
        Ok(())
    }

    /// Join the relative payload path onto the root, rejecting anything
    /// that could land outside it: absolute paths, drive prefixes, and
    /// parent-directory components.
    fn contained_path(&self, rel: &str) -> Result<PathBuf, WriteError> {
        let rel_path = Path::new(rel);
        let escapes = rel_path.is_absolute()
            || rel_path.components().any(|c| {
                matches!(c, Component::ParentDir | Component::Prefix(_) | Component::RootDir)
            });
        if escapes {
            return Err(WriteError::ContainmentViolation {
                path: rel.to_string(),
            });
        }
        Ok(self.root.join(rel_path))
    }
}

/// Run a check-only compile of `content` from a scratch file. The scratch
/// directory is dropped on every exit path. An empty command or a checker
/// binary that cannot be launched counts as a pass: validation is skipped
/// rather than blocking the batch on a configuration or environment problem.
async fn syntax_check(check_cmd: &[String], ext: &str, content: &str) -> Result<bool, WriteError> {
    let Some((program, args)) = check_cmd.split_first() else {
        return Ok(true);
    };

    let scratch_dir = tempfile::tempdir().map_err(|source| WriteError::Io {
        path: std::env::temp_dir(),
        source,
    })?;
    let scratch = scratch_dir.path().join(format!("scratch.{ext}"));
    std::fs::write(&scratch, content).map_err(|source| WriteError::Io {
        path: scratch.clone(),
        source,
    })?;

    let status = Command::new(program)
        .args(args)
        .arg(&scratch)
        .current_dir(scratch_dir.path())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match status {
        Ok(status) => Ok(status.success()),
        Err(err) => {
            warn!("checker {program:?} unavailable, skipping check: {err}");
            Ok(true)
        }
    }
}

/// Write-to-temp-then-rename in the target's own directory, so the rename
/// stays on one filesystem and is atomic.
fn atomic_write(target: &Path, content: &str) -> Result<(), WriteError> {
    let dir = target.parent().unwrap_or(Path::new("."));
    let io_err = |source| WriteError::Io {
        path: target.to_path_buf(),
        source,
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(content.as_bytes()).map_err(io_err)?;
    tmp.flush().map_err(io_err)?;
    tmp.persist(target)
        .map_err(|e| io_err(e.error))?;
    Ok(())
}
