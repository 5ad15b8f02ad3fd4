//! Whole-project build validation.

use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::warn;

/// Result of running the project's build command.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub passed: bool,
    /// Captured diagnostics, fed to the feedback composer on failure.
    pub stderr: String,
}

impl BuildOutcome {
    fn pass() -> Self {
        Self {
            passed: true,
            stderr: String::new(),
        }
    }
}

pub struct BuildValidator {
    command: Vec<String>,
}

impl BuildValidator {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }

    /// Run the build command in the project root and wait to completion.
    /// Passes iff the process exits zero. A command that cannot be launched
    /// at all (tool missing) counts as a pass: skipping validation beats
    /// blocking the whole pipeline on an environment problem.
    pub async fn validate(&self, project_root: &Path) -> BuildOutcome {
        let Some((program, args)) = self.command.split_first() else {
            return BuildOutcome::pass();
        };

        let output = Command::new(program)
            .args(args)
            .current_dir(project_root)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await;

        match output {
            Ok(output) => BuildOutcome {
                passed: output.status.success(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            },
            Err(err) => {
                warn!("build tool {program:?} unavailable, skipping validation: {err}");
                BuildOutcome::pass()
            }
        }
    }
}
