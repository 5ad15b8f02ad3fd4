//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module   | Commands handled          |
//! |----------|---------------------------|
//! | `watch`  | `Watch`, `Apply`, `Review`|
//! | `logs`   | `Logs`, `Close`           |
//! | `config` | `Config`                  |

pub mod config;
pub mod logs;
pub mod watch;

pub use config::cmd_config;
pub use logs::{cmd_close, cmd_logs};
pub use watch::{cmd_apply, cmd_review, cmd_watch};

use codedrop::agent::Agent;
use codedrop::channel::SystemClipboard;
use codedrop::settings::{GitMode, Settings};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

/// Build an agent wired to the real system clipboard from the resolved
/// settings. Shared entry point for every command that needs one.
pub(crate) fn build_agent(
    project_root: Option<PathBuf>,
    git_mode: Option<GitMode>,
) -> Result<Arc<Agent>> {
    let settings = Settings::load(project_root, git_mode)?;
    let clipboard = Arc::new(SystemClipboard::detect());
    Ok(Arc::new(Agent::new(settings, clipboard)))
}
