//! Layered configuration for the codedrop agent.
//!
//! Settings are read from `~/.codedrop/config.toml` when present, then
//! overridden by CLI flags. The file format:
//!
//! ```toml
//! [project]
//! root = "/home/me/src/myproject"
//!
//! [git]
//! mode = "safe"
//! branch_prefix = "drop"
//!
//! [build]
//! command = ["cargo", "build", "--quiet"]
//!
//! [monitor]
//! poll_interval_ms = 800
//!
//! # Extension -> check-only compiler invocation. The scratch file path is
//! # appended as the final argument.
//! [check]
//! py = ["python3", "-m", "py_compile"]
//! swift = ["swiftc", "-typecheck"]
//! ```

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Policy controlling what happens after a validated commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GitMode {
    /// Commit locally, no network operation.
    LocalOnly,
    /// Push a review branch named `<prefix>-<short-hash>`, never the
    /// current branch.
    #[default]
    Safe,
    /// Push the current branch directly to the remote.
    Yolo,
}

impl std::fmt::Display for GitMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitMode::LocalOnly => write!(f, "local-only"),
            GitMode::Safe => write!(f, "safe"),
            GitMode::Yolo => write!(f, "yolo"),
        }
    }
}

impl std::str::FromStr for GitMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local-only" | "local" => Ok(GitMode::LocalOnly),
            "safe" => Ok(GitMode::Safe),
            "yolo" => Ok(GitMode::Yolo),
            _ => anyhow::bail!(
                "Invalid git mode '{}'. Valid values: local-only, safe, yolo",
                s
            ),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ProjectSection {
    #[serde(default)]
    root: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GitSection {
    #[serde(default)]
    mode: GitMode,
    #[serde(default = "default_branch_prefix")]
    branch_prefix: String,
}

impl Default for GitSection {
    fn default() -> Self {
        Self {
            mode: GitMode::default(),
            branch_prefix: default_branch_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BuildSection {
    #[serde(default = "default_build_command")]
    command: Vec<String>,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            command: default_build_command(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MonitorSection {
    #[serde(default = "default_poll_interval_ms")]
    poll_interval_ms: u64,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_branch_prefix() -> String {
    "drop".to_string()
}

fn default_build_command() -> Vec<String> {
    vec!["cargo".into(), "build".into(), "--quiet".into()]
}

fn default_poll_interval_ms() -> u64 {
    800
}

fn default_syntax_checkers() -> HashMap<String, Vec<String>> {
    let mut map = HashMap::new();
    map.insert(
        "py".to_string(),
        vec!["python3".into(), "-m".into(), "py_compile".into()],
    );
    map.insert(
        "swift".to_string(),
        vec!["swiftc".into(), "-typecheck".into()],
    );
    map
}

/// On-disk configuration file shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    project: ProjectSection,
    #[serde(default)]
    git: GitSection,
    #[serde(default)]
    build: BuildSection,
    #[serde(default)]
    monitor: MonitorSection,
    #[serde(default)]
    check: Option<HashMap<String, Vec<String>>>,
}

/// Resolved runtime settings for one agent instance.
#[derive(Debug, Clone)]
pub struct Settings {
    pub project_root: PathBuf,
    pub git_mode: GitMode,
    pub branch_prefix: String,
    pub build_command: Vec<String>,
    pub poll_interval_ms: u64,
    pub syntax_checkers: HashMap<String, Vec<String>>,
    /// Per-user state directory holding the change-log files.
    pub state_dir: PathBuf,
}

impl Settings {
    /// Load from the default config file location, applying CLI overrides.
    /// The project root must come from somewhere: the file, or the
    /// `--project-root` flag.
    pub fn load(project_root: Option<PathBuf>, git_mode: Option<GitMode>) -> Result<Self> {
        let state_dir = default_state_dir()?;
        let file = read_config_file(&config_file_path(&state_dir))?;
        Self::resolve(file, project_root, git_mode, state_dir)
    }

    fn resolve(
        file: ConfigFile,
        project_root: Option<PathBuf>,
        git_mode: Option<GitMode>,
        state_dir: PathBuf,
    ) -> Result<Self> {
        let project_root = project_root
            .or(file.project.root)
            .ok_or_else(|| {
                anyhow!("No project root configured. Pass --project-root or set [project] root in config.toml")
            })?
            .canonicalize()
            .context("Failed to resolve project root")?;

        Ok(Self {
            project_root,
            git_mode: git_mode.unwrap_or(file.git.mode),
            branch_prefix: file.git.branch_prefix,
            build_command: file.build.command,
            poll_interval_ms: file.monitor.poll_interval_ms,
            syntax_checkers: file.check.unwrap_or_else(default_syntax_checkers),
            state_dir,
        })
    }

    /// Path of the persisted change-log file for this project, keyed by the
    /// project root's basename.
    pub fn changelog_path(&self) -> PathBuf {
        let name = self
            .project_root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "project".to_string());
        self.state_dir.join("logs").join(format!("{}.json", name))
    }
}

fn default_state_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Failed to locate home directory")?;
    Ok(home.join(".codedrop"))
}

fn config_file_path(state_dir: &Path) -> PathBuf {
    state_dir.join("config.toml")
}

fn read_config_file(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        return Ok(ConfigFile::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

/// Render a default config file, used by `codedrop config init`.
pub fn default_config_toml(project_root: Option<&Path>) -> String {
    let mut file = ConfigFile::default();
    file.project.root = project_root.map(Path::to_path_buf);
    file.check = Some(default_syntax_checkers());
    toml::to_string_pretty(&file).expect("default config serializes")
}

/// Write a default config file under the per-user state directory.
/// Returns the path written. Refuses to overwrite an existing file.
pub fn init_config_file(project_root: Option<&Path>) -> Result<PathBuf> {
    let state_dir = default_state_dir()?;
    let path = config_file_path(&state_dir);
    if path.exists() {
        anyhow::bail!("Config file already exists at {}", path.display());
    }
    std::fs::create_dir_all(&state_dir)
        .with_context(|| format!("Failed to create {}", state_dir.display()))?;
    std::fs::write(&path, default_config_toml(project_root))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// Show the active config file path and contents, for `codedrop config show`.
pub fn show_config() -> Result<(PathBuf, Option<String>)> {
    let state_dir = default_state_dir()?;
    let path = config_file_path(&state_dir);
    let content = if path.exists() {
        Some(std::fs::read_to_string(&path)?)
    } else {
        None
    };
    Ok((path, content))
}
