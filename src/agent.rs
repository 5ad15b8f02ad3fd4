//! The agent: one value owning all mutable state for one project root,
//! orchestrating the detect → parse → write → validate → commit-or-report
//! loop.
//!
//! Concurrency model: the monitor's poll task calls `detect` and spawns
//! `process_text` for each trigger. The file-write phase of a batch holds
//! `write_gate` for the whole batch, so two back-to-back triggers can never
//! interleave their writes. Later stages (build, commit) intentionally run
//! outside the gate; a second batch may start writing while the first is
//! still building.

use crate::builder::BuildValidator;
use crate::changelog::{ChangeLogEntry, ChangeLogStore};
use crate::channel::Channel;
use crate::feedback::{self, NoopPaster, Paster};
use crate::monitor::{self, Verdict};
use crate::payload::{self, FilePayload};
use crate::settings::{GitMode, Settings};
use crate::vcs::GitWorkflow;
use crate::writer::{FileWriter, SyntaxCheckers};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Collaborator receiving triggered text that parsed to zero payloads.
/// Zero payloads is not an error; the text is plain chat.
pub trait ChatForwarder: Send + Sync {
    fn forward(&self, text: &str);
}

struct LogForwarder;

impl ChatForwarder for LogForwarder {
    fn forward(&self, text: &str) {
        info!("no payloads in triggered text ({} chars), forwarding", text.len());
    }
}

/// Collaborator fired when a batch lands, e.g. a desktop notification.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str);
}

struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) {
        info!("{title}: {body}");
    }
}

pub struct Agent {
    settings: Settings,
    channel: Arc<dyn Channel>,
    writer: FileWriter,
    builder: BuildValidator,
    vcs: GitWorkflow,
    store: tokio::sync::Mutex<ChangeLogStore>,
    /// Serializes the file-write phase across batches. The system's one
    /// explicit mutual-exclusion boundary.
    write_gate: tokio::sync::Mutex<()>,
    status_tx: watch::Sender<String>,
    forwarder: Box<dyn ChatForwarder>,
    paster: Box<dyn Paster>,
    notifier: Box<dyn Notifier>,
    last_change_count: AtomicU64,
    last_external_text: std::sync::Mutex<String>,
}

impl Agent {
    pub fn new(settings: Settings, channel: Arc<dyn Channel>) -> Self {
        let writer = FileWriter::new(
            &settings.project_root,
            SyntaxCheckers::new(settings.syntax_checkers.clone()),
        );
        let builder = BuildValidator::new(settings.build_command.clone());
        let vcs = GitWorkflow::new(&settings.project_root);
        let store = ChangeLogStore::load(settings.changelog_path());
        let (status_tx, _) = watch::channel(String::new());
        // Prime the counter so content already on the channel at startup is
        // not mistaken for a fresh change.
        let last_change_count = AtomicU64::new(channel.change_count());

        Self {
            settings,
            channel,
            writer,
            builder,
            vcs,
            store: tokio::sync::Mutex::new(store),
            write_gate: tokio::sync::Mutex::new(()),
            status_tx,
            forwarder: Box::new(LogForwarder),
            paster: Box::new(NoopPaster),
            notifier: Box::new(LogNotifier),
            last_change_count,
            last_external_text: std::sync::Mutex::new(String::new()),
        }
    }

    pub fn with_paster(mut self, paster: Box<dyn Paster>) -> Self {
        self.paster = paster;
        self
    }

    pub fn with_forwarder(mut self, forwarder: Box<dyn ChatForwarder>) -> Self {
        self.forwarder = forwarder;
        self
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn poll_interval_ms(&self) -> u64 {
        self.settings.poll_interval_ms
    }

    pub fn project_root(&self) -> &Path {
        &self.settings.project_root
    }

    /// Subscribe to the single human-readable status line.
    pub fn status_rx(&self) -> watch::Receiver<String> {
        self.status_tx.subscribe()
    }

    pub async fn change_logs(&self) -> Vec<ChangeLogEntry> {
        self.store.lock().await.entries().to_vec()
    }

    fn set_status(&self, status: &str) {
        let _ = self.status_tx.send_replace(status.to_string());
    }

    /// One poll tick: returns triggered text to process, if any. Runs on
    /// the monitor's single task; never blocks on heavy work.
    pub fn detect(&self) -> Option<String> {
        let count = self.channel.change_count();
        if count == self.last_change_count.load(Ordering::Acquire) {
            return None;
        }
        self.last_change_count.store(count, Ordering::Release);

        let text = match self.channel.read() {
            Ok(text) => text,
            Err(err) => {
                warn!("channel read failed: {err}");
                return None;
            }
        };

        match monitor::classify(&text) {
            Verdict::SelfAuthored => {
                debug!("ignoring self-authored channel content");
                None
            }
            Verdict::Trigger => {
                info!("trigger detected on channel");
                self.restore_external_text();
                Some(text)
            }
            Verdict::External => {
                *self.last_external_text.lock().expect("echo lock") = text;
                None
            }
            Verdict::Ignored => None,
        }
    }

    /// Put the last externally-authored content back on the channel after a
    /// trigger was consumed, so the user does not lose their clipboard.
    fn restore_external_text(&self) {
        let saved = self.last_external_text.lock().expect("echo lock").clone();
        if saved.is_empty() {
            return;
        }
        if let Err(err) = self.channel.write(&saved) {
            warn!("failed to restore channel content: {err}");
            return;
        }
        self.last_change_count
            .store(self.channel.change_count(), Ordering::Release);
    }

    /// Write text to the channel as the agent, bumping the counter
    /// bookkeeping so the next tick does not re-read our own output.
    fn publish(&self, text: &str) {
        if let Err(err) = self.channel.write(text) {
            warn!("failed to publish to channel: {err}");
            return;
        }
        self.last_change_count
            .store(self.channel.change_count(), Ordering::Release);
    }

    /// Run one triggered batch through the full pipeline.
    pub async fn process_text(&self, text: &str) {
        self.set_status("Processing...");

        let payloads = payload::parse(text);
        if payloads.is_empty() {
            self.forwarder.forward(text);
            self.set_status("");
            return;
        }
        debug!("parsed {} payload(s)", payloads.len());

        let modified = self.write_batch(&payloads).await;
        if modified.is_empty() {
            self.set_status("No valid tags found");
            return;
        }

        self.set_status("Running build check...");
        let outcome = self.builder.validate(&self.settings.project_root).await;
        if !outcome.passed {
            self.set_status("Build failed - changes rejected");
            let prompt = feedback::compose_build_failure(&outcome.stderr);
            self.publish(&prompt);
            self.paster.simulate_paste();
            return;
        }

        self.set_status("Committing...");
        let summary = commit_summary(&modified);
        self.commit_and_push(&summary).await;
        self.set_status("");
    }

    /// Write the whole batch under the write gate. Per-file failures skip
    /// that file and keep going; the returned list holds the paths that
    /// actually landed, in first-write order without duplicates.
    async fn write_batch(&self, payloads: &[FilePayload]) -> Vec<String> {
        let _gate = self.write_gate.lock().await;
        let mut modified: Vec<String> = Vec::new();
        for payload in payloads {
            match self.writer.write(payload).await {
                Ok(()) => {
                    if !modified.contains(&payload.path) {
                        modified.push(payload.path.clone());
                    }
                }
                Err(err) => warn!("skipping {}: {err}", payload.path),
            }
        }
        modified
    }

    /// Commit, then branch/push per the active GitMode. Git failures after
    /// this point are swallowed: the local commit stands, and an entry is
    /// recorded with the best hash available.
    async fn commit_and_push(&self, summary: &str) {
        let hash = match self.vcs.commit_all(summary) {
            Ok(Some(hash)) => hash,
            Ok(None) => {
                info!("tree unchanged, nothing to commit");
                return;
            }
            Err(err) => {
                warn!("commit failed: {err}");
                self.vcs.short_head().unwrap_or_else(|| "unknown".to_string())
            }
        };

        let title = match self.settings.git_mode {
            GitMode::LocalOnly => "Local commit",
            GitMode::Safe => {
                let branch = format!("{}-{}", self.settings.branch_prefix, hash);
                if let Err(err) = self.vcs.create_branch(&branch) {
                    warn!("branch create failed: {err}");
                }
                if let Err(err) = self.vcs.push(Some(&branch)).await {
                    warn!("branch push failed: {err}");
                }
                "Review branch pushed"
            }
            GitMode::Yolo => {
                if let Err(err) = self.vcs.push(None).await {
                    warn!("push failed: {err}");
                }
                "Pushed to remote"
            }
        };

        let entry = ChangeLogEntry::new(hash, summary);
        if let Err(err) = self.store.lock().await.append(entry) {
            warn!("failed to persist change log: {err}");
        }
        self.notifier.notify(title, summary);
    }

    /// Force a re-parse of whatever is on the channel right now, bypassing
    /// the trigger check.
    pub async fn apply_now(&self) {
        match self.channel.read() {
            Ok(text) => self.process_text(&text).await,
            Err(err) => warn!("channel read failed: {err}"),
        }
    }

    /// Publish a diff-review prompt for the most recent log entry.
    /// Returns false when there is nothing to review.
    pub async fn review_latest(&self) -> bool {
        let hash = match self.store.lock().await.latest() {
            Some(entry) => entry.commit_hash.clone(),
            None => return false,
        };
        let diff = match self.vcs.show(&hash) {
            Ok(diff) => diff,
            Err(err) => {
                warn!("could not load diff for {hash}: {err}");
                String::new()
            }
        };
        self.publish(&feedback::compose_review_request(&hash, &diff));
        self.paster.simulate_paste();
        true
    }

    /// Revert a logged entry: delete its review branch (remote then local,
    /// both best-effort) and drop it from the persisted log.
    /// Returns the removed entry, if the hash was known.
    pub async fn close_entry(&self, commit_hash: &str) -> Option<ChangeLogEntry> {
        let branch = format!("{}-{}", self.settings.branch_prefix, commit_hash);
        if let Err(err) = self.vcs.delete_remote_branch(&branch).await {
            debug!("remote branch cleanup for {branch}: {err}");
        }
        if let Err(err) = self.vcs.delete_branch(&branch) {
            debug!("local branch cleanup for {branch}: {err}");
        }
        match self.store.lock().await.remove(commit_hash) {
            Ok(removed) => removed,
            Err(err) => {
                warn!("failed to persist change log: {err}");
                None
            }
        }
    }
}

fn commit_summary(modified: &[String]) -> String {
    let basenames: Vec<&str> = modified
        .iter()
        .map(|p| {
            Path::new(p)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(p.as_str())
        })
        .collect();
    format!("Update: {}", basenames.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryChannel;
    use crate::feedback::{INSTRUCTION_HEADER, REVIEW_HEADER};
    use std::collections::HashMap;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn init_repo(root: &Path) {
        let repo = git2::Repository::init(root).unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "test").unwrap();
        config.set_str("user.email", "test@test.com").unwrap();
    }

    fn test_settings(dir: &tempfile::TempDir, git_mode: GitMode) -> Settings {
        let project_root = dir.path().join("project");
        fs::create_dir_all(&project_root).unwrap();
        init_repo(&project_root);
        Settings {
            project_root: project_root.canonicalize().unwrap(),
            git_mode,
            branch_prefix: "drop".to_string(),
            build_command: vec!["true".to_string()],
            poll_interval_ms: 10,
            syntax_checkers: HashMap::new(),
            state_dir: dir.path().join("state"),
        }
    }

    fn agent_with(settings: Settings) -> (Arc<Agent>, Arc<MemoryChannel>) {
        let channel = Arc::new(MemoryChannel::new());
        let agent = Arc::new(Agent::new(settings, channel.clone()));
        (agent, channel)
    }

    #[tokio::test]
    async fn test_trigger_batch_writes_and_commits() {
        let dir = tempdir().unwrap();
        let settings = test_settings(&dir, GitMode::LocalOnly);
        let root = settings.project_root.clone();
        let (agent, _) = agent_with(settings);

        let text = ">>> INVOKE\n!!!FILE_START!!!\nfoo/bar.txt\nhello\n!!!FILE_END!!!";
        agent.process_text(text).await;

        assert_eq!(fs::read_to_string(root.join("foo/bar.txt")).unwrap(), "hello");
        let logs = agent.change_logs().await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].summary, "Update: bar.txt");
    }

    #[tokio::test]
    async fn test_build_failure_publishes_feedback_and_skips_commit() {
        let dir = tempdir().unwrap();
        let mut settings = test_settings(&dir, GitMode::LocalOnly);
        settings.build_command = vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo 'error: x' >&2; exit 1".to_string(),
        ];
        let (agent, channel) = agent_with(settings);

        let text = ">>> INVOKE\n!!!FILE_START!!!\nsrc.txt\nbody\n!!!FILE_END!!!";
        agent.process_text(text).await;

        assert!(agent.change_logs().await.is_empty());
        let published = channel.read().unwrap();
        assert!(published.contains("error: x"));
        assert!(published.contains(INSTRUCTION_HEADER));
        assert!(published.contains("resubmit"));
        // Loop suppression: the published prompt must classify as ours.
        assert_eq!(monitor::classify(&published), Verdict::SelfAuthored);
        assert_eq!(
            *agent.status_rx().borrow(),
            "Build failed - changes rejected"
        );
    }

    #[tokio::test]
    async fn test_partial_failure_isolates_invalid_file() {
        let dir = tempdir().unwrap();
        let mut settings = test_settings(&dir, GitMode::LocalOnly);
        settings
            .syntax_checkers
            .insert("bad".to_string(), vec!["false".to_string()]);
        let root = settings.project_root.clone();
        let (agent, _) = agent_with(settings);

        let text = concat!(
            ">>> INVOKE\n",
            "!!!FILE_START!!!\ngood.txt\nvalid\n!!!FILE_END!!!\n",
            "!!!FILE_START!!!\nbroken.bad\ninvalid\n!!!FILE_END!!!",
        );
        agent.process_text(text).await;

        assert!(root.join("good.txt").exists());
        assert!(!root.join("broken.bad").exists());
        let logs = agent.change_logs().await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].summary, "Update: good.txt");
    }

    #[tokio::test]
    async fn test_local_only_creates_no_branch() {
        let dir = tempdir().unwrap();
        let settings = test_settings(&dir, GitMode::LocalOnly);
        let root = settings.project_root.clone();
        let (agent, _) = agent_with(settings);

        agent
            .process_text(">>> INVOKE\n!!!FILE_START!!!\na.txt\nx\n!!!FILE_END!!!")
            .await;

        let repo = git2::Repository::open(&root).unwrap();
        assert!(repo.head().unwrap().peel_to_commit().is_ok());
        let branches: Vec<_> = repo
            .branches(Some(git2::BranchType::Local))
            .unwrap()
            .filter_map(|b| b.ok())
            .filter_map(|(b, _)| b.name().ok().flatten().map(str::to_owned))
            .filter(|name| name.starts_with("drop-"))
            .collect();
        assert!(branches.is_empty());
    }

    #[tokio::test]
    async fn test_safe_mode_creates_prefixed_branch() {
        let dir = tempdir().unwrap();
        let settings = test_settings(&dir, GitMode::Safe);
        let root = settings.project_root.clone();
        let (agent, _) = agent_with(settings);

        agent
            .process_text(">>> INVOKE\n!!!FILE_START!!!\na.txt\nx\n!!!FILE_END!!!")
            .await;

        // Push fails without a remote and is swallowed; the branch and the
        // log entry must still exist, and the current branch is untouched.
        let logs = agent.change_logs().await;
        assert_eq!(logs.len(), 1);
        let repo = git2::Repository::open(&root).unwrap();
        let branch_name = format!("drop-{}", logs[0].commit_hash);
        assert!(repo.find_branch(&branch_name, git2::BranchType::Local).is_ok());
    }

    #[tokio::test]
    async fn test_yolo_mode_commits_and_logs_when_push_fails() {
        let dir = tempdir().unwrap();
        let settings = test_settings(&dir, GitMode::Yolo);
        let root = settings.project_root.clone();
        let (agent, _) = agent_with(settings);

        agent
            .process_text(">>> INVOKE\n!!!FILE_START!!!\na.txt\nx\n!!!FILE_END!!!")
            .await;

        // No remote: the push fails and is swallowed; the local commit and
        // the log entry stand, and no review branch is created.
        let logs = agent.change_logs().await;
        assert_eq!(logs.len(), 1);
        let repo = git2::Repository::open(&root).unwrap();
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        assert!(head.id().to_string().starts_with(&logs[0].commit_hash));
        assert!(
            repo.find_branch(&format!("drop-{}", logs[0].commit_hash), git2::BranchType::Local)
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_identical_rewrite_produces_no_second_commit() {
        let dir = tempdir().unwrap();
        let settings = test_settings(&dir, GitMode::LocalOnly);
        let (agent, _) = agent_with(settings);

        let text = ">>> INVOKE\n!!!FILE_START!!!\na.txt\nsame\n!!!FILE_END!!!";
        agent.process_text(text).await;
        agent.process_text(text).await;

        assert_eq!(agent.change_logs().await.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_payloads_forwards_without_error() {
        let dir = tempdir().unwrap();
        let settings = test_settings(&dir, GitMode::LocalOnly);
        let (agent, _) = agent_with(settings);

        agent.process_text(">>> INVOKE\njust chatting").await;
        assert!(agent.change_logs().await.is_empty());
        assert_eq!(*agent.status_rx().borrow(), "");
    }

    #[tokio::test]
    async fn test_close_entry_deletes_branch_and_log_entry() {
        let dir = tempdir().unwrap();
        let settings = test_settings(&dir, GitMode::Safe);
        let root = settings.project_root.clone();
        let (agent, _) = agent_with(settings);

        agent
            .process_text(">>> INVOKE\n!!!FILE_START!!!\na.txt\nx\n!!!FILE_END!!!")
            .await;
        let hash = agent.change_logs().await[0].commit_hash.clone();
        let branch_name = format!("drop-{hash}");

        let removed = agent.close_entry(&hash).await;
        assert_eq!(removed.unwrap().commit_hash, hash);
        assert!(agent.change_logs().await.is_empty());
        let repo = git2::Repository::open(&root).unwrap();
        assert!(
            repo.find_branch(&branch_name, git2::BranchType::Local)
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_review_latest_publishes_diff_prompt() {
        let dir = tempdir().unwrap();
        let settings = test_settings(&dir, GitMode::LocalOnly);
        let (agent, channel) = agent_with(settings);

        agent
            .process_text(">>> INVOKE\n!!!FILE_START!!!\na.txt\nreview me\n!!!FILE_END!!!")
            .await;
        assert!(agent.review_latest().await);

        let published = channel.read().unwrap();
        assert!(published.contains(REVIEW_HEADER));
        assert!(published.contains("review me"));
        assert_eq!(monitor::classify(&published), Verdict::SelfAuthored);
    }

    #[tokio::test]
    async fn test_review_latest_empty_log_returns_false() {
        let dir = tempdir().unwrap();
        let settings = test_settings(&dir, GitMode::LocalOnly);
        let (agent, _) = agent_with(settings);
        assert!(!agent.review_latest().await);
    }

    #[tokio::test]
    async fn test_detect_remembers_external_and_restores_on_trigger() {
        let dir = tempdir().unwrap();
        let settings = test_settings(&dir, GitMode::LocalOnly);
        let (agent, channel) = agent_with(settings);

        channel.write("user's precious clipboard").unwrap();
        assert!(agent.detect().is_none());

        channel
            .write(">>> INVOKE\n!!!FILE_START!!!\na.txt\nx\n!!!FILE_END!!!")
            .unwrap();
        let detected = agent.detect();
        assert!(detected.is_some());
        // The trigger was consumed and the user's content put back.
        assert_eq!(channel.read().unwrap(), "user's precious clipboard");
    }

    #[tokio::test]
    async fn test_detect_ignores_unchanged_counter() {
        let dir = tempdir().unwrap();
        let settings = test_settings(&dir, GitMode::LocalOnly);
        let (agent, channel) = agent_with(settings);

        channel.write(">>> INVOKE trigger text").unwrap();
        assert!(agent.detect().is_some());
        // Same counter: second tick is a no-op.
        assert!(agent.detect().is_none());
    }

    #[tokio::test]
    async fn test_detect_ignores_self_authored() {
        let dir = tempdir().unwrap();
        let settings = test_settings(&dir, GitMode::LocalOnly);
        let (agent, channel) = agent_with(settings);

        channel
            .write(&format!("{INSTRUCTION_HEADER}\nfix and resubmit with >>> INVOKE"))
            .unwrap();
        assert!(agent.detect().is_none());
    }

    #[tokio::test]
    async fn test_last_write_wins_for_duplicate_paths() {
        let dir = tempdir().unwrap();
        let settings = test_settings(&dir, GitMode::LocalOnly);
        let root = settings.project_root.clone();
        let (agent, _) = agent_with(settings);

        let text = concat!(
            ">>> INVOKE\n",
            "<FILE_CONTENT path=\"dup.txt\">from legacy</FILE_CONTENT>\n",
            "!!!FILE_START!!!\ndup.txt\nfrom tagged\n!!!FILE_END!!!",
        );
        agent.process_text(text).await;

        // Legacy strategy runs last, so its write lands last.
        assert_eq!(
            fs::read_to_string(root.join("dup.txt")).unwrap(),
            "from legacy"
        );
        // Summary lists the path once.
        assert_eq!(agent.change_logs().await[0].summary, "Update: dup.txt");
    }

    #[test]
    fn test_commit_summary_uses_basenames() {
        let modified = vec!["src/deep/a.rs".to_string(), "b.txt".to_string()];
        assert_eq!(commit_summary(&modified), "Update: a.rs, b.txt");
    }

    // Settings sanity for the test fixtures themselves.
    #[test]
    fn test_fixture_settings_point_into_tempdir() {
        let dir = tempdir().unwrap();
        let settings = test_settings(&dir, GitMode::Safe);
        assert!(settings.project_root.starts_with(
            PathBuf::from(dir.path()).canonicalize().unwrap()
        ));
    }
}
