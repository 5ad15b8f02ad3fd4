//! Git workflow: commit, branch, push, show, delete.
//!
//! Local operations go through libgit2; pushes shell out to the `git`
//! binary so the user's credential helpers keep working. Callers above this
//! layer swallow errors from the network-facing operations (best-effort
//! semantics): a failed push never rolls back the local commit.

use crate::errors::VcsError;
use git2::{BranchType, DiffFormat, Repository, Signature};
use std::path::{Path, PathBuf};
use std::process::Stdio;

pub struct GitWorkflow {
    root: PathBuf,
}

impl GitWorkflow {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn open(&self) -> Result<Repository, VcsError> {
        Ok(Repository::open(&self.root)?)
    }

    /// Stage everything and commit. Returns the new commit's short hash,
    /// or `None` when the staged tree is identical to HEAD: byte-identical
    /// rewrites produce no commit.
    pub fn commit_all(&self, message: &str) -> Result<Option<String>, VcsError> {
        let repo = self.open()?;
        let mut index = repo.index()?;
        index.add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)?;
        index.write()?;

        let tree_id = index.write_tree()?;
        let tree = repo.find_tree(tree_id)?;
        let parent = head_commit(&repo);

        if let Some(ref parent) = parent
            && parent.tree_id() == tree_id
        {
            return Ok(None);
        }

        let sig = repo
            .signature()
            .or_else(|_| Signature::now("codedrop", "codedrop@localhost"))?;

        // Unborn branch: first commit has no parents.
        let commit_id = match parent {
            Some(ref parent) => {
                repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[parent])?
            }
            None => repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[])?,
        };

        Ok(Some(short_hash(&repo, commit_id)))
    }

    /// Short hash of the current HEAD, if any.
    pub fn short_head(&self) -> Option<String> {
        let repo = self.open().ok()?;
        let commit = head_commit(&repo)?;
        Some(short_hash(&repo, commit.id()))
    }

    /// Create a branch at HEAD without checking it out.
    pub fn create_branch(&self, name: &str) -> Result<(), VcsError> {
        let repo = self.open()?;
        let head = repo.head()?.peel_to_commit()?;
        repo.branch(name, &head, false)?;
        Ok(())
    }

    /// Delete a local branch.
    pub fn delete_branch(&self, name: &str) -> Result<(), VcsError> {
        let repo = self.open()?;
        let mut branch = repo.find_branch(name, BranchType::Local)?;
        branch.delete()?;
        Ok(())
    }

    /// Whether a local branch exists.
    pub fn branch_exists(&self, name: &str) -> bool {
        self.open()
            .map(|repo| repo.find_branch(name, BranchType::Local).is_ok())
            .unwrap_or(false)
    }

    /// Push to the remote. With `Some(branch)` pushes that branch with an
    /// upstream; with `None` pushes the current branch.
    pub async fn push(&self, branch: Option<&str>) -> Result<(), VcsError> {
        let mut args = vec!["push"];
        if let Some(branch) = branch {
            args.extend(["-u", "origin", branch]);
        }
        self.run_git(&args).await
    }

    /// Delete a branch on the remote, best-effort.
    pub async fn delete_remote_branch(&self, name: &str) -> Result<(), VcsError> {
        self.run_git(&["push", "origin", "--delete", name]).await
    }

    async fn run_git(&self, args: &[&str]) -> Result<(), VcsError> {
        let output = tokio::process::Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(VcsError::Spawn)?;
        if output.status.success() {
            Ok(())
        } else {
            Err(VcsError::PushFailed {
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    /// Unified diff text of a commit against its first parent (or the
    /// empty tree for a root commit), for review prompts.
    pub fn show(&self, hash: &str) -> Result<String, VcsError> {
        let repo = self.open()?;
        let commit = repo.revparse_single(hash)?.peel_to_commit()?;
        let tree = commit.tree()?;
        let parent_tree = commit.parent(0).ok().and_then(|p| p.tree().ok());

        let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;
        let mut buf = String::new();
        diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
            match line.origin() {
                '+' | '-' | ' ' => buf.push(line.origin()),
                _ => {}
            }
            buf.push_str(&String::from_utf8_lossy(line.content()));
            true
        })?;
        Ok(buf)
    }
}

fn head_commit(repo: &Repository) -> Option<git2::Commit<'_>> {
    repo.head().ok().and_then(|head| head.peel_to_commit().ok())
}

fn short_hash(repo: &Repository, oid: git2::Oid) -> String {
    repo.find_object(oid, None)
        .ok()
        .and_then(|obj| obj.short_id().ok())
        .and_then(|buf| buf.as_str().map(str::to_owned))
        .unwrap_or_else(|| oid.to_string())
}
