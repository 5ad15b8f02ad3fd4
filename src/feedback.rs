//! Corrective prompt templates published back to the channel.
//!
//! Everything the agent writes to the channel begins with one of two fixed
//! self-signature headers. The monitor filters on these headers before the
//! trigger check, which is what keeps the agent from re-ingesting its own
//! output even though the templates restate the trigger token.

use crate::payload::TRIGGER_TOKEN;

/// Self-signature on corrective/instruction prompts.
pub const INSTRUCTION_HEADER: &str = "[System Instruction: Drop Protocol v3]";

/// Self-signature on review-request prompts.
pub const REVIEW_HEADER: &str = "[Drop Review Request]";

/// Build the corrective prompt for a failed build, embedding the captured
/// diagnostics verbatim.
pub fn compose_build_failure(stderr: &str) -> String {
    format!(
        "{INSTRUCTION_HEADER}\n\
         Build failed with errors:\n\
         \n\
         {stderr}\n\
         \n\
         Please fix the code and resubmit using !!!FILE_START!!! format, \
         starting with {TRIGGER_TOKEN}.\n"
    )
}

/// Build the review-request prompt for a logged commit.
pub fn compose_review_request(commit_hash: &str, diff: &str) -> String {
    format!(
        "{REVIEW_HEADER}\n\
         Check commit {commit_hash}:\n\
         \n\
         {diff}\n\
         \n\
         If a fix is needed, use !!!FILE_START!!! format and start with {TRIGGER_TOKEN}.\n"
    )
}

/// Collaborator that delivers a published prompt into the chat UI, e.g. by
/// simulating a paste keystroke. The core only needs the seam.
pub trait Paster: Send + Sync {
    fn simulate_paste(&self);
}

/// Default paster: logs instead of touching the OS input system.
pub struct NoopPaster;

impl Paster for NoopPaster {
    fn simulate_paste(&self) {
        tracing::debug!("paste simulation requested (no-op paster)");
    }
}
