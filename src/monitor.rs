//! Channel polling loop and change classification.
//!
//! One tokio task drives a fixed-interval tick; ticks never overlap, which
//! is what prevents the same clipboard change from being detected twice.
//! Heavy work (writing, building, git) is spawned off the loop so a tick
//! never blocks on it.

use crate::agent::Agent;
use crate::feedback::{INSTRUCTION_HEADER, REVIEW_HEADER};
use crate::payload::{TAG_FILE_START, TRIGGER_TOKEN};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::info;

/// What a changed channel content turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Carries one of the agent's own signature headers; never reprocessed.
    SelfAuthored,
    /// Carries the trigger token; goes to the parse/write/validate pipeline.
    Trigger,
    /// Ordinary user content, remembered for restoration after agent writes.
    External,
    /// Untriggered text that still looks like a payload block; neither
    /// processed nor remembered.
    Ignored,
}

/// Classify channel text. Signature filtering runs before the trigger
/// check: a self-authored prompt restating the trigger token must not
/// re-arm the pipeline.
pub fn classify(text: &str) -> Verdict {
    if text.contains(INSTRUCTION_HEADER) || text.contains(REVIEW_HEADER) {
        Verdict::SelfAuthored
    } else if text.contains(TRIGGER_TOKEN) {
        Verdict::Trigger
    } else if text.contains(TAG_FILE_START) {
        Verdict::Ignored
    } else {
        Verdict::External
    }
}

/// Run the poll loop until `shutdown` flips. Detected trigger batches are
/// spawned onto the runtime; the loop itself only detects and dispatches.
pub async fn run(agent: Arc<Agent>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(Duration::from_millis(agent.poll_interval_ms()));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(
        "listening for {:?} on the channel every {}ms",
        TRIGGER_TOKEN,
        agent.poll_interval_ms()
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(text) = agent.detect() {
                    let agent = Arc::clone(&agent);
                    tokio::spawn(async move {
                        agent.process_text(&text).await;
                    });
                }
            }
            _ = shutdown.changed() => break,
        }
    }
    info!("monitor stopped");
}
