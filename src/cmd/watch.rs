//! Foreground watcher and one-shot pipeline commands — `codedrop watch`,
//! `codedrop apply`, `codedrop review`.

use codedrop::agent::Agent;
use codedrop::monitor;
use codedrop::payload::TRIGGER_TOKEN;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;

/// Run the monitor in the foreground until Ctrl-C. Status-line changes are
/// echoed to the terminal as they happen.
pub async fn cmd_watch(agent: Arc<Agent>) -> Result<()> {
    println!(
        "{} {}",
        console::style("Watching clipboard for").dim(),
        console::style(TRIGGER_TOKEN).bold().cyan()
    );
    println!(
        "  project: {}",
        agent.project_root().display()
    );
    println!("  press Ctrl-C to stop");
    println!();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut status_rx = agent.status_rx();
    let printer = tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = status_rx.borrow_and_update().clone();
            if !status.is_empty() {
                println!("{}", console::style(&status).yellow());
            }
        }
    });

    let monitor = tokio::spawn(monitor::run(agent, shutdown_rx));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    println!();
    println!("{}", console::style("Stopping...").dim());

    let _ = shutdown_tx.send(true);
    let _ = monitor.await;
    printer.abort();
    Ok(())
}

/// Run the current clipboard content through the pipeline once, trigger or
/// not.
pub async fn cmd_apply(agent: Arc<Agent>) -> Result<()> {
    let before = agent.change_logs().await.len();
    agent.apply_now().await;
    let logs = agent.change_logs().await;
    if logs.len() > before
        && let Some(entry) = logs.first()
    {
        println!(
            "{} {} ({})",
            console::style("Applied:").green().bold(),
            entry.summary,
            entry.commit_hash
        );
    } else {
        println!("No changes applied.");
    }
    Ok(())
}

/// Put a review prompt for the newest logged commit on the clipboard.
pub async fn cmd_review(agent: Arc<Agent>) -> Result<()> {
    if agent.review_latest().await {
        println!(
            "{}",
            console::style("Review request copied to clipboard.").green()
        );
        Ok(())
    } else {
        anyhow::bail!("No logged changes to review for this project")
    }
}
