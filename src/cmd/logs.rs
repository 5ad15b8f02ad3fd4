//! Change-log inspection and cleanup commands — `codedrop logs`,
//! `codedrop close`.

use codedrop::agent::Agent;
use anyhow::Result;
use std::sync::Arc;

pub async fn cmd_logs(agent: Arc<Agent>) -> Result<()> {
    let entries = agent.change_logs().await;
    if entries.is_empty() {
        println!(
            "No logged changes for {}",
            agent.project_root().display()
        );
        return Ok(());
    }

    println!();
    println!(
        "{}",
        console::style(format!(
            "Change log for {}",
            agent.project_root().display()
        ))
        .bold()
    );
    println!();
    for entry in &entries {
        println!(
            "  {}  {}  {}",
            console::style(&entry.commit_hash).cyan(),
            console::style(entry.timestamp.format("%Y-%m-%d %H:%M:%S")).dim(),
            entry.summary
        );
    }
    println!();
    println!("  {} entr{}", entries.len(), if entries.len() == 1 { "y" } else { "ies" });
    println!();
    Ok(())
}

/// Close a logged entry: delete its review branch locally and on the
/// remote, then drop it from the log.
pub async fn cmd_close(agent: Arc<Agent>, commit_hash: &str, yes: bool) -> Result<()> {
    if !yes {
        use dialoguer::Confirm;

        let confirm = Confirm::new()
            .with_prompt(format!(
                "Delete the review branch for {commit_hash} and remove it from the log?"
            ))
            .default(false)
            .interact()
            .unwrap_or(false);
        if !confirm {
            println!("Close cancelled");
            return Ok(());
        }
    }

    match agent.close_entry(commit_hash).await {
        Some(entry) => {
            println!(
                "{} {} ({})",
                console::style("Closed:").green().bold(),
                entry.summary,
                entry.commit_hash
            );
            Ok(())
        }
        None => anyhow::bail!("No logged change with hash '{commit_hash}'"),
    }
}
