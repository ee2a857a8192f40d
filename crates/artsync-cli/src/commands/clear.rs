//! Clear command.
//!
//! Resets the managed page to a blank slate: deletes every attachment,
//! blanks the body, prunes all historical page versions except the
//! current one, and removes the local state documents. Scope flags limit
//! the reset to a subset; with no scope flags everything is cleared.

use std::io::{self, Write};

use anyhow::Result;
use artsync_core::config::Config;
use artsync_core::ports::IRemotePage;
use artsync_remote::WikiClient;
use artsync_state::StateStore;
use clap::Args;
use tracing::{error, info};

#[derive(Debug, Args)]
pub struct ClearCommand {
    /// Skip the confirmation prompt
    #[arg(long)]
    pub yes: bool,

    /// Delete all remote attachments
    #[arg(long)]
    pub attachments: bool,

    /// Blank the page body
    #[arg(long)]
    pub body: bool,

    /// Prune historical page versions (the current one is kept)
    #[arg(long)]
    pub versions: bool,

    /// Remove the local cache and history documents
    #[arg(long)]
    pub state: bool,
}

impl ClearCommand {
    pub async fn execute(&self, config: &Config) -> Result<()> {
        // No scope flags means clear everything.
        let all = !self.attachments && !self.body && !self.versions && !self.state;
        let attachments = all || self.attachments;
        let body = all || self.body;
        let versions = all || self.versions;
        let state = all || self.state;

        if !self.yes && !confirm(&config.remote.page_id)? {
            info!("aborted");
            return Ok(());
        }

        let remote = WikiClient::new(&config.remote)?;

        if attachments {
            let listed = remote.list_attachments().await?;
            info!(count = listed.len(), "deleting attachments");
            for att in listed {
                match remote.delete_attachment(&att.id).await {
                    Ok(()) => info!(file = %att.filename, "deleted"),
                    Err(e) => error!(file = %att.filename, error = %e, "delete failed"),
                }
            }
        }

        if body {
            let page = remote.get_page().await?;
            remote.update_page("", &page.title, page.version).await?;
            info!("page body cleared");
        }

        if versions {
            // The current version cannot be deleted, skip it.
            let listed = remote.list_versions().await?;
            let latest = listed.iter().map(|v| v.number).max().unwrap_or(0);
            let old: Vec<u64> = listed
                .iter()
                .map(|v| v.number)
                .filter(|n| *n != latest)
                .collect();
            info!(count = old.len(), "pruning page versions");
            for number in old {
                match remote.delete_version(number).await {
                    Ok(()) => info!(version = number, "version deleted"),
                    Err(e) => error!(version = number, error = %e, "version delete failed"),
                }
            }
        }

        if state {
            let (mut store, _) = StateStore::load(
                config.state.cache_file.clone(),
                config.state.history_file.clone(),
            );
            store.clear_cache()?;
            store.clear_history()?;
            info!("local state cleared");
        }

        Ok(())
    }
}

fn confirm(page_id: &str) -> Result<bool> {
    print!(
        "This deletes the selected remote and local data for page {page_id}. \
         Continue? [y/N] "
    );
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let answer = line.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}
