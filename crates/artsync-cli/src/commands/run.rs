//! Run command.
//!
//! Wires the adapters together (wiki client, classifier, page builder,
//! scanner, state store) and either runs one sync round or starts the
//! watch loop: startup round first, then filesystem events drive further
//! rounds through the coalescer until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use artsync_core::config::Config;
use artsync_remote::WikiClient;
use artsync_render::{CaptionStore, FilenameValidator, NamingRules, PageBuilder, SlotGameClassifier};
use artsync_state::StateStore;
use artsync_sync::{watcher, Coalescer, LocalScanner, SyncEngine, SyncOptions};
use clap::{Args, ValueEnum};
use tracing::{info, warn};

#[derive(Debug, Args)]
pub struct RunCommand {
    /// `once` runs a single full round; `watch` keeps running
    #[arg(long, value_enum, default_value_t = Mode::Watch)]
    pub mode: Mode,

    /// Preview the diff without touching the remote page
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Mode {
    Once,
    Watch,
}

impl RunCommand {
    pub async fn execute(&self, config: &Config) -> Result<()> {
        let (state, warnings) = StateStore::load(
            config.state.cache_file.clone(),
            config.state.history_file.clone(),
        );
        for warning in &warnings {
            warn!(path = %warning.path.display(), "{}", warning.message);
        }

        let remote = Arc::new(WikiClient::new(&config.remote)?);
        let captions = Arc::new(CaptionStore::new(config.sync.captions_file.clone()));
        let classifier = Arc::new(match &config.sync.validator_dict {
            Some(dict) => {
                let validator = FilenameValidator::new(NamingRules::load(dict)?)?;
                SlotGameClassifier::with_validator(captions, validator)
            }
            None => SlotGameClassifier::new(captions),
        });
        let renderer = Arc::new(PageBuilder::new());
        let scanner = LocalScanner::new(
            config.sync.target_folder.clone(),
            &config.sync.file_patterns,
        )?;
        let mut engine = SyncEngine::new(remote, classifier, renderer, scanner, state, config);

        match self.mode {
            Mode::Once => {
                engine
                    .run_sync(&SyncOptions {
                        is_startup: true,
                        reason: "Manual Sync".to_string(),
                        dry_run: self.dry_run,
                        captions_changed: false,
                    })
                    .await
            }
            Mode::Watch => {
                // Reconcile local, remote, and cached state before trusting
                // incremental rounds.
                engine
                    .run_sync(&SyncOptions {
                        is_startup: true,
                        reason: "Startup Consistency".to_string(),
                        dry_run: self.dry_run,
                        captions_changed: false,
                    })
                    .await?;

                let coalescer = Coalescer::new(
                    engine,
                    Duration::from_secs(config.sync.watch_delay_secs),
                    Duration::from_secs(config.sync.lock_retry_secs),
                    self.dry_run,
                );
                let sink = coalescer.clone();
                let _watch = watcher::watch(
                    &config.sync.target_folder,
                    config.sync.captions_file.as_deref(),
                    &config.sync.file_patterns.include,
                    move |captions| sink.notify_change(captions),
                )?;

                info!(
                    folder = %config.sync.target_folder.display(),
                    "watching for changes, press Ctrl-C to stop"
                );
                tokio::signal::ctrl_c()
                    .await
                    .context("waiting for shutdown signal")?;
                info!("shutting down");
                Ok(())
            }
        }
    }
}
