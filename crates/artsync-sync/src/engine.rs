//! Sync orchestrator.
//!
//! One `run_sync` round: establish the remote inventory (cached, or
//! rebuilt by downloading and hashing every attachment), scan the local
//! folder, diff, apply deletes then uploads through bounded worker pools,
//! rebuild or patch the page body, push under optimistic versioning, and
//! persist state. Per-file failures are logged and skipped; everything
//! after the apply phase propagates, and a failed push aborts before
//! persist so the next round recomputes the same diff.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use artsync_core::config::{Config, WorkersConfig};
use artsync_core::domain::{AssetRecord, RemoteAssetRecord};
use artsync_core::ports::{IAssetClassifier, IPageRenderer, IRemotePage};
use artsync_state::StateStore;
use futures_util::stream::{self, StreamExt};
use tracing::{error, info, warn};

use crate::coalescer::SyncRunner;
use crate::diff::{self, SyncDiff};
use crate::hash;
use crate::scanner::LocalScanner;

/// Entries shown per category in a dry-run preview.
const PREVIEW_LIMIT: usize = 10;

/// Parameters of one sync round.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Forces a full remote resync and a full page redraw.
    pub is_startup: bool,
    /// Human-readable trigger, recorded in the history log.
    pub reason: String,
    /// Preview the diff without touching anything.
    pub dry_run: bool,
    /// The captions file changed within this round's window.
    pub captions_changed: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            is_startup: false,
            reason: "Sync".to_string(),
            dry_run: false,
            captions_changed: false,
        }
    }
}

pub struct SyncEngine {
    remote: Arc<dyn IRemotePage>,
    classifier: Arc<dyn IAssetClassifier>,
    renderer: Arc<dyn IPageRenderer>,
    scanner: LocalScanner,
    state: StateStore,
    history_keep: usize,
    workers: WorkersConfig,
    user_account_id: Option<String>,
    appearance: String,
    /// The page appearance is applied at most once per engine lifetime.
    appearance_applied: AtomicBool,
}

impl SyncEngine {
    pub fn new(
        remote: Arc<dyn IRemotePage>,
        classifier: Arc<dyn IAssetClassifier>,
        renderer: Arc<dyn IPageRenderer>,
        scanner: LocalScanner,
        state: StateStore,
        config: &Config,
    ) -> Self {
        Self {
            remote,
            classifier,
            renderer,
            scanner,
            state,
            history_keep: config.sync.history_keep,
            workers: config.sync.workers.clone(),
            user_account_id: config.remote.user_account_id.clone(),
            appearance: config.remote.appearance.clone(),
            appearance_applied: AtomicBool::new(false),
        }
    }

    /// Run one sync round.
    pub async fn run_sync(&mut self, options: &SyncOptions) -> anyhow::Result<()> {
        info!(
            reason = %options.reason,
            startup = options.is_startup,
            dry_run = options.dry_run,
            "sync started"
        );

        // 1. Remote inventory: rebuilt from the remote side on startup or
        //    when the cache document is missing, otherwise trusted as-is.
        let remote_inventory = if options.is_startup || !self.state.cache_present() {
            info!("rebuilding remote inventory");
            self.full_resync(!options.dry_run).await?
        } else {
            self.state.remote_state().clone()
        };

        // 2. Local scan.
        let local: BTreeMap<String, AssetRecord> = self
            .scanner
            .scan()
            .into_iter()
            .map(|asset| (asset.filename.clone(), asset))
            .collect();

        // 3. Diff.
        let d = diff::diff(&local, &remote_inventory);

        if !d.has_changes() && !options.is_startup {
            if options.captions_changed {
                if options.dry_run {
                    info!("dry-run: captions changed, page would be rebuilt");
                    return Ok(());
                }
                return self.captions_only_pass(options, &local).await;
            }
            info!("no changes, skipping sync");
            return Ok(());
        }

        info!(summary = %d.summary(), "changes detected");

        if options.dry_run {
            preview(&d);
            return Ok(());
        }

        // 4. Physical operations: deletes first, then uploads.
        self.apply_operations(&d, &local, &remote_inventory).await;

        // 5. History entry + page body.
        self.state.add_history_entry(
            format!("{} ({})", options.reason, d.summary()),
            self.user_account_id.clone(),
            self.history_keep,
        );

        let needs_redraw = !d.to_add.is_empty()
            || !d.to_delete.is_empty()
            || options.is_startup
            || options.captions_changed;

        let body = if needs_redraw {
            if options.captions_changed {
                self.classifier.reload_captions()?;
            }
            info!("rebuilding page body");
            self.render_full(&local)
        } else {
            // Content-only updates keep the page layout; only the history
            // table changes.
            info!("patching history table only");
            let current = self
                .remote
                .get_page()
                .await
                .context("fetching page for history patch")?;
            match self
                .renderer
                .patch_history(&current.body, self.state.history_slice(self.history_keep))
            {
                Some(patched) => patched,
                None => {
                    info!("history markers missing, rebuilding page");
                    self.render_full(&local)
                }
            }
        };

        // 6. Push, then persist. A failed push leaves the state documents
        //    untouched so the next round recomputes the same diff.
        self.push_page(body).await?;
        self.state.save().context("persisting sync state")?;

        info!("sync complete");
        Ok(())
    }

    /// Light path for a captions-only change: no attachment operations,
    /// just reload captions, rebuild the body, push, and persist.
    async fn captions_only_pass(
        &mut self,
        options: &SyncOptions,
        local: &BTreeMap<String, AssetRecord>,
    ) -> anyhow::Result<()> {
        info!("captions changed, rebuilding page without asset operations");
        self.classifier.reload_captions()?;
        self.state.add_history_entry(
            format!("{} (notes)", options.reason),
            self.user_account_id.clone(),
            self.history_keep,
        );
        let body = self.render_full(local);
        self.push_page(body).await?;
        self.state.save().context("persisting sync state")?;
        info!("captions sync complete");
        Ok(())
    }

    /// Download and hash every recognized attachment to rebuild the
    /// inventory from scratch. Individual download failures drop the entry;
    /// a later diff then re-uploads it, which is safe. `persist` is false
    /// only on dry-run rounds, which must leave the state documents alone.
    async fn full_resync(
        &mut self,
        persist: bool,
    ) -> anyhow::Result<BTreeMap<String, RemoteAssetRecord>> {
        let attachments = self
            .remote
            .list_attachments()
            .await
            .context("listing remote attachments")?;
        let targets: Vec<_> = attachments
            .into_iter()
            .filter(|att| self.scanner.is_valid(&att.filename))
            .collect();

        info!(
            count = targets.len(),
            workers = self.workers.download,
            "verifying remote attachments"
        );

        let remote = Arc::clone(&self.remote);
        let results: Vec<Option<(String, RemoteAssetRecord)>> = stream::iter(targets)
            .map(|att| {
                let remote = Arc::clone(&remote);
                async move {
                    match remote.download_attachment(&att.download_path).await {
                        Ok(bytes) => Some((
                            att.filename,
                            RemoteAssetRecord {
                                id: att.id,
                                hash: hash::hash_bytes(&bytes),
                            },
                        )),
                        Err(e) => {
                            error!(file = %att.filename, error = %e, "download failed during resync");
                            None
                        }
                    }
                }
            })
            .buffer_unordered(self.workers.download.max(1))
            .collect()
            .await;

        let inventory: BTreeMap<String, RemoteAssetRecord> =
            results.into_iter().flatten().collect();
        if persist {
            self.state.set_remote_inventory(inventory.clone());
            self.state
                .save()
                .context("persisting rebuilt inventory")?;
        }
        Ok(inventory)
    }

    /// Deletes then uploads, each through a bounded pool. Failures are
    /// logged and skipped: a failed delete keeps its cache entry, a failed
    /// upload records nothing, and the next round retries both.
    async fn apply_operations(
        &mut self,
        d: &SyncDiff,
        local: &BTreeMap<String, AssetRecord>,
        remote_inventory: &BTreeMap<String, RemoteAssetRecord>,
    ) {
        if !d.to_delete.is_empty() {
            info!(
                count = d.to_delete.len(),
                workers = self.workers.delete,
                "deleting remote attachments"
            );
            let remote = Arc::clone(&self.remote);
            let targets: Vec<(String, String)> = d
                .to_delete
                .iter()
                .filter_map(|name| {
                    remote_inventory
                        .get(name)
                        .map(|record| (name.clone(), record.id.clone()))
                })
                .collect();
            let deleted: Vec<String> = stream::iter(targets)
                .map(|(name, id)| {
                    let remote = Arc::clone(&remote);
                    async move {
                        match remote.delete_attachment(&id).await {
                            Ok(()) => {
                                info!(file = %name, "deleted");
                                Some(name)
                            }
                            Err(e) => {
                                error!(file = %name, error = %e, "delete failed, keeping cache entry");
                                None
                            }
                        }
                    }
                })
                .buffer_unordered(self.workers.delete.max(1))
                .collect::<Vec<_>>()
                .await
                .into_iter()
                .flatten()
                .collect();
            for name in deleted {
                self.state.remove_remote_asset(&name);
            }
        }

        let targets: Vec<(String, std::path::PathBuf, String)> = d
            .to_add
            .iter()
            .chain(d.to_update.iter())
            .filter_map(|name| {
                local
                    .get(name)
                    .map(|a| (a.filename.clone(), a.path.clone(), a.content_hash.clone()))
            })
            .collect();
        if !targets.is_empty() {
            info!(
                count = targets.len(),
                workers = self.workers.upload,
                "uploading assets"
            );
            let remote = Arc::clone(&self.remote);
            let uploaded: Vec<(String, String, String)> = stream::iter(targets)
                .map(|(name, path, content_hash)| {
                    let remote = Arc::clone(&remote);
                    async move {
                        match remote.upload_attachment(&path, &name).await {
                            Ok(id) => {
                                info!(file = %name, "uploaded");
                                Some((name, id, content_hash))
                            }
                            Err(e) => {
                                error!(file = %name, error = %e, "upload failed, skipping");
                                None
                            }
                        }
                    }
                })
                .buffer_unordered(self.workers.upload.max(1))
                .collect::<Vec<_>>()
                .await
                .into_iter()
                .flatten()
                .collect();
            for (name, id, content_hash) in uploaded {
                self.state.update_remote_asset(name, id, content_hash);
            }
        }
    }

    fn render_full(&self, local: &BTreeMap<String, AssetRecord>) -> String {
        let assets: Vec<AssetRecord> = local.values().cloned().collect();
        let classified = self.classifier.classify(&assets);
        self.renderer
            .render_page(&classified, self.state.history_slice(self.history_keep))
    }

    /// Re-fetch the version immediately before writing, push version+1,
    /// and apply the page appearance the first time a push succeeds.
    async fn push_page(&self, body: String) -> anyhow::Result<()> {
        let page = self
            .remote
            .get_page()
            .await
            .context("fetching page version before push")?;
        self.remote
            .update_page(&body, &page.title, page.version)
            .await
            .context("pushing page")?;
        info!(version = page.version + 1, "page pushed");

        if !self.appearance_applied.load(Ordering::Relaxed) {
            match self.remote.set_appearance(&self.appearance).await {
                Ok(()) => {
                    self.appearance_applied.store(true, Ordering::Relaxed);
                }
                Err(e) => warn!(error = %e, "failed to apply page appearance"),
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl SyncRunner for SyncEngine {
    async fn run_sync(&mut self, options: SyncOptions) -> anyhow::Result<()> {
        SyncEngine::run_sync(self, &options).await
    }
}

fn preview(d: &SyncDiff) {
    info!("dry-run: nothing will be modified");
    preview_bucket("to add", '+', &d.to_add);
    preview_bucket("to update", '~', &d.to_update);
    preview_bucket("to delete", '-', &d.to_delete);
}

fn preview_bucket(label: &str, sign: char, names: &[String]) {
    if names.is_empty() {
        return;
    }
    info!(count = names.len(), "{label}:");
    for name in names.iter().take(PREVIEW_LIMIT) {
        info!("  {sign} {name}");
    }
    if names.len() > PREVIEW_LIMIT {
        info!("  ... and {} more", names.len() - PREVIEW_LIMIT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use artsync_core::config::ConfigBuilder;
    use artsync_core::domain::{AttachmentMeta, PageContent, PageVersion};
    use artsync_render::{CaptionStore, PageBuilder, SlotGameClassifier};
    use std::path::{Path, PathBuf};
    use std::sync::atomic::AtomicU64;
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;

    /// In-memory remote page for engine tests.
    struct MockRemote {
        body: StdMutex<String>,
        version: StdMutex<u64>,
        attachments: StdMutex<BTreeMap<String, (String, Vec<u8>)>>,
        deleted_ids: StdMutex<Vec<String>>,
        uploaded: StdMutex<Vec<String>>,
        appearance_calls: StdMutex<Vec<String>>,
        next_id: AtomicU64,
    }

    impl MockRemote {
        fn new() -> Self {
            Self {
                body: StdMutex::new(String::new()),
                version: StdMutex::new(1),
                attachments: StdMutex::new(BTreeMap::new()),
                deleted_ids: StdMutex::new(Vec::new()),
                uploaded: StdMutex::new(Vec::new()),
                appearance_calls: StdMutex::new(Vec::new()),
                next_id: AtomicU64::new(1000),
            }
        }

        fn seed_attachment(&self, filename: &str, id: &str, bytes: &[u8]) {
            self.attachments
                .lock()
                .unwrap()
                .insert(filename.to_string(), (id.to_string(), bytes.to_vec()));
        }
    }

    #[async_trait::async_trait]
    impl IRemotePage for MockRemote {
        async fn get_page(&self) -> anyhow::Result<PageContent> {
            Ok(PageContent {
                title: "Art Assets".to_string(),
                body: self.body.lock().unwrap().clone(),
                version: *self.version.lock().unwrap(),
            })
        }

        async fn update_page(
            &self,
            body: &str,
            _title: &str,
            current_version: u64,
        ) -> anyhow::Result<()> {
            let mut version = self.version.lock().unwrap();
            anyhow::ensure!(*version == current_version, "stale version");
            *version += 1;
            *self.body.lock().unwrap() = body.to_string();
            Ok(())
        }

        async fn list_attachments(&self) -> anyhow::Result<Vec<AttachmentMeta>> {
            Ok(self
                .attachments
                .lock()
                .unwrap()
                .iter()
                .map(|(filename, (id, _))| AttachmentMeta {
                    id: id.clone(),
                    filename: filename.clone(),
                    download_path: format!("/download/{filename}"),
                })
                .collect())
        }

        async fn download_attachment(&self, download_path: &str) -> anyhow::Result<Vec<u8>> {
            let filename = download_path.trim_start_matches("/download/");
            self.attachments
                .lock()
                .unwrap()
                .get(filename)
                .map(|(_, bytes)| bytes.clone())
                .ok_or_else(|| anyhow::anyhow!("no such attachment: {filename}"))
        }

        async fn delete_attachment(&self, id: &str) -> anyhow::Result<()> {
            self.deleted_ids.lock().unwrap().push(id.to_string());
            self.attachments
                .lock()
                .unwrap()
                .retain(|_, (att_id, _)| att_id.as_str() != id);
            Ok(())
        }

        async fn upload_attachment(&self, path: &Path, filename: &str) -> anyhow::Result<String> {
            let bytes = std::fs::read(path)?;
            let id = self
                .next_id
                .fetch_add(1, Ordering::Relaxed)
                .to_string();
            self.attachments
                .lock()
                .unwrap()
                .insert(filename.to_string(), (id.clone(), bytes));
            self.uploaded.lock().unwrap().push(filename.to_string());
            Ok(id)
        }

        async fn set_appearance(&self, mode: &str) -> anyhow::Result<()> {
            self.appearance_calls.lock().unwrap().push(mode.to_string());
            Ok(())
        }

        async fn list_versions(&self) -> anyhow::Result<Vec<PageVersion>> {
            Ok(vec![])
        }

        async fn delete_version(&self, _number: u64) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn tiny_png(color: u8) -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        let img = image::RgbaImage::from_pixel(1, 1, image::Rgba([color, 0, 0, 255]));
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    struct Fixture {
        dir: TempDir,
        remote: Arc<MockRemote>,
        engine: SyncEngine,
    }

    fn test_config(dir: &TempDir) -> artsync_core::config::Config {
        ConfigBuilder::new()
            .project_name("demo")
            .project_kind("slot_game")
            .remote_url("https://example.test")
            .remote_page_id("1")
            .remote_email("bot@example.test")
            .remote_api_token("t")
            .remote_user_account_id("712020:abc")
            .sync_target_folder(dir.path().join("assets"))
            .sync_workers(4, 2, 2)
            .state_cache_file(dir.path().join("cache.json"))
            .state_history_file(dir.path().join("history.json"))
            .build()
    }

    fn build_engine(dir: &TempDir, remote: Arc<MockRemote>) -> SyncEngine {
        let config = test_config(dir);
        let (state, _) = StateStore::load(
            config.state.cache_file.clone(),
            config.state.history_file.clone(),
        );
        let scanner =
            LocalScanner::new(config.sync.target_folder.clone(), &config.sync.file_patterns)
                .unwrap();
        SyncEngine::new(
            remote,
            Arc::new(SlotGameClassifier::new(Arc::new(CaptionStore::new(None)))),
            Arc::new(PageBuilder::new()),
            scanner,
            state,
            &config,
        )
    }

    fn seed_state(dir: &TempDir) -> StateStore {
        let (state, _) = StateStore::load(
            dir.path().join("cache.json"),
            dir.path().join("history.json"),
        );
        state
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("assets")).unwrap();
        let remote = Arc::new(MockRemote::new());
        let engine = build_engine(&dir, remote.clone());
        Fixture { dir, remote, engine }
    }

    fn write_asset(fixture: &Fixture, name: &str, bytes: &[u8]) -> PathBuf {
        let path = fixture.dir.path().join("assets").join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[tokio::test]
    async fn end_to_end_add_update_delete_round() {
        let mut f = fixture();

        // Local: a (new) and b (changed). Remote: b (old bytes) and c
        // (stale, no local counterpart).
        let png_a = tiny_png(1);
        let png_b_new = tiny_png(2);
        let png_b_old = tiny_png(3);
        let png_c = tiny_png(4);
        write_asset(&f, "main_bg_a_normal.png", &png_a);
        write_asset(&f, "main_bg_b_normal.png", &png_b_new);
        f.remote.seed_attachment("main_bg_b_normal.png", "20", &png_b_old);
        f.remote.seed_attachment("main_bg_c_normal.png", "30", &png_c);

        // Seed the cache so this is an incremental round, then rebuild the
        // engine so it loads the seeded documents.
        let mut seed = seed_state(&f.dir);
        seed.update_remote_asset("main_bg_b_normal.png", "20", hash::hash_bytes(&png_b_old));
        seed.update_remote_asset("main_bg_c_normal.png", "30", hash::hash_bytes(&png_c));
        seed.save().unwrap();
        f.engine = build_engine(&f.dir, f.remote.clone());

        f.engine
            .run_sync(&SyncOptions {
                reason: "Watcher Sync".to_string(),
                ..SyncOptions::default()
            })
            .await
            .unwrap();

        // c deleted, a and b uploaded.
        assert_eq!(*f.remote.deleted_ids.lock().unwrap(), vec!["30"]);
        let mut uploaded = f.remote.uploaded.lock().unwrap().clone();
        uploaded.sort();
        assert_eq!(uploaded, vec!["main_bg_a_normal.png", "main_bg_b_normal.png"]);

        // Page pushed with the full redraw (adds + deletes occurred).
        assert_eq!(*f.remote.version.lock().unwrap(), 2);
        let body = f.remote.body.lock().unwrap().clone();
        assert!(body.contains("main_bg_a_normal.png"));
        assert!(!body.contains("main_bg_c_normal.png"));
        assert!(body.contains("Watcher Sync (+1 ~1 -1)"));

        // Persisted state matches the new reality.
        let (reloaded, _) = StateStore::load(
            f.dir.path().join("cache.json"),
            f.dir.path().join("history.json"),
        );
        assert!(reloaded.remote_state().contains_key("main_bg_a_normal.png"));
        assert!(!reloaded.remote_state().contains_key("main_bg_c_normal.png"));
        assert_eq!(
            reloaded.remote_state()["main_bg_b_normal.png"].hash,
            hash::hash_bytes(&png_b_new)
        );
        assert_eq!(reloaded.history().len(), 1);
        // Appearance applied once.
        assert_eq!(f.remote.appearance_calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn startup_rebuilds_inventory_and_redraws_without_diff() {
        let mut f = fixture();
        let png = tiny_png(9);
        write_asset(&f, "main_bg_title_normal.png", &png);
        f.remote.seed_attachment("main_bg_title_normal.png", "55", &png);

        f.engine
            .run_sync(&SyncOptions {
                is_startup: true,
                reason: "Startup Consistency".to_string(),
                ..SyncOptions::default()
            })
            .await
            .unwrap();

        // Nothing to upload or delete, but the page was still redrawn.
        assert!(f.remote.uploaded.lock().unwrap().is_empty());
        assert!(f.remote.deleted_ids.lock().unwrap().is_empty());
        assert_eq!(*f.remote.version.lock().unwrap(), 2);
        // Inventory came from download+hash.
        let (reloaded, _) = StateStore::load(
            f.dir.path().join("cache.json"),
            f.dir.path().join("history.json"),
        );
        assert_eq!(
            reloaded.remote_state()["main_bg_title_normal.png"].hash,
            hash::hash_bytes(&png)
        );
        assert_eq!(reloaded.remote_state()["main_bg_title_normal.png"].id, "55");
    }

    #[tokio::test]
    async fn no_changes_incremental_round_touches_nothing() {
        let mut f = fixture();
        let png = tiny_png(5);
        write_asset(&f, "main_bg_title_normal.png", &png);
        f.remote.seed_attachment("main_bg_title_normal.png", "55", &png);

        // Startup round populates the cache and pushes once.
        f.engine
            .run_sync(&SyncOptions {
                is_startup: true,
                reason: "Startup Consistency".to_string(),
                ..SyncOptions::default()
            })
            .await
            .unwrap();
        let version_after_startup = *f.remote.version.lock().unwrap();

        // A follow-up incremental round with no changes is a no-op.
        f.engine
            .run_sync(&SyncOptions {
                reason: "Watcher Sync".to_string(),
                ..SyncOptions::default()
            })
            .await
            .unwrap();
        assert_eq!(*f.remote.version.lock().unwrap(), version_after_startup);
    }

    #[tokio::test]
    async fn dry_run_previews_without_mutation() {
        let mut f = fixture();
        write_asset(&f, "main_bg_title_normal.png", &tiny_png(1));
        // Empty cache file so the round is incremental with one add.
        seed_state(&f.dir).save().unwrap();
        f.engine = build_engine(&f.dir, f.remote.clone());

        f.engine
            .run_sync(&SyncOptions {
                dry_run: true,
                reason: "Manual Sync".to_string(),
                ..SyncOptions::default()
            })
            .await
            .unwrap();

        assert!(f.remote.uploaded.lock().unwrap().is_empty());
        assert_eq!(*f.remote.version.lock().unwrap(), 1);
        let (reloaded, _) = StateStore::load(
            f.dir.path().join("cache.json"),
            f.dir.path().join("history.json"),
        );
        assert!(reloaded.history().is_empty());
    }

    #[tokio::test]
    async fn dry_run_captions_round_mutates_nothing() {
        let mut f = fixture();
        let png = tiny_png(7);
        write_asset(&f, "main_bg_title_normal.png", &png);
        f.remote.seed_attachment("main_bg_title_normal.png", "55", &png);

        // Cache matches reality, so the diff is empty and only the
        // captions flag is live.
        let mut seed = seed_state(&f.dir);
        seed.update_remote_asset("main_bg_title_normal.png", "55", hash::hash_bytes(&png));
        seed.save().unwrap();
        f.engine = build_engine(&f.dir, f.remote.clone());

        f.engine
            .run_sync(&SyncOptions {
                dry_run: true,
                captions_changed: true,
                reason: "Watcher Sync".to_string(),
                ..SyncOptions::default()
            })
            .await
            .unwrap();

        assert_eq!(*f.remote.version.lock().unwrap(), 1);
        assert!(f.remote.uploaded.lock().unwrap().is_empty());
        let (reloaded, _) = StateStore::load(
            f.dir.path().join("cache.json"),
            f.dir.path().join("history.json"),
        );
        assert!(reloaded.history().is_empty());
    }

    #[tokio::test]
    async fn dry_run_startup_round_leaves_state_documents_untouched() {
        let mut f = fixture();
        f.remote.seed_attachment("main_bg_title_normal.png", "55", &tiny_png(3));

        f.engine
            .run_sync(&SyncOptions {
                is_startup: true,
                dry_run: true,
                reason: "Manual Sync".to_string(),
                ..SyncOptions::default()
            })
            .await
            .unwrap();

        // The rebuilt inventory is previewed but never persisted.
        assert!(!f.dir.path().join("cache.json").exists());
        assert!(!f.dir.path().join("history.json").exists());
        assert_eq!(*f.remote.version.lock().unwrap(), 1);
        assert!(f.remote.deleted_ids.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_only_round_patches_history_in_place() {
        let mut f = fixture();
        let png_old = tiny_png(1);
        let png_new = tiny_png(2);
        write_asset(&f, "main_bg_title_normal.png", &png_new);
        f.remote.seed_attachment("main_bg_title_normal.png", "55", &png_old);

        // Page already carries the history markers plus a sentinel that a
        // full redraw would destroy.
        *f.remote.body.lock().unwrap() = format!(
            "<p>SENTINEL</p>{}{}",
            artsync_render::page::HISTORY_BEGIN,
            artsync_render::page::HISTORY_END
        );

        let mut seed = seed_state(&f.dir);
        seed.update_remote_asset("main_bg_title_normal.png", "55", hash::hash_bytes(&png_old));
        seed.save().unwrap();
        f.engine = build_engine(&f.dir, f.remote.clone());

        f.engine
            .run_sync(&SyncOptions {
                reason: "Watcher Sync".to_string(),
                ..SyncOptions::default()
            })
            .await
            .unwrap();

        let body = f.remote.body.lock().unwrap().clone();
        // Update-only: the existing layout survived, only history changed.
        assert!(body.contains("SENTINEL"));
        assert!(body.contains("Watcher Sync (+0 ~1 -0)"));
    }
}
