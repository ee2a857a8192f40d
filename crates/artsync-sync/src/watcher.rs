//! Filesystem watcher.
//!
//! Thin layer over the platform watcher: filters out editor junk,
//! distinguishes captions-file changes from asset changes, and forwards
//! everything else to a callback (in practice the coalescer). No
//! debouncing happens here.

use std::path::Path;

use anyhow::Context;
use globset::GlobSet;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

use crate::scanner::build_glob_set;

/// Keeps the underlying watcher alive. Dropping it stops event delivery.
pub struct WatchHandle {
    _watcher: RecommendedWatcher,
}

/// Watch `target` recursively for asset changes. `on_event(true)` means
/// the captions file changed, `on_event(false)` an asset did. The captions
/// file may live outside the target folder; its parent directory is then
/// watched non-recursively as well.
pub fn watch(
    target: &Path,
    captions_file: Option<&Path>,
    include: &[String],
    on_event: impl Fn(bool) + Send + 'static,
) -> anyhow::Result<WatchHandle> {
    let include = build_glob_set(include)?;
    let captions_name = captions_file
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .map(str::to_string);

    let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
        let event = match result {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "watch error");
                return;
            }
        };
        if !matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        ) {
            return;
        }
        for path in &event.paths {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(captions) = event_flag(name, captions_name.as_deref(), &include) {
                debug!(file = %name, captions, "change detected");
                on_event(captions);
            }
        }
    })
    .context("creating filesystem watcher")?;

    watcher
        .watch(target, RecursiveMode::Recursive)
        .with_context(|| format!("watching {}", target.display()))?;

    if let Some(captions) = captions_file {
        if let Some(parent) = captions.parent() {
            if !parent.as_os_str().is_empty() && !parent.starts_with(target) {
                watcher
                    .watch(parent, RecursiveMode::NonRecursive)
                    .with_context(|| format!("watching {}", parent.display()))?;
            }
        }
    }

    Ok(WatchHandle { _watcher: watcher })
}

/// `Some(true)` for the captions file, `Some(false)` for a matching asset,
/// `None` for everything to ignore.
fn event_flag(name: &str, captions_name: Option<&str>, include: &GlobSet) -> Option<bool> {
    if is_junk(name) {
        return None;
    }
    if captions_name == Some(name) {
        return Some(true);
    }
    if include.is_match(name) {
        return Some(false);
    }
    None
}

/// Temp and metadata files editors leave next to real assets.
fn is_junk(name: &str) -> bool {
    name == ".DS_Store"
        || name.starts_with("~$")
        || name.starts_with("._")
        || name.ends_with('~')
        || name.ends_with(".swp")
        || name.ends_with(".tmp")
}
