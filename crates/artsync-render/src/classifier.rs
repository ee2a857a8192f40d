//! Slot-game asset classifier.
//!
//! Filename convention: `{scene}_{type}_{name}_{state}[_{suffix}]` where
//! the optional fifth field is either a language code (language-variant
//! group) or a digit (bitmap-font group when the type field is `nu`).
//! Classification is purely mechanical; it never rejects a filename, it
//! only decides where the asset is rendered.

use std::sync::Arc;

use artsync_core::domain::{AssetEntry, AssetRecord, ClassifiedAssets, Section};
use artsync_core::ports::IAssetClassifier;
use tracing::warn;

use crate::notes::CaptionStore;
use crate::validator::FilenameValidator;

/// Language codes recognized as the fifth filename field.
const LANG_CODES: &[&str] = &[
    "cn", "cm", "jp", "kr", "th", "id", "vn", "es", "pt", "tr", "mm", "bd", "en",
];

/// Type field marking a bitmap-font asset.
const NU_TYPE: &str = "nu";

pub(crate) const EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg"];

enum Bucket {
    Layout,
    Plain(Section),
    Language(Section, String),
    Numeric(Section, String),
}

pub struct SlotGameClassifier {
    captions: Arc<CaptionStore>,
    validator: Option<FilenameValidator>,
}

impl SlotGameClassifier {
    pub fn new(captions: Arc<CaptionStore>) -> Self {
        Self {
            captions,
            validator: None,
        }
    }

    /// Classifier that also reports naming-convention violations while it
    /// sorts assets into buckets.
    pub fn with_validator(captions: Arc<CaptionStore>, validator: FilenameValidator) -> Self {
        Self {
            captions,
            validator: Some(validator),
        }
    }

    fn classify_filename(filename: &str) -> Bucket {
        if filename.to_lowercase().contains("layout") {
            return Bucket::Layout;
        }

        let parts = parse_fields(filename);
        if parts.len() < 4 {
            let scene = parts.first().map(String::as_str).unwrap_or("");
            return Bucket::Plain(scene_of(scene));
        }

        let scene = scene_of(&parts[0]);

        // Fifth field is a language code: language-variant group keyed by
        // the first four fields.
        if parts.len() >= 5 && LANG_CODES.contains(&parts[4].to_lowercase().as_str()) {
            return Bucket::Language(scene, parts[..4].join("_"));
        }

        if parts[1].to_lowercase() == NU_TYPE {
            // Four fields ending in a digit means the state field is
            // missing; fall back to plain classification.
            if parts.len() < 5 && is_single_digit(&parts[3]) {
                return Bucket::Plain(scene);
            }
            return Bucket::Numeric(scene, parts[..4].join("_"));
        }

        Bucket::Plain(scene)
    }

    fn entry(&self, asset: &AssetRecord, caption_key: &str) -> AssetEntry {
        AssetEntry {
            filename: asset.filename.clone(),
            width: asset.width,
            height: asset.height,
            caption: self.captions.get(caption_key),
        }
    }
}

impl IAssetClassifier for SlotGameClassifier {
    fn classify(&self, assets: &[AssetRecord]) -> ClassifiedAssets {
        let mut classified = ClassifiedAssets::default();

        for asset in assets {
            if let Some(validator) = &self.validator {
                for warning in validator.validate_all(&asset.filename) {
                    warn!(file = %asset.filename, "{warning}");
                }
            }
            match Self::classify_filename(&asset.filename) {
                Bucket::Layout => {
                    let entry = self.entry(asset, &asset.filename);
                    classified.push_layout(entry);
                }
                Bucket::Plain(section) => {
                    let entry = self.entry(asset, &asset.filename);
                    classified.push_section(section, entry);
                }
                Bucket::Language(section, key) => {
                    // Group captions live under the group key.
                    let entry = self.entry(asset, &key);
                    classified.push_language_group(section, key, entry);
                }
                Bucket::Numeric(section, key) => {
                    let entry = self.entry(asset, &key);
                    classified.push_numeric_group(section, key, entry);
                }
            }
        }

        if let Some(validator) = &self.validator {
            let language_keys = classified.language_groups.values().flat_map(|g| g.keys());
            let numeric_keys = classified.numeric_groups.values().flat_map(|g| g.keys());
            for key in language_keys.chain(numeric_keys) {
                if let Some(warning) = validator.validate_group_key(key) {
                    warn!(group = %key, "{warning}");
                }
            }
        }

        classified
    }

    fn reload_captions(&self) -> anyhow::Result<()> {
        self.captions.reload();
        Ok(())
    }
}

/// Strip a known image extension and split the stem on underscores.
fn parse_fields(filename: &str) -> Vec<String> {
    let lower = filename.to_lowercase();
    let stem = EXTENSIONS
        .iter()
        .find(|ext| lower.ends_with(*ext))
        .map(|ext| &filename[..filename.len() - ext.len()])
        .unwrap_or(filename);
    stem.split('_').map(str::to_string).collect()
}

fn scene_of(scene: &str) -> Section {
    match scene.to_lowercase().as_str() {
        "free" => Section::Free,
        "loading" => Section::Loading,
        _ => Section::Main,
    }
}

fn is_single_digit(s: &str) -> bool {
    s.len() == 1 && s.chars().all(|c| c.is_ascii_digit())
}
