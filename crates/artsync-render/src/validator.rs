//! Filename validator.
//!
//! Checks asset filenames against the naming convention using a YAML
//! dictionary of known field values. Two layers run in order:
//!
//! 0. system-filename filter: cloud-sync conflict copies, manual copies,
//!    macOS/Office temp files, stray whitespace
//! 1. field-count checks, with targeted hints for numeric-font and
//!    language-variant files whose suffix landed in the wrong field
//! 2. semantic rules over the parsed fields (empty name, reserved or
//!    forbidden name, suffix rules for `nu` and language variants)
//!
//! `layout` files are exempt from the convention; the system filter still
//! applies to them in [`FilenameValidator::validate_all`].

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Context;
use regex::Regex;
use serde::Deserialize;

use crate::classifier::EXTENSIONS;

/// Raw shape of the dictionary file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DictFile {
    scene_module: Vec<String>,
    #[serde(rename = "type")]
    type_: Vec<String>,
    named: Vec<String>,
    state: Vec<String>,
    language: Vec<String>,
    bitmap_font: Vec<String>,
    forbidden_words: Vec<String>,
    empty_option: String,
}

/// Naming ranges loaded from the dictionary file.
#[derive(Debug)]
pub struct NamingRules {
    language: BTreeSet<String>,
    bitmap_font: BTreeSet<String>,
    /// Lowercased.
    forbidden_words: BTreeSet<String>,
    /// Every defined word except the `named` whitelist; a name field must
    /// not collide with these.
    reserved_names: BTreeSet<String>,
    empty_option: String,
}

impl NamingRules {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading naming dictionary {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("parsing naming dictionary {}", path.display()))
    }

    fn parse(content: &str) -> anyhow::Result<Self> {
        let raw: DictFile = serde_yaml::from_str(content)?;
        let mut reserved_names = BTreeSet::new();
        for group in [
            &raw.scene_module,
            &raw.type_,
            &raw.bitmap_font,
            &raw.state,
            &raw.language,
        ] {
            reserved_names.extend(group.iter().cloned());
        }
        Ok(Self {
            language: raw.language.into_iter().collect(),
            bitmap_font: raw.bitmap_font.into_iter().collect(),
            forbidden_words: raw
                .forbidden_words
                .into_iter()
                .map(|w| w.to_lowercase())
                .collect(),
            reserved_names,
            empty_option: raw.empty_option,
        })
    }
}

pub struct FilenameValidator {
    rules: NamingRules,
    system_patterns: Vec<(Regex, &'static str)>,
    group_conflict: Regex,
}

impl FilenameValidator {
    pub fn new(rules: NamingRules) -> anyhow::Result<Self> {
        // Ordered; the first match wins.
        let specs: [(&str, &str); 8] = [
            (
                r"\s*[（(]\s*\d+\s*[）)]\s*\.",
                "suspected cloud-sync conflict copy (bracketed number)",
            ),
            (
                r"\s*-\s*複製\s*\.",
                "suspected manual copy (contains 複製)",
            ),
            (
                r"(?i)\s*-\s*Copy\s*\.",
                "suspected manual copy (contains Copy)",
            ),
            (
                r"[（(][^）)]*衝突副本[^）)]*[）)]",
                "suspected Dropbox conflict copy",
            ),
            (r"^[._]{2}", "suspected macOS temp file (._ prefix)"),
            (r"^~\$", "suspected Office temp file (~$ prefix)"),
            (
                r"^\s|\s\.",
                "filename has leading whitespace or whitespace before the extension",
            ),
            (r"_\s|\s_", "filename has whitespace between fields"),
        ];
        let mut system_patterns = Vec::with_capacity(specs.len());
        for (pattern, message) in specs {
            let compiled = Regex::new(pattern)
                .with_context(|| format!("compiling filename pattern {pattern}"))?;
            system_patterns.push((compiled, message));
        }
        let group_conflict = Regex::new(r"[（(]\s*\d+\s*[）)]")
            .context("compiling group-key conflict pattern")?;
        Ok(Self {
            rules,
            system_patterns,
            group_conflict,
        })
    }

    /// First warning for `filename`, or `None` when it passes.
    pub fn validate(&self, filename: &str) -> Option<String> {
        // layout files have a free-form name.
        if filename.to_lowercase().contains("layout") {
            return None;
        }
        if let Some(warning) = self.system_warning(filename) {
            return Some(warning);
        }
        let parts = parse_fields(filename);
        if let Some(warning) = self.field_count_warning(&parts) {
            return Some(warning);
        }
        self.semantic_warnings(&parts).into_iter().next()
    }

    /// Every warning for `filename`, not just the first. The system filter
    /// applies even to layout files.
    pub fn validate_all(&self, filename: &str) -> Vec<String> {
        let mut warnings = Vec::new();
        if let Some(warning) = self.system_warning(filename) {
            warnings.push(warning);
        }
        if filename.to_lowercase().contains("layout") {
            return warnings;
        }
        let parts = parse_fields(filename);
        if let Some(warning) = self.field_count_warning(&parts) {
            // The semantic rules index into fields that are missing.
            warnings.push(warning);
            return warnings;
        }
        warnings.extend(self.semantic_warnings(&parts));
        warnings
    }

    /// Group keys are rebuilt from the first four filename fields; a
    /// conflict-copy suffix or stray whitespace in the source filename
    /// leaks into them.
    pub fn validate_group_key(&self, group_key: &str) -> Option<String> {
        if self.group_conflict.is_match(group_key) {
            return Some("group key looks like a cloud-sync conflict copy".to_string());
        }
        if group_key.contains(' ') || group_key.contains('\u{3000}') {
            return Some("group key contains whitespace".to_string());
        }
        None
    }

    fn system_warning(&self, filename: &str) -> Option<String> {
        self.system_patterns
            .iter()
            .find(|(pattern, _)| pattern.is_match(filename))
            .map(|(_, message)| (*message).to_string())
    }

    fn field_count_warning(&self, parts: &[String]) -> Option<String> {
        let n = parts.len();
        if n < 4 {
            if n >= 2 && parts[1].eq_ignore_ascii_case("nu") {
                return Some(
                    "suspected numeric-font file with too few fields (5 required)".to_string(),
                );
            }
            for field in parts.iter().take(4).skip(2) {
                if self.rules.language.contains(field) {
                    return Some(
                        "suspected language-variant file with too few fields \
                         (language code in the wrong position)"
                            .to_string(),
                    );
                }
            }
            return Some(format!("too few fields (found {n}, 4 required)"));
        }
        if parts[1].eq_ignore_ascii_case("nu") && self.rules.bitmap_font.contains(&parts[3]) {
            return Some(
                "suspected numeric-font file missing its state field \
                 (digit found in field 4)"
                    .to_string(),
            );
        }
        if self.rules.language.contains(&parts[3]) {
            return Some(
                "suspected language-variant file missing a field \
                 (language code in field 4, expected field 5)"
                    .to_string(),
            );
        }
        if parts[1].eq_ignore_ascii_case("nu") && n < 5 {
            return Some(
                "suspected numeric-font file with too few fields (5 required)".to_string(),
            );
        }
        None
    }

    /// Rules over a filename known to have at least 4 fields.
    fn semantic_warnings(&self, parts: &[String]) -> Vec<String> {
        let type_ = &parts[1];
        let name = &parts[2];
        let suffix = parts
            .get(4)
            .map(String::as_str)
            .unwrap_or(&self.rules.empty_option);

        let mut warnings = Vec::new();
        if name.trim().is_empty() {
            warnings.push("name field must not be empty".to_string());
        }
        if self.rules.reserved_names.contains(name) {
            warnings.push("name field collides with a defined dictionary word".to_string());
        }
        if self.rules.forbidden_words.contains(&name.to_lowercase()) {
            warnings.push("name field is a forbidden word".to_string());
        }
        if type_.eq_ignore_ascii_case("nu") {
            if suffix == self.rules.empty_option || !self.rules.bitmap_font.contains(suffix) {
                warnings.push(
                    "numeric-font file must end in a digit field, not a language code"
                        .to_string(),
                );
            }
        } else if !suffix.is_empty()
            && suffix != self.rules.empty_option
            && !self.rules.language.contains(suffix)
        {
            warnings.push(
                "language-variant file must end in a language code, not a digit".to_string(),
            );
        }
        warnings
    }
}

fn parse_fields(filename: &str) -> Vec<String> {
    let lower = filename.to_lowercase();
    let stem = EXTENSIONS
        .iter()
        .find(|ext| lower.ends_with(*ext))
        .map(|ext| &filename[..filename.len() - ext.len()])
        .unwrap_or(filename);
    stem.split('_').map(str::to_string).collect()
}
