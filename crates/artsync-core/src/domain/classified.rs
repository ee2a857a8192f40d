use std::collections::BTreeMap;

/// Page section an asset lands in, derived from the scene field of the
/// filename convention. Anything that is not `free` or `loading` counts as
/// `main`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    Main,
    Free,
    Loading,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::Main, Section::Free, Section::Loading];

    pub fn title(self) -> &'static str {
        match self {
            Section::Main => "Main Game",
            Section::Free => "Free Game",
            Section::Loading => "Loading",
        }
    }

    /// Suffix used in grouped-category names (`multi_main`, `nu_free`, ...).
    pub fn suffix(self) -> &'static str {
        match self {
            Section::Main => "main",
            Section::Free => "free",
            Section::Loading => "loading",
        }
    }
}

/// One asset as it appears in the rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetEntry {
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub caption: String,
}

/// Output of the classifier: plain per-section lists plus two families of
/// grouped tables. Group maps are keyed by the first four filename fields so
/// variants of one logical asset render side by side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedAssets {
    /// Assets whose filename mentions `layout`, rendered first.
    pub layout: Vec<AssetEntry>,
    /// Ungrouped assets per section.
    pub sections: BTreeMap<Section, Vec<AssetEntry>>,
    /// Language-variant groups (`multi_*`) per section.
    pub language_groups: BTreeMap<Section, BTreeMap<String, Vec<AssetEntry>>>,
    /// Numeric bitmap-font groups (`nu_*`) per section.
    pub numeric_groups: BTreeMap<Section, BTreeMap<String, Vec<AssetEntry>>>,
}

impl ClassifiedAssets {
    pub fn push_layout(&mut self, entry: AssetEntry) {
        self.layout.push(entry);
    }

    pub fn push_section(&mut self, section: Section, entry: AssetEntry) {
        self.sections.entry(section).or_default().push(entry);
    }

    pub fn push_language_group(&mut self, section: Section, key: String, entry: AssetEntry) {
        self.language_groups
            .entry(section)
            .or_default()
            .entry(key)
            .or_default()
            .push(entry);
    }

    pub fn push_numeric_group(&mut self, section: Section, key: String, entry: AssetEntry) {
        self.numeric_groups
            .entry(section)
            .or_default()
            .entry(key)
            .or_default()
            .push(entry);
    }

    pub fn total(&self) -> usize {
        let grouped: usize = self
            .language_groups
            .values()
            .chain(self.numeric_groups.values())
            .flat_map(|groups| groups.values())
            .map(Vec::len)
            .sum();
        self.layout.len() + self.sections.values().map(Vec::len).sum::<usize>() + grouped
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> AssetEntry {
        AssetEntry {
            filename: name.to_string(),
            width: 10,
            height: 10,
            caption: String::new(),
        }
    }

    #[test]
    fn total_counts_every_bucket() {
        let mut classified = ClassifiedAssets::default();
        classified.push_layout(entry("layout_full.png"));
        classified.push_section(Section::Main, entry("main_bg_title_normal.png"));
        classified.push_language_group(
            Section::Free,
            "free_btn_start_normal".into(),
            entry("free_btn_start_normal_en.png"),
        );
        classified.push_numeric_group(
            Section::Main,
            "main_nu_win_normal".into(),
            entry("main_nu_win_normal_0.png"),
        );
        assert_eq!(classified.total(), 4);
        assert!(!classified.is_empty());
    }

    #[test]
    fn empty_by_default() {
        assert!(ClassifiedAssets::default().is_empty());
    }
}
