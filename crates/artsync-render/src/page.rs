//! Wiki page builder.
//!
//! Emits Confluence storage-format XHTML: a table of contents, the history
//! table, the layout grid, and one block of tables per section. The history
//! table is wrapped in HTML comment markers so it can be replaced in place
//! without parsing the rest of the document.

use artsync_core::domain::{AssetEntry, ClassifiedAssets, HistoryEntry, Section};
use artsync_core::ports::IPageRenderer;

/// Markers delimiting the replaceable history block.
pub const HISTORY_BEGIN: &str = "<!-- artsync:history:begin -->";
pub const HISTORY_END: &str = "<!-- artsync:history:end -->";

/// Display width caps per table kind, in pixels.
const LAYOUT_MAX_WIDTH: u32 = 250;
const NORMAL_MAX_WIDTH: u32 = 120;
const LANGUAGE_MAX_WIDTH: u32 = 100;
const NUMERIC_MAX_WIDTH: u32 = 80;

/// Images per row in the grid layouts.
const LAYOUT_PER_ROW: usize = 4;
const LANGUAGE_PER_ROW: usize = 7;
const NUMERIC_PER_ROW: usize = 8;

const LABEL_CELL_STYLE: &str = "background:#f1f3f5; font-size:10px;";

#[derive(Debug, Default)]
pub struct PageBuilder;

impl PageBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Confluence image macro referencing a page attachment, capped to
    /// `max_width` but never upscaled.
    fn image_tag(filename: &str, width: u32, max_width: u32) -> String {
        let final_w = width.min(max_width);
        format!(
            r#"<ac:image ac:width="{final_w}"><ri:attachment ri:filename="{}" /></ac:image>"#,
            escape(filename)
        )
    }

    /// The marker-delimited history block. Markers are present even when
    /// the history is empty so the light path can always patch in place.
    fn history_block(history: &[HistoryEntry]) -> String {
        let mut xhtml = String::from(HISTORY_BEGIN);
        if !history.is_empty() {
            xhtml.push_str(
                "<h2>Update History</h2><table><thead><tr>\
                 <th style='background:#f1f3f5;'>Date</th>\
                 <th style='background:#f1f3f5;'>Change</th>\
                 <th style='background:#f1f3f5;'>By</th>\
                 </tr></thead><tbody>",
            );
            for entry in history {
                let who = match &entry.author_id {
                    Some(id) => format!(
                        r#"<ac:link><ri:user ri:account-id="{}" /></ac:link>"#,
                        escape(id)
                    ),
                    None => String::new(),
                };
                xhtml.push_str(&format!(
                    "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    escape(&entry.message),
                    who,
                ));
            }
            xhtml.push_str("</tbody></table>");
        }
        xhtml.push_str(HISTORY_END);
        xhtml
    }

    fn layout_grid(assets: &[AssetEntry]) -> String {
        if assets.is_empty() {
            return String::new();
        }
        let mut sorted: Vec<&AssetEntry> = assets.iter().collect();
        sorted.sort_by(|a, b| a.filename.cmp(&b.filename));

        let mut xhtml = String::from("<h2>1. Layout Overview</h2><table><tbody>");
        for chunk in sorted.chunks(LAYOUT_PER_ROW) {
            xhtml.push_str("<tr>");
            for asset in chunk {
                xhtml.push_str(&format!(
                    "<td style='background:#f1f3f5; font-size:11px; font-weight:bold;'>{}</td>",
                    escape(&asset.filename)
                ));
            }
            xhtml.push_str("</tr><tr>");
            for asset in chunk {
                xhtml.push_str(&format!(
                    "<td>{}</td>",
                    Self::image_tag(&asset.filename, asset.width, LAYOUT_MAX_WIDTH)
                ));
            }
            xhtml.push_str("</tr>");
        }
        xhtml.push_str("</tbody></table>");
        xhtml
    }

    fn normal_table(title: &str, assets: &[AssetEntry]) -> String {
        if assets.is_empty() {
            return String::new();
        }
        let mut sorted: Vec<&AssetEntry> = assets.iter().collect();
        sorted.sort_by(|a, b| a.filename.cmp(&b.filename));

        let mut xhtml = format!(
            "<h2>{title}</h2><table><thead><tr>\
             <th>Preview</th><th>Name</th><th>Size</th><th>Notes</th>\
             </tr></thead><tbody>"
        );
        for asset in sorted {
            xhtml.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}x{}</td><td>{}</td></tr>",
                Self::image_tag(&asset.filename, asset.width, NORMAL_MAX_WIDTH),
                escape(&asset.filename),
                asset.width,
                asset.height,
                escape(&asset.caption),
            ));
        }
        xhtml.push_str("</tbody></table>");
        xhtml
    }

    fn language_grid(
        title: &str,
        groups: &std::collections::BTreeMap<String, Vec<AssetEntry>>,
    ) -> String {
        if groups.is_empty() {
            return String::new();
        }
        let mut xhtml = format!("<h3>{title}</h3>");
        for (key, assets) in groups {
            xhtml.push_str(&format!(
                "<p style=\"font-size: 16px; font-weight: bold; margin-top: 20px;\">\
                 Group: {}_{{language}}</p>",
                escape(key)
            ));
            if let Some(caption) = assets.iter().map(|a| a.caption.as_str()).find(|c| !c.is_empty())
            {
                xhtml.push_str(&format!("<p>{}</p>", escape(caption)));
            }
            xhtml.push_str("<table><tbody>");

            let mut sorted: Vec<&AssetEntry> = assets.iter().collect();
            sorted.sort_by(|a, b| a.filename.cmp(&b.filename));

            for chunk in sorted.chunks(LANGUAGE_PER_ROW) {
                xhtml.push_str("<tr>");
                for asset in chunk {
                    xhtml.push_str(&format!(
                        "<td style='{LABEL_CELL_STYLE}'>{}</td>",
                        language_label(&asset.filename)
                    ));
                }
                xhtml.push_str("</tr><tr>");
                for asset in chunk {
                    xhtml.push_str(&format!(
                        "<td>{}</td>",
                        Self::image_tag(&asset.filename, asset.width, LANGUAGE_MAX_WIDTH)
                    ));
                }
                xhtml.push_str("</tr>");
            }
            xhtml.push_str("</tbody></table>");
        }
        xhtml
    }

    fn numeric_grid(
        title: &str,
        groups: &std::collections::BTreeMap<String, Vec<AssetEntry>>,
    ) -> String {
        if groups.is_empty() {
            return String::new();
        }
        let mut xhtml = format!("<h3>{title}</h3>");
        for (key, assets) in groups {
            xhtml.push_str(&format!("<h4>Group: {}</h4><table><tbody>", escape(key)));

            let caption = assets
                .iter()
                .map(|a| a.caption.as_str())
                .find(|c| !c.is_empty())
                .unwrap_or("");
            xhtml.push_str(&format!(
                "<tr><th colspan='{NUMERIC_PER_ROW}' style='background:#fffde7; text-align:left;'>\
                 Notes: {}</th></tr>",
                escape(caption)
            ));

            let mut sorted: Vec<&AssetEntry> = assets.iter().collect();
            sorted.sort_by(|a, b| a.filename.cmp(&b.filename));

            for chunk in sorted.chunks(NUMERIC_PER_ROW) {
                xhtml.push_str("<tr>");
                for asset in chunk {
                    xhtml.push_str(&format!(
                        "<td style='{LABEL_CELL_STYLE}'>{}</td>",
                        trailing_label(&asset.filename)
                    ));
                }
                xhtml.push_str("</tr><tr>");
                for asset in chunk {
                    xhtml.push_str(&format!(
                        "<td>{}</td>",
                        Self::image_tag(&asset.filename, asset.width, NUMERIC_MAX_WIDTH)
                    ));
                }
                xhtml.push_str("</tr>");
            }
            xhtml.push_str("</tbody></table>");
        }
        xhtml
    }
}

impl IPageRenderer for PageBuilder {
    fn render_page(&self, classified: &ClassifiedAssets, history: &[HistoryEntry]) -> String {
        let mut xhtml = String::from(r#"<p><ac:structured-macro ac:name="toc" /></p>"#);
        xhtml.push_str(&Self::history_block(history));
        xhtml.push_str(&Self::layout_grid(&classified.layout));

        static EMPTY: Vec<AssetEntry> = Vec::new();
        for (index, section) in Section::ALL.iter().enumerate() {
            let assets = classified.sections.get(section).unwrap_or(&EMPTY);
            xhtml.push_str(&Self::normal_table(
                &format!("{}. {} Assets", index + 2, section.title()),
                assets,
            ));
            if let Some(groups) = classified.language_groups.get(section) {
                xhtml.push_str(&Self::language_grid(
                    &format!("{}: Language Variants", section.title()),
                    groups,
                ));
            }
            if let Some(groups) = classified.numeric_groups.get(section) {
                xhtml.push_str(&Self::numeric_grid(
                    &format!("{}: Bitmap Digits", section.title()),
                    groups,
                ));
            }
        }

        xhtml
    }

    fn patch_history(&self, current_body: &str, history: &[HistoryEntry]) -> Option<String> {
        let start = current_body.find(HISTORY_BEGIN)?;
        let end = current_body.find(HISTORY_END)?;
        if end < start {
            return None;
        }
        let tail = &current_body[end + HISTORY_END.len()..];
        let mut patched = String::with_capacity(current_body.len());
        patched.push_str(&current_body[..start]);
        patched.push_str(&Self::history_block(history));
        patched.push_str(tail);
        Some(patched)
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Uppercased language code, the fifth underscore field of the stem.
fn language_label(filename: &str) -> String {
    stem(filename)
        .split('_')
        .nth(4)
        .map(str::to_uppercase)
        .unwrap_or_default()
}

/// The last underscore field of the stem, e.g. the digit of a bitmap font.
fn trailing_label(filename: &str) -> String {
    stem(filename)
        .rsplit('_')
        .next()
        .unwrap_or_default()
        .to_string()
}

fn stem(filename: &str) -> &str {
    filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use artsync_core::domain::ClassifiedAssets;

    fn entry(name: &str, caption: &str) -> AssetEntry {
        AssetEntry {
            filename: name.to_string(),
            width: 300,
            height: 200,
            caption: caption.to_string(),
        }
    }

    fn one_entry_history() -> Vec<HistoryEntry> {
        vec![HistoryEntry::new("synced 2 assets", Some("712020:abc".into()))]
    }

    #[test]
    fn render_includes_markers_toc_and_sections() {
        let mut classified = ClassifiedAssets::default();
        classified.push_section(Section::Main, entry("main_bg_title_normal.png", "title bg"));
        classified.push_section(Section::Free, entry("free_bg_title_normal.png", ""));

        let body = PageBuilder::new().render_page(&classified, &one_entry_history());
        assert!(body.contains(HISTORY_BEGIN));
        assert!(body.contains(HISTORY_END));
        assert!(body.contains(r#"ac:name="toc""#));
        assert!(body.contains("2. Main Game Assets"));
        assert!(body.contains("3. Free Game Assets"));
        assert!(body.contains("title bg"));
        assert!(body.contains("300x200"));
        assert!(body.contains("712020:abc"));
    }

    #[test]
    fn image_width_is_capped_but_never_upscaled() {
        assert!(PageBuilder::image_tag("a.png", 300, 120).contains(r#"ac:width="120""#));
        assert!(PageBuilder::image_tag("a.png", 80, 120).contains(r#"ac:width="80""#));
    }

    #[test]
    fn markers_survive_empty_history() {
        let body = PageBuilder::new().render_page(&ClassifiedAssets::default(), &[]);
        assert!(body.contains(HISTORY_BEGIN));
        assert!(body.contains(HISTORY_END));
        assert!(!body.contains("Update History"));
    }

    #[test]
    fn patch_replaces_only_the_history_block() {
        let builder = PageBuilder::new();
        let mut classified = ClassifiedAssets::default();
        classified.push_section(Section::Main, entry("main_bg_title_normal.png", ""));

        let body = builder.render_page(&classified, &one_entry_history());
        let new_history = vec![HistoryEntry::new("removed 1 asset", None)];
        let patched = builder.patch_history(&body, &new_history).unwrap();

        assert!(patched.contains("removed 1 asset"));
        assert!(!patched.contains("synced 2 assets"));
        // Everything outside the block is untouched.
        assert!(patched.contains("main_bg_title_normal.png"));
        assert!(patched.contains(r#"ac:name="toc""#));
    }

    #[test]
    fn patch_without_markers_falls_back_to_none() {
        let builder = PageBuilder::new();
        assert!(builder.patch_history("<p>legacy page</p>", &[]).is_none());
    }

    #[test]
    fn language_grid_labels_come_from_the_fifth_field() {
        let mut classified = ClassifiedAssets::default();
        classified.push_language_group(
            Section::Main,
            "main_btn_start_normal".into(),
            entry("main_btn_start_normal_en.png", ""),
        );
        classified.push_language_group(
            Section::Main,
            "main_btn_start_normal".into(),
            entry("main_btn_start_normal_jp.png", ""),
        );

        let body = PageBuilder::new().render_page(&classified, &[]);
        assert!(body.contains(">EN</td>"));
        assert!(body.contains(">JP</td>"));
        assert!(body.contains("Group: main_btn_start_normal_{language}"));
    }

    #[test]
    fn captions_are_escaped() {
        let mut classified = ClassifiedAssets::default();
        classified.push_section(Section::Main, entry("main_bg_title_normal.png", "a < b & c"));
        let body = PageBuilder::new().render_page(&classified, &[]);
        assert!(body.contains("a &lt; b &amp; c"));
    }
}
