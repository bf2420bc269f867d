use lazy_static::lazy_static;
use phf::phf_ordered_map;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

pub const DEFAULT_VERSION: &str = "1.00";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Region {
    USA,
    EUR,
    JAP,
}

impl Default for Region {
    fn default() -> Self {
        Region::EUR
    }
}

impl Region {
    /// Region named in a details cell. USA is checked before EUR, EUR before JAP.
    pub fn detect(value: &str) -> Option<Self> {
        if value.contains("USA") {
            Some(Region::USA)
        } else if value.contains("EUR") {
            Some(Region::EUR)
        } else if value.contains("JAP") || value.contains("JPN") {
            Some(Region::JAP)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameInfo {
    pub region: Region,
    pub size: Option<String>,
    pub version: String,
    pub release: Option<String>,
    pub min_fw: Option<String>,
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cusa: Option<String>,
}

impl GameInfo {
    pub fn with_region(region: Region) -> Self {
        Self {
            region,
            size: None,
            version: DEFAULT_VERSION.to_string(),
            release: None,
            min_fw: None,
            cover_url: None,
            cusa: None,
        }
    }
}

impl Default for GameInfo {
    fn default() -> Self {
        Self::with_region(Region::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Size,
    Version,
    Update,
    Firmware,
    Release,
}

/// Label keywords of the details table, checked in order. Matching is a
/// case-sensitive substring test on the label cell.
static LABELS: phf::OrderedMap<&'static str, Field> = phf_ordered_map! {
    "Size" => Field::Size,
    "Tamaño" => Field::Size,
    "Version" => Field::Version,
    "Versión" => Field::Version,
    "Update" => Field::Update,
    "Required Firmware" => Field::Firmware,
    "Firmware" => Field::Firmware,
    "Release Date" => Field::Release,
    "Fecha" => Field::Release,
};

const COVER_CLASSES: [&str; 2] = ["wp-post-image", "attachment-post-thumbnail"];
const COVER_EXTENSIONS: [&str; 3] = [".jpg", ".png", ".webp"];

lazy_static! {
    static ref TABLE: Selector = Selector::parse("table").unwrap();
    static ref ROW: Selector = Selector::parse("tr").unwrap();
    static ref CELL: Selector = Selector::parse("td").unwrap();
    static ref IMG: Selector = Selector::parse("img[src]").unwrap();
    static ref VERSION: Regex = Regex::new(r"v?(\d+\.\d+)").unwrap();
    static ref CUSA: Regex = Regex::new(r"CUSA\d+").unwrap();
}

pub(crate) fn cell_text(cell: &ElementRef) -> String {
    cell.text().collect::<String>().trim().to_string()
}

fn field_for(label: &str) -> Option<Field> {
    LABELS
        .entries()
        .find(|(keyword, _)| label.contains(*keyword))
        .map(|(_, field)| *field)
}

fn version_in(value: &str) -> Option<String> {
    VERSION
        .captures(value)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Reads the details table of a landing page. Never fails, a page without
/// a table yields the defaults.
pub fn extract_game_info(document: &Html, default_region: Region) -> GameInfo {
    let mut info = GameInfo::with_region(default_region);

    if let Some(table) = document.select(&TABLE).next() {
        for row in table.select(&ROW) {
            let cells: Vec<ElementRef> = row.select(&CELL).collect();
            if cells.len() < 2 {
                continue;
            }
            let key = cell_text(&cells[0]);
            let value = cell_text(&cells[1]);
            match field_for(&key) {
                Some(Field::Size) => info.size = Some(value),
                Some(Field::Version) => {
                    if let Some(region) = Region::detect(&value) {
                        info.region = region;
                    }
                    if let Some(version) = version_in(&value) {
                        info.version = version;
                    }
                    if let Some(cusa) = CUSA.find(&value) {
                        info.cusa = Some(cusa.as_str().to_string());
                    }
                }
                Some(Field::Update) => {
                    if let Some(version) = version_in(&value) {
                        info.version = version;
                    }
                }
                Some(Field::Firmware) => info.min_fw = Some(value),
                Some(Field::Release) => info.release = Some(value),
                None => tracing::debug!("Ignoring details row {}", key),
            }
        }
    }

    info.cover_url = find_cover(document);
    info
}

fn find_cover(document: &Html) -> Option<String> {
    let by_class = document.select(&IMG).find(|img| {
        img.value()
            .classes()
            .any(|class| COVER_CLASSES.contains(&class))
    });
    let img = by_class.or_else(|| {
        document.select(&IMG).find(|img| {
            let src = img.value().attr("src").unwrap_or("");
            COVER_EXTENSIONS.iter().any(|ext| src.contains(ext))
                && src.to_lowercase().contains("cover")
        })
    })?;
    img.value().attr("src").map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info_of(html: &str, region: Region) -> GameInfo {
        extract_game_info(&Html::parse_document(html), region)
    }

    #[test]
    fn test_no_table_gives_defaults() {
        let info = info_of("<html><body><p>nothing here</p></body></html>", Region::USA);
        assert_eq!(info, GameInfo::with_region(Region::USA));
        assert_eq!(info.version, "1.00");
    }

    #[test]
    fn test_details_table() {
        let info = info_of(
            r#"<table>
                <tr><td>Size</td><td> 10 GB </td></tr>
                <tr><td>Version</td><td>CUSA01234 USA v1.02</td></tr>
                <tr><td>Required Firmware</td><td>9.00</td></tr>
                <tr><td>Release Date</td><td>2020-01-01</td></tr>
                <tr><td>only one cell</td></tr>
            </table>"#,
            Region::EUR,
        );
        assert_eq!(info.size.as_deref(), Some("10 GB"));
        assert_eq!(info.region, Region::USA);
        assert_eq!(info.version, "1.02");
        assert_eq!(info.cusa.as_deref(), Some("CUSA01234"));
        assert_eq!(info.min_fw.as_deref(), Some("9.00"));
        assert_eq!(info.release.as_deref(), Some("2020-01-01"));
    }

    #[test]
    fn test_localized_labels_and_update_row() {
        let info = info_of(
            r#"<table>
                <tr><td>Tamaño</td><td>3.5 GB</td></tr>
                <tr><td>Versión</td><td>JPN</td></tr>
                <tr><td>Update</td><td>v2.10 included</td></tr>
                <tr><td>Fecha</td><td>marzo</td></tr>
            </table>"#,
            Region::EUR,
        );
        assert_eq!(info.size.as_deref(), Some("3.5 GB"));
        assert_eq!(info.region, Region::JAP);
        assert_eq!(info.version, "2.10");
        assert_eq!(info.release.as_deref(), Some("marzo"));
        assert_eq!(info.cusa, None);
    }

    #[test]
    fn test_labels_are_case_sensitive() {
        let info = info_of(
            "<table><tr><td>size</td><td>1 GB</td></tr></table>",
            Region::EUR,
        );
        assert_eq!(info.size, None);
    }

    #[test]
    fn test_only_first_table_is_read() {
        let info = info_of(
            r#"<table><tr><td>Size</td><td>1 GB</td></tr></table>
               <table><tr><td>Size</td><td>2 GB</td></tr></table>"#,
            Region::EUR,
        );
        assert_eq!(info.size.as_deref(), Some("1 GB"));
    }

    #[test]
    fn test_cover_by_class_then_by_name() {
        let info = info_of(
            r#"<img src="/logo.png"><img class="size-full wp-post-image" src="/img/game.jpg">"#,
            Region::EUR,
        );
        assert_eq!(info.cover_url.as_deref(), Some("/img/game.jpg"));

        let info = info_of(
            r#"<img src="/logo.png"><img src="/uploads/Game-Cover.webp">"#,
            Region::EUR,
        );
        assert_eq!(info.cover_url.as_deref(), Some("/uploads/Game-Cover.webp"));

        let info = info_of(r#"<img src="/cover.gif">"#, Region::EUR);
        assert_eq!(info.cover_url, None);
    }
}
