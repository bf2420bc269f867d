use crate::game_info::{cell_text, GameInfo};
use aho_corasick::{AhoCorasick, AhoCorasickBuilder};
use lazy_static::lazy_static;
use phf::phf_ordered_map;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::fmt::Formatter;
use url::Url;

/// Links to this host are never recorded, whatever the configuration says.
pub const EXCLUDED_DOMAIN: &str = "filecrypt.cc";

const UPDATE_KEYWORDS: [&str; 4] = ["update", "patch", "actualización", "parche"];
const DLC_KEYWORDS: [&str; 5] = ["dlc", "dlcs", "expansion", "add-on", "addon"];
const FIRMWARES: [&str; 7] = ["5.05", "6.72", "7.02", "7.55", "9.00", "11.00", "12.00"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Game,
    Update,
    Dlc,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Game => "game",
            ContentType::Update => "update",
            ContentType::Dlc => "dlc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Provider {
    Vikingfile,
    Akirabox,
    Onefichier,
    /// Any other host. Carries a name derived from the url, `other` if none could be found.
    Other(String),
}

impl Provider {
    pub fn name(&self) -> &str {
        match self {
            Provider::Vikingfile => "vikingfile",
            Provider::Akirabox => "akirabox",
            Provider::Onefichier => "1fichier",
            Provider::Other(name) => name,
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "vikingfile" => Provider::Vikingfile,
            "akirabox" => Provider::Akirabox,
            "1fichier" => Provider::Onefichier,
            other => Provider::Other(other.to_string()),
        }
    }

    /// VikingFile is the host the output is built around.
    pub fn is_primary(&self) -> bool {
        matches!(self, Provider::Vikingfile)
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Known hosts, checked in order against the raw url.
static PROVIDER_DOMAINS: phf::OrderedMap<&'static str, &'static str> = phf_ordered_map! {
    "vikingfile.com" => "vikingfile",
    "akirabox.com" => "akirabox",
    "1fichier.com" => "1fichier",
};

/// Hosts recognized by name only. They still count as `Other`.
const NAMED_HOSTS: [&str; 2] = ["mega", "mediafire"];

/// One outbound download link found on a download-list page.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkRecord {
    /// Raw href as found in the page, identity of the record
    pub url: String,
    pub name: String,
    pub content_type: ContentType,
    pub provider: Provider,
    /// Visible text of the anchor
    pub download_text: String,
    /// Text of the row's label cell
    pub key_description: String,
    pub info: GameInfo,
}

lazy_static! {
    static ref ROW: Selector = Selector::parse("table tr").unwrap();
    static ref CELL: Selector = Selector::parse("td").unwrap();
    static ref ANCHOR: Selector = Selector::parse("a").unwrap();
    static ref UPDATE_WORDS: AhoCorasick = AhoCorasickBuilder::new()
        .ascii_case_insensitive(true)
        .build(&UPDATE_KEYWORDS);
    static ref DLC_WORDS: AhoCorasick = AhoCorasickBuilder::new()
        .ascii_case_insensitive(true)
        .build(&DLC_KEYWORDS);
    static ref FIRMWARE_TOKENS: AhoCorasick = AhoCorasick::new(&FIRMWARES);
    static ref PARENTHESIZED: Regex = Regex::new(r"\((.*?)\)").unwrap();
    static ref PAREN_VERSION: Regex = Regex::new(r"v\s*(\d+(?:\.\d+)*)").unwrap();
    static ref LABEL_VERSION: Regex = Regex::new(r"\bv(\d+\.\d+)").unwrap();
}

/// Content type of a row from its label. Updates win over DLC, anything else is a game.
pub fn classify_link_type(label: &str) -> ContentType {
    let label = label.to_lowercase();
    if UPDATE_WORDS.is_match(&label) {
        ContentType::Update
    } else if DLC_WORDS.is_match(&label) {
        ContentType::Dlc
    } else {
        ContentType::Game
    }
}

/// Hosting provider of a link. Deterministic for a given url.
pub fn provider_for_url(url: &str) -> Provider {
    if let Some(provider) = PROVIDER_DOMAINS
        .entries()
        .find(|(domain, _)| url.contains(*domain))
        .map(|(_, name)| Provider::from_name(name))
    {
        return provider;
    }

    let lower = url.to_lowercase();
    if let Some(name) = NAMED_HOSTS.iter().find(|name| lower.contains(*name)) {
        return Provider::Other(name.to_string());
    }

    let derived = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .map(|host| {
            host.replace("www.", "")
                .replace(".com", "")
                .replace(".net", "")
                .replace(".org", "")
        })
        .filter(|name| !name.is_empty());
    Provider::Other(derived.unwrap_or_else(|| "other".to_string()))
}

fn is_excluded(href: &str, black_list: &[String]) -> bool {
    href.contains(EXCLUDED_DOMAIN)
        || black_list
            .iter()
            .any(|b| !b.is_empty() && href.contains(b.as_str()))
}

/// Applies firmware and version annotations found in a row label.
/// A `v1.05` marker outside parentheses sets the version, parenthesized
/// groups are read after it and win.
fn apply_label_overrides(label: &str, info: &mut GameInfo) {
    let outside = PARENTHESIZED.replace_all(label, "");
    if let Some(version) = LABEL_VERSION.captures(&outside).and_then(|c| c.get(1)) {
        info.version = version.as_str().to_string();
    }

    for group in PARENTHESIZED.captures_iter(label) {
        let content = match group.get(1) {
            Some(m) => m.as_str(),
            None => continue,
        };
        if FIRMWARE_TOKENS.is_match(content) {
            info.min_fw = Some(content.to_string());
        } else if let Some(version) = PAREN_VERSION.captures(content).and_then(|c| c.get(1)) {
            info.version = version.as_str().to_string();
        }
    }
}

/// Collects every download link of a download-list page. Rows need a label
/// cell and a link cell, excluded and empty links are skipped. Never fails.
pub fn extract_page_links(
    document: &Html,
    game_name: &str,
    game_info: &GameInfo,
    black_list: &[String],
) -> Vec<LinkRecord> {
    let mut records = Vec::new();

    for row in document.select(&ROW) {
        let cells: Vec<ElementRef> = row.select(&CELL).collect();
        if cells.len() < 2 {
            continue;
        }
        let key = cell_text(&cells[0]);
        let content_type = classify_link_type(&key);

        for anchor in cells[1].select(&ANCHOR) {
            let href = anchor.value().attr("href").unwrap_or("");
            if href.is_empty() || is_excluded(href, black_list) {
                tracing::debug!("Skipping link {:?} in row {}", href, key);
                continue;
            }

            let mut info = game_info.clone();
            apply_label_overrides(&key, &mut info);
            let provider = provider_for_url(href);
            let download_text = cell_text(&anchor);
            tracing::debug!(
                "{} ({}): {} => {}",
                provider.name().to_uppercase(),
                content_type.as_str(),
                key,
                download_text
            );

            records.push(LinkRecord {
                url: href.to_string(),
                name: game_name.to_string(),
                content_type,
                provider,
                download_text,
                key_description: key.clone(),
                info,
            });
        }
    }

    records
}
