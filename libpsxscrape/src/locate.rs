use crate::errors::PsxError;
use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};
use tracing::{event, instrument, Level};
use url::{ParseError, Url};

pub const BUTTON_IMAGE_MARKER: &str = "Download-button";
pub const DLL_PATH_MARKER: &str = "/dll-";

/// How the "go to downloads" control is found on a landing page. The site
/// changed its markup over time, each strategy matches one generation of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocatorStrategy {
    /// Parent element of the first image whose source contains `Download-button`.
    ButtonImage,
    /// First anchor whose href contains `/dll-`.
    DllPath,
    /// `ButtonImage`, falling back to `DllPath`.
    #[default]
    Auto,
}

lazy_static! {
    static ref BUTTON_IMAGE: Selector =
        Selector::parse(&format!(r#"img[src*="{BUTTON_IMAGE_MARKER}"]"#)).unwrap();
    static ref DLL_ANCHOR: Selector =
        Selector::parse(&format!(r#"a[href*="{DLL_PATH_MARKER}"]"#)).unwrap();
}

#[instrument]
/// Get the full link to a sub-page or file, given a page's full url.
pub fn resolve_link(link: &str, page_url: &Url) -> Option<Url> {
    if link.is_empty() {
        return None;
    }
    match Url::parse(link) {
        Ok(url) => Some(url),
        Err(e)
            if e == ParseError::EmptyHost
                || e == ParseError::RelativeUrlWithoutBase
                || e == ParseError::RelativeUrlWithCannotBeABaseBase =>
        {
            page_url.join(link).ok()
        }
        Err(e) => {
            event!(Level::ERROR, "Failed to get full link for {}", link);
            event!(Level::ERROR, "{}", e);
            None
        }
    }
}

fn by_button_image(document: &Html, page_url: &Url) -> Result<Url, PsxError> {
    let button = document
        .select(&BUTTON_IMAGE)
        .next()
        .ok_or_else(|| PsxError::DownloadControlNotFound(page_url.to_string()))?;
    let href = button
        .parent()
        .and_then(ElementRef::wrap)
        .and_then(|parent| parent.value().attr("href"))
        .ok_or_else(|| PsxError::DownloadControlWithoutLink(page_url.to_string()))?;
    resolve_link(href, page_url)
        .ok_or_else(|| PsxError::DownloadControlWithoutLink(page_url.to_string()))
}

fn by_dll_path(document: &Html, page_url: &Url) -> Result<Url, PsxError> {
    let anchor = document
        .select(&DLL_ANCHOR)
        .next()
        .ok_or_else(|| PsxError::DownloadControlNotFound(page_url.to_string()))?;
    let href = anchor.value().attr("href").unwrap_or("");
    resolve_link(href, page_url)
        .ok_or_else(|| PsxError::DownloadControlWithoutLink(page_url.to_string()))
}

/// Finds the absolute url of the download-list page linked from a landing page.
pub fn locate_download_page(
    document: &Html,
    page_url: &Url,
    strategy: LocatorStrategy,
) -> Result<Url, PsxError> {
    let found = match strategy {
        LocatorStrategy::ButtonImage => by_button_image(document, page_url),
        LocatorStrategy::DllPath => by_dll_path(document, page_url),
        LocatorStrategy::Auto => by_button_image(document, page_url).or_else(|e| {
            tracing::debug!("{}, trying {} anchors", e, DLL_PATH_MARKER);
            by_dll_path(document, page_url)
        }),
    };
    if let Ok(url) = &found {
        tracing::debug!("Download page for {} => {}", page_url, url);
    }
    found
}
