use crate::aggregate::{Aggregator, Bucket, PartitionStrategy};
use crate::classify::{extract_page_links, LinkRecord};
use crate::errors::PsxError;
use crate::fetch::PageSource;
use crate::game_info::{extract_game_info, GameInfo, Region};
use crate::game_list::{GameList, GameListEntry};
use crate::locate::{locate_download_page, LocatorStrategy};
use crate::schedule::{ConstantDelay, DelayPolicy, Outcome};
use crate::session::{GameFailure, RunReport};
use chrono::Utc;
use scraper::Html;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tokio::time::sleep;
use url::Url;

pub mod aggregate;
pub mod classify;
pub mod errors;
pub mod fetch;
pub mod game_info;
pub mod game_list;
pub mod locate;
pub mod schedule;
pub mod session;

const DEFAULT_MAX_GAMES: usize = 50;
const DEFAULT_DELAY_MILLIS: u64 = 1500;
const DEFAULT_PROGRESS_EVERY: usize = 10;

#[derive(Debug, Clone)]
pub struct ScrapeRule {
    /// Only the first `max_games` entries of the list are scraped. `None` scrapes all of them.
    pub max_games: Option<usize>,
    pub partition: PartitionStrategy,
    /// Region used when a landing page doesn't name one
    pub default_region: Region,
    pub locator: LocatorStrategy,
    /// Wait between two games
    pub delay: Arc<dyn DelayPolicy>,
    /// Send a progress update every `progress_every` scraped games. 0 disables it.
    pub progress_every: usize,
    pub output_dir: PathBuf,
    /// Links containing any of these texts are skipped, on top of filecrypt.cc
    pub black_list_urls: Vec<String>,
}

impl Default for ScrapeRule {
    fn default() -> Self {
        Self {
            max_games: Some(DEFAULT_MAX_GAMES),
            partition: PartitionStrategy::default(),
            default_region: Region::default(),
            locator: LocatorStrategy::default(),
            delay: Arc::new(ConstantDelay(Duration::from_millis(DEFAULT_DELAY_MILLIS))),
            progress_every: DEFAULT_PROGRESS_EVERY,
            output_dir: PathBuf::from("."),
            black_list_urls: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub enum Update {
    MessageUpdate(Message),
    ProgressUpdate(Progress),
}

#[derive(Debug)]
pub struct Message {
    pub content: String,
    /// Name of the game the message is about
    pub resource_name: String,
    pub is_error: bool,
}

#[derive(Debug)]
pub struct Progress {
    pub processed: usize,
    pub errors: usize,
    pub total_games: usize,
    pub bucket_counts: Vec<(Bucket, usize)>,
}

/// What a single game yielded.
#[derive(Debug, Clone)]
pub struct GameLinks {
    pub download_page: Url,
    pub info: GameInfo,
    pub links: Vec<LinkRecord>,
}

async fn notify(update_tx: &Sender<Update>, update: Update) {
    if update_tx.send(update).await.is_err() {
        tracing::debug!("Update receiver dropped");
    }
}

fn read_landing_page(
    html: &str,
    page_url: &Url,
    rule: &ScrapeRule,
) -> Result<(GameInfo, Url), PsxError> {
    let document = Html::parse_document(html);
    let info = extract_game_info(&document, rule.default_region);
    let download_page = locate_download_page(&document, page_url, rule.locator)?;
    Ok((info, download_page))
}

fn read_download_page(
    html: &str,
    game: &GameListEntry,
    info: &GameInfo,
    rule: &ScrapeRule,
) -> Vec<LinkRecord> {
    let document = Html::parse_document(html);
    extract_page_links(&document, &game.name, info, &rule.black_list_urls)
}

/// Fetches a game's landing page, follows it to the download-list page and
/// classifies every link found there.
#[tracing::instrument(skip(source, rule))]
pub async fn scrape_game(
    source: &dyn PageSource,
    game: &GameListEntry,
    rule: &ScrapeRule,
) -> Result<GameLinks, PsxError> {
    let page_url = match Url::parse(&game.url) {
        Ok(u) => u,
        Err(_) => return Err(PsxError::InvalidUrl(game.url.to_string())),
    };

    let landing = source.fetch(&page_url).await?;
    let (info, download_page) = read_landing_page(&landing, &page_url, rule)?;

    let list_page = source.fetch(&download_page).await?;
    let links = read_download_page(&list_page, game, &info, rule);
    if links.is_empty() {
        tracing::warn!("No valid links found on {}", download_page);
    } else {
        tracing::info!(
            "Found {} links for {} ({:?}, v{}, {})",
            links.len(),
            game.name,
            info.region,
            info.version,
            info.size.as_deref().unwrap_or("unknown size")
        );
    }

    Ok(GameLinks {
        download_page,
        info,
        links,
    })
}

/// Scrapes the games of the list one after the other, then writes one file
/// per non-empty bucket into `rule.output_dir`. A failing game is recorded and
/// skipped, only a failure to write the results ends the run with an error.
#[tracing::instrument(skip(source, games, update_tx))]
pub async fn run_scrape(
    source: &dyn PageSource,
    mut games: GameList,
    rule: ScrapeRule,
    update_tx: Sender<Update>,
) -> Result<RunReport, PsxError> {
    let started_at = Utc::now();
    games.truncate(rule.max_games);
    let total_games = games.games.len();
    let mut queue: VecDeque<GameListEntry> = games.games.into();

    let mut aggregator = Aggregator::new(rule.partition);
    let mut processed = 0;
    let mut errors = 0;
    let mut total_links = 0;
    let mut games_with_primary = 0;
    let mut failures = Vec::new();

    while let Some(game) = queue.pop_front() {
        notify(
            &update_tx,
            Update::MessageUpdate(Message {
                content: "Processing".to_string(),
                resource_name: game.name.clone(),
                is_error: false,
            }),
        )
        .await;

        let outcome = match scrape_game(source, &game, &rule).await {
            Ok(found) => {
                processed += 1;
                total_links += aggregator.extend(found.links.iter());
                if found.links.iter().any(|l| l.provider.is_primary()) {
                    games_with_primary += 1;
                }
                for link in found.links.iter() {
                    notify(
                        &update_tx,
                        Update::MessageUpdate(Message {
                            content: format!(
                                "{} ({}): {} => {}",
                                link.provider.name().to_uppercase(),
                                link.content_type.as_str(),
                                link.key_description,
                                link.download_text
                            ),
                            resource_name: game.name.clone(),
                            is_error: false,
                        }),
                    )
                    .await;
                }
                if found.links.is_empty() {
                    notify(
                        &update_tx,
                        Update::MessageUpdate(Message {
                            content: format!("No valid links found in {}", found.download_page),
                            resource_name: game.name.clone(),
                            is_error: true,
                        }),
                    )
                    .await;
                }
                Outcome::Scraped {
                    links: found.links.len(),
                }
            }
            Err(e) => {
                errors += 1;
                if e.is_network() {
                    tracing::warn!("Error fetching pages of {}\nError : {}", game.name, e);
                } else {
                    tracing::error!("Error processing {}\nError : {}", game.name, e);
                }
                notify(
                    &update_tx,
                    Update::MessageUpdate(Message {
                        content: e.to_string(),
                        resource_name: game.name.clone(),
                        is_error: true,
                    }),
                )
                .await;
                failures.push(GameFailure {
                    name: game.name.clone(),
                    url: game.url.clone(),
                    error: e,
                });
                Outcome::Failed
            }
        };

        if matches!(outcome, Outcome::Scraped { .. })
            && rule.progress_every > 0
            && processed % rule.progress_every == 0
        {
            notify(
                &update_tx,
                Update::ProgressUpdate(Progress {
                    processed,
                    errors,
                    total_games,
                    bucket_counts: aggregator.counts(),
                }),
            )
            .await;
        }

        let delay = rule.delay.delay_after(outcome);
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }

    tracing::info!(
        "{} games processed, {} errors, {} unique links",
        processed,
        errors,
        aggregator.total()
    );
    let written = aggregator.write(&rule.output_dir).await?;

    Ok(RunReport {
        started_at,
        finished_at: Utc::now(),
        total_games,
        processed,
        errors,
        total_links,
        games_with_primary,
        failures,
        bucket_counts: aggregator.counts(),
        written,
    })
}
