use clap::{Parser, ValueEnum};
use libpsxscrape::aggregate::{Bucket, PartitionStrategy};
use libpsxscrape::fetch::HttpFetcher;
use libpsxscrape::game_info::Region;
use libpsxscrape::game_list::{
    load_game_list, GameListSource, DEFAULT_GAME_LIST_FILE, DEFAULT_GAME_LIST_URL,
};
use libpsxscrape::locate::LocatorStrategy;
use libpsxscrape::schedule::ConstantDelay;
use libpsxscrape::session::RunReport;
use libpsxscrape::{run_scrape, Message, Progress, ScrapeRule, Update};
use owo_colors::{OwoColorize, Stream::Stdout};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::channel;
use url::Url;

const MAX_BUFFER_SIZE: usize = 100;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "PS4 download link scraper",
    long_about = "Scrapes the game catalog for download links and saves them as JSON files, \
    one per hosting provider or per content type."
)]
pub struct Cli {
    #[arg(help = "Process the whole game list.", long)]
    full: bool,
    #[arg(default_value = "50", help = "Number of games to process.", long)]
    games: usize,
    #[arg(help = "Only print errors and the final result.", long)]
    quiet: bool,
    #[arg(
        help = "Read the game list from this file instead of downloading it.",
        long,
        num_args = 0..=1,
        default_missing_value = DEFAULT_GAME_LIST_FILE
    )]
    list_file: Option<PathBuf>,
    #[arg(default_value = DEFAULT_GAME_LIST_URL, long)]
    list_url: Url,
    #[arg(default_value = ".", long)]
    output_dir: PathBuf,
    #[arg(value_enum, default_value_t = PartitionArg::ByProvider, long)]
    partition: PartitionArg,
    #[arg(
        value_enum,
        default_value_t = RegionArg::Eur,
        help = "Region used when a game page doesn't name one.",
        long
    )]
    default_region: RegionArg,
    #[arg(value_enum, default_value_t = LocatorArg::Auto, long)]
    locator: LocatorArg,
    #[arg(default_value = "1500", help = "Pause between two games in milliseconds.", long)]
    delay_ms: u64,
    #[arg(
        help = "Skip links containing this text. Can be repeated, filecrypt.cc is always skipped.",
        long
    )]
    exclude: Vec<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PartitionArg {
    ByProvider,
    ByContentType,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum RegionArg {
    Usa,
    Eur,
    Jap,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LocatorArg {
    Auto,
    ButtonImage,
    DllPath,
}

impl From<PartitionArg> for PartitionStrategy {
    fn from(arg: PartitionArg) -> Self {
        match arg {
            PartitionArg::ByProvider => PartitionStrategy::ByProvider,
            PartitionArg::ByContentType => PartitionStrategy::ByContentType,
        }
    }
}

impl From<RegionArg> for Region {
    fn from(arg: RegionArg) -> Self {
        match arg {
            RegionArg::Usa => Region::USA,
            RegionArg::Eur => Region::EUR,
            RegionArg::Jap => Region::JAP,
        }
    }
}

impl From<LocatorArg> for LocatorStrategy {
    fn from(arg: LocatorArg) -> Self {
        match arg {
            LocatorArg::Auto => LocatorStrategy::Auto,
            LocatorArg::ButtonImage => LocatorStrategy::ButtonImage,
            LocatorArg::DllPath => LocatorStrategy::DllPath,
        }
    }
}

impl Cli {
    fn rule(&self) -> ScrapeRule {
        ScrapeRule {
            max_games: if self.full { None } else { Some(self.games) },
            partition: self.partition.into(),
            default_region: self.default_region.into(),
            locator: self.locator.into(),
            delay: Arc::new(ConstantDelay(Duration::from_millis(self.delay_ms))),
            output_dir: self.output_dir.clone(),
            black_list_urls: self.exclude.clone(),
            ..ScrapeRule::default()
        }
    }

    fn list_source(&self) -> GameListSource {
        match &self.list_file {
            Some(path) => GameListSource::File(path.clone()),
            None => GameListSource::Remote(self.list_url.clone()),
        }
    }
}

fn print_message(msg: &Message) {
    if msg.is_error {
        println!(
            "  {} | {}",
            msg.content.if_supports_color(Stdout, |t| t.red()),
            msg.resource_name
        );
    } else if msg.content == "Processing" {
        println!(
            "{} {}",
            msg.content.if_supports_color(Stdout, |t| t.bold()),
            msg.resource_name
        );
    } else {
        println!("  {}", msg.content.if_supports_color(Stdout, |t| t.green()));
    }
}

fn print_counts(counts: &[(Bucket, usize)]) {
    for (bucket, count) in counts {
        println!("  {}: {} links", bucket.file_name(), count);
    }
}

fn print_progress(progress: &Progress) {
    println!(
        "\n{} ({}/{})",
        "Progress".if_supports_color(Stdout, |t| t.cyan()),
        progress.processed,
        progress.total_games
    );
    print_counts(&progress.bucket_counts);
    println!("  errors: {}", progress.errors);
    println!("{}", "-".repeat(40));
}

fn print_report(report: &RunReport) {
    println!("\nScraping completed in {}s", report.elapsed().num_seconds());
    println!("  games processed: {}", report.processed);
    println!("  errors: {}", report.errors);
    println!("  links found: {}", report.total_links);
    print_counts(&report.bucket_counts);
    for file in report.written.iter() {
        println!("  saved {} with {} links", file.path.display(), file.records);
    }
    for failure in report.failures.iter() {
        println!(
            "  {} {} : {}",
            "failed".if_supports_color(Stdout, |t| t.red()),
            failure.name,
            failure.error
        );
    }
}

pub async fn scrape(cli: Cli) -> ExitCode {
    let verbose = !cli.quiet;
    let fetcher = match HttpFetcher::new() {
        Ok(f) => f,
        Err(e) => {
            println!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let list_source = cli.list_source();
    if verbose {
        println!("Loading game list from {:?}....", list_source);
    }
    let list = match load_game_list(&list_source, &fetcher).await {
        Ok(l) => l,
        Err(e) => {
            println!(
                "{} {}",
                "Error loading game list:".if_supports_color(Stdout, |t| t.red()),
                e
            );
            return ExitCode::FAILURE;
        }
    };

    let rule = cli.rule();
    if verbose {
        match rule.max_games {
            None => println!("Processing all {} games", list.games.len()),
            Some(max) => println!(
                "Test mode: processing {} of {} games",
                max.min(list.games.len()),
                list.games.len()
            ),
        }
    }

    let (tx, mut rx) = channel::<Update>(MAX_BUFFER_SIZE);
    let run = tokio::spawn(async move { run_scrape(&fetcher, list, rule, tx).await });
    while let Some(update) = rx.recv().await {
        if !verbose {
            continue;
        }
        match update {
            Update::MessageUpdate(msg) => print_message(&msg),
            Update::ProgressUpdate(progress) => print_progress(&progress),
        };
    }

    let report = match run.await {
        Ok(Ok(report)) => report,
        Ok(Err(e)) => {
            println!("Scraping wasn't able to complete");
            println!("{}", e);
            return ExitCode::FAILURE;
        }
        Err(e) => {
            tracing::error!("Scrape task panicked\nError : {}", e);
            println!("Scraping wasn't able to complete");
            return ExitCode::FAILURE;
        }
    };

    if verbose {
        print_report(&report);
    }
    let score = report.quality_score();
    println!("Scraping quality: {:.1}/100", score);
    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
