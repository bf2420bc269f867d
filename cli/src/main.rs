use crate::cli::scrape;
use clap::Parser;
use std::path::MAIN_SEPARATOR;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod cli;

const DEFAULT_LOG_FILTER: &str = "libpsxscrape=debug,psxscrape=debug";

#[tokio::main]
async fn main() -> ExitCode {
    let f_appender =
        tracing_appender::rolling::hourly(format!(".{}", MAIN_SEPARATOR), "psxscrape.log");
    let (non_blk, _guard) = tracing_appender::non_blocking(f_appender);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .event_format(tracing_subscriber::fmt::format().pretty())
        .with_writer(non_blk)
        .init();
    let cli = cli::Cli::parse();
    scrape(cli).await
}
