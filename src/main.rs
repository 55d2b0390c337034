use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use env_logger::Env;
use log::{debug, error, info};

mod catalog;
mod download;
mod error;
mod manifest;
mod networking;
mod paths;
mod progress;
mod util;

use catalog::Selection;
use download::{DEFAULT_CONCURRENCY, DownloadScheduler};
use error::Error;
use manifest::{VERSION_CHECK_ENDPOINT, VersionCheckRequest};
use networking::NetworkClient;
use progress::ConsoleProgress;

#[derive(Parser, Debug)]
#[command(
    name = "ba-bundle-fetcher",
    author,
    version,
    about = "Fetch Blue Archive asset bundles listed by the patch API"
)]
struct Cli {
    /// Substring to search the catalog for, or "all" to take every bundle.
    query: String,

    /// Explicit resource paths to download out of the query matches.
    /// Without any, every match is taken.
    #[arg(long = "pick", value_name = "RESOURCE_PATH")]
    picks: Vec<String>,

    /// Directory bundle files are written to.
    #[arg(long, default_value = "bundles")]
    out: PathBuf,

    /// Maximum number of transfers in flight at once.
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Version-check endpoint (override for mirrors or testing).
    #[arg(long, default_value = VERSION_CHECK_ENDPOINT)]
    endpoint: String,

    /// Client language reported to the version check.
    #[arg(long)]
    language: Option<String>,

    /// Client country reported to the version check.
    #[arg(long)]
    country: Option<String>,

    /// Store the client claims to be installed from.
    #[arg(long)]
    market_code: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

/// Resolve, select, download. `Ok(true)` means every selected bundle landed.
async fn run(cli: Cli) -> Result<bool, Error> {
    let client = NetworkClient::new();
    let request = version_check_request(&cli);

    let (base_path, catalog) = manifest::resolve(&client, &cli.endpoint, &request).await?;

    let matches = catalog.filter_by_query(&cli.query);
    for entry in matches.entries() {
        debug!("match: {}", entry.resource_path);
    }
    let selection = if cli.picks.is_empty() {
        if !cli.query.eq_ignore_ascii_case(catalog::QUERY_ALL) {
            info!(
                "no --pick given; taking all {} bundles matching {:?}",
                matches.len(),
                cli.query
            );
        }
        Selection::All
    } else {
        Selection::Explicit(cli.picks.clone())
    };
    let chosen = matches.select(&selection)?;

    let tasks = paths::build_tasks(&base_path, &cli.out, &chosen)?;
    tokio::fs::create_dir_all(&cli.out)
        .await
        .map_err(|source| Error::Filesystem {
            path: cli.out.clone(),
            source,
        })?;

    info!(
        "downloading {} bundles to {} ({} at a time)",
        tasks.len(),
        cli.out.display(),
        cli.concurrency
    );

    let sink = ConsoleProgress::new(tasks.len());
    let scheduler = DownloadScheduler::new(cli.concurrency);
    let outcomes = scheduler.run(tasks, &client, &sink).await;
    sink.finish();

    for outcome in outcomes.iter().filter(|o| !o.succeeded()) {
        if let Some(err) = &outcome.error {
            error!("{}: {err}", outcome.task.remote_url);
        }
    }
    let summary = download::summarize(&outcomes);
    info!(
        "{} succeeded, {} failed, {} written",
        summary.succeeded,
        summary.failed,
        util::format_bytes(summary.bytes_written)
    );

    Ok(summary.failed == 0)
}

fn version_check_request(cli: &Cli) -> VersionCheckRequest {
    let mut request = VersionCheckRequest::default();
    if let Some(language) = &cli.language {
        request.language = language.clone();
    }
    if let Some(country) = &cli.country {
        request.country = country.clone();
    }
    if let Some(market_code) = &cli.market_code {
        request.market_code = market_code.clone();
    }
    request
}
