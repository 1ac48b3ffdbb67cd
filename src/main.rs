use anyhow::{Context, Result};
use clap::Parser;
use reqwest::redirect::Policy;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use feedfold::config::Config;
use feedfold::feed::{AggregateError, Aggregator, FeedItem, HttpFetcher, SourceDescriptor, WorkerPool};
use feedfold::sources;

/// Default config path (~/.config/feedfold/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("feedfold")
        .join("config.toml"))
}

/// At most 3 hops, no loops.
fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= 3 {
            return attempt.error("Too many redirects (max 3)");
        }

        let url = attempt.url();
        if attempt.previous().iter().any(|prev| prev.as_str() == url.as_str()) {
            return attempt.error("Redirect loop detected");
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}

#[derive(Parser, Debug)]
#[command(
    name = "feedfold",
    version,
    about = "Fetch many RSS/Atom feeds at once and print one merged, newest-first list"
)]
struct Args {
    /// Config file (default: ~/.config/feedfold/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Maximum number of items to print
    #[arg(long, value_name = "N")]
    limit: Option<i64>,

    /// Print items as a JSON array
    #[arg(long)]
    json: bool,

    /// Extra feed URLs, fetched after the configured sources
    #[arg(value_name = "URL")]
    urls: Vec<String>,
}

fn print_text(items: &[FeedItem]) {
    for item in items {
        println!(
            "{}  {}  {}",
            item.published_at.format("%Y-%m-%d %H:%M"),
            item.channel_name,
            item.title
        );
        println!("    {}", item.link);
        if let Some(description) = &item.description {
            println!("    {}", description);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    if let Some(limit) = args.limit {
        config.limit = limit;
    }

    let client = reqwest::Client::builder()
        .redirect(create_redirect_policy())
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .context("Failed to build HTTP client")?;

    let mut sources = sources::discover(&config, &client)
        .await
        .context("Failed to collect feed sources")?;
    sources.extend(args.urls.into_iter().map(SourceDescriptor::new));

    if sources.is_empty() {
        eprintln!("Error: no feed sources configured");
        eprintln!();
        eprintln!("Pass feed URLs on the command line, or add [[sources]], opml or");
        eprintln!("[freshrss] to {}", config_path.display());
        std::process::exit(2);
    }

    let fetcher = HttpFetcher::new(client)
        .with_user_agent(config.user_agent())
        .with_timeout(config.request_timeout())
        .with_max_body_bytes(config.max_body_bytes);
    let aggregator = Aggregator::new(fetcher, WorkerPool::new(config.workers));

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let aggregation = match aggregator.aggregate(&sources, &cancel).await {
        Ok(aggregation) => aggregation,
        Err(AggregateError::Cancelled) => {
            eprintln!("Interrupted");
            std::process::exit(130);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let (mut items, partial) = aggregation.into_parts();
    items.truncate(config.item_limit());

    if args.json {
        let json = serde_json::to_string_pretty(&items).context("Failed to encode items")?;
        println!("{json}");
    } else {
        print_text(&items);
    }

    if let Some(warning) = partial {
        eprintln!("Warning: {warning}");
    }

    Ok(())
}
