use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use std::{env, fs};

use anyhow::{anyhow, Context};
use feedhub_core::config::{resolve_with_base, Config, Settings};
use feedhub_core::{into_records, NewDataSource, Record, SourceConfig, SourceId};
use feedhub_drivers::{DriverContext, DriverRegistry, SqliteExecutor};
use feedhub_parse::ParserRegistry;
use feedhub_search::{FeedOptions, FeedService, SearchOptions, SearchService, SubprocessRanker};
use feedhub_service::{DataSourceService, RefreshScope, ServiceOptions, SqliteSourceStore};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: feedhub <command> [args]

Commands:
  refresh [--all]                   re-fetch expired (or all enabled) sources
  sources                           list configured sources
  add '<json>'                      register a source, e.g. '{\"name\":\"HN\",\"type\":\"url\",\"config\":{\"url\":\"https://hnrss.org/frontpage\",\"format\":\"rss\"}}'
  enable <id> | disable <id>        include or exclude a source from the feed
  remove <id>                       delete a source and its cache
  preview <id> [n]                  first n records of a source (default 5)
  test <type> '<config-json>'       trial fetch without saving anything
  feed [--no-cache] [--documents <file>]
  stats [--documents <file>]
  search '<query>' [--limit N] [--documents <file>]
  types                             available source types and formats";

struct App {
    settings: Settings,
    sources: Arc<DataSourceService>,
}

impl App {
    fn build(settings: Settings, base: &Path) -> anyhow::Result<Self> {
        let store_path = resolve_with_base(base, &settings.store.path);
        let store = SqliteSourceStore::open(&store_path)
            .with_context(|| format!("opening source store {}", store_path.display()))?;
        debug!(store = %store_path.display(), "source store ready");

        let sql = SqliteExecutor::from_settings(&settings.database, base);
        let context = DriverContext::new(Arc::new(ParserRegistry::new()), Arc::new(sql))
            .with_timeout(Duration::from_secs(settings.sources.http_timeout));
        let drivers = Arc::new(DriverRegistry::new(context));
        let sources = DataSourceService::with_options(
            Arc::new(store),
            drivers,
            ServiceOptions::from(&settings.sources),
        );
        Ok(Self { settings, sources: Arc::new(sources) })
    }

    fn feed(&self, documents: Option<Vec<Record>>) -> Arc<FeedService> {
        let feed = FeedService::new(Arc::clone(&self.sources));
        Arc::new(match documents {
            Some(documents) => feed.with_documents(Arc::new(documents)),
            None => feed,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        eprintln!("{USAGE}");
        std::process::exit(1);
    };
    let rest = &args[1..];
    let app = App::build(config.settings()?, &env::current_dir()?)?;

    match command {
        "refresh" => refresh(&app, flag(rest, "--all")).await,
        "sources" => list_sources(&app).await,
        "add" => add_source(&app, positional(rest, 0, "add '<json>'")?).await,
        "enable" | "disable" => {
            let id = source_id(positional(rest, 0, "enable|disable <id>")?)?;
            app.sources.set_enabled(id, command == "enable").await?;
            println!("✓ Source {id} {command}d");
            Ok(())
        }
        "remove" => {
            let id = source_id(positional(rest, 0, "remove <id>")?)?;
            if app.sources.delete_source(id).await? {
                println!("✓ Source {id} removed");
            } else {
                println!("Source {id} does not exist");
            }
            Ok(())
        }
        "preview" => {
            let id = source_id(positional(rest, 0, "preview <id> [n]")?)?;
            let n = match rest.get(1) {
                Some(n) => n.parse().context("preview size must be a number")?,
                None => DataSourceService::DEFAULT_PREVIEW,
            };
            let preview = app.sources.preview(id, n).await?;
            println!("📄 Showing {} of {} records", preview.records.len(), preview.total);
            println!("{}", serde_json::to_string_pretty(&preview.records)?);
            Ok(())
        }
        "test" => {
            let source_type = positional(rest, 0, "test <type> '<config-json>'")?;
            let config: SourceConfig = serde_json::from_str(positional(rest, 1, "test <type> '<config-json>'")?)
                .context("config must be a JSON object")?;
            let verdict = app.sources.test_connection(source_type, &config).await;
            println!("{} {}", if verdict.success { "✓" } else { "✗" }, verdict.message);
            println!("{}", serde_json::to_string_pretty(&verdict)?);
            Ok(())
        }
        "feed" => {
            let options = FeedOptions { use_cache: !flag(rest, "--no-cache"), ..FeedOptions::default() };
            let feed = app.feed(documents(rest)?).feed(options).await?;
            for failure in &feed.failures {
                eprintln!("⚠️  {} (ID: {}): {}", failure.source_name, failure.source_id, failure.message);
            }
            println!("{}", serde_json::to_string_pretty(&feed.records)?);
            eprintln!("📊 {} records", feed.count());
            Ok(())
        }
        "stats" => {
            let stats = app.feed(documents(rest)?).stats().await?;
            println!("📊 Documents:        {}", stats.total_documents);
            println!("📊 Enabled sources:  {}", stats.total_data_sources);
            println!("📊 Cached items:     {}", stats.total_source_items);
            println!("📊 Total items:      {}", stats.total_items);
            Ok(())
        }
        "search" => search(&app, rest).await,
        "types" => {
            list_types(&app);
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}\n\n{USAGE}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn refresh(app: &App, all: bool) -> anyhow::Result<()> {
    println!("🔄 Refreshing data sources...\n");
    let scope = if all {
        println!("Refreshing all enabled sources...");
        RefreshScope::All
    } else {
        println!("Refreshing sources with expired caches...");
        RefreshScope::Expired
    };

    let targets = app.sources.refresh_targets(scope).await?;
    if targets.is_empty() {
        println!("✓ No sources need refreshing");
        return Ok(());
    }
    println!("Found {} source(s) to refresh\n", targets.len());

    let pb = ProgressBar::new(targets.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} sources {msg}")?
            .progress_chars("#>-"),
    );
    let report = app.sources.refresh_sources(scope, targets, |outcome| {
        pb.set_message(outcome.name.clone());
        pb.inc(1);
    })
    .await;
    pb.finish_and_clear();

    println!("{:<6} {:<30} {:>6}  Message", "Status", "Source", "Items");
    for outcome in &report.outcomes {
        let (status, message) = match &outcome.error {
            None => ("✓", "Success"),
            Some(error) => ("✗", error.as_str()),
        };
        println!("{:<6} {:<30} {:>6}  {}", status, outcome.name, outcome.items, message);
    }
    println!("\n✓ Completed: {} successful, {} failed", report.succeeded(), report.failed());
    Ok(())
}

async fn list_sources(app: &App) -> anyhow::Result<()> {
    let sources = app.sources.sources().await?;
    if sources.is_empty() {
        println!("No data sources configured. Add one with: feedhub add '<json>'");
        return Ok(());
    }
    println!("{:>4}  {:<8} {:<9} {:<30} {:>6}  Cache", "ID", "Enabled", "Type", "Name", "Items");
    for source in &sources {
        let cache = match (source.is_cache_valid(), source.cache_expires_at()) {
            (true, Some(expires)) => format!("valid until {}", expires.format("%Y-%m-%d %H:%M:%S")),
            (false, Some(_)) => "expired".to_string(),
            _ => "never fetched".to_string(),
        };
        println!(
            "{:>4}  {:<8} {:<9} {:<30} {:>6}  {}",
            source.id,
            if source.enabled { "yes" } else { "no" },
            source.source_type.as_str(),
            source.name,
            source.cached_item_count(),
            cache
        );
    }
    Ok(())
}

async fn add_source(app: &App, raw: &str) -> anyhow::Result<()> {
    let new: NewDataSource = serde_json::from_str(raw).context("source must be a JSON object")?;
    let source = app.sources.create_source(new).await?;
    println!("✓ Added source {} (ID: {}, type: {}, ttl: {}s)", source.name, source.id, source.source_type, source.cache_ttl);
    Ok(())
}

async fn search(app: &App, rest: &[String]) -> anyhow::Result<()> {
    let query = positional(rest, 0, "search '<query>' [--limit N]")?;
    let limit = match option(rest, "--limit") {
        Some(raw) => Some(raw.parse::<usize>().context("--limit requires a number")?),
        None => None,
    };
    let base = env::current_dir()?;
    let ranker = SubprocessRanker::from_settings(&app.settings.search, &base);
    let search = SearchService::new(app.feed(documents(rest)?), Arc::new(ranker))
        .with_default_limit(app.settings.search.default_limit);

    let response = search.search(query, SearchOptions { limit, ..SearchOptions::default() }).await?;
    if let Some(message) = &response.message {
        println!("{message}");
        return Ok(());
    }
    println!("🔍 Found {} results for: \"{}\" ({} items searched)", response.results.len(), response.query, response.total_items_searched);
    for hit in &response.results {
        let title = hit
            .record
            .get("title")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| serde_json::Value::Object(hit.record.clone()).to_string());
        let origin = hit.record.get("_source_name").and_then(|v| v.as_str()).unwrap_or("-");
        println!("\n  {}. score={:.4}  source={}", hit.rank, hit.score, origin);
        println!("     📝 {}", title);
    }
    Ok(())
}

fn list_types(app: &App) {
    let described = [
        ("database", "Database Query", "Fetch data from a database using SQL queries"),
        ("url", "URL/File", "Fetch data from a URL (JSON, XML, CSV, RSS)"),
        ("api", "API Endpoint", "Fetch data from external APIs with authentication"),
    ];
    println!("Source types:");
    for source_type in app.sources.drivers().available_types() {
        match described.iter().find(|(name, _, _)| *name == source_type) {
            Some((_, label, description)) => println!("  {source_type:<10} {label} - {description}"),
            None => println!("  {source_type}"),
        }
    }
    let formats: Vec<String> = app.sources.drivers().parsers().supported_formats().into_iter().collect();
    println!("\nFormats: {}", formats.join(", "));
    println!("Auth types: none, bearer, api_key, basic, oauth2");
}

fn flag(args: &[String], name: &str) -> bool {
    args.iter().any(|a| a == name)
}

fn option<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter().position(|a| a == name).and_then(|i| args.get(i + 1)).map(String::as_str)
}

/// The `index`-th argument that is neither a flag nor a flag's value.
fn positional<'a>(args: &'a [String], index: usize, usage: &str) -> anyhow::Result<&'a str> {
    let mut plain = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--limit" | "--documents" => i += 1,
            a if a.starts_with("--") => {}
            a => plain.push(a),
        }
        i += 1;
    }
    plain.get(index).copied().ok_or_else(|| anyhow!("Usage: feedhub {usage}"))
}

fn source_id(raw: &str) -> anyhow::Result<SourceId> {
    raw.parse().with_context(|| format!("'{raw}' is not a source id"))
}

/// Stored documents to merge into the feed, read from a JSON file.
fn documents(args: &[String]) -> anyhow::Result<Option<Vec<Record>>> {
    let Some(path) = option(args, "--documents").map(PathBuf::from) else {
        return Ok(None);
    };
    let raw = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let value = serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(into_records(value)))
}
