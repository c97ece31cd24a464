//! covidcache - print COVID-19 statistics tables from the command line.
//!
//! Responses are cached under the user cache directory and reused until
//! they are older than the configured TTL.

use std::io;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use futures::stream::{self, StreamExt};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use covidcache::api::ApiClient;
use covidcache::cache::FileStore;
use covidcache::config::Config;
use covidcache::models::{region_name, HeaderDescriptor, SortDirection};
use covidcache::render::{render_regions, render_table};
use covidcache::utils::format_age;
use covidcache::{DataOrigin, DataService, GetParams, TableData};

// ============================================================================
// Constants
// ============================================================================

/// Regions fetched at once by `prefetch`.
const PREFETCH_CONCURRENCY: usize = 4;

/// When set, logs are also written to a daily rolling file in this directory
const LOG_DIR_ENV: &str = "COVIDCACHE_LOG_DIR";

const USAGE: &str = "\
Usage: covidcache [--ttl-hours H] [--sort KEY[:asc|desc]] [--json] <command>

Commands:
  total <YYYYMMDD>          Aggregate figures for every region on a date
  state <CODE>              Daily figures for one region
  refresh total <YYYYMMDD>  Refetch, ignoring the cache
  refresh state <CODE>
  prefetch <CODE>...        Warm the cache for several regions
  regions                   List region codes
  set-ttl <HOURS>           Save the cache TTL to the config file";

/// Initialize the tracing subscriber for logging
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(LOG_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, "covidcache.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[derive(Debug, Default, PartialEq)]
struct CliOptions {
    ttl_hours: Option<f64>,
    sort: Option<(String, Option<SortDirection>)>,
    json: bool,
    command: Vec<String>,
}

fn parse_args(args: &[String]) -> Result<CliOptions> {
    let mut options = CliOptions::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--ttl-hours" => {
                let value = iter.next().ok_or_else(|| anyhow!("--ttl-hours needs a value"))?;
                let hours = value
                    .parse::<f64>()
                    .map_err(|_| anyhow!("Invalid --ttl-hours value: {}", value))?;
                options.ttl_hours = Some(hours);
            }
            "--sort" => {
                let value = iter.next().ok_or_else(|| anyhow!("--sort needs a column key"))?;
                options.sort = Some(parse_sort(value)?);
            }
            "--json" => options.json = true,
            "-h" | "--help" => options.command = vec!["help".to_string()],
            flag if flag.starts_with("--") => bail!("Unknown option: {}", flag),
            _ => options.command.push(arg.clone()),
        }
    }

    Ok(options)
}

fn parse_sort(value: &str) -> Result<(String, Option<SortDirection>)> {
    match value.split_once(':') {
        None => Ok((value.to_string(), None)),
        Some((key, "asc")) => Ok((key.to_string(), Some(SortDirection::Asc))),
        Some((key, "desc")) => Ok((key.to_string(), Some(SortDirection::Desc))),
        Some((_, other)) => bail!("Invalid sort direction: {}", other),
    }
}

fn origin_label(origin: DataOrigin) -> &'static str {
    match origin {
        DataOrigin::Cache => "cache",
        DataOrigin::Network => "network",
        DataOrigin::Fallback => "stale cache",
        DataOrigin::Empty => "none",
    }
}

/// e.g. "51 rows from stale cache, cached 5h ago"
fn summary_line(table: &TableData) -> String {
    let summary = format!("{} rows from {}", table.data.len(), origin_label(table.origin));
    match table.age() {
        Some(age) => format!("{}, cached {}", summary, format_age(age)),
        None => summary,
    }
}

fn region_code(raw: &str) -> String {
    let code = raw.trim().to_ascii_uppercase();
    if region_name(&code).is_none() {
        eprintln!("Warning: unknown region code {}", code);
    }
    code
}

fn print_table(mut table: TableData, options: &CliOptions) -> Result<()> {
    if table.origin == DataOrigin::Empty {
        bail!("No data available");
    }

    if let Some((key, direction)) = &options.sort {
        let direction = direction.unwrap_or_else(|| HeaderDescriptor::for_field(key).default_sort);
        table.data.sort_by(key, direction);
    }

    if options.json {
        println!("{}", serde_json::to_string_pretty(&table)?);
    } else {
        print!("{}", render_table(&table));
        eprintln!("{}", summary_line(&table));
    }
    Ok(())
}

fn request_params(args: &[String]) -> Result<GetParams> {
    match args {
        [kind, date] if kind == "total" => Ok(GetParams::total(date)),
        [kind, code] if kind == "state" => Ok(GetParams::state(&region_code(code))),
        _ => bail!("{}", USAGE),
    }
}

async fn prefetch(service: &DataService, codes: &[String]) -> Result<()> {
    if codes.is_empty() {
        bail!("prefetch needs at least one region code");
    }

    let results: Vec<(String, TableData)> = stream::iter(codes.iter().map(|c| region_code(c)))
        .map(|code| async move {
            let table = service.get(&GetParams::state(&code)).await;
            (code, table)
        })
        .buffer_unordered(PREFETCH_CONCURRENCY)
        .collect()
        .await;

    let mut failed = 0;
    for (code, table) in &results {
        if table.origin == DataOrigin::Empty {
            failed += 1;
        }
        println!("{}  {} rows ({})", code, table.data.len(), origin_label(table.origin));
    }

    if failed > 0 {
        bail!("{} of {} regions have no data", failed, results.len());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _log_guard = init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = parse_args(&args)?;

    let mut config = Config::load()?;
    let command: Vec<&str> = options.command.iter().map(String::as_str).collect();

    match command.as_slice() {
        [] | ["help"] => {
            println!("{}", USAGE);
            return Ok(());
        }
        ["regions"] => {
            print!("{}", render_regions(covidcache::models::regions()));
            return Ok(());
        }
        ["set-ttl", hours] => {
            let hours = hours
                .parse::<f64>()
                .map_err(|_| anyhow!("Invalid TTL: {}", hours))?;
            config.cache_ttl_hours = Some(hours);
            config.save()?;
            println!("Cache TTL set to {} hours", hours);
            return Ok(());
        }
        _ => {}
    }

    let client = ApiClient::with_timeout(&config.api_endpoint(), config.request_timeout_secs())?;
    let store = FileStore::new(config.cache_dir()?)?;
    info!(endpoint = client.endpoint(), cache_dir = %store.dir().display(), "covidcache starting");

    let service = DataService::new(Arc::new(client), Arc::new(store));
    service.set_cache_ttl(options.ttl_hours.unwrap_or_else(|| config.cache_ttl_hours()));

    match options.command.split_first() {
        Some((cmd, rest)) if cmd == "refresh" => {
            let table = service.refresh(&request_params(rest)?).await;
            print_table(table, &options)
        }
        Some((cmd, rest)) if cmd == "prefetch" => prefetch(&service, rest).await,
        _ => {
            let table = service.get(&request_params(&options.command)?).await;
            print_table(table, &options)
        }
    }
}
