mod config;
mod error;
mod extract;
mod fetcher;
mod output;
mod pipeline;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};

use config::{ScraperConfig, PREFECTURES};
use extract::municipalities::extract_municipalities;
use extract::stores::extract_stores;
use fetcher::{ChromiumSession, PageFetcher};
use output::StoreRecord;

const COLUMNS: &[&str] = &[
    "prefecture",
    "municipality",
    "store_name",
    "store_url",
    "opening_date",
];

#[derive(Parser)]
#[command(name = "ajsm_scraper", about = "Prefecture store directory scraper for ajsm.club")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the supported prefectures and their entry pages
    Prefectures,
    /// Scrape every municipality of a prefecture into a CSV
    Scrape {
        /// Prefecture display name, e.g. 埼玉県
        prefecture: String,
        /// Destination CSV (default: ajsm_data_<prefecture>_<timestamp>.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Fetch a prefecture page and list its municipalities
    Municipalities {
        /// Prefecture display name
        prefecture: String,
    },
    /// Fetch the first municipality of a prefecture and list its stores
    Stores {
        /// Prefecture display name
        prefecture: String,
        /// Max stores to display
        #[arg(short = 'n', long, default_value = "5")]
        limit: usize,
    },
    /// Render a previously scraped CSV with selectable columns
    Show {
        /// CSV produced by `scrape`
        file: PathBuf,
        /// Columns to display
        #[arg(
            short,
            long,
            value_delimiter = ',',
            default_values_t = [
                "prefecture".to_string(),
                "municipality".to_string(),
                "store_name".to_string(),
                "opening_date".to_string(),
            ]
        )]
        columns: Vec<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Prefectures => {
            for p in PREFECTURES {
                println!("{:<6} {}", p.name, p.entry_url);
            }
            Ok(())
        }
        Commands::Scrape { prefecture, output } => run_scrape(&prefecture, output).await,
        Commands::Municipalities { prefecture } => run_municipalities(&prefecture).await,
        Commands::Stores { prefecture, limit } => run_stores(&prefecture, limit).await,
        Commands::Show {
            file,
            columns,
            limit,
        } => show_table(&file, &columns, limit),
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn run_scrape(prefecture: &str, output: Option<PathBuf>) -> anyhow::Result<()> {
    let config = ScraperConfig::default();
    // Fail fast on an unsupported prefecture, before paying for a browser.
    config.entry_url(prefecture)?;

    let session = ChromiumSession::launch(&config).await?;
    let fetcher = PageFetcher::new(session, config.clone());

    let result = pipeline::scrape_prefecture(&fetcher, &config, prefecture, output).await;
    fetcher.shutdown().await;

    let outcome = result?;
    println!(
        "Saved {} stores from {} municipalities ({} skipped) to {}",
        outcome.stores_saved,
        outcome.municipalities - outcome.municipalities_skipped,
        outcome.municipalities_skipped,
        outcome.output.display()
    );
    Ok(())
}

async fn run_municipalities(prefecture: &str) -> anyhow::Result<()> {
    let config = ScraperConfig::default();
    let entry_url = config.entry_url(prefecture)?;

    let session = ChromiumSession::launch(&config).await?;
    let fetcher = PageFetcher::new(session, config.clone());
    let result = fetcher.load(entry_url).await;
    fetcher.shutdown().await;

    let doc = result?;
    let municipalities = extract_municipalities(&doc.html, &config.base_url);
    if municipalities.is_empty() {
        println!("No municipalities found on {}", doc.url);
        return Ok(());
    }

    println!("{:>3} | {:<16} | {}", "#", "Municipality", "URL");
    println!("{}", "-".repeat(80));
    for (i, m) in municipalities.iter().enumerate() {
        println!("{:>3} | {:<16} | {}", i + 1, truncate(&m.name, 16), m.url);
    }
    println!("\n{} municipalities", municipalities.len());
    Ok(())
}

async fn run_stores(prefecture: &str, limit: usize) -> anyhow::Result<()> {
    let config = ScraperConfig::default();
    let entry_url = config.entry_url(prefecture)?;

    let session = ChromiumSession::launch(&config).await?;
    let fetcher = PageFetcher::new(session, config.clone());

    let result = async {
        let doc = fetcher.load(entry_url).await?;
        let municipalities = extract_municipalities(&doc.html, &config.base_url);
        let Some(first) = municipalities.into_iter().next() else {
            return Ok(None);
        };
        let doc = fetcher.load(&first.url).await?;
        Ok::<_, error::Error>(Some((first.name, extract_stores(&doc.html, &config.base_url))))
    }
    .await;
    fetcher.shutdown().await;

    match result? {
        None => println!("No municipalities found for {prefecture}"),
        Some((name, stores)) => {
            println!("{}: {} stores", name, stores.len());
            for (i, store) in stores.iter().take(limit).enumerate() {
                println!("\nStore {}:", i + 1);
                println!("  name:   {}", store.store_name);
                println!("  url:    {}", store.store_url);
                println!("  opened: {}", store.opening_date);
            }
        }
    }
    Ok(())
}

fn show_table(file: &Path, columns: &[String], limit: usize) -> anyhow::Result<()> {
    for column in columns {
        anyhow::ensure!(
            COLUMNS.contains(&column.as_str()),
            "unknown column: {} (expected one of {})",
            column,
            COLUMNS.join(", ")
        );
    }

    let rows = output::load_records(file)?;
    if rows.is_empty() {
        println!("No stores in {}", file.display());
        return Ok(());
    }

    let width = |c: &str| if c == "store_url" { 40 } else { 20 };
    let header = columns
        .iter()
        .map(|c| format!("{:<w$}", c, w = width(c)))
        .collect::<Vec<_>>()
        .join(" | ");
    println!("{header}");
    println!("{}", "-".repeat(header.len()));

    for row in rows.iter().take(limit) {
        let line: Vec<String> = columns
            .iter()
            .map(|c| {
                let w = width(c);
                format!("{:<w$}", truncate(field(row, c), w))
            })
            .collect();
        println!("{}", line.join(" | "));
    }

    let municipalities: HashSet<&str> = rows.iter().map(|r| r.municipality.as_str()).collect();
    println!(
        "\n{} stores | {} municipalities | {:.1} stores/municipality",
        rows.len(),
        municipalities.len(),
        rows.len() as f64 / municipalities.len() as f64
    );
    Ok(())
}

fn field<'a>(row: &'a StoreRecord, column: &str) -> &'a str {
    match column {
        "prefecture" => &row.prefecture,
        "municipality" => &row.municipality,
        "store_name" => &row.store_name,
        "store_url" => &row.store_url,
        "opening_date" => &row.opening_date,
        _ => "",
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
