use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use forum_prices::config::AppConfig;
use forum_prices::inference::location::LocationResolver;
use forum_prices::loader::load_geo_index;
use forum_prices::pipeline::Pipeline;
use forum_prices::storage;
use forum_prices::utils::{self, fmt_count, fmt_share};

#[derive(Parser)]
#[command(name = "forum-prices", about = "Forum price-thread scraper", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Walk the configured thread and write the price sheet
    Scrape {
        /// Output CSV (default: [output].path from config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write raw fields only, skip make/model/color/condition/country inference
        #[arg(long)]
        no_infer: bool,

        #[arg(long)]
        start_page: Option<u32>,

        #[arg(long)]
        end_page: Option<u32>,
    },

    /// Resolve free-text locations to a country
    Locate {
        /// Vendor location, e.g. "Chicago, IL"
        vendor: String,

        /// Poster's own location, used when the vendor location doesn't resolve
        #[arg(short, long, default_value = "")]
        user: String,
    },

    /// Row counts of an existing price sheet
    Summary {
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Print the effective configuration as JSON
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "forum_prices=info,warn",
        1 => "forum_prices=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let mut config = AppConfig::load()?;

    match cli.command {
        Command::Scrape {
            output,
            no_infer,
            start_page,
            end_page,
        } => {
            if let Some(path) = output {
                config.output.path = path;
            }
            if no_infer {
                config.output.infer_fields = false;
            }
            if let Some(page) = start_page {
                config.forum.starting_page = page;
            }
            if end_page.is_some() {
                config.forum.ending_page = end_page;
            }

            let _t = utils::Timer::start("Forum price scrape");
            let stats = Pipeline::new(config).run().await?;
            info!(
                "Done: {} pages, {} posts, {} rows",
                stats.pages_visited, stats.posts_scraped, stats.rows_written
            );
        }

        Command::Locate { vendor, user } => {
            let geo = load_geo_index(&config.geo)?;
            let resolver = LocationResolver::new(&geo);
            match resolver.purchase_country(&vendor, &user) {
                Some(country) => {
                    println!("{} ({})", country.name, country.country_code);
                    let currencies: Vec<&str> =
                        country.currency_codes.iter().map(String::as_str).collect();
                    println!("  currencies: {}", currencies.join(", "));
                }
                None => println!("No country found for {:?} / {:?}", vendor, user),
            }
        }

        Command::Summary { path } => {
            let path = path.unwrap_or(config.output.path);
            let summary = storage::summarize(&path)
                .with_context(|| format!("No price sheet at {:?}; run `forum-prices scrape` first", path))?;

            println!("─────────────────────────────────");
            println!("  Price sheet {:?}", path);
            println!("─────────────────────────────────");
            println!("  Rows     : {}", fmt_count(summary.rows));
            println!("  Makes    :");
            let mut makes: Vec<_> = summary.by_make.iter().collect();
            makes.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
            for (make, n) in makes {
                println!("    {:<20} {:>6} {:>7}", make, fmt_count(*n), fmt_share(*n, summary.rows));
            }
            println!("  Countries:");
            for (country, n) in &summary.by_country {
                println!("    {:<20} {:>6} {:>7}", country, fmt_count(*n), fmt_share(*n, summary.rows));
            }
            println!("─────────────────────────────────");
        }

        Command::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
