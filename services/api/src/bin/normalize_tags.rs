//! services/api/src/bin/normalize_tags.rs
//!
//! Lowercases and trims stored tag names, merging duplicates that only differed
//! in case or whitespace.

use photos_api::{
    adapters::DbAdapter,
    config::Config,
    error::ApiError,
    maintenance::{self, DEFAULT_PAGE_SIZE, PAGE_DELAY},
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, PartialEq)]
struct JobArgs {
    page_size: i64,
}

#[derive(Debug, PartialEq)]
enum Command {
    Run(JobArgs),
    Help,
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    let mut job = JobArgs {
        page_size: DEFAULT_PAGE_SIZE,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--page-size" | "-n" => {
                let raw = args
                    .get(i + 1)
                    .ok_or_else(|| format!("{} needs a value", args[i]))?;
                job.page_size = match raw.parse::<i64>() {
                    Ok(size) if size > 0 => size,
                    _ => return Err(format!("Invalid page size: {}", raw)),
                };
                i += 1;
            }
            "--help" | "-h" => return Ok(Command::Help),
            other => return Err(format!("Unknown argument: {}", other)),
        }
        i += 1;
    }

    Ok(Command::Run(job))
}

fn print_help() {
    println!("normalize-tags - merge tags into their lowercase, trimmed form");
    println!();
    println!("USAGE:");
    println!("    normalize-tags [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -n, --page-size <N>  Tags read per page (default: {})", DEFAULT_PAGE_SIZE);
    println!("    -h, --help           Print help information");
    println!();
    println!("Reads DATABASE_URL from the environment or a .env file.");
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    let args: Vec<String> = std::env::args().collect();
    let job = match parse_args(&args) {
        Ok(Command::Run(job)) => job,
        Ok(Command::Help) => {
            print_help();
            return Ok(());
        }
        Err(message) => {
            eprintln!("{}", message);
            print_help();
            std::process::exit(1);
        }
    };
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db = DbAdapter::connect(&config.database_url, config.db_max_connections).await?;
    db.run_migrations().await?;

    info!(page_size = job.page_size, "Normalising tags");
    let report = maintenance::normalize_tags(&db, job.page_size, PAGE_DELAY).await?;
    println!(
        "Scanned {} tags in {} pages: {} updated, {} failed",
        report.scanned, report.pages, report.updated, report.failed
    );
    Ok(())
}
