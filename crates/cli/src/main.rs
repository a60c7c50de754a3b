//! bookstore entry point.
//!
//! Runs one request against the configured store and prints the response as
//! JSON on stdout. Logging goes to stderr so stdout stays machine-readable.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use bookstore_core::{AppConfig, ModelStats};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::error::ServiceError;
use crate::logic::{AddRequest, CheckRequest, GetRequest, RemoveRequest};
use crate::svc::ServiceContext;

mod error;
mod logic;
mod svc;

#[derive(Debug, Parser)]
#[command(name = "bookstore", version, about = "Book stock lookups over a cached SQLite store")]
struct Cli {
    /// TOML config file; overrides BOOKSTORE_CONFIG_FILE
    #[arg(long, short, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Stock a new book
    Add {
        isbn: String,
        title: String,
        #[arg(long, default_value = "")]
        author: String,
        /// Price in minor currency units
        #[arg(long)]
        price: i64,
    },
    /// Report whether a book is stocked and its price
    Check { isbn: String },
    /// Fetch a book by id
    Get { id: i64 },
    /// Delete a book by id
    Remove { id: i64 },
    /// Show the resolved table and model counters
    Stats,
    /// Delete expired cache entries
    Purge,
}

#[derive(Debug, Serialize)]
struct StatsResponse<'a> {
    table: &'a str,
    data_source: &'a std::path::Path,
    stats: ModelStats,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "request failed");
            eprintln!("error: {err:#}");
            let code = err.downcast_ref::<ServiceError>().map_or(1, ServiceError::code);
            ExitCode::from(code)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match cli.config.as_deref() {
        Some(path) => AppConfig::load_from(Some(path)),
        None => AppConfig::load(),
    }
    .context("failed to load configuration")?;

    let ctx = ServiceContext::new(config).await.map_err(ServiceError::from)?;
    tracing::info!(table = ctx.model.table(), "bookstore ready");

    match cli.command {
        Command::Add { isbn, title, author, price } => {
            print(&logic::add_impl(&ctx.model, AddRequest { isbn, title, author, price }).await?)
        }
        Command::Check { isbn } => print(&logic::check_impl(&ctx.model, CheckRequest { isbn }).await?),
        Command::Get { id } => print(&logic::get_impl(&ctx.model, GetRequest { id }).await?),
        Command::Remove { id } => print(&logic::remove_impl(&ctx.model, RemoveRequest { id }).await?),
        Command::Purge => print(&logic::purge_impl(ctx.cache.as_ref()).await?),
        Command::Stats => print(&StatsResponse {
            table: ctx.model.table(),
            data_source: &ctx.config.data_source,
            stats: ctx.model.stats(),
        }),
    }
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to encode response")?;
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_add() {
        let cli = Cli::try_parse_from(["bookstore", "add", "isbn-1", "Dune", "--price", "1099"]).unwrap();
        match cli.command {
            Command::Add { isbn, title, author, price } => {
                assert_eq!(isbn, "isbn-1");
                assert_eq!(title, "Dune");
                assert_eq!(author, "");
                assert_eq!(price, 1099);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_purge() {
        let cli = Cli::try_parse_from(["bookstore", "purge"]).unwrap();
        assert!(matches!(cli.command, Command::Purge));
    }

    #[test]
    fn test_parse_global_config() {
        let cli = Cli::try_parse_from(["bookstore", "check", "isbn-1", "--config", "store.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("store.toml")));
        assert!(matches!(cli.command, Command::Check { .. }));
    }
}
