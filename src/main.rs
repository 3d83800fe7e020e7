mod cache;
mod charts;
mod commands;
mod config;
mod db;
mod error;
mod history;
mod logging;
mod model;
mod output;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::error;

use cache::{CacheLayer, NoopStorage, SqliteStorage};
use charts::ChartService;
use commands::Command;
use config::Config;
use db::Database;
use output::Response;

#[derive(Parser, Debug)]
#[command(name = "issue-charts")]
#[command(about = "Issue tracker store with historical status charts")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/issue-charts/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// SQLite database to use instead of the configured one
  #[arg(short, long, global = true)]
  database: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
  color_eyre::install()?;

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;
  let _log_guard = logging::init(&config.log.level, config.log.resolved_dir().as_deref());

  let code = match run(args, &config).await {
    Ok(response) => {
      println!("{}", response.render()?);
      ExitCode::SUCCESS
    }
    Err(err) => {
      error!(error = %err, "command failed");
      println!("{}", Response::failure(&err).render()?);
      ExitCode::FAILURE
    }
  };

  Ok(code)
}

async fn run(args: Args, config: &Config) -> Result<Response> {
  let db_path = match args.database.or_else(|| config.database.path.clone()) {
    Some(path) => path,
    None => Database::default_path()?,
  };
  let db = Arc::new(Database::open(&db_path)?);

  let chart_args = match args.command {
    Command::Chart(chart_args) => chart_args,
    other => return commands::execute(other, &db),
  };

  if !config.cache.enabled {
    let service = ChartService::new(db, CacheLayer::new(NoopStorage));
    return commands::chart(&service, &chart_args).await;
  }

  let cache_path = match &config.cache.path {
    Some(path) => path.clone(),
    None => SqliteStorage::default_path()?,
  };
  let ttl = config
    .cache
    .ttl()
    .ok_or_else(|| eyre!("cache.ttl_secs out of range: {}", config.cache.ttl_secs))?;
  let cache = CacheLayer::new(SqliteStorage::open(&cache_path)?).with_ttl(ttl);
  let service = ChartService::new(db, cache);
  commands::chart(&service, &chart_args).await
}
