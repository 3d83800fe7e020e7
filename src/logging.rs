//! Tracing setup.

use std::path::Path;

use tracing::{warn, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, fmt::writer::MakeWriterExt, prelude::*, EnvFilter};

/// Environment variable holding a filter directive that overrides the config.
pub const LOG_ENV: &str = "ISSUE_CHARTS_LOG";

/// Install the global subscriber.
///
/// Everything passing the filter is appended to a daily file under `dir`;
/// stderr only carries warnings and errors so stdout stays reserved for
/// command output. When the log file cannot be opened only stderr is used.
/// The returned guard flushes the file writer and must be held until exit.
pub fn init(level: &str, dir: Option<&Path>) -> Option<WorkerGuard> {
  let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level));
  let stderr = fmt::layer()
    .compact()
    .with_writer(std::io::stderr.with_max_level(Level::WARN));

  let (appender, failure) = match dir.map(file_appender) {
    Some(Ok(appender)) => (Some(appender), None),
    Some(Err(e)) => (None, Some(e)),
    None => (None, None),
  };
  let (file, guard) = match appender {
    Some(appender) => {
      let (writer, guard) = tracing_appender::non_blocking(appender);
      (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
    }
    None => (None, None),
  };

  tracing_subscriber::registry()
    .with(filter)
    .with(stderr)
    .with(file)
    .init();

  if let (Some(e), Some(dir)) = (failure, dir) {
    warn!(dir = %dir.display(), error = %e, "log file unavailable, logging to stderr only");
  }
  guard
}

/// Daily-rotated `issue-charts.log` under `dir`, created if missing.
fn file_appender(dir: &Path) -> Result<RollingFileAppender, InitError> {
  RollingFileAppender::builder()
    .rotation(Rotation::DAILY)
    .filename_prefix("issue-charts.log")
    .build(dir)
}
