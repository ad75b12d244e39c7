//! Logging utils.

use tracing_appender::non_blocking::WorkerGuard;

/// Initialize file logging, always use file logging.
///
/// It uses `TEXTWEAVE_LOG` environment variable to control the logging
/// level. Defaults to `error`.
///
/// Returns the appender worker guard, which must be kept alive for the
/// duration of the process or buffered records are lost.
pub fn init() -> WorkerGuard {
  let env_filter = tracing_subscriber::EnvFilter::try_from_env("TEXTWEAVE_LOG")
    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("error"));

  let appender = tracing_appender::rolling::never(".", "textweave.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let subscriber = tracing_subscriber::FmtSubscriber::builder()
    .with_env_filter(env_filter)
    .with_writer(writer)
    .with_ansi(false)
    .finish();
  tracing::subscriber::set_global_default(subscriber).unwrap();
  guard
}
