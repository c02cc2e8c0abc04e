use std::path::Path;

use once_cell::sync::OnceCell;
use tracing_subscriber::{
    fmt, fmt::time::UtcTime, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use crate::error::{EngineError, EngineResult};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();
static LOGGER_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

const LOG_FILE_PREFIX: &str = "agenda-engine.log";

/// Installs the global subscriber: stdout always, plus a daily rolling file
/// under `log_dir` when one is given. Later calls are no-ops.
pub fn init_logging(log_dir: Option<&Path>, directives: &str) -> EngineResult<()> {
    LOGGER_INIT
        .get_or_try_init(|| -> EngineResult<()> {
            let env_filter = EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(directives))
                .map_err(|err| EngineError::config(format!("invalid log directives: {err}")))?;

            let file_layer = match log_dir {
                Some(dir) => {
                    std::fs::create_dir_all(dir)?;
                    let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
                    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                    LOGGER_GUARD
                        .set(guard)
                        .map_err(|_| EngineError::other("logger already initialised"))?;
                    Some(
                        fmt::layer()
                            .with_writer(non_blocking)
                            .with_ansi(false)
                            .with_target(true)
                            .with_timer(UtcTime::rfc_3339()),
                    )
                }
                None => None,
            };

            tracing_subscriber::registry()
                .with(env_filter)
                .with(file_layer)
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_timer(UtcTime::rfc_3339()),
                )
                .try_init()
                .map_err(|err| EngineError::other(format!("failed to install subscriber: {err}")))?;

            Ok(())
        })
        .map(|_| ())
}
