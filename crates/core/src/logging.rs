use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// Keep this alive for the lifetime of the process; dropping it flushes
/// and stops the background log writer.
pub struct LoggingHandle {
    pub guard: Option<WorkerGuard>,
}

/// Initialize tracing. Filter comes from `CASECALL_LOG`, then `RUST_LOG`,
/// then the default. With `CASECALL_LOG_DIR` set, output goes to a
/// non-blocking file appender; otherwise stderr. `CASECALL_LOG_FORMAT`
/// selects `json` (default) or `pretty`.
pub fn init_logging() -> anyhow::Result<LoggingHandle> {
    let filter = std::env::var("CASECALL_LOG")
        .ok()
        .and_then(|value| EnvFilter::try_new(value).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER));

    let format = std::env::var("CASECALL_LOG_FORMAT").unwrap_or_else(|_| "json".into());
    let registry = tracing_subscriber::registry().with(filter);

    let guard = match std::env::var("CASECALL_LOG_DIR") {
        Ok(dir) => {
            std::fs::create_dir_all(&dir)?;
            let file_appender = tracing_appender::rolling::never(&dir, "casecall.log");
            let (writer, guard) = tracing_appender::non_blocking(file_appender);
            if format.eq_ignore_ascii_case("pretty") {
                registry
                    .with(fmt::layer().with_writer(writer).with_ansi(false).pretty())
                    .init();
            } else {
                registry
                    .with(
                        fmt::layer()
                            .with_writer(writer)
                            .json()
                            .flatten_event(true)
                            .with_target(true)
                            .with_current_span(true),
                    )
                    .init();
            }
            Some(guard)
        }
        Err(_) => {
            if format.eq_ignore_ascii_case("pretty") {
                registry
                    .with(fmt::layer().with_writer(std::io::stderr).pretty())
                    .init();
            } else {
                registry
                    .with(
                        fmt::layer()
                            .with_writer(std::io::stderr)
                            .json()
                            .flatten_event(true),
                    )
                    .init();
            }
            None
        }
    };

    Ok(LoggingHandle { guard })
}
