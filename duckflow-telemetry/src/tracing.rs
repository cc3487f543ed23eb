use std::backtrace::{Backtrace, BacktraceStatus};
use std::io::{Error, Write};
use std::panic::PanicHookInfo;
use std::sync::{Once, OnceLock};

use duckflow_config::Environment;
use thiserror::Error;
use tracing::subscriber::{SetGlobalDefaultError, set_global_default};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{self, InitError},
};
use tracing_log::{LogTracer, log_tracer::SetLoggerError};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, FmtSubscriber, Registry, fmt, layer::SubscriberExt};

/// JSON field name for pipeline identification in logs.
const PIPELINE_KEY_IN_LOG: &str = "pipeline";

/// Errors that can occur during tracing initialization.
#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to build rolling file appender: {0}")]
    InitAppender(#[from] InitError),

    #[error("failed to init log tracer: {0}")]
    InitLogTracer(#[from] SetLoggerError),

    #[error("failed to set global default subscriber: {0}")]
    SetGlobalDefault(#[from] SetGlobalDefaultError),

    #[error("an io error occurred: {0}")]
    Io(#[from] Error),
}

/// Log flusher handle for ensuring logs are written before shutdown.
///
/// Production mode returns a [`WorkerGuard`] that must be kept alive until the
/// process exits. Development mode writes synchronously and needs no flushing.
#[must_use]
pub enum LogFlusher {
    /// Production flusher that ensures logs are written to files.
    Flusher(WorkerGuard),
    /// Development flusher that doesn't require explicit flushing.
    NullFlusher,
}

static INIT_TEST_TRACING: Once = Once::new();

/// Initializes tracing for tests.
///
/// Set `ENABLE_TRACING=1` to view tracing output:
/// ```bash
/// ENABLE_TRACING=1 cargo test test_name
/// ```
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        if std::env::var("ENABLE_TRACING").is_ok() {
            let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into());
            let _log_flusher =
                configure_dev_tracing(filter).expect("Failed to initialize tracing for tests");
        }
    });
}

/// Name of the pipeline being run, injected into every JSON log entry.
static PIPELINE_NAME: OnceLock<String> = OnceLock::new();

/// Sets the global pipeline name for all tracing events.
pub fn set_global_pipeline_name(pipeline: String) {
    let _ = PIPELINE_NAME.set(pipeline);
}

/// Returns the global pipeline name, if one was set.
pub fn get_global_pipeline_name() -> Option<&'static str> {
    PIPELINE_NAME.get().map(|s| s.as_str())
}

/// Writer wrapper that injects the pipeline field into JSON log entries.
struct PipelineInjectingWriter<W> {
    inner: W,
}

impl<W> PipelineInjectingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W> Write for PipelineInjectingWriter<W>
where
    W: Write,
{
    /// Writes a log entry, adding the pipeline field when the entry is a JSON
    /// object that does not carry one yet.
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Some(pipeline) = get_global_pipeline_name()
            && let Ok(json_str) = std::str::from_utf8(buf)
            && let Ok(serde_json::Value::Object(mut map)) =
                serde_json::from_str::<serde_json::Value>(json_str)
            && !map.contains_key(PIPELINE_KEY_IN_LOG)
        {
            map.insert(
                PIPELINE_KEY_IN_LOG.to_string(),
                serde_json::Value::String(pipeline.to_string()),
            );

            if let Ok(modified) = serde_json::to_string(&map) {
                // Preserve trailing newline if present
                let output = if json_str.ends_with('\n') {
                    format!("{modified}\n")
                } else {
                    modified
                };

                self.inner.write_all(output.as_bytes())?;
                return Ok(buf.len());
            }
        }

        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Initializes tracing for the application.
///
/// Production environments log JSON to daily rotating files, development
/// environments pretty-print to the console. The default level is `info`,
/// overridable through `RUST_LOG`.
pub fn init_tracing(app_name: &str, pipeline: Option<&str>) -> Result<LogFlusher, TracingError> {
    if let Some(pipeline) = pipeline {
        set_global_pipeline_name(pipeline.to_owned());
    }

    // Forward records emitted through the `log` crate by dependencies.
    LogTracer::init()?;

    let is_prod = Environment::load()?.is_prod();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_flusher = if is_prod {
        configure_prod_tracing(filter, app_name)?
    } else {
        configure_dev_tracing(filter)?
    };

    set_tracing_panic_hook();

    Ok(log_flusher)
}

/// Configures JSON logging to rotating daily files.
fn configure_prod_tracing(filter: EnvFilter, app_name: &str) -> Result<LogFlusher, TracingError> {
    let file_appender = rolling::Builder::new()
        .filename_prefix(app_name)
        .filename_suffix("log")
        .rotation(rolling::Rotation::DAILY)
        .max_log_files(5)
        .build("logs")?;

    let (file_appender, guard) = tracing_appender::non_blocking(file_appender);

    let format = fmt::format()
        .with_level(true)
        .with_ansi(false)
        .with_target(false);

    let subscriber = Registry::default().with(filter).with(
        fmt::layer()
            .event_format(format)
            .with_writer(move || PipelineInjectingWriter::new(file_appender.make_writer()))
            .json()
            .with_current_span(true)
            .with_span_list(true),
    );

    set_global_default(subscriber)?;

    Ok(LogFlusher::Flusher(guard))
}

/// Configures pretty console logging.
fn configure_dev_tracing(filter: EnvFilter) -> Result<LogFlusher, TracingError> {
    let format = fmt::format()
        .with_level(true)
        .with_ansi(true)
        .pretty()
        .with_line_number(false)
        .with_file(false)
        .with_target(true);

    let subscriber = FmtSubscriber::builder()
        .event_format(format)
        .with_env_filter(filter)
        .finish();

    set_global_default(subscriber)?;

    Ok(LogFlusher::NullFlusher)
}

/// Routes panics through `tracing` before running the previous hook.
fn set_tracing_panic_hook() {
    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        panic_hook(info);
        prev_hook(info);
    }));
}

fn panic_hook(panic_info: &PanicHookInfo) {
    let backtrace = Backtrace::capture();
    let (backtrace, note) = match backtrace.status() {
        BacktraceStatus::Captured => (Some(backtrace), None),
        BacktraceStatus::Disabled => (
            None,
            Some("run with RUST_BACKTRACE=1 to display backtraces"),
        ),
        BacktraceStatus::Unsupported => {
            (None, Some("backtraces are not supported on this platform"))
        }
        _ => (None, Some("backtrace status is unknown")),
    };

    let payload = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
        s
    } else {
        "unknown panic payload"
    };

    let location = panic_info.location().map(|location| location.to_string());

    tracing::error!(
        panic.payload = payload,
        payload.location = location,
        panic.backtrace = backtrace.map(tracing::field::display),
        panic.note = note,
        "a panic occurred",
    );
}
