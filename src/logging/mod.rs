//! Logging infrastructure - structured tracing throughout the runtime
//!
//! Design: Uses `tracing` for structured, contextual logging with:
//! - Configurable log levels per module
//! - Zero-cost when disabled
//! - Optional JSON output and non-blocking file output

use std::io;

use once_cell::sync::OnceCell;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Global logging state
static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Keeps the non-blocking file writer alive for the process lifetime.
static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default log level
    pub level: Level,
    /// Enable file logging
    pub file_output: bool,
    /// Log file path (if file_output enabled)
    pub log_path: Option<String>,
    /// Enable JSON format (vs human-readable)
    pub json_format: bool,
    /// Show span events (enter/exit)
    pub show_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            file_output: false,
            log_path: None,
            json_format: false,
            show_spans: false,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // BEDROCK_LOG_LEVEL: trace, debug, info, warn, error
        if let Ok(level_str) = std::env::var("BEDROCK_LOG_LEVEL") {
            config.level = match level_str.to_lowercase().as_str() {
                "trace" => Level::TRACE,
                "debug" => Level::DEBUG,
                "info" => Level::INFO,
                "warn" => Level::WARN,
                "error" => Level::ERROR,
                _ => Level::INFO,
            };
        }

        // BEDROCK_LOG_FILE: path to log file
        if let Ok(path) = std::env::var("BEDROCK_LOG_FILE") {
            config.file_output = true;
            config.log_path = Some(path);
        }

        // BEDROCK_LOG_JSON: enable JSON format
        config.json_format = std::env::var("BEDROCK_LOG_JSON").is_ok();

        // BEDROCK_LOG_SPANS: show span events
        config.show_spans = std::env::var("BEDROCK_LOG_SPANS").is_ok();

        config
    }

    /// Create high-performance config (minimal logging)
    pub fn performance() -> Self {
        Self {
            level: Level::ERROR,
            ..Self::default()
        }
    }

    /// Create debug config (verbose logging)
    pub fn debug() -> Self {
        Self {
            level: Level::TRACE,
            file_output: true,
            log_path: Some("bedrock_runtime.log".to_string()),
            json_format: false,
            show_spans: true,
        }
    }
}

/// Initialize logging with default configuration
pub fn init() {
    init_with_config(LogConfig::from_env());
}

/// Initialize logging with custom configuration
pub fn init_with_config(config: LogConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "bedrock_runtime={}",
                config.level.as_str().to_lowercase()
            ))
        });

        let span_events = if config.show_spans {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let registry = tracing_subscriber::registry().with(env_filter);

        if config.file_output {
            let path = config.log_path.as_deref().unwrap_or("bedrock_runtime.log");
            let file = std::path::Path::new(path);
            let dir = file.parent().filter(|p| !p.as_os_str().is_empty());
            let name = file.file_name().map(|n| n.to_os_string());
            let appender = tracing_appender::rolling::never(
                dir.unwrap_or_else(|| std::path::Path::new(".")),
                name.unwrap_or_else(|| "bedrock_runtime.log".into()),
            );
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            registry
                .with(
                    fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_span_events(span_events)
                        .with_target(true),
                )
                .init();
        } else if config.json_format {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(io::stdout)
                        .with_span_events(span_events)
                        .with_target(true),
                )
                .init();
        } else {
            registry
                .with(
                    fmt::layer()
                        .with_writer(io::stdout)
                        .with_span_events(span_events)
                        .with_target(true)
                        .with_thread_ids(cfg!(debug_assertions))
                        .with_line_number(cfg!(debug_assertions)),
                )
                .init();
        }
    });
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

// ============================================================================
// Runtime-specific logging functions
// ============================================================================

/// Log a bucket array rebuild
#[inline]
pub(crate) fn log_table_resize(old_buckets: usize, new_buckets: usize) {
    use tracing::debug;
    debug!(
        event = "table_resize",
        old_buckets,
        new_buckets,
        "Rehashed table into new bucket array"
    );
}

/// Log a node arena replenishment
#[inline]
pub(crate) fn log_chunk_grow(nodes: usize, chunks: usize) {
    use tracing::trace;
    trace!(
        event = "chunk_grow",
        nodes,
        chunks,
        "Node arena grew by one chunk"
    );
}

/// Log an autorelease pool drain
#[inline]
pub(crate) fn log_pool_drain(depth: usize, released: usize) {
    use tracing::trace;
    trace!(
        event = "pool_drain",
        depth,
        released,
        "Autorelease pool drained"
    );
}

/// Log a contract violation just before the panic that reports it
#[inline]
pub(crate) fn log_contract_violation(operation: &str, slot: u32) {
    use tracing::error;
    error!(
        event = "contract_violation",
        operation,
        slot,
        "Runtime contract violated"
    );
}
