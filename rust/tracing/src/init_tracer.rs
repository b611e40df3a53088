use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::fmt;
use tracing_subscriber::Registry;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Layer};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFilterLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogFilterLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFilterLevel::Trace => f.write_str("trace"),
            LogFilterLevel::Debug => f.write_str("debug"),
            LogFilterLevel::Info => f.write_str("info"),
            LogFilterLevel::Warn => f.write_str("warn"),
            LogFilterLevel::Error => f.write_str("error"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFilter {
    pub crate_name: String,
    pub filter_level: LogFilterLevel,
}

#[derive(Debug, Error)]
pub enum TracingInitError {
    #[error("No tracing layers were provided")]
    NoLayers,
    #[error("Global tracing subscriber is already set: {0}")]
    AlreadySet(#[from] tracing::subscriber::SetGlobalDefaultError),
}

const DEFAULT_CRATE_NAMES: &[&str] = &[
    "recordindex",
    "recordindex_cache",
    "recordindex_config",
    "recordindex_error",
    "recordindex_tracing",
    "recordindex_types",
];

fn global_filter_directives(custom_filters: &[LogFilter]) -> String {
    // These need to have underscores because the Rust compiler automatically
    // converts all hyphens in crate names to underscores to make them valid
    // Rust identifiers
    let mut directives = vec!["error".to_string()];
    directives.extend(DEFAULT_CRATE_NAMES.iter().map(|s| format!("{s}=debug")));
    directives.extend(
        custom_filters
            .iter()
            .map(|custom_filter| format!("{}={}", custom_filter.crate_name, custom_filter.filter_level)),
    );
    directives.join(",")
}

pub fn init_global_filter_layer(
    custom_filters: &[LogFilter],
) -> Box<dyn Layer<Registry> + Send + Sync> {
    let global_filter = global_filter_directives(custom_filters);
    EnvFilter::new(std::env::var("RUST_LOG").unwrap_or(global_filter)).boxed()
}

pub fn init_stdout_layer() -> Box<dyn Layer<Registry> + Send + Sync> {
    fmt::layer().pretty().with_target(false).boxed()
}

pub fn init_tracing(
    layers: Vec<Box<dyn Layer<Registry> + Send + Sync>>,
) -> Result<(), TracingInitError> {
    let layers = layers
        .into_iter()
        .reduce(|a, b| Box::new(a.and_then(b)))
        .ok_or(TracingInitError::NoLayers)?;
    let subscriber = tracing_subscriber::registry().with(layers);
    tracing::subscriber::set_global_default(subscriber)?;
    tracing::info!("Global tracing subscriber set");
    Ok(())
}

pub fn init_panic_tracing_hook() {
    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let payload = panic_info.payload();

        let payload = if let Some(s) = payload.downcast_ref::<&str>() {
            Some(&**s)
        } else {
            payload.downcast_ref::<String>().map(|s| s.as_str())
        };

        tracing::error!(
            panic.payload = payload,
            panic.location = panic_info.location().map(|l| l.to_string()),
            panic.backtrace = tracing::field::display(std::backtrace::Backtrace::capture()),
            "A panic occurred"
        );

        prev_hook(panic_info);
    }));
}

/// Filtered stdout logging plus the panic hook, for binaries.
pub fn init_stdout_tracing(custom_filters: &[LogFilter]) -> Result<(), TracingInitError> {
    let layers = vec![
        // The global filter applies to all subsequent layers
        init_global_filter_layer(custom_filters),
        init_stdout_layer(),
    ];
    init_tracing(layers)?;
    init_panic_tracing_hook();
    Ok(())
}
