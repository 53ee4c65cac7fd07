use crate::settings::{TracingFormat, TracingSettings};
use tracing_subscriber::{filter::LevelFilter, layer::SubscriberExt, prelude::*, EnvFilter, Layer};

fn env_filter() -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy()
}

/// Installs the global subscriber writing to stdout. The level is taken
/// from `RUST_LOG`, `INFO` by default.
pub fn init_logs(settings: &TracingSettings) -> anyhow::Result<()> {
    // If tracing is disabled, there is nothing to initialize
    if !settings.enabled {
        return Ok(());
    }

    let stdout_layer: Box<dyn Layer<_> + Sync + Send + 'static> = match settings.format {
        TracingFormat::Default => tracing_subscriber::fmt::layer()
            .with_filter(env_filter())
            .boxed(),
        TracingFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .with_filter(env_filter())
            .boxed(),
    };
    tracing_subscriber::registry().with(stdout_layer).try_init()?;

    Ok(())
}
