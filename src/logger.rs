use chrono::Local;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone, Copy)]
struct CompactTimer;

impl FormatTime for CompactTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%m%dT%H:%M:%S%.3f"))
    }
}

fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global subscriber: stdout always, plus a plain-text file when `log_path` is set.
///
/// `RUST_LOG` overrides `level`. Keep the returned guard alive until exit so the
/// file writer flushes.
pub fn init(
    log_path: Option<&Path>,
    level: &str,
) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_timer(CompactTimer)
        .with_writer(std::io::stdout)
        .with_filter(filter(level));

    let Some(log_path) = log_path else {
        tracing_subscriber::registry().with(stdout_layer).try_init()?;
        return Ok(None);
    };

    let file = std::fs::File::create(log_path)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(CompactTimer)
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(filter(level)),
        )
        .try_init()?;

    Ok(Some(guard))
}
