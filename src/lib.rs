mod capture;
mod cli;
mod config;
mod core;
mod error;
mod inject;
mod parser;
mod pipeline;
mod rewrite;
mod signals;

pub use cli::Cli;
pub use config::Config;
pub use error::{ConfigError, PipelineError};
pub use pipeline::PipelineState;

use capture::CaptureStats;

/// Installs a panic hook that logs via `tracing::error!` before delegating
/// to the default hook.
pub fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!("PANIC in pmtud-relay: {info}");
        default_hook(info);
    }));
}

pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pmtud_relay=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Runs the capture → parse → rate-limit → rewrite → inject pipeline until
/// the process receives SIGINT or SIGTERM.
pub async fn run(config: Config) -> anyhow::Result<CaptureStats> {
    let pid = std::process::id();
    tracing::info!(
        pid,
        iface = %config.iface,
        src_rate = config.src_rate,
        iface_rate = config.iface_rate,
        verbosity = config.verbosity,
        dry_run = config.dry_run,
        "starting pmtud-relay"
    );

    if let Some(cpu) = config.cpu {
        crate::core::pin_to_cpu(cpu);
    }

    let mut state = PipelineState::new(config)?;
    let stats = state.run_event_loop().await?;

    tracing::info!(pid, "Quitting");
    tracing::info!(
        received = stats.received,
        dropped_by_library = stats.dropped_by_library,
        dropped_by_interface = stats.dropped_by_interface,
        "capture statistics"
    );

    Ok(stats)
}
