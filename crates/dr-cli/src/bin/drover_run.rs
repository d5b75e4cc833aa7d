//! Entry point executed inside every launched container.
//!
//! Reads the encoded run from `DROVER_ARGS` / `DROVER_CODEC`, writes the
//! launch context next to the run's output, and invokes the method.

use dr_launch::{MethodRegistry, RemoteRunner, SEARCH_PATH_ENV};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Mounted code directories come first on PATH so shell methods find
    // their scripts.
    if let Ok(search_path) = std::env::var(SEARCH_PATH_ENV) {
        if !search_path.is_empty() {
            let path = match std::env::var("PATH") {
                Ok(existing) => format!("{search_path}:{existing}"),
                Err(_) => search_path,
            };
            std::env::set_var("PATH", path);
        }
    }

    let decoded = RemoteRunner::new(MethodRegistry::with_builtins()).run_from_env()?;
    info!(
        method = %decoded.method.name,
        output_dir = %decoded.context.output_directory,
        "run finished"
    );
    Ok(())
}
