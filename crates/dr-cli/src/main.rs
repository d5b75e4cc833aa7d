use anyhow::bail;
use clap::{Parser, Subcommand};
use dr_launch::{Launcher, LauncherConfig, RecordingBackend};
use dr_types::Mode;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod sweep_file;

use sweep_file::SweepFile;

#[derive(Parser)]
#[command(name = "drover", version, about = "Expand parameter sweeps and dispatch every run")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand a sweep file and dispatch each configuration.
    Sweep {
        file: PathBuf,
        /// Overrides the mode named in the sweep file.
        #[arg(long)]
        mode: Option<String>,
        /// Launcher config; defaults to $DROVER_CONFIG or the per-user config file.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Record launch requests and print them instead of running anything.
        #[arg(long)]
        dry_run: bool,
    },
    /// Print every run configuration of a sweep file as one JSON line each.
    Expand { file: PathBuf },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Expand { file } => {
            let file = SweepFile::load(&file)?;
            for config in dr_sweep::expand(file.params, file.defaults)? {
                println!("{}", serde_json::to_string(&config)?);
            }
        }
        Commands::Sweep {
            file,
            mode,
            config,
            dry_run,
        } => {
            let config = LauncherConfig::discover(config.as_deref())?;
            let request = SweepFile::load(&file)?.into_request(mode);

            let recorder = RecordingBackend::new();
            let launcher = if dry_run {
                Mode::ALL.into_iter().fold(Launcher::new(config), |launcher, mode| {
                    launcher.with_backend(mode, Arc::new(recorder.clone()))
                })
            } else {
                Launcher::from_config(config)
            };

            let report = launcher.sweep_function(request).await?;

            for request in recorder.requests() {
                println!("{}", serde_json::to_string(&request)?);
            }
            for run in &report.dispatched {
                info!(run = run.run_index, output_dir = %run.output_directory, "dispatched");
            }
            if !report.is_success() {
                bail!(
                    "{} of {} runs failed to dispatch: {:?}",
                    report.failures.len(),
                    report.total(),
                    report.failed_indices()
                );
            }
        }
    }
    Ok(())
}
