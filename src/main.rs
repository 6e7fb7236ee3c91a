use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use liveset_generator::{Config, GenerationRequest, ProjectAssembler};

#[derive(Parser)]
#[command(
    name = "liveset-generator",
    version,
    about = "Turn a folder of tagged field recordings into an Ableton Live set",
    long_about = "Liveset-Generator scans a directory of WAV recordings, groups them into tracks by the tags in their RIFF comments, and writes a Live set cloned from a template."
)]
struct Cli {
    /// Directory containing WAV recordings
    #[arg(short, long, required_unless_present = "print_config")]
    input: Option<PathBuf>,

    /// Template Live set (.als, gzip or plain XML)
    #[arg(short, long, required_unless_present = "print_config")]
    template: Option<PathBuf>,

    /// Output .als file or directory (default: <input>/Ableton/)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Project name (default: FieldRecording_<timestamp>)
    #[arg(short, long)]
    name: Option<String>,

    /// Files handled per grouping batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Worker threads for validation and metadata extraction
    #[arg(long)]
    workers: Option<usize>,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Give up if generation takes longer than this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    // Load configuration
    let mut config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => Config::default(),
    };
    if let Some(workers) = cli.workers {
        config.generator.workers = workers;
    }
    if let Some(batch_size) = cli.batch_size {
        config.generator.batch_size = batch_size;
    }
    config.validate()?;

    if cli.print_config {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    let input = cli.input.ok_or_else(|| anyhow!("--input is required"))?;
    let template = cli.template.ok_or_else(|| anyhow!("--template is required"))?;

    info!("Starting Liveset-Generator v{}", env!("CARGO_PKG_VERSION"));
    info!("Workers: {}", config.generator.effective_workers());

    let mut request = GenerationRequest::new(input);
    if let Some(output) = cli.output {
        request = request.with_output(output);
    }
    if let Some(name) = cli.name {
        request = request.with_project_name(name);
    }

    let mut assembler = ProjectAssembler::new(template, config)?;

    // The pipeline is blocking; keep it off the async workers
    let task = tokio::task::spawn_blocking(move || {
        let progress = |current: usize, total: usize, message: &str| {
            debug!("[{}/{}] {}", current, total, message);
        };
        let succeeded = assembler.generate(&request, Some(&progress));
        (succeeded, assembler.stats().clone())
    });

    let (succeeded, stats) = match cli.timeout_secs {
        Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), task).await {
            Ok(joined) => joined?,
            Err(_) => {
                error!("❌ Generation did not finish within {}s", secs);
                // The blocking task cannot be cancelled; do not wait for it
                std::process::exit(2);
            }
        },
        None => task.await?,
    };

    if !succeeded {
        bail!(stats
            .failure_reason
            .unwrap_or_else(|| "Live set generation failed".to_string()));
    }

    match stats.output_path {
        Some(path) => info!("Live set saved to: {}", path.display()),
        None => info!("Live set generation finished"),
    }
    Ok(())
}
