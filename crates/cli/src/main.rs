mod render;

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use extractor_core::{
    load_config, load_config_from_env, validate_config, Config, FormatCatalog, PipelineController,
    Session, SourceFile,
};

use render::Renderer;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(
    name = "extract-audio",
    version,
    about = "Extract the audio track of a video file"
)]
struct Cli {
    /// Configuration file (TOML). Defaults plus EXTRACTOR_* variables when omitted.
    #[arg(long, global = true, env = "EXTRACTOR_CONFIG")]
    config: Option<PathBuf>,

    /// Show library logging.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the available output formats.
    Formats {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Extract the audio track of a video file.
    Convert {
        /// Video file to extract from.
        input: PathBuf,
        /// Output format id (see `formats`).
        #[arg(long)]
        format: Option<String>,
        /// Declared media type of the input; guessed from the extension when omitted.
        #[arg(long)]
        mime: Option<String>,
        /// Output directory.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Convert without asking for confirmation.
        #[arg(long, short = 'y')]
        yes: bool,
        /// Replace an existing output file.
        #[arg(long)]
        overwrite: bool,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_filter = if cli.verbose {
        "info,extractor_core=debug"
    } else {
        "warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("extract-audio {}", VERSION);
    let config = load(cli.config.as_deref())?;

    match cli.command {
        Commands::Formats { json } => {
            print_formats(&config.catalog(), &config.output.default_format, json)
        }
        Commands::Convert {
            input,
            format,
            mime,
            output,
            yes,
            overwrite,
        } => {
            let output_dir = output.unwrap_or_else(|| config.output.dir.clone());
            convert(&config, &input, format, mime, &output_dir, yes, overwrite).await
        }
    }
}

fn load(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            load_config(path).with_context(|| format!("Failed to load config from {:?}", path))?
        }
        None => load_config_from_env().context("Failed to load config from environment")?,
    };

    validate_config(&config).context("Configuration validation failed")?;
    Ok(config)
}

fn print_formats(catalog: &FormatCatalog, default_id: &str, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(catalog.list())?);
        return Ok(());
    }

    for format in catalog.list() {
        let marker = if format.id == default_id { "*" } else { " " };
        println!(
            "{} {:<6} {:<12} .{:<5} {}",
            marker, format.id, format.name, format.extension, format.mime_type
        );
    }
    Ok(())
}

async fn convert(
    config: &Config,
    input: &Path,
    format: Option<String>,
    mime: Option<String>,
    output_dir: &Path,
    yes: bool,
    overwrite: bool,
) -> Result<()> {
    let file = SourceFile::open(input, mime)
        .await
        .with_context(|| format!("Cannot read {}", input.display()))?;

    let session = Arc::new(Session::from_config(config)?);
    let mut controller = PipelineController::new(session);
    if let Some(id) = format.as_deref() {
        controller.select_format(id)?;
    }

    let renderer = Renderer::spawn(controller.subscribe());

    let analysis = controller.drop_file(file).await;
    renderer.finish().await;
    analysis?;

    let Some(ready) = controller.ready_info() else {
        bail!("Pipeline did not reach the ready state");
    };

    let duration = format_duration(ready.duration_secs);
    println!(
        "{} ({:.1} MB): {}, {}{}",
        ready.file_name,
        ready.size_bytes as f64 / (1024.0 * 1024.0),
        if ready.has_audio { "audio track found" } else { "no audio track" },
        duration,
        if ready.duration_estimated { " (estimated)" } else { "" }
    );

    if !controller.can_convert() {
        bail!("{} has no audio track to extract", ready.file_name);
    }

    let target = output_dir.join(&ready.suggested_filename);
    if target.exists() && !overwrite {
        bail!(
            "Output file already exists: {} (use --overwrite)",
            target.display()
        );
    }

    if !yes && !confirm(&format!("Extract audio to {}?", target.display()))? {
        controller.reset().await;
        println!("Cancelled");
        return Ok(());
    }

    let renderer = Renderer::spawn(controller.subscribe());
    let result = controller.convert().await;
    renderer.finish().await;
    let result = result?;

    let blob = controller
        .session()
        .blobs()
        .get(&result.blob)
        .await
        .context("Conversion result is no longer available")?;

    tokio::fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    tokio::fs::write(&target, blob.bytes.as_slice())
        .await
        .with_context(|| format!("Failed to write {}", target.display()))?;

    println!(
        "Wrote {} ({} bytes, {})",
        target.display(),
        blob.size_bytes(),
        blob.mime_type
    );

    controller.reset().await;
    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    print!("{} [Y/n] ", question);
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    let answer = answer.trim().to_ascii_lowercase();
    Ok(answer.is_empty() || answer == "y" || answer == "yes")
}

fn format_duration(secs: f64) -> String {
    let total = secs.round() as u64;
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "0:00");
        assert_eq!(format_duration(59.6), "1:00");
        assert_eq!(format_duration(754.0), "12:34");
        assert_eq!(format_duration(3725.0), "1:02:05");
    }

    #[test]
    fn test_cli_parses_convert() {
        let cli = Cli::try_parse_from([
            "extract-audio",
            "convert",
            "clip.mp4",
            "--format",
            "flac",
            "-y",
        ])
        .unwrap();
        match cli.command {
            Commands::Convert {
                input, format, yes, ..
            } => {
                assert_eq!(input, PathBuf::from("clip.mp4"));
                assert_eq!(format.as_deref(), Some("flac"));
                assert!(yes);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
