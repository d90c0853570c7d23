//! WifiQR CLI - Wi-Fi handout generator
//!
//! Reads a JSON network profile and a LaTeX template, writes a PDF.
//! Returns 1 on input errors and 2 when typesetting fails.

use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use wifiqr_core::{
    build::DEFAULT_TIMEOUT,
    config::expand_home,
    DocumentBuilder, Engine, HandoutPipeline, PipelineError, WifiConfig,
};

#[derive(Parser)]
#[command(name = "wifiqr-cli")]
#[command(version, about = "Generate a printable Wi-Fi QR code handout")]
struct Cli {
    /// Configuration file (JSON)
    #[arg(short, long, default_value = "config.json")]
    input: PathBuf,

    /// LaTeX template
    #[arg(short, long, default_value = "template.tex")]
    template: PathBuf,

    /// Output document (default: <ssid>.pdf)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Typesetting timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    timeout: u64,

    /// Typesetting program, run with --shell-escape
    #[arg(long, default_value = "pdflatex")]
    engine: String,

    /// Also write the QR code PNG to this path
    #[arg(long)]
    qr_png: Option<PathBuf>,

    /// Print a JSON summary to stdout
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn exit_code_for(e: &PipelineError) -> ExitCode {
    if e.is_build_failure() {
        ExitCode::from(2)
    } else {
        ExitCode::FAILURE
    }
}

fn report_failure(message: &str, json: bool) {
    error!("{}", message);
    if json {
        let output = serde_json::json!({
            "success": false,
            "error": message,
        });
        println!("{}", output);
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let input = expand_home(&cli.input);
    let template_path = expand_home(&cli.template);

    let config = match WifiConfig::load(&input) {
        Ok(c) => c,
        Err(e) => {
            let e = PipelineError::from(e);
            report_failure(&e.to_string(), cli.json);
            return exit_code_for(&e);
        }
    };

    let template = match fs::read_to_string(&template_path) {
        Ok(t) => t,
        Err(e) => {
            let message = format!("Failed to read template {}: {}", template_path.display(), e);
            report_failure(&message, cli.json);
            return ExitCode::FAILURE;
        }
    };

    let engine = Engine::new(cli.engine)
        .arg("--shell-escape")
        .arg("-interaction=nonstopmode");
    let builder = DocumentBuilder::new(engine, Duration::from_secs(cli.timeout));
    let pipeline = HandoutPipeline::new(builder);

    if let Some(path) = &cli.qr_png {
        let path = expand_home(path);
        let png = match pipeline.barcode_png(&config) {
            Ok(png) => png,
            Err(e) => {
                report_failure(&e.to_string(), cli.json);
                return exit_code_for(&e);
            }
        };
        if let Err(e) = fs::write(&path, png) {
            report_failure(&format!("Failed to write {}: {}", path.display(), e), cli.json);
            return ExitCode::FAILURE;
        }
        info!("Wrote QR code to {}", path.display());
    }

    let output = cli
        .output
        .map(|p| expand_home(&p))
        .unwrap_or_else(|| config.default_output());

    match pipeline.compile(&config, &template, &output) {
        Ok(handout) => {
            info!("Created {}", handout.output.display());
            if cli.json {
                let output = serde_json::json!({
                    "success": true,
                    "handout": handout,
                });
                match serde_json::to_string_pretty(&output) {
                    Ok(s) => println!("{}", s),
                    Err(e) => warn!("Failed to serialize summary: {}", e),
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            let message = format!("Something went wrong during {} creation: {}", output.display(), e);
            report_failure(&message, cli.json);
            exit_code_for(&e)
        }
    }
}
