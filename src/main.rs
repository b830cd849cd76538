use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use ollama_packer::{
    output::select_model,
    package_model,
    settings::{Settings, ENV_LOG},
    ListingError, ModelLister, OllamaCli,
};
use tracing::metadata::LevelFilter;

/// Package an Ollama model into a compressed archive
#[derive(Parser, Debug)]
#[command(name = "ollama-packer", version)]
#[command(about = "Package an installed Ollama model (manifest + blobs) into a .tar.gz archive", long_about = None)]
struct Cli {
    /// Name of the Ollama model to package, e.g. llama2 or qwen2:7b
    #[arg(short, long)]
    model: Option<String>,

    /// Directory for the archive and its staging directory (default: current directory)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// List installed models and exit
    #[arg(short, long)]
    list: bool,

    /// Pick the model from a numbered list
    #[arg(short, long)]
    interactive: bool,

    /// Show the Ollama models directory on this system and exit
    #[arg(long)]
    show_model_dir: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn setup_logging(verbose: bool) {
    let filter = if verbose {
        LevelFilter::DEBUG
    } else {
        std::env::var(ENV_LOG)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(LevelFilter::INFO)
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn show_model_dir(settings: &Settings) -> Result<()> {
    let model_dir = settings.storage_root();
    println!("Ollama models directory: {}", model_dir.display());
    if model_dir.exists() {
        let entries = std::fs::read_dir(&model_dir)?.count();
        println!("Directory exists");
        println!("Contains {entries} files/directories");
    } else {
        println!("Directory does not exist");
    }
    Ok(())
}

fn list_models(lister: &dyn ModelLister) -> Result<(), ListingError> {
    println!("\nAvailable models:");
    for model in lister.list_installed()? {
        println!("{}", model.line);
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let settings = Settings::from_env(cli.output_dir)?;

    if cli.show_model_dir {
        return show_model_dir(&settings);
    }

    let lister = OllamaCli::new(&settings.ollama_bin);

    if cli.list {
        return Ok(list_models(&lister)?);
    }

    let model_name = match cli.model.filter(|name| !cli.interactive && !name.trim().is_empty()) {
        Some(name) => name,
        None => {
            let models = lister.list_installed()?;
            let stdin = io::stdin();
            match select_model(&models, &mut stdin.lock(), &mut io::stdout())? {
                Some(name) => name,
                None => {
                    println!("No model selected. Exiting.");
                    return Ok(());
                }
            }
        }
    };

    package_model(
        &model_name,
        &settings.storage_root(),
        &settings.output_dir,
        &lister,
    )?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            if error.downcast_ref::<ListingError>().is_some() {
                tracing::error!("{error:#}");
            } else {
                tracing::error!("unexpected error: {error:#}");
            }
            ExitCode::FAILURE
        }
    }
}
