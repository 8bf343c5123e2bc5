//! # tts-stream - Main Application Entry Point
//!
//! Command-line text to speech on top of Piper voice models.
//!
//! ## Modes:
//! - **single-shot**: synthesize one text (argument or stdin) into one WAV file
//! - **stream**: read `<base64>[|<path>]` jobs from stdin, report status lines on stdout
//! - **list**: show which languages have a complete voice model
//!
//! ## Output Channels:
//! - **stdout**: results only (status lines in stream mode, the written path
//!   in single-shot mode, the language list)
//! - **stderr**: logs (`RUST_LOG`, default `tts_stream=info`) and usage hints
//!
//! ## Application Architecture:
//! - **config**: layered configuration (defaults, tts.toml, TTS_* environment)
//! - **error**: error taxonomy shared by all modes
//! - **cli**: command-line flags
//! - **audio**: PCM buffer and WAV framing
//! - **text**: encoding detection for stdin and control lines
//! - **synthesis**: model store, model cache, retries, piper engine
//! - **stream**: control protocol, report channel, stream processor

mod audio;
mod cli;
mod config;
mod error;
mod stream;
mod synthesis;
mod text;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use cli::Cli;
use config::AppConfig;
use error::TtsError;
use std::io::{IsTerminal, Read};
use std::process::ExitCode;
use std::sync::Arc;
use stream::{ConsoleReporter, JobDecoder, StreamCommandProcessor};
use synthesis::{ModelStore, OutputNaming, PiperEngine, RetryPolicy, SynthesisOrchestrator, VoiceModelCache};
use text::InputText;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // A missing .env file is fine.
    dotenv::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let mut config = AppConfig::load()?;
    if let Some(dir) = &cli.models_dir {
        config.models.dir = dir.clone();
    }
    config.validate()?;

    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(ExitCode::SUCCESS);
    }

    if cli.list_models {
        return list_models(&config);
    }

    if cli.stream {
        run_stream(&cli, &config).await?;
        // The runtime's stdin reader may still be parked in a blocking read
        // that cannot be cancelled; leave without waiting for it.
        std::process::exit(0);
    }

    run_single_shot(&cli, &config).await
}

/// Initialize the tracing (logging) system on stderr.
///
/// ## Environment Variables:
/// - `RUST_LOG`: Controls what gets logged (e.g., "debug", "tts_stream=debug")
/// - If not set, defaults to "tts_stream=info"
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tts_stream=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Wire the piper engine, model store and retry policy into one orchestrator.
fn build_orchestrator(config: &AppConfig, naming: OutputNaming) -> SynthesisOrchestrator {
    let engine = PiperEngine::new(config.engine.piper_bin.clone(), config.engine.chunk_bytes);
    let cache = VoiceModelCache::new(ModelStore::new(config.models.dir.clone()), Box::new(engine));
    SynthesisOrchestrator::new(
        cache,
        RetryPolicy::from_config(&config.synthesis),
        naming,
        config.synthesis.placeholder_sample_rate,
    )
}

fn language_for(cli: &Cli, config: &AppConfig) -> String {
    cli.language
        .clone()
        .unwrap_or_else(|| config.models.default_language.clone())
}

fn list_models(config: &AppConfig) -> Result<ExitCode> {
    let store = ModelStore::new(config.models.dir.clone());
    let dir = store.dir();
    let languages = store
        .list_languages()
        .with_context(|| format!("listing {}", dir.display()))?;

    if languages.is_empty() {
        println!("No voice models found in {}", dir.display());
        println!("Place *.onnx and *.onnx.json files into {}", dir.display());
    } else {
        println!("Available languages:");
        for language in languages {
            println!("  - {}", language);
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn run_stream(cli: &Cli, config: &AppConfig) -> Result<()> {
    let output_dir = cli.output.clone().or_else(|| config.stream.output_dir.clone());
    let mut processor = StreamCommandProcessor::new(
        language_for(cli, config),
        OutputNaming::stream(output_dir),
        Arc::new(ConsoleReporter::stdout()),
        config.stream.shutdown_timeout(),
    );

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("interrupt received"),
            Err(e) => {
                warn!(error = %e, "cannot listen for interrupts");
                std::future::pending::<()>().await;
            }
        }
    };

    let input = tokio::io::stdin();
    // Paths are resolved by the processor, so the orchestrator passes them through.
    let orchestrator = build_orchestrator(config, OutputNaming::single_shot());
    processor.run(orchestrator, input, shutdown).await?;
    Ok(())
}

async fn run_single_shot(cli: &Cli, config: &AppConfig) -> Result<ExitCode> {
    let Some(text) = read_text(cli)? else {
        eprintln!("No text given.");
        eprintln!("Usage: tts-stream \"Text to speak\" -l ru");
        eprintln!("   or: echo \"Text to speak\" | tts-stream -l ru");
        eprintln!("Available models: tts-stream --list-models");
        return Ok(ExitCode::FAILURE);
    };

    let language = language_for(cli, config);
    let output = cli.output.clone();
    let mut orchestrator = build_orchestrator(config, OutputNaming::single_shot());
    let job_language = language.clone();

    let result = tokio::task::spawn_blocking(move || {
        orchestrator.synthesize(&text, &job_language, output.as_deref())
    })
    .await
    .context("synthesis task")?;

    match result {
        Ok(outcome) => {
            info!(
                "done: {} ({:.2}s of audio)",
                outcome.path.display(),
                outcome.audio_seconds
            );
            println!("{}", outcome.path.display());
            Ok(ExitCode::SUCCESS)
        }
        Err(e @ TtsError::ModelNotFound { .. }) => {
            error!("{}", e);
            let files = ModelStore::new(config.models.dir.clone()).files_for(&language);
            eprintln!("Make sure the models directory contains:");
            eprintln!("  - {}", files.weights.display());
            eprintln!("  - {}", files.config.display());
            eprintln!("Available models: tts-stream --list-models");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => {
            error!("{}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Text from the argument, or from stdin when it is not a terminal.
fn read_text(cli: &Cli) -> Result<Option<String>> {
    if let Some(text) = &cli.text {
        let text = if cli.base64 {
            JobDecoder::decode_payload(text)?
        } else {
            text.trim().to_string()
        };
        return Ok(Some(text).filter(|t| !t.is_empty()));
    }

    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut raw = Vec::new();
    stdin.lock().read_to_end(&mut raw).context("reading stdin")?;
    let input = InputText::from_bytes(&raw);
    if cli.debug_stdin {
        info!(
            encoding = %input.encoding,
            bytes = raw.len(),
            "stdin text: {:?} ({} chars)",
            input.text,
            input.text.chars().count()
        );
    }
    if let Some(diagnostic) = input.diagnostic {
        return Err(anyhow!(diagnostic.message()));
    }

    let text = input.trimmed();
    Ok(Some(text.to_string()).filter(|t| !t.is_empty()))
}
