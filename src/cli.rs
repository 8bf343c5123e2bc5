//! Command-line surface.
//!
//! Three modes share one flat set of flags:
//! - **single-shot**: `tts-stream "Привет" -l ru -o hello.wav`
//! - **list**: `tts-stream --list-models`
//! - **stream**: `tts-stream --stream -l ru -o out/`, jobs on stdin

use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "tts-stream")]
#[command(about = "Text to speech with Piper voice models")]
#[command(version)]
pub struct Cli {
    /// Text to synthesize (read from stdin when omitted)
    pub text: Option<String>,

    /// Voice model language tag (defaults to models.default_language)
    #[arg(short = 'l', long = "language")]
    pub language: Option<String>,

    /// Output WAV file; in stream mode, directory for job outputs
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Show the available voice models and exit
    #[arg(long = "list-models")]
    pub list_models: bool,

    /// Treat the text argument as base64-encoded UTF-8
    #[arg(long = "base64")]
    pub base64: bool,

    /// Log the detected stdin encoding and decoded text
    #[arg(long = "debug-stdin")]
    pub debug_stdin: bool,

    /// Read `<base64>[|<path>]` jobs from stdin until `exit` or end of input
    #[arg(long = "stream", conflicts_with_all = ["text", "list_models", "base64"])]
    pub stream: bool,

    /// Override the models directory for this invocation
    #[arg(long = "models-dir")]
    pub models_dir: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[arg(long = "print-config")]
    pub print_config: bool,
}
