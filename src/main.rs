use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use harken::{Engine, QuerySource};

#[derive(Parser)]
#[command(name = "harken", about = "Acoustic fingerprinting and recognition", version)]
struct Cli {
    /// Fingerprint database path
    #[arg(long, default_value = "harken.sqlite")]
    database: PathBuf,

    /// Only fingerprint the first N seconds of each indexed file
    #[arg(long)]
    limit: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fingerprint a file, or a directory of audio files
    Fingerprint {
        path: PathBuf,
        /// Extensions picked up when fingerprinting a directory
        #[arg(long, value_delimiter = ',', default_values_t = [".mp3".to_owned(), ".wav".to_owned()])]
        extensions: Vec<String>,
        /// Worker threads; defaults to the number of hardware threads
        #[arg(long, default_value_t = 0)]
        workers: usize,
    },
    /// Recognize a clip against the index
    Recognize {
        #[command(subcommand)]
        source: RecognizeSource,
    },
    /// List indexed recordings
    List,
}

#[derive(Subcommand)]
enum RecognizeSource {
    /// Recognize an audio file
    File { path: PathBuf },
    /// Recognize from the default microphone
    Mic { seconds: u32 },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut engine = Engine::open(&cli.database, cli.limit)
        .with_context(|| format!("opening index {}", cli.database.display()))?;

    match cli.command {
        Command::Fingerprint {
            path,
            extensions,
            workers,
        } => {
            if path.is_dir() {
                let extensions: Vec<&str> = extensions.iter().map(String::as_str).collect();
                engine.index_directory(&path, &extensions, workers)?;
            } else {
                engine.index_file(&path, None)?;
            }
        }
        Command::Recognize { source } => {
            let matched = match source {
                RecognizeSource::File { path } => engine.recognize(QuerySource::File(&path))?,
                RecognizeSource::Mic { seconds } => engine.recognize(QuerySource::Mic { seconds })?,
            };
            match matched {
                Some(m) => println!(
                    "{} (id {}, sha1 {}) confidence {} offset {:.5}s",
                    m.name, m.recording_id, m.content_hash, m.confidence, m.offset_seconds
                ),
                None => println!("no match"),
            }
        }
        Command::List => {
            for r in engine.recordings()? {
                println!(
                    "{:>5}  {}  {}  {}",
                    r.id,
                    if r.fingerprinted { "ok" } else { "--" },
                    r.content_hash,
                    r.name
                );
            }
        }
    }
    Ok(())
}
