//! scribe: replay a recorded generation stream through the engine.
//!
//! Usage:
//!   # Fold a JSON Lines recording into an empty session
//!   scribe replay --frames run.jsonl
//!
//!   # Start from a persisted conversation and edit a code range
//!   scribe replay --frames edit.jsonl --bundle convo.json --range 3:6 --pretty
//!
//! Logs go to stderr (`RUST_LOG`, default `info`); the final session state is
//! printed to stdout as JSON.

use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scribe_stream::{
    EngineConfig, FoldRequest, FrameSource, PersistedBundle, RawFrame, Session, Termination, TransportError,
};
use scribe_types::{CodeRange, ProgrammingLanguage};
use serde_json::json;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// Stream reconciliation engine tools.
#[derive(Parser, Debug)]
#[command(name = "scribe")]
#[command(about = "Replay recorded generation streams through the scribe engine")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fold a recorded frame stream and print the resulting state
    Replay {
        /// Recorded frames, one JSON object per line
        #[arg(long)]
        frames: PathBuf,

        /// Persisted conversation to load before folding
        #[arg(long)]
        bundle: Option<PathBuf>,

        /// Engine configuration (RON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Highlighted code range for ranged edits, as START:END
        #[arg(long, value_parser = parse_range)]
        range: Option<CodeRange>,

        /// Target language for rewrites
        #[arg(long, value_parser = parse_language)]
        language: Option<ProgrammingLanguage>,

        /// Pretty-print the output
        #[arg(long)]
        pretty: bool,
    },
}

fn parse_range(s: &str) -> Result<CodeRange, String> {
    let (start, end) = s
        .split_once(':')
        .ok_or_else(|| format!("expected START:END, got {s:?}"))?;
    let start = start.trim().parse().map_err(|e| format!("bad start {start:?}: {e}"))?;
    let end = end.trim().parse().map_err(|e| format!("bad end {end:?}: {e}"))?;
    if start > end {
        return Err(format!("range start {start} is after end {end}"));
    }
    Ok(CodeRange::new(start, end))
}

fn parse_language(s: &str) -> Result<ProgrammingLanguage, String> {
    ProgrammingLanguage::from_name(s).ok_or_else(|| {
        let known: Vec<_> = ProgrammingLanguage::ALL.iter().map(|l| l.as_str()).collect();
        format!("unknown language {s:?} (known: {})", known.join(", "))
    })
}

/// Frames read lazily from a JSON Lines file.
///
/// Lines that are not frames are logged and skipped, like any other
/// malformed frame.
struct JsonLinesSource {
    lines: Lines<BufReader<File>>,
    line_no: usize,
}

impl JsonLinesSource {
    async fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .await
            .with_context(|| format!("opening frames {}", path.display()))?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
            line_no: 0,
        })
    }
}

impl FrameSource for JsonLinesSource {
    fn next_frame(&mut self) -> impl Future<Output = Option<Result<RawFrame, TransportError>>> + Send {
        async move {
            loop {
                let line = match self.lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => return None,
                    Err(e) => return Some(Err(e.into())),
                };
                self.line_no += 1;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str(&line) {
                    Ok(frame) => return Some(Ok(frame)),
                    Err(e) => warn!(line = self.line_no, "skipping unreadable frame: {e}"),
                }
            }
        }
    }
}

async fn load_bundle(path: &Path) -> Result<PersistedBundle> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading bundle {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing bundle {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let args = Args::parse();
    match args.command {
        Command::Replay {
            frames,
            bundle,
            config,
            range,
            language,
            pretty,
        } => {
            let config = match config {
                Some(path) => EngineConfig::load(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => EngineConfig::default(),
            };
            let session = Session::new(config);
            info!(session = %session.id(), "replaying {}", frames.display());

            if let Some(path) = bundle {
                session.switch_session(load_bundle(&path).await?)?;
            }

            let request = FoldRequest {
                highlighted_code: range,
                language_override: language,
            };
            let source = JsonLinesSource::open(&frames).await?;
            let outcome = session.fold(source, &request).await?;

            let termination = match &outcome.termination {
                Termination::Exhausted => json!("exhausted"),
                Termination::TransportFailed(reason) => json!({ "transportFailed": reason }),
            };
            let report = json!({
                "runId": outcome.run_id,
                "followupMessageId": outcome.followup_message_id,
                "newIndex": outcome.new_index,
                "termination": termination,
                "artifact": outcome.artifact.as_deref(),
                "messages": outcome.messages.as_slice(),
            });
            let out = if pretty {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            };
            println!("{out}");
        }
    }

    Ok(())
}
