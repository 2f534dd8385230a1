mod config;
mod display;

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use tracing::{Level, info};

use claimchart_ai::{AnalysisMode, AnalysisRequest, AnalysisRunner, RagContext, StreamEvent};
use claimchart_core::{ComparisonDocument, InMemoryTaskStore, TaskStatus, match_features, segment};

use crate::config::Settings;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Parser, Debug)]
#[command(name = "claimchart", version, about = "Patent claim-chart analysis")]
struct Cli {
    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split claim text into technical features
    Segment {
        /// Claims file, or `-` for stdin
        claims: PathBuf,
        #[arg(long)]
        json: bool,
    },

    /// Pair every feature with the relevant passage of each document
    Match {
        claims: PathBuf,
        /// Comparison documents; the file name identifies each one
        #[arg(required = true)]
        documents: Vec<PathBuf>,
        #[arg(long)]
        json: bool,
    },

    /// Judge one feature against comparison content with an LLM
    Judge {
        #[arg(long)]
        feature: String,
        /// File holding the comparison content
        #[arg(long)]
        compare: PathBuf,
        #[arg(long, default_value = "")]
        instruction: String,
        #[arg(long)]
        model: Option<String>,
        /// Attach an image (repeatable); switches to the image model
        #[arg(long = "image")]
        images: Vec<PathBuf>,
        /// Augment the comparison content with retrieved passages
        #[arg(long)]
        rag: bool,
        /// Retrieval dataset (repeatable); defaults to the Chinese dataset
        #[arg(long = "dataset")]
        datasets: Vec<String>,
        #[arg(long, default_value_t = claimchart_ai::DEFAULT_TOP_K)]
        top_k: usize,
        #[arg(long)]
        json: bool,
    },

    /// Judge one feature, printing the reply as it streams
    Stream {
        #[arg(long)]
        feature: String,
        #[arg(long)]
        compare: PathBuf,
        #[arg(long, default_value = "")]
        instruction: String,
        #[arg(long)]
        model: Option<String>,
        /// Emit one JSON event per line
        #[arg(long)]
        json: bool,
    },

    /// Segment, match and judge as one tracked task
    Analyze {
        claims: PathBuf,
        #[arg(required = true)]
        documents: Vec<PathBuf>,
        #[arg(long, value_enum, default_value_t = Mode::All)]
        mode: Mode,
        #[arg(long, default_value = "")]
        instruction: String,
        #[arg(long)]
        model: Option<String>,
        /// Judgments in flight at once
        #[arg(long, default_value_t = 1)]
        concurrency: usize,
        #[arg(long)]
        json: bool,
    },

    /// List available models and retrieval datasets
    Models {
        #[arg(long)]
        json: bool,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    All,
    MatchOnly,
    LlmOnly,
}

impl From<Mode> for AnalysisMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::All => AnalysisMode::All,
            Mode::MatchOnly => AnalysisMode::MatchOnly,
            Mode::LlmOnly => AnalysisMode::LlmOnly,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.quiet { Level::WARN } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();
    info!("claimchart v{}", env!("CARGO_PKG_VERSION"));

    run(cli).await
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = cli.settings;
    match cli.command {
        Command::Segment { claims, json } => {
            let segmentation = segment(&read_text(&claims)?);
            if json {
                print_json(&segmentation.features)?;
            } else {
                display::print_features(&segmentation.features, &segmentation.message);
            }
            if segmentation.is_empty() {
                bail!("{}", segmentation.message);
            }
        }

        Command::Match {
            claims,
            documents,
            json,
        } => {
            let segmentation = segment(&read_text(&claims)?);
            let documents = read_documents(&documents)?;
            let outcome = match_features(&segmentation.features, &documents, None);
            if let Some(e) = outcome.error {
                return Err(e.into());
            }
            info!("{}", outcome.message);
            if json {
                print_json(&outcome.rows)?;
            } else {
                display::print_rows(&outcome.rows);
            }
        }

        Command::Judge {
            feature,
            compare,
            instruction,
            model,
            images,
            rag,
            datasets,
            top_k,
            json,
        } => {
            let judge = settings.judge(model.as_deref())?;
            let compare = read_text(&compare)?;
            let result = if images.is_empty() {
                let rag = rag.then(|| RagContext {
                    dataset_ids: datasets,
                    top_k,
                });
                judge
                    .judge(&feature, &compare, &instruction, rag.as_ref())
                    .await
            } else {
                judge
                    .judge_with_images(&feature, &compare, &images, &instruction)
                    .await
            };
            if json {
                print_json(&result)?;
            } else {
                display::print_judgment(&result);
            }
            if !result.is_success() {
                bail!(
                    "judgment failed: {}",
                    result.message.as_deref().unwrap_or("unknown error")
                );
            }
        }

        Command::Stream {
            feature,
            compare,
            instruction,
            model,
            json,
        } => {
            let judge = settings.judge(model.as_deref())?;
            let compare = read_text(&compare)?;
            let mut events = judge.judge_streaming(&feature, &compare, &instruction);
            let mut stdout = std::io::stdout();

            while let Some(event) = events.next().await {
                if json {
                    write_json_event(&mut stdout, &event)?;
                    continue;
                }
                match event {
                    StreamEvent::Delta { content } => {
                        write!(stdout, "{content}")?;
                        stdout.flush()?;
                    }
                    StreamEvent::Final(result) => {
                        println!();
                        println!();
                        display::print_judgment(&result);
                    }
                    StreamEvent::Error { message, .. } => {
                        println!();
                        bail!("stream failed: {message}");
                    }
                }
            }
        }

        Command::Analyze {
            claims,
            documents,
            mode,
            instruction,
            model,
            concurrency,
            json,
        } => {
            let segmentation = segment(&read_text(&claims)?);
            if segmentation.is_empty() {
                bail!("{}", segmentation.message);
            }
            let request = AnalysisRequest {
                features: segmentation.features,
                documents: read_documents(&documents)?,
                mode: mode.into(),
                user_instruction: instruction,
            };

            let mut runner = AnalysisRunner::new(Arc::new(InMemoryTaskStore::new()))
                .with_judge_concurrency(concurrency);
            if request.mode.runs_llm() {
                if let Some(judge) = settings.optional_judge(model.as_deref())? {
                    runner = runner.with_judge(Arc::new(judge));
                }
            }

            let id = runner.submit(request);
            let task = loop {
                tokio::time::sleep(POLL_INTERVAL).await;
                let task = runner
                    .get(id)
                    .with_context(|| format!("task {id} disappeared"))?;
                if task.status.is_terminal() {
                    break task;
                }
                if !cli.quiet {
                    eprint!("\r[{:>3}%] {:<60}", task.progress, task.message);
                }
            };
            if !cli.quiet {
                eprintln!();
            }

            if json {
                print_json(&task)?;
            } else {
                println!("{}", task.message);
                println!();
                display::print_rows(task.result.as_deref().unwrap_or_default());
            }
            if task.status == TaskStatus::Failed {
                bail!("analysis failed: {}", task.message);
            }
        }

        Command::Models { json } => {
            let models = settings.models();
            let datasets = settings.datasets();
            if json {
                print_json(&serde_json::json!({ "models": models, "datasets": datasets }))?;
            } else {
                display::print_catalogue(&models, &datasets);
            }
        }
    }
    Ok(())
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("reading stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn read_documents(paths: &[PathBuf]) -> anyhow::Result<Vec<ComparisonDocument>> {
    paths
        .iter()
        .map(|path| {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            Ok(ComparisonDocument::new(filename, read_text(path)?))
        })
        .collect()
}

/// Write one event as a JSON line. A terminal error event is written and
/// then returned as the command's error.
fn write_json_event(out: &mut impl Write, event: &StreamEvent) -> anyhow::Result<()> {
    writeln!(out, "{}", serde_json::to_string(event)?)?;
    out.flush()?;
    if let StreamEvent::Error { message, .. } = event {
        bail!("stream failed: {message}");
    }
    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
