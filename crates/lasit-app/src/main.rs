use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use lasit_core::CardSet;
use lasit_core::preprocess::chunk_text;
use lasit_lang_latvian::{BatchClient, BatchOutcome, BatchRequest};
use lasit_queue::ProcessReport;
use tracing_subscriber::EnvFilter;

pub mod controller;
pub mod events;
pub mod io;
pub mod profile;
pub mod state;
pub mod status;


use self::controller::{AppController, join_all};
use self::events::reprocess_queue::handle_queue_reprocess;
use self::events::text_input::handle_text_input;
use self::state::AppState;

#[derive(Parser)]
#[command(name = "lasit", version, about = "Flashcards from Latvian text")]
struct Cli {
    /// JSON config file (defaults to ./lasit.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk a text, build cards for it and export the session
    Process {
        /// Text file, or `-` for stdin
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Inspect or drain the retry queue
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
    /// Asynchronous batch processing
    Batch {
        #[command(subcommand)]
        action: BatchAction,
    },
}

#[derive(Subcommand)]
enum QueueAction {
    List,
    /// Resend every queued request
    Process {
        /// Session export to fold recovered cards into [default: lasit_session.json]
        #[arg(long)]
        session: Option<PathBuf>,
    },
    Remove {
        id: String,
    },
    Clear,
}

#[derive(Subcommand)]
enum BatchAction {
    Submit {
        input: PathBuf,
    },
    Status {
        id: String,
    },
    Results {
        id: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.with_ansi(atty::is(atty::Stream::Stderr)).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = profile::load_config(cli.config.as_deref())?;
    let state = Arc::new(AppState::new(config));

    match cli.command {
        Command::Process { input, output } => {
            run_process(state, &input, output.as_deref()).await
        }
        Command::Queue { action } => run_queue(state, action).await,
        Command::Batch { action } => run_batch(state, action).await,
    }
}

/// Run `work` with the event loop alive, then drain it
///
/// Ctrl+C abandons the work; events emitted up to that point are still handled.
async fn with_event_loop<F, T>(state: Arc<AppState>, work: F) -> anyhow::Result<Option<T>>
where
    F: Future<Output = anyhow::Result<T>>,
{
    let controller = AppController::new(state);
    let tasks = controller.spawn_tasks();

    let result = tokio::select! {
        result = work => result.map(Some),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown requested");
            Ok(None)
        }
    };

    controller.shutdown();
    join_all(tasks).await;
    result
}

async fn run_process(
    state: Arc<AppState>,
    input: &Path,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let text = io::read_input(input)?;
    if text.trim().is_empty() {
        anyhow::bail!("Input is empty");
    }

    let work = handle_text_input(state.clone(), text);
    let Some(summary) = with_event_loop(state.clone(), work).await? else {
        return Ok(());
    };

    let output = output.unwrap_or(Path::new(io::DEFAULT_SESSION_FILE));
    io::save_session(&state, output).await?;

    let session = state.session.read().await;
    println!(
        "{} chunk(s): {} ok, {} failed. {} card(s), {} queued for retry. Saved to {}",
        summary.chunks,
        summary.succeeded,
        summary.failed,
        session.cards.len(),
        state.queue.len(),
        output.display()
    );

    let stats = state.client.stats();
    tracing::info!(
        "Requests: {} sent, {} retries, {} failures",
        stats.requests,
        stats.retries,
        stats.failures
    );

    match summary.aborted {
        Some(info) => Err(anyhow::anyhow!("{} {}", info.user_message, info.recommendation)),
        None => Ok(()),
    }
}

/// Drain the retry queue into the session export at `path`
///
/// The export is created when missing and written whenever an item was
/// recovered, since recovered items no longer exist anywhere else.
async fn reprocess_into_session(
    state: Arc<AppState>,
    path: &Path,
) -> anyhow::Result<Option<ProcessReport>> {
    if path.exists() {
        io::load_session(&state, path).await?;
    } else {
        tracing::info!("No session at {}, starting a new one", path.display());
    }

    let work = handle_queue_reprocess(state.clone());
    let Some(report) = with_event_loop(state.clone(), work).await? else {
        return Ok(None);
    };

    if !report.recovered.is_empty() {
        io::save_session(&state, path).await?;
    }
    Ok(Some(report))
}

async fn run_queue(state: Arc<AppState>, action: QueueAction) -> anyhow::Result<()> {
    match action {
        QueueAction::List => {
            let items = state.queue.items();
            if items.is_empty() {
                println!("Retry queue is empty");
            } else {
                println!("{}", serde_json::to_string_pretty(&items)?);
            }
        }
        QueueAction::Process { session } => {
            let path = session.unwrap_or_else(|| PathBuf::from(io::DEFAULT_SESSION_FILE));
            let Some(report) = reprocess_into_session(state.clone(), &path).await? else {
                return Ok(());
            };

            println!(
                "{} processed, {} recovered, {} still failing, {} left in queue",
                report.processed,
                report.successful,
                report.failed,
                state.queue.len()
            );
        }
        QueueAction::Remove { id } => {
            if !state.queue.remove(&id) {
                anyhow::bail!("No queued item with id {id}");
            }
            println!("Removed {id}");
        }
        QueueAction::Clear => {
            state.queue.clear().context("Failed to clear retry queue")?;
            println!("Retry queue cleared");
        }
    }
    Ok(())
}

async fn run_batch(state: Arc<AppState>, action: BatchAction) -> anyhow::Result<()> {
    let client = {
        let config = state.config.read().await;
        BatchClient::new(
            config.network.batch_url.clone(),
            Duration::from_secs(config.network.timeout_seconds),
        )
    };

    match action {
        BatchAction::Submit { input } => {
            let text = io::read_input(&input)?;
            let chunks = {
                let config = state.config.read().await;
                chunk_text(&text, config.chunking.sentences_per_chunk, config.chunking.overlap)
            };
            let options = state.request_options().await;

            let status = client.create(&BatchRequest::for_chunks(&chunks, &options)).await?;
            println!("Submitted batch {} ({})", status.id, status.processing_status);
        }
        BatchAction::Status { id } => {
            let status = client.status(&id).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        BatchAction::Results { id, output } => {
            let status = client.status(&id).await?;
            if !status.is_ended() {
                anyhow::bail!(
                    "Batch {} is still {}, try again later",
                    status.id,
                    status.processing_status
                );
            }
            let results = client.results(&status).await?;

            let mut cards = CardSet::default();
            let mut failed = 0;
            {
                let mut session = state.session.write().await;
                for result in results {
                    match result.outcome {
                        BatchOutcome::Succeeded(output) => {
                            if let Some(translation) = output.translation {
                                session.translations.push(translation);
                            }
                            cards.add(output.cards);
                        }
                        BatchOutcome::Failed(reason) => {
                            failed += 1;
                            tracing::warn!("Batch request {} failed: {}", result.custom_id, reason);
                        }
                    }
                }
                session.cards = cards;
            }

            let output = output.unwrap_or_else(|| PathBuf::from(format!("lasit_batch_{id}.json")));
            io::save_session(&state, &output).await?;
            println!(
                "{} card(s) saved to {}, {} request(s) failed",
                state.session.read().await.cards.len(),
                output.display(),
                failed
            );
        }
    }
    Ok(())
}
