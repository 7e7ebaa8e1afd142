//! Replays a recorded detection log through one tracking session.
//!
//! Usage: `courtside-replay <detections.jsonl> <highlights.json> [total_frames]`
//!
//! Session messages are written to stdout as JSON lines and user input is
//! read from stdin, one `InteractionResponse` JSON object per line. Logs go
//! to stderr.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use courtside_models::{HighlightInterval, SessionStatus};
use courtside_worker::{JsonLinesFeed, SessionExecutor, StdioGateway, WorkerConfig};

/// A highlight given either in frames or in seconds.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HighlightSpec {
    Frames { start_frame: u64, end_frame: u64 },
    Seconds { start: f64, end: f64 },
}

impl HighlightSpec {
    fn into_interval(self, fps: f64) -> Result<HighlightInterval> {
        let interval = match self {
            HighlightSpec::Frames {
                start_frame,
                end_frame,
            } => HighlightInterval::new(start_frame, end_frame)?,
            HighlightSpec::Seconds { start, end } => HighlightInterval::from_seconds(start, end, fps)?,
        };
        Ok(interval)
    }
}

fn init_tracing() -> Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("courtside=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

async fn load_highlights(path: &str, fps: f64) -> Result<Vec<HighlightInterval>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path))?;
    let specs: Vec<HighlightSpec> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path))?;
    specs
        .into_iter()
        .map(|spec| spec.into_interval(fps))
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        let program = args.first().map(String::as_str).unwrap_or("courtside-replay");
        bail!("usage: {} <detections.jsonl> <highlights.json> [total_frames]", program);
    }
    let total_frames = args
        .get(3)
        .map(|s| s.parse::<u64>())
        .transpose()
        .context("total_frames must be a non-negative integer")?;

    let config = WorkerConfig::from_env();
    info!("Starting courtside-replay with config: {:?}", config);

    let intervals = load_highlights(&args[2], config.default_fps).await?;
    let mut feed = JsonLinesFeed::open(&args[1]).await?;
    if let Some(total) = total_frames {
        feed = feed.with_expected_frames(total);
    }

    let executor = Arc::new(SessionExecutor::new(config)?);
    let handle = executor.spawn(feed, StdioGateway::stdio(), intervals);
    info!(session_id = %handle.session_id(), "Session started");

    let signal_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            signal_executor.shutdown();
        }
    });

    let report = handle.join().await?;
    match report.status {
        SessionStatus::Completed => {
            if let Some(summary) = &report.summary {
                info!(
                    processed_frames = summary.processed_frames,
                    tracked_player_highlights = summary.tracked_player_highlights,
                    total_highlights = summary.total_highlights,
                    win_rate = summary.win_rate,
                    "Replay complete"
                );
            }
            Ok(())
        }
        status => {
            let message = report.error.unwrap_or_default();
            error!(status = %status.as_str(), "Replay ended: {}", message);
            bail!("session ended with status {}: {}", status.as_str(), message)
        }
    }
}
