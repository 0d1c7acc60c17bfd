mod config;
mod event;
mod filter;
mod output;
mod template;

use crate::config::Config;
use crate::event::Event;
use crate::filter::EventFilter;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

/// Ship newline-delimited JSON events to a Sumologic-style HTTP collector,
/// one POST per event.
#[derive(Parser)]
#[command(name = "sumoship", version)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "sumoship.yaml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    // Fail fast: config and adapter setup errors stop the process before
    // any event is read
    let cfg = Config::load(&cli.config)?;
    let filter = EventFilter::new(cfg.match_on.clone(), cfg.exclude_on.clone())?;
    let out = output::create_output(&cfg)?;

    info!(config = %cli.config, host = %cfg.host, "starting sumoship");

    // Producer: NDJSON records from stdin, shutdown sentinel at EOF
    let (tx, mut rx) = tokio::sync::mpsc::channel::<Event>(100);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match Event::from_json_line(&line) {
                        Ok(event) => {
                            if tx.send(event).await.is_err() {
                                return; // Receiver dropped
                            }
                        }
                        Err(e) => warn!(error = %e, "skipping unparseable event line"),
                    }
                }
                Ok(None) => break, // EOF
                Err(e) => {
                    warn!(error = %e, "stdin read failed");
                    break;
                }
            }
        }
        let _ = tx.send(Event::Shutdown).await;
    });

    // Consumer: strictly sequential delivery, one in-flight send at a time.
    // Events the filter rejects never reach the adapter.
    while let Some(event) = rx.recv().await {
        if !filter.should_ship(&event) {
            continue;
        }

        out.send(&event).await;

        if out.finished() {
            break;
        }
    }

    info!("pipeline drained, exiting");
    Ok(())
}
