use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use escalation_core::{detect_escalation, EscalationRequest};
use escalation_service::{dry_run_orchestrator, live_orchestrator, load_roster, ServiceConfig};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "escalation", about = "Decide and dispatch chat escalations to staff")]
struct Cli {
    /// TOML config file; environment variables are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Turn {
    /// Customer message text for this turn.
    #[arg(long)]
    message: String,
    /// Upstream intent-classifier confidence (0.0–1.0).
    #[arg(long, default_value_t = 1.0)]
    confidence: f64,
    /// Consecutive failed bot responses in this conversation.
    #[arg(long, default_value_t = 0)]
    failures: u32,
    #[arg(long)]
    customer: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Classify a turn and print the detection. No I/O.
    Classify(Turn),
    /// Run the full escalation flow and print the outcome.
    Escalate {
        #[command(flatten)]
        turn: Turn,
        #[arg(long)]
        session: String,
        /// Use in-memory collaborators instead of the backend.
        #[arg(long)]
        dry_run: bool,
        /// JSON staff roster for dry runs.
        #[arg(long, requires = "dry_run")]
        staff: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ServiceConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Classify(turn) => {
            let detection = detect_escalation(
                &turn.message,
                turn.confidence,
                turn.failures,
                turn.customer.as_deref(),
                &config.escalation,
            );
            println!("{}", serde_json::to_string_pretty(&detection)?);
        }
        Command::Escalate {
            turn,
            session,
            dry_run,
            staff,
        } => {
            let request = EscalationRequest {
                session_id: session,
                customer_id: turn.customer,
                message: turn.message,
                confidence: turn.confidence,
                failure_count: turn.failures,
            };

            if dry_run {
                let roster = match staff {
                    Some(path) => load_roster(&path)?,
                    None => Vec::new(),
                };
                let run = dry_run_orchestrator(&config, roster);
                let outcome = run
                    .orchestrator
                    .escalate_conversation(&request, &config.escalation)
                    .await;
                info!(
                    sent = run.transport.sent().len(),
                    audited = run.audit.entries().len(),
                    "dry run complete"
                );
                for health in run.orchestrator.dispatcher().channel_health() {
                    info!(
                        channel = %health.channel,
                        level = %health.level,
                        delivery_rate = health.delivery_rate(),
                        degraded_streak = health.degraded_streak,
                        "channel health"
                    );
                }
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                let orchestrator =
                    live_orchestrator(&config).context("Failed to start escalation service")?;
                let outcome = orchestrator
                    .escalate_conversation(&request, &config.escalation)
                    .await;
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            }
        }
    }

    Ok(())
}
