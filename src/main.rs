use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use payment_tracker::application::tracker::PaymentTracker;
use payment_tracker::config::TrackerConfig;
use payment_tracker::domain::outcome;
use payment_tracker::infrastructure::http::HttpPaymentApi;
use payment_tracker::infrastructure::websocket::WebSocketPushChannel;
use payment_tracker::interfaces::json::simulation::SimulationScript;
use payment_tracker::interfaces::json::snapshot_writer::SnapshotWriter;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Track a payment against the backend until it settles (Ctrl-C abandons)
    Track {
        /// Id of the payment record
        payment_id: String,

        /// Gateway tracking key; defaults to the one stored on the record
        #[arg(long)]
        tracking_key: Option<String>,

        /// REST base URL (overrides PAYMENT_API_URL)
        #[arg(long)]
        api_url: Option<String>,

        /// Push channel base URL (overrides PAYMENT_WS_URL)
        #[arg(long)]
        ws_url: Option<String>,

        /// Seconds to wait for a push confirmation before querying the gateway
        #[arg(long)]
        fallback_secs: Option<u64>,
    },
    /// Show how a gateway result code is resolved
    Resolve {
        #[arg(allow_negative_numbers = true)]
        code: i64,

        /// Gateway message, used for unrecognized codes
        #[arg(long, default_value = "")]
        message: String,
    },
    /// Replay a scripted session (JSON file) against in-memory adapters
    Simulate { script: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Track {
            payment_id,
            tracking_key,
            api_url,
            ws_url,
            fallback_secs,
        } => {
            let mut config = TrackerConfig::from_env().into_diagnostic()?;
            if let Some(url) = api_url {
                config.api_base_url = url;
            }
            if let Some(url) = ws_url {
                config.ws_base_url = url;
            }
            if let Some(secs) = fallback_secs {
                config.fallback_delay = Duration::from_secs(secs);
            }

            let api = HttpPaymentApi::new(&config).into_diagnostic()?;
            let push = WebSocketPushChannel::new(&config);
            let tracker = PaymentTracker::new(Arc::new(api), Arc::new(push), &config);
            let handle = tracker
                .mount(&payment_id, tracking_key)
                .await
                .into_diagnostic()?;

            let mut writer = SnapshotWriter::new(io::stdout().lock());
            handle
                .follow(
                    |snapshot| writer.write_snapshot(snapshot),
                    abandon_on(tokio::signal::ctrl_c()),
                )
                .await
                .into_diagnostic()?;
        }
        Command::Resolve { code, message } => {
            let outcome = outcome::resolve(code, &message);
            match outcome.message {
                Some(text) => println!("{}: {}", outcome.status, text),
                None => println!("{}", outcome.status),
            }
        }
        Command::Simulate { script } => {
            let file = File::open(script).into_diagnostic()?;
            let script = SimulationScript::from_reader(file).into_diagnostic()?;

            let mut writer = SnapshotWriter::new(io::stdout().lock());
            script
                .run(|snapshot| writer.write_snapshot(snapshot))
                .await
                .into_diagnostic()?;
        }
    }

    Ok(())
}

/// Resolves when `signal` fires. Never resolves if the signal handler cannot be
/// installed.
async fn abandon_on(signal: impl Future<Output = io::Result<()>>) {
    if let Err(e) = signal.await {
        warn!(error = %e, "cannot listen for Ctrl-C, tracking until the payment settles");
        std::future::pending::<()>().await;
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_abandon_on_signal() {
        let fired = tokio::time::timeout(Duration::from_secs(1), abandon_on(async { Ok(()) }));
        assert!(fired.await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_signal_install_failure_keeps_session() {
        let broken = abandon_on(async { Err(io::Error::other("signal driver unavailable")) });
        let outcome = tokio::time::timeout(Duration::from_secs(3600), broken).await;
        assert!(outcome.is_err());
    }
}
