//! dealwire-tail: follow a dealwire realtime session from the terminal.
//!
//! Connects with the given credential, joins the requested topics and prints
//! every event as one JSON line on stdout. Logs go to stderr.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dealwire_core::{ClientEvent, ConnectionState, EnvironmentSignals, EventKind};
use dealwire_realtime::{RealtimeClient, RealtimeConfig};

#[derive(Parser)]
#[command(name = "dealwire-tail")]
#[command(author, version, about = "Follow dealwire realtime events")]
struct Cli {
    /// Notification server endpoint (default: DEALWIRE_WS_URL)
    #[arg(short, long)]
    url: Option<String>,

    /// Bearer credential (default: DEALWIRE_TOKEN)
    #[arg(short, long)]
    token: Option<String>,

    /// Organization the session is scoped to
    #[arg(short, long)]
    org: String,

    /// Topics to join (can specify multiple)
    #[arg(long = "topic", num_args = 1..)]
    topics: Vec<String>,

    /// Only print these event kinds, e.g. notification,pipeline_changed
    #[arg(long, value_delimiter = ',')]
    only: Vec<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "dealwire_realtime=info,dealwire_core=warn".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn selected_kinds(only: &[String]) -> anyhow::Result<Vec<EventKind>> {
    if only.is_empty() {
        return Ok(EventKind::ALL.to_vec());
    }
    only.iter()
        .map(|name| {
            EventKind::ALL
                .iter()
                .copied()
                .find(|kind| kind.as_str() == name.trim())
                .with_context(|| format!("unknown event kind: {}", name))
        })
        .collect()
}

fn print_event(event: &ClientEvent) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{}", line),
        Err(e) => error!(error = %e, "Failed to encode event"),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = RealtimeConfig::from_env();
    if let Some(url) = cli.url {
        config = config.with_url(url);
    }

    let token = match cli.token {
        Some(token) => token,
        None => std::env::var("DEALWIRE_TOKEN")
            .context("no credential: pass --token or set DEALWIRE_TOKEN")?,
    };
    let kinds = selected_kinds(&cli.only)?;

    info!(url = %config.url, topics = cli.topics.len(), "Starting dealwire-tail");

    let client = RealtimeClient::new(config, EnvironmentSignals::default());
    for kind in kinds {
        client.on(kind, print_event);
    }

    let mut state = client.watch_state();
    client.connect(token, cli.org).await?;
    for topic in cli.topics {
        client.join(topic).await?;
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, disconnecting");
                break;
            }
            changed = state.changed() => {
                changed.context("connection task stopped")?;
                if *state.borrow_and_update() == ConnectionState::Disconnected {
                    client.dispose().await;
                    anyhow::bail!("gave up reconnecting to the notification server");
                }
            }
        }
    }

    client.dispose().await;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "dealwire-tail failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
