use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use vaultgate_core::{AccessLink, BatchId, LinkTarget, Location, LogicalId, SubjectId};
use vaultgate_gateway::Vaultgate;
use vaultgate_server::config::ServerConfig;
use vaultgate_server::engine;
use vaultgate_server::error::ServerError;
use vaultgate_server::state_factory::create_state;

/// Vaultgate access-gated content distribution daemon.
#[derive(Parser, Debug)]
#[command(name = "vaultgate-server", about = "Access-gated content distribution for Telegram")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "vaultgate.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the background processor until interrupted (default).
    Run,
    /// Import a message into the storage chat and print its link.
    Store {
        /// Chat the message currently lives in.
        chat: String,
        /// Message id within that chat.
        message: i64,
        /// Append to an existing batch instead of storing a single item.
        #[arg(long)]
        batch: Option<String>,
        /// Open a new batch and store the message as its first member.
        #[arg(long, conflicts_with = "batch")]
        new_batch: bool,
    },
    /// Send a message to every registered, unbanned recipient.
    Broadcast {
        chat: String,
        message: i64,
    },
    /// Mint a token for a subject, optionally embedded in a link.
    IssueToken {
        subject: String,
        /// Logical id of the content the link should open.
        #[arg(long)]
        content: Option<String>,
        /// Batch the link should open.
        #[arg(long, conflicts_with = "content")]
        batch: Option<String>,
    },
    /// Print recipient, content and deletion counts as JSON.
    Stats,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = ServerConfig::load(&cli.config)?;
    vaultgate_server::telemetry::init(&config.telemetry);

    if !cli.config.exists() {
        info!(path = %cli.config.display(), "config file not found, using defaults");
    }

    let store = create_state(&config.state)?;
    info!(backend = %config.state.backend, "state store initialized");
    let gateway = engine::create_gateway(&config.telegram)?;
    let vaultgate = engine::create_vaultgate(&config, store, gateway)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&config, &vaultgate).await?,
        Commands::Store {
            chat,
            message,
            batch,
            new_batch,
        } => {
            let operator = engine::operator(&config)?;
            let batch = match (batch, new_batch) {
                (Some(id), _) => Some(BatchId::new(id)),
                (None, true) => Some(vaultgate.open_batch(&operator)?),
                (None, false) => None,
            };
            let stored = vaultgate
                .store_content(&operator, &Location::new(chat, message), batch.as_ref())
                .await?;
            if let Some(batch) = &batch {
                println!("batch: {batch}");
                println!("batch link: {}", render(&vaultgate, &AccessLink::batch(batch.clone())));
            }
            println!("logical id: {}", stored.reference.logical_id);
            println!("link: {}", render(&vaultgate, &stored.link));
        }
        Commands::Broadcast { chat, message } => {
            let operator = engine::operator(&config)?;
            broadcast(&vaultgate, &operator, Location::new(chat, message)).await?;
        }
        Commands::IssueToken {
            subject,
            content,
            batch,
        } => {
            let subject = SubjectId::new(subject);
            let target = match (content, batch) {
                (Some(id), _) => Some(LinkTarget::Content(LogicalId::new(id))),
                (None, Some(id)) => Some(LinkTarget::Batch(BatchId::new(id))),
                (None, None) => None,
            };
            match target {
                Some(target) => {
                    let link = vaultgate.issue_link(&subject, target).await?;
                    println!("{}", render(&vaultgate, &link));
                }
                None => {
                    let token = vaultgate.issue_token(&subject).await?;
                    println!("token: {}", token.secret);
                    println!("expires at: {}", token.expires_at.to_rfc3339());
                }
            }
        }
        Commands::Stats => {
            let stats = vaultgate.stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}

/// A shareable URL when a bot username is configured, the raw payload
/// otherwise.
fn render(vaultgate: &Vaultgate, link: &AccessLink) -> String {
    vaultgate
        .link_url(link)
        .unwrap_or_else(|| link.to_payload())
}

async fn run(config: &ServerConfig, vaultgate: &Vaultgate) -> Result<(), ServerError> {
    if let Err(e) = vaultgate.gateway().health_check().await {
        error!(error = %e, gateway = vaultgate.gateway().name(), "platform health check failed");
        return Err(ServerError::Gateway(e.into()));
    }

    let (mut processor, shutdown_tx) =
        vaultgate.background(engine::background_config(&config.background))?;
    let task = tokio::spawn(async move {
        processor.run().await;
    });
    info!(namespace = %config.namespace, "vaultgate running");

    shutdown_signal().await;

    if shutdown_tx.send(()).await.is_err() {
        warn!("background processor already stopped");
    }
    if let Err(e) = task.await {
        error!(error = %e, "background processor task failed");
    }
    info!("vaultgate stopped");
    Ok(())
}

async fn broadcast(
    vaultgate: &Vaultgate,
    operator: &SubjectId,
    source: Location,
) -> Result<(), ServerError> {
    let handle = vaultgate.start_broadcast(operator, source).await?;
    let cancel = handle.cancellation_token();
    let mut progress = handle.progress();

    let watcher = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let p = progress.borrow_and_update().clone();
            info!(
                wave = p.waves_completed,
                of = p.waves_total,
                succeeded = p.succeeded,
                permanent = p.permanent_failures,
                exhausted = p.exhausted,
                "broadcast progress"
            );
            if p.finished {
                break;
            }
        }
    });
    let interrupt = tokio::spawn(async move {
        shutdown_signal().await;
        warn!("interrupt received, finishing the current wave");
        cancel.cancel();
    });

    let result = handle.join().await;
    interrupt.abort();
    let _ = watcher.await;

    let summary = result.map_err(vaultgate_gateway::GatewayError::from)?;
    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{json}"),
        Err(e) => warn!(error = %e, "failed to render broadcast summary"),
    }
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
