//! texter - floating text labels for a multi-world host
//!
//! Headless host console: reads label commands from stdin and streams the
//! resulting frames into per-session outboxes.

mod commands;
mod config;

use anyhow::{Context, Result};
use clap::Parser;
use commands::LabelCommand;
use config::ServerConfig;
use std::{collections::BTreeMap, path::PathBuf, sync::Arc};
use texter_core::{ProcessEntityCounter, SessionId};
use texter_net::{
    compute_schema_hash, decode_server_message, Outbox, OutboxTransport, ServerMessage,
    PROTOCOL_VERSION,
};
use texter_server::{LabelBook, Synchronizer, WorldSessions};
use texter_store::FileStore;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Floating text label host", long_about = None)]
struct Args {
    /// Configuration file (TOML)
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Label file location; overrides `store_path`
    #[arg(long)]
    store: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset; overrides `log_filter`
    #[arg(long)]
    log: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // The real subscriber depends on the config, so loading gets a temporary one.
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("warn"))
        .finish();
    let mut cfg =
        tracing::subscriber::with_default(bootstrap, || ServerConfig::load_from_path(&args.config));

    let fallback = args.log.as_deref().unwrap_or(&cfg.log_filter);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback)),
        )
        .init();

    info!("Starting texter v{}", env!("CARGO_PKG_VERSION"));
    info!(
        protocol = PROTOCOL_VERSION,
        schema_hash = %format!("{:016x}", compute_schema_hash()),
        "Wire protocol"
    );

    if let Some(store) = args.store {
        cfg.store_path = store;
    }
    let policy = cfg.sync_policy()?;

    let mut sessions = WorldSessions::new();
    for name in &cfg.worlds {
        sessions.load_world(name);
    }
    let default_world = sessions.load_world(&cfg.default_world);

    let store = FileStore::open(&cfg.store_path)
        .with_context(|| format!("Failed to open label store {}", cfg.store_path.display()))?;
    let transport = Arc::new(OutboxTransport::new());
    let sync = Synchronizer::new(
        store,
        sessions,
        Arc::clone(&transport),
        Arc::new(ProcessEntityCounter),
    )
    .with_policy(policy);

    let mut book = LabelBook::new(sync);
    let restored = book.restore().context("Failed to restore labels")?;
    info!(
        restored,
        store = %cfg.store_path.display(),
        default_world = %default_world,
        "Label host ready; type `help` for commands"
    );

    let mut drains: BTreeMap<SessionId, JoinHandle<()>> = BTreeMap::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let cmd = match commands::parse_command(&line) {
            Ok(cmd) => cmd,
            Err(err) => {
                println!("Error: {err}");
                continue;
            }
        };

        // Catch-up frames go out during `join`, so the outbox has to exist first.
        let joining = match &cmd {
            LabelCommand::Join { session, .. } => Some(*session),
            _ => None,
        };
        if let Some(session) = joining {
            drains
                .entry(session)
                .or_insert_with(|| tokio::spawn(drain_outbox(session, transport.open(session))));
        }
        let leaving = match &cmd {
            LabelCommand::Leave { session } => Some(*session),
            _ => None,
        };

        let out = commands::execute_command(&mut book, &default_world, cmd);
        for line in out.lines {
            println!("{line}");
        }

        let disconnected = leaving.or_else(|| {
            joining.filter(|session| book.sync().observers().world_of(*session).is_none())
        });
        if let Some(session) = disconnected {
            transport.close(session);
            if let Some(handle) = drains.remove(&session) {
                if let Err(err) = handle.await {
                    warn!(%session, "Outbox task failed: {err}");
                }
            }
        }
    }

    info!(sessions = drains.len(), labels = book.len(), "Console closed; shutting down");
    for (session, handle) in drains {
        transport.close(session);
        if let Err(err) = handle.await {
            warn!(%session, "Outbox task failed: {err}");
        }
    }
    Ok(())
}

/// Decode and log every frame queued for `session` until its outbox closes.
async fn drain_outbox(session: SessionId, mut outbox: Outbox) {
    while let Some(frame) = outbox.recv().await {
        match decode_server_message(&frame) {
            Ok(ServerMessage::AddEntity(add)) => info!(
                %session,
                eid = add.eid,
                x = add.x,
                y = add.y,
                z = add.z,
                nametag = ?add.nametag(),
                bytes = frame.len(),
                "ADD"
            ),
            Ok(ServerMessage::RemoveEntity(remove)) => {
                info!(%session, eid = remove.eid, bytes = frame.len(), "REMOVE")
            }
            Err(err) => warn!(%session, "Undecodable frame: {err:#}"),
        }
    }
    debug!(%session, "Outbox closed");
}
