//! notecrypt storage server
//!
//! Usage:
//!   notecrypt-server serve --bind 127.0.0.1:5000 --database notecrypt.db
//!   notecrypt-server migrate recompute-markers
//!
//! Expects an authenticating proxy in front of it that sets `x-account-id`.

use anyhow::{Context, Result};
use clap::Parser;
use notecrypt_server::{
    backfill_stable_keys, build_router, mark_legacy_notes, recompute_encrypted_markers, AppState,
    Args, Command, Database, Migration, NoteStore, ProfileStore, ServeArgs,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&args.log_filter).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let db = Database::open(&args.database)
        .with_context(|| format!("failed to open database {}", args.database.display()))?;

    match args.command.unwrap_or(Command::Serve(ServeArgs::default())) {
        Command::Serve(serve_args) => serve(db, serve_args).await,
        Command::Migrate { migration } => migrate(db, migration),
    }
}

async fn serve(db: Database, args: ServeArgs) -> Result<()> {
    if args.allow_reset {
        warn!("profile reset endpoint is enabled");
    }
    let app = build_router(AppState::new(db, args.allow_reset));
    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    info!("notecrypt server listening on {}", args.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    info!("notecrypt server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

fn migrate(db: Database, migration: Migration) -> Result<()> {
    let notes = NoteStore::new(db.clone());
    let report = match migration {
        Migration::RecomputeMarkers => recompute_encrypted_markers(&notes)?,
        Migration::MarkLegacy => mark_legacy_notes(&notes)?,
        Migration::BackfillKeys => backfill_stable_keys(&ProfileStore::new(db), &notes)?,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
