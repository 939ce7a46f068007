use anyhow::{Context, Result};
use clap::Parser;
use newar_bot_manager::{
    create_router, AppState, BotCoordinator, Config, DockerOrchestrator, FfmpegConcatenator,
    Finalizer, InMemoryRepository, NatsStatusChannel,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bot-manager", about = "Spawns recording bots and finalizes their recordings")]
struct Args {
    /// Configuration file (extension optional)
    #[arg(short, long, default_value = "config/bot-manager")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.service.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!("Storage root: {}", cfg.storage.root.display());

    let channel = Arc::new(
        NatsStatusChannel::connect(&cfg.nats.url, &cfg.nats.status_subject_prefix)
            .await
            .context("Failed to connect status channel")?,
    );

    // Sessions live only in memory, so a restart forgets every bot started
    // before it and reconcile has nothing to re-attach
    let repository = Arc::new(InMemoryRepository::new());
    warn!("Using the in-memory session store: sessions are lost on restart");
    let orchestrator = Arc::new(DockerOrchestrator::new(cfg.docker_settings()));
    let finalizer = Arc::new(
        Finalizer::new(
            cfg.storage_layout(),
            Arc::new(FfmpegConcatenator::new(&cfg.finalizer.ffmpeg_binary)),
        )
        .with_cleanup_delay(cfg.cleanup_delay()),
    );

    let coordinator = Arc::new(BotCoordinator::new(
        repository.clone(),
        repository,
        orchestrator,
        channel,
        finalizer,
        cfg.coordinator_settings(),
    ));

    let reattached = coordinator.reconcile().await?;
    info!("Re-attached {} status listeners", reattached);

    let app = create_router(AppState::new(coordinator.clone()));
    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    coordinator.shutdown().await;
    info!("Bot manager stopped");
    Ok(())
}
