use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{info, warn};

use stockroom_api::{
    app_router,
    config::{init_tracing, load_config},
    db,
    events::{self, EventSender},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;
    init_tracing(config.log_level(), config.log_json);

    info!(
        environment = %config.environment,
        "starting stockroom-api {}",
        env!("CARGO_PKG_VERSION")
    );

    let pool = db::establish_connection_from_app_config(&config)
        .await
        .context("failed to connect to database")?;
    if config.auto_migrate {
        db::run_migrations(&pool)
            .await
            .context("failed to run migrations")?;
    }

    let (tx, rx) = mpsc::channel(config.event_channel_capacity);
    let event_sender = EventSender::new(tx);
    let processor = tokio::spawn(events::process_events(rx));

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(Arc::new(pool.clone()), Arc::new(config), event_sender);
    let app = app_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    // The router (and with it every EventSender clone) is gone once serve
    // returns, so the processor drains its queue and exits.
    if tokio::time::timeout(Duration::from_secs(5), processor)
        .await
        .is_err()
    {
        warn!("event processor did not drain in time");
    }

    db::close_pool(pool).await?;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to install ctrl-c handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => warn!("failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
