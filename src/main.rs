use std::{net::SocketAddr, sync::Arc};

use tokio::signal;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use fulfillment_engine as engine;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = engine::config::load_config()?;
    engine::config::init_tracing(&cfg.log_level, cfg.log_json);

    let db_pool = engine::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        engine::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    let db = Arc::new(db_pool);

    let (event_sender, event_rx) = engine::events::channel(1024);
    tokio::spawn(engine::events::process_events(event_rx));
    let event_sender = Arc::new(event_sender);

    let services = engine::services::AppServices::build(db.clone(), Some(event_sender), &cfg);

    // Recurring finalization of delivered, unreturned packages.
    engine::jobs::auto_confirm::start(
        db.clone(),
        services.sales.clone(),
        cfg.confirm_grace_days,
        cfg.auto_confirm_interval_secs,
    );

    let state = engine::AppState {
        db,
        config: cfg.clone(),
        services,
    };

    let app = engine::handlers::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port).parse()?;
    info!(addr = %addr, "Fulfillment engine listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to install shutdown signal handler: {}", e);
        return;
    }
    info!("Shutdown signal received");
}
