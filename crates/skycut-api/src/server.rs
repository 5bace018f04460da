use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use skycut_core::callbacks::JobCallbackHandler;
use skycut_core::cutout::{CutoutParameters, CutoutPolicy};
use skycut_core::db::{create_pool, Migrator};
use skycut_core::queue::{run_event_consumer, Dispatcher, RedisWorkQueue};
use skycut_core::signing::HmacUrlSigner;
use skycut_core::storage::{PgFrontendStore, PgWorkerStore};
use skycut_core::{Config, JobService, Result};

use crate::state::AppState;

/// Run the API server until it is shut down.
pub async fn run(config: Config) -> Result<()> {
    let addr = SocketAddr::from((
        config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .map_err(|e| skycut_core::Error::Config(format!("Invalid host: {}", e)))?,
        config.server.port,
    ));

    let pool = create_pool(&config.database).await?;
    Migrator::new(pool.clone()).initialize().await?;

    // Frontend wiring: store, queue client, policy, service.
    let queue = Arc::new(RedisWorkQueue::connect(&config.queue.url).await?);
    let dispatcher = Dispatcher::new(queue, config.queue.actor.clone());
    let policy = Arc::new(CutoutPolicy::new(dispatcher));
    let store = Arc::new(PgFrontendStore::<CutoutParameters>::new(pool.clone()));
    let signer = Arc::new(HmacUrlSigner::new(&config.signing));
    let job_service = Arc::new(JobService::new(
        config.uws.clone(),
        policy,
        store,
        signer,
    ));

    // Worker events flow back through a sidecar consumer into the
    // worker-side store.
    let handler = JobCallbackHandler::new(Arc::new(PgWorkerStore::new(pool)));
    let queue_url = config.queue.url.clone();
    let actor = config.queue.actor.clone();
    tokio::spawn(async move {
        if let Err(e) = run_event_consumer(&queue_url, &actor, handler).await {
            error!(error = %e, "Worker event consumer exited");
        }
    });

    let app = build_router(AppState::new(job_service));

    info!("Skycut API server listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| skycut_core::Error::Other(format!("Cannot bind {}: {}", addr, e)))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| skycut_core::Error::Other(format!("Server error: {}", e)))?;

    Ok(())
}

/// Build the router with its middleware stack.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_origin(Any);

    crate::routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
