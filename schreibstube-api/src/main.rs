use schreibstube_api::{
    config::{ConfigError, Env},
    media::MediaStore,
    server::{self, AuthConfig, ServerState},
};
use schreibstube_common::{
    cache::PageCache,
    clock::{Clock, SystemClock},
};
use schreibstube_db::{MemoryRepository, PgRepository, Repository};
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Error)]
enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Error connecting to the database: {0}")]
    DatabaseConnect(sqlx::Error),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "schreibstube_api=debug,\
                schreibstube_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=warn"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn connect_repository(env: &Env) -> Result<Arc<dyn Repository>, InitError> {
    let Some(database_url) = &env.database_url else {
        warn!("DATABASE_URL is not set, keeping all data in memory");
        return Ok(Arc::new(MemoryRepository::new()));
    };

    let pool = PgPoolOptions::new()
        .max_connections(env.database_max_connections)
        .connect(database_url)
        .await
        .map_err(InitError::DatabaseConnect)?;
    info!(
        max_connections = env.database_max_connections,
        "Connected to PostgreSQL"
    );

    Ok(Arc::new(PgRepository::new(pool)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = Env::load()?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = ServerState {
        repository: connect_repository(&env).await?,
        index_cache: Arc::new(PageCache::with_clock(env.index_cache_ttl(), clock.clone())),
        media: Arc::new(MediaStore::new(env.media_root.clone())),
        auth: Arc::new(AuthConfig {
            token_lifetime: env.access_token_lifetime(),
            clock,
        }),
    };

    let tracing_layer = TraceLayer::new_for_http();
    let app = server::routes().layer(tracing_layer).with_state(state);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}
