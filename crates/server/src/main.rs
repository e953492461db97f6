use std::net::SocketAddr;

use kitboard_server::{app, config, db, routes::auth::hash_password, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kitboard_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::from_env();

    // Initialize database
    let db = db::Database::connect(&config.database_url).await?;
    db.run_migrations().await?;

    let purged = db.purge_orphaned_phase_states().await?;
    if purged > 0 {
        tracing::warn!(purged, "Removed phase state rows for deleted clients");
    }

    if let Some(admin) = &config.bootstrap_admin {
        let password_hash = hash_password(&admin.password)
            .map_err(|err| anyhow::anyhow!("hashing bootstrap admin password: {err}"))?;
        if db.ensure_admin(&admin.email, &admin.name, &password_hash).await? {
            tracing::info!(email = %admin.email, "Created bootstrap admin");
        }
    }

    let state = AppState {
        db,
        config: config.clone(),
    };

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
