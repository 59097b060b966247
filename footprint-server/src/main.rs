use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use footprint_core::{CommandEnumerator, PlatformTable};
use footprint_server::{
    infra::{app_state::AppState, config::Config},
    routes,
    search::job_store::PgJobBackend,
    EMBEDDED_PLATFORMS,
};

#[derive(Debug, Parser)]
#[command(name = "footprint-server", about = "Footprint account-discovery API")]
struct Args {
    /// Bind address, e.g. 127.0.0.1:8085
    #[arg(long)]
    bind: Option<std::net::SocketAddr>,

    /// PostgreSQL connection URL (overrides DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,tower_http=info")),
        )
        .init();

    let args = Args::parse();
    let mut config = Config::from_env(args.database_url)?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.max_db_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to PostgreSQL")?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run database migrations")?;

    let platforms = match &config.platform_table_path {
        Some(path) => PlatformTable::load_from_path(path)
            .with_context(|| format!("failed to load platform table from {}", path.display()))?,
        None => PlatformTable::from_json_str(EMBEDDED_PLATFORMS)
            .context("embedded platform table is invalid")?,
    };
    info!(platforms = platforms.len(), "platform table ready");

    let enumerator = Arc::new(CommandEnumerator::new(
        config.enumerator_program.clone(),
        config.enumerator_args.clone(),
    ));
    let backend = Arc::new(PgJobBackend::new(pool.clone(), enumerator));

    let bind_addr = config.bind_addr;
    let state = AppState::new(Arc::new(config), pool, backend, Arc::new(platforms));

    let app = routes::create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!(%bind_addr, "footprint server listening");

    axum::serve(listener, app)
        .await
        .context("server exited with error")?;

    Ok(())
}
