mod config;
mod db;
mod errors;
mod export;
mod models;
mod recommend;
mod routes;
mod state;
mod tracker;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{model_path_from_env, Config};
use crate::db::{create_pool, run_migrations};
use crate::recommend::feedback::PgFeedbackLog;
use crate::recommend::model::{load_or_bootstrap, save_artifact, Classifier, ModelHandle};
use crate::recommend::training::{bootstrap_model, retrain_from_feedback};
use crate::routes::build_router;
use crate::state::AppState;
use crate::tracker::store::PgTrackerStore;

#[derive(Parser)]
#[command(name = "placement-api")]
#[command(about = "Placement recommendation and round tracking service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API (default)
    Serve,
    /// Write the bootstrap match model if no artifact exists
    BootstrapModel {
        /// Replace an existing artifact
        #[arg(long)]
        force: bool,
        /// Artifact path; defaults to MODEL_PATH
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Retrain the match model from the feedback log and publish it
    Retrain,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve().await,
        Commands::BootstrapModel { force, path } => {
            init_tracing("info");
            let path = path.unwrap_or_else(model_path_from_env);
            if force {
                let model = bootstrap_model()?;
                save_artifact(&path, &model)?;
                info!("Bootstrap match model written to {}", path.display());
            } else {
                let model = load_or_bootstrap(&path)?;
                info!("Match model at {} is {}", path.display(), model.provenance().label());
            }
            Ok(())
        }
        Commands::Retrain => {
            let config = Config::from_env()?;
            init_tracing(&config.rust_log);
            let db = create_pool(&config.database_url, config.db_max_connections).await?;
            run_migrations(&db).await?;
            let provenance = retrain_from_feedback(&db, &config.model_path).await?;
            info!(
                "Retrained {} model published; POST /api/v1/admin/model/reload to serve it",
                provenance.label()
            );
            Ok(())
        }
    }
}

async fn serve() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config.rust_log);

    info!("Starting placement API v{}", env!("CARGO_PKG_VERSION"));

    let db = create_pool(&config.database_url, config.db_max_connections).await?;
    run_migrations(&db).await?;

    // A corrupt artifact is fatal; a missing one is replaced by the bootstrap model.
    let models = ModelHandle::load_or_bootstrap(config.model_path.clone())
        .with_context(|| format!("Failed to load match model from {}", config.model_path.display()))?;
    info!("Serving {} match model", models.provenance().label());

    let state = AppState {
        db: db.clone(),
        config: config.clone(),
        models: Arc::new(models),
        feedback: Arc::new(PgFeedbackLog::new(db.clone())),
        tracker: Arc::new(PgTrackerStore::new(db)),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the portal domain is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), level))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
