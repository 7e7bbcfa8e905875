/// Server setup and initialization
///
/// Wires together storage, the workflow registry, the handler registry, the
/// proposal source and the HTTP routes, and provides the application
/// factory plus the server entry point.

use crate::{
    api::{invoke::create_invoke_routes, workflows::create_workflow_routes, AppState},
    config::Config,
    llm::OpenAiProposalSource,
    providers::{
        mailer::{LogMailer, WebhookMailer},
        store::SqliteDocumentStore,
        token::JwtSigner,
        Mailer,
    },
    runtime::{ExecutionInterpreter, ToolHandlerRegistry, TracingSink},
    workflow::{WorkflowRegistry, WorkflowStorage},
};
use anyhow::Result;
use axum::{routing::get, Router};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Create the main Axum application with all routes wired
pub async fn create_app(config: Config) -> Result<Router> {
    tracing::info!("📁 Ensuring data directory exists: {}", config.database.data_dir);
    std::fs::create_dir_all(&config.database.data_dir)
        .map_err(|e| anyhow::anyhow!("failed to create data directory: {e}"))?;

    tracing::info!("📋 Initializing workflow storage");
    let workflow_pool = open_pool(&config.database.data_dir, "workflows.db").await?;
    let storage = WorkflowStorage::new(workflow_pool);
    storage.init_schema().await?;
    let registry = Arc::new(WorkflowRegistry::new(storage));

    tracing::info!("🗄️ Initializing document store");
    let document_pool = open_pool(&config.database.data_dir, "documents.db").await?;
    let store = Arc::new(SqliteDocumentStore::new(document_pool));

    let signer = Arc::new(JwtSigner::new(&config.auth.jwt_secret));
    let mailer: Arc<dyn Mailer> = if config.mail.webhook_url.is_empty() {
        Arc::new(LogMailer)
    } else {
        Arc::new(WebhookMailer::new(config.mail.webhook_url.clone()))
    };

    tracing::info!("⚙️ Initializing handler registry and interpreter");
    let handlers = ToolHandlerRegistry::with_builtins(store, signer, mailer);
    let interpreter = Arc::new(ExecutionInterpreter::new(handlers, Arc::new(TracingSink)));

    let proposals = Arc::new(OpenAiProposalSource::new(
        config.llm.base_url.clone(),
        config.llm.api_key.clone(),
        config.llm.model.clone(),
    ));

    let app_state = AppState {
        registry,
        proposals,
        interpreter,
    };

    tracing::info!("📡 Creating HTTP router");
    let app = Router::new()
        .route("/healthz", get(health_check))
        .merge(create_workflow_routes().with_state(app_state.clone()))
        .merge(create_invoke_routes().with_state(app_state));

    tracing::info!("✅ Application initialized successfully");
    Ok(app)
}

/// Start the HTTP server with the given configuration
pub async fn start_server(config: Config) -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting Apiloom server...");

    let app = create_app(config.clone()).await?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

async fn open_pool(data_dir: &str, file: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(format!("{data_dir}/{file}"))
        .create_if_missing(true);
    Ok(SqlitePool::connect_with(options).await?)
}

async fn health_check() -> &'static str {
    "ok"
}
