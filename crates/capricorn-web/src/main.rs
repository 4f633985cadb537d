//! Capricorn web server
//!
//! Run with: cargo run -p capricorn-web

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use capricorn_common::JournalImpactTable;
use capricorn_config::{Config, LlmProvider};
use capricorn_db::{load_journal_impact_table, Database, PgCorpusStore};
use capricorn_llm::{GeminiBackend, LlmBackend, OpenAiCompatibleBackend, TokioSleeper};
use capricorn_web::router::build_router;
use capricorn_web::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;
    init_tracing(&config);

    info!("Starting Capricorn...");

    let backend = build_backend(&config)?;
    info!(model = backend.model_id(), provider = ?config.llm.provider, "model backend ready");

    let db = Arc::new(
        Database::connect(&config.database.url)
            .await
            .context("connecting to Postgres")?,
    );
    db.ping().await.context("Postgres ping")?;
    if config.database.init_schema {
        db.initialize(&config.database.articles_table, &config.database.journal_table)
            .await
            .context("initialising schema")?;
    }

    // An empty table only disables the journal fallback; the server still runs.
    let journals = match load_journal_impact_table(&db, &config.database.journal_table).await {
        Ok(table) => table,
        Err(e) => {
            warn!(error = %e, table = %config.database.journal_table, "journal table unavailable; continuing without it");
            JournalImpactTable::default()
        }
    };
    info!(journals = journals.len(), "journal impact table loaded");

    let corpus = Arc::new(PgCorpusStore::new(
        db.clone(),
        backend.clone(),
        config.database.articles_table.clone(),
    ));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("parsing listen address")?;

    let state = AppState::new(backend, corpus, journals, Arc::new(TokioSleeper), config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shut down cleanly");
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_backend(config: &Config) -> anyhow::Result<Arc<dyn LlmBackend>> {
    let llm = &config.llm;
    let backend: Arc<dyn LlmBackend> = match llm.provider {
        LlmProvider::Gemini => {
            let Some(key) = llm.api_key() else {
                bail!("{} is not set; the Gemini backend needs an API key", llm.api_key_env);
            };
            let mut gemini = GeminiBackend::new(key, llm.model.clone())?
                .with_embedding_model(llm.embedding_model.clone())
                .with_timeout(llm.request_timeout())?;
            if let Some(url) = &llm.base_url {
                gemini = gemini.with_base_url(url.clone());
            }
            Arc::new(gemini)
        }
        LlmProvider::OpenaiCompatible => {
            let Some(url) = &llm.base_url else {
                bail!("llm.base_url is required for the openai_compatible provider");
            };
            let backend = OpenAiCompatibleBackend::new(url.clone(), llm.model.clone(), llm.api_key())?
                .with_embedding_model(llm.embedding_model.clone())
                .with_timeout(llm.request_timeout())?;
            Arc::new(backend)
        }
    };
    Ok(backend)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
