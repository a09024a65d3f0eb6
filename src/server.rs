use crate::config::Config;
use crate::engine::AnalysisEngine;
use crate::error::AnalysisError;
use crate::history::{FileSenderHistory, InMemorySenderHistory, SenderHistory};
use actix_web::{middleware, web, App, HttpResponse, HttpServer, Responder};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

struct AppState {
    engine: AnalysisEngine,
    max_message_bytes: usize,
}

#[derive(Deserialize)]
struct AnalyzeQuery {
    filename: String,
}

async fn index() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "message": "mailtriage API is running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "service": "Email Analysis API",
    }))
}

fn client_error(status: actix_web::http::StatusCode, message: &str) -> HttpResponse {
    HttpResponse::build(status).json(json!({
        "error": message,
        "status": "error",
    }))
}

/// Upload one raw `.eml` message and receive the verdict. The message is
/// analyzed entirely in memory; nothing of its content is stored.
async fn analyze(
    state: web::Data<AppState>,
    query: web::Query<AnalyzeQuery>,
    body: web::Bytes,
) -> impl Responder {
    if !query.filename.to_lowercase().ends_with(".eml") {
        return client_error(
            actix_web::http::StatusCode::BAD_REQUEST,
            "Only .eml files supported",
        );
    }

    if body.len() > state.max_message_bytes {
        log::warn!(
            "rejected oversized upload: {} bytes (limit {})",
            body.len(),
            state.max_message_bytes
        );
        let err = AnalysisError::InputTooLarge {
            limit: state.max_message_bytes,
        };
        return client_error(actix_web::http::StatusCode::PAYLOAD_TOO_LARGE, &err.to_string());
    }

    log::info!("analyzing upload: {}", query.filename);
    let email = match crate::normalizer::parse_message(&body) {
        Ok(email) => email,
        Err(e) => {
            log::warn!("rejected unparseable upload {}: {e}", query.filename);
            return client_error(actix_web::http::StatusCode::BAD_REQUEST, &e.to_string());
        }
    };

    let report = state.engine.analyze(&email).await;
    HttpResponse::Ok().json(json!({
        "status": "success",
        "classification": report.classification,
        "phishing": report.phishing,
        "spam": report.spam,
        "recommendation": report.recommendation,
        "metadata": report.metadata,
    }))
}

fn open_store(config: &Config) -> Arc<dyn SenderHistory> {
    if config.sender_db.is_empty() {
        return Arc::new(InMemorySenderHistory::new());
    }
    match FileSenderHistory::open(&config.sender_db) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            // History degrades gracefully; analyses still run without it.
            log::warn!("sender history file unavailable ({e}), using in-memory table");
            Arc::new(InMemorySenderHistory::new())
        }
    }
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    let listen = config.listen.clone();
    let max_message_bytes = config.max_message_bytes;
    let store = open_store(&config);
    let engine = AnalysisEngine::new(&config, store)?;
    let state = web::Data::new(AppState {
        engine,
        max_message_bytes,
    });

    log::info!("starting analysis service on {listen}");
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            // Leave headroom above the limit so the size rejection below
            // produces the JSON error body instead of a transport error.
            .app_data(web::PayloadConfig::new(max_message_bytes + 4096))
            .wrap(middleware::Logger::default())
            .wrap(
                middleware::DefaultHeaders::new()
                    .add(("Access-Control-Allow-Origin", "*"))
                    .add(("Access-Control-Allow-Methods", "GET, POST, OPTIONS"))
                    .add(("Access-Control-Allow-Headers", "*")),
            )
            .route("/", web::get().to(index))
            .route("/api/health", web::get().to(health))
            .route("/api/analyze", web::post().to(analyze))
    })
    .workers(num_cpus::get())
    .bind(listen.as_str())?
    .run()
    .await?;
    Ok(())
}
