//! Fatura Extractor - energy bill extraction server.

mod calculation;
mod config;
mod detector;
mod error;
mod extractor;
#[cfg(test)]
mod fixtures;
mod hints;
mod llm;
mod number;
mod parser;
mod pdf;
mod prompt;
mod reconcile;
mod reply;
mod schema;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use config::{ClientProfile, LlmConfig, ProfileStore, ServerConfig};
use error::ExtractionError;
use extractor::{Detection, InvoiceExtractor, UploadedFile};
use llm::OpenAiClient;
use schema::BatchReport;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    profiles: ProfileStore,
    extractor: Arc<InvoiceExtractor>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fatura_extractor=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let server = ServerConfig::from_env();

    let profiles = ProfileStore::load_from_dir(&server.profiles_dir)?;
    info!("Loaded {} client profiles: {:?}", profiles.list().len(), profiles.list());

    let llm_config = LlmConfig::from_env()?;
    if llm_config.api_key.is_empty() {
        warn!("OPENAI_API_KEY is not set; bill processing will be rejected");
    }
    let client = OpenAiClient::new(llm_config)?;
    info!("LLM client initialized (model: {})", client.model());

    let state = AppState {
        profiles,
        extractor: Arc::new(InvoiceExtractor::new(Arc::new(client))),
    };

    // Build router
    let app = Router::new()
        .route("/health", get(health))
        .route("/clients", get(list_clients))
        .route("/clients/:name", get(get_client).put(put_client))
        .route("/detect", post(detect_provider))
        .route("/faturas", post(process_invoices))
        .layer(DefaultBodyLimit::max(50 * 1024 * 1024)) // 50MB
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Run server
    let listener = tokio::net::TcpListener::bind(&server.bind_addr).await?;
    info!("Server listening on http://{}", server.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// List client profile names.
async fn list_clients(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.profiles.list())
}

async fn get_client(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ClientProfile>, StatusCode> {
    state.profiles.get(&name).map(Json).ok_or(StatusCode::NOT_FOUND)
}

/// Create or replace a client profile in memory. The path name wins over the body.
async fn put_client(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(mut profile): Json<ClientProfile>,
) -> Json<ClientProfile> {
    profile.name = name;
    info!("Updated client profile: {}", profile.name);
    state.profiles.insert(profile.clone());
    Json(profile)
}

/// Detect the utility of an uploaded bill.
async fn detect_provider(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Detection>, (StatusCode, String)> {
    let upload = read_upload(multipart).await?;
    let file = upload
        .files
        .into_iter()
        .next()
        .ok_or((StatusCode::BAD_REQUEST, "No file uploaded".to_string()))?;

    let text = pdf::extract_text(&file.data).map_err(into_http_error)?;
    if text.is_empty() {
        return Err(into_http_error(ExtractionError::NoTextExtracted));
    }

    Ok(Json(state.extractor.detect(&text)))
}

#[derive(serde::Deserialize)]
struct InvoiceQuery {
    cliente: Option<String>,
}

/// Upload one or more bills and extract their invoice data.
async fn process_invoices(
    State(state): State<AppState>,
    Query(query): Query<InvoiceQuery>,
    multipart: Multipart,
) -> Result<Json<BatchReport>, (StatusCode, String)> {
    let profile = match query.cliente.as_deref() {
        Some(name) => state.profiles.get(name).ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                format!("Unknown client: {}. Available: {:?}", name, state.profiles.list()),
            )
        })?,
        None => state.profiles.default_profile(),
    };

    let upload = read_upload(multipart).await?;
    if upload.files.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "No file uploaded".to_string()));
    }

    info!(
        "Received {} files for client {}",
        upload.files.len(),
        profile.name
    );

    let report = state
        .extractor
        .process_batch(&upload.files, &profile, upload.instructions.as_deref())
        .await
        .map_err(|e| {
            error!("Batch rejected: {}", e);
            into_http_error(e)
        })?;

    Ok(Json(report))
}

// ============================================================================
// Helper functions
// ============================================================================

struct Upload {
    files: Vec<UploadedFile>,
    instructions: Option<String>,
}

/// Collect `file` / `invoice_files` parts and the optional `instrucoes` text.
async fn read_upload(mut multipart: Multipart) -> Result<Upload, (StatusCode, String)> {
    let mut files = Vec::new();
    let mut instructions = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Multipart error: {}", e)))?
    {
        match field.name() {
            Some("file") | Some("invoice_files") => {
                let file_name = field.file_name().unwrap_or("fatura.pdf").to_string();
                let data = field.bytes().await.map_err(|e| {
                    (StatusCode::BAD_REQUEST, format!("Failed to read file: {}", e))
                })?;
                info!("Received file: {} ({} bytes)", file_name, data.len());
                files.push(UploadedFile::new(file_name, data.to_vec()));
            }
            Some("instrucoes") => {
                let text = field.text().await.map_err(|e| {
                    (StatusCode::BAD_REQUEST, format!("Failed to read instructions: {}", e))
                })?;
                instructions = Some(text).filter(|t| !t.trim().is_empty());
            }
            _ => {}
        }
    }

    Ok(Upload {
        files,
        instructions,
    })
}

fn into_http_error(e: ExtractionError) -> (StatusCode, String) {
    let status = match &e {
        ExtractionError::MissingCredential => StatusCode::SERVICE_UNAVAILABLE,
        ExtractionError::Pdf { .. } | ExtractionError::NoTextExtracted => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ExtractionError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        ExtractionError::Network { .. }
        | ExtractionError::Api { .. }
        | ExtractionError::MalformedModelReply { .. } => StatusCode::BAD_GATEWAY,
    };
    (status, e.to_string())
}
