mod cache;
mod enricher;
mod feed;
mod http;
mod importer;
mod invoice;
mod llm;
mod metrics;
mod models;
mod security;
mod supabase;
mod tagger;

use axum::{
    Json, Router,
    extract::{Extension, Path, State},
    http::StatusCode,
    middleware,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use importer::{BulkImporter, ImportError, ImportErrorKind};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use models::{ApiError, BulkImportRequest, BulkImportResponse};
use security::{AuthContext, AuthState, require_admin_auth};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use supabase::SupabaseClient;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(target = "jomion.api", "server crashed: {err}");
    }
}

async fn run() -> eyre::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let auth_state = AuthState::from_env();
    let cache = cache::CacheStore::from_env();
    let importer = BulkImporter::from_env(cache.clone());
    let supabase = SupabaseClient::from_env();
    if supabase.is_none() {
        warn!(
            target = "jomion.api",
            "SUPABASE_URL not configured; catalog runs offline"
        );
    }
    let llm = Arc::new(llm::LlmClient::new(llm::LlmConfig::from_env()));
    let openapi_raw = include_str!("../docs/openapi.yaml");
    let openapi: serde_json::Value =
        serde_yaml::from_str(openapi_raw).unwrap_or(json!({"openapi":"3.0.3"}));
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|err| eyre::eyre!("prometheus recorder: {err}"))?;

    let state = AppState {
        importer,
        supabase,
        cache,
        llm,
        openapi: Arc::new(openapi),
        prometheus_handle,
    };

    let cors = CorsLayer::new()
        .allow_headers(Any)
        .allow_methods(Any)
        .allow_origin(Any);

    let protected = Router::new()
        .route("/api/products/import/bulk", post(import_bulk))
        .route_layer(middleware::from_fn_with_state(
            auth_state,
            require_admin_auth,
        ));

    let app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/openapi.json", get(openapi_json))
        .route("/docs", get(swagger_ui))
        .route("/api/orders/{id}/invoice", get(order_invoice))
        .route("/api/support/chat", post(support_chat))
        .merge(protected)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::extract::DefaultBodyLimit::max(body_limit_from_env()));

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8000);
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!(target = "jomion.api", "listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

#[derive(Clone)]
struct AppState {
    importer: BulkImporter,
    supabase: Option<SupabaseClient>,
    cache: cache::CacheStore,
    llm: Arc<llm::LlmClient>,
    openapi: Arc<serde_json::Value>,
    prometheus_handle: PrometheusHandle,
}

/// Health and readiness check.
///
/// - Method: `GET`
/// - Path: `/health`
/// - Auth: none
async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "jomionstore-api",
    }))
}

async fn openapi_json(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    if let Ok(key) = std::env::var("OPENAPI_KEY") {
        let presented = headers
            .get("X-Docs-Key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if presented != key {
            return Err(AppError::BadRequest("docs", "unauthorized".into()));
        }
    }
    Ok(Json((*state.openapi).clone()))
}

async fn swagger_ui() -> axum::http::Response<String> {
    let html = r#"<!doctype html>
<html>
<head>
  <meta charset='utf-8'/>
  <title>JomionStore API Docs</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css" />
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    window.onload = () => {
      window.ui = SwaggerUIBundle({ url: '/openapi.json', dom_id: '#swagger-ui' });
    };
  </script>
</body>
</html>"#;
    axum::http::Response::builder()
        .header("Content-Type", "text/html; charset=utf-8")
        .body(html.to_string())
        .unwrap()
}

fn body_limit_from_env() -> usize {
    std::env::var("REQUEST_MAX_BYTES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(256 * 1024)
}

async fn metrics_endpoint(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> axum::http::Response<String> {
    if let Ok(secret) = std::env::var("METRICS_KEY") {
        let presented = headers
            .get("X-Metrics-Key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if presented != secret {
            return axum::http::Response::builder()
                .status(StatusCode::UNAUTHORIZED)
                .body("unauthorized".into())
                .unwrap();
        }
    }
    let body = state.prometheus_handle.render();
    axum::http::Response::builder()
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(body)
        .unwrap()
}

/// Pull a feed page and import it into the catalog.
///
/// - Method: `POST`
/// - Path: `/api/products/import/bulk`
/// - Auth: `Authorization: Bearer <key>` or `X-Admin-Key: <key>`
/// - Body: `BulkImportRequest`
/// - Response: HTTP 200 with per-item outcomes; 400 only for a bad
///   `feed_type`.
async fn import_bulk(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    headers: axum::http::HeaderMap,
    Json(payload): Json<BulkImportRequest>,
) -> Result<Json<BulkImportResponse>, AppError> {
    crate::metrics::inc_requests("/api/products/import/bulk");
    info!(
        target = "jomion.api",
        admin = %context.admin_id,
        api_key = %context.api_key_id,
        feed = %payload.feed_type,
        "bulk import invoked",
    );

    if let Some(key) = headers
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
    {
        let cache_key = cache::idempotency_cache_key(&key);
        if let Some(existing) = state.cache.get::<BulkImportResponse>(&cache_key).await {
            return Ok(Json(existing));
        }
        let response = run_import(&state, &payload).await?;
        state
            .cache
            .set(&cache_key, &response, cache::idempotency_ttl())
            .await;
        return Ok(Json(response));
    }

    let response = run_import(&state, &payload).await?;
    Ok(Json(response))
}

async fn run_import(
    state: &AppState,
    payload: &BulkImportRequest,
) -> Result<BulkImportResponse, AppError> {
    let results = state.importer.run(payload).await?;
    let message = if results.total_found == 0 {
        "No products found for this feed".to_string()
    } else {
        format!(
            "Imported {} of {} products",
            results.imported, results.total_found
        )
    };
    Ok(BulkImportResponse {
        success: true,
        message,
        results,
    })
}

/// Render an order's invoice as printable HTML.
///
/// - Method: `GET`
/// - Path: `/api/orders/{id}/invoice`
/// - Auth: none
/// - Response: HTML, or 404 `{"error":"Order not found"}`
async fn order_invoice(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Html<String>, AppError> {
    crate::metrics::inc_requests("/api/orders/invoice");
    let Some(supabase) = &state.supabase else {
        return Err(AppError::OrderNotFound);
    };
    match supabase.fetch_order(&id).await {
        Ok(Some(order)) => Ok(Html(invoice::render_invoice_html(&order))),
        Ok(None) => Err(AppError::OrderNotFound),
        Err(err) => Err(AppError::Internal("invoice", err.to_string())),
    }
}

const SUPPORT_SYSTEM_PROMPT: &str = "Tu es l'assistant du service client JomionStore, \
une boutique en ligne au Bénin. Réponds en français, brièvement et poliment. \
Les paiements se font par mobile money et la livraison couvre Cotonou et environs.";

const SUPPORT_FALLBACK_REPLY: &str = "Merci pour votre message ! Notre équipe support \
vous répondra très rapidement. Vous pouvez aussi nous écrire sur WhatsApp.";

#[derive(Debug, Deserialize)]
struct SupportChatRequest {
    message: String,
    #[serde(default)]
    history: Vec<llm::ChatMessage>,
}

#[derive(Debug, Serialize)]
struct SupportChatResponse {
    reply: String,
    used_fallback: bool,
}

/// Relay one support-widget message to the chat gateway. Gateway failures
/// degrade to a canned reply; the widget always gets an answer.
async fn support_chat(
    State(state): State<AppState>,
    Json(payload): Json<SupportChatRequest>,
) -> Result<Json<SupportChatResponse>, AppError> {
    crate::metrics::inc_requests("/api/support/chat");
    if payload.message.trim().is_empty() {
        return Err(AppError::BadRequest("support", "empty message".into()));
    }

    let mut messages = vec![llm::ChatMessage {
        role: "system".into(),
        content: SUPPORT_SYSTEM_PROMPT.into(),
    }];
    messages.extend(payload.history);
    messages.push(llm::ChatMessage {
        role: "user".into(),
        content: payload.message,
    });

    match state.llm.chat(&messages).await {
        Ok(response) => Ok(Json(SupportChatResponse {
            reply: response.text,
            used_fallback: false,
        })),
        Err(err) => {
            warn!(target = "jomion.llm", error = %err, "support_chat_fallback");
            Ok(Json(SupportChatResponse {
                reply: SUPPORT_FALLBACK_REPLY.to_string(),
                used_fallback: true,
            }))
        }
    }
}

#[derive(Debug)]
enum AppError {
    Import(ImportError),
    BadRequest(&'static str, String),
    OrderNotFound,
    Internal(&'static str, String),
}

impl From<ImportError> for AppError {
    fn from(value: ImportError) -> Self {
        Self::Import(value)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Import(err) => {
                let status = match err.kind() {
                    ImportErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                    ImportErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let payload = ApiError {
                    error: err.stage().to_string(),
                    detail: Some(err.detail().to_string()),
                };
                (status, Json(payload)).into_response()
            }
            AppError::BadRequest(scope, detail) => {
                let payload = ApiError {
                    error: scope.to_string(),
                    detail: Some(detail),
                };
                (StatusCode::BAD_REQUEST, Json(payload)).into_response()
            }
            AppError::OrderNotFound => {
                let payload = ApiError {
                    error: "Order not found".to_string(),
                    detail: None,
                };
                (StatusCode::NOT_FOUND, Json(payload)).into_response()
            }
            AppError::Internal(scope, detail) => {
                error!(target = "jomion.api", scope = scope, detail = %detail, "request failed");
                let payload = ApiError {
                    error: scope.to_string(),
                    detail: Some("internal error".to_string()),
                };
                (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
            }
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let _ = fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn unknown_order_maps_to_404_with_exact_body() {
        let response = AppError::OrderNotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = to_bytes(response.into_body(), 1024).await.expect("body");
        assert_eq!(&bytes[..], br#"{"error":"Order not found"}"#);
    }

    #[tokio::test]
    async fn invalid_feed_type_maps_to_400() {
        let err = ImportError::invalid_input("feed", "invalid feed_type `flash-deal`");
        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn upstream_failure_maps_to_500() {
        let err = ImportError::internal("feed_fetch", "HTTP 503");
        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
