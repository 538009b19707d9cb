//! HTTP endpoint for scraping one item on request.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Liveness check |
//! | `GET`/`POST` | `/api/scrape/:item_key` | Scrape and price one item |
//! | `POST` | `/api/scrape` | Same, with `{"item_key": "..."}` as the body |
//!
//! A scrape runs synchronously within the request. Failures answer with
//! `{"success": false, "item_key": ..., "error": ...}`:
//!
//! - 400 when no item key was given
//! - 404 for an unknown key or an unresolvable product
//! - 409 while another cycle holds the item
//! - 500 otherwise

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::sync::{CycleError, CycleReport, ItemScraper};

/// Shared state of the route handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    scraper: ItemScraper,
}

impl AppState {
    /// Wraps the scraper used by every request.
    #[must_use]
    pub fn new(scraper: ItemScraper) -> Self {
        Self { scraper }
    }
}

/// Builds the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route(
            "/api/scrape/:item_key",
            get(handle_scrape_path).post(handle_scrape_path),
        )
        .route("/api/scrape", axum::routing::post(handle_scrape_body))
        .with_state(state)
}

/// Serves the router on `bind` until Ctrl-C.
///
/// # Errors
///
/// Fails if the address cannot be bound or the server stops abnormally.
pub async fn serve(scraper: ItemScraper, bind: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    info!(bind, "scrape endpoint listening");

    axum::serve(listener, router(AppState::new(scraper)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server stopped unexpectedly")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

// ==== Response bodies ====

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ScrapeStats {
    total_sales: usize,
    pop_grades: usize,
    sales_saved: u64,
}

#[derive(Debug, Serialize)]
struct ScrapeResponse {
    success: bool,
    item_key: String,
    item_id: i64,
    item_name: String,
    stats: ScrapeStats,
    source_url: String,
}

impl From<CycleReport> for ScrapeResponse {
    fn from(report: CycleReport) -> Self {
        Self {
            success: true,
            item_key: report.item_key,
            item_id: report.item_id,
            item_name: report.item_name,
            stats: ScrapeStats {
                total_sales: report.total_sales,
                pop_grades: report.pop_grades,
                sales_saved: report.sales_saved,
            },
            source_url: report.source_url,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    item_key: Option<String>,
    error: String,
}

struct ApiError {
    status: StatusCode,
    item_key: Option<String>,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            success: false,
            item_key: self.item_key,
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

fn status_for(error: &CycleError) -> StatusCode {
    if error.is_not_found() {
        StatusCode::NOT_FOUND
    } else if error.is_already_scraping() {
        StatusCode::CONFLICT
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

// ==== Handlers ====

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

#[derive(Debug, Deserialize)]
struct ScrapeBody {
    item_key: Option<String>,
}

async fn handle_scrape_path(
    State(state): State<AppState>,
    Path(item_key): Path<String>,
) -> Result<Json<ScrapeResponse>, ApiError> {
    scrape(&state, Some(item_key)).await
}

async fn handle_scrape_body(
    State(state): State<AppState>,
    body: Option<Json<ScrapeBody>>,
) -> Result<Json<ScrapeResponse>, ApiError> {
    let item_key = body.and_then(|Json(body)| body.item_key);
    scrape(&state, item_key).await
}

async fn scrape(
    state: &AppState,
    item_key: Option<String>,
) -> Result<Json<ScrapeResponse>, ApiError> {
    let Some(item_key) = item_key
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
    else {
        return Err(ApiError {
            status: StatusCode::BAD_REQUEST,
            item_key: None,
            message: "item_key is required".to_string(),
        });
    };

    info!(item_key = %item_key, "scrape requested");
    match state.scraper.scrape_key(&item_key).await {
        Ok(report) => Ok(Json(report.into())),
        Err(error) => {
            let status = status_for(&error);
            warn!(item_key = %item_key, status = status.as_u16(), error = %error, "scrape request failed");
            Err(ApiError {
                status,
                item_key: Some(item_key),
                message: error.to_string(),
            })
        }
    }
}
