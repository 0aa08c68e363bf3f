//! HTTP surface: a health check and a single query endpoint.


use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::Result;
use crate::qa::QaPipeline;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub confluence_links: Vec<String>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: &'static str,
    details: String,
}

/// Build the application router over a shared pipeline.
#[inline]
pub fn router(pipeline: Arc<QaPipeline>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/query", post(query))
        .with_state(pipeline)
}

/// Bind and serve until the process is stopped.
#[inline]
pub async fn serve(pipeline: Arc<QaPipeline>, port: u16) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router(pipeline)).await?;
    Ok(())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        message: "Confluence Q&A assistant API is running.",
    })
}

async fn query(
    State(pipeline): State<Arc<QaPipeline>>,
    Json(request): Json<QueryRequest>,
) -> Response {
    match pipeline.answer(&request.question).await {
        Ok(answer) => Json(QueryResponse {
            confluence_links: answer.links(),
            answer: answer.text,
        })
        .into_response(),
        Err(error) => {
            error!("Query failed: {}", error);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Internal server error",
                    details: error.to_string(),
                }),
            )
                .into_response()
        }
    }
}
