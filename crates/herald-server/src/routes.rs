use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use herald_core::FeedCheckOutcome;
use herald_core::traits::{FeedSource, FeedStore};

use crate::dto::{CreateFeedRequest, CreateFeedResponse, FEED_CREATED, FEED_INVALID, HealthResponse};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Build the full router.
pub fn router<F, S>(state: Arc<AppState<F, S>>) -> Router
where
    F: FeedSource + 'static,
    S: FeedStore + 'static,
{
    let api = Router::new().route("/v1/feeds", post(create_feed::<F, S>));

    let public = Router::new()
        .route("/health", get(health::<F, S>))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    public.merge(api).with_state(state)
}

// ---------------------------------------------------------------------------
// Feeds
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/v1/feeds",
    request_body = CreateFeedRequest,
    responses(
        (status = 201, description = "Feed registered", body = CreateFeedResponse),
        (status = 400, description = "Feed source rejected", body = CreateFeedResponse),
        (status = 500, description = "Storage failure", body = crate::dto::ErrorResponse),
    ),
    tag = "feeds"
)]
pub async fn create_feed<F, S>(
    State(state): State<Arc<AppState<F, S>>>,
    axum::Json(body): axum::Json<CreateFeedRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    F: FeedSource,
    S: FeedStore,
{
    let outcome = state.service.create_feed(&body.feed_url).await?;

    let (status, message, rss_feed) = match outcome {
        FeedCheckOutcome::Created { feed, .. } | FeedCheckOutcome::Refreshed { feed, .. } => {
            (StatusCode::CREATED, FEED_CREATED, Some(feed.into()))
        }
        FeedCheckOutcome::Rejected { .. }
        | FeedCheckOutcome::Failed { .. }
        | FeedCheckOutcome::Skipped { .. } => (StatusCode::BAD_REQUEST, FEED_INVALID, None),
    };

    let response = CreateFeedResponse {
        feed_url: body.feed_url,
        message: message.to_string(),
        rss_feed,
    };

    Ok((status, axum::Json(response)))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health<F, S>(State(state): State<Arc<AppState<F, S>>>) -> impl IntoResponse
where
    F: FeedSource,
    S: FeedStore,
{
    let db_status = match state.service.store().ping().await {
        Ok(()) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "Store health check failed");
            "error"
        }
    };

    let (status, label) = if db_status == "ok" {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    let response = HealthResponse {
        status: label,
        database: db_status,
    };

    (status, axum::Json(response))
}
