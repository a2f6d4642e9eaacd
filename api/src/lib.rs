mod config;
mod fetch;
mod posts;
mod subreddits;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use background_service::Fetcher;
use database::Database;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use subwatch_core::{CoreError, ErrorExt, VerdictKind};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub database: Database,
    pub fetcher: Arc<Fetcher>,
    /// Output kind the rendered prompt asks for.
    pub verdict_kind: VerdictKind,
}

pub(crate) type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    BadGateway(CoreError),
    Internal(CoreError),
}

impl ApiError {
    fn into_response_parts(self) -> (StatusCode, ErrorResponse) {
        match self {
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new(msg, "INVALID_INPUT"),
            ),
            ApiError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new(msg, "NOT_FOUND"),
            ),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, ErrorResponse::new(msg, "CONFLICT")),
            ApiError::BadGateway(err) => {
                err.log_warn();
                (
                    StatusCode::BAD_GATEWAY,
                    ErrorResponse::new(err.user_friendly_message(), err.error_code()),
                )
            }
            ApiError::Internal(err) => {
                error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new(err.to_string(), err.error_code()),
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.into_response_parts();
        (status, Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidInput { message } => ApiError::BadRequest(message),
            CoreError::NotFound { resource } => ApiError::NotFound(format!("{resource} not found")),
            CoreError::Conflict { message } => ApiError::Conflict(message),
            err if err.is_upstream() => ApiError::BadGateway(err),
            err => ApiError::Internal(err),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}

/// JSON body extractor whose rejections use the API error shape.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub(crate) struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub(crate) struct ApiPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub(crate) struct ApiQuery<T>(pub T);

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route(
            "/api/subreddits",
            get(subreddits::list_subreddits).post(subreddits::create_subreddit),
        )
        .route("/api/subreddits/:id", delete(subreddits::delete_subreddit))
        .route("/api/subreddits/:id/status", patch(subreddits::set_subreddit_status))
        .route(
            "/api/posts",
            get(posts::list_posts).delete(posts::clear_pending_posts),
        )
        .route("/api/posts/ignore-all", patch(posts::ignore_all_posts))
        .route("/api/posts/:id/status", patch(posts::update_post_status))
        .route("/api/posts/:id/regenerate-reply", post(posts::regenerate_reply))
        .route("/api/posts/:id/update-reply", patch(posts::update_reply))
        .route("/api/config", get(config::get_config).put(config::put_config))
        .route("/api/fetch", post(fetch::run_fetch))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the API on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<(), CoreError>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!(address = %listener.local_addr()?, "REST API listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("REST API stopped");
    Ok(())
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}
