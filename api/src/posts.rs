use crate::{ApiError, ApiJson, ApiPath, ApiQuery, ApiResult, AppState};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use subwatch_core::{MonitoredPost, PostFilter, PostStatus};
use tracing::info;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PostsQuery {
    status: Option<String>,
    id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusRequest {
    status: PostStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateReplyRequest {
    suggested_reply: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct Deleted {
    deleted: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct Updated {
    updated: u64,
}

fn post_not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("Post {id} not found"))
}

pub(crate) async fn list_posts(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PostsQuery>,
) -> ApiResult<Vec<MonitoredPost>> {
    let status = match query.status.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<PostStatus>()?),
    };
    let filter = PostFilter {
        status,
        id: query.id,
    };
    Ok(Json(state.database.list_posts(filter).await?))
}

pub(crate) async fn update_post_status(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<StatusRequest>,
) -> Result<StatusCode, ApiError> {
    if state.database.update_post_status(id, request.status).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(post_not_found(id))
    }
}

pub(crate) async fn clear_pending_posts(State(state): State<AppState>) -> ApiResult<Deleted> {
    let deleted = state.database.delete_pending_posts().await?;
    info!(deleted, "Cleared pending posts");
    Ok(Json(Deleted { deleted }))
}

pub(crate) async fn ignore_all_posts(State(state): State<AppState>) -> ApiResult<Updated> {
    let updated = state.database.ignore_pending_posts().await?;
    info!(updated, "Ignored all pending posts");
    Ok(Json(Updated { updated }))
}

/// Asks the analyzer for a fresh reply. Only the suggested reply changes.
pub(crate) async fn regenerate_reply(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<MonitoredPost> {
    let post = state
        .database
        .get_post(id)
        .await?
        .ok_or_else(|| post_not_found(id))?;
    let analyzer = state.fetcher.analyzer()?;
    let config = state.database.get_config().await?;

    let text = format!("{}\n{}", post.title, post.content);
    let reply = analyzer
        .suggest_reply(&text, &config.prompt_template.render_reply_only())
        .await?;

    let updated = state
        .database
        .update_post_reply(id, &reply)
        .await?
        .ok_or_else(|| post_not_found(id))?;
    info!(post_id = %updated.post_id, "Regenerated suggested reply");
    Ok(Json(updated))
}

pub(crate) async fn update_reply(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<UpdateReplyRequest>,
) -> ApiResult<MonitoredPost> {
    let reply = request.suggested_reply.trim();
    if reply.is_empty() {
        return Err(ApiError::BadRequest(
            "suggestedReply must not be empty".to_string(),
        ));
    }
    let updated = state
        .database
        .update_post_reply(id, reply)
        .await?
        .ok_or_else(|| post_not_found(id))?;
    Ok(Json(updated))
}
