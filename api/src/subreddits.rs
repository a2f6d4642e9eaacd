use crate::{ApiError, ApiJson, ApiPath, ApiResult, AppState};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Deserializer};
use subwatch_core::MonitoredSubreddit;
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateSubredditRequest {
    name: String,
    #[serde(default = "active_by_default", deserialize_with = "deserialize_flag")]
    is_active: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubredditStatusRequest {
    #[serde(deserialize_with = "deserialize_flag")]
    is_active: bool,
}

fn active_by_default() -> bool {
    true
}

/// Accepts `true`/`false` as well as `1`/`0`.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => Ok(value),
        Flag::Int(0) => Ok(false),
        Flag::Int(1) => Ok(true),
        Flag::Int(other) => Err(serde::de::Error::custom(format!(
            "isActive must be a boolean or 0/1, got {other}"
        ))),
    }
}

pub(crate) async fn list_subreddits(
    State(state): State<AppState>,
) -> ApiResult<Vec<MonitoredSubreddit>> {
    Ok(Json(state.database.list_subreddits().await?))
}

pub(crate) async fn create_subreddit(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateSubredditRequest>,
) -> Result<(StatusCode, Json<MonitoredSubreddit>), ApiError> {
    let subreddit = state
        .database
        .add_subreddit(&request.name, request.is_active)
        .await?;
    info!(name = %subreddit.name, "Subreddit added");
    Ok((StatusCode::CREATED, Json(subreddit)))
}

pub(crate) async fn delete_subreddit(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    if state.database.remove_subreddit(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Subreddit {id} not found")))
    }
}

pub(crate) async fn set_subreddit_status(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<SubredditStatusRequest>,
) -> Result<StatusCode, ApiError> {
    if state
        .database
        .set_subreddit_active(id, request.is_active)
        .await?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Subreddit {id} not found")))
    }
}
