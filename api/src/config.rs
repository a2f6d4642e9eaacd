use crate::{ApiError, ApiJson, ApiResult, AppState};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use subwatch_core::MonitorConfig;
use tracing::info;

/// The stored config plus the system prompt it renders to.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConfigView {
    #[serde(flatten)]
    config: MonitorConfig,
    open_ai_prompt: String,
}

pub(crate) async fn get_config(State(state): State<AppState>) -> ApiResult<ConfigView> {
    let config = state.database.get_config().await?;
    let open_ai_prompt = config.prompt_template.render(state.verdict_kind);
    Ok(Json(ConfigView {
        config,
        open_ai_prompt,
    }))
}

pub(crate) async fn put_config(
    State(state): State<AppState>,
    ApiJson(config): ApiJson<MonitorConfig>,
) -> Result<StatusCode, ApiError> {
    state.database.save_config(&config).await?;
    info!(
        threshold = config.score_threshold,
        check_frequency = config.check_frequency,
        posts_per_fetch = config.posts_per_fetch,
        "Monitor config updated"
    );
    Ok(StatusCode::NO_CONTENT)
}
