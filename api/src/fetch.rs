use crate::{ApiError, AppState};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use subwatch_core::FetchSummary;

/// Runs one fetch synchronously. Partial failures answer 207 with the
/// collected errors.
pub(crate) async fn run_fetch(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<FetchSummary>), ApiError> {
    let summary = state.fetcher.run().await?;
    let status = if summary.has_errors() {
        StatusCode::MULTI_STATUS
    } else {
        StatusCode::OK
    };
    Ok((status, Json(summary)))
}
