use axum::{Json, extract::State};
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::models::admin::{PipelineStatsResponse, QueueStatsResponse};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/queues",
    tag = "Admin",
    operation_id = "getQueueStats",
    summary = "Get pipeline queue statistics",
    description = "Returns the catalog write queue partitions and the similar-games staging counts.",
    responses(
        (status = 200, description = "Queue statistics", body = PipelineStatsResponse),
        (status = 500, description = "Queue store unavailable (INTERNAL_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn queue_stats(
    State(state): State<AppState>,
) -> Result<Json<PipelineStatsResponse>, AppError> {
    let write_queue = state.queue.stats().await?;
    let similar_games = state.staging.stats().await?;

    Ok(Json(PipelineStatsResponse {
        write_queue: QueueStatsResponse::new(state.queue.name(), write_queue),
        similar_games: similar_games.into(),
    }))
}
