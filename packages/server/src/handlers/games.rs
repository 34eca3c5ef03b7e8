use axum::{
    Json,
    extract::{Query, State},
};
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::models::search::{SearchParams, SearchResponse};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/search",
    tag = "Games",
    operation_id = "searchGames",
    summary = "Search games by name",
    description = "Searches the result cache, then the local catalog, then the upstream catalog. \
                   A blank query returns an empty result with `meta.source = none` and `meta.error` set. \
                   Upstream results are queued for persistence in the background.",
    params(SearchParams),
    responses(
        (status = 200, description = "Search results; `meta.source` names the tier that answered", body = SearchResponse),
        (status = 400, description = "Invalid paging parameters (VALIDATION_ERROR)", body = ErrorBody),
        (status = 500, description = "Store or cache unavailable (INTERNAL_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn search_games(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    let config = state.search.config();
    let limit = match params.limit {
        Some(0) => {
            return Err(AppError::Validation(
                "limit must be a positive integer".into(),
            ));
        }
        Some(limit) => limit.min(config.max_limit),
        None => config.default_limit,
    };
    let offset = params.offset.unwrap_or(0);
    let query = params.q.as_deref().unwrap_or_default();

    let response = state
        .search
        .search(query, limit, offset, params.force_fresh())
        .await?;

    Ok(Json(response))
}
