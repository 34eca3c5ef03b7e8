pub mod catalog;
pub mod config;
pub mod consumers;
pub mod database;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod search;
pub mod similar;
pub mod state;

use axum::{Json, routing::get};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::error::AppError;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Gamedex Catalog API",
        version = "1.0.0",
        description = "Game search backed by a result cache, a relational catalog and the IGDB upstream"
    ),
    tags(
        (name = "Games", description = "Game search"),
        (name = "Admin", description = "Pipeline observability"),
    ),
)]
struct ApiDoc;

/// Build the application router.
pub fn build_router(state: AppState) -> axum::Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .nest("/api", routes::api_routes())
        .split_for_parts();

    router
        .route(
            "/api-docs/openapi.json",
            get(move || {
                let api = api.clone();
                async move { Json(api) }
            }),
        )
        .fallback(|| async { AppError::NotFound("No such route".into()) })
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
