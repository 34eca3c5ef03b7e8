use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::handlers;
use crate::state::AppState;

pub fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/games", game_routes())
        .nest("/admin", admin_routes())
}

fn game_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(handlers::games::search_games))
}

fn admin_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(handlers::admin::queue_stats))
}
