use mq::JobQueueExt;
use serde_json::json;

use server::consumers::catalog_writer::INSERT_SINGLE;

use crate::common::{TestContext, record, routes};

#[tokio::test]
async fn search_endpoint_reports_source() {
    let ctx = TestContext::new().await;
    ctx.queue
        .enqueue_json(INSERT_SINGLE, &record(1, "Zelda"))
        .await
        .unwrap();
    ctx.drain_writer().await;
    let app = ctx.spawn_app().await;

    let res = app.get(&format!("{}?q=zelda", routes::SEARCH)).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["meta"]["source"], "database");
    assert_eq!(res.body["meta"]["total"], 1);
    assert_eq!(res.body["results"][0]["slug"], "zelda");

    let res = app.get(&format!("{}?q=zelda", routes::SEARCH)).await;
    assert_eq!(res.body["meta"]["source"], "cache");
}

#[tokio::test]
async fn missing_query_is_not_an_http_error() {
    let ctx = TestContext::new().await;
    let app = ctx.spawn_app().await;

    let res = app.get(routes::SEARCH).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["meta"]["source"], "none");
    assert_eq!(res.body["meta"]["error"], "Search query is required");
    assert_eq!(res.body["results"], json!([]));
}

#[tokio::test]
async fn zero_limit_is_rejected() {
    let ctx = TestContext::new().await;
    let app = ctx.spawn_app().await;

    let res = app.get(&format!("{}?q=zelda&limit=0", routes::SEARCH)).await;
    assert_eq!(res.status, 400);
    assert_eq!(res.body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let ctx = TestContext::new().await;
    let app = ctx.spawn_app().await;

    let res = app.get("/api/v1/games/nope").await;
    assert_eq!(res.status, 404);
    assert_eq!(res.body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn fresh_flag_bypasses_cache() {
    let ctx = TestContext::new().await;
    ctx.queue
        .enqueue_json(INSERT_SINGLE, &record(1, "Zelda"))
        .await
        .unwrap();
    ctx.drain_writer().await;
    let app = ctx.spawn_app().await;

    app.get(&format!("{}?q=zelda", routes::SEARCH)).await;
    let res = app
        .get(&format!("{}?q=zelda&fresh=1", routes::SEARCH))
        .await;
    assert_eq!(res.body["meta"]["source"], "database");
}

#[tokio::test]
async fn queue_stats_endpoint() {
    let ctx = TestContext::new().await;
    ctx.queue
        .enqueue_json(INSERT_SINGLE, &record(1, "Zelda"))
        .await
        .unwrap();
    ctx.staging.discover(&[5, 6]).await.unwrap();
    let app = ctx.spawn_app().await;

    let res = app.get(routes::QUEUES).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body["write_queue"]["queue"], "catalog_write");
    assert_eq!(res.body["write_queue"]["pending"], 1);
    assert_eq!(res.body["similar_games"]["pending"], 2);
}

#[tokio::test]
async fn openapi_document_lists_routes() {
    let ctx = TestContext::new().await;
    let app = ctx.spawn_app().await;

    let res = app.get(routes::OPENAPI).await;
    assert_eq!(res.status, 200);
    assert!(res.body["paths"]["/api/v1/games/search"].is_object());
    assert!(res.body["paths"]["/api/v1/admin/queues"].is_object());
}
