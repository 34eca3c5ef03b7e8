use std::time::Duration;

use common::GameRecord;
use mq::{JobQueue, JobQueueExt};
use sea_orm::{EntityTrait, QueryOrder};
use serde_json::json;
use tokio::sync::watch;

use server::config::SimilarGamesConfig;
use server::consumers::catalog_writer::INSERT_SINGLE;
use server::entity::{game, game_to_similar_game};
use server::models::search::SearchSource;
use server::similar::run_similar_games_worker;

use crate::common::{TestContext, record, settle};

async fn store(ctx: &TestContext, records: &[GameRecord]) {
    for r in records {
        ctx.queue.enqueue_json(INSERT_SINGLE, r).await.unwrap();
    }
    ctx.drain_writer().await;
}

async fn edges(ctx: &TestContext) -> Vec<(i64, i64)> {
    game_to_similar_game::Entity::find()
        .order_by_asc(game_to_similar_game::Column::GameId)
        .order_by_asc(game_to_similar_game::Column::SimilarGameId)
        .all(&ctx.db)
        .await
        .unwrap()
        .into_iter()
        .map(|e| (e.game_id, e.similar_game_id))
        .collect()
}

mod cycle {
    use super::*;

    #[tokio::test]
    async fn busy_write_queue_skips_cycle_without_mutations() {
        let ctx = TestContext::new().await;
        store(&ctx, &[record(1, "Zelda"), record(2, "Zelda II")]).await;
        ctx.staging.store_relationships(1, &[2]).await.unwrap();

        for i in 0..11 {
            ctx.queue
                .enqueue("noop", json!({ "n": i }), None)
                .await
                .unwrap();
        }

        let report = ctx.worker().run_cycle().await.unwrap();

        assert!(report.skipped_busy);
        assert_eq!(report.processed + report.deferred + report.failed, 0);
        assert!(edges(&ctx).await.is_empty());
        assert_eq!(ctx.count(game::Entity).await, 2);
        assert_eq!(ctx.pending_similar().await, vec![1]);
        assert_eq!(ctx.source.fetch_calls(), 0);
    }

    #[tokio::test]
    async fn edges_are_symmetric_and_never_duplicated() {
        let ctx = TestContext::new().await;
        store(&ctx, &[record(1, "A"), record(2, "B"), record(3, "C")]).await;
        ctx.staging.store_relationships(1, &[2, 3]).await.unwrap();

        let report = ctx.worker().run_cycle().await.unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(report.edges_created, 4);
        assert_eq!(edges(&ctx).await, vec![(1, 2), (1, 3), (2, 1), (3, 1)]);
        assert!(ctx.staging.is_processed(1).await.unwrap());

        // Re-staging the same relationships is harmless.
        ctx.staging.store_relationships(1, &[2, 3]).await.unwrap();
        ctx.staging.store_relationships(2, &[1]).await.unwrap();
        let report = ctx.worker().run_cycle().await.unwrap();
        assert_eq!(report.processed, 2);
        assert_eq!(report.edges_created, 0);
        assert_eq!(edges(&ctx).await.len(), 4);
    }

    #[tokio::test]
    async fn subject_not_yet_stored_stays_pending() {
        let ctx = TestContext::new().await;
        ctx.staging.discover(&[50]).await.unwrap();

        let report = ctx.worker().run_cycle().await.unwrap();

        assert_eq!(report.deferred, 1);
        assert_eq!(ctx.pending_similar().await, vec![50]);
        assert_eq!(ctx.source.fetch_calls(), 0);
    }

    #[tokio::test]
    async fn game_without_similar_games_is_processed() {
        let ctx = TestContext::new().await;
        store(&ctx, &[record(60, "Tetris")]).await;
        ctx.source.add(record(60, "Tetris")).await;
        ctx.staging.discover(&[60]).await.unwrap();

        let report = ctx.worker().run_cycle().await.unwrap();

        assert_eq!(report.processed, 1);
        assert!(ctx.staging.is_processed(60).await.unwrap());
        assert!(ctx.pending_similar().await.is_empty());
        assert_eq!(ctx.source.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn discovery_stages_then_links_on_later_cycle() {
        let ctx = TestContext::new().await;
        store(&ctx, &[record(1, "Zelda"), record(2, "Zelda II")]).await;
        ctx.source
            .add(GameRecord {
                similar_games: Some(vec![2]),
                ..record(1, "Zelda")
            })
            .await;
        ctx.staging.discover(&[1]).await.unwrap();

        let first = ctx.worker().run_cycle().await.unwrap();
        assert_eq!(first.deferred, 1);
        assert_eq!(ctx.staging.relationships(1).await.unwrap(), Some(vec![2]));
        assert!(edges(&ctx).await.is_empty());

        let second = ctx.worker().run_cycle().await.unwrap();
        assert_eq!(second.processed, 1);
        assert_eq!(edges(&ctx).await, vec![(1, 2), (2, 1)]);
    }

    #[tokio::test]
    async fn partial_dependencies_link_what_exists_and_fetch_the_rest() {
        let ctx = TestContext::new().await;
        store(&ctx, &[record(1, "Zelda"), record(2, "Zelda II")]).await;
        ctx.source.add(record(3, "Link's Awakening")).await;
        ctx.staging.store_relationships(1, &[2, 3]).await.unwrap();

        let report = ctx.worker().run_cycle().await.unwrap();

        assert_eq!(report.deferred, 1);
        assert_eq!(report.fetches_enqueued, 1);
        assert_eq!(edges(&ctx).await, vec![(1, 2), (2, 1)]);
        assert_eq!(ctx.pending_similar().await, vec![1]);

        let jobs = ctx.queue.pending_jobs().await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job_type, INSERT_SINGLE);
        assert_eq!(jobs[0].payload["id"], json!(3));
    }

    #[tokio::test]
    async fn unresolvable_ids_are_exhausted() {
        let ctx = TestContext::new().await;
        store(&ctx, &[record(1, "Zelda")]).await;
        ctx.staging.store_relationships(1, &[999]).await.unwrap();
        let worker = ctx.worker_with(SimilarGamesConfig {
            max_fetch_attempts: 2,
            ..TestContext::similar_config()
        });

        assert_eq!(worker.run_cycle().await.unwrap().deferred, 1);
        assert_eq!(worker.run_cycle().await.unwrap().deferred, 1);
        let last = worker.run_cycle().await.unwrap();

        assert_eq!(last.processed, 1);
        assert!(ctx.staging.is_processed(1).await.unwrap());
        assert_eq!(ctx.source.fetch_calls(), 2);
        assert!(edges(&ctx).await.is_empty());
    }

    #[tokio::test]
    async fn upstream_outage_does_not_use_up_fetch_rounds() {
        let ctx = TestContext::new().await;
        store(&ctx, &[record(1, "Zelda")]).await;
        ctx.source.add(record(2, "Link's Awakening")).await;
        ctx.staging.store_relationships(1, &[2]).await.unwrap();
        ctx.source.set_failing(true);
        let worker = ctx.worker();

        let report = worker.run_cycle().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.fetches_enqueued, 0);
        assert_eq!(ctx.staging.fetch_attempts(1).await.unwrap(), 0);
        assert!(!ctx.staging.is_processed(1).await.unwrap());

        ctx.source.set_failing(false);
        let report = worker.run_cycle().await.unwrap();
        assert_eq!(report.deferred, 1);
        assert_eq!(report.fetches_enqueued, 1);
        assert_eq!(ctx.staging.fetch_attempts(1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn missing_ids_are_fetched_in_batches() {
        let ctx = TestContext::new().await;
        store(&ctx, &[record(1, "Hub")]).await;
        let similar: Vec<i64> = (10..15).collect();
        for id in &similar {
            ctx.source.add(record(*id, &format!("Game {id}"))).await;
        }
        ctx.staging.store_relationships(1, &similar).await.unwrap();
        let worker = ctx.worker_with(SimilarGamesConfig {
            fetch_batch_size: 2,
            ..TestContext::similar_config()
        });

        let report = worker.run_cycle().await.unwrap();

        assert_eq!(report.fetches_enqueued, 5);
        assert_eq!(ctx.source.fetch_calls(), 3);
    }
}

mod pipeline {
    use super::*;

    #[tokio::test]
    async fn zelda_search_to_symmetric_edges() {
        let ctx = TestContext::new().await;
        ctx.source
            .add(GameRecord {
                similar_games: Some(vec![102]),
                ..record(101, "Zelda")
            })
            .await;
        ctx.source
            .add(GameRecord {
                similar_games: Some(vec![101]),
                ..record(102, "Adventure of Link")
            })
            .await;

        let response = ctx.search().search("zelda", 50, 0, false).await.unwrap();
        assert_eq!(response.meta.source, SearchSource::Igdb);
        assert_eq!(ctx.queue.pending_jobs().await.len(), 1);
        settle().await;

        ctx.drain_writer().await;
        assert!(ctx.catalog_has(101).await);
        assert!(!ctx.catalog_has(102).await);

        let worker = ctx.worker();
        let first = worker.run_cycle().await.unwrap();
        assert_eq!(first.fetches_enqueued, 1);
        assert!(edges(&ctx).await.is_empty());

        ctx.drain_writer().await;
        assert!(ctx.catalog_has(102).await);

        worker.run_cycle().await.unwrap();
        assert_eq!(edges(&ctx).await, vec![(101, 102), (102, 101)]);
        assert!(ctx.pending_similar().await.is_empty());

        let idle = worker.run_cycle().await.unwrap();
        assert_eq!(idle.edges_created, 0);
        assert_eq!(edges(&ctx).await.len(), 2);
    }

    #[tokio::test]
    async fn worker_loop_stops_on_shutdown() {
        let ctx = TestContext::new().await;
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_similar_games_worker(ctx.worker(), rx));

        settle().await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
    }
}

impl TestContext {
    async fn catalog_has(&self, id: i64) -> bool {
        server::catalog::catalog_store(&self.db)
            .game_exists(id)
            .await
            .unwrap()
    }
}
