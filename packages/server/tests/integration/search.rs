use std::time::Duration;

use common::GameRecord;
use mq::{JobQueueExt, KvStore};
use serde_json::json;

use server::consumers::catalog_writer::{INSERT_BATCH, INSERT_SINGLE};
use server::models::search::{CachedSearch, SearchSource};
use server::search::{EMPTY_QUERY_ERROR, cache_key, lock_key};

use crate::common::{TestContext, record, settle};

async fn store_games(ctx: &TestContext, games: &[GameRecord]) {
    for game in games {
        ctx.queue.enqueue_json(INSERT_SINGLE, game).await.unwrap();
    }
    ctx.drain_writer().await;
}

mod tiers {
    use super::*;

    #[tokio::test]
    async fn blank_query_returns_none_source() {
        let ctx = TestContext::new().await;
        let response = ctx.search().search("   ", 50, 0, false).await.unwrap();

        assert!(response.results.is_empty());
        assert_eq!(response.meta.source, SearchSource::None);
        assert_eq!(response.meta.error.as_deref(), Some(EMPTY_QUERY_ERROR));
        assert_eq!(ctx.source.search_calls(), 0);
    }

    #[tokio::test]
    async fn store_hit_is_cached() {
        let ctx = TestContext::new().await;
        store_games(&ctx, &[record(1, "Zelda"), record(2, "Metroid")]).await;
        let search = ctx.search();

        let first = search.search("ZELDA", 50, 0, false).await.unwrap();
        assert_eq!(first.meta.source, SearchSource::Database);
        assert_eq!(first.results.len(), 1);
        assert_eq!(first.results[0].id, 1);
        assert!(first.meta.query_time_ms.is_some());

        // A second matching game is invisible until the cache entry expires.
        store_games(&ctx, &[record(3, "Zelda II")]).await;
        let second = search.search("zelda", 50, 0, false).await.unwrap();
        assert_eq!(second.meta.source, SearchSource::Cache);
        assert_eq!(second.results, first.results);
        assert_eq!(second.meta.deduplicated, None);

        let fresh = search.search("zelda", 50, 0, true).await.unwrap();
        assert_eq!(fresh.meta.source, SearchSource::Database);
        assert_eq!(fresh.results.len(), 2);
        assert_eq!(ctx.source.search_calls(), 0);
    }

    #[tokio::test]
    async fn store_results_are_ordered_by_popularity_then_rating() {
        let ctx = TestContext::new().await;
        store_games(
            &ctx,
            &[
                GameRecord {
                    total_rating: Some(70.0),
                    ..record(1, "Mario Kart")
                },
                GameRecord {
                    total_rating: Some(95.0),
                    ..record(2, "Super Mario Galaxy")
                },
                GameRecord {
                    is_popular: true,
                    ..record(3, "Super Mario Bros")
                },
                record(4, "Mario Party"),
            ],
        )
        .await;

        let response = ctx.search().search("mario", 50, 0, false).await.unwrap();
        let ids: Vec<i64> = response.results.iter().map(|g| g.id).collect();
        assert_eq!(ids, vec![3, 2, 1, 4]);

        let page = ctx.search().search("mario", 2, 1, false).await.unwrap();
        let ids: Vec<i64> = page.results.iter().map(|g| g.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[tokio::test]
    async fn store_hit_queues_similar_discovery() {
        let ctx = TestContext::new().await;
        store_games(&ctx, &[record(1, "Zelda"), record(2, "Zelda II")]).await;
        ctx.staging.mark_processed(2).await.unwrap();

        ctx.search().search("zelda", 50, 0, false).await.unwrap();
        settle().await;

        assert_eq!(ctx.pending_similar().await, vec![1]);
    }

    #[tokio::test]
    async fn punctuation_stripped_pass_tops_up_store_results() {
        let ctx = TestContext::new().await;
        store_games(&ctx, &[record(1, "Zelda Breath of the Wild")]).await;

        let response = ctx
            .search()
            .search("Zelda: Breath", 50, 0, false)
            .await
            .unwrap();

        assert_eq!(response.meta.source, SearchSource::Database);
        assert_eq!(response.results.len(), 1);
    }

    #[tokio::test]
    async fn upstream_hit_enqueues_one_batch() {
        let ctx = TestContext::new().await;
        ctx.source
            .add(GameRecord {
                similar_games: Some(vec![102]),
                ..record(101, "Zelda")
            })
            .await;

        let response = ctx.search().search("zelda", 50, 0, false).await.unwrap();
        assert_eq!(response.meta.source, SearchSource::Igdb);
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].similar_games, vec![102]);

        let jobs = ctx.queue.pending_jobs().await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job_type, INSERT_BATCH);
        assert_eq!(jobs[0].payload["games"][0]["id"], json!(101));
        let search_id = jobs[0].payload["search_id"].as_str().unwrap();
        assert!(search_id.starts_with("search:zelda:"));

        ctx.drain_writer().await;
        let again = ctx.search().search("zelda", 50, 0, true).await.unwrap();
        assert_eq!(again.meta.source, SearchSource::Database);
        assert_eq!(again.results[0].id, 101);
    }

    #[tokio::test]
    async fn upstream_retries_without_punctuation() {
        let ctx = TestContext::new().await;
        ctx.source.add(record(7, "Halo")).await;

        let response = ctx.search().search("halo!", 50, 0, false).await.unwrap();

        assert_eq!(response.meta.source, SearchSource::Igdb);
        assert_eq!(ctx.source.search_calls(), 2);
    }

    #[tokio::test]
    async fn miss_everywhere_returns_all_source() {
        let ctx = TestContext::new().await;
        let response = ctx.search().search("nothing", 50, 0, false).await.unwrap();

        assert!(response.results.is_empty());
        assert_eq!(response.meta.source, SearchSource::All);
        assert_eq!(response.meta.error, None);
        assert_eq!(ctx.queue_lengths().await, (0, 0));
        assert_eq!(ctx.get(&cache_key("nothing", 50, 0)).await, None);
    }

    #[tokio::test]
    async fn upstream_failure_is_a_miss() {
        let ctx = TestContext::new().await;
        ctx.source.add(record(1, "Zelda")).await;
        ctx.source.set_failing(true);

        let response = ctx.search().search("zelda", 50, 0, false).await.unwrap();

        assert_eq!(response.meta.source, SearchSource::All);
        assert_eq!(ctx.queue_lengths().await, (0, 0));
    }

    #[tokio::test]
    async fn lock_is_released_after_search() {
        let ctx = TestContext::new().await;
        ctx.search().search("zelda", 10, 0, false).await.unwrap();
        assert!(!ctx.kv.exists(&lock_key("zelda", 10, 0)).await.unwrap());
    }
}

mod dedup {
    use super::*;

    #[tokio::test]
    async fn duplicate_is_answered_from_cache() {
        let ctx = TestContext::new().await;
        let cached = CachedSearch {
            results: vec![(&record(1, "Zelda")).into()],
            timestamp: 0,
        };
        ctx.kv
            .set(&lock_key("zelda", 50, 0), "1", None)
            .await
            .unwrap();
        ctx.kv
            .set(
                &cache_key("zelda", 50, 0),
                &serde_json::to_string(&cached).unwrap(),
                None,
            )
            .await
            .unwrap();

        let response = ctx.search().search("Zelda", 50, 0, false).await.unwrap();

        assert_eq!(response.meta.source, SearchSource::Cache);
        assert_eq!(response.meta.deduplicated, Some(true));
        assert_eq!(response.results.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_waits_once_for_in_flight_result() {
        let ctx = TestContext::new().await;
        ctx.kv
            .set(&lock_key("zelda", 50, 0), "1", None)
            .await
            .unwrap();

        let kv = ctx.kv.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let cached = CachedSearch {
                results: vec![(&record(1, "Zelda")).into()],
                timestamp: 0,
            };
            kv.set(
                &cache_key("zelda", 50, 0),
                &serde_json::to_string(&cached).unwrap(),
                None,
            )
            .await
            .unwrap();
        });

        let response = ctx.search().search("zelda", 50, 0, false).await.unwrap();
        assert_eq!(response.meta.source, SearchSource::Cache);
        assert_eq!(response.meta.deduplicated, Some(true));
        assert_eq!(ctx.source.search_calls(), 0);
    }

    #[tokio::test]
    async fn duplicate_without_result_falls_through() {
        let ctx = TestContext::new().await;
        ctx.source.add(record(1, "Zelda")).await;
        ctx.kv
            .set(&lock_key("zelda", 50, 0), "1", None)
            .await
            .unwrap();

        let response = ctx.search().search("zelda", 50, 0, false).await.unwrap();

        assert_eq!(response.meta.source, SearchSource::Igdb);
        assert_eq!(response.meta.deduplicated, None);
    }

    #[tokio::test]
    async fn abandoned_search_releases_its_lock() {
        let ctx = TestContext::new().await;
        ctx.source.add(record(1, "Zelda")).await;
        ctx.source.set_delay(Duration::from_millis(500)).await;

        let search = ctx.search();
        let in_flight = tokio::spawn(async move { search.search("zelda", 50, 0, false).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(ctx.kv.exists(&lock_key("zelda", 50, 0)).await.unwrap());

        in_flight.abort();
        assert!(in_flight.await.unwrap_err().is_cancelled());
        settle().await;
        assert!(!ctx.kv.exists(&lock_key("zelda", 50, 0)).await.unwrap());

        // A follow-up goes straight to upstream instead of waiting out a duplicate.
        ctx.source.set_delay(Duration::ZERO).await;
        let started = std::time::Instant::now();
        let response = ctx.search().search("zelda", 50, 0, false).await.unwrap();
        assert_eq!(response.meta.source, SearchSource::Igdb);
        assert_eq!(response.meta.deduplicated, None);
        assert!(started.elapsed() < Duration::from_millis(150));
    }

    #[tokio::test]
    async fn concurrent_identical_searches_enqueue_far_fewer_batches() {
        const CALLERS: usize = 10;

        let ctx = TestContext::new().await;
        ctx.source.add(record(101, "Zelda")).await;
        ctx.source.set_delay(Duration::from_millis(100)).await;

        let mut handles = Vec::with_capacity(CALLERS);
        for _ in 0..CALLERS {
            let search = ctx.search();
            handles.push(tokio::spawn(async move {
                search.search("zelda", 50, 0, false).await.unwrap()
            }));
        }
        let mut deduplicated = 0;
        for handle in handles {
            let response = handle.await.unwrap();
            assert_eq!(response.results.len(), 1);
            if response.meta.deduplicated == Some(true) {
                deduplicated += 1;
            }
        }

        let batches = ctx.queue.pending_jobs().await.len();
        assert!(batches >= 1);
        assert!(batches <= CALLERS / 2, "{batches} batches for {CALLERS} callers");
        assert!(deduplicated >= CALLERS / 2);
        assert!(ctx.source.search_calls() <= CALLERS / 2);
    }
}
