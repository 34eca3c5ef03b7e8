use mq::QueueStats;
use serde::Serialize;

use crate::similar::SimilarGamesStats;

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct QueueStatsResponse {
    #[schema(example = "catalog_write")]
    pub queue: String,
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

impl QueueStatsResponse {
    pub fn new(queue: &str, stats: QueueStats) -> Self {
        Self {
            queue: queue.to_string(),
            pending: stats.pending,
            processing: stats.processing,
            completed: stats.completed,
            failed: stats.failed,
        }
    }
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct SimilarGamesStatsResponse {
    /// Games awaiting relationship resolution.
    pub pending: u64,
    /// Games whose relationships are fully resolved.
    pub processed: u64,
    /// Games with a staged similar-id list.
    pub staged: u64,
}

impl From<SimilarGamesStats> for SimilarGamesStatsResponse {
    fn from(stats: SimilarGamesStats) -> Self {
        Self {
            pending: stats.pending,
            processed: stats.processed,
            staged: stats.staged,
        }
    }
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct PipelineStatsResponse {
    pub write_queue: QueueStatsResponse,
    pub similar_games: SimilarGamesStatsResponse,
}
