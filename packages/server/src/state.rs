use std::sync::Arc;

use mq::JobQueue;

use crate::search::SearchService;
use crate::similar::SimilarGamesStaging;

#[derive(Clone)]
pub struct AppState {
    pub search: SearchService,
    /// The catalog write queue.
    pub queue: Arc<dyn JobQueue>,
    pub staging: SimilarGamesStaging,
}
