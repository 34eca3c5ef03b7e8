use async_trait::async_trait;
use common::GameRecord;

use crate::error::IgdbError;

/// Upstream game catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Full-text search by name. `only_main_games` restricts results to main
    /// games, remakes and remasters.
    async fn search_by_name(
        &self,
        query: &str,
        only_main_games: bool,
        limit: u64,
    ) -> Result<Vec<GameRecord>, IgdbError>;

    /// Fetch records for the given ids. Unknown ids are silently absent.
    async fn fetch_by_ids(
        &self,
        ids: &[i64],
        only_main_games: bool,
    ) -> Result<Vec<GameRecord>, IgdbError>;
}
