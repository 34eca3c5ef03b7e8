//! Discovery and persistence of "similar game" edges.

pub mod staging;
pub mod worker;

pub use staging::{SimilarGamesStaging, SimilarGamesStats};
pub use worker::{CycleReport, SimilarGamesWorker, run_similar_games_worker};
