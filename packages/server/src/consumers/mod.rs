pub mod catalog_writer;
pub mod stale;

pub use catalog_writer::{CatalogJob, CatalogWriter, run_catalog_writer};
pub use stale::run_stale_job_detector;
