pub mod client;
pub mod config;
pub mod error;
pub mod query;
pub mod source;
pub mod token;
pub mod types;

pub use client::IgdbClient;
pub use config::IgdbConfig;
pub use error::IgdbError;
pub use source::CatalogSource;
pub use token::TokenCache;
