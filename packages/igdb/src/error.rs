use mq::MqError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IgdbError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IGDB returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("IGDB credentials are not configured")]
    MissingCredentials,

    #[error("Token exchange failed: {0}")]
    Token(String),

    #[error("Token cache error: {0}")]
    Cache(#[from] MqError),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
}
