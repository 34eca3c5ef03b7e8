pub mod config;
pub mod game;
pub mod image;
pub mod retry;

pub use config::MqAppConfig;
pub use game::{
    GameRecord, GameTypeRef, ImageRecord, NamedRef, WebsiteRecord, sanitize_similar_ids,
};
pub use image::{ImageSize, image_url};
