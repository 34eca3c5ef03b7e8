pub mod cover;
pub mod game;
pub mod game_mode;
pub mod game_to_game_mode;
pub mod game_to_genre;
pub mod game_to_platform;
pub mod game_to_similar_game;
pub mod game_to_type;
pub mod game_type;
pub mod genre;
pub mod platform;
pub mod screenshot;
pub mod website;
pub mod website_type;
