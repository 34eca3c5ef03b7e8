//! Apicalypse request bodies for the `/games` endpoint.

/// Main game, remake and remaster.
pub const MAIN_GAME_TYPES: [i32; 3] = [0, 8, 9];

/// Upper bound IGDB accepts for `limit`.
pub const MAX_LIMIT: u64 = 500;

pub const GAME_FIELDS: &str = "id, name, slug, created_at, genres.name, genres.slug, \
platforms.name, platforms.slug, first_release_date, keywords.name, \
cover.image_id, cover.url, cover.width, cover.height, \
screenshots.image_id, screenshots.url, screenshots.width, screenshots.height, \
websites.type.id, websites.type.type, websites.url, websites.trusted, \
game_modes.name, game_modes.slug, total_rating, similar_games, storyline, summary, \
involved_companies.company.name, game_type.id, game_type.type";

fn main_types() -> String {
    MAIN_GAME_TYPES
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn escape(term: &str) -> String {
    term.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Body for a name search.
pub fn search_query(term: &str, only_main_games: bool, limit: u64) -> String {
    let mut body = format!("search \"{}\"; fields {GAME_FIELDS};", escape(term));
    if only_main_games {
        body.push_str(&format!(" where game_type = ({});", main_types()));
    }
    body.push_str(&format!(" limit {};", limit.clamp(1, MAX_LIMIT)));
    body
}

/// Body for an id lookup.
pub fn ids_query(ids: &[i64], only_main_games: bool) -> String {
    let id_list = ids
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",");
    let mut body = format!("fields {GAME_FIELDS}; where id = ({id_list})");
    if only_main_games {
        body.push_str(&format!(" & game_type = ({})", main_types()));
    }
    body.push_str(&format!("; limit {};", (ids.len() as u64).clamp(1, MAX_LIMIT)));
    body
}
