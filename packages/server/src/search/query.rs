/// Trimmed, lowercased form used for keys.
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Drop everything but word characters and whitespace.
pub fn strip_punctuation(query: &str) -> String {
    query
        .trim()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect()
}

pub fn cache_key(normalized: &str, limit: u64, offset: u64) -> String {
    format!("search:{normalized}:{limit}:{offset}")
}

pub fn lock_key(normalized: &str, limit: u64, offset: u64) -> String {
    format!("search_processing:{normalized}:{limit}:{offset}")
}
