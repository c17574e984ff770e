//! Cache key derivation.
//!
//! The key is a pure function of the canonical path, the query parameters in
//! sorted order, and the tenant namespace taken from the authenticated
//! context. Components are length-prefixed before hashing so no two distinct
//! triples can collide by concatenation.

/// Derives the cache key for a request.
#[must_use]
pub fn cache_key(path: &str, query: Option<&str>, tenant: &str) -> String {
    let path = canonical_path(path);
    let query = canonical_query(query);

    let mut hasher = blake3::Hasher::new();
    for part in [tenant, path, query.as_str()] {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    format!("api:{}", hasher.finalize().to_hex())
}

/// Strips trailing slashes (except for the root path).
#[must_use]
pub fn canonical_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

/// Sorts query parameters by name, then value. Empty segments are dropped.
#[must_use]
pub fn canonical_query(query: Option<&str>) -> String {
    let Some(query) = query else {
        return String::new();
    };
    let mut pairs: Vec<(&str, &str)> = query
        .split('&')
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.split_once('=').unwrap_or((segment, "")))
        .collect();
    pairs.sort_unstable();
    pairs
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}
