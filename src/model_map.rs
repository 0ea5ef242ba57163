use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Process-wide memo of resolved model names. Populated lazily and never
/// evicted; the keyspace is the handful of names a client ever sends.
pub type ModelCache = Arc<Mutex<HashMap<String, String>>>;

pub fn new_cache() -> ModelCache {
    Arc::new(Mutex::new(HashMap::new()))
}

/// Used both as the resolution fallback and as the outbound model when the
/// inbound request carries none.
pub const FALLBACK_MODEL: &str = "openai/gpt-oss-120b:free";

/// Exact-match table, consulted before the family keywords.
const MODEL_TABLE: &[(&str, &str)] = &[
    ("claude-sonnet-4-5-20250929", "openai/gpt-oss-120b:free"),
    ("claude-haiku-4-5-20251001", "openai/gpt-oss-120b:free"),
    ("claude-sonnet", "openai/gpt-oss-120b:free"),
    ("claude-opus", "openai/gpt-oss-20b:free"),
    ("claude-haiku", "moonshotai/kimi-k2:free"),
    ("gpt-oss", "openai/gpt-oss-120b:free"),
];

/// Substring families, checked in this order against the lowercased name.
const FAMILIES: &[&str] = &["claude-sonnet", "claude-opus", "claude-haiku"];

/// Resolve a client-supplied model name to an OpenRouter identifier.
/// Total and deterministic; results are memoized in `cache`.
pub fn resolve(cache: &ModelCache, name: &str) -> String {
    if let Ok(guard) = cache.lock() {
        if let Some(hit) = guard.get(name) {
            return hit.clone();
        }
    }
    let mapped = lookup(name);
    if let Ok(mut guard) = cache.lock() {
        guard.insert(name.to_string(), mapped.clone());
    }
    mapped
}

fn lookup(name: &str) -> String {
    // Names already in provider/model form pass through untouched.
    if name.contains('/') {
        return name.to_string();
    }
    if let Some((_, target)) = MODEL_TABLE.iter().find(|(known, _)| *known == name) {
        return (*target).to_string();
    }
    let lowered = name.to_ascii_lowercase();
    for family in FAMILIES {
        if lowered.contains(family) {
            return MODEL_TABLE
                .iter()
                .find(|(known, _)| known == family)
                .map(|(_, target)| (*target).to_string())
                .unwrap_or_else(|| FALLBACK_MODEL.to_string());
        }
    }
    FALLBACK_MODEL.to_string()
}
