//! Canonical cache keys.

use sha2::{Digest, Sha256};
use url::Url;

use crate::http::Request;

/// Compute the storage hash for a method and URL.
pub fn compute_cache_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Canonicalized request identity: method plus fragment-free URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    method: String,
    url: Url,
}

impl CacheKey {
    pub fn new(method: &str, mut url: Url) -> Self {
        url.set_fragment(None);
        Self { method: method.to_ascii_uppercase(), url }
    }

    pub fn from_request(request: &Request) -> Self {
        Self::new(&request.method, request.url.clone())
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Hash of the full key, query string included.
    pub fn hash(&self) -> String {
        compute_cache_key(&self.method, self.url.as_str())
    }

    /// Hash of the key with the query string removed.
    pub fn loose_hash(&self) -> String {
        let mut url = self.url.clone();
        url.set_query(None);
        compute_cache_key(&self.method, url.as_str())
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> CacheKey {
        CacheKey::new("GET", Url::parse(s).unwrap())
    }

    #[test]
    fn test_hash_stability() {
        let hash1 = compute_cache_key("GET", "https://example.com/");
        let hash2 = compute_cache_key("GET", "https://example.com/");
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_hash_different_method() {
        assert_ne!(compute_cache_key("GET", "https://example.com/"), compute_cache_key("HEAD", "https://example.com/"));
    }

    #[test]
    fn test_hash_format() {
        let hash = compute_cache_key("GET", "https://example.com/");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_loose_hash_ignores_query() {
        let a = key("https://example.com/app.js?v=1");
        let b = key("https://example.com/app.js?v=2");
        assert_ne!(a.hash(), b.hash());
        assert_eq!(a.loose_hash(), b.loose_hash());
        assert_eq!(a.loose_hash(), key("https://example.com/app.js").hash());
    }

    #[test]
    fn test_fragment_dropped() {
        assert_eq!(key("https://example.com/#top"), key("https://example.com/"));
    }

    #[test]
    fn test_display() {
        assert_eq!(key("https://example.com/a").to_string(), "GET https://example.com/a");
    }
}
