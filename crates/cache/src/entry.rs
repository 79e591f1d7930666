use blake3::Hasher;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// One cached summary. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub endpoint_id: String,
    pub version_tag: String,
    pub summary: String,
    /// Unix milliseconds
    pub created_at: u64,
}

impl CacheEntry {
    pub fn new(
        endpoint_id: impl Into<String>,
        version_tag: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        let endpoint_id = endpoint_id.into();
        let version_tag = version_tag.into();
        Self {
            fingerprint: fingerprint(&endpoint_id, &version_tag),
            endpoint_id,
            version_tag,
            summary: summary.into(),
            created_at: unix_ms_now(),
        }
    }

    pub(crate) fn is_expired(&self, ttl_ms: u64, now_ms: u64) -> bool {
        ttl_ms > 0 && now_ms.saturating_sub(self.created_at) > ttl_ms
    }
}

/// Cache key of an endpoint under one backend/model/prompt version.
#[must_use]
pub fn fingerprint(endpoint_id: &str, version_tag: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(endpoint_id.as_bytes());
    hasher.update(b"|");
    hasher.update(version_tag.as_bytes());
    hasher.finalize().to_hex().to_string()
}

pub fn unix_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_tag_changes_the_fingerprint() {
        let a = fingerprint("0123abcd", "gemini:gemini-1.5-flash:p1");
        let b = fingerprint("0123abcd", "gemini:gemini-1.5-flash:p2");
        assert_ne!(a, b);
        assert_eq!(a, fingerprint("0123abcd", "gemini:gemini-1.5-flash:p1"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn zero_ttl_never_expires() {
        let mut entry = CacheEntry::new("id", "stub:echo:p1", "Lists users");
        entry.created_at = 0;
        assert!(!entry.is_expired(0, u64::MAX));
        assert!(entry.is_expired(1_000, 5_000));
        assert!(!entry.is_expired(10_000, 5_000));
    }
}
