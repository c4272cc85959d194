//! Device token cache for the HTTP-stream transport: the device token is
//! cached until its TTL expires.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct CachedToken {
    token: String,
    expires_at: Instant,
}

#[derive(Debug, Default)]
pub struct FcmTokenCache {
    cached: Option<CachedToken>,
}

impl FcmTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&str> {
        self.cached.as_ref().filter(|c| c.expires_at > Instant::now()).map(|c| c.token.as_str())
    }

    pub fn set(&mut self, token: String, ttl: Duration) {
        self.cached = Some(CachedToken {
            token,
            expires_at: Instant::now() + ttl,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_cache_returns_none() {
        let cache = FcmTokenCache::new();
        assert_eq!(cache.get(), None);
    }

    #[test]
    fn fresh_token_is_returned() {
        let mut cache = FcmTokenCache::new();
        cache.set("tok".to_string(), Duration::from_secs(60));
        assert_eq!(cache.get(), Some("tok"));
    }

    #[test]
    fn expired_token_is_not_returned() {
        let mut cache = FcmTokenCache::new();
        cache.set("tok".to_string(), Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get(), None);
    }
}
