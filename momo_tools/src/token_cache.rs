use std::future::Future;

use chrono::{Duration, Utc};
use log::*;
use settle_common::Secret;
use tokio::sync::Mutex;

use crate::{data_objects::AccessToken, MomoApiError};

/// Process-wide cache for the gateway access token.
///
/// Refreshes are single-flight: the cache lock is held for the whole credential exchange, so callers that arrive while
/// a refresh is in progress wait for it and then reuse its result instead of issuing their own exchange.
pub struct TokenCache {
    current: Mutex<Option<AccessToken>>,
    margin: Duration,
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(Duration::seconds(30))
    }
}

impl TokenCache {
    pub fn new(margin: Duration) -> Self {
        Self { current: Mutex::new(None), margin }
    }

    /// Returns the cached token if it is still usable, otherwise awaits `refresh`, caches and returns its result.
    /// A failed refresh leaves the cache empty.
    pub async fn get_or_refresh<F, Fut>(&self, refresh: F) -> Result<Secret<String>, MomoApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AccessToken, MomoApiError>>,
    {
        let mut current = self.current.lock().await;
        if let Some(token) = current.as_ref() {
            if token.is_usable_at(Utc::now(), self.margin) {
                trace!("📡️ Using cached gateway token");
                return Ok(token.token.clone());
            }
            debug!("📡️ Gateway token expired at {}. Refreshing.", token.expires_at);
        }
        *current = None;
        let token = refresh().await?;
        debug!("📡️ New gateway token cached. Expires at {}", token.expires_at);
        let result = token.token.clone();
        *current = Some(token);
        Ok(result)
    }

    /// Drops the cached token, e.g. after the gateway rejected it.
    pub async fn invalidate(&self) {
        let mut current = self.current.lock().await;
        if current.take().is_some() {
            debug!("📡️ Gateway token invalidated");
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;

    fn counting_refresh(
        count: Arc<AtomicUsize>,
        lifetime: Duration,
    ) -> impl Future<Output = Result<AccessToken, MomoApiError>> {
        async move {
            let n = count.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            Ok(AccessToken::new(format!("token-{n}"), Utc::now() + lifetime))
        }
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let cache = Arc::new(TokenCache::default());
        let count = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..10 {
            let cache = Arc::clone(&cache);
            let count = Arc::clone(&count);
            handles.push(tokio::spawn(async move {
                cache.get_or_refresh(|| counting_refresh(count, Duration::hours(1))).await
            }));
        }
        for h in handles {
            let token = h.await.unwrap().unwrap();
            assert_eq!(token.reveal(), "token-1");
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_tokens_are_refreshed() {
        let cache = TokenCache::new(Duration::seconds(30));
        let count = Arc::new(AtomicUsize::new(0));
        // Lives for less than the safety margin, so it is stale as soon as it is cached
        let t1 = cache.get_or_refresh(|| counting_refresh(count.clone(), Duration::seconds(10))).await.unwrap();
        let t2 = cache.get_or_refresh(|| counting_refresh(count.clone(), Duration::hours(1))).await.unwrap();
        let t3 = cache.get_or_refresh(|| counting_refresh(count.clone(), Duration::hours(1))).await.unwrap();
        assert_eq!(t1.reveal(), "token-1");
        assert_eq!(t2.reveal(), "token-2");
        assert_eq!(t3.reveal(), "token-2");
        cache.invalidate().await;
        let t4 = cache.get_or_refresh(|| counting_refresh(count.clone(), Duration::hours(1))).await.unwrap();
        assert_eq!(t4.reveal(), "token-3");
    }

    #[tokio::test]
    async fn failed_refresh_is_not_cached() {
        let cache = TokenCache::default();
        let err = cache
            .get_or_refresh(|| async { Err(MomoApiError::Authentication("bad credentials".into())) })
            .await
            .expect_err("refresh should fail");
        assert!(matches!(err, MomoApiError::Authentication(_)));
        let count = Arc::new(AtomicUsize::new(0));
        let token = cache.get_or_refresh(|| counting_refresh(count.clone(), Duration::hours(1))).await.unwrap();
        assert_eq!(token.reveal(), "token-1");
    }
}
