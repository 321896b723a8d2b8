// src/fetch/session.rs

//! Authenticated session state shared across a crawl run.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::error::{AppError, Result};

/// A pre-authenticated browsing context, reduced to the header state that
/// must accompany every request. Workers read it, never mutate it.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    cookie: String,
}

impl SessionHandle {
    pub fn new(cookie: impl Into<String>) -> Self {
        Self {
            cookie: cookie.into(),
        }
    }

    /// Load a saved session from a cookie file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        let cookie = content.trim();
        if cookie.is_empty() {
            return Err(AppError::config(format!(
                "session file {:?} is empty",
                path.as_ref()
            )));
        }
        Ok(Self::new(cookie))
    }

    /// Value for the `Cookie` request header.
    pub fn cookie_header(&self) -> &str {
        &self.cookie
    }
}

/// Source of fresh sessions when a mid-run expiry is detected.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn refresh(&self) -> Result<SessionHandle>;
}

/// Shared session slot with single-flight refresh.
///
/// When several detail workers detect an expired session at once, exactly
/// one refresh runs; the rest wait on the same lock and reuse its result
/// instead of herding the login endpoint. Callers record the generation
/// they fetched with and pass it to [`SessionCell::refresh_if_stale`], so
/// a worker that raced a completed refresh retries with the new session
/// instead of refreshing again.
pub struct SessionCell {
    current: RwLock<Option<SessionHandle>>,
    provider: Option<Arc<dyn SessionProvider>>,
    refresh_lock: Mutex<()>,
    generation: AtomicU64,
}

impl SessionCell {
    pub fn new(
        handle: Option<SessionHandle>,
        provider: Option<Arc<dyn SessionProvider>>,
    ) -> Self {
        Self {
            current: RwLock::new(handle),
            provider,
            refresh_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// Cell holding a fixed session with no refresh capability.
    pub fn with_handle(handle: SessionHandle) -> Self {
        Self::new(Some(handle), None)
    }

    /// Empty cell: no session, no provider.
    pub fn empty() -> Self {
        Self::new(None, None)
    }

    /// Whether a session is currently held.
    pub async fn is_present(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// Current `Cookie` header value, if a session is held.
    pub async fn cookie_header(&self) -> Option<String> {
        self.current
            .read()
            .await
            .as_ref()
            .map(|h| h.cookie_header().to_string())
    }

    /// Generation counter, bumped on every successful refresh.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Whether a refresh can be attempted at all.
    pub fn can_refresh(&self) -> bool {
        self.provider.is_some()
    }

    /// Replace the session unless someone already did since `seen`.
    pub async fn refresh_if_stale(&self, seen: u64) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;
        if self.generation.load(Ordering::Acquire) != seen {
            return Ok(());
        }

        let provider = self.provider.as_ref().ok_or_else(|| {
            AppError::crawl("session", "session expired and no refresh provider configured")
        })?;

        log::info!("Refreshing expired session");
        let handle = provider.refresh().await?;
        *self.current.write().await = Some(handle);
        self.generation.fetch_add(1, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingProvider {
        calls: AtomicU64,
    }

    #[async_trait]
    impl SessionProvider for CountingProvider {
        async fn refresh(&self) -> Result<SessionHandle> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Hold the refresh long enough for other callers to queue up
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            Ok(SessionHandle::new("sid=fresh"))
        }
    }

    #[tokio::test]
    async fn concurrent_refreshes_run_once() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicU64::new(0),
        });
        let cell = Arc::new(SessionCell::new(
            Some(SessionHandle::new("sid=stale")),
            Some(provider.clone() as Arc<dyn SessionProvider>),
        ));

        let seen = cell.generation();
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cell = Arc::clone(&cell);
                tokio::spawn(async move { cell.refresh_if_stale(seen).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cell.cookie_header().await.as_deref(), Some("sid=fresh"));
        assert_eq!(cell.generation(), seen + 1);
    }

    #[tokio::test]
    async fn stale_generation_skips_second_refresh() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicU64::new(0),
        });
        let cell = SessionCell::new(
            Some(SessionHandle::new("sid=stale")),
            Some(provider.clone() as Arc<dyn SessionProvider>),
        );

        let seen = cell.generation();
        cell.refresh_if_stale(seen).await.unwrap();
        // Same observed generation again: already handled, no second call
        cell.refresh_if_stale(seen).await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refresh_without_provider_errors() {
        let cell = SessionCell::with_handle(SessionHandle::new("sid=stale"));
        assert!(!cell.can_refresh());
        assert!(cell.refresh_if_stale(cell.generation()).await.is_err());
    }

    #[tokio::test]
    async fn empty_cell_reports_absent() {
        let cell = SessionCell::empty();
        assert!(!cell.is_present().await);
        assert_eq!(cell.cookie_header().await, None);
    }
}
