//! Deferred field resolution.
//!
//! Some portal records are cheap to list but expensive to complete: the
//! expensive half lives behind a second request. [`Deferred`] wraps that
//! second request so the record can be constructed immediately and the
//! remote half fetched on first access, at most once.

use futures_util::future::BoxFuture;
use std::fmt;
use tokio::sync::OnceCell;

use crate::error::Result;

type Loader<T> = Box<dyn Fn() -> BoxFuture<'static, Result<T>> + Send + Sync>;

/// A value fetched lazily on first access.
///
/// The loader runs at most once per instance; a successful result is
/// memoized and shared by every subsequent [`get`](Self::get). A failed
/// load is not memoized, so the next access retries.
pub struct Deferred<T> {
    cell: OnceCell<T>,
    loader: Loader<T>,
}

impl<T> Deferred<T> {
    /// Wraps a loader closure. The closure is invoked lazily, on the first
    /// `get`, and produces an owned future each time it is retried.
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<T>> + Send + Sync + 'static,
    {
        Self {
            cell: OnceCell::new(),
            loader: Box::new(loader),
        }
    }

    /// Wraps an already known value; `get` never runs a loader.
    #[must_use]
    pub fn resolved(value: T) -> Self {
        Self {
            cell: OnceCell::new_with(Some(value)),
            loader: Box::new(|| unreachable!("loader of a pre-resolved Deferred")),
        }
    }

    /// Returns the value, running the loader first if it has not produced
    /// one yet. Concurrent callers share a single load.
    pub async fn get(&self) -> Result<&T> {
        self.cell.get_or_try_init(|| (self.loader)()).await
    }

    /// True once a load has completed successfully.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.cell.initialized()
    }
}

impl<T: fmt::Debug> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.get() {
            Some(value) => f.debug_tuple("Deferred").field(value).finish(),
            None => f.write_str("Deferred(<unresolved>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: Arc<AtomicUsize>) -> Deferred<u32> {
        Deferred::new(move || {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(42)
            })
        })
    }

    #[tokio::test]
    async fn loader_runs_once_across_repeated_gets() {
        let calls = Arc::new(AtomicUsize::new(0));
        let deferred = counting(Arc::clone(&calls));

        assert!(!deferred.is_resolved());
        assert_eq!(*deferred.get().await.unwrap(), 42);
        assert_eq!(*deferred.get().await.unwrap(), 42);
        assert_eq!(*deferred.get().await.unwrap(), 42);

        assert!(deferred.is_resolved());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_load_is_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let deferred: Deferred<u32> = Deferred::new(move || {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(Error::recognizer("first try fails"))
                } else {
                    Ok(7)
                }
            })
        });

        assert!(deferred.get().await.is_err());
        assert!(!deferred.is_resolved());
        assert_eq!(*deferred.get().await.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn resolved_never_calls_loader() {
        let deferred = Deferred::resolved("ready".to_owned());
        assert!(deferred.is_resolved());
        assert_eq!(deferred.get().await.unwrap(), "ready");
    }
}
