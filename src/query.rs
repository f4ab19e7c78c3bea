//! Lazy paginated query cache.
//!
//! Portal list endpoints are paginated server-side. [`QueryResult`] fronts
//! one such query: it learns the total length from a one-item probe, then
//! fetches whole pages on demand and caches every record it has seen, so
//! random access, slicing and iteration never refetch a page.

use std::collections::BTreeMap;
use std::marker::PhantomData;

use async_trait::async_trait;
use futures_util::stream::{Stream, try_unfold};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, trace};

use crate::error::{Error, Result};

/// Default records per fetched page.
pub const DEFAULT_PAGE_SIZE: usize = 15;

/// One page of a paginated portal response.
#[derive(Debug, Clone)]
pub struct Page {
    /// Total number of records in the full result set.
    pub total: usize,
    /// The raw records on this page.
    pub items: Vec<Value>,
}

/// Fetches one page of a fixed query.
///
/// Implementations capture the query parameters; `QueryResult` only varies
/// the page number and page size. Pages are numbered from 1.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, page: usize, count: usize) -> Result<Page>;
}

/// A lazily-fetched, cached view over a paginated query.
///
/// Raw records are decoded into `T` as their page arrives. Indexing accepts
/// negative values counting from the end, as does [`slice`](Self::slice).
/// All accessors take `&mut self` because they may populate the cache.
pub struct QueryResult<T = Value> {
    fetcher: Box<dyn PageFetcher>,
    page_size: usize,
    /// `None` until the probe request has run.
    length: Option<usize>,
    cache: BTreeMap<usize, T>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> QueryResult<T>
where
    T: DeserializeOwned + Clone + Send,
{
    #[must_use]
    pub fn new(fetcher: Box<dyn PageFetcher>) -> Self {
        Self::with_page_size(fetcher, DEFAULT_PAGE_SIZE)
    }

    #[must_use]
    pub fn with_page_size(fetcher: Box<dyn PageFetcher>, page_size: usize) -> Self {
        Self {
            fetcher,
            page_size: page_size.max(1),
            length: None,
            cache: BTreeMap::new(),
            _marker: PhantomData,
        }
    }

    /// Total number of records, probing the server on first call.
    ///
    /// The probe asks for a single record and keeps only the reported
    /// total; the record itself is refetched later at page granularity.
    pub async fn len(&mut self) -> Result<usize> {
        if let Some(len) = self.length {
            return Ok(len);
        }
        let page = self.fetcher.fetch_page(1, 1).await?;
        debug!(total = page.total, "probed query length");
        self.length = Some(page.total);
        Ok(page.total)
    }

    pub async fn is_empty(&mut self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Returns the record at `index`. Negative indices count from the end.
    pub async fn get(&mut self, index: isize) -> Result<T> {
        let len = self.len().await?;
        let resolved = resolve_index(index, len)
            .ok_or(Error::IndexOutOfRange { index, len })?;
        self.fill(resolved, resolved + 1).await?;
        self.cache
            .get(&resolved)
            .cloned()
            .ok_or(Error::IndexOutOfRange { index, len })
    }

    /// Returns the records in `[start, end)` after Python-style slice
    /// normalization: negative bounds count from the end, out-of-range
    /// bounds clamp, and an inverted range is empty.
    pub async fn slice(&mut self, start: Option<isize>, end: Option<isize>) -> Result<Vec<T>> {
        let len = self.len().await?;
        let start = clamp_bound(start.unwrap_or(0), len);
        let end = clamp_bound(end.unwrap_or(len as isize), len);
        if start >= end {
            return Ok(Vec::new());
        }
        self.fill(start, end).await?;
        Ok((start..end)
            .filter_map(|i| self.cache.get(&i).cloned())
            .collect())
    }

    /// Returns every record.
    pub async fn all(&mut self) -> Result<Vec<T>> {
        self.slice(None, None).await
    }

    /// Drops every cached record and the cached length; the next access
    /// probes and refetches.
    pub fn flush_cache(&mut self) {
        self.length = None;
        self.cache.clear();
    }

    /// A [`Stream`] over every record in order, reusing the cache.
    ///
    /// Each call starts over from index 0, so iteration is restartable;
    /// records fetched by a previous walk are not refetched.
    pub fn stream(&mut self) -> impl Stream<Item = Result<T>> + '_ {
        try_unfold((self, 0usize), |(result, index)| async move {
            if index >= result.len().await? {
                return Ok(None);
            }
            let item = result.get(index as isize).await?;
            Ok(Some((item, (result, index + 1))))
        })
    }

    /// Converts into an owned [`Stream`] yielding every record in order.
    pub fn into_stream(self) -> impl Stream<Item = Result<T>> {
        try_unfold((self, 0usize), |(mut result, index)| async move {
            if index >= result.len().await? {
                return Ok(None);
            }
            let item = result.get(index as isize).await?;
            Ok(Some((item, (result, index + 1))))
        })
    }

    /// Fetches pages until every index in `[start, end)` is cached.
    #[instrument(level = "trace", skip(self))]
    async fn fill(&mut self, start: usize, end: usize) -> Result<()> {
        while let Some(gap) = (start..end).find(|i| !self.cache.contains_key(i)) {
            let page_number = gap / self.page_size + 1;
            trace!(gap, page = page_number, "filling cache gap");
            let page = self
                .fetcher
                .fetch_page(page_number, self.page_size)
                .await?;
            let base = (page_number - 1) * self.page_size;
            for (offset, item) in page.items.into_iter().enumerate() {
                self.cache.insert(base + offset, serde_json::from_value(item)?);
            }
            // A page that does not cover its own gap means the server's
            // reported total overstates reality; bail rather than loop.
            if !self.cache.contains_key(&gap) {
                return Err(Error::IndexOutOfRange {
                    index: gap as isize,
                    len: self.cache.len(),
                });
            }
        }
        Ok(())
    }
}

impl<T> std::fmt::Debug for QueryResult<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResult")
            .field("page_size", &self.page_size)
            .field("length", &self.length)
            .field("cached", &self.cache.len())
            .finish()
    }
}

fn resolve_index(index: isize, len: usize) -> Option<usize> {
    let resolved = if index < 0 {
        index.checked_add(len as isize)?
    } else {
        index
    };
    (0..len as isize).contains(&resolved).then_some(resolved as usize)
}

fn clamp_bound(bound: isize, len: usize) -> usize {
    let len = len as isize;
    let resolved = if bound < 0 { bound + len } else { bound };
    resolved.clamp(0, len) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::TryStreamExt;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves `total` synthetic records and counts fetches.
    struct MockFetcher {
        total: usize,
        fetches: AtomicUsize,
    }

    impl MockFetcher {
        fn new(total: usize) -> Self {
            Self {
                total,
                fetches: AtomicUsize::new(0),
            }
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PageFetcher for &MockFetcher {
        async fn fetch_page(&self, page: usize, count: usize) -> Result<Page> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let start = (page - 1) * count;
            let items = (start..(start + count).min(self.total))
                .map(|i| Value::from(i as u64))
                .collect();
            Ok(Page {
                total: self.total,
                items,
            })
        }
    }

    fn query(fetcher: &'static MockFetcher, page_size: usize) -> QueryResult<Value> {
        QueryResult::with_page_size(Box::new(fetcher), page_size)
    }

    fn leak(total: usize) -> &'static MockFetcher {
        Box::leak(Box::new(MockFetcher::new(total)))
    }

    #[tokio::test]
    async fn probe_reports_length_without_caching() {
        let fetcher = leak(42);
        let mut q = query(fetcher, 10);

        assert_eq!(q.len().await.unwrap(), 42);
        assert_eq!(q.len().await.unwrap(), 42);
        assert_eq!(fetcher.fetch_count(), 1);
    }

    #[tokio::test]
    async fn indexing_fetches_whole_pages_and_caches() {
        let fetcher = leak(42);
        let mut q = query(fetcher, 10);

        assert_eq!(q.get(0).await.unwrap(), Value::from(0));
        // probe + page 1
        assert_eq!(fetcher.fetch_count(), 2);

        // same page, no new fetch
        assert_eq!(q.get(9).await.unwrap(), Value::from(9));
        assert_eq!(fetcher.fetch_count(), 2);

        assert_eq!(q.get(10).await.unwrap(), Value::from(10));
        assert_eq!(fetcher.fetch_count(), 3);
    }

    #[tokio::test]
    async fn negative_index_counts_from_end() {
        let fetcher = leak(42);
        let mut q = query(fetcher, 10);

        assert_eq!(q.get(-1).await.unwrap(), Value::from(41));
        assert_eq!(q.get(-42).await.unwrap(), Value::from(0));
    }

    #[tokio::test]
    async fn out_of_range_index_errors() {
        let fetcher = leak(5);
        let mut q = query(fetcher, 10);

        assert!(matches!(
            q.get(5).await,
            Err(Error::IndexOutOfRange { index: 5, len: 5 })
        ));
        assert!(matches!(
            q.get(-6).await,
            Err(Error::IndexOutOfRange { index: -6, len: 5 })
        ));
    }

    #[tokio::test]
    async fn slice_clamps_and_supports_negative_bounds() {
        let fetcher = leak(20);
        let mut q = query(fetcher, 10);

        let items = q.slice(Some(-5), None).await.unwrap();
        assert_eq!(items.len(), 5);
        assert_eq!(items[0], Value::from(15));

        let items = q.slice(Some(0), Some(100)).await.unwrap();
        assert_eq!(items.len(), 20);

        assert!(q.slice(Some(10), Some(5)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn slice_spanning_pages_fetches_each_page_once() {
        let fetcher = leak(35);
        let mut q = query(fetcher, 10);

        let items = q.slice(Some(5), Some(25)).await.unwrap();
        assert_eq!(items.len(), 20);
        // probe + pages 1, 2, 3
        assert_eq!(fetcher.fetch_count(), 4);

        q.slice(Some(5), Some(25)).await.unwrap();
        assert_eq!(fetcher.fetch_count(), 4);
    }

    #[tokio::test]
    async fn flush_cache_forces_refetch() {
        let fetcher = leak(10);
        let mut q = query(fetcher, 10);

        q.get(0).await.unwrap();
        assert_eq!(fetcher.fetch_count(), 2);

        q.flush_cache();
        q.get(0).await.unwrap();
        assert_eq!(fetcher.fetch_count(), 4);
    }

    #[tokio::test]
    async fn restartable_stream_reuses_the_cache() {
        let fetcher = leak(12);
        let mut q = query(fetcher, 10);

        let first: Vec<Value> = q.stream().try_collect().await.unwrap();
        assert_eq!(first.len(), 12);
        let fetches = fetcher.fetch_count();

        let second: Vec<Value> = q.stream().try_collect().await.unwrap();
        assert_eq!(second, first);
        assert_eq!(fetcher.fetch_count(), fetches);
    }

    #[tokio::test]
    async fn stream_yields_all_records_in_order() {
        let fetcher = leak(23);
        let q = query(fetcher, 10);

        let items: Vec<Value> = q.into_stream().try_collect().await.unwrap();
        assert_eq!(items.len(), 23);
        assert_eq!(items[0], Value::from(0));
        assert_eq!(items[22], Value::from(22));
    }

    #[derive(Debug, Clone, Deserialize, PartialEq)]
    struct Record {
        id: u64,
    }

    struct TypedFetcher;

    #[async_trait]
    impl PageFetcher for TypedFetcher {
        async fn fetch_page(&self, page: usize, count: usize) -> Result<Page> {
            let start = (page - 1) * count;
            let items = (start..(start + count).min(4))
                .map(|i| serde_json::json!({"id": i as u64}))
                .collect();
            Ok(Page { total: 4, items })
        }
    }

    #[tokio::test]
    async fn records_decode_into_the_target_type() {
        let mut q: QueryResult<Record> = QueryResult::with_page_size(Box::new(TypedFetcher), 2);
        assert_eq!(q.get(3).await.unwrap(), Record { id: 3 });
    }

    struct MalformedFetcher;

    #[async_trait]
    impl PageFetcher for MalformedFetcher {
        async fn fetch_page(&self, _page: usize, _count: usize) -> Result<Page> {
            Ok(Page {
                total: 1,
                items: vec![serde_json::json!({"id": "not a number"})],
            })
        }
    }

    #[tokio::test]
    async fn malformed_record_is_a_decode_error() {
        let mut q: QueryResult<Record> = QueryResult::new(Box::new(MalformedFetcher));
        assert!(matches!(q.get(0).await, Err(Error::Decode(_))));
    }

    /// Overstated totals must not loop forever.
    struct LyingFetcher;

    #[async_trait]
    impl PageFetcher for LyingFetcher {
        async fn fetch_page(&self, page: usize, count: usize) -> Result<Page> {
            let items = if page == 1 {
                (0..count.min(3)).map(|i| Value::from(i as u64)).collect()
            } else {
                Vec::new()
            };
            Ok(Page { total: 100, items })
        }
    }

    #[tokio::test]
    async fn short_page_is_an_error_not_a_loop() {
        let mut q: QueryResult<Value> = QueryResult::with_page_size(Box::new(LyingFetcher), 10);
        assert!(matches!(
            q.get(50).await,
            Err(Error::IndexOutOfRange { .. })
        ));
    }

    #[tokio::test]
    async fn empty_result_set() {
        let fetcher = leak(0);
        let mut q = query(fetcher, 10);
        assert!(q.is_empty().await.unwrap());
        assert!(q.all().await.unwrap().is_empty());
    }
}
