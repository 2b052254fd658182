//! Lazily extended, order preserving page streams stored in the [`QueryCache`].

use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use streamify_common::{Metadata, Page};
use tracing::debug;

use crate::cache::{CachedValue, Observation, QueryCache, QueryKey, Refetch, SharedFetch};
use crate::error::ApiError;

pub const MAX_PAGE: u32 = 100;
pub const MAX_PAGE_SIZE: u32 = 1000;

#[derive(Eq, PartialEq, Clone, Debug)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
    pub query: String,
}

impl PageRequest {
    /// Clamps `page_size` into the range the server accepts. The page number
    /// is only raised to 1; it is never rewritten downwards.
    pub fn new(page: u32, page_size: u32, query: impl Into<String>) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            query: query.into(),
        }
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("page_size", self.page_size.to_string()),
            ("page", self.page.to_string()),
            ("query", self.query.clone()),
        ]
    }
}

/// The page after `metadata`, if the server reports one and it is still
/// within the pages the server serves. Past [`MAX_PAGE`] the stream ends.
fn next_page(metadata: &Metadata) -> Option<u32> {
    metadata.next_page().filter(|page| *page <= MAX_PAGE)
}

/// Describes how to fetch one page. Holds no results.
pub trait PageFetcher<T>: Send + Sync + 'static {
    fn fetch(&self, request: PageRequest) -> BoxFuture<'static, Result<Page<T>, ApiError>>;
}

impl<T, F, Fut> PageFetcher<T> for F
where
    F: Fn(PageRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Page<T>, ApiError>> + Send + 'static,
{
    fn fetch(&self, request: PageRequest) -> BoxFuture<'static, Result<Page<T>, ApiError>> {
        self(request).boxed()
    }
}

/// Pages of one stream, in the order they were fetched.
#[derive(Clone, Debug, PartialEq)]
pub struct InfinitePages<T> {
    pages: Vec<Page<T>>,
}

impl<T> Default for InfinitePages<T> {
    fn default() -> Self {
        Self { pages: Vec::new() }
    }
}

impl<T: Clone> InfinitePages<T> {
    pub fn pages(&self) -> &[Page<T>] {
        &self.pages
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.pages.iter().flat_map(|page| page.items.iter())
    }

    pub fn items(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.pages.iter().map(|page| page.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn next_page(&self) -> Option<u32> {
        next_page(&self.pages.last()?.metadata)
    }

    pub fn has_next_page(&self) -> bool {
        self.next_page().is_some()
    }

    pub fn total_records(&self) -> u64 {
        self.pages.first().map_or(0, |page| page.metadata.total_records)
    }

    fn appended(&self, page: Page<T>) -> Self {
        let mut pages = self.pages.clone();
        pages.push(page);
        Self { pages }
    }
}

struct Source<T> {
    fetcher: Arc<dyn PageFetcher<T>>,
    page_size: u32,
}

impl<T> Clone for Source<T> {
    fn clone(&self) -> Self {
        Self { fetcher: self.fetcher.clone(), page_size: self.page_size }
    }
}

impl<T: Clone + Send + Sync + 'static> Source<T> {
    fn request(&self, page: u32, filter: &str) -> BoxFuture<'static, Result<Page<T>, ApiError>> {
        self.fetcher.fetch(PageRequest::new(page, self.page_size, filter))
    }

    /// Refetches the first `extent` pages in order, stopping early when the
    /// server reports fewer.
    fn refetch(
        &self,
        filter: String,
        extent: usize,
    ) -> BoxFuture<'static, Result<CachedValue, ApiError>> {
        let source = self.clone();
        async move {
            let mut pages = InfinitePages::default();
            let mut next = Some(1);
            while let Some(page) = next {
                debug!(page, %filter, "fetching page");
                let fetched = source.request(page, &filter).await?;
                next = next_page(&fetched.metadata);
                pages.pages.push(fetched);
                if pages.pages.len() >= extent.max(1) {
                    break;
                }
            }
            Ok::<CachedValue, ApiError>(Arc::new(pages))
        }
        .boxed()
    }

    fn refetcher(&self, filter: String) -> Refetch {
        let source = self.clone();
        Arc::new(move |current: Option<CachedValue>| {
            let extent = loaded_pages::<T>(current.as_ref());
            source.refetch(filter.clone(), extent)
        })
    }
}

fn loaded_pages<T: Send + Sync + 'static>(current: Option<&CachedValue>) -> usize {
    current
        .and_then(|value| value.downcast_ref::<InfinitePages<T>>())
        .map_or(0, |pages| pages.pages.len())
}

/// One paginated collection observed through the cache. The filter value is
/// the last segment of the cache key, so each filter has its own pages.
pub struct InfiniteQuery<T> {
    cache: QueryCache,
    base_key: QueryKey,
    filter: String,
    source: Source<T>,
    observation: Observation,
}

impl<T: Clone + Send + Sync + 'static> InfiniteQuery<T> {
    pub fn new(
        cache: QueryCache,
        base_key: QueryKey,
        page_size: u32,
        fetcher: impl PageFetcher<T>,
    ) -> Self {
        Self::with_filter(cache, base_key, page_size, fetcher, "")
    }

    pub fn with_filter(
        cache: QueryCache,
        base_key: QueryKey,
        page_size: u32,
        fetcher: impl PageFetcher<T>,
        filter: impl Into<String>,
    ) -> Self {
        let filter = filter.into();
        let source = Source { fetcher: Arc::new(fetcher), page_size };
        let key = base_key.clone().with(filter.clone());
        let observation = cache.observe(key, source.refetcher(filter.clone()));
        Self { cache, base_key, filter, source, observation }
    }

    pub fn key(&self) -> &QueryKey {
        self.observation.key()
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Switches to the stream for `filter`. The previous key stops being
    /// observed, which abandons its in-flight request. Returns whether the
    /// key changed.
    pub fn set_filter(&mut self, filter: &str) -> bool {
        if filter == self.filter {
            return false;
        }
        debug!(from = %self.filter, to = %filter, "filter changed");
        self.filter = filter.to_string();
        let key = self.base_key.clone().with(filter);
        self.observation = self.cache.observe(key, self.source.refetcher(self.filter.clone()));
        true
    }

    pub fn data(&self) -> Option<Arc<InfinitePages<T>>> {
        self.cache.get(self.key())
    }

    pub fn items(&self) -> Vec<T> {
        self.data().map(|pages| pages.items()).unwrap_or_default()
    }

    pub fn has_next_page(&self) -> bool {
        self.data().map_or(false, |pages| pages.has_next_page())
    }

    pub fn is_fetching(&self) -> bool {
        self.cache.is_fetching(self.key())
    }

    pub fn is_stale(&self) -> bool {
        self.cache.is_stale(self.key())
    }

    /// Loads (or reloads) every page currently held, starting from page 1.
    pub fn refetch(&self) -> SharedFetch {
        let source = self.source.clone();
        let filter = self.filter.clone();
        self.cache.run(self.key(), move |current| {
            let extent = loaded_pages::<T>(current.as_ref());
            source.refetch(filter, extent)
        })
    }

    /// Fetches when there is no data yet or the data was invalidated.
    pub fn ensure_loaded(&self) -> Option<SharedFetch> {
        self.is_stale().then(|| self.refetch())
    }

    /// Requests the page after the last one held. Returns `None` once the
    /// last page has been reached. The next page number is only known after
    /// the previous page resolved, and a request already running for this
    /// key is joined rather than duplicated.
    pub fn fetch_next_page(&self) -> Option<SharedFetch> {
        if self.data().is_some() && !self.has_next_page() {
            return None;
        }
        let source = self.source.clone();
        let filter = self.filter.clone();
        Some(self.cache.run(self.key(), move |value| {
            let held = value.and_then(|value| value.downcast::<InfinitePages<T>>().ok());
            match held {
                Some(held) => match held.next_page() {
                    Some(page) => async move {
                        debug!(page, %filter, "fetching next page");
                        let fetched = source.request(page, &filter).await?;
                        Ok::<CachedValue, ApiError>(Arc::new(held.appended(fetched)))
                    }
                    .boxed(),
                    None => async move { Ok::<CachedValue, ApiError>(held) }.boxed(),
                },
                None => source.refetch(filter, 1),
            }
        }))
    }
}
