//! Process-wide store of query results keyed by [`QueryKey`].
//!
//! The cache is created once by the embedding application and handed by
//! clone to every component that reads or invalidates it. It lives for the
//! rest of the process.
//!
//! At most one request is in flight per key. A second caller asking for the
//! same key joins the running request instead of issuing its own. Requests
//! run on the tokio runtime whether or not anyone awaits them. Every entry
//! carries an epoch; invalidating or abandoning a key bumps it, and a result
//! that comes back for an older epoch is dropped instead of written.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, warn};

use crate::error::ApiError;

pub type CachedValue = Arc<dyn Any + Send + Sync>;

/// A request in flight for one key. Cloning it joins the same request.
pub type SharedFetch = Shared<BoxFuture<'static, Result<(), ApiError>>>;

/// Rebuilds an entry from scratch. Receives the entry's current value so it
/// can refetch the same extent of data.
pub type Refetch = Arc<
    dyn Fn(Option<CachedValue>) -> BoxFuture<'static, Result<CachedValue, ApiError>>
        + Send
        + Sync,
>;

#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Clone, Debug, Default)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn with(mut self, segment: impl Into<String>) -> Self {
        self.0.push(segment.into());
        self
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// Keys of the screens in this client.
pub mod keys {
    use super::QueryKey;

    pub fn all_users() -> QueryKey {
        QueryKey::new(["all:users"])
    }

    /// Prefix of every recommendation stream. Append the filter value to get
    /// one stream.
    pub fn recommended() -> QueryKey {
        all_users().with("recommended")
    }

    pub fn friends() -> QueryKey {
        all_users().with("friends")
    }

    pub fn incoming_requests() -> QueryKey {
        QueryKey::new(["incoming:friend:request"])
    }

    pub fn outgoing_requests() -> QueryKey {
        QueryKey::new(["outgoing:friend:request"])
    }
}

#[derive(Default)]
struct Entry {
    data: Option<CachedValue>,
    stale: bool,
    epoch: u64,
    in_flight: Option<SharedFetch>,
    /// Live observers in registration order, each with its own refetcher.
    observers: Vec<(u64, Refetch)>,
    next_observer: u64,
}

impl Entry {
    /// The longest-lived observer's refetcher.
    fn refetch(&self) -> Option<Refetch> {
        self.observers.first().map(|(_, refetch)| refetch.clone())
    }
}

#[derive(Clone, Default)]
pub struct QueryCache {
    entries: Arc<Mutex<HashMap<QueryKey, Entry>>>,
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.lock();
        f.debug_struct("QueryCache")
            .field("keys", &entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get<V: Any + Send + Sync>(&self, key: &QueryKey) -> Option<Arc<V>> {
        let data = self.lock().get(key)?.data.clone()?;
        data.downcast::<V>().ok()
    }

    pub fn set<V: Any + Send + Sync>(&self, key: QueryKey, value: V) {
        debug!(%key, "cache set");
        let mut entries = self.lock();
        let entry = entries.entry(key).or_default();
        entry.data = Some(Arc::new(value));
        entry.stale = false;
    }

    /// True when the key has no data or its data was invalidated.
    pub fn is_stale(&self, key: &QueryKey) -> bool {
        self.lock().get(key).map_or(true, |entry| entry.data.is_none() || entry.stale)
    }

    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.lock().get(key).map_or(false, |entry| entry.in_flight.is_some())
    }

    pub fn observer_count(&self, key: &QueryKey) -> usize {
        self.lock().get(key).map_or(0, |entry| entry.observers.len())
    }

    /// Starts a request for `key`, or joins the one already running.
    ///
    /// `make_op` is only called when no request is in flight. It receives the
    /// entry's current value and must return a lazy future; the result
    /// replaces the entry's value when it resolves. A failed request leaves
    /// the previous value in place.
    ///
    /// Inside a tokio runtime the request is driven by a spawned task, so the
    /// returned handle may be dropped. Outside one it only progresses while
    /// awaited.
    pub fn run<F>(&self, key: &QueryKey, make_op: F) -> SharedFetch
    where
        F: FnOnce(Option<CachedValue>) -> BoxFuture<'static, Result<CachedValue, ApiError>>,
    {
        let mut entries = self.lock();
        let entry = entries.entry(key.clone()).or_default();
        if let Some(in_flight) = &entry.in_flight {
            debug!(%key, "joining in-flight request");
            return in_flight.clone();
        }
        let op = make_op(entry.data.clone());
        let epoch = entry.epoch;
        let cache = self.clone();
        let owned_key = key.clone();
        let fetch = async move {
            let result = op.await;
            cache.complete(&owned_key, epoch, result)
        }
        .boxed()
        .shared();
        entry.in_flight = Some(fetch.clone());
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let driver = fetch.clone();
            handle.spawn(async move {
                let _ = driver.await;
            });
        }
        fetch
    }

    fn complete(
        &self,
        key: &QueryKey,
        epoch: u64,
        result: Result<CachedValue, ApiError>,
    ) -> Result<(), ApiError> {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(key).filter(|entry| entry.epoch == epoch) else {
            debug!(%key, epoch, "dropping superseded result");
            return Err(ApiError::Superseded);
        };
        entry.in_flight = None;
        match result {
            Ok(value) => {
                entry.data = Some(value);
                entry.stale = false;
                debug!(%key, "cache updated");
                Ok(())
            }
            Err(err) => {
                warn!(%key, %err, "fetch failed, keeping previous data");
                Err(err)
            }
        }
    }

    /// Marks every entry under `prefix` stale, drops their in-flight requests
    /// and starts a refetch for the observed ones. Does not wait for the
    /// refetches. Returns the number of entries marked.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut refetches = Vec::new();
        let mut marked = 0;
        {
            let mut entries = self.lock();
            for (key, entry) in entries.iter_mut().filter(|(key, _)| key.starts_with(prefix)) {
                entry.stale = true;
                entry.epoch += 1;
                entry.in_flight = None;
                marked += 1;
                if let Some(refetch) = entry.refetch() {
                    refetches.push((key.clone(), refetch));
                }
            }
        }
        debug!(%prefix, marked, refetching = refetches.len(), "invalidated");
        for (key, refetch) in refetches {
            self.spawn_refetch(&key, refetch);
        }
        marked
    }

    fn spawn_refetch(&self, key: &QueryKey, refetch: Refetch) {
        if tokio::runtime::Handle::try_current().is_err() {
            warn!(%key, "no runtime available, refetch deferred to next read");
            return;
        }
        let _ = self.run(key, |current| refetch(current));
    }

    /// Drops the in-flight request for `key` so its result is never written.
    /// Existing data is kept but marked stale.
    pub fn abandon(&self, key: &QueryKey) {
        if let Some(entry) = self.lock().get_mut(key) {
            if entry.in_flight.take().is_some() {
                debug!(%key, "abandoned in-flight request");
            }
            entry.epoch += 1;
            entry.stale = entry.stale || entry.data.is_some();
        }
    }

    /// Registers interest in `key`. While at least one observation is alive,
    /// invalidating the key refetches it with the refetcher of the oldest
    /// live observation. The last observation to drop abandons any request
    /// still in flight.
    pub fn observe(&self, key: QueryKey, refetch: Refetch) -> Observation {
        let id = {
            let mut entries = self.lock();
            let entry = entries.entry(key.clone()).or_default();
            let id = entry.next_observer;
            entry.next_observer += 1;
            entry.observers.push((id, refetch));
            id
        };
        Observation { cache: self.clone(), key, id }
    }

    fn unobserve(&self, key: &QueryKey, id: u64) {
        let remaining = {
            let mut entries = self.lock();
            let Some(entry) = entries.get_mut(key) else { return };
            entry.observers.retain(|(observer, _)| *observer != id);
            entry.observers.len()
        };
        if remaining == 0 {
            self.abandon(key);
        }
    }
}

/// Keeps a key observed until dropped.
pub struct Observation {
    cache: QueryCache,
    key: QueryKey,
    id: u64,
}

impl Observation {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }
}

impl Drop for Observation {
    fn drop(&mut self) {
        self.cache.unobserve(&self.key, self.id);
    }
}
