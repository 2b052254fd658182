use crate::cache::SharedFetch;
use crate::pagination::InfiniteQuery;

/// Level-triggered rule for loading the next page.
pub fn should_fetch_next(
    sentinel_visible: bool,
    has_next_page: bool,
    is_fetching_next_page: bool,
) -> bool {
    sentinel_visible && has_next_page && !is_fetching_next_page
}

/// Tracks visibility of the sentinel at the end of a rendered list and asks
/// the query for the next page when the rule holds. Call [`evaluate`] again
/// after every state change that could flip the rule, not just on visibility
/// changes.
///
/// [`evaluate`]: InfiniteScroll::evaluate
#[derive(Clone, Copy, Debug, Default)]
pub struct InfiniteScroll {
    sentinel_visible: bool,
}

impl InfiniteScroll {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_sentinel_visible(&self) -> bool {
        self.sentinel_visible
    }

    pub fn set_visible<T>(&mut self, visible: bool, query: &InfiniteQuery<T>) -> Option<SharedFetch>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.sentinel_visible = visible;
        self.evaluate(query)
    }

    pub fn evaluate<T>(&self, query: &InfiniteQuery<T>) -> Option<SharedFetch>
    where
        T: Clone + Send + Sync + 'static,
    {
        if should_fetch_next(self.sentinel_visible, query.has_next_page(), query.is_fetching()) {
            query.fetch_next_page()
        } else {
            None
        }
    }
}
