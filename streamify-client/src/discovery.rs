//! Recommendation screen: search filter, paginated recommendations, the
//! infinite scroll sentinel and the per-card friend request action.

use std::sync::Arc;

use streamify_common::non_api_structs::{CardAction, Relationship};
use streamify_common::{RecommendedUser, UserId};
use tokio::sync::mpsc;
use tracing::debug;

use crate::cache::{keys, QueryCache, SharedFetch};
use crate::error::ApiError;
use crate::friend_request::{FriendRequestActions, FriendRequestApi, SendOutcome};
use crate::notify::Notifier;
use crate::pagination::{InfiniteQuery, PageFetcher};
use crate::scroll::InfiniteScroll;
use crate::validation::SERVER_ERROR_MESSAGE;

#[derive(Clone, Debug, PartialEq)]
pub struct RecommendationCard {
    pub user: RecommendedUser,
    pub relationship: Relationship,
    pub action: CardAction,
    /// The action control must not accept input.
    pub disabled: bool,
}

pub struct Discovery<A> {
    recommendations: InfiniteQuery<RecommendedUser>,
    scroll: InfiniteScroll,
    actions: FriendRequestActions<A>,
    notifier: Arc<dyn Notifier>,
}

impl<A: FriendRequestApi> Discovery<A> {
    pub fn new(
        cache: QueryCache,
        fetcher: impl PageFetcher<RecommendedUser>,
        page_size: u32,
        api: A,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            recommendations: InfiniteQuery::new(
                cache.clone(),
                keys::recommended(),
                page_size,
                fetcher,
            ),
            scroll: InfiniteScroll::new(),
            actions: FriendRequestActions::new(api, cache, notifier.clone()),
            notifier,
        }
    }

    pub fn recommendations(&self) -> &InfiniteQuery<RecommendedUser> {
        &self.recommendations
    }

    pub fn actions(&self) -> &FriendRequestActions<A> {
        &self.actions
    }

    pub fn filter(&self) -> &str {
        self.recommendations.filter()
    }

    /// Waits for a fetch and surfaces its failure. Accumulated cards are kept
    /// either way.
    pub async fn settle(&self, fetch: SharedFetch) -> Result<(), ApiError> {
        let result = fetch.await;
        if let Err(err) = &result {
            if err.should_notify() {
                self.notifier.error(SERVER_ERROR_MESSAGE);
            }
        }
        result
    }

    /// Loads the current filter's first page, or reloads it after an
    /// invalidation.
    pub async fn load(&self) -> Result<(), ApiError> {
        match self.recommendations.ensure_loaded() {
            Some(fetch) => self.settle(fetch).await,
            None => Ok(()),
        }
    }

    /// Applies a stabilized filter value. A new value switches to a fresh
    /// stream starting at page 1.
    pub fn apply_filter(&mut self, filter: &str) -> Option<SharedFetch> {
        if !self.recommendations.set_filter(filter) {
            return None;
        }
        self.recommendations.ensure_loaded()
    }

    /// Consumes stabilized filter values until the channel closes.
    pub async fn follow_filter(&mut self, filters: &mut mpsc::UnboundedReceiver<String>) {
        while let Some(filter) = filters.recv().await {
            debug!(%filter, "applying filter");
            if let Some(fetch) = self.apply_filter(&filter) {
                let _ = self.settle(fetch).await;
            }
        }
    }

    pub fn set_sentinel_visible(&mut self, visible: bool) -> Option<SharedFetch> {
        self.scroll.set_visible(visible, &self.recommendations)
    }

    /// Re-evaluates the scroll rule after a page landed or the data changed.
    pub fn reevaluate_scroll(&self) -> Option<SharedFetch> {
        self.scroll.evaluate(&self.recommendations)
    }

    /// The sentinel is only rendered while more pages exist.
    pub fn shows_sentinel(&self) -> bool {
        self.recommendations.has_next_page()
    }

    pub fn cards(&self) -> Vec<RecommendationCard> {
        self.recommendations
            .items()
            .into_iter()
            .map(|user| {
                let relationship = user.relationship();
                let disabled = relationship.is_awaiting() || self.actions.is_sending(&user.user.id);
                RecommendationCard {
                    action: relationship.card_action(),
                    relationship,
                    disabled,
                    user,
                }
            })
            .collect()
    }

    pub fn card(&self, candidate: &UserId) -> Option<RecommendationCard> {
        self.cards().into_iter().find(|card| &card.user.user.id == candidate)
    }

    /// Sends a friend request from the card of `candidate`. Unknown candidates
    /// are reported as not found.
    pub async fn send_request(&self, candidate: &UserId) -> Result<SendOutcome, ApiError> {
        let card = self.card(candidate).ok_or(ApiError::NotFound)?;
        self.actions.send_request(&card.user).await
    }
}
