//! Friend request actions.
//!
//! A card's state is always derived from the server's view of the two
//! request lists (see [`RecommendedUser::relationship`]). Sending a request
//! never flips that state locally: on success the recommendation streams are
//! invalidated and the next fetch carries the new request.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use streamify_common::non_api_structs::Relationship;
use streamify_common::{FriendRequest, FriendRequestId, RecommendedUser, UserId};
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::cache::{keys, QueryCache};
use crate::error::{ApiError, ErrorKind};
use crate::notify::Notifier;

pub const SENT_MESSAGE: &str = "Success sending friend request";
pub const SEND_FAILED_MESSAGE: &str = "Failed to send friend request!";
pub const ACCEPTED_MESSAGE: &str = "Friend request accepted";
pub const ACCEPT_FAILED_MESSAGE: &str = "Failed to accept friend request!";

#[allow(async_fn_in_trait)]
pub trait FriendRequestApi {
    async fn create_friend_request(&self, recipient: &UserId) -> Result<(), ApiError>;
    async fn accept_friend_request(&self, id: &FriendRequestId) -> Result<FriendRequest, ApiError>;
}

impl FriendRequestApi for ApiClient {
    async fn create_friend_request(&self, recipient: &UserId) -> Result<(), ApiError> {
        ApiClient::create_friend_request(self, recipient).await
    }

    async fn accept_friend_request(&self, id: &FriendRequestId) -> Result<FriendRequest, ApiError> {
        ApiClient::accept_friend_request(self, id).await
    }
}

#[derive(Eq, PartialEq, Clone, Copy, Debug)]
pub enum SendOutcome {
    Sent,
    /// A request for this candidate is already on its way; nothing was sent.
    InFlight,
    /// The card was not in a requestable state; nothing was sent.
    NotRequestable(Relationship),
}

pub struct FriendRequestActions<A> {
    api: A,
    cache: QueryCache,
    notifier: Arc<dyn Notifier>,
    sending: Arc<Mutex<HashSet<UserId>>>,
}

struct SendingGuard {
    sending: Arc<Mutex<HashSet<UserId>>>,
    candidate: UserId,
}

impl Drop for SendingGuard {
    fn drop(&mut self) {
        self.sending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.candidate);
    }
}

impl<A: FriendRequestApi> FriendRequestActions<A> {
    pub fn new(api: A, cache: QueryCache, notifier: Arc<dyn Notifier>) -> Self {
        Self { api, cache, notifier, sending: Default::default() }
    }

    /// Whether the action control for `candidate` must be disabled.
    pub fn is_sending(&self, candidate: &UserId) -> bool {
        self.sending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(candidate)
    }

    fn begin(&self, candidate: &UserId) -> Option<SendingGuard> {
        let inserted = self
            .sending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(candidate.clone());
        inserted.then(|| SendingGuard {
            sending: self.sending.clone(),
            candidate: candidate.clone(),
        })
    }

    pub async fn send_request(&self, candidate: &RecommendedUser) -> Result<SendOutcome, ApiError> {
        let relationship = candidate.relationship();
        if !relationship.is_requestable() {
            return Ok(SendOutcome::NotRequestable(relationship));
        }
        let id = &candidate.user.id;
        let Some(_guard) = self.begin(id) else {
            return Ok(SendOutcome::InFlight);
        };
        match self.api.create_friend_request(id).await {
            Ok(()) => {
                info!(candidate = %id, "friend request sent");
                self.notifier.success(SENT_MESSAGE);
                self.cache.invalidate(&keys::recommended());
                Ok(SendOutcome::Sent)
            }
            Err(err) => {
                warn!(candidate = %id, %err, "friend request failed");
                self.notifier.error(SEND_FAILED_MESSAGE);
                Err(err)
            }
        }
    }

    /// Accepts an incoming request. Both users' friend lists and the
    /// recommendations change, so every user stream is invalidated along
    /// with the incoming list.
    pub async fn accept_request(&self, id: &FriendRequestId) -> Result<FriendRequest, ApiError> {
        match self.api.accept_friend_request(id).await {
            Ok(request) => {
                info!(request = %id.as_ref(), "friend request accepted");
                self.notifier.success(ACCEPTED_MESSAGE);
                self.cache.invalidate(&keys::incoming_requests());
                self.cache.invalidate(&keys::all_users());
                Ok(request)
            }
            Err(err) => {
                warn!(request = %id.as_ref(), %err, "accepting friend request failed");
                if err.kind() != ErrorKind::NotFound {
                    self.notifier.error(ACCEPT_FAILED_MESSAGE);
                }
                Err(err)
            }
        }
    }
}
