pub mod non_api_structs;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::non_api_structs::Relationship;

#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Clone, Debug, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct UserId(pub String);
impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Clone, Debug, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct FriendRequestId(pub String);
impl AsRef<str> for FriendRequestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A read replica of a user as returned by the API. The client never owns
/// authoritative user state.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub profile_pic: String,
    #[serde(default)]
    pub native_lng: String,
    #[serde(default)]
    pub learning_lng: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub is_onboarded: bool,
    #[serde(default)]
    pub friend_ids: Vec<UserId>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Eq, PartialEq, Hash, Clone, Copy, Debug, Serialize, Deserialize, Default)]
pub enum FriendRequestStatus {
    #[default]
    Pending,
    Accepted,
}

/// Status filter accepted by the friend-request list endpoints.
#[derive(Eq, PartialEq, Hash, Clone, Copy, Debug, Serialize, Deserialize, Default)]
pub enum StatusFilter {
    All,
    #[default]
    Pending,
    Accepted,
}
impl StatusFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusFilter::All => "All",
            StatusFilter::Pending => "Pending",
            StatusFilter::Accepted => "Accepted",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FriendRequest {
    pub id: FriendRequestId,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    #[serde(default)]
    pub status: FriendRequestStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FriendRequestWithSender {
    #[serde(flatten)]
    pub request: FriendRequest,
    pub sender: User,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FriendRequestWithRecipient {
    #[serde(flatten)]
    pub request: FriendRequest,
    pub recipient: User,
}

/// A candidate for friending, decorated with the requests pending between the
/// viewer and this user.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RecommendedUser {
    #[serde(flatten)]
    pub user: User,
    /// Requests the viewer sent to this user.
    #[serde(default)]
    pub sent_friend_request: Vec<FriendRequest>,
    /// Requests this user sent to the viewer.
    #[serde(default)]
    pub from_friend_request: Vec<FriendRequest>,
}
impl RecommendedUser {
    pub fn has_sent(&self) -> bool {
        !self.sent_friend_request.is_empty()
    }
    pub fn has_incoming(&self) -> bool {
        !self.from_friend_request.is_empty()
    }
    /// Computed from the two request lists of the fetched record. When both
    /// lists are populated the sent side wins.
    pub fn relationship(&self) -> Relationship {
        if self.has_sent() {
            Relationship::AwaitingSentConfirmation
        } else if self.has_incoming() {
            Relationship::AwaitingIncomingResponse
        } else {
            Relationship::Requestable
        }
    }
}

/// Pagination bounds. The server omits zero-valued fields, so an empty result
/// set arrives as `{}`.
#[derive(Eq, PartialEq, Clone, Copy, Debug, Serialize, Deserialize, Default)]
pub struct Metadata {
    #[serde(default)]
    pub current_page: u32,
    #[serde(default)]
    pub last_page: u32,
    #[serde(default)]
    pub total_records: u64,
}
impl Metadata {
    pub fn has_next_page(&self) -> bool {
        self.current_page < self.last_page
    }
    /// The page to request after this one, or `None` once the last page has
    /// been reached.
    pub fn next_page(&self) -> Option<u32> {
        self.has_next_page().then(|| self.current_page + 1)
    }
}

/// One bounded slice of a larger ordered result set.
#[derive(Clone, Debug, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub metadata: Metadata,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UsersEnvelope<T> {
    pub users: Vec<T>,
    #[serde(default)]
    pub metadata: Metadata,
}
impl<T> From<UsersEnvelope<T>> for Page<T> {
    fn from(value: UsersEnvelope<T>) -> Self {
        Page { items: value.users, metadata: value.metadata }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FriendRequestsEnvelope<T> {
    pub friend_requests: Vec<T>,
    #[serde(default)]
    pub metadata: Metadata,
}
impl<T> From<FriendRequestsEnvelope<T>> for Page<T> {
    fn from(value: FriendRequestsEnvelope<T>) -> Self {
        Page { items: value.friend_requests, metadata: value.metadata }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserEnvelope {
    pub user: User,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FriendRequestEnvelope {
    pub friend_request: FriendRequest,
}

/// Body of a non-2xx response. A 422 carries field-keyed messages, anything
/// else a plain message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorDetail,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ErrorDetail {
    Fields(BTreeMap<String, Vec<String>>),
    Message(String),
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
pub struct SignupRequest {
    pub fullname: String,
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
pub struct OnboardingRequest {
    pub fullname: String,
    pub bio: String,
    pub native_lng: String,
    pub learning_lng: String,
    pub location: String,
    pub profile_pic: String,
}
