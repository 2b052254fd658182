pub mod api;
pub mod cache;
pub mod config;
pub mod debounce;
pub mod discovery;
pub mod error;
pub mod friend_request;
pub mod notify;
pub mod pagination;
pub mod scroll;
pub mod validation;

pub use api::ApiClient;
pub use cache::{keys, QueryCache, QueryKey, SharedFetch};
pub use config::ClientConfig;
pub use discovery::{Discovery, RecommendationCard};
pub use error::{ApiError, ErrorKind};
pub use friend_request::{FriendRequestActions, FriendRequestApi, SendOutcome};
pub use pagination::{InfinitePages, InfiniteQuery, PageFetcher, PageRequest};
