//! API gateway client. Every call goes through one configured `reqwest::Client`
//! that keeps the session cookie, and every non-2xx response is mapped into
//! [`ApiError`]. Paths are built segment by segment, so ids are
//! percent-encoded.

use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use streamify_common::{
    FriendRequest, FriendRequestEnvelope, FriendRequestId, FriendRequestWithRecipient,
    FriendRequestWithSender, FriendRequestsEnvelope, OnboardingRequest, Page, RecommendedUser,
    SigninRequest, SignupRequest, StatusFilter, User, UserEnvelope, UserId, UsersEnvelope,
};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{ApiError, ConfigError};
use crate::pagination::{PageFetcher, PageRequest};

#[derive(Clone, Debug)]
pub struct ApiClient {
    http: Client,
    base: Url,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let base = Url::parse(&config.api_base()).map_err(|e| ConfigError::Invalid {
            key: "STREAMIFY_BASE_API_URL",
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(ConfigError::Invalid {
                key: "STREAMIFY_BASE_API_URL",
                reason: format!("{base} cannot carry a path"),
            });
        }
        let http = Client::builder()
            .cookie_store(true)
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(http, base))
    }

    pub fn with_client(http: Client, base: Url) -> Self {
        Self { http, base }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// `base` extended by `segments`, each one percent-encoded on its own.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &[&str],
        query: &[(&str, String)],
        lookup: bool,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!(%url, ?query, "GET");
        let response = self.http.get(url).query(query).send().await?;
        read_json(response, lookup).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &[&str],
        body: &B,
        lookup: bool,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!(%url, "POST");
        let response = self.http.post(url).json(body).send().await?;
        read_json(response, lookup).await
    }

    async fn post_empty(&self, path: &[&str], lookup: bool) -> Result<Response, ApiError> {
        let url = self.url(path);
        debug!(%url, "POST");
        let response = self.http.post(url).send().await?;
        check(response, lookup).await
    }

    /// Session probe. A 401 comes back as [`ApiError::Unauthenticated`] and is
    /// never retried.
    pub async fn me(&self) -> Result<User, ApiError> {
        Ok(self.get::<UserEnvelope>(&["auth", "me"], &[], false).await?.user)
    }

    pub async fn signup(&self, form: &SignupRequest) -> Result<User, ApiError> {
        Ok(self.post::<_, UserEnvelope>(&["auth", "signup"], form, false).await?.user)
    }

    pub async fn signin(&self, form: &SigninRequest) -> Result<User, ApiError> {
        Ok(self.post::<_, UserEnvelope>(&["auth", "signin"], form, false).await?.user)
    }

    pub async fn signout(&self) -> Result<(), ApiError> {
        self.post_empty(&["auth", "signout"], false).await?;
        Ok(())
    }

    pub async fn onboarding(&self, form: &OnboardingRequest) -> Result<User, ApiError> {
        Ok(self
            .post::<_, UserEnvelope>(&["auth", "onboarding"], form, false)
            .await?
            .user)
    }

    pub async fn recommended(
        &self,
        request: PageRequest,
    ) -> Result<Page<RecommendedUser>, ApiError> {
        Ok(self
            .get::<UsersEnvelope<RecommendedUser>>(
                &["users", "recommended"],
                &request.query_pairs(),
                false,
            )
            .await?
            .into())
    }

    pub async fn friends_with_me(&self, request: PageRequest) -> Result<Page<User>, ApiError> {
        Ok(self
            .get::<UsersEnvelope<User>>(
                &["users", "friends-with-me"],
                &request.query_pairs(),
                false,
            )
            .await?
            .into())
    }

    pub async fn incoming_requests(
        &self,
        status: StatusFilter,
        request: PageRequest,
    ) -> Result<Page<FriendRequestWithSender>, ApiError> {
        let mut query = vec![("status", status.as_str().to_string())];
        query.extend(request.query_pairs());
        Ok(self
            .get::<FriendRequestsEnvelope<FriendRequestWithSender>>(
                &["users", "friends-request", "from"],
                &query,
                false,
            )
            .await?
            .into())
    }

    pub async fn outgoing_requests(
        &self,
        status: StatusFilter,
        request: PageRequest,
    ) -> Result<Page<FriendRequestWithRecipient>, ApiError> {
        let mut query = vec![("status", status.as_str().to_string())];
        query.extend(request.query_pairs());
        Ok(self
            .get::<FriendRequestsEnvelope<FriendRequestWithRecipient>>(
                &["users", "friends-request", "send"],
                &query,
                false,
            )
            .await?
            .into())
    }

    pub async fn create_friend_request(&self, recipient: &UserId) -> Result<(), ApiError> {
        self.post_empty(&["users", "friends-request", "create", recipient.as_ref()], false)
            .await?;
        Ok(())
    }

    pub async fn accept_friend_request(
        &self,
        id: &FriendRequestId,
    ) -> Result<FriendRequest, ApiError> {
        let response = self
            .post_empty(&["users", "friends-request", "accept", id.as_ref()], true)
            .await?;
        Ok(response.json::<FriendRequestEnvelope>().await?.friend_request)
    }

    pub fn recommended_fetcher(&self) -> impl PageFetcher<RecommendedUser> {
        let client = self.clone();
        move |request: PageRequest| {
            let client = client.clone();
            async move { client.recommended(request).await }
        }
    }

    pub fn friends_fetcher(&self) -> impl PageFetcher<User> {
        let client = self.clone();
        move |request: PageRequest| {
            let client = client.clone();
            async move { client.friends_with_me(request).await }
        }
    }

    pub fn incoming_fetcher(
        &self,
        status: StatusFilter,
    ) -> impl PageFetcher<FriendRequestWithSender> {
        let client = self.clone();
        move |request: PageRequest| {
            let client = client.clone();
            async move { client.incoming_requests(status, request).await }
        }
    }

    pub fn outgoing_fetcher(
        &self,
        status: StatusFilter,
    ) -> impl PageFetcher<FriendRequestWithRecipient> {
        let client = self.clone();
        move |request: PageRequest| {
            let client = client.clone();
            async move { client.outgoing_requests(status, request).await }
        }
    }
}

async fn check(response: Response, lookup: bool) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.bytes().await?;
    debug!(%status, "request failed");
    Err(ApiError::from_response(status, &body, lookup))
}

async fn read_json<T: DeserializeOwned>(response: Response, lookup: bool) -> Result<T, ApiError> {
    Ok(check(response, lookup).await?.json::<T>().await?)
}
