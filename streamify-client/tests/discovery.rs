mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{candidates, eventually, FakeApi, State};
use streamify_client::debounce::debounce;
use streamify_client::notify::{Notification, NotificationKind, NotificationQueue};
use streamify_client::{keys, ApiClient, ApiError, Discovery, QueryCache, SendOutcome};
use streamify_common::non_api_structs::{CardAction, Relationship};
use streamify_common::UserId;

async fn discovery(
    fake: &FakeApi,
    cache: &QueryCache,
    queue: &NotificationQueue,
) -> Discovery<ApiClient> {
    let client = fake.client();
    let config = fake.config();
    Discovery::new(
        cache.clone(),
        client.recommended_fetcher(),
        config.recommended_page_size,
        client,
        Arc::new(queue.clone()),
    )
}

#[tokio::test]
async fn sentinel_toggles_request_second_page_once() -> anyhow::Result<()> {
    let state = State::default();
    state.with(|backend| backend.candidates = candidates("learner", 24));
    let fake = FakeApi::spawn(state.clone()).await;
    let queue = NotificationQueue::new();
    let mut screen = discovery(&fake, &QueryCache::new(), &queue).await;

    screen.load().await?;
    assert_eq!(screen.cards().len(), 8);
    let hits = state.hits("/users/recommended");
    let first = &hits[0];
    assert_eq!(first.page(), Some(1));
    assert_eq!(first.query.get("page_size").map(String::as_str), Some("8"));
    assert!(screen.shows_sentinel());

    let fetch = screen.set_sentinel_visible(true).expect("next page requested");
    for visible in [false, true, false, true] {
        assert!(screen.set_sentinel_visible(visible).is_none());
    }
    screen.settle(fetch).await?;

    let pages: Vec<_> = state.hits("/users/recommended").iter().map(|hit| hit.page()).collect();
    assert_eq!(pages, vec![Some(1), Some(2)]);
    let names: Vec<_> = screen.cards().into_iter().map(|card| card.user.user.full_name).collect();
    let expected: Vec<_> = (0..16).map(|n| format!("learner{n}")).collect();
    assert_eq!(names, expected);
    Ok(())
}

#[tokio::test]
async fn scrolling_stops_at_last_page() -> anyhow::Result<()> {
    let state = State::default();
    state.with(|backend| backend.candidates = candidates("learner", 20));
    let fake = FakeApi::spawn(state.clone()).await;
    let queue = NotificationQueue::new();
    let mut screen = discovery(&fake, &QueryCache::new(), &queue).await;
    screen.load().await?;

    let mut fetch = screen.set_sentinel_visible(true);
    while let Some(pending) = fetch {
        screen.settle(pending).await?;
        fetch = screen.reevaluate_scroll();
    }
    assert_eq!(screen.cards().len(), 20);
    assert!(!screen.shows_sentinel());
    assert_eq!(state.hits("/users/recommended").len(), 3);
    Ok(())
}

#[tokio::test]
async fn filter_change_starts_a_fresh_stream() -> anyhow::Result<()> {
    let state = State::default();
    state.with(|backend| {
        backend.candidates = candidates("ana", 12);
        backend.candidates.extend(candidates("bob", 12));
    });
    let fake = FakeApi::spawn(state.clone()).await;
    let queue = NotificationQueue::new();
    let cache = QueryCache::new();
    let mut screen = discovery(&fake, &cache, &queue).await;
    screen.load().await?;
    let second_page = screen.set_sentinel_visible(true).unwrap();
    screen.settle(second_page).await?;
    assert_eq!(screen.cards().len(), 16);

    let fetch = screen.apply_filter("bob").expect("new key fetches");
    screen.settle(fetch).await?;
    let cards = screen.cards();
    assert_eq!(cards.len(), 8);
    assert!(cards.iter().all(|card| card.user.user.full_name.starts_with("bob")));
    let last = state.hits("/users/recommended").pop().unwrap();
    assert_eq!(last.page(), Some(1));
    assert_eq!(last.query.get("query").map(String::as_str), Some("bob"));
    assert_eq!(screen.recommendations().key(), &keys::recommended().with("bob"));

    assert!(screen.apply_filter("bob").is_none());
    Ok(())
}

#[tokio::test]
async fn debounced_typing_applies_only_the_settled_filter() -> anyhow::Result<()> {
    let state = State::default();
    state.with(|backend| {
        backend.candidates = candidates("ana", 3);
        backend.candidates.extend(candidates("bob", 3));
    });
    let fake = FakeApi::spawn(state.clone()).await;
    let queue = NotificationQueue::new();
    let mut screen = discovery(&fake, &QueryCache::new(), &queue).await;
    screen.load().await?;

    let mut filter = debounce("", Duration::from_millis(30));
    for text in ["b", "bo", "bob"] {
        filter.input.input(text);
    }
    tokio::time::sleep(Duration::from_millis(120)).await;
    drop(filter.input);
    screen.follow_filter(&mut filter.output).await;

    let queries: Vec<_> = state
        .hits("/users/recommended")
        .into_iter()
        .map(|hit| hit.query.get("query").cloned().unwrap_or_default())
        .collect();
    assert_eq!(queries, vec!["".to_string(), "bob".to_string()]);
    assert_eq!(screen.filter(), "bob");
    assert_eq!(screen.cards().len(), 3);
    Ok(())
}

#[tokio::test]
async fn sent_request_shows_awaiting_after_refetch() -> anyhow::Result<()> {
    let state = State::default();
    state.with(|backend| backend.candidates = candidates("learner", 10));
    let fake = FakeApi::spawn(state.clone()).await;
    let queue = NotificationQueue::new();
    let cache = QueryCache::new();
    let mut screen = discovery(&fake, &cache, &queue).await;
    screen.load().await?;
    let second_page = screen.set_sentinel_visible(true).unwrap();
    screen.settle(second_page).await?;
    let target = UserId("learner-9".to_string());
    let card = screen.card(&target).unwrap();
    assert_eq!(card.action, CardAction::SendFriendRequest);
    assert!(!card.disabled);

    assert_eq!(screen.send_request(&target).await?, SendOutcome::Sent);
    assert_eq!(queue.drain(), vec![Notification::success("Success sending friend request")]);

    // the invalidation refetches in the background, both loaded pages
    let recommendations = screen.recommendations();
    eventually(|| !recommendations.is_stale() && !recommendations.is_fetching()).await;
    let card = screen.card(&target).unwrap();
    assert_eq!(card.relationship, Relationship::AwaitingSentConfirmation);
    assert_eq!(card.action, CardAction::SeeNotification);
    assert!(card.disabled);
    assert_eq!(screen.cards().len(), 10);

    assert_eq!(
        screen.send_request(&target).await?,
        SendOutcome::NotRequestable(Relationship::AwaitingSentConfirmation)
    );
    assert_eq!(state.hits("/users/friends-request/create").len(), 1);
    Ok(())
}

#[tokio::test]
async fn failed_request_stays_requestable() -> anyhow::Result<()> {
    let state = State::default();
    state.with(|backend| {
        backend.candidates = candidates("learner", 3);
        backend.fail_create = true;
    });
    let fake = FakeApi::spawn(state.clone()).await;
    let queue = NotificationQueue::new();
    let cache = QueryCache::new();
    let screen = discovery(&fake, &cache, &queue).await;
    screen.load().await?;
    let target = UserId("learner-1".to_string());

    let result = screen.send_request(&target).await;
    assert!(matches!(result, Err(ApiError::Server { .. })));
    let notes = queue.drain();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].kind, NotificationKind::Error);

    assert!(!cache.is_stale(&keys::recommended().with("")));
    let card = screen.card(&target).unwrap();
    assert_eq!(card.relationship, Relationship::Requestable);
    assert!(!card.disabled);
    assert_eq!(state.hits("/users/recommended").len(), 1);
    Ok(())
}

#[tokio::test]
async fn double_click_sends_once() -> anyhow::Result<()> {
    let state = State::default();
    state.with(|backend| backend.candidates = candidates("learner", 3));
    let fake = FakeApi::spawn(state.clone()).await;
    let queue = NotificationQueue::new();
    let screen = discovery(&fake, &QueryCache::new(), &queue).await;
    screen.load().await?;
    let target = UserId("learner-0".to_string());

    let (first, second) = tokio::join!(screen.send_request(&target), screen.send_request(&target));
    assert_eq!(first?, SendOutcome::Sent);
    assert_eq!(second?, SendOutcome::InFlight);
    assert_eq!(state.hits("/users/friends-request/create").len(), 1);
    Ok(())
}

#[tokio::test]
async fn empty_recommendations_have_no_sentinel() -> anyhow::Result<()> {
    let fake = FakeApi::spawn(State::default()).await;
    let queue = NotificationQueue::new();
    let mut screen = discovery(&fake, &QueryCache::new(), &queue).await;
    screen.load().await?;
    assert!(screen.cards().is_empty());
    assert!(!screen.shows_sentinel());
    assert!(screen.set_sentinel_visible(true).is_none());
    Ok(())
}

#[tokio::test]
async fn unreachable_server_notifies_and_keeps_cards() -> anyhow::Result<()> {
    let state = State::default();
    state.with(|backend| backend.candidates = candidates("learner", 16));
    let fake = FakeApi::spawn(state.clone()).await;
    let queue = NotificationQueue::new();
    let cache = QueryCache::new();
    let screen = discovery(&fake, &cache, &queue).await;
    screen.load().await?;

    // a second screen over the same cache whose transport points nowhere
    let mut config = fake.config();
    config.api_url = "http://127.0.0.1:9".to_string();
    config.request_timeout = Duration::from_millis(500);
    let offline = ApiClient::new(&config)?;
    let mut broken = Discovery::new(
        cache.clone(),
        offline.recommended_fetcher(),
        8,
        offline,
        Arc::new(queue.clone()),
    );
    let fetch = broken.set_sentinel_visible(true).expect("next page requested");
    let result = broken.settle(fetch).await;
    assert!(matches!(result, Err(ApiError::Transport(_))));
    assert_eq!(queue.drain().len(), 1);
    assert_eq!(broken.cards().len(), 8);
    assert_eq!(screen.cards().len(), 8);
    Ok(())
}
