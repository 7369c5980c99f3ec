mod support;

use std::time::Duration;

use axum::http::StatusCode;
use murmur::cache::CacheConfig;
use support::{TestApp, body_text};

fn cached_app(ttl: Duration) -> TestApp {
    TestApp::with_cache(CacheConfig {
        enabled: true,
        ttl,
        capacity: 64,
    })
}

#[tokio::test]
async fn index_is_stale_until_cleared() {
    let app = cached_app(Duration::from_secs(20));
    let author = app.user("leo").await;
    let post = app.post(&author, "cached for a while", None).await;

    let first = body_text(app.get("/", None).await).await;
    assert!(first.contains("cached for a while"));

    app.posts.delete(post.id).await.expect("delete post");

    let second = body_text(app.get("/", None).await).await;
    assert_eq!(first, second);

    app.cache.clear();

    let third = body_text(app.get("/", None).await).await;
    assert_ne!(first, third);
    assert!(!third.contains("cached for a while"));
}

#[tokio::test]
async fn new_posts_wait_for_the_window() {
    let app = cached_app(Duration::from_millis(500));
    let author = app.user("leo").await;

    let before = body_text(app.get("/", None).await).await;
    app.post(&author, "fresh arrival", None).await;

    let stale = body_text(app.get("/", None).await).await;
    assert_eq!(before, stale);

    tokio::time::sleep(Duration::from_millis(600)).await;
    let fresh = body_text(app.get("/", None).await).await;
    assert!(fresh.contains("fresh arrival"));
}

#[tokio::test]
async fn viewers_never_share_cached_pages() {
    let app = cached_app(Duration::from_secs(20));
    let leo = app.user("leo").await;
    let anna = app.user("anna").await;
    let leo_cookie = app.session_for(&leo).await;
    let anna_cookie = app.session_for(&anna).await;

    let anonymous = body_text(app.get("/", None).await).await;
    let as_leo = body_text(app.get("/", Some(&leo_cookie)).await).await;
    let as_anna = body_text(app.get("/", Some(&anna_cookie)).await).await;

    assert!(!anonymous.contains("/profile/leo/"));
    assert!(as_leo.contains("/profile/leo/"));
    assert!(as_anna.contains("/profile/anna/"));
    assert!(!as_anna.contains("/profile/leo/"));
}

#[tokio::test]
async fn pages_of_the_index_are_cached_separately() {
    let app = cached_app(Duration::from_secs(20));
    let author = app.user("leo").await;
    for n in 1..=12 {
        app.post(&author, &format!("entry {n:02}"), None).await;
    }

    let first = body_text(app.get("/", None).await).await;
    let second = body_text(app.get("/?page=2", None).await).await;
    assert!(first.contains("entry 01"));
    assert!(second.contains("entry 12"));
    assert_ne!(first, second);
}

#[tokio::test]
async fn only_the_index_is_cached() {
    let app = cached_app(Duration::from_secs(20));
    let author = app.user("leo").await;
    let group = app.group("Cats", "cats").await;
    let post = app.post(&author, "grouped and deleted", Some(&group)).await;

    let before = body_text(app.get("/group/cats/", None).await).await;
    assert!(before.contains("grouped and deleted"));

    app.posts.delete(post.id).await.expect("delete post");

    let after = app.get("/group/cats/", None).await;
    assert_eq!(after.status(), StatusCode::OK);
    assert!(!body_text(after).await.contains("grouped and deleted"));
}
