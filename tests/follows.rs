mod support;

use axum::http::StatusCode;
use support::{TestApp, body_text, card_count, location};

#[tokio::test]
async fn follow_feed_shows_only_followed_authors() {
    let app = TestApp::new();
    let author = app.user("leo").await;
    let follower = app.user("anna").await;
    let bystander = app.user("ivan").await;
    app.post(&author, "from the followed author", None).await;
    app.post(&bystander, "from someone else", None).await;

    let follower_cookie = app.session_for(&follower).await;
    let response = app
        .post_form("/profile/leo/follow/", "", Some(&follower_cookie))
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/profile/leo/");

    let feed = body_text(app.get("/follow/", Some(&follower_cookie)).await).await;
    assert_eq!(card_count(&feed), 1);
    assert!(feed.contains("from the followed author"));
    assert!(!feed.contains("from someone else"));

    let bystander_cookie = app.session_for(&bystander).await;
    let other_feed = body_text(app.get("/follow/", Some(&bystander_cookie)).await).await;
    assert_eq!(card_count(&other_feed), 0);
    assert!(!other_feed.contains("from the followed author"));
}

#[tokio::test]
async fn following_twice_keeps_one_edge() {
    let app = TestApp::new();
    app.user("leo").await;
    let follower = app.user("anna").await;
    let cookie = app.session_for(&follower).await;

    for _ in 0..2 {
        let response = app.post_form("/profile/leo/follow/", "", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::FOUND);
    }
    assert_eq!(app.store.follow_count(), 1);
}

#[tokio::test]
async fn self_follow_is_a_no_op() {
    let app = TestApp::new();
    let user = app.user("leo").await;
    let cookie = app.session_for(&user).await;

    let response = app.post_form("/profile/leo/follow/", "", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/profile/leo/");
    assert_eq!(app.store.follow_count(), 0);
}

#[tokio::test]
async fn unfollow_removes_the_edge_and_then_404s() {
    let app = TestApp::new();
    let author = app.user("leo").await;
    let follower = app.user("anna").await;
    app.post(&author, "feed item", None).await;
    let cookie = app.session_for(&follower).await;

    app.post_form("/profile/leo/follow/", "", Some(&cookie)).await;
    let response = app
        .post_form("/profile/leo/unfollow/", "", Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/profile/leo/");
    assert_eq!(app.store.follow_count(), 0);

    let feed = body_text(app.get("/follow/", Some(&cookie)).await).await;
    assert_eq!(card_count(&feed), 0);

    let again = app
        .post_form("/profile/leo/unfollow/", "", Some(&cookie))
        .await;
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_authors_are_not_found() {
    let app = TestApp::new();
    let user = app.user("anna").await;
    let cookie = app.session_for(&user).await;

    let follow = app
        .post_form("/profile/nobody/follow/", "", Some(&cookie))
        .await;
    assert_eq!(follow.status(), StatusCode::NOT_FOUND);

    let unfollow = app
        .post_form("/profile/nobody/unfollow/", "", Some(&cookie))
        .await;
    assert_eq!(unfollow.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profile_reflects_follow_state() {
    let app = TestApp::new();
    app.user("leo").await;
    let follower = app.user("anna").await;
    let cookie = app.session_for(&follower).await;

    let before = body_text(app.get("/profile/leo/", Some(&cookie)).await).await;
    assert!(before.contains("action=\"/profile/leo/follow/\""));

    app.post_form("/profile/leo/follow/", "", Some(&cookie)).await;

    let after = body_text(app.get("/profile/leo/", Some(&cookie)).await).await;
    assert!(after.contains("action=\"/profile/leo/unfollow/\""));
    assert!(!after.contains("action=\"/profile/leo/follow/\""));

    let own = body_text(app.get("/profile/anna/", Some(&cookie)).await).await;
    assert!(!own.contains("/profile/anna/follow/"));
}

#[tokio::test]
async fn follow_routes_require_login() {
    let app = TestApp::new();
    app.user("leo").await;

    let feed = app.get("/follow/", None).await;
    assert_eq!(feed.status(), StatusCode::FOUND);
    assert_eq!(location(&feed), "/auth/login/?next=%2Ffollow%2F");

    let follow = app.post_form("/profile/leo/follow/", "", None).await;
    assert_eq!(follow.status(), StatusCode::FOUND);
    assert_eq!(app.store.follow_count(), 0);
}

#[tokio::test]
async fn login_return_to_follow_action_lands_on_profile() {
    let app = TestApp::new();
    app.user("leo").await;
    let follower = app.user("anna").await;

    let anonymous = app.post_form("/profile/leo/follow/", "", None).await;
    assert_eq!(
        location(&anonymous),
        "/auth/login/?next=%2Fprofile%2Fleo%2Ffollow%2F"
    );

    let cookie = app.session_for(&follower).await;
    for uri in ["/profile/leo/follow/", "/profile/leo/unfollow/"] {
        let response = app.get(uri, Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::FOUND, "{uri}");
        assert_eq!(location(&response), "/profile/leo/", "{uri}");
    }
    assert_eq!(app.store.follow_count(), 0);
}
