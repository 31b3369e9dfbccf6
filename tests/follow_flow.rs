mod common;

use axum::http::StatusCode;
use common::{MemoryRepos, app, fetch, get, get_as, location_of, send};

#[tokio::test]
async fn follow_then_unfollow_round_trips_over_http() {
    let repos = MemoryRepos::new();
    let leo = repos.add_user("leo");
    let mia = repos.add_user("mia");
    repos.add_post(leo.id, "leo posts things", None);
    let token = repos.add_session(mia.id);
    let router = app(repos);

    let response = send(&router, get_as("/profile/leo/follow/", &token)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location_of(&response), "/profile/leo/");

    let (status, body) = fetch(&router, get_as("/follow/", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("leo posts things"));

    let response = send(&router, get_as("/profile/leo/unfollow/", &token)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let (status, body) = fetch(&router, get_as("/follow/", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.contains("leo posts things"));
}

#[tokio::test]
async fn followed_feed_excludes_unfollowed_authors() {
    let repos = MemoryRepos::new();
    let leo = repos.add_user("leo");
    let mia = repos.add_user("mia");
    let viewer = repos.add_user("vera");
    repos.add_post(leo.id, "from leo", None);
    repos.add_post(mia.id, "from mia", None);
    let token = repos.add_session(viewer.id);
    let router = app(repos);

    send(&router, get_as("/profile/leo/follow/", &token)).await;

    let (status, body) = fetch(&router, get_as("/follow/", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("from leo"));
    assert!(!body.contains("from mia"));
}

#[tokio::test]
async fn duplicate_follow_is_idempotent_over_http() {
    let repos = MemoryRepos::new();
    let leo = repos.add_user("leo");
    let mia = repos.add_user("mia");
    repos.add_post(leo.id, "leo posts things", None);
    let token = repos.add_session(mia.id);
    let router = app(repos);

    send(&router, get_as("/profile/leo/follow/", &token)).await;
    let response = send(&router, get_as("/profile/leo/follow/", &token)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let (_, body) = fetch(&router, get_as("/follow/", &token)).await;
    assert!(body.contains("leo posts things"));
}

#[tokio::test]
async fn self_follow_is_a_no_op_redirect() {
    let repos = MemoryRepos::new();
    let leo = repos.add_user("leo");
    repos.add_post(leo.id, "talking to myself", None);
    let token = repos.add_session(leo.id);
    let router = app(repos);

    let response = send(&router, get_as("/profile/leo/follow/", &token)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location_of(&response), "/profile/leo/");

    // No edge was created.
    let (status, body) = fetch(&router, get_as("/follow/", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.contains("talking to myself"));
}

#[tokio::test]
async fn follow_of_unknown_author_is_not_found() {
    let repos = MemoryRepos::new();
    let leo = repos.add_user("leo");
    let token = repos.add_session(leo.id);
    let router = app(repos);

    let response = send(&router, get_as("/profile/nobody/follow/", &token)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn anonymous_follow_page_redirects_to_login() {
    let repos = MemoryRepos::new();
    let router = app(repos);

    let response = send(&router, get("/follow/")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location_of(&response), "/auth/login/?next=/follow/");
}

#[tokio::test]
async fn profile_shows_follow_state_to_the_viewer() {
    let repos = MemoryRepos::new();
    let leo = repos.add_user("leo");
    let mia = repos.add_user("mia");
    repos.add_post(leo.id, "anything", None);
    let token = repos.add_session(mia.id);
    let router = app(repos);

    let (_, body) = fetch(&router, get_as("/profile/leo/", &token)).await;
    assert!(body.contains("/profile/leo/follow/"));

    send(&router, get_as("/profile/leo/follow/", &token)).await;

    let (_, body) = fetch(&router, get_as("/profile/leo/", &token)).await;
    assert!(body.contains("/profile/leo/unfollow/"));
}
