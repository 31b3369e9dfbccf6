mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{MemoryRepos, app_with_cache, cache_config, fetch, get, get_as};

#[tokio::test]
async fn anonymous_index_is_served_stale_within_ttl() {
    let repos = MemoryRepos::new();
    let leo = repos.add_user("leo");
    repos.add_post(leo.id, "the first post", None);
    let router = app_with_cache(repos.clone(), Some(cache_config(Duration::from_secs(20))));

    let (status, body) = fetch(&router, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("the first post"));

    // New content lands, but the cached page keeps serving until the TTL
    // lapses.
    repos.add_post(leo.id, "the second post", None);

    let (status, body) = fetch(&router, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("the first post"));
    assert!(!body.contains("the second post"));
}

#[tokio::test]
async fn expired_entry_is_rebuilt() {
    let repos = MemoryRepos::new();
    let leo = repos.add_user("leo");
    repos.add_post(leo.id, "the first post", None);
    // Zero TTL: every stored entry is immediately stale.
    let router = app_with_cache(repos.clone(), Some(cache_config(Duration::from_secs(0))));

    let (_, body) = fetch(&router, get("/")).await;
    assert!(body.contains("the first post"));

    repos.add_post(leo.id, "the second post", None);

    let (_, body) = fetch(&router, get("/")).await;
    assert!(body.contains("the second post"));
}

#[tokio::test]
async fn signed_in_requests_bypass_the_cache() {
    let repos = MemoryRepos::new();
    let leo = repos.add_user("leo");
    repos.add_post(leo.id, "the first post", None);
    let token = repos.add_session(leo.id);
    let router = app_with_cache(repos.clone(), Some(cache_config(Duration::from_secs(20))));

    // Prime the anonymous cache entry.
    fetch(&router, get("/")).await;
    repos.add_post(leo.id, "the second post", None);

    let (status, body) = fetch(&router, get_as("/", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("the second post"));
}

#[tokio::test]
async fn paginated_requests_bypass_the_cache() {
    let repos = MemoryRepos::new();
    let leo = repos.add_user("leo");
    repos.add_post(leo.id, "the first post", None);
    let router = app_with_cache(repos.clone(), Some(cache_config(Duration::from_secs(20))));

    fetch(&router, get("/")).await;
    repos.add_post(leo.id, "the second post", None);

    let (status, body) = fetch(&router, get("/?page=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("the second post"));
}

#[tokio::test]
async fn other_routes_are_never_cached() {
    let repos = MemoryRepos::new();
    let leo = repos.add_user("leo");
    repos.add_post(leo.id, "the first post", None);
    let router = app_with_cache(repos.clone(), Some(cache_config(Duration::from_secs(20))));

    let (_, body) = fetch(&router, get("/profile/leo/")).await;
    assert!(body.contains("the first post"));

    repos.add_post(leo.id, "the second post", None);

    let (_, body) = fetch(&router, get("/profile/leo/")).await;
    assert!(body.contains("the second post"));
}

#[tokio::test]
async fn disabled_cache_always_renders_fresh() {
    let repos = MemoryRepos::new();
    let leo = repos.add_user("leo");
    repos.add_post(leo.id, "the first post", None);
    let router = app_with_cache(repos.clone(), None);

    fetch(&router, get("/")).await;
    repos.add_post(leo.id, "the second post", None);

    let (_, body) = fetch(&router, get("/")).await;
    assert!(body.contains("the second post"));
}
