#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    num::NonZeroU32,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicI64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use http_body_util::BodyExt;
use time::OffsetDateTime;
use tower::ServiceExt;
use uuid::Uuid;
use yatube::{
    application::{
        feed::FeedService,
        follows::FollowService,
        pagination::{PageWindow, Paginator},
        posts::PostService,
        repos::{
            CommentWithAuthor, CommentsRepo, CreatePostParams, FeedItemRecord, FollowsRepo,
            GroupsRepo, NewCommentParams, PingRepo, PostsRepo, PostsWriteRepo, RepoError,
            SessionsRepo, UpdatePostParams, UsersRepo,
        },
    },
    cache::{CacheConfig, CacheState, IndexCache},
    domain::entities::{CommentRecord, GroupRecord, PostRecord, UserRecord},
    infra::http::{HttpState, SESSION_COOKIE, build_router},
    infra::uploads::UploadStorage,
};

const BASE_TIMESTAMP: i64 = 1_700_000_000;

fn at(offset_seconds: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(BASE_TIMESTAMP + offset_seconds)
        .expect("timestamp in range")
}

/// In-memory stand-in for the Postgres repositories, sharing their
/// ordering and duplicate-handling behavior.
#[derive(Default)]
pub struct MemoryRepos {
    users: Mutex<Vec<UserRecord>>,
    groups: Mutex<Vec<GroupRecord>>,
    posts: Mutex<Vec<PostRecord>>,
    comments: Mutex<Vec<CommentRecord>>,
    follows: Mutex<HashSet<(Uuid, Uuid)>>,
    sessions: Mutex<HashMap<String, Uuid>>,
    next_post_id: AtomicI64,
    next_comment_id: AtomicI64,
    clock_seconds: AtomicI64,
}

impl MemoryRepos {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn tick(&self) -> OffsetDateTime {
        at(self.clock_seconds.fetch_add(1, Ordering::SeqCst))
    }

    pub fn add_user(&self, username: &str) -> UserRecord {
        let user = UserRecord {
            id: Uuid::new_v4(),
            username: username.to_string(),
            display_name: username.to_string(),
            joined_at: self.tick(),
        };
        self.users.lock().unwrap().push(user.clone());
        user
    }

    pub fn add_group(&self, slug: &str, title: &str) -> GroupRecord {
        let group = GroupRecord {
            id: Uuid::new_v4(),
            slug: slug.to_string(),
            title: title.to_string(),
            description: String::new(),
            created_at: self.tick(),
        };
        self.groups.lock().unwrap().push(group.clone());
        group
    }

    pub fn add_post(&self, author_id: Uuid, text: &str, group_id: Option<Uuid>) -> PostRecord {
        let post = PostRecord {
            id: self.next_post_id.fetch_add(1, Ordering::SeqCst) + 1,
            author_id,
            text: text.to_string(),
            group_id,
            image_path: None,
            created_at: self.tick(),
        };
        self.posts.lock().unwrap().push(post.clone());
        post
    }

    pub fn add_session(&self, user_id: Uuid) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.sessions.lock().unwrap().insert(token.clone(), user_id);
        token
    }

    fn feed_item(&self, post: &PostRecord) -> FeedItemRecord {
        let users = self.users.lock().unwrap();
        let author = users
            .iter()
            .find(|user| user.id == post.author_id)
            .cloned()
            .expect("post author exists");
        drop(users);

        let group = post.group_id.and_then(|group_id| {
            self.groups
                .lock()
                .unwrap()
                .iter()
                .find(|group| group.id == group_id)
                .cloned()
        });

        FeedItemRecord {
            id: post.id,
            text: post.text.clone(),
            image_path: post.image_path.clone(),
            created_at: post.created_at,
            author_id: post.author_id,
            author_username: author.username,
            author_display_name: author.display_name,
            group_slug: group.as_ref().map(|g| g.slug.clone()),
            group_title: group.map(|g| g.title),
        }
    }

    fn listed(&self, mut matching: Vec<PostRecord>, window: PageWindow) -> Vec<FeedItemRecord> {
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        matching
            .into_iter()
            .skip(window.offset as usize)
            .take(window.limit as usize)
            .map(|post| self.feed_item(&post))
            .collect()
    }
}

#[async_trait]
impl UsersRepo for MemoryRepos {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|user| user.id == id)
            .cloned())
    }
}

#[async_trait]
impl GroupsRepo for MemoryRepos {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self
            .groups
            .lock()
            .unwrap()
            .iter()
            .find(|group| group.slug == slug)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self
            .groups
            .lock()
            .unwrap()
            .iter()
            .find(|group| group.id == id)
            .cloned())
    }

    async fn list_all(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let mut groups = self.groups.lock().unwrap().clone();
        groups.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()));
        Ok(groups)
    }
}

#[async_trait]
impl PostsRepo for MemoryRepos {
    async fn list_all(&self, window: PageWindow) -> Result<Vec<FeedItemRecord>, RepoError> {
        let matching = self.posts.lock().unwrap().clone();
        Ok(self.listed(matching, window))
    }

    async fn count_all(&self) -> Result<u64, RepoError> {
        Ok(self.posts.lock().unwrap().len() as u64)
    }

    async fn list_by_group(
        &self,
        group_id: Uuid,
        window: PageWindow,
    ) -> Result<Vec<FeedItemRecord>, RepoError> {
        let matching: Vec<_> = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|post| post.group_id == Some(group_id))
            .cloned()
            .collect();
        Ok(self.listed(matching, window))
    }

    async fn count_by_group(&self, group_id: Uuid) -> Result<u64, RepoError> {
        Ok(self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|post| post.group_id == Some(group_id))
            .count() as u64)
    }

    async fn list_by_author(
        &self,
        author_id: Uuid,
        window: PageWindow,
    ) -> Result<Vec<FeedItemRecord>, RepoError> {
        let matching: Vec<_> = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|post| post.author_id == author_id)
            .cloned()
            .collect();
        Ok(self.listed(matching, window))
    }

    async fn count_by_author(&self, author_id: Uuid) -> Result<u64, RepoError> {
        Ok(self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|post| post.author_id == author_id)
            .count() as u64)
    }

    async fn list_by_authors(
        &self,
        author_ids: &[Uuid],
        window: PageWindow,
    ) -> Result<Vec<FeedItemRecord>, RepoError> {
        let matching: Vec<_> = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|post| author_ids.contains(&post.author_id))
            .cloned()
            .collect();
        Ok(self.listed(matching, window))
    }

    async fn count_by_authors(&self, author_ids: &[Uuid]) -> Result<u64, RepoError> {
        Ok(self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|post| author_ids.contains(&post.author_id))
            .count() as u64)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        Ok(self
            .posts
            .lock()
            .unwrap()
            .iter()
            .find(|post| post.id == id)
            .cloned())
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryRepos {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let post = PostRecord {
            id: self.next_post_id.fetch_add(1, Ordering::SeqCst) + 1,
            author_id: params.author_id,
            text: params.text,
            group_id: params.group_id,
            image_path: params.image_path,
            created_at: self.tick(),
        };
        self.posts.lock().unwrap().push(post.clone());
        Ok(post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut posts = self.posts.lock().unwrap();
        let post = posts
            .iter_mut()
            .find(|post| post.id == params.id)
            .ok_or(RepoError::NotFound)?;
        post.text = params.text;
        post.group_id = params.group_id;
        post.image_path = params.image_path;
        Ok(post.clone())
    }
}

#[async_trait]
impl CommentsRepo for MemoryRepos {
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentWithAuthor>, RepoError> {
        let comments: Vec<_> = self
            .comments
            .lock()
            .unwrap()
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .cloned()
            .collect();

        let users = self.users.lock().unwrap();
        let mut joined: Vec<_> = comments
            .into_iter()
            .map(|comment| {
                let author = users
                    .iter()
                    .find(|user| user.id == comment.author_id)
                    .cloned()
                    .expect("comment author exists");
                CommentWithAuthor {
                    id: comment.id,
                    text: comment.text,
                    created_at: comment.created_at,
                    author_username: author.username,
                    author_display_name: author.display_name,
                }
            })
            .collect();
        joined.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(joined)
    }

    async fn create_comment(&self, params: NewCommentParams) -> Result<CommentRecord, RepoError> {
        let comment = CommentRecord {
            id: self.next_comment_id.fetch_add(1, Ordering::SeqCst) + 1,
            post_id: params.post_id,
            author_id: params.author_id,
            text: params.text,
            created_at: self.tick(),
        };
        self.comments.lock().unwrap().push(comment.clone());
        Ok(comment)
    }
}

#[async_trait]
impl FollowsRepo for MemoryRepos {
    async fn insert(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
        Ok(self.follows.lock().unwrap().insert((user_id, author_id)))
    }

    async fn delete(&self, user_id: Uuid, author_id: Uuid) -> Result<(), RepoError> {
        self.follows.lock().unwrap().remove(&(user_id, author_id));
        Ok(())
    }

    async fn exists(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
        Ok(self
            .follows
            .lock()
            .unwrap()
            .contains(&(user_id, author_id)))
    }

    async fn authors_for(&self, user_id: Uuid) -> Result<Vec<Uuid>, RepoError> {
        Ok(self
            .follows
            .lock()
            .unwrap()
            .iter()
            .filter(|(follower, _)| *follower == user_id)
            .map(|(_, author)| *author)
            .collect())
    }
}

#[async_trait]
impl SessionsRepo for MemoryRepos {
    async fn find_user(&self, token: &str) -> Result<Option<UserRecord>, RepoError> {
        let user_id = match self.sessions.lock().unwrap().get(token).copied() {
            Some(user_id) => user_id,
            None => return Ok(None),
        };
        UsersRepo::find_by_id(self, user_id).await
    }
}

#[async_trait]
impl PingRepo for MemoryRepos {
    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

pub fn app(repos: Arc<MemoryRepos>) -> Router {
    app_with_cache(repos, None)
}

pub fn app_with_cache(repos: Arc<MemoryRepos>, cache: Option<CacheConfig>) -> Router {
    build_app(repos, cache).0
}

/// Like `app`, but exposes the upload directory so tests can inspect
/// what landed on disk.
pub fn app_with_media_root(repos: Arc<MemoryRepos>) -> (Router, PathBuf) {
    build_app(repos, None)
}

fn build_app(repos: Arc<MemoryRepos>, cache: Option<CacheConfig>) -> (Router, PathBuf) {
    let paginator = Paginator::new(NonZeroU32::new(10).expect("non-zero page size"));

    let feed = Arc::new(FeedService::new(
        repos.clone(),
        repos.clone(),
        repos.clone(),
        repos.clone(),
        repos.clone(),
        paginator,
    ));
    let posts = Arc::new(PostService::new(
        repos.clone(),
        repos.clone(),
        repos.clone(),
        repos.clone(),
    ));
    let follows = Arc::new(FollowService::new(repos.clone(), repos.clone()));

    let upload_root = std::env::temp_dir().join(format!("yatube-test-{}", Uuid::new_v4()));
    let upload_storage =
        Arc::new(UploadStorage::new(upload_root.clone()).expect("temp upload storage"));

    let cache = cache.map(|config| CacheState {
        index: Arc::new(IndexCache::new(config.ttl())),
        config,
    });

    let router = build_router(HttpState {
        feed,
        posts,
        follows,
        db_sessions: repos.clone(),
        ping: repos,
        upload_storage,
        cache,
        max_upload_bytes: 1024 * 1024,
    });
    (router, upload_root)
}

pub fn stored_file_count(root: &Path) -> usize {
    fn walk(dir: &Path, count: &mut usize) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(&path, count);
            } else {
                *count += 1;
            }
        }
    }

    let mut count = 0;
    walk(root, &mut count);
    count
}

pub fn cache_config(ttl: Duration) -> CacheConfig {
    CacheConfig {
        enabled: true,
        index_ttl_seconds: ttl.as_secs(),
    }
}

pub fn get(path: &str) -> Request<Body> {
    Request::builder()
        .uri(path)
        .body(Body::empty())
        .expect("request builds")
}

pub fn get_as(path: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(path)
        .header(header::COOKIE, format!("{SESSION_COOKIE}={token}"))
        .body(Body::empty())
        .expect("request builds")
}

pub fn post_form(path: &str, token: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(header::COOKIE, format!("{SESSION_COOKIE}={token}"))
        .header(
            header::CONTENT_TYPE,
            "application/x-www-form-urlencoded",
        )
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

const MULTIPART_BOUNDARY: &str = "yatube-test-boundary";

/// Encode the post form as the browser would submit it.
pub fn post_multipart(path: &str, token: &str, text: &str, group: &str) -> Request<Body> {
    let body = format!(
        "--{b}\r\n\
         Content-Disposition: form-data; name=\"text\"\r\n\r\n\
         {text}\r\n\
         --{b}\r\n\
         Content-Disposition: form-data; name=\"group\"\r\n\r\n\
         {group}\r\n\
         --{b}--\r\n",
        b = MULTIPART_BOUNDARY,
    );

    Request::builder()
        .method("POST")
        .uri(path)
        .header(header::COOKIE, format!("{SESSION_COOKIE}={token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request builds")
}

/// Post form submission carrying an image file alongside the text fields.
pub fn post_multipart_with_image(
    path: &str,
    token: &str,
    text: &str,
    group: &str,
    file_name: &str,
    file_bytes: &[u8],
) -> Request<Body> {
    let mut body = format!(
        "--{b}\r\n\
         Content-Disposition: form-data; name=\"text\"\r\n\r\n\
         {text}\r\n\
         --{b}\r\n\
         Content-Disposition: form-data; name=\"group\"\r\n\r\n\
         {group}\r\n\
         --{b}\r\n\
         Content-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n",
        b = MULTIPART_BOUNDARY,
    )
    .into_bytes();
    body.extend_from_slice(file_bytes);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(path)
        .header(header::COOKIE, format!("{SESSION_COOKIE}={token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request builds")
}

pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router
        .clone()
        .oneshot(request)
        .await
        .expect("infallible router")
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub async fn fetch(router: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = send(router, request).await;
    let status = response.status();
    let body = body_text(response).await;
    (status, body)
}

pub fn location_of(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

pub fn count_occurrences(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}
