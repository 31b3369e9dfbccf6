//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::PageWindow;
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord, UserRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// A post joined with the display attributes the feed templates need,
/// so listing a page never traverses relations row by row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedItemRecord {
    pub id: i64,
    pub text: String,
    pub image_path: Option<String>,
    pub created_at: OffsetDateTime,
    pub author_id: Uuid,
    pub author_username: String,
    pub author_display_name: String,
    pub group_slug: Option<String>,
    pub group_title: Option<String>,
}

/// A comment joined with its author's display attributes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentWithAuthor {
    pub id: i64,
    pub text: String,
    pub created_at: OffsetDateTime,
    pub author_username: String,
    pub author_display_name: String,
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub author_id: Uuid,
    pub text: String,
    pub group_id: Option<Uuid>,
    pub image_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdatePostParams {
    pub id: i64,
    pub text: String,
    pub group_id: Option<Uuid>,
    pub image_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewCommentParams {
    pub post_id: i64,
    pub author_id: Uuid,
    pub text: String,
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError>;
}

#[async_trait]
pub trait GroupsRepo: Send + Sync {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<GroupRecord>, RepoError>;

    /// All groups ordered by title, for the post form selector.
    async fn list_all(&self) -> Result<Vec<GroupRecord>, RepoError>;
}

/// Read side of the post store. Every listing is ordered
/// `created_at DESC, id DESC` so pagination is stable under ties.
#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn list_all(&self, window: PageWindow) -> Result<Vec<FeedItemRecord>, RepoError>;

    async fn count_all(&self) -> Result<u64, RepoError>;

    async fn list_by_group(
        &self,
        group_id: Uuid,
        window: PageWindow,
    ) -> Result<Vec<FeedItemRecord>, RepoError>;

    async fn count_by_group(&self, group_id: Uuid) -> Result<u64, RepoError>;

    async fn list_by_author(
        &self,
        author_id: Uuid,
        window: PageWindow,
    ) -> Result<Vec<FeedItemRecord>, RepoError>;

    async fn count_by_author(&self, author_id: Uuid) -> Result<u64, RepoError>;

    async fn list_by_authors(
        &self,
        author_ids: &[Uuid],
        window: PageWindow,
    ) -> Result<Vec<FeedItemRecord>, RepoError>;

    async fn count_by_authors(&self, author_ids: &[Uuid]) -> Result<u64, RepoError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError>;
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    /// Comments for a post, oldest first.
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentWithAuthor>, RepoError>;

    async fn create_comment(&self, params: NewCommentParams) -> Result<CommentRecord, RepoError>;
}

#[async_trait]
pub trait FollowsRepo: Send + Sync {
    /// Insert the edge; returns `false` when it already existed.
    async fn insert(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError>;

    /// Remove the edge; absent edges are not an error.
    async fn delete(&self, user_id: Uuid, author_id: Uuid) -> Result<(), RepoError>;

    async fn exists(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError>;

    async fn authors_for(&self, user_id: Uuid) -> Result<Vec<Uuid>, RepoError>;
}

/// Sessions are minted by the external auth frontend; this side only
/// resolves tokens back to users.
#[async_trait]
pub trait SessionsRepo: Send + Sync {
    async fn find_user(&self, token: &str) -> Result<Option<UserRecord>, RepoError>;
}

/// Liveness probe over whatever backs the repositories.
#[async_trait]
pub trait PingRepo: Send + Sync {
    async fn ping(&self) -> Result<(), RepoError>;
}
