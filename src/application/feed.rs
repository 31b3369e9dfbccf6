//! Feed composition: the read side of the platform.
//!
//! Every feed is assembled the same way: count the matching posts, clamp
//! the requested page number into range, then fetch exactly one window.
//! Scope resolution happens first so an unknown group or username is
//! reported as such instead of rendering an empty page.

use std::sync::Arc;

use thiserror::Error;

use crate::application::pagination::{Page, Paginator};
use crate::application::repos::{
    CommentWithAuthor, CommentsRepo, FeedItemRecord, FollowsRepo, GroupsRepo, PostsRepo, RepoError,
    UsersRepo,
};
use crate::domain::entities::{GroupRecord, PostRecord, UserRecord};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("unknown group")]
    UnknownGroup,
    #[error("unknown user")]
    UnknownUser,
    #[error("unknown post")]
    UnknownPost,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// A page of posts scoped to one group.
#[derive(Debug, Clone)]
pub struct GroupFeed {
    pub group: GroupRecord,
    pub page: Page<FeedItemRecord>,
}

/// A page of posts scoped to one author, plus the profile header data.
#[derive(Debug, Clone)]
pub struct AuthorFeed {
    pub author: UserRecord,
    pub page: Page<FeedItemRecord>,
    pub post_count: u64,
    pub is_following: bool,
}

/// A single post with its author, group and comment thread.
#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: PostRecord,
    pub author: UserRecord,
    pub group: Option<GroupRecord>,
    pub author_post_count: u64,
    pub comments: Vec<CommentWithAuthor>,
}

#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    users: Arc<dyn UsersRepo>,
    groups: Arc<dyn GroupsRepo>,
    comments: Arc<dyn CommentsRepo>,
    follows: Arc<dyn FollowsRepo>,
    paginator: Paginator,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        users: Arc<dyn UsersRepo>,
        groups: Arc<dyn GroupsRepo>,
        comments: Arc<dyn CommentsRepo>,
        follows: Arc<dyn FollowsRepo>,
        paginator: Paginator,
    ) -> Self {
        Self {
            posts,
            users,
            groups,
            comments,
            follows,
            paginator,
        }
    }

    pub fn paginator(&self) -> &Paginator {
        &self.paginator
    }

    /// All posts, newest first.
    pub async fn list_all(&self, requested_page: u32) -> Result<Page<FeedItemRecord>, FeedError> {
        let total = self.posts.count_all().await?;
        let page = self.paginator.clamp_page(requested_page, total);
        let items = self.posts.list_all(self.paginator.window(page)).await?;
        Ok(Page::assemble(items, page, &self.paginator, total))
    }

    /// Posts within the group identified by `slug`.
    pub async fn list_by_group(
        &self,
        slug: &str,
        requested_page: u32,
    ) -> Result<GroupFeed, FeedError> {
        let group = self
            .groups
            .find_by_slug(slug)
            .await?
            .ok_or(FeedError::UnknownGroup)?;

        let total = self.posts.count_by_group(group.id).await?;
        let page = self.paginator.clamp_page(requested_page, total);
        let items = self
            .posts
            .list_by_group(group.id, self.paginator.window(page))
            .await?;

        Ok(GroupFeed {
            group,
            page: Page::assemble(items, page, &self.paginator, total),
        })
    }

    /// Posts authored by `username`. `viewer` controls the follow flag on
    /// the profile header; anonymous viewers never see it set.
    pub async fn list_by_author(
        &self,
        username: &str,
        requested_page: u32,
        viewer: Option<Uuid>,
    ) -> Result<AuthorFeed, FeedError> {
        let author = self
            .users
            .find_by_username(username)
            .await?
            .ok_or(FeedError::UnknownUser)?;

        let total = self.posts.count_by_author(author.id).await?;
        let page = self.paginator.clamp_page(requested_page, total);
        let items = self
            .posts
            .list_by_author(author.id, self.paginator.window(page))
            .await?;

        let is_following = match viewer {
            Some(viewer_id) if viewer_id != author.id => {
                self.follows.exists(viewer_id, author.id).await?
            }
            _ => false,
        };

        Ok(AuthorFeed {
            author,
            page: Page::assemble(items, page, &self.paginator, total),
            post_count: total,
            is_following,
        })
    }

    /// Posts from every author the viewer follows, merged newest first.
    /// Following nobody yields an empty first page rather than an error.
    pub async fn list_followed(
        &self,
        viewer: Uuid,
        requested_page: u32,
    ) -> Result<Page<FeedItemRecord>, FeedError> {
        let authors = self.follows.authors_for(viewer).await?;
        if authors.is_empty() {
            return Ok(Page::empty());
        }

        let total = self.posts.count_by_authors(&authors).await?;
        let page = self.paginator.clamp_page(requested_page, total);
        let items = self
            .posts
            .list_by_authors(&authors, self.paginator.window(page))
            .await?;

        Ok(Page::assemble(items, page, &self.paginator, total))
    }

    /// A single post with author, optional group and the full comment
    /// thread, oldest comment first.
    pub async fn post_detail(&self, post_id: i64) -> Result<PostDetail, FeedError> {
        let post = self
            .posts
            .find_by_id(post_id)
            .await?
            .ok_or(FeedError::UnknownPost)?;

        let author = self
            .users
            .find_by_id(post.author_id)
            .await?
            .ok_or(FeedError::UnknownUser)?;

        let group = match post.group_id {
            Some(group_id) => self.groups.find_by_id(group_id).await?,
            None => None,
        };

        let author_post_count = self.posts.count_by_author(author.id).await?;
        let comments = self.comments.list_for_post(post.id).await?;

        Ok(PostDetail {
            post,
            author,
            group,
            author_post_count,
            comments,
        })
    }
}
