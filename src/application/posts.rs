//! Post and comment authoring.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::repos::{
    CommentsRepo, CreatePostParams, GroupsRepo, NewCommentParams, PostsRepo, PostsWriteRepo,
    RepoError, UpdatePostParams,
};
use crate::domain::entities::{CommentRecord, PostRecord};

/// Upper bound on post and comment text, matching the storage column.
pub const MAX_TEXT_LEN: usize = 10_000;

#[derive(Debug, Error)]
pub enum PostError {
    #[error("unknown post")]
    UnknownPost,
    #[error("unknown group")]
    UnknownGroup,
    #[error("only the author may edit a post")]
    NotAuthor,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Form input for creating or editing a post. The group is referenced by
/// slug because that is what the form select submits.
#[derive(Debug, Clone, Default)]
pub struct PostInput {
    pub text: String,
    pub group_slug: Option<String>,
    pub image_path: Option<String>,
}

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    groups: Arc<dyn GroupsRepo>,
    comments: Arc<dyn CommentsRepo>,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        groups: Arc<dyn GroupsRepo>,
        comments: Arc<dyn CommentsRepo>,
    ) -> Self {
        Self {
            posts,
            writer,
            groups,
            comments,
        }
    }

    pub async fn create_post(
        &self,
        author_id: Uuid,
        input: PostInput,
    ) -> Result<PostRecord, PostError> {
        let text = validate_text(&input.text)?;
        let group_id = self.resolve_group(input.group_slug.as_deref()).await?;

        let record = self
            .writer
            .create_post(CreatePostParams {
                author_id,
                text,
                group_id,
                image_path: input.image_path,
            })
            .await?;
        Ok(record)
    }

    /// Edit an existing post. Only the author may do so; the caller decides
    /// how to present the refusal.
    pub async fn update_post(
        &self,
        editor_id: Uuid,
        post_id: i64,
        input: PostInput,
    ) -> Result<PostRecord, PostError> {
        let existing = self
            .posts
            .find_by_id(post_id)
            .await?
            .ok_or(PostError::UnknownPost)?;

        if existing.author_id != editor_id {
            return Err(PostError::NotAuthor);
        }

        let text = validate_text(&input.text)?;
        let group_id = self.resolve_group(input.group_slug.as_deref()).await?;

        // An edit without a new upload keeps the previous image.
        let image_path = input.image_path.or(existing.image_path);

        let record = self
            .writer
            .update_post(UpdatePostParams {
                id: post_id,
                text,
                group_id,
                image_path,
            })
            .await?;
        Ok(record)
    }

    /// Attach a comment to an existing post.
    pub async fn add_comment(
        &self,
        author_id: Uuid,
        post_id: i64,
        text: &str,
    ) -> Result<CommentRecord, PostError> {
        let text = validate_text(text)?;
        let post = self
            .posts
            .find_by_id(post_id)
            .await?
            .ok_or(PostError::UnknownPost)?;

        let record = self
            .comments
            .create_comment(NewCommentParams {
                post_id: post.id,
                author_id,
                text,
            })
            .await?;
        Ok(record)
    }

    /// The post a user is about to edit, with the authorship check applied.
    pub async fn editable_post(
        &self,
        editor_id: Uuid,
        post_id: i64,
    ) -> Result<PostRecord, PostError> {
        let post = self
            .posts
            .find_by_id(post_id)
            .await?
            .ok_or(PostError::UnknownPost)?;
        if post.author_id != editor_id {
            return Err(PostError::NotAuthor);
        }
        Ok(post)
    }

    /// Groups offered by the post form selector.
    pub async fn group_options(&self) -> Result<Vec<crate::domain::entities::GroupRecord>, PostError> {
        Ok(self.groups.list_all().await?)
    }

    async fn resolve_group(&self, slug: Option<&str>) -> Result<Option<Uuid>, PostError> {
        match slug {
            None | Some("") => Ok(None),
            Some(slug) => {
                let group = self
                    .groups
                    .find_by_slug(slug)
                    .await?
                    .ok_or(PostError::UnknownGroup)?;
                Ok(Some(group.id))
            }
        }
    }
}

fn validate_text(text: &str) -> Result<String, PostError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(PostError::Validation("text must not be empty".into()));
    }
    if trimmed.chars().count() > MAX_TEXT_LEN {
        return Err(PostError::Validation(format!(
            "text exceeds {MAX_TEXT_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}
