//! Follow graph maintenance.
//!
//! Edges are directed from follower to author. Following yourself is
//! rejected, and repeating an existing follow or removing an absent one
//! is a no-op rather than an error.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::repos::{FollowsRepo, RepoError, UsersRepo};
use crate::domain::entities::UserRecord;

#[derive(Debug, Error)]
pub enum FollowError {
    #[error("unknown user")]
    UnknownUser,
    #[error("cannot follow yourself")]
    SelfFollow,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct FollowService {
    follows: Arc<dyn FollowsRepo>,
    users: Arc<dyn UsersRepo>,
}

impl FollowService {
    pub fn new(follows: Arc<dyn FollowsRepo>, users: Arc<dyn UsersRepo>) -> Self {
        Self { follows, users }
    }

    /// Follow the author behind `username`. Returns the author record so
    /// the caller can redirect to their profile.
    pub async fn follow(&self, viewer: Uuid, username: &str) -> Result<UserRecord, FollowError> {
        let author = self.resolve_author(username).await?;
        if author.id == viewer {
            return Err(FollowError::SelfFollow);
        }
        // A second follow of the same author is absorbed by the store.
        self.follows.insert(viewer, author.id).await?;
        Ok(author)
    }

    /// Remove the follow edge if present.
    pub async fn unfollow(&self, viewer: Uuid, username: &str) -> Result<UserRecord, FollowError> {
        let author = self.resolve_author(username).await?;
        self.follows.delete(viewer, author.id).await?;
        Ok(author)
    }

    pub async fn is_following(&self, viewer: Uuid, author_id: Uuid) -> Result<bool, FollowError> {
        Ok(self.follows.exists(viewer, author_id).await?)
    }

    async fn resolve_author(&self, username: &str) -> Result<UserRecord, FollowError> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or(FollowError::UnknownUser)
    }
}
