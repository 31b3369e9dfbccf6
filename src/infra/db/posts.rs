use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::PageWindow;
use crate::application::repos::{
    CreatePostParams, FeedItemRecord, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams,
};
use crate::domain::entities::PostRecord;

use super::{PostgresRepositories, map_sqlx_error};

/// Every listing shares this shape: the post joined with its author and
/// optional group, ordered newest first with the id as tie-break.
const FEED_SELECT: &str = r#"
    SELECT p.id, p.text, p.image_path, p.created_at, p.author_id,
           u.username AS author_username,
           u.display_name AS author_display_name,
           g.slug AS group_slug,
           g.title AS group_title
    FROM posts p
    INNER JOIN users u ON u.id = p.author_id
    LEFT JOIN "groups" g ON g.id = p.group_id
"#;

const FEED_ORDER: &str = " ORDER BY p.created_at DESC, p.id DESC LIMIT $1 OFFSET $2";

#[derive(sqlx::FromRow)]
struct FeedItemRow {
    id: i64,
    text: String,
    image_path: Option<String>,
    created_at: OffsetDateTime,
    author_id: Uuid,
    author_username: String,
    author_display_name: String,
    group_slug: Option<String>,
    group_title: Option<String>,
}

impl From<FeedItemRow> for FeedItemRecord {
    fn from(row: FeedItemRow) -> Self {
        Self {
            id: row.id,
            text: row.text,
            image_path: row.image_path,
            created_at: row.created_at,
            author_id: row.author_id,
            author_username: row.author_username,
            author_display_name: row.author_display_name,
            group_slug: row.group_slug,
            group_title: row.group_title,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PostRow {
    id: i64,
    author_id: Uuid,
    text: String,
    group_id: Option<Uuid>,
    image_path: Option<String>,
    created_at: OffsetDateTime,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            author_id: row.author_id,
            text: row.text,
            group_id: row.group_id,
            image_path: row.image_path,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn list_all(&self, window: PageWindow) -> Result<Vec<FeedItemRecord>, RepoError> {
        let rows = sqlx::query_as::<_, FeedItemRow>(&format!("{FEED_SELECT}{FEED_ORDER}"))
            .bind(window.limit)
            .bind(window.offset)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(FeedItemRecord::from).collect())
    }

    async fn count_all(&self) -> Result<u64, RepoError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn list_by_group(
        &self,
        group_id: Uuid,
        window: PageWindow,
    ) -> Result<Vec<FeedItemRecord>, RepoError> {
        let rows = sqlx::query_as::<_, FeedItemRow>(&format!(
            "{FEED_SELECT} WHERE p.group_id = $3{FEED_ORDER}"
        ))
        .bind(window.limit)
        .bind(window.offset)
        .bind(group_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(FeedItemRecord::from).collect())
    }

    async fn count_by_group(&self, group_id: Uuid) -> Result<u64, RepoError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE group_id = $1")
            .bind(group_id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn list_by_author(
        &self,
        author_id: Uuid,
        window: PageWindow,
    ) -> Result<Vec<FeedItemRecord>, RepoError> {
        let rows = sqlx::query_as::<_, FeedItemRow>(&format!(
            "{FEED_SELECT} WHERE p.author_id = $3{FEED_ORDER}"
        ))
        .bind(window.limit)
        .bind(window.offset)
        .bind(author_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(FeedItemRecord::from).collect())
    }

    async fn count_by_author(&self, author_id: Uuid) -> Result<u64, RepoError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE author_id = $1")
            .bind(author_id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn list_by_authors(
        &self,
        author_ids: &[Uuid],
        window: PageWindow,
    ) -> Result<Vec<FeedItemRecord>, RepoError> {
        let rows = sqlx::query_as::<_, FeedItemRow>(&format!(
            "{FEED_SELECT} WHERE p.author_id = ANY($3){FEED_ORDER}"
        ))
        .bind(window.limit)
        .bind(window.offset)
        .bind(author_ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(FeedItemRecord::from).collect())
    }

    async fn count_by_authors(&self, author_ids: &[Uuid]) -> Result<u64, RepoError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE author_id = ANY($1)")
            .bind(author_ids)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, author_id, text, group_id, image_path, created_at
            FROM posts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }
}

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let CreatePostParams {
            author_id,
            text,
            group_id,
            image_path,
        } = params;

        let row = sqlx::query_as::<_, PostRow>(
            r#"
            INSERT INTO posts (author_id, text, group_id, image_path, created_at)
            VALUES ($1, $2, $3, $4, now())
            RETURNING id, author_id, text, group_id, image_path, created_at
            "#,
        )
        .bind(author_id)
        .bind(text)
        .bind(group_id)
        .bind(image_path)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(PostRecord::from(row))
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let UpdatePostParams {
            id,
            text,
            group_id,
            image_path,
        } = params;

        let row = sqlx::query_as::<_, PostRow>(
            r#"
            UPDATE posts
            SET text = $2,
                group_id = $3,
                image_path = $4
            WHERE id = $1
            RETURNING id, author_id, text, group_id, image_path, created_at
            "#,
        )
        .bind(id)
        .bind(text)
        .bind(group_id)
        .bind(image_path)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(PostRecord::from(row))
    }
}
