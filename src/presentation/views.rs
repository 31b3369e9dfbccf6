//! Askama templates and the view structs that feed them.

use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, macros::format_description};

use crate::application::error::{ErrorReport, HttpError};
use crate::application::feed::{AuthorFeed, GroupFeed, PostDetail};
use crate::application::pagination::Page;
use crate::application::repos::FeedItemRecord;
use crate::domain::entities::{GroupRecord, UserRecord};

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(viewer: Option<ViewerView>) -> Response {
    let mut response = render_template_response(
        ErrorTemplate {
            viewer,
            status: 404,
            message: "Page not found",
        },
        StatusCode::NOT_FOUND,
    );
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

/// The signed-in user shown in the page header.
#[derive(Clone)]
pub struct ViewerView {
    pub username: String,
    pub display_name: String,
}

impl From<&UserRecord> for ViewerView {
    fn from(user: &UserRecord) -> Self {
        Self {
            username: user.username.clone(),
            display_name: user.display_name.clone(),
        }
    }
}

#[derive(Clone)]
pub struct GroupLinkView {
    pub slug: String,
    pub title: String,
}

#[derive(Clone)]
pub struct PostCardView {
    pub id: i64,
    pub text: String,
    pub author_username: String,
    pub author_display_name: String,
    pub published: String,
    pub group: Option<GroupLinkView>,
    pub image_url: Option<String>,
}

impl From<&FeedItemRecord> for PostCardView {
    fn from(record: &FeedItemRecord) -> Self {
        let group = match (record.group_slug.as_ref(), record.group_title.as_ref()) {
            (Some(slug), Some(title)) => Some(GroupLinkView {
                slug: slug.clone(),
                title: title.clone(),
            }),
            _ => None,
        };

        Self {
            id: record.id,
            text: record.text.clone(),
            author_username: record.author_username.clone(),
            author_display_name: record.author_display_name.clone(),
            published: format_published(record.created_at),
            group,
            image_url: record.image_path.as_deref().map(media_url),
        }
    }
}

#[derive(Clone)]
pub struct PaginationView {
    pub number: u32,
    pub total_pages: u32,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous: u32,
    pub next: u32,
    pub base_path: String,
}

impl PaginationView {
    pub fn from_page<T>(page: &Page<T>, base_path: impl Into<String>) -> Self {
        Self {
            number: page.number,
            total_pages: page.total_pages,
            has_previous: page.has_previous(),
            has_next: page.has_next(),
            previous: page.number.saturating_sub(1).max(1),
            next: page.number.saturating_add(1).min(page.total_pages),
            base_path: base_path.into(),
        }
    }
}

#[derive(Clone)]
pub struct CommentView {
    pub author_username: String,
    pub author_display_name: String,
    pub text: String,
    pub published: String,
}

#[derive(Clone)]
pub struct GroupOptionView {
    pub slug: String,
    pub title: String,
    pub selected: bool,
}

pub fn post_cards(items: &[FeedItemRecord]) -> Vec<PostCardView> {
    items.iter().map(PostCardView::from).collect()
}

pub fn group_options(groups: &[GroupRecord], selected: Option<&str>) -> Vec<GroupOptionView> {
    groups
        .iter()
        .map(|group| GroupOptionView {
            slug: group.slug.clone(),
            title: group.title.clone(),
            selected: selected == Some(group.slug.as_str()),
        })
        .collect()
}

fn format_published(at: OffsetDateTime) -> String {
    let format = format_description!("[day] [month repr:short] [year] [hour]:[minute]");
    at.format(&format).unwrap_or_else(|_| at.to_string())
}

fn media_url(stored_path: &str) -> String {
    format!("/media/{stored_path}")
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub viewer: Option<ViewerView>,
    pub posts: Vec<PostCardView>,
    pub pagination: PaginationView,
}

#[derive(Template)]
#[template(path = "group_list.html")]
pub struct GroupTemplate {
    pub viewer: Option<ViewerView>,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub posts: Vec<PostCardView>,
    pub pagination: PaginationView,
}

impl GroupTemplate {
    pub fn new(viewer: Option<ViewerView>, feed: &GroupFeed) -> Self {
        Self {
            viewer,
            slug: feed.group.slug.clone(),
            title: feed.group.title.clone(),
            description: feed.group.description.clone(),
            posts: post_cards(&feed.page.items),
            pagination: PaginationView::from_page(
                &feed.page,
                format!("/group/{}/", feed.group.slug),
            ),
        }
    }
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub viewer: Option<ViewerView>,
    pub username: String,
    pub display_name: String,
    pub post_count: u64,
    pub is_following: bool,
    pub can_follow: bool,
    pub posts: Vec<PostCardView>,
    pub pagination: PaginationView,
}

impl ProfileTemplate {
    pub fn new(viewer: Option<ViewerView>, feed: &AuthorFeed) -> Self {
        let can_follow = viewer
            .as_ref()
            .is_some_and(|v| v.username != feed.author.username);
        Self {
            viewer,
            username: feed.author.username.clone(),
            display_name: feed.author.display_name.clone(),
            post_count: feed.post_count,
            is_following: feed.is_following,
            can_follow,
            posts: post_cards(&feed.page.items),
            pagination: PaginationView::from_page(
                &feed.page,
                format!("/profile/{}/", feed.author.username),
            ),
        }
    }
}

#[derive(Template)]
#[template(path = "post_detail.html")]
pub struct PostDetailTemplate {
    pub viewer: Option<ViewerView>,
    pub post_id: i64,
    pub text: String,
    pub published: String,
    pub author_username: String,
    pub author_display_name: String,
    pub author_post_count: u64,
    pub group: Option<GroupLinkView>,
    pub image_url: Option<String>,
    pub can_edit: bool,
    pub comments: Vec<CommentView>,
}

impl PostDetailTemplate {
    pub fn new(viewer: Option<ViewerView>, detail: &PostDetail) -> Self {
        let can_edit = viewer
            .as_ref()
            .is_some_and(|v| v.username == detail.author.username);
        Self {
            viewer,
            post_id: detail.post.id,
            text: detail.post.text.clone(),
            published: format_published(detail.post.created_at),
            author_username: detail.author.username.clone(),
            author_display_name: detail.author.display_name.clone(),
            author_post_count: detail.author_post_count,
            group: detail.group.as_ref().map(|group| GroupLinkView {
                slug: group.slug.clone(),
                title: group.title.clone(),
            }),
            image_url: detail.post.image_path.as_deref().map(media_url),
            can_edit,
            comments: detail
                .comments
                .iter()
                .map(|comment| CommentView {
                    author_username: comment.author_username.clone(),
                    author_display_name: comment.author_display_name.clone(),
                    text: comment.text.clone(),
                    published: format_published(comment.created_at),
                })
                .collect(),
        }
    }
}

#[derive(Template)]
#[template(path = "post_form.html")]
pub struct PostFormTemplate {
    pub viewer: Option<ViewerView>,
    pub heading: String,
    pub submit_label: String,
    pub action: String,
    pub text: String,
    pub groups: Vec<GroupOptionView>,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "follow.html")]
pub struct FollowTemplate {
    pub viewer: Option<ViewerView>,
    pub posts: Vec<PostCardView>,
    pub pagination: PaginationView,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub viewer: Option<ViewerView>,
    pub status: u16,
    pub message: &'static str,
}
