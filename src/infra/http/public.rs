use std::{io::ErrorKind, sync::Arc};

use axum::{
    Form, Router,
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{
        HeaderValue, Request, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::{error, warn};

use crate::{
    application::{
        error::HttpError,
        feed::{FeedError, FeedService},
        follows::{FollowError, FollowService},
        posts::{PostError, PostInput, PostService},
        repos::{PingRepo, SessionsRepo},
    },
    cache::{CacheState, index_cache_layer},
    infra::uploads::{UploadStorage, UploadStorageError},
    presentation::views::{
        FollowTemplate, GroupTemplate, IndexTemplate, PaginationView, PostDetailTemplate,
        PostFormTemplate, ProfileTemplate, ViewerView, group_options, post_cards,
        render_not_found_response, render_template_response,
    },
};

use super::{
    auth::{AuthContext, MaybeAuth},
    db_health_response,
    middleware::{log_responses, set_request_context},
    repo_error_to_http,
};

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub posts: Arc<PostService>,
    pub follows: Arc<FollowService>,
    pub db_sessions: Arc<dyn SessionsRepo>,
    pub ping: Arc<dyn PingRepo>,
    pub upload_storage: Arc<UploadStorage>,
    pub cache: Option<CacheState>,
    pub max_upload_bytes: usize,
}

pub fn build_router(state: HttpState) -> Router {
    // Only the front page goes through the index cache.
    let cached_routes = Router::new().route("/", get(index));
    let cached_routes = if let Some(cache_state) = state.cache.clone() {
        cached_routes.layer(middleware::from_fn_with_state(
            cache_state,
            index_cache_layer,
        ))
    } else {
        cached_routes
    };

    let form_routes = Router::new()
        .route("/create/", get(post_create_form).post(post_create))
        .route("/posts/{id}/edit/", get(post_edit_form).post(post_edit))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes));

    cached_routes
        .route("/group/{slug}/", get(group_posts))
        .route("/profile/{username}/", get(profile))
        .route("/profile/{username}/follow/", get(profile_follow))
        .route("/profile/{username}/unfollow/", get(profile_unfollow))
        .route("/posts/{id}/", get(post_detail))
        .route("/posts/{id}/comment/", axum::routing::post(add_comment))
        .route("/follow/", get(follow_index))
        .route("/media/{*path}", get(serve_media))
        .route("/_health/db", get(health))
        .merge(form_routes)
        .fallback(fallback)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageQuery {
    #[serde(deserialize_with = "lenient_page")]
    page: Option<u32>,
}

impl PageQuery {
    fn number(&self) -> u32 {
        self.page.unwrap_or(1)
    }
}

// Garbage page input falls back to the first page; the paginator
// clamps everything numeric.
fn lenient_page<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| value.parse().ok()))
}

fn viewer_of(auth: &MaybeAuth) -> Option<ViewerView> {
    auth.0.as_ref().map(ViewerView::from)
}

async fn index(
    State(state): State<HttpState>,
    auth: MaybeAuth,
    Query(query): Query<PageQuery>,
) -> Response {
    match state.feed.list_all(query.number()).await {
        Ok(page) => render_template_response(
            IndexTemplate {
                viewer: viewer_of(&auth),
                posts: post_cards(&page.items),
                pagination: PaginationView::from_page(&page, "/"),
            },
            StatusCode::OK,
        ),
        Err(err) => feed_error_to_response(err, viewer_of(&auth)),
    }
}

async fn group_posts(
    State(state): State<HttpState>,
    auth: MaybeAuth,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    match state.feed.list_by_group(&slug, query.number()).await {
        Ok(feed) => render_template_response(
            GroupTemplate::new(viewer_of(&auth), &feed),
            StatusCode::OK,
        ),
        Err(err) => feed_error_to_response(err, viewer_of(&auth)),
    }
}

async fn profile(
    State(state): State<HttpState>,
    auth: MaybeAuth,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let viewer_id = auth.0.as_ref().map(|user| user.id);
    match state
        .feed
        .list_by_author(&username, query.number(), viewer_id)
        .await
    {
        Ok(feed) => render_template_response(
            ProfileTemplate::new(viewer_of(&auth), &feed),
            StatusCode::OK,
        ),
        Err(err) => feed_error_to_response(err, viewer_of(&auth)),
    }
}

async fn post_detail(
    State(state): State<HttpState>,
    auth: MaybeAuth,
    Path(id): Path<i64>,
) -> Response {
    match state.feed.post_detail(id).await {
        Ok(detail) => render_template_response(
            PostDetailTemplate::new(viewer_of(&auth), &detail),
            StatusCode::OK,
        ),
        Err(err) => feed_error_to_response(err, viewer_of(&auth)),
    }
}

async fn post_create_form(State(state): State<HttpState>, auth: AuthContext) -> Response {
    let groups = match state.posts.group_options().await {
        Ok(groups) => groups,
        Err(err) => return post_error_to_response(err, None),
    };

    render_template_response(
        PostFormTemplate {
            viewer: Some(ViewerView::from(&auth.user)),
            heading: "New post".to_string(),
            submit_label: "Publish".to_string(),
            action: "/create/".to_string(),
            text: String::new(),
            groups: group_options(&groups, None),
            error: None,
        },
        StatusCode::OK,
    )
}

async fn post_create(
    State(state): State<HttpState>,
    auth: AuthContext,
    multipart: Multipart,
) -> Response {
    let form = match read_post_form(multipart).await {
        Ok(form) => form,
        Err(err) => return err.into_response(),
    };

    let image_path = match store_image(&state, form.image).await {
        Ok(path) => path,
        Err(err) => return err.into_response(),
    };

    let input = PostInput {
        text: form.text,
        group_slug: form.group_slug,
        image_path,
    };

    match state.posts.create_post(auth.user.id, input.clone()).await {
        Ok(_) => {
            metrics::counter!("yatube_posts_created_total").increment(1);
            Redirect::to(&format!("/profile/{}/", auth.user.username)).into_response()
        }
        Err(err) => {
            discard_upload(&state, input.image_path.as_deref()).await;
            match err {
                PostError::Validation(message) => {
                    render_post_form_again(&state, &auth, "/create/", input, message).await
                }
                err => post_error_to_response(err, Some(ViewerView::from(&auth.user))),
            }
        }
    }
}

async fn post_edit_form(
    State(state): State<HttpState>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Response {
    let post = match state.posts.editable_post(auth.user.id, id).await {
        Ok(post) => post,
        // Editing someone else's post lands the viewer back on the post.
        Err(PostError::NotAuthor) => {
            return Redirect::to(&format!("/posts/{id}/")).into_response();
        }
        Err(err) => return post_error_to_response(err, Some(ViewerView::from(&auth.user))),
    };

    let groups = match state.posts.group_options().await {
        Ok(groups) => groups,
        Err(err) => return post_error_to_response(err, Some(ViewerView::from(&auth.user))),
    };

    let selected = post
        .group_id
        .and_then(|group_id| groups.iter().find(|group| group.id == group_id))
        .map(|group| group.slug.clone());

    render_template_response(
        PostFormTemplate {
            viewer: Some(ViewerView::from(&auth.user)),
            heading: "Edit post".to_string(),
            submit_label: "Save".to_string(),
            action: format!("/posts/{id}/edit/"),
            text: post.text,
            groups: group_options(&groups, selected.as_deref()),
            error: None,
        },
        StatusCode::OK,
    )
}

async fn post_edit(
    State(state): State<HttpState>,
    auth: AuthContext,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Response {
    let form = match read_post_form(multipart).await {
        Ok(form) => form,
        Err(err) => return err.into_response(),
    };

    let image_path = match store_image(&state, form.image).await {
        Ok(path) => path,
        Err(err) => return err.into_response(),
    };

    let input = PostInput {
        text: form.text,
        group_slug: form.group_slug,
        image_path,
    };

    match state.posts.update_post(auth.user.id, id, input.clone()).await {
        Ok(_) => Redirect::to(&format!("/posts/{id}/")).into_response(),
        Err(err) => {
            discard_upload(&state, input.image_path.as_deref()).await;
            match err {
                PostError::NotAuthor => Redirect::to(&format!("/posts/{id}/")).into_response(),
                PostError::Validation(message) => {
                    render_post_form_again(
                        &state,
                        &auth,
                        &format!("/posts/{id}/edit/"),
                        input,
                        message,
                    )
                    .await
                }
                err => post_error_to_response(err, Some(ViewerView::from(&auth.user))),
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct CommentForm {
    text: String,
}

async fn add_comment(
    State(state): State<HttpState>,
    auth: AuthContext,
    Path(id): Path<i64>,
    Form(form): Form<CommentForm>,
) -> Response {
    match state.posts.add_comment(auth.user.id, id, &form.text).await {
        Ok(_) => {
            metrics::counter!("yatube_comments_created_total").increment(1);
            Redirect::to(&format!("/posts/{id}/")).into_response()
        }
        Err(err) => post_error_to_response(err, Some(ViewerView::from(&auth.user))),
    }
}

async fn follow_index(
    State(state): State<HttpState>,
    auth: AuthContext,
    Query(query): Query<PageQuery>,
) -> Response {
    match state.feed.list_followed(auth.user.id, query.number()).await {
        Ok(page) => render_template_response(
            FollowTemplate {
                viewer: Some(ViewerView::from(&auth.user)),
                posts: post_cards(&page.items),
                pagination: PaginationView::from_page(&page, "/follow/"),
            },
            StatusCode::OK,
        ),
        Err(err) => feed_error_to_response(err, Some(ViewerView::from(&auth.user))),
    }
}

async fn profile_follow(
    State(state): State<HttpState>,
    auth: AuthContext,
    Path(username): Path<String>,
) -> Response {
    match state.follows.follow(auth.user.id, &username).await {
        Ok(author) => {
            metrics::counter!("yatube_follows_total").increment(1);
            Redirect::to(&format!("/profile/{}/", author.username)).into_response()
        }
        // Following yourself changes nothing; land back on the profile.
        Err(FollowError::SelfFollow) => {
            warn!(username = %username, "self-follow attempt ignored");
            Redirect::to(&format!("/profile/{username}/")).into_response()
        }
        Err(err) => follow_error_to_response(err, Some(ViewerView::from(&auth.user))),
    }
}

async fn profile_unfollow(
    State(state): State<HttpState>,
    auth: AuthContext,
    Path(username): Path<String>,
) -> Response {
    match state.follows.unfollow(auth.user.id, &username).await {
        Ok(author) => {
            metrics::counter!("yatube_unfollows_total").increment(1);
            Redirect::to(&format!("/profile/{}/", author.username)).into_response()
        }
        Err(err) => follow_error_to_response(err, Some(ViewerView::from(&auth.user))),
    }
}

async fn serve_media(State(state): State<HttpState>, Path(path): Path<String>) -> Response {
    const SOURCE: &str = "infra::http::public::serve_media";

    match state.upload_storage.read(&path).await {
        Ok(bytes) => build_media_response(&path, bytes),
        Err(UploadStorageError::InvalidPath) => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Media not found",
            "The requested file is not available",
        )
        .into_response(),
        Err(UploadStorageError::Io(err)) if err.kind() == ErrorKind::NotFound => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Media not found",
            "The requested file is not available",
        )
        .into_response(),
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path,
                error = %err,
                "failed to read stored upload"
            );
            HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read uploaded file",
                err.to_string(),
            )
            .into_response()
        }
    }
}

async fn health(State(state): State<HttpState>) -> Response {
    db_health_response(state.ping.ping().await)
}

async fn fallback(auth: MaybeAuth, _request: Request<Body>) -> Response {
    render_not_found_response(viewer_of(&auth))
}

struct PostFormData {
    text: String,
    group_slug: Option<String>,
    image: Option<(String, Bytes)>,
}

async fn read_post_form(mut multipart: Multipart) -> Result<PostFormData, HttpError> {
    const SOURCE: &str = "infra::http::public::read_post_form";

    let mut text = String::new();
    let mut group_slug = None;
    let mut image = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        HttpError::from_error(SOURCE, StatusCode::BAD_REQUEST, "Malformed form data", &err)
    })? {
        match field.name() {
            Some("text") => {
                text = field.text().await.map_err(|err| {
                    HttpError::from_error(SOURCE, StatusCode::BAD_REQUEST, "Malformed form data", &err)
                })?;
            }
            Some("group") => {
                let value = field.text().await.map_err(|err| {
                    HttpError::from_error(SOURCE, StatusCode::BAD_REQUEST, "Malformed form data", &err)
                })?;
                if !value.is_empty() {
                    group_slug = Some(value);
                }
            }
            Some("image") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let data = field.bytes().await.map_err(|err| {
                    HttpError::from_error(
                        SOURCE,
                        StatusCode::PAYLOAD_TOO_LARGE,
                        "Uploaded file too large",
                        &err,
                    )
                })?;
                if !data.is_empty() {
                    image = Some((file_name, data));
                }
            }
            _ => {}
        }
    }

    Ok(PostFormData {
        text,
        group_slug,
        image,
    })
}

async fn store_image(
    state: &HttpState,
    image: Option<(String, Bytes)>,
) -> Result<Option<String>, HttpError> {
    const SOURCE: &str = "infra::http::public::store_image";

    match image {
        None => Ok(None),
        Some((file_name, data)) => {
            let stored = state
                .upload_storage
                .store(&file_name, data)
                .await
                .map_err(|err| {
                    HttpError::from_error(
                        SOURCE,
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Failed to store uploaded file",
                        &err,
                    )
                })?;
            Ok(Some(stored.stored_path))
        }
    }
}

/// Remove an upload whose post never made it into storage.
async fn discard_upload(state: &HttpState, stored_path: Option<&str>) {
    let Some(path) = stored_path else {
        return;
    };
    if let Err(err) = state.upload_storage.delete(path).await {
        warn!(path = %path, error = %err, "failed to remove unused upload");
    }
}

/// Re-render the post form with the submitted values and a validation
/// message instead of discarding the user's input.
async fn render_post_form_again(
    state: &HttpState,
    auth: &AuthContext,
    action: &str,
    input: PostInput,
    message: String,
) -> Response {
    let groups = match state.posts.group_options().await {
        Ok(groups) => groups,
        Err(err) => return post_error_to_response(err, Some(ViewerView::from(&auth.user))),
    };

    render_template_response(
        PostFormTemplate {
            viewer: Some(ViewerView::from(&auth.user)),
            heading: if action == "/create/" {
                "New post".to_string()
            } else {
                "Edit post".to_string()
            },
            submit_label: "Save".to_string(),
            action: action.to_string(),
            text: input.text,
            groups: group_options(&groups, input.group_slug.as_deref()),
            error: Some(message),
        },
        // Form validation failures re-render the form, they are not
        // error responses.
        StatusCode::OK,
    )
}

fn feed_error_to_response(err: FeedError, viewer: Option<ViewerView>) -> Response {
    const SOURCE: &str = "infra::http::public::feed_error_to_response";
    match err {
        FeedError::UnknownGroup | FeedError::UnknownUser | FeedError::UnknownPost => {
            render_not_found_response(viewer)
        }
        FeedError::Repo(repo) => repo_error_to_http(SOURCE, repo).into_response(),
    }
}

fn post_error_to_response(err: PostError, viewer: Option<ViewerView>) -> Response {
    const SOURCE: &str = "infra::http::public::post_error_to_response";
    match err {
        PostError::UnknownPost | PostError::UnknownGroup => render_not_found_response(viewer),
        PostError::NotAuthor => HttpError::new(
            SOURCE,
            StatusCode::FORBIDDEN,
            "Only the author may edit this post",
            "author mismatch",
        )
        .into_response(),
        PostError::Validation(message) => {
            HttpError::new(SOURCE, StatusCode::BAD_REQUEST, "Validation failed", message)
                .into_response()
        }
        PostError::Repo(repo) => repo_error_to_http(SOURCE, repo).into_response(),
    }
}

fn follow_error_to_response(err: FollowError, viewer: Option<ViewerView>) -> Response {
    const SOURCE: &str = "infra::http::public::follow_error_to_response";
    match err {
        FollowError::UnknownUser => render_not_found_response(viewer),
        FollowError::SelfFollow => HttpError::new(
            SOURCE,
            StatusCode::CONFLICT,
            "You cannot follow yourself",
            "self-follow rejected",
        )
        .into_response(),
        FollowError::Repo(repo) => repo_error_to_http(SOURCE, repo).into_response(),
    }
}

fn build_media_response(path: &str, bytes: Bytes) -> Response {
    let mut response = Response::new(Body::from(bytes.clone()));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&bytes.len().to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}
