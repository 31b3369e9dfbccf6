//! Index cache middleware.
//!
//! Serves the cached front page for anonymous GET requests to `/` with no
//! query string. Paginated views, authenticated sessions and every other
//! route bypass the cache.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, instrument};

use crate::infra::http::SESSION_COOKIE;

use super::{CacheConfig, CachedPage, IndexCache};

const MAX_CACHED_BODY_BYTES: usize = 1024 * 1024;

/// Shared cache state for middleware.
#[derive(Clone)]
pub struct CacheState {
    pub config: CacheConfig,
    pub index: Arc<IndexCache>,
}

#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn index_cache_layer(
    State(cache): State<CacheState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !cache.config.enabled || !is_cacheable(&request) {
        return next.run(request).await;
    }

    if let Some(cached) = cache.index.get() {
        metrics::counter!("yatube_cache_hits_total").increment(1);
        debug!(cache = "index", outcome = "hit", "serving cached index");
        return build_response(cached);
    }

    metrics::counter!("yatube_cache_misses_total").increment(1);
    debug!(cache = "index", outcome = "miss", "rendering index");

    let response = next.run(request).await;
    if response.status() != StatusCode::OK {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_CACHED_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let content_type = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    cache.index.store(CachedPage::new(
        parts.status.as_u16(),
        content_type,
        bytes.clone(),
    ));

    Response::from_parts(parts, Body::from(bytes))
}

/// Only the anonymous, unpaginated front page is cached.
fn is_cacheable(request: &Request<Body>) -> bool {
    if request.method() != Method::GET {
        return false;
    }
    if request.uri().path() != "/" {
        return false;
    }
    if request.uri().query().is_some_and(|query| !query.is_empty()) {
        return false;
    }
    !has_session_cookie(request)
}

fn has_session_cookie(request: &Request<Body>) -> bool {
    request
        .headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .any(|pair| {
            pair.trim()
                .split_once('=')
                .is_some_and(|(name, _)| name == SESSION_COOKIE)
        })
}

fn build_response(cached: CachedPage) -> Response {
    let mut builder = Response::builder().status(cached.status);
    if let Some(content_type) = cached.content_type.as_deref()
        && let Ok(value) = HeaderValue::from_str(content_type)
    {
        builder = builder.header(header::CONTENT_TYPE, value);
    }
    builder
        .body(Body::from(cached.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
