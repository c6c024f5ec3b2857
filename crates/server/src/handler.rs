//! HTTP surface.
//!
//! `GET`/`POST` on `/css`, `/js` and `/less` run the pipeline with the
//! matching processor. Multipart bodies contribute their file parts; any
//! other request contributes its query string and urlencoded body.

use std::sync::Arc;

use axum::Router;
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State};
use axum::http::{HeaderMap, header};
use axum::routing::get;
use reducer_client::minify::{Processor, Transform};
use reducer_core::Error;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::pipeline::{self, Pipeline, Reply};

/// Default inbound body limit.
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Router state: the pipeline plus one processor per transformation.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    css: Arc<dyn Processor>,
    js: Arc<dyn Processor>,
    less: Arc<dyn Processor>,
    max_body_bytes: usize,
}

impl AppState {
    /// State serving the built-in processors.
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            css: Transform::Css.processor(),
            js: Transform::Js.processor(),
            less: Transform::Less.processor(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Replace the processor behind one transformation.
    pub fn with_processor(mut self, transform: Transform, processor: Arc<dyn Processor>) -> Self {
        match transform {
            Transform::Css => self.css = processor,
            Transform::Js => self.js = processor,
            Transform::Less => self.less = processor,
        }
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    fn processor(&self, transform: Transform) -> Arc<dyn Processor> {
        match transform {
            Transform::Css => Arc::clone(&self.css),
            Transform::Js => Arc::clone(&self.js),
            Transform::Less => Arc::clone(&self.less),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let max_body_bytes = state.max_body_bytes;
    Router::new()
        .route(Transform::Css.path(), get(css).post(css))
        .route(Transform::Js.path(), get(js).post(js))
        .route(Transform::Less.path(), get(less).post(less))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn css(State(state): State<AppState>, request: Request) -> Result<Reply, ApiError> {
    handle(&state, Transform::Css, request).await
}

async fn js(State(state): State<AppState>, request: Request) -> Result<Reply, ApiError> {
    handle(&state, Transform::Js, request).await
}

async fn less(State(state): State<AppState>, request: Request) -> Result<Reply, ApiError> {
    handle(&state, Transform::Less, request).await
}

fn has_content_type(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim_start().to_ascii_lowercase().starts_with(expected))
}

async fn handle(state: &AppState, transform: Transform, request: Request) -> Result<Reply, ApiError> {
    let (parts, body) = request.into_parts();

    let (fragments, directives) = if has_content_type(&parts.headers, "multipart/form-data") {
        let params = pipeline::parse_params(parts.uri.query(), None);
        let directives = pipeline::directives(&parts.headers, &params);
        let multipart = Multipart::from_request(Request::from_parts(parts, body), &())
            .await
            .map_err(|rejection| ApiError(Error::InvalidInput(rejection.body_text())))?;
        (pipeline::collect_uploads(multipart).await?, directives)
    } else {
        let form = if has_content_type(&parts.headers, "application/x-www-form-urlencoded") {
            let bytes = axum::body::to_bytes(body, state.max_body_bytes)
                .await
                .map_err(|e| ApiError(Error::InvalidInput(e.to_string())))?;
            Some(bytes)
        } else {
            None
        };
        let params = pipeline::parse_params(parts.uri.query(), form.as_deref());
        let directives = pipeline::directives(&parts.headers, &params);
        (state.pipeline.collect_params(&params, &directives).await?, directives)
    };

    tracing::debug!(processor = transform.path(), fragments = fragments.len(), "collected request sources");
    state.pipeline.run(&fragments, &directives, state.processor(transform)).await.map_err(ApiError::from)
}
