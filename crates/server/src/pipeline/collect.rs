//! Source collection: request parameters and multipart uploads to fragments.

use std::collections::BTreeMap;

use axum::extract::Multipart;
use axum::http::{HeaderMap, HeaderName, header};
use reducer_client::fetch::is_remote_reference;
use reducer_core::policy::{EXPIRE_URLS_PARAM, MAX_AGE_PARAM};
use reducer_core::{CacheDirectives, Error, Fragment};

use super::Pipeline;
use crate::error::ApiError;

/// Request parameters by name, each with its values in transport order.
///
/// Names iterate in natural string order, which is the aggregation order.
pub type ParamMap = BTreeMap<String, Vec<String>>;

/// Merge the query string and an urlencoded body, query values first.
pub fn parse_params(query: Option<&str>, form_body: Option<&[u8]>) -> ParamMap {
    let mut params = ParamMap::new();
    for source in [query.map(str::as_bytes), form_body].into_iter().flatten() {
        for (name, value) in url::form_urlencoded::parse(source) {
            params.entry(name.into_owned()).or_default().push(value.into_owned());
        }
    }
    params
}

/// Names containing `_` or `-` are control parameters, never content.
pub fn is_reserved(name: &str) -> bool {
    name.contains('_') || name.contains('-')
}

/// Project the caching-related parts of a request.
pub fn directives(headers: &HeaderMap, params: &ParamMap) -> CacheDirectives {
    let header_value = |name: HeaderName| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    let param = |name: &str| params.get(name).and_then(|values| values.first()).cloned();

    CacheDirectives {
        cache_control: header_value(header::CACHE_CONTROL),
        pragma: header_value(header::PRAGMA),
        if_modified_since: header_value(header::IF_MODIFIED_SINCE),
        max_age: param(MAX_AGE_PARAM),
        expire_urls: param(EXPIRE_URLS_PARAM),
    }
}

/// Read every file part of a multipart body, in encounter order.
///
/// Parts without a file name are plain form fields and are skipped.
pub async fn collect_uploads(mut multipart: Multipart) -> Result<Vec<Fragment>, ApiError> {
    let mut fragments = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.file_name().is_none() {
            continue;
        }
        let bytes = field.bytes().await?;
        fragments.push(Fragment::upload(fragments.len(), String::from_utf8_lossy(&bytes)));
    }
    Ok(fragments)
}

impl Pipeline {
    /// Turn non-reserved parameters into fragments, dereferencing remote
    /// references through the remote fetch cache. Fetches run one at a time
    /// so fragment order is preserved.
    pub async fn collect_params(&self, params: &ParamMap, directives: &CacheDirectives) -> Result<Vec<Fragment>, Error> {
        let mut fragments = Vec::new();
        for (name, values) in params.iter().filter(|(name, _)| !is_reserved(name)) {
            for value in values {
                let fragment = if is_remote_reference(value) {
                    Fragment::remote(name, self.resolve_remote(directives, value).await?)
                } else {
                    Fragment::inline(name, value)
                };
                fragments.push(fragment);
            }
        }
        Ok(fragments)
    }
}
