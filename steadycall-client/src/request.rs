//! Request description.
//!
//! [`RequestSpec`] describes one logical call: method, path, query, headers,
//! body and per-call overrides. It is built with a consuming builder and is
//! not mutated afterwards; retries resend the same description.

use std::collections::BTreeMap;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use steadycall_core::ErrorKind;

use crate::ClientError;
use crate::config::CallOptions;

/// Description of a logical call.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use steadycall_client::{CallOptions, RequestSpec};
///
/// let spec = RequestSpec::post("/v1/jobs")
///     .query("dry_run", "true")
///     .json(&serde_json::json!({ "name": "reindex" }))?
///     .options(CallOptions::new().timeout(Duration::from_secs(30)));
///
/// assert_eq!(spec.path(), "/v1/jobs");
/// # Ok::<(), steadycall_client::ClientError>(())
/// ```
#[derive(Clone, Debug)]
pub struct RequestSpec {
    method: Method,
    path: String,
    query: BTreeMap<String, String>,
    headers: HeaderMap,
    body: Bytes,
    options: CallOptions,
}

impl RequestSpec {
    /// Create a request with the given method and path.
    ///
    /// The path is appended to the client's base address.
    pub fn new<P: Into<String>>(method: Method, path: P) -> Self {
        Self {
            method,
            path: path.into(),
            query: BTreeMap::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            options: CallOptions::default(),
        }
    }

    pub fn get<P: Into<String>>(path: P) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post<P: Into<String>>(path: P) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put<P: Into<String>>(path: P) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch<P: Into<String>>(path: P) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete<P: Into<String>>(path: P) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Set a query parameter, replacing any previous value for `key`.
    pub fn query<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.query.insert(key.into(), value.to_string());
        self
    }

    /// Set a request header, replacing any previous value.
    ///
    /// # Panics
    ///
    /// Panics if the header name or value is invalid.
    pub fn header<K, V>(mut self, name: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        K::Error: std::fmt::Debug,
        V: TryInto<HeaderValue>,
        V::Error: std::fmt::Debug,
    {
        let name = name.try_into().expect("invalid header name");
        let value = value.try_into().expect("invalid header value");
        self.headers.insert(name, value);
        self
    }

    /// Try to set a request header.
    ///
    /// Returns `None` if the header name or value is invalid.
    pub fn try_header<K, V>(mut self, name: K, value: V) -> Option<Self>
    where
        K: TryInto<HeaderName>,
        V: TryInto<HeaderValue>,
    {
        let name = name.try_into().ok()?;
        let value = value.try_into().ok()?;
        self.headers.insert(name, value);
        Some(self)
    }

    /// Serialize `body` as JSON and use it as the request body.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ClientError> {
        let encoded = serde_json::to_vec(body).map_err(|e| {
            ClientError::new(ErrorKind::BadRequest, format!("JSON encoding failed: {}", e))
        })?;
        self.body = Bytes::from(encoded);
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }

    /// Use raw bytes as the request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set per-call overrides.
    pub fn options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn get_body(&self) -> &Bytes {
        &self.body
    }

    pub fn get_query(&self) -> &BTreeMap<String, String> {
        &self.query
    }

    pub fn get_options(&self) -> &CallOptions {
        &self.options
    }

    /// Copy of this request with one more query parameter.
    pub(crate) fn with_query(&self, key: &str, value: &str) -> Self {
        self.clone().query(key, value)
    }

    /// Encode the query parameters, without the leading `?`.
    pub(crate) fn encoded_query(&self) -> Result<Option<String>, ClientError> {
        if self.query.is_empty() {
            return Ok(None);
        }
        serde_qs::to_string(&self.query)
            .map(Some)
            .map_err(|e| ClientError::new(ErrorKind::BadRequest, format!("invalid query: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_set_method() {
        assert_eq!(*RequestSpec::get("/a").method(), Method::GET);
        assert_eq!(*RequestSpec::post("/a").method(), Method::POST);
        assert_eq!(*RequestSpec::put("/a").method(), Method::PUT);
        assert_eq!(*RequestSpec::patch("/a").method(), Method::PATCH);
        assert_eq!(*RequestSpec::delete("/a").method(), Method::DELETE);
    }

    #[test]
    fn test_json_body_sets_content_type() {
        let spec = RequestSpec::post("/items")
            .json(&serde_json::json!({"name": "a"}))
            .unwrap();
        assert_eq!(spec.get_body(), &Bytes::from(r#"{"name":"a"}"#));
        assert_eq!(spec.headers().get(CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn test_headers_have_unique_keys() {
        let spec = RequestSpec::get("/")
            .header("x-tenant", "a")
            .header("X-Tenant", "b");
        assert_eq!(spec.headers().len(), 1);
        assert_eq!(spec.headers().get("x-tenant").unwrap(), "b");
        assert!(RequestSpec::get("/").try_header("bad name", "v").is_none());
    }

    #[test]
    fn test_query_encoding() {
        let spec = RequestSpec::get("/search")
            .query("q", "rust")
            .query("limit", 10)
            .query("limit", 20);
        let query = spec.encoded_query().unwrap().unwrap();
        assert_eq!(query, "limit=20&q=rust");
        assert_eq!(RequestSpec::get("/").encoded_query().unwrap(), None);
    }

    #[test]
    fn test_with_query_leaves_original_untouched() {
        let spec = RequestSpec::get("/items").query("limit", 2);
        let next = spec.with_query("page_token", "t1");
        assert_eq!(next.get_query().get("page_token").unwrap(), "t1");
        assert!(spec.get_query().get("page_token").is_none());
    }

    #[test]
    fn test_unserializable_json_is_bad_request() {
        let mut map = std::collections::HashMap::new();
        map.insert(vec![1u8], "value");
        let err = RequestSpec::post("/").json(&map).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }
}
