use std::borrow::Cow;
use std::time::Duration;

use bytes::Bytes;
use reqwest::{header::HeaderMap, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};

use crate::{parser, ClientError, Result};

/// Content type announced for request bodies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ContentType {
    /// `application/json`
    #[default]
    Json,
    /// `text/xml`
    Xml,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Xml => "text/xml",
        }
    }
}

/// A single call to run through [`crate::ClientApi::execute_request`].
///
/// Defaults to `GET` with no parameters, headers or body, and a JSON
/// content type that is only announced when a body is present.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
    pub(crate) resource: String,
    pub(crate) method: Method,
    pub(crate) params: Vec<(String, String)>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Option<String>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) content_type: Option<ContentType>,
}

impl ApiRequest {
    /// Creates a `GET` request for `resource`, a path appended verbatim to
    /// the client base URL.
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            method: Method::GET,
            params: Vec::new(),
            headers: Vec::new(),
            body: None,
            timeout: None,
            content_type: Some(ContentType::Json),
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Adds one query parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Adds one request header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Sets a raw text body.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serializes `payload` as the JSON body and selects [`ContentType::Json`].
    pub fn json<T: Serialize + ?Sized>(mut self, payload: &T) -> Result<Self> {
        let body = serde_json::to_string(payload).map_err(|err| {
            ClientError::new(
                "request_serialization_error",
                format!("request payload could not be serialized: {err}"),
                None,
            )
        })?;
        self.body = Some(body);
        self.content_type = Some(ContentType::Json);
        Ok(self)
    }

    /// Per-request timeout handed to the transport as-is.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = Some(content_type);
        self
    }

    /// Leaves `Content-Type` to the caller's headers even when a body is set.
    pub fn without_content_type(mut self) -> Self {
        self.content_type = None;
        self
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Body to send, if any. An empty body counts as no body.
    pub fn body_text(&self) -> Option<&str> {
        self.body.as_deref().filter(|body| !body.is_empty())
    }

    /// Caller headers plus `Content-Type` when a non-empty body and a content
    /// type are both present. The content type replaces any caller-supplied
    /// value.
    pub fn effective_headers(&self) -> Vec<(String, String)> {
        match (self.body_text(), self.content_type) {
            (Some(_), Some(content_type)) => {
                let mut headers: Vec<(String, String)> = self
                    .headers
                    .iter()
                    .filter(|(name, _)| !name.eq_ignore_ascii_case("content-type"))
                    .cloned()
                    .collect();
                headers.push(("Content-Type".to_owned(), content_type.as_str().to_owned()));
                headers
            }
            _ => self.headers.clone(),
        }
    }
}

/// Successful HTTP response with its body already read.
#[derive(Clone, Debug)]
pub struct Response {
    pub(crate) status: StatusCode,
    pub(crate) url: String,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) elapsed: Duration,
}

impl Response {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Final URL of the request, after redirects.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw body bytes.
    pub fn content(&self) -> &[u8] {
        &self.body
    }

    pub fn bytes(&self) -> Bytes {
        self.body.clone()
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Time between dispatch and the end of the body read.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Parses the body as `T`; see [`crate::parse`].
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        parser::parse(self)
    }
}
