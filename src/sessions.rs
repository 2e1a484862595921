//! Pre-configured sessions.
//!
//! A [`Session`] owns the HTTP connection pool and an optional [`Auth`]
//! strategy. Credentials are checked when the session is built, never on
//! first use. The pool is released when the last clone of the session is
//! dropped, including on early returns and panics.
//!
//! Sessions are `Send + Sync` and cheap to clone: clones share one pool and
//! may be used from several tasks at once.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::auth::{Auth, Basic, Bearer, SharedSecret};
use crate::{ClientError, Result, SessionOptions};

/// HTTP session with an optional credential-injection strategy.
#[derive(Clone)]
pub struct Session {
    http: reqwest::Client,
    auth: Option<Arc<dyn Auth>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("auth", &self.auth).finish()
    }
}

impl Session {
    fn build(auth: Option<Arc<dyn Auth>>, options: &SessionOptions) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(user_agent) = &options.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }
        if let Some(timeout_ms) = options.connect_timeout_ms {
            builder = builder.connect_timeout(Duration::from_millis(timeout_ms));
        }
        if !options.default_headers.is_empty() {
            builder = builder.default_headers(default_header_map(&options.default_headers)?);
        }
        let http = builder.build().map_err(ClientError::Transport)?;
        Ok(Self { http, auth })
    }

    /// Auth strategy attached to this session, if any.
    pub fn auth(&self) -> Option<&dyn Auth> {
        self.auth.as_deref()
    }

    /// Applies the session's auth strategy to `headers`.
    pub fn sign(&self, headers: &mut HeaderMap) {
        if let Some(auth) = &self.auth {
            auth.sign(headers);
        }
    }

    pub(crate) fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http.request(method, url)
    }

    /// Signs and dispatches a request. Non-success statuses are not errors
    /// at this level.
    pub(crate) async fn send(
        &self,
        mut request: reqwest::Request,
    ) -> std::result::Result<reqwest::Response, reqwest::Error> {
        self.sign(request.headers_mut());
        self.http.execute(request).await
    }
}

fn default_header_map(headers: &[(String, String)]) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
            ClientError::new(
                "invalid_session_option",
                format!("invalid default header name {name:?}: {err}"),
                None,
            )
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|err| {
            ClientError::new(
                "invalid_session_option",
                format!("invalid value for default header {name:?}: {err}"),
                None,
            )
        })?;
        map.append(header_name, header_value);
    }
    Ok(map)
}

/// Session without credentials.
pub fn no_auth() -> Result<Session> {
    no_auth_with_options(&SessionOptions::default())
}

pub fn no_auth_with_options(options: &SessionOptions) -> Result<Session> {
    Session::build(None, options)
}

/// Session sending `Authorization: Bearer <token>`.
pub fn bearer(token: impl AsRef<str>) -> Result<Session> {
    bearer_with_options(token, &SessionOptions::default())
}

pub fn bearer_with_options(token: impl AsRef<str>, options: &SessionOptions) -> Result<Session> {
    custom_with_options(Bearer::new(token)?, options)
}

/// Bearer session whose token is read from the environment variable `var`.
///
/// A missing or blank variable fails with code `bearer_token_not_valid`.
pub fn bearer_from_env(var: &str) -> Result<Session> {
    let token = std::env::var(var).map_err(|_| {
        ClientError::auth(
            "bearer_token_not_valid",
            format!("missing {var} environment variable"),
        )
    })?;
    if token.trim().is_empty() {
        return Err(ClientError::auth(
            "bearer_token_not_valid",
            format!("{var} is set but empty"),
        ));
    }
    bearer(token)
}

/// Session sending a shared secret key on every request.
pub fn shared_secret(key: impl AsRef<str>) -> Result<Session> {
    shared_secret_with_options(key, &SessionOptions::default())
}

pub fn shared_secret_with_options(
    key: impl AsRef<str>,
    options: &SessionOptions,
) -> Result<Session> {
    custom_with_options(SharedSecret::new(key)?, options)
}

/// Session using HTTP basic authentication.
pub fn basic(username: impl Into<String>, password: impl AsRef<str>) -> Result<Session> {
    basic_with_options(username, password, &SessionOptions::default())
}

pub fn basic_with_options(
    username: impl Into<String>,
    password: impl AsRef<str>,
    options: &SessionOptions,
) -> Result<Session> {
    custom_with_options(Basic::new(username, password)?, options)
}

/// Session using any [`Auth`] strategy.
pub fn custom(auth: impl Auth + 'static) -> Result<Session> {
    custom_with_options(auth, &SessionOptions::default())
}

pub fn custom_with_options(auth: impl Auth + 'static, options: &SessionOptions) -> Result<Session> {
    Session::build(Some(Arc::new(auth)), options)
}
