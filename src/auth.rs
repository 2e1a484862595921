//! Credential-injection strategies applied by a [`crate::Session`].

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};

use crate::{ClientError, Result};

/// Name of the header carrying a [`SharedSecret`] key.
pub const SHARED_SECRET_HEADER: &str = "shared_secret";

/// Signs outgoing requests by adding headers.
///
/// Implementations validate their credentials when constructed, so signing
/// itself cannot fail.
pub trait Auth: Send + Sync + fmt::Debug {
    fn sign(&self, headers: &mut HeaderMap);
}

/// `Authorization: Bearer <token>`.
#[derive(Clone)]
pub struct Bearer {
    value: HeaderValue,
}

impl Bearer {
    /// Fails with code `bearer_token_not_valid` when the token is blank or
    /// cannot be sent as a header. The token is sent verbatim after the
    /// `Bearer ` scheme.
    pub fn new(token: impl AsRef<str>) -> Result<Self> {
        let token = token.as_ref();
        if token.trim().is_empty() {
            return Err(ClientError::auth(
                "bearer_token_not_valid",
                "No token set to query the API",
            ));
        }
        let value = sensitive_value(&format!("Bearer {token}")).ok_or_else(|| {
            ClientError::auth(
                "bearer_token_not_valid",
                "The bearer token contains characters not allowed in a header",
            )
        })?;
        Ok(Self { value })
    }
}

impl Auth for Bearer {
    fn sign(&self, headers: &mut HeaderMap) {
        headers.insert(AUTHORIZATION, self.value.clone());
    }
}

impl fmt::Debug for Bearer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bearer")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Shared secret sent in the [`SHARED_SECRET_HEADER`] header.
#[derive(Clone)]
pub struct SharedSecret {
    value: HeaderValue,
}

impl SharedSecret {
    /// Fails with code `shared_secret_key_not_valid` when the key is blank or
    /// cannot be sent as a header.
    pub fn new(key: impl AsRef<str>) -> Result<Self> {
        let key = key.as_ref();
        if key.trim().is_empty() {
            return Err(ClientError::auth(
                "shared_secret_key_not_valid",
                "No shared secret key set to query the API",
            ));
        }
        let value = sensitive_value(key).ok_or_else(|| {
            ClientError::auth(
                "shared_secret_key_not_valid",
                "The shared secret key contains characters not allowed in a header",
            )
        })?;
        Ok(Self { value })
    }
}

impl Auth for SharedSecret {
    fn sign(&self, headers: &mut HeaderMap) {
        headers.insert(
            HeaderName::from_static(SHARED_SECRET_HEADER),
            self.value.clone(),
        );
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSecret")
            .field("key", &"<redacted>")
            .finish()
    }
}

/// HTTP basic authentication.
#[derive(Clone)]
pub struct Basic {
    username: String,
    value: HeaderValue,
}

impl Basic {
    /// Fails with code `basic_credentials_not_valid` when the username is
    /// blank. An empty password is allowed.
    pub fn new(username: impl Into<String>, password: impl AsRef<str>) -> Result<Self> {
        let username = username.into();
        if username.trim().is_empty() {
            return Err(ClientError::auth(
                "basic_credentials_not_valid",
                "No username set to query the API",
            ));
        }
        let encoded = STANDARD.encode(format!("{username}:{}", password.as_ref()));
        let value = sensitive_value(&format!("Basic {encoded}")).ok_or_else(|| {
            ClientError::auth(
                "basic_credentials_not_valid",
                "The basic credentials could not be encoded as a header",
            )
        })?;
        Ok(Self { username, value })
    }
}

impl Auth for Basic {
    fn sign(&self, headers: &mut HeaderMap) {
        headers.insert(AUTHORIZATION, self.value.clone());
    }
}

impl fmt::Debug for Basic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Basic")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Any single header carrying a credential, e.g. `X-Api-Key`.
#[derive(Clone)]
pub struct HeaderAuth {
    name: HeaderName,
    value: HeaderValue,
}

impl HeaderAuth {
    /// Fails with code `auth_header_not_valid` when the name or value is not
    /// a valid header, or the value is blank.
    pub fn new(name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_ref().as_bytes()).map_err(|err| {
            ClientError::auth("auth_header_not_valid", format!("invalid header name: {err}"))
        })?;
        let value = value.as_ref();
        if value.trim().is_empty() {
            return Err(ClientError::auth(
                "auth_header_not_valid",
                format!("No value set for the {name} header"),
            ));
        }
        let value = sensitive_value(value).ok_or_else(|| {
            ClientError::auth(
                "auth_header_not_valid",
                format!("The {name} header value contains characters not allowed in a header"),
            )
        })?;
        Ok(Self { name, value })
    }
}

impl Auth for HeaderAuth {
    fn sign(&self, headers: &mut HeaderMap) {
        headers.insert(self.name.clone(), self.value.clone());
    }
}

impl fmt::Debug for HeaderAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderAuth")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .finish()
    }
}

fn sensitive_value(value: &str) -> Option<HeaderValue> {
    let mut value = HeaderValue::from_str(value).ok()?;
    value.set_sensitive(true);
    Some(value)
}
