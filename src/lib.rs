//! `clientapi` is a base library for thin REST API clients.
//!
//! - [`ClientApi::execute_request`] runs one call through a [`Session`]
//! - [`parse`] turns a response into a typed value, optionally through the
//!   [`responses::Entity`] / [`responses::Collection`] envelopes
//! - [`sessions`] builds sessions with bearer, shared-secret, basic or custom auth
//! - every failure is a [`ClientError`] exposing a stable `{code, detail, source}`

pub mod auth;
mod client;
mod error;
mod options;
mod parser;
pub mod responses;
pub mod sessions;
mod types;

#[cfg(feature = "mock")]
pub mod mock;

pub use client::ClientApi;
pub use error::{
    ClientError, ErrorContent, ExtractionError, FieldError, HttpError, HttpFailure,
    ValidationError, ValidationFailure,
};
pub use options::SessionOptions;
pub use parser::{parse, parse_slice};
pub use reqwest::{Method, StatusCode};
pub use sessions::Session;
pub use types::{ApiRequest, ContentType, Response};

pub type Result<T> = std::result::Result<T, ClientError>;
