use std::borrow::Cow;
use std::fmt;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const CLIENT_ERROR_CODE: &str = "client_error";
const CLIENT_ERROR_DETAIL: &str = "The API client failed.";
const VALIDATION_ERROR_CODE: &str = "api_validation_error";
const VALIDATION_ERROR_DETAIL: &str = "One or more parameters are invalid.";
const UNKNOWN_HTTP_ERROR_CODE: &str = "unknown";
const TRANSPORT_ERROR_CODE: &str = "transport_error";

/// The `{code, detail, source}` triple carried by every error of this crate.
///
/// It is also the error document remote services are expected to return on
/// 4xx/5xx responses: `code` and `detail` are required strings, `source` is
/// free-form and optional.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorContent {
    /// Machine-readable error code, stable enough to branch on.
    pub code: String,
    /// Human-readable description.
    pub detail: String,
    /// Optional structured context.
    #[serde(default)]
    pub source: Option<Value>,
}

impl ErrorContent {
    fn with_defaults(
        code: impl Into<String>,
        detail: impl Into<String>,
        source: Option<Value>,
        default_code: &str,
        default_detail: &str,
    ) -> Self {
        let code = non_empty_or(code.into(), default_code);
        let detail = non_empty_or(detail.into(), default_detail);
        Self {
            code,
            detail,
            source,
        }
    }
}

impl fmt::Display for ErrorContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) {}.", self.code, self.detail)?;
        if let Some(source) = &self.source {
            write!(f, " Source: {source}")?;
        }
        Ok(())
    }
}

fn non_empty_or(value: String, default: &str) -> String {
    if value.trim().is_empty() {
        default.to_owned()
    } else {
        value
    }
}

/// Failure raised while extracting field errors from a validation failure.
pub type ExtractionError = Box<dyn std::error::Error + Send + Sync>;

/// One per-field schema validation failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Path to the offending field, outermost segment first.
    pub location: Vec<String>,
    /// Validator message.
    pub message: String,
    /// Short failure category, e.g. `missing` or `invalid_type`.
    pub kind: String,
}

/// A lower-level schema validation failure that can describe its field errors.
///
/// Extraction may itself fail; [`ValidationError::wrap`] treats that as
/// "no field information" rather than an error.
pub trait ValidationFailure {
    fn field_errors(&self) -> std::result::Result<Vec<FieldError>, ExtractionError>;
}

impl ValidationFailure for serde_path_to_error::Error<serde_json::Error> {
    fn field_errors(&self) -> std::result::Result<Vec<FieldError>, ExtractionError> {
        let mut location: Vec<String> = self
            .path()
            .iter()
            .filter_map(|segment| match segment {
                serde_path_to_error::Segment::Seq { index } => Some(index.to_string()),
                serde_path_to_error::Segment::Map { key } => Some(key.clone()),
                serde_path_to_error::Segment::Enum { variant } => Some(variant.clone()),
                serde_path_to_error::Segment::Unknown => None,
            })
            .collect();

        let inner = self.inner();
        let message = inner.to_string();
        // Missing fields are reported against the enclosing object.
        if let Some(field) = missing_field_name(&message) {
            location.push(field.to_owned());
        }

        Ok(vec![FieldError {
            location,
            kind: classify_json_error(inner, &message).to_owned(),
            message,
        }])
    }
}

impl ValidationFailure for serde_json::Error {
    fn field_errors(&self) -> std::result::Result<Vec<FieldError>, ExtractionError> {
        let message = self.to_string();
        let location = missing_field_name(&message)
            .map(|field| vec![field.to_owned()])
            .unwrap_or_default();
        Ok(vec![FieldError {
            location,
            kind: classify_json_error(self, &message).to_owned(),
            message,
        }])
    }
}

fn missing_field_name(message: &str) -> Option<&str> {
    let rest = message.strip_prefix("missing field `")?;
    let end = rest.find('`')?;
    Some(&rest[..end])
}

fn classify_json_error(err: &serde_json::Error, message: &str) -> &'static str {
    use serde_json::error::Category;

    match err.classify() {
        Category::Io => "io",
        Category::Syntax => "syntax",
        Category::Eof => "eof",
        Category::Data if message.starts_with("missing field") => "missing",
        Category::Data if message.starts_with("invalid type") => "invalid_type",
        Category::Data if message.starts_with("unknown field") => "unknown_field",
        Category::Data => "invalid_value",
    }
}

/// A response or request payload did not match its declared schema.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("{content}")]
pub struct ValidationError {
    content: ErrorContent,
}

impl ValidationError {
    /// Builds a validation error from a lower-level validation failure.
    ///
    /// Never fails: when the failure cannot describe its field errors the
    /// resulting `source` is `None`.
    pub fn wrap<F: ValidationFailure + ?Sized>(failure: &F) -> Self {
        let source = failure
            .field_errors()
            .ok()
            .and_then(|errors| serde_json::to_value(errors).ok());
        Self {
            content: ErrorContent {
                code: VALIDATION_ERROR_CODE.to_owned(),
                detail: VALIDATION_ERROR_DETAIL.to_owned(),
                source,
            },
        }
    }

    pub fn code(&self) -> &str {
        &self.content.code
    }

    pub fn detail(&self) -> &str {
        &self.content.detail
    }

    pub fn source_value(&self) -> Option<&Value> {
        self.content.source.as_ref()
    }

    /// Field errors recorded in `source`, if any.
    pub fn field_errors(&self) -> Vec<FieldError> {
        self.content
            .source
            .clone()
            .and_then(|source| serde_json::from_value(source).ok())
            .unwrap_or_default()
    }

    pub fn content(&self) -> &ErrorContent {
        &self.content
    }
}

/// A 4xx/5xx response as seen by the transport, before normalization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpFailure {
    /// Request method, when known.
    pub method: Option<String>,
    /// Final request URL, when known.
    pub url: Option<String>,
    /// Response status code.
    pub status_code: u16,
    /// Response body decoded as text, when available.
    pub text: Option<String>,
}

impl fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let class = match self.status_code {
            400..=499 => "Client Error",
            500..=599 => "Server Error",
            _ => "Error",
        };
        let reason = StatusCode::from_u16(self.status_code)
            .ok()
            .and_then(|status| status.canonical_reason())
            .unwrap_or("Unknown");
        write!(
            f,
            "{} {class}: {reason} for url: {}",
            self.status_code,
            self.url.as_deref().unwrap_or("<unknown>")
        )
    }
}

/// The remote service rejected a request with a 4xx/5xx status.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("{content}")]
pub struct HttpError {
    status_code: u16,
    content: ErrorContent,
}

impl HttpError {
    /// Normalizes a failed response.
    ///
    /// A body matching the `{code, detail, source}` error document, with a
    /// non-blank `code` and `detail`, is propagated as-is. Anything else
    /// yields code `unknown` with a
    /// `{method, url, status_code, text}` source built from the failure.
    /// The status code always comes from the response.
    pub fn wrap(failure: &HttpFailure) -> Self {
        let remote = failure
            .text
            .as_deref()
            .and_then(|text| serde_json::from_str::<ErrorContent>(text).ok())
            .filter(|doc| !doc.code.trim().is_empty() && !doc.detail.trim().is_empty());

        let content = remote.unwrap_or_else(|| ErrorContent {
            code: UNKNOWN_HTTP_ERROR_CODE.to_owned(),
            detail: failure.to_string(),
            source: Some(json!({
                "method": failure.method,
                "url": failure.url,
                "status_code": failure.status_code,
                "text": failure.text,
            })),
        });

        Self {
            status_code: failure.status_code,
            content,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn code(&self) -> &str {
        &self.content.code
    }

    pub fn detail(&self) -> &str {
        &self.content.detail
    }

    pub fn source_value(&self) -> Option<&Value> {
        self.content.source.as_ref()
    }

    pub fn content(&self) -> &ErrorContent {
        &self.content
    }
}

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Generic client-side failure with an arbitrary code.
    #[error("{0}")]
    Client(ErrorContent),
    /// Schema mismatch while parsing a response or building a request.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Non-success HTTP status, normalized.
    #[error(transparent)]
    Http(#[from] HttpError),
    /// Credentials rejected while building a session.
    #[error("{0}")]
    Auth(ErrorContent),
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
}

impl ClientError {
    /// Creates a generic error. Blank `code` or `detail` fall back to the
    /// crate defaults.
    pub fn new(code: impl Into<String>, detail: impl Into<String>, source: Option<Value>) -> Self {
        Self::Client(ErrorContent::with_defaults(
            code,
            detail,
            source,
            CLIENT_ERROR_CODE,
            CLIENT_ERROR_DETAIL,
        ))
    }

    pub(crate) fn auth(code: &str, detail: impl Into<String>) -> Self {
        Self::Auth(ErrorContent::with_defaults(
            code,
            detail,
            None,
            CLIENT_ERROR_CODE,
            CLIENT_ERROR_DETAIL,
        ))
    }

    pub fn code(&self) -> &str {
        match self {
            Self::Client(content) | Self::Auth(content) => &content.code,
            Self::Validation(err) => err.code(),
            Self::Http(err) => err.code(),
            Self::Transport(_) => TRANSPORT_ERROR_CODE,
        }
    }

    pub fn detail(&self) -> Cow<'_, str> {
        match self {
            Self::Client(content) | Self::Auth(content) => Cow::Borrowed(&content.detail),
            Self::Validation(err) => Cow::Borrowed(err.detail()),
            Self::Http(err) => Cow::Borrowed(err.detail()),
            Self::Transport(err) => Cow::Owned(err.to_string()),
        }
    }

    pub fn source_value(&self) -> Option<&Value> {
        match self {
            Self::Client(content) | Self::Auth(content) => content.source.as_ref(),
            Self::Validation(err) => err.source_value(),
            Self::Http(err) => err.source_value(),
            Self::Transport(_) => None,
        }
    }

    /// HTTP status of the failed response, for [`ClientError::Http`] only.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http(err) => Some(err.status_code()),
            _ => None,
        }
    }

    /// Returns the `{code, detail, source}` triple.
    pub fn content(&self) -> ErrorContent {
        ErrorContent {
            code: self.code().to_owned(),
            detail: self.detail().into_owned(),
            source: self.source_value().cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::{
        ClientError, ExtractionError, FieldError, HttpError, HttpFailure, ValidationError,
        ValidationFailure,
    };

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Customer {
        customer_id: u64,
    }

    struct BrokenFailure;

    impl ValidationFailure for BrokenFailure {
        fn field_errors(&self) -> Result<Vec<FieldError>, ExtractionError> {
            Err("no field information".into())
        }
    }

    fn failure(status_code: u16, text: &str) -> HttpFailure {
        HttpFailure {
            method: Some("GET".to_owned()),
            url: Some("some_url".to_owned()),
            status_code,
            text: Some(text.to_owned()),
        }
    }

    #[test]
    fn client_error_content_matches_constructor_arguments() {
        let source = json!([{
            "location": ["query_parameters", "customer_id"],
            "message": "value is not a valid uuid",
            "kind": "invalid_type"
        }]);
        let err = ClientError::new(
            "validation_error",
            "One or more parameters are invalid.",
            Some(source.clone()),
        );

        let content = err.content();
        assert_eq!(content.code, "validation_error");
        assert_eq!(content.detail, "One or more parameters are invalid.");
        assert_eq!(content.source, Some(source));
    }

    #[test]
    fn client_error_blank_fields_fall_back_to_defaults() {
        let err = ClientError::new("", "  ", None);
        assert_eq!(err.code(), "client_error");
        assert_eq!(err.detail(), "The API client failed.");
        assert!(err.source_value().is_none());
        assert_eq!(err.to_string(), "(client_error) The API client failed..");
    }

    #[test]
    fn http_error_wrap_propagates_remote_error_document() {
        let body = json!({
            "code": "validation_error",
            "detail": "One or more parameters are invalid.",
            "source": [{"loc": ["query_parameters", "customer_id"]}]
        });
        let err = HttpError::wrap(&failure(400, &body.to_string()));

        assert_eq!(err.code(), "validation_error");
        assert_eq!(err.detail(), "One or more parameters are invalid.");
        assert_eq!(err.status_code(), 400);
        assert_eq!(
            err.source_value(),
            Some(&json!([{"loc": ["query_parameters", "customer_id"]}]))
        );
    }

    #[test]
    fn http_error_wrap_falls_back_on_empty_body() {
        let failure = failure(409, "");
        let err = HttpError::wrap(&failure);

        assert_eq!(err.code(), "unknown");
        assert_eq!(err.status_code(), 409);
        assert_eq!(err.detail(), "409 Client Error: Conflict for url: some_url");
        assert_eq!(
            err.source_value(),
            Some(&json!({
                "method": "GET",
                "url": "some_url",
                "status_code": 409,
                "text": ""
            }))
        );
    }

    #[test]
    fn http_error_wrap_treats_blank_remote_document_as_unknown() {
        let err = HttpError::wrap(&failure(422, r#"{"code": "", "detail": ""}"#));

        assert_eq!(err.code(), "unknown");
        assert_eq!(
            err.detail(),
            "422 Client Error: Unprocessable Entity for url: some_url"
        );
        assert_eq!(err.status_code(), 422);
        assert_eq!(
            err.source_value().unwrap()["text"],
            r#"{"code": "", "detail": ""}"#
        );
    }

    #[test]
    fn http_error_wrap_tolerates_missing_failure_fields() {
        let failure = HttpFailure {
            method: None,
            url: None,
            status_code: 503,
            text: None,
        };
        let err = HttpError::wrap(&failure);

        assert_eq!(err.code(), "unknown");
        assert_eq!(
            err.detail(),
            "503 Server Error: Service Unavailable for url: <unknown>"
        );
        assert_eq!(
            err.source_value(),
            Some(&json!({
                "method": null,
                "url": null,
                "status_code": 503,
                "text": null
            }))
        );
    }

    #[test]
    fn validation_error_wrap_records_missing_field() {
        let mut de = serde_json::Deserializer::from_str("{}");
        let err = serde_path_to_error::deserialize::<_, Customer>(&mut de)
            .expect_err("empty object must fail");

        let wrapped = ValidationError::wrap(&err);
        assert_eq!(wrapped.code(), "api_validation_error");
        assert_eq!(wrapped.detail(), "One or more parameters are invalid.");

        let fields = wrapped.field_errors();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].location, vec!["customer_id".to_owned()]);
        assert_eq!(fields[0].kind, "missing");
    }

    #[test]
    fn validation_error_wrap_records_nested_path() {
        let mut de = serde_json::Deserializer::from_str(r#"{"customer_id": "abc"}"#);
        let err = serde_path_to_error::deserialize::<_, Customer>(&mut de)
            .expect_err("string id must fail");

        let fields = ValidationError::wrap(&err).field_errors();
        assert_eq!(fields[0].location, vec!["customer_id".to_owned()]);
        assert_eq!(fields[0].kind, "invalid_type");
    }

    #[test]
    fn validation_error_wrap_without_field_information_has_no_source() {
        let wrapped = ValidationError::wrap(&BrokenFailure);
        assert_eq!(wrapped.code(), "api_validation_error");
        assert_eq!(wrapped.detail(), "One or more parameters are invalid.");
        assert!(wrapped.source_value().is_none());
    }

    #[test]
    fn client_error_exposes_status_only_for_http() {
        let http: ClientError = HttpError::wrap(&failure(404, "")).into();
        assert_eq!(http.status_code(), Some(404));

        let validation: ClientError = ValidationError::wrap(&BrokenFailure).into();
        assert_eq!(validation.status_code(), None);
        assert_eq!(validation.code(), "api_validation_error");
    }
}
