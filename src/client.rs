use std::fmt;
use std::time::Instant;

use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Method,
};
use serde_json::{Map, Value};

use crate::{
    ApiRequest, ClientError, HttpError, HttpFailure, Response, Result, Session,
};

const LOG_TARGET: &str = "clientapi";

/// Base type for thin REST API clients.
///
/// Holds a configured [`Session`] and a base URL. Wrap it in your own client
/// type and expose one method per endpoint:
///
/// ```no_run
/// use clientapi::{parse, responses::Entity, ApiRequest, ClientApi, Method};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Thing {
///     id: u64,
/// }
///
/// struct ThingsApi {
///     api: ClientApi,
/// }
///
/// impl ThingsApi {
///     async fn archive(&self, id: u64) -> clientapi::Result<Option<Thing>> {
///         let response = self
///             .api
///             .execute_request(ApiRequest::new(format!("/things/{id}")).method(Method::PATCH))
///             .await?;
///         Ok(parse::<Entity<Thing>>(&response)?.into_data())
///     }
/// }
/// ```
#[derive(Clone)]
pub struct ClientApi {
    session: Session,
    base_url: String,
    log_requests: bool,
}

impl fmt::Debug for ClientApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientApi")
            .field("base_url", &self.base_url)
            .field("session", &self.session)
            .field("log_requests", &self.log_requests)
            .finish()
    }
}

impl ClientApi {
    /// Creates a client. Resources are appended verbatim to `base_url`.
    pub fn new(session: Session, base_url: impl Into<String>) -> Self {
        Self {
            session,
            base_url: base_url.into(),
            log_requests: false,
        }
    }

    /// Emits a `debug` record for every request and response under the
    /// `clientapi` tracing target.
    pub fn with_request_logging(mut self, enabled: bool) -> Self {
        self.log_requests = enabled;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub async fn get(&self, resource: &str) -> Result<Response> {
        self.execute_request(ApiRequest::new(resource)).await
    }

    pub async fn delete(&self, resource: &str) -> Result<Response> {
        self.execute_request(ApiRequest::new(resource).method(Method::DELETE))
            .await
    }

    pub async fn post(&self, resource: &str, body: impl Into<String>) -> Result<Response> {
        self.execute_request(ApiRequest::new(resource).method(Method::POST).body(body))
            .await
    }

    pub async fn put(&self, resource: &str, body: impl Into<String>) -> Result<Response> {
        self.execute_request(ApiRequest::new(resource).method(Method::PUT).body(body))
            .await
    }

    pub async fn patch(&self, resource: &str, body: impl Into<String>) -> Result<Response> {
        self.execute_request(ApiRequest::new(resource).method(Method::PATCH).body(body))
            .await
    }

    /// Executes one request against `base_url + resource`.
    ///
    /// A header that is not valid HTTP fails with code
    /// `invalid_request_header` before anything is sent. 4xx/5xx responses
    /// become [`ClientError::Http`]; network failures and timeouts become
    /// [`ClientError::Transport`]. Nothing is retried.
    pub async fn execute_request(&self, request: ApiRequest) -> Result<Response> {
        let url = format!("{}{}", self.base_url, request.resource);
        let headers = request.effective_headers();
        let header_map = validated_headers(&headers)?;

        if self.log_requests {
            log_request(&url, &request, &headers);
        }

        let mut builder = self.session.request(request.method.clone(), &url);
        for (name, value) in header_map {
            builder = builder.header(name, value);
        }
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = request.body_text() {
            builder = builder.body(body.to_owned());
        }
        let http_request = builder.build().map_err(ClientError::Transport)?;

        let started = Instant::now();
        let response = self
            .session
            .send(http_request)
            .await
            .map_err(ClientError::Transport)?;

        let status = response.status();
        let final_url = response.url().to_string();
        let response_headers = response.headers().clone();
        let body = response.bytes().await.map_err(ClientError::Transport)?;
        let elapsed = started.elapsed();

        let response = Response {
            status,
            url: final_url,
            headers: response_headers,
            body,
            elapsed,
        };

        if self.log_requests {
            log_response(&response);
        }

        if status.is_client_error() || status.is_server_error() {
            let failure = HttpFailure {
                method: Some(request.method.to_string()),
                url: Some(response.url),
                status_code: status.as_u16(),
                text: Some(String::from_utf8_lossy(&response.body).into_owned()),
            };
            return Err(HttpError::wrap(&failure).into());
        }

        Ok(response)
    }
}

fn log_request(url: &str, request: &ApiRequest, headers: &[(String, String)]) {
    let mut payload = Map::new();
    payload.insert("url".to_owned(), Value::from(url));
    payload.insert("method".to_owned(), Value::from(request.method.as_str()));
    if !headers.is_empty() {
        payload.insert("headers".to_owned(), pairs_to_object(headers));
    }
    if let Some(body) = request.body_text() {
        payload.insert("body".to_owned(), Value::from(body));
    }
    if !request.params.is_empty() {
        payload.insert("params".to_owned(), pairs_to_object(&request.params));
    }
    let payload = Value::Object(payload);
    tracing::debug!(target: LOG_TARGET, payload = %payload, "Request");
}

fn log_response(response: &Response) {
    let mut payload = Map::new();
    payload.insert("status_code".to_owned(), Value::from(response.status_code()));
    payload.insert(
        "elapsed_time_ms".to_owned(),
        Value::from(round_ms(response.elapsed.as_secs_f64() * 1000.0)),
    );
    if !response.body.is_empty() {
        payload.insert("body".to_owned(), Value::from(response.text().into_owned()));
    }
    if !response.headers.is_empty() {
        payload.insert("headers".to_owned(), header_map_to_object(&response.headers));
    }
    let payload = Value::Object(payload);
    tracing::debug!(target: LOG_TARGET, payload = %payload, "Response");
}

fn validated_headers(headers: &[(String, String)]) -> Result<Vec<(HeaderName, HeaderValue)>> {
    headers
        .iter()
        .map(|(name, value)| {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                ClientError::new(
                    "invalid_request_header",
                    format!("Header name {name:?} is not a valid HTTP header name"),
                    None,
                )
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|_| {
                ClientError::new(
                    "invalid_request_header",
                    format!("Value of header {name:?} is not a valid HTTP header value"),
                    None,
                )
            })?;
            Ok((header_name, header_value))
        })
        .collect()
}

fn round_ms(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn pairs_to_object(pairs: &[(String, String)]) -> Value {
    Value::Object(
        pairs
            .iter()
            .map(|(name, value)| (name.clone(), Value::from(value.as_str())))
            .collect(),
    )
}

/// Repeated headers are joined with `, `.
fn header_map_to_object(headers: &HeaderMap) -> Value {
    Value::Object(
        headers
            .keys()
            .map(|name| {
                let joined = headers
                    .get_all(name)
                    .iter()
                    .map(|value| String::from_utf8_lossy(value.as_bytes()))
                    .collect::<Vec<_>>()
                    .join(", ");
                (name.to_string(), Value::from(joined))
            })
            .collect(),
    )
}
