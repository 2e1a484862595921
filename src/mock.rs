//! In-process mock server for testing API clients built on this crate.
//!
//! Enabled with the `mock` feature. Must run inside a Tokio runtime.
//!
//! ```no_run
//! # async fn demo() -> anyhow::Result<()> {
//! use clientapi::mock::{MockResponse, MockServer};
//! use clientapi::{sessions, ClientApi, Method, StatusCode};
//! use serde_json::json;
//!
//! let server = MockServer::start().await?;
//! server.register(
//!     Method::GET,
//!     "/hello",
//!     MockResponse::new(StatusCode::OK).json(json!({"attribute": 1234})),
//! );
//!
//! let api = ClientApi::new(sessions::no_auth()?, server.url());
//! let response = api.get("/hello").await?;
//! assert_eq!(response.status_code(), 200);
//! server.assert_satisfied();
//! # Ok(())
//! # }
//! ```

use std::{
    collections::{HashMap, VecDeque},
    io,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header::CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use serde_json::{json, Value};

type RouteKey = (Method, String);

/// Canned response plus the expectations the matching request must meet.
#[derive(Clone, Debug)]
pub struct MockResponse {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: String,
    expected_headers: Vec<(String, String)>,
    expected_params: Vec<(String, String)>,
    expected_body: Option<ExpectedBody>,
}

#[derive(Clone, Debug, PartialEq)]
enum ExpectedBody {
    Json(Value),
    Xml(String),
}

impl MockResponse {
    /// Empty response with `status`.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
            expected_headers: Vec::new(),
            expected_params: Vec::new(),
            expected_body: None,
        }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    /// JSON body; sets `Content-Type: application/json`.
    pub fn json(self, body: Value) -> Self {
        self.raw_body(body.to_string(), "application/json")
    }

    /// XML body; sets `Content-Type: text/xml`.
    pub fn xml(self, body: impl Into<String>) -> Self {
        self.raw_body(body.into(), "text/xml")
    }

    fn raw_body(mut self, body: String, content_type: &str) -> Self {
        self.headers
            .retain(|(name, _)| !name.eq_ignore_ascii_case("content-type"));
        self.headers
            .push(("Content-Type".to_owned(), content_type.to_owned()));
        self.body = body;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// The request must carry header `name` with exactly `value`.
    pub fn expect_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.expected_headers.push((name.into(), value.into()));
        self
    }

    /// The request must carry query parameter `name` with exactly `value`.
    pub fn expect_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.expected_params.push((name.into(), value.into()));
        self
    }

    /// The request body must be JSON equal to `body`.
    pub fn expect_json_body(mut self, body: Value) -> Self {
        self.expected_body = Some(ExpectedBody::Json(body));
        self
    }

    /// The request body must equal `body`, ignoring whitespace.
    pub fn expect_xml_body(mut self, body: impl AsRef<str>) -> Self {
        self.expected_body = Some(ExpectedBody::Xml(strip_whitespace(body.as_ref())));
        self
    }

    fn check(
        &self,
        route: &str,
        headers: &HeaderMap,
        params: &[(String, String)],
        body: &str,
    ) -> Vec<String> {
        let mut mismatches = Vec::new();

        for (name, expected) in &self.expected_headers {
            let actual = headers
                .get(name.as_str())
                .and_then(|value| value.to_str().ok());
            if actual != Some(expected.as_str()) {
                mismatches.push(format!(
                    "{route}: header {name} expected {expected:?}, got {actual:?}"
                ));
            }
        }

        for (name, expected) in &self.expected_params {
            let actual = params
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str());
            if actual != Some(expected.as_str()) {
                mismatches.push(format!(
                    "{route}: param {name} expected {expected:?}, got {actual:?}"
                ));
            }
        }

        match &self.expected_body {
            Some(ExpectedBody::Json(expected)) => match serde_json::from_str::<Value>(body) {
                Ok(actual) if &actual == expected => {}
                Ok(actual) => mismatches.push(format!(
                    "{route}: body expected {expected}, got {actual}"
                )),
                Err(err) => mismatches.push(format!(
                    "{route}: body expected JSON {expected}, got unparseable {body:?}: {err}"
                )),
            },
            Some(ExpectedBody::Xml(expected)) => {
                let actual = strip_whitespace(body);
                if &actual != expected {
                    mismatches.push(format!(
                        "{route}: body expected {expected:?}, got {actual:?}"
                    ));
                }
            }
            None => {}
        }

        mismatches
    }

    fn build_response(self) -> std::result::Result<Response, String> {
        let mut response = (self.status, Body::from(self.body)).into_response();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| format!("invalid mock header name {name:?}: {err}"))?;
            let value = HeaderValue::from_str(value)
                .map_err(|err| format!("invalid mock header value {value:?}: {err}"))?;
            response.headers_mut().append(name, value);
        }
        Ok(response)
    }
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

#[derive(Clone, Default)]
struct MockState {
    routes: Arc<Mutex<HashMap<RouteKey, VecDeque<MockResponse>>>>,
    hits: Arc<Mutex<HashMap<RouteKey, usize>>>,
    mismatches: Arc<Mutex<Vec<String>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockState {
    fn next_response(&self, key: &RouteKey) -> Option<MockResponse> {
        let mut routes = lock(&self.routes);
        let queue = routes.get_mut(key)?;
        // The last registered response keeps answering.
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }

    fn record(&self, mismatches: impl IntoIterator<Item = String>) {
        lock(&self.mismatches).extend(mismatches);
    }
}

async fn handle(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
    body: String,
) -> Response {
    let key = (method, uri.path().to_owned());
    let route = format!("{} {}", key.0, key.1);
    *lock(&state.hits).entry(key.clone()).or_default() += 1;

    let Some(mock) = state.next_response(&key) else {
        state.record([format!("{route}: no mock registered")]);
        let body = json!({
            "code": "mock_not_registered",
            "detail": format!("No mock registered for {route}"),
        });
        return (
            StatusCode::NOT_FOUND,
            [(CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response();
    };

    state.record(mock.check(&route, &headers, &params, &body));

    match mock.build_response() {
        Ok(response) => response,
        Err(message) => {
            state.record([format!("{route}: {message}")]);
            (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
        }
    }
}

/// Mock HTTP server bound to an ephemeral local port.
///
/// The server task is aborted when this value is dropped.
pub struct MockServer {
    base_url: String,
    state: MockState,
    task: tokio::task::JoinHandle<()>,
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl MockServer {
    pub async fn start() -> io::Result<Self> {
        let state = MockState::default();
        let app = Router::new().fallback(handle).with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?;
        let task = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app).await {
                tracing::error!(target: "clientapi", "mock server stopped: {err}");
            }
        });

        Ok(Self {
            base_url: format!("http://{address}"),
            state,
            task,
        })
    }

    /// Base URL to hand to [`crate::ClientApi::new`].
    pub fn url(&self) -> String {
        self.base_url.clone()
    }

    /// Registers a response for `method path`. Responses registered for the
    /// same route are served in order; the last one repeats.
    pub fn register(&self, method: Method, path: impl Into<String>, response: MockResponse) {
        lock(&self.state.routes)
            .entry((method, path.into()))
            .or_default()
            .push_back(response);
    }

    /// Number of requests received for `method path`.
    pub fn hits(&self, method: Method, path: &str) -> usize {
        lock(&self.state.hits)
            .get(&(method, path.to_owned()))
            .copied()
            .unwrap_or(0)
    }

    /// Expectation mismatches recorded so far.
    pub fn verify(&self) -> Vec<String> {
        lock(&self.state.mismatches).clone()
    }

    /// Panics listing every recorded mismatch.
    pub fn assert_satisfied(&self) {
        let mismatches = self.verify();
        assert!(
            mismatches.is_empty(),
            "mock expectations not met:\n{}",
            mismatches.join("\n")
        );
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderMap;
    use serde_json::json;

    use super::{strip_whitespace, MockResponse};

    #[test]
    fn strip_whitespace_removes_layout() {
        assert_eq!(strip_whitespace("<a>\n  <b>1</b>\n</a>"), "<a><b>1</b></a>");
    }

    #[test]
    fn check_reports_each_mismatch() {
        let mock = MockResponse::ok()
            .expect_header("x-trace", "abc")
            .expect_param("page", "2")
            .expect_json_body(json!({"name": "kit"}));

        let mismatches = mock.check(
            "POST /things",
            &HeaderMap::new(),
            &[("page".to_owned(), "3".to_owned())],
            r#"{"name": "other"}"#,
        );
        assert_eq!(mismatches.len(), 3);
    }

    #[test]
    fn check_accepts_matching_request() {
        let mut headers = HeaderMap::new();
        headers.insert("x-trace", "abc".parse().unwrap());
        let mock = MockResponse::ok()
            .expect_header("X-Trace", "abc")
            .expect_xml_body("<a> <b/> </a>");

        let mismatches = mock.check("POST /xml", &headers, &[], "<a><b/></a>");
        assert!(mismatches.is_empty(), "{mismatches:?}");
    }

    #[test]
    fn json_body_replaces_content_type() {
        let mock = MockResponse::ok()
            .header("content-type", "text/plain")
            .json(json!({}));
        assert_eq!(
            mock.headers,
            vec![("Content-Type".to_owned(), "application/json".to_owned())]
        );
    }
}
