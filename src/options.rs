/// Transport-level settings applied when a session is built.
///
/// Per-request timeouts are not configured here; they are passed through
/// from each [`crate::ApiRequest`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SessionOptions {
    /// `User-Agent` sent on every request.
    pub user_agent: Option<String>,
    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,
    /// Headers attached to every request of the session.
    pub default_headers: Vec<(String, String)>,
}
