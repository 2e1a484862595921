use clientapi::{
    mock::{MockResponse, MockServer},
    sessions, ApiRequest, ClientApi, ContentType, Method, StatusCode,
};
use serde_json::{json, Value as JsonValue};

async fn setup() -> (MockServer, ClientApi) {
    let server = MockServer::start().await.expect("mock server must start");
    let api = ClientApi::new(
        sessions::no_auth().expect("session must build"),
        server.url(),
    );
    (server, api)
}

#[tokio::test]
async fn execute_success_against_mock() {
    let (server, api) = setup().await;
    server.register(
        Method::GET,
        "/hello",
        MockResponse::ok().json(json!({"attribute": 1234})),
    );

    let response = api.get("/hello").await.expect("request must succeed");
    let body: JsonValue = response.json().expect("body must be JSON");

    assert_eq!(body, json!({"attribute": 1234}));
    assert_eq!(
        response.headers()["content-type"],
        "application/json"
    );
    assert_eq!(server.hits(Method::GET, "/hello"), 1);
    server.assert_satisfied();
}

#[tokio::test]
async fn execute_http_error_against_mock() {
    let (server, api) = setup().await;
    server.register(
        Method::GET,
        "/hello",
        MockResponse::new(StatusCode::NOT_FOUND).json(json!({"error": "not_found"})),
    );

    let err = api.get("/hello").await.expect_err("request must fail");

    assert_eq!(err.code(), "unknown");
    assert_eq!(err.status_code(), Some(404));
    assert_eq!(
        err.source_value().expect("fallback source must be set")["text"],
        r#"{"error":"not_found"}"#
    );
}

#[tokio::test]
async fn responses_are_served_in_order_and_last_repeats() {
    let (server, api) = setup().await;
    server.register(
        Method::GET,
        "/status",
        MockResponse::new(StatusCode::SERVICE_UNAVAILABLE),
    );
    server.register(Method::GET, "/status", MockResponse::ok().json(json!({"up": true})));

    let first = api.get("/status").await.expect_err("first call must fail");
    assert_eq!(first.status_code(), Some(503));

    for _ in 0..2 {
        let response = api.get("/status").await.expect("later calls must succeed");
        assert_eq!(response.status_code(), 200);
    }
    assert_eq!(server.hits(Method::GET, "/status"), 3);
}

#[tokio::test]
async fn request_expectations_are_checked() {
    let (server, api) = setup().await;
    server.register(
        Method::POST,
        "/users",
        MockResponse::new(StatusCode::CREATED)
            .json(json!({"data": {"id": 1}}))
            .expect_header("content-type", "application/json")
            .expect_param("notify", "true")
            .expect_json_body(json!({"name": "Kit"})),
    );

    let request = ApiRequest::new("/users")
        .method(Method::POST)
        .param("notify", "true")
        .json(&json!({"name": "Kit"}))
        .expect("payload must serialize");
    let response = api
        .execute_request(request)
        .await
        .expect("request must succeed");

    assert_eq!(response.status_code(), 201);
    server.assert_satisfied();
}

#[tokio::test]
async fn xml_expectation_ignores_whitespace() {
    let (server, api) = setup().await;
    server.register(
        Method::PUT,
        "/users/1",
        MockResponse::ok()
            .xml("<ok/>")
            .expect_header("content-type", "text/xml")
            .expect_xml_body("<user>\n  <name>Kit</name>\n</user>"),
    );

    let request = ApiRequest::new("/users/1")
        .method(Method::PUT)
        .body("<user><name>Kit</name></user>")
        .content_type(ContentType::Xml);
    let response = api
        .execute_request(request)
        .await
        .expect("request must succeed");

    assert_eq!(response.text(), "<ok/>");
    server.assert_satisfied();
}

#[tokio::test]
async fn mismatches_are_reported() {
    let (server, api) = setup().await;
    server.register(
        Method::POST,
        "/users",
        MockResponse::ok().expect_json_body(json!({"name": "Kit"})),
    );

    api.post("/users", r#"{"name": "Ada"}"#)
        .await
        .expect("mock still answers on mismatch");

    let mismatches = server.verify();
    assert_eq!(mismatches.len(), 1);
    assert!(mismatches[0].starts_with("POST /users: body expected"));
}

#[tokio::test]
async fn unregistered_route_is_not_found_and_reported() {
    let (server, api) = setup().await;

    let err = api.get("/nowhere").await.expect_err("request must fail");

    assert_eq!(err.status_code(), Some(404));
    assert_eq!(err.code(), "mock_not_registered");
    assert_eq!(server.verify(), vec!["GET /nowhere: no mock registered".to_owned()]);
}

#[tokio::test]
async fn bearer_header_is_seen_by_mock() {
    let server = MockServer::start().await.expect("mock server must start");
    server.register(
        Method::GET,
        "/me",
        MockResponse::ok().expect_header("authorization", "Bearer tok"),
    );
    let api = ClientApi::new(
        sessions::bearer("tok").expect("session must build"),
        server.url(),
    );

    api.get("/me").await.expect("request must succeed");

    server.assert_satisfied();
}
