//! Integration tests for in-process interceptors.
//!
//! These tests drive `HttpInterceptor` through its public API the way a test
//! suite would: declare handlers, send requests, verify call counts.

use bytes::Bytes;
use rift_interceptor::{
    Body, HttpInterceptor, HttpMethod, InterceptedRequest, InterceptorError, InterceptorOptions,
    MemorySink, MockResponse, Resolution, ResponseProducer, Restriction, StaticRestriction,
    UnhandledDeclaration,
};
use serde_json::json;
use std::io::Write;
use std::sync::Arc;

fn interceptor_from_yaml(yaml: &str) -> HttpInterceptor {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    let options = InterceptorOptions::from_file(file.path()).unwrap();
    let interceptor = HttpInterceptor::new(options).unwrap();
    interceptor.start().unwrap();
    interceptor
}

fn raw_request(
    method: &str,
    url: &str,
    content_type: &str,
    body: &'static str,
) -> InterceptedRequest {
    InterceptedRequest::from_parts(
        method,
        url,
        [("content-type", content_type)],
        Bytes::from_static(body.as_bytes()),
    )
    .unwrap()
}

#[tokio::test]
async fn test_user_api_scenario() {
    let interceptor = interceptor_from_yaml(
        r#"
baseUrl: http://localhost:3000/api
onUnhandledRequest:
  action: reject
  log: false
"#,
    );

    let list = interceptor.get("/users").unwrap();
    list.respond(MockResponse::ok().json(json!([])));

    let create = interceptor.post("/users").unwrap();
    create
        .with(StaticRestriction::new().body(Body::json(json!({"name": "Ada"}))))
        .respond(ResponseProducer::from_fn(|request| {
            let Body::Json(body) = &request.body else {
                return MockResponse::new(400);
            };
            let mut user = body.clone();
            user["id"] = json!(1);
            MockResponse::new(201).json(user)
        }))
        .times(1);

    let fetch = interceptor.get("/users/:id").unwrap();
    fetch
        .respond(ResponseProducer::from_fn(|request| {
            MockResponse::ok().json(json!({"id": request.path_param("id"), "name": "Ada"}))
        }))
        .times_between(1, 2);

    let created = interceptor
        .resolve(raw_request(
            "POST",
            "http://localhost:3000/api/users",
            "application/json",
            r#"{"name": "Ada", "email": "ada@example.com"}"#,
        ))
        .await
        .unwrap();
    let response = created.response().unwrap();
    assert_eq!(response.status, 201);
    assert_eq!(
        response.body,
        Body::json(json!({"id": 1, "name": "Ada", "email": "ada@example.com"}))
    );
    assert_eq!(response.header_value("content-type"), Some("application/json"));

    let fetched = interceptor
        .resolve(
            InterceptedRequest::new(HttpMethod::Get, "http://localhost:3000/api/users/1").unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        fetched.response().unwrap().body,
        Body::json(json!({"id": "1", "name": "Ada"}))
    );

    interceptor.check_times().unwrap();
    assert_eq!(list.match_count(), 0);
    assert_eq!(create.requests().len(), 1);
}

#[tokio::test]
async fn test_form_body_restriction() {
    let interceptor = interceptor_from_yaml(
        "baseUrl: http://localhost:3000\nonUnhandledRequest:\n  action: reject\n  log: false\n",
    );
    interceptor
        .post("/login")
        .unwrap()
        .with(StaticRestriction::new().body(Body::form([("user", "ada")])))
        .respond(MockResponse::new(204));

    let login = raw_request(
        "POST",
        "http://localhost:3000/login",
        "application/x-www-form-urlencoded",
        "user=ada&password=secret",
    );
    assert!(interceptor.resolve(login).await.unwrap().is_handled());

    let other = raw_request(
        "POST",
        "http://localhost:3000/login",
        "application/x-www-form-urlencoded",
        "user=grace",
    );
    let resolution = interceptor.resolve(other).await.unwrap();
    assert!(matches!(
        resolution.into_response(),
        Err(InterceptorError::UnhandledRequestRejected { .. })
    ));
}

#[tokio::test]
async fn test_interceptors_are_independent() {
    let sink = MemorySink::new();
    let users = HttpInterceptor::with_sink(
        InterceptorOptions::new("http://users.local")
            .on_unhandled_request(UnhandledDeclaration::reject()),
        Arc::new(sink.clone()),
    )
    .unwrap();
    let orders = HttpInterceptor::with_sink(
        InterceptorOptions::new("http://orders.local")
            .on_unhandled_request(UnhandledDeclaration::reject()),
        Arc::new(sink.clone()),
    )
    .unwrap();
    users.start().unwrap();
    orders.start().unwrap();

    users
        .get("/me")
        .unwrap()
        .respond(MockResponse::ok().text("users"));
    orders
        .get("/me")
        .unwrap()
        .respond(MockResponse::ok().text("orders"));

    let request = InterceptedRequest::new(HttpMethod::Get, "http://orders.local/me").unwrap();
    assert_eq!(users.resolve(request.clone()).await.unwrap(), Resolution::Ignored);
    assert_eq!(
        orders.resolve(request).await.unwrap().response().unwrap().body,
        Body::text("orders")
    );

    users.clear();
    assert_eq!(users.handler_count(), 0);
    assert_eq!(orders.handler_count(), 1);
    assert!(sink.entries().is_empty());
}

#[tokio::test]
async fn test_computed_restriction_with_shared_state() {
    let interceptor = interceptor_from_yaml(
        "baseUrl: http://localhost:3000\nonUnhandledRequest:\n  action: reject\n  log: false\n",
    );
    let allowed = Arc::new(parking_lot::Mutex::new(vec!["alpha".to_string()]));
    let tenants = allowed.clone();
    interceptor
        .get("/tenants/:tenant")
        .unwrap()
        .with(Restriction::from_fn(move |request| {
            request
                .path_param("tenant")
                .map(|tenant| tenants.lock().iter().any(|t| t == tenant))
                .unwrap_or(false)
        }))
        .respond(MockResponse::ok());

    let beta = || {
        InterceptedRequest::new(HttpMethod::Get, "http://localhost:3000/tenants/beta").unwrap()
    };
    assert!(!interceptor.resolve(beta()).await.unwrap().is_handled());
    allowed.lock().push("beta".to_string());
    assert!(interceptor.resolve(beta()).await.unwrap().is_handled());
}
