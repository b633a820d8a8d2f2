//! Application scenarios driven through the in-memory test client.
//!
//! Each test registers stages on an [`Application`], compiles it into a
//! [`TestClient`] and checks what reached the transport.

use bytes::Bytes;
use futures_util::stream;
use http::{Method, StatusCode};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use strata_core::{AppSettings, Body, ProxyTrust};
use strata_middleware::stages::{NotFound, RequestId, RequestLog, REQUEST_ID_HEADER};
use strata_server::Application;
use strata_test::{RecordingReporter, TestClient, TestError};

type Log = Arc<Mutex<Vec<String>>>;

fn recording_app() -> (Application, RecordingReporter) {
    let reporter = RecordingReporter::new();
    let mut app = Application::new();
    app.reporter(Arc::new(reporter.clone()));
    (app, reporter)
}

#[tokio::test]
async fn test_untouched_response_is_plain_404() {
    let (app, reporter) = recording_app();
    let client = TestClient::new(&app).unwrap();

    client
        .get("/missing")
        .send()
        .await
        .assert_status(StatusCode::NOT_FOUND)
        .assert_content_type("text/plain")
        .assert_header("content-length", "9")
        .assert_body_eq("Not Found");
    assert_eq!(reporter.count(), 0);
}

#[tokio::test]
async fn test_json_body() {
    let mut app = Application::new();
    app.use_fn("json", |ctx, _next| {
        Box::pin(async move {
            ctx.set_body(json!({ "a": 1 }));
            Ok(())
        })
    });
    let client = TestClient::new(&app).unwrap();

    let response = client.get("/").send().await;
    response
        .assert_status(StatusCode::OK)
        .assert_header("content-type", "application/json; charset=utf-8")
        .assert_header("content-length", "7")
        .assert_body_eq(r#"{"a":1}"#);
}

#[tokio::test]
async fn test_onion_order() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let mut app = Application::new();
    for name in ["outer", "middle", "inner"] {
        let log = Arc::clone(&log);
        app.use_fn(name, move |ctx, next| {
            let log = Arc::clone(&log);
            Box::pin(async move {
                log.lock().push(format!("{name}:in"));
                next.run(ctx).await?;
                log.lock().push(format!("{name}:out"));
                Ok(())
            })
        });
    }
    let client = TestClient::new(&app).unwrap();

    client.get("/").send().await;
    assert_eq!(
        *log.lock(),
        vec![
            "outer:in",
            "middle:in",
            "inner:in",
            "inner:out",
            "middle:out",
            "outer:out"
        ]
    );
}

#[tokio::test]
async fn test_thrown_error_is_reported_once_and_unwinds() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let (mut app, reporter) = recording_app();

    let first = Arc::clone(&log);
    app.use_fn("first", move |ctx, next| {
        let log = Arc::clone(&first);
        Box::pin(async move {
            log.lock().push("first:in".to_string());
            next.run(ctx).await?;
            log.lock().push("first:out".to_string());
            Ok(())
        })
    });
    let second = Arc::clone(&log);
    app.use_fn("second", move |ctx, _next| {
        let log = Arc::clone(&second);
        Box::pin(async move {
            log.lock().push("second:in".to_string());
            Err(ctx.throw(StatusCode::CONFLICT, "name taken"))
        })
    });
    let third = Arc::clone(&log);
    app.use_fn("third", move |_ctx, _next| {
        let log = Arc::clone(&third);
        Box::pin(async move {
            log.lock().push("third:in".to_string());
            Ok(())
        })
    });
    let client = TestClient::new(&app).unwrap();

    client
        .post("/users")
        .send()
        .await
        .assert_status(StatusCode::CONFLICT)
        .assert_content_type("text/plain")
        .assert_body_eq("name taken");

    assert_eq!(*log.lock(), vec!["first:in", "second:in"]);
    assert_eq!(reporter.count(), 1);
    let summary = &reporter.summaries()[0];
    assert_eq!(summary.method, Method::POST);
    assert_eq!(summary.url, "/users");
    assert_eq!(summary.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_error_replaces_headers_set_before_failure() {
    let mut app = Application::new();
    app.use_fn("fails", |ctx, _next| {
        Box::pin(async move {
            ctx.set_header("x-partial", "1")?;
            ctx.set_body("partial");
            ctx.assert(false, StatusCode::UNAUTHORIZED, "login first")
        })
    });
    let client = TestClient::new(&app).unwrap();

    client
        .get("/")
        .send()
        .await
        .assert_status(StatusCode::UNAUTHORIZED)
        .assert_no_header("x-partial")
        .assert_body_eq("login first");
}

#[tokio::test]
async fn test_double_proceed_fails_the_request() {
    let inner_runs = Arc::new(Mutex::new(0_u32));
    let (mut app, reporter) = recording_app();
    app.use_fn("twice", |ctx, next| {
        Box::pin(async move {
            next.run(ctx).await?;
            next.run(ctx).await
        })
    });
    let runs = Arc::clone(&inner_runs);
    app.use_fn("inner", move |ctx, _next| {
        let runs = Arc::clone(&runs);
        Box::pin(async move {
            *runs.lock() += 1;
            ctx.set_body("inner");
            Ok(())
        })
    });
    let client = TestClient::new(&app).unwrap();

    client
        .get("/")
        .send()
        .await
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR)
        .assert_body_eq("Internal Server Error");

    assert_eq!(*inner_runs.lock(), 1);
    assert_eq!(reporter.count(), 1);
    assert!(reporter.messages()[0].contains("next() called multiple times"));
}

#[tokio::test]
async fn test_redirect_back_without_referrer() {
    let mut app = Application::new();
    app.use_fn("back", |ctx, _next| {
        Box::pin(async move {
            ctx.redirect("back", None)?;
            Ok(())
        })
    });
    let client = TestClient::new(&app).unwrap();

    client
        .get("/form")
        .send()
        .await
        .assert_status(StatusCode::FOUND)
        .assert_header("location", "/")
        .assert_content_type("text/html")
        .assert_body_eq(r#"Redirecting to <a href="/">/</a>."#);

    client
        .get("/form")
        .header("Referrer", "/previous")
        .send()
        .await
        .assert_header("location", "/previous");

    client
        .get("/form")
        .header("Accept", "text/plain")
        .send()
        .await
        .assert_content_type("text/plain")
        .assert_body_eq("Redirecting to /.");
}

#[tokio::test]
async fn test_head_keeps_length_without_body() {
    let mut app = Application::new();
    app.use_fn("json", |ctx, _next| {
        Box::pin(async move {
            ctx.set_body(json!({ "a": 1 }));
            Ok(())
        })
    });
    let client = TestClient::new(&app).unwrap();

    client
        .head("/")
        .send()
        .await
        .assert_status(StatusCode::OK)
        .assert_header("content-length", "7")
        .assert_content_type("application/json")
        .assert_empty_body();
}

#[tokio::test]
async fn test_no_content_strips_entity_headers() {
    let mut app = Application::new();
    app.use_fn("delete", |ctx, _next| {
        Box::pin(async move {
            ctx.set_body("gone");
            ctx.set_status(StatusCode::NO_CONTENT);
            Ok(())
        })
    });
    let client = TestClient::new(&app).unwrap();

    client
        .delete("/items/1")
        .send()
        .await
        .assert_status(StatusCode::NO_CONTENT)
        .assert_no_header("content-type")
        .assert_no_header("content-length")
        .assert_empty_body();
}

#[tokio::test]
async fn test_text_and_html_inference() {
    let mut app = Application::new();
    app.use_fn("pages", |ctx, _next| {
        Box::pin(async move {
            if ctx.path() == "/html" {
                ctx.set_body("<p>hello</p>");
            } else {
                ctx.set_body("hello");
            }
            Ok(())
        })
    });
    let client = TestClient::new(&app).unwrap();

    client
        .get("/text")
        .send()
        .await
        .assert_header("content-type", "text/plain; charset=utf-8");
    client
        .get("/html")
        .send()
        .await
        .assert_header("content-type", "text/html; charset=utf-8");
}

#[tokio::test]
async fn test_header_changes_after_flush_are_ignored() {
    let mut app = Application::new();
    app.use_fn("early", |ctx, _next| {
        Box::pin(async move {
            ctx.set_status(StatusCode::ACCEPTED);
            ctx.set_header("x-before", "1")?;
            ctx.flush_headers()?;
            ctx.set_header("x-after", "1")?;
            ctx.set_status(StatusCode::CREATED);
            ctx.set_body("late");
            Ok(())
        })
    });
    let client = TestClient::new(&app).unwrap();

    let response = client.get("/").send().await;
    response
        .assert_status(StatusCode::ACCEPTED)
        .assert_header("x-before", "1")
        .assert_no_header("x-after")
        .assert_body_eq("late");
}

#[tokio::test]
async fn test_streamed_body() {
    let mut app = Application::new();
    app.use_fn("export", |ctx, _next| {
        Box::pin(async move {
            let rows: Vec<std::io::Result<Bytes>> = (1..=3)
                .map(|n| Ok(Bytes::from(format!("row{n}\n"))))
                .collect();
            ctx.set_type("text/csv");
            ctx.set_body(Body::stream(stream::iter(rows)));
            Ok(())
        })
    });
    let client = TestClient::new(&app).unwrap();

    client
        .get("/export")
        .send()
        .await
        .assert_status(StatusCode::OK)
        .assert_content_type("text/csv")
        .assert_no_header("content-length")
        .assert_body_eq("row1\nrow2\nrow3\n");
}

#[tokio::test]
async fn test_failing_stream_is_reported() {
    let (mut app, reporter) = recording_app();
    app.use_fn("broken", |ctx, _next| {
        Box::pin(async move {
            let chunks = vec![
                Ok(Bytes::from("partial")),
                Err(std::io::Error::other("disk gone")),
            ];
            ctx.set_body(Body::stream(stream::iter(chunks)));
            Ok(())
        })
    });
    let client = TestClient::new(&app).unwrap();

    let response = client.get("/").send().await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.stream_error().is_some());
    assert_eq!(reporter.count(), 1);
}

#[tokio::test]
async fn test_bypass_writes_nothing() {
    let mut app = Application::new();
    app.use_fn("raw", |ctx, _next| {
        Box::pin(async move {
            ctx.set_respond(false);
            ctx.set_body("ignored");
            Ok(())
        })
    });
    let client = TestClient::new(&app).unwrap();

    let err = client.get("/").try_send().await.unwrap_err();
    assert!(matches!(err, TestError::NoResponse));
}

fn forwarded(client: &TestClient) -> strata_test::TestClientRequest<'_> {
    client
        .get("/")
        .header("X-Forwarded-For", "203.0.113.7, 10.0.0.1")
}

#[tokio::test]
async fn test_proxy_trust_controls_ip() {
    let echo_ip = |app: &mut Application| {
        app.use_fn("ip", |ctx, _next| {
            Box::pin(async move {
                let ip = ctx.ip().to_string();
                ctx.set_body(ip);
                Ok(())
            })
        });
    };

    let mut direct = Application::new();
    echo_ip(&mut direct);
    let mut proxied =
        Application::with_settings(AppSettings::default().with_trust(ProxyTrust::enabled()));
    echo_ip(&mut proxied);

    let direct = TestClient::new(&direct).unwrap();
    forwarded(&direct).send().await.assert_body_eq("127.0.0.1");

    let proxied = TestClient::new(&proxied).unwrap();
    forwarded(&proxied).send().await.assert_body_eq("203.0.113.7");
}

#[tokio::test]
async fn test_bundled_stages_through_the_app() {
    let mut app = Application::new();
    app.use_middleware(RequestId::new())
        .use_middleware(RequestLog::new())
        .use_middleware(NotFound::with_message("no route"));
    app.use_fn("users", |ctx, next| {
        Box::pin(async move {
            if ctx.path() == "/users" {
                ctx.set_json(&json!([{ "id": 1 }]))?;
                Ok(())
            } else {
                next.run(ctx).await
            }
        })
    });
    let client = TestClient::new(&app).unwrap();

    let found = client.get("/users").send().await;
    found
        .assert_status(StatusCode::OK)
        .assert_json_field("0.id", &json!(1));
    assert!(found.header(REQUEST_ID_HEADER).is_some());

    client
        .get("/posts")
        .send()
        .await
        .assert_status(StatusCode::NOT_FOUND)
        .assert_body_eq("no route");
}

#[tokio::test]
async fn test_request_body_round_trip() {
    let mut app = Application::new();
    app.use_fn("echo", |ctx, _next| {
        Box::pin(async move {
            let raw = ctx.read_body().await?;
            let value: serde_json::Value = serde_json::from_slice(&raw)
                .map_err(|e| ctx.throw(StatusCode::BAD_REQUEST, e.to_string()))?;
            ctx.set_status(StatusCode::CREATED);
            ctx.set_body(json!({ "received": value }));
            Ok(())
        })
    });
    let client = TestClient::new(&app).unwrap();

    client
        .post("/echo")
        .json(&json!({ "name": "Alice" }))
        .send()
        .await
        .assert_status(StatusCode::CREATED)
        .assert_json_eq(&json!({ "received": { "name": "Alice" } }));

    client
        .post("/echo")
        .body("{not json")
        .send()
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}
