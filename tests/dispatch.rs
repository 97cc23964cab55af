use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http::{HeaderValue, StatusCode};
use http_body_util::{BodyExt, Full};
use serde_json::{Value, json};
use vesta::{Config, Error, Event, Extension, Middleware, Next, Reply, RouteOptions, Server};

type Log = Arc<Mutex<Vec<&'static str>>>;

struct Outcome {
    status: StatusCode,
    body: Option<Value>,
}

async fn send(server: &Server, request: http::Request<Full<Bytes>>) -> Outcome {
    let response = server.handle(request, Arc::new(()), Arc::new(())).await;
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    Outcome {
        status,
        body: (!bytes.is_empty()).then(|| serde_json::from_slice(&bytes).unwrap()),
    }
}

fn get(path: &str) -> http::Request<Full<Bytes>> {
    http::Request::get(path).body(Full::default()).unwrap()
}

fn dated(path: &str, date: &str) -> http::Request<Full<Bytes>> {
    http::Request::get(path)
        .header("x-compatibility-date", date)
        .body(Full::default())
        .unwrap()
}

fn recorder(log: &Log, label: &'static str) -> Middleware {
    let log = Arc::clone(log);
    Middleware::builder()
        .name(label)
        .handler(move |_event: Arc<Event>| {
            let log = Arc::clone(&log);
            async move { log.lock().unwrap().push(label) }
        })
        .build()
        .unwrap()
}

fn replying(log: &Log, label: &'static str, reply: Reply) -> Middleware {
    let log = Arc::clone(log);
    Middleware::builder()
        .name(label)
        .handler(move |_event: Arc<Event>| {
            let log = Arc::clone(&log);
            let reply = reply.clone();
            async move {
                log.lock().unwrap().push(label);
                reply
            }
        })
        .build()
        .unwrap()
}

fn named(name: &'static str) -> impl Fn(Arc<Event>) -> std::future::Ready<Reply> + Send + Sync + 'static {
    move |_event| std::future::ready(Reply::ok().json(json!({ "route": name })))
}

#[tokio::test]
async fn path_parameters_reach_the_handler() {
    let server = Server::new(Config::default()).route(
        RouteOptions::new().method("GET").pathname("/books/:bookId"),
        |event: Arc<Event>| async move { Reply::ok().json(json!({ "bookId": event.param("bookId") })) },
    );

    let outcome = send(&server, get("/books/42")).await;
    assert_eq!(outcome.status, StatusCode::OK);
    assert_eq!(outcome.body, Some(json!({ "bookId": "42" })));
}

#[tokio::test]
async fn header_date_selects_the_latest_version_not_after_it() {
    let server = Server::new(Config::default())
        .route(RouteOptions::new().method("GET").pathname("/x").compatibility_date("2023-01-01"), named("v1"))
        .route(RouteOptions::new().method("GET").pathname("/x").compatibility_date("2024-01-01"), named("v2"));

    let outcome = send(&server, dated("/x", "2023-06-01")).await;
    assert_eq!(outcome.body, Some(json!({ "route": "v1" })));

    let outcome = send(&server, dated("/x", "2024-01-01")).await;
    assert_eq!(outcome.body, Some(json!({ "route": "v2" })));

    // dated routes are never served to undated requests
    let outcome = send(&server, get("/x")).await;
    assert_eq!(outcome.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn future_or_malformed_dates_are_rejected() {
    let called = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&called);
    let server = Server::new(Config::default()).route(RouteOptions::new().pathname("/x"), move |_e: Arc<Event>| {
        let flag = Arc::clone(&flag);
        async move {
            flag.store(true, Ordering::SeqCst);
            Reply::ok()
        }
    });

    let tomorrow = chrono::Utc::now().date_naive() + chrono::Days::new(1);
    for date in [tomorrow.format("%Y-%m-%d").to_string(), "2024-1-01".to_owned(), "yesterday".to_owned()] {
        let outcome = send(&server, dated("/x", &date)).await;
        assert_eq!(outcome.status, StatusCode::BAD_REQUEST, "{date}");
        assert_eq!(outcome.body, Some(json!({ "message": "Invalid compatibility date" })));
    }

    let request = http::Request::get("/x")
        .header("x-compatibility-date", HeaderValue::from_bytes(b"2023-01-01\xff").unwrap())
        .body(Full::default())
        .unwrap();
    let outcome = send(&server, request).await;
    assert_eq!(outcome.status, StatusCode::BAD_REQUEST);
    assert_eq!(outcome.body, Some(json!({ "message": "Invalid compatibility date" })));

    assert!(!called.load(Ordering::SeqCst));
}

#[tokio::test]
async fn unmatched_pathname_is_not_found() {
    let server = Server::new(Config::default()).route(RouteOptions::new().pathname("/books"), named("books"));
    let outcome = send(&server, get("/missing")).await;
    assert_eq!(outcome.status, StatusCode::NOT_FOUND);
    assert_eq!(outcome.body, None);
}

#[tokio::test]
async fn global_before_reply_skips_the_route_but_not_global_after() {
    let log: Log = Arc::default();
    let server = Server::new(Config::default())
        .before(replying(&log, "gate", Reply::bad_request()))
        .before(recorder(&log, "global-before"))
        .after(recorder(&log, "global-after"))
        .route(
            RouteOptions::new()
                .pathname("/x")
                .before([recorder(&log, "local-before")])
                .after([recorder(&log, "local-after")]),
            {
                let log = Arc::clone(&log);
                move |_e: Arc<Event>| {
                    let log = Arc::clone(&log);
                    async move {
                        log.lock().unwrap().push("handler");
                        Reply::ok()
                    }
                }
            },
        );

    let outcome = send(&server, get("/x")).await;
    assert_eq!(outcome.status, StatusCode::BAD_REQUEST);
    assert_eq!(*log.lock().unwrap(), vec!["gate", "global-after"]);
}

#[tokio::test]
async fn local_before_reply_skips_only_the_handler() {
    let log: Log = Arc::default();
    let server = Server::new(Config::default()).after(recorder(&log, "global-after")).route(
        RouteOptions::new()
            .pathname("/x")
            .before([replying(&log, "deny", Reply::forbidden()), recorder(&log, "never")])
            .after([recorder(&log, "local-after")]),
        named("x"),
    );

    let outcome = send(&server, get("/x")).await;
    assert_eq!(outcome.status, StatusCode::FORBIDDEN);
    assert_eq!(*log.lock().unwrap(), vec!["deny", "local-after", "global-after"]);
}

#[tokio::test]
async fn lifecycle_runs_in_order() {
    let log: Log = Arc::default();
    let server = Server::new(Config::default())
        .before(recorder(&log, "global-before"))
        .after(recorder(&log, "global-after"))
        .route(
            RouteOptions::new()
                .pathname("/x")
                .before([recorder(&log, "local-before")])
                .after([recorder(&log, "local-after")]),
            named("x"),
        );

    send(&server, get("/x")).await;
    assert_eq!(
        *log.lock().unwrap(),
        vec!["global-before", "local-before", "local-after", "global-after"]
    );
}

#[tokio::test]
async fn after_middleware_reply_replaces_the_handler_reply() {
    let log: Log = Arc::default();
    let server = Server::new(Config::default()).after(recorder(&log, "global-after")).route(
        RouteOptions::new()
            .pathname("/x")
            .after([replying(&log, "rewrite", Reply::accepted()), recorder(&log, "skipped")]),
        named("x"),
    );

    let outcome = send(&server, get("/x")).await;
    assert_eq!(outcome.status, StatusCode::ACCEPTED);
    assert_eq!(*log.lock().unwrap(), vec!["rewrite", "global-after"]);
}

#[tokio::test]
async fn required_extensions_are_visible_downstream() {
    let session = Middleware::builder()
        .name("session")
        .handler(|event: Arc<Event>| async move {
            let sid = event.cookies().get("sid").unwrap_or("none").to_owned();
            Extension::new().with("session", sid).with("role", "guest")
        })
        .build()
        .unwrap();
    let promote = Middleware::builder()
        .name("promote")
        .requires([session.clone()])
        .handler(|event: Arc<Event>| async move {
            let session: String = event.extension("session")?;
            Ok::<_, Error>(Extension::new().with("role", "admin").with("checked", session))
        })
        .build()
        .unwrap();

    let server = Server::new(Config::default()).before(session).route(
        RouteOptions::new().pathname("/me").before([promote]),
        |event: Arc<Event>| async move { Reply::ok().json(Value::Object(event.extensions().clone())) },
    );

    let request = http::Request::get("/me")
        .header("cookie", "sid=abc; theme=dark")
        .body(Full::default())
        .unwrap();
    let outcome = send(&server, request).await;
    assert_eq!(
        outcome.body,
        Some(json!({ "session": "abc", "role": "admin", "checked": "abc" }))
    );
}

#[tokio::test]
async fn bodies_are_decoded_by_content_type() {
    let server = Server::new(Config::default()).route(
        RouteOptions::new().method("POST").pathname("/echo"),
        |event: Arc<Event>| async move { Reply::ok().json(json!({ "body": event.body() })) },
    );
    let post = |content_type: &str, body: &'static str| {
        http::Request::post("/echo")
            .header("content-type", content_type)
            .body(Full::new(Bytes::from_static(body.as_bytes())))
            .unwrap()
    };

    let outcome = send(&server, post("application/json", r#"{"title":"Dune","pages":412}"#)).await;
    assert_eq!(outcome.body, Some(json!({ "body": { "title": "Dune", "pages": 412 } })));

    let outcome = send(&server, post("application/x-www-form-urlencoded", "a=1&b=2")).await;
    assert_eq!(outcome.body, Some(json!({ "body": { "a": "1", "b": "2" } })));

    let outcome = send(&server, post("text/plain", "hello")).await;
    assert_eq!(outcome.body, Some(json!({ "body": null })));
}

#[tokio::test]
async fn malformed_json_body_is_a_server_error() {
    let server = Server::new(Config::default()).route(RouteOptions::new(), named("any"));
    let request = http::Request::post("/x")
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from_static(b"{not json")))
        .unwrap();
    assert_eq!(send(&server, request).await.status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn silent_pipeline_answers_with_the_default_status() {
    let quiet = |_e: Arc<Event>| async {};

    let server = Server::new(Config::default()).route(RouteOptions::new().pathname("/quiet"), quiet);
    let outcome = send(&server, get("/quiet")).await;
    assert_eq!(outcome.status, StatusCode::OK);
    assert_eq!(outcome.body, None);

    let server = Server::new(Config { default_status: 204, ..Config::default() })
        .route(RouteOptions::new().pathname("/quiet"), quiet);
    assert_eq!(send(&server, get("/quiet")).await.status, StatusCode::NO_CONTENT);

    // the default only applies when nothing replied
    assert_eq!(send(&server, get("/elsewhere")).await.status, StatusCode::NOT_FOUND);

    let server = Server::new(Config { default_status: 204, ..Config::default() })
        .after(Middleware::new(|_e: Arc<Event>| async { Next::Reply(Reply::accepted()) }))
        .route(RouteOptions::new().pathname("/quiet"), quiet);
    assert_eq!(send(&server, get("/quiet")).await.status, StatusCode::ACCEPTED);
}

#[tokio::test]
async fn failures_become_server_errors() {
    let server = Server::new(Config::default())
        .route(RouteOptions::new().pathname("/error"), |_e: Arc<Event>| async {
            Err::<Reply, _>(Error::handler("database unavailable"))
        })
        .route(RouteOptions::new().pathname("/panic"), |_e: Arc<Event>| async {
            if true {
                panic!("handler exploded");
            }
            Reply::ok()
        })
        .route(RouteOptions::new().pathname("/missing-extension"), |e: Arc<Event>| async move {
            let user: String = e.extension("user")?;
            Ok::<_, Error>(Reply::ok().json(json!(user)))
        })
        .route(RouteOptions::new().pathname("/bad-header"), |_e: Arc<Event>| async {
            Reply::ok().header("bad header", "v")
        });

    for path in ["/error", "/panic", "/missing-extension", "/bad-header"] {
        let outcome = send(&server, get(path)).await;
        assert_eq!(outcome.status, StatusCode::INTERNAL_SERVER_ERROR, "{path}");
        assert_eq!(outcome.body, None);
    }
}

#[tokio::test]
async fn all_is_not_a_request_method() {
    let server = Server::new(Config::default()).route(RouteOptions::new().pathname("/x"), named("any"));
    let request = http::Request::builder().method("ALL").uri("/x").body(Full::default()).unwrap();
    assert_eq!(send(&server, request).await.status, StatusCode::NOT_FOUND);
    assert_eq!(send(&server, get("/x")).await.status, StatusCode::OK);
}

#[test]
fn requirements_are_checked_against_the_final_global_chains() {
    let session = Middleware::builder().name("session").handler(|_e: Arc<Event>| async {}).build().unwrap();
    let auth = Middleware::builder()
        .name("auth")
        .requires([session.clone()])
        .handler(|_e: Arc<Event>| async {})
        .build()
        .unwrap();
    let audit = Middleware::builder()
        .name("audit")
        .requires([auth.clone()])
        .handler(|_e: Arc<Event>| async {})
        .build()
        .unwrap();

    // globals attached after the route still count
    let server = Server::new(Config::default())
        .route(RouteOptions::new().name("guarded").pathname("/x").before([auth.clone()]), named("x"))
        .before(session);
    assert!(server.unmet_requirements().is_empty());

    let server = server
        .after(audit)
        .route(RouteOptions::new().name("open").pathname("/y"), named("y"));
    let unmet = server.unmet_requirements();
    assert_eq!(unmet.len(), 1);
    assert_eq!(unmet[0].0, "open");
    assert!(matches!(&unmet[0].1, Error::UnmetRequirement { middleware, requires }
        if middleware == "audit" && requires == "auth"));
}

#[tokio::test]
async fn host_object_follows_the_configured_mode() {
    let probe = |event: Arc<Event>| async move {
        Reply::ok().json(json!({
            "durable": event.is_durable_object(),
            "state": event.durable_object_state::<String>(),
            "context": event.execution_context::<String>(),
            "env": event.env::<u32>(),
        }))
    };

    for (durable, expected) in [
        (false, json!({ "durable": false, "state": null, "context": "host", "env": 7 })),
        (true, json!({ "durable": true, "state": "host", "context": null, "env": 7 })),
    ] {
        let server = Server::new(Config { durable_object: durable, ..Config::default() })
            .route(RouteOptions::new(), probe);
        let response = server.handle(get("/"), Arc::new(7_u32), Arc::new(String::from("host"))).await;
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(serde_json::from_slice::<Value>(&bytes).unwrap(), expected);
    }
}

#[tokio::test]
async fn validator_rejects_before_route_middleware() {
    let log: Log = Arc::default();
    let server = Server::new(Config::default())
        .validator(|schema: &Value, value: &Value| match (schema.as_str(), value.get("title")) {
            (Some("needs-title"), None) => Err("title is required".to_owned()),
            _ => Ok(()),
        })
        .after(recorder(&log, "global-after"))
        .route(
            RouteOptions::new()
                .method("POST")
                .pathname("/books")
                .body(json!("needs-title"))
                .before([recorder(&log, "local-before")])
                .after([recorder(&log, "local-after")]),
            named("create"),
        );

    let request = http::Request::post("/books")
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from_static(br#"{"author":"Herbert"}"#)))
        .unwrap();
    let outcome = send(&server, request).await;
    assert_eq!(outcome.status, StatusCode::BAD_REQUEST);
    assert_eq!(outcome.body, Some(json!({ "message": "Invalid body: title is required" })));
    assert_eq!(*log.lock().unwrap(), vec!["local-after", "global-after"]);

    let request = http::Request::post("/books")
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from_static(br#"{"title":"Dune"}"#)))
        .unwrap();
    assert_eq!(send(&server, request).await.status, StatusCode::OK);
}

#[tokio::test]
async fn prefix_is_prepended_to_routes() {
    let server = Server::new(Config { prefix: "/api".into(), ..Config::default() })
        .route(RouteOptions::new().method("GET").pathname("/books/:bookId"), named("book"));

    assert_eq!(send(&server, get("/api/books/1")).await.status, StatusCode::OK);
    assert_eq!(send(&server, get("/books/1")).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn introspection_lists_routes_before_any_middleware() {
    let log: Log = Arc::default();
    let server = Server::new(Config { introspection: true, ..Config::default() })
        .before(replying(&log, "gate", Reply::unauthorized()))
        .route(
            RouteOptions::new()
                .name("getBook")
                .method("GET")
                .pathname("/books/:bookId")
                .compatibility_date("2024-01-01")
                .params(json!({ "bookId": "string" })),
            named("book"),
        );

    let outcome = send(&server, get("/__generate_openapi__?date=2024-02-01")).await;
    assert_eq!(outcome.status, StatusCode::OK);
    let body = outcome.body.unwrap();
    assert_eq!(body["routes"][0]["name"], "getBook");
    assert_eq!(body["routes"][0]["schemas"]["params"], json!({ "bookId": "string" }));
    assert!(log.lock().unwrap().is_empty());

    let outcome = send(&server, get("/__generate_openapi__?date=2023-01-01")).await;
    assert_eq!(outcome.body.unwrap()["routes"], json!([]));
}
