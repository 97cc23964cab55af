//! Versioned book endpoints served from a local hyper listener.
//!
//! Run with:
//!   cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/books/42
//!   curl http://localhost:3000/books/42 -H 'x-compatibility-date: 2024-06-01'
//!   curl -X POST http://localhost:3000/books \
//!        -H 'authorization: secret' -H 'content-type: application/json' \
//!        -d '{"title":"Dune"}'
//!   curl 'http://localhost:3000/__generate_openapi__?date=today'
//!
//! In production the edge runtime owns the socket and calls
//! `Server::handle` directly; the accept loop below stands in for it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info};
use vesta::{Config, Event, Extension, Middleware, Next, Reply, RouteOptions, Server};

/// Bindings the runtime would normally inject.
struct Bindings {
    api_token: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let timing = Middleware::builder()
        .name("timing")
        .handler(|_event: Arc<Event>| async move {
            Extension::new().with("startedAt", format!("{:?}", Instant::now()))
        })
        .build()
        .expect("timing middleware");

    let auth = Middleware::builder()
        .name("auth")
        .reply(401, json!({ "type": "object", "properties": { "message": { "type": "string" } } }))
        .handler(|event: Arc<Event>| async move {
            let expected = event.env::<Bindings>().map(|b| b.api_token.as_str());
            match (event.header("authorization"), expected) {
                (Some(token), Some(expected)) if token == expected => {
                    Next::Continue(Extension::new().with("user", "admin"))
                }
                _ => Next::Reply(Reply::unauthorized().message("Missing or invalid token")),
            }
        })
        .build()
        .expect("auth middleware");

    let server = Server::new(Config { introspection: true, ..Config::default() })
        .before(timing)
        .route(
            RouteOptions::new().name("getBook").method("GET").pathname("/books/:bookId"),
            get_book_v1,
        )
        .route(
            RouteOptions::new()
                .name("getBookV2")
                .method("GET")
                .pathname("/books/:bookId")
                .compatibility_date("2024-01-01")
                .reply(200, json!({ "type": "object" })),
            get_book_v2,
        )
        .route(
            RouteOptions::new()
                .name("createBook")
                .method("POST")
                .pathname("/books")
                .before([auth])
                .body(json!({ "type": "object", "required": ["title"] })),
            create_book,
        );

    let env: vesta::Opaque = Arc::new(Bindings { api_token: "secret".into() });
    let service = Arc::new(server).into_service(env, Arc::new(()));

    let addr: SocketAddr = ([127, 0, 0, 1], 3000).into();
    let listener = TcpListener::bind(addr).await.expect("bind");
    info!(%addr, "listening");

    let mut tasks = tokio::task::JoinSet::new();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            () = &mut shutdown => {
                info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                break;
            }

            res = listener.accept() => {
                let (stream, peer) = match res {
                    Ok(v) => v,
                    Err(e) => {
                        error!("accept error: {e}");
                        continue;
                    }
                };
                let service = service.clone();
                tasks.spawn(async move {
                    if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                        .serve_connection(TokioIo::new(stream), service)
                        .await
                    {
                        error!(%peer, "connection error: {e}");
                    }
                });
            }

            Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
        }
    }

    while tasks.join_next().await.is_some() {}
    info!("stopped");
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = sigterm => {}
    }
}

// GET /books/:bookId
async fn get_book_v1(event: Arc<Event>) -> Reply {
    Reply::ok().json(json!({ "id": event.param("bookId"), "title": "Dune" }))
}

// GET /books/:bookId, from 2024-01-01 on
async fn get_book_v2(event: Arc<Event>) -> Reply {
    Reply::ok().json(json!({ "book": { "id": event.param("bookId"), "title": "Dune" } }))
}

// POST /books
async fn create_book(event: Arc<Event>) -> Reply {
    let title = event.body().and_then(|b| b.get("title")).and_then(|t| t.as_str());
    match title {
        Some(title) => Reply::created()
            .header("location", "/books/99")
            .json(json!({ "id": "99", "title": title, "by": event.get("user") })),
        None => Reply::bad_request().message("title is required"),
    }
}
