mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use serde_json::{Value, json};

use common::Capture;
use reqlog::middleware::{Config, Middleware, RequestLogger};
use reqlog::{
    BoxFuture, BufferedWriter, Context, Error, ErrorHandler, Handler, Request, RequestContext,
    Response, boxed, default_error_handler,
};

// ── Handlers ──────────────────────────────────────────────────────────────────

fn write_42(ctx: &mut dyn Context) -> BoxFuture<'_, Result<(), Error>> {
    Box::pin(async move { ctx.blob(StatusCode::OK, "text/plain", &[b'x'; 42]) })
}

fn ok_json(ctx: &mut dyn Context) -> BoxFuture<'_, Result<(), Error>> {
    Box::pin(async move { ctx.blob(StatusCode::OK, "application/json", br#"{"ok":true}"#) })
}

fn plain_words(ctx: &mut dyn Context) -> BoxFuture<'_, Result<(), Error>> {
    Box::pin(async move { ctx.text(StatusCode::OK, "plain words") })
}

fn sleepy(ctx: &mut dyn Context) -> BoxFuture<'_, Result<(), Error>> {
    Box::pin(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        ctx.no_content(StatusCode::NO_CONTENT)
    })
}

fn failing(_ctx: &mut dyn Context) -> BoxFuture<'_, Result<(), Error>> {
    Box::pin(async { Err(Error::http(StatusCode::UNPROCESSABLE_ENTITY, "bad input")) })
}

fn chatty(ctx: &mut dyn Context) -> BoxFuture<'_, Result<(), Error>> {
    Box::pin(async move {
        ctx.logger().info("through the context");
        tracing::info!("through the macro");
        ctx.no_content(StatusCode::NO_CONTENT)
    })
}

/// Counts invocations.
struct Counting(Arc<AtomicUsize>);

impl Handler for Counting {
    fn call<'a>(&'a self, ctx: &'a mut dyn Context) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            self.0.fetch_add(1, Ordering::SeqCst);
            ctx.blob(StatusCode::OK, "application/json", br#"{"calls":1}"#)
        })
    }
}

// ── Harness ───────────────────────────────────────────────────────────────────

fn get(uri: &str) -> http::Request<Bytes> {
    http::Request::get(uri).body(Bytes::new()).unwrap()
}

fn context(req: http::Request<Bytes>) -> RequestContext {
    RequestContext::new(Request::new(req), Box::new(BufferedWriter::new()))
}

async fn run_in(
    mut ctx: RequestContext,
    config: Config,
    handler: impl Handler,
) -> (Result<(), Error>, http::Response<Full<Bytes>>) {
    let chain = RequestLogger::new(config).wrap(boxed(handler));
    let result = chain.call(&mut ctx).await;
    (result, ctx.into_response())
}

async fn run(
    config: Config,
    handler: impl Handler,
    req: http::Request<Bytes>,
) -> (Result<(), Error>, http::Response<Full<Bytes>>) {
    run_in(context(req), config, handler).await
}

async fn body_of(res: http::Response<Full<Bytes>>) -> Bytes {
    res.into_body().collect().await.unwrap().to_bytes()
}

// ── Skipping ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn skipped_requests_emit_nothing_and_pass_results_through() {
    let capture = Capture::default();
    let config = Config::new()
        .logger(capture.logger())
        .skipper(|ctx: &dyn Context| ctx.request().uri().path() == "/healthz");

    let (result, res) = run(config, failing, get("/healthz")).await;

    assert!(matches!(result, Err(Error::Http { status, .. }) if status == StatusCode::UNPROCESSABLE_ENTITY));
    // Not reported to the error handler either: the response is untouched.
    assert!(body_of(res).await.is_empty());
    assert!(capture.events().is_empty());
}

#[tokio::test]
async fn skipper_only_skips_what_it_matches() {
    let capture = Capture::default();
    let config = Config::new()
        .logger(capture.logger())
        .skipper(|ctx: &dyn Context| ctx.request().uri().path() == "/healthz");

    run(config, write_42, get("/users")).await.0.unwrap();

    assert_eq!(capture.requests().len(), 1);
}

// ── The event ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn one_event_with_request_and_response_fields() {
    let capture = Capture::default();
    let req = http::Request::get("/users/42?expand=true")
        .header("host", "api.local")
        .header("user-agent", "curl/8.5.0")
        .header("referer", "https://app.local/")
        .header("x-forwarded-for", "203.0.113.9")
        .body(Bytes::new())
        .unwrap();

    let (result, res) = run(Config::new().logger(capture.logger()), write_42, req).await;
    result.unwrap();

    let events = capture.requests();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.field("remote_ip"), Some("203.0.113.9"));
    assert_eq!(event.field("host"), Some("api.local"));
    assert_eq!(event.field("method"), Some("GET"));
    assert_eq!(event.field("uri"), Some("/users/42?expand=true"));
    assert_eq!(event.field("user_agent"), Some("curl/8.5.0"));
    assert_eq!(event.field("referer"), Some("https://app.local/"));
    assert_eq!(event.field("status"), Some("200"));
    assert_eq!(event.field("bytes_in"), Some("0"));
    assert_eq!(event.field("bytes_out"), Some("42"));
    assert_eq!(event.field("err"), None);
    assert_eq!(event.field("request"), None);
    assert_eq!(event.field("response"), None);

    assert_eq!(body_of(res).await.len(), 42);
}

#[tokio::test]
async fn bytes_in_is_the_raw_content_length() {
    let capture = Capture::default();
    let req = http::Request::post("/users")
        .header("content-length", "16")
        .body(Bytes::from_static(br#"{"name":"alice"}"#))
        .unwrap();

    run(Config::new().logger(capture.logger()), write_42, req).await.0.unwrap();

    assert_eq!(capture.requests()[0].field("bytes_in"), Some("16"));
}

#[tokio::test]
async fn latency_covers_the_handler() {
    let capture = Capture::default();

    run(Config::new().logger(capture.logger()), sleepy, get("/slow")).await.0.unwrap();

    let event = &capture.requests()[0];
    let latency: f64 = event.field("latency").unwrap().parse().unwrap();
    assert!(latency >= 50.0, "latency {latency}ms");
    assert!(event.field("latency_human").unwrap().ends_with("ms"));
    assert_eq!(event.field("status"), Some("204"));
}

// ── Request id ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn inbound_request_id_rides_on_the_logger() {
    let capture = Capture::default();
    let req = http::Request::get("/").header("x-request-id", "req-7f3a").body(Bytes::new()).unwrap();

    run(Config::new().logger(capture.logger()), write_42, req).await.0.unwrap();

    let event = &capture.requests()[0];
    assert_eq!(event.span_fields.get("id").map(String::as_str), Some("req-7f3a"));
}

#[tokio::test]
async fn outbound_request_id_is_used_when_inbound_is_missing() {
    let capture = Capture::default();
    let mut ctx = context(get("/"));
    ctx.response_mut().headers_mut().insert("x-request-id", "set-upstream".parse().unwrap());

    run_in(ctx, Config::new().logger(capture.logger()), write_42).await.0.unwrap();

    let event = &capture.requests()[0];
    assert_eq!(event.span_fields.get("id").map(String::as_str), Some("set-upstream"));
}

#[tokio::test]
async fn no_request_id_means_no_id_field() {
    let capture = Capture::default();

    run(Config::new().logger(capture.logger()), write_42, get("/")).await.0.unwrap();

    let event = &capture.requests()[0];
    assert!(!event.span_fields.contains_key("id"));
    assert!(!event.fields.contains_key("id"));
}

#[tokio::test]
async fn handler_logs_inherit_the_request_id() {
    let capture = Capture::default();
    let req = http::Request::get("/").header("x-request-id", "abc").body(Bytes::new()).unwrap();

    run(Config::new().logger(capture.logger()), chatty, req).await.0.unwrap();

    for message in ["through the context", "through the macro"] {
        let event = capture.with_message(message).unwrap();
        assert_eq!(event.span_fields.get("id").map(String::as_str), Some("abc"), "{message}");
    }
}

// ── Handler errors ────────────────────────────────────────────────────────────

#[tokio::test]
async fn handler_errors_are_logged_and_forwarded() {
    let capture = Capture::default();
    let reported = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&reported);
    let handler: ErrorHandler = Arc::new(move |err: &Error, res: &mut Response| {
        seen.fetch_add(1, Ordering::SeqCst);
        default_error_handler(err, res);
    });
    let ctx = context(get("/users")).with_error_handler(handler);

    let (result, res) = run_in(ctx, Config::new().logger(capture.logger()), failing).await;

    assert!(result.is_err());
    assert_eq!(reported.load(Ordering::SeqCst), 1);

    let event = &capture.requests()[0];
    assert_eq!(event.field("err"), Some("422 Unprocessable Entity: bad input"));
    assert_eq!(event.field("status"), Some("422"));
    assert_eq!(event.field("bytes_out"), Some(r#"{"message":"bad input"}"#.len().to_string().as_str()));

    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = serde_json::from_slice(&body_of(res).await).unwrap();
    assert_eq!(body, json!({ "message": "bad input" }));
}

// ── Body capture ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn json_response_is_attached() {
    let capture = Capture::default();
    let config = Config::new().logger(capture.logger()).dump_response(true);

    let (result, res) = run(config, ok_json, get("/status")).await;
    result.unwrap();

    let event = &capture.requests()[0];
    let logged: Value = serde_json::from_str(event.field("response").unwrap()).unwrap();
    assert_eq!(logged, json!({ "ok": true }));
    // The tap does not change what the client gets.
    assert_eq!(&body_of(res).await[..], br#"{"ok":true}"#);
}

#[tokio::test]
async fn non_json_response_is_silently_skipped() {
    let capture = Capture::default();
    let config = Config::new().logger(capture.logger()).dump_response(true);

    let (result, res) = run(config, plain_words, get("/")).await;

    assert!(result.is_ok());
    assert_eq!(capture.requests()[0].field("response"), None);
    assert_eq!(&body_of(res).await[..], b"plain words");
}

#[tokio::test]
async fn handler_runs_once_with_response_capture() {
    let capture = Capture::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let config = Config::new().logger(capture.logger()).dump_response(true);

    let (result, res) = run(config, Counting(Arc::clone(&calls)), get("/")).await;
    result.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(capture.requests().len(), 1);
    assert_eq!(&body_of(res).await[..], br#"{"calls":1}"#);
}

#[tokio::test]
async fn json_request_is_attached_and_left_readable() {
    let capture = Capture::default();
    let config = Config::new().logger(capture.logger()).dump_request(true);
    let mut ctx = context(
        http::Request::post("/users")
            .header("content-length", "16")
            .body(Bytes::from_static(br#"{"name":"alice"}"#))
            .unwrap(),
    );

    let chain = RequestLogger::new(config).wrap(boxed(write_42));
    chain.call(&mut ctx).await.unwrap();

    let logged: Value = serde_json::from_str(capture.requests()[0].field("request").unwrap()).unwrap();
    assert_eq!(logged, json!({ "name": "alice" }));
    assert_eq!(&ctx.request().body()[..], br#"{"name":"alice"}"#);
}

#[tokio::test]
async fn non_json_request_is_silently_skipped() {
    let capture = Capture::default();
    let config = Config::new().logger(capture.logger()).dump_request(true);
    let req = http::Request::post("/upload").body(Bytes::from_static(b"\x89PNG")).unwrap();

    let (result, _) = run(config, write_42, req).await;

    assert!(result.is_ok());
    assert_eq!(capture.requests()[0].field("request"), None);
}
