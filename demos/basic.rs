//! Minimal reqlog example: JSON endpoints behind the request logger.
//!
//! Run with:
//!   cargo run --example basic
//!
//! Try:
//!   curl -H 'x-request-id: abc-123' http://localhost:3000/users/42
//!   curl -X POST http://localhost:3000/users \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice"}'
//!   curl http://localhost:3000/missing
//!   curl http://localhost:3000/healthz     (not logged)

use http::StatusCode;
use http::header::{HeaderValue, LOCATION};
use reqlog::middleware::{Config, RequestLogger};
use reqlog::{BoxFuture, Context, Error, Router, Server};

#[tokio::main]
async fn main() {
    let logger = RequestLogger::new(
        Config::new()
            .skipper(|ctx: &dyn Context| ctx.request().uri().path() == "/healthz")
            .dump_request(true)
            .dump_response(true),
    );

    let app = Router::new()
        .layer(logger)
        .get("/users/{id}", get_user)
        .post("/users", create_user)
        .get("/healthz", healthz);

    Server::bind("0.0.0.0:3000")
        .serve(app)
        .await
        .expect("server error");
}

// GET /users/{id}
//
// Logged through the context, so the line carries the request id.
fn get_user(ctx: &mut dyn Context) -> BoxFuture<'_, Result<(), Error>> {
    Box::pin(async move {
        let id = ctx.param("id").unwrap_or("unknown").to_owned();
        ctx.logger().info(format_args!("loading user {id}"));
        ctx.json(StatusCode::OK, &serde_json::json!({ "id": id, "name": "alice" }))
    })
}

// POST /users
//
// An empty body fails the request; the request logger records the error and
// the default error handler answers 400.
fn create_user(ctx: &mut dyn Context) -> BoxFuture<'_, Result<(), Error>> {
    Box::pin(async move {
        if ctx.request().body().is_empty() {
            return Err(Error::http(StatusCode::BAD_REQUEST, "body required"));
        }
        ctx.response_mut().headers_mut().insert(LOCATION, HeaderValue::from_static("/users/99"));
        ctx.json(StatusCode::CREATED, &serde_json::json!({ "id": "99" }))
    })
}

fn healthz(ctx: &mut dyn Context) -> BoxFuture<'_, Result<(), Error>> {
    Box::pin(async move { ctx.text(StatusCode::OK, "ok") })
}
