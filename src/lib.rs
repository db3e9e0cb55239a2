//! # reqlog
//!
//! One structured log event per HTTP request, on a minimal hyper-based
//! framework built for services behind a reverse proxy.
//!
//! ## The contract
//!
//! The proxy owns TLS, rate limiting and body-size limits. reqlog routes
//! requests, runs a middleware chain around the handlers, and
//! [`RequestLogger`](middleware::RequestLogger) reports on every exchange:
//!
//! - Correlation: the `x-request-id` header, when present, rides on every
//!   event logged for that request, including the handler's own
//! - Timing: latency measured around the whole downstream chain
//! - Outcome: status, bytes in and out, and the handler error if any
//! - Bodies: optional, best effort, JSON only
//!
//! Events go through [`tracing`]. The emitter is an injected [`Logger`],
//! not a global, and defaults to JSON lines on stdout.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use http::StatusCode;
//! use reqlog::middleware::{Config, RequestLogger};
//! use reqlog::{BoxFuture, Context, Error, Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let app = Router::new()
//!         .layer(RequestLogger::new(Config::new().dump_response(true)))
//!         .get("/users/{id}", get_user);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await
//! }
//!
//! fn get_user(ctx: &mut dyn Context) -> BoxFuture<'_, Result<(), Error>> {
//!     Box::pin(async move {
//!         let id = ctx.param("id").unwrap_or("unknown").to_owned();
//!         ctx.logger().info(format_args!("loading user {id}"));
//!         ctx.json(StatusCode::OK, &serde_json::json!({ "id": id }))
//!     })
//! }
//! ```

mod context;
mod error;
mod handler;
mod logger;
mod request;
mod response;
mod router;
mod server;

pub mod middleware;

pub use context::{Context, RequestContext, ScopedContext};
pub use error::{Error, ErrorHandler, default_error_handler};
pub use handler::{BoxFuture, BoxedHandler, Handler, boxed};
pub use logger::Logger;
pub use request::Request;
pub use response::{BufferedWriter, Response, ResponseWriter};
pub use router::Router;
pub use server::Server;
