//! Handler trait and type erasure.
//!
//! # How handlers are stored
//!
//! The router holds handlers of different types in one table, and
//! middleware wraps them without knowing what they are. Both work on
//! [`BoxedHandler`], an `Arc<dyn Handler>`.
//!
//! A handler borrows the request context for the duration of the call:
//!
//! ```text
//! fn hello(ctx: &mut dyn Context) -> BoxFuture<'_, Result<(), Error>>   ← user writes this
//!        ↓ router.get("/", hello)
//! Arc::new(hello)                     ← BoxedHandler, shared across requests
//!        ↓
//! handler.call(&mut ctx).await        ← one vtable dispatch per request
//! ```
//!
//! The borrow is why handlers are plain `fn` items returning a boxed future
//! rather than `async fn`: the future must name the context's lifetime.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::error::Error;

/// A heap-allocated, type-erased future that may borrow for `'a`.
///
/// `Send` lets tokio move the future between worker threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A request handler: writes the response through the context, or fails.
///
/// Implemented automatically for any function with the signature
///
/// ```text
/// fn name(ctx: &mut dyn Context) -> BoxFuture<'_, Result<(), Error>>
/// ```
///
/// Implement it by hand for handlers that carry state, and for middleware
/// that wraps a [`BoxedHandler`].
pub trait Handler: Send + Sync + 'static {
    fn call<'a>(&'a self, ctx: &'a mut dyn Context) -> BoxFuture<'a, Result<(), Error>>;
}

/// A type-erased handler shared across concurrent requests.
pub type BoxedHandler = Arc<dyn Handler>;

impl<F> Handler for F
where
    F: for<'a> Fn(&'a mut dyn Context) -> BoxFuture<'a, Result<(), Error>> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut dyn Context) -> BoxFuture<'a, Result<(), Error>> {
        (self)(ctx)
    }
}

/// Erases a handler's type.
pub fn boxed(handler: impl Handler) -> BoxedHandler {
    Arc::new(handler)
}
