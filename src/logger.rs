//! Injectable structured logger.
//!
//! A [`Logger`] is a [`tracing::Dispatch`] (where events go) plus a
//! [`tracing::Span`] (which fields ride along). Deriving a child logger
//! opens a child span, so everything logged through it carries the parent's
//! fields and its own.
//!
//! The dispatch is carried explicitly instead of being read from the global
//! default, so two routers in one process can log to different sinks.

use std::fmt::Display;
use std::future::Future;

use tracing::dispatcher::{self, Dispatch};
use tracing::instrument::{Instrument, Instrumented, WithDispatch, WithSubscriber};
use tracing::Span;

/// A structured event emitter with attached context fields.
///
/// Cloning is cheap: both halves are reference counted.
#[derive(Clone, Debug)]
pub struct Logger {
    dispatch: Dispatch,
    span: Span,
}

impl Logger {
    /// A logger that emits to `subscriber` with no context fields.
    pub fn new(subscriber: impl Into<Dispatch>) -> Self {
        Self { dispatch: subscriber.into(), span: Span::none() }
    }

    /// JSON lines on stdout, one object per event, each with a `timestamp`.
    pub fn stdout() -> Self {
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_current_span(true)
            .with_target(false)
            .with_writer(std::io::stdout)
            .finish();
        Self::new(subscriber)
    }

    /// Whatever dispatcher is the default where this is called, usually the
    /// one installed by `tracing_subscriber::fmt::init()`.
    pub fn current() -> Self {
        Self::new(dispatcher::get_default(Dispatch::clone))
    }

    /// A child logger whose context carries `id`.
    pub fn with_id(&self, id: &str) -> Self {
        let span = dispatcher::with_default(&self.dispatch, || {
            tracing::info_span!(parent: &self.span, "request", id = %id)
        });
        Self { dispatch: self.dispatch.clone(), span }
    }

    /// Runs `f` with this logger's dispatcher as the default and its span entered.
    ///
    /// Any `tracing` macro inside `f` lands here with this logger's fields.
    pub fn in_scope<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        dispatcher::with_default(&self.dispatch, || self.span.in_scope(f))
    }

    /// Like [`in_scope`](Logger::in_scope), for every poll of `fut`.
    pub fn instrument<F: Future>(&self, fut: F) -> WithDispatch<Instrumented<F>> {
        fut.instrument(self.span.clone()).with_subscriber(self.dispatch.clone())
    }

    pub fn debug(&self, msg: impl Display) {
        self.in_scope(|| tracing::debug!("{msg}"));
    }

    pub fn info(&self, msg: impl Display) {
        self.in_scope(|| tracing::info!("{msg}"));
    }

    pub fn warn(&self, msg: impl Display) {
        self.in_scope(|| tracing::warn!("{msg}"));
    }

    pub fn error(&self, msg: impl Display) {
        self.in_scope(|| tracing::error!("{msg}"));
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::current()
    }
}
