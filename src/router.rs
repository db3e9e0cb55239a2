//! Radix-tree request router.
//!
//! One tree per HTTP method. O(path-length) lookup. [`Router`] only records
//! registrations; [`Server::serve`](crate::Server::serve) compiles them into
//! an [`App`] once, wrapping every route in the middleware chain.

use std::collections::HashMap;
use std::sync::Arc;

use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;

use crate::context::Context;
use crate::error::{Error, ErrorHandler, default_error_handler};
use crate::handler::{BoxFuture, BoxedHandler, Handler, boxed};
use crate::logger::Logger;
use crate::middleware::Middleware;

/// The application router.
///
/// Each builder call returns `self` so registrations chain naturally.
pub struct Router {
    routes: Vec<(Method, String, BoxedHandler)>,
    middleware: Vec<Arc<dyn Middleware>>,
    logger: Option<Logger>,
    error_handler: Option<ErrorHandler>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new(), middleware: Vec::new(), logger: None, error_handler: None }
    }

    /// Register a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax; `ctx.param("name")` retrieves them.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes.push((method, path.to_owned(), boxed(handler)));
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn patch(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PATCH, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::DELETE, path, handler)
    }

    /// Wrap every route, and the not-found fallback, in `middleware`.
    ///
    /// The first layer registered runs first.
    pub fn layer(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// The logger handlers see through [`Context::logger`] when no
    /// middleware replaces it. Defaults to the dispatcher current at
    /// serve time.
    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Replaces [`default_error_handler`].
    pub fn error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// Compiles the routing table.
    pub(crate) fn build(self) -> Result<App, Error> {
        let chain = |handler: BoxedHandler| {
            self.middleware.iter().rev().fold(handler, |next, mw| mw.wrap(next))
        };

        let mut trees: HashMap<Method, MatchitRouter<BoxedHandler>> = HashMap::new();
        for (method, path, handler) in &self.routes {
            trees
                .entry(method.clone())
                .or_default()
                .insert(path.as_str(), chain(Arc::clone(handler)))
                .map_err(|source| Error::Route { path: path.clone(), source })?;
        }

        let error_handler: ErrorHandler = match self.error_handler {
            Some(handler) => handler,
            None => Arc::new(default_error_handler),
        };

        Ok(App {
            not_found: chain(boxed(not_found)),
            trees,
            logger: self.logger.unwrap_or_else(Logger::current),
            error_handler,
        })
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

fn not_found(_ctx: &mut dyn Context) -> BoxFuture<'_, Result<(), Error>> {
    Box::pin(async { Err(Error::http(StatusCode::NOT_FOUND, "Not Found")) })
}

// ── App ───────────────────────────────────────────────────────────────────────

/// A compiled router, shared by every connection.
pub(crate) struct App {
    trees: HashMap<Method, MatchitRouter<BoxedHandler>>,
    not_found: BoxedHandler,
    pub(crate) logger: Logger,
    pub(crate) error_handler: ErrorHandler,
}

impl App {
    /// The handler chain for a request, with its path parameters.
    ///
    /// Unmatched requests get the not-found chain, so middleware still sees them.
    pub(crate) fn lookup(&self, method: &Method, path: &str) -> (BoxedHandler, HashMap<String, String>) {
        let matched = self.trees.get(method).and_then(|tree| tree.at(path).ok());
        match matched {
            Some(m) => {
                let params = m.params.iter()
                    .map(|(k, v)| (k.to_owned(), v.to_owned()))
                    .collect();
                (Arc::clone(m.value), params)
            }
            None => (Arc::clone(&self.not_found), HashMap::new()),
        }
    }
}
