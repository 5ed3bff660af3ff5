//! Route table and its builder.
//!
//! A [`Router`] collects global middleware and per-route chains at startup.
//! [`Router::build`] freezes it into a [`Dispatcher`] whose tables never
//! change again, so every connection task can read them without locking.
//!
//! Paths match exactly: `/books` and `/books/` are different routes, and
//! there are no parameter segments. Registering the same method and path
//! twice appends to the existing chain instead of replacing it.

use std::collections::HashMap;

use tracing::debug;

use crate::dispatch::Dispatcher;
use crate::method::Method;
use crate::middleware::{BoxedMiddleware, Middleware, Scoped};

/// The application router.
///
/// ```rust,no_run
/// use stacks::{Router, middleware::{Cors, JsonBody}};
/// # use stacks::middleware::{from_fn, Middleware};
/// # let validate_book = from_fn(|_c, n| Box::pin(async move { n.run() }));
/// # let create_book = from_fn(|_c, n| Box::pin(async move { n.run() }));
///
/// let app = Router::new()
///     .global(Cors::any())
///     .global(JsonBody::new())
///     .route(stacks::Method::Post, "/books", [validate_book.into_boxed(), create_book.into_boxed()])
///     .build();
/// ```
#[derive(Default)]
pub struct Router {
    global: Vec<BoxedMiddleware>,
    routes: HashMap<Method, HashMap<String, Vec<BoxedMiddleware>>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a middleware that runs for every request, before any route
    /// middleware.
    pub fn global(mut self, middleware: impl Middleware) -> Self {
        self.global.push(middleware.into_boxed());
        self
    }

    /// Appends a global middleware that only runs when the request target
    /// (path and query) contains `needle`. For other requests the slot
    /// passes straight to the next step.
    pub fn global_scoped(mut self, needle: &str, middleware: impl Middleware) -> Self {
        let scoped = Scoped::new(needle, middleware.into_boxed());
        self.global.push(scoped.into_boxed());
        self
    }

    /// Appends `chain` to the route for `method` and `path`.
    pub fn route<I>(mut self, method: Method, path: &str, chain: I) -> Self
    where
        I: IntoIterator<Item = BoxedMiddleware>,
    {
        let steps = self
            .routes
            .entry(method)
            .or_default()
            .entry(path.to_owned())
            .or_default();
        steps.extend(chain);
        debug!(%method, path, len = steps.len(), "route registered");
        self
    }

    /// Appends one middleware to the route for `method` and `path`.
    pub fn on(self, method: Method, path: &str, middleware: impl Middleware) -> Self {
        self.route(method, path, [middleware.into_boxed()])
    }

    pub fn get(self, path: &str, middleware: impl Middleware) -> Self {
        self.on(Method::Get, path, middleware)
    }

    pub fn post(self, path: &str, middleware: impl Middleware) -> Self {
        self.on(Method::Post, path, middleware)
    }

    pub fn patch(self, path: &str, middleware: impl Middleware) -> Self {
        self.on(Method::Patch, path, middleware)
    }

    pub fn delete(self, path: &str, middleware: impl Middleware) -> Self {
        self.on(Method::Delete, path, middleware)
    }

    /// Freezes the registrations into an immutable [`Dispatcher`].
    pub fn build(self) -> Dispatcher {
        let routes = self
            .routes
            .into_iter()
            .map(|(method, paths)| {
                let paths = paths
                    .into_iter()
                    .map(|(path, chain)| (path, chain.into_boxed_slice()))
                    .collect();
                (method, paths)
            })
            .collect();

        Dispatcher::new(
            self.global.into_boxed_slice(),
            RouteTable { routes },
        )
    }
}

/// Frozen (method, exact path) → middleware lookup.
pub struct RouteTable {
    routes: HashMap<Method, HashMap<String, Box<[BoxedMiddleware]>>>,
}

impl RouteTable {
    /// The chain registered for `method` and `path`, in registration order.
    /// Empty when nothing matches.
    pub fn resolve(&self, method: Method, path: &str) -> &[BoxedMiddleware] {
        self.routes
            .get(&method)
            .and_then(|paths| paths.get(path))
            .map(|chain| &chain[..])
            .unwrap_or(&[])
    }

    /// Number of distinct (method, path) keys.
    pub fn len(&self) -> usize {
        self.routes.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::middleware::{RequestLog, from_fn};

    fn pass() -> BoxedMiddleware {
        from_fn(|_ctx, next| Box::pin(async move { next.run() })).into_boxed()
    }

    #[test]
    fn test_resolve_exact_match() {
        let (a, b) = (pass(), pass());
        let app = Router::new()
            .route(Method::Get, "/books", [Arc::clone(&a), Arc::clone(&b)])
            .build();
        let table = app.routes();

        let chain = table.resolve(Method::Get, "/books");
        assert_eq!(chain.len(), 2);
        assert!(Arc::ptr_eq(&chain[0], &a));
        assert!(Arc::ptr_eq(&chain[1], &b));

        assert!(table.resolve(Method::Post, "/books").is_empty());
        assert!(table.resolve(Method::Get, "/books/").is_empty());
        assert!(table.resolve(Method::Get, "/Books").is_empty());
        assert!(table.resolve(Method::Get, "/").is_empty());
    }

    #[test]
    fn test_duplicate_registration_appends() {
        let (first, second, third) = (pass(), pass(), pass());
        let app = Router::new()
            .on(Method::Post, "/books", Arc::clone(&first))
            .get("/books", pass())
            .route(Method::Post, "/books", [Arc::clone(&second), Arc::clone(&third)])
            .build();

        let chain = app.routes().resolve(Method::Post, "/books");
        assert_eq!(chain.len(), 3);
        assert!(Arc::ptr_eq(&chain[0], &first));
        assert!(Arc::ptr_eq(&chain[1], &second));
        assert!(Arc::ptr_eq(&chain[2], &third));
        assert_eq!(app.routes().len(), 2);
    }

    #[test]
    fn test_methods_are_separate_keys() {
        let app = Router::new()
            .get("/books", pass())
            .post("/books", pass())
            .patch("/books", pass())
            .delete("/books", pass())
            .build();

        for method in Method::ALL {
            assert_eq!(app.routes().resolve(method, "/books").len(), 1);
        }
        assert_eq!(app.routes().len(), 4);
    }

    #[test]
    fn test_globals_keep_registration_order() {
        let (g1, g2) = (pass(), pass());
        let app = Router::new()
            .global(Arc::clone(&g1))
            .global_scoped("books", RequestLog)
            .global(Arc::clone(&g2))
            .build();

        let global = app.global();
        assert_eq!(global.len(), 3);
        assert!(Arc::ptr_eq(&global[0], &g1));
        assert!(Arc::ptr_eq(&global[2], &g2));
        assert!(app.routes().is_empty());
    }
}
