//! Middleware trait, the `next` continuation, and type erasure.
//!
//! # How a step hands control on
//!
//! Every middleware receives the request's [`Context`] and a [`Next`] token.
//! `Next` is move-only: the only ways to produce the [`Flow`] a middleware
//! must return are
//!
//! ```text
//! next.run()                 ← advance to the following step
//! next.fail(err)             ← skip everything, answer 500
//! ctx.response().end(..)     ← the response is finished, stop here
//! ```
//!
//! Because `run` and `fail` consume the token, the compiler rules out calling
//! the continuation twice. The executor looks at the returned `Flow` and
//! decides what runs next; nothing recurses, so a long chain does not grow
//! the stack.
//!
//! # How middleware are stored
//!
//! Routes hold middleware of different concrete types in one table, so each
//! step is erased to `Arc<dyn Middleware>`:
//!
//! ```text
//! JsonBody::new()                       ← concrete type
//!        ↓ router.post("/books", ..)
//! Arc::new(JsonBody { .. })             ← BoxedMiddleware
//!        ↓ at request time
//! middleware.call(&mut ctx, next)       ← one vtable dispatch
//!        ↓
//! Pin<Box<dyn Future<Output = Flow>>>   ← BoxFuture borrowing ctx
//! ```
//!
//! Closures go through [`from_fn`], which pins down the higher-ranked
//! signature so the returned future may borrow the context:
//!
//! ```rust,no_run
//! use stacks::{Router, StatusCode, middleware::from_fn};
//!
//! let app = Router::new().get("/ping", from_fn(|ctx, _next| {
//!     Box::pin(async move { ctx.response().text(StatusCode::OK, "pong") })
//! }));
//! ```

mod headers;
mod json;
mod trace;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::error::Error;

pub use headers::{Cors, SetHeader};
pub use json::{DEFAULT_BODY_LIMIT, JsonBody};
pub use trace::RequestLog;

/// A heap-allocated, type-erased future borrowing the request context.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A type-erased middleware shared by every request that routes through it.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// One step of a request chain.
pub trait Middleware: Send + Sync + 'static {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next) -> BoxFuture<'a, Flow>;

    fn into_boxed(self) -> BoxedMiddleware
    where
        Self: Sized,
    {
        Arc::new(self)
    }
}

impl Middleware for BoxedMiddleware {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next) -> BoxFuture<'a, Flow> {
        (**self).call(ctx, next)
    }

    fn into_boxed(self) -> BoxedMiddleware {
        self
    }
}

/// What a middleware decided. Only obtainable through [`Next`] or by ending
/// the response.
#[derive(Debug)]
#[must_use = "return the Flow from the middleware so the executor can act on it"]
pub struct Flow(pub(crate) Step);

#[derive(Debug)]
pub(crate) enum Step {
    Advance,
    Fail(Error),
    Halt,
}

/// The continuation handed to each middleware. Usable once.
#[derive(Debug)]
pub struct Next {
    _private: (),
}

impl Next {
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }

    /// Pass control to the following step, or to the 404 terminal if this
    /// was the last one.
    pub fn run(self) -> Flow {
        Flow(Step::Advance)
    }

    /// Skip the rest of the chain and answer with a 500 carrying `err`.
    pub fn fail(self, err: impl Into<Error>) -> Flow {
        Flow(Step::Fail(err.into()))
    }
}

// ── Closures ──────────────────────────────────────────────────────────────────

/// Middleware built from a closure or function. See [`from_fn`].
pub struct FromFn<F>(F);

/// Wraps a closure or `fn` as a [`Middleware`].
///
/// ```rust,no_run
/// use stacks::middleware::{from_fn, BoxFuture, Flow, Next};
/// use stacks::Context;
///
/// fn stamp(ctx: &mut Context, next: Next) -> BoxFuture<'_, Flow> {
///     Box::pin(async move {
///         ctx.extensions_mut().insert(42u32);
///         next.run()
///     })
/// }
///
/// let stamp = from_fn(stamp);
/// ```
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: for<'a> Fn(&'a mut Context, Next) -> BoxFuture<'a, Flow> + Send + Sync + 'static,
{
    FromFn(f)
}

impl<F> Middleware for FromFn<F>
where
    F: for<'a> Fn(&'a mut Context, Next) -> BoxFuture<'a, Flow> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next) -> BoxFuture<'a, Flow> {
        (self.0)(ctx, next)
    }
}

// ── Path-scoped global entries ────────────────────────────────────────────────

/// Runs `inner` only when the request target contains `needle`; otherwise
/// advances without touching the context.
pub(crate) struct Scoped {
    needle: String,
    inner: BoxedMiddleware,
}

impl Scoped {
    pub(crate) fn new(needle: &str, inner: BoxedMiddleware) -> Self {
        Self { needle: needle.to_owned(), inner }
    }
}

impl Middleware for Scoped {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next) -> BoxFuture<'a, Flow> {
        if ctx.target().contains(self.needle.as_str()) {
            self.inner.call(ctx, next)
        } else {
            Box::pin(std::future::ready(next.run()))
        }
    }
}
