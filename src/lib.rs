//! # stacks
//!
//! A small HTTP dispatch core: an exact-match route table, an ordered list
//! of global middleware, and an executor that walks the resulting chain one
//! step at a time.
//!
//! ## The contract
//!
//! - Routes are keyed by method and **exact** path. `GET`, `POST`, `PATCH`
//!   and `DELETE` only; anything else is `405` before any middleware runs.
//! - Global middleware always run before route middleware, in registration
//!   order.
//! - Each middleware gets a one-shot [`Next`]. It either calls `next.run()`,
//!   calls `next.fail(err)`, or ends the response. Running off the end of the
//!   chain is `404`; a failure or a panic is `500`.
//! - A response is sent once. Late writes are ignored and reported.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use stacks::middleware::{from_fn, Cors, JsonBody, RequestLog};
//! use stacks::{Router, Server, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), stacks::Error> {
//!     let app = Router::new()
//!         .global(RequestLog)
//!         .global(Cors::any())
//!         .global(JsonBody::new())
//!         .get("/books", from_fn(|ctx, _next| Box::pin(async move {
//!             ctx.response().json(StatusCode::OK, &serde_json::json!([]))
//!         })))
//!         .post("/books", from_fn(|ctx, next| Box::pin(async move {
//!             match ctx.body().cloned() {
//!                 Some(book) => ctx.response().json(StatusCode::CREATED, &book),
//!                 None => next.fail(stacks::Error::msg("body parser did not run")),
//!             }
//!         })));
//!
//!     Server::bind(([0, 0, 0, 0], 3000).into()).serve(app).await
//! }
//! ```

mod chain;
mod context;
mod dispatch;
mod error;
mod method;
mod response;
mod router;
mod server;

pub mod config;
pub mod middleware;
pub mod validate;

pub use chain::run;
pub use config::Config;
pub use context::{Body, Context};
pub use dispatch::Dispatcher;
pub use error::{BoxError, Error};
pub use http::StatusCode;
pub use method::{Method, UnsupportedMethod};
pub use middleware::{BoxedMiddleware, Flow, Middleware, Next};
pub use response::{Response, WriteViolations};
pub use router::{RouteTable, Router};
pub use server::{Server, shutdown_signal};
