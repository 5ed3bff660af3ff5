//! Request dispatch.
//!
//! One inbound request goes through four steps:
//!
//! 1. the method is checked against the routable set, `405` otherwise,
//!    before any middleware (global ones included) sees the request;
//! 2. the route chain is looked up by method and exact path;
//! 3. the effective chain is the global list followed by the route chain;
//! 4. the executor runs it and the finished [`Response`] is converted for
//!    hyper.
//!
//! Nothing here returns an error: every outcome is an HTTP response.

use std::time::Instant;

use bytes::Bytes;
use http::header::{self, HeaderValue};
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Body as HttpBody;
use tracing::{debug, error};

use crate::chain::{self, Chain};
use crate::context::Context;
use crate::error::Error;
use crate::method::Method;
use crate::middleware::BoxedMiddleware;
use crate::response::Response;
use crate::router::RouteTable;

/// The frozen application: global middleware plus the route table.
///
/// Built by [`Router::build`](crate::Router::build). Share it behind an
/// [`Arc`](std::sync::Arc); every method takes `&self`.
pub struct Dispatcher {
    global: Box<[BoxedMiddleware]>,
    routes: RouteTable,
}

impl Dispatcher {
    pub(crate) fn new(global: Box<[BoxedMiddleware]>, routes: RouteTable) -> Self {
        Self { global, routes }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn global(&self) -> &[BoxedMiddleware] {
        &self.global
    }

    /// Turns one hyper-level request into one response.
    pub async fn dispatch<B>(&self, req: http::Request<B>) -> http::Response<Full<Bytes>>
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<Error>,
    {
        let started = Instant::now();
        let method = match req.method().as_str().parse::<Method>() {
            Ok(method) => method,
            Err(e) => {
                debug!(method = %req.method(), path = req.uri().path(), "rejected method");
                return method_not_allowed(e).into_http();
            }
        };

        let (parts, body) = req.into_parts();
        let body = body.map_err(Into::into).boxed_unsync();
        let mut ctx = Context::new(method, parts.uri, parts.headers, body);

        self.handle(&mut ctx).await;

        let path = ctx.path().to_owned();
        let response = ctx.into_response();
        if !response.is_terminated() {
            error!(%method, path, "chain finished without a response");
        }
        debug!(
            %method,
            path,
            status = response.status_code().as_u16(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "request completed"
        );
        response.into_http()
    }

    /// Runs the effective chain for an already-validated context.
    pub async fn handle(&self, ctx: &mut Context) {
        let route = self.routes.resolve(ctx.method(), ctx.path());
        chain::execute(ctx, Chain::new(&self.global, route)).await;
    }
}

fn method_not_allowed(err: impl std::fmt::Display) -> Response {
    let allow = Method::ALL.map(Method::as_str).join(", ");
    let mut response = Response::new();
    if let Ok(allow) = HeaderValue::from_str(&allow) {
        response.set_header(header::ALLOW, allow);
    }
    let _ = response.error(StatusCode::METHOD_NOT_ALLOWED, err);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Router;

    #[tokio::test]
    async fn test_put_is_405_with_allow() {
        let app = Router::new().build();
        let req = http::Request::put("/books").body(Full::new(Bytes::new())).unwrap();

        let res = app.dispatch(req).await;

        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.headers()[header::ALLOW], "GET, POST, PATCH, DELETE");
        let body = res.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], br#"{"error":"Method PUT not allowed"}"#);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = Router::new().build();
        let req = http::Request::get("/nowhere").body(Full::new(Bytes::new())).unwrap();

        let res = app.dispatch(req).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
