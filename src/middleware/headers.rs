use http::header::{self, HeaderName, HeaderValue};

use crate::context::Context;
use crate::method::Method;
use crate::middleware::{BoxFuture, Flow, Middleware, Next};

/// Stages a fixed header on every response that passes through.
///
/// ```rust,no_run
/// use stacks::{Router, middleware::SetHeader};
///
/// let app = Router::new().global(SetHeader::new("x-powered-by", "stacks"));
/// ```
#[derive(Clone, Debug)]
pub struct SetHeader {
    name: HeaderName,
    value: HeaderValue,
}

impl SetHeader {
    /// # Panics
    ///
    /// Panics if `name` or `value` is not a valid header name / value. Both
    /// are meant to be literals fixed at startup.
    pub fn new(name: &'static str, value: &'static str) -> Self {
        Self {
            name: HeaderName::from_static(name),
            value: HeaderValue::from_static(value),
        }
    }

    pub fn from_parts(name: HeaderName, value: HeaderValue) -> Self {
        Self { name, value }
    }
}

impl Middleware for SetHeader {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next) -> BoxFuture<'a, Flow> {
        ctx.response().set_header(self.name.clone(), self.value.clone());
        Box::pin(std::future::ready(next.run()))
    }
}

/// Cross-origin headers for browser clients.
#[derive(Clone, Debug)]
pub struct Cors {
    origin: HeaderValue,
    methods: HeaderValue,
    headers: HeaderValue,
}

impl Cors {
    /// Allows any origin, every routable method, and the `content-type` and
    /// `authorization` request headers.
    pub fn any() -> Self {
        Self::with_origin(HeaderValue::from_static("*"))
    }

    pub fn with_origin(origin: HeaderValue) -> Self {
        let methods = Method::ALL.map(Method::as_str).join(", ");
        Self {
            origin,
            methods: HeaderValue::from_str(&methods).unwrap_or(HeaderValue::from_static("GET")),
            headers: HeaderValue::from_static("content-type, authorization"),
        }
    }
}

impl Middleware for Cors {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next) -> BoxFuture<'a, Flow> {
        ctx.response()
            .set_header(header::ACCESS_CONTROL_ALLOW_ORIGIN, self.origin.clone())
            .set_header(header::ACCESS_CONTROL_ALLOW_METHODS, self.methods.clone())
            .set_header(header::ACCESS_CONTROL_ALLOW_HEADERS, self.headers.clone());
        Box::pin(std::future::ready(next.run()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::Step;

    #[tokio::test]
    async fn test_set_header_stages_and_advances() {
        let mut ctx = Context::empty(Method::Get, "/".parse().unwrap());
        let flow = SetHeader::new("x-powered-by", "stacks")
            .call(&mut ctx, Next::new())
            .await;

        assert!(matches!(flow.0, Step::Advance));
        assert_eq!(ctx.response().headers()["x-powered-by"], "stacks");
    }

    #[tokio::test]
    async fn test_cors_headers() {
        let mut ctx = Context::empty(Method::Post, "/books".parse().unwrap());
        let _ = Cors::any().call(&mut ctx, Next::new()).await;

        let headers = ctx.response().headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_METHODS],
            "GET, POST, PATCH, DELETE"
        );
    }
}
