use http::StatusCode;
use serde_json::Value;
use tracing::warn;

use crate::config::Config;
use crate::context::Context;
use crate::error::Error;
use crate::middleware::{BoxFuture, Flow, Middleware, Next};

/// Body size accepted when no limit is configured: 1 MiB.
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Parses JSON request bodies into [`Context::body`].
///
/// Only `POST` and `PATCH` bodies are read; every other method passes
/// straight through. A body that is not valid JSON (an empty one included)
/// is answered with `400 { "error": "Invalid JSON" }`, one larger than the
/// limit with `413`. Stream failures go to the error terminal.
#[derive(Clone, Debug)]
pub struct JsonBody {
    limit: usize,
}

impl JsonBody {
    pub fn new() -> Self {
        Self { limit: DEFAULT_BODY_LIMIT }
    }

    pub fn with_limit(limit: usize) -> Self {
        Self { limit }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::with_limit(config.max_body_bytes)
    }
}

impl Default for JsonBody {
    fn default() -> Self { Self::new() }
}

impl Middleware for JsonBody {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next) -> BoxFuture<'a, Flow> {
        Box::pin(async move {
            if !ctx.method().has_body() {
                return next.run();
            }

            let bytes = match ctx.read_body_limited(self.limit).await {
                Ok(bytes) => bytes,
                Err(Error::PayloadTooLarge(limit)) => {
                    warn!(limit, path = ctx.path(), "request body too large");
                    return ctx.response().error(StatusCode::PAYLOAD_TOO_LARGE, "Payload too large");
                }
                Err(e) => return next.fail(e),
            };

            match serde_json::from_slice::<Value>(&bytes) {
                Ok(body) => {
                    ctx.set_body(body);
                    next.run()
                }
                Err(e) => {
                    warn!(path = ctx.path(), "error parsing JSON: {e}");
                    ctx.response().error(StatusCode::BAD_REQUEST, "Invalid JSON")
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::HeaderMap;
    use http_body_util::{BodyExt, Full, StreamBody};
    use hyper::body::Frame;

    use super::*;
    use crate::chain::run;
    use crate::method::Method;
    use crate::middleware::Step;

    fn ctx(method: Method, body: &'static str) -> Context {
        let body = Full::new(Bytes::from_static(body.as_bytes()))
            .map_err(Error::from)
            .boxed_unsync();
        Context::new(method, "/books".parse().unwrap(), HeaderMap::new(), body)
    }

    #[tokio::test]
    async fn test_parses_post_body() {
        let mut ctx = ctx(Method::Post, r#"{"title":"Dune","numofPages":412}"#);
        let flow = JsonBody::new().call(&mut ctx, Next::new()).await;

        assert!(matches!(flow.0, Step::Advance));
        assert_eq!(ctx.body().unwrap()["numofPages"], 412);
        assert!(!ctx.is_terminated());
    }

    #[tokio::test]
    async fn test_invalid_json_is_400() {
        let mut ctx = ctx(Method::Patch, "{not json");
        let flow = JsonBody::new().call(&mut ctx, Next::new()).await;

        assert!(matches!(flow.0, Step::Halt));
        assert!(ctx.body().is_none());
        let res = ctx.response();
        assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(&res.body()[..], br#"{"error":"Invalid JSON"}"#);
    }

    #[tokio::test]
    async fn test_oversize_body_is_413() {
        let mut ctx = ctx(Method::Post, r#"{"title":"a very long title indeed"}"#);
        let flow = JsonBody::with_limit(8).call(&mut ctx, Next::new()).await;

        assert!(matches!(flow.0, Step::Halt));
        assert_eq!(ctx.response().status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_get_is_not_read() {
        let mut ctx = ctx(Method::Get, "{not json");
        let flow = JsonBody::new().call(&mut ctx, Next::new()).await;

        assert!(matches!(flow.0, Step::Advance));
        assert!(ctx.body().is_none());
    }

    #[tokio::test]
    async fn test_stream_error_goes_to_error_terminal() {
        let frames: Vec<Result<Frame<Bytes>, Error>> = vec![
            Ok(Frame::data(Bytes::from_static(b"{\"title\""))),
            Err(Error::msg("connection reset")),
        ];
        let body = StreamBody::new(futures_util::stream::iter(frames)).boxed_unsync();
        let mut ctx = Context::new(Method::Post, "/books".parse().unwrap(), HeaderMap::new(), body);

        run(&mut ctx, &[JsonBody::new().into_boxed()]).await;

        let res = ctx.response();
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            &res.body()[..],
            br#"{"error":"Internal server error: connection reset"}"#
        );
    }
}
