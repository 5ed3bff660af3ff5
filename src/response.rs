//! The outbound response sink.
//!
//! A [`Response`] lives inside the request's [`Context`](crate::Context).
//! Middleware write to it; the dispatcher turns it into a hyper response once
//! the chain is done. It can be ended exactly once. Every write that arrives
//! after that is dropped, logged at `error` level, and counted so tests can
//! assert that nothing tried to send twice.

use bytes::Bytes;
use http::header::{self, HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use serde::Serialize;
use tracing::error;

use crate::middleware::{Flow, Step};

const JSON: HeaderValue = HeaderValue::from_static("application/json");
const TEXT: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");

/// Number of writes a response rejected because it had already ended.
///
/// Attached to the [`http::Response`] extensions produced by
/// [`Dispatcher::dispatch`](crate::Dispatcher::dispatch) when non-zero.
/// Extensions never reach the wire.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WriteViolations(pub usize);

/// Single-write response sink.
///
/// Defaults to `200 OK` with no headers and an empty body, which is what
/// [`end`](Self::end) sends when nothing was staged before it.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    terminated: bool,
    violations: usize,
}

impl Response {
    pub(crate) fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            terminated: false,
            violations: 0,
        }
    }

    /// Stages a header. Replaces any earlier value with the same name.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) -> &mut Self {
        if self.reject("set_header") {
            return self;
        }
        self.headers.insert(name, value);
        self
    }

    /// Stages the status line and merges `headers` into the staged headers.
    ///
    /// Does not end the response; calling it again before [`end`](Self::end)
    /// overrides the status.
    pub fn write_head<I>(&mut self, status: StatusCode, headers: I) -> &mut Self
    where
        I: IntoIterator<Item = (HeaderName, HeaderValue)>,
    {
        if self.reject("write_head") {
            return self;
        }
        self.status = status;
        for (name, value) in headers {
            self.headers.insert(name, value);
        }
        self
    }

    /// Finalizes the response with `payload` as its body.
    ///
    /// Returns the [`Flow`] that tells the executor this request is answered.
    pub fn end(&mut self, payload: impl Into<Bytes>) -> Flow {
        if !self.reject("end") {
            self.body = payload.into();
            self.terminated = true;
        }
        Flow(Step::Halt)
    }

    /// Ends with `value` serialized as JSON.
    pub fn json<T: Serialize + ?Sized>(&mut self, status: StatusCode, value: &T) -> Flow {
        match serde_json::to_vec(value) {
            Ok(body) => self.write_head(status, [(header::CONTENT_TYPE, JSON)]).end(body),
            Err(e) => {
                error!("failed to serialize response body: {e}");
                self.error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Internal server error: {e}"),
                )
            }
        }
    }

    /// Ends with a plain-text body.
    pub fn text(&mut self, status: StatusCode, body: impl Into<String>) -> Flow {
        self.write_head(status, [(header::CONTENT_TYPE, TEXT)])
            .end(body.into())
    }

    /// Ends with the standard error shape: `{ "error": "<message>" }`.
    pub fn error(&mut self, status: StatusCode, message: impl std::fmt::Display) -> Flow {
        let body = serde_json::json!({ "error": message.to_string() });
        self.write_head(status, [(header::CONTENT_TYPE, JSON)])
            .end(body.to_string())
    }

    /// Ends with no body.
    pub fn status(&mut self, status: StatusCode) -> Flow {
        self.write_head(status, []).end(Bytes::new())
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Writes rejected because the response had already ended.
    pub fn violations(&self) -> usize {
        self.violations
    }

    /// Staged (or, once ended, final) status.
    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    fn reject(&mut self, op: &'static str) -> bool {
        if self.terminated {
            self.violations += 1;
            error!(op, status = %self.status, "write after response ended, ignoring");
        }
        self.terminated
    }

    pub(crate) fn into_http(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(self.body));
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        if self.violations > 0 {
            res.extensions_mut().insert(WriteViolations(self.violations));
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_terminates_once() {
        let mut res = Response::new();
        assert!(!res.is_terminated());

        let _ = res.text(StatusCode::CREATED, "first");
        assert!(res.is_terminated());

        let _ = res.end("second");
        let _ = res.write_head(StatusCode::IM_A_TEAPOT, []);
        res.set_header(header::SERVER, HeaderValue::from_static("late"));

        assert_eq!(res.violations(), 3);
        assert_eq!(res.status_code(), StatusCode::CREATED);
        assert_eq!(res.body(), &Bytes::from_static(b"first"));
        assert!(res.headers().get(header::SERVER).is_none());
    }

    #[test]
    fn test_write_head_merges_headers() {
        let mut res = Response::new();
        res.set_header(
            HeaderName::from_static("x-powered-by"),
            HeaderValue::from_static("stacks"),
        );
        res.write_head(StatusCode::ACCEPTED, [(header::CONTENT_TYPE, TEXT)]);

        assert!(!res.is_terminated());
        assert_eq!(res.status_code(), StatusCode::ACCEPTED);
        assert_eq!(res.headers()["x-powered-by"], "stacks");
        assert_eq!(res.headers()[header::CONTENT_TYPE], TEXT);
    }

    #[test]
    fn test_error_shape() {
        let mut res = Response::new();
        let _ = res.error(StatusCode::BAD_REQUEST, "Invalid JSON");

        let body: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body, serde_json::json!({ "error": "Invalid JSON" }));
        assert_eq!(res.headers()[header::CONTENT_TYPE], JSON);
    }

    #[test]
    fn test_end_without_head_defaults_to_ok() {
        let mut res = Response::new();
        let _ = res.end("plain");
        let http = res.into_http();
        assert_eq!(http.status(), StatusCode::OK);
        assert!(http.extensions().get::<WriteViolations>().is_none());
    }

    #[test]
    fn test_violations_reach_http_extensions() {
        let mut res = Response::new();
        let _ = res.status(StatusCode::NO_CONTENT);
        let _ = res.status(StatusCode::OK);

        let http = res.into_http();
        assert_eq!(http.status(), StatusCode::NO_CONTENT);
        assert_eq!(http.extensions().get::<WriteViolations>(), Some(&WriteViolations(1)));
    }
}
