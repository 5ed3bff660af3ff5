//! Per-request state shared by every middleware in a chain.

use bytes::Bytes;
use http::{Extensions, HeaderMap, Uri};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, LengthLimitError, Limited};
use serde_json::Value;

use crate::error::Error;
use crate::method::Method;
use crate::response::Response;

/// Type-erased request body stream.
pub type Body = UnsyncBoxBody<Bytes, Error>;

/// Where the request body stream stands.
enum BodyState {
    Pending(Body),
    Read(Bytes),
    TooLarge(usize),
    Broken(String),
}

/// One request's mutable state plus its [`Response`] sink.
///
/// A context is created by the dispatcher after the method has been
/// validated, handed by `&mut` to each middleware in turn, and dropped with
/// the request future. It is never shared between requests.
pub struct Context {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    stream: BodyState,
    body: Option<Value>,
    extensions: Extensions,
    response: Response,
}

impl Context {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Body) -> Self {
        Self {
            method,
            uri,
            headers,
            stream: BodyState::Pending(body),
            body: None,
            extensions: Extensions::new(),
            response: Response::new(),
        }
    }

    /// A context with no headers and an empty body. Handy in tests.
    pub fn empty(method: Method, uri: Uri) -> Self {
        let body = Empty::<Bytes>::new().map_err(Error::from).boxed_unsync();
        Self::new(method, uri, HeaderMap::new(), body)
    }

    pub fn method(&self) -> Method { self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn headers(&self) -> &HeaderMap { &self.headers }

    /// Path without the query string. This is what routes match against.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Path and query exactly as the client sent them.
    pub fn target(&self) -> &str {
        self.uri
            .path_and_query()
            .map_or_else(|| self.uri.path(), |pq| pq.as_str())
    }

    /// Case-insensitive header lookup. `None` for missing or non-UTF-8 values.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// First value of a form-urlencoded query parameter, percent-decoded.
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    /// Collects the whole request body.
    ///
    /// The stream is drained on the first call; later calls return the same
    /// bytes, or the same failure if the first read failed.
    pub async fn read_body(&mut self) -> Result<Bytes, Error> {
        self.read_body_limited(usize::MAX).await
    }

    /// Like [`read_body`](Self::read_body) but fails with
    /// [`Error::PayloadTooLarge`] once more than `limit` bytes arrive.
    pub async fn read_body_limited(&mut self, limit: usize) -> Result<Bytes, Error> {
        let stream = match std::mem::replace(&mut self.stream, BodyState::Read(Bytes::new())) {
            BodyState::Pending(stream) => stream,
            BodyState::Read(raw) => {
                self.stream = BodyState::Read(raw.clone());
                return Ok(raw);
            }
            BodyState::TooLarge(limit) => {
                self.stream = BodyState::TooLarge(limit);
                return Err(Error::PayloadTooLarge(limit));
            }
            BodyState::Broken(reason) => {
                let err = Error::msg(format!("request body unavailable: {reason}"));
                self.stream = BodyState::Broken(reason);
                return Err(err);
            }
        };

        match Limited::new(stream, limit).collect().await {
            Ok(collected) => {
                let bytes = collected.to_bytes();
                self.stream = BodyState::Read(bytes.clone());
                Ok(bytes)
            }
            Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                self.stream = BodyState::TooLarge(limit);
                Err(Error::PayloadTooLarge(limit))
            }
            Err(e) => {
                let err = match e.downcast::<Error>() {
                    Ok(inner) => *inner,
                    Err(other) => Error::Other(other),
                };
                self.stream = BodyState::Broken(err.to_string());
                Err(err)
            }
        }
    }

    /// The parsed body, once a body-parsing middleware has set it.
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn body_mut(&mut self) -> Option<&mut Value> {
        self.body.as_mut()
    }

    pub fn set_body(&mut self, body: Value) {
        self.body = Some(body);
    }

    /// Typed per-request fields (authenticated user, validated payloads, ...).
    pub fn extensions(&self) -> &Extensions { &self.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.extensions }

    pub fn response(&mut self) -> &mut Response {
        &mut self.response
    }

    pub fn is_terminated(&self) -> bool {
        self.response.is_terminated()
    }

    pub(crate) fn into_response(self) -> Response {
        self.response
    }
}
