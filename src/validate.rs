//! Payload validation.
//!
//! An entity describes its accepted shape by implementing [`Validate`]. The
//! generic [`Validated`] middleware runs that check against the body parsed
//! by [`JsonBody`](crate::middleware::JsonBody) and, on success, stores the
//! typed value in the context's extensions for the next step:
//!
//! ```rust,no_run
//! use serde::Deserialize;
//! use stacks::validate::{self, Validate, ValidationError};
//! use stacks::{Router, middleware::JsonBody};
//!
//! #[derive(Clone, Deserialize)]
//! struct NewMember { name: String }
//!
//! impl Validate for NewMember {
//!     fn validate(payload: &serde_json::Value) -> Result<Self, ValidationError> {
//!         validate::from_json(payload)
//!     }
//! }
//!
//! let app = Router::new()
//!     .global(JsonBody::new())
//!     .post("/members", validate::validated::<NewMember>());
//! ```

use std::marker::PhantomData;

use http::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::context::Context;
use crate::middleware::{BoxFuture, Flow, Middleware, Next};

/// Why a payload was rejected. Its message becomes the `400` body.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// An entity that can be checked and converted from a JSON payload.
pub trait Validate: Clone + Send + Sync + Sized + 'static {
    fn validate(payload: &Value) -> Result<Self, ValidationError>;
}

/// Deserializes `payload` into `T`, reporting serde's complaint on failure.
pub fn from_json<T: DeserializeOwned>(payload: &Value) -> Result<T, ValidationError> {
    T::deserialize(payload).map_err(|e| ValidationError::new(e.to_string()))
}

/// Middleware that validates the parsed body as `T`. See the module docs.
pub struct Validated<T> {
    _entity: PhantomData<fn() -> T>,
}

pub fn validated<T: Validate>() -> Validated<T> {
    Validated { _entity: PhantomData }
}

impl<T: Validate> Middleware for Validated<T> {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next) -> BoxFuture<'a, Flow> {
        let result = match ctx.body() {
            Some(payload) => T::validate(payload),
            None => Err(ValidationError::new("Request body is required")),
        };

        let flow = match result {
            Ok(entity) => {
                ctx.extensions_mut().insert(entity);
                next.run()
            }
            Err(e) => {
                debug!(path = ctx.path(), "validation failed: {e}");
                ctx.response().error(StatusCode::BAD_REQUEST, e)
            }
        };
        Box::pin(std::future::ready(flow))
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::method::Method;
    use crate::middleware::Step;

    #[derive(Clone, Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Loan {
        book_id: u32,
        days: u16,
    }

    impl Validate for Loan {
        fn validate(payload: &Value) -> Result<Self, ValidationError> {
            let loan: Loan = from_json(payload)?;
            if loan.days == 0 {
                return Err(ValidationError::new("days must be at least 1"));
            }
            Ok(loan)
        }
    }

    async fn run(body: Option<Value>) -> (Context, Flow) {
        let mut ctx = Context::empty(Method::Post, "/loans".parse().unwrap());
        if let Some(body) = body {
            ctx.set_body(body);
        }
        let flow = validated::<Loan>().call(&mut ctx, Next::new()).await;
        (ctx, flow)
    }

    #[tokio::test]
    async fn test_valid_payload_is_stored() {
        let (ctx, flow) = run(Some(json!({ "bookId": 3, "days": 14 }))).await;

        assert!(matches!(flow.0, Step::Advance));
        assert_eq!(ctx.extensions().get::<Loan>(), Some(&Loan { book_id: 3, days: 14 }));
    }

    #[tokio::test]
    async fn test_wrong_type_is_400() {
        let (mut ctx, flow) = run(Some(json!({ "bookId": "three", "days": 14 }))).await;

        assert!(matches!(flow.0, Step::Halt));
        assert_eq!(ctx.response().status_code(), StatusCode::BAD_REQUEST);
        assert!(ctx.extensions().get::<Loan>().is_none());
    }

    #[tokio::test]
    async fn test_rule_violation_message() {
        let (mut ctx, _) = run(Some(json!({ "bookId": 3, "days": 0 }))).await;

        let body: Value = serde_json::from_slice(ctx.response().body()).unwrap();
        assert_eq!(body, json!({ "error": "days must be at least 1" }));
    }

    #[tokio::test]
    async fn test_missing_body_is_400() {
        let (mut ctx, _) = run(None).await;

        let body: Value = serde_json::from_slice(ctx.response().body()).unwrap();
        assert_eq!(body, json!({ "error": "Request body is required" }));
    }
}
