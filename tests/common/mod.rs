//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use stacks::validate::{self, Validate, ValidationError};
use stacks::middleware::{Middleware, from_fn};
use stacks::{BoxedMiddleware, Error, StatusCode};

/// Order-recording side effect shared by the steps of a chain.
#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<&'static str>>>);

impl Log {
    pub fn push(&self, name: &'static str) {
        self.0.lock().unwrap().push(name);
    }

    pub fn take(&self) -> Vec<&'static str> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

/// A step that records `name` and advances.
pub fn recorder(log: &Log, name: &'static str) -> BoxedMiddleware {
    let log = log.clone();
    from_fn(move |_ctx, next| {
        log.push(name);
        Box::pin(async move { next.run() })
    })
    .into_boxed()
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub title: String,
    pub author: String,
    pub isbn_no: String,
    pub numof_pages: u32,
    pub total_number_of_copies: u32,
}

impl Validate for Book {
    fn validate(payload: &Value) -> Result<Self, ValidationError> {
        let book: Book = validate::from_json(payload)?;
        if book.title.trim().is_empty() {
            return Err(ValidationError::new("title must not be empty"));
        }
        Ok(book)
    }
}

/// Terminal step for `POST /books`: answers 201 with the stored book.
pub fn create_book(log: &Log) -> BoxedMiddleware {
    let log = log.clone();
    let ids = Arc::new(AtomicU32::new(1));
    from_fn(move |ctx, next| {
        log.push("create");
        let id = ids.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            let Some(book) = ctx.extensions().get::<Book>().cloned() else {
                return next.fail(Error::msg("validated book missing"));
            };
            let mut created = serde_json::to_value(&book).unwrap_or(Value::Null);
            created["id"] = id.into();
            created["availableNumberOfCopies"] = book.total_number_of_copies.into();
            ctx.response().json(StatusCode::CREATED, &created)
        })
    })
    .into_boxed()
}
