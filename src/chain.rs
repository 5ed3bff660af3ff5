//! Chain executor.
//!
//! Runs a resolved sequence of middleware one step at a time. Each step gets
//! a fresh [`Next`]; what it returns decides whether the index advances, the
//! chain stops, or control jumps to the error terminal. The loop never
//! recurses, and a step can only be reached through the previous step's
//! `Flow`, so one request's chain is strictly sequential even though other
//! requests interleave freely at every `.await`.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use http::StatusCode;
use tracing::{debug, error, warn};

use crate::context::Context;
use crate::error::Error;
use crate::middleware::{BoxedMiddleware, Next, Step};

/// The effective chain of one request: global entries followed by the
/// route's own steps, indexed as if concatenated.
#[derive(Clone, Copy)]
pub(crate) struct Chain<'a> {
    global: &'a [BoxedMiddleware],
    route: &'a [BoxedMiddleware],
}

impl<'a> Chain<'a> {
    pub(crate) fn new(global: &'a [BoxedMiddleware], route: &'a [BoxedMiddleware]) -> Self {
        Self { global, route }
    }

    fn get(&self, index: usize) -> Option<&'a BoxedMiddleware> {
        match index.checked_sub(self.global.len()) {
            None => self.global.get(index),
            Some(i) => self.route.get(i),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.global.len() + self.route.len()
    }
}

/// Runs `chain` against `ctx` until the response is ended, the chain fails,
/// or it runs out (404).
pub async fn run(ctx: &mut Context, chain: &[BoxedMiddleware]) {
    execute(ctx, Chain::new(chain, &[])).await;
}

pub(crate) async fn execute(ctx: &mut Context, chain: Chain<'_>) {
    debug!(steps = chain.len(), path = ctx.path(), "running chain");
    let mut index = 0;

    while let Some(middleware) = chain.get(index) {
        let outcome = AssertUnwindSafe(async { middleware.call(&mut *ctx, Next::new()).await })
            .catch_unwind()
            .await;

        let step = match outcome {
            Ok(flow) => flow.0,
            Err(panic) => Step::Fail(Error::Panic(panic_message(panic.as_ref()))),
        };

        match step {
            Step::Advance if ctx.is_terminated() => {
                warn!(index, path = ctx.path(), "middleware advanced after ending the response");
                return;
            }
            Step::Advance => index += 1,
            Step::Halt => return,
            Step::Fail(err) => return fail(ctx, err),
        }
    }

    not_found(ctx);
}

/// Success terminal: the chain ran out without anyone answering.
fn not_found(ctx: &mut Context) {
    if ctx.is_terminated() {
        return;
    }
    debug!(method = %ctx.method(), path = ctx.path(), "no middleware answered");
    let _ = ctx.response().error(StatusCode::NOT_FOUND, "Not Found");
}

/// Error terminal: answers 500 unless the response already went out, in
/// which case the error is only logged.
fn fail(ctx: &mut Context, err: Error) {
    if ctx.is_terminated() {
        warn!(path = ctx.path(), "discarding error raised after the response ended: {err}");
        return;
    }
    error!(method = %ctx.method(), path = ctx.path(), "middleware failed: {err}");
    let _ = ctx.response().error(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Internal server error: {err}"),
    );
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}
