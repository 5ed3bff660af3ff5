use tracing::info;

use crate::context::Context;
use crate::middleware::{BoxFuture, Flow, Middleware, Next};

/// Logs every request as it enters the chain.
///
/// Completion (status and latency) is logged by the dispatcher once the
/// chain is done, so this only needs to see the way in.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestLog;

impl Middleware for RequestLog {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next) -> BoxFuture<'a, Flow> {
        info!(method = %ctx.method(), target = ctx.target(), "request received");
        Box::pin(std::future::ready(next.run()))
    }
}
