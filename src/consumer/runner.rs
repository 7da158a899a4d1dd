// src/consumer/runner.rs

//! Receive loops.
//!
//! Glue between a [`Receiver`](crate::Receiver) and a consumer handler. Each
//! configured consumer instance runs one loop that:
//! - waits for the next envelope (or a stop signal)
//! - dispatches it to the handler
//! - sends the handler's response back when the envelope is a request
//!
//! Handler errors are best-effort failures: they are logged (and reported to
//! the requester for request envelopes) but never terminate the loop. The loop
//! ends when the receiver closes or the consumer is stopped; a handler that is
//! already running is allowed to finish.

use super::BoxedHandler;
use crate::{Endpoint, Envelope, ReceiverPtr, Result, SerializerPtr};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Outbound path for responses produced by request handlers.
#[async_trait::async_trait]
pub(crate) trait ReplySink: Send + Sync {
    async fn reply(&self, to: &Endpoint, env: Envelope) -> Result<()>;
}

/// Shared state every receive loop of a transport needs.
pub(crate) struct DispatchContext {
    // ---
    pub bus_name: Arc<str>,
    pub serializer: SerializerPtr,
    pub replies: Arc<dyn ReplySink>,
}

/// Spawn one receive loop for `receiver`.
pub(crate) fn spawn_loop(
    ctx: Arc<DispatchContext>,
    receiver: ReceiverPtr,
    handler: BoxedHandler,
    stop: CancellationToken,
    instance: usize,
) -> JoinHandle<()> {
    // ---
    tokio::spawn(async move {
        let source = receiver.source().clone();
        crate::log_debug!("{}: consumer #{instance} started on {source}", ctx.bus_name);

        loop {
            let env = tokio::select! {
                _ = stop.cancelled() => break,
                env = receiver.receive() => match env {
                    Some(env) => env,
                    None => {
                        crate::log_debug!("{}: receiver for {source} closed", ctx.bus_name);
                        break;
                    }
                },
            };

            dispatch(&ctx, &handler, env).await;
        }

        crate::log_debug!("{}: consumer #{instance} stopped on {source}", ctx.bus_name);
    })
}

/// Run the handler for one envelope and send the reply, if any.
async fn dispatch(ctx: &DispatchContext, handler: &BoxedHandler, env: Envelope) {
    // ---
    let reply = env.reply_to.clone().zip(env.correlation_id.clone());
    let path = env.path.clone();

    let outcome = handler(env, ctx.serializer.clone()).await;

    let response = match (outcome, reply) {
        (Ok(Some(payload)), Some((to, correlation_id))) => {
            (to.clone(), Envelope::response(to.path, payload, correlation_id))
        }
        (Ok(_), _) => return,
        (Err(err), Some((to, correlation_id))) => {
            crate::log_warn!("{}: request handler on {path} failed: {err}", ctx.bus_name);
            (to.clone(), Envelope::failure(to.path, correlation_id, err.to_string()))
        }
        (Err(err), None) => {
            crate::log_warn!("{}: handler on {path} failed: {err}", ctx.bus_name);
            return;
        }
    };

    let (to, env) = response;
    if let Err(err) = ctx.replies.reply(&to, env).await {
        crate::log_error!("{}: failed to send response to {}: {err}", ctx.bus_name, to.path);
    }
}
