// src/consumer/handler.rs

use crate::pending::PendingRequests;
use crate::serializer::{decode, encode};
use crate::{BusError, CorrelationId, Envelope, Message, Request, Result, SerializerPtr};
use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub(crate) type HandlerFuture = Pin<Box<dyn Future<Output = Result<Option<Bytes>>> + Send>>;

/// Type-erased async handler.
///
/// Takes the received envelope and the bus serializer. Returns the encoded
/// response for request handlers, `None` for event handlers.
///
/// Wrapped in Arc for cheap cloning into consumer tasks.
pub(crate) type BoxedHandler = Arc<dyn Fn(Envelope, SerializerPtr) -> HandlerFuture + Send + Sync>;

/// Wrap a typed event handler.
pub(crate) fn wrap_event_handler<M, F, Fut>(handler: F) -> BoxedHandler
where
    M: Message,
    F: Fn(M) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    // ---
    let handler = Arc::new(handler);
    Arc::new(move |env: Envelope, serializer: SerializerPtr| {
        let handler = handler.clone();
        let fut = Box::pin(async move {
            let message: M = decode(serializer.as_ref(), &env.payload)?;
            handler(message).await?;
            Ok(None)
        });

        fut as HandlerFuture
    })
}

/// Wrap a typed request handler; its response is encoded for the reply.
pub(crate) fn wrap_request_handler<R, F, Fut>(handler: F) -> BoxedHandler
where
    R: Request,
    F: Fn(R) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R::Response>> + Send + 'static,
{
    // ---
    let handler = Arc::new(handler);
    Arc::new(move |env: Envelope, serializer: SerializerPtr| {
        let handler = handler.clone();
        let fut = Box::pin(async move {
            let request: R = decode(serializer.as_ref(), &env.payload)?;
            let response = handler(request).await?;
            Ok(Some(encode(serializer.as_ref(), &response)?))
        });

        fut as HandlerFuture
    })
}

/// Handler for the response consumer of a request/response enabled bus.
///
/// Completes the matching pending request; responses nobody waits for are
/// dropped.
pub(crate) fn wrap_response_handler(pending: Arc<PendingRequests>) -> BoxedHandler {
    // ---
    Arc::new(move |env: Envelope, _serializer: SerializerPtr| {
        let pending = pending.clone();
        let fut = Box::pin(async move {
            let Some(correlation_id) = env.correlation_id else {
                crate::log_warn!("response on {} has no correlation id", env.path);
                return Ok(None);
            };

            let outcome = match env.error {
                Some(error) => Err(BusError::Handler(error.to_string())),
                None => Ok(env.payload),
            };

            let correlation_id = CorrelationId::from(correlation_id);
            if !pending.complete(&correlation_id, outcome) {
                crate::log_debug!("no pending request for correlation id {correlation_id}");
            }
            Ok(None)
        });

        fut as HandlerFuture
    })
}
