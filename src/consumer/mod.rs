//! Consumers: typed handlers, receive loops and the per-transport registry.

mod handler;
mod registry;
mod runner;

pub(crate) use handler::{
    wrap_event_handler, wrap_request_handler, wrap_response_handler, BoxedHandler,
};
pub use registry::{ConsumerRegistry, DEFAULT_STOP_GRACE};
pub(crate) use runner::{DispatchContext, ReplySink};
