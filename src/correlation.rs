// src/correlation.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Identifier linking a request envelope to its response.
///
/// Carried in-band on the [`Envelope`](crate::Envelope); opaque to transports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(Arc<str>);

impl CorrelationId {
    /// Generate a new random (v4) correlation ID.
    pub fn generate() -> Self {
        Self(Arc::from(Uuid::new_v4().to_string()))
    }

    /// Borrow the correlation ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shared form, as stored on envelopes.
    pub fn to_shared(&self) -> Arc<str> {
        self.0.clone()
    }
}

impl From<Arc<str>> for CorrelationId {
    fn from(value: Arc<str>) -> Self {
        Self(value)
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn generated_ids_differ() {
        // ---
        assert_ne!(CorrelationId::generate(), CorrelationId::generate());
    }

    #[test]
    fn shared_form_round_trips() {
        // ---
        let id = CorrelationId::generate();
        assert_eq!(id.as_str().len(), 36);
        assert_eq!(CorrelationId::from(id.to_shared()), id);
    }
}
