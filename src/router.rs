// src/router.rs

//! Message type → transport routing.
//!
//! The route table is computed once, while the [`HybridBus`](crate::HybridBus)
//! is built, from the producer settings of every owned transport. Lookups walk
//! the message type's declared ancestry, most-derived first, so a producer
//! registered for a base type also routes every type that derives from it.

use crate::{BusError, MessageType, ProducerSettings, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Immutable route table.
#[derive(Debug, Default, Clone)]
pub struct MessageTypeRouter {
    // ---
    routes: HashMap<MessageType, Arc<str>>,
}

impl MessageTypeRouter {
    /// Build the route table.
    ///
    /// `transports` yields each transport name with its producer settings.
    /// A message type produced by more than one transport is routed to the
    /// last one seen and a warning is logged; with `strict` it is a
    /// configuration error instead.
    pub fn build<'a, I, P>(transports: I, strict: bool) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, P)>,
        P: IntoIterator<Item = &'a ProducerSettings>,
    {
        // ---
        let mut routes: HashMap<MessageType, Arc<str>> = HashMap::new();

        for (bus_name, producers) in transports {
            let bus_name: Arc<str> = Arc::from(bus_name);
            for producer in producers {
                let previous = routes.insert(producer.message_type, bus_name.clone());
                match previous {
                    Some(previous) if previous != bus_name => {
                        if strict {
                            return Err(BusError::config(format!(
                                "message type '{}' is produced by both '{previous}' and '{bus_name}'",
                                producer.message_type
                            )));
                        }
                        crate::log_warn!(
                            "message type '{}' is produced by both '{previous}' and '{bus_name}'; routing to '{bus_name}'",
                            producer.message_type
                        );
                    }
                    _ => {}
                }
            }
        }

        Ok(Self { routes })
    }

    /// Resolve the transport for `message_type`.
    ///
    /// `requested` is only used to describe the failure.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Routing`] when neither the type nor any of its
    /// ancestors has a route.
    pub fn resolve(&self, message_type: &MessageType, requested: Option<&str>) -> Result<&str> {
        // ---
        for candidate in message_type.lineage() {
            if let Some(bus_name) = self.routes.get(&candidate) {
                crate::log_debug!(
                    "resolved bus {bus_name} for message type {message_type} (via {candidate})"
                );
                return Ok(bus_name);
            }
        }

        Err(BusError::Routing {
            message_type: message_type.name().to_string(),
            name: requested.map(str::to_string),
        })
    }

    /// Number of routed message types.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::{Address, PathKind};

    const EVENT: MessageType = MessageType::new("Event");
    const ORDER_EVENT: MessageType = MessageType::derived("OrderEvent", &EVENT);
    const ORDER_CREATED: MessageType = MessageType::derived("OrderCreated", &ORDER_EVENT);
    const PAYMENT_TAKEN: MessageType = MessageType::new("PaymentTaken");

    fn producer(ty: MessageType) -> ProducerSettings {
        ProducerSettings {
            message_type: ty,
            default_path: Some(Address::from(ty.name())),
            kind: PathKind::Topic,
            timeout: None,
        }
    }

    #[test]
    fn exact_match_wins() {
        // ---
        let primary = [producer(ORDER_EVENT)];
        let secondary = [producer(ORDER_CREATED)];
        let router = MessageTypeRouter::build([("primary", &primary), ("secondary", &secondary)], false).unwrap();

        assert_eq!(router.resolve(&ORDER_CREATED, None).unwrap(), "secondary");
        assert_eq!(router.resolve(&ORDER_EVENT, None).unwrap(), "primary");
    }

    #[test]
    fn unrouted_type_uses_nearest_ancestor() {
        // ---
        let primary = [producer(EVENT)];
        let secondary = [producer(ORDER_EVENT)];
        let router = MessageTypeRouter::build([("primary", &primary), ("secondary", &secondary)], false).unwrap();

        assert_eq!(
            router.resolve(&ORDER_CREATED, None).unwrap(),
            router.resolve(&ORDER_EVENT, None).unwrap()
        );
    }

    #[test]
    fn no_route_is_a_routing_error() {
        // ---
        let primary = [producer(ORDER_EVENT)];
        let router = MessageTypeRouter::build([("primary", &primary)], false).unwrap();

        match router.resolve(&PAYMENT_TAKEN, Some("payments")) {
            Err(BusError::Routing { message_type, name }) => {
                assert_eq!(message_type, "PaymentTaken");
                assert_eq!(name.as_deref(), Some("payments"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        // An unrouted ancestor does not help either.
        assert!(router.resolve(&EVENT, None).is_err());
    }

    #[test]
    fn duplicate_across_transports_last_wins() {
        // ---
        let primary = [producer(ORDER_CREATED)];
        let secondary = [producer(ORDER_CREATED)];
        let router = MessageTypeRouter::build([("primary", &primary), ("secondary", &secondary)], false).unwrap();

        assert_eq!(router.resolve(&ORDER_CREATED, None).unwrap(), "secondary");
        assert_eq!(router.len(), 1);
    }

    #[test]
    fn duplicate_across_transports_rejected_when_strict() {
        // ---
        let primary = [producer(ORDER_CREATED)];
        let secondary = [producer(ORDER_CREATED)];
        let err = MessageTypeRouter::build([("primary", &primary), ("secondary", &secondary)], true).unwrap_err();

        assert!(matches!(err, BusError::Configuration(msg) if msg.contains("OrderCreated")));
    }
}
