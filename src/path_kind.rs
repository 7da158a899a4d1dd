// src/path_kind.rs

//! Queue/topic classification of logical paths.
//!
//! Queues and topics share one namespace of names within a transport, so the
//! bus has to decide, for every outgoing message, which kind of client to use.
//! The answer comes from the producer settings: each producer registers its
//! default path and its message type with its kind. Registration happens only
//! while the bus is being built; afterwards the index is read-only and safe to
//! share without locking.

use crate::{Address, BusError, MessageType, PathKind, ProducerSettings, Result};
use std::collections::HashMap;

/// Path name → kind and message type → kind.
#[derive(Debug, Clone)]
pub struct PathKindIndex {
    // ---
    by_path: HashMap<Address, PathKind>,
    by_type: HashMap<MessageType, PathKind>,
    default_kind: PathKind,
}

impl Default for PathKindIndex {
    fn default() -> Self {
        Self::new(PathKind::Topic)
    }
}

impl PathKindIndex {
    /// Create an empty index classifying unknown paths as `default_kind`.
    pub fn new(default_kind: PathKind) -> Self {
        Self {
            by_path: HashMap::new(),
            by_type: HashMap::new(),
            default_kind,
        }
    }

    /// Build the index from producer settings.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Configuration`] if a path or message type is
    /// declared both as a queue and as a topic.
    pub fn from_producers<'a>(producers: impl IntoIterator<Item = &'a ProducerSettings>) -> Result<Self> {
        // ---
        let mut index = Self::default();
        for producer in producers {
            if let Some(path) = &producer.default_path {
                index.register_path(path.clone(), producer.kind)?;
            }
            index.register_type(producer.message_type, producer.kind)?;
        }
        Ok(index)
    }

    /// Register a path. Re-registering with the same kind is a no-op.
    pub fn register_path(&mut self, path: Address, kind: PathKind) -> Result<()> {
        // ---
        match self.by_path.get(&path) {
            Some(existing) if *existing != kind => Err(BusError::config(format!(
                "the same name '{path}' was used for queue and topic; \
                 one name cannot be shared by a topic and a queue"
            ))),
            Some(_) => Ok(()),
            None => {
                self.by_path.insert(path, kind);
                Ok(())
            }
        }
    }

    /// Register a message type. Re-registering with the same kind is a no-op.
    pub fn register_type(&mut self, message_type: MessageType, kind: PathKind) -> Result<()> {
        // ---
        match self.by_type.get(&message_type) {
            Some(existing) if *existing != kind => Err(BusError::config(format!(
                "the same message type '{message_type}' was used for queue and topic; \
                 one message type cannot be shared by a topic and a queue"
            ))),
            Some(_) => Ok(()),
            None => {
                self.by_type.insert(message_type, kind);
                Ok(())
            }
        }
    }

    /// Kind registered for `path`, if any.
    pub fn path_kind(&self, path: &str) -> Option<PathKind> {
        self.by_path.get(path).copied()
    }

    /// Kind registered for `message_type` or its nearest registered ancestor.
    pub fn type_kind(&self, message_type: &MessageType) -> Option<PathKind> {
        message_type
            .lineage()
            .find_map(|t| self.by_type.get(&t).copied())
    }

    /// Classify an outgoing path: path first, message type second, default last.
    pub fn classify(&self, path: &str, message_type: Option<&MessageType>) -> PathKind {
        self.path_kind(path)
            .or_else(|| message_type.and_then(|t| self.type_kind(t)))
            .unwrap_or(self.default_kind)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    const EVENT: MessageType = MessageType::new("Event");
    const ORDER_PLACED: MessageType = MessageType::derived("OrderPlaced", &EVENT);
    const STOCK_RESERVED: MessageType = MessageType::new("StockReserved");

    fn producer(ty: MessageType, path: &str, kind: PathKind) -> ProducerSettings {
        ProducerSettings {
            message_type: ty,
            default_path: Some(Address::from(path)),
            kind,
            timeout: None,
        }
    }

    #[test]
    fn conflicting_path_kinds_are_rejected() {
        // ---
        let producers = [
            producer(ORDER_PLACED, "inventory", PathKind::Queue),
            producer(STOCK_RESERVED, "inventory", PathKind::Topic),
        ];

        let err = PathKindIndex::from_producers(&producers).unwrap_err();
        match err {
            BusError::Configuration(msg) => assert!(msg.contains("inventory")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn conflicting_type_kinds_are_rejected() {
        // ---
        let producers = [
            producer(ORDER_PLACED, "orders-q", PathKind::Queue),
            producer(ORDER_PLACED, "orders-t", PathKind::Topic),
        ];

        let err = PathKindIndex::from_producers(&producers).unwrap_err();
        match err {
            BusError::Configuration(msg) => assert!(msg.contains("OrderPlaced")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn same_kind_twice_is_fine() {
        // ---
        let producers = [
            producer(ORDER_PLACED, "orders", PathKind::Queue),
            producer(STOCK_RESERVED, "orders", PathKind::Queue),
        ];

        let index = PathKindIndex::from_producers(&producers).unwrap();
        assert_eq!(index.classify("orders", None), PathKind::Queue);
    }

    #[test]
    fn path_wins_over_message_type() {
        // ---
        let producers = [
            producer(ORDER_PLACED, "orders", PathKind::Queue),
            producer(STOCK_RESERVED, "stock", PathKind::Topic),
        ];
        let index = PathKindIndex::from_producers(&producers).unwrap();

        assert_eq!(index.classify("stock", Some(&ORDER_PLACED)), PathKind::Topic);
        assert_eq!(index.classify("adhoc", Some(&ORDER_PLACED)), PathKind::Queue);
    }

    #[test]
    fn type_kind_follows_ancestry() {
        // ---
        let mut index = PathKindIndex::default();
        index.register_type(EVENT, PathKind::Queue).unwrap();

        assert_eq!(index.type_kind(&ORDER_PLACED), Some(PathKind::Queue));
        assert_eq!(index.type_kind(&STOCK_RESERVED), None);
    }

    #[test]
    fn unknown_path_defaults_to_topic() {
        // ---
        let index = PathKindIndex::default();
        assert_eq!(index.classify("anything", Some(&STOCK_RESERVED)), PathKind::Topic);
    }
}
