// src/domain/message.rs

//! Message type identity and ancestry.
//!
//! Routing decisions are keyed by [`MessageType`], a static descriptor that
//! every [`Message`] declares. Instead of discovering a type hierarchy at run
//! time, each descriptor names its parent explicitly, so the ancestor chain is
//! finite and known at compile time.
//!
//! ```
//! use hybrid_bus::{Message, MessageType};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct OrderEvent;
//!
//! #[derive(Serialize, Deserialize)]
//! struct OrderCreated { id: u64 }
//!
//! const ORDER_EVENT: MessageType = MessageType::new("OrderEvent");
//!
//! impl Message for OrderEvent {
//!     const MESSAGE_TYPE: MessageType = ORDER_EVENT;
//! }
//!
//! impl Message for OrderCreated {
//!     const MESSAGE_TYPE: MessageType = MessageType::derived("OrderCreated", &ORDER_EVENT);
//! }
//!
//! let chain: Vec<_> = OrderCreated::MESSAGE_TYPE.lineage().map(|t| t.name()).collect();
//! assert_eq!(chain, ["OrderCreated", "OrderEvent"]);
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Static descriptor of a message type.
///
/// Two descriptors are equal when their names are equal. The parent link is
/// informational for equality and only used when walking ancestry.
#[derive(Clone, Copy)]
pub struct MessageType {
    // ---
    name: &'static str,
    parent: Option<&'static MessageType>,
}

impl MessageType {
    /// A root message type with no declared ancestor.
    pub const fn new(name: &'static str) -> Self {
        Self { name, parent: None }
    }

    /// A message type deriving from `parent`.
    pub const fn derived(name: &'static str, parent: &'static MessageType) -> Self {
        Self {
            name,
            parent: Some(parent),
        }
    }

    /// The type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The immediate ancestor, if any.
    pub fn parent(&self) -> Option<&'static MessageType> {
        self.parent
    }

    /// This type followed by its ancestors, most-derived first.
    pub fn lineage(&self) -> Lineage {
        Lineage {
            next: Some(*self),
        }
    }

    /// True if `other` is this type or one of its ancestors.
    pub fn is_a(&self, other: &MessageType) -> bool {
        self.lineage().any(|t| t == *other)
    }
}

impl PartialEq for MessageType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for MessageType {}

impl Hash for MessageType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Debug for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageType({})", self.name)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Iterator over a message type and its ancestors.
pub struct Lineage {
    next: Option<MessageType>,
}

impl Iterator for Lineage {
    type Item = MessageType;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        self.next = current.parent.copied();
        Some(current)
    }
}

/// A message that can be published on the bus.
pub trait Message: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Routing identity of this message.
    const MESSAGE_TYPE: MessageType;
}

/// A message that expects a response.
pub trait Request: Message {
    /// The response type returned by the handler.
    type Response: Serialize + DeserializeOwned + Send + 'static;
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    const BASE: MessageType = MessageType::new("Base");
    const MIDDLE: MessageType = MessageType::derived("Middle", &BASE);
    const LEAF: MessageType = MessageType::derived("Leaf", &MIDDLE);

    #[test]
    fn lineage_walks_most_derived_first() {
        // ---
        let names: Vec<_> = LEAF.lineage().map(|t| t.name()).collect();
        assert_eq!(names, vec!["Leaf", "Middle", "Base"]);
    }

    #[test]
    fn root_lineage_is_itself() {
        // ---
        assert_eq!(BASE.lineage().count(), 1);
        assert!(BASE.parent().is_none());
    }

    #[test]
    fn equality_is_by_name() {
        // ---
        let other_leaf = MessageType::new("Leaf");
        assert_eq!(LEAF, other_leaf);
        assert_ne!(LEAF, MIDDLE);
    }

    #[test]
    fn is_a_follows_ancestry() {
        // ---
        assert!(LEAF.is_a(&BASE));
        assert!(LEAF.is_a(&LEAF));
        assert!(!BASE.is_a(&LEAF));
    }
}
