//! Document tree and mutation-observation capabilities consumed by the loader.
//!
//! The loader never walks a concrete document model. It queries a
//! [`DocumentTree`] once at startup and afterwards reads batches of
//! [`MutationRecord`]s from a [`MutationSource`] subscription.

use std::{fmt, sync::Arc};

use tokio::sync::mpsc::UnboundedReceiver;

use crate::Result;

/// Kind of a node in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// An element; the only kind that carries attributes.
    Element,
    /// A text node.
    Text,
    /// A comment node.
    Comment,
}

/// A node in the observed tree.
///
/// Attributes are read fresh on every call; the loader keeps no copy.
pub trait Node: Send + Sync + fmt::Debug {
    /// Kind of this node.
    fn kind(&self) -> NodeKind;

    /// Current value of attribute `name`, if present.
    fn attribute(&self, name: &str) -> Option<String>;

    /// True when this node is an element.
    fn is_element(&self) -> bool {
        self.kind() == NodeKind::Element
    }

    /// True when this node currently carries attribute `name`.
    fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }
}

/// Shared handle to a node.
pub type NodeRef = Arc<dyn Node>;

/// Selector matching elements that carry a given attribute (`[attr]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSelector {
    /// Attribute that must be present.
    attribute: String,
}

impl AttributeSelector {
    /// Selector for elements carrying `attribute`.
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
        }
    }

    /// Attribute this selector tests for.
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// True when `node` is an element carrying the attribute.
    pub fn matches(&self, node: &dyn Node) -> bool {
        node.is_element() && node.has_attribute(&self.attribute)
    }
}

impl fmt::Display for AttributeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.attribute)
    }
}

/// Full-tree query capability.
pub trait DocumentTree: Send + Sync {
    /// All elements matching `selector`, in document order.
    fn query_all(&self, selector: &AttributeSelector) -> Vec<NodeRef>;
}

/// Which changes a subscription wants delivered.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObserveOptions {
    /// Deliver attribute changes.
    pub attributes: bool,
    /// Restrict attribute changes to these names; `None` means all.
    pub attribute_filter: Option<Vec<String>>,
    /// Deliver child-list (insertion/removal) changes.
    pub child_list: bool,
    /// Deliver text content changes.
    pub character_data: bool,
    /// Observe the whole subtree rather than only the root.
    pub subtree: bool,
}

impl ObserveOptions {
    /// Options watching `attribute` and child insertions across the subtree.
    pub fn for_attribute(attribute: &str) -> Self {
        Self {
            attributes: true,
            attribute_filter: Some(vec![attribute.to_string()]),
            child_list: true,
            character_data: false,
            subtree: true,
        }
    }

    /// True when an attribute change to `name` should be delivered.
    pub fn wants_attribute(&self, name: &str) -> bool {
        self.attributes
            && self
                .attribute_filter
                .as_ref()
                .is_none_or(|filter| filter.iter().any(|a| a == name))
    }
}

/// One change notification.
#[derive(Debug, Clone)]
pub enum MutationRecord {
    /// An attribute on `target` changed, was added, or was removed.
    Attributes {
        /// Element whose attribute changed.
        target: NodeRef,
        /// Name of the changed attribute.
        attribute_name: Option<String>,
    },
    /// Children of `target` were inserted or removed.
    ChildList {
        /// Parent whose child list changed.
        target: NodeRef,
        /// Nodes inserted directly under `target`.
        added_nodes: Vec<NodeRef>,
        /// Nodes removed from `target`.
        removed_nodes: Vec<NodeRef>,
    },
    /// Text content of `target` changed.
    CharacterData {
        /// Text or comment node that changed.
        target: NodeRef,
    },
}

impl MutationRecord {
    /// Record kind tag: `"attributes"`, `"childList"` or `"characterData"`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Attributes { .. } => "attributes",
            Self::ChildList { .. } => "childList",
            Self::CharacterData { .. } => "characterData",
        }
    }
}

/// Records delivered together.
pub type MutationBatch = Vec<MutationRecord>;

/// Live subscription to a [`MutationSource`]. Dropping it unsubscribes.
#[derive(Debug)]
pub struct MutationSubscription {
    /// Batch feed from the source.
    rx: UnboundedReceiver<MutationBatch>,
}

impl MutationSubscription {
    /// Wrap a batch receiver handed out by a source.
    pub fn new(rx: UnboundedReceiver<MutationBatch>) -> Self {
        Self { rx }
    }

    /// Await the next batch; `None` once the source has gone away.
    pub async fn next_batch(&mut self) -> Option<MutationBatch> {
        self.rx.recv().await
    }
}

/// Change-notification capability.
pub trait MutationSource: Send + Sync {
    /// Start observing with `options`.
    fn observe(&self, options: ObserveOptions) -> Result<MutationSubscription>;
}
