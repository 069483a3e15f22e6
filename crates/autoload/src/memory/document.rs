//! In-memory document tree with mutation observers.

use std::{
    fmt, mem,
    sync::{Arc, Weak},
};

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::trace;

use crate::{
    AttributeSelector, DocumentTree, MutationBatch, MutationRecord, MutationSource,
    MutationSubscription, Node, NodeKind, NodeRef, ObserveOptions, Result,
};

/// A node in a [`MemoryDocument`].
pub struct MemoryNode {
    /// Node kind.
    kind: NodeKind,
    /// Tag name for elements, empty otherwise.
    tag: String,
    /// Text content for text and comment nodes.
    text: Mutex<String>,
    /// Attributes in insertion order.
    attrs: Mutex<Vec<(String, String)>>,
    /// Child nodes in order.
    children: Mutex<Vec<Arc<Self>>>,
    /// Parent, if attached.
    parent: Mutex<Weak<Self>>,
}

impl MemoryNode {
    /// Create a detached node.
    fn new(kind: NodeKind, tag: &str, text: &str) -> Arc<Self> {
        Arc::new(Self {
            kind,
            tag: tag.to_string(),
            text: Mutex::new(text.to_string()),
            attrs: Mutex::new(Vec::new()),
            children: Mutex::new(Vec::new()),
            parent: Mutex::new(Weak::new()),
        })
    }

    /// Tag name; empty for non-elements.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Text content of a text or comment node.
    pub fn text(&self) -> String {
        self.text.lock().clone()
    }

    /// Snapshot of the children.
    pub fn children(&self) -> Vec<Arc<Self>> {
        self.children.lock().clone()
    }

    /// Current parent.
    pub fn parent(&self) -> Option<Arc<Self>> {
        self.parent.lock().upgrade()
    }

    /// True when `self` is `ancestor` or sits below it.
    fn is_within(self: &Arc<Self>, ancestor: &Arc<Self>) -> bool {
        let mut cur = Some(self.clone());
        while let Some(node) = cur {
            if Arc::ptr_eq(&node, ancestor) {
                return true;
            }
            cur = node.parent();
        }
        false
    }

    /// Set or replace an attribute without recording a mutation.
    fn put_attribute(&self, name: &str, value: &str) {
        let mut attrs = self.attrs.lock();
        match attrs.iter_mut().find(|(k, _)| k == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => attrs.push((name.to_string(), value.to_string())),
        }
    }

    /// Collect matching elements below and including `self` in document order.
    fn collect(self: &Arc<Self>, selector: &AttributeSelector, out: &mut Vec<NodeRef>) {
        if selector.matches(self.as_ref()) {
            out.push(self.clone());
        }
        for child in self.children() {
            child.collect(selector, out);
        }
    }
}

impl Node for MemoryNode {
    fn kind(&self) -> NodeKind {
        self.kind
    }

    fn attribute(&self, name: &str) -> Option<String> {
        if self.kind != NodeKind::Element {
            return None;
        }
        self.attrs
            .lock()
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }
}

impl fmt::Debug for MemoryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            NodeKind::Element => f
                .debug_struct("MemoryNode")
                .field("tag", &self.tag)
                .field("attrs", &*self.attrs.lock())
                .finish_non_exhaustive(),
            kind => f
                .debug_struct("MemoryNode")
                .field("kind", &kind)
                .field("text", &*self.text.lock())
                .finish_non_exhaustive(),
        }
    }
}

/// A registered observer and its undelivered records.
struct Observer {
    /// What this observer wants.
    options: ObserveOptions,
    /// Batch sink; closed when the subscription is dropped.
    tx: UnboundedSender<MutationBatch>,
    /// Records queued since the last flush.
    pending: Vec<MutationRecord>,
}

/// An in-memory document implementing [`DocumentTree`] and [`MutationSource`].
///
/// Observers watch the `body` element. Mutations on connected nodes queue
/// records per observer; [`MemoryDocument::flush`] delivers each observer's
/// queue as one batch. Mutations on detached nodes are not observed.
pub struct MemoryDocument {
    /// Document element (`html`).
    root: Arc<MemoryNode>,
    /// Observation root.
    body: Arc<MemoryNode>,
    /// Live observers.
    observers: Mutex<Vec<Observer>>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    /// Create a document containing `<html><body></body></html>`.
    pub fn new() -> Self {
        let root = MemoryNode::new(NodeKind::Element, "html", "");
        let body = MemoryNode::new(NodeKind::Element, "body", "");
        *body.parent.lock() = Arc::downgrade(&root);
        root.children.lock().push(body.clone());
        Self {
            root,
            body,
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Document element.
    pub fn root(&self) -> Arc<MemoryNode> {
        self.root.clone()
    }

    /// Body element; the observation root.
    pub fn body(&self) -> Arc<MemoryNode> {
        self.body.clone()
    }

    /// Create a detached element with the given attributes.
    pub fn create_element(&self, tag: &str, attrs: &[(&str, &str)]) -> Arc<MemoryNode> {
        let el = MemoryNode::new(NodeKind::Element, tag, "");
        for (name, value) in attrs {
            el.put_attribute(name, value);
        }
        el
    }

    /// Create a detached text node.
    pub fn create_text(&self, text: &str) -> Arc<MemoryNode> {
        MemoryNode::new(NodeKind::Text, "", text)
    }

    /// Create a detached comment node.
    pub fn create_comment(&self, text: &str) -> Arc<MemoryNode> {
        MemoryNode::new(NodeKind::Comment, "", text)
    }

    /// Append `child` to `parent`, detaching it from any previous parent first.
    pub fn append_child(&self, parent: &Arc<MemoryNode>, child: Arc<MemoryNode>) {
        if let Some(old) = child.parent() {
            self.remove_child(&old, &child);
        }
        *child.parent.lock() = Arc::downgrade(parent);
        parent.children.lock().push(child.clone());
        self.record(parent, |opts| opts.child_list, || MutationRecord::ChildList {
            target: parent.clone(),
            added_nodes: vec![child.clone() as NodeRef],
            removed_nodes: Vec::new(),
        });
    }

    /// Remove `child` from `parent`. Returns false if it was not a child.
    pub fn remove_child(&self, parent: &Arc<MemoryNode>, child: &Arc<MemoryNode>) -> bool {
        let removed = {
            let mut children = parent.children.lock();
            match children.iter().position(|c| Arc::ptr_eq(c, child)) {
                Some(idx) => {
                    children.remove(idx);
                    true
                }
                None => false,
            }
        };
        if !removed {
            return false;
        }
        *child.parent.lock() = Weak::new();
        self.record(parent, |opts| opts.child_list, || MutationRecord::ChildList {
            target: parent.clone(),
            added_nodes: Vec::new(),
            removed_nodes: vec![child.clone() as NodeRef],
        });
        true
    }

    /// Set attribute `name` on `el`.
    pub fn set_attribute(&self, el: &Arc<MemoryNode>, name: &str, value: &str) {
        el.put_attribute(name, value);
        self.record_attribute(el, name);
    }

    /// Remove attribute `name` from `el`. Returns false if it was absent.
    pub fn remove_attribute(&self, el: &Arc<MemoryNode>, name: &str) -> bool {
        let removed = {
            let mut attrs = el.attrs.lock();
            let before = attrs.len();
            attrs.retain(|(k, _)| k != name);
            attrs.len() != before
        };
        if removed {
            self.record_attribute(el, name);
        }
        removed
    }

    /// Replace the text of a text or comment node.
    pub fn set_text(&self, node: &Arc<MemoryNode>, text: &str) {
        *node.text.lock() = text.to_string();
        self.record(node, |opts| opts.character_data, || {
            MutationRecord::CharacterData {
                target: node.clone(),
            }
        });
    }

    /// Deliver queued records, one batch per observer. Returns the number of batches sent.
    pub fn flush(&self) -> usize {
        let mut observers = self.observers.lock();
        let mut sent = 0;
        observers.retain_mut(|obs| {
            if obs.tx.is_closed() {
                return false;
            }
            if obs.pending.is_empty() {
                return true;
            }
            let batch = mem::take(&mut obs.pending);
            if obs.tx.send(batch).is_err() {
                return false;
            }
            sent += 1;
            true
        });
        trace!(batches = sent, "memory document flush");
        sent
    }

    /// Number of live observers.
    pub fn observer_count(&self) -> usize {
        let mut observers = self.observers.lock();
        observers.retain(|obs| !obs.tx.is_closed());
        observers.len()
    }

    /// Queue an attribute record for `el`.
    fn record_attribute(&self, el: &Arc<MemoryNode>, name: &str) {
        self.record(el, |opts| opts.wants_attribute(name), || {
            MutationRecord::Attributes {
                target: el.clone(),
                attribute_name: Some(name.to_string()),
            }
        });
    }

    /// Queue the record built by `make` for each observer that wants it.
    fn record(
        &self,
        target: &Arc<MemoryNode>,
        wants: impl Fn(&ObserveOptions) -> bool,
        make: impl Fn() -> MutationRecord,
    ) {
        if !target.is_within(&self.body) {
            return;
        }
        let at_root = Arc::ptr_eq(target, &self.body);
        let mut observers = self.observers.lock();
        for obs in observers.iter_mut() {
            if (at_root || obs.options.subtree) && wants(&obs.options) {
                obs.pending.push(make());
            }
        }
    }
}

impl DocumentTree for MemoryDocument {
    fn query_all(&self, selector: &AttributeSelector) -> Vec<NodeRef> {
        let mut out = Vec::new();
        self.root.collect(selector, &mut out);
        out
    }
}

impl MutationSource for MemoryDocument {
    fn observe(&self, options: ObserveOptions) -> Result<MutationSubscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.lock().push(Observer {
            options,
            tx,
            pending: Vec::new(),
        });
        Ok(MutationSubscription::new(rx))
    }
}
