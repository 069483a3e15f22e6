//! Mutation delta extraction: which elements need (re-)loading after a batch.

use crate::{MutationRecord, NodeRef};

/// Elements from `records` that should be fed back into a load.
///
/// - Attribute records contribute their target when the changed attribute is
///   `attribute` and the target still carries it. Removal yields nothing.
/// - Child-list records contribute each directly inserted element that
///   carries `attribute`. Descendants of inserted nodes are not searched.
/// - Other records are ignored.
///
/// Duplicates across records are kept.
pub fn mutation_targets(records: &[MutationRecord], attribute: &str) -> Vec<NodeRef> {
    records
        .iter()
        .flat_map(|record| match record {
            MutationRecord::Attributes {
                target,
                attribute_name,
            } => {
                if attribute_name.as_deref() == Some(attribute) && target.has_attribute(attribute)
                {
                    vec![target.clone()]
                } else {
                    Vec::new()
                }
            }
            MutationRecord::ChildList { added_nodes, .. } => added_nodes
                .iter()
                .filter(|node| node.is_element() && node.has_attribute(attribute))
                .cloned()
                .collect(),
            MutationRecord::CharacterData { .. } => Vec::new(),
        })
        .collect()
}
