use std::collections::BTreeMap;

use crate::types::attributes::AttributeValue;

/// A node (ECU) on the network.
///
/// A `Node` identifies a physical or logical unit that transmits or
/// receives messages.
///
/// # Example
/// ```
/// use can_database::Node;
///
/// let node = Node::new("Motor");
/// assert_eq!(node.name, "Motor");
/// assert!(node.comment.is_none());
/// ```
#[derive(Default, Clone, PartialEq, Debug)]
pub struct Node {
    pub name: String,
    pub comment: Option<String>,
    // --- Node Attribute Entry ---
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Node {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_node_has_no_metadata() {
        let node = Node::new("Gateway");
        assert_eq!(node.name, "Gateway");
        assert!(node.attributes.is_empty());
        assert_eq!(node, Node { name: "Gateway".into(), ..Default::default() });
    }
}
