//! Capture model for the rendered document tree.
//!
//! A [`DocumentSnapshot`] is the response to one capture request across the
//! surface boundary. It is plain data: the engine never holds live references
//! into the hosting document, only values copied out of it, keyed by a
//! generation counter that advances on every capture.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Ephemeral identifier of a node within the hosting document.
///
/// Only meaningful together with the generation of the snapshot that
/// produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// One capture of the rendered tree.
#[derive(Clone, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    /// Monotonic capture counter. Handles minted from this snapshot are
    /// valid only while this is the surface's current generation.
    pub generation: u64,
    /// Address the document reported at capture time.
    pub location: String,
    pub root: NodeSnapshot,
}

impl fmt::Debug for DocumentSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentSnapshot")
            .field("generation", &self.generation)
            .field("location", &self.location)
            .field("root", &self.root)
            .finish()
    }
}

/// Roles the engine treats as natively interactive.
const INTERACTIVE_ROLES: &[&str] = &[
    "button", "link", "menuitem", "textbox", "checkbox", "radio", "combobox", "option", "tab",
    "switch",
];

/// One node of a captured tree, with the properties the heuristics need.
#[derive(Clone, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub node: NodeId,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub attributes: BTreeMap<String, String>,
    /// x, y, width, height of the rendered box.
    pub bounds: (f64, f64, f64, f64),
    #[serde(default)]
    pub disabled: bool,
    /// Computed visibility is suppressed (hidden, collapsed, zero opacity).
    #[serde(default)]
    pub visibility_hidden: bool,
    /// The node exposes an input handler even without an interactive role.
    #[serde(default)]
    pub has_handler: bool,
    /// Stacking order of the node's own layer. Descendants of an overlay
    /// render above lower-ordered content regardless of their own value.
    #[serde(default)]
    pub z_order: i32,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub children: Vec<NodeSnapshot>,
    /// Root of an embedded document hosted by this node, if any. Traversal
    /// descends into it like into the child list.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub subdocument: Option<Box<NodeSnapshot>>,
}

impl NodeSnapshot {
    pub fn new(node: NodeId, role: impl Into<String>) -> Self {
        Self {
            node,
            role: role.into(),
            name: None,
            text: None,
            attributes: BTreeMap::new(),
            bounds: (0.0, 0.0, 0.0, 0.0),
            disabled: false,
            visibility_hidden: false,
            has_handler: false,
            z_order: 0,
            children: Vec::new(),
            subdocument: None,
        }
    }

    /// Whether the rendered box has positive area and the node is neither
    /// disabled nor suppressed. Candidates failing this are never returned
    /// by the locator.
    pub fn is_visible(&self) -> bool {
        let (_, _, w, h) = self.bounds;
        w > 0.0 && h > 0.0 && !self.disabled && !self.visibility_hidden
    }

    /// Whether the node is a plausible interaction candidate: a native
    /// control, an explicit interactive role, or an exposed handler.
    pub fn is_interactive(&self) -> bool {
        INTERACTIVE_ROLES.contains(&self.role.as_str()) || self.has_handler
    }

    /// Accessible label: the explicit name, falling back to the subtree's
    /// text content.
    pub fn label(&self) -> String {
        if let Some(name) = &self.name {
            if !name.trim().is_empty() {
                return name.trim().to_string();
            }
        }
        self.text_content()
    }

    /// Concatenated text of this node and its descendants, in document
    /// order. Embedded documents are included.
    pub fn text_content(&self) -> String {
        let mut parts = Vec::new();
        for node in self.descendants() {
            if let Some(text) = &node.text {
                let text = text.trim();
                if !text.is_empty() {
                    parts.push(text);
                }
            }
        }
        parts.join(" ")
    }

    /// Pre-order traversal of this node and everything reachable from it,
    /// including embedded subdocuments. Yield order is document order.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }
}

/// Iterator returned by [`NodeSnapshot::descendants`].
pub struct Descendants<'a> {
    stack: Vec<&'a NodeSnapshot>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a NodeSnapshot;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        if let Some(sub) = &node.subdocument {
            self.stack.push(sub);
        }
        for child in node.children.iter().rev() {
            self.stack.push(child);
        }
        Some(node)
    }
}

impl fmt::Debug for NodeSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.debug_with_depth(f, 0, 100)
    }
}

impl NodeSnapshot {
    /// Helper method for debug formatting with depth control.
    fn debug_with_depth(
        &self,
        f: &mut fmt::Formatter<'_>,
        current_depth: usize,
        max_depth: usize,
    ) -> fmt::Result {
        let mut debug_struct = f.debug_struct("NodeSnapshot");
        debug_struct.field("node", &self.node);
        debug_struct.field("role", &self.role);
        if let Some(name) = &self.name {
            debug_struct.field("name", name);
        }
        if !self.children.is_empty() {
            if current_depth < max_depth {
                debug_struct.field(
                    "children",
                    &DebugChildrenWithDepth {
                        children: &self.children,
                        current_depth,
                        max_depth,
                    },
                );
            } else {
                debug_struct.field(
                    "children",
                    &format!("[{} children (depth limit reached)]", self.children.len()),
                );
            }
        }
        debug_struct.finish()
    }
}

/// Helper struct for debug formatting children with depth control.
struct DebugChildrenWithDepth<'a> {
    children: &'a Vec<NodeSnapshot>,
    current_depth: usize,
    max_depth: usize,
}

impl fmt::Debug for DebugChildrenWithDepth<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for child in self.children.iter() {
            list.entry(&DebugNodeWithDepth {
                node: child,
                current_depth: self.current_depth + 1,
                max_depth: self.max_depth,
            });
        }
        list.finish()
    }
}

/// Helper struct for debug formatting a single node with depth control.
struct DebugNodeWithDepth<'a> {
    node: &'a NodeSnapshot,
    current_depth: usize,
    max_depth: usize,
}

impl fmt::Debug for DebugNodeWithDepth<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.node
            .debug_with_depth(f, self.current_depth, self.max_depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(id: u64, role: &str) -> NodeSnapshot {
        let mut node = NodeSnapshot::new(NodeId(id), role);
        node.bounds = (0.0, 0.0, 10.0, 10.0);
        node
    }

    #[test]
    fn descendants_cross_embedded_documents_in_document_order() {
        let mut root = leaf(0, "document");
        let mut host = leaf(1, "group");
        let mut embedded_root = leaf(2, "document");
        embedded_root.children.push(leaf(3, "button"));
        host.subdocument = Some(Box::new(embedded_root));
        root.children.push(host);
        root.children.push(leaf(4, "link"));

        let order: Vec<u64> = root.descendants().map(|n| n.node.0).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn visibility_requires_positive_area() {
        let mut node = leaf(1, "button");
        assert!(node.is_visible());
        node.bounds = (5.0, 5.0, 0.0, 12.0);
        assert!(!node.is_visible());
    }

    #[test]
    fn disabled_and_suppressed_nodes_are_not_visible() {
        let mut node = leaf(1, "button");
        node.disabled = true;
        assert!(!node.is_visible());

        let mut node = leaf(2, "button");
        node.visibility_hidden = true;
        assert!(!node.is_visible());
    }

    #[test]
    fn handler_makes_a_generic_node_interactive() {
        let mut node = leaf(1, "generic");
        assert!(!node.is_interactive());
        node.has_handler = true;
        assert!(node.is_interactive());
    }

    #[test]
    fn label_prefers_name_over_subtree_text() {
        let mut node = leaf(1, "button");
        node.text = Some("inner".into());
        assert_eq!(node.label(), "inner");
        node.name = Some("Delete".into());
        assert_eq!(node.label(), "Delete");
    }
}
