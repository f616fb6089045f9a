//! Short-lived handles to located controls.

use crate::selector::MatchSignal;
use crate::snapshot::{NodeId, NodeSnapshot};
use crate::surface::NodeRef;
use serde::Serialize;
use serde_json::json;

/// A non-owning reference to a node in the live rendered tree.
///
/// Validity is scoped to the snapshot generation the handle was minted
/// from; this is the central lifetime invariant of the engine. A handle must never
/// be held across a suspension point: after any delay the document may have
/// fully re-rendered, so discovery is repeated and a fresh handle minted.
/// Dispatching through a stale handle is rejected by the surface.
#[derive(Debug, Clone, Serialize)]
pub struct ElementHandle {
    pub node: NodeId,
    pub generation: u64,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub bounds: (f64, f64, f64, f64),
    /// Effective stacking order: the maximum along the containing chain.
    pub stacking_order: i32,
    /// Position in document order at capture time. Used as the ranking
    /// tie-break; later means more recently mounted.
    pub ordinal: usize,
    /// Which heuristic signal recognized this node.
    pub matched_by: MatchSignal,
}

impl ElementHandle {
    pub(crate) fn from_node(
        node: &NodeSnapshot,
        generation: u64,
        stacking_order: i32,
        ordinal: usize,
        matched_by: MatchSignal,
    ) -> Self {
        Self {
            node: node.node,
            generation,
            role: node.role.clone(),
            name: node.name.clone(),
            bounds: node.bounds,
            stacking_order,
            ordinal,
            matched_by,
        }
    }

    /// Reference used when dispatching input against this handle.
    pub fn node_ref(&self) -> NodeRef {
        NodeRef {
            node: self.node,
            generation: self.generation,
        }
    }

    /// Compact evidence payload describing this handle.
    pub fn describe(&self) -> serde_json::Value {
        json!({
            "node": self.node.0,
            "generation": self.generation,
            "role": self.role,
            "name": self.name,
            "matched_by": self.matched_by.as_str(),
            "stacking_order": self.stacking_order,
        })
    }
}
