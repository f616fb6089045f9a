//! Heuristic predicates for locating controls without stable identifiers.
//!
//! Each signal is a named, independently testable predicate; composite
//! matching is expressed with [`Predicate::AnyOf`], which evaluates its arms
//! in the listed order. Callers list arms strongest-first, so the precedence
//! is always: explicit semantic attribute, then accessible-name/text
//! pattern, then structural signature.

use crate::profile::PatternSet;
use crate::snapshot::NodeSnapshot;
use serde::Serialize;

/// Upper edge length of a glyph considered an inline icon.
const MAX_ICON_EDGE: f64 = 48.0;
/// Tolerance when testing a glyph's box for squareness, in pixels.
const ICON_SQUARENESS_SLACK: f64 = 4.0;
/// Upper bound on "a small number of path primitives".
const MAX_UNIFORM_PATHS: usize = 4;

/// Which signal matched a candidate. Recorded in step evidence so a failed
/// run shows how each control was recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSignal {
    SemanticAttr,
    TextPattern,
    IconShape,
    Role,
}

impl MatchSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchSignal::SemanticAttr => "semantic_attr",
            MatchSignal::TextPattern => "text_pattern",
            MatchSignal::IconShape => "icon_shape",
            MatchSignal::Role => "role",
        }
    }
}

/// A named heuristic test against one captured node.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Explicit semantic attribute equality (e.g. a test hook id).
    SemanticAttr { key: String, value: String },
    /// Explicit semantic attribute containing a fragment (e.g. an address
    /// attribute carrying the target id).
    AttrContains { key: String, needle: String },
    /// Accessible label matched against a localized pattern set.
    TextPattern(&'static PatternSet),
    /// Structural signature of a label-less "more options" affordance: a
    /// roughly square glyph of bounded size whose primitives are either
    /// exactly three dots, or a handful of paths with identical boxes.
    IconShape,
    /// Role equality. Weak on its own; useful inside [`Predicate::AnyOf`].
    Role(String),
    /// Matches a node with at least one *proper* descendant matching the
    /// inner predicate. The node itself is excluded, so the deepest
    /// matching container is the target's immediate surrounding, not the
    /// target.
    Has(Box<Predicate>),
    /// First matching arm wins; list arms strongest-first.
    AnyOf(Vec<Predicate>),
}

impl Predicate {
    pub fn semantic_attr(key: &str, value: &str) -> Self {
        Predicate::SemanticAttr {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    pub fn attr_contains(key: &str, needle: &str) -> Self {
        Predicate::AttrContains {
            key: key.to_string(),
            needle: needle.to_string(),
        }
    }

    /// Test a candidate node. Returns the signal that matched, if any.
    /// Interactivity and visibility are the locator's concern, not the
    /// predicate's.
    pub fn matches(&self, node: &NodeSnapshot) -> Option<MatchSignal> {
        match self {
            Predicate::SemanticAttr { key, value } => {
                (node.attributes.get(key).map(String::as_str) == Some(value.as_str()))
                    .then_some(MatchSignal::SemanticAttr)
            }
            Predicate::AttrContains { key, needle } => node
                .attributes
                .get(key)
                .is_some_and(|v| v.contains(needle.as_str()))
                .then_some(MatchSignal::SemanticAttr),
            Predicate::TextPattern(patterns) => patterns
                .matches_text(&node.label())
                .then_some(MatchSignal::TextPattern),
            Predicate::IconShape => contains_more_options_glyph(node).then_some(MatchSignal::IconShape),
            Predicate::Role(role) => (node.role == *role).then_some(MatchSignal::Role),
            Predicate::Has(inner) => node
                .descendants()
                .skip(1)
                .find_map(|descendant| inner.matches(descendant)),
            Predicate::AnyOf(arms) => arms.iter().find_map(|arm| arm.matches(node)),
        }
    }
}

/// Whether the candidate carries (or is) a glyph with the "more options"
/// signature.
fn contains_more_options_glyph(node: &NodeSnapshot) -> bool {
    node.descendants().any(is_more_options_glyph)
}

fn is_more_options_glyph(node: &NodeSnapshot) -> bool {
    if !matches!(node.role.as_str(), "image" | "graphic" | "svg") {
        return false;
    }
    let (_, _, w, h) = node.bounds;
    if w <= 0.0 || h <= 0.0 || w > MAX_ICON_EDGE || h > MAX_ICON_EDGE {
        return false;
    }
    if (w - h).abs() > ICON_SQUARENESS_SLACK {
        return false;
    }

    let primitives: Vec<&NodeSnapshot> = node
        .children
        .iter()
        .filter(|c| matches!(c.role.as_str(), "circle" | "ellipse" | "path"))
        .collect();
    if primitives.is_empty() {
        return false;
    }

    let dots = primitives.iter().filter(|p| is_dot_primitive(p)).count();
    if dots == 3 && primitives.len() == 3 {
        return true;
    }

    let paths: Vec<&&NodeSnapshot> = primitives
        .iter()
        .filter(|p| p.role == "path")
        .collect();
    if paths.len() == primitives.len() && paths.len() <= MAX_UNIFORM_PATHS {
        let (_, _, w0, h0) = paths[0].bounds;
        return paths
            .iter()
            .all(|p| p.bounds.2 == w0 && p.bounds.3 == h0);
    }

    false
}

fn is_dot_primitive(node: &NodeSnapshot) -> bool {
    if matches!(node.role.as_str(), "circle" | "ellipse") {
        return true;
    }
    // A path can render a dot too: a tiny near-square box qualifies.
    let (_, _, w, h) = node.bounds;
    node.role == "path" && w > 0.0 && w <= 8.0 && (w - h).abs() <= 1.0
}
