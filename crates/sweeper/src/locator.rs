//! Heuristic element location over captured snapshots.
//!
//! A [`Locator`] pairs a predicate with a context. Single-pass lookups rank
//! every interactive, visible candidate in one capture; deadline lookups
//! re-run the full pass against a *fresh* capture on every poll iteration,
//! so no handle ever survives a suspension point.

use crate::context::RunContext;
use crate::element::ElementHandle;
use crate::errors::AutomationError;
use crate::selector::Predicate;
use crate::snapshot::{DocumentSnapshot, NodeSnapshot};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument};

/// A deadline-aware element query.
pub struct Locator<'c> {
    ctx: &'c RunContext,
    predicate: Predicate,
    scope: Option<Predicate>,
    timeout: Duration,
}

impl<'c> Locator<'c> {
    pub(crate) fn new(ctx: &'c RunContext, predicate: Predicate) -> Self {
        let timeout = ctx.config.step_timeout();
        Self {
            ctx,
            predicate,
            scope: None,
            timeout,
        }
    }

    /// Restrict the search to the best node matching `scope` instead of the
    /// document root. The scope is re-resolved on every poll iteration.
    pub fn within(mut self, scope: Predicate) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Override the deadline for waiting lookups.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Wait for the best-ranked matching element, re-evaluating the full
    /// predicate pass on the configured poll interval until the deadline.
    #[instrument(level = "debug", skip(self))]
    pub async fn first(&self) -> Result<ElementHandle, AutomationError> {
        let poll = self.ctx.config.poll_interval();
        let deadline = Instant::now() + self.timeout;

        loop {
            let snapshot = self.ctx.capture().await?;
            if let Some(handle) = self.all_in(&snapshot).into_iter().next() {
                debug!(
                    node = %handle.node,
                    matched_by = handle.matched_by.as_str(),
                    "locator matched"
                );
                return Ok(handle);
            }
            if Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(poll).await;
        }

        Err(AutomationError::ElementMissing(format!(
            "no candidate matched {:?} within {:?}",
            self.predicate, self.timeout
        )))
    }

    /// Evaluate the predicate over one snapshot. Returns every interactive,
    /// visible candidate, ranked best-first.
    pub fn all_in(&self, snapshot: &DocumentSnapshot) -> Vec<ElementHandle> {
        let root = match &self.scope {
            Some(scope) => match best_scope_node(&snapshot.root, scope) {
                Some(node) => node,
                None => return Vec::new(),
            },
            None => &snapshot.root,
        };

        let mut candidates = Vec::new();
        let mut ordinal = 0usize;
        collect(
            root,
            root.z_order,
            &self.predicate,
            snapshot.generation,
            &mut ordinal,
            &mut candidates,
        );
        rank(&mut candidates);
        candidates
    }
}

fn collect(
    node: &NodeSnapshot,
    inherited_z: i32,
    predicate: &Predicate,
    generation: u64,
    ordinal: &mut usize,
    out: &mut Vec<ElementHandle>,
) {
    let effective_z = inherited_z.max(node.z_order);
    if node.is_interactive() && node.is_visible() {
        if let Some(signal) = predicate.matches(node) {
            out.push(ElementHandle::from_node(
                node,
                generation,
                effective_z,
                *ordinal,
                signal,
            ));
        }
    }
    *ordinal += 1;
    for child in &node.children {
        collect(child, effective_z, predicate, generation, ordinal, out);
    }
    if let Some(sub) = &node.subdocument {
        collect(sub, effective_z, predicate, generation, ordinal, out);
    }
}

/// Ranking for ambiguous multi-candidate results (several stacked overlays):
/// the highest enclosing stacking order wins; equal stacking order is broken
/// by *later* document order (the most recently mounted surface). One rule,
/// applied by every call path.
fn rank(candidates: &mut [ElementHandle]) {
    candidates.sort_by(|a, b| {
        b.stacking_order
            .cmp(&a.stacking_order)
            .then(b.ordinal.cmp(&a.ordinal))
    });
}

/// Resolve a scope predicate to the single best container node. Scopes are
/// containers, so only visibility is required, not interactivity.
fn best_scope_node<'n>(root: &'n NodeSnapshot, scope: &Predicate) -> Option<&'n NodeSnapshot> {
    let mut best: Option<(i32, usize, &NodeSnapshot)> = None;
    let mut ordinal = 0usize;
    scope_walk(root, root.z_order, scope, &mut ordinal, &mut best);
    best.map(|(_, _, node)| node)
}

fn scope_walk<'n>(
    node: &'n NodeSnapshot,
    inherited_z: i32,
    scope: &Predicate,
    ordinal: &mut usize,
    best: &mut Option<(i32, usize, &'n NodeSnapshot)>,
) {
    let effective_z = inherited_z.max(node.z_order);
    if node.is_visible() && scope.matches(node).is_some() {
        let better = match best {
            Some((z, ord, _)) => (effective_z, *ordinal) > (*z, *ord),
            None => true,
        };
        if better {
            *best = Some((effective_z, *ordinal, node));
        }
    }
    *ordinal += 1;
    for child in &node.children {
        scope_walk(child, effective_z, scope, ordinal, best);
    }
    if let Some(sub) = &node.subdocument {
        scope_walk(sub, effective_z, scope, ordinal, best);
    }
}
