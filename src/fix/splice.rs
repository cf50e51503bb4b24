//! Splicing the built operators into the final plan tree.

use super::MvFixContext;
use crate::error::{MvFixError, MvFixResult};
use crate::plan::{AggregateNode, PlanNode, PlanNodeId, ProjectionNode};
use tracing::debug;

impl MvFixContext<'_> {
    /// Attach the inline projection to the plan's scan of the view and, if
    /// `reagg` is supplied, put it in that scan's place with the scan as its
    /// child.
    ///
    /// Only scans that are children of some node are considered; inlined
    /// scans (such as the inner side of a nested-loop-index join) are
    /// never matched. A projection the planner already inlined into the
    /// scan is replaced. Returns `Ok(false)` when there is nothing to
    /// splice, which includes every call after the first successful one.
    pub fn splice(&mut self, root: &mut PlanNode, reagg: &mut Option<PlanNode>) -> MvFixResult<bool> {
        let Some(view) = self.view_table.clone() else {
            return Ok(false);
        };
        if self.inline_projection.is_none() {
            return Ok(false);
        }
        if let Some(node) = reagg.as_ref() {
            match node {
                PlanNode::HashAggregate(AggregateNode { child: None, .. }) => {}
                other => {
                    return Err(MvFixError::internal(format!(
                        "re-aggregation to splice must be a childless hash aggregate, got {} {}",
                        other.node_kind(),
                        other.id()
                    )));
                }
            }
        }

        match count_view_scans(root, &view) {
            0 => return Ok(false),
            1 => {}
            n => {
                return Err(MvFixError::internal(format!(
                    "plan contains {n} scans of view {view}"
                )));
            }
        }

        let with_reagg = reagg.is_some();
        let scan_id = splice_into(root, &view, &mut self.inline_projection, reagg);
        if let Some(id) = scan_id {
            debug!(view = %view, scan = %id, with_reagg, "spliced view scan");
            self.scan_node = Some(id);
        }
        Ok(scan_id.is_some())
    }

    /// Put the re-aggregation directly above the plan's receive node, then
    /// splice the projection into the partition-side scan of the view.
    ///
    /// Used for single-table queries, where everything between the scan
    /// and the receive node runs per partition. Returns the plan unchanged
    /// if no fix is needed. On error the context keeps its re-aggregation.
    pub fn place_over(&mut self, mut root: PlanNode) -> MvFixResult<PlanNode> {
        if !self.needs_fix {
            return Ok(root);
        }
        let view = self.view_table.clone().unwrap_or_default();
        match count_view_scans(&root, &view) {
            1 => {}
            0 => {
                return Err(MvFixError::internal(format!(
                    "no scan of view {view} in plan rooted at {} {}",
                    root.node_kind(),
                    root.id()
                )));
            }
            n => {
                return Err(MvFixError::internal(format!(
                    "plan contains {n} scans of view {view}"
                )));
            }
        }
        let agg = self
            .reaggregation
            .take()
            .ok_or_else(|| MvFixError::internal("re-aggregation already taken"))?;

        let mut pending = Some(agg);
        if matches!(root, PlanNode::Receive(_)) {
            if let Some(agg) = pending.take() {
                root = agg.with_child(root);
            }
        } else {
            place_above_receive(&mut root, &mut pending);
        }
        if let Some(agg) = pending {
            self.reaggregation = Some(agg);
            return Err(MvFixError::internal(format!(
                "no receive node in plan rooted at {} {}",
                root.node_kind(),
                root.id()
            )));
        }

        if !self.splice(&mut root, &mut None)? {
            return Err(MvFixError::internal(format!("scan of view {view} was not spliced")));
        }
        Ok(root)
    }
}

fn is_view_scan(node: &PlanNode, view: &str) -> bool {
    matches!(node, PlanNode::Scan(scan) if scan.target_table == view)
}

fn count_view_scans(node: &PlanNode, view: &str) -> usize {
    node.children()
        .into_iter()
        .map(|child| {
            if is_view_scan(child, view) {
                1
            } else {
                count_view_scans(child, view)
            }
        })
        .sum()
}

/// Depth-first search for the first child scan of `view`; splice there.
fn splice_into(
    node: &mut PlanNode,
    view: &str,
    projection: &mut Option<ProjectionNode>,
    reagg: &mut Option<PlanNode>,
) -> Option<PlanNodeId> {
    for child in node.children_mut() {
        if !is_view_scan(child, view) {
            if let Some(id) = splice_into(child, view, projection, reagg) {
                return Some(id);
            }
            continue;
        }

        if let PlanNode::Scan(scan) = &mut *child {
            scan.inline_projection = projection.take();
        }
        let scan_id = child.id();
        if let Some(agg) = reagg.take() {
            let scan = std::mem::replace(child, agg);
            if let PlanNode::HashAggregate(agg) = child {
                agg.child = Some(Box::new(scan));
            }
        }
        return Some(scan_id);
    }
    None
}

fn place_above_receive(node: &mut PlanNode, pending: &mut Option<AggregateNode>) {
    for child in node.children_mut() {
        if matches!(child, PlanNode::Receive(_)) {
            if let Some(agg) = pending.take() {
                let receive = std::mem::replace(child, PlanNode::HashAggregate(agg));
                if let PlanNode::HashAggregate(agg) = child {
                    agg.child = Some(Box::new(receive));
                }
            }
            return;
        }
        place_above_receive(child, pending);
        if pending.is_none() {
            return;
        }
    }
}
