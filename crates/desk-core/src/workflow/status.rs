//! Status resolution over a workflow snapshot.
//!
//! - [`possible_statuses`] answers "where can this ticket go next?"
//! - [`default_status`] answers "what status does a new ticket start in?"
//!
//! Both operate on the workflow embedded in the ticket at creation time, so
//! later edits to a shared workflow never change an existing ticket's
//! transitions.

use std::collections::HashSet;

use super::{Status, StatusRef, Workflow};

/// Statuses a ticket may hold next, given its current status.
///
/// - `current = None` (creation, before a status is chosen): every node's
///   status, deduplicated by id in first-seen order.
/// - `current = Some(id)`: the status of the node carrying `id` first, then
///   the statuses of each node one edge away, deduplicated in discovery
///   order. Nodes without a status are skipped.
/// - No node carries `id`: empty.
#[must_use]
pub fn possible_statuses(workflow: &Workflow, current: Option<&str>) -> Vec<Status> {
    let Some(current_id) = current else {
        return workflow.statuses().into_iter().cloned().collect();
    };

    let Some(node) = workflow.node_with_status(current_id) else {
        return Vec::new();
    };

    let mut seen: HashSet<&str> = HashSet::new();
    let mut result = Vec::new();

    if let Some(status) = &node.status {
        seen.insert(status.id.as_str());
        result.push(status.clone());
    }

    for edge in workflow.outgoing(&node.id) {
        let Some(status) = workflow
            .node(&edge.target)
            .and_then(|target| target.status.as_ref())
        else {
            continue;
        };
        if seen.insert(status.id.as_str()) {
            result.push(status.clone());
        }
    }

    result
}

/// Status a newly created ticket starts in.
///
/// Follows the first edge (array order) leaving the START node and returns
/// the target node's status. `None` when there is no START node, no outgoing
/// edge, or the target carries no status; callers treat that as a workflow
/// configuration error.
#[must_use]
pub fn default_status(workflow: &Workflow) -> Option<StatusRef> {
    let start = workflow.start_node()?;
    let edge = workflow.outgoing(&start.id).next()?;
    let target = workflow.node(&edge.target)?;
    target.status.as_ref().map(Status::to_ref)
}

/// Whether a ticket in `from` may move to `to`.
///
/// Staying in the same status counts as allowed; callers decide whether a
/// no-op is worth recording.
#[must_use]
pub fn can_transition(workflow: &Workflow, from: Option<&str>, to: &str) -> bool {
    possible_statuses(workflow, from)
        .iter()
        .any(|status| status.id == to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::fixtures::{edge, node, support_flow};
    use crate::workflow::{NodeKind, WorkflowKind};

    fn ids(statuses: &[Status]) -> Vec<&str> {
        statuses.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn default_status_follows_first_start_edge() {
        let wf = support_flow();
        let status = default_status(&wf).expect("default status");
        assert_eq!(status.id, "open");
        assert_eq!(status.name, "OPEN");
    }

    #[test]
    fn default_status_uses_array_order_of_edges() {
        let mut wf = support_flow();
        wf.edges.insert(0, edge("start", "n-closed"));
        assert_eq!(default_status(&wf).map(|s| s.id), Some("closed".to_string()));
    }

    #[test]
    fn default_status_absent_without_start_edge() {
        let mut wf = support_flow();
        wf.edges.retain(|e| e.source != "start");
        assert!(default_status(&wf).is_none());
    }

    #[test]
    fn default_status_absent_when_target_has_no_status() {
        // START -> n1 (no status) -> n2 (OPEN): the first hop decides.
        let wf = Workflow {
            id: "wf-hop".into(),
            tenant: None,
            kind: WorkflowKind::Custom,
            nodes: vec![
                node("start", NodeKind::Start, None),
                node("n1", NodeKind::Normal, None),
                node("n2", NodeKind::Normal, Some("open")),
            ],
            edges: vec![edge("start", "n1"), edge("n1", "n2")],
        };
        assert!(default_status(&wf).is_none());
    }

    #[test]
    fn statusless_start_node_leads_to_open() {
        let wf = Workflow {
            id: "wf-w".into(),
            tenant: Some("acme".into()),
            kind: WorkflowKind::Custom,
            nodes: vec![
                node("n1", NodeKind::Start, None),
                node("n2", NodeKind::Normal, Some("open")),
            ],
            edges: vec![edge("n1", "n2")],
        };
        assert_eq!(default_status(&wf).map(|s| s.id), Some("open".to_string()));
        assert_eq!(ids(&possible_statuses(&wf, Some("open"))), ["open"]);
    }

    #[test]
    fn default_status_absent_without_start_node() {
        let mut wf = support_flow();
        wf.nodes.retain(|n| n.kind != NodeKind::Start);
        assert!(default_status(&wf).is_none());
    }

    #[test]
    fn possible_statuses_without_current_lists_all() {
        let wf = support_flow();
        assert_eq!(
            ids(&possible_statuses(&wf, None)),
            ["open", "in_progress", "closed"]
        );
    }

    #[test]
    fn possible_statuses_starts_with_current() {
        let wf = support_flow();
        assert_eq!(
            ids(&possible_statuses(&wf, Some("in_progress"))),
            ["in_progress", "open", "closed"]
        );
    }

    #[test]
    fn possible_statuses_of_terminal_node_is_only_itself() {
        let wf = support_flow();
        assert_eq!(ids(&possible_statuses(&wf, Some("closed"))), ["closed"]);
    }

    #[test]
    fn possible_statuses_unknown_current_is_empty() {
        let wf = support_flow();
        assert!(possible_statuses(&wf, Some("escalated")).is_empty());
    }

    #[test]
    fn possible_statuses_dedupes_on_cycles_and_self_edges() {
        let mut wf = support_flow();
        wf.edges.push(edge("n-open", "n-open"));
        wf.edges.push(edge("n-open", "n-progress"));
        assert_eq!(
            ids(&possible_statuses(&wf, Some("open"))),
            ["open", "in_progress", "closed"]
        );
    }

    #[test]
    fn possible_statuses_skips_statusless_targets() {
        let mut wf = support_flow();
        wf.nodes.push(node("n-gate", NodeKind::Normal, None));
        wf.edges.push(edge("n-open", "n-gate"));
        assert_eq!(
            ids(&possible_statuses(&wf, Some("open"))),
            ["open", "in_progress", "closed"]
        );
    }

    #[test]
    fn can_transition_checks_adjacency() {
        let wf = support_flow();
        assert!(can_transition(&wf, Some("open"), "in_progress"));
        assert!(can_transition(&wf, Some("open"), "open"));
        assert!(!can_transition(&wf, Some("closed"), "open"));
        assert!(can_transition(&wf, None, "closed"));
    }
}
