//! Tenant-scoped workflow graphs.
//!
//! A [`Workflow`] is a small directed graph of [`Node`]s joined by [`Edge`]s.
//! Nodes optionally carry a [`Status`]; the statuses reachable from the
//! ticket's current node are the statuses the ticket may move to.
//!
//! Graph queries are plain adjacency scans over the node and edge arrays.
//! Workflows are tiny (tens of nodes) and edge order is meaningful: the first
//! edge leaving the START node decides a new ticket's default status.
//!
//! Cycles are accepted. Every query that walks edges deduplicates by status
//! id, which keeps results finite on cyclic graphs.

pub mod status;

pub use status::{can_transition, default_status, possible_statuses};

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{DeskError, ErrorCode, Result};

/// Whether a workflow is the shared default or a tenant customization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowKind {
    #[default]
    Default,
    Custom,
}

/// Role of a node in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    Start,
    #[default]
    Normal,
    End,
}

/// A named ticket state referenced by a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Status {
    /// The id/name pair embedded on tickets.
    #[must_use]
    pub fn to_ref(&self) -> StatusRef {
        StatusRef {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

/// Status as stored on a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub source: String,
    pub target: String,
}

/// A workflow graph. `tenant = None` marks a shared workflow visible to
/// every tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: WorkflowKind,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Workflow {
    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// The first START node, if any.
    #[must_use]
    pub fn start_node(&self) -> Option<&Node> {
        self.nodes.iter().find(|node| node.kind == NodeKind::Start)
    }

    /// Node whose embedded status has the given id.
    #[must_use]
    pub fn node_with_status(&self, status_id: &str) -> Option<&Node> {
        self.nodes
            .iter()
            .find(|node| node.status.as_ref().is_some_and(|s| s.id == status_id))
    }

    /// Edges leaving `node_id`, in array order.
    pub fn outgoing<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |edge| edge.source == node_id)
    }

    /// Every status-carrying node's status, deduplicated by id in array order.
    #[must_use]
    pub fn statuses(&self) -> Vec<&Status> {
        let mut seen = HashSet::new();
        self.nodes
            .iter()
            .filter_map(|node| node.status.as_ref())
            .filter(|status| seen.insert(status.id.as_str()))
            .collect()
    }

    /// Check structural invariants: unique node ids, exactly one START node,
    /// and every edge endpoint present in the node set.
    ///
    /// # Errors
    ///
    /// Returns [`DeskError::Validation`] with code
    /// [`ErrorCode::InvalidWorkflow`] describing the first violation found.
    pub fn validate(&self) -> Result<()> {
        let mut ids = HashSet::new();
        for node in &self.nodes {
            if !ids.insert(node.id.as_str()) {
                return Err(self.invalid(format!("duplicate node id '{}'", node.id)));
            }
        }

        let starts = self
            .nodes
            .iter()
            .filter(|node| node.kind == NodeKind::Start)
            .count();
        if starts != 1 {
            return Err(self.invalid(format!("expected exactly one START node, found {starts}")));
        }

        for edge in &self.edges {
            for endpoint in [&edge.source, &edge.target] {
                if !ids.contains(endpoint.as_str()) {
                    return Err(self.invalid(format!(
                        "edge {} -> {} references unknown node '{endpoint}'",
                        edge.source, edge.target
                    )));
                }
            }
        }

        Ok(())
    }

    fn invalid(&self, reason: String) -> DeskError {
        DeskError::invalid(
            "workflow",
            ErrorCode::InvalidWorkflow,
            format!("workflow {}: {reason}", self.id),
        )
    }
}
