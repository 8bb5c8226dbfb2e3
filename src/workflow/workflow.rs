//! Runtime workflow representation using a directed graph.
//!
//! The graph is immutable once built. Per-run state lives in the
//! [`crate::runtime::ExecutionContext`], so one graph can serve concurrent runs.

use std::collections::HashMap;

use petgraph::{
    Direction,
    graph::{DiGraph, NodeIndex},
    visit::EdgeRef,
};
use tracing::warn;

use crate::{
    HookflowError, Result, WorkflowModel,
    workflow::{
        edge::Edge,
        node::{Node, NodeId},
    },
};

pub struct Workflow {
    id: String,
    graph: DiGraph<Node, Edge>,
    index: HashMap<NodeId, NodeIndex>,
}

impl Workflow {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn node(
        &self,
        id: &str,
    ) -> Option<&Node> {
        self.index.get(id).map(|idx| &self.graph[*idx])
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_indices().map(|idx| &self.graph[idx])
    }

    /// Edges ending at `id`, in declaration order.
    pub fn incoming(
        &self,
        id: &str,
    ) -> Vec<&Edge> {
        self.edges_directed(id, Direction::Incoming)
    }

    /// Edges leaving `id`, in declaration order.
    pub fn outgoing(
        &self,
        id: &str,
    ) -> Vec<&Edge> {
        self.edges_directed(id, Direction::Outgoing)
    }

    fn edges_directed(
        &self,
        id: &str,
        dir: Direction,
    ) -> Vec<&Edge> {
        let Some(idx) = self.index.get(id) else {
            return Vec::new();
        };
        // petgraph walks adjacency lists newest first
        let mut edges = self.graph.edges_directed(*idx, dir).collect::<Vec<_>>();
        edges.sort_by_key(|e| e.id());
        edges.into_iter().map(|e| e.weight()).collect()
    }

    /// First node, in declaration order, whose config carries `trigger_id`
    /// under `config_key`.
    pub fn find_trigger_node(
        &self,
        config_key: &str,
        trigger_id: &str,
    ) -> Option<&Node> {
        self.nodes().find(|n| n.references_trigger(config_key, trigger_id))
    }
}

impl TryFrom<&WorkflowModel> for Workflow {
    type Error = HookflowError;

    fn try_from(model: &WorkflowModel) -> Result<Self> {
        let mut graph: DiGraph<Node, Edge> = DiGraph::new();
        let mut index = HashMap::new();

        for node in model.nodes.iter() {
            if node.id.is_empty() {
                return Err(HookflowError::Node(format!("node without id in workflow {}", model.id)));
            }
            if index.contains_key(&node.id) {
                return Err(HookflowError::Node(format!("duplicated node id {} in workflow {}", node.id, model.id)));
            }
            let idx = graph.add_node(Node::from(node));
            index.insert(node.id.clone(), idx);
        }
        for conn in model.connections.iter() {
            let edge = Edge::from(conn);
            // connections left behind by a deleted node are ignored
            let (Some(source), Some(target)) = (index.get(&edge.source), index.get(&edge.target)) else {
                warn!(workflow = %model.id, edge = %edge.id, "skipping connection {} -> {} with a missing node", edge.source, edge.target);
                continue;
            };
            graph.add_edge(*source, *target, edge);
        }

        Ok(Self {
            id: model.id.clone(),
            graph,
            index,
        })
    }
}

#[cfg(test)]
mod test {
    use super::Workflow;
    use crate::WorkflowModel;

    fn model() -> WorkflowModel {
        WorkflowModel::from_json(
            r#"{
                "id": "w1",
                "ownerUserId": "u1",
                "nodes": [
                    {"id": "t", "type": "webhook_trigger", "config": {"webhookId": "wh1"}},
                    {"id": "a", "type": "no_op"},
                    {"id": "b", "type": "no_op"},
                    {"id": "j", "type": "no_op"}
                ],
                "connections": [
                    {"id": "e1", "sourceNodeId": "t", "targetNodeId": "a"},
                    {"id": "e2", "sourceNodeId": "t", "targetNodeId": "b"},
                    {"sourceNodeId": "a", "targetNodeId": "j"},
                    {"sourceNodeId": "b", "targetNodeId": "j"}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_edges_keep_declaration_order() {
        let wf = Workflow::try_from(&model()).unwrap();
        let out = wf.outgoing("t").iter().map(|e| e.id.clone()).collect::<Vec<_>>();
        assert_eq!(out, vec!["e1", "e2"]);

        let incoming = wf.incoming("j").iter().map(|e| e.source.clone()).collect::<Vec<_>>();
        assert_eq!(incoming, vec!["a", "b"]);
        assert_eq!(wf.incoming("j")[0].id, "a->j");
        assert!(wf.incoming("t").is_empty());
    }

    #[test]
    fn test_find_trigger_node() {
        let wf = Workflow::try_from(&model()).unwrap();
        assert_eq!(wf.find_trigger_node("webhookId", "wh1").map(|n| n.id.as_str()), Some("t"));
        assert!(wf.find_trigger_node("webhookId", "other").is_none());
        assert!(wf.find_trigger_node("chatId", "wh1").is_none());
        assert!(wf.node("t").unwrap().is_trigger());
    }

    #[test]
    fn test_dangling_connection_is_skipped() {
        let mut model = model();
        model.connections[0].target_node_id = "ghost".to_string();
        let wf = Workflow::try_from(&model).unwrap();
        assert_eq!(wf.outgoing("t").iter().map(|e| e.id.clone()).collect::<Vec<_>>(), vec!["e2"]);
        assert!(wf.node("ghost").is_none());
        assert_eq!(wf.incoming("a").len(), 0);
    }

    #[test]
    fn test_duplicated_node_is_rejected() {
        let mut model = model();
        model.nodes[1].id = "t".to_string();
        assert!(Workflow::try_from(&model).is_err());
    }
}
