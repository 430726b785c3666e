//! DAG wrapper over a flow's node and edge sets.
//!
//! Built per validation/run call with local state only, so concurrent
//! validations and runs never share visitation state.

use std::collections::{HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef, Topo};
use petgraph::Direction;

use crate::types::{FlowEdge, FlowNode, NodeId};

/// An incoming or outgoing connection, carrying the branch label used for
/// condition edge selection
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub node_id: NodeId,
    pub branch: Option<String>,
}

/// Directed-graph view of a flow
pub struct FlowDag {
    graph: DiGraph<NodeId, Option<String>>,
    indices: HashMap<NodeId, NodeIndex>,
}

impl FlowDag {
    /// Build a DAG view from a flow's nodes and edges. Never fails; edges
    /// whose endpoints are not in the node set are ignored.
    pub fn build(nodes: &[FlowNode], edges: &[FlowEdge]) -> Self {
        let mut graph = DiGraph::new();
        let mut indices = HashMap::new();

        for node in nodes {
            let index = graph.add_node(node.id.clone());
            indices.insert(node.id.clone(), index);
        }

        for edge in edges {
            if let (Some(&source), Some(&target)) =
                (indices.get(&edge.source), indices.get(&edge.target))
            {
                graph.add_edge(source, target, edge.branch().map(str::to_string));
            }
        }

        Self { graph, indices }
    }

    /// True iff the edge set contains a cycle, including self-loops
    pub fn is_cyclic(&self) -> bool {
        petgraph::algo::is_cyclic_directed(&self.graph)
    }

    /// Nodes in topological order (predecessors first). Nodes on a cycle are
    /// omitted, so callers must validate acyclicity first.
    pub fn topological_order(&self) -> Vec<NodeId> {
        let mut topo = Topo::new(&self.graph);
        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(index) = topo.next(&self.graph) {
            order.push(self.graph[index].clone());
        }
        order
    }

    /// All nodes reachable from `start`, including `start` itself
    pub fn reachable_from(&self, start: &NodeId) -> HashSet<NodeId> {
        let mut reachable = HashSet::new();
        let Some(&start) = self.indices.get(start) else {
            return reachable;
        };
        let mut dfs = Dfs::new(&self.graph, start);
        while let Some(index) = dfs.next(&self.graph) {
            reachable.insert(self.graph[index].clone());
        }
        reachable
    }

    /// Incoming connections of a node with their branch labels
    pub fn incoming(&self, node_id: &NodeId) -> Vec<Connection> {
        self.connections(node_id, Direction::Incoming)
    }

    /// Outgoing connections of a node with their branch labels
    pub fn outgoing(&self, node_id: &NodeId) -> Vec<Connection> {
        self.connections(node_id, Direction::Outgoing)
    }

    fn connections(&self, node_id: &NodeId, direction: Direction) -> Vec<Connection> {
        let Some(&index) = self.indices.get(node_id) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(index, direction)
            .map(|edge| {
                let other = match direction {
                    Direction::Incoming => edge.source(),
                    Direction::Outgoing => edge.target(),
                };
                Connection {
                    node_id: self.graph[other].clone(),
                    branch: edge.weight().clone(),
                }
            })
            .collect()
    }
}
