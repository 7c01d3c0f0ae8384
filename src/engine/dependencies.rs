//! Resource Dependency Tracking
//!
//! Every declared resource becomes a node; every output a resource consumes
//! becomes an edge from the producing resource to the consumer. The graph is
//! built at declaration time, before anything is created, which allows:
//!
//! - Cycle detection before any provider call
//! - Planned creation order for previews
//! - Impact reporting when a resource fails
//! - DOT rendering of the stack

use std::collections::{BTreeSet, HashMap, VecDeque};

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use super::Urn;
use crate::error::{Error, Result};

/// A declared resource in the dependency graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceNode {
    /// Unique resource identifier
    pub urn: Urn,
    /// Declaration sequence number
    pub sequence: u64,
}

/// An edge between a producing resource and a consumer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDependency {
    /// Resource whose output is consumed
    pub from: Urn,
    /// Resource consuming the output
    pub to: Urn,
}

/// The dependency graph for one deployment
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<ResourceNode, ResourceDependency>,
    node_indices: HashMap<Urn, NodeIndex>,
    sequence_counter: u64,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the resource has been declared
    pub fn contains(&self, urn: &Urn) -> bool {
        self.node_indices.contains_key(urn)
    }

    /// Add a resource together with the resources it consumes outputs from.
    ///
    /// Every dependency must already be in the graph.
    pub fn add_resource(&mut self, urn: &Urn, dependencies: &BTreeSet<Urn>) -> Result<NodeIndex> {
        if self.node_indices.contains_key(urn) {
            return Err(Error::DuplicateResource(urn.to_string()));
        }

        if let Some(missing) = dependencies.iter().find(|d| !self.node_indices.contains_key(*d)) {
            return Err(Error::UnknownDependency {
                resource: urn.to_string(),
                dependency: missing.to_string(),
            });
        }

        let idx = self.graph.add_node(ResourceNode {
            urn: urn.clone(),
            sequence: self.sequence_counter,
        });
        self.sequence_counter += 1;
        self.node_indices.insert(urn.clone(), idx);

        for dependency in dependencies {
            let from_idx = self.node_indices[dependency];
            self.graph.add_edge(
                from_idx,
                idx,
                ResourceDependency {
                    from: dependency.clone(),
                    to: urn.clone(),
                },
            );
        }

        Ok(idx)
    }

    /// Check for dependency cycles
    pub fn has_cycles(&self) -> bool {
        tarjan_scc(&self.graph).iter().any(|scc| scc.len() > 1)
    }

    /// Creation order respecting every dependency
    pub fn execution_order(&self) -> Result<Vec<Urn>> {
        match toposort(&self.graph, None) {
            Ok(order) => Ok(order
                .into_iter()
                .filter_map(|idx| self.graph.node_weight(idx).map(|n| n.urn.clone()))
                .collect()),
            Err(cycle) => {
                let urn = self
                    .graph
                    .node_weight(cycle.node_id())
                    .map(|n| n.urn.to_string())
                    .unwrap_or_default();
                Err(Error::DependencyCycle(format!(
                    "cannot order resources, cycle through '{}'",
                    urn
                )))
            }
        }
    }

    /// All resources that consume this one, directly or transitively
    pub fn dependents(&self, urn: &Urn) -> Vec<Urn> {
        self.walk(urn, Direction::Outgoing)
    }

    /// All resources this one consumes, directly or transitively
    pub fn dependencies(&self, urn: &Urn) -> Vec<Urn> {
        self.walk(urn, Direction::Incoming)
    }

    fn walk(&self, urn: &Urn, direction: Direction) -> Vec<Urn> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::new();

        if let Some(&start_idx) = self.node_indices.get(urn) {
            queue.push_back(start_idx);

            while let Some(current) = queue.pop_front() {
                for neighbor in self.graph.neighbors_directed(current, direction) {
                    if let Some(node) = self.graph.node_weight(neighbor) {
                        if seen.insert(node.urn.clone()) {
                            queue.push_back(neighbor);
                        }
                    }
                }
            }
        }

        seen.into_iter().collect()
    }

    /// Direct dependencies of a resource
    pub fn direct_dependencies(&self, urn: &Urn) -> Vec<Urn> {
        let mut deps: Vec<Urn> = self
            .node_indices
            .get(urn)
            .map(|&idx| {
                self.graph
                    .edges_directed(idx, Direction::Incoming)
                    .map(|edge| edge.weight().from.clone())
                    .collect()
            })
            .unwrap_or_default();
        deps.sort();
        deps
    }

    /// Get a node by URN
    pub fn get_node(&self, urn: &Urn) -> Option<&ResourceNode> {
        self.node_indices
            .get(urn)
            .and_then(|idx| self.graph.node_weight(*idx))
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get the number of edges
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Generate a DOT format representation for visualization
    pub fn to_dot(&self) -> String {
        let mut output = String::new();
        output.push_str("digraph resources {\n");
        output.push_str("  rankdir=LR;\n");
        output.push_str("  node [shape=box];\n\n");

        for idx in self.graph.node_indices() {
            if let Some(node) = self.graph.node_weight(idx) {
                let label = format!("{}\\n{}", node.urn.name(), node.urn.resource_type());
                output.push_str(&format!("  \"{}\" [label=\"{}\"];\n", node.urn, label));
            }
        }

        output.push('\n');

        for edge in self.graph.edge_references() {
            let dep = edge.weight();
            output.push_str(&format!("  \"{}\" -> \"{}\";\n", dep.from, dep.to));
        }

        output.push_str("}\n");
        output
    }
}
