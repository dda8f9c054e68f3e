//! Alias dependency graph.
//!
//! Nodes are aliases. An edge `parent → dependent` labelled with a property name
//! means "when `parent`'s `property` changes, re-fetch `dependent`". The graph is
//! built once per owner at parse time and is used to reject cycles and to print the
//! dependency tree.

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet};

/// Color states for cycle detection using DFS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Node has not been visited.
    White,
    /// Node is currently being visited (in the DFS stack).
    Gray,
    /// Node has been fully visited.
    Black,
}

/// Directed graph of alias dependencies.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, String>,
    node_map: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `alias` as a node if it is not present yet.
    pub fn ensure_node(&mut self, alias: &str) -> NodeIndex {
        if let Some(&index) = self.node_map.get(alias) {
            index
        } else {
            let index = self.graph.add_node(alias.to_string());
            self.node_map.insert(alias.to_string(), index);
            index
        }
    }

    /// Record that `dependent` re-fetches when `parent`'s `property` changes.
    ///
    /// Returns `false` when the same edge already exists.
    pub fn add_dependency(&mut self, parent: &str, dependent: &str, property: &str) -> bool {
        let from = self.ensure_node(parent);
        let to = self.ensure_node(dependent);

        let exists = self
            .graph
            .edges_connecting(from, to)
            .any(|edge| edge.weight().as_str() == property);
        if !exists {
            self.graph.add_edge(from, to, property.to_string());
        }
        !exists
    }

    /// Find a cycle, if any.
    ///
    /// The returned chain starts and ends with the same alias.
    pub fn detect_cycles(&self) -> Option<Vec<String>> {
        let mut colors: HashMap<NodeIndex, Color> =
            self.graph.node_indices().map(|node| (node, Color::White)).collect();
        let mut path: Vec<NodeIndex> = Vec::new();

        for node in self.graph.node_indices() {
            if matches!(colors.get(&node), Some(Color::White))
                && let Some(cycle) = self.dfs_visit(node, &mut colors, &mut path)
            {
                return Some(cycle.into_iter().map(|idx| self.graph[idx].clone()).collect());
            }
        }
        None
    }

    fn dfs_visit(
        &self,
        node: NodeIndex,
        colors: &mut HashMap<NodeIndex, Color>,
        path: &mut Vec<NodeIndex>,
    ) -> Option<Vec<NodeIndex>> {
        colors.insert(node, Color::Gray);
        path.push(node);

        let mut neighbors: Vec<NodeIndex> = self.graph.neighbors(node).collect();
        neighbors.sort();
        neighbors.dedup();
        for neighbor in neighbors {
            match colors.get(&neighbor) {
                Some(Color::Gray) => {
                    let start = path.iter().position(|&n| n == neighbor).unwrap_or(0);
                    let mut cycle = path[start..].to_vec();
                    cycle.push(neighbor);
                    return Some(cycle);
                }
                Some(Color::White) => {
                    if let Some(cycle) = self.dfs_visit(neighbor, colors, path) {
                        return Some(cycle);
                    }
                }
                _ => {}
            }
        }

        path.pop();
        colors.insert(node, Color::Black);
        None
    }

    /// Aliases ordered so every parent precedes its dependents.
    ///
    /// Returns `None` if the graph has a cycle.
    pub fn topological_order(&self) -> Option<Vec<String>> {
        toposort(&self.graph, None)
            .ok()
            .map(|indices| indices.into_iter().map(|idx| self.graph[idx].clone()).collect())
    }

    /// `(dependent, property)` pairs for edges leaving `alias`, in insertion order.
    pub fn dependents_of(&self, alias: &str) -> Vec<(String, String)> {
        self.edges(alias, Direction::Outgoing)
    }

    /// `(parent, property)` pairs for edges entering `alias`, in insertion order.
    pub fn parents_of(&self, alias: &str) -> Vec<(String, String)> {
        self.edges(alias, Direction::Incoming)
    }

    fn edges(&self, alias: &str, direction: Direction) -> Vec<(String, String)> {
        let Some(&index) = self.node_map.get(alias) else {
            return Vec::new();
        };
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(index, direction)
            .map(|edge| {
                let other = match direction {
                    Direction::Outgoing => edge.target(),
                    Direction::Incoming => edge.source(),
                };
                (edge.id(), self.graph[other].clone(), edge.weight().clone())
            })
            .collect();
        edges.sort_by_key(|(id, _, _)| *id);
        edges.into_iter().map(|(_, other, property)| (other, property)).collect()
    }

    /// Whether `alias` is a node.
    pub fn contains(&self, alias: &str) -> bool {
        self.node_map.contains_key(alias)
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Number of aliases.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of dependency edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Human-readable tree of the aliases that depend on `root`.
    pub fn to_tree_string(&self, root: &str) -> String {
        let mut result = format!("{root}\n");
        let mut visited = HashSet::from([root.to_string()]);
        let children = self.dependents_of(root);
        for (i, (child, property)) in children.iter().enumerate() {
            let is_last = i == children.len() - 1;
            self.build_tree_string(child, property, &mut result, "", is_last, &mut visited);
        }
        result
    }

    fn build_tree_string(
        &self,
        alias: &str,
        property: &str,
        result: &mut String,
        prefix: &str,
        is_last: bool,
        visited: &mut HashSet<String>,
    ) {
        let connector = if is_last {
            "└── "
        } else {
            "├── "
        };
        result.push_str(&format!("{prefix}{connector}{alias} (on {property})\n"));

        let child_prefix = if is_last {
            format!("{prefix}    ")
        } else {
            format!("{prefix}│   ")
        };
        if !visited.insert(alias.to_string()) {
            return;
        }

        let children = self.dependents_of(alias);
        for (i, (child, child_property)) in children.iter().enumerate() {
            let is_last_child = i == children.len() - 1;
            self.build_tree_string(child, child_property, result, &child_prefix, is_last_child, visited);
        }
    }
}
