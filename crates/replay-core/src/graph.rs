//! Directed dependency graph between endpoints, exportable as Graphviz DOT

use indexmap::{IndexMap, IndexSet};
use openapi_parser::{ApiOperation, HttpMethod};

use crate::planner::ExecutionPlan;

/// Endpoint dependency graph
#[derive(Debug, Clone, Default)]
pub struct ExecutionGraph {
    /// Adjacency list, insertion ordered
    edges: IndexMap<String, IndexSet<String>>,
}

impl ExecutionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an edge `from -> to`; both nodes are created as needed
    pub fn add_dependency(&mut self, from: &str, to: &str) {
        self.add_node(to);
        self.edges
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
    }

    pub fn add_node(&mut self, api: &str) {
        self.edges.entry(api.to_string()).or_default();
    }

    /// Chain consecutive plan entries
    pub fn from_plan(plan: &ExecutionPlan) -> Self {
        let mut graph = Self::new();
        let order: Vec<&str> = plan.iter().collect();

        for api in &order {
            graph.add_node(api);
        }
        for pair in order.windows(2) {
            graph.add_dependency(pair[0], pair[1]);
        }
        graph
    }

    /// Infer dependencies from paths: a `POST` on a collection precedes
    /// every operation on its `/{id}` item paths.
    pub fn from_operations(operations: &[ApiOperation]) -> Self {
        let mut graph = Self::new();

        for op in operations {
            graph.add_node(&op.key());
        }

        for creator in operations.iter().filter(|op| op.method == HttpMethod::Post) {
            let item_prefix = format!("{}/{{", creator.path.trim_end_matches('/'));
            for dependent in operations {
                if dependent.path.starts_with(&item_prefix) {
                    graph.add_dependency(&creator.key(), &dependent.key());
                }
            }
        }
        graph
    }

    pub fn node_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(IndexSet::len).sum()
    }

    pub fn dependents(&self, api: &str) -> impl Iterator<Item = &str> {
        self.edges
            .get(api)
            .into_iter()
            .flat_map(|targets| targets.iter().map(String::as_str))
    }

    /// Render as a Graphviz digraph
    pub fn to_dot(&self, title: &str) -> String {
        let mut dot = format!("digraph {} {{\n", quote(title));
        dot.push_str("  node [shape=box, style=filled, fillcolor=lightblue];\n");

        for node in self.edges.keys() {
            dot.push_str(&format!("  {};\n", quote(node)));
        }
        for (from, targets) in &self.edges {
            for to in targets {
                dot.push_str(&format!("  {} -> {};\n", quote(from), quote(to)));
            }
        }

        dot.push_str("}\n");
        dot
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}
