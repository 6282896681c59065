//! Graph export for debugging.
//!
//! Dumps the flow graph as JSON or graphviz text. Node names are the debug
//! names assigned during building; the special singletons are ranked
//! together so forced paths read left to right.

use crate::graph::{NodeId, Nullability};
use crate::registry::TypeSystem;
use anyhow::Result;
use serde::Serialize;
use std::fmt::Write as _;

#[derive(Serialize)]
struct NodeDump<'a> {
    id: u32,
    nullability: Nullability,
    name: Option<&'a str>,
}

#[derive(Serialize)]
struct EdgeDump<'a> {
    source: u32,
    target: u32,
    label: &'a str,
}

#[derive(Serialize)]
struct GraphDump<'a> {
    nodes: Vec<NodeDump<'a>>,
    edges: Vec<EdgeDump<'a>>,
}

/// Serialize the graph as pretty-printed JSON.
pub fn to_json(types: &TypeSystem) -> Result<String> {
    let dump = GraphDump {
        nodes: types
            .graph
            .nodes
            .iter()
            .map(|(id, node)| NodeDump {
                id: id.0,
                nullability: node.nullability,
                name: node.name.as_deref(),
            })
            .collect(),
        edges: types
            .graph
            .edges()
            .map(|(_, edge)| EdgeDump {
                source: edge.source.0,
                target: edge.target.0,
                label: edge.label,
            })
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&dump)?)
}

/// Render the graph as graphviz `dot` text.
pub fn to_dot(types: &TypeSystem) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph nullability {{");
    let _ = writeln!(out, "  rankdir=LR;");
    let _ = writeln!(out, "  node [shape=ellipse, fontsize=10];");
    for (id, node) in types.graph.nodes.iter() {
        let label = node.name.as_deref().unwrap_or("");
        let shape = match node.nullability {
            Nullability::Inferred => "ellipse",
            _ => "box",
        };
        let _ = writeln!(
            out,
            "  n{} [label=\"{}\", shape={}];",
            id.0,
            escape(label),
            shape
        );
    }
    let _ = writeln!(
        out,
        "  {{ rank=same; n{}; n{}; n{}; }}",
        NodeId::NULLABLE.0,
        NodeId::NON_NULL.0,
        NodeId::OBLIVIOUS.0
    );
    for (_, edge) in types.graph.edges() {
        let _ = writeln!(
            out,
            "  n{} -> n{} [label=\"{}\"];",
            edge.source.0,
            edge.target.0,
            escape(edge.label)
        );
    }
    let _ = writeln!(out, "}}");
    out
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_output_contains_the_special_nodes() {
        let types = TypeSystem::new(0);
        let dot = to_dot(&types);
        assert!(dot.starts_with("digraph nullability {"));
        assert!(dot.contains("<nullable>"));
        assert!(dot.contains("<nonnull>"));
        assert!(dot.contains("rank=same"));
    }

    #[test]
    fn json_round_trips_through_serde() {
        let types = TypeSystem::new(0);
        let json = to_json(&types).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["nodes"].as_array().unwrap().len(), 3);
    }
}
