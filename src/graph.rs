//! Lineage graph accumulated during a walk, rendered as Graphviz DOT.

use std::collections::{HashMap, HashSet};
use std::fmt::{self, Write as _};
use std::fs;
use std::path::Path;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeColor {
    Gray,
    Red,
}

impl fmt::Display for NodeColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeColor::Gray => write!(f, "gray"),
            NodeColor::Red => write!(f, "red"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeShape {
    Ellipse,
    Box,
}

impl fmt::Display for NodeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeShape::Ellipse => write!(f, "ellipse"),
            NodeShape::Box => write!(f, "box"),
        }
    }
}

/// A node is an image (`name`) or one of its snapshots (`name\n@snap`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub label: String,
    pub color: NodeColor,
    pub shape: NodeShape,
    /// Filled nodes are images nothing in OpenStack refers to
    pub filled: bool,
}

/// Label for a snapshot node
pub fn snapshot_label(image: &str, snapshot: &str) -> String {
    format!("{}\n@{}", image, snapshot)
}

/// Directed graph that keeps insertion order and ignores duplicates.
#[derive(Debug, Default)]
pub struct LineageGraph {
    nodes: Vec<GraphNode>,
    index: HashMap<String, usize>,
    edges: Vec<(String, String)>,
    edge_set: HashSet<(String, String)>,
}

impl LineageGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, or overwrite the attributes of the node with the same label.
    pub fn add_node(&mut self, label: impl Into<String>, color: NodeColor, shape: NodeShape, filled: bool) {
        let label = label.into();
        match self.index.get(&label) {
            Some(&i) => {
                let node = &mut self.nodes[i];
                node.color = color;
                node.shape = shape;
                node.filled = filled;
            }
            None => {
                self.index.insert(label.clone(), self.nodes.len());
                self.nodes.push(GraphNode {
                    label,
                    color,
                    shape,
                    filled,
                });
            }
        }
    }

    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) {
        let edge = (from.into(), to.into());
        if self.edge_set.insert(edge.clone()) {
            self.edges.push(edge);
        }
    }

    pub fn contains(&self, label: &str) -> bool {
        self.index.contains_key(label)
    }

    pub fn node(&self, label: &str) -> Option<&GraphNode> {
        self.index.get(label).map(|&i| &self.nodes[i])
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[(String, String)] {
        &self.edges
    }

    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.edge_set.contains(&(from.to_string(), to.to_string()))
    }

    /// Serialize as a strict Graphviz digraph.
    pub fn render(&self) -> String {
        let mut out = String::from("strict digraph {\n");
        for node in &self.nodes {
            let _ = write!(
                out,
                "\t{} [color={}, shape={}",
                quote(&node.label),
                node.color,
                node.shape
            );
            if node.filled {
                out.push_str(", style=filled");
            }
            out.push_str("];\n");
        }
        for (from, to) in &self.edges {
            let _ = writeln!(out, "\t{} -> {};", quote(from), quote(to));
        }
        out.push_str("}\n");
        out
    }

    /// Render and write to `path`.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.render())?;
        Ok(())
    }
}

/// Quote a DOT ID. Newlines become the `\n` escape Graphviz renders as a line break.
fn quote(id: &str) -> String {
    let mut out = String::with_capacity(id.len() + 2);
    out.push('"');
    for c in id.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}
