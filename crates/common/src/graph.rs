//! The code-unit dependency graph.
//!
//! Nodes are keyed by their traversal order number, assigned by the mapping
//! pass. Two edge relations are kept: statement edges ("parent syntactically
//! contains child") and variable edges ("use references this declaration").
//! Both come with inverse relations. The criterion set holds the units that
//! must be present in every valid variant.

use crate::text::escape_quotes;
use itertools::Itertools;
use parking_lot::Mutex;
use std::{
    collections::{HashMap, VecDeque},
    fmt::Write as _,
    fs, io,
    path::Path,
};
use tracing::debug;

/// Debug data for a single code unit: its parse-tree identity, the
/// underlying source code, and presentation hints for dumps.
#[derive(Clone, Debug, Default)]
pub struct UnitData {
    pub ast_id: usize,
    pub character_count: i64,
    pub color: &'static str,
    pub snippet: String,
    pub kind: String,
}

/// Keeps the relationships between code units, the criterion set, and the
/// per-unit debug data.
///
/// Built once per reduction run by the mapping pass and read-only afterwards;
/// the descendant cache is the only interior mutability.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    total_characters: i64,
    criterion: Vec<usize>,
    nodes: HashMap<usize, UnitData>,
    statement_edges: HashMap<usize, Vec<usize>>,
    statement_inverse: HashMap<usize, Vec<usize>>,
    variable_edges: HashMap<usize, Vec<usize>>,
    variable_inverse: HashMap<usize, Vec<usize>>,
    dependents_cache: Mutex<HashMap<usize, Vec<usize>>>,
}

impl DependencyGraph {
    /// Adds a node to the criterion set and recolours it.
    pub fn add_criterion(&mut self, node: usize) {
        if !self.criterion.contains(&node) {
            self.criterion.push(node);
        }
        self.nodes.entry(node).or_default().color = "green";
    }

    /// Whether the node must be present in every valid variant.
    pub fn is_criterion(&self, node: usize) -> bool {
        self.criterion.contains(&node)
    }

    /// The criterion set in insertion order.
    pub fn criterion(&self) -> &[usize] {
        &self.criterion
    }

    fn insert_edge(
        edges: &mut HashMap<usize, Vec<usize>>,
        inverse: &mut HashMap<usize, Vec<usize>>,
        parent: usize,
        child: usize,
    ) {
        if parent == child {
            return;
        }
        let children = edges.entry(parent).or_default();
        if children.contains(&child) {
            // The dependency has already been made.
            return;
        }
        children.push(child);
        inverse.entry(child).or_default().push(parent);
    }

    /// Adds a statement dependency edge: deleting `parent` requires deleting
    /// `child`.
    pub fn insert_statement_edge(&mut self, parent: usize, child: usize) {
        Self::insert_edge(&mut self.statement_edges, &mut self.statement_inverse, parent, child);
    }

    /// Adds a variable dependency edge from a declaration to one of its
    /// uses.
    pub fn insert_variable_edge(&mut self, declaration: usize, usage: usize) {
        Self::insert_edge(&mut self.variable_edges, &mut self.variable_inverse, declaration, usage);
    }

    /// Records debug data for a unit. On a re-enter path the earlier colour
    /// wins; count and kind are replaced.
    pub fn insert_unit_data(
        &mut self,
        node: usize,
        ast_id: usize,
        snippet: String,
        kind: &str,
        color: &'static str,
    ) {
        let entry = self.nodes.entry(node).or_default();
        let color = if entry.color.is_empty() { color } else { entry.color };
        *entry = UnitData {
            ast_id,
            character_count: snippet.len() as i64,
            color,
            snippet,
            kind: kind.to_owned(),
        };
    }

    /// Debug data for the given unit, if it was mapped.
    pub fn unit_data(&self, node: usize) -> Option<&UnitData> {
        self.nodes.get(&node)
    }

    /// Corrected character count of a unit; zero for skipped indices.
    pub fn character_count(&self, node: usize) -> i64 {
        self.nodes.get(&node).map_or(0, |data| data.character_count)
    }

    /// Number of mapped units.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn dependents_in(container: &HashMap<usize, Vec<usize>>, start: usize) -> Vec<usize> {
        let mut queue = VecDeque::from([start]);
        let mut dependents = Vec::new();

        while let Some(current) = queue.pop_front() {
            if let Some(children) = container.get(&current) {
                for &child in children {
                    queue.push_back(child);
                    dependents.push(child);
                }
            }
        }

        dependents
    }

    /// All statement-dependent descendants, found breadth-first.
    pub fn statement_dependents(&self, node: usize) -> Vec<usize> {
        Self::dependents_in(&self.statement_edges, node)
    }

    /// All variable-dependent descendants, found breadth-first.
    pub fn variable_dependents(&self, node: usize) -> Vec<usize> {
        Self::dependents_in(&self.variable_edges, node)
    }

    /// Union of statement and variable descendants. The search queries this
    /// per bit per bitmask, so results are cached.
    pub fn dependents_of(&self, node: usize) -> Vec<usize> {
        if let Some(cached) = self.dependents_cache.lock().get(&node) {
            return cached.clone();
        }

        let mut dependents = self.statement_dependents(node);
        dependents.extend(self.variable_dependents(node));
        self.dependents_cache.lock().insert(node, dependents.clone());
        dependents
    }

    /// Direct statement parents of a unit.
    pub fn statement_parents(&self, node: usize) -> &[usize] {
        self.statement_inverse.get(&node).map_or(&[], Vec::as_slice)
    }

    /// Corrects per-unit character counts so that a parent's count excludes
    /// its statement children, then freezes the graph total.
    pub fn finalize(&mut self) {
        let mut corrected = HashMap::new();

        for (&parent, children) in &self.statement_edges {
            let mut count = self.character_count(parent);
            for &child in children {
                count -= self.character_count(child);
            }
            corrected.insert(parent, count);
        }

        for (node, count) in corrected {
            if let Some(data) = self.nodes.get_mut(&node) {
                data.character_count = count;
            }
        }

        self.total_characters = self.nodes.values().map(|data| data.character_count).sum();
    }

    /// The graph's total character count, fixed by [`Self::finalize`].
    pub fn total_character_count(&self) -> i64 {
        self.total_characters
    }

    /// Logs the graph node by node.
    pub fn dump_for_debugging(&self) {
        debug!("===------------------- Dependency graph and its code --------------------===");
        for (node, data) in self.nodes.iter().sorted_by_key(|(&node, _)| node) {
            debug!("Node {node}:\n{}", data.snippet);
        }
        debug!("Characters total: {}", self.total_character_count());
        debug!("===----------------------------------------------------------------------===");
    }

    /// Renders the graph in the stable GraphViz format: statement edges
    /// default-coloured, variable edges maroon.
    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph g {\nforcelabels=true;\nrankdir=TD;\n");

        for (node, data) in self.nodes.iter().sorted_by_key(|(&node, _)| node) {
            writeln!(
                dot,
                "{node}[label=\"{}\", xlabel=\"No. {node} ({}), {}\", color=\"{}\"];",
                escape_quotes(&data.snippet),
                data.ast_id,
                data.kind,
                data.color,
            )
            .expect("writing to a string cannot fail");
        }

        for (parent, children) in self.statement_edges.iter().sorted_by_key(|(&parent, _)| parent) {
            for child in children {
                writeln!(dot, "{parent} -> {child};").expect("writing to a string cannot fail");
            }
        }

        for (parent, children) in self.variable_edges.iter().sorted_by_key(|(&parent, _)| parent) {
            for child in children {
                writeln!(dot, "{parent} -> {child} [color=maroon];")
                    .expect("writing to a string cannot fail");
            }
        }

        dot.push_str("}\n");
        dot
    }

    /// Dumps the GraphViz rendering to the given path.
    pub fn write_dot(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.to_dot())
    }
}
