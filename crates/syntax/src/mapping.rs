//! The mapping pass: a post-order walk that assigns traversal order
//! numbers, builds the dependency graph, and collects everything later
//! passes need — the skipped indices, the criterion set, and the potential
//! error lines.

use crate::{
    classify::{classify, unit_color, NodeClass},
    tree::{end_line, start_line, SourceTree},
};
use autopie_common::DependencyGraph;
use std::{
    collections::{HashMap, HashSet},
    ops::Range,
};
use tracing::debug;
use tree_sitter::Node;

/// Everything the mapping pass learns about a source file. Immutable once
/// built; the printing pass and the searches only read it.
#[derive(Debug)]
pub struct MappingResult {
    pub graph: DependencyGraph,
    /// Traversal counter at the end of the walk; the bitmask length.
    pub unit_count: usize,
    /// Traversal indices of duplicate nodes that later passes must skip.
    pub skipped: HashSet<usize>,
    /// Lines the debugger may report for the error: the user's line plus
    /// the enclosing function's signature and closing-brace lines.
    pub potential_error_lines: Vec<u32>,
}

/// Maps the source file against the user's error line.
pub fn map_units(tree: &SourceTree, error_line: u32) -> MappingResult {
    let mut mapper = Mapper::new(tree, error_line);

    for node in tree.post_order() {
        match classify(&node) {
            NodeClass::Skip => {}
            NodeClass::Reference => mapper.handle_reference(&node),
            class => mapper.process_unit(&node, class),
        }
    }

    mapper.finish()
}

/// A variable use waiting for the unit that encloses it.
struct PendingReference {
    name: String,
    range: Range<usize>,
}

/// A mapped unit that has not been adopted by a statement parent yet.
struct PendingChild {
    index: usize,
    range: Range<usize>,
}

struct Mapper<'t> {
    tree: &'t SourceTree,
    error_line: u32,
    graph: DependencyGraph,
    next_index: usize,
    skipped: HashSet<usize>,
    /// Corrected range to first traversal index; the dedup key.
    range_map: HashMap<(usize, usize), usize>,
    /// Declared identifier to the unit that declares it.
    declared_names: HashMap<String, usize>,
    pending_references: Vec<PendingReference>,
    pending_children: Vec<PendingChild>,
    /// Criterion unit ranges still waiting for their enclosing function.
    unresolved_criteria: Vec<Range<usize>>,
    potential_error_lines: Vec<u32>,
}

impl<'t> Mapper<'t> {
    fn new(tree: &'t SourceTree, error_line: u32) -> Self {
        Self {
            tree,
            error_line,
            graph: DependencyGraph::default(),
            next_index: 0,
            skipped: HashSet::new(),
            range_map: HashMap::new(),
            declared_names: HashMap::new(),
            pending_references: Vec::new(),
            pending_children: Vec::new(),
            unresolved_criteria: Vec::new(),
            potential_error_lines: vec![error_line],
        }
    }

    fn process_unit(&mut self, node: &Node<'t>, class: NodeClass) {
        let range = self.tree.corrected_range(node);
        let index = self.next_index;
        self.next_index += 1;

        if let Some(&first) = self.range_map.get(&(range.start, range.end)) {
            // This node's code has already been processed.
            debug!("Attempted to visit node {index} (range already mapped to {first}).");
            self.skipped.insert(index);
            return;
        }

        let kind = node.kind();
        let line = start_line(node);
        debug!("Node {index}: Type {kind}");

        if line == self.error_line {
            self.graph.add_criterion(index);
            self.unresolved_criteria.push(range.clone());
        }

        self.range_map.insert((range.start, range.end), index);
        let snippet = self.tree.node_text(node).to_owned();
        self.graph.insert_unit_data(index, node.id(), snippet, kind, unit_color(node, class));

        match kind {
            "function_definition" => self.process_function(node, index, &range),
            "declaration" | "field_declaration" => self.record_declared_names(node, index),
            _ => {}
        }

        self.adopt_children(index, &range);
        self.resolve_references(index, &range);

        if kind == "call_expression" {
            self.link_callee(node, index);
        }

        self.pending_children.push(PendingChild { index, range });
    }

    /// Function-specific mapping: the declared name, the program-entry
    /// criterion, and the error-line workaround for the enclosing function.
    fn process_function(&mut self, node: &Node<'t>, index: usize, range: &Range<usize>) {
        if let Some(name) = node
            .child_by_field_name("declarator")
            .and_then(|declarator| declarator_identifier(&declarator))
            .map(|identifier| self.tree.node_text(&identifier).to_owned())
        {
            if name == "main" {
                self.graph.add_criterion(index);
            }
            self.declared_names.insert(name, index);
        }

        // A stop reported anywhere in the signature or on the closing brace
        // of the function holding the criterion counts as the error line.
        let enclosed: Vec<Range<usize>> = {
            let (inside, outside) = self
                .unresolved_criteria
                .drain(..)
                .partition(|criterion| contains(range, criterion));
            self.unresolved_criteria = outside;
            inside
        };

        if !enclosed.is_empty() {
            let function_start = start_line(node);
            let function_end = end_line(node);

            if let Some(body) = node.child_by_field_name("body") {
                self.potential_error_lines.extend(function_start..=start_line(&body));
                self.potential_error_lines.extend(end_line(&body)..=function_end);
            } else {
                self.potential_error_lines.push(function_start);
            }
        }
    }

    /// Inserts statement edges to every already-mapped unit inside this
    /// node's range that has no statement parent yet.
    fn adopt_children(&mut self, index: usize, range: &Range<usize>) {
        let mut kept = Vec::with_capacity(self.pending_children.len());
        for child in self.pending_children.drain(..) {
            if contains(range, &child.range) {
                self.graph.insert_statement_edge(index, child.index);
            } else {
                kept.push(child);
            }
        }
        self.pending_children = kept;
    }

    /// Turns pending declaration references inside this node's range into
    /// variable edges, provided the declaration is mapped.
    fn resolve_references(&mut self, index: usize, range: &Range<usize>) {
        let mut kept = Vec::with_capacity(self.pending_references.len());
        for reference in self.pending_references.drain(..) {
            match self.declared_names.get(&reference.name) {
                Some(&declaration) if contains(range, &reference.range) => {
                    self.graph.insert_variable_edge(declaration, index);
                }
                _ => kept.push(reference),
            }
        }
        self.pending_references = kept;
    }

    /// Adds a variable edge from the callee's declaration to the call.
    fn link_callee(&mut self, node: &Node<'t>, index: usize) {
        let Some(callee) = node.child_by_field_name("function") else { return };
        if callee.kind() != "identifier" {
            return;
        }
        if let Some(&declaration) = self.declared_names.get(self.tree.node_text(&callee)) {
            self.graph.insert_variable_edge(declaration, index);
        }
    }

    /// Records the identifiers a declaration introduces, so later uses can
    /// depend on it.
    fn record_declared_names(&mut self, node: &Node<'t>, index: usize) {
        let mut cursor = node.walk();
        let declarators: Vec<Node<'t>> =
            node.children_by_field_name("declarator", &mut cursor).collect();
        for declarator in declarators {
            if let Some(identifier) = declarator_identifier(&declarator) {
                self.declared_names.insert(self.tree.node_text(&identifier).to_owned(), index);
            }
        }
    }

    /// Queues a variable use for the unit that will enclose it.
    fn handle_reference(&mut self, node: &Node<'t>) {
        if is_declaration_name(node) {
            return;
        }
        let name = self.tree.node_text(node).to_owned();
        self.pending_references.push(PendingReference { name, range: node.byte_range() });
    }

    fn finish(mut self) -> MappingResult {
        self.graph.finalize();
        self.potential_error_lines.sort_unstable();
        self.potential_error_lines.dedup();

        debug!(
            "AST nodes counted: {}, AST nodes actual: {}",
            self.next_index,
            self.graph.len()
        );

        MappingResult {
            graph: self.graph,
            unit_count: self.next_index,
            skipped: self.skipped,
            potential_error_lines: self.potential_error_lines,
        }
    }
}

fn contains(outer: &Range<usize>, inner: &Range<usize>) -> bool {
    outer.start <= inner.start && inner.end <= outer.end
}

/// Descends through declarator wrappers to the declared identifier.
fn declarator_identifier<'t>(node: &Node<'t>) -> Option<Node<'t>> {
    match node.kind() {
        "identifier" | "field_identifier" => Some(*node),
        "qualified_identifier" => {
            node.child_by_field_name("name").and_then(|name| declarator_identifier(&name))
        }
        _ => node.child_by_field_name("declarator").and_then(|inner| declarator_identifier(&inner)),
    }
}

/// Whether this identifier is the declared name inside its parent, rather
/// than a use.
fn is_declaration_name(node: &Node<'_>) -> bool {
    let Some(parent) = node.parent() else { return false };
    let mut cursor = parent.walk();
    if parent.children_by_field_name("declarator", &mut cursor).any(|child| child.id() == node.id())
    {
        return true;
    }
    parent.child_by_field_name("name").is_some_and(|name| name.id() == node.id())
}
