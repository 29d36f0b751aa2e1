//! The parse-tree capability consumed by the mapping and printing passes.
//!
//! Parsing is delegated to the tree-sitter C and C++ grammars. The rest of
//! the reducer only relies on what this module exposes: a post-order
//! traversal with stable per-node identity, byte ranges, kinds, and start
//! lines. Includes are not expanded, so constructs from included files never
//! appear in the tree.

use autopie_common::{text, Language};
use std::ops::Range;
use thiserror::Error;
use tree_sitter::{Node, Parser, Tree};

/// Errors raised while building the parse tree. These invalidate the run.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("the {0} grammar could not be loaded")]
    Grammar(&'static str),
    #[error("the parser did not produce a tree")]
    NoTree,
    #[error("the source contains syntax errors")]
    Syntax,
}

/// A parsed translation unit together with its source buffer. Borrowed
/// read-only by both passes.
pub struct SourceTree {
    source: String,
    tree: Tree,
}

impl SourceTree {
    /// Parses a single translation unit with the grammar matching the
    /// language.
    pub fn parse(source: String, language: Language) -> Result<Self, ParseError> {
        let mut parser = Parser::new();
        let grammar = match language {
            Language::C => tree_sitter_c::LANGUAGE,
            Language::Cxx => tree_sitter_cpp::LANGUAGE,
        };
        parser
            .set_language(&grammar.into())
            .map_err(|_| ParseError::Grammar(language.as_str()))?;

        let tree = parser.parse(&source, None).ok_or(ParseError::NoTree)?;
        if tree.root_node().has_error() {
            return Err(ParseError::Syntax);
        }

        Ok(Self { source, tree })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Named nodes in post-order, children left-to-right. Both passes walk
    /// this exact sequence, which is what keeps their traversal indices
    /// aligned.
    pub fn post_order(&self) -> Vec<Node<'_>> {
        let mut stack = vec![self.root()];
        let mut visited = Vec::new();

        while let Some(node) = stack.pop() {
            visited.push(node);
            for index in 0..node.named_child_count() {
                if let Some(child) = node.named_child(index) {
                    stack.push(child);
                }
            }
        }

        visited.reverse();
        visited
    }

    /// The node's byte range, corrected to include its last token.
    pub fn corrected_range(&self, node: &Node<'_>) -> Range<usize> {
        text::correct_token_end(&self.source, node.byte_range())
    }

    /// Source text of a node's corrected range.
    pub fn node_text(&self, node: &Node<'_>) -> &str {
        text::range_text(&self.source, &self.corrected_range(node))
    }
}

/// 1-based line of the node's first character.
pub fn start_line(node: &Node<'_>) -> u32 {
    node.start_position().row as u32 + 1
}

/// 1-based line of the node's last character.
pub fn end_line(node: &Node<'_>) -> u32 {
    node.end_position().row as u32 + 1
}
