//! Code-unit selection, shared by the mapping and printing passes.

use tree_sitter::Node;

/// How the reducer treats a parse-tree node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeClass {
    /// A top-level or member declaration; a deletable unit.
    Declaration,
    /// A statement; a deletable unit.
    Statement,
    /// One of the expression kinds worth deleting on their own.
    RelevantExpression,
    /// A variable or function use; feeds the pending-reference list.
    Reference,
    /// Not a code unit.
    Skip,
}

/// Statements become units; pure sub-expressions do not.
const STATEMENT_KINDS: &[&str] = &[
    "break_statement",
    "case_statement",
    "compound_statement",
    "continue_statement",
    "do_statement",
    "expression_statement",
    "for_range_loop",
    "for_statement",
    "goto_statement",
    "if_statement",
    "labeled_statement",
    "return_statement",
    "switch_statement",
    "throw_statement",
    "try_statement",
    "while_statement",
];

/// Declarations become units. The translation unit and visibility markers
/// never appear here; type specifiers only count when they carry a body.
const DECLARATION_KINDS: &[&str] = &[
    "alias_declaration",
    "enumerator",
    "field_declaration",
    "friend_declaration",
    "function_definition",
    "linkage_specification",
    "namespace_definition",
    "template_declaration",
    "type_definition",
    "using_declaration",
];

/// Type specifiers that are units only when they define a body; a bodiless
/// `struct S` is a type use, not a declaration.
const TYPE_SPECIFIER_KINDS: &[&str] =
    &["class_specifier", "enum_specifier", "struct_specifier", "union_specifier"];

/// The relevant-expression subset: deleting one of these still yields a
/// syntactically plausible program. Generic binary operators are skipped;
/// assignments (plain and compound) all parse as `assignment_expression`.
const EXPRESSION_KINDS: &[&str] = &[
    "assignment_expression",
    "call_expression",
    "conditional_expression",
    "delete_expression",
    "lambda_expression",
    "new_expression",
    "unary_expression",
    "update_expression",
];

/// Containers whose direct `declaration` children play the declaration role
/// rather than the statement role.
const TOP_LEVEL_PARENTS: &[&str] =
    &["declaration_list", "linkage_specification", "namespace_definition", "translation_unit"];

/// Decides what a node is to the reducer. Both passes apply this to the same
/// post-order walk, which keeps their traversal indices aligned.
pub fn classify(node: &Node<'_>) -> NodeClass {
    let kind = node.kind();

    if kind == "identifier" {
        return NodeClass::Reference;
    }

    if EXPRESSION_KINDS.contains(&kind) {
        return NodeClass::RelevantExpression;
    }

    if kind == "declaration" {
        // Globals play the declaration role, locals the statement role.
        let top_level = node
            .parent()
            .is_some_and(|parent| TOP_LEVEL_PARENTS.contains(&parent.kind()));
        return if top_level { NodeClass::Declaration } else { NodeClass::Statement };
    }

    if STATEMENT_KINDS.contains(&kind) {
        return NodeClass::Statement;
    }

    if DECLARATION_KINDS.contains(&kind) {
        return NodeClass::Declaration;
    }

    if TYPE_SPECIFIER_KINDS.contains(&kind) && node.child_by_field_name("body").is_some() {
        return NodeClass::Declaration;
    }

    NodeClass::Skip
}

/// GraphViz colour hint for a mapped unit.
pub fn unit_color(node: &Node<'_>, class: NodeClass) -> &'static str {
    if node.kind() == "call_expression" {
        "goldenrod"
    } else if class == NodeClass::Declaration {
        "crimson"
    } else {
        "darkorchid"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::SourceTree;
    use autopie_common::Language;

    fn classes_of(source: &str, language: Language) -> Vec<(String, NodeClass)> {
        let tree = SourceTree::parse(source.to_owned(), language).unwrap();
        tree.post_order()
            .iter()
            .map(|node| (node.kind().to_owned(), classify(node)))
            .collect()
    }

    fn class_of(classes: &[(String, NodeClass)], kind: &str) -> NodeClass {
        classes
            .iter()
            .find(|(k, _)| k == kind)
            .unwrap_or_else(|| panic!("kind {kind} not present"))
            .1
    }

    #[test]
    fn statements_and_relevant_expressions_are_units() {
        let classes = classes_of(
            "int main() {\n    int x = 0;\n    x = x + 1;\n    f(x);\n    return 0;\n}\n",
            Language::C,
        );

        assert_eq!(class_of(&classes, "compound_statement"), NodeClass::Statement);
        assert_eq!(class_of(&classes, "expression_statement"), NodeClass::Statement);
        assert_eq!(class_of(&classes, "return_statement"), NodeClass::Statement);
        assert_eq!(class_of(&classes, "assignment_expression"), NodeClass::RelevantExpression);
        assert_eq!(class_of(&classes, "call_expression"), NodeClass::RelevantExpression);
        assert_eq!(class_of(&classes, "function_definition"), NodeClass::Declaration);
        assert_eq!(class_of(&classes, "identifier"), NodeClass::Reference);
        assert_eq!(class_of(&classes, "translation_unit"), NodeClass::Skip);
        // `x + 1` is a generic binary operator, not a unit.
        assert_eq!(class_of(&classes, "binary_expression"), NodeClass::Skip);
        // Number literals are pure sub-expressions.
        assert_eq!(class_of(&classes, "number_literal"), NodeClass::Skip);
    }

    #[test]
    fn declarations_split_between_roles_by_scope() {
        let classes = classes_of("int global = 1;\nint main() { int local = 2; }\n", Language::C);
        let declarations: Vec<NodeClass> = classes
            .iter()
            .filter(|(kind, _)| kind == "declaration")
            .map(|(_, class)| *class)
            .collect();
        assert_eq!(declarations, vec![NodeClass::Declaration, NodeClass::Statement]);
    }

    #[test]
    fn bodiless_type_specifiers_are_not_units() {
        let classes = classes_of("struct point { int x; };\nstruct point p;\n", Language::C);
        let specifiers: Vec<NodeClass> = classes
            .iter()
            .filter(|(kind, _)| kind == "struct_specifier")
            .map(|(_, class)| *class)
            .collect();
        assert_eq!(specifiers, vec![NodeClass::Declaration, NodeClass::Skip]);
        assert_eq!(class_of(&classes, "field_declaration"), NodeClass::Declaration);
    }

    #[test]
    fn preprocessor_nodes_are_skipped() {
        let classes = classes_of("#include <stdio.h>\n#define N 4\nint main() {}\n", Language::C);
        assert_eq!(class_of(&classes, "preproc_include"), NodeClass::Skip);
        assert_eq!(class_of(&classes, "preproc_def"), NodeClass::Skip);
    }

    #[test]
    fn cpp_members_and_lambdas_are_units() {
        let classes = classes_of(
            "class A {\npublic:\n    int v;\n    int get() { return v; }\n};\n\
             int main() { auto f = [] { return 2; }; return f(); }\n",
            Language::Cxx,
        );

        assert_eq!(class_of(&classes, "class_specifier"), NodeClass::Declaration);
        assert_eq!(class_of(&classes, "field_declaration"), NodeClass::Declaration);
        assert_eq!(class_of(&classes, "lambda_expression"), NodeClass::RelevantExpression);
        // Visibility markers are never units.
        assert_eq!(class_of(&classes, "access_specifier"), NodeClass::Skip);
    }
}
