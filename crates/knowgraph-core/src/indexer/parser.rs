//! C# source-fact provider built on tree-sitter.
//!
//! Walks the syntax tree once per concern (declarations, complexity, locals,
//! calls, constructor assignments). All walks are iterative so deeply nested
//! expressions cannot exhaust a worker thread's stack.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tree_sitter::{Node, Parser};

use crate::errors::{KnowgraphError, KnowgraphResult};
use crate::indexer::facts::{
    AssignmentFact, CallFact, ConstructKind, ControlConstruct, MemberFact, MemberKind,
    ParameterFact, Receiver, SourceFactProvider, SourceFacts, TypeFact,
};
use crate::indexer::metrics::count_code_lines;
use crate::models::{TypeKind, LANGUAGE_CSHARP};

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@?[A-Za-z_][A-Za-z0-9_]*$").unwrap());

const MODIFIER_KEYWORDS: &[&str] = &[
    "public",
    "private",
    "protected",
    "internal",
    "static",
    "readonly",
    "abstract",
    "sealed",
    "virtual",
    "override",
    "async",
    "partial",
    "const",
    "extern",
    "unsafe",
    "volatile",
    "required",
];

const BOOLEAN_OPERATORS: &[&str] = &["&&", "||", "??"];

/// Parses `.cs` files with `tree-sitter-c-sharp`.
#[derive(Clone, Copy, Debug, Default)]
pub struct CSharpFactProvider;

impl CSharpFactProvider {
    pub fn new() -> Self {
        Self
    }
}

impl SourceFactProvider for CSharpFactProvider {
    fn language(&self) -> &'static str {
        LANGUAGE_CSHARP
    }

    fn handles(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("cs"))
    }

    fn parse(&self, source: &str) -> KnowgraphResult<SourceFacts> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_c_sharp::LANGUAGE.into())
            .map_err(|e| KnowgraphError::Parse(format!("Failed to set language: {e}")))?;
        let tree = parser
            .parse(source.as_bytes(), None)
            .ok_or_else(|| KnowgraphError::Parse("parser produced no tree".to_string()))?;

        let root = tree.root_node();
        if root.has_error() {
            return Err(KnowgraphError::Parse(format!(
                "syntax error at line {}",
                first_error_line(root)
            )));
        }

        let mut collector = FactCollector {
            source,
            facts: SourceFacts::default(),
        };
        collector.visit_scope(root, None, &[]);
        Ok(collector.facts)
    }
}

// ---------------------------------------------------------------------------
// Node helpers
// ---------------------------------------------------------------------------

fn line_of(node: Node<'_>) -> i64 {
    node.start_position().row as i64 + 1
}

fn end_line_of(node: Node<'_>) -> i64 {
    node.end_position().row as i64 + 1
}

fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

fn all_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

fn find_child<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    named_children(node).into_iter().find(|c| c.kind() == kind)
}

fn first_error_line(root: Node<'_>) -> i64 {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            return line_of(node);
        }
        for child in all_children(node).into_iter().rev() {
            if child.has_error() || child.is_missing() {
                stack.push(child);
            }
        }
    }
    line_of(root)
}

fn type_kind(kind: &str) -> Option<TypeKind> {
    match kind {
        "class_declaration" => Some(TypeKind::Class),
        "interface_declaration" => Some(TypeKind::Interface),
        "struct_declaration" => Some(TypeKind::Struct),
        "record_declaration" | "record_struct_declaration" => Some(TypeKind::Record),
        "enum_declaration" => Some(TypeKind::Enum),
        _ => None,
    }
}

/// Remove all whitespace, so multi-line fluent chains compare as one token.
fn squash(text: &str) -> String {
    text.split_whitespace().collect()
}

fn is_identifier(text: &str) -> bool {
    IDENTIFIER_RE.is_match(text)
}

fn strip_verbatim(text: &str) -> String {
    text.strip_prefix('@').unwrap_or(text).to_string()
}

fn join_namespace(outer: Option<&str>, inner: &str) -> String {
    let inner = squash(inner);
    match outer {
        Some(outer) if !outer.is_empty() => format!("{outer}.{inner}"),
        _ => inner,
    }
}

// ---------------------------------------------------------------------------
// Collector
// ---------------------------------------------------------------------------

struct FactCollector<'s> {
    source: &'s str,
    facts: SourceFacts,
}

impl<'s> FactCollector<'s> {
    fn text(&self, node: Node<'_>) -> &'s str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    fn field_text(&self, node: Node<'_>, field: &str) -> Option<String> {
        node.child_by_field_name(field)
            .map(|n| squash(self.text(n)))
            .filter(|t| !t.is_empty())
    }

    fn modifiers(&self, node: Node<'_>) -> Vec<String> {
        let mut out = Vec::new();
        for child in all_children(node) {
            if child.kind() == "modifier" {
                out.push(self.text(child).trim().to_string());
            } else if !child.is_named() && MODIFIER_KEYWORDS.contains(&child.kind()) {
                out.push(child.kind().to_string());
            }
        }
        out
    }

    /// Identifier text of a simple or generic name, without type arguments.
    fn simple_name(&self, node: Node<'_>) -> String {
        if node.kind() == "generic_name" {
            if let Some(id) = find_child(node, "identifier") {
                return strip_verbatim(self.text(id));
            }
        }
        let text = squash(self.text(node));
        let cut = text.split('<').next().unwrap_or("");
        strip_verbatim(cut)
    }

    fn declared_name(&self, node: Node<'_>) -> Option<String> {
        node.child_by_field_name("name")
            .or_else(|| find_child(node, "identifier"))
            .map(|n| strip_verbatim(self.text(n).trim()))
            .filter(|n| !n.is_empty())
    }

    // -- declarations -------------------------------------------------------

    fn visit_scope(&mut self, node: Node<'_>, namespace: Option<&str>, nesting: &[String]) {
        let mut namespace = namespace.map(str::to_string);
        for child in named_children(node) {
            match child.kind() {
                "namespace_declaration" => {
                    let name = child
                        .child_by_field_name("name")
                        .map(|n| self.text(n))
                        .unwrap_or("");
                    let full = join_namespace(namespace.as_deref(), name);
                    if let Some(body) = child
                        .child_by_field_name("body")
                        .or_else(|| find_child(child, "declaration_list"))
                    {
                        self.visit_scope(body, Some(full.as_str()), nesting);
                    }
                }
                "file_scoped_namespace_declaration" => {
                    let name = child
                        .child_by_field_name("name")
                        .map(|n| self.text(n))
                        .unwrap_or("");
                    let full = join_namespace(namespace.as_deref(), name);
                    // Declarations may hang off the namespace node or follow it.
                    self.visit_scope(child, Some(full.as_str()), nesting);
                    namespace = Some(full);
                }
                "declaration_list" => self.visit_scope(child, namespace.as_deref(), nesting),
                kind if type_kind(kind).is_some() => {
                    self.visit_type(child, namespace.as_deref(), nesting)
                }
                _ => {}
            }
        }
    }

    fn visit_type(&mut self, node: Node<'_>, namespace: Option<&str>, nesting: &[String]) {
        let Some(kind) = type_kind(node.kind()) else {
            return;
        };
        let Some(name) = self.declared_name(node) else {
            return;
        };

        let base_types = find_child(node, "base_list")
            .map(|list| self.base_list(list))
            .unwrap_or_default();
        let primary_constructor = find_child(node, "parameter_list")
            .map(|list| self.parameters(list))
            .unwrap_or_default();

        let owner = self.facts.types.len();
        self.facts.types.push(TypeFact {
            name: name.clone(),
            namespace: namespace.map(str::to_string),
            nesting: nesting.to_vec(),
            kind,
            modifiers: self.modifiers(node),
            base_types,
            start_line: line_of(node),
            end_line: end_line_of(node),
            primary_constructor,
        });

        if kind == TypeKind::Enum {
            return;
        }
        let mut inner = nesting.to_vec();
        inner.push(name);
        let body = node
            .child_by_field_name("body")
            .filter(|b| b.kind() == "declaration_list")
            .or_else(|| find_child(node, "declaration_list"));
        if let Some(body) = body {
            self.visit_members(body, owner, namespace, &inner);
        }
    }

    fn base_list(&self, list: Node<'_>) -> Vec<String> {
        let mut out = Vec::new();
        for child in named_children(list) {
            let text = match child.kind() {
                "argument_list" => continue,
                "primary_constructor_base_type" => child
                    .child_by_field_name("type")
                    .or_else(|| child.named_child(0))
                    .map(|n| squash(self.text(n)))
                    .unwrap_or_default(),
                _ => squash(self.text(child)),
            };
            let text = text.split('(').next().unwrap_or("").to_string();
            if !text.is_empty() {
                out.push(text);
            }
        }
        out
    }

    fn parameters(&self, list: Node<'_>) -> Vec<ParameterFact> {
        let mut out = Vec::new();
        for param in named_children(list) {
            if param.kind() != "parameter" && param.kind() != "parameter_array" {
                continue;
            }
            let Some(name) = param
                .child_by_field_name("name")
                .or_else(|| {
                    named_children(param)
                        .into_iter()
                        .filter(|c| c.kind() == "identifier")
                        .last()
                })
                .map(|n| strip_verbatim(self.text(n).trim()))
            else {
                continue;
            };
            let type_name = self.field_text(param, "type");
            out.push(ParameterFact { name, type_name });
        }
        out
    }

    fn visit_members(
        &mut self,
        body: Node<'_>,
        owner: usize,
        namespace: Option<&str>,
        nesting: &[String],
    ) {
        for child in named_children(body) {
            match child.kind() {
                "field_declaration" => self.visit_field(child, owner),
                "property_declaration" => self.visit_property(child, owner),
                "method_declaration" => self.visit_callable(child, owner, MemberKind::Method),
                "constructor_declaration" => {
                    self.visit_callable(child, owner, MemberKind::Constructor)
                }
                kind if type_kind(kind).is_some() => self.visit_type(child, namespace, nesting),
                _ => {}
            }
        }
    }

    fn push_member(&mut self, member: MemberFact) -> usize {
        self.facts.members.push(member);
        self.facts.members.len() - 1
    }

    fn visit_field(&mut self, node: Node<'_>, owner: usize) {
        let Some(decl) = find_child(node, "variable_declaration") else {
            return;
        };
        let declared_type = self.field_text(decl, "type");
        let modifiers = self.modifiers(node);
        for declarator in named_children(decl) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let Some(name) = self.declared_name(declarator) else {
                continue;
            };
            let index = self.push_member(MemberFact {
                owner,
                name,
                kind: MemberKind::Field,
                declared_type: declared_type.clone(),
                modifiers: modifiers.clone(),
                parameters: Vec::new(),
                locals: Vec::new(),
                constructs: Vec::new(),
                lines_of_code: count_code_lines(self.text(node)),
                start_line: line_of(node),
                end_line: end_line_of(node),
            });
            self.collect_calls(declarator, index);
        }
    }

    fn visit_property(&mut self, node: Node<'_>, owner: usize) {
        let Some(name) = self.declared_name(node) else {
            return;
        };
        let index = self.push_member(MemberFact {
            owner,
            name,
            kind: MemberKind::Property,
            declared_type: self.field_text(node, "type"),
            modifiers: self.modifiers(node),
            parameters: Vec::new(),
            locals: Vec::new(),
            constructs: Vec::new(),
            lines_of_code: count_code_lines(self.text(node)),
            start_line: line_of(node),
            end_line: end_line_of(node),
        });
        self.collect_calls(node, index);
    }

    fn visit_callable(&mut self, node: Node<'_>, owner: usize, kind: MemberKind) {
        let name = match kind {
            MemberKind::Constructor => ".ctor".to_string(),
            _ => match self.declared_name(node) {
                Some(name) => name,
                None => return,
            },
        };
        let declared_type = match kind {
            MemberKind::Method => self
                .field_text(node, "returns")
                .or_else(|| self.field_text(node, "type")),
            _ => None,
        };
        let parameters = node
            .child_by_field_name("parameters")
            .or_else(|| find_child(node, "parameter_list"))
            .map(|list| self.parameters(list))
            .unwrap_or_default();
        let body = node
            .child_by_field_name("body")
            .or_else(|| find_child(node, "block"))
            .or_else(|| find_child(node, "arrow_expression_clause"));

        let mut constructs = Vec::new();
        let mut locals = Vec::new();
        if let Some(body) = body {
            self.walk_complexity(body, &mut constructs);
            self.collect_locals(body, &mut locals);
        }

        let index = self.push_member(MemberFact {
            owner,
            name,
            kind,
            declared_type,
            modifiers: self.modifiers(node),
            parameters,
            locals,
            constructs,
            lines_of_code: count_code_lines(self.text(node)),
            start_line: line_of(node),
            end_line: end_line_of(node),
        });

        if let Some(body) = body {
            self.collect_calls(body, index);
            if kind == MemberKind::Constructor {
                self.collect_assignments(body, index);
            }
        }
    }

    // -- method bodies ------------------------------------------------------

    fn has_boolean_operator(&self, node: Node<'_>) -> bool {
        if let Some(op) = node.child_by_field_name("operator") {
            return BOOLEAN_OPERATORS.contains(&self.text(op).trim());
        }
        all_children(node)
            .iter()
            .any(|c| !c.is_named() && BOOLEAN_OPERATORS.contains(&c.kind()))
    }

    fn walk_complexity(&self, body: Node<'_>, out: &mut Vec<ControlConstruct>) {
        let mut stack: Vec<(Node<'_>, u32)> = vec![(body, 0)];
        while let Some((node, depth)) = stack.pop() {
            let kind = node.kind();
            let mut push = |k: ConstructKind| out.push(ControlConstruct { kind: k, nesting: depth });
            let child_depth = match kind {
                "if_statement" => {
                    push(ConstructKind::Branch);
                    depth + 1
                }
                "for_statement" | "for_each_statement" | "foreach_statement"
                | "while_statement" | "do_statement" => {
                    push(ConstructKind::Loop);
                    depth + 1
                }
                "switch_section" => {
                    if !self.text(node).trim_start().starts_with("default") {
                        push(ConstructKind::Case);
                    }
                    depth + 1
                }
                "catch_clause" => {
                    push(ConstructKind::Catch);
                    depth + 1
                }
                "conditional_expression" => {
                    push(ConstructKind::Conditional);
                    depth + 1
                }
                "switch_expression_arm" => {
                    push(ConstructKind::SwitchArm);
                    depth + 1
                }
                "binary_expression" => {
                    if self.has_boolean_operator(node) {
                        push(ConstructKind::BooleanOperator);
                    }
                    depth
                }
                "lambda_expression" | "anonymous_method_expression" | "local_function_statement" => {
                    depth + 1
                }
                _ => depth,
            };

            let alternative = if kind == "if_statement" {
                node.child_by_field_name("alternative").map(|n| n.id())
            } else {
                None
            };
            for child in named_children(node).into_iter().rev() {
                let d = match kind {
                    // `else if` stays at the depth of the first `if`.
                    "if_statement" if Some(child.id()) == alternative => {
                        if matches!(child.kind(), "if_statement" | "else_clause") {
                            depth
                        } else {
                            depth + 1
                        }
                    }
                    "if_statement" if child.kind() == "else_clause" => depth,
                    "else_clause" if child.kind() == "if_statement" => depth,
                    "else_clause" => depth + 1,
                    _ => child_depth,
                };
                stack.push((child, d));
            }
        }
    }

    /// Type of a `new T(...)` initialiser directly under a declarator.
    fn creation_type(&self, declarator: Node<'_>) -> Option<String> {
        for child in named_children(declarator) {
            let candidate = match child.kind() {
                "object_creation_expression" => Some(child),
                "equals_value_clause" => child
                    .named_child(0)
                    .filter(|n| n.kind() == "object_creation_expression"),
                _ => None,
            };
            if let Some(creation) = candidate {
                return self.field_text(creation, "type");
            }
        }
        None
    }

    fn explicit_type(&self, node: Node<'_>) -> Option<String> {
        self.field_text(node, "type").filter(|t| t != "var")
    }

    fn collect_locals(&self, body: Node<'_>, out: &mut Vec<ParameterFact>) {
        let mut stack = vec![body];
        while let Some(node) = stack.pop() {
            match node.kind() {
                "variable_declaration" => {
                    let explicit = self.explicit_type(node);
                    for declarator in named_children(node) {
                        if declarator.kind() != "variable_declarator" {
                            continue;
                        }
                        let Some(name) = self.declared_name(declarator) else {
                            continue;
                        };
                        let type_name = explicit.clone().or_else(|| self.creation_type(declarator));
                        if type_name.is_some() {
                            out.push(ParameterFact { name, type_name });
                        }
                    }
                }
                "foreach_statement" | "for_each_statement" => {
                    let name = node
                        .child_by_field_name("left")
                        .map(|n| squash(self.text(n)))
                        .filter(|n| is_identifier(n));
                    if let (Some(name), Some(type_name)) = (name, self.explicit_type(node)) {
                        out.push(ParameterFact {
                            name: strip_verbatim(&name),
                            type_name: Some(type_name),
                        });
                    }
                }
                "declaration_expression" | "declaration_pattern" => {
                    let name = node
                        .child_by_field_name("name")
                        .or_else(|| node.child_by_field_name("designation"))
                        .map(|n| squash(self.text(n)))
                        .filter(|n| is_identifier(n));
                    if let (Some(name), Some(type_name)) = (name, self.explicit_type(node)) {
                        out.push(ParameterFact {
                            name: strip_verbatim(&name),
                            type_name: Some(type_name),
                        });
                    }
                }
                _ => {}
            }
            stack.extend(named_children(node).into_iter().rev());
        }
    }

    fn receiver_of(&self, expr: Node<'_>) -> Receiver {
        match expr.kind() {
            "this_expression" | "this" => return Receiver::This,
            "base_expression" | "base" => return Receiver::Base,
            "conditional_access_expression" | "member_binding_expression" => {
                return Receiver::ConditionalAccess
            }
            _ => {}
        }
        let text = squash(self.text(expr));
        match text.as_str() {
            "this" => return Receiver::This,
            "base" => return Receiver::Base,
            _ => {}
        }
        if text.contains("?.") {
            return Receiver::ConditionalAccess;
        }
        let segments: Vec<&str> = text.split('.').collect();
        if !segments.is_empty() && segments.iter().all(|s| is_identifier(s)) {
            Receiver::Chain(segments.into_iter().map(strip_verbatim).collect())
        } else {
            Receiver::Complex(text)
        }
    }

    fn call_fact(&self, invocation: Node<'_>, member: usize) -> Option<CallFact> {
        let function = invocation
            .child_by_field_name("function")
            .or_else(|| invocation.named_child(0))?;
        let (method_name, receiver) = match function.kind() {
            "identifier" | "generic_name" => (self.simple_name(function), Receiver::None),
            "member_access_expression" => {
                let name = function
                    .child_by_field_name("name")
                    .or_else(|| function.named_child(function.named_child_count().checked_sub(1)?))?;
                let expr = function
                    .child_by_field_name("expression")
                    .or_else(|| function.named_child(0))?;
                (self.simple_name(name), self.receiver_of(expr))
            }
            "member_binding_expression" => {
                let name = function
                    .child_by_field_name("name")
                    .or_else(|| function.named_child(0))?;
                (self.simple_name(name), Receiver::ConditionalAccess)
            }
            "conditional_access_expression" => {
                let binding = named_children(function)
                    .into_iter()
                    .rev()
                    .find(|c| c.kind() == "member_binding_expression")?;
                let name = binding
                    .child_by_field_name("name")
                    .or_else(|| binding.named_child(0))?;
                (self.simple_name(name), Receiver::ConditionalAccess)
            }
            _ => return None,
        };
        if method_name.is_empty() {
            return None;
        }
        Some(CallFact {
            member,
            method_name,
            receiver,
            expression: squash(self.text(function)),
            line: line_of(invocation),
        })
    }

    fn collect_calls(&mut self, root: Node<'_>, member: usize) {
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node.kind() == "invocation_expression" {
                if let Some(call) = self.call_fact(node, member) {
                    self.facts.calls.push(call);
                }
            }
            stack.extend(named_children(node).into_iter().rev());
        }
    }

    fn collect_assignments(&mut self, body: Node<'_>, constructor: usize) {
        let mut stack = vec![body];
        while let Some(node) = stack.pop() {
            if node.kind() == "assignment_expression" {
                if let Some(fact) = self.assignment_fact(node, constructor) {
                    self.facts.assignments.push(fact);
                }
            }
            stack.extend(named_children(node).into_iter().rev());
        }
    }

    fn assignment_fact(&self, node: Node<'_>, constructor: usize) -> Option<AssignmentFact> {
        let left = node
            .child_by_field_name("left")
            .or_else(|| node.named_child(0))?;
        let right = node
            .child_by_field_name("right")
            .or_else(|| node.named_child(node.named_child_count().checked_sub(1)?))?;

        let full = self.text(node);
        let rest = full
            .get(left.end_byte().saturating_sub(node.start_byte())..)?
            .trim_start();
        if !rest.starts_with('=') || rest.starts_with("==") {
            return None;
        }

        let target = squash(self.text(left));
        let target = target.strip_prefix("this.").unwrap_or(&target).to_string();
        let source = self.text(right).split("??").next().unwrap_or("").trim().to_string();
        if !is_identifier(&target) || !is_identifier(&source) {
            return None;
        }
        Some(AssignmentFact {
            constructor,
            target: strip_verbatim(&target),
            source: strip_verbatim(&source),
            line: line_of(node),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVICE: &str = r#"
using System;

namespace Shop.Orders
{
    public interface IOrderRepository
    {
        Order Find(int id);
    }

    public class OrderService
    {
        private readonly IOrderRepository _orders;

        public OrderService(IOrderRepository orders)
        {
            _orders = orders ?? throw new ArgumentNullException(nameof(orders));
        }

        public async Task<Order> Load(int id)
        {
            if (id < 0 && id != -1)
            {
                return null;
            }
            var order = _orders.Find(id);
            return order;
        }
    }
}
"#;

    fn parse(source: &str) -> SourceFacts {
        CSharpFactProvider.parse(source).unwrap()
    }

    #[test]
    fn grammar_loads_into_the_runtime() {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_c_sharp::LANGUAGE.into())
            .unwrap();
        let facts = CSharpFactProvider::new().parse("class A {}").unwrap();
        assert_eq!(facts.types.len(), 1);
        assert_eq!(facts.types[0].name, "A");
    }

    #[test]
    fn handles_only_cs_files() {
        let provider = CSharpFactProvider::new();
        assert!(provider.handles(Path::new("src/Orders/OrderService.cs")));
        assert!(provider.handles(Path::new("Legacy.CS")));
        assert!(!provider.handles(Path::new("script.py")));
        assert!(!provider.handles(Path::new("README")));
    }

    #[test]
    fn collects_types_with_namespace() {
        let facts = parse(SERVICE);
        let names: Vec<String> = facts.types.iter().map(|t| t.qualified_name()).collect();
        assert_eq!(
            names,
            vec!["Shop.Orders.IOrderRepository", "Shop.Orders.OrderService"]
        );
        assert_eq!(facts.types[0].kind, TypeKind::Interface);
    }

    #[test]
    fn collects_members_and_constructor() {
        let facts = parse(SERVICE);
        let service_members: Vec<&MemberFact> =
            facts.members.iter().filter(|m| m.owner == 1).collect();
        let names: Vec<&str> = service_members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["_orders", ".ctor", "Load"]);

        let field = service_members[0];
        assert_eq!(field.declared_type.as_deref(), Some("IOrderRepository"));
        assert!(field.has_modifier("readonly"));

        let load = service_members[2];
        assert!(load.has_modifier("async"));
        assert_eq!(load.parameters[0].name, "id");
        assert!(load
            .constructs
            .iter()
            .any(|c| c.kind == ConstructKind::BooleanOperator));
    }

    #[test]
    fn constructor_assignment_strips_null_guard() {
        let facts = parse(SERVICE);
        assert_eq!(facts.assignments.len(), 1);
        assert_eq!(facts.assignments[0].target, "_orders");
        assert_eq!(facts.assignments[0].source, "orders");
    }

    #[test]
    fn member_call_records_receiver_chain() {
        let facts = parse(SERVICE);
        let find = facts
            .calls
            .iter()
            .find(|c| c.method_name == "Find")
            .unwrap();
        assert_eq!(find.receiver, Receiver::Chain(vec!["_orders".to_string()]));
        assert_eq!(find.expression, "_orders.Find");
    }

    #[test]
    fn syntax_error_is_a_parse_failure() {
        let err = CSharpFactProvider.parse("public class { void (").unwrap_err();
        assert!(matches!(err, KnowgraphError::Parse(_)));
    }

    #[test]
    fn empty_source_has_no_facts() {
        let facts = parse("");
        assert!(facts.types.is_empty());
        assert!(facts.calls.is_empty());
    }
}
