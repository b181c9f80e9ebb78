//! Source facts to [`FileGraph`]: elements with metrics plus relationships.

use std::collections::HashSet;

use crate::errors::KnowgraphResult;
use crate::indexer::callgraph::build_relationships;
use crate::indexer::facts::{MemberFact, MemberKind, SourceFactProvider, SourceFacts, TypeFact};
use crate::indexer::metrics::{cognitive_complexity, cyclomatic_complexity};
use crate::indexer::symbols::normalize_type_name;
use crate::models::{
    CodeElement, ElementKind, ElementMetadata, FileGraph, MemberMetadata, MethodMetrics,
    TypeMetadata,
};

/// Parse `source` and build its graph. Never fails: a parse failure yields
/// an empty graph.
pub fn extract_graph(
    provider: &dyn SourceFactProvider,
    source: &str,
    file_path: &str,
    context: &str,
) -> FileGraph {
    match try_extract_graph(provider, source, file_path, context) {
        Ok(graph) => graph,
        Err(err) => {
            tracing::debug!(file = file_path, error = %err, "parse failure, empty graph");
            FileGraph::empty(file_path, context, provider.language())
        }
    }
}

/// Like [`extract_graph`] but reports the parse failure instead of
/// degrading, so a caller can keep the previously stored graph.
pub fn try_extract_graph(
    provider: &dyn SourceFactProvider,
    source: &str,
    file_path: &str,
    context: &str,
) -> KnowgraphResult<FileGraph> {
    let facts = provider.parse(source)?;
    Ok(build_file_graph(&facts, file_path, context, provider.language()))
}

/// Build the graph for already-parsed facts.
pub fn build_file_graph(
    facts: &SourceFacts,
    file_path: &str,
    context: &str,
    language: &str,
) -> FileGraph {
    let mut elements = Vec::with_capacity(facts.types.len() + facts.members.len());
    let mut seen: HashSet<String> = HashSet::new();

    for fact in &facts.types {
        let element = type_element(fact, file_path, context);
        if seen.insert(element.qualified_name.clone()) {
            elements.push(element);
        }
    }
    for member in &facts.members {
        let Some(owner) = facts.types.get(member.owner) else {
            continue;
        };
        let element = member_element(member, owner, file_path, context);
        // Overloads share a qualified name; the first declaration wins.
        if seen.insert(element.qualified_name.clone()) {
            elements.push(element);
        }
    }

    FileGraph {
        file_path: file_path.to_string(),
        context: context.to_string(),
        language: language.to_string(),
        elements,
        relationships: build_relationships(facts),
    }
}

fn type_element(fact: &TypeFact, file_path: &str, context: &str) -> CodeElement {
    CodeElement {
        qualified_name: fact.qualified_name(),
        short_name: fact.short_name(),
        name: fact.name.clone(),
        kind: ElementKind::Type,
        file_path: file_path.to_string(),
        context: context.to_string(),
        start_line: fact.start_line,
        end_line: fact.end_line,
        parent: fact.parent_qualified_name(),
        metadata: ElementMetadata::Type(TypeMetadata {
            type_kind: fact.kind,
            base_types: fact
                .base_types
                .iter()
                .filter_map(|b| normalize_type_name(b))
                .collect(),
            is_abstract: fact.has_modifier("abstract"),
            is_static: fact.has_modifier("static"),
            is_partial: fact.has_modifier("partial"),
            extra: Default::default(),
        }),
    }
}

fn member_element(
    member: &MemberFact,
    owner: &TypeFact,
    file_path: &str,
    context: &str,
) -> CodeElement {
    let kind = match member.kind {
        MemberKind::Field => ElementKind::Field,
        MemberKind::Property => ElementKind::Property,
        MemberKind::Method | MemberKind::Constructor => ElementKind::Method,
    };
    let metadata = match member.kind {
        MemberKind::Method | MemberKind::Constructor => ElementMetadata::Method(MethodMetrics {
            cyclomatic_complexity: cyclomatic_complexity(&member.constructs),
            cognitive_complexity: cognitive_complexity(&member.constructs),
            lines_of_code: member.lines_of_code,
            is_async: member.has_modifier("async"),
            is_static: member.has_modifier("static"),
            parameter_count: member.parameters.len() as u32,
            return_type: member.declared_type.clone(),
            extra: Default::default(),
        }),
        MemberKind::Field | MemberKind::Property => ElementMetadata::Member(MemberMetadata {
            declared_type: member.declared_type.clone(),
            is_readonly: member.has_modifier("readonly") || member.has_modifier("const"),
            is_static: member.has_modifier("static") || member.has_modifier("const"),
            extra: Default::default(),
        }),
    };

    CodeElement {
        qualified_name: format!("{}.{}", owner.qualified_name(), member.name),
        short_name: format!("{}.{}", owner.short_name(), member.name),
        name: member.name.clone(),
        kind,
        file_path: file_path.to_string(),
        context: context.to_string(),
        start_line: member.start_line,
        end_line: member.end_line,
        parent: Some(owner.qualified_name()),
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::parser::CSharpFactProvider;
    use crate::models::{RelationshipKind, TypeKind};

    const CONTROLLER: &str = r#"
namespace Shop.Api
{
    public interface IUserRepository
    {
        User GetById(int id);
    }

    public class UserController : ControllerBase
    {
        private readonly IUserRepository _users;
        private readonly List<Order> _orders = new List<Order>();

        public UserController(IUserRepository users)
        {
            _users = users;
        }

        public User Get(int id)
        {
            foreach (var order in _orders)
            {
                if (order.Id == id || order.Owner == id)
                {
                    continue;
                }
            }
            _orders.Clear();
            return _users.GetById(id);
        }

        public User Get(string name) => null;
    }
}
"#;

    fn extract(source: &str) -> FileGraph {
        extract_graph(&CSharpFactProvider, source, "Api/UserController.cs", "shop")
    }

    #[test]
    fn invalid_source_yields_empty_graph() {
        for source in ["", "class {", "}}}}", "namespace ; class X : { void M( }", "\u{0}\u{1}"] {
            let graph = extract(source);
            assert!(graph.relationships.is_empty());
            assert_eq!(graph.file_path, "Api/UserController.cs");
        }
        assert!(extract("class {").is_empty());
    }

    #[test]
    fn elements_carry_namespace_and_short_names() {
        let graph = extract(CONTROLLER);
        let controller = graph.element("Shop.Api.UserController").unwrap();
        assert_eq!(controller.short_name, "UserController");
        assert_eq!(controller.kind, ElementKind::Type);
        match &controller.metadata {
            ElementMetadata::Type(meta) => {
                assert_eq!(meta.type_kind, TypeKind::Class);
                assert_eq!(meta.base_types, vec!["ControllerBase".to_string()]);
            }
            other => panic!("unexpected metadata {other:?}"),
        }
        let ctor = graph.element("Shop.Api.UserController..ctor").unwrap();
        assert_eq!(ctor.kind, ElementKind::Method);
        assert_eq!(ctor.parent.as_deref(), Some("Shop.Api.UserController"));
    }

    #[test]
    fn overloads_keep_first_declaration() {
        let graph = extract(CONTROLLER);
        let gets: Vec<&CodeElement> = graph
            .elements
            .iter()
            .filter(|e| e.qualified_name == "Shop.Api.UserController.Get")
            .collect();
        assert_eq!(gets.len(), 1);
        let metrics = gets[0].metadata.method_metrics().unwrap();
        // foreach + if + ||
        assert_eq!(metrics.cyclomatic_complexity, 4);
        assert_eq!(metrics.parameter_count, 1);
    }

    #[test]
    fn di_call_resolves_to_injected_interface() {
        let graph = extract(CONTROLLER);
        let call = graph
            .relationships_of(RelationshipKind::Calls)
            .find(|r| r.to.ends_with("GetById"))
            .unwrap();
        assert_eq!(call.from, "Shop.Api.UserController.Get");
        assert_eq!(call.to, "Shop.Api.IUserRepository.GetById");
        assert_eq!(call.inferred_type.as_deref(), Some("IUserRepository"));
        assert_eq!(call.caller_object.as_deref(), Some("_users"));

        let inject = graph.relationships_of(RelationshipKind::Injects).next().unwrap();
        assert_eq!(inject.to, "Shop.Api.IUserRepository");
        assert_eq!(inject.parameter_name.as_deref(), Some("users"));
    }

    #[test]
    fn generic_field_resolves_to_outer_type() {
        let graph = extract(CONTROLLER);
        let clear = graph
            .relationships_of(RelationshipKind::Calls)
            .find(|r| r.expression.as_deref() == Some("_orders.Clear"))
            .unwrap();
        assert_eq!(clear.inferred_type.as_deref(), Some("List"));
        assert_eq!(clear.to, "List.Clear");
    }

    #[test]
    fn parse_failure_keeps_language_and_context() {
        let graph = extract("public class Broken {");
        assert!(graph.is_empty());
        assert_eq!(graph.context, "shop");
        assert_eq!(graph.language, "csharp");
    }
}
