//! Call, injection and inheritance relationships for one file.
//!
//! Resolution is deliberately local: it only uses what the file itself
//! declares. When a receiver type cannot be determined the relationship
//! keeps the bare method name and omits the inferred type.

use std::collections::{HashMap, HashSet};

use indexmap::IndexSet;

use crate::indexer::facts::{CallFact, MemberKind, Receiver, SourceFacts};
use crate::indexer::symbols::{
    build_type_tables, is_interface_name, normalize_type_name, FileTypeIndex, MethodScope,
    TypeSymbolTable,
};
use crate::models::{Relationship, RelationshipKind, TypeKind};

/// Predefined types never produce `Injects` edges.
const BUILTIN_TYPES: &[&str] = &[
    "bool", "byte", "sbyte", "char", "decimal", "double", "float", "int", "uint", "nint",
    "nuint", "long", "ulong", "short", "ushort", "object", "string", "dynamic", "Guid",
    "DateTime", "DateTimeOffset", "TimeSpan", "String", "Int32", "Int64", "Boolean",
];

fn is_builtin(type_name: &str) -> bool {
    let bare = type_name.trim_end_matches("[]");
    BUILTIN_TYPES.contains(&bare) || bare.starts_with('(')
}

/// Outcome of resolving one invocation's receiver.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReceiverResolution {
    pub caller_object: Option<String>,
    pub inferred_type: Option<String>,
}

/// Everything the file declares that call resolution consults.
pub struct ResolutionContext<'f> {
    facts: &'f SourceFacts,
    types: FileTypeIndex,
    tables: Vec<TypeSymbolTable>,
    owner_by_type: HashMap<String, usize>,
    methods_by_type: Vec<HashSet<&'f str>>,
}

impl<'f> ResolutionContext<'f> {
    pub fn new(facts: &'f SourceFacts) -> Self {
        let mut methods_by_type: Vec<HashSet<&'f str>> = vec![HashSet::new(); facts.types.len()];
        for member in &facts.members {
            if member.kind == MemberKind::Method {
                if let Some(set) = methods_by_type.get_mut(member.owner) {
                    set.insert(member.name.as_str());
                }
            }
        }
        let mut owner_by_type = HashMap::new();
        for (owner, fact) in facts.types.iter().enumerate() {
            owner_by_type.entry(fact.qualified_name()).or_insert(owner);
        }
        Self {
            facts,
            types: FileTypeIndex::from_facts(facts),
            tables: build_type_tables(facts),
            owner_by_type,
            methods_by_type,
        }
    }

    pub fn types(&self) -> &FileTypeIndex {
        &self.types
    }

    fn type_name(&self, owner: usize) -> Option<String> {
        self.facts.types.get(owner).map(|t| t.qualified_name())
    }

    fn first_inherited_base(&self, owner: usize) -> Option<String> {
        let fact = self.facts.types.get(owner)?;
        fact.base_types
            .iter()
            .filter_map(|b| normalize_type_name(b))
            .find(|b| classify_base(fact.kind, b, &self.types) == RelationshipKind::Inherits)
    }

    /// Follow `segments` member by member starting from `head_type`. Every
    /// intermediate type must be declared in this file and declare the next
    /// segment, otherwise nothing is inferred.
    fn walk_chain(&self, head_type: String, segments: &[String]) -> Option<String> {
        segments.iter().try_fold(head_type, |current, segment| {
            let qualified = self.types.resolve(&current)?;
            let owner = *self.owner_by_type.get(qualified)?;
            self.tables.get(owner)?.get(segment).map(str::to_string)
        })
    }

    /// Infer the caller object and receiver type of `call`.
    pub fn resolve_receiver(&self, call: &CallFact) -> ReceiverResolution {
        let Some(member) = self.facts.members.get(call.member) else {
            return ReceiverResolution::default();
        };
        let owner = member.owner;
        let table = self.tables.get(owner);
        let from_table = |name: &str| table.and_then(|t| t.get(name)).map(str::to_string);

        match &call.receiver {
            Receiver::None => ReceiverResolution {
                caller_object: None,
                inferred_type: self
                    .methods_by_type
                    .get(owner)
                    .filter(|methods| methods.contains(call.method_name.as_str()))
                    .and_then(|_| self.type_name(owner)),
            },
            Receiver::This => ReceiverResolution {
                caller_object: Some("this".to_string()),
                inferred_type: self.type_name(owner),
            },
            Receiver::Base => ReceiverResolution {
                caller_object: Some("base".to_string()),
                inferred_type: self.first_inherited_base(owner),
            },
            Receiver::Chain(segments) => {
                let caller_object = segments.join(".");
                let inferred = match segments.split_first() {
                    None => None,
                    Some((first, rest)) if first == "this" => match rest.split_first() {
                        None => self.type_name(owner),
                        Some((head, tail)) => from_table(head.as_str())
                            .and_then(|head_type| self.walk_chain(head_type, tail)),
                    },
                    Some((first, rest)) => {
                        let scope = MethodScope::for_member(member);
                        let head_type = scope
                            .get(first)
                            .map(str::to_string)
                            .or_else(|| from_table(first.as_str()));
                        match head_type {
                            Some(head_type) => self.walk_chain(head_type, rest),
                            None => self
                                .types
                                .resolve(&caller_object)
                                .map(str::to_string)
                                .or_else(|| {
                                    let static_type = self.types.resolve(first)?.to_string();
                                    self.walk_chain(static_type, rest)
                                }),
                        }
                    }
                };
                ReceiverResolution {
                    caller_object: Some(caller_object),
                    inferred_type: inferred,
                }
            }
            Receiver::ConditionalAccess | Receiver::Complex(_) => ReceiverResolution::default(),
        }
    }

    /// The `Calls` relationship for one invocation.
    pub fn call_relationship(&self, call: &CallFact) -> Option<Relationship> {
        let member = self.facts.members.get(call.member)?;
        let owner = self.type_name(member.owner)?;
        let resolution = self.resolve_receiver(call);
        let to = match resolution.inferred_type.as_deref() {
            Some(inferred) => format!("{}.{}", self.types.qualify(inferred), call.method_name),
            None => call.method_name.clone(),
        };
        Some(Relationship {
            from: format!("{owner}.{}", member.name),
            to,
            kind: RelationshipKind::Calls,
            line_number: call.line,
            caller_object: resolution.caller_object,
            inferred_type: resolution.inferred_type,
            expression: Some(call.expression.clone()),
            parameter_name: None,
        })
    }

    /// `Injects` relationships from constructor assignments and primary
    /// constructor parameters.
    pub fn injection_relationships(&self) -> Vec<Relationship> {
        let mut out = Vec::new();

        for fact in &self.facts.types {
            let from = fact.qualified_name();
            for param in &fact.primary_constructor {
                let Some(type_name) = param.type_name.as_deref().and_then(normalize_type_name)
                else {
                    continue;
                };
                if is_builtin(&type_name) {
                    continue;
                }
                out.push(Relationship {
                    from: from.clone(),
                    to: self.types.qualify(&type_name),
                    kind: RelationshipKind::Injects,
                    line_number: fact.start_line,
                    caller_object: None,
                    inferred_type: Some(type_name),
                    expression: None,
                    parameter_name: Some(param.name.clone()),
                });
            }
        }

        for assignment in &self.facts.assignments {
            let Some(ctor) = self.facts.members.get(assignment.constructor) else {
                continue;
            };
            let Some(type_name) = ctor
                .parameters
                .iter()
                .find(|p| p.name == assignment.source)
                .and_then(|p| p.type_name.as_deref())
                .and_then(normalize_type_name)
            else {
                continue;
            };
            if is_builtin(&type_name) {
                continue;
            }
            let injectable_target = self.facts.members.iter().any(|m| {
                m.owner == ctor.owner
                    && m.name == assignment.target
                    && match m.kind {
                        MemberKind::Field => m.has_modifier("readonly"),
                        MemberKind::Property => true,
                        _ => false,
                    }
            });
            if !injectable_target {
                continue;
            }
            let Some(from) = self.type_name(ctor.owner) else {
                continue;
            };
            out.push(Relationship {
                from,
                to: self.types.qualify(&type_name),
                kind: RelationshipKind::Injects,
                line_number: assignment.line,
                caller_object: Some(assignment.target.clone()),
                inferred_type: Some(type_name),
                expression: Some(format!("{} = {}", assignment.target, assignment.source)),
                parameter_name: Some(assignment.source.clone()),
            });
        }

        out
    }

    /// `Inherits` / `Implements` relationships from base lists.
    pub fn inheritance_relationships(&self) -> Vec<Relationship> {
        let mut out = Vec::new();
        for fact in &self.facts.types {
            let from = fact.qualified_name();
            for base in fact.base_types.iter().filter_map(|b| normalize_type_name(b)) {
                out.push(Relationship {
                    from: from.clone(),
                    to: self.types.qualify(&base),
                    kind: classify_base(fact.kind, &base, &self.types),
                    line_number: fact.start_line,
                    caller_object: None,
                    inferred_type: None,
                    expression: None,
                    parameter_name: None,
                });
            }
        }
        out
    }
}

/// Interfaces only inherit; other types implement interface-looking bases.
pub fn classify_base(owner_kind: TypeKind, base: &str, types: &FileTypeIndex) -> RelationshipKind {
    if owner_kind == TypeKind::Interface {
        return RelationshipKind::Inherits;
    }
    if is_interface_name(base) || types.is_interface(base) {
        RelationshipKind::Implements
    } else {
        RelationshipKind::Inherits
    }
}

/// All relationships for one file: inheritance, then injection, then calls
/// in source order. Exact duplicates are kept once.
pub fn build_relationships(facts: &SourceFacts) -> Vec<Relationship> {
    let ctx = ResolutionContext::new(facts);
    let mut unique: IndexSet<Relationship> = IndexSet::new();
    unique.extend(ctx.inheritance_relationships());
    unique.extend(ctx.injection_relationships());
    unique.extend(facts.calls.iter().filter_map(|c| ctx.call_relationship(c)));
    unique.into_iter().collect()
}
