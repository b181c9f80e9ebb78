//! Parsed-source facts: the language-neutral input of graph extraction.
//!
//! A [`SourceFactProvider`] turns source text into [`SourceFacts`]; the
//! extractor turns facts into a [`crate::models::FileGraph`].

use std::path::Path;

use crate::errors::KnowgraphResult;
use crate::models::TypeKind;

/// Parses one file's source into declaration and call facts.
pub trait SourceFactProvider: Send + Sync {
    /// Language identifier stored on the resulting graph.
    fn language(&self) -> &'static str;

    /// True when this provider understands the file at `path`.
    fn handles(&self, path: &Path) -> bool;

    /// Parse `source`. A syntax error anywhere in the file is an error.
    fn parse(&self, source: &str) -> KnowgraphResult<SourceFacts>;
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SourceFacts {
    pub types: Vec<TypeFact>,
    pub members: Vec<MemberFact>,
    pub calls: Vec<CallFact>,
    pub assignments: Vec<AssignmentFact>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParameterFact {
    pub name: String,
    pub type_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeFact {
    pub name: String,
    pub namespace: Option<String>,
    /// Enclosing type names, outermost first.
    pub nesting: Vec<String>,
    pub kind: TypeKind,
    pub modifiers: Vec<String>,
    /// Base list entries as written.
    pub base_types: Vec<String>,
    pub start_line: i64,
    pub end_line: i64,
    pub primary_constructor: Vec<ParameterFact>,
}

impl TypeFact {
    /// Name without the namespace, e.g. `Outer.Inner`.
    pub fn short_name(&self) -> String {
        if self.nesting.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.nesting.join("."), self.name)
        }
    }

    pub fn qualified_name(&self) -> String {
        match self.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => format!("{ns}.{}", self.short_name()),
            _ => self.short_name(),
        }
    }

    /// Qualified name of the enclosing type, if nested.
    pub fn parent_qualified_name(&self) -> Option<String> {
        if self.nesting.is_empty() {
            return None;
        }
        let outer = self.nesting.join(".");
        Some(match self.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => format!("{ns}.{outer}"),
            _ => outer,
        })
    }

    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m == modifier)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Field,
    Property,
    Method,
    Constructor,
}

/// Control-flow construct seen inside a method body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConstructKind {
    Branch,
    Loop,
    Case,
    Catch,
    Conditional,
    SwitchArm,
    BooleanOperator,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControlConstruct {
    pub kind: ConstructKind,
    /// Nesting depth at which the construct appears (0 = method body).
    pub nesting: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MemberFact {
    /// Index into [`SourceFacts::types`] of the declaring type.
    pub owner: usize,
    pub name: String,
    pub kind: MemberKind,
    /// Field/property type, or the return type of a method.
    pub declared_type: Option<String>,
    pub modifiers: Vec<String>,
    pub parameters: Vec<ParameterFact>,
    /// Locals with an explicit type or a `new T(...)` initialiser.
    pub locals: Vec<ParameterFact>,
    pub constructs: Vec<ControlConstruct>,
    pub lines_of_code: u32,
    pub start_line: i64,
    pub end_line: i64,
}

impl MemberFact {
    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m == modifier)
    }
}

/// Textual shape of the receiver of an invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Receiver {
    /// Bare call `Foo()`.
    None,
    This,
    Base,
    /// Identifier or dotted identifier chain, e.g. `["_context", "Users"]`.
    Chain(Vec<String>),
    /// Null-conditional access `a?.Foo()`.
    ConditionalAccess,
    /// Any other receiver expression.
    Complex(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct CallFact {
    /// Index into [`SourceFacts::members`] of the enclosing member.
    pub member: usize,
    pub method_name: String,
    pub receiver: Receiver,
    /// Member-access text without the argument list.
    pub expression: String,
    pub line: i64,
}

/// `target = source;` inside a constructor body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssignmentFact {
    /// Index into [`SourceFacts::members`] of the constructor.
    pub constructor: usize,
    /// Assigned member name with any `this.` prefix removed.
    pub target: String,
    /// Assigned identifier with any `?? throw ...` tail removed.
    pub source: String,
    pub line: i64,
}
