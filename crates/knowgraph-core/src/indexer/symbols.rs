//! Type-name normalisation and the symbol tables used by call resolution.

use std::collections::{HashMap, HashSet};

use crate::indexer::facts::{MemberFact, MemberKind, SourceFacts};
use crate::models::TypeKind;

// ---------------------------------------------------------------------------
// Type names
// ---------------------------------------------------------------------------

/// Normalise a written type name to the name calls resolve against.
///
/// Strips a `global::` prefix, generic arguments and a trailing nullable
/// marker: `global::Ns.Repo<User>?` becomes `Ns.Repo`. Returns `None` for
/// empty input and for `var`.
pub fn normalize_type_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches(';');
    let trimmed = trimmed.strip_prefix("global::").unwrap_or(trimmed);
    let outer = trimmed.split('<').next().unwrap_or("");
    let normalized: String = outer
        .trim()
        .trim_end_matches('?')
        .split_whitespace()
        .collect();
    if normalized.is_empty() || normalized == "var" {
        None
    } else {
        Some(normalized)
    }
}

/// The `I` + uppercase-letter interface naming convention.
pub fn is_interface_name(name: &str) -> bool {
    let simple = last_segment(name);
    let mut chars = simple.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some('I'), Some(second)) if second.is_ascii_uppercase()
    )
}

/// Text after the last `.` of a dotted name.
pub fn last_segment(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

// ---------------------------------------------------------------------------
// File-level type index
// ---------------------------------------------------------------------------

/// Types declared in the file being extracted, addressable by how code
/// writes them.
#[derive(Debug, Default)]
pub struct FileTypeIndex {
    by_written_name: HashMap<String, String>,
    interfaces: HashSet<String>,
}

impl FileTypeIndex {
    pub fn from_facts(facts: &SourceFacts) -> Self {
        let mut index = Self::default();
        for fact in &facts.types {
            let qualified = fact.qualified_name();
            for written in [fact.name.clone(), fact.short_name(), qualified.clone()] {
                index
                    .by_written_name
                    .entry(written)
                    .or_insert_with(|| qualified.clone());
            }
            if fact.kind == TypeKind::Interface {
                index.interfaces.insert(qualified);
            }
        }
        index
    }

    /// Qualified name of the same-file type `written` refers to.
    pub fn resolve(&self, written: &str) -> Option<&str> {
        self.by_written_name.get(written).map(String::as_str)
    }

    /// Qualified name when declared here, otherwise the name as written.
    pub fn qualify(&self, written: &str) -> String {
        self.resolve(written)
            .map(str::to_string)
            .unwrap_or_else(|| written.to_string())
    }

    pub fn is_interface(&self, written: &str) -> bool {
        self.resolve(written)
            .is_some_and(|qualified| self.interfaces.contains(qualified))
    }
}

// ---------------------------------------------------------------------------
// Per-type and per-method tables
// ---------------------------------------------------------------------------

/// Field/property name to normalised declared type, for one type.
#[derive(Debug, Default, Clone)]
pub struct TypeSymbolTable {
    entries: HashMap<String, String>,
}

impl TypeSymbolTable {
    /// Insert, replacing any previous entry.
    pub fn insert(&mut self, name: &str, type_name: &str) {
        if let Some(normalized) = normalize_type_name(type_name) {
            self.entries.insert(name.to_string(), normalized);
        }
    }

    /// Insert only when `name` has no entry yet.
    pub fn insert_if_absent(&mut self, name: &str, type_name: &str) {
        if self.entries.contains_key(name) {
            return;
        }
        self.insert(name, type_name);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }
}

/// Parameters and typed locals of one member, consulted before the type table.
#[derive(Debug, Default)]
pub struct MethodScope {
    entries: HashMap<String, String>,
}

impl MethodScope {
    pub fn for_member(member: &MemberFact) -> Self {
        let mut entries = HashMap::new();
        for binding in member.parameters.iter().chain(member.locals.iter()) {
            if let Some(normalized) = binding.type_name.as_deref().and_then(normalize_type_name) {
                entries.insert(binding.name.clone(), normalized);
            }
        }
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }
}

/// Build one symbol table per declared type, indexed like `facts.types`.
///
/// Constructor-injected members win over plain declarations; primary
/// constructor parameters are entered as well.
pub fn build_type_tables(facts: &SourceFacts) -> Vec<TypeSymbolTable> {
    let mut tables = vec![TypeSymbolTable::default(); facts.types.len()];

    for (owner, fact) in facts.types.iter().enumerate() {
        for param in &fact.primary_constructor {
            if let Some(type_name) = param.type_name.as_deref() {
                tables[owner].insert(&param.name, type_name);
            }
        }
    }

    for assignment in &facts.assignments {
        let Some(ctor) = facts.members.get(assignment.constructor) else {
            continue;
        };
        let Some(param_type) = ctor
            .parameters
            .iter()
            .find(|p| p.name == assignment.source)
            .and_then(|p| p.type_name.as_deref())
        else {
            continue;
        };
        if let Some(table) = tables.get_mut(ctor.owner) {
            table.insert(&assignment.target, param_type);
        }
    }

    for member in &facts.members {
        if !matches!(member.kind, MemberKind::Field | MemberKind::Property) {
            continue;
        }
        if let (Some(table), Some(declared)) =
            (tables.get_mut(member.owner), member.declared_type.as_deref())
        {
            table.insert_if_absent(&member.name, declared);
        }
    }

    tables
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_arguments_are_stripped() {
        assert_eq!(
            normalize_type_name("List<Order>").as_deref(),
            Some("List")
        );
        assert_eq!(
            normalize_type_name("IDictionary<string, List<int>>").as_deref(),
            Some("IDictionary")
        );
        assert_eq!(
            normalize_type_name("global::Shop.IClock?").as_deref(),
            Some("Shop.IClock")
        );
        assert_eq!(normalize_type_name("ILogger<OrderService>?").as_deref(), Some("ILogger"));
    }

    #[test]
    fn empty_and_var_are_not_types() {
        assert_eq!(normalize_type_name("  "), None);
        assert_eq!(normalize_type_name("var"), None);
    }

    #[test]
    fn interface_convention() {
        assert!(is_interface_name("IOrderRepository"));
        assert!(is_interface_name("Shop.IClock"));
        assert!(!is_interface_name("Item"));
        assert!(!is_interface_name("I"));
        assert!(!is_interface_name("Ifrit"));
    }

    #[test]
    fn table_keeps_first_declaration_unless_replaced() {
        let mut table = TypeSymbolTable::default();
        table.insert("_repo", "IRepo");
        table.insert_if_absent("_repo", "Repo");
        assert_eq!(table.get("_repo"), Some("IRepo"));
        table.insert("_repo", "Repo<int>");
        assert_eq!(table.get("_repo"), Some("Repo"));
        assert_eq!(table.get("repo"), None);
    }
}
