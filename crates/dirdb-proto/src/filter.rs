//! Search filter expression tree.
//!
//! `ExprNode` is the parsed form of an LDAP search filter plus the search
//! scope. Leaves carry raw (not yet normalized) assertion values; the search
//! engine normalizes them against the schema when it builds evaluators.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entry::EntryId;
use crate::error::Error;

/// How far below the base entry a search reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SearchScope {
    /// Only the base entry itself.
    Object,
    /// Immediate children of the base entry.
    OneLevel,
    /// The base entry and all of its descendants.
    Subtree,
}

/// Alias dereferencing policy of a search request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DerefAliases {
    /// Never dereference aliases.
    Never,
    /// Dereference aliases below the base while searching.
    InSearching,
    /// Dereference the base entry only.
    FindingBaseObject,
    /// Dereference both the base and aliases found while searching.
    Always,
}

impl DerefAliases {
    /// Whether aliases met among the search candidates are dereferenced.
    pub fn derefs_in_searching(self) -> bool {
        matches!(self, DerefAliases::InSearching | DerefAliases::Always)
    }

    /// Whether an alias used as the search base is dereferenced.
    pub fn derefs_finding_base(self) -> bool {
        matches!(self, DerefAliases::FindingBaseObject | DerefAliases::Always)
    }
}

impl Default for DerefAliases {
    fn default() -> Self {
        DerefAliases::Never
    }
}

/// Scope restriction of a search, expressed as a filter node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeNode {
    /// Identifier of the (already resolved) search base.
    pub base: EntryId,
    /// Scope relative to the base.
    pub scope: SearchScope,
    /// Alias dereferencing policy.
    pub deref: DerefAliases,
}

impl ScopeNode {
    /// Create a scope node.
    pub fn new(base: EntryId, scope: SearchScope, deref: DerefAliases) -> Self {
        Self { base, scope, deref }
    }
}

/// A substring assertion: `attr=initial*any1*any2*final`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstringNode {
    /// Attribute description.
    pub attribute: String,
    /// Leading fragment.
    pub initial: Option<String>,
    /// Middle fragments, matched in order.
    pub any: Vec<String>,
    /// Trailing fragment.
    pub final_: Option<String>,
}

impl SubstringNode {
    /// Create an empty substring assertion on an attribute.
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            initial: None,
            any: Vec::new(),
            final_: None,
        }
    }

    /// Set the leading fragment.
    pub fn with_initial(mut self, initial: impl Into<String>) -> Self {
        self.initial = Some(initial.into());
        self
    }

    /// Append a middle fragment.
    pub fn with_any(mut self, any: impl Into<String>) -> Self {
        self.any.push(any.into());
        self
    }

    /// Set the trailing fragment.
    pub fn with_final(mut self, final_: impl Into<String>) -> Self {
        self.final_ = Some(final_.into());
        self
    }
}

/// Filter expression tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExprNode {
    /// All children must match. An empty conjunction matches everything.
    And(Vec<ExprNode>),
    /// At least one child must match. An empty disjunction matches nothing.
    Or(Vec<ExprNode>),
    /// The child must not match.
    Not(Box<ExprNode>),
    /// The attribute is present: `(attr=*)`.
    Presence { attribute: String },
    /// Substring assertion.
    Substring(SubstringNode),
    /// Ordering assertion: `(attr>=value)`.
    GreaterEq { attribute: String, value: String },
    /// Ordering assertion: `(attr<=value)`.
    LessEq { attribute: String, value: String },
    /// Equality assertion: `(attr=value)`.
    Equality { attribute: String, value: String },
    /// Search scope restriction.
    Scope(ScopeNode),
}

impl ExprNode {
    /// Conjunction of the given nodes.
    pub fn and(children: Vec<ExprNode>) -> Self {
        ExprNode::And(children)
    }

    /// Disjunction of the given nodes.
    pub fn or(children: Vec<ExprNode>) -> Self {
        ExprNode::Or(children)
    }

    /// Negation of a node.
    #[allow(clippy::should_implement_trait)]
    pub fn not(child: ExprNode) -> Self {
        ExprNode::Not(Box::new(child))
    }

    /// Presence assertion.
    pub fn present(attribute: impl Into<String>) -> Self {
        ExprNode::Presence {
            attribute: attribute.into(),
        }
    }

    /// Equality assertion.
    pub fn eq(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        ExprNode::Equality {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Greater-or-equal assertion.
    pub fn ge(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        ExprNode::GreaterEq {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Less-or-equal assertion.
    pub fn le(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        ExprNode::LessEq {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Substring assertion with only a leading fragment: `(attr=prefix*)`.
    pub fn starts_with(attribute: impl Into<String>, prefix: impl Into<String>) -> Self {
        ExprNode::Substring(SubstringNode::new(attribute).with_initial(prefix))
    }

    /// Substring assertion.
    pub fn substring(node: SubstringNode) -> Self {
        ExprNode::Substring(node)
    }

    /// Base-object scope.
    pub fn object_scope(base: EntryId) -> Self {
        ExprNode::Scope(ScopeNode::new(base, SearchScope::Object, DerefAliases::Never))
    }

    /// One-level scope.
    pub fn one_level(base: EntryId, deref: DerefAliases) -> Self {
        ExprNode::Scope(ScopeNode::new(base, SearchScope::OneLevel, deref))
    }

    /// Subtree scope.
    pub fn subtree(base: EntryId, deref: DerefAliases) -> Self {
        ExprNode::Scope(ScopeNode::new(base, SearchScope::Subtree, deref))
    }

    /// Attribute the node asserts on, if it is an attribute leaf.
    pub fn attribute(&self) -> Option<&str> {
        match self {
            ExprNode::Presence { attribute }
            | ExprNode::GreaterEq { attribute, .. }
            | ExprNode::LessEq { attribute, .. }
            | ExprNode::Equality { attribute, .. } => Some(attribute),
            ExprNode::Substring(node) => Some(&node.attribute),
            ExprNode::And(_) | ExprNode::Or(_) | ExprNode::Not(_) | ExprNode::Scope(_) => None,
        }
    }

    /// Whether the node has no child expressions.
    pub fn is_leaf(&self) -> bool {
        !matches!(self, ExprNode::And(_) | ExprNode::Or(_) | ExprNode::Not(_))
    }

    /// Child expressions of a branch node.
    pub fn children(&self) -> &[ExprNode] {
        match self {
            ExprNode::And(children) | ExprNode::Or(children) => children,
            ExprNode::Not(child) => std::slice::from_ref(child.as_ref()),
            _ => &[],
        }
    }

    /// Short name of the node kind, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            ExprNode::And(_) => "and",
            ExprNode::Or(_) => "or",
            ExprNode::Not(_) => "not",
            ExprNode::Presence { .. } => "presence",
            ExprNode::Substring(_) => "substring",
            ExprNode::GreaterEq { .. } => "greater_eq",
            ExprNode::LessEq { .. } => "less_eq",
            ExprNode::Equality { .. } => "equality",
            ExprNode::Scope(_) => "scope",
        }
    }

    /// Check the tree for structurally invalid nodes.
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(attribute) = self.attribute() {
            if attribute.trim().is_empty() {
                return Err(Error::InvalidFilter(format!(
                    "{} node has an empty attribute description",
                    self.kind()
                )));
            }
        }

        if let ExprNode::Substring(node) = self {
            if node.initial.is_none() && node.any.is_empty() && node.final_.is_none() {
                return Err(Error::InvalidFilter(format!(
                    "substring assertion on '{}' has no fragments",
                    node.attribute
                )));
            }
        }

        for child in self.children() {
            child.validate()?;
        }
        Ok(())
    }
}

/// Escape an assertion value for the string representation of a filter.
fn escape_value(value: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for c in value.chars() {
        match c {
            '*' => f.write_str("\\2a")?,
            '(' => f.write_str("\\28")?,
            ')' => f.write_str("\\29")?,
            '\\' => f.write_str("\\5c")?,
            '\0' => f.write_str("\\00")?,
            c => write!(f, "{}", c)?,
        }
    }
    Ok(())
}

impl fmt::Display for ExprNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprNode::And(children) | ExprNode::Or(children) => {
                f.write_str(if matches!(self, ExprNode::And(_)) { "(&" } else { "(|" })?;
                for child in children {
                    write!(f, "{}", child)?;
                }
                f.write_str(")")
            }
            ExprNode::Not(child) => write!(f, "(!{})", child),
            ExprNode::Presence { attribute } => write!(f, "({}=*)", attribute),
            ExprNode::Substring(node) => {
                write!(f, "({}=", node.attribute)?;
                if let Some(initial) = &node.initial {
                    escape_value(initial, f)?;
                }
                f.write_str("*")?;
                for any in &node.any {
                    escape_value(any, f)?;
                    f.write_str("*")?;
                }
                if let Some(final_) = &node.final_ {
                    escape_value(final_, f)?;
                }
                f.write_str(")")
            }
            ExprNode::GreaterEq { attribute, value } => {
                write!(f, "({}>=", attribute)?;
                escape_value(value, f)?;
                f.write_str(")")
            }
            ExprNode::LessEq { attribute, value } => {
                write!(f, "({}<=", attribute)?;
                escape_value(value, f)?;
                f.write_str(")")
            }
            ExprNode::Equality { attribute, value } => {
                write!(f, "({}=", attribute)?;
                escape_value(value, f)?;
                f.write_str(")")
            }
            ExprNode::Scope(node) => {
                let scope = match node.scope {
                    SearchScope::Object => "base",
                    SearchScope::OneLevel => "one",
                    SearchScope::Subtree => "sub",
                };
                write!(f, "(#scope={},base={},deref={:?})", scope, node.base, node.deref)
            }
        }
    }
}
