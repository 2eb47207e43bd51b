//! Substring assertions: `(attr=initial*any*final)`.

use std::ops::Bound;

use dirdb_proto::{ExprNode, SubstringNode};

use super::{candidate_values, missing_index, normalized, wrong_node};
use crate::cursor::{ensure_open, Cursor, CursorState, IndexCursor, IndexEntry};
use crate::error::{Error, Result};
use crate::schema::{AttributeType, MatchingRule};
use crate::search::cursor::{seek_matching, Direction};
use crate::search::evaluator::Evaluator;
use crate::storage::{ForwardKey, Index, Partition};

/// Smallest string greater than every string starting with `prefix`, or
/// None when no such string exists.
pub(crate) fn prefix_successor(prefix: &str) -> Option<String> {
    let mut chars: Vec<char> = prefix.chars().collect();
    while let Some(last) = chars.pop() {
        let mut code = last as u32 + 1;
        if (0xD800..=0xDFFF).contains(&code) {
            code = 0xE000;
        }
        if let Some(next) = char::from_u32(code) {
            chars.push(next);
            return Some(chars.into_iter().collect());
        }
    }
    None
}

/// Normalized fragments of a substring assertion.
#[derive(Debug, Clone)]
struct Pattern {
    initial: Option<String>,
    any: Vec<String>,
    final_: Option<String>,
}

impl Pattern {
    fn new(node: &SubstringNode, rule: &MatchingRule) -> Result<Self> {
        let initial = node.initial.as_deref().map(|f| rule.normalize(f)).transpose()?;
        let any = node
            .any
            .iter()
            .map(|f| rule.normalize(f))
            .collect::<Result<Vec<_>>>()?;
        let final_ = node.final_.as_deref().map(|f| rule.normalize(f)).transpose()?;
        Ok(Self { initial, any, final_ })
    }

    /// Initial, then each any fragment in order, then final, without
    /// overlap.
    fn matches(&self, value: &str) -> bool {
        let mut rest = value;
        if let Some(initial) = &self.initial {
            match rest.strip_prefix(initial.as_str()) {
                Some(tail) => rest = tail,
                None => return false,
            }
        }
        for fragment in &self.any {
            match rest.find(fragment.as_str()) {
                Some(pos) => rest = &rest[pos + fragment.len()..],
                None => return false,
            }
        }
        match &self.final_ {
            Some(final_) => rest.ends_with(final_.as_str()),
            None => true,
        }
    }
}

fn substring_rule(at: &AttributeType) -> Result<&MatchingRule> {
    at.substring_or_equality().ok_or_else(|| {
        Error::IllegalState(format!(
            "attribute '{}' has neither a substring nor an equality matching rule",
            at.name()
        ))
    })
}

pub struct SubstringEvaluator<'a> {
    node: &'a ExprNode,
    partition: &'a Partition,
    attribute: &'a AttributeType,
    rule: &'a MatchingRule,
    index: Option<&'a Index<String>>,
    pattern: Pattern,
}

impl<'a> SubstringEvaluator<'a> {
    pub fn new(node: &'a ExprNode, partition: &'a Partition) -> Result<Self> {
        let ExprNode::Substring(substring) = node else {
            return Err(wrong_node("substring", node));
        };
        let at = partition.schema().lookup(&substring.attribute)?;
        let rule = substring_rule(at)?;
        Ok(Self {
            node,
            partition,
            attribute: at,
            rule,
            index: partition.user_index(at),
            pattern: Pattern::new(substring, rule)?,
        })
    }
}

impl Evaluator for SubstringEvaluator<'_> {
    fn matches(&self, candidate: &IndexEntry) -> Result<bool> {
        let values = candidate_values(self.partition, self.attribute, self.index, candidate)?;
        Ok(values.iter().any(|value| {
            normalized(self.rule, value).is_some_and(|n| self.pattern.matches(&n))
        }))
    }

    fn expression(&self) -> &ExprNode {
        self.node
    }
}

/// Which index elements a substring cursor keeps.
struct PrefixFilter<'a> {
    index: &'a Index<String>,
    rule: &'a MatchingRule,
    pattern: Pattern,
    lower: String,
    upper: Option<String>,
}

impl PrefixFilter<'_> {
    fn in_range(&self, value: &str) -> bool {
        value >= self.lower.as_str() && self.upper.as_deref().map_or(true, |u| value < u)
    }

    fn value_matches(&self, value: &str) -> bool {
        normalized(self.rule, value).is_some_and(|n| self.pattern.matches(&n))
    }

    /// Keep an element only at the smallest matching value of its entry.
    fn accepts(&self, element: &IndexEntry) -> Result<bool> {
        let Some(value) = element.value() else {
            return Ok(false);
        };
        if !self.value_matches(value) {
            return Ok(false);
        }
        let first = self.index.first_value_where(element.id(), |v| {
            Ok(self.in_range(v) && self.value_matches(v))
        })?;
        Ok(first.as_deref() == Some(value.as_str()))
    }
}

/// Walks the index range of values starting with the initial fragment and
/// keeps those matching the whole pattern.
pub struct SubstringCursor<'a> {
    inner: IndexCursor<'a, ForwardKey<String>>,
    filter: PrefixFilter<'a>,
}

impl<'a> SubstringCursor<'a> {
    /// Fails with `IllegalArgument` when the attribute has no index or the
    /// assertion has no initial fragment.
    pub fn new(node: &'a ExprNode, partition: &'a Partition) -> Result<Self> {
        let ExprNode::Substring(substring) = node else {
            return Err(wrong_node("substring", node));
        };
        let at = partition.schema().lookup(&substring.attribute)?;
        let rule = substring_rule(at)?;
        let index = partition.user_index(at).ok_or_else(|| missing_index(at))?;
        let Some(initial) = substring.initial.as_deref() else {
            return Err(Error::IllegalArgument(format!(
                "substring cursor on '{}' needs an initial fragment",
                at.name()
            )));
        };

        let lower = at.index_form(initial)?;
        let upper = prefix_successor(&lower);
        let inner = index.forward_range(
            Bound::Included(&lower),
            upper.as_ref().map_or(Bound::Unbounded, Bound::Excluded),
        );
        Ok(Self {
            inner,
            filter: PrefixFilter {
                index,
                rule,
                pattern: Pattern::new(substring, rule)?,
                lower,
                upper,
            },
        })
    }
}

impl Cursor for SubstringCursor<'_> {
    type Value = String;

    fn before_first(&mut self) -> Result<()> {
        self.inner.before_first()
    }

    fn after_last(&mut self) -> Result<()> {
        self.inner.after_last()
    }

    fn next(&mut self) -> Result<bool> {
        let filter = &self.filter;
        seek_matching(&mut self.inner, Direction::Forward, |e| filter.accepts(e))
    }

    fn previous(&mut self) -> Result<bool> {
        let filter = &self.filter;
        seek_matching(&mut self.inner, Direction::Backward, |e| filter.accepts(e))
    }

    fn before(&mut self, _element: &IndexEntry) -> Result<()> {
        ensure_open(self.inner.state())?;
        Err(Error::unsupported("substring cursors cannot seek"))
    }

    fn after(&mut self, _element: &IndexEntry) -> Result<()> {
        ensure_open(self.inner.state())?;
        Err(Error::unsupported("substring cursors cannot seek"))
    }

    fn state(&self) -> CursorState {
        self.inner.state()
    }

    fn get(&self) -> Result<&IndexEntry> {
        self.inner.get()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}
