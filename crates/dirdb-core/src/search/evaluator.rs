//! Filter evaluators.

use dirdb_proto::ExprNode;

use super::and::AndEvaluator;
use super::leaf::{
    EqualityEvaluator, ObjectScopeEvaluator, OneLevelScopeEvaluator, OrderingEvaluator,
    PresenceEvaluator, SubstringEvaluator, SubtreeScopeEvaluator,
};
use super::not::NotEvaluator;
use super::or::OrEvaluator;
use crate::cursor::IndexEntry;
use crate::error::Result;

/// Decides whether a candidate satisfies one filter node.
pub trait Evaluator {
    /// Whether the candidate matches. May fetch and cache the candidate's
    /// record.
    fn matches(&self, candidate: &IndexEntry) -> Result<bool>;

    /// Node this evaluator was built for.
    fn expression(&self) -> &ExprNode;
}

/// Evaluator for any filter node.
pub enum FilterEvaluator<'a> {
    Presence(PresenceEvaluator<'a>),
    Substring(SubstringEvaluator<'a>),
    GreaterEq(OrderingEvaluator<'a>),
    LessEq(OrderingEvaluator<'a>),
    Equality(EqualityEvaluator<'a>),
    ObjectScope(ObjectScopeEvaluator<'a>),
    OneLevelScope(OneLevelScopeEvaluator<'a>),
    SubtreeScope(SubtreeScopeEvaluator<'a>),
    And(AndEvaluator<'a>),
    Or(OrEvaluator<'a>),
    Not(NotEvaluator<'a>),
}

impl Evaluator for FilterEvaluator<'_> {
    fn matches(&self, candidate: &IndexEntry) -> Result<bool> {
        match self {
            FilterEvaluator::Presence(e) => e.matches(candidate),
            FilterEvaluator::Substring(e) => e.matches(candidate),
            FilterEvaluator::GreaterEq(e) | FilterEvaluator::LessEq(e) => e.matches(candidate),
            FilterEvaluator::Equality(e) => e.matches(candidate),
            FilterEvaluator::ObjectScope(e) => e.matches(candidate),
            FilterEvaluator::OneLevelScope(e) => e.matches(candidate),
            FilterEvaluator::SubtreeScope(e) => e.matches(candidate),
            FilterEvaluator::And(e) => e.matches(candidate),
            FilterEvaluator::Or(e) => e.matches(candidate),
            FilterEvaluator::Not(e) => e.matches(candidate),
        }
    }

    fn expression(&self) -> &ExprNode {
        match self {
            FilterEvaluator::Presence(e) => e.expression(),
            FilterEvaluator::Substring(e) => e.expression(),
            FilterEvaluator::GreaterEq(e) | FilterEvaluator::LessEq(e) => e.expression(),
            FilterEvaluator::Equality(e) => e.expression(),
            FilterEvaluator::ObjectScope(e) => e.expression(),
            FilterEvaluator::OneLevelScope(e) => e.expression(),
            FilterEvaluator::SubtreeScope(e) => e.expression(),
            FilterEvaluator::And(e) => e.expression(),
            FilterEvaluator::Or(e) => e.expression(),
            FilterEvaluator::Not(e) => e.expression(),
        }
    }
}

/// True when every evaluator accepts the candidate.
pub(crate) fn all_match(evaluators: &[FilterEvaluator<'_>], candidate: &IndexEntry) -> Result<bool> {
    for evaluator in evaluators {
        if !evaluator.matches(candidate)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// True when any evaluator accepts the candidate.
pub(crate) fn any_match(evaluators: &[FilterEvaluator<'_>], candidate: &IndexEntry) -> Result<bool> {
    for evaluator in evaluators {
        if evaluator.matches(candidate)? {
            return Ok(true);
        }
    }
    Ok(false)
}
