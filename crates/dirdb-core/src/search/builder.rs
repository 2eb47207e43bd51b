//! Turning filters into evaluators and annotated plans into cursors.

use tracing::debug;

use dirdb_proto::{ExprNode, SearchScope};

use super::and::{AndCursor, AndEvaluator};
use super::cursor::{EmptyCursor, ScanCursor, SearchCursor};
use super::evaluator::FilterEvaluator;
use super::leaf::{
    EqualityCursor, EqualityEvaluator, ObjectScopeEvaluator, OneLevelScopeEvaluator,
    OrderingCursor, OrderingEvaluator, PresenceCursor, PresenceEvaluator, ScopeCursor,
    SubstringCursor, SubstringEvaluator, SubtreeScopeEvaluator,
};
use super::not::{NotCursor, NotEvaluator};
use super::optimizer::PlanNode;
use super::or::{OrCursor, OrEvaluator};
use crate::config::SearchConfig;
use crate::error::Result;
use crate::storage::Partition;

/// Builds an evaluator for any filter node.
#[derive(Clone, Copy)]
pub struct EvaluatorBuilder<'a> {
    partition: &'a Partition,
}

impl<'a> EvaluatorBuilder<'a> {
    pub fn new(partition: &'a Partition) -> Self {
        Self { partition }
    }

    pub fn build(&self, node: &'a ExprNode) -> Result<FilterEvaluator<'a>> {
        let partition = self.partition;
        Ok(match node {
            ExprNode::And(children) => {
                FilterEvaluator::And(AndEvaluator::new(node, self.build_all(children)?))
            }
            ExprNode::Or(children) => {
                FilterEvaluator::Or(OrEvaluator::new(node, self.build_all(children)?))
            }
            ExprNode::Not(child) => FilterEvaluator::Not(NotEvaluator::new(node, self.build(child)?)),
            ExprNode::Presence { .. } => {
                FilterEvaluator::Presence(PresenceEvaluator::new(node, partition)?)
            }
            ExprNode::Substring(_) => {
                FilterEvaluator::Substring(SubstringEvaluator::new(node, partition)?)
            }
            ExprNode::GreaterEq { .. } => {
                FilterEvaluator::GreaterEq(OrderingEvaluator::new(node, partition)?)
            }
            ExprNode::LessEq { .. } => {
                FilterEvaluator::LessEq(OrderingEvaluator::new(node, partition)?)
            }
            ExprNode::Equality { .. } => {
                FilterEvaluator::Equality(EqualityEvaluator::new(node, partition)?)
            }
            ExprNode::Scope(scope) => match scope.scope {
                SearchScope::Object => {
                    FilterEvaluator::ObjectScope(ObjectScopeEvaluator::new(node, partition)?)
                }
                SearchScope::OneLevel => {
                    FilterEvaluator::OneLevelScope(OneLevelScopeEvaluator::new(node, partition)?)
                }
                SearchScope::Subtree => {
                    FilterEvaluator::SubtreeScope(SubtreeScopeEvaluator::new(node, partition)?)
                }
            },
        })
    }

    fn build_all(&self, children: &'a [ExprNode]) -> Result<Vec<FilterEvaluator<'a>>> {
        children.iter().map(|child| self.build(child)).collect()
    }
}

/// Builds the cursor tree for an annotated plan.
pub struct CursorBuilder<'a> {
    partition: &'a Partition,
    evaluators: EvaluatorBuilder<'a>,
    config: SearchConfig,
}

impl<'a> CursorBuilder<'a> {
    pub fn new(partition: &'a Partition, config: &SearchConfig) -> Self {
        Self {
            partition,
            evaluators: EvaluatorBuilder::new(partition),
            config: config.clone(),
        }
    }

    pub fn build(&self, plan: &PlanNode<'a>) -> Result<SearchCursor<'a>> {
        let node = plan.expr;
        match node {
            ExprNode::And(_) => self.build_and(plan),
            ExprNode::Or(_) => self.build_or(plan),
            ExprNode::Not(child) => {
                let negated = self.evaluators.build(child)?;
                Ok(SearchCursor::Not(NotCursor::new(
                    node,
                    SearchCursor::Scan(ScanCursor::new(self.partition)),
                    negated,
                )))
            }
            _ if !plan.indexed => {
                debug!(kind = node.kind(), "no usable index, scanning");
                Ok(SearchCursor::Scan(ScanCursor::filtered(
                    self.partition,
                    self.evaluators.build(node)?,
                )))
            }
            ExprNode::Presence { .. } => {
                Ok(SearchCursor::Presence(PresenceCursor::new(node, self.partition)?))
            }
            ExprNode::Substring(_) => {
                Ok(SearchCursor::Substring(SubstringCursor::new(node, self.partition)?))
            }
            ExprNode::GreaterEq { .. } | ExprNode::LessEq { .. } => {
                Ok(SearchCursor::Ordering(OrderingCursor::new(node, self.partition)?))
            }
            ExprNode::Equality { .. } => {
                Ok(SearchCursor::Equality(EqualityCursor::new(node, self.partition)?))
            }
            ExprNode::Scope(_) => Ok(SearchCursor::Scope(ScopeCursor::new(node, self.partition)?)),
        }
    }

    fn build_and(&self, plan: &PlanNode<'a>) -> Result<SearchCursor<'a>> {
        let Some(driving) = plan.driving_child() else {
            return Ok(SearchCursor::Scan(ScanCursor::new(self.partition)));
        };
        if plan.children.len() == 1 {
            return self.build(&plan.children[0]);
        }

        let chosen = &plan.children[driving];
        debug!(
            driving = chosen.expr.kind(),
            count = chosen.count,
            indexed = chosen.indexed,
            "chose driving cursor"
        );
        let driving_cursor = self.build(chosen)?;
        let others = plan
            .children
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != driving)
            .map(|(_, child)| self.evaluators.build(child.expr))
            .collect::<Result<Vec<_>>>()?;
        Ok(SearchCursor::And(AndCursor::new(plan.expr, driving_cursor, others)?))
    }

    fn build_or(&self, plan: &PlanNode<'a>) -> Result<SearchCursor<'a>> {
        match plan.children.as_slice() {
            [] => Ok(SearchCursor::Empty(EmptyCursor::new())),
            [only] => self.build(only),
            children => {
                let mut cursors = Vec::with_capacity(children.len());
                let mut evaluators = Vec::with_capacity(children.len());
                for child in children {
                    cursors.push(self.build(child)?);
                    evaluators.push(self.evaluators.build(child.expr)?);
                }
                Ok(SearchCursor::Or(OrCursor::new(
                    plan.expr,
                    cursors,
                    evaluators,
                    self.config.or_seen_limit,
                )?))
            }
        }
    }
}
