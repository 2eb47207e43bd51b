//! Cost annotation of filter trees.
//!
//! The optimizer walks a filter bottom-up and estimates how many candidates
//! each node yields, using index counts where an index exists and the size
//! of the partition everywhere else. The annotations live in a [`PlanNode`]
//! tree that borrows the filter; the filter itself is never touched.

use std::ops::Bound;

use tracing::debug;

use dirdb_proto::{ExprNode, SearchScope};

use super::leaf::prefix_successor;
use crate::error::Result;
use crate::storage::Partition;

/// A filter node with its estimated candidate count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanNode<'a> {
    pub expr: &'a ExprNode,
    /// Estimated number of candidates.
    pub count: u64,
    /// Whether a cursor can walk the candidates without a full scan.
    pub indexed: bool,
    pub children: Vec<PlanNode<'a>>,
}

impl<'a> PlanNode<'a> {
    fn leaf(expr: &'a ExprNode, count: u64, indexed: bool) -> Self {
        Self {
            expr,
            count,
            indexed,
            children: Vec::new(),
        }
    }

    /// Index of the child an And cursor should drive with: the smallest
    /// estimate, indexed children first on ties.
    pub fn driving_child(&self) -> Option<usize> {
        self.children
            .iter()
            .enumerate()
            .min_by_key(|(_, child)| (child.count, !child.indexed))
            .map(|(i, _)| i)
    }
}

/// Annotates filter trees against one partition.
pub struct Optimizer<'a> {
    partition: &'a Partition,
}

impl<'a> Optimizer<'a> {
    pub fn new(partition: &'a Partition) -> Self {
        Self { partition }
    }

    /// Annotate `expr` and all its descendants.
    pub fn annotate<'e>(&self, expr: &'e ExprNode) -> Result<PlanNode<'e>> {
        let total = self.partition.count()?;
        self.visit(expr, total)
    }

    fn visit<'e>(&self, expr: &'e ExprNode, total: u64) -> Result<PlanNode<'e>> {
        let plan = match expr {
            ExprNode::And(children) => {
                let children = self.visit_all(children, total)?;
                PlanNode {
                    expr,
                    count: children.iter().map(|c| c.count).min().unwrap_or(total),
                    indexed: children.iter().any(|c| c.indexed),
                    children,
                }
            }
            ExprNode::Or(children) => {
                let children = self.visit_all(children, total)?;
                let sum = children
                    .iter()
                    .fold(0u64, |acc, c| acc.saturating_add(c.count));
                PlanNode {
                    expr,
                    count: sum.min(total),
                    indexed: children.iter().all(|c| c.indexed),
                    children,
                }
            }
            ExprNode::Not(child) => PlanNode {
                expr,
                count: total,
                indexed: false,
                children: vec![self.visit(child, total)?],
            },
            _ => {
                let (count, indexed) = self.estimate_leaf(expr, total)?;
                PlanNode::leaf(expr, count, indexed)
            }
        };
        debug!(
            kind = expr.kind(),
            count = plan.count,
            indexed = plan.indexed,
            "annotated filter node"
        );
        Ok(plan)
    }

    fn visit_all<'e>(&self, children: &'e [ExprNode], total: u64) -> Result<Vec<PlanNode<'e>>> {
        children.iter().map(|c| self.visit(c, total)).collect()
    }

    /// Index count for a leaf, or the full table when no cursor could walk
    /// it.
    fn estimate_leaf(&self, expr: &ExprNode, total: u64) -> Result<(u64, bool)> {
        let partition = self.partition;
        let scan = (total, false);

        if let ExprNode::Scope(scope) = expr {
            let index = match scope.scope {
                SearchScope::Object => partition.entry_index(),
                SearchScope::OneLevel => partition.one_level_index(),
                SearchScope::Subtree => partition.sub_level_index(),
            };
            return Ok((index.count_value(&scope.base)?, true));
        }

        let Some(attribute) = expr.attribute() else {
            return Ok(scan);
        };
        let at = partition.schema().lookup(attribute)?;
        let Some(index) = partition.user_index(at) else {
            return Ok(scan);
        };

        let count = match expr {
            ExprNode::Presence { .. } => {
                if at.is_always_present() {
                    return Ok(scan);
                }
                partition.presence_index().count_value(&at.oid().to_string())?
            }
            ExprNode::Equality { value, .. } => {
                if at.equality().is_none() {
                    return Ok(scan);
                }
                index.count_value(&at.index_form(value)?)?
            }
            ExprNode::GreaterEq { value, .. } | ExprNode::LessEq { value, .. } => {
                if at.ordering().is_none() {
                    return Ok(scan);
                }
                let value = at.index_form(value)?;
                if matches!(expr, ExprNode::GreaterEq { .. }) {
                    index.count_range(Bound::Included(&value), Bound::Unbounded)?
                } else {
                    index.count_range(Bound::Unbounded, Bound::Included(&value))?
                }
            }
            ExprNode::Substring(substring) => {
                let Some(initial) = substring.initial.as_deref() else {
                    return Ok(scan);
                };
                if at.substring_or_equality().is_none() {
                    return Ok(scan);
                }
                let lower = at.index_form(initial)?;
                let upper = prefix_successor(&lower);
                index.count_range(
                    Bound::Included(&lower),
                    upper.as_ref().map_or(Bound::Unbounded, Bound::Excluded),
                )?
            }
            _ => return Ok(scan),
        };
        Ok((count, true))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dirdb_proto::{DerefAliases, Entry};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::schema::SchemaRegistry;

    fn partition() -> Partition {
        let p = Partition::memory(Arc::new(SchemaRegistry::core()), ["cn", "postalCode"]).unwrap();
        let root = p.add(None, Entry::new("o=acme").with("o", ["acme"])).unwrap();
        for (cn, code) in [("Jack", "1"), ("Jim", "2"), ("Tony", "3"), ("Amy", "3")] {
            p.add(
                Some(root),
                Entry::new(format!("cn={},o=acme", cn))
                    .with("cn", [cn])
                    .with("postalCode", [code])
                    .with("sn", ["x"]),
            )
            .unwrap();
        }
        p
    }

    #[test]
    fn test_leaf_estimates() {
        let p = partition();
        let optimizer = Optimizer::new(&p);
        let cases = [
            (ExprNode::eq("cn", "JACK"), 1, true),
            (ExprNode::ge("postalCode", "2"), 3, true),
            (ExprNode::le("postalCode", "1"), 1, true),
            (ExprNode::starts_with("cn", "j"), 2, true),
            (ExprNode::present("cn"), 4, true),
            (ExprNode::present("objectClass"), 5, false),
            (ExprNode::eq("sn", "x"), 5, false),
            (ExprNode::one_level(1, DerefAliases::Never), 4, true),
            (ExprNode::subtree(1, DerefAliases::Always), 5, true),
            (ExprNode::object_scope(3), 1, true),
        ];
        for (expr, count, indexed) in cases {
            let plan = optimizer.annotate(&expr).unwrap();
            assert_eq!((plan.count, plan.indexed), (count, indexed), "{}", expr);
        }
    }

    #[test]
    fn test_branch_estimates() {
        let p = partition();
        let optimizer = Optimizer::new(&p);

        let and = ExprNode::and(vec![
            ExprNode::eq("sn", "x"),
            ExprNode::ge("postalCode", "3"),
            ExprNode::starts_with("cn", "j"),
        ]);
        let plan = optimizer.annotate(&and).unwrap();
        assert_eq!((plan.count, plan.indexed), (2, true));
        assert_eq!(plan.children.len(), 3);
        assert_eq!(plan.driving_child(), Some(1));

        let or = ExprNode::or(vec![
            ExprNode::present("cn"),
            ExprNode::ge("postalCode", "1"),
        ]);
        let plan = optimizer.annotate(&or).unwrap();
        assert_eq!((plan.count, plan.indexed), (5, true));

        let or = ExprNode::or(vec![ExprNode::eq("cn", "jim"), ExprNode::eq("sn", "x")]);
        let plan = optimizer.annotate(&or).unwrap();
        assert!(!plan.indexed);

        let not = ExprNode::not(ExprNode::eq("cn", "jim"));
        let plan = optimizer.annotate(&not).unwrap();
        assert_eq!((plan.count, plan.indexed), (5, false));
        assert_eq!(plan.children[0].count, 1);

        let empty = ExprNode::and(vec![]);
        let plan = optimizer.annotate(&empty).unwrap();
        assert_eq!((plan.count, plan.indexed), (5, false));
        assert_eq!(plan.driving_child(), None);
    }

    #[test]
    fn test_driving_child_prefers_indexed_on_ties() {
        let p = partition();
        let and = ExprNode::and(vec![
            ExprNode::eq("sn", "x"),
            ExprNode::present("objectClass"),
            ExprNode::subtree(1, DerefAliases::Never),
        ]);
        let plan = Optimizer::new(&p).annotate(&and).unwrap();
        assert_eq!(plan.driving_child(), Some(2));
    }

    #[test]
    fn test_unknown_attribute_is_an_error() {
        let p = partition();
        let expr = ExprNode::eq("noSuchAttribute", "x");
        assert!(Optimizer::new(&p).annotate(&expr).is_err());
    }
}
