//! Max/Min aggregation.
//!
//! Inserts combine the stored value with the candidate:
//! `max(coalesce(target, :v), :v)` — a NULL stored aggregate loses to any
//! real value, so the first insert stores the candidate exactly. Backends
//! without a scalar two-argument max/min get a CASE expression instead
//! (the probe decides, per call).
//!
//! Max/Min are not algebraically invertible. A delete always falls back to
//! full recomputation: the departed value may have been the extreme, and
//! nothing short of a query reveals the runner-up. An update takes the
//! cheap insert path only when the new source value is at least (Max) /
//! at most (Min) the old one; any other movement — including an
//! incomparable NULL — recomputes.

use std::cmp::Ordering;

use crate::dialect::FunctionProbe;
use crate::error::TallyError;
use crate::schema::ColumnRef;
use crate::snapshot::InstanceSnapshot;
use crate::sql::{AggFunc, ExtremumKind, SetExpr};

use super::{RuleCore, RuleEffect};

/// Shared Max/Min rule body; the [`AggregateRule`](super::AggregateRule)
/// variant supplies the kind.
#[derive(Debug, Clone)]
pub struct Extremum {
    pub(crate) core: RuleCore,
}

impl Extremum {
    pub(crate) fn new(target: ColumnRef, source: ColumnRef) -> Self {
        Extremum {
            core: RuleCore::new(target, Some(source)),
        }
    }

    fn agg_func(kind: ExtremumKind) -> AggFunc {
        match kind {
            ExtremumKind::Max => AggFunc::Max,
            ExtremumKind::Min => AggFunc::Min,
        }
    }

    pub(crate) fn on_insert(
        &self,
        kind: ExtremumKind,
        probe: &dyn FunctionProbe,
        instance: &dyn InstanceSnapshot,
    ) -> Result<RuleEffect, TallyError> {
        let value = self.core.value(instance)?;
        let target = &self.core.target.column;
        Ok(RuleEffect::single(
            target,
            SetExpr::Extremum {
                kind,
                native: probe.supports_function(kind.fn_name()),
                current: Box::new(SetExpr::Coalesce(
                    Box::new(SetExpr::Column(target.clone())),
                    Box::new(SetExpr::Bind(value.clone())),
                )),
                candidate: Box::new(SetExpr::Bind(value)),
            },
        ))
    }

    pub(crate) fn on_update(
        &self,
        kind: ExtremumKind,
        probe: &dyn FunctionProbe,
        instance: &dyn InstanceSnapshot,
    ) -> Result<RuleEffect, TallyError> {
        let new = self.core.value(instance)?;
        let old = self.core.old_value(instance)?;
        let toward_extreme = match (kind, new.sql_cmp(&old)) {
            (ExtremumKind::Max, Some(Ordering::Greater | Ordering::Equal)) => true,
            (ExtremumKind::Min, Some(Ordering::Less | Ordering::Equal)) => true,
            _ => false,
        };
        if toward_extreme {
            self.on_insert(kind, probe, instance)
        } else {
            // The old value might have been the unique extreme.
            self.core.recalc(Self::agg_func(kind), instance, false)
        }
    }

    pub(crate) fn on_delete(
        &self,
        kind: ExtremumKind,
        instance: &dyn InstanceSnapshot,
    ) -> Result<RuleEffect, TallyError> {
        self.core.recalc(Self::agg_func(kind), instance, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::rules::AggregateRule;
    use crate::schema::ForeignKey;
    use crate::snapshot::RowState;
    use crate::value::Scalar;

    fn fk() -> ForeignKey {
        ForeignKey {
            column: "block".into(),
            referenced_table: "blocks".into(),
            referenced_column: "id".into(),
        }
    }

    fn configured_max() -> AggregateRule {
        let mut rule = AggregateRule::max(
            ColumnRef::new("blocks", "lastline"),
            ColumnRef::new("lines", "id"),
        );
        rule.finalize_foreign_key(&fk(), "block", "lines");
        rule
    }

    fn configured_min() -> AggregateRule {
        let mut rule = AggregateRule::min(
            ColumnRef::new("blocks", "firstline"),
            ColumnRef::new("lines", "id"),
        );
        rule.finalize_foreign_key(&fk(), "block", "lines");
        rule
    }

    fn first_expr(effect: RuleEffect) -> SetExpr {
        let RuleEffect::Set(mut assignments) = effect else {
            panic!("expected assignments");
        };
        assignments.remove(0).1
    }

    #[test]
    fn test_insert_native_form() {
        let rule = configured_max();
        let row = RowState::new().with("block", 1i64).with("id", 5i64);
        let expr = first_expr(rule.on_insert(&Dialect::new("sqlite"), &row).unwrap());
        let mut params = Vec::new();
        assert_eq!(
            expr.render(&mut params),
            r#"max(coalesce("lastline", $1), $2)"#
        );
        assert_eq!(params, vec![Scalar::Int(5), Scalar::Int(5)]);
    }

    #[test]
    fn test_insert_portable_form_on_mysql() {
        let rule = configured_max();
        let row = RowState::new().with("block", 1i64).with("id", 5i64);
        let expr = first_expr(rule.on_insert(&Dialect::new("mysql"), &row).unwrap());
        let mut params = Vec::new();
        let sql = expr.render(&mut params);
        assert!(sql.starts_with("CASE WHEN"), "got {sql}");
        assert!(sql.contains('<'));
    }

    #[test]
    fn test_update_toward_extreme_takes_insert_path() {
        let rule = configured_max();
        let mut row = RowState::new().with("block", 1i64).with("id", 5i64);
        row.commit();
        row.set("id", 7i64);
        let expr = first_expr(rule.on_update(&Dialect::default(), &row).unwrap());
        assert!(matches!(expr, SetExpr::Extremum { .. }));
    }

    #[test]
    fn test_update_tie_takes_insert_path() {
        let rule = configured_max();
        let mut row = RowState::new().with("block", 1i64).with("id", 5i64);
        row.commit();
        let expr = first_expr(rule.on_update(&Dialect::default(), &row).unwrap());
        assert!(matches!(expr, SetExpr::Extremum { .. }));
    }

    #[test]
    fn test_update_away_from_extreme_recalcs() {
        let rule = configured_max();
        let mut row = RowState::new().with("block", 1i64).with("id", 5i64);
        row.commit();
        row.set("id", 3i64);
        let expr = first_expr(rule.on_update(&Dialect::default(), &row).unwrap());
        assert!(matches!(expr, SetExpr::Recalc(_)));
    }

    #[test]
    fn test_min_update_downward_takes_insert_path() {
        let rule = configured_min();
        let mut row = RowState::new().with("block", 1i64).with("id", 5i64);
        row.commit();
        row.set("id", 3i64);
        let expr = first_expr(rule.on_update(&Dialect::default(), &row).unwrap());
        assert!(matches!(expr, SetExpr::Extremum { .. }));
    }

    #[test]
    fn test_delete_always_recalcs_with_old_key() {
        let rule = configured_max();
        let mut row = RowState::new().with("block", 1i64).with("id", 5i64);
        row.commit();
        row.set("block", 2i64);
        let expr = first_expr(rule.on_delete(&Dialect::default(), &row).unwrap());
        match expr {
            SetExpr::Recalc(q) => assert_eq!(q.filter.values[0].1, Scalar::Int(1)),
            other => panic!("expected recalc, got {other:?}"),
        }
    }
}
