//! Sum aggregation.
//!
//! Fully invertible: every event is a cheap algebraic delta against
//! `coalesce(target, 0)`. The delete and update paths subtract the
//! *original* source value — by hook time the row already carries the new
//! one.

use crate::error::TallyError;
use crate::schema::ColumnRef;
use crate::snapshot::InstanceSnapshot;
use crate::sql::{AggFunc, SetExpr};

use super::{RuleCore, RuleEffect};

#[derive(Debug, Clone)]
pub struct Sum {
    pub(crate) core: RuleCore,
}

impl Sum {
    pub(crate) fn new(target: ColumnRef, source: ColumnRef) -> Self {
        Sum {
            core: RuleCore::new(target, Some(source)),
        }
    }

    pub(crate) fn on_insert(
        &self,
        instance: &dyn InstanceSnapshot,
    ) -> Result<RuleEffect, TallyError> {
        let value = self.core.value(instance)?;
        Ok(RuleEffect::single(
            &self.core.target.column,
            SetExpr::add(
                SetExpr::target_or_zero(&self.core.target.column),
                SetExpr::Bind(value),
            ),
        ))
    }

    pub(crate) fn on_delete(
        &self,
        instance: &dyn InstanceSnapshot,
    ) -> Result<RuleEffect, TallyError> {
        let old = self.core.old_value(instance)?;
        Ok(RuleEffect::single(
            &self.core.target.column,
            SetExpr::sub(
                SetExpr::target_or_zero(&self.core.target.column),
                SetExpr::Bind(old),
            ),
        ))
    }

    pub(crate) fn on_update(
        &self,
        instance: &dyn InstanceSnapshot,
    ) -> Result<RuleEffect, TallyError> {
        let old = self.core.old_value(instance)?;
        let new = self.core.value(instance)?;
        Ok(RuleEffect::single(
            &self.core.target.column,
            SetExpr::add(
                SetExpr::sub(
                    SetExpr::target_or_zero(&self.core.target.column),
                    SetExpr::Bind(old),
                ),
                SetExpr::Bind(new),
            ),
        ))
    }

    pub(crate) fn on_recalc(
        &self,
        instance: &dyn InstanceSnapshot,
        old: bool,
    ) -> Result<RuleEffect, TallyError> {
        self.core.recalc(AggFunc::Sum, instance, old)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::error::TallyError;
    use crate::rules::AggregateRule;
    use crate::schema::ForeignKey;
    use crate::snapshot::RowState;
    use crate::value::Scalar;

    fn configured_sum() -> AggregateRule {
        let mut rule = AggregateRule::sum(
            ColumnRef::new("blocks", "length"),
            ColumnRef::new("lines", "length"),
        );
        rule.finalize_foreign_key(
            &ForeignKey {
                column: "block".into(),
                referenced_table: "blocks".into(),
                referenced_column: "id".into(),
            },
            "block",
            "lines",
        );
        rule
    }

    fn render(effect: RuleEffect) -> (String, Vec<Scalar>) {
        let RuleEffect::Set(assignments) = effect else {
            panic!("expected assignments");
        };
        let mut params = Vec::new();
        let sql = assignments[0].1.render(&mut params);
        (sql, params)
    }

    #[test]
    fn test_insert_adds_current_value() {
        let rule = configured_sum();
        let row = RowState::new().with("block", 1i64).with("length", 10i64);
        let (sql, params) = render(rule.on_insert(&Dialect::default(), &row).unwrap());
        assert_eq!(sql, r#"coalesce("length", 0) + $1"#);
        assert_eq!(params, vec![Scalar::Int(10)]);
    }

    #[test]
    fn test_delete_subtracts_original_value() {
        let rule = configured_sum();
        let mut row = RowState::new().with("block", 1i64).with("length", 10i64);
        row.commit();
        row.set("length", 99i64); // dirtied, then deleted
        let (sql, params) = render(rule.on_delete(&Dialect::default(), &row).unwrap());
        assert_eq!(sql, r#"coalesce("length", 0) - $1"#);
        assert_eq!(params, vec![Scalar::Int(10)]);
    }

    #[test]
    fn test_update_swaps_old_for_new() {
        let rule = configured_sum();
        let mut row = RowState::new().with("block", 1i64).with("length", 9i64);
        row.commit();
        row.set("length", 18i64);
        let (sql, params) = render(rule.on_update(&Dialect::default(), &row).unwrap());
        assert_eq!(sql, r#"coalesce("length", 0) - $1 + $2"#);
        assert_eq!(params, vec![Scalar::Int(9), Scalar::Int(18)]);
    }

    #[test]
    fn test_delete_without_baseline_fails() {
        let rule = configured_sum();
        let row = RowState::new().with("block", 1i64).with("length", 10i64);
        let err = rule.on_delete(&Dialect::default(), &row).unwrap_err();
        assert!(matches!(err, TallyError::MissingOriginal { .. }));
    }
}
