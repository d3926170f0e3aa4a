//! Count aggregation.
//!
//! No real source column is needed — recalc issues `count(*)`, which
//! matches every associated row. When a source column is given, recalc
//! counts its non-null values instead; the incremental path stays `±1`
//! either way.

use crate::error::TallyError;
use crate::schema::ColumnRef;
use crate::snapshot::InstanceSnapshot;
use crate::sql::{AggFunc, SetExpr};
use crate::value::Scalar;

use super::{RuleCore, RuleEffect};

#[derive(Debug, Clone)]
pub struct Count {
    pub(crate) core: RuleCore,
}

impl Count {
    pub(crate) fn new(target: ColumnRef, source: Option<ColumnRef>) -> Self {
        Count {
            core: RuleCore::new(target, source),
        }
    }

    pub(crate) fn on_insert(&self) -> Result<RuleEffect, TallyError> {
        Ok(RuleEffect::single(
            &self.core.target.column,
            SetExpr::add(
                SetExpr::target_or_zero(&self.core.target.column),
                SetExpr::Literal(Scalar::Int(1)),
            ),
        ))
    }

    pub(crate) fn on_delete(&self) -> Result<RuleEffect, TallyError> {
        Ok(RuleEffect::single(
            &self.core.target.column,
            SetExpr::sub(
                SetExpr::target_or_zero(&self.core.target.column),
                SetExpr::Literal(Scalar::Int(1)),
            ),
        ))
    }

    /// A non-key update never changes how many rows belong to the group.
    pub(crate) fn on_update(&self) -> Result<RuleEffect, TallyError> {
        Ok(RuleEffect::Skip)
    }

    pub(crate) fn on_recalc(
        &self,
        instance: &dyn InstanceSnapshot,
        old: bool,
    ) -> Result<RuleEffect, TallyError> {
        self.core.recalc(AggFunc::Count, instance, old)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::rules::AggregateRule;
    use crate::schema::ForeignKey;
    use crate::snapshot::RowState;
    use crate::sql::{FilterSpec, RecalcQuery};

    fn configured_count() -> AggregateRule {
        let mut rule = AggregateRule::count(ColumnRef::new("blocks", "lines"));
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

    #[test]
    fn test_insert_increments() {
        let rule = configured_count();
        let row = RowState::new().with("block", 1i64);
        let effect = rule.on_insert(&Dialect::default(), &row).unwrap();
        let RuleEffect::Set(assignments) = effect else {
            panic!("expected assignments");
        };
        let mut params = Vec::new();
        assert_eq!(
            assignments[0].1.render(&mut params),
            r#"coalesce("lines", 0) + 1"#
        );
    }

    #[test]
    fn test_update_is_noop() {
        let rule = configured_count();
        let mut row = RowState::new().with("block", 1i64);
        row.commit();
        let effect = rule.on_update(&Dialect::default(), &row).unwrap();
        assert_eq!(effect, RuleEffect::Skip);
    }

    #[test]
    fn test_recalc_counts_star_without_source() {
        let rule = configured_count();
        let row = RowState::new().with("block", 3i64);
        let effect = rule
            .on_recalc(&Dialect::default(), &row, false)
            .unwrap();
        let RuleEffect::Set(assignments) = effect else {
            panic!("expected assignments");
        };
        match &assignments[0].1 {
            SetExpr::Recalc(RecalcQuery { source, .. }) => assert!(source.is_none()),
            other => panic!("expected recalc, got {other:?}"),
        }
    }

    #[test]
    fn test_recalc_counts_source_when_given() {
        let mut rule = AggregateRule::count_of(
            ColumnRef::new("blocks", "lines"),
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
        let row = RowState::new().with("block", 3i64);
        let effect = rule
            .on_recalc(&Dialect::default(), &row, false)
            .unwrap();
        let RuleEffect::Set(assignments) = effect else {
            panic!("expected assignments");
        };
        match &assignments[0].1 {
            SetExpr::Recalc(RecalcQuery { source, .. }) => {
                assert_eq!(source.as_deref(), Some("length"));
            }
            other => panic!("expected recalc, got {other:?}"),
        }
    }

    #[test]
    fn test_recalc_old_binds_original_key() {
        let rule = configured_count();
        let mut row = RowState::new().with("block", 1i64);
        row.commit();
        row.set("block", 2i64);
        let effect = rule.on_recalc(&Dialect::default(), &row, true).unwrap();
        let RuleEffect::Set(assignments) = effect else {
            panic!("expected assignments");
        };
        match &assignments[0].1 {
            SetExpr::Recalc(RecalcQuery { filter, .. }) => {
                assert!(matches!(filter.spec, FilterSpec::KeyEquals { .. }));
                assert_eq!(filter.values[0].1, Scalar::Int(1));
            }
            other => panic!("expected recalc, got {other:?}"),
        }
    }
}
