//! Aggregate rules.
//!
//! One rule maintains one aggregate: a target column on the parent table,
//! an optional source column on the child table, and a grouping filter
//! (foreign-key-derived unless the integrator supplies a custom one).
//! Every rule answers the same four events — insert, delete, update,
//! recalc — with a [`RuleEffect`]: either nothing, or assignments to merge
//! into the group's UPDATE.
//!
//! The kinds form a closed set, dispatched by matching on
//! [`AggregateRule`]; there is no open subclassing. Count and Sum are
//! algebraically invertible and stay incremental everywhere; Max/Min are
//! not — removing a row can only be handled by recomputation, since the
//! departed value may have been the extreme and nothing cheaper reveals
//! the runner-up.

pub mod average;
pub mod count;
pub mod extremum;
pub mod sum;

pub use average::{Average, AverageAccurate};
pub use count::Count;
pub use extremum::Extremum;
pub use sum::Sum;

use crate::dialect::FunctionProbe;
use crate::error::TallyError;
use crate::rewrite::{FilterPair, RawFilter};
use crate::schema::{ColumnRef, ForeignKey};
use crate::snapshot::{InstanceSnapshot, current_or_original};
use crate::sql::{AggFunc, BoundFilter, ExtremumKind, FilterSpec, RecalcQuery, SetExpr};
use crate::value::Scalar;

/// What one rule wants done for one event.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleEffect {
    /// No change.
    Skip,
    /// Assignments keyed by target column name.
    Set(Vec<(String, SetExpr)>),
}

impl RuleEffect {
    pub(crate) fn single(column: &str, expr: SetExpr) -> RuleEffect {
        RuleEffect::Set(vec![(column.to_string(), expr)])
    }
}

/// The four rule events. The coordinator maps lifecycle hooks onto these
/// according to its strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOp {
    Insert,
    Delete,
    Update,
    Recalc { old: bool },
}

/// Resolve a filter's parameter values from the instance, original or
/// current per `old`.
pub(crate) fn bind_filter(
    spec: &FilterSpec,
    instance: &dyn InstanceSnapshot,
    old: bool,
) -> Result<BoundFilter, TallyError> {
    let mut values = Vec::new();
    for attr in spec.params() {
        values.push((attr.to_string(), current_or_original(instance, attr, old)?));
    }
    Ok(BoundFilter {
        spec: spec.clone(),
        values,
    })
}

/// Shared state of a single-target rule: the columns it touches and the
/// grouping filters resolved at configure time.
#[derive(Debug, Clone)]
pub(crate) struct RuleCore {
    pub target: ColumnRef,
    pub source: Option<ColumnRef>,
    pub custom_filter: Option<RawFilter>,
    /// Child table, known once the rule is attached to a maintainer.
    pub child_table: Option<String>,
    /// Resolved at configure time, immutable afterwards.
    pub filters: Option<FilterPair>,
}

impl RuleCore {
    pub(crate) fn new(target: ColumnRef, source: Option<ColumnRef>) -> Self {
        RuleCore {
            target,
            source,
            custom_filter: None,
            child_table: None,
            filters: None,
        }
    }

    /// Current value of the source column's attribute.
    pub(crate) fn value(&self, instance: &dyn InstanceSnapshot) -> Result<Scalar, TallyError> {
        let source = self.source_ref()?;
        instance.current(&source.column)
    }

    /// Original (pre-transaction) value of the source column's attribute.
    pub(crate) fn old_value(&self, instance: &dyn InstanceSnapshot) -> Result<Scalar, TallyError> {
        let source = self.source_ref()?;
        instance.original(&source.column)
    }

    fn source_ref(&self) -> Result<&ColumnRef, TallyError> {
        self.source
            .as_ref()
            .ok_or_else(|| TallyError::UnknownColumn {
                table: self.target.table.clone(),
                column: "<source>".to_string(),
            })
    }

    pub(crate) fn filters(&self) -> Result<&FilterPair, TallyError> {
        self.filters.as_ref().ok_or(TallyError::NotConfigured)
    }

    /// Install the foreign-key-derived filter pair (resolver fallback).
    pub(crate) fn bind_foreign_key(&mut self, fk: &ForeignKey, attribute: &str, child: &str) {
        self.child_table = Some(child.to_string());
        self.filters = Some(FilterPair {
            recalc: FilterSpec::KeyEquals {
                column: fk.column.clone(),
                attribute: attribute.to_string(),
            },
            update: FilterSpec::KeyEquals {
                column: fk.referenced_column.clone(),
                attribute: attribute.to_string(),
            },
        });
    }

    /// Install a rewritten custom filter pair.
    pub(crate) fn bind_custom(&mut self, pair: FilterPair, child: &str) {
        self.child_table = Some(child.to_string());
        self.filters = Some(pair);
    }

    /// Full recomputation: `target = (SELECT func(source) FROM child WHERE
    /// group-filter)`, the group key bound old or current per `old`.
    pub(crate) fn recalc(
        &self,
        func: AggFunc,
        instance: &dyn InstanceSnapshot,
        old: bool,
    ) -> Result<RuleEffect, TallyError> {
        let filters = self.filters()?;
        let filter = bind_filter(&filters.recalc, instance, old)?;
        let child_table = match (&self.source, &self.child_table) {
            (Some(src), _) => src.table.clone(),
            (None, Some(child)) => child.clone(),
            (None, None) => return Err(TallyError::NotConfigured),
        };
        Ok(RuleEffect::single(
            &self.target.column,
            SetExpr::Recalc(RecalcQuery {
                func,
                source: self.source.as_ref().map(|c| c.column.clone()),
                child_table,
                filter,
            }),
        ))
    }
}

/// The closed set of aggregate kinds.
#[derive(Debug, Clone)]
pub enum AggregateRule {
    Count(Count),
    Sum(Sum),
    Max(Extremum),
    Min(Extremum),
    Average(Average),
    AverageAccurate(AverageAccurate),
}

impl AggregateRule {
    // ── Constructors ─────────────────────────────────────────────────────

    /// Count of associated child rows (`count(*)` on recalc).
    pub fn count(target: ColumnRef) -> AggregateRule {
        AggregateRule::Count(Count::new(target, None))
    }

    /// Count of non-null `source` values.
    pub fn count_of(target: ColumnRef, source: ColumnRef) -> AggregateRule {
        AggregateRule::Count(Count::new(target, Some(source)))
    }

    pub fn sum(target: ColumnRef, source: ColumnRef) -> AggregateRule {
        AggregateRule::Sum(Sum::new(target, source))
    }

    pub fn max(target: ColumnRef, source: ColumnRef) -> AggregateRule {
        AggregateRule::Max(Extremum::new(target, source))
    }

    pub fn min(target: ColumnRef, source: ColumnRef) -> AggregateRule {
        AggregateRule::Min(Extremum::new(target, source))
    }

    /// Composite average: incremental sum and count columns sharing one
    /// grouping key. Both targets must live in the same table (checked at
    /// configure time).
    pub fn average(
        sum_target: ColumnRef,
        source: ColumnRef,
        count_target: ColumnRef,
    ) -> AggregateRule {
        AggregateRule::Average(Average::new(sum_target, source, count_target))
    }

    /// Always-recompute average into a single column.
    pub fn average_accurate(target: ColumnRef, source: ColumnRef) -> AggregateRule {
        AggregateRule::AverageAccurate(AverageAccurate::new(target, source))
    }

    /// Attach a custom grouping filter instead of foreign-key discovery.
    /// Requires a [`FilterRewriter`](crate::rewrite::FilterRewriter) at
    /// configure time.
    pub fn with_filter(mut self, filter: RawFilter) -> Self {
        for core in self.cores_mut() {
            core.custom_filter = Some(filter.clone());
        }
        self
    }

    // ── Introspection ────────────────────────────────────────────────────

    /// The table holding this rule's target column(s).
    pub fn target_table(&self) -> &str {
        match self {
            AggregateRule::Count(r) => &r.core.target.table,
            AggregateRule::Sum(r) => &r.core.target.table,
            AggregateRule::Max(r) | AggregateRule::Min(r) => &r.core.target.table,
            AggregateRule::Average(r) => &r.sum.core.target.table,
            AggregateRule::AverageAccurate(r) => &r.core.target.table,
        }
    }

    /// Target column names (two for the composite average).
    pub fn target_columns(&self) -> Vec<&str> {
        match self {
            AggregateRule::Count(r) => vec![&r.core.target.column],
            AggregateRule::Sum(r) => vec![&r.core.target.column],
            AggregateRule::Max(r) | AggregateRule::Min(r) => vec![&r.core.target.column],
            AggregateRule::Average(r) => {
                vec![&r.sum.core.target.column, &r.count.core.target.column]
            }
            AggregateRule::AverageAccurate(r) => vec![&r.core.target.column],
        }
    }

    /// All target tables named by this rule (composite rules may
    /// misconfigure across tables; the coordinator validates).
    pub(crate) fn target_tables(&self) -> Vec<&str> {
        match self {
            AggregateRule::Average(r) => {
                vec![&r.sum.core.target.table, &r.count.core.target.table]
            }
            other => vec![other.target_table()],
        }
    }

    pub(crate) fn custom_filter(&self) -> Option<&RawFilter> {
        self.cores().into_iter().find_map(|c| c.custom_filter.as_ref())
    }

    /// The resolved filter pair (the group representative's is used for
    /// the outer UPDATE).
    pub(crate) fn filters(&self) -> Result<&FilterPair, TallyError> {
        self.cores()[0].filters()
    }

    fn cores(&self) -> Vec<&RuleCore> {
        match self {
            AggregateRule::Count(r) => vec![&r.core],
            AggregateRule::Sum(r) => vec![&r.core],
            AggregateRule::Max(r) | AggregateRule::Min(r) => vec![&r.core],
            AggregateRule::Average(r) => vec![&r.sum.core, &r.count.core],
            AggregateRule::AverageAccurate(r) => vec![&r.core],
        }
    }

    fn cores_mut(&mut self) -> Vec<&mut RuleCore> {
        match self {
            AggregateRule::Count(r) => vec![&mut r.core],
            AggregateRule::Sum(r) => vec![&mut r.core],
            AggregateRule::Max(r) | AggregateRule::Min(r) => vec![&mut r.core],
            AggregateRule::Average(r) => vec![&mut r.sum.core, &mut r.count.core],
            AggregateRule::AverageAccurate(r) => vec![&mut r.core],
        }
    }

    // ── Finalization (resolver/coordinator only) ─────────────────────────

    pub(crate) fn finalize_foreign_key(
        &mut self,
        fk: &ForeignKey,
        attribute: &str,
        child: &str,
    ) {
        for core in self.cores_mut() {
            core.bind_foreign_key(fk, attribute, child);
        }
    }

    pub(crate) fn finalize_custom(&mut self, pair: FilterPair, child: &str) {
        for core in self.cores_mut() {
            core.bind_custom(pair.clone(), child);
        }
    }

    // ── Event dispatch ───────────────────────────────────────────────────

    pub fn apply(
        &self,
        op: RuleOp,
        probe: &dyn FunctionProbe,
        instance: &dyn InstanceSnapshot,
    ) -> Result<RuleEffect, TallyError> {
        match op {
            RuleOp::Insert => self.on_insert(probe, instance),
            RuleOp::Delete => self.on_delete(probe, instance),
            RuleOp::Update => self.on_update(probe, instance),
            RuleOp::Recalc { old } => self.on_recalc(probe, instance, old),
        }
    }

    pub fn on_insert(
        &self,
        probe: &dyn FunctionProbe,
        instance: &dyn InstanceSnapshot,
    ) -> Result<RuleEffect, TallyError> {
        match self {
            AggregateRule::Count(r) => r.on_insert(),
            AggregateRule::Sum(r) => r.on_insert(instance),
            AggregateRule::Max(r) => r.on_insert(ExtremumKind::Max, probe, instance),
            AggregateRule::Min(r) => r.on_insert(ExtremumKind::Min, probe, instance),
            AggregateRule::Average(r) => r.on_insert(instance),
            AggregateRule::AverageAccurate(r) => r.on_recalc(instance, false),
        }
    }

    pub fn on_delete(
        &self,
        _probe: &dyn FunctionProbe,
        instance: &dyn InstanceSnapshot,
    ) -> Result<RuleEffect, TallyError> {
        match self {
            AggregateRule::Count(r) => r.on_delete(),
            AggregateRule::Sum(r) => r.on_delete(instance),
            AggregateRule::Max(r) => r.on_delete(ExtremumKind::Max, instance),
            AggregateRule::Min(r) => r.on_delete(ExtremumKind::Min, instance),
            AggregateRule::Average(r) => r.on_delete(instance),
            AggregateRule::AverageAccurate(r) => r.on_recalc(instance, true),
        }
    }

    pub fn on_update(
        &self,
        probe: &dyn FunctionProbe,
        instance: &dyn InstanceSnapshot,
    ) -> Result<RuleEffect, TallyError> {
        match self {
            AggregateRule::Count(r) => r.on_update(),
            AggregateRule::Sum(r) => r.on_update(instance),
            AggregateRule::Max(r) => r.on_update(ExtremumKind::Max, probe, instance),
            AggregateRule::Min(r) => r.on_update(ExtremumKind::Min, probe, instance),
            AggregateRule::Average(r) => r.on_update(instance),
            AggregateRule::AverageAccurate(r) => r.on_recalc(instance, false),
        }
    }

    pub fn on_recalc(
        &self,
        _probe: &dyn FunctionProbe,
        instance: &dyn InstanceSnapshot,
        old: bool,
    ) -> Result<RuleEffect, TallyError> {
        match self {
            AggregateRule::Count(r) => r.on_recalc(instance, old),
            AggregateRule::Sum(r) => r.on_recalc(instance, old),
            AggregateRule::Max(r) => r.core.recalc(AggFunc::Max, instance, old),
            AggregateRule::Min(r) => r.core.recalc(AggFunc::Min, instance, old),
            AggregateRule::Average(r) => r.on_recalc(instance, old),
            AggregateRule::AverageAccurate(r) => r.on_recalc(instance, old),
        }
    }
}
