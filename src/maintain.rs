//! The update coordinator.
//!
//! A [`Maintainer`] owns the aggregate rules attached to one child-table
//! mapping. `configure()` clusters them into [`RuleGroup`]s — one per
//! (target table, grouping filter) — resolving foreign keys and rewriting
//! custom filters exactly once; it is idempotent, so wiring the maintainer
//! into the host twice is harmless. The three lifecycle hooks then turn
//! each child-row event into one merged UPDATE per group, issued through
//! the executor handed in by the host so maintenance shares the triggering
//! write's transaction.
//!
//! # Strategies
//!
//! **Quick** applies algebraic deltas (`cnt = cnt + 1`) wherever the rule
//! kind allows, recomputing only where it must (Max/Min on delete).
//! **Accurate** recomputes on every insert and delete. Same-key updates go
//! through the rules' own `on_update` in both strategies — the rules that
//! cannot maintain incrementally degrade to recomputation themselves.
//!
//! # Group-key changes
//!
//! When an update moves a child between parents, the event splits: delete-
//! side maintenance against the old parent (original binding values), then
//! insert-side maintenance against the new one. Two statements, two rows.

use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::TallyError;
use crate::executor::Executor;
use crate::rewrite::{FilterPair, FilterRewriter};
use crate::rules::{AggregateRule, RuleEffect, RuleOp, bind_filter};
use crate::schema::TableSchema;
use crate::snapshot::InstanceSnapshot;
use crate::sql::{SetExpr, UpdateStatement};
use crate::value::Scalar;

/// Maintenance strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Incremental deltas where safe, recomputation where not.
    #[default]
    Quick,
    /// Recompute on every insert and delete.
    Accurate,
}

/// Coordinator options; the serde derives let integrations keep these in
/// their mapping configuration files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintainerOptions {
    pub strategy: Strategy,
    /// Whether hooks run before the first `enable()` call.
    pub start_enabled: bool,
    /// Emit a warning when two rules in one group write the same column.
    pub warn_on_collision: bool,
}

impl Default for MaintainerOptions {
    fn default() -> Self {
        MaintainerOptions {
            strategy: Strategy::Quick,
            start_enabled: true,
            warn_on_collision: true,
        }
    }
}

/// Signal returned to the host's post-processing chain. This core never
/// vetoes the host's write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    Continue,
}

/// Identity of a rule group: target table plus grouping filter origin.
#[derive(Debug, Clone, PartialEq, Eq)]
enum GroupKey {
    ForeignKey { target: String, column: String },
    Custom { target: String, expr: String },
}

/// Rules sharing one (target table, grouping filter) pair, merged into a
/// single UPDATE per event. The representative filter pair is the first
/// member's.
#[derive(Debug)]
pub struct RuleGroup {
    key: GroupKey,
    target_table: String,
    filters: FilterPair,
    rules: Vec<AggregateRule>,
}

impl RuleGroup {
    pub fn target_table(&self) -> &str {
        &self.target_table
    }

    pub fn rules(&self) -> &[AggregateRule] {
        &self.rules
    }
}

#[derive(Debug)]
struct Configured {
    child_table: String,
    groups: Vec<RuleGroup>,
}

/// Aggregation maintainer for one child-table mapping.
#[derive(Debug)]
pub struct Maintainer {
    options: MaintainerOptions,
    enabled: AtomicBool,
    pending: Vec<AggregateRule>,
    state: Option<Configured>,
}

impl Maintainer {
    /// Incremental maintenance.
    pub fn quick(rules: Vec<AggregateRule>) -> Self {
        Maintainer::with_options(rules, MaintainerOptions::default())
    }

    /// Always-recompute maintenance.
    pub fn accurate(rules: Vec<AggregateRule>) -> Self {
        Maintainer::with_options(
            rules,
            MaintainerOptions {
                strategy: Strategy::Accurate,
                ..MaintainerOptions::default()
            },
        )
    }

    pub fn with_options(rules: Vec<AggregateRule>, options: MaintainerOptions) -> Self {
        let enabled = options.start_enabled;
        Maintainer {
            options,
            enabled: AtomicBool::new(enabled),
            pending: rules,
            state: None,
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.options.strategy
    }

    // ── Off-switch ───────────────────────────────────────────────────────

    /// Suspend maintenance: all hooks become no-ops until `enable()`.
    /// Intended for bulk/administrative operations; re-enabling does not
    /// re-finalize.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    // ── Finalization ─────────────────────────────────────────────────────

    pub fn is_configured(&self) -> bool {
        self.state.is_some()
    }

    /// Rule groups, once configured.
    pub fn groups(&self) -> Option<&[RuleGroup]> {
        self.state.as_ref().map(|s| s.groups.as_slice())
    }

    /// The child table this maintainer is attached to, once configured.
    pub fn child_table(&self) -> Option<&str> {
        self.state.as_ref().map(|s| s.child_table.as_str())
    }

    /// Resolve foreign keys and cluster rules into groups. Idempotent:
    /// a second call is a no-op. Rules with custom filters need
    /// [`configure_with`](Maintainer::configure_with).
    pub fn configure(&mut self, child: &TableSchema) -> Result<(), TallyError> {
        self.configure_with(child, None)
    }

    /// Like [`configure`](Maintainer::configure), with a rewriter for
    /// rules carrying custom filters.
    pub fn configure_with(
        &mut self,
        child: &TableSchema,
        rewriter: Option<&dyn FilterRewriter>,
    ) -> Result<(), TallyError> {
        if self.state.is_some() {
            return Ok(());
        }

        let rules = mem::take(&mut self.pending);
        let mut groups: Vec<RuleGroup> = Vec::new();

        for mut rule in rules {
            let tables = rule.target_tables();
            if let Some(stray) = tables.iter().find(|t| **t != tables[0]) {
                return Err(TallyError::MixedTargetTables(
                    tables[0].to_string(),
                    stray.to_string(),
                ));
            }
            let target = tables[0].to_string();

            let key = match rule.custom_filter().cloned() {
                None => {
                    let fk = crate::resolver::find_foreign_key(child, &target)?.clone();
                    let attribute = crate::resolver::grouping_attribute(child, &fk)?;
                    rule.finalize_foreign_key(&fk, &attribute, &child.name);
                    GroupKey::ForeignKey {
                        target: target.clone(),
                        column: fk.column,
                    }
                }
                Some(raw) => {
                    let rewriter = rewriter.ok_or_else(|| TallyError::RewriterRequired {
                        target: target.clone(),
                    })?;
                    let pair = rewriter.rewrite(&raw, &child.name, &target)?;
                    rule.finalize_custom(pair, &child.name);
                    GroupKey::Custom {
                        target: target.clone(),
                        expr: raw.expr,
                    }
                }
            };

            match groups.iter_mut().find(|g| g.key == key) {
                Some(group) => group.rules.push(rule),
                None => {
                    let filters = rule.filters()?.clone();
                    groups.push(RuleGroup {
                        key,
                        target_table: target,
                        filters,
                        rules: vec![rule],
                    });
                }
            }
        }

        if self.options.warn_on_collision {
            for group in &groups {
                warn_on_column_collisions(group);
            }
        }

        self.state = Some(Configured {
            child_table: child.name.clone(),
            groups,
        });
        Ok(())
    }

    fn configured(&self) -> Result<&Configured, TallyError> {
        self.state.as_ref().ok_or(TallyError::NotConfigured)
    }

    // ── Lifecycle hooks ──────────────────────────────────────────────────

    /// Called after a child instance has been INSERTed.
    pub fn after_insert(
        &self,
        executor: &mut dyn Executor,
        instance: &dyn InstanceSnapshot,
    ) -> Result<HookOutcome, TallyError> {
        if !self.is_enabled() {
            return Ok(HookOutcome::Continue);
        }
        let state = self.configured()?;
        let op = self.insert_op();
        for group in &state.groups {
            self.apply_group(group, executor, instance, op, false)?;
        }
        Ok(HookOutcome::Continue)
    }

    /// Called after a child instance has been DELETEd. The row is gone,
    /// so everything binds against original values.
    pub fn after_delete(
        &self,
        executor: &mut dyn Executor,
        instance: &dyn InstanceSnapshot,
    ) -> Result<HookOutcome, TallyError> {
        if !self.is_enabled() {
            return Ok(HookOutcome::Continue);
        }
        let state = self.configured()?;
        let op = self.delete_op();
        for group in &state.groups {
            self.apply_group(group, executor, instance, op, true)?;
        }
        Ok(HookOutcome::Continue)
    }

    /// Called after a child instance has been UPDATEd. A changed grouping
    /// key splits the event into delete-side maintenance against the old
    /// parent and insert-side maintenance against the new one.
    pub fn after_update(
        &self,
        executor: &mut dyn Executor,
        instance: &dyn InstanceSnapshot,
    ) -> Result<HookOutcome, TallyError> {
        if !self.is_enabled() {
            return Ok(HookOutcome::Continue);
        }
        let state = self.configured()?;
        for group in &state.groups {
            if same_binding_values(group, instance)? {
                self.apply_group(group, executor, instance, RuleOp::Update, false)?;
            } else {
                self.apply_group(group, executor, instance, self.delete_op(), true)?;
                self.apply_group(group, executor, instance, self.insert_op(), false)?;
            }
        }
        Ok(HookOutcome::Continue)
    }

    fn insert_op(&self) -> RuleOp {
        match self.options.strategy {
            Strategy::Quick => RuleOp::Insert,
            Strategy::Accurate => RuleOp::Recalc { old: false },
        }
    }

    fn delete_op(&self) -> RuleOp {
        match self.options.strategy {
            Strategy::Quick => RuleOp::Delete,
            Strategy::Accurate => RuleOp::Recalc { old: true },
        }
    }

    /// Merge every member's effect for `op` and issue one UPDATE bound to
    /// the group filter (original values when `old_filter`).
    fn apply_group(
        &self,
        group: &RuleGroup,
        executor: &mut dyn Executor,
        instance: &dyn InstanceSnapshot,
        op: RuleOp,
        old_filter: bool,
    ) -> Result<(), TallyError> {
        let dialect = executor.dialect();
        let mut assignments: Vec<(String, SetExpr)> = Vec::new();
        for rule in &group.rules {
            match rule.apply(op, &dialect, instance)? {
                RuleEffect::Skip => {}
                RuleEffect::Set(columns) => {
                    for (column, expr) in columns {
                        // Same column twice: the later rule wins, as
                        // warned about at configure time.
                        match assignments.iter_mut().find(|(c, _)| *c == column) {
                            Some(slot) => slot.1 = expr,
                            None => assignments.push((column, expr)),
                        }
                    }
                }
            }
        }
        if assignments.is_empty() {
            return Ok(());
        }

        let filter = bind_filter(&group.filters.update, instance, old_filter)?;
        let statement = UpdateStatement {
            table: group.target_table.clone(),
            assignments,
            filter,
        };
        debug!(table = %statement.table, ?op, "issuing aggregate maintenance update");
        executor.execute(&statement)?;
        Ok(())
    }
}

/// Whether the group's binding attributes are unchanged on the instance.
fn same_binding_values(
    group: &RuleGroup,
    instance: &dyn InstanceSnapshot,
) -> Result<bool, TallyError> {
    for attribute in group.filters.update.params() {
        let original = instance.original(attribute)?;
        let current = instance.current(attribute)?;
        if !values_equal(&original, &current) {
            return Ok(false);
        }
    }
    Ok(true)
}

fn values_equal(a: &Scalar, b: &Scalar) -> bool {
    a == b || a.sql_cmp(b) == Some(std::cmp::Ordering::Equal)
}

/// Two independent aggregations landing on one column cannot both be
/// right under recomputation; flag it but keep going.
fn warn_on_column_collisions(group: &RuleGroup) {
    let mut seen: Vec<&str> = Vec::new();
    for rule in &group.rules {
        for column in rule.target_columns() {
            if seen.contains(&column) {
                warn!(
                    table = %group.target_table,
                    column,
                    "multiple aggregate rules target one column; \
                     recomputation cannot combine them"
                );
            } else {
                seen.push(column);
            }
        }
    }
}
