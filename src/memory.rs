//! In-process table store.
//!
//! [`MemoryDb`] implements [`Executor`] by interpreting
//! [`UpdateStatement`]s — including correlated recomputation subqueries —
//! against plain row maps. It exists so the engine can be exercised
//! end-to-end without a database: the integration suite drives whole
//! insert/move/delete scenarios through it and compares stored aggregates
//! against ground truth. Embedders can use it the same way in their own
//! tests.
//!
//! Only the foreign-key-derived (`column = $key`) filter form is
//! interpreted; rewritten custom filters are backend SQL and out of reach
//! here.

use std::collections::BTreeMap;

use crate::dialect::Dialect;
use crate::error::TallyError;
use crate::executor::Executor;
use crate::sql::{AggFunc, BoundFilter, FilterSpec, RecalcQuery, SetExpr, UpdateStatement};
use crate::value::Scalar;

type Row = BTreeMap<String, Scalar>;

/// A toy table store with SQL-ish NULL semantics.
#[derive(Debug, Default)]
pub struct MemoryDb {
    dialect: Dialect,
    tables: BTreeMap<String, Vec<Row>>,
    history: Vec<(String, Vec<Scalar>)>,
    fail_next: Option<String>,
}

impl MemoryDb {
    pub fn new() -> Self {
        MemoryDb::default()
    }

    pub fn with_dialect(dialect: Dialect) -> Self {
        MemoryDb {
            dialect,
            ..MemoryDb::default()
        }
    }

    /// Insert a row; the table springs into existence on first use.
    pub fn insert(&mut self, table: &str, row: &[(&str, Scalar)]) {
        let row: Row = row
            .iter()
            .map(|(c, v)| (c.to_string(), v.clone()))
            .collect();
        self.tables.entry(table.to_string()).or_default().push(row);
    }

    /// Delete rows where `column == value`, returning how many went.
    pub fn delete_where(&mut self, table: &str, column: &str, value: &Scalar) -> usize {
        let Some(rows) = self.tables.get_mut(table) else {
            return 0;
        };
        let before = rows.len();
        rows.retain(|r| !scalar_eq(r.get(column), value));
        before - rows.len()
    }

    /// Set one column on rows where `key_column == key`.
    pub fn set_where(
        &mut self,
        table: &str,
        key_column: &str,
        key: &Scalar,
        column: &str,
        value: Scalar,
    ) {
        if let Some(rows) = self.tables.get_mut(table) {
            for row in rows.iter_mut().filter(|r| scalar_eq(r.get(key_column), key)) {
                row.insert(column.to_string(), value.clone());
            }
        }
    }

    /// Read one column of the first row where `key_column == key`.
    pub fn get(&self, table: &str, key_column: &str, key: &Scalar, column: &str) -> Scalar {
        self.tables
            .get(table)
            .and_then(|rows| rows.iter().find(|r| scalar_eq(r.get(key_column), key)))
            .and_then(|r| r.get(column).cloned())
            .unwrap_or(Scalar::Null)
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, Vec::len)
    }

    /// Rendered SQL and parameters of every executed statement, in order.
    pub fn history(&self) -> &[(String, Vec<Scalar>)] {
        &self.history
    }

    /// Make the next `execute` fail with an execution error.
    pub fn fail_next(&mut self, message: impl Into<String>) {
        self.fail_next = Some(message.into());
    }

    // ── Evaluation ───────────────────────────────────────────────────────

    fn filter_matches(&self, filter: &BoundFilter, row: &Row) -> Result<bool, TallyError> {
        match &filter.spec {
            FilterSpec::KeyEquals { column, .. } => {
                let bound = filter
                    .values
                    .first()
                    .map(|(_, v)| v.clone())
                    .unwrap_or_default();
                Ok(scalar_eq(row.get(column), &bound))
            }
            FilterSpec::Custom { sql, .. } => Err(TallyError::Unsupported(format!(
                "custom filter in memory store: {sql}"
            ))),
        }
    }

    fn eval(&self, expr: &SetExpr, row: &Row) -> Result<Scalar, TallyError> {
        Ok(match expr {
            SetExpr::Literal(v) | SetExpr::Bind(v) => v.clone(),
            SetExpr::Column(c) => row.get(c).cloned().unwrap_or(Scalar::Null),
            SetExpr::Coalesce(a, b) => {
                let a = self.eval(a, row)?;
                if a.is_null() { self.eval(b, row)? } else { a }
            }
            SetExpr::Add(a, b) => self.eval(a, row)?.sql_add(&self.eval(b, row)?),
            SetExpr::Sub(a, b) => self.eval(a, row)?.sql_sub(&self.eval(b, row)?),
            SetExpr::Extremum {
                kind,
                current,
                candidate,
                ..
            } => {
                // Both rendered forms reduce to: candidate wins when the
                // current value is NULL or loses the comparison.
                let current = self.eval(current, row)?;
                let candidate = self.eval(candidate, row)?;
                if current.is_null() {
                    candidate
                } else {
                    use crate::sql::ExtremumKind;
                    use std::cmp::Ordering;
                    let replace = matches!(
                        (*kind, current.sql_cmp(&candidate)),
                        (ExtremumKind::Max, Some(Ordering::Less))
                            | (ExtremumKind::Min, Some(Ordering::Greater))
                    );
                    if replace { candidate } else { current }
                }
            }
            SetExpr::Recalc(q) => self.eval_recalc(q)?,
        })
    }

    fn eval_recalc(&self, query: &RecalcQuery) -> Result<Scalar, TallyError> {
        let rows = self
            .tables
            .get(&query.child_table)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let mut matched: Vec<&Row> = Vec::new();
        for row in rows {
            if self.filter_matches(&query.filter, row)? {
                matched.push(row);
            }
        }

        // count(*) counts rows; every other form aggregates non-null
        // source values.
        if query.func == AggFunc::Count && query.source.is_none() {
            return Ok(Scalar::Int(matched.len() as i64));
        }
        let source = query.source.as_deref().unwrap_or_default();
        let values: Vec<Scalar> = matched
            .iter()
            .filter_map(|r| r.get(source))
            .filter(|v| !v.is_null())
            .cloned()
            .collect();

        Ok(match query.func {
            AggFunc::Count => Scalar::Int(values.len() as i64),
            AggFunc::Sum => values
                .into_iter()
                .reduce(|a, b| a.sql_add(&b))
                .unwrap_or(Scalar::Null),
            AggFunc::Avg => {
                let count = values.len();
                if count == 0 {
                    Scalar::Null
                } else {
                    let sum = values
                        .into_iter()
                        .reduce(|a, b| a.sql_add(&b))
                        .unwrap_or(Scalar::Null);
                    match sum.as_f64() {
                        Some(s) => Scalar::Float(s / count as f64),
                        None => Scalar::Null,
                    }
                }
            }
            AggFunc::Max | AggFunc::Min => {
                use std::cmp::Ordering;
                let want = if query.func == AggFunc::Max {
                    Ordering::Greater
                } else {
                    Ordering::Less
                };
                let mut extreme = Scalar::Null;
                for v in values {
                    if extreme.is_null() || v.sql_cmp(&extreme) == Some(want) {
                        extreme = v;
                    }
                }
                extreme
            }
        })
    }
}

fn scalar_eq(lhs: Option<&Scalar>, rhs: &Scalar) -> bool {
    match lhs {
        Some(v) => v == rhs || v.sql_cmp(rhs) == Some(std::cmp::Ordering::Equal),
        None => false,
    }
}

impl Executor for MemoryDb {
    fn dialect(&self) -> Dialect {
        self.dialect.clone()
    }

    fn execute(&mut self, statement: &UpdateStatement) -> Result<u64, TallyError> {
        if let Some(message) = self.fail_next.take() {
            return Err(TallyError::Execution(message));
        }
        self.history.push(statement.to_sql());

        let rows = self
            .tables
            .get(&statement.table)
            .map(Vec::as_slice)
            .unwrap_or_default();

        // Plan first: all assignments see the pre-update row, and the
        // recalc subqueries see the pre-update store.
        let mut planned: Vec<(usize, Vec<(String, Scalar)>)> = Vec::new();
        for (idx, row) in rows.iter().enumerate() {
            if !self.filter_matches(&statement.filter, row)? {
                continue;
            }
            let mut changes = Vec::new();
            for (column, expr) in &statement.assignments {
                changes.push((column.clone(), self.eval(expr, row)?));
            }
            planned.push((idx, changes));
        }

        let affected = planned.len() as u64;
        if let Some(rows) = self.tables.get_mut(&statement.table) {
            for (idx, changes) in planned {
                for (column, value) in changes {
                    rows[idx].insert(column, value);
                }
            }
        }
        Ok(affected)
    }
}
