//! The SQL surface this crate owns: assignment expressions, row filters,
//! and the single-statement shape every maintenance action reduces to:
//!
//! ```sql
//! UPDATE target SET col1 = expr1, col2 = expr2 WHERE filter
//! ```
//!
//! Expressions are kept structured ([`SetExpr`]) rather than as text so
//! executors can either render them ([`UpdateStatement::to_sql`] produces
//! `$n`-placeholder SQL plus the parameter vector) or interpret them
//! directly, as the in-memory store does.

use serde::{Deserialize, Serialize};

use crate::value::Scalar;

/// Quote a SQL identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Aggregate functions used in recomputation subqueries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggFunc {
    Count,
    Sum,
    Avg,
    Max,
    Min,
}

impl AggFunc {
    pub fn sql_name(&self) -> &'static str {
        match self {
            AggFunc::Count => "count",
            AggFunc::Sum => "sum",
            AggFunc::Avg => "avg",
            AggFunc::Max => "max",
            AggFunc::Min => "min",
        }
    }
}

/// Which extreme a two-argument combining expression keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtremumKind {
    Max,
    Min,
}

impl ExtremumKind {
    /// Scalar function name, also the name probed for backend support.
    pub fn fn_name(&self) -> &'static str {
        match self {
            ExtremumKind::Max => "max",
            ExtremumKind::Min => "min",
        }
    }

    /// Comparator for the portable CASE form: the candidate wins when
    /// `current {cmp} candidate` holds.
    fn case_cmp(&self) -> &'static str {
        match self {
            ExtremumKind::Max => "<",
            ExtremumKind::Min => ">",
        }
    }
}

/// Right-hand side of one `SET column = ...` assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum SetExpr {
    /// Inline SQL literal.
    Literal(Scalar),
    /// Bound parameter.
    Bind(Scalar),
    /// A column of the table being updated.
    Column(String),
    Coalesce(Box<SetExpr>, Box<SetExpr>),
    Add(Box<SetExpr>, Box<SetExpr>),
    Sub(Box<SetExpr>, Box<SetExpr>),
    /// Two-argument max/min. `native` selects the scalar function form;
    /// otherwise the portable `CASE WHEN` substitute is rendered.
    Extremum {
        kind: ExtremumKind,
        native: bool,
        current: Box<SetExpr>,
        candidate: Box<SetExpr>,
    },
    /// Correlated recomputation subquery over the child table.
    Recalc(RecalcQuery),
}

impl SetExpr {
    pub fn column(name: impl Into<String>) -> SetExpr {
        SetExpr::Column(name.into())
    }

    pub fn bind(value: impl Into<Scalar>) -> SetExpr {
        SetExpr::Bind(value.into())
    }

    /// `coalesce(column, 0)` — the NULL-as-zero view of a stored
    /// Sum/Count aggregate.
    pub fn target_or_zero(column: &str) -> SetExpr {
        SetExpr::Coalesce(
            Box::new(SetExpr::Column(column.to_string())),
            Box::new(SetExpr::Literal(Scalar::Int(0))),
        )
    }

    pub fn add(lhs: SetExpr, rhs: SetExpr) -> SetExpr {
        SetExpr::Add(Box::new(lhs), Box::new(rhs))
    }

    pub fn sub(lhs: SetExpr, rhs: SetExpr) -> SetExpr {
        SetExpr::Sub(Box::new(lhs), Box::new(rhs))
    }

    /// Render to SQL text, appending bound values to `params`.
    pub fn render(&self, params: &mut Vec<Scalar>) -> String {
        match self {
            SetExpr::Literal(v) => v.to_sql_literal(),
            SetExpr::Bind(v) => {
                params.push(v.clone());
                format!("${}", params.len())
            }
            SetExpr::Column(c) => quote_ident(c),
            SetExpr::Coalesce(a, b) => {
                format!("coalesce({}, {})", a.render(params), b.render(params))
            }
            SetExpr::Add(a, b) => format!("{} + {}", a.render(params), b.render(params)),
            SetExpr::Sub(a, b) => format!("{} - {}", a.render(params), b.render(params)),
            SetExpr::Extremum {
                kind,
                native,
                current,
                candidate,
            } => {
                if *native {
                    format!(
                        "{}({}, {})",
                        kind.fn_name(),
                        current.render(params),
                        candidate.render(params),
                    )
                } else {
                    // Rendering the operands more than once duplicates their
                    // bound values; each occurrence gets its own placeholder.
                    let probe = current.render(params);
                    let cur = current.render(params);
                    let cand = candidate.render(params);
                    let win = candidate.render(params);
                    let keep = current.render(params);
                    format!(
                        "CASE WHEN {probe} IS NULL OR {cur} {} {cand} THEN {win} ELSE {keep} END",
                        kind.case_cmp(),
                    )
                }
            }
            SetExpr::Recalc(q) => q.render(params),
        }
    }
}

/// `(SELECT func(arg) FROM child WHERE filter)` — full recomputation of
/// one aggregate for one group.
#[derive(Debug, Clone, PartialEq)]
pub struct RecalcQuery {
    pub func: AggFunc,
    /// Aggregated column; `None` means `count(*)`.
    pub source: Option<String>,
    pub child_table: String,
    pub filter: BoundFilter,
}

impl RecalcQuery {
    fn render(&self, params: &mut Vec<Scalar>) -> String {
        let arg = match &self.source {
            Some(col) => quote_ident(col),
            None => "*".to_string(),
        };
        format!(
            "(SELECT {}({arg}) FROM {} WHERE {})",
            self.func.sql_name(),
            quote_ident(&self.child_table),
            self.filter.render(params),
        )
    }
}

/// A row-selecting predicate before binding. Stored once per rule group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterSpec {
    /// `column = :attribute` — the foreign-key-derived form.
    KeyEquals { column: String, attribute: String },
    /// Rewritten custom filter: SQL with `:name` markers plus the instance
    /// attributes to bind, in order. An empty `params` list means the SQL
    /// is fully correlated and used verbatim.
    Custom { sql: String, params: Vec<String> },
}

impl FilterSpec {
    /// Instance attributes this filter binds.
    pub fn params(&self) -> Vec<&str> {
        match self {
            FilterSpec::KeyEquals { attribute, .. } => vec![attribute.as_str()],
            FilterSpec::Custom { params, .. } => params.iter().map(String::as_str).collect(),
        }
    }
}

/// A [`FilterSpec`] with its parameter values resolved from the instance.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundFilter {
    pub spec: FilterSpec,
    /// `(attribute, value)` pairs, parallel to `spec.params()`.
    pub values: Vec<(String, Scalar)>,
}

impl BoundFilter {
    pub fn render(&self, params: &mut Vec<Scalar>) -> String {
        match &self.spec {
            FilterSpec::KeyEquals { column, .. } => {
                let value = self
                    .values
                    .first()
                    .map(|(_, v)| v.clone())
                    .unwrap_or_default();
                params.push(value);
                format!("{} = ${}", quote_ident(column), params.len())
            }
            FilterSpec::Custom { sql, .. } => {
                let mut rendered = sql.clone();
                // Longest names first so `:block` never clobbers `:block_id`.
                let mut ordered: Vec<&(String, Scalar)> = self.values.iter().collect();
                ordered.sort_by_key(|(name, _)| std::cmp::Reverse(name.len()));
                for (name, value) in ordered {
                    params.push(value.clone());
                    rendered = rendered.replace(&format!(":{name}"), &format!("${}", params.len()));
                }
                rendered
            }
        }
    }
}

/// One merged maintenance statement for a rule group.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub table: String,
    pub assignments: Vec<(String, SetExpr)>,
    pub filter: BoundFilter,
}

impl UpdateStatement {
    /// Render to `$n`-placeholder SQL plus the parameter vector.
    pub fn to_sql(&self) -> (String, Vec<Scalar>) {
        let mut params = Vec::new();
        let sets: Vec<String> = self
            .assignments
            .iter()
            .map(|(col, expr)| format!("{} = {}", quote_ident(col), expr.render(&mut params)))
            .collect();
        let where_sql = self.filter.render(&mut params);
        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            quote_ident(&self.table),
            sets.join(", "),
            where_sql,
        );
        (sql, params)
    }
}
