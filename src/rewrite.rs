//! The expression-rewriting collaborator contract.
//!
//! A rule may carry a custom boolean filter instead of relying on
//! foreign-key discovery. The filter references columns of both the child
//! and the target table, in whatever representation the host uses; this
//! crate never interprets it. At `configure()` time a [`FilterRewriter`]
//! supplied by the integration turns it into the two forms the coordinator
//! needs (see [`FilterPair`]):
//!
//! - the **update** form, usable in the outer UPDATE's WHERE clause, with
//!   child-side columns replaced by `:attribute` bind markers;
//! - the **recalc** form, usable inside the recomputation subquery, left as
//!   direct column references — the subquery is correlated to the same
//!   outer row the UPDATE touches, so no substitution is needed.

use crate::error::TallyError;
use crate::sql::FilterSpec;

/// A custom grouping filter as supplied by the integrator, opaque to this
/// crate. `expr` is whatever the host's rewriter understands — typically
/// SQL text referencing both tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFilter {
    pub expr: String,
}

impl RawFilter {
    pub fn new(expr: impl Into<String>) -> Self {
        RawFilter { expr: expr.into() }
    }
}

/// The two filter forms derived from one custom filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPair {
    /// WHERE clause of the outer UPDATE; binds instance attributes.
    pub update: FilterSpec,
    /// WHERE clause of the recomputation subquery.
    pub recalc: FilterSpec,
}

/// Host-side collaborator producing the two filter forms plus the list of
/// instance attributes the update form binds.
pub trait FilterRewriter {
    fn rewrite(
        &self,
        filter: &RawFilter,
        child_table: &str,
        target_table: &str,
    ) -> Result<FilterPair, TallyError>;
}
