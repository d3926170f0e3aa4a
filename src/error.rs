//! Error types for tally.
//!
//! All failures surface as [`TallyError`] and are propagated via
//! `Result<T, TallyError>` throughout the crate.
//!
//! # Error Classification
//!
//! Errors fall into three categories that determine how the host should
//! react:
//! - **Configuration** — missing foreign keys, unresolvable attributes,
//!   hooks invoked before `configure()`. Fatal at setup time, never retried.
//! - **Missing original** — a delete/update/recalc-old path was invoked for
//!   an instance without a pre-transaction snapshot. An integration bug;
//!   never defaulted to zero.
//! - **Execution** — the underlying store rejected an UPDATE. Propagated to
//!   the host's flush path, which owns rollback of the whole transaction.

/// Primary error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum TallyError {
    // ── Configuration errors — abort mapping setup ───────────────────────
    /// No foreign key on the child table references the target table.
    #[error("no foreign key from {child} to {target}")]
    MissingForeignKey { child: String, target: String },

    /// A foreign-key column could not be mapped back to an instance
    /// attribute (the column name is shadowed by an alias).
    #[error("cannot resolve attribute for column {table}.{column}")]
    UnresolvedAttribute { table: String, column: String },

    /// A rule references a column the schema descriptor does not declare.
    #[error("unknown column {table}.{column}")]
    UnknownColumn { table: String, column: String },

    /// A composite rule's target columns span more than one table.
    #[error("aggregate targets span tables {0} and {1}; one table per rule")]
    MixedTargetTables(String, String),

    /// A rule carries a custom filter but no rewriter was supplied.
    #[error("rule on {target} has a custom filter but no rewriter was given")]
    RewriterRequired { target: String },

    /// A lifecycle hook was invoked before `configure()`.
    #[error("lifecycle hook invoked before configure()")]
    NotConfigured,

    // ── Instance-state errors — integration bugs ─────────────────────────
    /// No pre-transaction snapshot exists for the requested attribute.
    #[error("no original value recorded for attribute {attribute}")]
    MissingOriginal { attribute: String },

    /// The instance snapshot has no such attribute at all.
    #[error("instance has no attribute {attribute}")]
    UnknownAttribute { attribute: String },

    // ── Execution errors — host owns rollback ────────────────────────────
    /// The underlying store failed to execute a maintenance UPDATE.
    #[error("update execution failed: {0}")]
    Execution(String),

    /// A statement reached an executor that cannot interpret it (e.g. a
    /// correlated custom filter handed to the in-memory store).
    #[error("executor cannot evaluate statement: {0}")]
    Unsupported(String),
}

impl TallyError {
    /// Whether this error is a configuration error (fatal at setup time).
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            TallyError::MissingForeignKey { .. }
                | TallyError::UnresolvedAttribute { .. }
                | TallyError::UnknownColumn { .. }
                | TallyError::MixedTargetTables(_, _)
                | TallyError::RewriterRequired { .. }
                | TallyError::NotConfigured
        )
    }

    /// Whether this error came from statement execution. These abort the
    /// triggering transaction but leave the maintainer itself usable.
    pub fn is_execution(&self) -> bool {
        matches!(self, TallyError::Execution(_) | TallyError::Unsupported(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_classification() {
        let e = TallyError::MissingForeignKey {
            child: "lines".into(),
            target: "blocks".into(),
        };
        assert!(e.is_configuration());
        assert!(!e.is_execution());
    }

    #[test]
    fn test_execution_classification() {
        let e = TallyError::Execution("deadlock".into());
        assert!(e.is_execution());
        assert!(!e.is_configuration());
    }

    #[test]
    fn test_missing_original_is_neither() {
        let e = TallyError::MissingOriginal {
            attribute: "length".into(),
        };
        assert!(!e.is_configuration());
        assert!(!e.is_execution());
    }

    #[test]
    fn test_display_messages() {
        let e = TallyError::MissingForeignKey {
            child: "lines".into(),
            target: "blocks".into(),
        };
        assert_eq!(e.to_string(), "no foreign key from lines to blocks");
    }
}
