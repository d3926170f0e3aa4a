//! The SQL-execution boundary.
//!
//! The coordinator issues every maintenance statement through an
//! [`Executor`] handed into the lifecycle hook, so the UPDATE runs on the
//! same connection — and therefore in the same transaction — as the child
//! write that triggered it. The core never commits or rolls back; a failed
//! execution propagates to the host's flush path.

use crate::dialect::Dialect;
use crate::error::TallyError;
use crate::sql::UpdateStatement;

/// A connection-like handle that can run one maintenance UPDATE.
pub trait Executor {
    /// Driver identification for the capability probe. Asked on every
    /// event, so pooled rules follow whichever backend is bound now.
    fn dialect(&self) -> Dialect;

    /// Execute the statement, returning the affected-row count.
    fn execute(&mut self, statement: &UpdateStatement) -> Result<u64, TallyError>;
}
