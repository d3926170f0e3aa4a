//! tally — incremental denormalized aggregate maintenance.
//!
//! Keeps precomputed aggregate columns (counts, sums, min/max, averages)
//! on parent rows consistent as child rows are inserted, updated, deleted,
//! or re-associated with a different parent. Instead of running
//! `SELECT aggregate(...) FROM child WHERE fk = parent_id` on every read,
//! the host persistence layer calls one of three lifecycle hooks after
//! each child write, and the maintainer folds the change into the stored
//! aggregate — on the same connection, so maintenance commits or rolls
//! back with the write that triggered it.
//!
//! # Theoretical Basis
//!
//! - **Gupta & Mumick (1995)**: "Maintenance of Materialized Views:
//!   Problems, Techniques, and Applications", IEEE Data Engineering
//!   Bulletin — the self-maintainability taxonomy behind the Quick
//!   strategy's rule split: counts and sums are invertible under deletion,
//!   min/max are not and must be recomputed.
//!
//! # Example
//!
//! ```
//! use tally::{AggregateRule, ColumnRef, Maintainer, MemoryDb, RowState, Scalar, TableSchema};
//!
//! let lines = TableSchema::new("lines")
//!     .with_primary_key("id")
//!     .with_column("length")
//!     .with_foreign_key("block", "blocks", "id");
//!
//! let mut maintainer = Maintainer::quick(vec![
//!     AggregateRule::count(ColumnRef::new("blocks", "lines")),
//!     AggregateRule::sum(
//!         ColumnRef::new("blocks", "length"),
//!         ColumnRef::new("lines", "length"),
//!     ),
//! ]);
//! maintainer.configure(&lines)?;
//!
//! let mut db = MemoryDb::new();
//! db.insert("blocks", &[("id", Scalar::Int(1)), ("lines", Scalar::Int(0))]);
//! db.insert(
//!     "lines",
//!     &[
//!         ("id", Scalar::Int(10)),
//!         ("block", Scalar::Int(1)),
//!         ("length", Scalar::Int(42)),
//!     ],
//! );
//! let line = RowState::new().with("block", 1i64).with("length", 42i64);
//! maintainer.after_insert(&mut db, &line)?;
//!
//! assert_eq!(db.get("blocks", "id", &Scalar::Int(1), "lines"), Scalar::Int(1));
//! assert_eq!(db.get("blocks", "id", &Scalar::Int(1), "length"), Scalar::Int(42));
//! # Ok::<(), tally::TallyError>(())
//! ```

pub mod dialect;
pub mod error;
pub mod executor;
pub mod maintain;
pub mod memory;
mod resolver;
pub mod rewrite;
pub mod rules;
pub mod schema;
pub mod snapshot;
pub mod sql;
pub mod value;

pub use dialect::{Dialect, FunctionProbe};
pub use error::TallyError;
pub use executor::Executor;
pub use maintain::{HookOutcome, Maintainer, MaintainerOptions, RuleGroup, Strategy};
pub use memory::MemoryDb;
pub use rewrite::{FilterPair, FilterRewriter, RawFilter};
pub use rules::{AggregateRule, RuleEffect, RuleOp};
pub use schema::{Column, ColumnRef, ForeignKey, TableSchema};
pub use snapshot::{InstanceSnapshot, RowState};
pub use sql::UpdateStatement;
pub use value::Scalar;
