//! Schema descriptors handed to [`configure`](crate::maintain::Maintainer::configure).
//!
//! The integration layer builds one [`TableSchema`] per mapped table —
//! columns, primary key, foreign keys, and the attribute-to-column alias
//! map — and hands it to the maintainer. This keeps the core decoupled
//! from any particular ORM's reflection API: everything the resolver needs
//! is declared up front.
//!
//! Descriptors are serde-serializable so integrations can load them from
//! JSON alongside their mapping configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::TallyError;

/// A column of a described table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Free-form SQL type name, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_type: Option<String>,
}

/// A single-column foreign key on the child table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// The referencing column on the owning (child) table.
    pub column: String,
    /// The referenced (target/parent) table.
    pub referenced_table: String,
    /// The referenced column, normally the target's primary key.
    pub referenced_column: String,
}

/// Identifies a column within a specific table. Rules name their target
/// and source columns this way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        ColumnRef {
            table: table.into(),
            column: column.into(),
        }
    }
}

/// Descriptor for one mapped table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
    /// Attribute-name → column-name entries for attributes whose mapped
    /// name differs from the column. Unaliased columns are omitted.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        TableSchema {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add a column (chainable).
    pub fn with_column(mut self, name: impl Into<String>) -> Self {
        self.columns.push(Column {
            name: name.into(),
            sql_type: None,
        });
        self
    }

    /// Declare the primary key column (chainable).
    pub fn with_primary_key(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.has_column(&name) {
            self.columns.push(Column {
                name: name.clone(),
                sql_type: None,
            });
        }
        self.primary_key.push(name);
        self
    }

    /// Add a foreign key; the referencing column is added if missing
    /// (chainable).
    pub fn with_foreign_key(
        mut self,
        column: impl Into<String>,
        referenced_table: impl Into<String>,
        referenced_column: impl Into<String>,
    ) -> Self {
        let column = column.into();
        if !self.has_column(&column) {
            self.columns.push(Column {
                name: column.clone(),
                sql_type: None,
            });
        }
        self.foreign_keys.push(ForeignKey {
            column,
            referenced_table: referenced_table.into(),
            referenced_column: referenced_column.into(),
        });
        self
    }

    /// Record an attribute whose name differs from its column (chainable).
    pub fn with_attribute(
        mut self,
        attribute: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        self.attributes.insert(attribute.into(), column.into());
        self
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// First foreign key referencing `target_table`, if any.
    pub fn foreign_key_to(&self, target_table: &str) -> Option<&ForeignKey> {
        self.foreign_keys
            .iter()
            .find(|fk| fk.referenced_table == target_table)
    }

    /// Resolve the instance attribute that maps to `column`.
    ///
    /// An aliased column wins over the identity mapping; a column whose
    /// bare name is claimed by an alias for a *different* column cannot be
    /// resolved and is a configuration error.
    pub fn attribute_for_column(&self, column: &str) -> Result<String, TallyError> {
        if let Some((attr, _)) = self.attributes.iter().find(|(_, col)| col.as_str() == column) {
            return Ok(attr.clone());
        }
        if self.attributes.contains_key(column) {
            // The name is taken by an alias pointing at another column.
            return Err(TallyError::UnresolvedAttribute {
                table: self.name.clone(),
                column: column.to_string(),
            });
        }
        if self.has_column(column) {
            return Ok(column.to_string());
        }
        Err(TallyError::UnknownColumn {
            table: self.name.clone(),
            column: column.to_string(),
        })
    }

    /// Load a descriptor from its JSON form.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
