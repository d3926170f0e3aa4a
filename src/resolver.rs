//! Grouping/filter resolution.
//!
//! A rule without an explicit filter is grouped by the foreign key linking
//! the child table to its target table. Resolution happens once, at
//! configure time, and fails loudly — a missing or unmappable key has no
//! sensible default.

use crate::error::TallyError;
use crate::schema::{ForeignKey, TableSchema};

/// Find the foreign key on `child` referencing `target_table`.
///
/// The first matching key wins, as with the original mapper convention;
/// integrations with several keys to one table must use custom filters.
pub(crate) fn find_foreign_key<'a>(
    child: &'a TableSchema,
    target_table: &str,
) -> Result<&'a ForeignKey, TallyError> {
    child
        .foreign_key_to(target_table)
        .ok_or_else(|| TallyError::MissingForeignKey {
            child: child.name.clone(),
            target: target_table.to_string(),
        })
}

/// Resolve the instance attribute holding the group key for `fk`,
/// honouring attribute aliasing.
pub(crate) fn grouping_attribute(
    child: &TableSchema,
    fk: &ForeignKey,
) -> Result<String, TallyError> {
    child.attribute_for_column(&fk.column)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines() -> TableSchema {
        TableSchema::new("lines")
            .with_primary_key("id")
            .with_column("length")
            .with_foreign_key("block", "blocks", "id")
    }

    #[test]
    fn test_finds_key_to_target() {
        let child = lines();
        let fk = find_foreign_key(&child, "blocks").unwrap();
        assert_eq!(fk.column, "block");
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let child = lines();
        let err = find_foreign_key(&child, "users").unwrap_err();
        assert!(err.is_configuration());
        assert!(matches!(err, TallyError::MissingForeignKey { .. }));
    }

    #[test]
    fn test_grouping_attribute_identity_and_alias() {
        let child = lines();
        let fk = find_foreign_key(&child, "blocks").unwrap().clone();
        assert_eq!(grouping_attribute(&child, &fk).unwrap(), "block");

        let aliased = lines().with_attribute("_block", "block");
        assert_eq!(grouping_attribute(&aliased, &fk).unwrap(), "_block");
    }

    #[test]
    fn test_shadowed_attribute_is_config_error() {
        let child = lines().with_attribute("block", "length");
        let fk = ForeignKey {
            column: "block".into(),
            referenced_table: "blocks".into(),
            referenced_column: "id".into(),
        };
        let err = grouping_attribute(&child, &fk).unwrap_err();
        assert!(err.is_configuration());
    }
}
