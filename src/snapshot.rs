//! The child-instance state boundary.
//!
//! Rules never touch ORM internals; they read attribute values through
//! [`InstanceSnapshot`]: the current value, and the original value recorded
//! when the instance was last loaded or flushed. The original is what
//! delete-side and pre-move maintenance must bind — by the time the hook
//! runs, the row already carries the new values.

use std::collections::BTreeMap;

use crate::error::TallyError;
use crate::value::Scalar;

/// Read access to a mapped instance's persistent state.
pub trait InstanceSnapshot {
    /// Current value of `attribute`.
    fn current(&self, attribute: &str) -> Result<Scalar, TallyError>;

    /// Value of `attribute` as of the last load/flush. Fails with
    /// [`TallyError::MissingOriginal`] when no baseline exists (a
    /// brand-new instance) — only the insert path may never ask.
    fn original(&self, attribute: &str) -> Result<Scalar, TallyError>;
}

/// Current or original value according to `old`.
pub fn current_or_original(
    instance: &dyn InstanceSnapshot,
    attribute: &str,
    old: bool,
) -> Result<Scalar, TallyError> {
    if old {
        instance.original(attribute)
    } else {
        instance.current(attribute)
    }
}

/// Map-backed [`InstanceSnapshot`] for embedders and tests.
///
/// `commit()` plays the role of the host's post-flush snapshot refresh:
/// it copies current values into the original baseline.
#[derive(Debug, Clone, Default)]
pub struct RowState {
    current: BTreeMap<String, Scalar>,
    original: Option<BTreeMap<String, Scalar>>,
}

impl RowState {
    /// A brand-new instance: no original baseline yet.
    pub fn new() -> Self {
        RowState::default()
    }

    /// Set a current attribute value (chainable).
    pub fn with(mut self, attribute: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.current.insert(attribute.into(), value.into());
        self
    }

    /// Mutate a current attribute value in place.
    pub fn set(&mut self, attribute: impl Into<String>, value: impl Into<Scalar>) {
        self.current.insert(attribute.into(), value.into());
    }

    /// Record the current values as the original baseline.
    pub fn commit(&mut self) {
        self.original = Some(self.current.clone());
    }

    pub fn has_original(&self) -> bool {
        self.original.is_some()
    }
}

impl InstanceSnapshot for RowState {
    fn current(&self, attribute: &str) -> Result<Scalar, TallyError> {
        self.current
            .get(attribute)
            .cloned()
            .ok_or_else(|| TallyError::UnknownAttribute {
                attribute: attribute.to_string(),
            })
    }

    fn original(&self, attribute: &str) -> Result<Scalar, TallyError> {
        let baseline = self
            .original
            .as_ref()
            .ok_or_else(|| TallyError::MissingOriginal {
                attribute: attribute.to_string(),
            })?;
        baseline
            .get(attribute)
            .cloned()
            .ok_or_else(|| TallyError::MissingOriginal {
                attribute: attribute.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_instance_has_no_original() {
        let row = RowState::new().with("length", 10i64);
        assert_eq!(row.current("length").unwrap(), Scalar::Int(10));
        assert!(matches!(
            row.original("length"),
            Err(TallyError::MissingOriginal { .. })
        ));
    }

    #[test]
    fn test_commit_freezes_baseline() {
        let mut row = RowState::new().with("length", 10i64);
        row.commit();
        row.set("length", 25i64);
        assert_eq!(row.current("length").unwrap(), Scalar::Int(25));
        assert_eq!(row.original("length").unwrap(), Scalar::Int(10));
    }

    #[test]
    fn test_current_or_original_selector() {
        let mut row = RowState::new().with("block", 1i64);
        row.commit();
        row.set("block", 2i64);
        assert_eq!(
            current_or_original(&row, "block", false).unwrap(),
            Scalar::Int(2)
        );
        assert_eq!(
            current_or_original(&row, "block", true).unwrap(),
            Scalar::Int(1)
        );
    }

    #[test]
    fn test_unknown_attribute() {
        let row = RowState::new();
        assert!(matches!(
            row.current("nope"),
            Err(TallyError::UnknownAttribute { .. })
        ));
    }
}
