//! Scalar values bound into maintenance statements.
//!
//! [`Scalar`] models the values read from instance attributes and bound as
//! statement parameters. Comparison and arithmetic follow SQL semantics:
//! NULL never compares and poisons arithmetic.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A bound parameter value.
///
/// Integers and floats compare and combine across types the way a numeric
/// SQL column would.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// SQL NULL.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Numeric view, when the value is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// SQL comparison: `None` when either side is NULL or the types are
    /// incomparable.
    pub fn sql_cmp(&self, other: &Scalar) -> Option<Ordering> {
        match (self, other) {
            (Scalar::Null, _) | (_, Scalar::Null) => None,
            (Scalar::Int(a), Scalar::Int(b)) => Some(a.cmp(b)),
            (Scalar::Bool(a), Scalar::Bool(b)) => Some(a.cmp(b)),
            (Scalar::Text(a), Scalar::Text(b)) => Some(a.cmp(b)),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => None,
            },
        }
    }

    /// SQL addition. NULL on either side yields NULL; integer pairs stay
    /// integer, anything else goes through f64.
    pub fn sql_add(&self, other: &Scalar) -> Scalar {
        match (self, other) {
            (Scalar::Int(a), Scalar::Int(b)) => Scalar::Int(a + b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => Scalar::Float(x + y),
                _ => Scalar::Null,
            },
        }
    }

    /// SQL subtraction, same promotion rules as [`Scalar::sql_add`].
    pub fn sql_sub(&self, other: &Scalar) -> Scalar {
        match (self, other) {
            (Scalar::Int(a), Scalar::Int(b)) => Scalar::Int(a - b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => Scalar::Float(x - y),
                _ => Scalar::Null,
            },
        }
    }

    /// Render as an inline SQL literal. Text is quoted with `''` escaping.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Scalar::Null => "NULL".to_string(),
            Scalar::Bool(true) => "TRUE".to_string(),
            Scalar::Bool(false) => "FALSE".to_string(),
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Text(s) => format!("'{}'", s.replace('\'', "''")),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_sql_literal())
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Scalar::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_never_compares() {
        assert_eq!(Scalar::Null.sql_cmp(&Scalar::Int(1)), None);
        assert_eq!(Scalar::Int(1).sql_cmp(&Scalar::Null), None);
        assert_eq!(Scalar::Null.sql_cmp(&Scalar::Null), None);
    }

    #[test]
    fn test_cross_type_numeric_compare() {
        assert_eq!(
            Scalar::Int(2).sql_cmp(&Scalar::Float(1.5)),
            Some(Ordering::Greater)
        );
        assert_eq!(
            Scalar::Float(2.0).sql_cmp(&Scalar::Int(2)),
            Some(Ordering::Equal)
        );
    }

    #[test]
    fn test_null_poisons_arithmetic() {
        assert_eq!(Scalar::Null.sql_add(&Scalar::Int(1)), Scalar::Null);
        assert_eq!(Scalar::Int(1).sql_sub(&Scalar::Null), Scalar::Null);
    }

    #[test]
    fn test_integer_arithmetic_stays_integer() {
        assert_eq!(Scalar::Int(40).sql_add(&Scalar::Int(2)), Scalar::Int(42));
        assert_eq!(Scalar::Int(40).sql_sub(&Scalar::Int(2)), Scalar::Int(38));
    }

    #[test]
    fn test_literal_rendering() {
        assert_eq!(Scalar::Null.to_sql_literal(), "NULL");
        assert_eq!(Scalar::Int(-3).to_sql_literal(), "-3");
        assert_eq!(
            Scalar::Text("it's".into()).to_sql_literal(),
            "'it''s'"
        );
    }

    #[test]
    fn test_json_roundtrip() {
        let vals = vec![
            Scalar::Null,
            Scalar::Bool(true),
            Scalar::Int(7),
            Scalar::Text("x".into()),
        ];
        let json = serde_json::to_string(&vals).unwrap();
        let back: Vec<Scalar> = serde_json::from_str(&json).unwrap();
        assert_eq!(vals, back);
    }
}
