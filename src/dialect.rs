//! Database capability probing.
//!
//! Max/Min rules combine the stored aggregate with a candidate value via a
//! two-argument scalar `max(a, b)` / `min(a, b)`. Not every backend has
//! those (MySQL only has the aggregate forms), so the rules consult a
//! [`FunctionProbe`] on every invocation and fall back to a portable
//! `CASE WHEN` expression where needed.
//!
//! The probe is reached through the executor (see
//! [`Executor::dialect`](crate::executor::Executor::dialect)), so a
//! long-lived rule serving several connections always sees the backend
//! actually in use.

use serde::{Deserialize, Serialize};

/// Callback asked whether the bound backend supports a function for this
/// purpose. Consulted per call, never cached inside a rule.
pub trait FunctionProbe {
    fn supports_function(&self, name: &str) -> bool;
}

/// Backend identification by driver name, as reported by the connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dialect {
    driver: String,
}

impl Dialect {
    pub fn new(driver: impl Into<String>) -> Self {
        Dialect {
            driver: driver.into().to_ascii_lowercase(),
        }
    }

    pub fn driver(&self) -> &str {
        &self.driver
    }
}

impl Default for Dialect {
    fn default() -> Self {
        Dialect::new("sqlite")
    }
}

impl FunctionProbe for Dialect {
    fn supports_function(&self, name: &str) -> bool {
        match self.driver.as_str() {
            // MySQL has no scalar two-argument max/min.
            "mysql" | "mariadb" => !matches!(name, "max" | "min"),
            _ => true,
        }
    }
}
