//! Projection handling
//!
//! Projections are carried as opaque definition strings (WKT, `EPSG:xxxx`,
//! PROJ strings...). They are never parsed; two projections are the same
//! only when their definitions are byte-identical.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CRS {
    definition: String,
}

impl CRS {
    /// Wrap an arbitrary projection definition
    pub fn new(definition: impl Into<String>) -> Self {
        Self {
            definition: definition.into(),
        }
    }

    /// Create a CRS from an EPSG code, stored as `EPSG:<code>`
    pub fn from_epsg(code: u32) -> Self {
        Self::new(format!("EPSG:{}", code))
    }

    /// The raw definition string
    pub fn as_str(&self) -> &str {
        &self.definition
    }

    /// Whether the definition is empty
    pub fn is_empty(&self) -> bool {
        self.definition.is_empty()
    }

    /// Byte equality of the definitions
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        self.definition.as_bytes() == other.definition.as_bytes()
    }

    /// Short identifier for log lines
    pub fn identifier(&self) -> String {
        let d = &self.definition;
        if d.len() <= 50 {
            d.clone()
        } else {
            let cut = (0..=50).rev().find(|&i| d.is_char_boundary(i)).unwrap_or(0);
            format!("{}...", &d[..cut])
        }
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_epsg() {
        let crs = CRS::from_epsg(32721);
        assert_eq!(crs.as_str(), "EPSG:32721");
        assert_eq!(crs.identifier(), "EPSG:32721");
    }

    #[test]
    fn test_crs_equivalence_is_bytewise() {
        let a = CRS::from_epsg(4326);
        let b = CRS::new("EPSG:4326");
        let c = CRS::new("epsg:4326");
        assert!(a.is_equivalent(&b));
        assert!(!a.is_equivalent(&c));
    }
}
