//! Carbon pool parameter table

use std::collections::BTreeMap;
use std::path::Path;

use landshift_core::io::{load_table, LookupTable, Record, Value};
use landshift_core::Result;

pub const LULC_COLUMN: &str = "LULC";
pub const C_ABOVE_MEAN_COLUMN: &str = "C_ABOVE_MEAN";
pub const C_BELOW_COLUMN: &str = "C_BELOW";
pub const C_SOIL_COLUMN: &str = "C_SOIL";
pub const C_DEAD_COLUMN: &str = "C_DEAD";

/// Carbon densities of one land-cover class, in Mg per hectare
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarbonPool {
    pub c_above_mean: f64,
    pub c_below: Option<f64>,
    pub c_soil: Option<f64>,
    pub c_dead: Option<f64>,
}

impl CarbonPool {
    /// Sum of every pool that is present
    pub fn total(&self) -> f64 {
        self.c_above_mean
            + self.c_below.unwrap_or(0.0)
            + self.c_soil.unwrap_or(0.0)
            + self.c_dead.unwrap_or(0.0)
    }
}

/// Carbon pools keyed by land-cover code
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CarbonPoolTable {
    pools: BTreeMap<i32, CarbonPool>,
}

impl CarbonPoolTable {
    pub fn new(pools: BTreeMap<i32, CarbonPool>) -> Self {
        Self { pools }
    }

    /// Load a CSV with columns `LULC`, `C_ABOVE_MEAN` and optionally
    /// `C_BELOW`, `C_SOIL`, `C_DEAD`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let table = load_table(path, LULC_COLUMN)?;
        Self::from_table(&table)
    }

    pub fn from_table(table: &LookupTable) -> Result<Self> {
        table.require_columns(&[C_ABOVE_MEAN_COLUMN])?;

        let mut pools = BTreeMap::new();
        for (key, record) in table.iter() {
            let code = i32::try_from(key)
                .map_err(|_| table.schema_error(format!("land-cover code {} does not fit in i32", key)))?;
            let pool = CarbonPool {
                c_above_mean: table.record_f64(key, record, C_ABOVE_MEAN_COLUMN)?,
                c_below: optional_f64(table, key, record, C_BELOW_COLUMN)?,
                c_soil: optional_f64(table, key, record, C_SOIL_COLUMN)?,
                c_dead: optional_f64(table, key, record, C_DEAD_COLUMN)?,
            };
            pools.insert(code, pool);
        }

        tracing::debug!("Carbon pools for {} land-cover codes", pools.len());
        Ok(Self { pools })
    }

    pub fn get(&self, code: i32) -> Option<&CarbonPool> {
        self.pools.get(&code)
    }

    pub fn contains(&self, code: i32) -> bool {
        self.pools.contains_key(&code)
    }

    pub fn codes(&self) -> impl Iterator<Item = i32> + '_ {
        self.pools.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

/// Optional numeric column: absent column or empty cell is `None`
fn optional_f64(table: &LookupTable, key: i64, record: &Record, field: &str) -> Result<Option<f64>> {
    match record.get(field) {
        None => Ok(None),
        Some(Value::Text(s)) if s.is_empty() => Ok(None),
        Some(_) => table.record_f64(key, record, field).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use landshift_core::Error;

    #[test]
    fn test_load_with_optional_pools() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pools.csv");
        std::fs::write(
            &path,
            "LULC,C_ABOVE_MEAN,C_BELOW,C_SOIL\n1,140,35,\n10,6.5,2,20\n",
        )
        .unwrap();

        let pools = CarbonPoolTable::load(&path).unwrap();
        assert_eq!(pools.len(), 2);
        let forest = pools.get(1).unwrap();
        assert_relative_eq!(forest.c_above_mean, 140.0);
        assert_eq!(forest.c_soil, None);
        assert_eq!(forest.c_dead, None);
        assert_relative_eq!(pools.get(10).unwrap().total(), 28.5);
    }

    #[test]
    fn test_missing_above_ground_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pools.csv");
        std::fs::write(&path, "LULC,C_BELOW\n1,35\n").unwrap();
        assert!(matches!(CarbonPoolTable::load(&path), Err(Error::Schema { .. })));
    }

    #[test]
    fn test_non_numeric_pool_is_schema_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pools.csv");
        std::fs::write(&path, "LULC,C_ABOVE_MEAN\n1,lots\n").unwrap();
        assert!(matches!(CarbonPoolTable::load(&path), Err(Error::Schema { .. })));
    }
}
