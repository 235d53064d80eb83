//! Broad land-cover reclassification table

use std::collections::BTreeMap;
use std::path::Path;

use landshift_core::io::{load_table, LookupTable};
use landshift_core::raster::Raster;
use landshift_core::Result;

use super::GLOBIO_NODATA;

/// Default column holding the source land-cover code
pub const DEFAULT_SOURCE_COLUMN: &str = "lulc";
/// Default column holding the broad GLOBIO code
pub const DEFAULT_TARGET_COLUMN: &str = "globio_broad";

/// Mapping from source land-cover codes to broad GLOBIO codes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReclassTable {
    mapping: BTreeMap<i32, i32>,
}

impl ReclassTable {
    pub fn new(mapping: BTreeMap<i32, i32>) -> Self {
        Self { mapping }
    }

    /// Load from a CSV keyed by `source_column`, reading codes from
    /// `target_column`.
    pub fn load<P: AsRef<Path>>(path: P, source_column: &str, target_column: &str) -> Result<Self> {
        let table = load_table(path, source_column)?;
        Self::from_table(&table, target_column)
    }

    pub fn from_table(table: &LookupTable, target_column: &str) -> Result<Self> {
        table.require_columns(&[target_column])?;

        let mut mapping = BTreeMap::new();
        for (key, record) in table.iter() {
            let source = to_code(table, key)?;
            let target = table.record_i64(key, record, target_column)?;
            mapping.insert(source, to_code(table, target)?);
        }
        Ok(Self { mapping })
    }

    /// Broad code for `code`, if the table has one
    pub fn get(&self, code: i32) -> Option<i32> {
        self.mapping.get(&code).copied()
    }

    /// Broad code for `code`; codes without an entry pass through
    pub fn broad_code(&self, code: i32) -> i32 {
        self.get(code).unwrap_or(code)
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Broad codes the table can produce
    pub fn targets(&self) -> impl Iterator<Item = i32> + '_ {
        self.mapping.values().copied()
    }

    /// Reclassify a whole raster. Nodata becomes [`GLOBIO_NODATA`].
    pub fn apply(&self, lulc: &Raster<i32>) -> Result<Raster<i32>> {
        let values: Vec<i32> = lulc
            .values()
            .map(|v| if lulc.is_nodata(v) { GLOBIO_NODATA } else { self.broad_code(v) })
            .collect();
        lulc.with_values(values, Some(GLOBIO_NODATA))
    }
}

fn to_code(table: &LookupTable, value: i64) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| table.schema_error(format!("land-cover code {} does not fit in i32", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_and_apply() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reclass.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "lulc,globio_broad,name").unwrap();
        writeln!(f, "2,130,forest").unwrap();
        writeln!(f, "10,131,grassland").unwrap();
        writeln!(f, "12,132,cropland").unwrap();
        drop(f);

        let table = ReclassTable::load(&path, DEFAULT_SOURCE_COLUMN, DEFAULT_TARGET_COLUMN).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.broad_code(2), 130);
        assert_eq!(table.broad_code(17), 17);

        let mut lulc = Raster::from_vec(vec![2, 10, 12, -1], 2, 2).unwrap();
        lulc.set_nodata(Some(-1));
        let broad = table.apply(&lulc).unwrap();
        assert_eq!(broad.to_vec(), vec![130, 131, 132, GLOBIO_NODATA]);
    }

    #[test]
    fn test_missing_target_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reclass.csv");
        std::fs::write(&path, "lulc,other\n1,130\n").unwrap();
        assert!(matches!(
            ReclassTable::load(&path, "lulc", "globio_broad"),
            Err(landshift_core::Error::Schema { .. })
        ));
    }
}
