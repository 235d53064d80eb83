//! Land-use component of MSA

use std::collections::BTreeMap;
use std::path::Path;

use landshift_core::io::{load_table, LookupTable};
use landshift_core::raster::Raster;
use landshift_core::Result;

pub const GLOBIO_CODE_COLUMN: &str = "globio_code";
pub const MSA_LU_COLUMN: &str = "msa_lu";

/// Default MSA_LU of a GLOBIO class; codes outside 1..=10 get 0
pub fn default_msa_lu(globio_code: i32) -> f32 {
    match globio_code {
        1 => 1.0,
        2 => 0.7,
        3 => 0.5,
        4 => 0.2,
        5 => 0.7,
        6 => 0.1,
        7 => 0.5,
        8 => 0.3,
        9 => 0.1,
        10 => 0.05,
        _ => 0.0,
    }
}

/// MSA_LU values keyed by GLOBIO code, read from CSV
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MsaLuTable {
    values: BTreeMap<i32, f32>,
}

impl MsaLuTable {
    pub fn new(values: BTreeMap<i32, f32>) -> Self {
        Self { values }
    }

    /// Load a CSV with columns `globio_code` and `msa_lu`. Values must lie
    /// in [0, 1].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let table = load_table(path, GLOBIO_CODE_COLUMN)?;
        Self::from_table(&table)
    }

    pub fn from_table(table: &LookupTable) -> Result<Self> {
        table.require_columns(&[MSA_LU_COLUMN])?;

        let mut values = BTreeMap::new();
        for (key, record) in table.iter() {
            let code = i32::try_from(key)
                .map_err(|_| table.schema_error(format!("GLOBIO code {} does not fit in i32", key)))?;
            let msa = table.record_f64(key, record, MSA_LU_COLUMN)?;
            if !(0.0..=1.0).contains(&msa) {
                return Err(table.schema_error(format!(
                    "msa_lu of GLOBIO code {} is {}, outside [0, 1]",
                    key, msa
                )));
            }
            values.insert(code, msa as f32);
        }
        Ok(Self { values })
    }

    /// MSA_LU of a code; codes without a row get 0
    pub fn get(&self, globio_code: i32) -> f32 {
        self.values.get(&globio_code).copied().unwrap_or(0.0)
    }
}

/// MSA_LU per pixel of a GLOBIO land-cover. Uses `table` when given,
/// otherwise [`default_msa_lu`]. Nodata yields NaN.
pub fn msa_lu(globio_lulc: &Raster<i32>, table: Option<&MsaLuTable>) -> Result<Raster<f32>> {
    let values: Vec<f32> = globio_lulc
        .values()
        .map(|code| {
            if globio_lulc.is_nodata(code) {
                f32::NAN
            } else {
                table.map_or_else(|| default_msa_lu(code), |t| t.get(code))
            }
        })
        .collect();
    globio_lulc.with_values(values, Some(f32::NAN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use landshift_core::Error;

    #[test]
    fn test_default_mapping() {
        let mut globio = Raster::from_vec(vec![1, 4, 10, 130, -1, 0], 2, 3).unwrap();
        globio.set_nodata(Some(-1));
        let lu = msa_lu(&globio, None).unwrap();
        assert_eq!(lu.get(0, 0).unwrap(), 1.0);
        assert_eq!(lu.get(0, 1).unwrap(), 0.2);
        assert_eq!(lu.get(0, 2).unwrap(), 0.05);
        assert_eq!(lu.get(1, 0).unwrap(), 0.0);
        assert!(lu.get(1, 1).unwrap().is_nan());
        assert_eq!(lu.get(1, 2).unwrap(), 0.0);
    }

    #[test]
    fn test_table_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("msa_lu.csv");
        std::fs::write(&path, "globio_code,msa_lu\n1,0.9\n9,0.15\n").unwrap();
        let table = MsaLuTable::load(&path).unwrap();

        let globio = Raster::from_vec(vec![1, 9, 3], 1, 3).unwrap();
        let lu = msa_lu(&globio, Some(&table)).unwrap();
        assert_eq!(lu.to_vec(), vec![0.9, 0.15, 0.0]);
    }

    #[test]
    fn test_out_of_range_value_is_schema_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("msa_lu.csv");
        std::fs::write(&path, "globio_code,msa_lu\n1,1.5\n").unwrap();
        assert!(matches!(MsaLuTable::load(&path), Err(Error::Schema { .. })));
    }
}
