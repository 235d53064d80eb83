//! CSV step reporter

use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use landshift_core::{Error, Result};

/// One CSV cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell {
    Int(i64),
    Float(f64),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Int(v) => write!(f, "{}", v),
            Cell::Float(v) => write!(f, "{:.9}", v),
        }
    }
}

fn csv_error(err: csv::Error) -> Error {
    match err.into_kind() {
        csv::ErrorKind::Io(io) => Error::Io(io),
        other => Error::Other(format!("CSV write error: {:?}", other)),
    }
}

/// Writes one row per step under a header fixed at construction.
///
/// Every row is flushed as soon as it is written, so the rows of completed
/// steps survive a later failure.
pub struct CsvReporter<W: Write> {
    writer: csv::Writer<W>,
    header: Vec<String>,
}

impl<W: Write> CsvReporter<W> {
    /// Write the header `step, columns...`
    pub fn new(inner: W, columns: &[String]) -> Result<Self> {
        let mut header = Vec::with_capacity(columns.len() + 1);
        header.push("step".to_string());
        header.extend(columns.iter().cloned());

        let mut writer = csv::Writer::from_writer(inner);
        writer.write_record(&header).map_err(csv_error)?;
        writer.flush()?;
        Ok(Self { writer, header })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn write_row(&mut self, step: i32, cells: &[Cell]) -> Result<()> {
        if cells.len() + 1 != self.header.len() {
            return Err(Error::Mismatch {
                what: "report row",
                expected: format!("{} columns", self.header.len()),
                actual: format!("{} columns", cells.len() + 1),
            });
        }
        let record = std::iter::once(step.to_string()).chain(cells.iter().map(Cell::to_string));
        self.writer.write_record(record).map_err(csv_error)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Flush and hand back the underlying writer
    pub fn finish(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))
    }
}

/// Create the output CSV, making its parent directory if needed
pub fn create_output<P: AsRef<Path>>(path: P) -> Result<File> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::from_io(e, parent))?;
    }
    File::create(path).map_err(|e| Error::from_io(e, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_header_and_rows() {
        let mut reporter = CsvReporter::new(Vec::new(), &columns(&["total_carbon_mg", "converted_1"])).unwrap();
        reporter
            .write_row(0, &[Cell::Float(1234.5), Cell::Int(0)])
            .unwrap();
        reporter
            .write_row(1, &[Cell::Float(1.0 / 3.0), Cell::Int(7)])
            .unwrap();

        let text = String::from_utf8(reporter.finish().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "step,total_carbon_mg,converted_1");
        assert_eq!(lines[1], "0,1234.500000000,0");
        assert_eq!(lines[2], "1,0.333333333,7");
    }

    #[test]
    fn test_row_width_is_checked() {
        let mut reporter = CsvReporter::new(Vec::new(), &columns(&["avg_msa"])).unwrap();
        assert!(matches!(
            reporter.write_row(0, &[Cell::Float(0.5), Cell::Float(0.5)]),
            Err(Error::Mismatch { .. })
        ));
    }

    #[test]
    fn test_create_output_makes_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/run.csv");
        create_output(&path).unwrap();
        assert!(path.exists());
    }
}
