// Feature tables and their CSV form

use crate::error::{CoreError, Result};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub ids: Vec<String>,
    /// `None` is a missing value (an empty CSV cell).
    pub values: Vec<Option<f64>>,
}

/// Rows of identifier strings followed by numeric feature values.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    id_columns: Vec<String>,
    feature_columns: Vec<String>,
    rows: Vec<TableRow>,
}

impl FeatureTable {
    pub fn new(id_columns: Vec<String>, feature_columns: Vec<String>) -> Self {
        Self {
            id_columns,
            feature_columns,
            rows: Vec::new(),
        }
    }

    pub fn id_columns(&self) -> &[String] {
        &self.id_columns
    }

    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, ids: Vec<String>, values: Vec<Option<f64>>) -> Result<()> {
        if ids.len() != self.id_columns.len() || values.len() != self.feature_columns.len() {
            return Err(CoreError::Schema(format!(
                "row has {} ids and {} values, table expects {} and {}",
                ids.len(),
                values.len(),
                self.id_columns.len(),
                self.feature_columns.len()
            )));
        }
        self.rows.push(TableRow { ids, values });
        Ok(())
    }

    pub fn id_index(&self, column: &str) -> Option<usize> {
        self.id_columns.iter().position(|c| c == column)
    }

    pub fn feature_index(&self, column: &str) -> Option<usize> {
        self.feature_columns.iter().position(|c| c == column)
    }

    pub fn id_values(&self, column: &str) -> Option<Vec<&str>> {
        let idx = self.id_index(column)?;
        Some(self.rows.iter().map(|r| r.ids[idx].as_str()).collect())
    }

    pub fn feature_values(&self, column: &str) -> Option<Vec<Option<f64>>> {
        let idx = self.feature_index(column)?;
        Some(self.rows.iter().map(|r| r.values[idx]).collect())
    }

    /// Missing-value count for every column, ids first. Empty id strings count as missing.
    pub fn missing_counts(&self) -> Vec<(String, usize)> {
        let ids = self.id_columns.iter().enumerate().map(|(idx, column)| {
            let missing = self.rows.iter().filter(|r| r.ids[idx].is_empty()).count();
            (column.clone(), missing)
        });
        let features = self.feature_columns.iter().enumerate().map(|(idx, column)| {
            let missing = self.rows.iter().filter(|r| r.values[idx].is_none()).count();
            (column.clone(), missing)
        });
        ids.chain(features).collect()
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        self.write_to(file)
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(self.id_columns.iter().chain(self.feature_columns.iter()))?;
        for row in &self.rows {
            let values = row.values.iter().map(|v| match v {
                Some(value) => value.to_string(),
                None => String::new(),
            });
            let record: Vec<String> = row.ids.iter().cloned().chain(values).collect();
            csv_writer.write_record(&record)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Read a table, treating `id_columns` as identifiers. Every other column must
    /// hold numbers or empty cells.
    pub fn read_csv(path: &Path, id_columns: &[&str]) -> Result<Self> {
        let file = File::open(path)?;
        Self::read_from(file, id_columns)
    }

    pub fn read_from<R: Read>(reader: R, id_columns: &[&str]) -> Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let headers = csv_reader.headers()?.clone();

        for id in id_columns {
            if !headers.iter().any(|h| h == *id) {
                return Err(CoreError::Schema(format!("missing id column '{}'", id)));
            }
        }

        let mut id_positions = Vec::new();
        let mut feature_positions = Vec::new();
        let mut table = FeatureTable::new(Vec::new(), Vec::new());
        for (idx, header) in headers.iter().enumerate() {
            if id_columns.contains(&header) {
                id_positions.push(idx);
                table.id_columns.push(header.to_string());
            } else {
                feature_positions.push(idx);
                table.feature_columns.push(header.to_string());
            }
        }

        for (line, record) in csv_reader.records().enumerate() {
            let record = record?;
            let ids = id_positions
                .iter()
                .map(|&idx| record.get(idx).unwrap_or("").to_string())
                .collect();
            let values = feature_positions
                .iter()
                .map(|&idx| parse_cell(record.get(idx).unwrap_or(""), &headers[idx], line + 2))
                .collect::<Result<Vec<_>>>()?;
            table.rows.push(TableRow { ids, values });
        }

        Ok(table)
    }
}

fn parse_cell(cell: &str, column: &str, line: usize) -> Result<Option<f64>> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(None);
    }
    match cell.parse::<f64>() {
        Ok(value) if value.is_nan() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(_) => Err(CoreError::Schema(format!(
            "line {}: column '{}' holds non-numeric value '{}'",
            line, column, cell
        ))),
    }
}
