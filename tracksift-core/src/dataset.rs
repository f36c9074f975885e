// Checks that run before a merged table is handed to model training

use crate::error::{CoreError, Result};
use crate::table::FeatureTable;
use std::collections::BTreeMap;
use tracing::{info, warn};

pub const LABEL_COLUMN: &str = "manual_label";
/// Derived from the anomaly score, so never used as a training feature.
pub const ANOMALY_PREDICTION_COLUMN: &str = "iforest_anomaly_prediction";
pub const MIN_LABELED_ROWS: usize = 10;

/// Numeric feature columns of a table with identifiers and excluded columns removed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    rows: Vec<Vec<Option<f64>>>,
}

impl FeatureMatrix {
    pub fn from_table(table: &FeatureTable, excluded: &[&str]) -> Result<Self> {
        let kept: Vec<usize> = table
            .feature_columns()
            .iter()
            .enumerate()
            .filter(|(_, column)| !excluded.contains(&column.as_str()))
            .map(|(idx, _)| idx)
            .collect();
        if kept.is_empty() {
            return Err(CoreError::Dataset(
                "no numeric feature columns left after exclusions".to_string(),
            ));
        }

        let columns = kept
            .iter()
            .map(|&idx| table.feature_columns()[idx].clone())
            .collect();
        let rows = table
            .rows()
            .iter()
            .map(|row| kept.iter().map(|&idx| row.values[idx]).collect())
            .collect();

        let matrix = Self { columns, rows };
        if matrix.has_missing() {
            warn!(
                columns = matrix.missing_counts().len(),
                "feature matrix has missing values; impute or drop before training"
            );
        }
        Ok(matrix)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Option<f64>>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Columns with at least one missing value and how many.
    pub fn missing_counts(&self) -> Vec<(String, usize)> {
        self.columns
            .iter()
            .enumerate()
            .filter_map(|(idx, column)| {
                let missing = self.rows.iter().filter(|row| row[idx].is_none()).count();
                (missing > 0).then(|| (column.clone(), missing))
            })
            .collect()
    }

    pub fn has_missing(&self) -> bool {
        self.rows.iter().any(|row| row.iter().any(Option::is_none))
    }
}

/// Training input for the supervised classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSet {
    pub matrix: FeatureMatrix,
    pub labels: Vec<i64>,
    pub class_distribution: BTreeMap<i64, usize>,
    /// Rows dropped because their label was missing.
    pub dropped_unlabeled: usize,
}

/// Drop unlabeled rows and check there is enough data to train on.
///
/// Labels are truncated to integers. The label column and the anomaly
/// prediction column are excluded from the features.
pub fn prepare_labeled(table: &FeatureTable, label_column: &str) -> Result<LabeledSet> {
    let label_idx = table.feature_index(label_column).ok_or_else(|| {
        CoreError::Dataset(format!("label column '{}' not found", label_column))
    })?;

    let mut labeled = FeatureTable::new(
        table.id_columns().to_vec(),
        table.feature_columns().to_vec(),
    );
    let mut labels = Vec::new();
    for row in table.rows() {
        if let Some(label) = row.values[label_idx] {
            labels.push(label as i64);
            labeled.push_row(row.ids.clone(), row.values.clone())?;
        }
    }
    let dropped_unlabeled = table.len() - labeled.len();
    if dropped_unlabeled > 0 {
        warn!(dropped_unlabeled, "rows without a label were excluded");
    }

    if labels.len() < MIN_LABELED_ROWS {
        return Err(CoreError::Dataset(format!(
            "only {} labeled rows available, at least {} are needed",
            labels.len(),
            MIN_LABELED_ROWS
        )));
    }

    let mut class_distribution = BTreeMap::new();
    for label in &labels {
        *class_distribution.entry(*label).or_insert(0) += 1;
    }
    if class_distribution.len() < 2 {
        return Err(CoreError::Dataset(format!(
            "label column '{}' has {} distinct class(es), at least 2 are needed",
            label_column,
            class_distribution.len()
        )));
    }

    let matrix = FeatureMatrix::from_table(&labeled, &[label_column, ANOMALY_PREDICTION_COLUMN])?;
    info!(
        rows = matrix.n_rows(),
        features = matrix.n_columns(),
        classes = class_distribution.len(),
        "labeled training set prepared"
    );

    Ok(LabeledSet {
        matrix,
        labels,
        class_distribution,
        dropped_unlabeled,
    })
}
