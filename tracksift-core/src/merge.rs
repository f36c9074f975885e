// Left join of the behavior table onto the network table, with cardinality checks

use crate::error::{CoreError, Result};
use crate::features::{SESSION_ID_COLUMN, START_URL_COLUMN};
use crate::table::FeatureTable;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMissing {
    pub column: String,
    pub missing: usize,
}

/// Diagnostics gathered before and after the join. Violations are reported
/// here and logged; they never abort the merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeReport {
    pub join_key: String,
    pub session_key: String,
    pub behavior_rows: usize,
    pub network_rows: usize,
    pub behavior_unique_keys: usize,
    pub behavior_unique_sessions: usize,
    pub network_unique_keys: usize,
    /// Join keys occurring more than once in the network table.
    pub duplicated_network_keys: Vec<String>,
    pub merged_rows: usize,
    /// Session ids occurring more than once after the join.
    pub duplicated_session_ids: Vec<String>,
    /// Behavior rows that found no network row.
    pub unmatched_behavior_rows: usize,
    pub missing_by_column: Vec<ColumnMissing>,
}

impl MergeReport {
    /// Both cardinality checks passed.
    pub fn is_clean(&self) -> bool {
        self.duplicated_network_keys.is_empty() && self.duplicated_session_ids.is_empty()
    }

    /// The join produced more rows than the behavior table had.
    pub fn fanned_out(&self) -> bool {
        self.merged_rows > self.behavior_rows
    }
}

/// Merge on `session_start_url`, checking `session_id_group` uniqueness afterwards.
pub fn merge(behavior: &FeatureTable, network: &FeatureTable) -> Result<(FeatureTable, MergeReport)> {
    merge_on(behavior, network, START_URL_COLUMN, SESSION_ID_COLUMN)
}

/// Left join `left` to `right` on the id column `key`.
///
/// Unmatched left rows get missing values for every right-hand column. Feature
/// columns present on both sides are suffixed `_x` (left) and `_y` (right).
pub fn merge_on(
    left: &FeatureTable,
    right: &FeatureTable,
    key: &str,
    session_key: &str,
) -> Result<(FeatureTable, MergeReport)> {
    let left_key = left
        .id_index(key)
        .ok_or_else(|| CoreError::Schema(format!("left table has no '{}' column", key)))?;
    let right_key = right
        .id_index(key)
        .ok_or_else(|| CoreError::Schema(format!("right table has no '{}' column", key)))?;
    if left.id_index(session_key).is_none() {
        return Err(CoreError::Schema(format!(
            "left table has no '{}' column",
            session_key
        )));
    }

    // Precondition: the right-hand key is unique
    let right_keys: Vec<&str> = right.rows().iter().map(|r| r.ids[right_key].as_str()).collect();
    let duplicated_network_keys = duplicates(&right_keys);
    if !duplicated_network_keys.is_empty() {
        warn!(
            duplicates = duplicated_network_keys.len(),
            "network table has duplicate {} values; rows will fan out during the join", key
        );
    }

    let left_keys: Vec<&str> = left.rows().iter().map(|r| r.ids[left_key].as_str()).collect();
    let left_sessions = left.id_values(session_key).unwrap_or_default();

    let mut right_index: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, k) in right_keys.iter().enumerate() {
        right_index.entry(*k).or_default().push(idx);
    }

    let (id_columns, right_id_positions, feature_columns) = merged_columns(left, right, right_key);
    let mut merged = FeatureTable::new(id_columns, feature_columns);
    let right_width = right.feature_columns().len();
    let mut unmatched = 0;

    for row in left.rows() {
        match right_index.get(row.ids[left_key].as_str()) {
            Some(matches) => {
                for &idx in matches {
                    let other = &right.rows()[idx];
                    let ids = row
                        .ids
                        .iter()
                        .cloned()
                        .chain(right_id_positions.iter().map(|&p| other.ids[p].clone()))
                        .collect();
                    let values = row.values.iter().chain(other.values.iter()).copied().collect();
                    merged.push_row(ids, values)?;
                }
            }
            None => {
                unmatched += 1;
                let ids = row
                    .ids
                    .iter()
                    .cloned()
                    .chain(right_id_positions.iter().map(|_| String::new()))
                    .collect();
                let values = row
                    .values
                    .iter()
                    .copied()
                    .chain(std::iter::repeat_n(None, right_width))
                    .collect();
                merged.push_row(ids, values)?;
            }
        }
    }

    // Postcondition: the session id is still unique
    let merged_sessions = merged.id_values(session_key).unwrap_or_default();
    let duplicated_session_ids = duplicates(&merged_sessions);
    if !duplicated_session_ids.is_empty() {
        warn!(
            duplicates = duplicated_session_ids.len(),
            "{} is not unique after the join; the merge multiplied rows", session_key
        );
    }
    if unmatched > 0 {
        warn!(unmatched, "behavior rows without matching network data");
    }

    let report = MergeReport {
        join_key: key.to_string(),
        session_key: session_key.to_string(),
        behavior_rows: left.len(),
        network_rows: right.len(),
        behavior_unique_keys: distinct(&left_keys),
        behavior_unique_sessions: distinct(&left_sessions),
        network_unique_keys: distinct(&right_keys),
        duplicated_network_keys,
        merged_rows: merged.len(),
        duplicated_session_ids,
        unmatched_behavior_rows: unmatched,
        missing_by_column: merged
            .missing_counts()
            .into_iter()
            .map(|(column, missing)| ColumnMissing { column, missing })
            .collect(),
    };
    info!(
        behavior_rows = report.behavior_rows,
        network_rows = report.network_rows,
        merged_rows = report.merged_rows,
        "merge complete"
    );

    Ok((merged, report))
}

// Column layout of the joined table: left ids, right ids minus the key, then features
fn merged_columns(
    left: &FeatureTable,
    right: &FeatureTable,
    right_key: usize,
) -> (Vec<String>, Vec<usize>, Vec<String>) {
    let mut id_columns: Vec<String> = left.id_columns().to_vec();
    let mut right_id_positions = Vec::new();
    for (idx, column) in right.id_columns().iter().enumerate() {
        if idx == right_key {
            continue;
        }
        right_id_positions.push(idx);
        if left.id_columns().contains(column) {
            id_columns.push(format!("{}_y", column));
        } else {
            id_columns.push(column.clone());
        }
    }

    let left_features: HashSet<&str> = left.feature_columns().iter().map(String::as_str).collect();
    let right_features: HashSet<&str> = right.feature_columns().iter().map(String::as_str).collect();
    let mut feature_columns = Vec::new();
    for column in left.feature_columns() {
        if right_features.contains(column.as_str()) {
            feature_columns.push(format!("{}_x", column));
        } else {
            feature_columns.push(column.clone());
        }
    }
    for column in right.feature_columns() {
        if left_features.contains(column.as_str()) {
            feature_columns.push(format!("{}_y", column));
        } else {
            feature_columns.push(column.clone());
        }
    }

    (id_columns, right_id_positions, feature_columns)
}

fn distinct(values: &[&str]) -> usize {
    values.iter().collect::<HashSet<_>>().len()
}

// Values seen more than once, each listed once in first-seen order
fn duplicates(values: &[&str]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    let mut result = Vec::new();
    for value in values {
        if !seen.insert(*value) && reported.insert(*value) {
            result.push(value.to_string());
        }
    }
    result
}
