// Report generation for merges, training sets and replays

use crate::dataset::LabeledSet;
use crate::error::Result;
use crate::merge::MergeReport;
use crate::replay::ReplaySummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

const HEAVY_RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";
const LIGHT_RULE: &str = "────────────────────────────────────────────────────────────────────────────────\n";

fn section(report: &mut String, title: &str) {
    report.push_str(HEAVY_RULE);
    report.push_str(title);
    report.push('\n');
    report.push_str(HEAVY_RULE);
    report.push('\n');
}

pub fn generate_merge_report(report: &MergeReport, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Text => Ok(generate_text_merge_report(report)),
        ReportFormat::Json => Ok(serde_json::to_string_pretty(report)?),
    }
}

pub fn generate_text_merge_report(data: &MergeReport) -> String {
    let mut report = String::new();

    report.push_str(HEAVY_RULE);
    report.push_str("                          TRACKSIFT MERGE REPORT\n");
    report.push_str(HEAVY_RULE);
    report.push('\n');

    report.push_str(&format!("Join key:          {}\n", data.join_key));
    report.push_str(&format!("Session key:       {}\n\n", data.session_key));

    section(&mut report, "INPUTS");
    report.push_str(&format!("Behavior rows:     {}\n", data.behavior_rows));
    report.push_str(&format!("  unique {}: {}\n", data.join_key, data.behavior_unique_keys));
    report.push_str(&format!("  unique {}: {}\n", data.session_key, data.behavior_unique_sessions));
    report.push_str(&format!("Network rows:      {}\n", data.network_rows));
    report.push_str(&format!("  unique {}: {}\n", data.join_key, data.network_unique_keys));
    if data.duplicated_network_keys.is_empty() {
        report.push_str(&format!("  [OK] {} is unique in the network table\n", data.join_key));
    } else {
        report.push_str(&format!(
            "  [WARNING] {} duplicated {} value(s) in the network table; network data was not summarized per URL\n",
            data.duplicated_network_keys.len(),
            data.join_key
        ));
        for key in &data.duplicated_network_keys {
            report.push_str(&format!("    - {}\n", key));
        }
    }
    report.push('\n');

    section(&mut report, "RESULT");
    report.push_str(&format!("Merged rows:       {}\n", data.merged_rows));
    if data.duplicated_session_ids.is_empty() {
        report.push_str(&format!("  [OK] {} is still unique\n", data.session_key));
    } else {
        report.push_str(&format!(
            "  [WARNING] {} is NOT unique after the join ({} duplicated); the merge multiplied rows\n",
            data.session_key,
            data.duplicated_session_ids.len()
        ));
        for id in &data.duplicated_session_ids {
            report.push_str(&format!("    - {}\n", id));
        }
    }
    if data.unmatched_behavior_rows > 0 {
        report.push_str(&format!(
            "  [WARNING] {} behavior row(s) had no matching network data; their network columns are empty\n",
            data.unmatched_behavior_rows
        ));
    } else {
        report.push_str("  [OK] every behavior row found network data\n");
    }
    report.push('\n');

    let with_missing: Vec<_> = data.missing_by_column.iter().filter(|c| c.missing > 0).collect();
    section(&mut report, "MISSING VALUES");
    if with_missing.is_empty() {
        report.push_str("  (none)\n");
    } else {
        for column in with_missing {
            report.push_str(&format!("  {:<40} {}\n", column.column, column.missing));
        }
    }
    report.push('\n');
    report.push_str(HEAVY_RULE);

    report
}

pub fn generate_dataset_report(data: &LabeledSet) -> String {
    let mut report = String::new();

    section(&mut report, "TRAINING SET");
    report.push_str(&format!("Labeled rows:      {}\n", data.labels.len()));
    report.push_str(&format!("Unlabeled dropped: {}\n", data.dropped_unlabeled));
    report.push_str(&format!("Feature columns:   {}\n\n", data.matrix.n_columns()));

    report.push_str("Class distribution:\n");
    let total = data.labels.len().max(1) as f64;
    for (class, count) in &data.class_distribution {
        report.push_str(&format!(
            "  {:>6}  {:>6}  ({:.1}%)\n",
            class,
            count,
            *count as f64 / total * 100.0
        ));
    }

    let missing = data.matrix.missing_counts();
    if !missing.is_empty() {
        report.push('\n');
        report.push_str("[WARNING] missing values; impute or drop before training:\n");
        for (column, count) in missing {
            report.push_str(&format!("  {:<40} {}\n", column, count));
        }
    }
    report.push_str(LIGHT_RULE);

    report
}

pub fn generate_replay_report(summary: &ReplaySummary) -> String {
    let mut report = String::new();

    section(&mut report, "REPLAY SUMMARY");
    report.push_str(&format!("Files replayed:    {}\n", summary.files_processed));
    report.push_str(&format!("Sessions stored:   {}\n", summary.sessions.len()));
    report.push_str(&format!("  partial:         {}\n", summary.partial_sessions()));
    report.push_str(&format!("Network events:    {}\n", summary.network_events()));

    if !summary.failed_files.is_empty() {
        report.push('\n');
        report.push_str("Failed files:\n");
        for (path, error) in &summary.failed_files {
            report.push_str(&format!("  {}: {}\n", path.display(), error));
        }
    }

    if !summary.sessions.is_empty() {
        report.push('\n');
        for outcome in &summary.sessions {
            let marker = if outcome.partial { "partial" } else { "ok" };
            report.push_str(&format!(
                "  [{:<7}] {}  {} interactions, {} network events\n",
                marker, outcome.session_start_url, outcome.interactions, outcome.network_events
            ));
        }
    }
    report.push_str(LIGHT_RULE);

    report
}
