use std::collections::HashSet;

use crate::error::{ExtractError, OnboardingError};

pub fn is_csv_file_name(name: &str) -> bool {
    name.to_lowercase().ends_with(".csv")
}

/// Rejects uploads whose name does not end in `.csv`, before any parsing.
pub fn check_file_name(name: &str) -> Result<(), OnboardingError> {
    if is_csv_file_name(name) {
        Ok(())
    } else {
        Err(OnboardingError::NotCsv(name.to_string()))
    }
}

/// A data row reduced to the one column the pipeline reads.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StageRow {
    stage: Option<String>,
}

/// Header index of the first column whose trimmed, lowercased name is one of `aliases`.
pub fn find_stage_column(headers: &[String], aliases: &[String]) -> Option<usize> {
    let aliases: Vec<String> = aliases
        .iter()
        .map(|alias| alias.trim().to_lowercase())
        .filter(|alias| !alias.is_empty())
        .collect();

    headers
        .iter()
        .position(|header| aliases.contains(&header.trim().to_lowercase()))
}

/// Parses `content` as headed CSV and returns the distinct stage labels in first-seen order.
pub fn extract_stages(content: &str, aliases: &[String]) -> Result<Vec<String>, ExtractError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|err| ExtractError::Parse(err.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let column = find_stage_column(&headers, aliases);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| ExtractError::Parse(err.to_string()))?;
        rows.push(StageRow {
            stage: column.and_then(|idx| record.get(idx)).map(|v| v.to_string()),
        });
    }

    if rows.is_empty() {
        return Err(ExtractError::EmptyData);
    }

    let column = column.ok_or_else(|| ExtractError::ColumnNotFound {
        available: headers.clone(),
    })?;

    let mut seen = HashSet::new();
    let mut stages = Vec::new();
    for row in rows {
        let Some(value) = row.stage else { continue };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        if seen.insert(value.to_string()) {
            stages.push(value.to_string());
        }
    }

    if stages.is_empty() {
        return Err(ExtractError::NoStagesFound {
            column: headers[column].clone(),
        });
    }

    tracing::debug!(column = %headers[column], count = stages.len(), "extracted stages");
    Ok(stages)
}
