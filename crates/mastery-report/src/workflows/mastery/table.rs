use super::catalog::{OutcomeCatalog, IDENTITY_COLUMNS};
use super::directory::StudentDirectory;
use super::rows::{is_blank, Row};
use super::student::OutcomeResult;
use super::MasteryError;
use tracing::{debug, warn};

/// How a score becomes a mastered/not-yet decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MasteryRule {
    /// Mastered when the score reaches the row's own mastery-points column.
    Threshold,
    /// Mastered when the score reaches a fixed value on the grading scale,
    /// ignoring the row's mastery-points column.
    FixedScale { done_score: f64 },
}

impl MasteryRule {
    pub fn is_mastered(&self, score: f64, required: f64) -> bool {
        match self {
            MasteryRule::Threshold => score >= required,
            MasteryRule::FixedScale { done_score } => score >= *done_score,
        }
    }
}

/// Identity and results parsed from one mastery export row.
#[derive(Debug, Clone, PartialEq)]
pub struct MasteryRow {
    pub name: String,
    pub id: String,
    pub results: Vec<OutcomeResult>,
}

/// Parses `[name, id, (score, required)...]` with results aligned to catalog
/// indices. Empty score or requirement fields count as `0.0`.
pub fn parse_mastery_row(
    row: &[String],
    catalog: &OutcomeCatalog,
    rule: MasteryRule,
) -> Result<MasteryRow, MasteryError> {
    let name = row.first().map(|value| value.trim()).unwrap_or("").to_string();
    if row.len() != catalog.expected_row_len() {
        return Err(MasteryError::ReferentialIntegrity(format!(
            "mastery row for '{}' has {} columns but the header describes {}",
            name,
            row.len(),
            catalog.expected_row_len()
        )));
    }

    let id = row[1].trim().to_string();
    let mut results = Vec::with_capacity(catalog.len());
    for index in 0..catalog.len() {
        let column = IDENTITY_COLUMNS + 2 * index;
        let score = parse_score(&name, column, &row[column])?;
        let required = parse_score(&name, column + 1, &row[column + 1])?;
        results.push(OutcomeResult {
            score,
            mastered: rule.is_mastered(score, required),
        });
    }

    Ok(MasteryRow { name, id, results })
}

fn parse_score(student: &str, column: usize, raw: &str) -> Result<f64, MasteryError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(0.0);
    }
    trimmed
        .parse::<f64>()
        .map_err(|_| MasteryError::InvalidScore {
            student: student.to_string(),
            column,
            value: raw.to_string(),
        })
}

/// Counts from folding a mastery export into the directory.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    pub matched: usize,
    pub created: usize,
}

/// Attaches every data row (the header is the first row) to the student with
/// the same id, creating bare records for ids the roster did not list.
pub fn merge_mastery_rows(
    rows: &[Row],
    catalog: &OutcomeCatalog,
    rule: MasteryRule,
    directory: &mut StudentDirectory,
) -> Result<MergeStats, MasteryError> {
    let mut stats = MergeStats::default();

    for row in rows.iter().skip(1).filter(|row| !is_blank(row)) {
        let parsed = parse_mastery_row(row, catalog, rule)?;
        if directory.attach_results(&parsed.id, &parsed.name, parsed.results) {
            debug!(student = %parsed.name, id = %parsed.id, "mastery row without roster entry");
            stats.created += 1;
        } else {
            stats.matched += 1;
        }
    }

    let missing = directory.iter().filter(|record| !record.has_results()).count();
    if missing > 0 {
        warn!(missing, "roster students absent from the mastery export");
    }

    Ok(stats)
}
