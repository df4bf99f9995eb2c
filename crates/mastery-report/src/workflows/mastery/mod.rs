pub mod catalog;
pub mod delivery;
pub mod directory;
pub mod ordering;
pub mod policy;
pub mod report;
pub mod roster;
mod rows;
pub mod run;
pub mod student;
pub mod table;

use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

pub use catalog::{OutcomeCatalog, OutcomeKey};
pub use directory::StudentDirectory;
pub use ordering::StudentOrder;
pub use policy::PolicyFilter;
pub use rows::Row;
pub use student::{OutcomeResult, StudentRecord};
pub use table::{MasteryRule, MergeStats};

#[derive(Debug, thiserror::Error)]
pub enum MasteryError {
    #[error("malformed outcome header in column {column} ({label:?}): {reason}")]
    MalformedHeader {
        column: usize,
        label: String,
        reason: String,
    },
    #[error("{0}")]
    ReferentialIntegrity(String),
    #[error("malformed policy line {line}: {reason}")]
    MalformedPolicy { line: usize, reason: String },
    #[error("invalid score {value:?} for {student} in column {column}")]
    InvalidScore {
        student: String,
        column: usize,
        value: String,
    },
    #[error("invalid export data: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to read export: {0}")]
    Io(#[from] std::io::Error),
}

/// Comma-separated export (mastery table, roster).
pub fn read_comma_rows<R: Read>(reader: R) -> Result<Vec<Row>, MasteryError> {
    Ok(rows::read_rows(reader, rows::COMMA)?)
}

/// Tab-separated export (policy file).
pub fn read_tab_rows<R: Read>(reader: R) -> Result<Vec<Row>, MasteryError> {
    Ok(rows::read_rows(reader, rows::TAB)?)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadOptions {
    pub rule: MasteryRule,
    /// Outcomes introduced after this week are deferred. 0 keeps everything.
    pub week_cutoff: u32,
    pub roster_skip_rows: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            rule: MasteryRule::Threshold,
            week_cutoff: 0,
            roster_skip_rows: 1,
        }
    }
}

/// Everything a run needs: the outcome catalog, the active policy and the
/// merged student directory.
#[derive(Debug, Clone)]
pub struct MasteryWorkspace {
    pub catalog: OutcomeCatalog,
    pub policy: PolicyFilter,
    pub directory: StudentDirectory,
    has_roster: bool,
}

impl MasteryWorkspace {
    pub fn from_paths<P: AsRef<Path>>(
        mastery: P,
        policy: P,
        roster: Option<P>,
        options: &LoadOptions,
    ) -> Result<Self, MasteryError> {
        let mastery_rows = read_comma_rows(File::open(mastery)?)?;
        let policy_rows = read_tab_rows(File::open(policy)?)?;
        let roster_rows = match roster {
            Some(path) => Some(read_comma_rows(File::open(path)?)?),
            None => None,
        };
        Self::from_rows(&mastery_rows, &policy_rows, roster_rows.as_deref(), options)
    }

    /// `mastery_rows` includes its header row.
    pub fn from_rows(
        mastery_rows: &[Row],
        policy_rows: &[Row],
        roster_rows: Option<&[Row]>,
        options: &LoadOptions,
    ) -> Result<Self, MasteryError> {
        let header = mastery_rows.first().ok_or_else(|| {
            MasteryError::ReferentialIntegrity("mastery export is empty".to_string())
        })?;
        let catalog = OutcomeCatalog::from_header(header)?;
        let policy = PolicyFilter::from_rows(policy_rows, &catalog, options.week_cutoff)?;
        info!(
            outcomes = catalog.len(),
            active = policy.active().len(),
            skipped = policy.skipped(),
            deferred = policy.deferred(),
            "loaded outcome policy"
        );

        let mut directory = match roster_rows {
            Some(rows) => {
                StudentDirectory::from_records(roster::parse_roster(rows, options.roster_skip_rows))
            }
            None => StudentDirectory::default(),
        };
        let merged =
            table::merge_mastery_rows(mastery_rows, &catalog, options.rule, &mut directory)?;
        info!(
            students = directory.len(),
            matched = merged.matched,
            created = merged.created,
            "merged mastery export"
        );

        Ok(Self {
            catalog,
            policy,
            directory,
            has_roster: roster_rows.is_some(),
        })
    }

    /// Sections are only meaningful when a roster was supplied.
    pub fn has_roster(&self) -> bool {
        self.has_roster
    }

    /// Students in report order whose names contain `name_filter`.
    pub fn students(&self, order: StudentOrder, name_filter: &str) -> Vec<&StudentRecord> {
        self.directory
            .ordered(order)
            .into_iter()
            .filter(|student| student.matches_filter(name_filter))
            .collect()
    }
}
