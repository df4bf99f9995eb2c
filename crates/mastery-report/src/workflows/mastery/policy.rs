use super::catalog::{OutcomeCatalog, OutcomeKey};
use super::rows::{is_blank, Row};
use super::MasteryError;
use std::collections::HashMap;

const SKIP_TOKEN: &str = "skip";

/// One row of the outcomes-of-interest file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyEntry {
    pub key: OutcomeKey,
    /// Stem of the quiz macro that typesets this outcome's problem.
    pub render_stem: String,
    /// Week the outcome is introduced; 0 when the column is absent.
    pub introduced_week: u32,
    /// Outcome whose mastery grants half credit toward this one.
    pub partial_link: Option<OutcomeKey>,
    pub skip: bool,
}

/// Restricts reporting to the outcomes named in the policy file.
#[derive(Debug, Clone, Default)]
pub struct PolicyFilter {
    active: Vec<PolicyEntry>,
    positions: HashMap<OutcomeKey, usize>,
    skipped: usize,
    deferred: usize,
}

impl PolicyFilter {
    /// Activates policy rows against `catalog`. `week_cutoff == 0` keeps every
    /// non-skipped row; otherwise rows introduced after the cutoff are deferred.
    pub fn from_rows(
        rows: &[Row],
        catalog: &OutcomeCatalog,
        week_cutoff: u32,
    ) -> Result<Self, MasteryError> {
        let mut filter = Self::default();

        for (offset, row) in rows.iter().enumerate() {
            if is_blank(row) {
                continue;
            }

            let line = offset + 1;
            let entry = parse_entry(line, row)?;
            if entry.skip {
                filter.skipped += 1;
                continue;
            }
            if week_cutoff > 0 && entry.introduced_week > week_cutoff {
                filter.deferred += 1;
                continue;
            }

            filter.activate(line, entry, catalog)?;
        }

        Ok(filter)
    }

    fn activate(
        &mut self,
        line: usize,
        entry: PolicyEntry,
        catalog: &OutcomeCatalog,
    ) -> Result<(), MasteryError> {
        if !catalog.contains(&entry.key) {
            return Err(MasteryError::ReferentialIntegrity(format!(
                "policy line {line} names outcome {} which is not in the mastery export",
                entry.key
            )));
        }
        if let Some(link) = &entry.partial_link {
            if !catalog.contains(link) {
                return Err(MasteryError::ReferentialIntegrity(format!(
                    "policy line {line} links {} to outcome {link} which is not in the mastery export",
                    entry.key
                )));
            }
        }
        if self.positions.contains_key(&entry.key) {
            return Err(MasteryError::MalformedPolicy {
                line,
                reason: format!("outcome {} is listed more than once", entry.key),
            });
        }

        self.positions.insert(entry.key.clone(), self.active.len());
        self.active.push(entry);
        Ok(())
    }

    /// Active entries in file order.
    pub fn active(&self) -> &[PolicyEntry] {
        &self.active
    }

    pub fn position(&self, key: &OutcomeKey) -> Option<usize> {
        self.positions.get(key).copied()
    }

    pub fn is_active(&self, key: &OutcomeKey) -> bool {
        self.positions.contains_key(key)
    }

    pub fn entry(&self, key: &OutcomeKey) -> Option<&PolicyEntry> {
        self.position(key).map(|position| &self.active[position])
    }

    pub fn partial_link(&self, key: &OutcomeKey) -> Option<&OutcomeKey> {
        self.entry(key).and_then(|entry| entry.partial_link.as_ref())
    }

    /// Rows dropped by the `skip` marker.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Rows held back by the week cutoff.
    pub fn deferred(&self) -> usize {
        self.deferred
    }
}

fn parse_entry(line: usize, row: &[String]) -> Result<PolicyEntry, MasteryError> {
    let field = |index: usize| row.get(index).map(|value| value.trim()).unwrap_or("");

    if row.len() < 2 {
        return Err(MasteryError::MalformedPolicy {
            line,
            reason: "expected at least a group code and an outcome code".to_string(),
        });
    }

    let group = field(0);
    let outcome = field(1);
    if group.is_empty() || outcome.is_empty() {
        return Err(MasteryError::MalformedPolicy {
            line,
            reason: "group and outcome codes must not be empty".to_string(),
        });
    }

    if field(4) == SKIP_TOKEN {
        return Ok(PolicyEntry {
            key: OutcomeKey::new(group, outcome),
            render_stem: field(2).to_string(),
            introduced_week: 0,
            partial_link: None,
            skip: true,
        });
    }

    let introduced_week = match field(3) {
        "" => 0,
        raw => raw.parse::<u32>().map_err(|_| MasteryError::MalformedPolicy {
            line,
            reason: format!("introduction week '{raw}' is not a whole number"),
        })?,
    };

    let partial_link = match field(4) {
        "" => None,
        link => Some(resolve_link(group, link)),
    };

    Ok(PolicyEntry {
        key: OutcomeKey::new(group, outcome),
        render_stem: field(2).to_string(),
        introduced_week,
        partial_link,
        skip: false,
    })
}

// `G2.F3` names an outcome in another group; a bare code stays in `group`.
fn resolve_link(group: &str, link: &str) -> OutcomeKey {
    match link.split_once('.') {
        Some((other_group, outcome)) => OutcomeKey::new(other_group.trim(), outcome.trim()),
        None => OutcomeKey::new(group, link),
    }
}
