use super::MasteryError;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::OnceLock;

/// Leading columns of the mastery export: student name and student id.
pub const IDENTITY_COLUMNS: usize = 2;

const RESULT_SUFFIX: &str = " result";

/// `(group, outcome)` identity of an outcome.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutcomeKey {
    pub group: String,
    pub outcome: String,
}

impl OutcomeKey {
    pub fn new(group: impl Into<String>, outcome: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            outcome: outcome.into(),
        }
    }
}

impl fmt::Display for OutcomeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.outcome)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub group_code: String,
    pub group_title: String,
    pub outcome_code: String,
    pub outcome_title: String,
    /// Position in every student's result vector.
    pub index: usize,
}

impl Outcome {
    pub fn key(&self) -> OutcomeKey {
        OutcomeKey::new(self.group_code.clone(), self.outcome_code.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub code: String,
    pub title: String,
    /// Catalog indices of the group's outcomes, in header order.
    pub outcomes: Vec<usize>,
}

/// Pieces of a single `"<G>: <group title> > <O>: <outcome title> result"` label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeLabel {
    pub group_code: String,
    pub group_title: String,
    pub outcome_code: String,
    pub outcome_title: String,
}

/// Outcomes discovered from the mastery export header.
#[derive(Debug, Clone, Default)]
pub struct OutcomeCatalog {
    outcomes: Vec<Outcome>,
    by_key: HashMap<OutcomeKey, usize>,
    groups: BTreeMap<String, Group>,
}

impl OutcomeCatalog {
    /// Builds the catalog from the header row. Columns `2 + 2i` carry the
    /// result label for outcome `i`; the paired mastery-points column is not
    /// inspected.
    pub fn from_header(header: &[String]) -> Result<Self, MasteryError> {
        if header.len() < IDENTITY_COLUMNS {
            return Err(MasteryError::MalformedHeader {
                column: header.len(),
                label: String::new(),
                reason: "missing student name and id columns".to_string(),
            });
        }

        let outcome_columns = header.len() - IDENTITY_COLUMNS;
        if outcome_columns % 2 != 0 {
            return Err(MasteryError::MalformedHeader {
                column: header.len() - 1,
                label: header[header.len() - 1].clone(),
                reason: "outcome columns must come in result/mastery-points pairs".to_string(),
            });
        }

        let mut catalog = Self::default();
        for index in 0..outcome_columns / 2 {
            let column = IDENTITY_COLUMNS + 2 * index;
            let raw = &header[column];
            let label = parse_outcome_label(raw).map_err(|reason| MasteryError::MalformedHeader {
                column,
                label: raw.clone(),
                reason: reason.to_string(),
            })?;
            catalog.insert(label, index).map_err(|reason| MasteryError::MalformedHeader {
                column,
                label: raw.clone(),
                reason,
            })?;
        }

        Ok(catalog)
    }

    fn insert(&mut self, label: OutcomeLabel, index: usize) -> Result<(), String> {
        let key = OutcomeKey::new(label.group_code.clone(), label.outcome_code.clone());
        if self.by_key.contains_key(&key) {
            return Err(format!("outcome {key} appears more than once"));
        }

        let group = self
            .groups
            .entry(label.group_code.clone())
            .or_insert_with(|| Group {
                code: label.group_code.clone(),
                title: label.group_title.clone(),
                outcomes: Vec::new(),
            });
        group.outcomes.push(index);

        self.by_key.insert(key, index);
        self.outcomes.push(Outcome {
            group_code: label.group_code,
            group_title: label.group_title,
            outcome_code: label.outcome_code,
            outcome_title: label.outcome_title,
            index,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Number of fields every mastery row must carry.
    pub fn expected_row_len(&self) -> usize {
        IDENTITY_COLUMNS + 2 * self.outcomes.len()
    }

    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    pub fn outcome(&self, index: usize) -> Option<&Outcome> {
        self.outcomes.get(index)
    }

    pub fn get(&self, key: &OutcomeKey) -> Option<&Outcome> {
        self.by_key.get(key).map(|index| &self.outcomes[*index])
    }

    pub fn contains(&self, key: &OutcomeKey) -> bool {
        self.by_key.contains_key(key)
    }

    /// Groups ordered by group code.
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    /// Outcomes of `group` in display order (see [`compare_outcome_codes`]).
    pub fn display_order(&self, group: &Group) -> Vec<&Outcome> {
        let mut outcomes: Vec<&Outcome> = group
            .outcomes
            .iter()
            .map(|index| &self.outcomes[*index])
            .collect();
        outcomes.sort_by(|a, b| compare_outcome_codes(&a.outcome_code, &b.outcome_code));
        outcomes
    }
}

/// Splits a header label into group and outcome codes and titles.
pub fn parse_outcome_label(label: &str) -> Result<OutcomeLabel, &'static str> {
    let (group_part, outcome_part) = label
        .split_once('>')
        .ok_or("expected '>' between group and outcome")?;

    let (group_code, group_title) =
        split_code_and_title(group_part).ok_or("expected 'code: title' for the group")?;
    let (outcome_code, outcome_title) =
        split_code_and_title(outcome_part).ok_or("expected 'code: title' for the outcome")?;

    let outcome_title = if outcome_title == RESULT_SUFFIX.trim_start() {
        String::new()
    } else {
        outcome_title
            .strip_suffix(RESULT_SUFFIX)
            .ok_or("expected label to end with ' result'")?
            .to_string()
    };

    Ok(OutcomeLabel {
        group_code,
        group_title,
        outcome_code,
        outcome_title,
    })
}

// Only the first ':' delimits the code; later pieces are titles that were
// themselves written with colons.
fn split_code_and_title(part: &str) -> Option<(String, String)> {
    let mut pieces = part.split(':').map(str::trim);
    let code = pieces.next()?.to_string();
    let rest: Vec<&str> = pieces.collect();
    if code.is_empty() || rest.is_empty() {
        return None;
    }
    Some((code, rest.join(": ")))
}

/// `(alphabetic prefix, numeric middle, suffix)` of an outcome code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeParts {
    pub prefix: String,
    pub number: Option<u64>,
    pub suffix: String,
}

static CODE_PATTERN: OnceLock<Regex> = OnceLock::new();

pub fn decompose(code: &str) -> CodeParts {
    let pattern = CODE_PATTERN.get_or_init(|| {
        Regex::new(r"^([A-Za-z]*)([0-9]*)(.*)$").expect("outcome code pattern compiles")
    });

    match pattern.captures(code) {
        Some(caps) => {
            let text = |i: usize| caps.get(i).map_or("", |m| m.as_str());
            CodeParts {
                prefix: text(1).to_string(),
                number: text(2).parse().ok(),
                suffix: text(3).to_string(),
            }
        }
        None => CodeParts {
            prefix: String::new(),
            number: None,
            suffix: code.to_string(),
        },
    }
}

/// Display order for outcome codes within a group: numeric middle, then
/// suffix. Prefix and raw code only break remaining ties.
pub fn compare_outcome_codes(a: &str, b: &str) -> Ordering {
    let left = decompose(a);
    let right = decompose(b);
    left.number
        .cmp(&right.number)
        .then_with(|| left.suffix.cmp(&right.suffix))
        .then_with(|| left.prefix.cmp(&right.prefix))
        .then_with(|| a.cmp(b))
}
