use super::rows::{is_blank, Row};
use super::student::StudentRecord;

const NAME_COLUMN: usize = 0;
const ID_COLUMN: usize = 1;
const EMAIL_COLUMN: usize = 3;
const SECTION_COLUMN: usize = 4;

/// Reads student identity and contact rows from a gradebook export. The first
/// row is the header; `skip_rows` further rows (points-possible lines and the
/// like) are dropped before students start.
pub fn parse_roster(rows: &[Row], skip_rows: usize) -> Vec<StudentRecord> {
    rows.iter()
        .skip(1 + skip_rows)
        .enumerate()
        .filter(|(_, row)| !is_blank(row))
        .map(|(position, row)| roster_record(position, row))
        .collect()
}

fn roster_record(position: usize, row: &[String]) -> StudentRecord {
    let field = |index: usize| {
        row.get(index)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    };

    let id = field(ID_COLUMN)
        .map(str::to_string)
        .unwrap_or_else(|| format!("roster-{position}"));
    let mut record = StudentRecord::new(id, field(NAME_COLUMN).unwrap_or(""));
    record.email_local_part = field(EMAIL_COLUMN).map(str::to_string);
    record.section = field(SECTION_COLUMN).map(str::to_string);
    record
}
