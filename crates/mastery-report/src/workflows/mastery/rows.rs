use std::io::Read;

/// One already-split input row.
pub type Row = Vec<String>;

pub(crate) const COMMA: u8 = b',';
pub(crate) const TAB: u8 = b'\t';

/// Tokenizes a delimited export into rows of owned fields. Rows may differ in
/// length; shape checks belong to the individual parsers.
pub(crate) fn read_rows<R: Read>(reader: R, delimiter: u8) -> Result<Vec<Row>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(reader);
    let mut rows = Vec::new();

    for record in csv_reader.records() {
        let record = record?;
        let mut row: Row = record.iter().map(str::to_string).collect();
        if rows.is_empty() {
            if let Some(first) = row.first_mut() {
                *first = strip_invisible(first);
            }
        }
        rows.push(row);
    }

    Ok(rows)
}

pub(crate) fn is_blank(row: &[String]) -> bool {
    row.iter().all(|field| field.trim().is_empty())
}

fn strip_invisible(value: &str) -> String {
    value.replace(['\u{feff}', '\u{200b}'], "")
}
