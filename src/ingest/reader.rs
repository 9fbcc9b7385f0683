//! CSV input for the CLI and other hosts that receive raw bytes.

use std::io::Read;
use std::path::Path;

use super::FlowTable;

/// Read a CSV stream with a header row. Ragged rows are accepted here and
/// judged later by the loader.
pub fn read_table<R: Read>(reader: R) -> Result<FlowTable, csv::Error> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut table = FlowTable::new(rdr.headers()?.iter());
    for record in rdr.records() {
        let record = record?;
        // Blank lines come through as a single empty field.
        if record.len() == 1 && record.get(0).is_some_and(str::is_empty) {
            continue;
        }
        table.push_row(record.iter());
    }
    Ok(table)
}

pub fn read_table_from_path(path: &Path) -> Result<FlowTable, csv::Error> {
    let file = std::fs::File::open(path)?;
    read_table(file)
}
