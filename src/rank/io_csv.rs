// Primitives for reading CSV exports of the event sheets.

use std::io;

use crate::rank::{
    io_common::{normalize_header, SheetRow},
    *,
};

pub fn read_csv_sheet(path: &str) -> RankResult<Vec<SheetRow>> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(OpeningCsvSnafu { path })?;
    read_csv_records(rdr, path)
}

#[cfg(test)]
fn read_csv_from<R: io::Read>(reader: R, name: &str) -> RankResult<Vec<SheetRow>> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    read_csv_records(rdr, name)
}

fn read_csv_records<R: io::Read>(rdr: csv::Reader<R>, name: &str) -> RankResult<Vec<SheetRow>> {
    let mut records = rdr.into_records();
    let header: Vec<String> = match records.next() {
        Some(line_r) => {
            let line = line_r.context(CsvLineParseSnafu { lineno: 1usize })?;
            let cells: Vec<String> = line.iter().map(|s| s.to_string()).collect();
            normalize_header(&cells)
        }
        None => return EmptySheetSnafu { path: name }.fail(),
    };
    debug!("read_csv_records: {}: header: {:?}", name, header);

    let mut res: Vec<SheetRow> = Vec::new();
    // The header is line 1. Empty lines are dropped by the reader.
    for (idx, line_r) in records.enumerate() {
        let line = line_r.context(CsvLineParseSnafu { lineno: idx + 2 })?;
        let lineno = line
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(idx + 2);
        let values: Vec<String> = line.iter().map(|s| s.to_string()).collect();
        let row = SheetRow::new(lineno, &header, &values);
        if row.is_blank() {
            debug!("read_csv_records: {}: skipping blank line {}", name, lineno);
            continue;
        }
        res.push(row);
    }
    info!("Read {} rows from {}", res.len(), name);
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_keyed_by_header() {
        let data = "Judge_Name,team_name,total\nGrace,Rustaceans,31\n,,\nAda,Gophers,22,extra\n";
        let rows = read_csv_from(data.as_bytes(), "scores.csv").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].lineno, 2);
        assert_eq!(rows[0].get("judge_name"), "Grace");
        assert_eq!(rows[0].get_u32("total").unwrap(), Some(31));
        // The line 3 without content is skipped but still counted.
        assert_eq!(rows[1].lineno, 4);
        assert_eq!(rows[1].get("team_name"), "Gophers");
    }

    #[test]
    fn short_rows_are_accepted() {
        let data = "email,team_voted_for\nada@example.com\n";
        let rows = read_csv_from(data.as_bytes(), "votes.csv").unwrap();
        assert_eq!(rows[0].get("team_voted_for"), "");
    }

    #[test]
    fn empty_file_is_an_error() {
        assert!(matches!(
            read_csv_from("".as_bytes(), "votes.csv"),
            Err(RankError::EmptySheet { .. })
        ));
    }
}
