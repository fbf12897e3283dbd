use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use std::collections::HashMap;
use std::path::Path;

use crate::rank::*;

/// A row of a sheet export, addressed by column header.
///
/// Headers are trimmed and lowercased. `lineno` is the 1-based row number in
/// the sheet, the header being row 1.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SheetRow {
    pub lineno: usize,
    pub cells: HashMap<String, String>,
}

impl SheetRow {
    pub fn new(lineno: usize, header: &[String], values: &[String]) -> SheetRow {
        // Short rows are padded with empty cells.
        let cells = header
            .iter()
            .enumerate()
            .filter(|(_, h)| !h.is_empty())
            .map(|(idx, h)| (h.clone(), values.get(idx).cloned().unwrap_or_default()))
            .collect();
        SheetRow { lineno, cells }
    }

    /// The trimmed content of a cell, empty if the column or the cell is missing.
    pub fn get(&self, column: &str) -> &str {
        self.cells.get(column).map(|s| s.trim()).unwrap_or("")
    }

    /// The first non-empty cell among the given columns.
    pub fn get_any(&self, columns: &[&str]) -> &str {
        columns
            .iter()
            .map(|c| self.get(c))
            .find(|s| !s.is_empty())
            .unwrap_or("")
    }

    pub fn get_u32(&self, column: &str) -> RankResult<Option<u32>> {
        let content = self.get(column);
        if content.is_empty() {
            return Ok(None);
        }
        parse_count(content).map(Some).context(InvalidNumberSnafu {
            lineno: self.lineno,
            column,
            content,
        })
    }

    pub fn is_blank(&self) -> bool {
        self.cells.values().all(|v| v.trim().is_empty())
    }
}

pub fn normalize_header(cells: &[String]) -> Vec<String> {
    cells.iter().map(|c| c.trim().to_lowercase()).collect()
}

pub fn require_columns(header: &[String], columns: &[&str], path: &str) -> RankResult<()> {
    for column in columns.iter() {
        ensure!(
            header.iter().any(|h| h == column),
            MissingColumnSnafu {
                column: column.to_string(),
                path,
            }
        );
    }
    Ok(())
}

/// Checks that at least one of the alternative columns is present.
pub fn require_any_column(header: &[String], columns: &[&str], path: &str) -> RankResult<()> {
    ensure!(
        columns.iter().any(|c| header.iter().any(|h| h == c)),
        MissingColumnSnafu {
            column: columns.join(" or "),
            path,
        }
    );
    Ok(())
}

// Spreadsheets happily turn 7 into 7.0.
fn parse_count(s: &str) -> Option<u32> {
    if let Ok(x) = s.parse::<u32>() {
        return Some(x);
    }
    match s.parse::<f64>() {
        Ok(f) if f >= 0.0 && f.fract() == 0.0 && f <= u32::MAX as f64 => Some(f as u32),
        _ => None,
    }
}

/// Reads a timestamp written by the score form (RFC 3339), or the
/// `month/day/year hour:minute:second` rendering of a spreadsheet date cell.
pub fn parse_timestamp(content: &str, lineno: usize) -> RankResult<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(content) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        Err(rfc_err) => match NaiveDateTime::parse_from_str(content, "%m/%d/%Y %H:%M:%S") {
            Ok(ndt) => Ok(Utc.from_utc_datetime(&ndt)),
            Err(_) => Err(rfc_err).context(InvalidTimestampSnafu { lineno, content }),
        },
    }
}

// Days from 1899-12-30 to the end of 9999-12-31, the last date a spreadsheet holds.
const MAX_EXCEL_SERIAL: f64 = 2_958_466.0;

/// Converts a spreadsheet date (days since 1899-12-30) to RFC 3339.
///
/// Returns `None` for values that are not a valid spreadsheet date.
pub fn excel_serial_to_rfc3339(serial: f64) -> Option<String> {
    if !(0.0..MAX_EXCEL_SERIAL).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    let ndt = epoch.checked_add_signed(chrono::Duration::milliseconds(millis))?;
    Some(
        Utc.from_utc_datetime(&ndt)
            .to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> SheetRow {
        let header: Vec<String> = pairs.iter().map(|p| p.0.to_string()).collect();
        let values: Vec<String> = pairs.iter().map(|p| p.1.to_string()).collect();
        SheetRow::new(2, &header, &values)
    }

    #[test]
    fn cells_are_trimmed() {
        let r = row(&[("judge_name", "  Grace "), ("team_name", "")]);
        assert_eq!(r.get("judge_name"), "Grace");
        assert_eq!(r.get("team_name"), "");
        assert_eq!(r.get("missing"), "");
        assert!(!r.is_blank());
        assert!(row(&[("a", " "), ("b", "")]).is_blank());
    }

    #[test]
    fn get_any_falls_back() {
        let r = row(&[("team_voted_for", ""), ("team_name", "Rustaceans")]);
        assert_eq!(r.get_any(&["team_voted_for", "team_name"]), "Rustaceans");
    }

    #[test]
    fn numbers_from_spreadsheets() {
        let r = row(&[("a", "7"), ("b", "7.0"), ("c", ""), ("d", "seven"), ("e", "-3")]);
        assert_eq!(r.get_u32("a").unwrap(), Some(7));
        assert_eq!(r.get_u32("b").unwrap(), Some(7));
        assert_eq!(r.get_u32("c").unwrap(), None);
        assert!(matches!(
            r.get_u32("d"),
            Err(RankError::InvalidNumber { lineno: 2, .. })
        ));
        assert!(r.get_u32("e").is_err());
    }

    #[test]
    fn missing_columns_are_reported() {
        let header = normalize_header(&["Judge_Name ".to_string(), "email".to_string()]);
        assert!(require_columns(&header, &["judge_name"], "x.csv").is_ok());
        assert!(matches!(
            require_columns(&header, &["judge_name", "team_name"], "x.csv"),
            Err(RankError::MissingColumn { .. })
        ));
        assert!(require_any_column(&header, &["team_voted_for", "email"], "x.csv").is_ok());
        assert!(require_any_column(&header, &["team_voted_for", "team_name"], "x.csv").is_err());
    }

    #[test]
    fn timestamps() {
        let ts = parse_timestamp("2025-03-01T14:05:00.000Z", 2).unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2025, 3, 1, 14, 5, 0).unwrap());
        let ts = parse_timestamp("3/1/2025 14:05:00", 2).unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2025, 3, 1, 14, 5, 0).unwrap());
        assert!(matches!(
            parse_timestamp("yesterday", 9),
            Err(RankError::InvalidTimestamp { lineno: 9, .. })
        ));
    }

    #[test]
    fn excel_dates() {
        // 2025-03-01 12:00:00
        assert_eq!(
            excel_serial_to_rfc3339(45717.5),
            Some("2025-03-01T12:00:00.000Z".to_string())
        );
        assert_eq!(
            excel_serial_to_rfc3339(2_958_465.0),
            Some("9999-12-31T00:00:00.000Z".to_string())
        );
        assert_eq!(excel_serial_to_rfc3339(-1e300), None);
        assert_eq!(excel_serial_to_rfc3339(1e300), None);
        assert_eq!(excel_serial_to_rfc3339(-1.0), None);
        assert_eq!(excel_serial_to_rfc3339(f64::NAN), None);
    }
}
