use calamine::{open_workbook, DataType, Reader, Xlsx};

use crate::rank::{
    io_common::{excel_serial_to_rfc3339, normalize_header, SheetRow},
    *,
};

/// Reads one worksheet of a workbook downloaded from the event spreadsheet.
pub fn read_xlsx_sheet(path: &str, worksheet_name: &str) -> RankResult<Vec<SheetRow>> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    let wrange = workbook
        .worksheet_range(worksheet_name)
        .context(MissingWorksheetSnafu {
            name: worksheet_name,
            path,
        })?
        .context(OpeningExcelSnafu { path })?;

    // Rows above the first non-empty cell are not part of the range.
    let first_row = wrange.start().map(|(r, _)| r as usize).unwrap_or(0);

    let mut iter = wrange.rows();
    let header_cells = iter.next().context(EmptySheetSnafu { path })?;
    let header: Vec<String> = normalize_header(&read_cells(header_cells, first_row + 1)?);
    debug!("read_xlsx_sheet: {}: header: {:?}", worksheet_name, header);

    let mut res: Vec<SheetRow> = Vec::new();
    for (idx, row) in iter.enumerate() {
        let lineno = first_row + idx + 2;
        let values = read_cells(row, lineno)?;
        let sheet_row = SheetRow::new(lineno, &header, &values);
        if sheet_row.is_blank() {
            continue;
        }
        res.push(sheet_row);
    }
    info!("Read {} rows from {} [{}]", res.len(), path, worksheet_name);
    Ok(res)
}

fn read_cells(row: &[DataType], lineno: usize) -> RankResult<Vec<String>> {
    row.iter().map(|cell| read_cell(cell, lineno)).collect()
}

fn read_cell(cell: &DataType, lineno: usize) -> RankResult<String> {
    match cell {
        DataType::String(s) => Ok(s.clone()),
        DataType::Int(i) => Ok(i.to_string()),
        DataType::Float(f) if f.fract() == 0.0 => Ok(format!("{}", *f as i64)),
        DataType::Float(f) => Ok(f.to_string()),
        DataType::Bool(b) => Ok(b.to_string()),
        DataType::DateTime(serial) => excel_serial_to_rfc3339(*serial)
            .context(ExcelWrongCellTypeSnafu {
                lineno,
                content: format!("{:?}", cell),
            }),
        DataType::Empty => Ok("".to_string()),
        _ => ExcelWrongCellTypeSnafu {
            lineno,
            content: format!("{:?}", cell),
        }
        .fail(),
    }
}
