use calamine::DataType;
use std::io::{Cursor, Read, Seek};

use crate::report::*;
use calamine::{open_workbook, Reader, Xlsx};

use branch_metrics::loader::split_rows;

/// Reads a report sheet from a file.
pub fn read_report_file(path: &str, sheet: &str, layout: &SheetLayout) -> ReportResult<LoadedSheet> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    read_workbook(&mut workbook, path, sheet, layout)
}

/// Reads a report sheet from the content of an uploaded file.
pub fn read_report_bytes(
    bytes: Vec<u8>,
    sheet: &str,
    layout: &SheetLayout,
) -> ReportResult<LoadedSheet> {
    let source = "<upload>";
    let mut workbook: Xlsx<_> =
        Xlsx::new(Cursor::new(bytes)).context(OpeningExcelSnafu { path: source })?;
    read_workbook(&mut workbook, source, sheet, layout)
}

fn read_workbook<RS: Read + Seek>(
    workbook: &mut Xlsx<RS>,
    source: &str,
    sheet: &str,
    layout: &SheetLayout,
) -> ReportResult<LoadedSheet> {
    debug!("read_workbook: {:?} worksheet: {:?}", source, sheet);
    let wrange = workbook
        .worksheet_range(sheet)
        .context(MissingSheetSnafu {
            sheet,
            path: source,
        })?
        .context(OpeningExcelSnafu { path: source })?;
    // The range only covers the used cells: it may not start at the first
    // row of the sheet.
    let (first_row, first_col) = wrange.start().context(EmptySheetSnafu { sheet })?;
    debug!(
        "read_workbook: range starts at row {} column {}",
        first_row, first_col
    );

    let rows: Vec<Vec<RawCell>> = wrange
        .rows()
        .map(|row| row.iter().map(read_cell).collect())
        .collect();
    let loaded = split_rows(&rows, first_row as usize, layout).context(PipelineSnafu {})?;
    info!(
        "read_workbook: {:?}: {} branch rows, total row: {}",
        source,
        loaded.detail.rows.len(),
        loaded.aggregate.is_some()
    );
    Ok(loaded)
}

fn read_cell(cell: &DataType) -> RawCell {
    match cell {
        DataType::Empty => RawCell::Empty,
        DataType::Int(i) => RawCell::Int(*i),
        DataType::Float(f) => RawCell::Float(*f),
        DataType::String(s) => RawCell::Text(s.clone()),
        DataType::Bool(b) => RawCell::Bool(*b),
        // Dates are not expected in these reports: keep the serial number.
        DataType::DateTime(f) => RawCell::Float(*f),
        // Error cells end up as text that no number column accepts.
        other => RawCell::Text(format!("{:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::{Workbook, XlsxError};

    fn app_layout() -> SheetLayout {
        DatasetSchema::app_adoption().layout(2, loader::DEFAULT_AGGREGATE_MARKER)
    }

    // Title on the first row, header on the third.
    fn app_workbook(with_title: bool) -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Sheet1")?;
        if with_title {
            sheet.write_string(0, 0, "BÁO CÁO KẾT QUẢ THỰC HIỆN QUA APP CSKH")?;
        }
        for (col, name) in DatasetSchema::app_adoption()
            .column_names()
            .iter()
            .enumerate()
        {
            sheet.write_string(2, col as u16, format!(" {} ", name))?;
        }
        let rows = [
            (1.0, "Hải Châu", 1000.0, 100.0, 0.1),
            (2.0, "Thanh Khê", 2000.0, 1100.0, 0.55),
        ];
        for (idx, (stt, name, managed, adopted, rate)) in rows.iter().enumerate() {
            let row = 3 + idx as u32;
            sheet.write_number(row, 0, *stt)?;
            sheet.write_string(row, 1, *name)?;
            sheet.write_number(row, 2, *managed)?;
            sheet.write_number(row, 3, *adopted)?;
            sheet.write_number(row, 4, *rate)?;
        }
        // A row without a branch name, then the company total.
        sheet.write_number(5, 0, 3.0)?;
        sheet.write_string(6, 1, "CÔNG TY ĐIỆN LỰC ĐÀ NẴNG")?;
        sheet.write_number(6, 2, 3000.0)?;
        sheet.write_number(6, 3, 1200.0)?;
        sheet.write_number(6, 4, 0.4)?;
        workbook.save_to_buffer()
    }

    #[test]
    fn reads_header_rows_and_total() {
        let bytes = app_workbook(true).unwrap();
        let loaded = read_report_bytes(bytes, "Sheet1", &app_layout()).unwrap();
        assert_eq!(loaded.detail.header_line, 3);
        assert_eq!(loaded.detail.columns, DatasetSchema::app_adoption().column_names());
        let names: Vec<&str> = loaded
            .detail
            .rows
            .iter()
            .map(|r| r.branch_name.as_str())
            .collect();
        assert_eq!(names, vec!["Hải Châu", "Thanh Khê"]);
        assert_eq!(loaded.detail.rows[1].line, 5);
        let total = loaded.aggregate.unwrap();
        assert_eq!(total.line, 7);
        assert_eq!(total.cells[0], RawCell::Empty);
    }

    #[test]
    fn header_row_is_absolute() {
        // Without the title the used range starts on the header row.
        let bytes = app_workbook(false).unwrap();
        let loaded = read_report_bytes(bytes, "Sheet1", &app_layout()).unwrap();
        assert_eq!(loaded.detail.rows.len(), 2);
        assert_eq!(loaded.detail.rows[0].line, 4);
    }

    #[test]
    fn missing_sheet() {
        let bytes = app_workbook(true).unwrap();
        let err = read_report_bytes(bytes, "Sheet2", &app_layout()).unwrap_err();
        assert!(matches!(err, ReportError::MissingSheet { ref sheet, .. } if sheet == "Sheet2"));
    }

    #[test]
    fn missing_column() {
        let bytes = app_workbook(true).unwrap();
        let layout = DatasetSchema::on_time().layout(2, loader::DEFAULT_AGGREGATE_MARKER);
        let err = read_report_bytes(bytes, "Sheet1", &layout).unwrap_err();
        assert!(matches!(
            err,
            ReportError::Pipeline {
                source: PipelineError::Schema { line: 3, .. }
            }
        ));
    }

    #[test]
    fn reads_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.xlsx");
        std::fs::write(&path, app_workbook(true).unwrap()).unwrap();
        let loaded =
            read_report_file(path.to_str().unwrap(), "Sheet1", &app_layout()).unwrap();
        assert_eq!(loaded.detail.rows[0].cells[2], RawCell::Float(1000.0));
    }

    #[test]
    fn not_a_spreadsheet() {
        let err = read_report_bytes("STT,Điện lực".as_bytes().to_vec(), "Sheet1", &app_layout()).unwrap_err();
        assert!(matches!(err, ReportError::OpeningExcel { .. }));
    }
}
