use log::{debug, warn};
use snafu::OptionExt;
use unicode_normalization::UnicodeNormalization;

use crate::config::{LoadedSheet, RawCell, RawRow, RawTable, SheetLayout};
use crate::error::*;

/// Keyword that marks the company-wide total row in the branch column.
pub const DEFAULT_AGGREGATE_MARKER: &str = "công ty";

/// Tells if a branch name designates the company-wide total row.
///
/// The reports have no flag for this row: it is recognized by a keyword in
/// its name, case-insensitively and whatever the Unicode normal form of the
/// two strings. A real branch whose name contains the keyword would be
/// misclassified.
pub fn is_aggregate_row(branch_name: &str, marker: &str) -> bool {
    let marker = fold(marker);
    if marker.is_empty() {
        return false;
    }
    fold(branch_name).contains(&marker)
}

fn fold(s: &str) -> String {
    s.trim().nfc().collect::<String>().to_lowercase()
}

// Header cells are kept in composed form, the form of the built-in column names.
fn header_text(cell: &RawCell) -> String {
    cell.to_text().nfc().collect()
}

/// Splits the rows of a sheet into branch rows and the company total row.
///
/// `rows` are the rows of the used range of the sheet and `first_row` the
/// 0-based sheet index of `rows[0]`. The header is looked up at the absolute
/// index `layout.header_row`, and everything below it is data. Rows without
/// a branch name are dropped.
pub fn split_rows(
    rows: &[Vec<RawCell>],
    first_row: usize,
    layout: &SheetLayout,
) -> PipelineResult<LoadedSheet> {
    let header_line = layout.header_row + 1;
    let header_idx = layout
        .header_row
        .checked_sub(first_row)
        .filter(|idx| *idx < rows.len())
        .context(SchemaSnafu {
            column: layout.branch_column.clone(),
            line: header_line,
        })?;
    let header = &rows[header_idx];
    let columns: Vec<String> = header.iter().map(header_text).collect();
    debug!("split_rows: header at line {}: {:?}", header_line, columns);

    for required in layout.required_columns.iter() {
        if !columns.iter().any(|c| c == required) {
            return SchemaSnafu {
                column: required.clone(),
                line: header_line,
            }
            .fail();
        }
    }
    let branch_idx = columns
        .iter()
        .position(|c| *c == layout.branch_column)
        .context(SchemaSnafu {
            column: layout.branch_column.clone(),
            line: header_line,
        })?;

    let mut detail: Vec<RawRow> = Vec::new();
    let mut aggregate: Option<RawRow> = None;
    for (offset, cells) in rows.iter().enumerate().skip(header_idx + 1) {
        let line = first_row + offset + 1;
        let name_cell = cells.get(branch_idx).unwrap_or(&RawCell::Empty);
        if name_cell.is_blank() {
            debug!("split_rows: line {}: no branch name, skipping", line);
            continue;
        }
        let row = RawRow {
            line,
            branch_name: name_cell.to_text(),
            cells: cells.clone(),
        };
        if is_aggregate_row(&row.branch_name, &layout.aggregate_marker) {
            if let Some(first) = &aggregate {
                warn!(
                    "split_rows: line {}: second total row {:?} ignored, keeping {:?} (line {})",
                    line, row.branch_name, first.branch_name, first.line
                );
            } else {
                debug!("split_rows: line {}: total row {:?}", line, row.branch_name);
                aggregate = Some(row);
            }
        } else {
            detail.push(row);
        }
    }

    debug!(
        "split_rows: {} branch rows, total row: {}",
        detail.len(),
        aggregate.is_some()
    );
    Ok(LoadedSheet {
        detail: RawTable {
            header_line,
            columns,
            rows: detail,
        },
        aggregate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> RawCell {
        RawCell::Text(s.to_string())
    }

    fn layout(header_row: usize) -> SheetLayout {
        SheetLayout {
            header_row,
            branch_column: "Điện lực".to_string(),
            required_columns: vec!["STT".to_string(), "Điện lực".to_string()],
            aggregate_marker: DEFAULT_AGGREGATE_MARKER.to_string(),
        }
    }

    fn sheet() -> Vec<Vec<RawCell>> {
        vec![
            vec![text("BÁO CÁO"), RawCell::Empty],
            vec![RawCell::Empty, RawCell::Empty],
            vec![text(" STT "), text("Điện lực  ")],
            vec![RawCell::Int(1), text(" Điện lực Hải Châu ")],
            vec![RawCell::Empty, RawCell::Empty],
            vec![RawCell::Int(2), text("   ")],
            vec![RawCell::Float(3.0), text("Điện lực Sơn Trà")],
            vec![RawCell::Empty, text("CÔNG TY Điện lực Đà Nẵng")],
        ]
    }

    #[test]
    fn aggregate_marker_is_case_insensitive() {
        assert!(is_aggregate_row("Công ty Điện lực ABC", "công ty"));
        assert!(is_aggregate_row("  CÔNG TY ĐIỆN LỰC ABC ", "công ty"));
        assert!(!is_aggregate_row("Điện lực Hải Châu", "công ty"));
        assert!(!is_aggregate_row("Công ty", ""));
    }

    #[test]
    fn aggregate_marker_ignores_normal_form() {
        // "Công ty" with a combining circumflex and a combining horn.
        let decomposed = "Co\u{302}ng ty \u{110}ie\u{323}\u{302}n lu\u{31b}\u{323}c";
        assert!(is_aggregate_row(decomposed, "công ty"));
        assert!(is_aggregate_row("Công ty Điện lực", "Co\u{302}ng ty"));
        assert!(!is_aggregate_row("Cong ty", "công ty"));
    }

    #[test]
    fn decomposed_header_is_found() {
        let mut rows = sheet();
        rows[2] = vec![text("STT"), text("\u{110}ie\u{323}\u{302}n lu\u{31b}\u{323}c")];
        let res = split_rows(&rows, 0, &layout(2)).unwrap();
        assert_eq!(res.detail.columns[1], "Điện lực");
        assert_eq!(res.detail.rows.len(), 2);
    }

    #[test]
    fn splits_detail_and_aggregate_rows() {
        let res = split_rows(&sheet(), 0, &layout(2)).unwrap();
        assert_eq!(res.detail.columns, vec!["STT", "Điện lực"]);
        let names: Vec<&str> = res
            .detail
            .rows
            .iter()
            .map(|r| r.branch_name.as_str())
            .collect();
        assert_eq!(names, vec!["Điện lực Hải Châu", "Điện lực Sơn Trà"]);
        assert_eq!(res.detail.rows[0].line, 4);
        assert_eq!(res.detail.rows[1].line, 7);
        let total = res.aggregate.unwrap();
        assert_eq!(total.branch_name, "CÔNG TY Điện lực Đà Nẵng");
        assert_eq!(total.line, 8);
    }

    #[test]
    fn header_offset_is_absolute() {
        // The used range starts at the third sheet row.
        let rows: Vec<Vec<RawCell>> = sheet().into_iter().skip(2).collect();
        let res = split_rows(&rows, 2, &layout(2)).unwrap();
        assert_eq!(res.detail.rows.len(), 2);
        assert_eq!(res.detail.rows[0].line, 4);
    }

    #[test]
    fn missing_required_column() {
        let mut l = layout(2);
        l.required_columns.push("Tỷ lệ trễ hạn".to_string());
        let err = split_rows(&sheet(), 0, &l).unwrap_err();
        assert!(matches!(err, PipelineError::Schema { ref column, line: 3 } if column == "Tỷ lệ trễ hạn"));
    }

    #[test]
    fn header_beyond_sheet() {
        let err = split_rows(&sheet(), 0, &layout(20)).unwrap_err();
        assert!(matches!(err, PipelineError::Schema { .. }));
        let err = split_rows(&sheet(), 5, &layout(2)).unwrap_err();
        assert!(matches!(err, PipelineError::Schema { .. }));
    }

    #[test]
    fn keeps_first_aggregate_row_only() {
        let mut rows = sheet();
        rows.push(vec![RawCell::Empty, text("Công ty (lũy kế)")]);
        let res = split_rows(&rows, 0, &layout(2)).unwrap();
        assert_eq!(
            res.aggregate.map(|r| r.branch_name),
            Some("CÔNG TY Điện lực Đà Nẵng".to_string())
        );
        assert_eq!(res.detail.rows.len(), 2);
    }
}
