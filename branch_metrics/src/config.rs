// ********* Input data structures ***********

use std::fmt::Display;

/// One cell of a spreadsheet, as read from the file and before any coercion.
#[derive(PartialEq, Debug, Clone)]
pub enum RawCell {
    Empty,
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl RawCell {
    /// Empty cells and whitespace-only strings.
    pub fn is_blank(&self) -> bool {
        match self {
            RawCell::Empty => true,
            RawCell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// The trimmed textual content of the cell, used for header names and
    /// branch names.
    pub fn to_text(&self) -> String {
        match self {
            RawCell::Empty => String::new(),
            RawCell::Text(s) => s.trim().to_string(),
            RawCell::Int(i) => i.to_string(),
            RawCell::Float(f) if f.fract() == 0.0 && f.is_finite() => format!("{:.0}", f),
            RawCell::Float(f) => f.to_string(),
            RawCell::Bool(b) => b.to_string(),
        }
    }
}

impl Display for RawCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawCell::Empty => write!(f, "<empty>"),
            RawCell::Text(s) => write!(f, "{:?}", s),
            other => write!(f, "{}", other.to_text()),
        }
    }
}

/// A data row of the sheet.
///
/// `line` is the 1-based row number in the spreadsheet, so that errors can
/// point the user at the row to fix.
#[derive(PartialEq, Debug, Clone)]
pub struct RawRow {
    pub line: usize,
    pub branch_name: String,
    pub cells: Vec<RawCell>,
}

impl RawRow {
    pub fn cell(&self, idx: usize) -> &RawCell {
        self.cells.get(idx).unwrap_or(&RawCell::Empty)
    }
}

/// Rows of a sheet below its header, in source order.
#[derive(PartialEq, Debug, Clone)]
pub struct RawTable {
    /// 1-based row number of the header in the sheet.
    pub header_line: usize,
    pub columns: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// The result of reading a report sheet: the per-branch rows and the
/// company-wide row, if the sheet has one.
#[derive(PartialEq, Debug, Clone)]
pub struct LoadedSheet {
    pub detail: RawTable,
    pub aggregate: Option<RawRow>,
}

/// Where the data lives inside a sheet.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SheetLayout {
    /// 0-based index of the header row in the sheet.
    pub header_row: usize,
    pub branch_column: String,
    pub required_columns: Vec<String>,
    /// Rows whose branch name contains this keyword are company totals.
    pub aggregate_marker: String,
}

// ********* Configuration **********

/// The scale in which a rate column is stored.
///
/// The two reports do not agree: the adoption rate is a fraction in [0, 1]
/// while the late rate is already a percentage in [0, 100]. Values keep their
/// source scale through the whole pipeline and only the presentation layer
/// converts them.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum RateScale {
    Fraction,
    Percent,
}

impl RateScale {
    pub fn to_percent(self, value: f64) -> f64 {
        match self {
            RateScale::Fraction => value * 100.0,
            RateScale::Percent => value,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum DatasetKind {
    AppAdoption,
    OnTime,
}

/// Names of the five columns every branch report carries.
///
/// `base` is the denominator count (managed customers, forwarded requests),
/// `flagged` the numerator count (adopted customers, late requests).
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct DatasetSchema {
    pub sequence: String,
    pub branch: String,
    pub base: String,
    pub flagged: String,
    pub rate: String,
}

impl DatasetSchema {
    pub fn app_adoption() -> DatasetSchema {
        DatasetSchema {
            sequence: "STT".to_string(),
            branch: "Điện lực".to_string(),
            base: "Số lượng KH quản lý".to_string(),
            flagged: "Số lượng đã thực hiện App".to_string(),
            rate: "Tỷ lệ thực hiện qua App".to_string(),
        }
    }

    pub fn on_time() -> DatasetSchema {
        DatasetSchema {
            sequence: "STT".to_string(),
            branch: "Điện lực".to_string(),
            base: "Số yêu cầu chuyển xử lý".to_string(),
            flagged: "Số lượng phiếu giải quyết trễ hạn".to_string(),
            rate: "Tỷ lệ trễ hạn".to_string(),
        }
    }

    pub fn column_names(&self) -> Vec<String> {
        vec![
            self.sequence.clone(),
            self.branch.clone(),
            self.base.clone(),
            self.flagged.clone(),
            self.rate.clone(),
        ]
    }

    /// The layout of a sheet that carries this schema.
    pub fn layout(&self, header_row: usize, aggregate_marker: &str) -> SheetLayout {
        SheetLayout {
            header_row,
            branch_column: self.branch.clone(),
            required_columns: self.column_names(),
            aggregate_marker: aggregate_marker.to_string(),
        }
    }
}

/// Everything a report session needs besides the sheet itself.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ReportSettings {
    pub schema: DatasetSchema,
    /// Size of the top and bottom rankings.
    pub rank_size: usize,
    /// Overrides the default report title.
    pub title: Option<String>,
}

// ******** Output data structures *********

/// A value selected for display. Numbers keep their type so that each
/// consumer can apply its own formatting.
#[derive(PartialEq, Debug, Clone)]
pub enum FieldValue {
    Blank,
    Text(String),
    Int(i64),
    Count(u64),
    Rate { value: f64, scale: RateScale },
}

/// A table as handed to the display and export collaborators.
#[derive(PartialEq, Debug, Clone)]
pub struct ReportView {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<FieldValue>>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct Bar {
    pub label: String,
    /// Already in percentage scale.
    pub value: f64,
    pub value_label: String,
}

/// What a chart renderer needs to draw a labeled bar chart.
#[derive(PartialEq, Debug, Clone)]
pub struct BarChart {
    pub title: String,
    pub y_label: String,
    pub color: String,
    pub bars: Vec<Bar>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct SummaryView {
    pub total_base_label: String,
    pub total_base: u64,
    pub total_flagged_label: String,
    pub total_flagged: u64,
    pub average_label: String,
    pub average_rate: f64,
    pub scale: RateScale,
    /// The narrative paragraphs, in display order.
    pub lines: Vec<String>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct RankedView {
    pub view: ReportView,
    pub narrative: String,
    pub chart: BarChart,
}

/// The read-only bundle consumed by rendering and export.
#[derive(PartialEq, Debug, Clone)]
pub struct ReportData {
    pub kind: DatasetKind,
    pub title: String,
    pub full_table: ReportView,
    pub summary: SummaryView,
    pub top: RankedView,
    pub bottom: RankedView,
}
