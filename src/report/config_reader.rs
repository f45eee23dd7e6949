use crate::report::*;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

/// Sheet used when nothing else is configured.
pub const DEFAULT_SHEET_NAME: &str = "Sheet1";

pub const DEFAULT_RANK_SIZE: usize = 3;

/// Column names, each one overriding the built-in name of the dataset.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct ColumnNames {
    pub sequence: Option<String>,
    pub branch: Option<String>,
    pub base: Option<String>,
    pub flagged: Option<String>,
    pub rate: Option<String>,
}

/// The JSON description of a report run. Every field is optional.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct DatasetFile {
    pub dataset: Option<String>,
    #[serde(rename = "filePath")]
    pub file_path: Option<String>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    /// 0-based, as a number or a string.
    #[serde(rename = "headerRow")]
    pub header_row: Option<JSValue>,
    #[serde(rename = "aggregateMarker")]
    pub aggregate_marker: Option<String>,
    #[serde(rename = "rankSize")]
    pub rank_size: Option<JSValue>,
    pub title: Option<String>,
    pub columns: Option<ColumnNames>,
}

/// The settings of one report run, once defaults and overrides are merged.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct DatasetSettings {
    pub kind: DatasetKind,
    pub sheet_name: String,
    /// 0-based index of the header row in the sheet.
    pub header_row: usize,
    pub aggregate_marker: String,
    pub rank_size: usize,
    pub title: Option<String>,
    pub schema: DatasetSchema,
}

impl DatasetSettings {
    pub fn defaults(kind: DatasetKind) -> DatasetSettings {
        let (header_row, schema) = match kind {
            DatasetKind::AppAdoption => (2, DatasetSchema::app_adoption()),
            DatasetKind::OnTime => (3, DatasetSchema::on_time()),
        };
        DatasetSettings {
            kind,
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            header_row,
            aggregate_marker: loader::DEFAULT_AGGREGATE_MARKER.to_string(),
            rank_size: DEFAULT_RANK_SIZE,
            title: None,
            schema,
        }
    }

    pub fn apply_file(&mut self, file: &DatasetFile) -> ReportResult<()> {
        if let Some(sheet) = &file.excel_worksheet_name {
            self.sheet_name = sheet.clone();
        }
        if let Some(header_row) = read_js_int(&file.header_row, "headerRow")? {
            self.header_row = header_row;
        }
        if let Some(marker) = &file.aggregate_marker {
            self.aggregate_marker = marker.clone();
        }
        if let Some(rank_size) = read_js_int(&file.rank_size, "rankSize")? {
            // An empty ranking is not a report.
            ensure!(rank_size >= 1, ParsingJsonNumberSnafu { key: "rankSize" });
            self.rank_size = rank_size;
        }
        if file.title.is_some() {
            self.title = file.title.clone();
        }
        if let Some(columns) = &file.columns {
            let schema = &mut self.schema;
            for (name, target) in [
                (&columns.sequence, &mut schema.sequence),
                (&columns.branch, &mut schema.branch),
                (&columns.base, &mut schema.base),
                (&columns.flagged, &mut schema.flagged),
                (&columns.rate, &mut schema.rate),
            ] {
                if let Some(n) = name {
                    *target = n.trim().to_string();
                }
            }
        }
        Ok(())
    }

    pub fn layout(&self) -> SheetLayout {
        self.schema.layout(self.header_row, &self.aggregate_marker)
    }

    pub fn report_settings(&self) -> ReportSettings {
        ReportSettings {
            schema: self.schema.clone(),
            rank_size: self.rank_size,
            title: self.title.clone(),
        }
    }
}

pub fn parse_dataset(name: &str) -> ReportResult<DatasetKind> {
    match name.trim().to_lowercase().as_str() {
        "app" => Ok(DatasetKind::AppAdoption),
        "ontime" | "on-time" => Ok(DatasetKind::OnTime),
        _ => UnknownDatasetSnafu { name }.fail(),
    }
}

pub fn read_dataset_file(path: &str) -> ReportResult<DatasetFile> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let file: DatasetFile = serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
    debug!("read_dataset_file: {:?}", file);
    Ok(file)
}

/// Reads a reference summary.
pub fn read_summary(path: &str) -> ReportResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

fn read_js_int(x: &Option<JSValue>, key: &str) -> ReportResult<Option<usize>> {
    match x {
        None | Some(JSValue::Null) => Ok(None),
        Some(JSValue::Number(n)) => n
            .as_u64()
            .map(|x| Some(x as usize))
            .context(ParsingJsonNumberSnafu { key }),
        Some(JSValue::String(s)) => s
            .trim()
            .parse::<usize>()
            .ok()
            .map(Some)
            .context(ParsingJsonNumberSnafu { key }),
        _ => ParsingJsonNumberSnafu { key }.fail(),
    }
}
