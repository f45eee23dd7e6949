use log::{debug, info, warn};

use branch_metrics::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::report::config_reader::*;

pub mod config_reader;
mod display;
mod docx;
mod export;
mod io_xlsx;
mod raster;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ReportError {
    #[snafu(display("Error opening spreadsheet {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Worksheet {sheet:?} not found in {path}"))]
    MissingSheet { sheet: String, path: String },
    #[snafu(display("Worksheet {sheet:?} has no cells"))]
    EmptySheet { sheet: String },
    #[snafu(display("The report could not be produced"))]
    Pipeline { source: PipelineError },
    #[snafu(display("Error opening {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Invalid number for {key:?}"))]
    ParsingJsonNumber { key: String },
    #[snafu(display("Error writing {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Unknown dataset {name:?} (expected 'app' or 'ontime')"))]
    UnknownDataset { name: String },
    #[snafu(display("Unknown output format {name:?} (expected 'markdown', 'docx' or 'json')"))]
    UnknownFormat { name: String },
    #[snafu(display("Error reading the spreadsheet from standard input"))]
    ReadingInput { source: std::io::Error },
    #[snafu(display("No input file: use --input or set filePath in the configuration"))]
    MissingInput {},
    #[snafu(display("Difference detected between the report and the reference {path}"))]
    ReferenceMismatch { path: String },
    #[snafu(display("Error drawing the chart {title:?}"))]
    EncodingChart {
        source: image::ImageError,
        title: String,
    },
    #[snafu(display("Error packaging {part} in the Word document"))]
    WritingDocx {
        source: zip::result::ZipError,
        part: String,
    },
    #[snafu(display("Error writing {part} in the Word document"))]
    WritingDocxPart {
        source: std::io::Error,
        part: String,
    },
}

pub type ReportResult<T> = Result<T, ReportError>;

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum OutputFormat {
    Markdown,
    Docx,
    Json,
}

fn parse_format(name: &Option<String>) -> ReportResult<OutputFormat> {
    match name.as_deref() {
        None | Some("markdown") | Some("md") => Ok(OutputFormat::Markdown),
        Some("docx") | Some("word") => Ok(OutputFormat::Docx),
        Some("json") => Ok(OutputFormat::Json),
        Some(x) => UnknownFormatSnafu { name: x }.fail(),
    }
}

/// Resolves the settings of a run: built-in defaults, then the
/// configuration file, then the command line.
fn resolve_settings(
    args: &Args,
    file: &Option<DatasetFile>,
) -> ReportResult<(DatasetSettings, Option<String>)> {
    let dataset_name = args
        .dataset
        .clone()
        .or_else(|| file.as_ref().and_then(|f| f.dataset.clone()))
        .unwrap_or_else(|| "app".to_string());
    let kind = parse_dataset(&dataset_name)?;
    let mut settings = DatasetSettings::defaults(kind);
    let mut input = None;
    if let Some(f) = file {
        settings.apply_file(f)?;
        input = f.file_path.clone();
    }
    if let Some(sheet) = &args.excel_worksheet_name {
        settings.sheet_name = sheet.clone();
    }
    if let Some(header_row) = args.header_row {
        settings.header_row = header_row;
    }
    Ok((settings, input))
}

fn input_path(args: &Args, from_config: Option<String>) -> ReportResult<String> {
    if let Some(p) = &args.input {
        return Ok(p.clone());
    }
    let p = from_config.context(MissingInputSnafu {})?;
    // Relative paths in a configuration file are relative to that file.
    let root: Option<&Path> = args.config.as_deref().and_then(|c| Path::new(c).parent());
    let full: PathBuf = match root {
        Some(r) if Path::new(&p).is_relative() => r.join(&p),
        _ => PathBuf::from(&p),
    };
    Ok(full.display().to_string())
}

/// Renders the report in the requested format.
///
/// The Word document carries PNG charts, the Markdown document text charts.
fn render(report: &ReportData, format: OutputFormat) -> ReportResult<Vec<u8>> {
    match format {
        OutputFormat::Markdown => {
            export::export_markdown(report, &export::TextChartRenderer::default())
                .map(String::into_bytes)
        }
        OutputFormat::Docx => docx::export_docx(report, &raster::PngChartRenderer::default()),
        OutputFormat::Json => serde_json::to_string_pretty(&export::report_to_json(report))
            .map(String::into_bytes)
            .context(ParsingJsonSnafu {}),
    }
}

fn check_reference(report: &ReportData, reference_path: &str) -> ReportResult<()> {
    let reference: JSValue = read_summary(reference_path)?;
    let pretty_reference = serde_json::to_string_pretty(&reference).context(ParsingJsonSnafu {})?;
    let pretty_report = serde_json::to_string_pretty(&export::report_to_json(report))
        .context(ParsingJsonSnafu {})?;
    if pretty_reference != pretty_report {
        warn!("Found differences with the reference summary");
        print_diff(pretty_reference.as_str(), pretty_report.as_str(), "\n");
        return ReferenceMismatchSnafu {
            path: reference_path,
        }
        .fail();
    }
    info!("check_reference: report matches {}", reference_path);
    Ok(())
}

pub fn run_report(args: &Args) -> ReportResult<()> {
    let file: Option<DatasetFile> = match &args.config {
        Some(p) => Some(read_dataset_file(p)?),
        None => None,
    };
    let (settings, configured_input) = resolve_settings(args, &file)?;
    info!("settings: {:?}", settings);
    let format = parse_format(&args.format)?;
    let path = input_path(args, configured_input)?;

    info!("Attempting to read report file {:?}", path);
    let sheet = if path == "-" {
        let mut bytes: Vec<u8> = Vec::new();
        std::io::stdin()
            .read_to_end(&mut bytes)
            .context(ReadingInputSnafu {})?;
        io_xlsx::read_report_bytes(bytes, &settings.sheet_name, &settings.layout())?
    } else {
        io_xlsx::read_report_file(&path, &settings.sheet_name, &settings.layout())?
    };
    debug!(
        "run_report: {} branch rows, total row: {:?}",
        sheet.detail.rows.len(),
        sheet.aggregate.as_ref().map(|r| r.line)
    );

    let report = generate_report(settings.kind, settings.report_settings(), sheet)
        .context(PipelineSnafu {})?;

    // Everything is rendered before anything is written.
    let rendered = render(&report, format)?;

    match args.out.as_deref() {
        Some("stdout") => {
            let mut stdout = std::io::stdout();
            stdout
                .write_all(&rendered)
                .and_then(|_| stdout.flush())
                .context(WritingOutputSnafu { path: "stdout" })?;
        }
        Some(out_path) => {
            println!("{}", display::report_to_console(&report));
            fs::write(out_path, &rendered)
                .context(WritingOutputSnafu { path: out_path })?;
            info!("run_report: report written to {}", out_path);
        }
        None => println!("{}", display::report_to_console(&report)),
    }

    if let Some(reference_path) = &args.reference {
        check_reference(&report, reference_path)?;
    }
    Ok(())
}
