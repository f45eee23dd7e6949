use clap::Parser;

/// Builds ranking and summary reports from branch performance spreadsheets.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path or '-') The Excel file (.xlsx) with the branch report, '-' to read it from the
    /// standard input. Setting this option overrides the filePath that may be specified with the
    /// --config option.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (default app) The kind of report: 'app' for the customer app adoption report, 'ontime' for the
    /// report on requests resolved within the committed time.
    #[clap(short, long, value_parser)]
    pub dataset: Option<String>,

    /// (file path, optional) A JSON file describing the report: dataset, file, worksheet, header row,
    /// column names, ranking size, title.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the report will be written to the given location.
    /// Otherwise it is only printed on the console.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (default markdown) The format of the written report: 'markdown', 'docx' (Word document with
    /// chart images) or 'json'.
    #[clap(long, value_parser)]
    pub format: Option<String>,

    /// (default Sheet1) The name of the worksheet to use.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    /// (0-based) The row of the column names. Defaults to 2 for 'app' and 3 for 'ontime'.
    #[clap(long, value_parser)]
    pub header_row: Option<usize>,

    /// (file path) A reference JSON summary. If provided, branchreport will check that the report
    /// matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
