//! Ranking and summary pipeline for branch performance reports.
//!
//! A report sheet lists the branches of a utility company with two counts
//! and a rate each, followed by a company-wide total row. The pipeline
//! splits the rows of the sheet, converts the cells to typed records, ranks
//! the branches and assembles everything a report needs.
//!
//! The crate does no I/O: reading the spreadsheet and writing the document
//! are left to the caller.

mod config;
mod error;

pub mod assemble;
pub mod builder;
pub mod coerce;
pub mod format;
pub mod loader;
pub mod ranking;
pub mod records;
pub mod session;

use log::info;

pub use crate::config::*;
pub use crate::error::PipelineError;
pub use crate::error::PipelineResult;
pub use crate::session::ReportSession;

use crate::records::{AppAdoption, OnTime};

/// Generates the report of a sheet already split into rows.
///
/// The metric set is picked from the kind of dataset.
pub fn generate_report(
    kind: DatasetKind,
    settings: ReportSettings,
    sheet: LoadedSheet,
) -> PipelineResult<ReportData> {
    info!(
        "generate_report: {:?}, settings: {:?}",
        kind, settings
    );
    match kind {
        DatasetKind::AppAdoption => ReportSession::<AppAdoption>::new(settings, sheet).generate(),
        DatasetKind::OnTime => ReportSession::<OnTime>::new(settings, sheet).generate(),
    }
}
