use std::marker::PhantomData;

use log::{debug, info};

use crate::assemble::assemble;
use crate::coerce::{coerce, coerce_aggregate};
use crate::config::{LoadedSheet, ReportData, ReportSettings};
use crate::error::*;
use crate::ranking::{add_aggregate_totals, bottom_n, summarize, top_n};
use crate::records::{build_aggregate, build_table, column_specs, MetricSet};

/// The entities of one uploaded sheet.
///
/// A session owns its data and is consumed by `generate`: nothing is shared
/// between two uploads.
#[derive(PartialEq, Debug, Clone)]
pub struct ReportSession<M> {
    settings: ReportSettings,
    sheet: LoadedSheet,
    _metrics: PhantomData<M>,
}

impl<M: MetricSet> ReportSession<M> {
    pub fn new(settings: ReportSettings, sheet: LoadedSheet) -> ReportSession<M> {
        ReportSession {
            settings,
            sheet,
            _metrics: PhantomData,
        }
    }

    /// Runs the whole pipeline on the sheet.
    ///
    /// Either a complete report is returned or the first error met: there is
    /// no partial report.
    pub fn generate(self) -> PipelineResult<ReportData> {
        let schema = &self.settings.schema;
        info!(
            "generate: {:?} report, {} branch rows, total row: {}",
            M::KIND,
            self.sheet.detail.rows.len(),
            self.sheet.aggregate.is_some()
        );

        let detail = coerce(&self.sheet.detail, &column_specs::<M>(schema, false))?;
        let aggregate = coerce_aggregate(
            &self.sheet.detail,
            self.sheet.aggregate.as_ref(),
            &column_specs::<M>(schema, true),
        )?;
        let table = build_table::<M>(&detail, schema)?;
        let total = build_aggregate::<M>(aggregate.as_ref(), schema)?;
        info!("generate: {} branch records", table.len());

        let rank_size = self.settings.rank_size;
        let top = top_n(&table, M::RATE_COLUMN, rank_size);
        let bottom = bottom_n(&table, M::RATE_COLUMN, rank_size);
        let stats = add_aggregate_totals(summarize(&table, M::RATE_COLUMN)?, total.as_ref());
        info!("generate: summary {:?}", stats);
        debug!(
            "generate: top {:?}",
            top.records.iter().map(|r| &r.branch_name).collect::<Vec<_>>()
        );
        debug!(
            "generate: bottom {:?}",
            bottom
                .records
                .iter()
                .map(|r| &r.branch_name)
                .collect::<Vec<_>>()
        );

        assemble(&self.settings, &table, total.as_ref(), &top, &bottom, &stats)
    }
}
