use log::debug;
use snafu::ensure;

use crate::config::RateScale;
use crate::error::*;
use crate::records::{AggregateRecord, BranchRecord, MetricSet, Table};

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum RankOrder {
    /// Highest values first.
    Top,
    /// Lowest values first.
    Bottom,
}

/// The first records of a table ordered by one metric.
///
/// Records with equal values keep their source order.
#[derive(PartialEq, Debug, Clone)]
pub struct RankedSubset<M> {
    pub order: RankOrder,
    pub records: Vec<BranchRecord<M>>,
}

impl<M> RankedSubset<M> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Aggregates of a report.
///
/// The totals cover every displayed row, the company row included once
/// `add_aggregate_totals` has run. The average is the plain mean of the
/// per-branch values: large and small branches weigh the same, and the
/// company row is never part of it.
#[derive(PartialEq, Debug, Clone)]
pub struct SummaryStats {
    pub rows: usize,
    pub total_base: u64,
    pub total_flagged: u64,
    pub average: f64,
    /// Set when the averaged column is a rate.
    pub scale: Option<RateScale>,
}

pub fn top_n<M: MetricSet>(table: &Table<M>, column: M::Column, n: usize) -> RankedSubset<M> {
    rank(table, column, n, RankOrder::Top)
}

pub fn bottom_n<M: MetricSet>(table: &Table<M>, column: M::Column, n: usize) -> RankedSubset<M> {
    rank(table, column, n, RankOrder::Bottom)
}

fn rank<M: MetricSet>(
    table: &Table<M>,
    column: M::Column,
    n: usize,
    order: RankOrder,
) -> RankedSubset<M> {
    let mut sorted: Vec<&BranchRecord<M>> = table.iter().collect();
    // `sort_by` is stable: ties stay in source order in both directions.
    match order {
        RankOrder::Top => {
            sorted.sort_by(|a, b| b.metrics.value(column).total_cmp(&a.metrics.value(column)))
        }
        RankOrder::Bottom => {
            sorted.sort_by(|a, b| a.metrics.value(column).total_cmp(&b.metrics.value(column)))
        }
    }
    let records: Vec<BranchRecord<M>> = sorted.into_iter().take(n).cloned().collect();
    debug!(
        "rank: {:?} {} of {} by {:?}",
        order,
        records.len(),
        table.len(),
        column
    );
    RankedSubset { order, records }
}

/// Sums the two count columns and averages `column` over the branch rows.
pub fn summarize<M: MetricSet>(table: &Table<M>, column: M::Column) -> PipelineResult<SummaryStats> {
    ensure!(!table.is_empty(), EmptyDatasetSnafu {});
    let total_base: u64 = table.iter().map(|r| r.metrics.base()).sum();
    let total_flagged: u64 = table.iter().map(|r| r.metrics.flagged()).sum();
    let sum: f64 = table.iter().map(|r| r.metrics.value(column)).sum();
    let average = sum / table.len() as f64;
    Ok(SummaryStats {
        rows: table.len(),
        total_base,
        total_flagged,
        average,
        scale: M::scale_of(column),
    })
}

/// Adds the counts of the company row to the totals.
///
/// `rows` and `average` stay those of the branch rows.
pub fn add_aggregate_totals<M: MetricSet>(
    stats: SummaryStats,
    aggregate: Option<&AggregateRecord<M>>,
) -> SummaryStats {
    match aggregate {
        Some(total) => {
            debug!(
                "add_aggregate_totals: {:?} adds {} / {}",
                total.branch_name,
                total.metrics.base(),
                total.metrics.flagged()
            );
            SummaryStats {
                total_base: stats.total_base + total.metrics.base(),
                total_flagged: stats.total_flagged + total.metrics.flagged(),
                ..stats
            }
        }
        None => stats,
    }
}
