use std::fmt::Debug;

use snafu::OptionExt;

use crate::coerce::{CoercedRow, CoercedTable, CoercionTarget, ColumnSpec, Value};
use crate::config::{DatasetKind, DatasetSchema, FieldValue, RateScale};
use crate::error::*;

/// The metrics carried by one kind of branch report.
///
/// Every report has a denominator count (`base`), a numerator count
/// (`flagged`) and a rate, but the rate is not stored in the same scale in
/// the two reports.
pub trait MetricSet: Clone + Debug + PartialEq {
    /// The numeric columns a table can be ranked by.
    type Column: Copy + Eq + Debug;

    const KIND: DatasetKind;
    const SCALE: RateScale;
    const RATE_TARGET: CoercionTarget;
    const RATE_COLUMN: Self::Column;

    fn default_schema() -> DatasetSchema;

    fn from_counts(base: u64, flagged: u64, rate: f64) -> Self;

    fn base(&self) -> u64;

    fn flagged(&self) -> u64;

    fn rate(&self) -> f64;

    fn value(&self, column: Self::Column) -> f64;

    /// The scale of a column if it holds a rate.
    fn scale_of(column: Self::Column) -> Option<RateScale>;
}

/// Customer self-service application adoption.
#[derive(PartialEq, Debug, Clone)]
pub struct AppAdoption {
    pub managed_customers: u64,
    pub app_adopted_customers: u64,
    /// Fraction in [0, 1].
    pub adoption_rate: f64,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum AppColumn {
    ManagedCustomers,
    AppAdoptedCustomers,
    AdoptionRate,
}

impl MetricSet for AppAdoption {
    type Column = AppColumn;

    const KIND: DatasetKind = DatasetKind::AppAdoption;
    const SCALE: RateScale = RateScale::Fraction;
    const RATE_TARGET: CoercionTarget = CoercionTarget::FractionFloat;
    const RATE_COLUMN: AppColumn = AppColumn::AdoptionRate;

    fn default_schema() -> DatasetSchema {
        DatasetSchema::app_adoption()
    }

    fn from_counts(base: u64, flagged: u64, rate: f64) -> Self {
        AppAdoption {
            managed_customers: base,
            app_adopted_customers: flagged,
            adoption_rate: rate,
        }
    }

    fn base(&self) -> u64 {
        self.managed_customers
    }

    fn flagged(&self) -> u64 {
        self.app_adopted_customers
    }

    fn rate(&self) -> f64 {
        self.adoption_rate
    }

    fn value(&self, column: AppColumn) -> f64 {
        match column {
            AppColumn::ManagedCustomers => self.managed_customers as f64,
            AppColumn::AppAdoptedCustomers => self.app_adopted_customers as f64,
            AppColumn::AdoptionRate => self.adoption_rate,
        }
    }

    fn scale_of(column: AppColumn) -> Option<RateScale> {
        match column {
            AppColumn::AdoptionRate => Some(Self::SCALE),
            _ => None,
        }
    }
}

/// Service requests resolved within the committed time.
#[derive(PartialEq, Debug, Clone)]
pub struct OnTime {
    pub forwarded_requests: u64,
    pub late_resolved_requests: u64,
    /// Percentage in [0, 100].
    pub late_rate: f64,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum OnTimeColumn {
    ForwardedRequests,
    LateResolvedRequests,
    LateRate,
}

impl MetricSet for OnTime {
    type Column = OnTimeColumn;

    const KIND: DatasetKind = DatasetKind::OnTime;
    const SCALE: RateScale = RateScale::Percent;
    const RATE_TARGET: CoercionTarget = CoercionTarget::PercentStringFloat;
    const RATE_COLUMN: OnTimeColumn = OnTimeColumn::LateRate;

    fn default_schema() -> DatasetSchema {
        DatasetSchema::on_time()
    }

    fn from_counts(base: u64, flagged: u64, rate: f64) -> Self {
        OnTime {
            forwarded_requests: base,
            late_resolved_requests: flagged,
            late_rate: rate,
        }
    }

    fn base(&self) -> u64 {
        self.forwarded_requests
    }

    fn flagged(&self) -> u64 {
        self.late_resolved_requests
    }

    fn rate(&self) -> f64 {
        self.late_rate
    }

    fn value(&self, column: OnTimeColumn) -> f64 {
        match column {
            OnTimeColumn::ForwardedRequests => self.forwarded_requests as f64,
            OnTimeColumn::LateResolvedRequests => self.late_resolved_requests as f64,
            OnTimeColumn::LateRate => self.late_rate,
        }
    }

    fn scale_of(column: OnTimeColumn) -> Option<RateScale> {
        match column {
            OnTimeColumn::LateRate => Some(Self::SCALE),
            _ => None,
        }
    }
}

/// One branch of the report.
#[derive(PartialEq, Debug, Clone)]
pub struct BranchRecord<M> {
    pub sequence_number: i64,
    pub branch_name: String,
    pub metrics: M,
}

/// The company-wide row. Its sequence number is usually left blank.
#[derive(PartialEq, Debug, Clone)]
pub struct AggregateRecord<M> {
    pub sequence_number: Option<i64>,
    pub branch_name: String,
    pub metrics: M,
}

/// Branch records in source order.
#[derive(PartialEq, Debug, Clone)]
pub struct Table<M> {
    records: Vec<BranchRecord<M>>,
}

impl<M: MetricSet> Table<M> {
    pub fn new(records: Vec<BranchRecord<M>>) -> Table<M> {
        Table { records }
    }

    pub fn records(&self) -> &[BranchRecord<M>] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BranchRecord<M>> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// The coercion rules for a report.
///
/// The sequence number may be blank on the total row only.
pub fn column_specs<M: MetricSet>(schema: &DatasetSchema, aggregate: bool) -> Vec<ColumnSpec> {
    let sequence = if aggregate {
        ColumnSpec::optional(&schema.sequence, CoercionTarget::Integer)
    } else {
        ColumnSpec::required(&schema.sequence, CoercionTarget::Integer)
    };
    vec![
        sequence,
        ColumnSpec::required(&schema.base, CoercionTarget::Integer),
        ColumnSpec::required(&schema.flagged, CoercionTarget::Integer),
        ColumnSpec::required(&schema.rate, M::RATE_TARGET),
    ]
}

pub fn build_table<M: MetricSet>(
    table: &CoercedTable,
    schema: &DatasetSchema,
) -> PipelineResult<Table<M>> {
    let mut records: Vec<BranchRecord<M>> = Vec::with_capacity(table.rows.len());
    for row in table.rows.iter() {
        let sequence_number = match field(row, &schema.sequence)? {
            Value::Int(i) => i,
            v => return coercion_error(row, &schema.sequence, v, CoercionTarget::Integer),
        };
        records.push(BranchRecord {
            sequence_number,
            branch_name: row.branch_name.clone(),
            metrics: build_metrics::<M>(row, schema)?,
        });
    }
    Ok(Table::new(records))
}

pub fn build_aggregate<M: MetricSet>(
    row: Option<&CoercedRow>,
    schema: &DatasetSchema,
) -> PipelineResult<Option<AggregateRecord<M>>> {
    let Some(row) = row else {
        return Ok(None);
    };
    let sequence_number = match field(row, &schema.sequence)? {
        Value::Int(i) => Some(i),
        Value::Missing => None,
        v => return coercion_error(row, &schema.sequence, v, CoercionTarget::Integer),
    };
    Ok(Some(AggregateRecord {
        sequence_number,
        branch_name: row.branch_name.clone(),
        metrics: build_metrics::<M>(row, schema)?,
    }))
}

fn build_metrics<M: MetricSet>(row: &CoercedRow, schema: &DatasetSchema) -> PipelineResult<M> {
    let base = count(row, &schema.base)?;
    let flagged = count(row, &schema.flagged)?;
    let rate = match field(row, &schema.rate)? {
        Value::Float(f) => f,
        v => return coercion_error(row, &schema.rate, v, M::RATE_TARGET),
    };
    Ok(M::from_counts(base, flagged, rate))
}

fn field(row: &CoercedRow, column: &str) -> PipelineResult<Value> {
    row.get(column).context(SchemaSnafu {
        column,
        line: row.line,
    })
}

// Counts are never negative.
fn count(row: &CoercedRow, column: &str) -> PipelineResult<u64> {
    match field(row, column)? {
        Value::Int(i) if i >= 0 => Ok(i as u64),
        v => coercion_error(row, column, v, CoercionTarget::Integer),
    }
}

fn coercion_error<T>(
    row: &CoercedRow,
    column: &str,
    value: Value,
    target: CoercionTarget,
) -> PipelineResult<T> {
    let content = match value {
        Value::Missing => "<empty>".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
    };
    TypeCoercionSnafu {
        line: row.line,
        column,
        content,
        target,
    }
    .fail()
}

impl<M: MetricSet> BranchRecord<M> {
    /// Looks up a field by its column name.
    pub fn field(&self, schema: &DatasetSchema, name: &str) -> Option<FieldValue> {
        if name == schema.sequence {
            Some(FieldValue::Int(self.sequence_number))
        } else {
            metric_field(&self.branch_name, &self.metrics, schema, name)
        }
    }
}

impl<M: MetricSet> AggregateRecord<M> {
    pub fn field(&self, schema: &DatasetSchema, name: &str) -> Option<FieldValue> {
        if name == schema.sequence {
            Some(
                self.sequence_number
                    .map(FieldValue::Int)
                    .unwrap_or(FieldValue::Blank),
            )
        } else {
            metric_field(&self.branch_name, &self.metrics, schema, name)
        }
    }
}

fn metric_field<M: MetricSet>(
    branch_name: &str,
    metrics: &M,
    schema: &DatasetSchema,
    name: &str,
) -> Option<FieldValue> {
    if name == schema.branch {
        Some(FieldValue::Text(branch_name.to_string()))
    } else if name == schema.base {
        Some(FieldValue::Count(metrics.base()))
    } else if name == schema.flagged {
        Some(FieldValue::Count(metrics.flagged()))
    } else if name == schema.rate {
        Some(FieldValue::Rate {
            value: metrics.rate(),
            scale: M::SCALE,
        })
    } else {
        None
    }
}
