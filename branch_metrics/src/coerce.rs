use std::fmt::Display;

use log::debug;
use snafu::OptionExt;

use crate::config::{RawCell, RawRow, RawTable};
use crate::error::*;

/// Whole numbers read from floating point cells may carry some noise.
const INTEGER_TOLERANCE: f64 = 1e-9;

/// The canonical type a column is converted to.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum CoercionTarget {
    /// A whole number.
    Integer,
    /// A decimal number already expressed as a fraction in [0, 1].
    FractionFloat,
    /// A percentage, either as a number or as a string like `"12.5%"`.
    PercentStringFloat,
}

impl Display for CoercionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoercionTarget::Integer => write!(f, "an integer"),
            CoercionTarget::FractionFloat => write!(f, "a decimal number"),
            CoercionTarget::PercentStringFloat => write!(f, "a percentage"),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ColumnSpec {
    pub name: String,
    pub target: CoercionTarget,
    /// Empty cells are accepted and read as `Value::Missing`.
    pub optional: bool,
}

impl ColumnSpec {
    pub fn required(name: &str, target: CoercionTarget) -> ColumnSpec {
        ColumnSpec {
            name: name.to_string(),
            target,
            optional: false,
        }
    }

    pub fn optional(name: &str, target: CoercionTarget) -> ColumnSpec {
        ColumnSpec {
            name: name.to_string(),
            target,
            optional: true,
        }
    }
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum Value {
    Missing,
    Int(i64),
    Float(f64),
}

/// A row where every requested column holds a typed value.
#[derive(PartialEq, Debug, Clone)]
pub struct CoercedRow {
    pub line: usize,
    pub branch_name: String,
    values: Vec<(String, Value)>,
}

impl CoercedRow {
    pub fn get(&self, column: &str) -> Option<Value> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| *v)
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct CoercedTable {
    pub rows: Vec<CoercedRow>,
}

/// Converts the requested columns of every row.
///
/// The input is left untouched. The first cell that cannot be converted
/// aborts the whole operation: no partially converted table is returned.
pub fn coerce(table: &RawTable, specs: &[ColumnSpec]) -> PipelineResult<CoercedTable> {
    let indexes = resolve_columns(table, specs)?;
    let rows = table
        .rows
        .iter()
        .map(|row| coerce_resolved(row, specs, &indexes))
        .collect::<PipelineResult<Vec<CoercedRow>>>()?;
    debug!("coerce: {} rows, {} columns", rows.len(), specs.len());
    Ok(CoercedTable { rows })
}

/// Converts the company total row, if there is one. A sheet without such a
/// row is not an error.
///
/// `header` is the table the row was split from; only its columns are used.
pub fn coerce_aggregate(
    header: &RawTable,
    row: Option<&RawRow>,
    specs: &[ColumnSpec],
) -> PipelineResult<Option<CoercedRow>> {
    match row {
        None => Ok(None),
        Some(row) => {
            let indexes = resolve_columns(header, specs)?;
            coerce_resolved(row, specs, &indexes).map(Some)
        }
    }
}

/// Converts a single cell to the given target.
pub fn coerce_cell(cell: &RawCell, target: CoercionTarget) -> Option<Value> {
    match target {
        CoercionTarget::Integer => read_integer(cell).map(Value::Int),
        CoercionTarget::FractionFloat => read_float(cell).map(Value::Float),
        CoercionTarget::PercentStringFloat => read_percent(cell).map(Value::Float),
    }
}

fn resolve_columns(table: &RawTable, specs: &[ColumnSpec]) -> PipelineResult<Vec<usize>> {
    specs
        .iter()
        .map(|spec| {
            table.column_index(&spec.name).context(SchemaSnafu {
                column: spec.name.clone(),
                line: table.header_line,
            })
        })
        .collect()
}

fn coerce_resolved(
    row: &RawRow,
    specs: &[ColumnSpec],
    indexes: &[usize],
) -> PipelineResult<CoercedRow> {
    let mut values: Vec<(String, Value)> = Vec::with_capacity(specs.len());
    for (spec, idx) in specs.iter().zip(indexes.iter()) {
        let cell = row.cell(*idx);
        let value = if cell.is_blank() && spec.optional {
            Value::Missing
        } else {
            coerce_cell(cell, spec.target).context(TypeCoercionSnafu {
                line: row.line,
                column: spec.name.clone(),
                content: cell.to_string(),
                target: spec.target,
            })?
        };
        values.push((spec.name.clone(), value));
    }
    Ok(CoercedRow {
        line: row.line,
        branch_name: row.branch_name.clone(),
        values,
    })
}

fn whole_number(f: f64) -> Option<i64> {
    if !f.is_finite() {
        return None;
    }
    let rounded = f.round();
    // Beyond this magnitude the cast to i64 saturates.
    if (f - rounded).abs() <= INTEGER_TOLERANCE && rounded.abs() < 9.0e18 {
        Some(rounded as i64)
    } else {
        None
    }
}

fn parse_finite(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

fn read_integer(cell: &RawCell) -> Option<i64> {
    match cell {
        RawCell::Int(i) => Some(*i),
        RawCell::Float(f) => whole_number(*f),
        RawCell::Text(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| parse_finite(s).and_then(whole_number))
        }
        RawCell::Empty | RawCell::Bool(_) => None,
    }
}

fn read_float(cell: &RawCell) -> Option<f64> {
    match cell {
        RawCell::Int(i) => Some(*i as f64),
        RawCell::Float(f) if f.is_finite() => Some(*f),
        RawCell::Text(s) => parse_finite(s),
        _ => None,
    }
}

// Percentages arrive either as numbers in percentage scale or as strings
// with a trailing `%`. Both end up as the same number.
fn read_percent(cell: &RawCell) -> Option<f64> {
    match cell {
        RawCell::Text(s) => {
            let s = s.trim();
            parse_finite(s.strip_suffix('%').unwrap_or(s))
        }
        other => read_float(other),
    }
}
