use snafu::Snafu;

use crate::coerce::CoercionTarget;

/// Errors that prevent a report from being produced.
///
/// None of them is recoverable by retrying: they mean that the uploaded
/// sheet does not match the report template, or that it holds no branch.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PipelineError {
    #[snafu(display("Column {column:?} not found in the header row (line {line})"))]
    Schema { column: String, line: usize },

    #[snafu(display("Line {line}, column {column:?}: cannot read {content} as {target}"))]
    TypeCoercion {
        line: usize,
        column: String,
        content: String,
        target: CoercionTarget,
    },

    #[snafu(display("No branch rows to rank or summarize"))]
    EmptyDataset {},

    #[snafu(display("View {view:?} requests the unknown field {field:?}"))]
    Assembly { view: String, field: String },
}

pub type PipelineResult<T> = Result<T, PipelineError>;
