pub use crate::records::*;

/// A builder for branch tables that do not come from a spreadsheet.
///
/// Sequence numbers are assigned in insertion order, starting at 1.
///
/// ```
/// use branch_metrics::builder::Builder;
/// use branch_metrics::records::{AppAdoption, AppColumn};
/// use branch_metrics::ranking::top_n;
///
/// let mut builder = Builder::<AppAdoption>::new();
/// builder.add_branch("Hải Châu", 1200, 600, 0.5);
/// builder.add_branch("Sơn Trà", 800, 600, 0.75);
/// let table = builder.build();
///
/// let top = top_n(&table, AppColumn::AdoptionRate, 1);
/// assert_eq!(top.records[0].branch_name, "Sơn Trà");
/// ```
pub struct Builder<M> {
    _records: Vec<BranchRecord<M>>,
}

impl<M: MetricSet> Builder<M> {
    pub fn new() -> Builder<M> {
        Builder {
            _records: Vec::new(),
        }
    }

    /// Adds a branch with the next sequence number.
    ///
    /// `rate` is in the scale of the report (`M::SCALE`).
    pub fn add_branch(&mut self, name: &str, base: u64, flagged: u64, rate: f64) -> &mut Self {
        let sequence_number = self._records.len() as i64 + 1;
        self.add_record(BranchRecord {
            sequence_number,
            branch_name: name.trim().to_string(),
            metrics: M::from_counts(base, flagged, rate),
        })
    }

    pub fn add_record(&mut self, record: BranchRecord<M>) -> &mut Self {
        self._records.push(record);
        self
    }

    pub fn build(self) -> Table<M> {
        Table::new(self._records)
    }
}

impl<M: MetricSet> Default for Builder<M> {
    fn default() -> Self {
        Builder::new()
    }
}
