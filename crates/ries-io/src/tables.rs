//! Row accumulators: result rows in, Arrow `RecordBatch`es out
//!
//! One accumulator per output table. Columns are buffered as plain `Vec`s and
//! moved into arrays on [`Accumulator::take_batch`].

use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanArray, Float64Array, Int32Array, RecordBatch, StringArray, UInt32Array,
    UInt64Array, UInt8Array,
};
use arrow::datatypes::Schema;
use arrow::error::ArrowError;
use ries_core::benchmark::Benchmark;
use ries_core::classify::{Classes, PaperClass, Thresholds, CLASSES};
use ries_core::{
    round_dp, Assignment, ClassSummary, Dims, GroupClass, GroupKey, GroupScore, OutputRow,
    PaperScore, Rci, SummaryRow,
};

use crate::schema;

/// Rows per `RecordBatch` handed to the sink.
pub const RECORD_BATCH_SIZE: usize = 8192;

/// Decimal places of class-summary portions.
const PORTIONS_DP: i32 = 2;

/// Buffers rows of one table and converts them to Arrow batches.
pub trait Accumulator {
    type Row;

    fn schema(&self) -> Arc<Schema>;

    /// Push a row into the accumulator
    fn push(&mut self, row: &Self::Row);

    /// Number of rows currently buffered
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if buffer is full and should be flushed
    fn is_full(&self) -> bool {
        self.len() >= RECORD_BATCH_SIZE
    }

    /// Take buffered rows as a RecordBatch, resetting internal state
    fn take_batch(&mut self) -> Result<RecordBatch, ArrowError>;
}

fn strings(v: &mut Vec<String>) -> ArrayRef {
    Arc::new(StringArray::from(std::mem::take(v)))
}

fn opt_strings(v: &mut Vec<Option<String>>) -> ArrayRef {
    Arc::new(StringArray::from(std::mem::take(v)))
}

fn years(v: &mut Vec<i32>) -> ArrayRef {
    Arc::new(Int32Array::from(std::mem::take(v)))
}

fn floats(v: &mut Vec<f64>) -> ArrayRef {
    Arc::new(Float64Array::from(std::mem::take(v)))
}

fn counts(v: &mut Vec<u64>) -> ArrayRef {
    Arc::new(UInt64Array::from(std::mem::take(v)))
}

/// Transpose fixed-width rows into one Float64 column per position.
fn float_columns<const N: usize>(rows: &mut Vec<[f64; N]>) -> Vec<ArrayRef> {
    let rows = std::mem::take(rows);
    (0..N)
        .map(|i| Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r[i]))) as ArrayRef)
        .collect()
}

fn count_columns<const N: usize>(rows: &mut Vec<[u64; N]>) -> Vec<ArrayRef> {
    let rows = std::mem::take(rows);
    (0..N)
        .map(|i| Arc::new(UInt64Array::from_iter_values(rows.iter().map(|r| r[i]))) as ArrayRef)
        .collect()
}

fn batch(schema: Arc<Schema>, arrays: Vec<ArrayRef>) -> Result<RecordBatch, ArrowError> {
    RecordBatch::try_new(schema, arrays)
}

// === Assignments ===

#[derive(Default)]
pub struct AssignmentAccumulator {
    paper: Vec<String>,
    institution: Vec<Option<String>>,
    field: Vec<String>,
    field2: Vec<String>,
    year: Vec<i32>,
    journal: Vec<Option<String>>,
    citations: Vec<u32>,
    weight: Vec<f64>,
    is_hep: Vec<bool>,
}

impl Accumulator for AssignmentAccumulator {
    type Row = Assignment;

    fn schema(&self) -> Arc<Schema> {
        schema::assignments().clone()
    }

    fn push(&mut self, row: &Assignment) {
        self.paper.push(row.paper.clone());
        self.institution.push(row.institution.clone());
        self.field.push(row.field.clone());
        self.field2.push(row.field2.clone());
        self.year.push(row.year);
        self.journal.push(row.journal.clone());
        self.citations.push(row.citations);
        self.weight.push(row.weight);
        self.is_hep.push(row.is_hep);
    }

    fn len(&self) -> usize {
        self.paper.len()
    }

    fn take_batch(&mut self) -> Result<RecordBatch, ArrowError> {
        batch(
            self.schema(),
            vec![
                strings(&mut self.paper),
                opt_strings(&mut self.institution),
                strings(&mut self.field),
                strings(&mut self.field2),
                years(&mut self.year),
                opt_strings(&mut self.journal),
                Arc::new(UInt32Array::from(std::mem::take(&mut self.citations))),
                floats(&mut self.weight),
                Arc::new(BooleanArray::from(std::mem::take(&mut self.is_hep))),
            ],
        )
    }
}

// === Benchmarks ===

#[derive(Default)]
pub struct BenchmarkAccumulator {
    field: Vec<String>,
    year: Vec<i32>,
    num_papers: Vec<u64>,
    num_uncited: Vec<u64>,
    cpp: Vec<f64>,
    hpi: Vec<f64>,
    centiles: Vec<[f64; 5]>,
}

impl Accumulator for BenchmarkAccumulator {
    type Row = Benchmark;

    fn schema(&self) -> Arc<Schema> {
        schema::benchmarks().clone()
    }

    fn push(&mut self, row: &Benchmark) {
        self.field.push(row.field.clone());
        self.year.push(row.year);
        self.num_papers.push(row.num_papers as u64);
        self.num_uncited.push(row.num_uncited as u64);
        self.cpp.push(row.cpp);
        self.hpi.push(row.hpi);
        self.centiles.push(row.centiles.as_array());
    }

    fn len(&self) -> usize {
        self.field.len()
    }

    fn take_batch(&mut self) -> Result<RecordBatch, ArrowError> {
        let mut arrays = vec![
            strings(&mut self.field),
            years(&mut self.year),
            counts(&mut self.num_papers),
            counts(&mut self.num_uncited),
            floats(&mut self.cpp),
            floats(&mut self.hpi),
        ];
        arrays.extend(float_columns(&mut self.centiles));
        batch(self.schema(), arrays)
    }
}

// === Thresholds ===

/// Threshold rows carry the run-wide static boundaries alongside.
#[derive(Default)]
pub struct ThresholdAccumulator {
    field: Vec<String>,
    year: Vec<i32>,
    dynamic: Vec<[f64; 5]>,
    max_rci: Vec<f64>,
    fixed: Vec<[f64; 6]>,
}

impl Accumulator for ThresholdAccumulator {
    type Row = Thresholds;

    fn schema(&self) -> Arc<Schema> {
        schema::thresholds().clone()
    }

    fn push(&mut self, row: &Thresholds) {
        self.field.push(row.field.clone());
        self.year.push(row.year);
        self.dynamic.push(row.dynamic.c);
        self.max_rci.push(row.dynamic.max_rci);
        self.fixed.push(row.fixed);
    }

    fn len(&self) -> usize {
        self.field.len()
    }

    fn take_batch(&mut self) -> Result<RecordBatch, ArrowError> {
        let mut arrays = vec![strings(&mut self.field), years(&mut self.year)];
        arrays.extend(float_columns(&mut self.dynamic));
        arrays.push(floats(&mut self.max_rci));
        arrays.extend(float_columns(&mut self.fixed));
        batch(self.schema(), arrays)
    }
}

// === Benchmark summary ===

#[derive(Default)]
pub struct SummaryAccumulator {
    field: Vec<String>,
    name: Vec<Option<String>>,
    year: Vec<i32>,
    num_papers: Vec<u64>,
    num_uncited: Vec<u64>,
    cpp: Vec<[f64; 3]>,
    ctiles: Vec<[f64; 5]>,
    dynamic: Vec<[f64; 5]>,
    max_rci: Vec<f64>,
    fixed: Vec<[f64; 6]>,
}

impl Accumulator for SummaryAccumulator {
    type Row = SummaryRow;

    fn schema(&self) -> Arc<Schema> {
        schema::benchmark_summary().clone()
    }

    fn push(&mut self, row: &SummaryRow) {
        self.field.push(row.field.clone());
        self.name.push(row.name.clone());
        self.year.push(row.year);
        self.num_papers.push(row.num_papers);
        self.num_uncited.push(row.num_uncited);
        self.cpp.push([row.cpp_local, row.cpp_world, row.cpp_hpi]);
        self.ctiles.push(row.ctiles);
        self.dynamic.push(row.dynamic);
        self.max_rci.push(row.max_rci);
        self.fixed.push(row.fixed);
    }

    fn len(&self) -> usize {
        self.field.len()
    }

    fn take_batch(&mut self) -> Result<RecordBatch, ArrowError> {
        let mut arrays = vec![
            strings(&mut self.field),
            opt_strings(&mut self.name),
            years(&mut self.year),
            counts(&mut self.num_papers),
            counts(&mut self.num_uncited),
        ];
        arrays.extend(float_columns(&mut self.cpp));
        arrays.extend(float_columns(&mut self.ctiles));
        arrays.extend(float_columns(&mut self.dynamic));
        arrays.push(floats(&mut self.max_rci));
        arrays.extend(float_columns(&mut self.fixed));
        batch(self.schema(), arrays)
    }
}

// === Paper scores ===

fn rci_array(rci: &Rci) -> [f64; 3] {
    [rci.rci_local, rci.rci_world, rci.hpi_world]
}

#[derive(Default)]
pub struct PaperScoreAccumulator {
    paper: Vec<String>,
    field: Vec<String>,
    year: Vec<i32>,
    citations: Vec<u32>,
    rci: Vec<[f64; 3]>,
}

impl Accumulator for PaperScoreAccumulator {
    type Row = PaperScore;

    fn schema(&self) -> Arc<Schema> {
        schema::paper_scores().clone()
    }

    fn push(&mut self, row: &PaperScore) {
        self.paper.push(row.paper.clone());
        self.field.push(row.field.clone());
        self.year.push(row.year);
        self.citations.push(row.citations);
        self.rci.push(rci_array(&row.rci));
    }

    fn len(&self) -> usize {
        self.paper.len()
    }

    fn take_batch(&mut self) -> Result<RecordBatch, ArrowError> {
        let mut arrays = vec![
            strings(&mut self.paper),
            strings(&mut self.field),
            years(&mut self.year),
            Arc::new(UInt32Array::from(std::mem::take(&mut self.citations))),
        ];
        arrays.extend(float_columns(&mut self.rci));
        batch(self.schema(), arrays)
    }
}

// === Group keys ===

/// Key columns of a grouping; only the dimensions in `dims` are emitted.
struct KeyColumns {
    dims: Dims,
    institution: Vec<String>,
    field: Vec<String>,
    year: Vec<i32>,
    rows: usize,
}

impl KeyColumns {
    fn new(dims: Dims) -> Self {
        Self {
            dims,
            institution: Vec::new(),
            field: Vec::new(),
            year: Vec::new(),
            rows: 0,
        }
    }

    fn push(&mut self, key: &GroupKey) {
        if self.dims.institution {
            self.institution
                .push(key.institution.clone().unwrap_or_default());
        }
        if self.dims.field {
            self.field.push(key.field.clone().unwrap_or_default());
        }
        if self.dims.year {
            self.year.push(key.year.unwrap_or_default());
        }
        self.rows += 1;
    }

    fn take(&mut self) -> Vec<ArrayRef> {
        self.rows = 0;
        let mut arrays = Vec::with_capacity(3);
        if self.dims.institution {
            arrays.push(strings(&mut self.institution));
        }
        if self.dims.field {
            arrays.push(strings(&mut self.field));
        }
        if self.dims.year {
            arrays.push(years(&mut self.year));
        }
        arrays
    }
}

// === Group scores ===

pub struct GroupScoreAccumulator {
    schema: Arc<Schema>,
    keys: KeyColumns,
    rci: Vec<[f64; 4]>,
}

impl GroupScoreAccumulator {
    pub fn new(dims: Dims) -> Self {
        Self {
            schema: schema::grouping(dims),
            keys: KeyColumns::new(dims),
            rci: Vec::new(),
        }
    }
}

impl Accumulator for GroupScoreAccumulator {
    type Row = GroupScore;

    fn schema(&self) -> Arc<Schema> {
        self.schema.clone()
    }

    fn push(&mut self, row: &GroupScore) {
        self.keys.push(&row.key);
        let [local, world, hpi] = rci_array(&row.rci);
        self.rci.push([local, world, hpi, row.weight]);
    }

    fn len(&self) -> usize {
        self.keys.rows
    }

    fn take_batch(&mut self) -> Result<RecordBatch, ArrowError> {
        let mut arrays = self.keys.take();
        arrays.extend(float_columns(&mut self.rci));
        batch(self.schema(), arrays)
    }
}

// === Classes ===

fn class_array(c: &Classes) -> [u8; 4] {
    [c.dynamic_world, c.static_world, c.static_local, c.static_hpi]
}

fn class_columns(rows: &mut Vec<[u8; 4]>) -> Vec<ArrayRef> {
    let rows = std::mem::take(rows);
    (0..4)
        .map(|i| Arc::new(UInt8Array::from_iter_values(rows.iter().map(|r| r[i]))) as ArrayRef)
        .collect()
}

#[derive(Default)]
pub struct PaperClassAccumulator {
    paper: Vec<String>,
    field: Vec<String>,
    year: Vec<i32>,
    classes: Vec<[u8; 4]>,
}

impl Accumulator for PaperClassAccumulator {
    type Row = PaperClass;

    fn schema(&self) -> Arc<Schema> {
        schema::paper_classes().clone()
    }

    fn push(&mut self, row: &PaperClass) {
        self.paper.push(row.paper.clone());
        self.field.push(row.field.clone());
        self.year.push(row.year);
        self.classes.push(class_array(&row.classes));
    }

    fn len(&self) -> usize {
        self.paper.len()
    }

    fn take_batch(&mut self) -> Result<RecordBatch, ArrowError> {
        let mut arrays = vec![
            strings(&mut self.paper),
            strings(&mut self.field),
            years(&mut self.year),
        ];
        arrays.extend(class_columns(&mut self.classes));
        batch(self.schema(), arrays)
    }
}

#[derive(Default)]
pub struct GroupClassAccumulator {
    institution: Vec<String>,
    field: Vec<String>,
    year: Vec<i32>,
    classes: Vec<[u8; 4]>,
}

impl Accumulator for GroupClassAccumulator {
    type Row = GroupClass;

    fn schema(&self) -> Arc<Schema> {
        schema::group_classes().clone()
    }

    fn push(&mut self, row: &GroupClass) {
        self.institution.push(row.institution.clone());
        self.field.push(row.field.clone());
        self.year.push(row.year);
        self.classes.push(class_array(&row.classes));
    }

    fn len(&self) -> usize {
        self.institution.len()
    }

    fn take_batch(&mut self) -> Result<RecordBatch, ArrowError> {
        let mut arrays = vec![
            strings(&mut self.institution),
            strings(&mut self.field),
            years(&mut self.year),
        ];
        arrays.extend(class_columns(&mut self.classes));
        batch(self.schema(), arrays)
    }
}

// === Class summary ===

#[derive(Default)]
pub struct ClassSummaryAccumulator {
    institution: Vec<String>,
    field: Vec<String>,
    totals: Vec<[u64; CLASSES]>,
    portions: Vec<[f64; CLASSES]>,
    rci_low: Vec<u64>,
    rci_high: Vec<u64>,
    rci_ratio: Vec<f64>,
}

impl Accumulator for ClassSummaryAccumulator {
    type Row = ClassSummary;

    fn schema(&self) -> Arc<Schema> {
        schema::class_summary().clone()
    }

    fn push(&mut self, row: &ClassSummary) {
        self.institution.push(row.institution.clone());
        self.field.push(row.field.clone());
        self.totals.push(row.totals);
        self.portions
            .push(row.portions.map(|p| round_dp(p, PORTIONS_DP)));
        self.rci_low.push(row.rci_low);
        self.rci_high.push(row.rci_high);
        self.rci_ratio.push(row.rci_ratio);
    }

    fn len(&self) -> usize {
        self.institution.len()
    }

    fn take_batch(&mut self) -> Result<RecordBatch, ArrowError> {
        let mut arrays = vec![strings(&mut self.institution), strings(&mut self.field)];
        arrays.extend(count_columns(&mut self.totals));
        arrays.extend(float_columns(&mut self.portions));
        arrays.push(counts(&mut self.rci_low));
        arrays.push(counts(&mut self.rci_high));
        arrays.push(floats(&mut self.rci_ratio));
        batch(self.schema(), arrays)
    }
}

// === Research outputs ===

pub struct OutputAccumulator {
    schema: Arc<Schema>,
    keys: KeyColumns,
    sums: Vec<[u64; 2]>,
    values: Vec<[f64; 2]>,
    /// centile then rank, each in papers/citations/portions/cpp order
    positions: Vec<[u32; 8]>,
}

impl OutputAccumulator {
    pub fn new(dims: Dims) -> Self {
        Self {
            schema: schema::research_outputs(dims),
            keys: KeyColumns::new(dims),
            sums: Vec::new(),
            values: Vec::new(),
            positions: Vec::new(),
        }
    }
}

impl Accumulator for OutputAccumulator {
    type Row = OutputRow;

    fn schema(&self) -> Arc<Schema> {
        self.schema.clone()
    }

    fn push(&mut self, row: &OutputRow) {
        self.keys.push(&row.key);
        self.sums.push([row.sum_papers, row.sum_citations]);
        self.values.push([row.sum_portions, row.avg_citations]);
        let (c, r) = (&row.centile, &row.rank);
        self.positions.push([
            c.papers,
            c.citations,
            c.portions,
            c.cpp,
            r.papers,
            r.citations,
            r.portions,
            r.cpp,
        ]);
    }

    fn len(&self) -> usize {
        self.keys.rows
    }

    fn take_batch(&mut self) -> Result<RecordBatch, ArrowError> {
        let mut arrays = self.keys.take();
        arrays.extend(count_columns(&mut self.sums));
        arrays.extend(float_columns(&mut self.values));
        let positions = std::mem::take(&mut self.positions);
        arrays.extend((0..8).map(|i| {
            Arc::new(UInt32Array::from_iter_values(positions.iter().map(|p| p[i]))) as ArrayRef
        }));
        batch(self.schema(), arrays)
    }
}
