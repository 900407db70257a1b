//! RIES IO - Arrow schemas, input readers and Parquet output for RIES runs

pub mod input;
pub mod schema;
pub mod sink;
pub mod tables;
pub mod writer;

pub use input::{read_field_names, read_heps, read_papers, resolve_inputs};
pub use sink::{ParquetSink, cleanup_tmp_files, is_valid_parquet};
pub use tables::{Accumulator, RECORD_BATCH_SIZE};
pub use writer::{WrittenTable, table_names, write_run};
