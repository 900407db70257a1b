//! Parquet table writer with atomic tmp→rename

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::RecordBatch;
use arrow::datatypes::Schema;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;

/// Rows per Parquet row group.
const MAX_ROW_GROUP_SIZE: usize = 1024 * 1024;

/// One output table written to `{table}.parquet`, visible only once finalized.
pub struct ParquetSink {
    writer: ArrowWriter<File>,
    tmp_path: PathBuf,
    final_path: PathBuf,
    row_count: usize,
}

impl std::fmt::Debug for ParquetSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParquetSink")
            .field("final_path", &self.final_path)
            .field("row_count", &self.row_count)
            .finish_non_exhaustive()
    }
}

impl ParquetSink {
    /// Create a sink writing `{table}.parquet.tmp` in `output_dir`
    pub fn new(
        table: &str,
        output_dir: &Path,
        schema: Arc<Schema>,
        zstd_level: i32,
    ) -> io::Result<Self> {
        let final_path = table_path(output_dir, table);
        let tmp_path = output_dir.join(format!("{table}.parquet.tmp"));

        if tmp_path.exists() {
            fs::remove_file(&tmp_path)?;
        }

        let level = ZstdLevel::try_new(zstd_level)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let file = File::create(&tmp_path)?;
        let props = WriterProperties::builder()
            .set_compression(Compression::ZSTD(level))
            .set_max_row_group_size(MAX_ROW_GROUP_SIZE)
            .build();

        let writer = ArrowWriter::try_new(file, schema, Some(props)).map_err(io::Error::other)?;

        Ok(Self {
            writer,
            tmp_path,
            final_path,
            row_count: 0,
        })
    }

    pub fn write_batch(&mut self, batch: &RecordBatch) -> io::Result<()> {
        self.row_count += batch.num_rows();
        self.writer.write(batch).map_err(io::Error::other)
    }

    /// Flush the footer and rename tmp → final. Returns rows written.
    pub fn finalize(self) -> io::Result<usize> {
        let row_count = self.row_count;
        self.writer.close().map_err(io::Error::other)?;
        fs::rename(&self.tmp_path, &self.final_path)?;
        Ok(row_count)
    }
}

/// Path of a finalized table.
pub fn table_path(output_dir: &Path, table: &str) -> PathBuf {
    output_dir.join(format!("{table}.parquet"))
}

/// Check if a completed parquet file exists and has a valid footer
pub fn is_valid_parquet(path: &Path) -> bool {
    let Ok(file) = File::open(path) else {
        return false;
    };
    parquet::file::reader::SerializedFileReader::new(file).is_ok()
}

/// Remove stale .tmp files in the output directory
pub fn cleanup_tmp_files(output_dir: &Path) -> io::Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(output_dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "tmp") {
            log::warn!("Removing stale tmp file: {}", path.display());
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int32Array;
    use arrow::datatypes::{DataType, Field};
    use tempfile::TempDir;

    fn year_batch(values: Vec<i32>) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new("year", DataType::Int32, false)]));
        RecordBatch::try_new(schema, vec![Arc::new(Int32Array::from(values))]).unwrap()
    }

    #[test]
    fn is_valid_parquet_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(!is_valid_parquet(&dir.path().join("nope.parquet")));
    }

    #[test]
    fn is_valid_parquet_not_parquet() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.parquet");
        fs::write(&path, b"this is not parquet").unwrap();
        assert!(!is_valid_parquet(&path));
    }

    #[test]
    fn sink_renames_on_finalize() {
        let dir = TempDir::new().unwrap();
        let batch = year_batch(vec![2020, 2021, 2022]);
        let mut sink = ParquetSink::new("years", dir.path(), batch.schema(), 3).unwrap();
        sink.write_batch(&batch).unwrap();
        sink.write_batch(&batch).unwrap();
        assert!(dir.path().join("years.parquet.tmp").exists());
        assert!(!table_path(dir.path(), "years").exists());

        assert_eq!(sink.finalize().unwrap(), 6);
        assert!(!dir.path().join("years.parquet.tmp").exists());
        assert!(is_valid_parquet(&table_path(dir.path(), "years")));
    }

    #[test]
    fn sink_rejects_bad_zstd_level() {
        let dir = TempDir::new().unwrap();
        let batch = year_batch(vec![]);
        let err = ParquetSink::new("years", dir.path(), batch.schema(), 99).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn cleanup_tmp_files_removes_only_tmp() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.parquet.tmp"), b"stale").unwrap();
        fs::write(dir.path().join("b.parquet"), b"keep").unwrap();
        fs::write(dir.path().join("c.tmp"), b"stale2").unwrap();

        assert_eq!(cleanup_tmp_files(dir.path()).unwrap(), 2);

        assert!(!dir.path().join("a.parquet.tmp").exists());
        assert!(dir.path().join("b.parquet").exists());
        assert!(!dir.path().join("c.tmp").exists());
    }
}
