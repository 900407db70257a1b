//! Readers for the paper table, the HEP registry and field-name tables
//!
//! Each input is Parquet or JSON Lines, chosen by file extension. A path may
//! also be a glob pattern (`papers/*.parquet`) or a directory, in which case
//! every matching file is read in parallel and the rows concatenated.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use arrow::array::{Array, ArrayRef, AsArray, RecordBatch};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int32Type, Int64Type};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ProjectionMask;
use rayon::prelude::*;
use ries_core::{fmt_num, Apportionment, FieldNames, HepSet, Paper};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Initial capacity for per-line JSON read buffer
const LINE_BUF_CAPACITY: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Parquet,
    JsonLines,
}

fn format_of(path: &Path) -> Result<Format> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("parquet") => Ok(Format::Parquet),
        Some("jsonl" | "ndjson" | "json") => Ok(Format::JsonLines),
        _ => bail!(
            "{}: unsupported input format (expected .parquet or .jsonl)",
            path.display()
        ),
    }
}

/// Expand an input spec into concrete files, sorted.
///
/// A directory yields its `*.parquet` and `*.jsonl` files; anything else is
/// treated as a glob pattern (a plain path matches itself).
pub fn resolve_inputs(spec: &Path) -> Result<Vec<PathBuf>> {
    let patterns = if spec.is_dir() {
        vec![spec.join("*.parquet"), spec.join("*.jsonl")]
    } else {
        vec![spec.to_path_buf()]
    };
    let mut files = Vec::new();
    for pattern in patterns {
        let pattern = pattern.to_string_lossy().into_owned();
        for entry in glob::glob(&pattern).with_context(|| format!("bad input pattern {pattern}"))? {
            files.push(entry.with_context(|| format!("reading matches of {pattern}"))?);
        }
    }
    files.sort();
    if files.is_empty() {
        bail!("no input files match {}", spec.display());
    }
    Ok(files)
}

/// Read every paper matched by `spec`.
///
/// Rows without a DOI or year, or with a negative citation count, are
/// skipped and counted. Unparsable JSON lines are skipped the same way.
pub fn read_papers(spec: &Path) -> Result<Vec<Paper>> {
    let files = resolve_inputs(spec)?;
    let parts: Vec<(Vec<Paper>, usize)> = files
        .par_iter()
        .map(|path| {
            let read = match format_of(path)? {
                Format::Parquet => read_papers_parquet(path),
                Format::JsonLines => read_json_lines::<Paper>(path),
            };
            read.with_context(|| format!("reading papers from {}", path.display()))
        })
        .collect::<Result<_>>()?;

    let skipped: usize = parts.iter().map(|(_, s)| s).sum();
    let papers: Vec<Paper> = parts.into_iter().flat_map(|(p, _)| p).collect();
    if skipped > 0 {
        log::warn!("papers: {} malformed rows skipped", fmt_num(skipped));
    }
    log::info!(
        "papers: {} rows from {} file(s)",
        fmt_num(papers.len()),
        files.len()
    );
    Ok(papers)
}

/// Parse one JSON value per non-blank line.
fn read_json_lines<T: DeserializeOwned>(path: &Path) -> Result<(Vec<T>, usize)> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut buf = String::with_capacity(LINE_BUF_CAPACITY);
    let mut rows = Vec::new();
    let mut skipped = 0;
    let mut line_no = 0usize;
    loop {
        buf.clear();
        if reader.read_line(&mut buf)? == 0 {
            break;
        }
        line_no += 1;
        let line = buf.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(row) => rows.push(row),
            Err(e) => {
                if skipped == 0 {
                    log::debug!("{}:{line_no}: {e}", path.display());
                }
                skipped += 1;
            }
        }
    }
    Ok((rows, skipped))
}

/// Column `name` cast to `to`, or `None` if the file lacks it.
fn column(batch: &RecordBatch, name: &str, to: &DataType) -> Result<Option<ArrayRef>> {
    batch
        .column_by_name(name)
        .map(|col| cast(col, to).with_context(|| format!("column {name} is not {to}")))
        .transpose()
}

fn required(batch: &RecordBatch, name: &str, to: &DataType) -> Result<ArrayRef> {
    column(batch, name, to)?.with_context(|| format!("missing column {name}"))
}

fn read_papers_parquet(path: &Path) -> Result<(Vec<Paper>, usize)> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let reader = builder.build()?;

    let mut papers = Vec::new();
    let mut skipped = 0;
    for batch in reader {
        let batch = batch?;
        let doi = required(&batch, "doi", &DataType::Utf8)?;
        let doi = doi.as_string::<i32>();
        let year = required(&batch, "year", &DataType::Int32)?;
        let year = year.as_primitive::<Int32Type>();
        let citations = required(&batch, "citations", &DataType::Int64)?;
        let citations = citations.as_primitive::<Int64Type>();
        let is_oa = column(&batch, "is_oa", &DataType::Boolean)?;
        let is_oa = is_oa.as_ref().map(|a| a.as_boolean());
        let journal = column(&batch, "journal", &DataType::Utf8)?;
        let journal = journal.as_ref().map(|a| a.as_string::<i32>());
        let mut institutions = batch
            .column_by_name("institutions")
            .map(|c| list_of_strings(c.as_ref()))
            .transpose()?;
        let mut fields = batch
            .column_by_name("fields")
            .map(|c| list_of_apportionments(c.as_ref()))
            .transpose()?;

        for i in 0..batch.num_rows() {
            if doi.is_null(i) || year.is_null(i) {
                skipped += 1;
                continue;
            }
            let cits = if citations.is_null(i) {
                0
            } else {
                citations.value(i)
            };
            let Ok(cits) = u32::try_from(cits) else {
                skipped += 1;
                continue;
            };
            papers.push(Paper {
                doi: doi.value(i).to_string(),
                year: year.value(i),
                citations: cits,
                is_oa: is_oa.is_some_and(|a| a.is_valid(i) && a.value(i)),
                journal: journal
                    .filter(|a| a.is_valid(i))
                    .map(|a| a.value(i).to_string()),
                institutions: institutions
                    .as_mut()
                    .map(|rows| std::mem::take(&mut rows[i]))
                    .unwrap_or_default(),
                fields: fields
                    .as_mut()
                    .map(|rows| std::mem::take(&mut rows[i]))
                    .unwrap_or_default(),
            });
        }
    }
    Ok((papers, skipped))
}

/// Split a `List<Utf8>` column into per-row vectors; nulls become empty.
fn list_of_strings(col: &dyn Array) -> Result<Vec<Vec<String>>> {
    let list = col
        .as_list_opt::<i32>()
        .context("institutions is not a list column")?;
    let values = cast(list.values(), &DataType::Utf8)?;
    let values = values.as_string::<i32>();
    let offsets = list.value_offsets();
    Ok((0..list.len())
        .map(|i| {
            if list.is_null(i) {
                return Vec::new();
            }
            (offsets[i] as usize..offsets[i + 1] as usize)
                .filter(|&j| values.is_valid(j))
                .map(|j| values.value(j).to_string())
                .collect()
        })
        .collect())
}

/// Split a `List<Struct{code, weight}>` column into per-row apportionments.
fn list_of_apportionments(col: &dyn Array) -> Result<Vec<Vec<Apportionment>>> {
    let list = col
        .as_list_opt::<i32>()
        .context("fields is not a list column")?;
    let entries = list
        .values()
        .as_struct_opt()
        .context("fields entries are not {code, weight} structs")?;
    let code = entries
        .column_by_name("code")
        .context("fields entries lack code")?;
    let code = cast(code, &DataType::Utf8)?;
    let code = code.as_string::<i32>();
    let weight = entries
        .column_by_name("weight")
        .context("fields entries lack weight")?;
    let weight = cast(weight, &DataType::Float64)?;
    let weight = weight.as_primitive::<Float64Type>();
    let offsets = list.value_offsets();
    Ok((0..list.len())
        .map(|i| {
            if list.is_null(i) {
                return Vec::new();
            }
            (offsets[i] as usize..offsets[i + 1] as usize)
                .filter(|&j| entries.is_valid(j) && code.is_valid(j) && weight.is_valid(j))
                .map(|j| Apportionment::new(code.value(j), weight.value(j)))
                .collect()
        })
        .collect())
}

/// One tracked institution.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HepRecord {
    pub ror: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Read the HEP registry. Parquet files need only a `ror` column.
pub fn read_heps(spec: &Path) -> Result<HepSet> {
    let mut rors = Vec::new();
    for path in resolve_inputs(spec)? {
        match format_of(&path)? {
            Format::Parquet => rors.extend(
                read_string_column(&path, "ror")
                    .with_context(|| format!("reading HEP registry {}", path.display()))?,
            ),
            Format::JsonLines => {
                let (rows, skipped) = read_json_lines::<HepRecord>(&path)
                    .with_context(|| format!("reading HEP registry {}", path.display()))?;
                if skipped > 0 {
                    log::warn!("{}: {skipped} malformed HEP rows skipped", path.display());
                }
                rors.extend(rows.into_iter().map(|r| r.ror));
            }
        }
    }
    let heps = HepSet::new(rors);
    log::info!("heps: {} tracked institutions", heps.len());
    Ok(heps)
}

/// Read only `name` from a parquet file, skipping nulls.
fn read_string_column(path: &Path, name: &str) -> Result<Vec<String>> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    if !builder.schema().fields().iter().any(|f| f.name() == name) {
        bail!("no {name} column");
    }
    let mask = ProjectionMask::columns(builder.parquet_schema(), std::iter::once(name));
    let reader = builder.with_projection(mask).build()?;

    let mut out = Vec::new();
    for batch in reader {
        let batch = batch?;
        let col = cast(batch.column(0), &DataType::Utf8)?;
        out.extend(col.as_string::<i32>().iter().flatten().map(str::to_string));
    }
    Ok(out)
}

#[derive(Debug, Deserialize)]
struct FieldNameRow {
    code: String,
    name: String,
}

/// Read a field code → name table (JSON Lines `{code, name}`).
pub fn read_field_names(path: &Path) -> Result<FieldNames> {
    if format_of(path)? != Format::JsonLines {
        bail!("{}: field names must be JSON Lines", path.display());
    }
    let (rows, skipped) = read_json_lines::<FieldNameRow>(path)
        .with_context(|| format!("reading field names {}", path.display()))?;
    if skipped > 0 {
        log::warn!("{}: {skipped} malformed name rows skipped", path.display());
    }
    let names = FieldNames::new(rows.into_iter().map(|r| (r.code, r.name)));
    log::debug!("field names: {} codes", names.len());
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn json_lines_skip_bad_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("papers.jsonl");
        fs::write(
            &path,
            concat!(
                r#"{"doi":"10.1/a","year":2020,"citations":3,"institutions":["r1"],"fields":[{"code":"0601","weight":100}]}"#,
                "\n\n",
                r#"{"doi":"10.1/b","year":2020,"citations":-1}"#,
                "\n",
                "not json\n",
            ),
        )
        .unwrap();
        let papers = read_papers(&path).unwrap();
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].fields[0], Apportionment::new("0601", 100.0));
        assert!(!papers[0].is_oa);
    }

    #[test]
    fn directory_input_reads_all_files() {
        let dir = TempDir::new().unwrap();
        for (name, doi) in [("a.jsonl", "10.1/a"), ("b.jsonl", "10.1/b")] {
            fs::write(
                dir.path().join(name),
                format!(r#"{{"doi":"{doi}","year":2019,"citations":0}}"#),
            )
            .unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        assert_eq!(resolve_inputs(dir.path()).unwrap().len(), 2);
        assert_eq!(read_papers(dir.path()).unwrap().len(), 2);
    }

    #[test]
    fn missing_input_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(read_papers(&dir.path().join("none.parquet")).is_err());
        fs::write(dir.path().join("x.csv"), "").unwrap();
        assert!(read_papers(&dir.path().join("x.csv")).is_err());
    }

    #[test]
    fn hep_registry_from_json_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("heps.jsonl");
        fs::write(
            &path,
            "{\"ror\":\"https://ror.org/02n415q13\",\"code\":\"CUR\",\"name\":\"Curtin\"}\n{\"ror\":\"https://ror.org/02n415q13\"}\n",
        )
        .unwrap();
        let heps = read_heps(&path).unwrap();
        assert_eq!(heps.len(), 1);
        assert!(heps.contains("https://ror.org/02n415q13"));
    }

    #[test]
    fn field_names_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fields.jsonl");
        fs::write(&path, "{\"code\":\"0601\",\"name\":\"Biochemistry\"}\n").unwrap();
        let names = read_field_names(&path).unwrap();
        assert_eq!(names.get("0601"), Some("Biochemistry"));
    }
}
