use std::path::Path;

use duckdb::Connection;
use indicatif::ProgressBar;
use ries_core::{run, AnalysisConfig, FieldNames, HepSet, ProgressContext};
use ries_io::{read_papers, table_names, write_run};
use tempfile::TempDir;

const CURTIN: &str = "https://ror.org/02n415q13";

/// Three Curtin papers in 0601/2020 with 0, 5 and 20 citations.
fn write_papers(conn: &Connection, path: &Path) {
    let row = |doi: &str, cits: i32| {
        format!(
            "('{doi}', 2020, {cits}, false, NULL::VARCHAR, ['{CURTIN}'], \
             [{{'code': '0601', 'weight': 100.0}}, {{'code': '06', 'weight': 100.0}}])"
        )
    };
    conn.execute_batch(&format!(
        "COPY (SELECT * FROM (VALUES {}, {}, {}) \
           AS t(doi, year, citations, is_oa, journal, institutions, fields)) \
         TO '{}' (FORMAT PARQUET)",
        row("10.1/a", 0),
        row("10.1/b", 5),
        row("10.1/c", 20),
        path.display()
    ))
    .unwrap();
}

fn query_f64(conn: &Connection, dir: &Path, table: &str, expr: &str, filter: &str) -> f64 {
    conn.query_row(
        &format!(
            "SELECT CAST({expr} AS DOUBLE) FROM read_parquet('{}/{table}.parquet') WHERE {filter}",
            dir.display()
        ),
        [],
        |row| row.get(0),
    )
    .unwrap()
}

#[test]
fn parquet_in_parquet_out() {
    let tmp = TempDir::new().unwrap();
    let conn = Connection::open_in_memory().unwrap();
    let input = tmp.path().join("papers.parquet");
    write_papers(&conn, &input);

    let papers = read_papers(&input).unwrap();
    assert_eq!(papers.len(), 3);
    assert_eq!(papers[0].institutions, vec![CURTIN.to_string()]);
    assert_eq!(papers[0].fields.len(), 2);

    let config = AnalysisConfig::default().validate().unwrap();
    let out = run(
        &config,
        papers,
        &HepSet::new([CURTIN]),
        &FieldNames::default(),
        &ProgressContext::hidden(),
    )
    .unwrap();

    let dir = tmp.path().join("run");
    let written = write_run(&out, &dir, 3, &ProgressBar::hidden()).unwrap();
    assert_eq!(written.len(), out.table_count());
    assert_eq!(written.len(), config.table_count());
    let mut expected = table_names(&out);
    expected.sort();
    let names: Vec<String> = written.iter().map(|t| t.name.clone()).collect();
    assert_eq!(names, expected);
    for name in &names {
        assert!(dir.join(format!("{name}.parquet")).exists(), "{name}");
    }

    let assignments = written
        .iter()
        .find(|t| t.name == "core_assignments")
        .unwrap();
    assert_eq!(assignments.rows, 6);

    let cpp = query_f64(
        &conn,
        &dir,
        "benchmarks_world_4",
        "benchmark_cpp",
        "field = '0601' AND year = 2020",
    );
    assert!((cpp - 25.0 / 3.0).abs() < 1e-9);

    let summary = |col: &str| {
        query_f64(
            &conn,
            &dir,
            "rci_classes_summary_world_4",
            col,
            &format!("institution = '{CURTIN}' AND field = '0601'"),
        )
    };
    // ratios 0, 0.6, 2.4 against the default boundaries: classes 0, 1, 4
    assert_eq!(summary("total_0"), 1.0);
    assert_eq!(summary("total_1"), 1.0);
    assert_eq!(summary("total_4"), 1.0);
    assert_eq!(summary("rci_ratio"), 0.5);

    let sum_citations = query_f64(
        &conn,
        &dir,
        "research_outputs_world_4_institution",
        "sum_citations",
        &format!("institution = '{CURTIN}'"),
    );
    assert_eq!(sum_citations, 25.0);

    let max_rci = query_f64(
        &conn,
        &dir,
        "benchmarks_summary_2",
        "maximum_rci",
        "field = '06'",
    );
    assert_eq!(max_rci, 2.4);
}

#[test]
fn group_tables_carry_only_their_keys() {
    let tmp = TempDir::new().unwrap();
    let conn = Connection::open_in_memory().unwrap();
    let input = tmp.path().join("papers.parquet");
    write_papers(&conn, &input);

    let out = run(
        &AnalysisConfig::default().validate().unwrap(),
        read_papers(&input).unwrap(),
        &HepSet::new([CURTIN]),
        &FieldNames::default(),
        &ProgressContext::hidden(),
    )
    .unwrap();
    let dir = tmp.path().join("run");
    write_run(&out, &dir, 3, &ProgressBar::hidden()).unwrap();

    let mut stmt = conn
        .prepare(&format!(
            "SELECT column_name FROM (DESCRIBE SELECT * FROM read_parquet('{}/rci_grouping_local_4_field_year.parquet'))",
            dir.display()
        ))
        .unwrap();
    let cols: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .unwrap()
        .filter_map(|r| r.ok())
        .collect();
    assert_eq!(
        cols,
        ["field", "year", "rci_local", "rci_world", "hpi_world", "weight"]
    );
}
