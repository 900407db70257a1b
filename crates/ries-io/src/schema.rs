//! Arrow schema definitions for RIES input and output tables
//!
//! Fixed tables get a `&'static Arc<Schema>`. Tables whose key columns depend
//! on the grouping dimensions are built per call.

use std::sync::{Arc, LazyLock};

use arrow::datatypes::{DataType, Field, Fields, Schema};
use ries_core::classify::{CLASSES, DYNAMIC_BOUNDARIES, STATIC_BOUNDARIES};
use ries_core::Dims;

pub const CTILE_COLUMNS: [&str; 5] = ["ctile_01", "ctile_05", "ctile_10", "ctile_25", "ctile_50"];

pub const CLASS_COLUMNS: [&str; 4] = [
    "rci_class_dynamic_world",
    "rci_class_static_world",
    "rci_class_static_local",
    "hpi_class_static_world",
];

/// Ranked research-output metrics, in `Metrics` field order.
pub const METRIC_NAMES: [&str; 4] = ["papers", "citations", "portions", "cpp"];

// Helper for List<Utf8> field
fn list_utf8(name: &str, nullable: bool) -> Field {
    Field::new(
        name,
        DataType::List(Arc::new(Field::new("item", DataType::Utf8, true))),
        nullable,
    )
}

fn f64_fields(prefix: &str, n: usize) -> impl Iterator<Item = Field> + '_ {
    (0..n).map(move |i| Field::new(format!("{prefix}{i}"), DataType::Float64, false))
}

/// Struct of one apportionment entry: `{code, weight}`.
pub fn apportionment_fields() -> Fields {
    Fields::from(vec![
        Field::new("code", DataType::Utf8, false),
        Field::new("weight", DataType::Float64, false),
    ])
}

/// papers: one row per paper, as delivered by ingestion
///
/// `year` and `citations` may be any integer type on disk; readers cast.
pub fn papers() -> &'static Arc<Schema> {
    static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
        Arc::new(Schema::new(vec![
            Field::new("doi", DataType::Utf8, false),
            Field::new("year", DataType::Int32, false),
            Field::new("citations", DataType::Int64, false),
            Field::new("is_oa", DataType::Boolean, true),
            Field::new("journal", DataType::Utf8, true), // ERA journal id
            list_utf8("institutions", true),             // ROR ids
            Field::new(
                "fields",
                DataType::List(Arc::new(Field::new(
                    "item",
                    DataType::Struct(apportionment_fields()),
                    true,
                ))),
                true,
            ),
        ]))
    });
    &SCHEMA
}

/// heps: the tracked (local) institution registry
pub fn heps() -> &'static Arc<Schema> {
    static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
        Arc::new(Schema::new(vec![
            Field::new("ror", DataType::Utf8, false),
            Field::new("code", DataType::Utf8, true),
            Field::new("name", DataType::Utf8, true),
        ]))
    });
    &SCHEMA
}

/// core_assignments: one row per (paper, institution, field)
pub fn assignments() -> &'static Arc<Schema> {
    static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
        Arc::new(Schema::new(vec![
            Field::new("paper", DataType::Utf8, false),
            Field::new("institution", DataType::Utf8, true), // null: unaffiliated
            Field::new("field", DataType::Utf8, false),
            Field::new("field2", DataType::Utf8, false),
            Field::new("year", DataType::Int32, false),
            Field::new("journal", DataType::Utf8, true),
            Field::new("citations", DataType::UInt32, false),
            Field::new("weight", DataType::Float64, false),
            Field::new("is_hep", DataType::Boolean, false),
        ]))
    });
    &SCHEMA
}

/// benchmarks_{scope}_{digits}: citation benchmark per (field, year)
pub fn benchmarks() -> &'static Arc<Schema> {
    static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
        let mut fields = vec![
            Field::new("field", DataType::Utf8, false),
            Field::new("year", DataType::Int32, false),
            Field::new("num_papers", DataType::UInt64, false),
            Field::new("num_uncited", DataType::UInt64, false),
            Field::new("benchmark_cpp", DataType::Float64, false),
            Field::new("benchmark_hpi", DataType::Float64, false),
        ];
        fields.extend(
            CTILE_COLUMNS
                .iter()
                .map(|c| Field::new(*c, DataType::Float64, false)),
        );
        Arc::new(Schema::new(fields))
    });
    &SCHEMA
}

/// benchmarks_rci_world_{digits}: dynamic and static class boundaries
pub fn thresholds() -> &'static Arc<Schema> {
    static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
        let mut fields = vec![
            Field::new("field", DataType::Utf8, false),
            Field::new("year", DataType::Int32, false),
        ];
        fields.extend(f64_fields("dynamic_c", DYNAMIC_BOUNDARIES));
        fields.push(Field::new("maximum_rci", DataType::Float64, false));
        fields.extend(f64_fields("static_c", STATIC_BOUNDARIES));
        Arc::new(Schema::new(fields))
    });
    &SCHEMA
}

/// benchmarks_summary_{digits}: presentation row per world (field, year)
pub fn benchmark_summary() -> &'static Arc<Schema> {
    static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
        let mut fields = vec![
            Field::new("field", DataType::Utf8, false),
            Field::new("name", DataType::Utf8, true),
            Field::new("year", DataType::Int32, false),
            Field::new("num_papers", DataType::UInt64, false),
            Field::new("num_uncited", DataType::UInt64, false),
            Field::new("cpp_local", DataType::Float64, false),
            Field::new("cpp_world", DataType::Float64, false),
            Field::new("cpp_hpi", DataType::Float64, false),
        ];
        fields.extend(
            CTILE_COLUMNS
                .iter()
                .map(|c| Field::new(*c, DataType::Float64, false)),
        );
        fields.extend(f64_fields("dynamic_c", DYNAMIC_BOUNDARIES));
        fields.push(Field::new("maximum_rci", DataType::Float64, false));
        fields.extend(f64_fields("static_c", STATIC_BOUNDARIES));
        Arc::new(Schema::new(fields))
    });
    &SCHEMA
}

/// rci_papers_{digits}: paper-level citation ratios
pub fn paper_scores() -> &'static Arc<Schema> {
    static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
        Arc::new(Schema::new(vec![
            Field::new("paper", DataType::Utf8, false),
            Field::new("field", DataType::Utf8, false),
            Field::new("year", DataType::Int32, false),
            Field::new("citations", DataType::UInt32, false),
            Field::new("rci_local", DataType::Float64, false),
            Field::new("rci_world", DataType::Float64, false),
            Field::new("hpi_world", DataType::Float64, false),
        ]))
    });
    &SCHEMA
}

/// Key columns present for `dims`, in institution/field/year order.
pub fn key_fields(dims: Dims) -> Vec<Field> {
    let mut fields = Vec::with_capacity(3);
    if dims.institution {
        fields.push(Field::new("institution", DataType::Utf8, false));
    }
    if dims.field {
        fields.push(Field::new("field", DataType::Utf8, false));
    }
    if dims.year {
        fields.push(Field::new("year", DataType::Int32, false));
    }
    fields
}

/// rci_grouping_{scope}_{digits}_{dims}: weighted group ratios
pub fn grouping(dims: Dims) -> Arc<Schema> {
    let mut fields = key_fields(dims);
    fields.extend([
        Field::new("rci_local", DataType::Float64, false),
        Field::new("rci_world", DataType::Float64, false),
        Field::new("hpi_world", DataType::Float64, false),
        Field::new("weight", DataType::Float64, false),
    ]);
    Arc::new(Schema::new(fields))
}

fn class_fields() -> impl Iterator<Item = Field> {
    CLASS_COLUMNS
        .iter()
        .map(|c| Field::new(*c, DataType::UInt8, false))
}

/// rci_classes_papers_{digits}
pub fn paper_classes() -> &'static Arc<Schema> {
    static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
        let mut fields = vec![
            Field::new("paper", DataType::Utf8, false),
            Field::new("field", DataType::Utf8, false),
            Field::new("year", DataType::Int32, false),
        ];
        fields.extend(class_fields());
        Arc::new(Schema::new(fields))
    });
    &SCHEMA
}

/// rci_classes_fields_{scope}_{digits}: classes of (institution, field, year) groups
pub fn group_classes() -> &'static Arc<Schema> {
    static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
        let mut fields = key_fields(Dims::ALL);
        fields.extend(class_fields());
        Arc::new(Schema::new(fields))
    });
    &SCHEMA
}

/// rci_classes_summary_{scope}_{digits}: class tallies per (institution, field)
pub fn class_summary() -> &'static Arc<Schema> {
    static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
        let mut fields = vec![
            Field::new("institution", DataType::Utf8, false),
            Field::new("field", DataType::Utf8, false),
        ];
        fields.extend(
            (0..CLASSES).map(|i| Field::new(format!("total_{i}"), DataType::UInt64, false)),
        );
        fields.extend(f64_fields("portions_", CLASSES));
        fields.extend([
            Field::new("rci_low", DataType::UInt64, false),
            Field::new("rci_high", DataType::UInt64, false),
            Field::new("rci_ratio", DataType::Float64, false),
        ]);
        Arc::new(Schema::new(fields))
    });
    &SCHEMA
}

/// research_outputs_{scope}_{digits}_{dims}
pub fn research_outputs(dims: Dims) -> Arc<Schema> {
    let mut fields = key_fields(dims);
    fields.extend([
        Field::new("sum_papers", DataType::UInt64, false),
        Field::new("sum_citations", DataType::UInt64, false),
        Field::new("sum_portions", DataType::Float64, false),
        Field::new("avg_citations", DataType::Float64, false),
    ]);
    for prefix in ["cent_", "rank_"] {
        fields.extend(
            METRIC_NAMES
                .iter()
                .map(|m| Field::new(format!("{prefix}{m}"), DataType::UInt32, false)),
        );
    }
    Arc::new(Schema::new(fields))
}
