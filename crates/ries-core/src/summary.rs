//! Benchmark summary: one presentation row per world (field, year)

use rustc_hash::FxHashMap;

use crate::benchmark::BenchmarkTable;
use crate::classify::{ThresholdTable, DYNAMIC_BOUNDARIES, STATIC_BOUNDARIES};

/// Decimal places of every summary value.
pub const SUMMARY_DP: i32 = 4;

/// Round half away from zero to `dp` decimal places.
pub fn round_dp(value: f64, dp: i32) -> f64 {
    let f = 10f64.powi(dp);
    (value * f).round() / f
}

/// Field code → display name lookup.
#[derive(Debug, Clone, Default)]
pub struct FieldNames {
    names: FxHashMap<String, String>,
}

impl FieldNames {
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            names: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Built-in field-of-education names.
    pub fn foe() -> Self {
        Self::new(crate::translate::foe_names().iter().copied())
    }

    pub fn get(&self, code: &str) -> Option<&str> {
        self.names.get(code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub field: String,
    pub name: Option<String>,
    pub year: i32,
    pub num_papers: u64,
    pub num_uncited: u64,
    pub cpp_local: f64,
    pub cpp_world: f64,
    pub cpp_hpi: f64,
    /// 1/5/10/25/50th percentile citations, ascending (`ctiles[0]` is the low tail)
    pub ctiles: [f64; 5],
    pub dynamic: [f64; DYNAMIC_BOUNDARIES],
    pub max_rci: f64,
    pub fixed: [f64; STATIC_BOUNDARIES],
}

/// Join world and local benchmarks with the threshold sets, rounded for
/// presentation. A missing local benchmark reads as 0.
///
/// Rows follow the world benchmark, so `num_papers` and `num_uncited` count
/// the world population of each (field, year), not the local one.
pub fn benchmark_summary(
    world: &BenchmarkTable,
    local: &BenchmarkTable,
    thresholds: &ThresholdTable,
    names: &FieldNames,
) -> Vec<SummaryRow> {
    let r = |v: f64| round_dp(v, SUMMARY_DP);
    world
        .iter()
        .map(|b| {
            let t = thresholds.get(&b.field, b.year);
            SummaryRow {
                field: b.field.clone(),
                name: names.get(&b.field).map(str::to_string),
                year: b.year,
                num_papers: b.num_papers as u64,
                num_uncited: b.num_uncited as u64,
                cpp_local: r(local.cpp(&b.field, b.year)),
                cpp_world: r(b.cpp),
                cpp_hpi: r(b.hpi),
                ctiles: b.centiles.as_array().map(r),
                dynamic: t.map_or([0.0; DYNAMIC_BOUNDARIES], |t| t.dynamic.c.map(r)),
                max_rci: t.map_or(0.0, |t| r(t.dynamic.max_rci)),
                fixed: thresholds.fixed.map(r),
            }
        })
        .collect()
}
