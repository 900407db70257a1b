//! Benchmark aggregator: citation benchmarks per (field, year)
//!
//! Each group counts a paper once, with its total citation count, no matter
//! how many assignment rows (institutions) reference it.
//!
//! Centiles use linear interpolation between order statistics of the
//! ascending per-paper citation counts: for quantile `q` over `n` values the
//! position is `q * (n - 1)`. The high-performer benchmark is the mean of the
//! top `ceil(n / 10)` papers ranked by citations descending, ties broken by
//! paper identifier.

use std::collections::BTreeMap;

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::error::{Result, RiesError};
use crate::model::{Assignment, Digits, FieldYear, Scope};
use crate::pipeline::Stage;

/// Quantiles reported as centile thresholds, taken over ascending citation
/// counts. `ctile_01` is the 1st percentile of the low tail, so the centiles
/// never decrease from `ctile_01` to `ctile_50`.
pub const CENTILE_QUANTILES: [f64; 5] = [0.01, 0.05, 0.10, 0.25, 0.50];

/// Share of a group's papers that forms the high-performer set.
const HIGH_PERFORMER_SHARE: usize = 10;

/// Citation thresholds at the 1st/5th/10th/25th/50th percentile.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Centiles {
    pub p1: f64,
    pub p5: f64,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
}

impl Centiles {
    pub fn as_array(&self) -> [f64; 5] {
        [self.p1, self.p5, self.p10, self.p25, self.p50]
    }
}

/// Citation benchmark of one (field, year) group.
#[derive(Debug, Clone, PartialEq)]
pub struct Benchmark {
    pub field: String,
    pub year: i32,
    pub num_papers: usize,
    pub num_uncited: usize,
    /// Mean citations per paper
    pub cpp: f64,
    /// Mean citations of the top decile
    pub hpi: f64,
    pub centiles: Centiles,
}

/// All benchmarks of one scope and digit length, keyed by (field, year).
#[derive(Debug, Clone)]
pub struct BenchmarkTable {
    pub scope: Scope,
    pub digits: Digits,
    rows: BTreeMap<FieldYear, Benchmark>,
}

impl BenchmarkTable {
    pub fn empty(scope: Scope, digits: Digits) -> Self {
        Self {
            scope,
            digits,
            rows: BTreeMap::new(),
        }
    }

    pub fn get(&self, field: &str, year: i32) -> Option<&Benchmark> {
        self.rows.get(&(field.to_string(), year))
    }

    /// Citations per paper, `0.0` when the group has no benchmark.
    pub fn cpp(&self, field: &str, year: i32) -> f64 {
        self.get(field, year).map_or(0.0, |b| b.cpp)
    }

    /// High-performer citations per paper, `0.0` when missing.
    pub fn hpi(&self, field: &str, year: i32) -> f64 {
        self.get(field, year).map_or(0.0, |b| b.hpi)
    }

    /// Benchmarks in (field, year) order.
    pub fn iter(&self) -> impl Iterator<Item = &Benchmark> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Linear-interpolation quantile of ascending `sorted` values.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        }
    }
}

/// Compute the benchmark of one group from its (paper, citations) members.
///
/// An empty group yields zeros rather than failing.
pub fn benchmark_group(field: &str, year: i32, papers: &mut [(&str, u32)]) -> Benchmark {
    let n = papers.len();
    if n == 0 {
        return Benchmark {
            field: field.to_string(),
            year,
            num_papers: 0,
            num_uncited: 0,
            cpp: 0.0,
            hpi: 0.0,
            centiles: Centiles::default(),
        };
    }

    let total: u64 = papers.iter().map(|(_, c)| u64::from(*c)).sum();
    let num_uncited = papers.iter().filter(|(_, c)| *c == 0).count();

    // descending citations, then paper id, gives a strict rank cutoff
    papers.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    let top = n.div_ceil(HIGH_PERFORMER_SHARE);
    let top_total: u64 = papers[..top].iter().map(|(_, c)| u64::from(*c)).sum();

    let ascending: Vec<f64> = papers.iter().rev().map(|(_, c)| f64::from(*c)).collect();
    let [p1, p5, p10, p25, p50] = CENTILE_QUANTILES.map(|q| quantile(&ascending, q));

    Benchmark {
        field: field.to_string(),
        year,
        num_papers: n,
        num_uncited,
        cpp: total as f64 / n as f64,
        hpi: top_total as f64 / top as f64,
        centiles: Centiles {
            p1,
            p5,
            p10,
            p25,
            p50,
        },
    }
}

/// Aggregate benchmarks for every observed (field, year) at `digits`.
///
/// `scope` restricts the population to HEP assignments (`Local`) or keeps
/// everything (`World`). No gap filling for absent combinations.
pub fn aggregate(assignments: &[Assignment], scope: Scope, digits: Digits) -> Result<BenchmarkTable> {
    if assignments.is_empty() {
        return Err(RiesError::StageDependency {
            stage: Stage::Benchmark,
            missing: "assignments",
        });
    }

    let mut groups: FxHashMap<(&str, i32), FxHashMap<&str, u32>> = FxHashMap::default();
    for a in assignments
        .iter()
        .filter(|a| a.digits() == Some(digits) && scope.admits(a))
    {
        groups
            .entry((a.field.as_str(), a.year))
            .or_default()
            .entry(a.paper.as_str())
            .or_insert(a.citations);
    }

    if groups.is_empty() {
        if scope == Scope::World {
            return Err(RiesError::EmptyPopulation {
                stage: Stage::Benchmark,
            });
        }
        log::warn!("benchmark: {scope} population at {digits} digits is empty");
        return Ok(BenchmarkTable::empty(scope, digits));
    }

    let rows: BTreeMap<FieldYear, Benchmark> = groups
        .into_par_iter()
        .map(|((field, year), members)| {
            let mut papers: Vec<(&str, u32)> = members.into_iter().collect();
            let b = benchmark_group(field, year, &mut papers);
            ((field.to_string(), year), b)
        })
        .collect::<Vec<_>>()
        .into_iter()
        .collect();

    log::info!(
        "benchmark: {} {scope} groups at {digits} digits",
        rows.len()
    );
    Ok(BenchmarkTable {
        scope,
        digits,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(paper: &str, inst: &str, field: &str, year: i32, cits: u32, hep: bool) -> Assignment {
        Assignment {
            paper: paper.into(),
            institution: Some(inst.into()),
            field: field.into(),
            field2: field[..2].into(),
            year,
            journal: None,
            citations: cits,
            weight: 100.0,
            is_hep: hep,
        }
    }

    #[test]
    fn quantile_interpolates() {
        let v = [0.0, 10.0];
        assert_eq!(quantile(&v, 0.5), 5.0);
        assert_eq!(quantile(&v, 0.0), 0.0);
        assert_eq!(quantile(&v, 1.0), 10.0);
        assert_eq!(quantile(&[], 0.5), 0.0);
        assert_eq!(quantile(&[3.0], 0.25), 3.0);
    }

    #[test]
    fn paper_counted_once_per_group() {
        let rows = vec![
            row("a", "i1", "0601", 2020, 0, true),
            row("b", "i1", "0601", 2020, 5, true),
            row("b", "i2", "0601", 2020, 5, false),
            row("c", "i2", "0601", 2020, 20, false),
        ];
        let table = aggregate(&rows, Scope::World, Digits::Four).unwrap();
        let b = table.get("0601", 2020).unwrap();
        assert_eq!(b.num_papers, 3);
        assert_eq!(b.num_uncited, 1);
        assert!((b.cpp - 25.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn local_scope_filters_heps() {
        let rows = vec![
            row("a", "i1", "0601", 2020, 4, true),
            row("c", "i2", "0601", 2020, 20, false),
        ];
        let table = aggregate(&rows, Scope::Local, Digits::Four).unwrap();
        assert_eq!(table.get("0601", 2020).unwrap().num_papers, 1);
        assert_eq!(table.cpp("0601", 2020), 4.0);
    }

    #[test]
    fn groups_split_by_digits_and_year() {
        let rows = vec![
            row("a", "i1", "0601", 2020, 4, true),
            row("a", "i1", "06", 2020, 4, true),
            row("b", "i1", "0601", 2021, 8, true),
        ];
        let four = aggregate(&rows, Scope::World, Digits::Four).unwrap();
        assert_eq!(four.len(), 2);
        let two = aggregate(&rows, Scope::World, Digits::Two).unwrap();
        assert_eq!(two.len(), 1);
        assert!(two.get("06", 2020).is_some());
        assert!(two.get("06", 2021).is_none());
    }

    #[test]
    fn high_performer_is_top_decile() {
        // 20 papers, cits 1..=20: top 2 are 20 and 19
        let rows: Vec<_> = (1..=20)
            .map(|i| row(&format!("p{i:02}"), "i", "0601", 2020, i, false))
            .collect();
        let table = aggregate(&rows, Scope::World, Digits::Four).unwrap();
        assert_eq!(table.hpi("0601", 2020), 19.5);
    }

    #[test]
    fn high_performer_small_group_uses_one_paper() {
        let mut papers = vec![("a", 3), ("b", 9), ("c", 1)];
        let b = benchmark_group("0601", 2020, &mut papers);
        assert_eq!(b.hpi, 9.0);
    }

    #[test]
    fn centiles_non_decreasing() {
        let mut papers: Vec<(&str, u32)> = vec![
            ("a", 0),
            ("b", 0),
            ("c", 3),
            ("d", 1),
            ("e", 50),
            ("f", 7),
            ("g", 2),
        ];
        let b = benchmark_group("0601", 2020, &mut papers);
        let c = b.centiles.as_array();
        assert!(c.windows(2).all(|w| w[0] <= w[1]), "{c:?}");
        assert_eq!(b.centiles.p50, 2.0);
    }

    #[test]
    fn empty_group_is_zero() {
        let b = benchmark_group("0601", 2020, &mut []);
        assert_eq!(b.num_papers, 0);
        assert_eq!(b.cpp, 0.0);
    }

    #[test]
    fn missing_benchmark_reads_as_zero() {
        let rows = vec![row("a", "i1", "0601", 2020, 4, true)];
        let table = aggregate(&rows, Scope::World, Digits::Four).unwrap();
        assert_eq!(table.cpp("9999", 2020), 0.0);
        assert_eq!(table.hpi("0601", 1999), 0.0);
    }

    #[test]
    fn empty_input_is_stage_dependency_failure() {
        assert!(matches!(
            aggregate(&[], Scope::World, Digits::Four),
            Err(RiesError::StageDependency { .. })
        ));
    }

    #[test]
    fn empty_world_population_fails_but_local_does_not() {
        let rows = vec![row("a", "i1", "06", 2020, 4, false)];
        assert!(matches!(
            aggregate(&rows, Scope::World, Digits::Four),
            Err(RiesError::EmptyPopulation { .. })
        ));
        let local = aggregate(&rows, Scope::Local, Digits::Two).unwrap();
        assert!(local.is_empty());
    }
}
