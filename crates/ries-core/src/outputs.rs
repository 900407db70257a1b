//! Research outputs indicator
//!
//! Per group: distinct papers, their citations, their summed apportionment
//! and mean citations. Within each (field, year) partition every group is
//! placed into one of 100 centile buckets and given a competition rank on
//! each metric, descending.

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::model::{Assignment, Digits, Scope};
use crate::rci::{Dims, GroupKey};

/// Buckets used for centiles.
pub const CENTILE_BUCKETS: usize = 100;

/// One value per ranked metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metrics<T> {
    pub papers: T,
    pub citations: T,
    pub portions: T,
    pub cpp: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputRow {
    pub key: GroupKey,
    pub sum_papers: u64,
    pub sum_citations: u64,
    pub sum_portions: f64,
    pub avg_citations: f64,
    pub centile: Metrics<u32>,
    pub rank: Metrics<u32>,
}

impl OutputRow {
    fn metric(&self, i: usize) -> f64 {
        match i {
            0 => self.sum_papers as f64,
            1 => self.sum_citations as f64,
            2 => self.sum_portions,
            _ => self.avg_citations,
        }
    }
}

/// 1-based bucket of the row at 0-based `position` among `n` ordered rows.
///
/// The first `n % buckets` buckets hold one extra row.
pub fn ntile(position: usize, n: usize, buckets: usize) -> u32 {
    let q = n / buckets;
    let r = n % buckets;
    let big = r * (q + 1);
    let bucket = if position < big {
        position / (q + 1)
    } else {
        r + (position - big) / q.max(1)
    };
    (bucket + 1) as u32
}

/// Competition ranks ("1224") of values already sorted descending.
fn competition_ranks(sorted: &[f64]) -> Vec<u32> {
    let mut ranks = Vec::with_capacity(sorted.len());
    for (i, v) in sorted.iter().enumerate() {
        if i > 0 && sorted[i - 1] == *v {
            ranks.push(ranks[i - 1]);
        } else {
            ranks.push(i as u32 + 1);
        }
    }
    ranks
}

/// Fill centiles and ranks for one partition in place.
fn rank_partition(rows: &mut [OutputRow]) {
    let n = rows.len();
    for metric in 0..4 {
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            rows[b]
                .metric(metric)
                .total_cmp(&rows[a].metric(metric))
                .then_with(|| rows[a].key.cmp(&rows[b].key))
        });
        let values: Vec<f64> = order.iter().map(|&i| rows[i].metric(metric)).collect();
        let ranks = competition_ranks(&values);
        for (pos, &i) in order.iter().enumerate() {
            let (cent, rank) = (ntile(pos, n, CENTILE_BUCKETS), ranks[pos]);
            let row = &mut rows[i];
            let (c, r) = match metric {
                0 => (&mut row.centile.papers, &mut row.rank.papers),
                1 => (&mut row.centile.citations, &mut row.rank.citations),
                2 => (&mut row.centile.portions, &mut row.rank.portions),
                _ => (&mut row.centile.cpp, &mut row.rank.cpp),
            };
            *c = cent;
            *r = rank;
        }
    }
}

/// Research outputs for one scope, digit length and grouping.
///
/// A paper counts once per group. Its portion is the sum of its weights over
/// the distinct fields it has in the group, however many institutions it
/// has, so field-less groupings credit the paper's whole apportionment.
pub fn research_outputs(
    assignments: &[Assignment],
    scope: Scope,
    digits: Digits,
    dims: Dims,
) -> Vec<OutputRow> {
    // group -> paper -> (citations, field -> weight)
    let mut groups: FxHashMap<GroupKey, FxHashMap<&str, (u32, FxHashMap<&str, f64>)>> =
        FxHashMap::default();
    for a in assignments
        .iter()
        .filter(|a| a.digits() == Some(digits) && scope.admits(a))
    {
        let Some(key) = dims.key(a) else { continue };
        let (_, fields) = groups
            .entry(key)
            .or_default()
            .entry(a.paper.as_str())
            .or_insert_with(|| (a.citations, FxHashMap::default()));
        // one row per institution carries the same (paper, field) weight
        fields.entry(a.field.as_str()).or_insert(a.weight);
    }

    // partition by the (field, year) part of the key
    let mut partitions: FxHashMap<(Option<String>, Option<i32>), Vec<OutputRow>> =
        FxHashMap::default();
    for (key, papers) in groups {
        let sum_papers = papers.len() as u64;
        let sum_citations: u64 = papers.values().map(|(c, _)| u64::from(*c)).sum();
        let sum_portions: f64 = papers
            .values()
            .flat_map(|(_, fields)| fields.values())
            .sum();
        let row = OutputRow {
            sum_papers,
            sum_citations,
            sum_portions,
            avg_citations: sum_citations as f64 / sum_papers as f64,
            centile: Metrics::default(),
            rank: Metrics::default(),
            key,
        };
        partitions
            .entry((row.key.field.clone(), row.key.year))
            .or_default()
            .push(row);
    }

    let mut rows: Vec<OutputRow> = partitions
        .into_par_iter()
        .flat_map_iter(|(_, mut rows)| {
            rank_partition(&mut rows);
            rows
        })
        .collect();
    rows.par_sort_by(|a, b| a.key.cmp(&b.key));
    log::debug!(
        "outputs: {} {scope} groups at {digits} digits by {dims}",
        rows.len()
    );
    rows
}
