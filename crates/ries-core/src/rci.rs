//! RCI / HPI scorer
//!
//! Two stages, never collapsed: every (paper, field) first gets its own
//! citation ratio against the matching benchmark, then groups take the
//! apportionment-weighted mean of those ratios.

use std::collections::BTreeMap;
use std::fmt;

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::benchmark::BenchmarkTable;
use crate::error::{ratio, Result, RiesError};
use crate::model::{Assignment, Digits, Scope};
use crate::pipeline::Stage;

/// Citation ratios of one scored unit.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rci {
    pub rci_local: f64,
    pub rci_world: f64,
    pub hpi_world: f64,
}

/// Paper-level score, keyed by (paper, field, year).
#[derive(Debug, Clone, PartialEq)]
pub struct PaperScore {
    pub paper: String,
    pub field: String,
    pub year: i32,
    pub citations: u32,
    pub rci: Rci,
}

/// Score one assignment against the local and world benchmarks.
///
/// A missing or zero benchmark gives a ratio of `0.0`.
pub fn score(assignment: &Assignment, local: &BenchmarkTable, world: &BenchmarkTable) -> Rci {
    let cits = f64::from(assignment.citations);
    let (field, year) = (assignment.field.as_str(), assignment.year);
    Rci {
        rci_local: ratio(cits, local.cpp(field, year)),
        rci_world: ratio(cits, world.cpp(field, year)),
        hpi_world: ratio(cits, world.hpi(field, year)),
    }
}

/// Counters reported by paper scoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreStats {
    pub papers: usize,
    pub missing_local: usize,
    pub missing_world: usize,
}

/// Paper-level scores at one digit length with a (paper, field) index.
#[derive(Debug, Clone)]
pub struct PaperScores {
    pub digits: Digits,
    rows: Vec<PaperScore>,
    index: FxHashMap<(String, String), usize>,
}

impl PaperScores {
    /// Rows in (field, year, paper) order.
    pub fn rows(&self) -> &[PaperScore] {
        &self.rows
    }

    pub fn get(&self, paper: &str, field: &str) -> Option<&PaperScore> {
        self.index
            .get(&(paper.to_string(), field.to_string()))
            .map(|&i| &self.rows[i])
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Score every distinct (paper, field) at `digits`.
pub fn score_papers(
    assignments: &[Assignment],
    digits: Digits,
    local: &BenchmarkTable,
    world: &BenchmarkTable,
) -> Result<(PaperScores, ScoreStats)> {
    if world.is_empty() {
        return Err(RiesError::StageDependency {
            stage: Stage::Score,
            missing: "benchmarks_world",
        });
    }

    let mut seen: FxHashMap<(&str, &str), &Assignment> = FxHashMap::default();
    for a in assignments.iter().filter(|a| a.digits() == Some(digits)) {
        seen.entry((a.paper.as_str(), a.field.as_str())).or_insert(a);
    }

    let mut rows: Vec<PaperScore> = seen
        .into_par_iter()
        .map(|(_, a)| PaperScore {
            paper: a.paper.clone(),
            field: a.field.clone(),
            year: a.year,
            citations: a.citations,
            rci: score(a, local, world),
        })
        .collect();
    rows.par_sort_by(|a, b| {
        a.field
            .cmp(&b.field)
            .then_with(|| a.year.cmp(&b.year))
            .then_with(|| a.paper.cmp(&b.paper))
    });

    let stats = ScoreStats {
        papers: rows.len(),
        missing_local: rows
            .iter()
            .filter(|r| local.get(&r.field, r.year).is_none())
            .count(),
        missing_world: rows
            .iter()
            .filter(|r| world.get(&r.field, r.year).is_none())
            .count(),
    };
    if stats.missing_local > 0 {
        log::debug!(
            "score: {} papers at {digits} digits have no local benchmark, rci_local = 0",
            stats.missing_local
        );
    }

    let index = rows
        .iter()
        .enumerate()
        .map(|(i, r)| ((r.paper.clone(), r.field.clone()), i))
        .collect();
    Ok((
        PaperScores {
            digits,
            rows,
            index,
        },
        stats,
    ))
}

/// Weighted mean of `(value, weight)` pairs, `0.0` when the weights sum to zero.
pub fn weighted_mean(pairs: impl IntoIterator<Item = (f64, f64)>) -> f64 {
    let (num, den) = pairs
        .into_iter()
        .fold((0.0, 0.0), |(n, d), (v, w)| (n + v * w, d + w));
    ratio(num, den)
}

/// One grouping dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Institution,
    Field,
    Year,
}

/// Non-empty subset of {institution, field, year} a grouping is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<Dimension>", into = "Vec<Dimension>")]
pub struct Dims {
    pub institution: bool,
    pub field: bool,
    pub year: bool,
}

impl Dims {
    pub const ALL: Self = Self {
        institution: true,
        field: true,
        year: true,
    };

    /// All seven non-empty subsets, largest first.
    pub fn all_subsets() -> Vec<Self> {
        let mut out: Vec<Self> = (1u8..8)
            .rev()
            .map(|bits| Self {
                institution: bits & 4 != 0,
                field: bits & 2 != 0,
                year: bits & 1 != 0,
            })
            .collect();
        out.sort_by_key(|d| std::cmp::Reverse(d.count()));
        out
    }

    pub fn count(self) -> usize {
        usize::from(self.institution) + usize::from(self.field) + usize::from(self.year)
    }

    /// Table-name suffix, e.g. `institution_field_year`.
    pub fn name(self) -> String {
        Vec::<Dimension>::from(self)
            .iter()
            .map(|d| match d {
                Dimension::Institution => "institution",
                Dimension::Field => "field",
                Dimension::Year => "year",
            })
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Group key of an assignment, `None` when an institution-keyed grouping
    /// meets an unaffiliated row.
    pub fn key(self, a: &Assignment) -> Option<GroupKey> {
        if self.institution && a.institution.is_none() {
            return None;
        }
        Some(GroupKey {
            institution: if self.institution {
                a.institution.clone()
            } else {
                None
            },
            field: self.field.then(|| a.field.clone()),
            year: self.year.then_some(a.year),
        })
    }
}

impl TryFrom<Vec<Dimension>> for Dims {
    type Error = String;

    fn try_from(dims: Vec<Dimension>) -> std::result::Result<Self, Self::Error> {
        if dims.is_empty() {
            return Err("a grouping needs at least one dimension".into());
        }
        Ok(Self {
            institution: dims.contains(&Dimension::Institution),
            field: dims.contains(&Dimension::Field),
            year: dims.contains(&Dimension::Year),
        })
    }
}

impl From<Dims> for Vec<Dimension> {
    fn from(d: Dims) -> Self {
        let mut out = Vec::with_capacity(3);
        if d.institution {
            out.push(Dimension::Institution);
        }
        if d.field {
            out.push(Dimension::Field);
        }
        if d.year {
            out.push(Dimension::Year);
        }
        out
    }
}

impl fmt::Display for Dims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Group identity; dimensions outside the grouping are `None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub institution: Option<String>,
    pub field: Option<String>,
    pub year: Option<i32>,
}

/// Weighted RCI/HPI of one group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupScore {
    pub key: GroupKey,
    pub rci: Rci,
    /// Sum of apportionment weights in the group
    pub weight: f64,
}

/// Weighted group scores for one scope, digit length and grouping.
///
/// Unscored assignments contribute a ratio of `0.0`. Output is in key order.
pub fn score_groups(
    assignments: &[Assignment],
    scores: &PaperScores,
    scope: Scope,
    dims: Dims,
) -> Vec<GroupScore> {
    let mut groups: FxHashMap<GroupKey, Vec<(&Assignment, Rci)>> = FxHashMap::default();
    for a in assignments
        .iter()
        .filter(|a| a.digits() == Some(scores.digits) && scope.admits(a))
    {
        let Some(key) = dims.key(a) else { continue };
        let rci = scores
            .get(&a.paper, &a.field)
            .map(|s| s.rci)
            .unwrap_or_default();
        groups.entry(key).or_default().push((a, rci));
    }

    let scored: BTreeMap<GroupKey, GroupScore> = groups
        .into_par_iter()
        .map(|(key, members)| {
            let mean = |f: fn(&Rci) -> f64| weighted_mean(members.iter().map(|(a, r)| (f(r), a.weight)));
            let score = GroupScore {
                key: key.clone(),
                rci: Rci {
                    rci_local: mean(|r| r.rci_local),
                    rci_world: mean(|r| r.rci_world),
                    hpi_world: mean(|r| r.hpi_world),
                },
                weight: members.iter().map(|(a, _)| a.weight).sum(),
            };
            (key, score)
        })
        .collect::<Vec<_>>()
        .into_iter()
        .collect();
    scored.into_values().collect()
}
