//! Classification engine: scores → ordinal classes
//!
//! A class is the number of boundaries a score strictly exceeds. Static
//! boundaries (six, classes 0..=6) are fixed for the run; dynamic boundaries
//! (five, classes 0..=5) come from the world paper RCI distribution of each
//! (field, year) by characteristic scores and scales.

use std::collections::BTreeMap;

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::error::ratio;
use crate::model::{Assignment, Digits, FieldYear, Scope};
use crate::rci::{GroupScore, PaperScores, Rci};

pub const STATIC_BOUNDARIES: usize = 6;
pub const DYNAMIC_BOUNDARIES: usize = 5;
/// Number of static classes (0..=6).
pub const CLASSES: usize = STATIC_BOUNDARIES + 1;

pub const DEFAULT_STATIC_BOUNDARIES: [f64; STATIC_BOUNDARIES] = [0.0, 0.79, 1.19, 1.99, 3.99, 7.99];

/// Count of boundaries `score` strictly exceeds.
pub fn classify(score: f64, boundaries: &[f64]) -> u8 {
    boundaries.iter().filter(|&&b| score > b).count() as u8
}

/// Dynamic boundaries of one (field, year).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DynamicBoundaries {
    pub c: [f64; DYNAMIC_BOUNDARIES],
    pub max_rci: f64,
}

impl DynamicBoundaries {
    /// Characteristic scores and scales over `rcis`.
    ///
    /// `c0 = 0`, `c1` is the mean, each further boundary is the mean of the
    /// values above the previous one. Once a tail is empty the remaining
    /// boundaries take the maximum.
    pub fn from_rcis(rcis: &[f64]) -> Self {
        let max_rci = rcis.iter().copied().fold(0.0, f64::max);
        let mut c = [0.0; DYNAMIC_BOUNDARIES];
        let mean = |floor: Option<f64>| {
            let tail: Vec<f64> = rcis
                .iter()
                .copied()
                .filter(|&r| floor.is_none_or(|f| r > f))
                .collect();
            (!tail.is_empty()).then(|| ratio(tail.iter().sum(), tail.len() as f64))
        };
        let mut prev = None;
        for slot in c.iter_mut().skip(1) {
            match mean(prev) {
                Some(m) => {
                    *slot = m;
                    prev = Some(m);
                }
                None => *slot = max_rci,
            }
        }
        Self { c, max_rci }
    }
}

/// Boundaries for one (field, year).
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    pub field: String,
    pub year: i32,
    pub dynamic: DynamicBoundaries,
    pub fixed: [f64; STATIC_BOUNDARIES],
}

/// Threshold sets of one digit length.
#[derive(Debug, Clone)]
pub struct ThresholdTable {
    pub digits: Digits,
    pub fixed: [f64; STATIC_BOUNDARIES],
    rows: BTreeMap<FieldYear, Thresholds>,
}

impl ThresholdTable {
    pub fn get(&self, field: &str, year: i32) -> Option<&Thresholds> {
        self.rows.get(&(field.to_string(), year))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Thresholds> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Four classes of a score triple against the (field, year) boundaries.
    ///
    /// Without dynamic boundaries for the key the dynamic class is 0.
    pub fn classes(&self, field: &str, year: i32, rci: &Rci) -> Classes {
        let dynamic = self
            .get(field, year)
            .map_or(0, |t| classify(rci.rci_world, &t.dynamic.c));
        Classes {
            dynamic_world: dynamic,
            static_world: classify(rci.rci_world, &self.fixed),
            static_local: classify(rci.rci_local, &self.fixed),
            static_hpi: classify(rci.hpi_world, &self.fixed),
        }
    }
}

/// Build threshold sets from world paper RCIs, one per observed (field, year).
pub fn thresholds(scores: &PaperScores, fixed: &[f64; STATIC_BOUNDARIES]) -> ThresholdTable {
    let mut groups: FxHashMap<(&str, i32), Vec<f64>> = FxHashMap::default();
    for s in scores.rows() {
        groups
            .entry((s.field.as_str(), s.year))
            .or_default()
            .push(s.rci.rci_world);
    }
    let rows = groups
        .into_par_iter()
        .map(|((field, year), rcis)| {
            let t = Thresholds {
                field: field.to_string(),
                year,
                dynamic: DynamicBoundaries::from_rcis(&rcis),
                fixed: *fixed,
            };
            ((field.to_string(), year), t)
        })
        .collect::<Vec<_>>()
        .into_iter()
        .collect();
    ThresholdTable {
        digits: scores.digits,
        fixed: *fixed,
        rows,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Classes {
    pub dynamic_world: u8,
    pub static_world: u8,
    pub static_local: u8,
    pub static_hpi: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaperClass {
    pub paper: String,
    pub field: String,
    pub year: i32,
    pub classes: Classes,
}

/// Class every scored paper.
pub fn classify_papers(scores: &PaperScores, thresholds: &ThresholdTable) -> Vec<PaperClass> {
    scores
        .rows()
        .par_iter()
        .map(|s| PaperClass {
            paper: s.paper.clone(),
            field: s.field.clone(),
            year: s.year,
            classes: thresholds.classes(&s.field, s.year, &s.rci),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupClass {
    pub institution: String,
    pub field: String,
    pub year: i32,
    pub classes: Classes,
}

/// Class (institution, field, year) group scores. Groups missing any of the
/// three dimensions are skipped.
pub fn classify_groups(groups: &[GroupScore], thresholds: &ThresholdTable) -> Vec<GroupClass> {
    groups
        .par_iter()
        .filter_map(|g| {
            let (Some(inst), Some(field), Some(year)) =
                (&g.key.institution, &g.key.field, g.key.year)
            else {
                return None;
            };
            Some(GroupClass {
                institution: inst.clone(),
                field: field.clone(),
                year,
                classes: thresholds.classes(field, year, &g.rci),
            })
        })
        .collect()
}

/// Static world class tally of one (institution, field).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassSummary {
    pub institution: String,
    pub field: String,
    pub totals: [u64; CLASSES],
    /// Sum of apportionment weight per class
    pub portions: [f64; CLASSES],
    pub rci_low: u64,
    pub rci_high: u64,
    pub rci_ratio: f64,
}

impl ClassSummary {
    fn add(&mut self, class: u8, weight: f64) {
        let c = usize::from(class).min(CLASSES - 1);
        self.totals[c] += 1;
        self.portions[c] += weight;
    }

    fn finish(&mut self) {
        self.rci_low = self.totals[0] + self.totals[1];
        self.rci_high = self.totals[4..].iter().sum();
        self.rci_ratio = high_low_ratio(self.rci_high, self.rci_low);
    }
}

/// `high / low`, or `high` itself when `low` is zero.
pub fn high_low_ratio(high: u64, low: u64) -> f64 {
    if low == 0 {
        high as f64
    } else {
        high as f64 / low as f64
    }
}

/// Tally static world classes per (institution, field) in one pass.
///
/// Each assignment in `scope` looks up its paper class by (paper, field);
/// unclassed assignments count as class 0.
pub fn summarize(
    assignments: &[Assignment],
    classes: &[PaperClass],
    digits: Digits,
    scope: Scope,
) -> Vec<ClassSummary> {
    let by_paper: FxHashMap<(&str, &str), u8> = classes
        .iter()
        .map(|c| ((c.paper.as_str(), c.field.as_str()), c.classes.static_world))
        .collect();

    let mut tallies: BTreeMap<(&str, &str), ClassSummary> = BTreeMap::new();
    for a in assignments
        .iter()
        .filter(|a| a.digits() == Some(digits) && scope.admits(a))
    {
        let Some(inst) = a.institution.as_deref() else {
            continue;
        };
        let class = by_paper
            .get(&(a.paper.as_str(), a.field.as_str()))
            .copied()
            .unwrap_or(0);
        tallies
            .entry((inst, a.field.as_str()))
            .or_insert_with(|| ClassSummary {
                institution: inst.to_string(),
                field: a.field.clone(),
                ..ClassSummary::default()
            })
            .add(class, a.weight);
    }

    tallies
        .into_values()
        .map(|mut s| {
            s.finish();
            s
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_counts_exceeded_boundaries() {
        let b = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(classify(0.0, &b), 0);
        assert_eq!(classify(1.0, &b), 0);
        assert_eq!(classify(1.0001, &b), 1);
        assert_eq!(classify(2.4, &b), 2);
        assert_eq!(classify(99.0, &b), 5);
    }

    #[test]
    fn classify_is_monotone() {
        let b = DEFAULT_STATIC_BOUNDARIES;
        let mut prev = 0;
        for i in 0..2000 {
            let c = classify(f64::from(i) * 0.01, &b);
            assert!(c >= prev);
            prev = c;
        }
        assert_eq!(prev, 6);
    }

    #[test]
    fn dynamic_boundaries_characteristic_scores() {
        let d = DynamicBoundaries::from_rcis(&[0.0, 0.0, 1.0, 3.0, 6.0]);
        assert_eq!(d.c[0], 0.0);
        assert_eq!(d.c[1], 2.0); // mean
        assert_eq!(d.c[2], 4.5); // mean of 3, 6
        assert_eq!(d.c[3], 6.0); // mean of 6
        assert_eq!(d.c[4], 6.0); // empty tail
        assert_eq!(d.max_rci, 6.0);
        assert!(d.c.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn dynamic_boundaries_of_empty_distribution() {
        let d = DynamicBoundaries::from_rcis(&[]);
        assert_eq!(d, DynamicBoundaries::default());
    }

    #[test]
    fn high_low_ratio_literal_rule() {
        assert_eq!(high_low_ratio(3, 0), 3.0);
        assert_eq!(high_low_ratio(0, 2), 0.0);
        assert_eq!(high_low_ratio(3, 2), 1.5);
    }

    fn assignment(paper: &str, inst: &str, weight: f64, hep: bool) -> Assignment {
        Assignment {
            paper: paper.into(),
            institution: Some(inst.into()),
            field: "0601".into(),
            field2: "06".into(),
            year: 2020,
            journal: None,
            citations: 0,
            weight,
            is_hep: hep,
        }
    }

    fn paper_class(paper: &str, static_world: u8) -> PaperClass {
        PaperClass {
            paper: paper.into(),
            field: "0601".into(),
            year: 2020,
            classes: Classes {
                static_world,
                ..Classes::default()
            },
        }
    }

    #[test]
    fn summary_tallies_and_portions() {
        let rows = vec![
            assignment("a", "i", 100.0, true),
            assignment("b", "i", 40.0, true),
            assignment("c", "i", 100.0, true),
            assignment("d", "i", 100.0, true),
        ];
        let classes = vec![
            paper_class("a", 0),
            paper_class("b", 1),
            paper_class("c", 4),
            paper_class("d", 6),
        ];
        let s = summarize(&rows, &classes, Digits::Four, Scope::World);
        assert_eq!(s.len(), 1);
        let s = &s[0];
        assert_eq!(s.totals, [1, 1, 0, 0, 1, 0, 1]);
        assert_eq!(s.portions[1], 40.0);
        assert_eq!(s.rci_low, 2);
        assert_eq!(s.rci_high, 2);
        assert_eq!(s.rci_ratio, 1.0);
    }

    #[test]
    fn summary_joins_on_paper_and_field() {
        let mut other = assignment("a", "i", 100.0, true);
        other.field = "0605".into();
        let rows = vec![assignment("a", "i", 100.0, true), other];
        let classes = vec![paper_class("a", 5)];
        let s = summarize(&rows, &classes, Digits::Four, Scope::World);
        assert_eq!(s.len(), 2);
        assert_eq!(s[0].totals[5], 1);
        // 0605 has no class row of its own
        assert_eq!(s[1].totals[0], 1);
    }

    #[test]
    fn local_summary_drops_foreign_institutions() {
        let rows = vec![
            assignment("a", "hep", 100.0, true),
            assignment("a", "abroad", 100.0, false),
        ];
        let classes = vec![paper_class("a", 2)];
        let s = summarize(&rows, &classes, Digits::Four, Scope::Local);
        assert_eq!(s.len(), 1);
        assert_eq!(s[0].institution, "hep");
    }
}
