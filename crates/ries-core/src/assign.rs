//! Apportionment assigner: papers → atomic assignment rows
//!
//! One row per distinct (paper, institution, field) a paper touches, carrying
//! the field's apportionment weight, the paper's citation count and year, and
//! whether the institution is a tracked HEP.

use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::model::{Assignment, Digits, Paper};

/// Registry of tracked domestic institutions (ROR identifiers).
#[derive(Debug, Default, Clone)]
pub struct HepSet {
    rors: FxHashSet<String>,
}

impl HepSet {
    pub fn new<I, S>(rors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rors: rors.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, ror: &str) -> bool {
        self.rors.contains(ror)
    }

    pub fn len(&self) -> usize {
        self.rors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rors.is_empty()
    }
}

/// Counters reported by the assignment stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignStats {
    pub papers_in: usize,
    pub papers_out_of_window: usize,
    pub malformed_codes: usize,
    pub assignments: usize,
    pub unique_papers: usize,
    pub unique_institutions: usize,
    pub unique_fields: usize,
    pub unique_years: usize,
}

impl AssignStats {
    pub fn log(&self) {
        log::info!(
            "assign: {} rows from {} papers ({} outside year window, {} malformed codes dropped)",
            self.assignments,
            self.unique_papers,
            self.papers_out_of_window,
            self.malformed_codes
        );
        log::debug!(
            "assign: {} institutions, {} fields, {} years",
            self.unique_institutions,
            self.unique_fields,
            self.unique_years
        );
    }
}

/// Field codes of a paper with malformed codes dropped and duplicates merged.
///
/// Returns the kept codes (first-appearance order) and the number dropped.
fn clean_fields(paper: &Paper) -> (Vec<(String, f64)>, usize) {
    let mut kept: Vec<(String, f64)> = Vec::with_capacity(paper.fields.len());
    let mut dropped = 0;
    for app in &paper.fields {
        if app.digits().is_none() || !app.weight.is_finite() || app.weight < 0.0 {
            dropped += 1;
            continue;
        }
        match kept.iter_mut().find(|(code, _)| *code == app.code) {
            Some((_, w)) => *w += app.weight,
            None => kept.push((app.code.clone(), app.weight)),
        }
    }
    (kept, dropped)
}

/// Build the assignment rows for one paper.
///
/// Pure transform; malformed field codes are filtered rather than rejected.
pub fn assign(paper: &Paper, heps: &HepSet) -> Vec<Assignment> {
    assign_counted(paper, heps).0
}

fn assign_counted(paper: &Paper, heps: &HepSet) -> (Vec<Assignment>, usize) {
    let (fields, dropped) = clean_fields(paper);

    let mut institutions: Vec<Option<&str>> = Vec::with_capacity(paper.institutions.len());
    for ror in &paper.institutions {
        if !institutions.contains(&Some(ror.as_str())) {
            institutions.push(Some(ror.as_str()));
        }
    }
    if institutions.is_empty() {
        institutions.push(None);
    }

    let mut rows = Vec::with_capacity(institutions.len() * fields.len());
    for inst in &institutions {
        let is_hep = inst.is_some_and(|ror| heps.contains(ror));
        for (code, weight) in &fields {
            rows.push(Assignment {
                paper: paper.doi.clone(),
                institution: inst.map(str::to_string),
                field: code.clone(),
                field2: code[..Digits::Two.width()].to_string(),
                year: paper.year,
                journal: paper.journal.clone(),
                citations: paper.citations,
                weight: *weight,
                is_hep,
            });
        }
    }
    (rows, dropped)
}

/// Year window applied before assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearWindow {
    pub start: i32,
    pub finish: i32,
}

impl YearWindow {
    pub fn contains(&self, year: i32) -> bool {
        (self.start..=self.finish).contains(&year)
    }
}

/// Assign every paper inside the year window, in parallel.
///
/// Output order follows (institution, field, year, paper).
pub fn assign_all(
    papers: &[Paper],
    heps: &HepSet,
    window: YearWindow,
) -> (Vec<Assignment>, AssignStats) {
    let (mut rows, malformed) = papers
        .par_iter()
        .filter(|p| window.contains(p.year))
        .map(|p| assign_counted(p, heps))
        .reduce(
            || (Vec::new(), 0usize),
            |(mut acc, n), (rows, m)| {
                acc.extend(rows);
                (acc, n + m)
            },
        );

    rows.par_sort_by(|a, b| {
        a.institution
            .cmp(&b.institution)
            .then_with(|| a.field.cmp(&b.field))
            .then_with(|| a.year.cmp(&b.year))
            .then_with(|| a.paper.cmp(&b.paper))
    });

    let in_window = papers.iter().filter(|p| window.contains(p.year)).count();
    let stats = AssignStats {
        papers_in: papers.len(),
        papers_out_of_window: papers.len() - in_window,
        malformed_codes: malformed,
        assignments: rows.len(),
        unique_papers: distinct(&rows, |a| a.paper.as_str()),
        unique_institutions: distinct(&rows, |a| a.institution.as_deref().unwrap_or("")),
        unique_fields: distinct(&rows, |a| a.field.as_str()),
        unique_years: rows.iter().map(|a| a.year).collect::<FxHashSet<_>>().len(),
    };
    (rows, stats)
}

fn distinct<'a>(rows: &'a [Assignment], key: impl Fn(&'a Assignment) -> &'a str) -> usize {
    rows.iter().map(key).collect::<FxHashSet<_>>().len()
}

/// Sum of weights per (paper, institution, digit length).
///
/// Used to check that assignments fully account for each paper's
/// apportionment at every taxonomy level.
pub fn weight_totals(rows: &[Assignment]) -> FxHashMap<(&str, Option<&str>, Digits), f64> {
    let mut totals = FxHashMap::default();
    for a in rows {
        if let Some(d) = a.digits() {
            *totals
                .entry((a.paper.as_str(), a.institution.as_deref(), d))
                .or_insert(0.0) += a.weight;
        }
    }
    totals
}
