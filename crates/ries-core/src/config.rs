//! Immutable analysis configuration, validated once per run

use serde::{Deserialize, Serialize};

use crate::assign::YearWindow;
use crate::classify::{DEFAULT_STATIC_BOUNDARIES, STATIC_BOUNDARIES};
use crate::error::{Result, RiesError};
use crate::model::{Digits, Scope};
use crate::rci::Dims;

/// Earliest and latest accepted year values.
pub const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1500..=2100;

/// Field taxonomy the analysis runs on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Taxonomy {
    /// Fields of research as delivered
    #[default]
    For,
    /// Fields of education, translated from FoR before assignment
    Foe,
}

/// Content-affecting analysis settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub taxonomy: Taxonomy,
    pub start: i32,
    pub finish: i32,
    pub digits: Vec<Digits>,
    pub scopes: Vec<Scope>,
    pub static_boundaries: [f64; STATIC_BOUNDARIES],
    pub groupings: Vec<Dims>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            taxonomy: Taxonomy::For,
            start: 2011,
            finish: 2022,
            digits: vec![Digits::Four, Digits::Two],
            scopes: vec![Scope::World, Scope::Local],
            static_boundaries: DEFAULT_STATIC_BOUNDARIES,
            groupings: Dims::all_subsets(),
        }
    }
}

impl AnalysisConfig {
    /// Check every setting. Duplicate digits/scopes/groupings are removed.
    pub fn validate(mut self) -> Result<Self> {
        for (name, year) in [("start", self.start), ("finish", self.finish)] {
            if !YEAR_RANGE.contains(&year) {
                return Err(RiesError::Config(format!(
                    "{name} must be a year between 1500 and 2100, got {year}"
                )));
            }
        }
        if self.start > self.finish {
            return Err(RiesError::Config(format!(
                "start ({}) is after finish ({})",
                self.start, self.finish
            )));
        }
        if let Some(bad) = self.static_boundaries.iter().find(|b| !b.is_finite()) {
            return Err(RiesError::Config(format!(
                "static boundaries must be finite, got {bad}"
            )));
        }
        if !self.static_boundaries.windows(2).all(|w| w[0] < w[1]) {
            return Err(RiesError::Config(format!(
                "static boundaries must strictly increase: {:?}",
                self.static_boundaries
            )));
        }
        dedup(&mut self.digits);
        dedup(&mut self.scopes);
        dedup(&mut self.groupings);
        if self.digits.is_empty() {
            return Err(RiesError::Config("digits must not be empty".into()));
        }
        if self.scopes.is_empty() {
            return Err(RiesError::Config("scopes must not be empty".into()));
        }
        if self.groupings.is_empty() {
            self.groupings = Dims::all_subsets();
        }
        Ok(self)
    }

    pub fn window(&self) -> YearWindow {
        YearWindow {
            start: self.start,
            finish: self.finish,
        }
    }

    /// Most tables a run with these settings produces: assignments, four per
    /// digit length, and per scope three fixed plus two per grouping. Digit
    /// lengths absent from the input are skipped and produce none.
    pub fn table_count(&self) -> usize {
        let per_scope = 3 + 2 * self.groupings.len();
        1 + self.digits.len() * (4 + self.scopes.len() * per_scope)
    }
}

/// Drop later duplicates, keeping first-seen order.
fn dedup<T: PartialEq + Copy>(items: &mut Vec<T>) {
    let mut seen = Vec::with_capacity(items.len());
    items.retain(|x| {
        if seen.contains(x) {
            false
        } else {
            seen.push(*x);
            true
        }
    });
}

/// Check a run-version tag: non-empty, `[0-9A-Za-z_-]` only.
pub fn validate_version(version: &str) -> Result<()> {
    if version.is_empty() {
        return Err(RiesError::Config("version must not be empty".into()));
    }
    if !version
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(RiesError::Config(format!(
            "version '{version}' may only contain [0-9A-Za-z_-]"
        )));
    }
    Ok(())
}
