//! Domain types shared by every analysis stage

use std::fmt;

use serde::{Deserialize, Serialize};

/// Weighted share of a paper's subject matter in one field code.
///
/// Weights of one digit length sum to 100 for a fully apportioned paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Apportionment {
    pub code: String,
    pub weight: f64,
}

impl Apportionment {
    pub fn new(code: impl Into<String>, weight: f64) -> Self {
        Self {
            code: code.into(),
            weight,
        }
    }

    /// Digit length of the code, `None` for malformed codes.
    pub fn digits(&self) -> Option<Digits> {
        Digits::of(&self.code)
    }
}

/// A paper as delivered by ingestion. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    pub doi: String,
    pub year: i32,
    pub citations: u32,
    #[serde(default)]
    pub is_oa: bool,
    /// ERA journal identifier the apportionment was inherited from
    #[serde(default)]
    pub journal: Option<String>,
    /// ROR identifiers, possibly repeated
    #[serde(default)]
    pub institutions: Vec<String>,
    #[serde(default)]
    pub fields: Vec<Apportionment>,
}

/// Taxonomy level of a field code: 2-digit division or 4-digit group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Digits {
    Two,
    Four,
}

impl Digits {
    /// Classify a field code by length. Codes such as `MD` count as 2-digit.
    pub fn of(code: &str) -> Option<Self> {
        if !code.is_ascii() {
            return None;
        }
        match code.len() {
            2 => Some(Self::Two),
            4 => Some(Self::Four),
            _ => None,
        }
    }

    pub const fn width(self) -> usize {
        match self {
            Self::Two => 2,
            Self::Four => 4,
        }
    }
}

impl TryFrom<u8> for Digits {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(Self::Two),
            4 => Ok(Self::Four),
            other => Err(format!("field code length must be 2 or 4, got {other}")),
        }
    }
}

impl From<Digits> for u8 {
    fn from(d: Digits) -> Self {
        d.width() as u8
    }
}

impl fmt::Display for Digits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.width())
    }
}

/// Population an aggregate is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Only assignments to tracked domestic institutions (HEPs)
    Local,
    /// Every assignment
    World,
}

impl Scope {
    pub fn name(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::World => "world",
        }
    }

    /// Whether an assignment belongs to this scope's population.
    pub fn admits(self, assignment: &Assignment) -> bool {
        match self {
            Self::Local => assignment.is_hep,
            Self::World => true,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Atomic analysis unit: one paper × institution × field code.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub paper: String,
    /// `None` for papers without any affiliation
    pub institution: Option<String>,
    pub field: String,
    /// Two-digit parent of `field`
    pub field2: String,
    pub year: i32,
    pub journal: Option<String>,
    pub citations: u32,
    /// Apportionment weight, 0..=100
    pub weight: f64,
    pub is_hep: bool,
}

impl Assignment {
    pub fn digits(&self) -> Option<Digits> {
        Digits::of(&self.field)
    }
}

/// Benchmark/threshold lookup key.
pub type FieldYear = (String, i32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_of_code() {
        assert_eq!(Digits::of("06"), Some(Digits::Two));
        assert_eq!(Digits::of("MD"), Some(Digits::Two));
        assert_eq!(Digits::of("0601"), Some(Digits::Four));
        assert_eq!(Digits::of("060"), None);
        assert_eq!(Digits::of(""), None);
        assert_eq!(Digits::of("aéb"), None);
    }

    #[test]
    fn digits_serde_as_number() {
        let d: Digits = serde_json::from_str("4").unwrap();
        assert_eq!(d, Digits::Four);
        assert!(serde_json::from_str::<Digits>("3").is_err());
    }

    #[test]
    fn local_scope_admits_only_heps() {
        let mut a = Assignment {
            paper: "10.1/a".into(),
            institution: Some("https://ror.org/02n415q13".into()),
            field: "0601".into(),
            field2: "06".into(),
            year: 2020,
            journal: None,
            citations: 3,
            weight: 100.0,
            is_hep: false,
        };
        assert!(Scope::World.admits(&a));
        assert!(!Scope::Local.admits(&a));
        a.is_hep = true;
        assert!(Scope::Local.admits(&a));
    }

    #[test]
    fn paper_defaults_from_json() {
        let p: Paper =
            serde_json::from_str(r#"{"doi":"10.1/x","year":2019,"citations":4}"#).unwrap();
        assert!(p.institutions.is_empty());
        assert!(p.fields.is_empty());
        assert!(!p.is_oa);
    }
}
