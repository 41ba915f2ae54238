//! Taxonomy dimensions, tags and section filters.
//!
//! Dimensions are independent classification axes. The well-known axes are
//! enumerated; any other name is carried as `Custom(name)` so new axes never
//! require engine changes.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Classification axis of a taxonomy tag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TaxonomyDimension {
    Type,
    Profile,
    Exam,
    Skill,
    Competency,
    Trait,
    Difficulty,
    Custom(String),
}

impl TaxonomyDimension {
    /// Returns the canonical string form.
    pub fn as_str(&self) -> &str {
        match self {
            TaxonomyDimension::Type => "type",
            TaxonomyDimension::Profile => "profile",
            TaxonomyDimension::Exam => "exam",
            TaxonomyDimension::Skill => "skill",
            TaxonomyDimension::Competency => "competency",
            TaxonomyDimension::Trait => "trait",
            TaxonomyDimension::Difficulty => "difficulty",
            TaxonomyDimension::Custom(name) => name,
        }
    }
}

impl FromStr for TaxonomyDimension {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let dimension = match normalized.as_str() {
            "" => return Err(ValidationError::empty_field("dimension")),
            "type" => TaxonomyDimension::Type,
            "profile" => TaxonomyDimension::Profile,
            "exam" => TaxonomyDimension::Exam,
            "skill" => TaxonomyDimension::Skill,
            "competency" => TaxonomyDimension::Competency,
            "trait" => TaxonomyDimension::Trait,
            "difficulty" => TaxonomyDimension::Difficulty,
            other => TaxonomyDimension::Custom(other.to_string()),
        };
        Ok(dimension)
    }
}

impl TryFrom<String> for TaxonomyDimension {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TaxonomyDimension> for String {
    fn from(dimension: TaxonomyDimension) -> Self {
        dimension.as_str().to_string()
    }
}

impl fmt::Display for TaxonomyDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single (dimension, tag) classification attached to an item.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaxonomyTag {
    pub dimension: TaxonomyDimension,
    pub tag: String,
}

impl TaxonomyTag {
    pub fn new(dimension: TaxonomyDimension, tag: impl Into<String>) -> Self {
        Self {
            dimension,
            tag: tag.into(),
        }
    }
}

impl fmt::Display for TaxonomyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.dimension, self.tag)
    }
}

/// Section filter: ANDed across dimensions, ORed within a dimension.
///
/// An empty filter matches every item.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxonomyFilter {
    constraints: BTreeMap<TaxonomyDimension, BTreeSet<String>>,
}

impl TaxonomyFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an allowed tag for a dimension (builder style).
    pub fn with_tag(mut self, dimension: TaxonomyDimension, tag: impl Into<String>) -> Self {
        self.constraints
            .entry(dimension)
            .or_default()
            .insert(tag.into());
        self
    }

    /// Iterates over (dimension, allowed tags) constraints in stable order.
    pub fn constraints(&self) -> impl Iterator<Item = (&TaxonomyDimension, &BTreeSet<String>)> {
        self.constraints.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// True if the tag set satisfies every dimension constraint.
    pub fn matches(&self, tags: &BTreeSet<TaxonomyTag>) -> bool {
        self.constraints.iter().all(|(dimension, allowed)| {
            tags.iter()
                .any(|t| &t.dimension == dimension && allowed.contains(&t.tag))
        })
    }

    /// Rejects dimensions whose allowed set is empty (unsatisfiable).
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (dimension, allowed) in &self.constraints {
            if allowed.is_empty() || allowed.iter().any(|t| t.trim().is_empty()) {
                return Err(ValidationError::invalid_format(
                    "filter",
                    format!("dimension '{}' has an empty allowed tag", dimension),
                ));
            }
        }
        Ok(())
    }

    /// Stable, human-readable key used for health buckets and logs.
    pub fn bucket_key(&self) -> String {
        if self.constraints.is_empty() {
            return "*".to_string();
        }
        self.constraints
            .iter()
            .map(|(dimension, allowed)| {
                let tags: Vec<&str> = allowed.iter().map(String::as_str).collect();
                format!("{}={}", dimension, tags.join("|"))
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Parses the `bucket_key` form, e.g. `skill=dsa,difficulty=easy|hard` or `*`.
impl FromStr for TaxonomyFilter {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ValidationError::empty_field("filter"));
        }
        let mut filter = TaxonomyFilter::new();
        if s == "*" {
            return Ok(filter);
        }
        for clause in s.split(',') {
            let (dimension, tags) = clause.split_once('=').ok_or_else(|| {
                ValidationError::invalid_format("filter", format!("expected dim=tag in '{}'", clause))
            })?;
            let dimension: TaxonomyDimension = dimension.parse()?;
            for tag in tags.split('|') {
                let tag = tag.trim();
                if tag.is_empty() {
                    return Err(ValidationError::invalid_format(
                        "filter",
                        format!("empty tag for dimension '{}'", dimension),
                    ));
                }
                filter = filter.with_tag(dimension.clone(), tag);
            }
        }
        Ok(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(TaxonomyDimension, &str)]) -> BTreeSet<TaxonomyTag> {
        pairs
            .iter()
            .map(|(d, t)| TaxonomyTag::new(d.clone(), *t))
            .collect()
    }

    #[test]
    fn bucket_key_parses_back_into_the_same_filter() {
        let filter = TaxonomyFilter::new()
            .with_tag(TaxonomyDimension::Skill, "dsa")
            .with_tag(TaxonomyDimension::Difficulty, "easy")
            .with_tag(TaxonomyDimension::Difficulty, "hard");

        let parsed: TaxonomyFilter = filter.bucket_key().parse().unwrap();

        assert_eq!(parsed, filter);
        assert_eq!("*".parse::<TaxonomyFilter>().unwrap(), TaxonomyFilter::new());
        assert!("skill".parse::<TaxonomyFilter>().is_err());
        assert!("skill=".parse::<TaxonomyFilter>().is_err());
        assert!("".parse::<TaxonomyFilter>().is_err());
    }

    #[test]
    fn dimension_parses_known_and_custom_names() {
        assert_eq!("skill".parse::<TaxonomyDimension>().unwrap(), TaxonomyDimension::Skill);
        assert_eq!(
            "Difficulty".parse::<TaxonomyDimension>().unwrap(),
            TaxonomyDimension::Difficulty
        );
        assert_eq!(
            "language".parse::<TaxonomyDimension>().unwrap(),
            TaxonomyDimension::Custom("language".to_string())
        );
        assert!("".parse::<TaxonomyDimension>().is_err());
    }

    #[test]
    fn filter_ands_across_dimensions() {
        let filter = TaxonomyFilter::new()
            .with_tag(TaxonomyDimension::Skill, "dsa")
            .with_tag(TaxonomyDimension::Difficulty, "hard");

        let hard_dsa = tags(&[
            (TaxonomyDimension::Skill, "dsa"),
            (TaxonomyDimension::Difficulty, "hard"),
        ]);
        let easy_dsa = tags(&[
            (TaxonomyDimension::Skill, "dsa"),
            (TaxonomyDimension::Difficulty, "easy"),
        ]);

        assert!(filter.matches(&hard_dsa));
        assert!(!filter.matches(&easy_dsa));
    }

    #[test]
    fn filter_ors_within_a_dimension() {
        let filter = TaxonomyFilter::new()
            .with_tag(TaxonomyDimension::Skill, "dsa")
            .with_tag(TaxonomyDimension::Skill, "sql");

        assert!(filter.matches(&tags(&[(TaxonomyDimension::Skill, "sql")])));
        assert!(!filter.matches(&tags(&[(TaxonomyDimension::Skill, "java")])));
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(TaxonomyFilter::new().matches(&BTreeSet::new()));
    }

    #[test]
    fn filter_serializes_as_dimension_map() {
        let filter = TaxonomyFilter::new().with_tag(TaxonomyDimension::Skill, "dsa");
        let json = serde_json::to_string(&filter).unwrap();
        assert_eq!(json, r#"{"skill":["dsa"]}"#);

        let back: TaxonomyFilter = serde_json::from_str(&json).unwrap();
        assert_eq!(back, filter);
    }

    #[test]
    fn bucket_key_is_stable() {
        let filter = TaxonomyFilter::new()
            .with_tag(TaxonomyDimension::Skill, "sql")
            .with_tag(TaxonomyDimension::Skill, "dsa")
            .with_tag(TaxonomyDimension::Exam, "gate");
        assert_eq!(filter.bucket_key(), "exam=gate,skill=dsa|sql");
    }
}
