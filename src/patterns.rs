//! Composite regular expression matching.
//!
//! Repository and tag rules are written as one or more regular expressions joined by a
//! textual combinator: `"^team-a OR ^team-b"` matches either prefix, while
//! `"^svc && -api$"` requires both. Matching is unanchored, like `Regex::is_match`.

use regex::Regex;
use thiserror::Error;

/// Delimiter for "any part matches"
pub const OR_DELIMITER: &str = "OR";
/// Delimiter for "every part matches"
pub const AND_DELIMITER: &str = "&&";

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid regex part '{part}': {source}")]
    InvalidRegex {
        part: String,
        #[source]
        source: regex::Error,
    },
    #[error("expression '{0}' mixes 'OR' and '&&'; use only one combinator")]
    MixedCombinators(String),
}

/// How the parts of a composite expression are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    Any,
    All,
    Single,
}

/// A parsed and compiled composite expression
#[derive(Debug, Clone)]
pub struct CompositePattern {
    source: String,
    combinator: Combinator,
    parts: Vec<Regex>,
}

impl CompositePattern {
    /// Compile an expression.
    ///
    /// `OR` is checked before `&&`, so an expression containing both is split on `OR`
    /// only and each part keeps its literal `&&`. Use [`CompositePattern::parse_strict`]
    /// to reject that form instead.
    pub fn parse(expression: &str) -> Result<Self, PatternError> {
        let (combinator, raw_parts): (Combinator, Vec<&str>) =
            if expression.contains(OR_DELIMITER) {
                (
                    Combinator::Any,
                    expression.split(OR_DELIMITER).map(str::trim).collect(),
                )
            } else if expression.contains(AND_DELIMITER) {
                (
                    Combinator::All,
                    expression.split(AND_DELIMITER).map(str::trim).collect(),
                )
            } else {
                (Combinator::Single, vec![expression])
            };

        let parts = raw_parts
            .into_iter()
            .map(|part| {
                Regex::new(part).map_err(|source| PatternError::InvalidRegex {
                    part: part.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CompositePattern {
            source: expression.to_string(),
            combinator,
            parts,
        })
    }

    /// Compile an expression, refusing one that uses both combinators.
    pub fn parse_strict(expression: &str) -> Result<Self, PatternError> {
        if expression.contains(OR_DELIMITER) && expression.contains(AND_DELIMITER) {
            return Err(PatternError::MixedCombinators(expression.to_string()));
        }
        Self::parse(expression)
    }

    /// Evaluate the expression against `subject`
    pub fn is_match(&self, subject: &str) -> bool {
        match self.combinator {
            Combinator::Any => self.parts.iter().any(|re| re.is_match(subject)),
            Combinator::All => self.parts.iter().all(|re| re.is_match(subject)),
            Combinator::Single => self.parts[0].is_match(subject),
        }
    }

    pub fn combinator(&self) -> Combinator {
        self.combinator
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// One-shot form of [`CompositePattern::is_match`] for callers holding a raw expression
pub fn matches(subject: &str, expression: &str) -> Result<bool, PatternError> {
    Ok(CompositePattern::parse(expression)?.is_match(subject))
}
