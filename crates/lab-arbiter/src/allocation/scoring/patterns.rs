use regex::{Regex, RegexBuilder};

use super::config::DetailPattern;

/// Raised when a configured pattern table cannot be compiled.
#[derive(Debug, thiserror::Error)]
pub enum ScoringConfigError {
    #[error("detail pattern '{name}' is not a valid regular expression: {source}")]
    InvalidPattern {
        name: String,
        #[source]
        source: regex::Error,
    },
    #[error("detail pattern '{name}' has a non-finite or negative weight")]
    InvalidWeight { name: String },
}

struct CompiledPattern {
    name: String,
    regex: Regex,
    weight: f64,
}

/// Compiled form of the detail pattern table. Matching is case-insensitive.
pub struct DetailMatcher {
    patterns: Vec<CompiledPattern>,
}

impl DetailMatcher {
    pub fn compile(table: &[DetailPattern]) -> Result<Self, ScoringConfigError> {
        let patterns = table
            .iter()
            .map(|entry| {
                if !entry.weight.is_finite() || entry.weight < 0.0 {
                    return Err(ScoringConfigError::InvalidWeight {
                        name: entry.name.clone(),
                    });
                }
                let regex = RegexBuilder::new(&entry.pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| ScoringConfigError::InvalidPattern {
                        name: entry.name.clone(),
                        source,
                    })?;
                Ok(CompiledPattern {
                    name: entry.name.clone(),
                    regex,
                    weight: entry.weight,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { patterns })
    }

    /// Names of every pattern found in `text`, in table order.
    pub fn matched<'a>(&'a self, text: &str) -> Vec<&'a str> {
        self.patterns
            .iter()
            .filter(|pattern| pattern.regex.is_match(text))
            .map(|pattern| pattern.name.as_str())
            .collect()
    }

    /// Sum of weights of distinct matched patterns.
    pub fn score(&self, text: &str) -> f64 {
        self.patterns
            .iter()
            .filter(|pattern| pattern.regex.is_match(text))
            .map(|pattern| pattern.weight)
            .sum()
    }
}

/// Number of distinct `phrases` present in the lowercased text.
pub(crate) fn count_phrases(lowercase_text: &str, phrases: &[String]) -> usize {
    phrases
        .iter()
        .filter(|phrase| lowercase_text.contains(phrase.as_str()))
        .count()
}
