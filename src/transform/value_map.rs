//! Declarative value mapping: ordered match-and-substitute rules

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

use crate::attribute::AttributeValue;

use super::{expect_string, TransformError};

/// One match-and-substitute rule.
///
/// `pattern` is matched against each source value:
/// - `partial_match = false` (default): the pattern is a regex that must
///   match the whole value; `target` may reference capture groups
///   (`$1`, `${name}`).
/// - `partial_match = true`: plain substring containment, no regex.
///
/// Case sensitivity is per-rule, defaulting to sensitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueRule {
    /// Source pattern (regex, or plain substring with `partial_match`)
    pub pattern: String,
    /// Replacement emitted when the rule matches
    pub target: String,
    /// Match case-sensitively (default true)
    #[serde(default = "default_case_sensitive")]
    pub case_sensitive: bool,
    /// Substring containment instead of anchored regex (default false)
    #[serde(default)]
    pub partial_match: bool,
}

fn default_case_sensitive() -> bool {
    true
}

impl ValueRule {
    /// Create a case-sensitive, full-match rule
    pub fn new(pattern: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            target: target.into(),
            case_sensitive: true,
            partial_match: false,
        }
    }

    /// Match case-insensitively
    pub fn case_insensitive(mut self) -> Self {
        self.case_sensitive = false;
        self
    }

    /// Match on substring containment instead of the full value
    pub fn partial(mut self) -> Self {
        self.partial_match = true;
        self
    }

    /// Check the pattern compiles (full-match rules only)
    pub(crate) fn validate(&self) -> Result<(), TransformError> {
        if self.partial_match {
            return Ok(());
        }
        self.compile().map(|_| ())
    }

    fn compile(&self) -> Result<regex::Regex, TransformError> {
        RegexBuilder::new(&format!("^(?:{})$", self.pattern))
            .case_insensitive(!self.case_sensitive)
            .build()
            .map_err(|source| TransformError::InvalidPattern {
                pattern: self.pattern.clone(),
                source,
            })
    }

    /// Apply the rule to one source value, returning the produced output
    /// value when it matches.
    fn apply(&self, value: &str) -> Result<Option<String>, TransformError> {
        if self.partial_match {
            let hit = if self.case_sensitive {
                value.contains(&self.pattern)
            } else {
                value.to_lowercase().contains(&self.pattern.to_lowercase())
            };
            return Ok(hit.then(|| self.target.clone()));
        }

        let regex = self.compile()?;
        match regex.captures(value) {
            Some(caps) => {
                let mut out = String::new();
                caps.expand(&self.target, &mut out);
                Ok(Some(out))
            }
            None => Ok(None),
        }
    }
}

/// An ordered set of [`ValueRule`]s with pass-through and default-value
/// policy.
///
/// Evaluation per source value: rules run in declared order, the first
/// matching rule wins. With `pass_through`, values matching no rule are
/// emitted verbatim; without it they are dropped. When the whole map
/// produces nothing across all source values, the default value (if any)
/// is emitted exactly once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValueMap {
    /// Ordered rules
    #[serde(default)]
    pub rules: Vec<ValueRule>,
    /// Emit unmatched values unchanged
    #[serde(default)]
    pub pass_through: bool,
    /// Emitted once when the map produces no values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

impl ValueMap {
    /// Create an empty map (pass-through off, no default)
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule (builder style)
    pub fn with_rule(mut self, rule: ValueRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Enable pass-through of unmatched values
    pub fn pass_through(mut self, pass_through: bool) -> Self {
        self.pass_through = pass_through;
        self
    }

    /// Set the default value
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// True if the map has neither rules nor a default, i.e. applying it
    /// would be an identity only under pass-through
    pub fn is_vacuous(&self) -> bool {
        self.rules.is_empty() && self.default_value.is_none()
    }

    /// Check every rule pattern compiles. Called at plugin
    /// initialization so bad patterns are configuration errors, not
    /// per-request failures.
    pub fn validate(&self) -> Result<(), TransformError> {
        for rule in &self.rules {
            rule.validate()?;
        }
        Ok(())
    }

    /// Apply the map to the source values.
    ///
    /// Non-string source values are a type mismatch: the definition that
    /// owns this map fails rather than silently dropping values.
    pub fn apply(
        &self,
        values: &[AttributeValue],
    ) -> Result<Vec<AttributeValue>, TransformError> {
        let mut out = Vec::new();
        for value in values {
            let source = expect_string(value)?;
            let mut matched = false;
            for rule in &self.rules {
                if let Some(produced) = rule.apply(source)? {
                    out.push(AttributeValue::Str(produced));
                    matched = true;
                    break; // first matching rule wins
                }
            }
            if !matched && self.pass_through {
                out.push(value.clone());
            }
        }
        if out.is_empty() {
            if let Some(default) = &self.default_value {
                out.push(AttributeValue::Str(default.clone()));
            }
        }
        Ok(out)
    }
}
