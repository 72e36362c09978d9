//! Literal find/replace sweeps configured from TOML.
//!
//! ```toml
//! summary = "Removed Category:Media from Delpher"
//! query = 'insource:"Category:Media from Delpher"'
//! namespace = 6
//! guard_marker = "{{Delpher}}"
//! guard_limit = 2
//!
//! [[rules]]
//! find = "[[Category:Media from Delpher]]"
//! replace = ""
//! ```

use std::path::Path;

use relink_store::LinkReplacement;
use relink_store::schema::{DELPHER_TEMPLATE, NAMESPACE_FILE};
use serde::{Deserialize, Serialize};

use super::{PageTransform, Rewrite, RewriteError};

/// A literal pattern replaced at every occurrence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LiteralRule {
    pub find: String,
    #[serde(default)]
    pub replace: String,
}

impl LiteralRule {
    pub fn new(find: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            find: find.into(),
            replace: replace.into(),
        }
    }
}

const fn default_namespace() -> i32 {
    NAMESPACE_FILE
}

fn default_guard_marker() -> Option<String> {
    Some(DELPHER_TEMPLATE.to_string())
}

const fn default_guard_limit() -> usize {
    2
}

/// A search-driven sweep: which pages to visit and what to replace on them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SweepRules {
    pub summary: String,
    pub query: String,
    #[serde(default = "default_namespace")]
    pub namespace: i32,
    #[serde(default = "default_guard_marker")]
    pub guard_marker: Option<String>,
    #[serde(default = "default_guard_limit")]
    pub guard_limit: usize,
    pub rules: Vec<LiteralRule>,
}

impl SweepRules {
    /// Parses and validates sweep rules.
    ///
    /// # Errors
    /// Returns `RewriteError` if the TOML is malformed or a rule is empty.
    pub fn from_toml_str(input: &str) -> Result<Self, RewriteError> {
        let rules: Self = toml::from_str(input)?;
        rules.validate()?;
        Ok(rules)
    }

    /// Reads sweep rules from a TOML file.
    ///
    /// # Errors
    /// Returns `RewriteError` if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, RewriteError> {
        let input = std::fs::read_to_string(path)?;
        Self::from_toml_str(&input)
    }

    fn validate(&self) -> Result<(), RewriteError> {
        if self.summary.trim().is_empty() {
            return Err(RewriteError::InvalidRules("summary is empty".to_string()));
        }
        if self.query.trim().is_empty() {
            return Err(RewriteError::InvalidRules("query is empty".to_string()));
        }
        if self.rules.is_empty() {
            return Err(RewriteError::InvalidRules("no [[rules]] given".to_string()));
        }
        if let Some(idx) = self.rules.iter().position(|rule| rule.find.is_empty()) {
            return Err(RewriteError::InvalidRules(format!(
                "rule {} has an empty 'find'",
                idx + 1
            )));
        }
        Ok(())
    }

    pub fn transform(&self) -> LiteralTransform {
        LiteralTransform {
            summary: self.summary.clone(),
            guard_marker: self.guard_marker.clone().filter(|marker| !marker.is_empty()),
            guard_limit: self.guard_limit,
            rules: self.rules.clone(),
        }
    }
}

/// Applies literal rules in order, skipping pages where the guard marker
/// already occurs more than `guard_limit` times.
#[derive(Debug, Clone)]
pub struct LiteralTransform {
    summary: String,
    guard_marker: Option<String>,
    guard_limit: usize,
    rules: Vec<LiteralRule>,
}

impl LiteralTransform {
    pub fn new(summary: impl Into<String>, rules: Vec<LiteralRule>) -> Self {
        Self {
            summary: summary.into(),
            guard_marker: None,
            guard_limit: 0,
            rules,
        }
    }

    #[must_use]
    pub fn with_guard(mut self, marker: impl Into<String>, limit: usize) -> Self {
        self.guard_marker = Some(marker.into());
        self.guard_limit = limit;
        self
    }
}

impl PageTransform for LiteralTransform {
    fn name(&self) -> &'static str {
        "literal"
    }

    fn summary(&self) -> &str {
        &self.summary
    }

    fn apply(&self, text: &str) -> Result<Rewrite, RewriteError> {
        if let Some(marker) = &self.guard_marker {
            let count = text.matches(marker.as_str()).count();
            if count > self.guard_limit {
                return Ok(Rewrite::Skipped(format!(
                    "{marker} already present {count} times"
                )));
            }
        }

        let mut updated = text.to_string();
        let mut replacements = Vec::new();
        for rule in &self.rules {
            if updated.contains(&rule.find) {
                updated = updated.replace(&rule.find, &rule.replace);
                replacements.push(LinkReplacement {
                    old: rule.find.clone(),
                    new: rule.replace.clone(),
                });
            }
        }

        if replacements.is_empty() || updated == text {
            return Ok(Rewrite::Unchanged);
        }
        Ok(Rewrite::Changed {
            text: updated,
            replacements,
        })
    }
}
