//! Page transforms applied to wikitext before it is saved back to the wiki.

use relink_store::LinkReplacement;
use thiserror::Error;

use crate::parsers::IdentifierError;

pub mod delpher;
pub mod literal;
pub mod source_block;

pub use delpher::DelpherLinkTransform;
pub use literal::{LiteralRule, LiteralTransform, SweepRules};
pub use source_block::{SourceBlockTransform, build_new_source_block, transform_source_block};

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("multiple ({0}) legacy |source= blocks found; refusing to edit an ambiguous page")]
    AmbiguousSourceBlock(usize),
    #[error(transparent)]
    Identifier(#[from] IdentifierError),
    #[error("failed to read sweep rules: {0}")]
    RulesIo(#[from] std::io::Error),
    #[error("invalid sweep rules: {0}")]
    RulesParse(#[from] toml::de::Error),
    #[error("invalid sweep rules: {0}")]
    InvalidRules(String),
}

/// Result of applying a transform to one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rewrite {
    /// Nothing to replace.
    Unchanged,
    /// The page was deliberately left alone.
    Skipped(String),
    Changed {
        text: String,
        replacements: Vec<LinkReplacement>,
    },
}

/// A structured find-and-replace over one page's wikitext.
pub trait PageTransform: Send + Sync {
    /// Short name used in logs and run reports.
    fn name(&self) -> &str;

    /// Edit summary for saved revisions.
    fn summary(&self) -> &str;

    /// Applies the transform.
    ///
    /// # Errors
    /// Returns `RewriteError` when the page cannot be rewritten safely.
    fn apply(&self, text: &str) -> Result<Rewrite, RewriteError>;
}
