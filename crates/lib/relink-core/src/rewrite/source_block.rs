use relink_store::LinkReplacement;
use relink_store::schema::{make_resolver_pdf_url, make_resolver_url};
use tracing::{debug, info};

use crate::parsers::{derive_delpher_urn, find_source_blocks, validate_archive_pdf_url};

use super::{PageTransform, Rewrite, RewriteError};

pub const DEFAULT_SOURCE_SUMMARY: &str =
    "Improved sourcing: added Delpher website and direct PDF links";

/// Builds the replacement `|source =` body listing both the Internet Archive
/// and the Delpher resolver locations.
///
/// # Errors
/// Returns `RewriteError::Identifier` when the identifier or PDF URL is invalid.
pub fn build_new_source_block(ia_id: &str, pdf_url: &str) -> Result<String, RewriteError> {
    let pdf_url = validate_archive_pdf_url(pdf_url)?;
    let urn = derive_delpher_urn(ia_id)?;
    let ia_id = ia_id.trim();

    Ok([
        "Internet Archive".to_string(),
        format!("* Website: {{{{Internet Archive link|{ia_id}}}}}"),
        format!("* Direct download: {pdf_url}"),
        "Delpher".to_string(),
        format!("* Website: {}", make_resolver_url(&urn)),
        format!("* Direct download: {}", make_resolver_pdf_url(&urn)),
    ]
    .join("\n"))
}

/// Replaces the single legacy `|source =` block in `text`.
///
/// Returns the text unchanged when no block is present.
///
/// # Errors
/// Returns `RewriteError::AmbiguousSourceBlock` when more than one block is
/// present, or an identifier error when the block cannot be rebuilt.
pub fn transform_source_block(text: &str) -> Result<Rewrite, RewriteError> {
    let matches = find_source_blocks(text);
    let found = match matches.as_slice() {
        [] => {
            debug!("no legacy |source= block found");
            return Ok(Rewrite::Unchanged);
        }
        [found] => found,
        _ => return Err(RewriteError::AmbiguousSourceBlock(matches.len())),
    };

    let urn = derive_delpher_urn(&found.ia_id)?;
    info!(urn = %urn, ia_id = %found.ia_id, "derived URN from IA identifier");
    let new_block = build_new_source_block(&found.ia_id, &found.pdf_url)?;

    let mut updated = String::with_capacity(text.len() + new_block.len());
    updated.push_str(&text[..found.start]);
    updated.push_str(&found.prefix);
    updated.push_str(&new_block);
    updated.push('\n');
    updated.push_str(&text[found.end..]);

    Ok(Rewrite::Changed {
        text: updated,
        replacements: vec![LinkReplacement {
            old: found.pdf_url.clone(),
            new: make_resolver_url(&urn),
        }],
    })
}

/// Adds Delpher resolver links to Commons files that only cite the Internet Archive copy.
#[derive(Debug, Clone)]
pub struct SourceBlockTransform {
    summary: String,
}

impl SourceBlockTransform {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
        }
    }
}

impl Default for SourceBlockTransform {
    fn default() -> Self {
        Self::new(DEFAULT_SOURCE_SUMMARY)
    }
}

impl PageTransform for SourceBlockTransform {
    fn name(&self) -> &'static str {
        "source-block"
    }

    fn summary(&self) -> &str {
        &self.summary
    }

    fn apply(&self, text: &str) -> Result<Rewrite, RewriteError> {
        transform_source_block(text)
    }
}

#[cfg(test)]
mod tests {
    use crate::parsers::IdentifierError;

    use super::*;

    const IA_ID: &str = "KBDDD02_000201168_mpeg21";
    const PDF: &str =
        "https://archive.org/download/KBDDD02_000201168_mpeg21/KBDDD02_000201168_mpeg21.pdf";

    #[test]
    fn builds_block_with_resolver_links() {
        let block = build_new_source_block(IA_ID, PDF).unwrap();
        assert_eq!(
            block,
            "Internet Archive\n\
             * Website: {{Internet Archive link|KBDDD02_000201168_mpeg21}}\n\
             * Direct download: https://archive.org/download/KBDDD02_000201168_mpeg21/KBDDD02_000201168_mpeg21.pdf\n\
             Delpher\n\
             * Website: https://resolver.kb.nl/resolve?urn=KBDDD02:000201168\n\
             * Direct download: https://resolver.kb.nl/resolve?urn=KBDDD02:000201168:mpeg21:pdf"
        );
    }

    #[test]
    fn build_rejects_bad_inputs() {
        assert!(build_new_source_block("bad id", PDF).is_err());
        assert!(build_new_source_block(IA_ID, "https://archive.org/details/x").is_err());
    }

    #[test]
    fn replaces_single_block_and_keeps_surroundings() {
        let text = format!(
            "{{{{Information\n|source =\n:{{{{Internet Archive link|{IA_ID}}}}}\n:{PDF}\n|date = 1900\n}}}}"
        );
        let Rewrite::Changed { text: updated, replacements } = transform_source_block(&text).unwrap()
        else {
            panic!("expected a change");
        };
        let expected = format!(
            "{{{{Information\n|source =\n{}\n|date = 1900\n}}}}",
            build_new_source_block(IA_ID, PDF).unwrap()
        );
        assert_eq!(updated, expected);
        assert_eq!(replacements.len(), 1);
        assert_eq!(replacements[0].new, "https://resolver.kb.nl/resolve?urn=KBDDD02:000201168");
    }

    #[test]
    fn unchanged_without_block_and_error_on_duplicates() {
        assert_eq!(
            transform_source_block("{{Information|source=own work}}").unwrap(),
            Rewrite::Unchanged
        );

        let block = format!("|source =\n:{{{{Internet Archive link|{IA_ID}}}}}\n:{PDF}\n");
        let doubled = format!("{block}{block}");
        assert!(matches!(
            transform_source_block(&doubled),
            Err(RewriteError::AmbiguousSourceBlock(2))
        ));
    }

    #[test]
    fn invalid_identifier_is_an_error() {
        let text = format!("|source =\n:{{{{Internet Archive link|not-an-id}}}}\n:{PDF}\n");
        assert!(matches!(
            transform_source_block(&text),
            Err(RewriteError::Identifier(_))
        ));
    }

    #[test]
    fn blank_identifier_is_an_error() {
        let text = format!("|source =\n:{{{{Internet Archive link|   }}}}\n:{PDF}\n");
        assert!(matches!(
            transform_source_block(&text),
            Err(RewriteError::Identifier(IdentifierError::EmptyId))
        ));
    }

    #[test]
    fn rewritten_page_no_longer_matches() {
        let text = format!("|source =\n:{{{{Internet Archive link|{IA_ID}}}}}\n:{PDF}\n");
        let Rewrite::Changed { text: updated, .. } = transform_source_block(&text).unwrap() else {
            panic!("expected a change");
        };
        assert_eq!(transform_source_block(&updated).unwrap(), Rewrite::Unchanged);
    }
}
