use relink_store::schema::make_resolver_url;
use relink_store::{LinkClass, LinkReplacement};
use tracing::debug;

use crate::parsers::{classify_link, scan_external_links};

use super::{PageTransform, Rewrite, RewriteError};

pub const DEFAULT_RELINK_SUMMARY: &str =
    "Replaced non-persistent Delpher links with KB resolver links";

/// Rewrites Delpher viewer links into persistent resolver links.
///
/// Links that are already persistent, or whose identifier cannot be
/// recovered, are left untouched.
#[derive(Debug, Clone)]
pub struct DelpherLinkTransform {
    summary: String,
}

impl DelpherLinkTransform {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
        }
    }

    /// Computes the replacements without building the new text.
    pub fn plan(text: &str) -> Vec<(usize, usize, LinkReplacement)> {
        scan_external_links(text)
            .into_iter()
            .filter_map(|link| match classify_link(&link.url) {
                LinkClass::Delpher { urn: Some(urn) } => Some((
                    link.start,
                    link.end,
                    LinkReplacement {
                        new: make_resolver_url(&urn),
                        old: link.url,
                    },
                )),
                LinkClass::Delpher { urn: None } => {
                    debug!(url = %link.url, "delpher link without identifier left as is");
                    None
                }
                _ => None,
            })
            .collect()
    }
}

impl Default for DelpherLinkTransform {
    fn default() -> Self {
        Self::new(DEFAULT_RELINK_SUMMARY)
    }
}

impl PageTransform for DelpherLinkTransform {
    fn name(&self) -> &'static str {
        "delpher-links"
    }

    fn summary(&self) -> &str {
        &self.summary
    }

    fn apply(&self, text: &str) -> Result<Rewrite, RewriteError> {
        let planned = Self::plan(text);
        if planned.is_empty() {
            return Ok(Rewrite::Unchanged);
        }

        let mut updated = String::with_capacity(text.len());
        let mut cursor = 0;
        let mut replacements = Vec::with_capacity(planned.len());
        for (start, end, replacement) in planned {
            updated.push_str(&text[cursor..start]);
            updated.push_str(&replacement.new);
            cursor = end;
            replacements.push(replacement);
        }
        updated.push_str(&text[cursor..]);

        Ok(Rewrite::Changed {
            text: updated,
            replacements,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_only_resolvable_delpher_links() {
        let text = "<ref>[https://www.delpher.nl/nl/kranten/view?coll=ddd&identifier=ddd:010124175:mpeg21:a0001 Krant]</ref>\n\
                    [https://www.delpher.nl/nl/kranten/results?query=molen zoek]\n\
                    [https://resolver.kb.nl/resolve?urn=ddd:1 ok]";
        let transform = DelpherLinkTransform::default();
        let Rewrite::Changed { text: updated, replacements } = transform.apply(text).unwrap() else {
            panic!("expected a change");
        };
        assert!(updated.contains(
            "[https://resolver.kb.nl/resolve?urn=ddd:010124175:mpeg21:a0001 Krant]"
        ));
        assert!(updated.contains("results?query=molen"));
        assert!(updated.contains("urn=ddd:1 ok"));
        assert_eq!(replacements.len(), 1);
    }

    #[test]
    fn keeps_punctuation_after_the_link() {
        let text = "(zie https://www.delpher.nl/nl/kranten/view?identifier=ddd:010124175:mpeg21:a0001&coll=ddd), en verder.";
        let Rewrite::Changed { text: updated, .. } = DelpherLinkTransform::default().apply(text).unwrap() else {
            panic!("expected a change");
        };
        assert_eq!(
            updated,
            "(zie https://resolver.kb.nl/resolve?urn=ddd:010124175:mpeg21:a0001), en verder."
        );
    }

    #[test]
    fn encodes_identifiers_that_would_break_the_link() {
        let text = "[https://www.delpher.nl/nl/kranten/view?identifier=ddd%3A0101+%5Ba%5D Krant]";
        let transform = DelpherLinkTransform::default();
        let Rewrite::Changed { text: updated, .. } = transform.apply(text).unwrap() else {
            panic!("expected a change");
        };
        assert_eq!(
            updated,
            "[https://resolver.kb.nl/resolve?urn=ddd:0101%20%5Ba%5D Krant]"
        );
        assert_eq!(transform.apply(&updated).unwrap(), Rewrite::Unchanged);
    }

    #[test]
    fn is_idempotent() {
        let text = "https://www.delpher.nl/nl/tijdschriften/view?identifier=dts:1:mpeg21:0001";
        let transform = DelpherLinkTransform::default();
        let Rewrite::Changed { text: once, .. } = transform.apply(text).unwrap() else {
            panic!("expected a change");
        };
        assert_eq!(once, "https://resolver.kb.nl/resolve?urn=dts:1:mpeg21:0001");
        assert_eq!(transform.apply(&once).unwrap(), Rewrite::Unchanged);
    }
}
