//! Parsers for wikitext and the plain-text inputs of the relinking workflow.
//!
//! Each parser is a pure function over borrowed text; the rewrite transforms
//! and the CLI build on top of them.

pub mod external_links;
pub mod identifiers;
pub mod replacements;
pub mod scan;
pub mod source_block;
pub mod wiki_urls;

pub use external_links::{ExternalLink, classify_link, scan_external_links};
pub use identifiers::{
    IdentifierError,
    derive_delpher_urn,
    resolver_from_title,
    validate_archive_pdf_url,
};
pub use replacements::{ReformattedReplacements, ReplacementsError, reformat_replacements};
pub use source_block::{SourceBlockMatch, find_source_blocks};
pub use wiki_urls::{InterwikiLists, parse_wiki_url, reformat_wiki_urls};
