//! Internet Archive identifiers, Delpher URNs and archive.org download URLs.

use relink_store::schema::make_resolver_url;
use thiserror::Error;

use super::scan::is_word_char;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("empty Internet Archive identifier")]
    EmptyId,
    #[error(
        "invalid Internet Archive identifier {0:?}; expected PREFIX_NUMBER[_suffix], e.g. 'KBDDD02_000201168_mpeg21'"
    )]
    InvalidId(String),
    #[error("empty archive.org download URL")]
    EmptyPdfUrl,
    #[error(
        "invalid archive.org download URL {0:?}; expected 'https://archive.org/download/<path>/<file>.pdf'"
    )]
    InvalidPdfUrl(String),
}

/// Splits `PREFIX_NUMBER` off the front of `value`, returning the rest.
fn split_prefix_number(value: &str) -> Option<(&str, &str, &str)> {
    let prefix_len = value
        .bytes()
        .take_while(u8::is_ascii_alphanumeric)
        .count();
    if prefix_len == 0 {
        return None;
    }
    let (prefix, rest) = value.split_at(prefix_len);
    let rest = rest.strip_prefix('_')?;
    let number_len = rest.bytes().take_while(u8::is_ascii_digit).count();
    if number_len == 0 {
        return None;
    }
    let (number, rest) = rest.split_at(number_len);
    Some((prefix, number, rest))
}

/// Derives the Delpher URN from an Internet Archive identifier.
///
/// The identifier must have the shape `PREFIX_NUMBER[_suffix]`; leading zeros
/// in `NUMBER` are kept.
///
/// # Errors
/// Returns `IdentifierError` if the identifier is empty or has another shape.
pub fn derive_delpher_urn(ia_id: &str) -> Result<String, IdentifierError> {
    let value = ia_id.trim();
    if value.is_empty() {
        return Err(IdentifierError::EmptyId);
    }

    let Some((prefix, number, rest)) = split_prefix_number(value) else {
        return Err(IdentifierError::InvalidId(ia_id.to_string()));
    };
    let suffix_ok = rest.is_empty() || (rest.starts_with('_') && !rest.contains('\n'));
    if !suffix_ok {
        return Err(IdentifierError::InvalidId(ia_id.to_string()));
    }

    Ok(format!("{prefix}:{number}"))
}

/// Extracts the resolver URL from a Commons file title such as
/// `Hoornsche_courant_26-03-1861_(IA_MMWFA01_000191129_mpeg21).pdf`.
pub fn resolver_from_title(title: &str) -> Option<String> {
    if title.trim().is_empty() {
        return None;
    }

    let mut search_from = 0;
    while let Some(offset) = title[search_from..].find("(IA_") {
        let start = search_from + offset + "(IA_".len();
        if let Some(urn) = match_title_group(&title[start..]) {
            return Some(make_resolver_url(&urn));
        }
        search_from = start;
    }
    None
}

fn match_title_group(value: &str) -> Option<String> {
    let (prefix, number, rest) = split_prefix_number(value)?;
    if rest.starts_with(')') {
        return Some(format!("{prefix}:{number}"));
    }
    let suffix = rest.strip_prefix('_')?;
    let close = suffix.find(')')?;
    if close == 0 {
        return None;
    }
    Some(format!("{prefix}:{number}"))
}

/// Checks an archive.org direct download URL strictly (case-sensitive, whole string).
///
/// # Errors
/// Returns `IdentifierError` if the URL is empty or not an archive.org PDF link.
pub fn validate_archive_pdf_url(url: &str) -> Result<&str, IdentifierError> {
    let value = url.trim();
    if value.is_empty() {
        return Err(IdentifierError::EmptyPdfUrl);
    }

    let invalid = || IdentifierError::InvalidPdfUrl(url.to_string());
    let after_scheme = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"))
        .ok_or_else(invalid)?;
    let path = after_scheme
        .strip_prefix("archive.org/download/")
        .ok_or_else(invalid)?;
    let stem = path.strip_suffix(".pdf").ok_or_else(invalid)?;
    if stem.is_empty() || !path.chars().all(is_archive_path_char) {
        return Err(invalid());
    }
    Ok(value)
}

pub(crate) fn is_archive_path_char(ch: char) -> bool {
    is_word_char(ch) || matches!(ch, '-' | '.' | '/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_urns_and_keeps_leading_zeros() {
        assert_eq!(derive_delpher_urn("ddd_010124175_mpeg21").unwrap(), "ddd:010124175");
        assert_eq!(
            derive_delpher_urn("MMKB08_000088804_mpeg21").unwrap(),
            "MMKB08:000088804"
        );
        assert_eq!(derive_delpher_urn("  KBDDD02_000201168 ").unwrap(), "KBDDD02:000201168");
    }

    #[test]
    fn rejects_malformed_identifiers() {
        assert_eq!(derive_delpher_urn("   "), Err(IdentifierError::EmptyId));
        assert!(matches!(
            derive_delpher_urn("ddd-010124175"),
            Err(IdentifierError::InvalidId(_))
        ));
        assert!(matches!(
            derive_delpher_urn("ddd_mpeg21"),
            Err(IdentifierError::InvalidId(_))
        ));
        assert!(matches!(
            derive_delpher_urn("ddd_0101x"),
            Err(IdentifierError::InvalidId(_))
        ));
        assert!(matches!(
            derive_delpher_urn("dd d_0101"),
            Err(IdentifierError::InvalidId(_))
        ));
    }

    #[test]
    fn resolver_from_commons_title() {
        assert_eq!(
            resolver_from_title("Hoornsche_courant_26-03-1861_(IA_MMWFA01_000191129_mpeg21).pdf")
                .as_deref(),
            Some("https://resolver.kb.nl/resolve?urn=MMWFA01:000191129")
        );
        assert_eq!(
            resolver_from_title("Arnhemsche_courant_05-12-1852_(IA_MMKB08_000088804).pdf")
                .as_deref(),
            Some("https://resolver.kb.nl/resolve?urn=MMKB08:000088804")
        );
        assert_eq!(resolver_from_title("Plain title.pdf"), None);
        assert_eq!(resolver_from_title("Broken_(IA_ddd_0101_).pdf"), None);
        assert_eq!(resolver_from_title(""), None);
    }

    #[test]
    fn resolver_from_title_skips_bad_groups() {
        assert_eq!(
            resolver_from_title("x_(IA_bad)_(IA_ddd_0042_mpeg21).pdf").as_deref(),
            Some("https://resolver.kb.nl/resolve?urn=ddd:0042")
        );
    }

    #[test]
    fn validates_archive_pdf_urls() {
        assert!(
            validate_archive_pdf_url(
                "https://archive.org/download/KBDDD02_000201168_mpeg21/KBDDD02_000201168_mpeg21.pdf"
            )
            .is_ok()
        );
        assert!(validate_archive_pdf_url("http://archive.org/download/x.pdf").is_ok());
        assert!(validate_archive_pdf_url("https://archive.org/download/.pdf").is_err());
        assert!(validate_archive_pdf_url("HTTPS://archive.org/download/x/x.pdf").is_err());
        assert!(validate_archive_pdf_url("https://example.org/download/x/x.pdf").is_err());
        assert!(validate_archive_pdf_url("https://archive.org/download/x y/x.pdf").is_err());
        assert_eq!(validate_archive_pdf_url(""), Err(IdentifierError::EmptyPdfUrl));
    }
}
