use std::fmt::Write;

pub const RESOLVER_BASE_URL: &str = "https://resolver.kb.nl/resolve?urn=";
pub const RESOLVER_PDF_SUFFIX: &str = ":mpeg21:pdf";
pub const RESOLVER_HOST: &str = "resolver.kb.nl";
pub const DELPHER_HOST: &str = "delpher.nl";
pub const KB_HOST: &str = "kb.nl";

pub const COMMONS_API_URL: &str = "https://commons.wikimedia.org/w/api.php";
pub const COMMONS_BASE_URL: &str = "https://commons.wikimedia.org";

pub const NAMESPACE_MAIN: i32 = 0;
pub const NAMESPACE_FILE: i32 = 6;

pub const COLUMN_TITLE: &str = "Title";
pub const COLUMN_PAGEID: &str = "PageID";
pub const COLUMN_STATUS: &str = "ProcessingStatus";
pub const COLUMN_RESOLVER: &str = "ResolverURL";

pub const STATUS_PROCESSED: &str = "Successfully processed";
pub const STATUS_SKIPPED_NO_OLD: &str = "Skipped - no old pattern found";
pub const STATUS_SKIPPED_GUARD: &str = "Skipped - already marked";
pub const STATUS_ERROR: &str = "Skipped - other error";

pub const DELPHER_TEMPLATE: &str = "{{Delpher}}";

/// Characters that end a URL in wikitext and must be percent-encoded in a URN.
const URN_UNSAFE: [char; 8] = ['[', ']', '<', '>', '"', '{', '}', '|'];

/// Percent-encodes whitespace, control characters, and wikitext link
/// delimiters. Everything else, including `:`, is kept as is.
pub fn encode_urn(urn: &str) -> String {
    let mut encoded = String::with_capacity(urn.len());
    for ch in urn.chars() {
        if ch.is_whitespace() || ch.is_control() || URN_UNSAFE.contains(&ch) {
            let mut buf = [0; 4];
            for byte in ch.encode_utf8(&mut buf).bytes() {
                let _ = write!(encoded, "%{byte:02X}");
            }
        } else {
            encoded.push(ch);
        }
    }
    encoded
}

pub fn make_resolver_url(urn: &str) -> String {
    format!("{RESOLVER_BASE_URL}{}", encode_urn(urn))
}

pub fn make_resolver_pdf_url(urn: &str) -> String {
    format!("{RESOLVER_BASE_URL}{}{RESOLVER_PDF_SUFFIX}", encode_urn(urn))
}

/// `MediaInfo` entity id for a Commons file page.
pub fn make_mid(pageid: u64) -> String {
    format!("M{pageid}")
}

/// Stable review link that survives file renames.
pub fn make_redirect_url(site_base: &str, pageid: u64) -> String {
    let base = site_base.trim_end_matches('/');
    format!("{base}/wiki/Special:Redirect/page/{pageid}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolver_urls_keep_leading_zeros() {
        assert_eq!(
            make_resolver_url("KBDDD02:000201168"),
            "https://resolver.kb.nl/resolve?urn=KBDDD02:000201168"
        );
        assert_eq!(
            make_resolver_pdf_url("ddd:010124175"),
            "https://resolver.kb.nl/resolve?urn=ddd:010124175:mpeg21:pdf"
        );
    }

    #[test]
    fn resolver_urls_encode_link_delimiters() {
        assert_eq!(
            make_resolver_url("ddd:0101 [a]|b"),
            "https://resolver.kb.nl/resolve?urn=ddd:0101%20%5Ba%5D%7Cb"
        );
        assert_eq!(encode_urn("ddd:010124175:mpeg21:a0001"), "ddd:010124175:mpeg21:a0001");
    }

    #[test]
    fn redirect_url_trims_trailing_slash() {
        assert_eq!(
            make_redirect_url("https://commons.wikimedia.org/", 109_018_562),
            "https://commons.wikimedia.org/wiki/Special:Redirect/page/109018562"
        );
        assert_eq!(make_mid(42), "M42");
    }
}
