//! External link scanning and Delpher/KB link classification.

use relink_store::LinkClass;
use relink_store::schema::{DELPHER_HOST, KB_HOST, RESOLVER_HOST};

use super::scan::strip_prefix_ci;

/// An `http(s)://` URL found in wikitext, with its byte span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalLink {
    pub start: usize,
    pub end: usize,
    pub url: String,
}

const URL_TERMINATORS: [char; 8] = ['[', ']', '<', '>', '"', '{', '}', '|'];

const TRAILING_PUNCTUATION: [char; 6] = [',', ';', '.', ':', '!', '?'];

fn ends_url(ch: char) -> bool {
    ch.is_whitespace() || URL_TERMINATORS.contains(&ch)
}

/// Length of `body` once prose around a free link is dropped: a `''` run and
/// anything after it, trailing `,;.:!?`, and a closing `)` when the URL has no
/// opening one.
fn trim_link_end(body: &str) -> usize {
    let body = body.find("''").map_or(body, |quotes| &body[..quotes]);
    let keep_paren = body.contains('(');
    body.trim_end_matches(|ch: char| {
        TRAILING_PUNCTUATION.contains(&ch) || (ch == ')' && !keep_paren)
    })
    .len()
}

/// Finds every `http://` or `https://` URL in `text`.
pub fn scan_external_links(text: &str) -> Vec<ExternalLink> {
    let mut links = Vec::new();
    let mut pos = 0;
    while pos < text.len() {
        let rest = &text[pos..];
        let Some(offset) = rest.find(['h', 'H']) else {
            break;
        };
        let start = pos + offset;
        let candidate = &text[start..];
        let scheme_len = if strip_prefix_ci(candidate, "https://").is_some() {
            "https://".len()
        } else if strip_prefix_ci(candidate, "http://").is_some() {
            "http://".len()
        } else {
            pos = start + 1;
            continue;
        };

        let body_len = candidate[scheme_len..]
            .find(ends_url)
            .unwrap_or(candidate.len() - scheme_len);
        let body_len = trim_link_end(&candidate[scheme_len..scheme_len + body_len]);
        if body_len == 0 {
            pos = start + scheme_len;
            continue;
        }
        let end = start + scheme_len + body_len;
        links.push(ExternalLink {
            start,
            end,
            url: text[start..end].to_string(),
        });
        pos = end;
    }
    links
}

struct UrlParts<'a> {
    host: String,
    path: &'a str,
    query: &'a str,
}

fn split_url(url: &str) -> Option<UrlParts<'_>> {
    let trimmed = url.trim();
    let rest = strip_prefix_ci(trimmed, "https://").or_else(|| strip_prefix_ci(trimmed, "http://"))?;
    let rest = rest.split('#').next().unwrap_or_default();

    let authority_len = rest.find(['/', '?']).unwrap_or(rest.len());
    let authority = &rest[..authority_len];
    let host = authority.rsplit('@').next().unwrap_or_default();
    let host = host.split(':').next().unwrap_or_default().to_ascii_lowercase();
    if host.is_empty() {
        return None;
    }

    let after = &rest[authority_len..];
    let (path, query) = after.split_once('?').unwrap_or((after, ""));
    Some(UrlParts { host, path, query })
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|head| head.ends_with('.'))
}

/// First non-empty value for any of `keys`, percent-decoded. Accepts `&amp;`
/// as a separator, as found in wikitext copies of URLs.
fn query_value(query: &str, keys: &[&str]) -> Option<String> {
    let normalized = query.replace("&amp;", "&");
    normalized
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .filter(|(key, _)| keys.iter().any(|wanted| key.eq_ignore_ascii_case(wanted)))
        .map(|(_, value)| decode(value))
        .find(|value| !value.is_empty())
}

fn path_identifier(path: &str) -> Option<String> {
    let mut segments = path.split('/').filter(|segment| !segment.is_empty());
    while let Some(segment) = segments.next() {
        if segment.eq_ignore_ascii_case("identifier") {
            return segments
                .next()
                .map(decode)
                .filter(|value| !value.is_empty());
        }
    }
    None
}

fn decode(value: &str) -> String {
    let plus_free = value.replace('+', " ");
    urlencoding::decode(&plus_free)
        .map_or_else(|_| plus_free.clone(), std::borrow::Cow::into_owned)
        .trim()
        .to_string()
}

/// Classifies a URL as persistent resolver link, Delpher viewer link, other KB
/// link, or unrelated.
pub fn classify_link(url: &str) -> LinkClass {
    let Some(parts) = split_url(url) else {
        return LinkClass::Other;
    };

    if parts.host == RESOLVER_HOST {
        if parts.path.trim_end_matches('/').eq_ignore_ascii_case("/resolve")
            && let Some(urn) = query_value(parts.query, &["urn"])
        {
            return LinkClass::Resolver { urn };
        }
        return LinkClass::KbLegacy;
    }

    if host_matches(&parts.host, DELPHER_HOST) {
        let urn = query_value(parts.query, &["identifier", "urn"])
            .or_else(|| path_identifier(parts.path));
        return LinkClass::Delpher { urn };
    }

    if host_matches(&parts.host, KB_HOST) {
        return LinkClass::KbLegacy;
    }

    LinkClass::Other
}
