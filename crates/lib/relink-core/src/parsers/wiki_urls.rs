//! Turns wiki page URLs into interwiki links, split by language.

use serde::{Deserialize, Serialize};

use super::scan::is_word_char;

/// Interwiki links grouped into Dutch and other-language pages.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InterwikiLists {
    pub nl: Vec<String>,
    pub other: Vec<String>,
    /// Input lines that are not wiki page URLs.
    pub unmatched: Vec<String>,
}

/// Splits `https://<lang>.wikipedia.org/wiki/<page>` into `(lang, page)`.
pub fn parse_wiki_url(line: &str) -> Option<(&str, &str)> {
    let mut search_from = 0;
    while let Some(offset) = line[search_from..].find("//") {
        let host_start = search_from + offset + 2;
        let host = &line[host_start..];
        let lang_len = host.find(|ch: char| !is_word_char(ch)).unwrap_or(host.len());
        if lang_len > 0 && host[lang_len..].starts_with('.') {
            let after_dot = &host[lang_len + 1..];
            if let Some(idx) = after_dot.find("/wiki/") {
                return Some((&host[..lang_len], &after_dot[idx + "/wiki/".len()..]));
            }
        }
        search_from += offset + 1;
    }
    None
}

/// Reformats one URL per line into `[[lang:page]]` entries.
pub fn reformat_wiki_urls(input: &str) -> InterwikiLists {
    let mut lists = InterwikiLists::default();
    for line in input.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let Some((lang, page)) = parse_wiki_url(line) else {
            tracing::warn!(line, "failed to match wiki url");
            lists.unmatched.push(line.to_string());
            continue;
        };
        let link = format!("[[{lang}:{page}]]");
        if lang == "nl" {
            lists.nl.push(link);
        } else {
            lists.other.push(link);
        }
    }
    lists
}
