//! Scanner for the legacy Internet Archive `|source =` block on Commons file pages.
//!
//! The block looks like:
//!
//! ```text
//! |source =
//! :{{Internet Archive link|ddd_010124175_mpeg21}}
//! :https://archive.org/download/ddd_010124175_mpeg21/ddd_010124175_mpeg21.pdf
//! ```
//!
//! Keywords and the URL scheme/host match ASCII case-insensitively and any
//! whitespace between the tokens is tolerated, as long as each of the three
//! lines starts after a newline.

use super::identifiers::is_archive_path_char;
use super::scan::{Cursor, strip_prefix_ci};

/// One matched legacy block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBlockMatch {
    /// Byte offset of the leading `|`.
    pub start: usize,
    /// Byte offset just past the trailing whitespace.
    pub end: usize,
    /// `|source =` line up to and including its last newline.
    pub prefix: String,
    pub ia_id: String,
    pub pdf_url: String,
}

/// Finds every non-overlapping legacy block in `text`, left to right.
pub fn find_source_blocks(text: &str) -> Vec<SourceBlockMatch> {
    let mut matches = Vec::new();
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find('|') {
        let start = search_from + offset;
        if let Some(found) = match_at(text, start) {
            search_from = found.end;
            matches.push(found);
        } else {
            search_from = start + 1;
        }
    }
    matches
}

fn match_at(text: &str, start: usize) -> Option<SourceBlockMatch> {
    let mut cursor = Cursor::new(text, start);

    // |source =\n
    if !cursor.eat("|") {
        return None;
    }
    cursor.skip_ws();
    if !cursor.eat_ci("source") {
        return None;
    }
    cursor.skip_ws();
    if !cursor.eat("=") {
        return None;
    }
    let prefix_end = cursor.skip_ws_with_newline()?;

    // :{{Internet Archive link|ID}}
    if !cursor.eat(":") {
        return None;
    }
    cursor.skip_ws();
    if !cursor.eat("{{") {
        return None;
    }
    cursor.skip_ws();
    if !(cursor.eat_ci("internet") && cursor.skip_ws1()) {
        return None;
    }
    if !(cursor.eat_ci("archive") && cursor.skip_ws1()) {
        return None;
    }
    if !cursor.eat_ci("link") {
        return None;
    }
    cursor.skip_ws();
    if !cursor.eat("|") {
        return None;
    }
    cursor.skip_ws();
    let ia_id = cursor.take_until(|ch| matches!(ch, '}' | '\n' | '\r')).trim();
    cursor.skip_ws();
    if !cursor.eat("}}") {
        return None;
    }
    cursor.skip_ws_with_newline()?;

    // :https://archive.org/download/....pdf
    if !cursor.eat(":") {
        return None;
    }
    cursor.skip_ws();
    let url_start = cursor.pos();
    let url_len = archive_pdf_len(cursor.rest())?;
    let pdf_url = &text[url_start..url_start + url_len];
    let mut cursor = Cursor::new(text, url_start + url_len);
    let (_, end) = cursor.skip_ws();

    Some(SourceBlockMatch {
        start,
        end,
        prefix: text[start..prefix_end].to_string(),
        ia_id: ia_id.to_string(),
        pdf_url: pdf_url.to_string(),
    })
}

/// Length of the archive.org PDF URL at the front of `value`, ending at the
/// first `.pdf` preceded by at least one path character.
fn archive_pdf_len(value: &str) -> Option<usize> {
    let after_scheme = strip_prefix_ci(value, "https://").or_else(|| strip_prefix_ci(value, "http://"))?;
    let path = strip_prefix_ci(after_scheme, "archive.org/download/")?;
    let head_len = value.len() - path.len();

    for (idx, ch) in path.char_indices() {
        if idx > 0 && strip_prefix_ci(&path[idx..], ".pdf").is_some() {
            return Some(head_len + idx + ".pdf".len());
        }
        if !is_archive_path_char(ch) {
            return None;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const OLD_PAGE: &str = "=={{int:filedesc}}==\n{{Information\n|description = Krant\n|source =\n:{{Internet Archive link|ddd_010124175_mpeg21}}\n:https://archive.org/download/ddd_010124175_mpeg21/ddd_010124175_mpeg21.pdf\n|date = 1861\n}}";

    #[test]
    fn matches_canonical_block() {
        let found = find_source_blocks(OLD_PAGE);
        assert_eq!(found.len(), 1);
        let block = &found[0];
        assert_eq!(block.prefix, "|source =\n");
        assert_eq!(block.ia_id, "ddd_010124175_mpeg21");
        assert_eq!(
            block.pdf_url,
            "https://archive.org/download/ddd_010124175_mpeg21/ddd_010124175_mpeg21.pdf"
        );
        assert_eq!(&OLD_PAGE[block.end..], "|date = 1861\n}}");
    }

    #[test]
    fn tolerates_case_and_spacing() {
        let text = "| Source  =  \n\n  :  {{ internet  ARCHIVE link | KBDDD02_000201168 }}\n : HTTPS://Archive.org/download/KBDDD02_000201168/a.PDF   \n";
        let found = find_source_blocks(text);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].prefix, "| Source  =  \n\n");
        assert_eq!(found[0].ia_id, "KBDDD02_000201168");
        assert_eq!(found[0].pdf_url, "HTTPS://Archive.org/download/KBDDD02_000201168/a.PDF");
        assert_eq!(found[0].end, text.len());
    }

    #[test]
    fn url_stops_at_first_pdf() {
        let text = "|source=\n:{{Internet Archive link|x_1}}\n:https://archive.org/download/a.pdf.pdf\n";
        let found = find_source_blocks(text);
        assert_eq!(found[0].pdf_url, "https://archive.org/download/a.pdf");
    }

    #[test]
    fn rejects_same_line_blocks_and_other_hosts() {
        let same_line = "|source = :{{Internet Archive link|x_1}}\n:https://archive.org/download/a.pdf\n";
        assert!(find_source_blocks(same_line).is_empty());

        let other_host = "|source =\n:{{Internet Archive link|x_1}}\n:https://example.org/download/a.pdf\n";
        assert!(find_source_blocks(other_host).is_empty());
    }

    #[test]
    fn blank_ids_still_match() {
        let blank_id = "|source =\n:{{Internet Archive link|   }}\n:https://archive.org/download/a.pdf\n";
        let found = find_source_blocks(blank_id);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].ia_id, "");
    }

    #[test]
    fn finds_multiple_blocks() {
        let block = "|source =\n:{{Internet Archive link|x_1}}\n:https://archive.org/download/a.pdf\n";
        let text = format!("{block}{block}");
        assert_eq!(find_source_blocks(&text).len(), 2);
    }
}
