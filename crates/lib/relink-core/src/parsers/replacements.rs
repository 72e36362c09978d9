//! Reformats tab-separated `old<TAB>new` replacement pairs for `www.kb.nl`
//! targets into the two-line form expected by the bot-editing framework.

use std::collections::HashSet;

use thiserror::Error;

const KB_WWW_PREFIX: &str = "http://www.kb.nl";
const STRIPPED_CHARS: usize = "http://www.".len();

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReplacementsError {
    #[error("line {line}: expected 'old<TAB>new', found {fields} field(s)")]
    MalformedLine { line: usize, fields: usize },
}

/// Reformatted output plus how many distinct pairs were dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReformattedReplacements {
    pub output: String,
    pub kept: usize,
    pub dropped: usize,
}

fn drop_chars(value: &str, count: usize) -> &str {
    value
        .char_indices()
        .nth(count)
        .map_or("", |(idx, _)| &value[idx..])
}

/// Reformats replacement pairs.
///
/// # Errors
/// Returns `ReplacementsError::MalformedLine` when a non-blank line does not
/// split into exactly two tab-separated fields.
pub fn reformat_replacements(input: &str) -> Result<ReformattedReplacements, ReplacementsError> {
    let mut seen = HashSet::new();
    let mut result = ReformattedReplacements::default();

    for (idx, raw) in input.lines().enumerate() {
        let line = raw.trim().replace('\r', "");
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let [old, new] = fields.as_slice() else {
            return Err(ReplacementsError::MalformedLine {
                line: idx + 1,
                fields: fields.len(),
            });
        };
        if !seen.insert(((*old).to_string(), (*new).to_string())) {
            continue;
        }

        let new = new.replace("https://", "http://");
        if new.starts_with(KB_WWW_PREFIX) {
            let old = drop_chars(old, STRIPPED_CHARS);
            let new = drop_chars(&new, STRIPPED_CHARS);
            result.output.push_str(old);
            result.output.push('\n');
            result.output.push_str(new);
            result.output.push('\n');
            result.kept += 1;
        } else {
            result.dropped += 1;
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_www_kb_targets_only() {
        let input = "http://www.kb.nl/old/1\thttps://www.kb.nl/new/1\r\nhttp://www.kb.nl/old/1\thttps://www.kb.nl/new/1\nhttp://kb.nl/x\thttps://delpher.nl/y\n";
        let result = reformat_replacements(input).unwrap();
        assert_eq!(result.output, "kb.nl/old/1\nkb.nl/new/1\n");
        assert_eq!(result.kept, 1);
        assert_eq!(result.dropped, 1);
    }

    #[test]
    fn reports_malformed_line_number() {
        let input = "a\tb\nonly-one-field\n";
        assert_eq!(
            reformat_replacements(input),
            Err(ReplacementsError::MalformedLine { line: 2, fields: 1 })
        );
    }

    #[test]
    fn short_values_strip_to_empty() {
        assert_eq!(drop_chars("http://", STRIPPED_CHARS), "");
        assert_eq!(drop_chars("http://www.kb.nl", STRIPPED_CHARS), "kb.nl");
    }
}
