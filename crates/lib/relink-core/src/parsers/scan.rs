//! Small cursor helpers shared by the wikitext scanners.

/// Word character in the regex sense: alphanumeric or underscore.
pub fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// ASCII case-insensitive prefix strip.
pub fn strip_prefix_ci<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then_some(&value[prefix.len()..])
}

/// Byte cursor over a borrowed string. Positions are always on char boundaries.
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub const fn new(text: &'a str, pos: usize) -> Self {
        Self { text, pos }
    }

    pub const fn pos(&self) -> usize {
        self.pos
    }

    pub fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    /// Consumes a whitespace run and returns its bounds.
    pub fn skip_ws(&mut self) -> (usize, usize) {
        let start = self.pos;
        let rest = self.rest();
        let len = rest.find(|ch: char| !ch.is_whitespace()).unwrap_or(rest.len());
        self.pos += len;
        (start, self.pos)
    }

    /// Consumes at least one whitespace character.
    pub fn skip_ws1(&mut self) -> bool {
        let (start, end) = self.skip_ws();
        end > start
    }

    /// Consumes a whitespace run that must contain a newline. Returns the
    /// position just past the last newline in the run.
    pub fn skip_ws_with_newline(&mut self) -> Option<usize> {
        let (start, end) = self.skip_ws();
        self.text[start..end].rfind('\n').map(|idx| start + idx + 1)
    }

    pub fn eat(&mut self, literal: &str) -> bool {
        if self.rest().starts_with(literal) {
            self.pos += literal.len();
            true
        } else {
            false
        }
    }

    pub fn eat_ci(&mut self, literal: &str) -> bool {
        if strip_prefix_ci(self.rest(), literal).is_some() {
            self.pos += literal.len();
            true
        } else {
            false
        }
    }

    /// Consumes characters up to (not including) the first one matching `stop`.
    pub fn take_until(&mut self, stop: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let len = rest.find(stop).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newline_run_reports_last_newline() {
        let mut cursor = Cursor::new("  \n \n  x", 0);
        assert_eq!(cursor.skip_ws_with_newline(), Some(5));
        assert_eq!(cursor.rest(), "x");

        let mut cursor = Cursor::new("   x", 0);
        assert_eq!(cursor.skip_ws_with_newline(), None);
    }

    #[test]
    fn case_insensitive_eat() {
        let mut cursor = Cursor::new("SOURCE=", 0);
        assert!(cursor.eat_ci("source"));
        assert!(cursor.eat("="));
        assert_eq!(strip_prefix_ci("Ab", "abc"), None);
    }
}
