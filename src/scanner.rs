use regex::Regex;
use std::cell::Cell;

/// A cursor over the immutable query text.
///
/// The scanner only ever moves forward. Row and column are derived lazily:
/// `position` walks from the last checked offset up to the cursor counting
/// newlines, so the total bookkeeping over a whole parse is a single linear
/// pass no matter how often positions are requested.
#[derive(Debug)]
pub struct Scanner<'a> {
    input: &'a str,
    position: usize,
    last_checked: Cell<usize>,
    line_start: Cell<usize>,
    row: Cell<usize>,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            position: 0,
            last_checked: Cell::new(0),
            line_start: Cell::new(0),
            row: Cell::new(0),
        }
    }

    /// The whole source text.
    pub fn input(&self) -> &'a str {
        self.input
    }

    /// Current byte offset of the cursor.
    pub fn offset(&self) -> usize {
        self.position
    }

    pub fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    /// Skips whitespace and returns the next significant character, or `None` at the end of input.
    pub fn peek(&mut self) -> Option<char> {
        let rest = self.peek_ahead();
        let skipped = rest.len() - rest.trim_start().len();
        self.position += skipped;
        self.peek_ahead().chars().next()
    }

    /// The unread remainder of the input, without skipping whitespace.
    pub fn peek_ahead(&self) -> &'a str {
        &self.input[self.position.min(self.input.len())..]
    }

    /// Moves the cursor forward by `count` characters, stopping at the end of input.
    pub fn advance(&mut self, count: usize) {
        let bytes: usize = self
            .peek_ahead()
            .chars()
            .take(count)
            .map(char::len_utf8)
            .sum();
        self.position += bytes;
    }

    /// Matches `pattern` at the cursor. On success the cursor moves past the match.
    ///
    /// Patterns are expected to be anchored with `^`; an unanchored match that
    /// does not start at the cursor is treated as a miss.
    pub fn match_regex(&mut self, pattern: &Regex) -> Option<&'a str> {
        let rest = self.peek_ahead();
        let found = pattern.find(rest)?;
        if found.start() != 0 {
            return None;
        }
        self.position += found.end();
        Some(&rest[..found.end()])
    }

    /// Zero-based `(row, column)` of the cursor; the column is a byte offset from the line start.
    pub fn position(&self) -> (usize, usize) {
        let target = self.position.min(self.input.len());
        let checked = self.last_checked.get();
        if checked < target {
            let mut row = self.row.get();
            let mut line_start = self.line_start.get();
            for (i, byte) in self.input.as_bytes()[checked..target].iter().enumerate() {
                if *byte == b'\n' {
                    row += 1;
                    line_start = checked + i + 1;
                }
            }
            self.row.set(row);
            self.line_start.set(line_start);
            self.last_checked.set(target);
        }
        (self.row.get(), target - self.line_start.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regex(pattern: &str) -> Regex {
        Regex::new(pattern).unwrap()
    }

    #[test]
    fn test_peek_skips_whitespace() {
        let mut scanner = Scanner::new("  \n\t {");
        assert_eq!(scanner.peek(), Some('{'));
        assert_eq!(scanner.offset(), 5);
    }

    #[test]
    fn test_peek_at_end() {
        let mut scanner = Scanner::new("   ");
        assert_eq!(scanner.peek(), None);
        assert!(scanner.is_at_end());
    }

    #[test]
    fn test_advance_is_char_aware() {
        let mut scanner = Scanner::new("é!");
        scanner.advance(1);
        assert_eq!(scanner.peek_ahead(), "!");
        scanner.advance(5);
        assert!(scanner.is_at_end());
    }

    #[test]
    fn test_match_regex_advances_on_success() {
        let mut scanner = Scanner::new("true, false");
        assert_eq!(scanner.match_regex(&regex("^true")), Some("true"));
        assert_eq!(scanner.peek_ahead(), ", false");
        assert_eq!(scanner.match_regex(&regex("^false")), None);
        assert_eq!(scanner.offset(), 4);
    }

    #[test]
    fn test_unanchored_match_is_rejected() {
        let mut scanner = Scanner::new("xx1");
        assert_eq!(scanner.match_regex(&regex("[0-9]")), None);
        assert_eq!(scanner.offset(), 0);
    }

    #[test]
    fn test_row_and_column() {
        let mut scanner = Scanner::new("{\n  \"a\": 1,\n  \"b\": 2\n}");
        assert_eq!(scanner.position(), (0, 0));
        scanner.advance(1);
        assert_eq!(scanner.peek(), Some('"'));
        assert_eq!(scanner.position(), (1, 2));
        scanner.advance(9);
        assert_eq!(scanner.peek(), Some('"'));
        assert_eq!(scanner.position(), (2, 2));
        scanner.advance(6);
        assert_eq!(scanner.peek(), Some('}'));
        assert_eq!(scanner.position(), (3, 0));
    }

    #[test]
    fn test_repeated_position_queries_are_stable() {
        let mut scanner = Scanner::new("a\nb\nc");
        scanner.advance(4);
        assert_eq!(scanner.position(), (2, 0));
        assert_eq!(scanner.position(), (2, 0));
    }
}
