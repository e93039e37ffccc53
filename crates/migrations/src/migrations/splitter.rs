//! Statement Splitter - Breaks migration SQL into executable statements
//!
//! A small lexical state machine that understands quoted strings, `--` line
//! comments and `/* */` block comments well enough to know which semicolons
//! terminate a statement. It does not parse SQL.
//!
//! Only backslash escapes are honoured inside string literals. A doubled
//! quote (`'it''s'`) is read as a close immediately followed by a reopen,
//! which keeps well-formed literals intact, but a literal ending in a
//! backslash (`'C:\'`) escapes its own closing quote and swallows the
//! following statement.

/// Lexer state while scanning migration text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexState {
    Code,
    Quoted(char),
    LineComment,
    BlockComment,
}

/// Splits raw SQL text into statements.
///
/// The splitter itself is restartable: every call to [`StatementSplitter::iter`]
/// starts a fresh, lazy pass over the text.
#[derive(Debug, Clone, Copy)]
pub struct StatementSplitter<'a> {
    sql: &'a str,
}

impl<'a> StatementSplitter<'a> {
    pub fn new(sql: &'a str) -> Self {
        Self { sql }
    }

    /// Start a new pass over the text
    pub fn iter(&self) -> Statements<'a> {
        Statements {
            rest: self.sql,
            finished: false,
        }
    }
}

impl<'a> IntoIterator for StatementSplitter<'a> {
    type Item = String;
    type IntoIter = Statements<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy iterator over the statements of a [`StatementSplitter`]
#[derive(Debug, Clone)]
pub struct Statements<'a> {
    rest: &'a str,
    finished: bool,
}

impl<'a> Statements<'a> {
    /// Scan up to the next statement terminator.
    ///
    /// Returns the statement text with comments removed, the number of bytes
    /// consumed, and whether a terminating semicolon was found.
    fn scan_statement(&self) -> (String, usize, bool) {
        let mut state = LexState::Code;
        let mut statement = String::new();
        let mut chars = self.rest.char_indices().peekable();

        while let Some((idx, ch)) = chars.next() {
            match state {
                LexState::Code => match ch {
                    ';' => return (statement, idx + ch.len_utf8(), true),
                    '\'' | '"' => {
                        statement.push(ch);
                        state = LexState::Quoted(ch);
                    }
                    '-' if matches!(chars.peek(), Some((_, '-'))) => {
                        chars.next();
                        state = LexState::LineComment;
                    }
                    '/' if matches!(chars.peek(), Some((_, '*'))) => {
                        chars.next();
                        state = LexState::BlockComment;
                    }
                    _ => statement.push(ch),
                },
                LexState::Quoted(quote) => {
                    statement.push(ch);
                    if ch == '\\' {
                        if let Some((_, escaped)) = chars.next() {
                            statement.push(escaped);
                        }
                    } else if ch == quote {
                        state = LexState::Code;
                    }
                }
                LexState::LineComment => {
                    if ch == '\n' {
                        statement.push(ch);
                        state = LexState::Code;
                    }
                }
                LexState::BlockComment => {
                    if ch == '*' && matches!(chars.peek(), Some((_, '/'))) {
                        chars.next();
                        state = LexState::Code;
                    }
                }
            }
        }

        (statement, self.rest.len(), false)
    }
}

impl<'a> Iterator for Statements<'a> {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let (statement, consumed, terminated) = self.scan_statement();
            self.rest = &self.rest[consumed..];
            if !terminated {
                self.finished = true;
            }

            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }

        None
    }
}

/// Split SQL text into trimmed, non-blank statements
pub fn split_statements(sql: &str) -> Vec<String> {
    StatementSplitter::new(sql).iter().collect()
}
