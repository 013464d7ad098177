//! Character cursor over IDL source with line/column tracking.

use std::path::{Path, PathBuf};

use crate::error::ParseError;

pub(crate) struct Cursor {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    file: PathBuf,
}

impl Cursor {
    pub(crate) fn new(source: &str, file: &Path) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            file: file.to_path_buf(),
        }
    }

    pub(crate) fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    pub(crate) fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    pub(crate) fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    pub(crate) fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    pub(crate) fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, expected: char) -> Result<(), ParseError> {
        if self.eat(expected) {
            return Ok(());
        }
        Err(match self.peek() {
            Some(found) => self.error(format!("expected `{expected}`, found `{found}`")),
            None => self.error(format!("unexpected end of input, expected `{expected}`")),
        })
    }

    pub(crate) fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(&self.file, self.line, self.column, message)
    }

    pub(crate) fn error_at(&self, (line, column): (usize, usize), message: impl Into<String>) -> ParseError {
        ParseError::new(&self.file, line, column, message)
    }

    pub(crate) fn position(&self) -> (usize, usize) {
        (self.line, self.column)
    }

    /// Snapshot for backtracking.
    pub(crate) fn mark(&self) -> (usize, usize, usize) {
        (self.pos, self.line, self.column)
    }

    pub(crate) fn reset(&mut self, (pos, line, column): (usize, usize, usize)) {
        self.pos = pos;
        self.line = line;
        self.column = column;
    }

    /// Skip whitespace, commas and comments, collecting `///` doc lines.
    ///
    /// Commas are insignificant in the IDL, so they are trivia too.
    pub(crate) fn skip_trivia(&mut self) -> Vec<String> {
        let mut docs = Vec::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == ',' {
                self.bump();
            } else if c == '/' && self.peek_at(1) == Some('/') {
                let is_doc = self.peek_at(2) == Some('/');
                let text = self.rest_of_line();
                if is_doc {
                    let body = text.trim_start_matches('/');
                    docs.push(body.strip_prefix(' ').unwrap_or(body).trim_end().to_string());
                }
            } else {
                break;
            }
        }
        docs
    }

    /// Skip spaces and tabs only, stopping at line ends.
    pub(crate) fn skip_inline_space(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.bump();
        }
    }

    pub(crate) fn rest_of_line(&mut self) -> String {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            text.push(c);
            self.bump();
        }
        text
    }

    pub(crate) fn ident(&mut self) -> Option<String> {
        let first = self.peek()?;
        if !(first.is_ascii_alphabetic() || first == '_') {
            return None;
        }
        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                ident.push(c);
                self.bump();
            } else {
                break;
            }
        }
        Some(ident)
    }

    /// Relative or absolute shape id: `Name`, `a.b#Name`, `a.b#Name$member`.
    pub(crate) fn shape_id(&mut self) -> Option<String> {
        let first = self.peek()?;
        if !(first.is_ascii_alphabetic() || first == '_') {
            return None;
        }
        let mut id = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '#' | '$') {
                id.push(c);
                self.bump();
            } else {
                break;
            }
        }
        Some(id)
    }

    /// Quoted string or `"""` text block, with escapes decoded.
    pub(crate) fn string(&mut self) -> Result<String, ParseError> {
        let start = self.position();
        if self.peek() == Some('"') && self.peek_at(1) == Some('"') && self.peek_at(2) == Some('"') {
            return self.text_block(start);
        }
        self.expect('"')?;
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error_at(start, "unterminated string")),
                Some('"') => return Ok(value),
                Some('\\') => value.push(self.escape(start)?),
                Some(c) => value.push(c),
            }
        }
    }

    fn text_block(&mut self, start: (usize, usize)) -> Result<String, ParseError> {
        for _ in 0..3 {
            self.bump();
        }
        let mut raw = String::new();
        loop {
            if self.peek() == Some('"') && self.peek_at(1) == Some('"') && self.peek_at(2) == Some('"') {
                for _ in 0..3 {
                    self.bump();
                }
                break;
            }
            match self.bump() {
                None => return Err(self.error_at(start, "unterminated text block")),
                Some('\\') => raw.push(self.escape(start)?),
                Some(c) => raw.push(c),
            }
        }
        Ok(dedent(raw.strip_prefix('\n').unwrap_or(&raw)))
    }

    fn escape(&mut self, start: (usize, usize)) -> Result<char, ParseError> {
        let escaped = match self.bump() {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some('b') => '\u{8}',
            Some('f') => '\u{c}',
            Some(c @ ('"' | '\\' | '/' | '\'')) => c,
            Some('u') => {
                let mut hex = String::new();
                for _ in 0..4 {
                    match self.bump() {
                        Some(c) if c.is_ascii_hexdigit() => hex.push(c),
                        _ => return Err(self.error("invalid unicode escape")),
                    }
                }
                u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| self.error("invalid unicode escape"))?
            }
            Some(other) => return Err(self.error(format!("invalid escape sequence `\\{other}`"))),
            None => return Err(self.error_at(start, "unterminated string")),
        };
        Ok(escaped)
    }

    /// Skip a balanced `{ ... }` block, ignoring braces inside strings.
    pub(crate) fn skip_block(&mut self) -> Result<(), ParseError> {
        let start = self.position();
        self.expect('{')?;
        let mut depth = 1usize;
        while depth > 0 {
            match self.peek() {
                None => return Err(self.error_at(start, "unterminated block")),
                Some('"') => {
                    self.string()?;
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    self.rest_of_line();
                }
                Some('{') => {
                    depth += 1;
                    self.bump();
                }
                Some('}') => {
                    depth -= 1;
                    self.bump();
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
        Ok(())
    }
}

/// Remove the common leading indentation of a text block.
fn dedent(text: &str) -> String {
    let indent = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);
    text.lines()
        .map(|line| line.get(indent..).unwrap_or_else(|| line.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}
