//! Path expressions into JSON documents.
//!
//! Syntax:
//! - `user.address.city`: object keys separated by dots
//! - `items[0].id`: array index, negative counts from the end (`[-1]`)
//! - `["key.with.dots"]` / `['x']`: quoted key, `\` escapes the quote
//! - `@`: the document itself
//!
//! Parsing and lookup are separate so a bad expression is reported as such
//! rather than as a missing key.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use thiserror::Error;

/// One step of a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid path '{path}' at offset {offset}: {reason}")]
pub struct PathError {
    pub path: String,
    pub offset: usize,
    pub reason: &'static str,
}

/// A parsed path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    source: String,
    segments: Vec<Segment>,
}

impl JsonPath {
    pub fn parse(path: &str) -> Result<Self, PathError> {
        let segments = Parser::new(path).parse()?;
        Ok(Self {
            source: path.to_string(),
            segments,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Walk `root`, returning `None` at the first missing key or index.
    pub fn lookup<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(root, |current, segment| match (segment, current) {
                (Segment::Key(key), Value::Object(map)) => map.get(key),
                (Segment::Index(index), Value::Array(items)) => {
                    let len = items.len() as i64;
                    let resolved = if *index < 0 { len + index } else { *index };
                    if (0..len).contains(&resolved) {
                        items.get(resolved as usize)
                    } else {
                        None
                    }
                }
                _ => None,
            })
    }
}

impl FromStr for JsonPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().collect(),
            pos: 0,
        }
    }

    fn parse(mut self) -> Result<Vec<Segment>, PathError> {
        if self.source.trim().is_empty() {
            return Err(self.error("empty path"));
        }
        if self.source == "@" {
            return Ok(Vec::new());
        }

        let mut segments = Vec::new();
        match self.peek() {
            Some('[') => segments.push(self.bracket()?),
            _ => segments.push(self.key()?),
        }

        while let Some(c) = self.peek() {
            match c {
                '.' => {
                    self.pos += 1;
                    segments.push(self.key()?);
                }
                '[' => segments.push(self.bracket()?),
                _ => return Err(self.error("expected '.' or '['")),
            }
        }

        Ok(segments)
    }

    fn key(&mut self) -> Result<Segment, PathError> {
        let mut key = String::new();
        while let Some(c) = self.peek() {
            if c == '.' || c == '[' {
                break;
            }
            if c == ']' || c == '"' || c == '\'' {
                return Err(self.error("unexpected character in key"));
            }
            key.push(c);
            self.pos += 1;
        }
        if key.is_empty() {
            return Err(self.error("empty key"));
        }
        Ok(Segment::Key(key))
    }

    fn bracket(&mut self) -> Result<Segment, PathError> {
        self.pos += 1;
        let segment = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                self.quoted(quote)?
            }
            Some(_) => self.index()?,
            None => return Err(self.error("unterminated '['")),
        };
        if self.peek() != Some(']') {
            return Err(self.error("expected ']'"));
        }
        self.pos += 1;
        Ok(segment)
    }

    fn quoted(&mut self, quote: char) -> Result<Segment, PathError> {
        let mut key = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated quoted key")),
                Some('\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(c) => key.push(c),
                        None => return Err(self.error("dangling escape")),
                    }
                    self.pos += 1;
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(Segment::Key(key));
                }
                Some(c) => {
                    key.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn index(&mut self) -> Result<Segment, PathError> {
        let start = self.pos;
        let mut digits = String::new();
        if self.peek() == Some('-') {
            digits.push('-');
            self.pos += 1;
        }
        while let Some(c) = self.peek().filter(char::is_ascii_digit) {
            digits.push(c);
            self.pos += 1;
        }
        digits.parse().map(Segment::Index).map_err(|_| {
            self.pos = start;
            self.error("expected an integer index or quoted key")
        })
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn error(&self, reason: &'static str) -> PathError {
        let offset = self
            .chars
            .get(self.pos)
            .map(|(offset, _)| *offset)
            .unwrap_or(self.source.len());
        PathError {
            path: self.source.to_string(),
            offset,
            reason,
        }
    }
}
