//! S-expression reader and writer for KiCad files.
//!
//! KiCad distinguishes bare symbols (`thru_hole`, `0.8`) from quoted strings
//! (`"F.Cu"`), and some keywords are rejected when quoted, so the tree keeps
//! the two apart and writes each back the way it was read.

use std::fmt::{self, Write as _};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Unexpected end of input")]
    UnexpectedEof,
    #[error("Unexpected token at position {0}: {1}")]
    UnexpectedToken(usize, String),
    #[error("Trailing content at position {0}")]
    TrailingContent(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SExp {
    /// Bare symbol or number
    Atom(String),
    /// Double-quoted string
    Str(String),
    List(Vec<SExp>),
}

impl SExp {
    pub fn atom(s: impl Into<String>) -> Self {
        SExp::Atom(s.into())
    }

    pub fn string(s: impl Into<String>) -> Self {
        SExp::Str(s.into())
    }

    /// Build `(tag args...)`.
    pub fn node(tag: &str, args: Vec<SExp>) -> Self {
        let mut items = Vec::with_capacity(args.len() + 1);
        items.push(SExp::Atom(tag.to_string()));
        items.extend(args);
        SExp::List(items)
    }

    /// Text of an atom or string; `None` for lists.
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            SExp::Atom(s) | SExp::Str(s) => Some(s),
            SExp::List(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_atom().and_then(|s| s.parse().ok())
    }

    pub fn as_list(&self) -> Option<&[SExp]> {
        match self {
            SExp::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<SExp>> {
        match self {
            SExp::List(items) => Some(items),
            _ => None,
        }
    }

    /// Leading symbol of a list, e.g. `pad` for `(pad "1" thru_hole ...)`.
    pub fn tag(&self) -> Option<&str> {
        self.as_list()
            .and_then(|items| items.first())
            .and_then(|first| first.as_atom())
    }

    /// First child list tagged `key`.
    pub fn find(&self, key: &str) -> Option<&SExp> {
        self.as_list()?
            .iter()
            .find(|item| item.tag() == Some(key))
    }

    /// All child lists tagged `key`.
    pub fn find_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a SExp> + 'a {
        self.as_list()
            .unwrap_or(&[])
            .iter()
            .filter(move |item| item.tag() == Some(key))
    }

    /// Element `index` of a list (0 is the tag).
    pub fn arg(&self, index: usize) -> Option<&SExp> {
        self.as_list().and_then(|items| items.get(index))
    }

    /// Text of the first argument of child `key`: `(key value ...)` -> `value`.
    pub fn value_of(&self, key: &str) -> Option<&str> {
        self.find(key)?.arg(1)?.as_atom()
    }

    /// Whether a bare flag such as `smd` appears among the arguments.
    pub fn has_flag(&self, flag: &str) -> bool {
        self.as_list()
            .map(|items| {
                items
                    .iter()
                    .skip(1)
                    .any(|item| matches!(item, SExp::Atom(s) if s == flag))
            })
            .unwrap_or(false)
    }

    /// Render the tree with one nested list per line, the layout KiCad itself writes.
    pub fn to_pretty_string(&self) -> String {
        let mut out = String::new();
        self.write_pretty(&mut out, 0);
        out.push('\n');
        out
    }

    fn write_pretty(&self, out: &mut String, depth: usize) {
        let items = match self {
            SExp::List(items) => items,
            other => {
                let _ = write!(out, "{}", other);
                return;
            }
        };
        // Short leaf lists such as (at 1 2) stay on a single line
        let has_nested = items.iter().any(|i| matches!(i, SExp::List(_)));
        if !has_nested {
            let _ = write!(out, "{}", self);
            return;
        }

        out.push('(');
        let mut broke_line = false;
        for (i, item) in items.iter().enumerate() {
            match item {
                SExp::List(_) if i > 0 => {
                    out.push('\n');
                    out.push_str(&"  ".repeat(depth + 1));
                    item.write_pretty(out, depth + 1);
                    broke_line = true;
                }
                _ => {
                    if i > 0 {
                        out.push(' ');
                    }
                    item.write_pretty(out, depth + 1);
                }
            }
        }
        if broke_line {
            out.push('\n');
            out.push_str(&"  ".repeat(depth));
        }
        out.push(')');
    }
}

impl fmt::Display for SExp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SExp::Atom(s) => write!(f, "{}", s),
            SExp::Str(s) => {
                f.write_char('"')?;
                for ch in s.chars() {
                    match ch {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        '\t' => f.write_str("\\t")?,
                        '\r' => f.write_str("\\r")?,
                        _ => f.write_char(ch)?,
                    }
                }
                f.write_char('"')
            }
            SExp::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

pub struct SExpParser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> SExpParser<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
        }
    }

    /// Parse exactly one expression; anything but whitespace after it is an error.
    pub fn parse(&mut self) -> Result<SExp, ParseError> {
        self.skip_whitespace();
        if self.is_eof() {
            return Err(ParseError::UnexpectedEof);
        }
        let sexp = self.parse_sexp()?;
        self.skip_whitespace();
        if !self.is_eof() {
            return Err(ParseError::TrailingContent(self.pos));
        }
        Ok(sexp)
    }

    fn parse_sexp(&mut self) -> Result<SExp, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(ParseError::UnexpectedEof),
            Some(b'(') => self.parse_list(),
            Some(b')') => Err(ParseError::UnexpectedToken(self.pos, ")".to_string())),
            Some(b'"') => self.parse_string(),
            Some(_) => self.parse_symbol(),
        }
    }

    fn parse_list(&mut self) -> Result<SExp, ParseError> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(ParseError::UnexpectedEof),
                Some(b')') => {
                    self.pos += 1;
                    return Ok(SExp::List(items));
                }
                Some(_) => items.push(self.parse_sexp()?),
            }
        }
    }

    fn parse_string(&mut self) -> Result<SExp, ParseError> {
        self.pos += 1;
        let mut bytes = Vec::new();
        loop {
            let ch = self.peek().ok_or(ParseError::UnexpectedEof)?;
            self.pos += 1;
            match ch {
                b'"' => break,
                b'\\' => {
                    let escaped = self.peek().ok_or(ParseError::UnexpectedEof)?;
                    self.pos += 1;
                    bytes.push(match escaped {
                        b'n' => b'\n',
                        b't' => b'\t',
                        b'r' => b'\r',
                        other => other,
                    });
                }
                other => bytes.push(other),
            }
        }
        Ok(SExp::Str(String::from_utf8_lossy(&bytes).into_owned()))
    }

    fn parse_symbol(&mut self) -> Result<SExp, ParseError> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_whitespace() || ch == b'(' || ch == b')' || ch == b'"' {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            return Err(ParseError::UnexpectedToken(start, "empty symbol".to_string()));
        }
        Ok(SExp::Atom(
            String::from_utf8_lossy(&self.input[start..self.pos]).into_owned(),
        ))
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }
}
