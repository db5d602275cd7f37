//! Path queries over the document tree.
//!
//! Supports a JSONPath subset for addressing the insertion point:
//! - `$` - the document root (optional prefix)
//! - `.name` or `['name']` / `["name"]` - a mapping key
//! - `[3]`, `[-1]` - a sequence index (negative counts from the end)
//! - `.*` or `[*]` - every child of a mapping or sequence
//!
//! A query that matches several nodes resolves to the first one in
//! document order. Tagged values are looked through transparently.

use serde_yaml::Value;
use snafu::prelude::*;
use std::fmt;
use tracing::warn;

use crate::error::{PathError, PathNotFoundSnafu};

/// One selector of a parsed path query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(i64),
    Wildcard,
}

/// A concrete step taken while matching a query.
#[derive(Debug, Clone)]
enum Step {
    Key(Value),
    Index(usize),
}

/// A parsed path query addressing the insertion point of records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertPath {
    query: String,
    segments: Vec<Segment>,
}

impl InsertPath {
    /// The path addressing the document root.
    pub fn root() -> Self {
        Self {
            query: "$".to_string(),
            segments: Vec::new(),
        }
    }

    /// Parse a path query. Surrounding whitespace is ignored; error
    /// positions are byte offsets into `query` as given.
    pub fn parse(query: &str) -> Result<Self, PathError> {
        let segments = Parser::new(query).parse()?;
        Ok(Self {
            query: query.trim().to_string(),
            segments,
        })
    }

    /// The query text this path was parsed from.
    pub fn as_str(&self) -> &str {
        &self.query
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Count the nodes this query matches.
    pub fn count_matches(&self, document: &Value) -> usize {
        let mut matches = Vec::new();
        collect(document, &self.segments, &mut Vec::new(), &mut matches, usize::MAX);
        matches.len()
    }

    /// Resolve the query to a live reference into the document.
    ///
    /// Fails with `PathNotFound` when nothing matches. When several nodes
    /// match, the first in document order is returned.
    pub fn resolve_mut<'a>(&self, document: &'a mut Value) -> Result<&'a mut Value, PathError> {
        // A second match is only needed to warn about ambiguity
        let mut matches = Vec::with_capacity(2);
        collect(document, &self.segments, &mut Vec::new(), &mut matches, 2);

        if matches.len() > 1 {
            warn!(
                query = %self.query,
                "Path query matched several nodes, using the first"
            );
        }

        let steps = matches.into_iter().next().context(PathNotFoundSnafu {
            query: &self.query,
        })?;
        walk_mut(document, &steps).context(PathNotFoundSnafu { query: &self.query })
    }
}

impl Default for InsertPath {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for InsertPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.query)
    }
}

fn untag(node: &Value) -> &Value {
    match node {
        Value::Tagged(tagged) => untag(&tagged.value),
        other => other,
    }
}

fn untag_mut(node: &mut Value) -> &mut Value {
    match node {
        Value::Tagged(tagged) => untag_mut(&mut tagged.value),
        other => other,
    }
}

/// Collect the step trails of up to `limit` matches, in document order.
fn collect(
    node: &Value,
    segments: &[Segment],
    trail: &mut Vec<Step>,
    out: &mut Vec<Vec<Step>>,
    limit: usize,
) {
    if out.len() >= limit {
        return;
    }
    let Some((segment, rest)) = segments.split_first() else {
        out.push(trail.clone());
        return;
    };

    match (segment, untag(node)) {
        (Segment::Key(name), Value::Mapping(map)) => {
            if let Some(child) = map.get(name.as_str()) {
                trail.push(Step::Key(Value::String(name.clone())));
                collect(child, rest, trail, out, limit);
                trail.pop();
            }
        }
        (Segment::Index(index), Value::Sequence(seq)) => {
            let len = seq.len() as i64;
            let index = if *index < 0 { len + index } else { *index };
            if (0..len).contains(&index) {
                let index = index as usize;
                trail.push(Step::Index(index));
                collect(&seq[index], rest, trail, out, limit);
                trail.pop();
            }
        }
        (Segment::Wildcard, Value::Mapping(map)) => {
            for (key, child) in map {
                if out.len() >= limit {
                    break;
                }
                trail.push(Step::Key(key.clone()));
                collect(child, rest, trail, out, limit);
                trail.pop();
            }
        }
        (Segment::Wildcard, Value::Sequence(seq)) => {
            for (index, child) in seq.iter().enumerate() {
                if out.len() >= limit {
                    break;
                }
                trail.push(Step::Index(index));
                collect(child, rest, trail, out, limit);
                trail.pop();
            }
        }
        _ => {}
    }
}

fn walk_mut<'a>(mut node: &'a mut Value, steps: &[Step]) -> Option<&'a mut Value> {
    for step in steps {
        node = match (step, untag_mut(node)) {
            (Step::Key(key), Value::Mapping(map)) => map.get_mut(key)?,
            (Step::Index(index), Value::Sequence(seq)) => seq.get_mut(*index)?,
            _ => return None,
        };
    }
    Some(untag_mut(node))
}

/// Recursive-descent parser for path queries.
///
/// Parses the whitespace-trimmed region `pos..end` of `query`, keeping byte
/// offsets relative to the untrimmed text.
struct Parser<'a> {
    query: &'a str,
    pos: usize,
    end: usize,
}

impl<'a> Parser<'a> {
    fn new(query: &'a str) -> Self {
        let pos = query.len() - query.trim_start().len();
        let end = query.trim_end().len().max(pos);
        Self { query, pos, end }
    }

    fn peek(&self) -> Option<char> {
        self.query[self.pos..self.end].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn error(&self, message: impl Into<String>) -> PathError {
        PathError::PathSyntax {
            query: self.query.to_string(),
            position: self.pos,
            message: message.into(),
        }
    }

    fn parse(mut self) -> Result<Vec<Segment>, PathError> {
        let mut segments = Vec::new();

        match self.peek() {
            Some('$') => {
                self.bump();
            }
            // Bare `name.other` without a root marker
            Some(c) if c != '.' && c != '[' => {
                segments.push(Segment::Key(self.name()?));
            }
            _ => {}
        }

        while let Some(c) = self.peek() {
            match c {
                '.' => {
                    self.bump();
                    match self.peek() {
                        Some('*') => {
                            self.bump();
                            segments.push(Segment::Wildcard);
                        }
                        Some('.') => return Err(self.error("recursive descent is not supported")),
                        _ => segments.push(Segment::Key(self.name()?)),
                    }
                }
                '[' => {
                    self.bump();
                    segments.push(self.bracket()?);
                }
                _ => return Err(self.error(format!("unexpected character {c:?}"))),
            }
        }

        Ok(segments)
    }

    fn name(&mut self) -> Result<String, PathError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '.' || c == '[' || c == ']' || c.is_whitespace() {
                break;
            }
            self.bump();
        }
        if self.pos == start {
            return Err(self.error("expected a property name"));
        }
        Ok(self.query[start..self.pos].to_string())
    }

    fn bracket(&mut self) -> Result<Segment, PathError> {
        self.skip_whitespace();
        let segment = match self.peek() {
            Some('*') => {
                self.bump();
                Segment::Wildcard
            }
            Some(quote @ ('\'' | '"')) => {
                self.bump();
                Segment::Key(self.quoted(quote)?)
            }
            Some(c) if c == '-' || c.is_ascii_digit() => Segment::Index(self.integer()?),
            Some(c) => return Err(self.error(format!("unexpected character {c:?} in brackets"))),
            None => return Err(self.error("unterminated bracket")),
        };
        self.skip_whitespace();
        match self.bump() {
            Some(']') => Ok(segment),
            _ => Err(self.error("expected ']'")),
        }
    }

    fn quoted(&mut self, quote: char) -> Result<String, PathError> {
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some(escaped) => out.push(escaped),
                    None => return Err(self.error("unterminated escape")),
                },
                Some(c) if c == quote => return Ok(out),
                Some(c) => out.push(c),
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    fn integer(&mut self) -> Result<i64, PathError> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.bump();
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        self.query[start..self.pos]
            .parse()
            .map_err(|_| self.error("expected an integer index"))
    }
}
