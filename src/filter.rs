//! Search filters (RFC 4515).
//!
//! Filters are built with [`Filter::eq`], [`Filter::and`] and [`Filter::raw`]
//! and rendered to their string form when handed to the directory.

use std::fmt;

use thiserror::Error;


#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Equality { attribute: String, value: Vec<u8> },
    Substrings { attribute: String, initial: Option<Vec<u8>>, any: Vec<Vec<u8>>, last: Option<Vec<u8>> },
    GreaterOrEqual { attribute: String, value: Vec<u8> },
    LessOrEqual { attribute: String, value: Vec<u8> },
    Present { attribute: String },
    /// A filter string passed through verbatim; the caller is responsible
    /// for its syntax.
    Raw(String),
}

#[derive(Clone, Debug, Eq, Error, Hash, PartialEq)]
#[error("invalid filter at offset {offset}: {message}")]
pub struct FilterParseError {
    pub offset: usize,
    pub message: &'static str,
}


impl Filter {
    /// Equality filter on `attribute`.
    ///
    /// `*` in `pattern` is a wildcard; a lone `*` tests for presence. All other
    /// characters match literally.
    pub fn eq(attribute: &str, pattern: &str) -> Self {
        let attribute = attribute.to_owned();
        if pattern == "*" {
            return Self::Present { attribute };
        }
        if !pattern.contains('*') {
            return Self::Equality { attribute, value: pattern.as_bytes().to_vec() };
        }

        let parts: Vec<&str> = pattern.split('*').collect();
        let last_index = parts.len() - 1;
        let non_empty = |s: &str| if s.len() > 0 { Some(s.as_bytes().to_vec()) } else { None };
        Self::Substrings {
            attribute,
            initial: non_empty(parts[0]),
            any: parts[1..last_index].iter()
                .filter(|p| p.len() > 0)
                .map(|p| p.as_bytes().to_vec())
                .collect(),
            last: non_empty(parts[last_index]),
        }
    }

    /// Equality filter on a binary value such as `objectSid`.
    pub fn eq_bytes(attribute: &str, value: &[u8]) -> Self {
        Self::Equality { attribute: attribute.to_owned(), value: value.to_vec() }
    }

    pub fn present(attribute: &str) -> Self {
        Self::Present { attribute: attribute.to_owned() }
    }

    pub fn raw<S: Into<String>>(filter: S) -> Self {
        Self::Raw(filter.into())
    }

    /// Conjunction of two filters; nested conjunctions are flattened.
    pub fn and(self, other: Filter) -> Self {
        let mut clauses = Vec::new();
        for filter in [self, other] {
            match filter {
                Self::And(inner) => clauses.extend(inner),
                other => clauses.push(other),
            }
        }
        Self::And(clauses)
    }

    /// Conjunction of all given filters, or `None` if there are none.
    pub fn all<I: IntoIterator<Item = Filter>>(filters: I) -> Option<Self> {
        filters.into_iter()
            .reduce(|acc, f| acc.and(f))
    }

    /// Parses a filter string into its structured form.
    ///
    /// A filter without enclosing parentheses (`cn=John`) is accepted.
    pub fn parse(text: &str) -> Result<Self, FilterParseError> {
        let trimmed = text.trim();
        let wrapped;
        let source = if trimmed.starts_with('(') {
            trimmed
        } else {
            wrapped = format!("({})", trimmed);
            &wrapped
        };

        let mut parser = Parser { bytes: source.as_bytes(), pos: 0 };
        let filter = parser.filter()?;
        if parser.pos != parser.bytes.len() {
            return Err(parser.error("trailing characters"));
        }
        Ok(filter)
    }

    /// Resolves a [`Filter::Raw`] (at any depth) into its structured form.
    pub fn resolve(&self) -> Result<Self, FilterParseError> {
        Ok(match self {
            Self::Raw(text) => Self::parse(text)?,
            Self::And(inner) => Self::And(inner.iter().map(|f| f.resolve()).collect::<Result<_, _>>()?),
            Self::Or(inner) => Self::Or(inner.iter().map(|f| f.resolve()).collect::<Result<_, _>>()?),
            Self::Not(inner) => Self::Not(Box::new(inner.resolve()?)),
            other => other.clone(),
        })
    }
}

fn write_escaped(f: &mut fmt::Formatter<'_>, value: &[u8]) -> fmt::Result {
    match std::str::from_utf8(value) {
        Ok(text) => {
            for c in text.chars() {
                match c {
                    '*' | '(' | ')' | '\\' => write!(f, "\\{:02x}", c as u32)?,
                    c if c.is_ascii_control() => write!(f, "\\{:02x}", c as u32)?,
                    other => write!(f, "{}", other)?,
                }
            }
        },
        Err(_) => {
            for b in value {
                write!(f, "\\{:02x}", b)?;
            }
        },
    }
    Ok(())
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And(inner) => {
                write!(f, "(&")?;
                for filter in inner {
                    write!(f, "{}", filter)?;
                }
                write!(f, ")")
            },
            Self::Or(inner) => {
                write!(f, "(|")?;
                for filter in inner {
                    write!(f, "{}", filter)?;
                }
                write!(f, ")")
            },
            Self::Not(inner) => write!(f, "(!{})", inner),
            Self::Equality { attribute, value } => {
                write!(f, "({}=", attribute)?;
                write_escaped(f, value)?;
                write!(f, ")")
            },
            Self::Substrings { attribute, initial, any, last } => {
                write!(f, "({}=", attribute)?;
                if let Some(initial) = initial {
                    write_escaped(f, initial)?;
                }
                write!(f, "*")?;
                for part in any {
                    write_escaped(f, part)?;
                    write!(f, "*")?;
                }
                if let Some(last) = last {
                    write_escaped(f, last)?;
                }
                write!(f, ")")
            },
            Self::GreaterOrEqual { attribute, value } => {
                write!(f, "({}>=", attribute)?;
                write_escaped(f, value)?;
                write!(f, ")")
            },
            Self::LessOrEqual { attribute, value } => {
                write!(f, "({}<=", attribute)?;
                write_escaped(f, value)?;
                write!(f, ")")
            },
            Self::Present { attribute } => write!(f, "({}=*)", attribute),
            Self::Raw(text) => {
                if text.trim_start().starts_with('(') {
                    write!(f, "{}", text.trim())
                } else {
                    write!(f, "({})", text.trim())
                }
            },
        }
    }
}


struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}
impl<'a> Parser<'a> {
    fn error(&self, message: &'static str) -> FilterParseError {
        FilterParseError { offset: self.pos, message }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn expect(&mut self, b: u8, message: &'static str) -> Result<(), FilterParseError> {
        if self.peek() == Some(b) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(message))
        }
    }

    fn filter(&mut self) -> Result<Filter, FilterParseError> {
        self.expect(b'(', "expected '('")?;
        let filter = match self.peek() {
            Some(b'&') => {
                self.pos += 1;
                Filter::And(self.filter_list()?)
            },
            Some(b'|') => {
                self.pos += 1;
                Filter::Or(self.filter_list()?)
            },
            Some(b'!') => {
                self.pos += 1;
                Filter::Not(Box::new(self.filter()?))
            },
            Some(_) => self.item()?,
            None => return Err(self.error("unexpected end of filter")),
        };
        self.expect(b')', "expected ')'")?;
        Ok(filter)
    }

    fn filter_list(&mut self) -> Result<Vec<Filter>, FilterParseError> {
        let mut filters = Vec::new();
        while self.peek() == Some(b'(') {
            filters.push(self.filter()?);
        }
        if filters.is_empty() {
            return Err(self.error("empty filter list"));
        }
        Ok(filters)
    }

    fn item(&mut self) -> Result<Filter, FilterParseError> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == b'=' || b == b'>' || b == b'<' || b == b'~' || b == b'(' || b == b')' {
                break;
            }
            self.pos += 1;
        }
        let attribute = std::str::from_utf8(&self.bytes[start..self.pos])
            .map_err(|_| self.error("attribute name is not UTF-8"))?
            .trim()
            .to_owned();
        if attribute.is_empty() {
            return Err(self.error("missing attribute name"));
        }

        let operator = match self.peek() {
            Some(b'=') => {
                self.pos += 1;
                b'='
            },
            Some(op @ (b'>' | b'<' | b'~')) => {
                self.pos += 1;
                self.expect(b'=', "expected '=' after comparison operator")?;
                op
            },
            _ => return Err(self.error("expected comparison operator")),
        };

        // split the assertion value at unescaped asterisks
        let mut parts: Vec<Vec<u8>> = vec![Vec::new()];
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated assertion value")),
                Some(b')') => break,
                Some(b'(') => return Err(self.error("unescaped '(' in assertion value")),
                Some(b'*') => {
                    self.pos += 1;
                    parts.push(Vec::new());
                },
                Some(b'\\') => {
                    let hex = self.bytes.get(self.pos+1..self.pos+3)
                        .and_then(|h| std::str::from_utf8(h).ok())
                        .and_then(|h| u8::from_str_radix(h, 16).ok())
                        .ok_or_else(|| self.error("invalid escape sequence"))?;
                    self.pos += 3;
                    if let Some(current) = parts.last_mut() {
                        current.push(hex);
                    }
                },
                Some(b) => {
                    self.pos += 1;
                    if let Some(current) = parts.last_mut() {
                        current.push(b);
                    }
                },
            }
        }

        if parts.len() > 1 && operator != b'=' {
            return Err(self.error("wildcards are only allowed in equality assertions"));
        }

        let value = parts.concat();
        Ok(match operator {
            b'>' => Filter::GreaterOrEqual { attribute, value },
            b'<' => Filter::LessOrEqual { attribute, value },
            // approximate matching degrades to equality
            b'~' => Filter::Equality { attribute, value },
            _ if parts.len() == 1 => Filter::Equality { attribute, value },
            _ if parts.len() == 2 && parts[0].is_empty() && parts[1].is_empty() => Filter::Present { attribute },
            _ => {
                let last_index = parts.len() - 1;
                let mut parts = parts;
                let last = parts.pop().filter(|p| !p.is_empty());
                let mut rest = parts.into_iter();
                let initial = rest.next().filter(|p| !p.is_empty());
                let any = rest.take(last_index - 1).filter(|p| !p.is_empty()).collect();
                Filter::Substrings { attribute, initial, any, last }
            },
        })
    }
}
