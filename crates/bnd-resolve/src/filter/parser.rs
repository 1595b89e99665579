//! RFC 1960 filter parser

use super::{Filter, FilterError};

pub(super) struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub(super) fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    pub(super) fn parse(mut self) -> Result<Filter, FilterError> {
        self.skip_whitespace();
        let filter = self.parse_filter()?;
        self.skip_whitespace();
        if self.pos != self.chars.len() {
            return Err(self.error("unexpected trailing characters"));
        }
        Ok(filter)
    }

    fn parse_filter(&mut self) -> Result<Filter, FilterError> {
        self.expect('(')?;
        self.skip_whitespace();
        let filter = match self.peek() {
            Some('&') => {
                self.pos += 1;
                Filter::And(self.parse_list()?)
            }
            Some('|') => {
                self.pos += 1;
                Filter::Or(self.parse_list()?)
            }
            Some('!') => {
                self.pos += 1;
                self.skip_whitespace();
                Filter::Not(Box::new(self.parse_filter()?))
            }
            Some(_) => self.parse_item()?,
            None => return Err(self.error("unexpected end of filter")),
        };
        self.skip_whitespace();
        self.expect(')')?;
        Ok(filter)
    }

    fn parse_list(&mut self) -> Result<Vec<Filter>, FilterError> {
        let mut operands = Vec::new();
        self.skip_whitespace();
        while self.peek() == Some('(') {
            operands.push(self.parse_filter()?);
            self.skip_whitespace();
        }
        if operands.is_empty() {
            return Err(self.error("expected at least one operand"));
        }
        Ok(operands)
    }

    fn parse_item(&mut self) -> Result<Filter, FilterError> {
        let attr = self.parse_attribute()?;

        let op = match (self.peek(), self.chars.get(self.pos + 1).copied()) {
            (Some('='), _) => {
                self.pos += 1;
                '='
            }
            (Some(c @ ('~' | '>' | '<')), Some('=')) => {
                self.pos += 2;
                c
            }
            _ => return Err(self.error("expected one of =, ~=, >=, <=")),
        };

        let parts = self.parse_value()?;

        match op {
            '=' => Ok(Self::equal_or_substring(attr, parts)),
            _ if parts.len() > 1 => Err(self.error("wildcard only allowed with =")),
            '~' => Ok(Filter::Approx { attr, value: join(parts) }),
            '>' => Ok(Filter::GreaterEq { attr, value: join(parts) }),
            _ => Ok(Filter::LessEq { attr, value: join(parts) }),
        }
    }

    fn equal_or_substring(attr: String, parts: Vec<String>) -> Filter {
        if parts.len() == 1 {
            return Filter::Equal {
                attr,
                value: join(parts),
            };
        }
        if parts.len() == 2 && parts.iter().all(String::is_empty) {
            return Filter::Present(attr);
        }

        let last_idx = parts.len() - 1;
        let mut initial = None;
        let mut last = None;
        let mut any = Vec::new();
        for (i, part) in parts.into_iter().enumerate() {
            if i == 0 {
                if !part.is_empty() {
                    initial = Some(part);
                }
            } else if i == last_idx {
                if !part.is_empty() {
                    last = Some(part);
                }
            } else if !part.is_empty() {
                any.push(part);
            }
        }
        Filter::Substring {
            attr,
            initial,
            any,
            last,
        }
    }

    fn parse_attribute(&mut self) -> Result<String, FilterError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, '=' | '~' | '<' | '>' | '(' | ')') {
                break;
            }
            self.pos += 1;
        }
        let attr: String = self.chars[start..self.pos].iter().collect();
        let attr = attr.trim().to_string();
        if attr.is_empty() {
            return Err(self.error("missing attribute name"));
        }
        Ok(attr)
    }

    /// Parse a value into the pieces separated by unescaped `*`.
    fn parse_value(&mut self) -> Result<Vec<String>, FilterError> {
        let mut parts = vec![String::new()];
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated value")),
                Some(')') => break,
                Some('(') => return Err(self.error("unescaped ( in value")),
                Some('*') => {
                    self.pos += 1;
                    parts.push(String::new());
                }
                Some('\\') => {
                    self.pos += 1;
                    let escaped = self.peek().ok_or_else(|| self.error("dangling escape"))?;
                    self.pos += 1;
                    push_char(&mut parts, escaped);
                }
                Some(c) => {
                    self.pos += 1;
                    push_char(&mut parts, c);
                }
            }
        }
        Ok(parts)
    }

    fn expect(&mut self, expected: char) -> Result<(), FilterError> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", expected)))
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn error(&self, message: &str) -> FilterError {
        FilterError {
            filter: self.source.to_string(),
            position: self.pos,
            message: message.to_string(),
        }
    }
}

fn push_char(parts: &mut [String], c: char) {
    if let Some(last) = parts.last_mut() {
        last.push(c);
    }
}

fn join(parts: Vec<String>) -> String {
    parts.concat()
}
