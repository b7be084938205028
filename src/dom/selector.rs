use std::fmt;
use std::str::FromStr;

use crate::dom::node::{DomTree, NodeId};
use crate::error::FormError;

/// A parsed CSS selector list.
///
/// Supported subset: type and `*`, `#id`, `.class`, attribute tests
/// (`[a]`, `=`, `~=`, `^=`, `$=`, `*=`), `:nth-of-type(n)`, the descendant
/// and `>` combinators, and comma-separated alternatives.
#[derive(Debug, Clone)]
pub struct Selector {
    source: String,
    alternatives: Vec<ComplexSelector>,
}

#[derive(Debug, Clone)]
struct ComplexSelector {
    compounds: Vec<Compound>,
    // combinators[i] joins compounds[i] and compounds[i + 1]
    combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Default)]
struct Compound {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attrs: Vec<AttrTest>,
    nth_of_type: Option<usize>,
}

#[derive(Debug, Clone)]
struct AttrTest {
    name: String,
    op: AttrOp,
    value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals,
    Includes,
    Prefix,
    Suffix,
    Substring,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, FormError> {
        let mut parser = Parser {
            chars: source.chars().collect(),
            pos: 0,
            source,
        };
        let mut alternatives = Vec::new();

        loop {
            parser.skip_ws();
            alternatives.push(parser.complex()?);
            parser.skip_ws();
            match parser.peek() {
                None => break,
                Some(',') => parser.pos += 1,
                Some(c) => return Err(parser.error(&format!("unexpected '{}'", c))),
            }
        }

        Ok(Selector {
            source: source.to_string(),
            alternatives,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub(crate) fn matches_node(&self, tree: &DomTree, id: NodeId) -> bool {
        self.alternatives.iter().any(|alt| {
            alt.compounds
                .len()
                .checked_sub(1)
                .is_some_and(|last| alt.matches_at(tree, id, last))
        })
    }
}

impl FromStr for Selector {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Selector::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl ComplexSelector {
    fn matches_at(&self, tree: &DomTree, id: NodeId, idx: usize) -> bool {
        if !self.compounds[idx].matches(tree, id) {
            return false;
        }
        if idx == 0 {
            return true;
        }

        match self.combinators[idx - 1] {
            Combinator::Child => tree
                .parent(id)
                .is_some_and(|p| self.matches_at(tree, p, idx - 1)),
            Combinator::Descendant => tree
                .ancestors(id)
                .into_iter()
                .any(|a| self.matches_at(tree, a, idx - 1)),
        }
    }
}

impl Compound {
    fn matches(&self, tree: &DomTree, id: NodeId) -> bool {
        let Some(node) = tree.get(id) else {
            return false;
        };

        if let Some(tag) = &self.tag {
            if &node.tag != tag {
                return false;
            }
        }
        if self.ids.iter().any(|i| node.attr("id") != Some(i.as_str())) {
            return false;
        }
        if self.classes.iter().any(|c| !node.has_class(c)) {
            return false;
        }
        for test in &self.attrs {
            let Some(actual) = node.attr(&test.name) else {
                return false;
            };
            let ok = match test.op {
                AttrOp::Exists => true,
                AttrOp::Equals => actual == test.value,
                AttrOp::Includes => actual.split_whitespace().any(|w| w == test.value),
                AttrOp::Prefix => !test.value.is_empty() && actual.starts_with(&test.value),
                AttrOp::Suffix => !test.value.is_empty() && actual.ends_with(&test.value),
                AttrOp::Substring => !test.value.is_empty() && actual.contains(&test.value),
            };
            if !ok {
                return false;
            }
        }
        if let Some(n) = self.nth_of_type {
            let Some(parent) = node.parent.and_then(|p| tree.get(p)) else {
                return n == 1;
            };
            let position = parent
                .children
                .iter()
                .filter(|c| tree.get(**c).is_some_and(|s| s.tag == node.tag))
                .position(|c| *c == id);
            if position.map(|p| p + 1) != Some(n) {
                return false;
            }
        }
        true
    }
}

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    source: &'a str,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn error(&self, reason: &str) -> FormError {
        FormError::Selector {
            selector: self.source.to_string(),
            reason: format!("{} at position {}", reason, self.pos),
        }
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn expect(&mut self, c: char) -> Result<(), FormError> {
        if self.peek() == Some(c) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", c)))
        }
    }

    fn ident(&mut self) -> Result<String, FormError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected identifier"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn quoted(&mut self, quote: char) -> Result<String, FormError> {
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated string")),
                Some('\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(c) => out.push(c),
                        None => return Err(self.error("dangling escape")),
                    }
                    self.pos += 1;
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn complex(&mut self) -> Result<ComplexSelector, FormError> {
        let mut compounds = vec![self.compound()?];
        let mut combinators = Vec::new();

        loop {
            let had_ws = self.skip_ws();
            match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.pos += 1;
                    self.skip_ws();
                    combinators.push(Combinator::Child);
                    compounds.push(self.compound()?);
                }
                Some(_) if had_ws => {
                    combinators.push(Combinator::Descendant);
                    compounds.push(self.compound()?);
                }
                Some(c) => return Err(self.error(&format!("unexpected '{}'", c))),
            }
        }

        Ok(ComplexSelector {
            compounds,
            combinators,
        })
    }

    fn compound(&mut self) -> Result<Compound, FormError> {
        let mut compound = Compound::default();
        let mut any = false;

        match self.peek() {
            Some('*') => {
                self.pos += 1;
                any = true;
            }
            Some(c) if c.is_alphabetic() => {
                compound.tag = Some(self.ident()?.to_lowercase());
                any = true;
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.ids.push(self.ident()?);
                }
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.ident()?);
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attrs.push(self.attr_test()?);
                }
                Some(':') => {
                    self.pos += 1;
                    let pseudo = self.ident()?;
                    if pseudo != "nth-of-type" {
                        return Err(self.error(&format!("unsupported pseudo-class ':{}'", pseudo)));
                    }
                    self.expect('(')?;
                    self.skip_ws();
                    let digits = self.ident()?;
                    let n = digits
                        .parse::<usize>()
                        .map_err(|_| self.error("expected a number"))?;
                    self.skip_ws();
                    self.expect(')')?;
                    compound.nth_of_type = Some(n);
                }
                _ => break,
            }
            any = true;
        }

        if !any {
            return Err(self.error("expected selector"));
        }
        Ok(compound)
    }

    fn attr_test(&mut self) -> Result<AttrTest, FormError> {
        self.skip_ws();
        let name = self.ident()?;
        self.skip_ws();

        let op = match self.peek() {
            Some(']') => {
                self.pos += 1;
                return Ok(AttrTest {
                    name,
                    op: AttrOp::Exists,
                    value: String::new(),
                });
            }
            Some('=') => AttrOp::Equals,
            Some('~') => AttrOp::Includes,
            Some('^') => AttrOp::Prefix,
            Some('$') => AttrOp::Suffix,
            Some('*') => AttrOp::Substring,
            _ => return Err(self.error("expected attribute operator")),
        };
        self.pos += 1;
        if op != AttrOp::Equals {
            self.expect('=')?;
        }
        self.skip_ws();

        let value = match self.peek() {
            Some(q @ ('"' | '\'')) => self.quoted(q)?,
            _ => self.ident()?,
        };
        self.skip_ws();
        self.expect(']')?;

        Ok(AttrTest { name, op, value })
    }
}

/// Quote a value for use inside `[attr="..."]`.
pub fn quote_value(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}
