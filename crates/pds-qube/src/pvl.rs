//! Minimal PVL-style label parsing.
//!
//! QUBE products embed an ASCII label ahead of the binary payload. This
//! module scans that label into a [`LabelTree`] of key/value entries with
//! OBJECT/GROUP nesting. It is deliberately not a full PVL grammar: it
//! understands exactly the constructs the product corpus uses (scalar
//! assignments, parenthesized sequences spanning lines, nested objects and
//! groups, and the END terminator).

use crate::error::{Error, Result};
use crate::value::{parse_scalar, Value};

/// A parsed label: flat entries plus nested OBJECT/GROUP subtrees.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelTree {
    entries: Vec<(String, Value)>,
    groups: Vec<(String, LabelTree)>,
}

impl LabelTree {
    /// Look up a top-level value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Look up a nested OBJECT or GROUP subtree by name.
    pub fn group(&self, name: &str) -> Option<&LabelTree> {
        self.groups
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, tree)| tree)
    }

    /// Number of direct entries (mostly useful in tests).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the tree has no direct entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse a label from the head of `bytes`, stopping at the END line.
    ///
    /// Returns the tree and the number of bytes consumed up to and
    /// including the END line. Bytes past END (the binary payload) are
    /// never inspected. A label with no END line is truncated.
    pub fn parse(bytes: &[u8]) -> Result<(LabelTree, usize)> {
        let mut root = LabelTree::default();
        // Stack of open OBJECT/GROUP scopes above the one being filled.
        let mut stack: Vec<(String, LabelTree)> = Vec::new();
        let mut consumed = 0usize;
        let mut pending: Option<(String, String)> = None;

        for raw_line in LineIter::new(bytes) {
            consumed += raw_line.len();
            let line = trim_line(raw_line);

            if let Some((key, mut acc)) = pending.take() {
                acc.push(' ');
                acc.push_str(line);
                if balanced(&acc) {
                    current(&mut root, &mut stack)
                        .entries
                        .push((key, parse_scalar(&acc)));
                } else {
                    pending = Some((key, acc));
                }
                continue;
            }

            if line.is_empty() || line.starts_with("/*") {
                continue;
            }

            if line == "END" {
                if let Some((name, _)) = stack.first() {
                    log::debug!("label ended inside open scope {name}");
                    return Err(Error::InvalidFormat("unterminated OBJECT/GROUP"));
                }
                return Ok((root, consumed));
            }

            let Some((key, value_text)) = split_assignment(line) else {
                // Free-form description text inside the label; skip it.
                continue;
            };

            match key {
                "OBJECT" | "GROUP" => {
                    stack.push((value_text.to_string(), LabelTree::default()));
                }
                "END_OBJECT" | "END_GROUP" => {
                    let (name, tree) = stack
                        .pop()
                        .ok_or(Error::InvalidFormat("unmatched END_OBJECT/END_GROUP"))?;
                    current(&mut root, &mut stack).groups.push((name, tree));
                }
                _ => {
                    // Only an open parenthesized sequence continues on the
                    // next line; quoted prose may contain stray parens.
                    if value_text.starts_with('(') && !balanced(value_text) {
                        pending = Some((key.to_string(), value_text.to_string()));
                    } else {
                        current(&mut root, &mut stack)
                            .entries
                            .push((key.to_string(), parse_scalar(value_text)));
                    }
                }
            }
        }

        Err(Error::TruncatedLabel)
    }
}

/// The scope currently being filled: the innermost open group, or the root.
fn current<'a>(
    root: &'a mut LabelTree,
    stack: &'a mut [(String, LabelTree)],
) -> &'a mut LabelTree {
    match stack.last_mut() {
        Some((_, tree)) => tree,
        None => root,
    }
}

/// `END_OBJECT = QUBE` also appears bare as `END_OBJECT`; both split here.
fn split_assignment(line: &str) -> Option<(&str, &str)> {
    if let Some(idx) = line.find('=') {
        let key = line[..idx].trim();
        let value = line[idx + 1..].trim();
        if !key.is_empty() {
            return Some((key, value));
        }
    }
    if line == "END_OBJECT" || line == "END_GROUP" {
        return Some((line, ""));
    }
    None
}

/// Returns `true` once every `(` in the accumulated value text is closed.
/// Parens inside quoted spans are literal text and do not count.
fn balanced(text: &str) -> bool {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    for c in text.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' => quote = Some(c),
                '(' => depth += 1,
                ')' => depth -= 1,
                _ => {}
            },
        }
    }
    depth <= 0
}

/// Decode one raw line as ASCII, dropping the line ending and any
/// non-ASCII bytes (labels are 7-bit; the payload never reaches here).
fn trim_line(raw: &[u8]) -> &str {
    let end = raw
        .iter()
        .position(|&b| b == b'\r' || b == b'\n')
        .unwrap_or(raw.len());
    std::str::from_utf8(&raw[..end]).unwrap_or("").trim()
}

/// Iterator over label lines, yielding each line *including* its ending so
/// the caller can account for consumed bytes exactly. Shared with the
/// line-oriented label strategy, which needs the same byte accounting.
pub(crate) struct LineIter<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> LineIter<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        LineIter { bytes, pos: 0 }
    }
}

impl<'a> Iterator for LineIter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        if self.pos >= self.bytes.len() {
            return None;
        }
        let start = self.pos;
        let rest = &self.bytes[start..];
        let end = match rest.iter().position(|&b| b == b'\n') {
            Some(idx) => start + idx + 1,
            None => self.bytes.len(),
        };
        self.pos = end;
        Some(&self.bytes[start..end])
    }
}
