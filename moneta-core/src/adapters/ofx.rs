//! OFX statement parser
//!
//! Bank exports are SGML-flavoured: a colon-separated header, then tag soup
//! where leaf elements are usually left unclosed. The parser closes those
//! leaves, reads the result as XML and walks a fixed path down to the
//! transaction list.

use std::str::FromStr;
use std::sync::OnceLock;

use chrono::NaiveDate;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use rust_decimal::Decimal;

use crate::domain::result::{Error, Result};
use crate::domain::{ParsedStatement, StatementLine};

const ROOT_TAG: &str = "<OFX>";

/// Bank and credit-card message sets, root excluded
const BANK_PATH: [&str; 4] = ["BANKMSGSRSV1", "STMTTRNRS", "STMTRS", "BANKTRANLIST"];
const CARD_PATH: [&str; 4] = ["CREDITCARDMSGSRSV1", "CCSTMTTRNRS", "CCSTMTRS", "BANKTRANLIST"];

fn open_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<([A-Za-z0-9_.]+)>([^<\r\n]*)").expect("valid open tag pattern"))
}

fn entity_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^&(#[0-9]+|#x[0-9A-Fa-f]+|[A-Za-z][A-Za-z0-9]*);").expect("valid entity pattern")
    })
}

/// A parsed markup element
#[derive(Debug, Default)]
struct Node {
    name: String,
    text: String,
    children: Vec<Node>,
}

impl Node {
    fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Trimmed text of a direct child, if present and non-empty
    fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name)
            .map(|c| c.text.trim())
            .filter(|t| !t.is_empty())
    }
}

/// Parses OFX statement buffers into statement lines
#[derive(Debug, Clone)]
pub struct OfxParser {
    fallback_description: String,
}

impl OfxParser {
    pub fn new(fallback_description: impl Into<String>) -> Self {
        Self {
            fallback_description: fallback_description.into(),
        }
    }

    /// Parse a raw statement buffer.
    ///
    /// Any structural mismatch fails the whole statement; no partial list is returned.
    pub fn parse(&self, bytes: &[u8]) -> Result<ParsedStatement> {
        let text = String::from_utf8_lossy(bytes);
        let start = text
            .find(ROOT_TAG)
            .or_else(|| text.to_ascii_uppercase().find(ROOT_TAG))
            .ok_or_else(|| Error::validation("statement has no <OFX> root tag"))?;

        let markup = close_unclosed_tags(&text[start..]);
        let root = parse_tree(&markup)?;

        let list = descend(&root, &BANK_PATH)
            .or_else(|| descend(&root, &CARD_PATH))
            .ok_or_else(|| {
                Error::validation("statement has no BANKTRANLIST under a bank or credit card statement")
            })?;

        let lines = list
            .children_named("STMTTRN")
            .enumerate()
            .map(|(i, node)| self.map_entry(i, node))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(entries = lines.len(), "parsed OFX statement");
        Ok(ParsedStatement {
            lines,
            skipped_rows: 0,
        })
    }

    fn map_entry(&self, index: usize, node: &Node) -> Result<StatementLine> {
        let raw_amount = node
            .child_text("TRNAMT")
            .ok_or_else(|| Error::validation(format!("STMTTRN #{} has no TRNAMT", index + 1)))?;
        let amount = parse_amount(raw_amount).ok_or_else(|| {
            Error::validation(format!("STMTTRN #{} has invalid TRNAMT '{}'", index + 1, raw_amount))
        })?;

        let raw_date = node
            .child_text("DTPOSTED")
            .ok_or_else(|| Error::validation(format!("STMTTRN #{} has no DTPOSTED", index + 1)))?;
        let date = parse_posted_date(raw_date).ok_or_else(|| {
            Error::validation(format!("STMTTRN #{} has invalid DTPOSTED '{}'", index + 1, raw_date))
        })?;

        let description = node
            .child_text("MEMO")
            .or_else(|| node.child_text("NAME"))
            .unwrap_or(self.fallback_description.as_str())
            .to_string();

        Ok(StatementLine::from_signed(amount, date, description))
    }
}

/// Close every `<TAG>value` run that is not already followed by `</TAG>`.
/// Container tags (no value on their line) are left alone. Bare `&` is escaped.
pub fn close_unclosed_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 4);
    let mut last = 0;

    for caps in open_tag_regex().captures_iter(text) {
        let (Some(whole), Some(tag), Some(value)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        out.push_str(&escape_ampersands(&text[last..whole.start()]));
        out.push('<');
        out.push_str(tag.as_str());
        out.push('>');
        out.push_str(&escape_ampersands(value.as_str()));

        let closing = format!("</{}>", tag.as_str());
        let already_closed = text[whole.end()..].starts_with(&closing);
        if !value.as_str().trim().is_empty() && !already_closed {
            out.push_str(&closing);
        }
        last = whole.end();
    }
    out.push_str(&escape_ampersands(&text[last..]));
    out
}

fn escape_ampersands(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len() + 8);
    for (i, ch) in text.char_indices() {
        if ch == '&' && !entity_regex().is_match(&text[i..]) {
            out.push_str("&amp;");
        } else {
            out.push(ch);
        }
    }
    out
}

fn parse_tree(markup: &str) -> Result<Node> {
    let mut reader = Reader::from_str(markup);
    reader.trim_text(true);

    let malformed = |e: quick_xml::Error| Error::validation(format!("malformed statement markup: {}", e));

    let mut stack: Vec<Node> = vec![Node::default()];
    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(e) => stack.push(Node {
                name: String::from_utf8_lossy(e.name().as_ref()).to_uppercase(),
                ..Default::default()
            }),
            Event::Empty(e) => {
                let leaf = Node {
                    name: String::from_utf8_lossy(e.name().as_ref()).to_uppercase(),
                    ..Default::default()
                };
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(leaf);
                }
            }
            Event::Text(t) => {
                let value = t.unescape().map_err(malformed)?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&value);
                }
            }
            Event::CData(t) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::End(_) => {
                if stack.len() < 2 {
                    return Err(Error::validation("malformed statement markup: unbalanced end tag"));
                }
                if let Some(done) = stack.pop() {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(done);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if stack.len() != 1 {
        return Err(Error::validation("malformed statement markup: unclosed elements"));
    }
    let document = stack.pop().unwrap_or_default();
    document
        .children
        .into_iter()
        .find(|n| n.name == "OFX")
        .ok_or_else(|| Error::validation("statement has no <OFX> root element"))
}

fn descend<'a>(root: &'a Node, path: &[&str]) -> Option<&'a Node> {
    path.iter().try_fold(root, |node, name| node.child(name))
}

/// Signed OFX amount; a decimal comma is accepted
fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw.trim().replace(',', ".").chars().filter(|c| !c.is_whitespace()).collect();
    Decimal::from_str(&cleaned).ok()
}

/// Date from the leading `YYYYMMDD`; time and timezone suffixes are ignored
fn parse_posted_date(raw: &str) -> Option<NaiveDate> {
    let head = raw.trim().get(..8)?;
    NaiveDate::parse_from_str(head, "%Y%m%d").ok()
}
