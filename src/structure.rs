// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Rebuilds an outline from markdown-like response text.
//!
//! Assistant responses are mostly markdown: headers, bulleted and numbered
//! lists nested by indentation, and plain paragraphs. [`parse_structure`]
//! maps them onto nested [`Node`]s:
//!
//! - `#` to `######` headers become roots that own what follows them
//! - list items nest under the closest preceding item with less indentation
//! - paragraphs become nodes at the top level of the current header
//! - blank lines end any open list
//!
//! # Example
//!
//! ```
//! use chat2tana::structure::parse_structure;
//!
//! let nodes = parse_structure("# H\n- a\n  - b\n- c");
//! assert_eq!(nodes.len(), 1);
//! assert_eq!(nodes[0].label, "H");
//! assert_eq!(nodes[0].children[0].children[0].label, "b");
//! ```

use crate::node::Node;
use crate::text::{MAX_LABEL_CHARS, split_text, truncate_label};
use regex::Regex;
use std::sync::LazyLock;

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,6}\s+(.*\S)\s*$").expect("valid regex"));

static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^( *)(?:[-*]|\d+\.)\s+(.*\S)\s*$").expect("valid regex"));

/// Numbered items the bullet pattern misses, such as `1)` or `2.Next`.
static NUMBERED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+[.)]\s*([^\d\s].*?)\s*$").expect("valid regex"));

/// Indent assigned to headers so that every list item nests below them.
const HEADER_INDENT: isize = -1;

/// How a single line contributes to the outline.
#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Blank,
    Header(&'a str),
    Item { indent: usize, text: &'a str },
    Text(&'a str),
}

fn classify(line: &str) -> Line<'_> {
    if line.trim().is_empty() {
        return Line::Blank;
    }
    if let Some(caps) = HEADER_RE.captures(line) {
        return Line::Header(caps.get(1).map_or("", |m| m.as_str()));
    }
    if let Some(caps) = BULLET_RE.captures(line) {
        let indent = caps.get(1).map_or(0, |m| m.len());
        return Line::Item {
            indent,
            text: caps.get(2).map_or("", |m| m.as_str()),
        };
    }
    if let Some(caps) = NUMBERED_RE.captures(line) {
        return Line::Item {
            indent: 0,
            text: caps.get(1).map_or("", |m| m.as_str()),
        };
    }
    Line::Text(line.trim())
}

/// Builds the node forest while tracking which nodes are still open.
///
/// Open nodes live on a stack together with their indentation. A node is
/// attached to its parent (the entry below it) once it is popped, which is
/// always after all of its own children have been attached, so sibling
/// order is preserved without holding references into the tree.
#[derive(Default)]
struct OutlineBuilder {
    roots: Vec<Node>,
    open: Vec<(isize, Node)>,
    paragraph: Vec<String>,
}

impl OutlineBuilder {
    fn push_line(&mut self, line: &str) {
        match classify(line) {
            Line::Blank => {
                self.flush_paragraph();
                self.close_while(|indent| indent > HEADER_INDENT);
            }
            Line::Header(text) => {
                self.flush_paragraph();
                self.close_while(|_| true);
                self.open
                    .push((HEADER_INDENT, Node::leaf(truncate_label(text, MAX_LABEL_CHARS))));
            }
            Line::Item { indent, text } => {
                self.flush_paragraph();
                let indent = isize::try_from(indent).unwrap_or(isize::MAX);
                self.place(indent, Node::leaf(truncate_label(text, MAX_LABEL_CHARS)));
            }
            Line::Text(text) => self.paragraph.push(text.to_owned()),
        }
    }

    fn flush_paragraph(&mut self) {
        if self.paragraph.is_empty() {
            return;
        }
        let joined = self.paragraph.join(" ");
        self.paragraph.clear();

        for chunk in split_text(&joined, MAX_LABEL_CHARS) {
            self.place(0, Node::leaf(truncate_label(&chunk, MAX_LABEL_CHARS)));
        }
    }

    /// Opens `node` at `indent`, closing every open node at the same or a
    /// deeper indentation first.
    fn place(&mut self, indent: isize, node: Node) {
        self.close_while(|open| open >= indent);
        self.open.push((indent, node));
    }

    /// Closes open nodes from the top of the stack while `pred` holds for
    /// their indentation.
    fn close_while(&mut self, pred: impl Fn(isize) -> bool) {
        while let Some(&(indent, _)) = self.open.last() {
            if !pred(indent) {
                break;
            }
            if let Some((_, node)) = self.open.pop() {
                self.attach(node);
            }
        }
    }

    fn attach(&mut self, node: Node) {
        match self.open.last_mut() {
            Some((_, parent)) => parent.children.push(node),
            None => self.roots.push(node),
        }
    }

    fn finish(mut self) -> Vec<Node> {
        self.flush_paragraph();
        self.close_while(|_| true);
        self.roots
    }
}

/// Parses sanitized multi-line text into a sequence of root nodes.
///
/// Never fails: text without any recognizable structure comes back as one
/// node per paragraph.
///
/// A blank line ends any open list but not the enclosing header, so a
/// section keeps every paragraph and list that follows its header until
/// the next header.
#[must_use]
pub fn parse_structure(text: &str) -> Vec<Node> {
    let mut builder = OutlineBuilder::default();
    for line in text.lines() {
        builder.push_line(line);
    }
    builder.finish()
}
