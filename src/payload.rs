// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Splitting of node trees that exceed the payload budget.
//!
//! Tana's input API rejects requests above a fixed size, so every tree sent
//! must serialize to at most a given number of bytes. [`split_payload`]
//! turns one oversized root into several roots that each fit:
//!
//! 1. Children that are too large on their own are split first. A child
//!    with children becomes several siblings labeled `"<label> (part i/N)"`,
//!    each holding a run of the original children. A childless child has
//!    its label truncated.
//! 2. The resulting children are packed greedily, in order, into batches.
//!    The first batch is labeled `"<label> (1/N)"` and the rest
//!    `"<label> (continued i/N)"`.
//!
//! Child order is never changed. When a subtree is nested so deeply that
//! the budget left for it gets very small, the children that do not fit are
//! replaced by a `"[k more items...]"` node. Every truncation and omission
//! is reported as a [`Reduction`].
//!
//! # Example
//!
//! ```
//! use chat2tana::node::Node;
//! use chat2tana::payload::split_payload;
//!
//! let children = (0..30).map(|i| Node::leaf(format!("item {i}"))).collect();
//! let root = Node::with_children("Big", children);
//!
//! let split = split_payload(root, 200);
//! assert!(split.nodes.len() > 1);
//! assert!(split.nodes.iter().all(|n| n.fits(200)));
//! assert!(split.reductions.is_empty());
//! ```

use crate::node::{CHILDREN_KEY_BYTES, Node, size_with_children};
use crate::text::ELLIPSIS;
use std::fmt;
use tracing::debug;

/// Default maximum serialized size of one payload, in bytes. Leaves
/// headroom below the API's hard limit.
pub const MAX_PAYLOAD_BYTES: usize = 4800;

/// Worst-case suffixes, used to size batch wrappers before the number of
/// batches is known.
const CONTINUED_SUFFIX_RESERVE: &str = " (continued 9999/9999)";
const PART_SUFFIX_RESERVE: &str = " (part 9999/9999)";

/// Below this budget a subtree is no longer split into parts; children
/// that do not fit are summarized instead.
const MIN_SPLIT_BUDGET: usize = 128;

/// Characters of a label quoted in reduction messages.
const PREVIEW_CHARS: usize = 40;

/// Content removed to make a tree fit its budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reduction {
    /// A label was shortened.
    Truncated {
        /// The label after truncation.
        label: String,
        /// Number of characters removed, not counting the added ellipsis.
        removed_chars: usize,
    },

    /// Trailing children were dropped and replaced by a summary node.
    Omitted {
        /// Label of the node that lost children.
        label: String,
        /// Number of children dropped.
        omitted: usize,
    },
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated {
                label,
                removed_chars,
            } => write!(
                f,
                "truncated \"{}\" by {removed_chars} characters to fit the payload budget",
                preview(label)
            ),
            Self::Omitted { label, omitted } => write!(
                f,
                "omitted {omitted} items under \"{}\" to fit the payload budget",
                preview(label)
            ),
        }
    }
}

fn preview(label: &str) -> String {
    let mut out: String = label.chars().take(PREVIEW_CHARS).collect();
    if label.chars().count() > PREVIEW_CHARS {
        out.push_str(ELLIPSIS);
    }
    out
}

/// The result of [`split_payload`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Split {
    /// Root nodes in order; a single untouched root when it already fit.
    pub nodes: Vec<Node>,

    /// Lossy changes made along the way, in the order they happened.
    pub reductions: Vec<Reduction>,
}

/// Splits `root` into roots that each serialize to at most `budget` bytes.
///
/// A root that already fits is returned unchanged as the only node.
/// Otherwise all returned roots keep the original tag and carry the
/// original label with a batch suffix. The size bound holds for any budget
/// large enough to hold a handful of minimal nodes (a few hundred bytes).
#[must_use]
pub fn split_payload(root: Node, budget: usize) -> Split {
    let mut splitter = Splitter::default();
    let nodes = splitter.split_root(root, budget);
    Split {
        nodes,
        reductions: splitter.reductions,
    }
}

/// What to do with a child that cannot fit a batch even on its own.
#[derive(Debug, Clone, Copy)]
enum Oversized {
    /// Split it into parts and pack each part.
    Split,
    /// Keep what fits and summarize the rest.
    Reduce,
}

#[derive(Default)]
struct Splitter {
    reductions: Vec<Reduction>,
}

impl Splitter {
    fn split_root(&mut self, root: Node, budget: usize) -> Vec<Node> {
        if root.fits(budget) {
            return vec![root];
        }
        if root.children.is_empty() {
            return vec![self.truncate_to_fit(root, budget)];
        }

        let Node {
            label,
            children,
            tag,
        } = root;
        let label = self.fit_wrapper_label(label, tag.as_deref(), CONTINUED_SUFFIX_RESERVE, budget);
        let overhead = wrapper_overhead(&label, tag.as_deref(), CONTINUED_SUFFIX_RESERVE);

        let children = self.fit_children(children, budget.saturating_sub(overhead));
        let batches = self.pack(children, budget, overhead, Oversized::Split);
        debug!(batches = batches.len(), "split root into batches");

        label_batches(batches, &label, tag.as_deref(), |i, n| {
            if i == 1 {
                format!(" ({i}/{n})")
            } else {
                format!(" (continued {i}/{n})")
            }
        })
    }

    /// Makes every child fit `budget` on its own, splitting or truncating
    /// the ones that do not.
    fn fit_children(&mut self, children: Vec<Node>, budget: usize) -> Vec<Node> {
        let mut fitted = Vec::with_capacity(children.len());
        for child in children {
            if child.fits(budget) {
                fitted.push(child);
            } else if child.children.is_empty() {
                fitted.push(self.truncate_to_fit(child, budget));
            } else {
                fitted.extend(self.sub_split(child, budget));
            }
        }
        fitted
    }

    /// Splits a node with children into sibling parts that each fit `budget`.
    fn sub_split(&mut self, node: Node, budget: usize) -> Vec<Node> {
        if node.fits(budget) {
            return vec![node];
        }
        if node.children.is_empty() {
            return vec![self.truncate_to_fit(node, budget)];
        }
        if budget < MIN_SPLIT_BUDGET {
            return vec![self.reduce_lossy(node, budget)];
        }

        let Node {
            label,
            children,
            tag,
        } = node;
        let label = self.fit_wrapper_label(label, tag.as_deref(), PART_SUFFIX_RESERVE, budget);
        let overhead = wrapper_overhead(&label, tag.as_deref(), PART_SUFFIX_RESERVE);

        let children = self.fit_children(children, budget.saturating_sub(overhead));
        let parts = self.pack(children, budget, overhead, Oversized::Reduce);

        label_batches(parts, &label, tag.as_deref(), |i, n| format!(" (part {i}/{n})"))
    }

    /// Packs children, in order, into batches whose wrapper costs
    /// `overhead` bytes and whose total stays within `budget`.
    fn pack(
        &mut self,
        children: Vec<Node>,
        budget: usize,
        overhead: usize,
        oversized: Oversized,
    ) -> Vec<Vec<Node>> {
        let room = budget.saturating_sub(overhead);
        let mut packer = Packer::new(budget, overhead);

        for child in children {
            if child.fits(room) {
                packer.add(child);
                continue;
            }
            match oversized {
                Oversized::Split => {
                    for piece in self.sub_split(child, room) {
                        packer.add(piece);
                    }
                }
                Oversized::Reduce => packer.add(self.reduce_lossy(child, room)),
            }
        }

        packer.finish()
    }

    /// Keeps the leading children of `node` that fit `budget` and replaces
    /// the rest with a `[k more items...]` node.
    fn reduce_lossy(&mut self, node: Node, budget: usize) -> Node {
        let Node {
            label,
            children,
            tag,
        } = node;
        let total = children.len();
        let marker_size = Node::leaf(omitted_marker(total)).serialized_size();

        let label = if size_with_children(&label, tag.as_deref(), &[marker_size]) > budget {
            self.truncate_with(&label, |candidate| {
                size_with_children(candidate, tag.as_deref(), &[marker_size]) <= budget
            })
        } else {
            label
        };

        let mut used = size_with_children(&label, tag.as_deref(), &[marker_size]);
        let mut kept = Vec::new();
        for child in children {
            let cost = child.serialized_size() + 1;
            if used + cost > budget {
                break;
            }
            used += cost;
            kept.push(child);
        }

        let omitted = total - kept.len();
        if omitted > 0 {
            kept.push(Node::leaf(omitted_marker(omitted)));
            self.reductions.push(Reduction::Omitted {
                label: label.clone(),
                omitted,
            });
        }

        Node {
            label,
            children: kept,
            tag,
        }
    }

    /// Shortens a wrapper label so the wrapper takes at most half of
    /// `budget`, leaving the rest for children.
    fn fit_wrapper_label(
        &mut self,
        label: String,
        tag: Option<&str>,
        reserve: &str,
        budget: usize,
    ) -> String {
        let limit = budget / 2;
        if wrapper_overhead(&label, tag, reserve) <= limit {
            return label;
        }
        self.truncate_with(&label, |candidate| {
            wrapper_overhead(candidate, tag, reserve) <= limit
        })
    }

    /// Shortens the label of a childless node until it fits `budget`.
    fn truncate_to_fit(&mut self, node: Node, budget: usize) -> Node {
        let tag = node.tag.as_deref();
        let label = self.truncate_with(&node.label, |candidate| {
            size_with_children(candidate, tag, &[]) <= budget
        });
        Node {
            label,
            children: node.children,
            tag: node.tag,
        }
    }

    /// Returns the longest prefix of `label`, followed by an ellipsis, that
    /// satisfies `fits`, and records the truncation. Falls back to the bare
    /// ellipsis when nothing fits.
    fn truncate_with(&mut self, label: &str, fits: impl Fn(&str) -> bool) -> String {
        let chars: Vec<char> = label.chars().collect();
        let candidate = |keep: usize| -> String {
            let mut out: String = chars[..keep].iter().collect();
            out.push_str(ELLIPSIS);
            out
        };

        // Size grows with the number of kept characters, so binary search
        // for the largest prefix that fits.
        let (mut low, mut high) = (0, chars.len());
        while low < high {
            let mid = (low + high).div_ceil(2);
            if fits(&candidate(mid)) {
                low = mid;
            } else {
                high = mid - 1;
            }
        }

        let truncated = candidate(low);
        self.reductions.push(Reduction::Truncated {
            label: truncated.clone(),
            removed_chars: chars.len() - low,
        });
        truncated
    }
}

/// Accumulates children into batches under a byte budget.
struct Packer {
    budget: usize,
    overhead: usize,
    batches: Vec<Vec<Node>>,
    current: Vec<Node>,
    used: usize,
}

impl Packer {
    const fn new(budget: usize, overhead: usize) -> Self {
        Self {
            budget,
            overhead,
            batches: Vec::new(),
            current: Vec::new(),
            used: overhead,
        }
    }

    fn add(&mut self, node: Node) {
        let size = node.serialized_size();
        // Every child after the first also costs a separating comma.
        if !self.current.is_empty() && self.used + size + 1 > self.budget {
            self.batches.push(std::mem::take(&mut self.current));
            self.used = self.overhead;
        }
        self.used += if self.current.is_empty() { size } else { size + 1 };
        self.current.push(node);
    }

    fn finish(mut self) -> Vec<Vec<Node>> {
        if !self.current.is_empty() {
            self.batches.push(self.current);
        }
        self.batches
    }
}

/// Bytes taken by a node with this label, the longest expected suffix, and
/// tag, plus its (empty) `children` key.
fn wrapper_overhead(label: &str, tag: Option<&str>, reserve: &str) -> usize {
    size_with_children(&format!("{label}{reserve}"), tag, &[]) + CHILDREN_KEY_BYTES
}

fn omitted_marker(count: usize) -> String {
    format!("[{count} more items...]")
}

/// Wraps each batch in a node. A single batch keeps the plain label.
fn label_batches(
    batches: Vec<Vec<Node>>,
    label: &str,
    tag: Option<&str>,
    suffix: impl Fn(usize, usize) -> String,
) -> Vec<Node> {
    let total = batches.len();
    if total <= 1 {
        return vec![Node {
            label: label.to_owned(),
            children: batches.into_iter().next().unwrap_or_default(),
            tag: tag.map(str::to_owned),
        }];
    }

    batches
        .into_iter()
        .enumerate()
        .map(|(i, children)| Node {
            label: format!("{label}{}", suffix(i + 1, total)),
            children,
            tag: tag.map(str::to_owned),
        })
        .collect()
}
