// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Outline nodes and their wire representation.
//!
//! A [`Node`] serializes to `{"label": ..., "children": [...], "tag": ...}`
//! where `children` and `tag` are omitted when empty. Payload sizes are
//! always measured by serializing, never estimated.

use serde::{Deserialize, Serialize};
use std::io;

/// One item in the destination outline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// The text shown for this item.
    pub label: String,

    /// Nested items, in display order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,

    /// Category tag; set only on conversation roots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// Bytes added to a serialized node when its `children` key is present,
/// not counting the children themselves: `,"children":[]`.
pub(crate) const CHILDREN_KEY_BYTES: usize = r#","children":[]"#.len();

impl Node {
    /// Creates a node without children or tag.
    pub fn leaf(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// Creates a node with the given children.
    pub fn with_children(label: impl Into<String>, children: Vec<Self>) -> Self {
        Self {
            label: label.into(),
            children,
            tag: None,
        }
    }

    /// Returns the number of bytes this node occupies once serialized to
    /// compact JSON.
    #[must_use]
    pub fn serialized_size(&self) -> usize {
        let mut counter = ByteCounter(0);
        match serde_json::to_writer(&mut counter, self) {
            Ok(()) => counter.0,
            // Only reachable if serialization itself fails, which plain
            // strings and vectors cannot do. Treat as never fitting.
            Err(_) => usize::MAX,
        }
    }

    /// Returns `true` if the serialized node is at most `budget` bytes.
    #[must_use]
    pub fn fits(&self, budget: usize) -> bool {
        self.serialized_size() <= budget
    }

    /// Counts this node and all of its descendants.
    #[must_use]
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Self::count).sum::<usize>()
    }

    /// Converts the node into a JSON value for embedding in an event.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Serialized size of a node with this label and tag whose children are
/// `sizes`, computed without building the node.
pub(crate) fn size_with_children(label: &str, tag: Option<&str>, sizes: &[usize]) -> usize {
    let bare = Node {
        label: label.to_owned(),
        children: Vec::new(),
        tag: tag.map(str::to_owned),
    }
    .serialized_size();

    if sizes.is_empty() {
        return bare;
    }
    bare + CHILDREN_KEY_BYTES + sizes.iter().sum::<usize>() + (sizes.len() - 1)
}

/// A writer that only counts the bytes it is given.
struct ByteCounter(usize);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
