// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Conversion of parsed conversations into Tana nodes and events.
//!
//! Each conversation becomes one root node tagged [`CONVERSATION_TAG`] with
//! one child per user prompt. Assistant and tool responses hang below the
//! prompt they answer, structured by [`parse_structure`]. Roots that exceed
//! the payload budget are split by [`split_payload`] before being wrapped
//! into [`Event`]s.
//!
//! # Example
//!
//! ```
//! use chat2tana::converter::{conversation_to_node, Zone};
//! use chat2tana::parser::{Conversation, Role, Turn};
//!
//! let conversation = Conversation {
//!     title: "Greeting".into(),
//!     created_at: 1_704_153_000.0,
//!     turns: vec![
//!         Turn::new(Role::User, "Hi"),
//!         Turn::new(Role::Assistant, "Hello there"),
//!     ],
//! };
//!
//! let root = conversation_to_node(&conversation, &Zone::Named(chrono_tz::UTC));
//! assert_eq!(root.label, "ChatGPT conversation - 2024-01-01 23:50");
//! assert_eq!(root.children[0].label, "Hi");
//! assert_eq!(root.children[0].children[0].label, "Hello there");
//! ```

use crate::node::Node;
use crate::parser::{Conversation, Role, Turn};
use crate::payload::{MAX_PAYLOAD_BYTES, Reduction, split_payload};
use crate::structure::parse_structure;
use crate::text::{MAX_LABEL_CHARS, sanitize, truncate_label};
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tracing::{debug, debug_span, warn};

/// Label prefix of every conversation root.
pub const TITLE_PREFIX: &str = "ChatGPT conversation";

/// Tag applied to every conversation root.
pub const CONVERSATION_TAG: &str = "ai-chat";

/// Responses at most this many characters long, on a single line, are kept
/// as one flat node instead of being parsed for structure.
pub const SHORT_RESPONSE_CHARS: usize = 200;

/// Openings of instructions that ChatGPT injects as tool turns. They carry
/// nothing the user wrote or read.
const TOOL_BOILERPLATE: &[&str] = &[
    "All the files uploaded by the user have been fully loaded",
    "The output of this plugin was redacted",
    "Model set context updated",
    "Remember you have access to rendered images",
    "Please remember to search the user's documents",
    "Make sure to include",
];

/// How far into a tool turn boilerplate phrases are looked for.
const BOILERPLATE_WINDOW_CHARS: usize = 200;

/// Time zone used to render conversation timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Zone {
    /// The system's local time zone.
    #[default]
    Local,
    /// A named IANA time zone.
    Named(chrono_tz::Tz),
}

impl Zone {
    /// Formats a Unix timestamp in seconds as `YYYY-MM-DD HH:MM`.
    ///
    /// Timestamps outside chrono's range render as the Unix epoch.
    #[must_use]
    pub fn format(&self, seconds: f64) -> String {
        let utc = timestamp_to_utc(seconds);
        match self {
            Self::Local => utc.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
            Self::Named(tz) => utc.with_timezone(tz).format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn timestamp_to_utc(seconds: f64) -> DateTime<Utc> {
    let millis = (seconds * 1000.0).round() as i64;
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

/// Settings for turning conversations into events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Identifier of the Tana node that receives the conversations.
    pub destination: String,

    /// Maximum serialized size of one event's node, in bytes.
    pub budget: usize,

    /// Time zone for conversation titles.
    pub zone: Zone,
}

impl ConvertOptions {
    /// Creates options with the default budget and the local time zone.
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            budget: MAX_PAYLOAD_BYTES,
            zone: Zone::Local,
        }
    }
}

/// One unit of work for the Tana transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    /// Identifier of the node the payload is added under.
    pub destination: String,

    /// The node tree to add.
    pub node: serde_json::Value,
}

/// The events produced for a set of conversations, plus any content that
/// had to be cut to respect the payload budget.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversion {
    /// Events in conversation order, then batch order.
    pub events: Vec<Event>,

    /// Every lossy reduction applied while splitting.
    pub reductions: Vec<Reduction>,
}

/// Returns `true` if a tool turn is one of ChatGPT's injected instructions.
fn is_tool_boilerplate(text: &str) -> bool {
    let head: String = text.trim_start().chars().take(BOILERPLATE_WINDOW_CHARS).collect();
    TOOL_BOILERPLATE.iter().any(|phrase| head.contains(phrase))
}

/// Builds the outline nodes for one response.
fn response_nodes(text: &str) -> Vec<Node> {
    let cleaned = sanitize(text);
    if cleaned.is_empty() {
        return Vec::new();
    }
    if cleaned.chars().count() <= SHORT_RESPONSE_CHARS && !cleaned.contains('\n') {
        return vec![Node::leaf(cleaned)];
    }
    parse_structure(&cleaned)
}

/// Builds the node for one prompt. Prompts stay a single node, with each
/// line break turned into one space.
fn prompt_node(text: &str) -> Option<Node> {
    let cleaned = sanitize(&text.replace("\r\n", " ").replace(['\r', '\n'], " "));
    if cleaned.is_empty() {
        return None;
    }
    Some(Node::leaf(truncate_label(&cleaned, MAX_LABEL_CHARS)))
}

/// Converts a conversation into a single root node.
///
/// The root is labeled with [`TITLE_PREFIX`] and the creation time in
/// `zone`, and tagged [`CONVERSATION_TAG`]. Turns without text, system and
/// unknown turns, and tool boilerplate are skipped. Responses that arrive
/// before any prompt have nothing to attach to and are dropped.
#[must_use]
pub fn conversation_to_node(conversation: &Conversation, zone: &Zone) -> Node {
    let mut prompts: Vec<Node> = Vec::new();

    for Turn { role, text, .. } in &conversation.turns {
        let Some(text) = text.as_deref().filter(|t| !t.trim().is_empty()) else {
            continue;
        };

        match role {
            Role::Tool if is_tool_boilerplate(text) => {
                debug!("skipping tool instruction boilerplate");
            }
            Role::User => {
                if let Some(prompt) = prompt_node(text) {
                    prompts.push(prompt);
                }
            }
            Role::Assistant | Role::Tool => match prompts.last_mut() {
                Some(prompt) => prompt.children.extend(response_nodes(text)),
                None => debug!(?role, "dropping response without a preceding prompt"),
            },
            Role::System | Role::Unknown => {}
        }
    }

    Node {
        label: format!("{TITLE_PREFIX} - {}", zone.format(conversation.created_at)),
        children: prompts,
        tag: Some(CONVERSATION_TAG.to_owned()),
    }
}

/// Converts conversations into budget-respecting events for `options.destination`.
///
/// Events follow conversation order, then batch order within a conversation.
#[must_use]
pub fn create_events(conversations: &[Conversation], options: &ConvertOptions) -> Conversion {
    let mut conversion = Conversion::default();

    for conversation in conversations {
        let _span = debug_span!("conversation", title = %conversation.title).entered();

        let root = conversation_to_node(conversation, &options.zone);
        let split = split_payload(root, options.budget);

        for reduction in &split.reductions {
            warn!(title = %conversation.title, "{reduction}");
        }
        debug!(batches = split.nodes.len(), "conversation converted");

        conversion
            .events
            .extend(split.nodes.iter().map(|node| Event {
                destination: options.destination.clone(),
                node: node.to_value(),
            }));
        conversion.reductions.extend(split.reductions);
    }

    conversion
}
