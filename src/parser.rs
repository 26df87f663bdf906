// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! JSON parsing for ChatGPT conversation exports.
//!
//! This module handles deserialization of the `conversations.json` format
//! produced by ChatGPT's data export. Each conversation stores its messages
//! as a tree in a `mapping` object, keyed by node id, because edited prompts
//! and regenerated answers create branches.
//!
//! # Format Overview
//!
//! A ChatGPT export contains:
//! - Either one conversation object or an array of them
//! - Per conversation: a title, a creation time in seconds, and the mapping
//! - Per mapping node: an optional message, a parent id and child ids
//!
//! Only the primary path is kept: starting from the root, the first listed
//! child is followed at every branch point.
//!
//! # Example
//!
//! ```
//! use chat2tana::parser::{parse_export, Role};
//!
//! let json = r#"{
//!     "title": "Greeting",
//!     "create_time": 1704153000.0,
//!     "mapping": {
//!         "root": { "message": null, "parent": null, "children": ["a"] },
//!         "a": {
//!             "message": {
//!                 "author": { "role": "user" },
//!                 "content": { "parts": ["Hello"] }
//!             },
//!             "parent": "root",
//!             "children": []
//!         }
//!     }
//! }"#;
//!
//! let conversations = parse_export(json).unwrap();
//! assert_eq!(conversations[0].turns.len(), 1);
//! assert_eq!(conversations[0].turns[0].role, Role::User);
//! ```

use serde::Deserialize;
use snafu::prelude::*;
use std::collections::HashSet;

/// Error type for export parsing failures.
#[derive(Debug, Snafu)]
pub enum ParseError {
    /// Failed to parse JSON content.
    #[snafu(display("failed to parse JSON: {source}"))]
    Json {
        /// The underlying JSON parsing error.
        source: serde_json::Error,
    },

    /// The top-level value was neither a conversation nor a list of them.
    #[snafu(display("invalid ChatGPT export: expected an object or an array, found {found}"))]
    UnexpectedShape {
        /// The JSON type that was found instead.
        found: &'static str,
    },
}

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The person using ChatGPT.
    User,
    /// The model.
    Assistant,
    /// Output of a tool such as browsing or the file reader.
    Tool,
    /// Hidden system instructions.
    System,
    /// Any role this crate does not recognize.
    Unknown,
}

impl Role {
    /// Maps an export `author.role` string onto a [`Role`].
    #[must_use]
    pub fn from_export(role: &str) -> Self {
        match role {
            "user" => Self::User,
            "assistant" => Self::Assistant,
            "tool" => Self::Tool,
            "system" => Self::System,
            _ => Self::Unknown,
        }
    }
}

/// One message on a conversation's primary path.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    /// Who wrote the message.
    pub role: Role,

    /// The message text, with multi-part content joined by newlines.
    pub text: Option<String>,

    /// Unix timestamp in seconds, when the export records one.
    pub timestamp: Option<f64>,
}

impl Turn {
    /// Creates a turn without a timestamp.
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: Some(text.into()),
            timestamp: None,
        }
    }
}

/// A single exported conversation, linearized along its primary path.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    /// The conversation title shown in the ChatGPT sidebar.
    pub title: String,

    /// Unix timestamp in seconds when the conversation was created.
    pub created_at: f64,

    /// The messages on the primary path, oldest first.
    pub turns: Vec<Turn>,
}

impl<'de> Deserialize<'de> for Conversation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;

        let title = get_string(&value, &["title"]).unwrap_or_else(|| "Untitled".to_owned());
        let created_at = value
            .get("create_time")
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(0.0);

        let turns = value
            .get("mapping")
            .and_then(serde_json::Value::as_object)
            .map(linearize)
            .unwrap_or_default();

        Ok(Self {
            title,
            created_at,
            turns,
        })
    }
}

type Mapping = serde_json::Map<String, serde_json::Value>;

/// Finds the node the primary path starts from.
///
/// Prefers the node without a parent; older exports name it `root` and
/// newer ones `client-created-root`.
fn find_root(mapping: &Mapping) -> Option<&str> {
    mapping
        .iter()
        .find(|(_, node)| node.get("parent").is_none_or(serde_json::Value::is_null))
        .map(|(id, _)| id.as_str())
        .or_else(|| {
            ["root", "client-created-root"]
                .into_iter()
                .find(|id| mapping.contains_key(*id))
        })
}

/// Walks the primary path through the mapping, collecting turns.
fn linearize(mapping: &Mapping) -> Vec<Turn> {
    let mut turns = Vec::new();
    let mut visited = HashSet::new();
    let mut current = find_root(mapping);

    while let Some(id) = current {
        if !visited.insert(id) {
            break;
        }
        let Some(node) = mapping.get(id) else {
            break;
        };

        if let Some(turn) = node.get("message").and_then(parse_message) {
            turns.push(turn);
        }

        current = node
            .get("children")
            .and_then(serde_json::Value::as_array)
            .and_then(|children| children.first())
            .and_then(serde_json::Value::as_str);
    }

    turns
}

/// Parses one message. Returns `None` for messages without text.
fn parse_message(message: &serde_json::Value) -> Option<Turn> {
    let role = Role::from_export(get_str(message, &["author", "role"]).unwrap_or("unknown"));

    let parts = message
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(serde_json::Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(serde_json::Value::as_str)
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .filter(|text| !text.is_empty());

    let text = parts
        .or_else(|| get_string(message, &["content", "text"]))
        .filter(|text| !text.is_empty())?;

    Some(Turn {
        role,
        text: Some(text),
        timestamp: message.get("create_time").and_then(serde_json::Value::as_f64),
    })
}

/// Navigates a JSON path and returns the string value at the end.
fn get_str<'a>(value: &'a serde_json::Value, path: &[&str]) -> Option<&'a str> {
    let mut current = value;
    for key in path {
        current = current.get(*key)?;
    }
    current.as_str()
}

/// Like [`get_str`] but returns an owned `String`.
fn get_string(value: &serde_json::Value, path: &[&str]) -> Option<String> {
    get_str(value, path).map(str::to_owned)
}

const fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Parses a ChatGPT export into its conversations.
///
/// Accepts either a single conversation object or an array of them, as
/// found in `conversations.json`.
///
/// # Errors
///
/// Returns an error if the JSON is malformed or its top level is neither an
/// object nor an array.
pub fn parse_export(json_str: &str) -> Result<Vec<Conversation>, ParseError> {
    let value: serde_json::Value = serde_json::from_str(json_str).context(JsonSnafu)?;

    match value {
        serde_json::Value::Array(_) => serde_json::from_value(value).context(JsonSnafu),
        serde_json::Value::Object(_) => {
            let conversation = serde_json::from_value(value).context(JsonSnafu)?;
            Ok(vec![conversation])
        }
        other => UnexpectedShapeSnafu {
            found: json_type_name(&other),
        }
        .fail(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_json(role: &str, parts: &str) -> String {
        format!(
            r#"{{
                "author": {{ "role": "{role}", "name": null, "metadata": {{}} }},
                "create_time": 1704153030.0,
                "content": {{ "content_type": "text", "parts": [{parts}] }}
            }}"#
        )
    }

    /// Builds a linear mapping `root -> m0 -> m1 -> ...` from messages.
    fn conversation_json(messages: &[String]) -> String {
        let mut nodes = vec![format!(
            r#""root": {{ "message": null, "parent": null, "children": [{}] }}"#,
            if messages.is_empty() { String::new() } else { r#""m0""#.to_owned() }
        )];
        for (i, message) in messages.iter().enumerate() {
            let parent = if i == 0 { "root".to_owned() } else { format!("m{}", i - 1) };
            let children = if i + 1 < messages.len() {
                format!(r#""m{}""#, i + 1)
            } else {
                String::new()
            };
            nodes.push(format!(
                r#""m{i}": {{ "message": {message}, "parent": "{parent}", "children": [{children}] }}"#
            ));
        }
        format!(
            r#"{{
                "title": "Test Conversation",
                "create_time": 1704153000.0,
                "mapping": {{ {} }}
            }}"#,
            nodes.join(",")
        )
    }

    #[test]
    fn parses_single_conversation_object() {
        let json = conversation_json(&[
            message_json("user", r#""Hello, world!""#),
            message_json("assistant", r#""Hi! How can I help you?""#),
        ]);
        let conversations = parse_export(&json).unwrap();

        assert_eq!(conversations.len(), 1);
        let conversation = &conversations[0];
        assert_eq!(conversation.title, "Test Conversation");
        assert!((conversation.created_at - 1_704_153_000.0).abs() < f64::EPSILON);
        assert_eq!(conversation.turns.len(), 2);
        assert_eq!(conversation.turns[0].role, Role::User);
        assert_eq!(conversation.turns[0].text.as_deref(), Some("Hello, world!"));
        assert_eq!(conversation.turns[1].role, Role::Assistant);
        assert_eq!(conversation.turns[1].timestamp, Some(1_704_153_030.0));
    }

    #[test]
    fn parses_array_of_conversations() {
        let one = conversation_json(&[message_json("user", r#""a""#)]);
        let two = conversation_json(&[message_json("user", r#""b""#)]);
        let conversations = parse_export(&format!("[{one},{two}]")).unwrap();

        assert_eq!(conversations.len(), 2);
        assert_eq!(conversations[1].turns[0].text.as_deref(), Some("b"));
    }

    #[test]
    fn skips_empty_messages() {
        let json = conversation_json(&[
            message_json("system", r#""""#),
            message_json("user", r#""Question""#),
        ]);
        let conversations = parse_export(&json).unwrap();

        assert_eq!(conversations[0].turns.len(), 1);
        assert_eq!(conversations[0].turns[0].role, Role::User);
    }

    #[test]
    fn joins_text_parts_and_ignores_non_text_parts() {
        let json = conversation_json(&[message_json(
            "user",
            r#""first", { "content_type": "image_asset_pointer" }, "second""#,
        )]);
        let conversations = parse_export(&json).unwrap();

        assert_eq!(
            conversations[0].turns[0].text.as_deref(),
            Some("first\nsecond")
        );
    }

    #[test]
    fn falls_back_to_content_text() {
        let json = conversation_json(&[r#"{
            "author": { "role": "tool" },
            "content": { "content_type": "code", "text": "print(1)" }
        }"#
        .to_owned()]);
        let conversations = parse_export(&json).unwrap();

        assert_eq!(conversations[0].turns[0].role, Role::Tool);
        assert_eq!(conversations[0].turns[0].text.as_deref(), Some("print(1)"));
    }

    #[test]
    fn follows_first_child_at_branches() {
        let json = r#"{
            "title": "Branches",
            "create_time": 1.0,
            "mapping": {
                "client-created-root": { "message": null, "parent": null, "children": ["a"] },
                "a": {
                    "message": { "author": { "role": "user" }, "content": { "parts": ["q"] } },
                    "parent": "client-created-root",
                    "children": ["b1", "b2"]
                },
                "b1": {
                    "message": { "author": { "role": "assistant" }, "content": { "parts": ["kept"] } },
                    "parent": "a",
                    "children": []
                },
                "b2": {
                    "message": { "author": { "role": "assistant" }, "content": { "parts": ["dropped"] } },
                    "parent": "a",
                    "children": []
                }
            }
        }"#;
        let conversations = parse_export(json).unwrap();
        let texts: Vec<_> = conversations[0]
            .turns
            .iter()
            .filter_map(|t| t.text.as_deref())
            .collect();

        assert_eq!(texts, ["q", "kept"]);
    }

    #[test]
    fn stops_on_cycles() {
        let json = r#"{
            "mapping": {
                "root": { "message": null, "children": ["a"] },
                "a": {
                    "message": { "author": { "role": "user" }, "content": { "parts": ["loop"] } },
                    "parent": "root",
                    "children": ["a"]
                }
            }
        }"#;
        let conversations = parse_export(json).unwrap();

        assert_eq!(conversations[0].title, "Untitled");
        assert_eq!(conversations[0].turns.len(), 1);
    }

    #[test]
    fn maps_unknown_roles() {
        assert_eq!(Role::from_export("critic"), Role::Unknown);
        assert_eq!(Role::from_export("tool"), Role::Tool);
    }

    #[test]
    fn missing_mapping_yields_no_turns() {
        let conversations = parse_export(r#"{"title": "Empty"}"#).unwrap();
        assert!(conversations[0].turns.is_empty());
    }

    #[test]
    fn returns_error_for_invalid_json() {
        assert!(matches!(
            parse_export("not valid json"),
            Err(ParseError::Json { .. })
        ));
    }

    #[test]
    fn returns_error_for_scalar_top_level() {
        assert!(matches!(
            parse_export("42"),
            Err(ParseError::UnexpectedShape { found: "a number" })
        ));
    }
}
