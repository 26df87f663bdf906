// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Convert ChatGPT conversation exports to Tana node trees.
//!
//! This crate turns the `conversations.json` file from a ChatGPT data
//! export into events for Tana's input API. Every event carries one node
//! tree that serializes to no more than a fixed byte budget.
//!
//! # Overview
//!
//! 1. Parse the export and keep each conversation's primary path
//! 2. Build one tree per conversation: prompts as children of a tagged
//!    root, responses structured from their markdown below each prompt
//! 3. Split trees that exceed the budget into several labeled batches
//! 4. Pair each resulting tree with its destination node
//!
//! # Example
//!
//! ```
//! use chat2tana::converter::{create_events, ConvertOptions};
//! use chat2tana::parser::parse_export;
//!
//! let json = r#"[{
//!     "title": "Greeting",
//!     "create_time": 1704153000.0,
//!     "mapping": {
//!         "root": { "message": null, "parent": null, "children": ["q"] },
//!         "q": {
//!             "message": { "author": { "role": "user" }, "content": { "parts": ["Hi"] } },
//!             "parent": "root",
//!             "children": ["a"]
//!         },
//!         "a": {
//!             "message": { "author": { "role": "assistant" }, "content": { "parts": ["Hello there"] } },
//!             "parent": "q",
//!             "children": []
//!         }
//!     }
//! }]"#;
//!
//! let conversations = parse_export(json).unwrap();
//! let conversion = create_events(&conversations, &ConvertOptions::new("inbox"));
//!
//! assert_eq!(conversion.events.len(), 1);
//! assert_eq!(conversion.events[0].node["children"][0]["label"], "Hi");
//! ```
//!
//! # Modules
//!
//! - [`parser`]: JSON parsing and primary-path linearization of exports
//! - [`text`]: sanitizing and length-bounded splitting of turn text
//! - [`structure`]: outline reconstruction from markdown-like responses
//! - [`node`]: the outline node type and its wire format
//! - [`converter`]: conversation trees and events
//! - [`payload`]: splitting trees to fit the payload budget
//! - [`config`]: settings from the environment

#![deny(missing_docs)]

pub mod config;
pub mod converter;
pub mod node;
pub mod parser;
pub mod payload;
pub mod structure;
pub mod text;
