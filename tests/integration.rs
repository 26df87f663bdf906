// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Integration tests for chat2tana parsing, conversion and the CLI.

use chat2tana::converter::{self, ConvertOptions, Zone};
use chat2tana::node::Node;
use chat2tana::parser;
use std::fs;
use std::path::Path;
use std::process::Command;

/// A realistic export entry: hidden system message, prompt, tool
/// boilerplate, and a structured answer.
const SAMPLE_EXPORT: &str = r###"[{
    "title": "Test Conversation",
    "create_time": 1704153000.0,
    "update_time": 1704153600.0,
    "mapping": {
        "client-created-root": {
            "id": "client-created-root",
            "message": null,
            "parent": null,
            "children": ["m1"]
        },
        "m1": {
            "id": "m1",
            "message": {
                "author": { "role": "system", "name": null, "metadata": {} },
                "create_time": null,
                "content": { "content_type": "text", "parts": [""] },
                "metadata": { "is_visually_hidden_from_conversation": true }
            },
            "parent": "client-created-root",
            "children": ["m2"]
        },
        "m2": {
            "id": "m2",
            "message": {
                "author": { "role": "user", "name": null, "metadata": {} },
                "create_time": 1704153000.0,
                "content": { "content_type": "text", "parts": ["How do I learn Rust?"] }
            },
            "parent": "m1",
            "children": ["m3"]
        },
        "m3": {
            "id": "m3",
            "message": {
                "author": { "role": "tool", "name": "myfiles_browser", "metadata": {} },
                "create_time": 1704153010.0,
                "content": { "content_type": "text", "parts": ["All the files uploaded by the user have been fully loaded."] }
            },
            "parent": "m2",
            "children": ["m4"]
        },
        "m4": {
            "id": "m4",
            "message": {
                "author": { "role": "assistant", "name": null, "metadata": {} },
                "create_time": 1704153030.0,
                "content": { "content_type": "text", "parts": ["## Getting started\n\nRead the book citeturn0search1.\n\n- Install rustup\n  - Use the stable toolchain\n- Write small programs"] }
            },
            "parent": "m3",
            "children": []
        }
    }
}]"###;

fn utc_options() -> ConvertOptions {
    ConvertOptions {
        zone: Zone::Named(chrono_tz::UTC),
        ..ConvertOptions::new("inbox_node_456")
    }
}

/// Builds an export with `prompts` prompt/answer pairs of `answer_len` characters.
fn large_export(prompts: usize, answer_len: usize) -> String {
    let mut nodes = vec![r#""root": {"message": null, "parent": null, "children": ["n0"]}"#.to_owned()];
    for i in 0..prompts * 2 {
        let (role, text) = if i % 2 == 0 {
            ("user", format!("Question number {i}"))
        } else {
            ("assistant", format!("Answer {i}: {}", "lorem ipsum ".repeat(answer_len / 12)))
        };
        let parent = if i == 0 { "root".to_owned() } else { format!("n{}", i - 1) };
        let children = if i + 1 < prompts * 2 {
            format!(r#""n{}""#, i + 1)
        } else {
            String::new()
        };
        nodes.push(format!(
            r#""n{i}": {{"message": {{"author": {{"role": "{role}"}}, "content": {{"parts": ["{text}"]}}}}, "parent": "{parent}", "children": [{children}]}}"#
        ));
    }
    format!(
        r#"{{"title": "Long", "create_time": 1704153000.0, "mapping": {{{}}}}}"#,
        nodes.join(",")
    )
}

#[test]
fn converts_sample_export_into_one_event() {
    let conversations = parser::parse_export(SAMPLE_EXPORT).unwrap();
    let conversion = converter::create_events(&conversations, &utc_options());

    assert_eq!(conversion.events.len(), 1);
    let event = &conversion.events[0];
    assert_eq!(event.destination, "inbox_node_456");

    let root: Node = serde_json::from_value(event.node.clone()).unwrap();
    assert_eq!(root.label, "ChatGPT conversation - 2024-01-01 23:50");
    assert_eq!(root.tag.as_deref(), Some("ai-chat"));
    assert_eq!(root.children.len(), 1);

    let prompt = &root.children[0];
    assert_eq!(prompt.label, "How do I learn Rust?");
    assert_eq!(prompt.children.len(), 1, "tool boilerplate should be skipped");

    let section = &prompt.children[0];
    assert_eq!(section.label, "Getting started");
    let labels: Vec<&str> = section.children.iter().map(|n| n.label.as_str()).collect();
    assert_eq!(
        labels,
        ["Read the book [file].", "Install rustup", "Write small programs"]
    );
    assert_eq!(section.children[1].children[0].label, "Use the stable toolchain");
}

#[test]
fn large_conversation_is_split_within_budget() {
    let json = large_export(30, 600);
    let conversations = parser::parse_export(&json).unwrap();
    let conversion = converter::create_events(&conversations, &utc_options());

    let total = conversion.events.len();
    assert!(total > 1, "expected several batches, got {total}");
    assert!(conversion.reductions.is_empty());

    for (i, event) in conversion.events.iter().enumerate() {
        let size = serde_json::to_vec(&event.node).unwrap().len();
        assert!(size <= 4800, "event {i} is {size} bytes");

        let label = event.node["label"].as_str().unwrap();
        let expected_suffix = if i == 0 {
            format!(" (1/{total})")
        } else {
            format!(" (continued {}/{total})", i + 1)
        };
        assert!(label.ends_with(&expected_suffix), "unexpected label {label}");
    }

    let prompts: Vec<String> = conversion
        .events
        .iter()
        .flat_map(|e| {
            e.node["children"]
                .as_array()
                .unwrap()
                .iter()
                .map(|c| c["label"].as_str().unwrap().to_owned())
                .collect::<Vec<_>>()
        })
        .collect();
    let expected: Vec<String> = (0..30).map(|i| format!("Question number {}", i * 2)).collect();
    assert_eq!(prompts, expected);
}

#[test]
fn custom_budget_is_respected() {
    let json = large_export(10, 300);
    let conversations = parser::parse_export(&json).unwrap();
    let options = ConvertOptions {
        budget: 1200,
        ..utc_options()
    };
    let conversion = converter::create_events(&conversations, &options);

    assert!(conversion.events.len() > 1);
    for event in &conversion.events {
        assert!(serde_json::to_vec(&event.node).unwrap().len() <= 1200);
    }
}

fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_chat2tana"))
        .args(args)
        .env_remove("TANA_INBOX_NODE_ID")
        .env_remove("TANA_TIMEZONE")
        .env_remove("TANA_PAYLOAD_BUDGET")
        .output()
        .expect("failed to run chat2tana")
}

fn write_sample(dir: &Path) -> std::path::PathBuf {
    let input = dir.join("conversations.json");
    fs::write(&input, SAMPLE_EXPORT).unwrap();
    input
}

#[test]
fn cli_writes_json_lines_to_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let input = write_sample(tmp.path());
    let out_dir = tmp.path().join("out");

    let output = run_cli(&[
        "--destination",
        "inbox_1",
        "--timezone",
        "UTC",
        "-o",
        out_dir.to_str().unwrap(),
        input.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{output:?}");

    let written = fs::read_to_string(out_dir.join("conversations.jsonl")).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines.len(), 1);

    let event: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(event["destination"], "inbox_1");
    assert_eq!(
        event["node"]["label"],
        "ChatGPT conversation - 2024-01-01 23:50"
    );
}

#[test]
fn cli_writes_to_stdout() {
    let tmp = tempfile::tempdir().unwrap();
    let input = write_sample(tmp.path());

    let output = run_cli(&[
        "--destination",
        "inbox_2",
        "-o",
        "-",
        input.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{output:?}");

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.lines().count(), 1);
    assert!(stdout.contains(r#""destination":"inbox_2""#));
}

#[test]
fn cli_dry_run_writes_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let input = write_sample(tmp.path());
    let out_dir = tmp.path().join("out");

    let output = run_cli(&[
        "--destination",
        "inbox",
        "--dry-run",
        "-o",
        out_dir.to_str().unwrap(),
        input.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{output:?}");
    assert!(!out_dir.exists());

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Would write"));
    assert!(stderr.contains("1 events"));
}

#[test]
fn cli_requires_destination() {
    let tmp = tempfile::tempdir().unwrap();
    let input = write_sample(tmp.path());

    let output = run_cli(&["-o", "-", input.to_str().unwrap()]);

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("TANA_INBOX_NODE_ID"));
}

#[test]
fn cli_skips_existing_output_without_force() {
    let tmp = tempfile::tempdir().unwrap();
    let input = write_sample(tmp.path());
    let out_dir = tmp.path().join("out");
    fs::create_dir_all(&out_dir).unwrap();
    let existing = out_dir.join("conversations.jsonl");
    fs::write(&existing, "keep me").unwrap();

    let args = [
        "--destination",
        "inbox",
        "-o",
        out_dir.to_str().unwrap(),
        input.to_str().unwrap(),
    ];
    let output = run_cli(&args);
    assert!(output.status.success(), "{output:?}");
    assert_eq!(fs::read_to_string(&existing).unwrap(), "keep me");

    let mut forced = args.to_vec();
    forced.push("--force");
    let output = run_cli(&forced);
    assert!(output.status.success(), "{output:?}");
    assert_ne!(fs::read_to_string(&existing).unwrap(), "keep me");
}

#[test]
fn cli_walks_directories_for_json_files() {
    let tmp = tempfile::tempdir().unwrap();
    let exports = tmp.path().join("exports");
    fs::create_dir_all(exports.join("nested")).unwrap();
    fs::write(exports.join("a.json"), SAMPLE_EXPORT).unwrap();
    fs::write(exports.join("nested").join("b.json"), SAMPLE_EXPORT).unwrap();
    fs::write(exports.join("notes.txt"), "ignored").unwrap();
    let out_dir = tmp.path().join("out");

    let output = run_cli(&[
        "--destination",
        "inbox",
        "-q",
        "-o",
        out_dir.to_str().unwrap(),
        exports.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{output:?}");
    assert!(out_dir.join("a.jsonl").exists());
    assert!(out_dir.join("b.jsonl").exists());
    assert!(!out_dir.join("notes.jsonl").exists());
}

#[test]
fn cli_reports_parse_errors_with_path() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("broken.json");
    fs::write(&input, "{ not json").unwrap();

    let output = run_cli(&["--destination", "inbox", "-o", "-", input.to_str().unwrap()]);

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("broken.json"));
}
