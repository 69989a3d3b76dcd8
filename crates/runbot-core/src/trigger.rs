//! Trigger extraction from pull-request comment text.
//!
//! A trigger is a line of the form:
//!
//! ```text
//! /run build-and-publish
//! /run test-cluster-create PRIVATE_NETWORK=true
//! /run test-cluster-upgrade PRIVATE_NETWORK=false PREVIOUS_VERSION=1.2.6
//! /run hold wait-for-tests
//! /run help NAMESPACE=foo-bar test-cluster-create
//! ```
//!
//! The grammar is kept byte-for-byte compatible with comments already in use,
//! so a run of `KEY=value` tokens and a run of bare tokens are matched as
//! separate alternatives rather than as one free-form token list.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

/// Named argument that pins pipeline lookup to a single namespace.
pub const NAMESPACE_ARG: &str = "NAMESPACE";

// Whitespace is the ASCII set `[\t\n\f\r ]`, not Unicode `\s`, so a
// non-breaking space is part of a token and never indentation.
const TRIGGER_PATTERN: &str = r"(?mi)^[\t\n\f\r ]*/run (?P<pipeline>[^\t\n\f\r ]+)(?: (?P<args>(?:[A-Z_]+=[^\t\n\f\r ]+ ?)*)| (?P<pos>(?:[A-Za-z0-9\-_]+ ?)*))*(?:\r|\n|$)";

fn trigger_regex() -> &'static Regex {
    static TRIGGER: OnceLock<Regex> = OnceLock::new();
    TRIGGER.get_or_init(|| Regex::new(TRIGGER_PATTERN).expect("trigger pattern is valid"))
}

/// One raw regex match, before argument classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTriggerMatch {
    /// The exact matched text, including any line terminator.
    pub full_text: String,
    pub pipeline_name: String,
    /// Last captured `KEY=value` run, empty when the alternative never matched.
    pub named_segment: String,
    /// Last captured bare-token run, empty when the alternative never matched.
    pub positional_segment: String,
}

impl RawTriggerMatch {
    fn from_captures(caps: &Captures<'_>) -> Self {
        let group = |name: &str| {
            caps.name(name)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()
        };
        Self {
            full_text: caps
                .get(0)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
            pipeline_name: group("pipeline"),
            named_segment: group("args"),
            positional_segment: group("pos"),
        }
    }
}

/// A parsed `/run` invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    pub full_text: String,
    pub pipeline_name: String,
    pub named_args: BTreeMap<String, String>,
    pub positional_args: Vec<String>,
}

impl Trigger {
    /// Namespace the user pinned with `NAMESPACE=...`, or `""`.
    pub fn namespace_hint(&self) -> &str {
        self.named_args
            .get(NAMESPACE_ARG)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Matched text without the trailing line break, for echoing back.
    pub fn display_text(&self) -> &str {
        self.full_text.trim()
    }
}

/// Find every trigger line in `text`.
pub fn find_trigger_matches(text: &str) -> Vec<RawTriggerMatch> {
    trigger_regex()
        .captures_iter(text)
        .map(|caps| RawTriggerMatch::from_captures(&caps))
        .collect()
}

/// Split the argument segments of a match into named and positional arguments.
///
/// Tokens containing `=` are split on the first `=`; a repeated key keeps the
/// last value. Everything else is positional, in order.
pub fn classify_arguments(raw: RawTriggerMatch) -> Trigger {
    let mut named_args = BTreeMap::new();
    let mut positional_args = Vec::new();

    let joined = format!("{} {}", raw.named_segment, raw.positional_segment);
    for token in joined.trim().split(' ').filter(|t| !t.is_empty()) {
        match token.split_once('=') {
            Some((key, value)) => {
                named_args.insert(key.to_string(), value.to_string());
            }
            None => positional_args.push(token.to_string()),
        }
    }

    Trigger {
        full_text: raw.full_text,
        pipeline_name: raw.pipeline_name,
        named_args,
        positional_args,
    }
}

/// Parse every trigger in a comment body.
pub fn parse_triggers(text: &str) -> Vec<Trigger> {
    find_trigger_matches(text)
        .into_iter()
        .map(classify_arguments)
        .inspect(|trigger| {
            crate::obs::emit_trigger_parsed(
                &trigger.pipeline_name,
                trigger.named_args.len(),
                trigger.positional_args.len(),
            )
        })
        .collect()
}
