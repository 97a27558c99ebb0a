use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use tracker_core::TokenCounts;

/// Administrative line types that carry no conversation data.
const SKIPPED_LINE_TYPES: &[&str] = &["file-history-snapshot"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Main,
    Subagent,
}

/// One assistant response after streaming dedup.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedUsage {
    pub external_id: String,
    pub timestamp: String,
    pub model: Option<String>,
    pub tokens: TokenCounts,
}

/// A closed user-to-assistant turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTurn {
    pub user_message_id: Option<String>,
    pub user_timestamp: String,
    pub assistant_message_id: Option<String>,
    pub assistant_timestamp: String,
    pub duration_seconds: Option<f64>,
    pub user_content: Option<String>,
}

/// Everything one pass over a transcript yields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedTranscript {
    pub usage: Vec<ParsedUsage>,
    pub turns: Vec<ParsedTurn>,
    pub first_timestamp: Option<String>,
    pub last_timestamp: Option<String>,
    pub model: Option<String>,
    pub version: Option<String>,
    pub custom_title: Option<String>,
    pub malformed_lines: usize,
}

#[derive(Debug)]
struct PendingTurn {
    user_message_id: Option<String>,
    user_timestamp: String,
    user_content: Option<String>,
    assistant_message_id: Option<String>,
    assistant_timestamp: Option<String>,
}

impl PendingTurn {
    fn close(self) -> Option<ParsedTurn> {
        let assistant_timestamp = self.assistant_timestamp?;
        let duration_seconds = seconds_between(&self.user_timestamp, &assistant_timestamp);
        Some(ParsedTurn {
            user_message_id: self.user_message_id,
            user_timestamp: self.user_timestamp,
            assistant_message_id: self.assistant_message_id,
            assistant_timestamp,
            duration_seconds,
            user_content: self.user_content,
        })
    }
}

/// Streaming dedup: a repeated message id replaces the earlier entry in place.
#[derive(Debug, Default)]
struct UsageLedger {
    records: Vec<ParsedUsage>,
    index: HashMap<String, usize>,
}

impl UsageLedger {
    fn record(&mut self, usage: ParsedUsage) {
        match self.index.get(&usage.external_id) {
            Some(&slot) => self.records[slot] = usage,
            None => {
                self.index
                    .insert(usage.external_id.clone(), self.records.len());
                self.records.push(usage);
            }
        }
    }
}

pub fn parse_json_line(line: &str) -> Option<Value> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) if value.is_object() => Some(value),
        _ => None,
    }
}

/// Parses a whole transcript. Lines that are not JSON objects are counted in
/// `malformed_lines` and otherwise ignored. Turns are only rebuilt for
/// [`FileKind::Main`].
pub fn extract_transcript(content: &str, kind: FileKind) -> ExtractedTranscript {
    let mut out = ExtractedTranscript::default();
    let mut ledger = UsageLedger::default();
    let mut pending: Option<PendingTurn> = None;

    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let Some(obj) = parse_json_line(line) else {
            out.malformed_lines += 1;
            continue;
        };
        let line_type = str_field(&obj, "type");
        if line_type.is_some_and(|kind| SKIPPED_LINE_TYPES.contains(&kind)) {
            continue;
        }

        let timestamp = str_field(&obj, "timestamp");
        if let Some(ts) = timestamp {
            track_bounds(&mut out, ts);
        }
        if out.version.is_none() {
            out.version = str_field(&obj, "version").map(str::to_string);
        }
        if out.custom_title.is_none() {
            out.custom_title = str_field(&obj, "customTitle").map(str::to_string);
        }

        if let Some(usage) = extract_usage_from_value(&obj) {
            if out.model.is_none() {
                out.model = usage.model.clone();
            }
            ledger.record(usage);
        }

        if kind == FileKind::Main && !is_excluded_from_turns(&obj) {
            if let Some(ts) = timestamp.filter(|_| is_genuine_user_message(&obj)) {
                if let Some(turn) = pending.take().and_then(PendingTurn::close) {
                    out.turns.push(turn);
                }
                pending = Some(PendingTurn {
                    user_message_id: user_message_id(&obj),
                    user_timestamp: ts.to_string(),
                    user_content: extract_user_text(&obj),
                    assistant_message_id: None,
                    assistant_timestamp: None,
                });
            } else if let (Some(ts), Some(turn)) = (timestamp, pending.as_mut())
                && is_assistant_message(&obj)
            {
                turn.assistant_timestamp = Some(ts.to_string());
                turn.assistant_message_id = message_field(&obj, "id").map(str::to_string);
            }
        }
    }

    if let Some(turn) = pending.and_then(PendingTurn::close) {
        out.turns.push(turn);
    }
    out.usage = ledger.records;
    out
}

/// Usage for an assistant line carrying both a message id and a usage block.
pub fn extract_usage_from_value(obj: &Value) -> Option<ParsedUsage> {
    if !is_assistant_message(obj) {
        return None;
    }
    let message = obj.get("message")?;
    let external_id = message.get("id")?.as_str()?.to_string();
    let usage = message.get("usage")?;
    if !usage.is_object() {
        return None;
    }
    let timestamp = str_field(obj, "timestamp")
        .map(str::to_string)
        .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
    Some(ParsedUsage {
        external_id,
        timestamp,
        model: message_field(obj, "model").map(str::to_string),
        tokens: TokenCounts {
            input_tokens: count_field(usage, "input_tokens"),
            output_tokens: count_field(usage, "output_tokens"),
            cache_creation_input_tokens: count_field(usage, "cache_creation_input_tokens"),
            cache_read_input_tokens: count_field(usage, "cache_read_input_tokens"),
        },
    })
}

fn track_bounds(out: &mut ExtractedTranscript, ts: &str) {
    if out.first_timestamp.as_deref().is_none_or(|first| ts < first) {
        out.first_timestamp = Some(ts.to_string());
    }
    if out.last_timestamp.as_deref().is_none_or(|last| ts > last) {
        out.last_timestamp = Some(ts.to_string());
    }
}

fn is_assistant_message(obj: &Value) -> bool {
    str_field(obj, "type") == Some("assistant") && message_field(obj, "role") == Some("assistant")
}

fn is_excluded_from_turns(obj: &Value) -> bool {
    bool_field(obj, "isMeta") || bool_field(obj, "isSidechain")
}

/// A prompt typed by the user, as opposed to a tool result echoed back
/// under the user role.
fn is_genuine_user_message(obj: &Value) -> bool {
    if str_field(obj, "type") != Some("user") || message_field(obj, "role") != Some("user") {
        return false;
    }
    match obj.get("message").and_then(|message| message.get("content")) {
        Some(Value::String(_)) => true,
        Some(Value::Array(blocks)) => blocks
            .iter()
            .any(|block| block.get("type").and_then(Value::as_str) != Some("tool_result")),
        _ => false,
    }
}

fn user_message_id(obj: &Value) -> Option<String> {
    str_field(obj, "uuid")
        .or_else(|| message_field(obj, "id"))
        .map(str::to_string)
}

fn extract_user_text(obj: &Value) -> Option<String> {
    match obj.get("message")?.get("content")? {
        Value::String(text) => Some(text.clone()),
        Value::Array(blocks) => blocks
            .iter()
            .find(|block| block.get("type").and_then(Value::as_str) == Some("text"))
            .and_then(|block| block.get("text"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

fn seconds_between(start: &str, end: &str) -> Option<f64> {
    let start = DateTime::parse_from_rfc3339(start).ok()?;
    let end = DateTime::parse_from_rfc3339(end).ok()?;
    let seconds = (end - start).num_milliseconds() as f64 / 1000.0;
    (seconds >= 0.0).then_some(seconds)
}

fn str_field<'a>(obj: &'a Value, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

fn message_field<'a>(obj: &'a Value, key: &str) -> Option<&'a str> {
    obj.get("message")
        .and_then(|message| message.get(key))
        .and_then(Value::as_str)
}

fn bool_field(obj: &Value, key: &str) -> bool {
    obj.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn count_field(usage: &Value, key: &str) -> u64 {
    usage.get(key).and_then(Value::as_u64).unwrap_or(0)
}
