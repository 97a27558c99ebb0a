//! Wall-clock versus active time for a session's turns.
//!
//! Turns are grouped into blocks: a turn joins the current block unless the
//! idle gap since the block's latest end exceeds the gap threshold. Wall-clock
//! time is the sum of block spans, active time the sum of turn durations.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Maximum idle gap, in seconds, between two turns of the same block.
pub const BLOCK_GAP_SECONDS: i64 = 1800;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurnSpan {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_seconds: Option<f64>,
}

impl TurnSpan {
    /// Builds a span from stored RFC 3339 timestamps. An end before the start
    /// is clamped to the start.
    pub fn from_timestamps(
        start: &str,
        end: &str,
        duration_seconds: Option<f64>,
    ) -> Option<TurnSpan> {
        let start = DateTime::parse_from_rfc3339(start).ok()?.with_timezone(&Utc);
        let end = DateTime::parse_from_rfc3339(end).ok()?.with_timezone(&Utc);
        Some(TurnSpan {
            start,
            end: end.max(start),
            duration_seconds,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurnBlock {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub turn_count: usize,
}

impl TurnBlock {
    pub fn seconds(&self) -> f64 {
        seconds_between(self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DurationTotals {
    pub wall_clock_seconds: f64,
    pub active_seconds: f64,
    pub block_count: u64,
}

/// Groups turns into blocks. Turns are ordered by start time; equal starts
/// keep their input order.
pub fn group_into_blocks(turns: &[TurnSpan], gap_seconds: i64) -> Vec<TurnBlock> {
    let mut ordered: Vec<&TurnSpan> = turns.iter().collect();
    ordered.sort_by_key(|turn| turn.start);

    let max_gap = Duration::seconds(gap_seconds);
    let mut blocks: Vec<TurnBlock> = Vec::new();
    for turn in ordered {
        if let Some(current) = blocks.last_mut() {
            if turn.start - current.end <= max_gap {
                current.end = current.end.max(turn.end);
                current.turn_count += 1;
                continue;
            }
        }
        blocks.push(TurnBlock {
            start: turn.start,
            end: turn.end,
            turn_count: 1,
        });
    }
    blocks
}

pub fn wall_clock_seconds(blocks: &[TurnBlock]) -> f64 {
    blocks.iter().map(TurnBlock::seconds).sum()
}

pub fn active_seconds(turns: &[TurnSpan]) -> f64 {
    turns
        .iter()
        .filter_map(|turn| turn.duration_seconds)
        .filter(|seconds| *seconds >= 0.0)
        .sum()
}

pub fn duration_totals(turns: &[TurnSpan]) -> DurationTotals {
    let blocks = group_into_blocks(turns, BLOCK_GAP_SECONDS);
    DurationTotals {
        wall_clock_seconds: wall_clock_seconds(&blocks),
        active_seconds: active_seconds(turns),
        block_count: blocks.len() as u64,
    }
}

fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 1000.0
}
