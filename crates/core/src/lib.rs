mod blocks;
mod pricing;

use serde::{Deserialize, Serialize};

pub use blocks::{
    BLOCK_GAP_SECONDS, DurationTotals, TurnBlock, TurnSpan, active_seconds, duration_totals,
    group_into_blocks, wall_clock_seconds,
};
pub use pricing::{
    CostBreakdown, DEFAULT_RATES, LONG_CONTEXT_THRESHOLD, ModelRates, PRICING_RULES, PricingRule,
    cost_breakdown, cost_usd, cost_without_cache_usd, rates_for,
};

/// The four token counters reported for every assistant response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCounts {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_input_tokens: u64,
    pub cache_read_input_tokens: u64,
}

impl TokenCounts {
    /// Tokens that occupied the context window for this call.
    pub fn context_tokens(&self) -> u64 {
        self.input_tokens
            .saturating_add(self.cache_creation_input_tokens)
            .saturating_add(self.cache_read_input_tokens)
    }

    pub fn add(self, other: TokenCounts) -> TokenCounts {
        TokenCounts {
            input_tokens: self.input_tokens.saturating_add(other.input_tokens),
            output_tokens: self.output_tokens.saturating_add(other.output_tokens),
            cache_creation_input_tokens: self
                .cache_creation_input_tokens
                .saturating_add(other.cache_creation_input_tokens),
            cache_read_input_tokens: self
                .cache_read_input_tokens
                .saturating_add(other.cache_read_input_tokens),
        }
    }
}

/// Session fields as observed in one pass over a transcript.
///
/// `None` fields never overwrite stored values on upsert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewSession {
    pub external_id: String,
    pub project: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub model: Option<String>,
    pub version: Option<String>,
    pub custom_title: Option<String>,
}

impl NewSession {
    /// Placeholder row for a parent discovered through one of its sub-agents.
    pub fn placeholder(external_id: &str, project: Option<String>) -> Self {
        Self {
            external_id: external_id.to_string(),
            project,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub external_id: String,
    pub project: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub model: Option<String>,
    pub version: Option<String>,
    pub custom_title: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSubagent {
    pub external_id: String,
    pub session_id: i64,
    pub agent_type: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subagent {
    pub id: i64,
    pub external_id: String,
    pub session_id: i64,
    pub agent_type: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

/// One priced assistant response, keyed by the assistant message id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub external_id: String,
    pub session_id: i64,
    pub subagent_id: Option<i64>,
    pub timestamp: String,
    pub model: Option<String>,
    pub tokens: TokenCounts,
}

/// One user prompt and the assistant response that answered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub session_id: i64,
    pub user_message_id: Option<String>,
    pub user_timestamp: String,
    pub assistant_message_id: Option<String>,
    pub assistant_timestamp: Option<String>,
    pub duration_seconds: Option<f64>,
    pub user_content: Option<String>,
}

/// Filters shared by the aggregation queries. Empty fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsFilter {
    pub from: Option<String>,
    pub to: Option<String>,
    pub project: Option<String>,
    pub custom_title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub id: i64,
    pub external_id: String,
    pub project: Option<String>,
    pub custom_title: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub tokens: TokenCounts,
    pub estimated_cost_usd: f64,
    pub usage_record_count: u64,
    pub subagent_count: u64,
    pub exchange_count: u64,
    pub wall_clock_seconds: f64,
    pub active_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubagentStats {
    pub id: i64,
    pub external_id: String,
    pub agent_type: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub tokens: TokenCounts,
    pub estimated_cost_usd: f64,
    pub usage_record_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: String,
    pub tokens: TokenCounts,
    pub cost_usd: f64,
    pub session_count: u64,
    pub usage_record_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyCost {
    pub month: String,
    pub api_cost_usd: f64,
    pub tokens: TokenCounts,
    pub session_count: u64,
    pub usage_record_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub tokens: TokenCounts,
    pub total_cost_usd: f64,
    pub cost_without_cache_usd: f64,
    pub session_count: u64,
    pub first_session: Option<String>,
    pub last_session: Option<String>,
    pub wall_clock_seconds: f64,
    pub active_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDuration {
    pub session_id: i64,
    pub external_id: String,
    pub wall_clock_seconds: f64,
    pub active_seconds: f64,
    pub block_count: u64,
    pub exchange_count: u64,
}

/// Case-insensitive glob match supporting `*` wildcards.
pub fn model_matches_pattern(model: &str, pattern: &str) -> bool {
    let model = model.to_ascii_lowercase();
    let pattern = pattern.to_ascii_lowercase();
    if pattern == "*" {
        return true;
    }
    if !pattern.contains('*') {
        return model == pattern;
    }
    let parts: Vec<&str> = pattern.split('*').collect();
    let mut remainder = model.as_str();
    let mut first = true;
    for part in parts {
        if part.is_empty() {
            first = false;
            continue;
        }
        if let Some(index) = remainder.find(part) {
            if first && index != 0 {
                return false;
            }
            remainder = &remainder[index + part.len()..];
            first = false;
        } else {
            return false;
        }
    }
    if pattern.ends_with('*') {
        true
    } else {
        remainder.is_empty()
    }
}
