use serde::{Deserialize, Serialize};

use crate::{TokenCounts, model_matches_pattern};

/// Context size above which the long-context rate table applies.
pub const LONG_CONTEXT_THRESHOLD: u64 = 200_000;

/// USD prices per million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelRates {
    pub input_per_1m: f64,
    pub output_per_1m: f64,
    pub cache_write_per_1m: f64,
    pub cache_read_per_1m: f64,
}

impl ModelRates {
    /// Cache writes at 1.25x and cache reads at 0.1x of the base input price.
    pub const fn from_base(input_per_1m: f64, output_per_1m: f64) -> Self {
        Self {
            input_per_1m,
            output_per_1m,
            cache_write_per_1m: input_per_1m * 1.25,
            cache_read_per_1m: input_per_1m * 0.1,
        }
    }
}

/// One row of the price table. `min_context` is an exclusive lower bound on
/// [`TokenCounts::context_tokens`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingRule {
    pub model_pattern: &'static str,
    pub min_context: Option<u64>,
    pub rates: ModelRates,
}

impl PricingRule {
    fn matches(&self, model: &str, tokens: &TokenCounts) -> bool {
        if !model_matches_pattern(model, self.model_pattern) {
            return false;
        }
        match self.min_context {
            Some(threshold) => tokens.context_tokens() > threshold,
            None => true,
        }
    }
}

const SONNET_4: ModelRates = ModelRates::from_base(3.0, 15.0);

/// Rates used when no rule matches the model name.
pub const DEFAULT_RATES: ModelRates = SONNET_4;

/// Evaluated top-down, first match wins. Versioned families must precede
/// their base family because the base pattern also matches them.
pub const PRICING_RULES: &[PricingRule] = &[
    PricingRule {
        model_pattern: "claude-sonnet-4-5*",
        min_context: Some(LONG_CONTEXT_THRESHOLD),
        rates: ModelRates::from_base(6.0, 22.5),
    },
    PricingRule {
        model_pattern: "claude-sonnet-4-5*",
        min_context: None,
        rates: SONNET_4,
    },
    PricingRule {
        model_pattern: "claude-opus-4-5*",
        min_context: None,
        rates: ModelRates::from_base(5.0, 25.0),
    },
    PricingRule {
        model_pattern: "claude-haiku-4-5*",
        min_context: None,
        rates: ModelRates::from_base(1.0, 5.0),
    },
    PricingRule {
        model_pattern: "claude-sonnet-4*",
        min_context: None,
        rates: SONNET_4,
    },
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub input_cost_usd: f64,
    pub output_cost_usd: f64,
    pub cache_write_cost_usd: f64,
    pub cache_read_cost_usd: f64,
    pub total_cost_usd: f64,
}

pub fn rates_for(model: Option<&str>, tokens: &TokenCounts) -> ModelRates {
    let Some(model) = model else {
        return DEFAULT_RATES;
    };
    PRICING_RULES
        .iter()
        .find(|rule| rule.matches(model, tokens))
        .map(|rule| rule.rates)
        .unwrap_or(DEFAULT_RATES)
}

pub fn cost_breakdown(model: Option<&str>, tokens: &TokenCounts) -> CostBreakdown {
    let rates = rates_for(model, tokens);
    let input_cost = per_million(tokens.input_tokens, rates.input_per_1m);
    let output_cost = per_million(tokens.output_tokens, rates.output_per_1m);
    let cache_write_cost = per_million(tokens.cache_creation_input_tokens, rates.cache_write_per_1m);
    let cache_read_cost = per_million(tokens.cache_read_input_tokens, rates.cache_read_per_1m);
    CostBreakdown {
        input_cost_usd: input_cost,
        output_cost_usd: output_cost,
        cache_write_cost_usd: cache_write_cost,
        cache_read_cost_usd: cache_read_cost,
        total_cost_usd: input_cost + output_cost + cache_write_cost + cache_read_cost,
    }
}

pub fn cost_usd(model: Option<&str>, tokens: &TokenCounts) -> f64 {
    cost_breakdown(model, tokens).total_cost_usd
}

/// What the call would have cost with every context token billed at the plain
/// input rate.
pub fn cost_without_cache_usd(model: Option<&str>, tokens: &TokenCounts) -> f64 {
    let rates = rates_for(model, tokens);
    per_million(tokens.context_tokens(), rates.input_per_1m)
        + per_million(tokens.output_tokens, rates.output_per_1m)
}

fn per_million(tokens: u64, rate: f64) -> f64 {
    (tokens as f64 / 1_000_000.0) * rate
}
