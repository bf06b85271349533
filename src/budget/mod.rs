//! Budget module - cost accounting and token estimation.
//!
//! # Key Concepts
//! - Cost: linear per-1,000-token pricing from the model registry
//! - Premium baseline: what the request would have cost on a top-tier model
//! - Savings: how much routing saved against that baseline, never negative
//! - Tokens: length-based estimates used before (and instead of) provider usage data

mod tokens;

pub use tokens::{estimate_tokens_from_messages, estimate_tokens_from_text, TokenEstimate};

use crate::registry::Model;

/// Reference input rate for the "always use the premium model" counterfactual.
pub const PREMIUM_PER_1K_INPUT: f64 = 0.0025;
/// Reference output rate for the same counterfactual.
pub const PREMIUM_PER_1K_OUTPUT: f64 = 0.01;

fn linear_cost(
    per_1k_input: f64,
    per_1k_output: f64,
    input_tokens: u64,
    output_tokens: u64,
) -> f64 {
    (input_tokens as f64 / 1000.0) * per_1k_input + (output_tokens as f64 / 1000.0) * per_1k_output
}

/// Cost of a request on `model`.
pub fn cost(model: &Model, input_tokens: u64, output_tokens: u64) -> f64 {
    linear_cost(model.cost_input, model.cost_output, input_tokens, output_tokens)
}

/// Cost of the same token counts at premium reference rates.
pub fn premium_baseline(input_tokens: u64, output_tokens: u64) -> f64 {
    linear_cost(
        PREMIUM_PER_1K_INPUT,
        PREMIUM_PER_1K_OUTPUT,
        input_tokens,
        output_tokens,
    )
}

pub fn savings(actual_cost: f64, baseline: f64) -> f64 {
    (baseline - actual_cost).max(0.0)
}

/// Round a currency amount to 8 decimal places for display.
pub fn round_money(value: f64) -> f64 {
    (value * 1e8).round() / 1e8
}
