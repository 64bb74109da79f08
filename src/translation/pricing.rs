/*!
 * Token pricing and cost calculation.
 *
 * Prices are expressed per 1000 tokens, separately for prompt (input) and
 * completion (output) tokens, and looked up by provider and model name.
 */

use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::app_config::Config;
use crate::translation::models::TokenUsage;

/// Price of one model, per 1000 tokens
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Price per 1000 prompt tokens
    pub input_per_1k: f64,
    /// Price per 1000 completion tokens
    pub output_per_1k: f64,
}

impl ModelPricing {
    pub fn new(input_per_1k: f64, output_per_1k: f64) -> Self {
        Self {
            input_per_1k,
            output_per_1k,
        }
    }

    /// Cost of one call with the given token counts
    pub fn cost(&self, prompt_tokens: u64, completion_tokens: u64) -> f64 {
        calculate_cost(prompt_tokens, completion_tokens, self)
    }
}

/// `prompt / 1000 * input_price + completion / 1000 * output_price`
pub fn calculate_cost(prompt_tokens: u64, completion_tokens: u64, pricing: &ModelPricing) -> f64 {
    (prompt_tokens as f64 / 1000.0) * pricing.input_per_1k
        + (completion_tokens as f64 / 1000.0) * pricing.output_per_1k
}

/// Source of model prices
pub trait PricingRegistry: Send + Sync {
    /// Prices for `model` served by `provider`, if known
    fn pricing_for(&self, provider: &str, model: &str) -> Option<ModelPricing>;

    /// Cost of a call; unknown models cost 0.0 and log a warning
    fn cost_for(&self, provider: &str, model: &str, usage: &TokenUsage) -> f64 {
        match self.pricing_for(provider, model) {
            Some(pricing) => pricing.cost(usage.prompt_tokens, usage.completion_tokens),
            None => {
                warn!(
                    "No pricing for model '{}' (provider '{}'), recording cost as 0.0",
                    model, provider
                );
                0.0
            }
        }
    }
}

/// In-memory price table keyed by (provider, model)
#[derive(Debug, Clone, Default)]
pub struct StaticPricing {
    prices: HashMap<(String, String), ModelPricing>,
}

impl StaticPricing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the table from every provider's `pricing` section
    pub fn from_config(config: &Config) -> Self {
        let mut pricing = Self::new();
        for provider in &config.providers {
            for (model, price) in &provider.pricing {
                pricing.insert(&provider.name, model, *price);
            }
        }
        pricing
    }

    pub fn insert(&mut self, provider: &str, model: &str, pricing: ModelPricing) {
        self.prices
            .insert((provider.to_string(), model.to_string()), pricing);
    }

    pub fn with_price(mut self, provider: &str, model: &str, pricing: ModelPricing) -> Self {
        self.insert(provider, model, pricing);
        self
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl PricingRegistry for StaticPricing {
    fn pricing_for(&self, provider: &str, model: &str) -> Option<ModelPricing> {
        self.prices
            .get(&(provider.to_string(), model.to_string()))
            .copied()
    }
}
