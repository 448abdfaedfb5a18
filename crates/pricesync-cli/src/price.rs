//! Pricing command handlers for the CLI.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Subcommand;
use pricesync_core::{CostBasedPricingCalculator, PricingModel};
use rust_decimal::Decimal;

/// Sub-commands available under `price`.
#[derive(Debug, Subcommand)]
pub enum PriceCommands {
    /// Show the cost-derived price set for a unit cost
    Quote {
        /// Unit cost, e.g. 159.66
        #[arg(long)]
        cost: Decimal,
        /// YAML pricing model override
        #[arg(long, env = "PRICESYNC_PRICING_MODEL_PATH")]
        model: Option<PathBuf>,
    },
}

/// Builds the calculator from the override file, or the built-in model.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed or validated.
pub(crate) fn load_calculator(path: Option<&Path>) -> anyhow::Result<CostBasedPricingCalculator> {
    let model = match path {
        Some(path) => pricesync_core::load_pricing_model(path)
            .with_context(|| format!("failed to load pricing model from {}", path.display()))?,
        None => PricingModel::default(),
    };
    Ok(CostBasedPricingCalculator::new(model))
}

/// Prints the cost-derived calculation for `cost`.
///
/// # Errors
///
/// Returns an error if the model cannot be loaded or `cost` is not positive.
pub(crate) fn run_price_quote(cost: Decimal, model: Option<&Path>) -> anyhow::Result<()> {
    let calculator = load_calculator(model)?;
    let calc = calculator.calculate(cost)?.rounded_to_cents();

    let margin_pct = calc
        .profit_margin
        .map_or_else(|| "\u{2014}".to_string(), |m| format!("{:.1}%", m * Decimal::ONE_HUNDRED));
    let score = calc
        .competitiveness_score
        .map_or_else(|| "\u{2014}".to_string(), |s| s.to_string());

    println!("cost:              {cost}");
    println!("market price:      {}", calc.market_price);
    println!("competitive price: {}", calc.competitive_price);
    println!("list price:        {}", calc.list_price);
    println!("profit margin:     {margin_pct}");
    println!("competitiveness:   {score}");
    Ok(())
}
