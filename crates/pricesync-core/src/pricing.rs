//! Deterministic cost-based pricing and competitiveness scoring.
//!
//! No I/O. Used when the marketplace has no authoritative price for an
//! identifier, and to score authoritative prices against known cost.

use rust_decimal::Decimal;

use crate::market::{PricingCalculation, PricingSource};
use crate::pricing_model::{PricingModel, MAX_SCORE};
use crate::PricingError;

#[derive(Debug, Clone, Default)]
pub struct CostBasedPricingCalculator {
    model: PricingModel,
}

impl CostBasedPricingCalculator {
    /// Creates a calculator over an already-validated model.
    #[must_use]
    pub fn new(model: PricingModel) -> Self {
        Self { model }
    }

    #[must_use]
    pub fn model(&self) -> &PricingModel {
        &self.model
    }

    /// Derives market, competitive and list prices from unit cost.
    ///
    /// ```text
    /// market      = cost × markup
    /// competitive = market × discount
    /// list        = competitive × premium
    /// margin      = (competitive − cost) / competitive
    /// ```
    ///
    /// # Errors
    ///
    /// - [`PricingError::InvalidCost`] if `cost` is zero or negative.
    /// - [`PricingError::Overflow`] if `cost` is too large to multiply.
    pub fn calculate(&self, cost: Decimal) -> Result<PricingCalculation, PricingError> {
        if cost <= Decimal::ZERO {
            return Err(PricingError::InvalidCost { cost });
        }
        let overflow = || PricingError::Overflow { cost };

        let market_price = cost
            .checked_mul(self.model.markup_multiplier)
            .ok_or_else(overflow)?;
        let competitive_price = market_price
            .checked_mul(self.model.competitive_discount)
            .ok_or_else(overflow)?;
        let list_price = competitive_price
            .checked_mul(self.model.list_premium)
            .ok_or_else(overflow)?;

        let profit_margin = (competitive_price - cost)
            .checked_div(competitive_price)
            .ok_or_else(overflow)?;
        let score = self.competitiveness_score(cost, competitive_price, profit_margin);

        Ok(PricingCalculation {
            product_id: None,
            catalog_identifier: None,
            cost: Some(cost),
            market_price,
            competitive_price,
            list_price,
            profit_margin: Some(profit_margin),
            competitiveness_score: Some(score),
            source: PricingSource::CostDerived,
        })
    }

    /// Scores a price observed on the marketplace.
    ///
    /// `observed` becomes both market and competitive price; `reference`
    /// (the marketplace's "was" price) becomes the list price when present.
    /// Margin and score are only produced when `cost` is known. Unlike
    /// [`Self::calculate`], the margin may be negative when the market sells
    /// below cost.
    ///
    /// # Errors
    ///
    /// - [`PricingError::InvalidPrice`] if `observed` is zero or negative.
    /// - [`PricingError::InvalidCost`] if `cost` is present but not positive.
    /// - [`PricingError::Overflow`] if the margin cannot be represented, which
    ///   only happens for an observed price many orders of magnitude below cost.
    pub fn score_observed(
        &self,
        cost: Option<Decimal>,
        observed: Decimal,
        reference: Option<Decimal>,
        source: PricingSource,
    ) -> Result<PricingCalculation, PricingError> {
        if observed <= Decimal::ZERO {
            return Err(PricingError::InvalidPrice { price: observed });
        }
        if let Some(cost) = cost {
            if cost <= Decimal::ZERO {
                return Err(PricingError::InvalidCost { cost });
            }
        }

        let list_price = reference.filter(|r| *r >= observed).unwrap_or(observed);
        let profit_margin = cost
            .map(|c| {
                (observed - c)
                    .checked_div(observed)
                    .ok_or(PricingError::Overflow { cost: c })
            })
            .transpose()?;
        let competitiveness_score = cost
            .zip(profit_margin)
            .map(|(c, m)| self.competitiveness_score(c, observed, m));

        Ok(PricingCalculation {
            product_id: None,
            catalog_identifier: None,
            cost,
            market_price: observed,
            competitive_price: observed,
            list_price,
            profit_margin,
            competitiveness_score,
            source,
        })
    }

    /// Sum of margin, price/cost ratio, and absolute price tier points,
    /// clamped to `[0, 100]`. A ratio too large to represent (or a zero
    /// cost) earns the ratio floor.
    #[must_use]
    pub fn competitiveness_score(&self, cost: Decimal, price: Decimal, margin: Decimal) -> u8 {
        let ratio_points = price
            .checked_div(cost)
            .map_or(self.model.ratio_floor_points, |ratio| {
                self.model.ratio_points(ratio)
            });
        let total = u16::from(self.model.margin_points(margin))
            + u16::from(ratio_points)
            + u16::from(self.model.price_points(price));
        u8::try_from(total.min(u16::from(MAX_SCORE))).unwrap_or(MAX_SCORE)
    }
}

#[cfg(test)]
#[path = "pricing_test.rs"]
mod tests;
