//! Tunable multipliers and score thresholds for cost-based pricing.
//!
//! The defaults are empirically chosen industry rules of thumb, not derived
//! values. Every one is a named constant and can be overridden from a YAML
//! file (see [`load_pricing_model`]).

use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

const fn dec(num: u32, scale: u32) -> Decimal {
    Decimal::from_parts(num, 0, 0, false, scale)
}

pub const DEFAULT_MARKUP_MULTIPLIER: Decimal = dec(16, 1);
pub const DEFAULT_COMPETITIVE_DISCOUNT: Decimal = dec(92, 2);
pub const DEFAULT_LIST_PREMIUM: Decimal = dec(115, 2);

/// Minimum profit margin → points, checked in order.
pub const DEFAULT_MARGIN_TIERS: [(Decimal, u8); 4] = [
    (dec(50, 2), 40),
    (dec(40, 2), 35),
    (dec(30, 2), 30),
    (dec(25, 2), 20),
];
pub const DEFAULT_MARGIN_FLOOR_POINTS: u8 = 10;

/// Maximum price-to-cost ratio (inclusive) → points, checked in order.
pub const DEFAULT_RATIO_TIERS: [(Decimal, u8); 3] =
    [(dec(20, 1), 35), (dec(25, 1), 30), (dec(30, 1), 25)];
pub const DEFAULT_RATIO_FLOOR_POINTS: u8 = 15;

/// Exclusive upper price bound → points, checked in order.
pub const DEFAULT_PRICE_TIERS: [(Decimal, u8); 3] =
    [(dec(100, 0), 25), (dec(500, 0), 20), (dec(1000, 0), 15)];
pub const DEFAULT_PRICE_FLOOR_POINTS: u8 = 10;

pub const MAX_SCORE: u8 = 100;

/// One threshold/points step of a score ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreTier {
    pub threshold: Decimal,
    pub points: u8,
}

fn tiers(defaults: &[(Decimal, u8)]) -> Vec<ScoreTier> {
    defaults
        .iter()
        .map(|&(threshold, points)| ScoreTier { threshold, points })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingModel {
    pub markup_multiplier: Decimal,
    pub competitive_discount: Decimal,
    pub list_premium: Decimal,
    /// Descending minimum margins.
    pub margin_tiers: Vec<ScoreTier>,
    pub margin_floor_points: u8,
    /// Ascending maximum price/cost ratios.
    pub ratio_tiers: Vec<ScoreTier>,
    pub ratio_floor_points: u8,
    /// Ascending exclusive price ceilings.
    pub price_tiers: Vec<ScoreTier>,
    pub price_floor_points: u8,
}

impl Default for PricingModel {
    fn default() -> Self {
        Self {
            markup_multiplier: DEFAULT_MARKUP_MULTIPLIER,
            competitive_discount: DEFAULT_COMPETITIVE_DISCOUNT,
            list_premium: DEFAULT_LIST_PREMIUM,
            margin_tiers: tiers(&DEFAULT_MARGIN_TIERS),
            margin_floor_points: DEFAULT_MARGIN_FLOOR_POINTS,
            ratio_tiers: tiers(&DEFAULT_RATIO_TIERS),
            ratio_floor_points: DEFAULT_RATIO_FLOOR_POINTS,
            price_tiers: tiers(&DEFAULT_PRICE_TIERS),
            price_floor_points: DEFAULT_PRICE_FLOOR_POINTS,
        }
    }
}

impl PricingModel {
    /// Checks that the multipliers keep `competitive < market < list` and a
    /// margin in `[0, 1)` for every positive cost, and that tier ladders are
    /// ordered.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPricingModel`] describing the first
    /// violated rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bad = |msg: String| Err(ConfigError::InvalidPricingModel(msg));

        if self.markup_multiplier <= Decimal::ZERO {
            return bad(format!(
                "markup_multiplier must be positive, got {}",
                self.markup_multiplier
            ));
        }
        if self.competitive_discount <= Decimal::ZERO || self.competitive_discount >= Decimal::ONE
        {
            return bad(format!(
                "competitive_discount must be in (0, 1), got {}",
                self.competitive_discount
            ));
        }
        if self.list_premium <= Decimal::ONE {
            return bad(format!(
                "list_premium must exceed 1, got {}",
                self.list_premium
            ));
        }
        if self.competitive_discount * self.list_premium <= Decimal::ONE {
            return bad(format!(
                "competitive_discount × list_premium must exceed 1 to keep list above market, got {}",
                self.competitive_discount * self.list_premium
            ));
        }
        if self.markup_multiplier * self.competitive_discount <= Decimal::ONE {
            return bad(format!(
                "markup_multiplier × competitive_discount must exceed 1 to keep a positive margin, got {}",
                self.markup_multiplier * self.competitive_discount
            ));
        }
        if !self
            .margin_tiers
            .windows(2)
            .all(|w| w[0].threshold > w[1].threshold)
        {
            return bad("margin_tiers must be strictly descending".to_string());
        }
        if !self
            .ratio_tiers
            .windows(2)
            .all(|w| w[0].threshold < w[1].threshold)
        {
            return bad("ratio_tiers must be strictly ascending".to_string());
        }
        if !self
            .price_tiers
            .windows(2)
            .all(|w| w[0].threshold < w[1].threshold)
        {
            return bad("price_tiers must be strictly ascending".to_string());
        }
        Ok(())
    }

    #[must_use]
    pub fn margin_points(&self, margin: Decimal) -> u8 {
        self.margin_tiers
            .iter()
            .find(|t| margin >= t.threshold)
            .map_or(self.margin_floor_points, |t| t.points)
    }

    #[must_use]
    pub fn ratio_points(&self, ratio: Decimal) -> u8 {
        self.ratio_tiers
            .iter()
            .find(|t| ratio <= t.threshold)
            .map_or(self.ratio_floor_points, |t| t.points)
    }

    #[must_use]
    pub fn price_points(&self, price: Decimal) -> u8 {
        self.price_tiers
            .iter()
            .find(|t| price < t.threshold)
            .map_or(self.price_floor_points, |t| t.points)
    }
}

/// Load a pricing model override from YAML. Missing keys keep their defaults.
///
/// Decimal values should be quoted (`markup_multiplier: "1.6"`) so they are
/// read exactly.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails
/// [`PricingModel::validate`].
pub fn load_pricing_model(path: &Path) -> Result<PricingModel, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::PricingModelIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_pricing_model(&content)
}

fn parse_pricing_model(content: &str) -> Result<PricingModel, ConfigError> {
    let model: PricingModel = serde_yaml::from_str(content)?;
    model.validate()?;
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        PricingModel::default()
            .validate()
            .expect("default model must be valid");
    }

    #[test]
    fn default_constants_have_expected_values() {
        assert_eq!(DEFAULT_MARKUP_MULTIPLIER.to_string(), "1.6");
        assert_eq!(DEFAULT_COMPETITIVE_DISCOUNT.to_string(), "0.92");
        assert_eq!(DEFAULT_LIST_PREMIUM.to_string(), "1.15");
    }

    #[test]
    fn margin_points_follow_tiers() {
        let m = PricingModel::default();
        assert_eq!(m.margin_points(Decimal::new(55, 2)), 40);
        assert_eq!(m.margin_points(Decimal::new(50, 2)), 40);
        assert_eq!(m.margin_points(Decimal::new(45, 2)), 35);
        assert_eq!(m.margin_points(Decimal::new(32, 2)), 30);
        assert_eq!(m.margin_points(Decimal::new(25, 2)), 20);
        assert_eq!(m.margin_points(Decimal::new(10, 2)), 10);
    }

    #[test]
    fn ratio_points_are_inclusive_upper_bounds() {
        let m = PricingModel::default();
        assert_eq!(m.ratio_points(Decimal::new(20, 1)), 35);
        assert_eq!(m.ratio_points(Decimal::new(21, 1)), 30);
        assert_eq!(m.ratio_points(Decimal::new(30, 1)), 25);
        assert_eq!(m.ratio_points(Decimal::new(31, 1)), 15);
    }

    #[test]
    fn price_points_are_exclusive_upper_bounds() {
        let m = PricingModel::default();
        assert_eq!(m.price_points(Decimal::new(9999, 2)), 25);
        assert_eq!(m.price_points(Decimal::from(100)), 20);
        assert_eq!(m.price_points(Decimal::from(999)), 15);
        assert_eq!(m.price_points(Decimal::from(1000)), 10);
    }

    #[test]
    fn yaml_override_keeps_unspecified_defaults() {
        let model = parse_pricing_model("markup_multiplier: \"1.8\"\n").unwrap();
        assert_eq!(model.markup_multiplier, Decimal::new(18, 1));
        assert_eq!(model.competitive_discount, DEFAULT_COMPETITIVE_DISCOUNT);
        assert_eq!(model.margin_tiers.len(), 4);
    }

    #[test]
    fn yaml_override_rejects_margin_destroying_multipliers() {
        let err = parse_pricing_model("markup_multiplier: \"1.05\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPricingModel(_)), "{err}");
    }

    #[test]
    fn rejects_list_premium_that_undercuts_market_price() {
        let model = PricingModel {
            list_premium: Decimal::new(105, 2),
            ..PricingModel::default()
        };
        assert!(matches!(
            model.validate(),
            Err(ConfigError::InvalidPricingModel(_))
        ));
    }

    #[test]
    fn yaml_override_rejects_unordered_tiers() {
        let yaml = "price_tiers:\n  - { threshold: \"500\", points: 20 }\n  - { threshold: \"100\", points: 25 }\n";
        let err = parse_pricing_model(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPricingModel(_)));
    }

    #[test]
    fn load_pricing_model_reports_missing_file() {
        let err = load_pricing_model(Path::new("/nonexistent/pricing.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::PricingModelIo { .. }));
    }
}
