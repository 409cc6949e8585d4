use crate::config::PricingTierSection;

use super::calculator::round_money;
use super::models::{MarginAnalysis, PriceSuggestion};

/// Rounds `value` up to the next multiple of `increment`; an increment <= 0 leaves it as is.
pub fn round_up_to(value: f64, increment: f64) -> f64 {
    if increment <= 0.0 || !increment.is_finite() {
        return round_money(value);
    }
    // Guard against 2500.0000001 style float noise pushing a whole step up.
    let steps = (value / increment - 1e-9).ceil().max(0.0);
    steps * increment
}

pub fn suggest_price(cost_per_unit: f64, tier: &PricingTierSection) -> PriceSuggestion {
    PriceSuggestion {
        tier: tier.tier.clone(),
        margin: tier.margin,
        increment: tier.increment,
        price: round_up_to(cost_per_unit * (1.0 + tier.margin), tier.increment),
    }
}

pub fn suggest_prices(cost_per_unit: f64, tiers: &[PricingTierSection]) -> Vec<PriceSuggestion> {
    tiers
        .iter()
        .map(|tier| suggest_price(cost_per_unit, tier))
        .collect()
}

pub fn analyze_margin(cost_per_unit: f64, selling_price: f64) -> MarginAnalysis {
    let gross_profit = selling_price - cost_per_unit;
    let margin_percent = if selling_price > 0.0 {
        gross_profit / selling_price * 100.0
    } else {
        0.0
    };
    let markup_percent = if cost_per_unit > 0.0 {
        gross_profit / cost_per_unit * 100.0
    } else {
        0.0
    };
    MarginAnalysis {
        cost_per_unit,
        selling_price,
        gross_profit: round_money(gross_profit),
        margin_percent: round_money(margin_percent),
        markup_percent: round_money(markup_percent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HppSection;

    #[test]
    fn default_tiers_round_up() {
        let tiers = HppSection::default().pricing_tiers;
        let prices = suggest_prices(4_200.0, &tiers);
        let by_tier: Vec<(&str, f64)> = prices.iter().map(|p| (p.tier.as_str(), p.price)).collect();
        // 5,460 -> 5,500; 6,720 -> 7,000; 8,400 -> 9,000
        assert_eq!(
            by_tier,
            vec![("economy", 5_500.0), ("standard", 7_000.0), ("premium", 9_000.0)]
        );
    }

    #[test]
    fn exact_multiples_stay_put() {
        assert_eq!(round_up_to(2_500.0, 500.0), 2_500.0);
        assert_eq!(round_up_to(2_500.01, 500.0), 3_000.0);
        assert_eq!(round_up_to(0.0, 500.0), 0.0);
    }

    #[test]
    fn zero_increment_disables_rounding() {
        assert_eq!(round_up_to(1_234.567, 0.0), 1_234.57);
        assert_eq!(round_up_to(1_234.5, -10.0), 1_234.5);
    }

    #[test]
    fn margin_analysis_reports_profit_and_ratios() {
        let analysis = analyze_margin(6_000.0, 10_000.0);
        assert_eq!(analysis.gross_profit, 4_000.0);
        assert_eq!(analysis.margin_percent, 40.0);
        assert!((analysis.markup_percent - 66.67).abs() < 1e-9);

        let free = analyze_margin(0.0, 0.0);
        assert_eq!(free.margin_percent, 0.0);
        assert_eq!(free.markup_percent, 0.0);
    }
}
