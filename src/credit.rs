use crate::models::{
    AffordabilityStatus, AssessmentResult, FinancialSnapshot, LoanScenario, Recommendation,
    RiskLabel, RiskTier, SafePaymentBasis,
};
use crate::risk;

pub const DEFAULT_FORECAST_CONFIDENCE: f64 = 0.6;
pub const BUFFER_FALLBACK_MONTHS: f64 = 12.0;
pub const PROFIT_SHARE: f64 = 0.30;
pub const REVENUE_SHARE: f64 = 0.05;

/// No existing obligations are tracked yet, so the current tier is scored
/// against a flat 10% debt-to-income.
pub const PLACEHOLDER_CURRENT_DTI_PERCENT: f64 = 10.0;

/// No-revenue businesses are scored as maximally stressed.
pub const NO_REVENUE_DTI_PERCENT: f64 = 100.0;

pub const REFERENCE_ANNUAL_RATE: f64 = 0.12;
pub const REFERENCE_TENURE_MONTHS: i32 = 24;

pub const COMFORTABLE_MAX_PERCENT: f64 = 70.0;
pub const TIGHT_MAX_PERCENT: f64 = 100.0;
pub const STRETCHING_MAX_PERCENT: f64 = 130.0;

const COMFORTABLE_TEXT: &str = "Comfortably affordable. This loan is well within your capacity.";
const TIGHT_TEXT: &str = "Affordable but tight. Leaves little margin for unexpected expenses.";
const STRETCHING_TEXT: &str = "Stretching capacity. Consider reducing amount or extending tenure.";
const NOT_RECOMMENDED_TEXT: &str = "Not recommended. EMI significantly exceeds your safe capacity.";
const HIGH_RISK_WARNING: &str = " This loan would move you to High risk tier.";

/// Monthly amount the business can put towards new debt service.
pub fn safe_monthly_payment(snapshot: &FinancialSnapshot) -> (f64, SafePaymentBasis) {
    let profit = snapshot.monthly_profit();
    if snapshot.is_profitable() && profit > 0.0 {
        (profit * PROFIT_SHARE, SafePaymentBasis::ProfitShare)
    } else {
        (
            (snapshot.monthly_revenue * REVENUE_SHARE).max(0.0),
            SafePaymentBasis::RevenueShare,
        )
    }
}

/// Largest principal whose EMI at the reference rate and term equals the
/// safe payment, scaled by the current risk tier.
pub fn credit_limit(safe_monthly_payment: f64, tier: RiskLabel) -> f64 {
    if safe_monthly_payment <= 0.0 {
        return 0.0;
    }
    let rate = REFERENCE_ANNUAL_RATE / 12.0;
    let factor = (1.0 + rate).powi(REFERENCE_TENURE_MONTHS);
    let base_limit = safe_monthly_payment * ((factor - 1.0) / (rate * factor));
    base_limit * risk::credit_multiplier(tier)
}

/// Reducing-balance EMI rounded to whole currency units. A zero rate falls
/// back to straight-line repayment, which is left unrounded.
pub fn installment(principal: f64, tenure_months: u32, annual_rate_percent: f64) -> f64 {
    let tenure = f64::from(tenure_months);
    if annual_rate_percent == 0.0 {
        return principal / tenure;
    }
    let monthly_rate = annual_rate_percent / 12.0 / 100.0;
    let factor = (1.0 + monthly_rate).powf(tenure);
    (principal * monthly_rate * factor / (factor - 1.0)).round()
}

pub fn affordability_ratio(emi: f64, safe_monthly_payment: f64) -> f64 {
    if safe_monthly_payment > 0.0 {
        emi / safe_monthly_payment
    } else {
        f64::INFINITY
    }
}

pub fn affordability_status(affordability_percent: f64) -> AffordabilityStatus {
    if affordability_percent <= COMFORTABLE_MAX_PERCENT {
        AffordabilityStatus::Comfortable
    } else if affordability_percent <= TIGHT_MAX_PERCENT {
        AffordabilityStatus::Tight
    } else if affordability_percent <= STRETCHING_MAX_PERCENT {
        AffordabilityStatus::Stretching
    } else {
        AffordabilityStatus::NotRecommended
    }
}

/// Runway after the loan lands: proceeds join the balance, the EMI joins the burn.
pub fn projected_runway(snapshot: &FinancialSnapshot, principal: f64, emi: f64) -> Option<f64> {
    let new_balance = snapshot.total_balance + principal;
    let current_burn = if snapshot.is_profitable() {
        0.0
    } else {
        snapshot.monthly_profit().abs()
    };
    let new_burn = current_burn + emi;

    if new_burn <= 0.0 {
        None
    } else {
        Some(new_balance / new_burn)
    }
}

pub fn runway_change(current: Option<f64>, projected: Option<f64>) -> f64 {
    match (current, projected) {
        (None, None) => 0.0,
        (None, Some(projected)) => -projected,
        (Some(current), None) => current,
        (Some(current), Some(projected)) => projected - current,
    }
}

pub fn projected_debt_to_income(emi: f64, monthly_revenue: f64) -> f64 {
    if monthly_revenue > 0.0 {
        emi / monthly_revenue * 100.0
    } else {
        NO_REVENUE_DTI_PERCENT
    }
}

pub fn projected_buffer_safety(snapshot: &FinancialSnapshot, principal: f64, emi: f64) -> f64 {
    let new_expenses = snapshot.monthly_expenses + emi;
    if new_expenses > 0.0 {
        (snapshot.total_balance + principal) / new_expenses
    } else {
        BUFFER_FALLBACK_MONTHS
    }
}

pub fn recommend(affordability_percent: f64, current: RiskTier, projected: RiskTier) -> Recommendation {
    let (text, mut positive) = match affordability_status(affordability_percent) {
        AffordabilityStatus::Comfortable => (COMFORTABLE_TEXT, true),
        AffordabilityStatus::Tight => (TIGHT_TEXT, true),
        AffordabilityStatus::Stretching => (STRETCHING_TEXT, false),
        AffordabilityStatus::NotRecommended => (NOT_RECOMMENDED_TEXT, false),
    };
    let mut text = text.to_string();

    let risk_increased = projected.severity_percent > current.severity_percent;
    if risk_increased && projected.label == RiskLabel::High && current.label != RiskLabel::High {
        text.push_str(HIGH_RISK_WARNING);
        positive = false;
    }

    Recommendation { text, positive }
}

/// Runs the full pipeline for one snapshot and loan.
pub fn assess(snapshot: &FinancialSnapshot, loan: &LoanScenario) -> AssessmentResult {
    let current_runway = snapshot.current_runway_months();
    let buffer_safety = snapshot.buffer_safety_months();
    let (safe_payment, basis) = safe_monthly_payment(snapshot);

    let current_tier = risk::classify(current_runway, buffer_safety, PLACEHOLDER_CURRENT_DTI_PERCENT);
    let limit = credit_limit(safe_payment, current_tier.label);

    let emi = installment(loan.principal, loan.tenure_months, loan.annual_rate_percent);
    let ratio = affordability_ratio(emi, safe_payment);
    let percent = ratio * 100.0;

    let new_runway = projected_runway(snapshot, loan.principal, emi);
    let new_dti = projected_debt_to_income(emi, snapshot.monthly_revenue);
    let new_buffer = projected_buffer_safety(snapshot, loan.principal, emi);
    let new_tier = risk::classify(new_runway, new_buffer, new_dti);

    tracing::debug!(
        safe_payment,
        emi,
        current_tier = %current_tier.label,
        new_tier = %new_tier.label,
        "assessed loan scenario"
    );

    AssessmentResult {
        monthly_profit: snapshot.monthly_profit(),
        is_profitable: snapshot.is_profitable(),
        current_runway_months: current_runway,
        buffer_safety_months: buffer_safety,
        stress_margin_percent: snapshot.stress_margin_percent(),
        confidence_weight_percent: snapshot.confidence_weight_percent(),
        safe_monthly_payment: safe_payment,
        safe_payment_basis: basis,
        current_debt_to_income_percent: PLACEHOLDER_CURRENT_DTI_PERCENT,
        current_risk_tier: current_tier,
        credit_limit: limit,
        projected_installment: emi,
        affordability_ratio: ratio,
        affordability_percent: percent,
        affordability_status: affordability_status(percent),
        new_runway_months: new_runway,
        runway_change_months: runway_change(current_runway, new_runway),
        new_debt_to_income_percent: new_dti,
        new_buffer_safety_months: new_buffer,
        new_risk_tier: new_tier,
        risk_increased: new_tier.severity_percent > current_tier.severity_percent,
        recommendation: recommend(percent, current_tier, new_tier),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(balance: f64, revenue: f64, expenses: f64) -> FinancialSnapshot {
        FinancialSnapshot {
            total_balance: balance,
            monthly_revenue: revenue,
            monthly_expenses: expenses,
            ..FinancialSnapshot::default()
        }
    }

    fn loan(principal: f64, tenure_months: u32, annual_rate_percent: f64) -> LoanScenario {
        LoanScenario {
            principal,
            tenure_months,
            annual_rate_percent,
        }
    }

    #[test]
    fn safe_payment_uses_profit_share_when_profitable() {
        let (payment, basis) = safe_monthly_payment(&snapshot(0.0, 200_000.0, 150_000.0));
        assert!((payment - 15_000.0).abs() < 1e-6);
        assert_eq!(basis, SafePaymentBasis::ProfitShare);
    }

    #[test]
    fn safe_payment_uses_revenue_share_when_burning_or_flat() {
        let (burning, basis) = safe_monthly_payment(&snapshot(0.0, 100_000.0, 160_000.0));
        assert!((burning - 5_000.0).abs() < 1e-6);
        assert_eq!(basis, SafePaymentBasis::RevenueShare);

        let (flat, _) = safe_monthly_payment(&snapshot(0.0, 80_000.0, 80_000.0));
        assert!((flat - 4_000.0).abs() < 1e-6);

        let (nothing, _) = safe_monthly_payment(&snapshot(0.0, 0.0, 10_000.0));
        assert_eq!(nothing, 0.0);
    }

    #[test]
    fn emi_matches_reducing_balance_reference() {
        assert_eq!(installment(500_000.0, 24, 12.0), 23_537.0);
    }

    #[test]
    fn emi_zero_rate_is_straight_line() {
        assert_eq!(installment(120_000.0, 12, 0.0), 10_000.0);
    }

    #[test]
    fn credit_limit_saturates_at_zero() {
        for label in [RiskLabel::Low, RiskLabel::Medium, RiskLabel::High] {
            assert_eq!(credit_limit(0.0, label), 0.0);
            assert_eq!(credit_limit(-50.0, label), 0.0);
        }
    }

    #[test]
    fn credit_limit_inverts_reference_emi() {
        let medium = credit_limit(1_000.0, RiskLabel::Medium);
        assert!((medium - 21_243.39).abs() < 0.5, "got {medium}");
        assert!((credit_limit(1_000.0, RiskLabel::Low) - medium * 1.2).abs() < 1e-6);
        assert!((credit_limit(1_000.0, RiskLabel::High) - medium * 0.5).abs() < 1e-6);
        // Round trip: the limit's own EMI at the reference terms is the safe payment.
        assert_eq!(installment(medium, 24, 12.0), 1_000.0);
    }

    #[test]
    fn affordability_ratio_is_infinite_without_capacity() {
        assert!(affordability_ratio(1_000.0, 0.0).is_infinite());
        assert_eq!(
            affordability_status(affordability_ratio(1_000.0, 0.0) * 100.0),
            AffordabilityStatus::NotRecommended
        );
    }

    #[test]
    fn affordability_bands_are_inclusive_upper_bounds() {
        assert_eq!(affordability_status(70.0), AffordabilityStatus::Comfortable);
        assert_eq!(affordability_status(70.01), AffordabilityStatus::Tight);
        assert_eq!(affordability_status(100.0), AffordabilityStatus::Tight);
        assert_eq!(affordability_status(130.0), AffordabilityStatus::Stretching);
        assert_eq!(affordability_status(130.5), AffordabilityStatus::NotRecommended);
    }

    #[test]
    fn affordability_status_never_improves_as_emi_grows() {
        let rank = |status: AffordabilityStatus| match status {
            AffordabilityStatus::Comfortable => 0,
            AffordabilityStatus::Tight => 1,
            AffordabilityStatus::Stretching => 2,
            AffordabilityStatus::NotRecommended => 3,
        };
        let safe = 15_000.0;
        let mut previous = 0;
        for step in 0..=400 {
            let emi = f64::from(step) * 100.0;
            let current = rank(affordability_status(affordability_ratio(emi, safe) * 100.0));
            assert!(current >= previous, "status regressed at emi {emi}");
            previous = current;
        }
    }

    #[test]
    fn runway_change_covers_every_transition() {
        assert_eq!(runway_change(None, None), 0.0);
        assert_eq!(runway_change(None, Some(40.0)), -40.0);
        assert_eq!(runway_change(Some(6.0), None), 6.0);
        assert_eq!(runway_change(Some(6.0), Some(9.5)), 3.5);
    }

    #[test]
    fn projected_ratios_fall_back_when_denominators_vanish() {
        assert_eq!(projected_debt_to_income(5_000.0, 0.0), 100.0);
        assert!((projected_debt_to_income(5_000.0, 50_000.0) - 10.0).abs() < 1e-9);
        assert_eq!(projected_buffer_safety(&snapshot(100.0, 0.0, 0.0), 0.0, 0.0), 12.0);
    }

    #[test]
    fn profitable_business_without_new_burn_keeps_infinite_runway() {
        let result = assess(&snapshot(1_000_000.0, 200_000.0, 150_000.0), &loan(0.0, 24, 12.0));
        assert_eq!(result.projected_installment, 0.0);
        assert_eq!(result.new_runway_months, None);
        assert_eq!(result.runway_change_months, 0.0);
    }

    #[test]
    fn profitable_scenario_is_not_recommended() {
        let result = assess(
            &snapshot(1_000_000.0, 200_000.0, 150_000.0),
            &loan(500_000.0, 24, 12.0),
        );

        assert_eq!(result.monthly_profit, 50_000.0);
        assert!(result.is_profitable);
        assert_eq!(result.current_runway_months, None);
        assert!((result.safe_monthly_payment - 15_000.0).abs() < 1e-6);
        assert_eq!(result.projected_installment, 23_537.0);
        assert!((result.affordability_ratio - 1.569).abs() < 0.001);
        assert_eq!(result.affordability_status, AffordabilityStatus::NotRecommended);
        assert!(!result.recommendation.positive);
        assert!(result.recommendation.text.starts_with("Not recommended"));

        assert_eq!(result.current_risk_tier.label, RiskLabel::Low);
        assert!((result.credit_limit - 15_000.0 * 21.243_39 * 1.2).abs() < 10.0);

        let new_runway = result.new_runway_months.unwrap();
        assert!((new_runway - 1_500_000.0 / 23_537.0).abs() < 1e-9);
        assert!((result.runway_change_months + new_runway).abs() < 1e-9);
        assert_eq!(result.new_risk_tier.label, RiskLabel::Low);
        assert!(!result.risk_increased);
    }

    #[test]
    fn burning_scenario_extends_runway_with_proceeds() {
        let result = assess(
            &snapshot(300_000.0, 100_000.0, 160_000.0),
            &loan(500_000.0, 24, 12.0),
        );

        assert_eq!(result.current_runway_months, Some(5.0));
        assert_eq!(result.safe_payment_basis, SafePaymentBasis::RevenueShare);
        assert_eq!(result.current_risk_tier.label, RiskLabel::Medium);
        let new_runway = result.new_runway_months.unwrap();
        assert!((new_runway - 800_000.0 / 83_537.0).abs() < 1e-9);
        assert!((result.runway_change_months - (new_runway - 5.0)).abs() < 1e-9);
        assert!((result.new_debt_to_income_percent - 23.537).abs() < 1e-9);
        assert_eq!(result.new_risk_tier.label, RiskLabel::Medium);
    }

    #[test]
    fn jump_to_high_tier_forces_negative_recommendation() {
        let medium = risk::tier(RiskLabel::Medium);
        let high = risk::tier(RiskLabel::High);

        let warned = recommend(40.0, medium, high);
        assert!(!warned.positive);
        assert!(warned.text.starts_with("Comfortably affordable."));
        assert!(warned.text.ends_with("This loan would move you to High risk tier."));

        let already_high = recommend(40.0, high, high);
        assert!(already_high.positive);
        assert_eq!(already_high.text, COMFORTABLE_TEXT);
    }

    #[test]
    fn revenue_free_business_is_pushed_to_high_risk() {
        let result = assess(&snapshot(2_000_000.0, 0.0, 0.0), &loan(200_000.0, 12, 10.0));
        assert_eq!(result.safe_monthly_payment, 0.0);
        assert_eq!(result.credit_limit, 0.0);
        assert!(result.affordability_ratio.is_infinite());
        assert_eq!(result.new_debt_to_income_percent, 100.0);
        assert_eq!(result.current_risk_tier.label, RiskLabel::Low);
        assert_eq!(result.new_risk_tier.label, RiskLabel::High);
        assert!(result.risk_increased);
        assert!(result.recommendation.text.ends_with("High risk tier."));
    }

    #[test]
    fn infinite_ratio_serializes_as_null() {
        let result = assess(&snapshot(2_000_000.0, 0.0, 0.0), &loan(200_000.0, 12, 10.0));
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["affordability_ratio"].is_null());
        assert!(json["affordability_percent"].is_null());
        assert_eq!(json["affordability_status"], "Not Recommended");
        assert_eq!(json["current_runway_months"], serde_json::Value::Null);
    }

    #[test]
    fn assessment_is_deterministic() {
        let snap = snapshot(750_000.0, 120_000.0, 135_000.0);
        let scenario = loan(1_250_000.0, 36, 14.5);
        assert_eq!(assess(&snap, &scenario), assess(&snap, &scenario));
    }
}
