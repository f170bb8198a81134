use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::credit::{BUFFER_FALLBACK_MONTHS, DEFAULT_FORECAST_CONFIDENCE};

/// Latest financial state of a business, as read from the metrics store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinancialSnapshot {
    pub total_balance: f64,
    pub monthly_revenue: f64,
    pub monthly_expenses: f64,
    pub forecast_confidence: f64,
}

impl Default for FinancialSnapshot {
    fn default() -> Self {
        Self {
            total_balance: 0.0,
            monthly_revenue: 0.0,
            monthly_expenses: 0.0,
            forecast_confidence: DEFAULT_FORECAST_CONFIDENCE,
        }
    }
}

impl FinancialSnapshot {
    pub fn monthly_profit(&self) -> f64 {
        self.monthly_revenue - self.monthly_expenses
    }

    pub fn is_profitable(&self) -> bool {
        self.monthly_profit() >= 0.0
    }

    /// Months of cash left at the current burn. `None` means the business is
    /// not burning (profitable, or a burn of exactly zero).
    pub fn current_runway_months(&self) -> Option<f64> {
        if self.is_profitable() {
            return None;
        }
        let burn = self.monthly_profit().abs();
        if burn > 0.0 {
            Some(self.total_balance / burn)
        } else {
            None
        }
    }

    pub fn buffer_safety_months(&self) -> f64 {
        if self.monthly_expenses > 0.0 {
            self.total_balance / self.monthly_expenses
        } else {
            BUFFER_FALLBACK_MONTHS
        }
    }

    /// Share of revenue that could disappear before the business stops breaking even.
    pub fn stress_margin_percent(&self) -> f64 {
        if self.monthly_revenue <= 0.0 {
            return 0.0;
        }
        (self.monthly_profit() / self.monthly_revenue * 100.0).max(0.0)
    }

    pub fn confidence_weight_percent(&self) -> f64 {
        self.forecast_confidence * 100.0
    }
}

/// Hypothetical loan the user is exploring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoanScenario {
    pub principal: f64,
    pub tenure_months: u32,
    pub annual_rate_percent: f64,
}

impl LoanScenario {
    pub const PRINCIPAL_MIN: f64 = 100_000.0;
    pub const PRINCIPAL_MAX: f64 = 5_000_000.0;
    pub const PRINCIPAL_STEP: f64 = 50_000.0;
    pub const TENURE_MIN: u32 = 6;
    pub const TENURE_MAX: u32 = 60;
    pub const TENURE_STEP: u32 = 6;
    pub const RATE_MIN: f64 = 8.0;
    pub const RATE_MAX: f64 = 24.0;
    pub const RATE_STEP: f64 = 0.5;

    /// Snaps every parameter onto the simulator's slider grid.
    pub fn clamped(&self) -> Self {
        Self {
            principal: snap(
                self.principal,
                Self::PRINCIPAL_MIN,
                Self::PRINCIPAL_MAX,
                Self::PRINCIPAL_STEP,
            ),
            tenure_months: snap(
                f64::from(self.tenure_months),
                f64::from(Self::TENURE_MIN),
                f64::from(Self::TENURE_MAX),
                f64::from(Self::TENURE_STEP),
            ) as u32,
            annual_rate_percent: snap(
                self.annual_rate_percent,
                Self::RATE_MIN,
                Self::RATE_MAX,
                Self::RATE_STEP,
            ),
        }
    }
}

impl Default for LoanScenario {
    fn default() -> Self {
        Self {
            principal: 500_000.0,
            tenure_months: 24,
            annual_rate_percent: 12.0,
        }
    }
}

fn snap(value: f64, min: f64, max: f64, step: f64) -> f64 {
    let stepped = min + ((value - min) / step).round() * step;
    stepped.clamp(min, max)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLabel {
    Low,
    Medium,
    High,
}

impl RiskLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLabel::Low => "Low",
            RiskLabel::Medium => "Medium",
            RiskLabel::High => "High",
        }
    }
}

impl fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskTier {
    pub label: RiskLabel,
    /// Display weight for gauges.
    pub severity_percent: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AffordabilityStatus {
    Comfortable,
    Tight,
    Stretching,
    #[serde(rename = "Not Recommended")]
    NotRecommended,
}

impl AffordabilityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AffordabilityStatus::Comfortable => "Comfortable",
            AffordabilityStatus::Tight => "Tight",
            AffordabilityStatus::Stretching => "Stretching",
            AffordabilityStatus::NotRecommended => "Not Recommended",
        }
    }
}

impl fmt::Display for AffordabilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which rule produced the safe monthly payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SafePaymentBasis {
    ProfitShare,
    RevenueShare,
}

impl SafePaymentBasis {
    pub fn describe(&self) -> &'static str {
        match self {
            SafePaymentBasis::ProfitShare => "30% of profit",
            SafePaymentBasis::RevenueShare => "5% of revenue",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub text: String,
    pub positive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssessmentResult {
    pub monthly_profit: f64,
    pub is_profitable: bool,
    pub current_runway_months: Option<f64>,
    pub buffer_safety_months: f64,
    pub stress_margin_percent: f64,
    pub confidence_weight_percent: f64,
    pub safe_monthly_payment: f64,
    pub safe_payment_basis: SafePaymentBasis,
    pub current_debt_to_income_percent: f64,
    pub current_risk_tier: RiskTier,
    pub credit_limit: f64,
    pub projected_installment: f64,
    /// `f64::INFINITY` when there is no safe capacity; serialized as `null`.
    pub affordability_ratio: f64,
    pub affordability_percent: f64,
    pub affordability_status: AffordabilityStatus,
    pub new_runway_months: Option<f64>,
    pub runway_change_months: f64,
    pub new_debt_to_income_percent: f64,
    pub new_buffer_safety_months: f64,
    pub new_risk_tier: RiskTier,
    pub risk_increased: bool,
    pub recommendation: Recommendation,
}

/// Row of the metrics cache: the analytics payload plus the forecast payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CachedMetrics {
    #[serde(default)]
    pub metric_data: MetricData,
    #[serde(default)]
    pub forecast_data: Option<ForecastData>,
}

impl CachedMetrics {
    pub fn to_snapshot(&self) -> FinancialSnapshot {
        let health = self.metric_data.financial_health.as_ref();
        let averages = self.metric_data.monthly_averages.as_ref();

        FinancialSnapshot {
            total_balance: health.and_then(|h| h.total_balance_raw).unwrap_or(0.0),
            monthly_revenue: averages.and_then(|a| a.revenue_raw).unwrap_or(0.0),
            monthly_expenses: averages.and_then(|a| a.gross_expenses_raw).unwrap_or(0.0),
            forecast_confidence: self
                .forecast_data
                .as_ref()
                .and_then(|f| f.confidence_raw)
                .unwrap_or(DEFAULT_FORECAST_CONFIDENCE),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricData {
    pub financial_health: Option<FinancialHealth>,
    pub monthly_averages: Option<MonthlyAverages>,
    pub growth: Option<Growth>,
    pub volatility: Option<Volatility>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinancialHealth {
    pub total_balance_raw: Option<f64>,
    pub runway_months: Option<f64>,
    pub runway_status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonthlyAverages {
    pub revenue_raw: Option<f64>,
    /// Negative when profitable.
    pub net_burn_raw: Option<f64>,
    pub gross_expenses_raw: Option<f64>,
    pub is_profitable: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Growth {
    pub trend: Option<String>,
    pub revenue_growth_raw: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Volatility {
    pub stability: Option<String>,
    pub cash_flow_std_dev: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastData {
    pub confidence_raw: Option<f64>,
    pub predicted_runway_months: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    Credit,
    Debit,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Credit => "CREDIT",
            TransactionKind::Debit => "DEBIT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "CREDIT" => Some(TransactionKind::Credit),
            "DEBIT" => Some(TransactionKind::Debit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub txn_id: Option<String>,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub mode: Option<String>,
    pub narration: Option<String>,
    pub txn_date: Option<NaiveDate>,
    pub category: Option<String>,
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

    #[test]
    fn buffer_falls_back_without_expenses() {
        assert_eq!(snapshot(0.0, 0.0, 0.0).buffer_safety_months(), 12.0);
        assert_eq!(snapshot(5_000_000.0, 100.0, 0.0).buffer_safety_months(), 12.0);
        assert_eq!(snapshot(300.0, 0.0, 100.0).buffer_safety_months(), 3.0);
    }

    #[test]
    fn profitable_business_has_no_runway() {
        assert_eq!(snapshot(1_000.0, 200.0, 150.0).current_runway_months(), None);
        assert_eq!(snapshot(1_000.0, 150.0, 150.0).current_runway_months(), None);
    }

    #[test]
    fn burning_business_runway_uses_absolute_burn() {
        let runway = snapshot(1_000.0, 100.0, 300.0).current_runway_months();
        assert_eq!(runway, Some(5.0));
    }

    #[test]
    fn stress_margin_is_floored_at_zero() {
        assert_eq!(snapshot(0.0, 0.0, 10.0).stress_margin_percent(), 0.0);
        assert_eq!(snapshot(0.0, 100.0, 150.0).stress_margin_percent(), 0.0);
        assert!((snapshot(0.0, 200.0, 150.0).stress_margin_percent() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn cached_metrics_default_missing_fields() {
        let metrics: CachedMetrics = serde_json::from_value(serde_json::json!({
            "metric_data": {
                "financial_health": { "total_balance_raw": 1000000.0 },
                "monthly_averages": { "revenue_raw": 200000.0, "gross_expenses_raw": 150000.0 }
            }
        }))
        .unwrap();

        let snapshot = metrics.to_snapshot();
        assert_eq!(snapshot.total_balance, 1_000_000.0);
        assert_eq!(snapshot.monthly_revenue, 200_000.0);
        assert_eq!(snapshot.monthly_expenses, 150_000.0);
        assert_eq!(snapshot.forecast_confidence, 0.6);
    }

    #[test]
    fn clamped_loan_snaps_to_slider_grid() {
        let loan = LoanScenario {
            principal: 5_400_000.0,
            tenure_months: 14,
            annual_rate_percent: 12.3,
        }
        .clamped();
        assert_eq!(loan.principal, 5_000_000.0);
        assert_eq!(loan.tenure_months, 12);
        assert_eq!(loan.annual_rate_percent, 12.5);

        let low = LoanScenario {
            principal: 10.0,
            tenure_months: 1,
            annual_rate_percent: 0.0,
        }
        .clamped();
        assert_eq!(low.principal, 100_000.0);
        assert_eq!(low.tenure_months, 6);
        assert_eq!(low.annual_rate_percent, 8.0);
    }

    #[test]
    fn transaction_kind_parses_case_insensitively() {
        assert_eq!(TransactionKind::parse("credit"), Some(TransactionKind::Credit));
        assert_eq!(TransactionKind::parse(" DEBIT "), Some(TransactionKind::Debit));
        assert_eq!(TransactionKind::parse("refund"), None);
    }
}
