use std::fmt::Write;

use crate::models::{AssessmentResult, CachedMetrics, FinancialSnapshot, LoanScenario};

const CRORE: f64 = 10_000_000.0;
const LAKH: f64 = 100_000.0;

/// Compact rupee amount: crores and lakhs above those scales, whole rupees below.
pub fn format_inr(value: f64) -> String {
    if value >= CRORE {
        format!("₹{:.2} Cr", value / CRORE)
    } else if value >= LAKH {
        format!("₹{:.1} L", value / LAKH)
    } else {
        format_inr_full(value)
    }
}

/// Whole rupees with Indian digit grouping, e.g. `₹12,34,567`.
pub fn format_inr_full(value: f64) -> String {
    if value.is_nan() {
        return "n/a".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "∞" } else { "-∞" }.to_string();
    }
    let rounded = value.round();
    let sign = if rounded < 0.0 { "-" } else { "" };
    let digits = format!("{:.0}", rounded.abs());

    let grouped = if digits.len() <= 3 {
        digits
    } else {
        let (head, tail) = digits.split_at(digits.len() - 3);
        let mut groups: Vec<&str> = Vec::new();
        let mut end = head.len();
        while end > 0 {
            let start = end.saturating_sub(2);
            groups.push(&head[start..end]);
            end = start;
        }
        groups.reverse();
        format!("{},{}", groups.join(","), tail)
    };

    format!("{sign}₹{grouped}")
}

pub fn format_runway(months: Option<f64>) -> String {
    match months {
        None => "Profitable".to_string(),
        Some(months) => format!("{months:.1} Mo"),
    }
}

pub fn format_runway_change(months: f64) -> String {
    if months == 0.0 {
        "No Change".to_string()
    } else {
        format!("{months:+.1} Mo")
    }
}

pub fn format_ratio_percent(percent: f64) -> String {
    if percent.is_finite() {
        format!("{percent:.0}%")
    } else {
        "n/a (no safe capacity)".to_string()
    }
}

/// Extra context from the metrics store that the engine does not consume.
fn write_store_context(output: &mut String, metrics: &CachedMetrics) {
    let data = &metrics.metric_data;

    if let Some(health) = &data.financial_health {
        if let Some(status) = &health.runway_status {
            let _ = writeln!(
                output,
                "- Runway status: {status} (store estimate {})",
                format_runway(health.runway_months)
            );
        }
    }
    if let Some(averages) = &data.monthly_averages {
        if let Some(net_burn) = averages.net_burn_raw {
            let _ = writeln!(output, "- Net burn: {}/mo", format_inr_full(net_burn));
        }
        if let Some(profitable) = averages.is_profitable {
            let _ = writeln!(
                output,
                "- Store marks business as {}",
                if profitable { "profitable" } else { "burning cash" }
            );
        }
    }
    if let Some(growth) = &data.growth {
        let trend = growth.trend.as_deref().unwrap_or("unknown");
        match growth.revenue_growth_raw {
            Some(rate) => {
                let _ = writeln!(output, "- Growth: {trend} ({rate:+.1}% revenue)");
            }
            None => {
                let _ = writeln!(output, "- Growth: {trend}");
            }
        }
    }
    if let Some(volatility) = &data.volatility {
        let stability = volatility.stability.as_deref().unwrap_or("unknown");
        match volatility.cash_flow_std_dev {
            Some(std_dev) => {
                let _ = writeln!(
                    output,
                    "- Cash flow: {stability} (std dev {})",
                    format_inr_full(std_dev)
                );
            }
            None => {
                let _ = writeln!(output, "- Cash flow: {stability}");
            }
        }
    }
    if let Some(months) = metrics
        .forecast_data
        .as_ref()
        .and_then(|forecast| forecast.predicted_runway_months)
    {
        let _ = writeln!(output, "- Forecast runway: {}", format_runway(Some(months)));
    }
}

pub fn build_report(
    business: &str,
    metrics: Option<&CachedMetrics>,
    snapshot: &FinancialSnapshot,
    loan: &LoanScenario,
    result: &AssessmentResult,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Credit Assessment");
    let _ = writeln!(output, "Advisory report for {business}. Not a loan application.");
    let _ = writeln!(output);

    let _ = writeln!(output, "## Financial Context");
    let _ = writeln!(output, "- Balance: {}", format_inr(snapshot.total_balance));
    let _ = writeln!(output, "- Revenue: {}/mo", format_inr(snapshot.monthly_revenue));
    let _ = writeln!(output, "- Expenses: {}/mo", format_inr(snapshot.monthly_expenses));
    let _ = writeln!(output, "- Runway: {}", format_runway(result.current_runway_months));
    if let Some(metrics) = metrics {
        write_store_context(&mut output, metrics);
    }
    let _ = writeln!(output);

    let _ = writeln!(output, "## Credit Profile");
    let _ = writeln!(
        output,
        "- Credit limit: {} (max recommended borrowing)",
        format_inr(result.credit_limit)
    );
    let _ = writeln!(
        output,
        "- Safe EMI: {}/mo ({})",
        format_inr(result.safe_monthly_payment),
        result.safe_payment_basis.describe()
    );
    let _ = writeln!(
        output,
        "- Risk tier: {} ({}%)",
        result.current_risk_tier.label, result.current_risk_tier.severity_percent
    );
    let _ = writeln!(
        output,
        "- Stress margin: {:.1}% revenue drop tolerance",
        result.stress_margin_percent
    );
    let _ = writeln!(output, "- Buffer safety: {:.1} months", result.buffer_safety_months);
    let _ = writeln!(
        output,
        "- Forecast confidence: {:.0}%",
        result.confidence_weight_percent
    );
    let _ = writeln!(output);

    let _ = writeln!(output, "## Loan Simulation");
    let _ = writeln!(output, "- Amount: {}", format_inr_full(loan.principal));
    let _ = writeln!(output, "- Tenure: {} months", loan.tenure_months);
    let _ = writeln!(output, "- Interest rate: {:.1}% p.a.", loan.annual_rate_percent);
    let _ = writeln!(
        output,
        "- Monthly EMI: {}",
        format_inr_full(result.projected_installment)
    );
    let _ = writeln!(
        output,
        "- Affordability: {} of safe EMI ({})",
        format_ratio_percent(result.affordability_percent),
        result.affordability_status
    );
    let _ = writeln!(output);

    let _ = writeln!(output, "## Impact");
    let _ = writeln!(
        output,
        "- Runway: {} -> {} ({})",
        format_runway(result.current_runway_months),
        format_runway(result.new_runway_months),
        format_runway_change(result.runway_change_months)
    );
    let _ = writeln!(
        output,
        "- Risk tier: {} -> {}{}",
        result.current_risk_tier.label,
        result.new_risk_tier.label,
        if result.risk_increased { " (increased)" } else { "" }
    );
    let _ = writeln!(
        output,
        "- Debt-to-income: {:.1}% -> {:.1}%",
        result.current_debt_to_income_percent, result.new_debt_to_income_percent
    );
    let _ = writeln!(
        output,
        "- Buffer safety: {:.1} -> {:.1} months",
        result.buffer_safety_months, result.new_buffer_safety_months
    );
    let _ = writeln!(output);

    let _ = writeln!(output, "## Recommendation");
    let verdict = if result.recommendation.positive {
        "Go"
    } else {
        "Caution"
    };
    let _ = writeln!(output, "**{verdict}**: {}", result.recommendation.text);

    output
}
