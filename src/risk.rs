use crate::models::{RiskLabel, RiskTier};

pub const HIGH_RUNWAY_BELOW_MONTHS: f64 = 3.0;
pub const HIGH_BUFFER_BELOW_MONTHS: f64 = 1.0;
pub const HIGH_DTI_ABOVE_PERCENT: f64 = 50.0;
pub const LOW_RUNWAY_ABOVE_MONTHS: f64 = 12.0;
pub const LOW_BUFFER_ABOVE_MONTHS: f64 = 6.0;
pub const LOW_DTI_BELOW_PERCENT: f64 = 20.0;

/// Classifies credit risk. `runway_months` is `None` for a business that is
/// not burning cash. Rules are checked in order and the first match wins, so
/// boundary values (runway 3, buffer 1, DTI 50) fall through to the Low check.
pub fn classify(runway_months: Option<f64>, buffer_safety_months: f64, dti_percent: f64) -> RiskTier {
    let runway_breached = runway_months.is_some_and(|months| months < HIGH_RUNWAY_BELOW_MONTHS);
    if runway_breached
        || buffer_safety_months < HIGH_BUFFER_BELOW_MONTHS
        || dti_percent > HIGH_DTI_ABOVE_PERCENT
    {
        return tier(RiskLabel::High);
    }

    let runway_ok = runway_months.map_or(true, |months| months > LOW_RUNWAY_ABOVE_MONTHS);
    if runway_ok
        && buffer_safety_months > LOW_BUFFER_ABOVE_MONTHS
        && dti_percent < LOW_DTI_BELOW_PERCENT
    {
        return tier(RiskLabel::Low);
    }

    tier(RiskLabel::Medium)
}

pub fn tier(label: RiskLabel) -> RiskTier {
    RiskTier {
        label,
        severity_percent: severity_percent(label),
    }
}

pub fn severity_percent(label: RiskLabel) -> u32 {
    match label {
        RiskLabel::High => 85,
        RiskLabel::Medium => 50,
        RiskLabel::Low => 20,
    }
}

/// Scales the base credit limit by how risky the business currently looks.
pub fn credit_multiplier(label: RiskLabel) -> f64 {
    match label {
        RiskLabel::Low => 1.2,
        RiskLabel::Medium => 1.0,
        RiskLabel::High => 0.5,
    }
}
