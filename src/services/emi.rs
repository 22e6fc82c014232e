use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::errors::AppError;

pub const TENURES: [u32; 4] = [3, 6, 9, 12];

#[derive(Debug, Clone, PartialEq)]
pub struct EmiProvider {
    pub name: String,
    /// Annual interest rate in percent.
    pub annual_rate: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmiPlan {
    pub provider: String,
    pub tenure: u32,
    pub interest_rate: f64,
    pub emi: i64,
    pub total_amount: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmiQuote {
    pub lowest_emi: i64,
    pub lowest_plan: EmiPlan,
    pub plans: Vec<EmiPlan>,
}

/// Amortized monthly installment for `principal` over `months`.
pub fn monthly_installment(principal: f64, annual_rate: f64, months: u32) -> f64 {
    let r = annual_rate / 12.0 / 100.0;
    if r == 0.0 {
        return principal / f64::from(months);
    }
    let growth = (1.0 + r).powi(months as i32);
    principal * r * growth / (growth - 1.0)
}

pub fn quote(amount: Decimal, providers: &[EmiProvider]) -> Result<EmiQuote, AppError> {
    if amount <= Decimal::ZERO {
        return Err(AppError::Validation("amount must be positive".to_string()));
    }
    let principal = amount
        .to_f64()
        .ok_or_else(|| AppError::Validation("amount out of range".to_string()))?;

    let plans: Vec<EmiPlan> = providers
        .iter()
        .flat_map(|provider| {
            TENURES.iter().map(move |&tenure| {
                let emi = monthly_installment(principal, provider.annual_rate, tenure);
                EmiPlan {
                    provider: provider.name.clone(),
                    tenure,
                    interest_rate: provider.annual_rate,
                    emi: emi.round() as i64,
                    total_amount: (emi * f64::from(tenure)).round() as i64,
                }
            })
        })
        .collect();

    let lowest_plan = plans
        .iter()
        .min_by_key(|plan| plan.emi)
        .cloned()
        .ok_or_else(|| AppError::Validation("no EMI providers configured".to_string()))?;

    Ok(EmiQuote {
        lowest_emi: lowest_plan.emi,
        lowest_plan,
        plans,
    })
}
