//! # Inventory Demand Forecast
//!
//! Predicts when a perfume will run out from its recent sales.
//!
//! ```text
//! units sold over lookback ──► avg/day ──► days of cover = stock / avg
//!                                  │
//!                                  └──► reorder = avg × (lead + safety) - stock
//! ```
//!
//! Integer math throughout: the average is kept in hundredths of a unit.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::validation::ValidationResult;
use crate::ValidationError;

/// Forecast parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ForecastParams {
    /// Days of sales history to average over.
    pub lookback_days: i64,
    /// Days between placing and receiving a restock.
    pub lead_time_days: i64,
    /// Extra days of stock to keep on hand.
    pub safety_days: i64,
}

impl Default for ForecastParams {
    fn default() -> Self {
        ForecastParams {
            lookback_days: 30,
            lead_time_days: 14,
            safety_days: 7,
        }
    }
}

impl ForecastParams {
    pub fn validate(&self) -> ValidationResult<()> {
        if !(1..=365).contains(&self.lookback_days) {
            return Err(ValidationError::OutOfRange {
                field: "lookbackDays".to_string(),
                min: 1,
                max: 365,
            });
        }
        for (field, value) in [("leadTimeDays", self.lead_time_days), ("safetyDays", self.safety_days)] {
            if !(0..=180).contains(&value) {
                return Err(ValidationError::OutOfRange {
                    field: field.to_string(),
                    min: 0,
                    max: 180,
                });
            }
        }
        Ok(())
    }
}

/// Forecast for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DemandForecast {
    pub product_id: String,
    pub sku: String,
    pub stock: i64,
    pub units_sold: i64,
    /// Average units sold per day, in hundredths (125 = 1.25/day).
    pub avg_daily_units_x100: i64,
    /// Whole days the current stock lasts; `None` when nothing sells.
    pub days_of_cover: Option<i64>,
    pub reorder_quantity: i64,
    /// Stock runs out before a restock ordered today would arrive.
    pub at_risk: bool,
}

/// Computes the forecast for a product that sold `units_sold` units over
/// the lookback window.
pub fn forecast_demand(
    product_id: &str,
    sku: &str,
    stock: i64,
    units_sold: i64,
    params: &ForecastParams,
) -> DemandForecast {
    let stock = stock.max(0);
    let units_sold = units_sold.max(0);
    let lookback = params.lookback_days.max(1);

    let avg_x100 = (units_sold * 100 + lookback / 2) / lookback;

    let days_of_cover = if units_sold == 0 {
        None
    } else {
        Some(stock * lookback / units_sold)
    };

    // ceil(units_sold × horizon / lookback) units needed to cover the horizon
    let horizon = params.lead_time_days + params.safety_days;
    let needed = (units_sold * horizon + lookback - 1) / lookback;
    let reorder_quantity = (needed - stock).max(0);

    let at_risk = matches!(days_of_cover, Some(days) if days < params.lead_time_days);

    DemandForecast {
        product_id: product_id.to_string(),
        sku: sku.to_string(),
        stock,
        units_sold,
        avg_daily_units_x100: avg_x100,
        days_of_cover,
        reorder_quantity,
        at_risk,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steady_seller() {
        // 60 units over 30 days = 2/day; 20 in stock lasts 10 days.
        let f = forecast_demand("p", "NOIR-50", 20, 60, &ForecastParams::default());

        assert_eq!(f.avg_daily_units_x100, 200);
        assert_eq!(f.days_of_cover, Some(10));
        // 2/day × 21 days = 42 needed, 20 on hand
        assert_eq!(f.reorder_quantity, 22);
        assert!(f.at_risk);
    }

    #[test]
    fn test_no_sales() {
        let f = forecast_demand("p", "ROSE-30", 5, 0, &ForecastParams::default());
        assert_eq!(f.days_of_cover, None);
        assert_eq!(f.reorder_quantity, 0);
        assert!(!f.at_risk);
    }

    #[test]
    fn test_well_stocked() {
        let f = forecast_demand("p", "CEDAR-100", 500, 30, &ForecastParams::default());
        assert_eq!(f.days_of_cover, Some(500));
        assert_eq!(f.reorder_quantity, 0);
    }

    #[test]
    fn test_params_validation() {
        assert!(ForecastParams::default().validate().is_ok());
        let bad = ForecastParams {
            lookback_days: 0,
            ..ForecastParams::default()
        };
        assert!(bad.validate().is_err());
    }
}
