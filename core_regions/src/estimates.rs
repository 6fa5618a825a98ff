use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Numeric estimates attached to a single area.
///
/// Ingestion adapters fill the `forecast_*` and `confirmed_*` fields; the
/// reconciliation passes own `active_estimate` and `imputed_confirmed_active`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Estimates {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_estimate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast_mean: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast_var: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_active: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_deaths: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_recovered: Option<f64>,
    /// Confirmed-case weight imputed from sibling ratios during redistribution,
    /// only for areas with no recorded `confirmed_active`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imputed_confirmed_active: Option<f64>,
}

impl Estimates {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::ActiveEstimate => self.active_estimate,
            Metric::ForecastMean => self.forecast_mean,
            Metric::ForecastVar => self.forecast_var,
            Metric::ConfirmedActive => self.confirmed_active,
            Metric::ConfirmedTotal => self.confirmed_total,
            Metric::ConfirmedDeaths => self.confirmed_deaths,
            Metric::ConfirmedRecovered => self.confirmed_recovered,
            Metric::ImputedConfirmedActive => self.imputed_confirmed_active,
        }
    }

    pub fn set(&mut self, metric: Metric, value: Option<f64>) {
        let slot = match metric {
            Metric::ActiveEstimate => &mut self.active_estimate,
            Metric::ForecastMean => &mut self.forecast_mean,
            Metric::ForecastVar => &mut self.forecast_var,
            Metric::ConfirmedActive => &mut self.confirmed_active,
            Metric::ConfirmedTotal => &mut self.confirmed_total,
            Metric::ConfirmedDeaths => &mut self.confirmed_deaths,
            Metric::ConfirmedRecovered => &mut self.confirmed_recovered,
            Metric::ImputedConfirmedActive => &mut self.imputed_confirmed_active,
        };
        *slot = value;
    }

    /// Recorded confirmed-active count, or the imputed weight when none was recorded.
    pub fn confirmed_active_or_imputed(&self) -> Option<f64> {
        self.confirmed_active.or(self.imputed_confirmed_active)
    }
}

/// Selector for one [`Estimates`] field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    ActiveEstimate,
    ForecastMean,
    ForecastVar,
    ConfirmedActive,
    ConfirmedTotal,
    ConfirmedDeaths,
    ConfirmedRecovered,
    ImputedConfirmedActive,
}

impl Metric {
    pub const ALL: [Metric; 8] = [
        Metric::ActiveEstimate,
        Metric::ForecastMean,
        Metric::ForecastVar,
        Metric::ConfirmedActive,
        Metric::ConfirmedTotal,
        Metric::ConfirmedDeaths,
        Metric::ConfirmedRecovered,
        Metric::ImputedConfirmedActive,
    ];

    /// Raw case-tracker counts, each aggregated independently.
    pub const CONFIRMED: [Metric; 4] = [
        Metric::ConfirmedActive,
        Metric::ConfirmedTotal,
        Metric::ConfirmedDeaths,
        Metric::ConfirmedRecovered,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Metric::ActiveEstimate => "active_estimate",
            Metric::ForecastMean => "forecast_mean",
            Metric::ForecastVar => "forecast_var",
            Metric::ConfirmedActive => "confirmed_active",
            Metric::ConfirmedTotal => "confirmed_total",
            Metric::ConfirmedDeaths => "confirmed_deaths",
            Metric::ConfirmedRecovered => "confirmed_recovered",
            Metric::ImputedConfirmedActive => "imputed_confirmed_active",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .iter()
            .copied()
            .find(|metric| metric.as_str() == s)
            .ok_or(())
    }
}
