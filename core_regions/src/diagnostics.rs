//! Data-quality reporting for the reconciliation passes.
//!
//! None of these conditions stop a pass; each one is reported to the sink the
//! caller threads through, and the pass continues with its fallback value.

use std::fmt;

use crate::estimates::Metric;

pub const LOG_TARGET: &str = "epi_regions::reconcile";

#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// Children's populations add up to more than the tolerated share of the parent.
    PopulationInconsistency {
        area: String,
        population: u64,
        children_total: u64,
    },
    /// Children's own forecasts exceed the parent estimate; the remainder was clipped to 0.
    NegativeRemainder {
        area: String,
        estimate: f64,
        children_forecast: f64,
        remainder: f64,
    },
    /// The confirmed-case weights of the children without a forecast summed to
    /// zero; the remainder was split by population instead.
    EmptyPool {
        area: String,
        remainder: f64,
        recipients: usize,
    },
    /// No child without a forecast had both a confirmed count and a
    /// population, so their weights were imputed from the default ratio.
    DefaultRatioFallback {
        area: String,
        default_ratio: f64,
        recipients: usize,
    },
    /// An area of an audited kind ended up without a value for the metric.
    MissingEstimate {
        area: String,
        metric: Metric,
        population: Option<u64>,
    },
}

impl Diagnostic {
    pub fn area(&self) -> &str {
        match self {
            Diagnostic::PopulationInconsistency { area, .. }
            | Diagnostic::NegativeRemainder { area, .. }
            | Diagnostic::EmptyPool { area, .. }
            | Diagnostic::DefaultRatioFallback { area, .. }
            | Diagnostic::MissingEstimate { area, .. } => area,
        }
    }

    fn emit(&self) {
        match self {
            Diagnostic::PopulationInconsistency {
                area,
                population,
                children_total,
            } => tracing::warn!(
                target: LOG_TARGET,
                area = %area,
                population,
                children_total,
                "population.inconsistent"
            ),
            Diagnostic::NegativeRemainder {
                area,
                estimate,
                children_forecast,
                remainder,
            } => tracing::warn!(
                target: LOG_TARGET,
                area = %area,
                estimate,
                children_forecast,
                remainder,
                "active.remainder_clipped"
            ),
            Diagnostic::EmptyPool {
                area,
                remainder,
                recipients,
            } => tracing::warn!(
                target: LOG_TARGET,
                area = %area,
                remainder,
                recipients,
                "active.pool_empty=population_split"
            ),
            Diagnostic::DefaultRatioFallback {
                area,
                default_ratio,
                recipients,
            } => tracing::warn!(
                target: LOG_TARGET,
                area = %area,
                default_ratio,
                recipients,
                "active.ratio_fallback=default"
            ),
            Diagnostic::MissingEstimate {
                area,
                metric,
                population,
            } => tracing::debug!(
                target: LOG_TARGET,
                area = %area,
                metric = %metric,
                population = ?population,
                "estimate.missing"
            ),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::PopulationInconsistency {
                area,
                population,
                children_total,
            } => write!(
                f,
                "population inconsistency at {area}: {population} vs {children_total} total in children"
            ),
            Diagnostic::NegativeRemainder {
                area,
                estimate,
                children_forecast,
                remainder,
            } => write!(
                f,
                "{area}: remainder {remainder} (estimate {estimate}, children forecasts {children_forecast}) clipped to 0"
            ),
            Diagnostic::EmptyPool {
                area,
                remainder,
                recipients,
            } => write!(
                f,
                "{area}: empty confirmed-case pool, {remainder} split by population over {recipients} children"
            ),
            Diagnostic::DefaultRatioFallback {
                area,
                default_ratio,
                recipients,
            } => write!(
                f,
                "{area}: no sibling confirmed ratio, default {default_ratio} used for {recipients} children"
            ),
            Diagnostic::MissingEstimate {
                area,
                metric,
                population,
            } => match population {
                Some(pop) => write!(f, "{area}: no {metric} (population {pop})"),
                None => write!(f, "{area}: no {metric}"),
            },
        }
    }
}

/// Receiver for data-quality anomalies raised by the passes.
pub trait DiagnosticSink {
    fn record(&mut self, diagnostic: Diagnostic);
}

/// Sink that only logs through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&mut self, diagnostic: Diagnostic) {
        diagnostic.emit();
    }
}

/// Sink that logs and keeps every diagnostic for later inspection.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn for_area<'a>(&'a self, area: &'a str) -> impl Iterator<Item = &'a Diagnostic> + 'a {
        self.entries.iter().filter(move |entry| entry.area() == area)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl DiagnosticSink for Diagnostics {
    fn record(&mut self, diagnostic: Diagnostic) {
        diagnostic.emit();
        self.entries.push(diagnostic);
    }
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &mut S {
    fn record(&mut self, diagnostic: Diagnostic) {
        (**self).record(diagnostic);
    }
}
