//! Region-hierarchy estimation engine.
//!
//! Holds the area hierarchy and reconciles per-area forecasts and confirmed
//! case counts into one consistent active-case estimate per area, suitable
//! for seeding an epidemic simulation. Callers load the tree and attach the
//! raw estimates; this crate only fills populations and reconciles numbers.
//!
//! A run is [`reconcile_populations`], then attaching estimates, then
//! [`reconcile_active_cases`].

mod active_cases;
mod aggregate;
mod area;
pub mod coverage;
pub mod diagnostics;
mod estimates;
pub mod fill;
mod population;
pub mod reconcile_config;
mod tree;

pub use active_cases::{ActiveCaseReconciler, ActiveCaseReport};
pub use aggregate::{AggregateOptions, EstimateAggregator, MetricFloor};
pub use area::{normalize_name, Area, AreaId, AreaKind, AreaKinds};
pub use coverage::{check_missing_estimates, check_missing_leaf_estimates};
pub use diagnostics::{Diagnostic, DiagnosticSink, Diagnostics, TracingSink};
pub use estimates::{Estimates, Metric};
pub use fill::fill_downward_by_population;
pub use population::{PopulationReconciler, PopulationReport};
pub use reconcile_config::{
    load_reconcile_config_from_env, ReconcileConfig, ReconcileConfigError, ReconcileConfigMetadata,
};
pub use tree::{AreaTree, NameMatch, TreeError};

/// Validate the hierarchy, then fill and floor populations.
///
/// Only a malformed tree fails; data problems go to `sink`.
pub fn reconcile_populations(
    tree: &mut AreaTree,
    config: &ReconcileConfig,
    sink: &mut dyn DiagnosticSink,
) -> Result<PopulationReport, TreeError> {
    tree.validate()?;
    Ok(PopulationReconciler::new(config.population()).run(tree, sink))
}

/// Validate the hierarchy, then produce `active_estimate` for every area that
/// has any information at or below it.
pub fn reconcile_active_cases(
    tree: &mut AreaTree,
    config: &ReconcileConfig,
    sink: &mut dyn DiagnosticSink,
) -> Result<ActiveCaseReport, TreeError> {
    tree.validate()?;
    Ok(ActiveCaseReconciler::new(config.active_cases()).run(tree, sink))
}
