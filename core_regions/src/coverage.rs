use crate::area::{Area, AreaId, AreaKinds};
use crate::diagnostics::{Diagnostic, DiagnosticSink, LOG_TARGET};
use crate::estimates::Metric;
use crate::tree::AreaTree;

/// List the areas of `kinds` (cities when `None`) left without a value for
/// `metric`, reporting each one and logging a summary.
pub fn check_missing_estimates(
    tree: &AreaTree,
    metric: Metric,
    kinds: Option<AreaKinds>,
    sink: &mut dyn DiagnosticSink,
) -> Vec<AreaId> {
    let kinds = kinds.unwrap_or(AreaKinds::CITY);
    audit(tree, metric, sink, |area| kinds.matches(area.kind()))
}

/// Same audit over the leaves of the tree, whatever their kind.
pub fn check_missing_leaf_estimates(
    tree: &AreaTree,
    metric: Metric,
    sink: &mut dyn DiagnosticSink,
) -> Vec<AreaId> {
    audit(tree, metric, sink, Area::is_leaf)
}

fn audit(
    tree: &AreaTree,
    metric: Metric,
    sink: &mut dyn DiagnosticSink,
    selected: impl Fn(&Area) -> bool,
) -> Vec<AreaId> {
    let mut missing = Vec::new();
    let mut population = 0u64;
    for id in tree.pre_order() {
        let area = &tree[id];
        if !selected(area) || area.estimates.get(metric).is_some() {
            continue;
        }
        population = population.saturating_add(area.population.unwrap_or(0));
        sink.record(Diagnostic::MissingEstimate {
            area: area.key().to_string(),
            metric,
            population: area.population,
        });
        missing.push(id);
    }
    tracing::info!(
        target: LOG_TARGET,
        metric = %metric,
        missing = missing.len(),
        population_millions = population as f64 / 1e6,
        "coverage.missing_estimates"
    );
    missing
}
