use crate::diagnostics::{Diagnostic, DiagnosticSink, LOG_TARGET};
use crate::reconcile_config::PopulationConfig;
use crate::tree::AreaTree;

/// Counts of what the population passes changed, for the run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PopulationReport {
    pub imputed: usize,
    pub raised: usize,
    pub inconsistencies: usize,
}

/// Fills missing populations top-down, then floors them bottom-up.
#[derive(Debug, Clone, Copy)]
pub struct PopulationReconciler<'a> {
    config: &'a PopulationConfig,
}

impl<'a> PopulationReconciler<'a> {
    pub fn new(config: &'a PopulationConfig) -> Self {
        Self { config }
    }

    /// Both passes, top-down fill first.
    pub fn run(&self, tree: &mut AreaTree, sink: &mut dyn DiagnosticSink) -> PopulationReport {
        let mut report = self.heuristic_set_pops(tree, sink);
        report.raised = self.fix_min_pops(tree);
        tracing::info!(
            target: LOG_TARGET,
            imputed = report.imputed,
            raised = report.raised,
            inconsistencies = report.inconsistencies,
            "population.reconciled"
        );
        report
    }

    /// Top-down: give each child without a population an even share of what
    /// the parent has left, capped at the smallest known sibling. Unknown
    /// areas tend to be the small ones.
    pub fn heuristic_set_pops(
        &self,
        tree: &mut AreaTree,
        sink: &mut dyn DiagnosticSink,
    ) -> PopulationReport {
        let mut report = PopulationReport::default();
        for id in tree.pre_order() {
            let Some(population) = tree[id].population else {
                tracing::debug!(
                    target: LOG_TARGET,
                    area = %tree[id].key,
                    "population.fill_skipped=unknown_parent"
                );
                continue;
            };
            let children = tree.children(id).to_vec();
            if children.is_empty() {
                continue;
            }

            let known: Vec<u64> = children
                .iter()
                .filter_map(|&child| tree[child].population)
                .collect();
            let missing = children.len() - known.len();
            if missing > 0 {
                let remaining = population as f64 - known.iter().sum::<u64>() as f64;
                let even_share = remaining / missing as f64;
                let share = match known.iter().min() {
                    Some(&smallest) => even_share.min(smallest as f64),
                    None => even_share,
                }
                .max(0.0);
                let share = share.floor() as u64;
                for &child in &children {
                    let area = &mut tree[child];
                    if area.population.is_none() {
                        area.population = Some(share);
                        report.imputed += 1;
                        tracing::debug!(
                            target: LOG_TARGET,
                            area = %area.key,
                            population = share,
                            "population.imputed"
                        );
                    }
                }
            }

            let children_total: u64 = children
                .iter()
                .filter_map(|&child| tree[child].population)
                .sum();
            if children_total as f64 > population as f64 * self.config.inconsistency_tolerance() {
                report.inconsistencies += 1;
                sink.record(Diagnostic::PopulationInconsistency {
                    area: tree[id].key.clone(),
                    population,
                    children_total,
                });
            }
        }
        report
    }

    /// Bottom-up: every area is at least the sum of its children and at least
    /// the configured minimum. Returns how many areas were raised.
    pub fn fix_min_pops(&self, tree: &mut AreaTree) -> usize {
        let floor = self.config.min_population();
        let mut raised = 0;
        for id in tree.post_order() {
            let children_total = tree
                .children(id)
                .iter()
                .filter_map(|&child| tree[child].population)
                .fold(0u64, u64::saturating_add);
            let area = &mut tree[id];
            let declared = area.population.unwrap_or(0);
            let population = declared.max(children_total).max(floor);
            if area.population != Some(population) {
                raised += 1;
            }
            area.population = Some(population);
        }
        raised
    }
}
