//! Reconciliation of forecaster means and confirmed counts into one
//! `active_estimate` per area.
//!
//! A single top-down pass hands every area's unexplained estimate down to the
//! children that have no forecast of their own, weighted by their confirmed
//! case counts (recorded, or imputed from sibling infection ratios). A
//! bottom-up aggregation then restores "parent ≥ sum of children" and the
//! confirmed-case floor, which the redistribution can break locally.

use crate::aggregate::{AggregateOptions, EstimateAggregator};
use crate::area::AreaId;
use crate::coverage::check_missing_leaf_estimates;
use crate::diagnostics::{Diagnostic, DiagnosticSink, LOG_TARGET};
use crate::estimates::Metric;
use crate::reconcile_config::ActiveCaseConfig;
use crate::tree::AreaTree;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActiveCaseReport {
    /// Areas that redistributed an estimate to their children.
    pub redistributed: usize,
    /// Children that received an imputed confirmed-case weight.
    pub imputed: usize,
    /// Areas changed by the bottom-up consolidation.
    pub consolidated: usize,
    /// Leaves still without an estimate at the end of the run.
    pub missing: usize,
}

/// Per-child inputs to one redistribution step.
#[derive(Debug, Clone, Copy)]
struct ChildShare {
    id: AreaId,
    population: f64,
    forecast: Option<f64>,
    confirmed: Option<f64>,
    weight: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ActiveCaseReconciler<'a> {
    config: &'a ActiveCaseConfig,
}

impl<'a> ActiveCaseReconciler<'a> {
    pub fn new(config: &'a ActiveCaseConfig) -> Self {
        Self { config }
    }

    /// Full reconciliation: reset previous output, redistribute top-down,
    /// then consolidate bottom-up with the confirmed-case floor. Leaves left
    /// without an estimate are reported to `sink`.
    pub fn run(&self, tree: &mut AreaTree, sink: &mut dyn DiagnosticSink) -> ActiveCaseReport {
        for id in tree.pre_order() {
            let estimates = &mut tree[id].estimates;
            estimates.active_estimate = None;
            estimates.imputed_confirmed_active = None;
        }

        let mut report = self.propagate_down(tree, sink);
        report.consolidated = EstimateAggregator::aggregate_min(
            tree,
            Metric::ActiveEstimate,
            AggregateOptions::keep_nones()
                .minimum_from(Metric::ConfirmedActive, self.config.confirmed_multiplier()),
        );
        report.missing = check_missing_leaf_estimates(tree, Metric::ActiveEstimate, sink).len();
        tracing::info!(
            target: LOG_TARGET,
            redistributed = report.redistributed,
            imputed = report.imputed,
            consolidated = report.consolidated,
            missing = report.missing,
            "active.reconciled"
        );
        report
    }

    /// Top-down pass. An area's estimate is its own forecast, or else the
    /// share its parent assigned to it earlier in this pass; areas with
    /// neither are left for the bottom-up consolidation.
    pub fn propagate_down(
        &self,
        tree: &mut AreaTree,
        sink: &mut dyn DiagnosticSink,
    ) -> ActiveCaseReport {
        let mut report = ActiveCaseReport::default();
        for id in tree.pre_order() {
            let estimates = &tree[id].estimates;
            let Some(estimate) = estimates.forecast_mean.or(estimates.active_estimate) else {
                continue;
            };
            tree[id].estimates.active_estimate = Some(estimate);
            if tree.children(id).is_empty() {
                continue;
            }
            report.imputed += self.redistribute(tree, id, estimate, sink);
            report.redistributed += 1;
        }
        report
    }

    /// Split `estimate` of `id` among its children; returns how many children
    /// got an imputed confirmed-case weight.
    fn redistribute(
        &self,
        tree: &mut AreaTree,
        id: AreaId,
        estimate: f64,
        sink: &mut dyn DiagnosticSink,
    ) -> usize {
        let mut shares: Vec<ChildShare> = tree
            .children(id)
            .iter()
            .map(|&child| {
                let area = &tree[child];
                ChildShare {
                    id: child,
                    population: area.population.unwrap_or(0) as f64,
                    forecast: area.estimates.forecast_mean,
                    confirmed: area.estimates.confirmed_active,
                    weight: 0.0,
                }
            })
            .collect();

        // Mean confirmed ratio over children that have a count and no forecast.
        let ratios: Vec<f64> = shares
            .iter()
            .filter(|share| share.forecast.is_none() && share.population > 0.0)
            .filter_map(|share| share.confirmed.map(|confirmed| confirmed / share.population))
            .collect();
        let needs_weight = shares
            .iter()
            .filter(|share| share.forecast.is_none() && share.confirmed.is_none())
            .count();
        let mean_ratio = if ratios.is_empty() {
            let default_ratio = self.config.default_mean_ratio();
            if needs_weight > 0 {
                sink.record(Diagnostic::DefaultRatioFallback {
                    area: tree[id].key.clone(),
                    default_ratio,
                    recipients: needs_weight,
                });
            }
            default_ratio
        } else {
            (ratios.iter().sum::<f64>() / ratios.len() as f64).max(0.0)
        };

        // Only children without a forecast draw from the pool.
        for share in shares.iter_mut().filter(|share| share.forecast.is_none()) {
            share.weight = match share.confirmed {
                Some(confirmed) => confirmed,
                None => {
                    let weight = share.population * mean_ratio;
                    tree[share.id].estimates.imputed_confirmed_active = Some(weight);
                    weight
                }
            };
        }

        let children_forecast: f64 = shares.iter().filter_map(|share| share.forecast).sum();
        let mut remainder = estimate - children_forecast;
        if remainder < 0.0 {
            sink.record(Diagnostic::NegativeRemainder {
                area: tree[id].key.clone(),
                estimate,
                children_forecast,
                remainder,
            });
            remainder = 0.0;
        }

        let recipients: Vec<&ChildShare> =
            shares.iter().filter(|share| share.forecast.is_none()).collect();
        if recipients.is_empty() {
            return needs_weight;
        }

        let pool: f64 = recipients.iter().map(|share| share.weight.max(0.0)).sum();
        let assigned: Vec<(AreaId, f64)> = if pool > 0.0 {
            recipients
                .iter()
                .map(|share| (share.id, remainder * share.weight.max(0.0) / pool))
                .collect()
        } else {
            sink.record(Diagnostic::EmptyPool {
                area: tree[id].key.clone(),
                remainder,
                recipients: recipients.len(),
            });
            let population: f64 = recipients.iter().map(|share| share.population).sum();
            recipients
                .iter()
                .map(|share| {
                    let value = if population > 0.0 {
                        remainder * share.population / population
                    } else {
                        remainder / recipients.len() as f64
                    };
                    (share.id, value)
                })
                .collect()
        };

        for (child, value) in assigned {
            tree[child].estimates.active_estimate = Some(value);
        }
        tracing::debug!(
            target: LOG_TARGET,
            area = %tree[id].key,
            estimate,
            remainder,
            mean_ratio,
            pool,
            "active.redistributed"
        );
        needs_weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::{Area, AreaKind};
    use crate::diagnostics::Diagnostics;

    fn world_with(children: &[(&str, u64)]) -> (AreaTree, AreaId, Vec<AreaId>) {
        let mut tree = AreaTree::new();
        let world = tree
            .insert(Area::new(["World"], AreaKind::World).with_population(1_000), None)
            .unwrap();
        let ids = children
            .iter()
            .map(|(name, pop)| {
                tree.insert(
                    Area::new([*name], AreaKind::Country).with_population(*pop),
                    Some(world),
                )
                .unwrap()
            })
            .collect();
        (tree, world, ids)
    }

    fn active(tree: &AreaTree, id: AreaId) -> f64 {
        tree[id].estimates.active_estimate.expect("active estimate")
    }

    #[test]
    fn remainder_follows_confirmed_share() {
        let (mut tree, world, ids) = world_with(&[("A", 400), ("B", 600)]);
        tree[world].estimates.forecast_mean = Some(100.0);
        tree[ids[1]].estimates.confirmed_active = Some(60.0);

        let config = ActiveCaseConfig::default();
        let mut sink = Diagnostics::new();
        let report = ActiveCaseReconciler::new(&config).run(&mut tree, &mut sink);

        assert!((active(&tree, ids[0]) - 40.0).abs() < 1e-9);
        assert!((active(&tree, ids[1]) - 60.0).abs() < 1e-9);
        assert!((active(&tree, world) - 100.0).abs() < 1e-9);
        assert_eq!(tree[ids[0]].estimates.imputed_confirmed_active, Some(40.0));
        assert_eq!(tree[ids[0]].estimates.confirmed_active, None);
        assert_eq!(tree[ids[1]].estimates.imputed_confirmed_active, None);
        assert_eq!(report.redistributed, 1);
        assert_eq!(report.imputed, 1);
        assert!(sink.is_empty());
    }

    #[test]
    fn forecasted_children_keep_their_forecast() {
        let (mut tree, world, ids) = world_with(&[("A", 300), ("B", 300), ("C", 400)]);
        tree[world].estimates.forecast_mean = Some(100.0);
        tree[ids[0]].estimates.forecast_mean = Some(70.0);
        tree[ids[1]].estimates.confirmed_active = Some(3.0);
        tree[ids[2]].estimates.confirmed_active = Some(12.0);

        let config = ActiveCaseConfig::default();
        let mut sink = Diagnostics::new();
        let report = ActiveCaseReconciler::new(&config).run(&mut tree, &mut sink);

        assert_eq!(active(&tree, ids[0]), 70.0);
        assert!((active(&tree, ids[1]) - 6.0).abs() < 1e-9);
        assert!((active(&tree, ids[2]) - 24.0).abs() < 1e-9);
        assert_eq!(active(&tree, world), 100.0);
        // A has a forecast and no count; it is not given a weight.
        assert_eq!(tree[ids[0]].estimates.imputed_confirmed_active, None);
        assert_eq!(report.imputed, 0);
        assert!(sink.is_empty());
    }

    #[test]
    fn default_ratio_spreads_by_population() {
        let (mut tree, world, ids) = world_with(&[("A", 250), ("B", 750)]);
        tree[world].estimates.forecast_mean = Some(20.0);

        let config = ActiveCaseConfig::default();
        let mut sink = Diagnostics::new();
        ActiveCaseReconciler::new(&config).run(&mut tree, &mut sink);

        assert_eq!(
            sink.entries(),
            &[Diagnostic::DefaultRatioFallback {
                area: "world".into(),
                default_ratio: 0.01,
                recipients: 2,
            }]
        );
        assert_eq!(tree[ids[0]].estimates.imputed_confirmed_active, Some(2.5));
        assert!((active(&tree, ids[0]) - 5.0).abs() < 1e-9);
        assert!((active(&tree, ids[1]) - 15.0).abs() < 1e-9);
    }

    #[test]
    fn negative_remainder_is_clipped_and_reported() {
        let (mut tree, world, ids) = world_with(&[("A", 500), ("B", 500)]);
        tree[world].estimates.forecast_mean = Some(50.0);
        tree[ids[0]].estimates.forecast_mean = Some(80.0);
        tree[ids[1]].estimates.confirmed_active = Some(5.0);

        let config = ActiveCaseConfig::default();
        let mut sink = Diagnostics::new();
        ActiveCaseReconciler::new(&config).run(&mut tree, &mut sink);

        assert_eq!(
            sink.entries(),
            &[Diagnostic::NegativeRemainder {
                area: "world".into(),
                estimate: 50.0,
                children_forecast: 80.0,
                remainder: -30.0,
            }]
        );
        // B got nothing from above; the confirmed floor applies
        assert_eq!(active(&tree, ids[1]), 5.0);
        assert_eq!(active(&tree, world), 85.0);
    }

    #[test]
    fn zero_pool_falls_back_to_population() {
        let (mut tree, world, ids) = world_with(&[("A", 100), ("B", 300)]);
        tree[world].estimates.forecast_mean = Some(40.0);
        tree[ids[0]].estimates.confirmed_active = Some(0.0);
        tree[ids[1]].estimates.confirmed_active = Some(0.0);

        let config = ActiveCaseConfig::default();
        let mut sink = Diagnostics::new();
        ActiveCaseReconciler::new(&config).run(&mut tree, &mut sink);

        assert!(matches!(sink.entries(), [Diagnostic::EmptyPool { recipients: 2, .. }]));
        assert!((active(&tree, ids[0]) - 10.0).abs() < 1e-9);
        assert!((active(&tree, ids[1]) - 30.0).abs() < 1e-9);
    }

    #[test]
    fn areas_without_any_source_stay_empty() {
        let (mut tree, world, ids) = world_with(&[("A", 100), ("B", 300)]);
        tree[ids[1]].estimates.confirmed_active = Some(9.0);

        let config = ActiveCaseConfig::default();
        let mut sink = Diagnostics::new();
        let report = ActiveCaseReconciler::new(&config).run(&mut tree, &mut sink);

        assert_eq!(report.redistributed, 0);
        assert_eq!(report.missing, 1);
        assert_eq!(tree[ids[0]].estimates.active_estimate, None);
        assert_eq!(
            sink.entries(),
            &[Diagnostic::MissingEstimate {
                area: "a".into(),
                metric: Metric::ActiveEstimate,
                population: Some(100),
            }]
        );
        assert_eq!(active(&tree, ids[1]), 9.0);
        assert_eq!(active(&tree, world), 9.0);
    }

    #[test]
    fn inherited_share_is_redistributed_further_down() {
        let mut tree = AreaTree::new();
        let world = tree
            .insert(Area::new(["World"], AreaKind::World).with_population(10_000), None)
            .unwrap();
        let country = tree
            .insert(
                Area::new(["Country"], AreaKind::Country).with_population(10_000),
                Some(world),
            )
            .unwrap();
        let north = tree
            .insert(Area::new(["North"], AreaKind::City).with_population(2_000), Some(country))
            .unwrap();
        let south = tree
            .insert(Area::new(["South"], AreaKind::City).with_population(8_000), Some(country))
            .unwrap();
        tree[world].estimates.forecast_mean = Some(500.0);

        let config = ActiveCaseConfig::default();
        ActiveCaseReconciler::new(&config).run(&mut tree, &mut Diagnostics::new());

        assert!((active(&tree, country) - 500.0).abs() < 1e-9);
        assert!((active(&tree, north) - 100.0).abs() < 1e-9);
        assert!((active(&tree, south) - 400.0).abs() < 1e-9);
    }

    #[test]
    fn multiplier_raises_floor() {
        let (mut tree, world, ids) = world_with(&[("A", 500), ("B", 500)]);
        tree[world].estimates.forecast_mean = Some(10.0);
        tree[ids[0]].estimates.confirmed_active = Some(8.0);
        tree[ids[1]].estimates.confirmed_active = Some(2.0);

        let config = crate::ReconcileConfig::default().with_confirmed_multiplier(3.0);
        ActiveCaseReconciler::new(config.active_cases()).run(&mut tree, &mut Diagnostics::new());

        assert_eq!(active(&tree, ids[0]), 24.0);
        assert_eq!(active(&tree, ids[1]), 6.0);
        assert_eq!(active(&tree, world), 30.0);
    }

    #[test]
    fn rerun_resets_previous_output() {
        let (mut tree, world, ids) = world_with(&[("A", 400), ("B", 600)]);
        tree[world].estimates.forecast_mean = Some(100.0);
        tree[ids[1]].estimates.confirmed_active = Some(60.0);

        let config = ActiveCaseConfig::default();
        let reconciler = ActiveCaseReconciler::new(&config);
        reconciler.run(&mut tree, &mut Diagnostics::new());
        let first: Vec<_> = tree.iter().map(|(_, area)| area.estimates).collect();
        reconciler.run(&mut tree, &mut Diagnostics::new());
        let second: Vec<_> = tree.iter().map(|(_, area)| area.estimates).collect();
        assert_eq!(first, second);
    }
}
