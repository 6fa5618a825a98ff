use crate::diagnostics::LOG_TARGET;
use crate::estimates::Metric;
use crate::tree::AreaTree;

/// Lower bound taken from another metric of the same area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricFloor {
    pub metric: Metric,
    pub multiplier: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateOptions {
    /// Leave areas with no information anywhere below them as `None`
    /// instead of `0`.
    pub keep_nones: bool,
    /// Absolute floor for every value that ends up set.
    pub minimum: f64,
    pub floor_from: Option<MetricFloor>,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            keep_nones: false,
            minimum: 0.0,
            floor_from: None,
        }
    }
}

impl AggregateOptions {
    pub fn keep_nones() -> Self {
        Self {
            keep_nones: true,
            ..Self::default()
        }
    }

    /// Raise the metric to `multiplier × other` wherever `other` is known.
    pub fn minimum_from(mut self, metric: Metric, multiplier: f64) -> Self {
        self.floor_from = Some(MetricFloor { metric, multiplier });
        self
    }

    pub fn with_minimum(mut self, minimum: f64) -> Self {
        self.minimum = minimum;
        self
    }
}

/// Bottom-up consolidation that makes every area at least the sum of its
/// children for one metric.
pub struct EstimateAggregator;

impl EstimateAggregator {
    /// Returns the number of areas whose value changed.
    pub fn aggregate_min(tree: &mut AreaTree, metric: Metric, options: AggregateOptions) -> usize {
        let mut changed = 0;
        for id in tree.post_order() {
            let mut children_total = 0.0;
            let mut any_child = false;
            for &child in tree.children(id) {
                if let Some(value) = tree[child].estimates.get(metric) {
                    children_total += value;
                    any_child = true;
                }
            }

            let area = &mut tree[id];
            let before = area.estimates.get(metric);
            let mut own = before;
            if let Some(floor) = options.floor_from {
                if let Some(other) = area.estimates.get(floor.metric) {
                    let bound = other * floor.multiplier;
                    if own.map_or(true, |value| value < bound) {
                        own = Some(bound);
                    }
                }
            }

            let value = if any_child || own.is_some() || !options.keep_nones {
                Some(
                    children_total
                        .max(own.unwrap_or(0.0))
                        .max(options.minimum),
                )
            } else {
                None
            };

            if value != before {
                changed += 1;
                tracing::trace!(
                    target: LOG_TARGET,
                    area = %area.key,
                    metric = %metric,
                    before = ?before,
                    after = ?value,
                    "aggregate.raised"
                );
            }
            area.estimates.set(metric, value);
        }
        tracing::debug!(
            target: LOG_TARGET,
            metric = %metric,
            changed,
            "aggregate.done"
        );
        changed
    }

    /// Consolidate each raw case-tracker count on its own, keeping `None`
    /// where no area below reported anything.
    pub fn aggregate_confirmed(tree: &mut AreaTree) -> usize {
        Metric::CONFIRMED
            .iter()
            .map(|&metric| Self::aggregate_min(tree, metric, AggregateOptions::keep_nones()))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::{Area, AreaId, AreaKind};

    /// world -> (europe -> (france, spain), asia)
    fn tree() -> (AreaTree, [AreaId; 5]) {
        let mut tree = AreaTree::new();
        let world = tree.insert(Area::new(["World"], AreaKind::World), None).unwrap();
        let europe = tree
            .insert(Area::new(["Europe"], AreaKind::Continent), Some(world))
            .unwrap();
        let france = tree
            .insert(Area::new(["France"], AreaKind::Country), Some(europe))
            .unwrap();
        let spain = tree
            .insert(Area::new(["Spain"], AreaKind::Country), Some(europe))
            .unwrap();
        let asia = tree
            .insert(Area::new(["Asia"], AreaKind::Continent), Some(world))
            .unwrap();
        (tree, [world, europe, france, spain, asia])
    }

    #[test]
    fn parent_raised_to_child_sum() {
        let (mut tree, [world, europe, france, spain, asia]) = tree();
        tree[france].estimates.confirmed_total = Some(30.0);
        tree[spain].estimates.confirmed_total = Some(20.0);
        tree[europe].estimates.confirmed_total = Some(10.0);
        tree[world].estimates.confirmed_total = Some(500.0);

        EstimateAggregator::aggregate_min(&mut tree, Metric::ConfirmedTotal, AggregateOptions::keep_nones());

        assert_eq!(tree[europe].estimates.confirmed_total, Some(50.0));
        assert_eq!(tree[world].estimates.confirmed_total, Some(500.0));
        assert_eq!(tree[asia].estimates.confirmed_total, None);
    }

    #[test]
    fn without_keep_nones_everything_gets_a_value() {
        let (mut tree, [world, _, france, _, asia]) = tree();
        tree[france].estimates.confirmed_deaths = Some(4.0);

        EstimateAggregator::aggregate_min(&mut tree, Metric::ConfirmedDeaths, AggregateOptions::default());

        assert_eq!(tree[asia].estimates.confirmed_deaths, Some(0.0));
        assert_eq!(tree[world].estimates.confirmed_deaths, Some(4.0));
    }

    #[test]
    fn minimum_applies_to_set_values() {
        let (mut tree, [world, europe, france, spain, asia]) = tree();
        tree[france].estimates.forecast_var = Some(1.0);
        EstimateAggregator::aggregate_min(
            &mut tree,
            Metric::ForecastVar,
            AggregateOptions::keep_nones().with_minimum(5.0),
        );
        assert_eq!(tree[france].estimates.forecast_var, Some(5.0));
        assert_eq!(tree[spain].estimates.forecast_var, None);
        assert_eq!(tree[europe].estimates.forecast_var, Some(5.0));
        assert_eq!(tree[asia].estimates.forecast_var, None);
        assert_eq!(tree[world].estimates.forecast_var, Some(5.0));
    }

    #[test]
    fn floor_from_other_metric() {
        let (mut tree, [world, europe, france, spain, asia]) = tree();
        tree[france].estimates.active_estimate = Some(10.0);
        tree[france].estimates.confirmed_active = Some(40.0);
        tree[spain].estimates.confirmed_active = Some(5.0);
        tree[asia].estimates.active_estimate = Some(7.0);

        let changed = EstimateAggregator::aggregate_min(
            &mut tree,
            Metric::ActiveEstimate,
            AggregateOptions::keep_nones().minimum_from(Metric::ConfirmedActive, 2.0),
        );

        assert_eq!(tree[france].estimates.active_estimate, Some(80.0));
        assert_eq!(tree[spain].estimates.active_estimate, Some(10.0));
        assert_eq!(tree[europe].estimates.active_estimate, Some(90.0));
        assert_eq!(tree[asia].estimates.active_estimate, Some(7.0));
        assert_eq!(tree[world].estimates.active_estimate, Some(97.0));
        assert_eq!(changed, 4);

        let again = EstimateAggregator::aggregate_min(
            &mut tree,
            Metric::ActiveEstimate,
            AggregateOptions::keep_nones().minimum_from(Metric::ConfirmedActive, 2.0),
        );
        assert_eq!(again, 0);
    }

    #[test]
    fn confirmed_metrics_aggregate_independently() {
        let (mut tree, [world, europe, france, spain, _]) = tree();
        tree[france].estimates.confirmed_active = Some(3.0);
        tree[spain].estimates.confirmed_recovered = Some(8.0);

        EstimateAggregator::aggregate_confirmed(&mut tree);

        assert_eq!(tree[europe].estimates.confirmed_active, Some(3.0));
        assert_eq!(tree[europe].estimates.confirmed_recovered, Some(8.0));
        assert_eq!(tree[world].estimates.confirmed_total, None);
        assert_eq!(tree[world].estimates.confirmed_deaths, None);
        assert_eq!(tree[spain].estimates.confirmed_active, None);
    }
}
