use crate::diagnostics::LOG_TARGET;
use crate::estimates::Metric;
use crate::tree::AreaTree;

/// Top-down fill of `target` where it is missing, for trees with no world
/// level forecast.
///
/// An area without `target` takes the value inherited from its parent, or its
/// own `source` when nothing was inherited, and hands it to its children in
/// proportion to population. An area that already has `target` keeps it and
/// starts nothing; its children begin again from their own `source`.
/// Returns the number of areas filled.
pub fn fill_downward_by_population(tree: &mut AreaTree, target: Metric, source: Metric) -> usize {
    let Some(root) = tree.root() else {
        return 0;
    };
    let mut filled = 0;
    let mut stack = vec![(root, None::<f64>)];
    while let Some((id, inherited)) = stack.pop() {
        let area = &mut tree[id];
        let mut carried = None;
        if area.estimates.get(target).is_none() {
            let value = inherited.or(area.estimates.get(source));
            if inherited.is_some() {
                area.estimates.set(target, inherited);
                filled += 1;
            }
            carried = value;
        }

        let population = tree[id].population.unwrap_or(0) as f64;
        for &child in tree.children(id).iter().rev() {
            let share = carried.and_then(|value| {
                (population > 0.0)
                    .then(|| value * tree[child].population.unwrap_or(0) as f64 / population)
            });
            stack.push((child, share));
        }
    }
    tracing::debug!(
        target: LOG_TARGET,
        target_metric = %target,
        source_metric = %source,
        filled,
        "fill.downward"
    );
    filled
}
