//! Fixture helpers shared by the integration tests.
//!
//! Trees are described as nested JSON objects:
//! `{"names": [..], "kind": "country", "population": 1000, "estimates": {..}, "children": [..]}`,
//! with optional `key`, `simulator_id`, `lat`/`lon` and `iana_zone`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use core_regions::{Area, AreaId, AreaKind, AreaTree, Estimates};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct FixtureArea {
    names: Vec<String>,
    kind: AreaKind,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    population: Option<u64>,
    #[serde(default)]
    simulator_id: Option<u64>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    iana_zone: Option<String>,
    #[serde(default)]
    estimates: Estimates,
    #[serde(default)]
    children: Vec<FixtureArea>,
}

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn tree_from_json(json: &str) -> Result<AreaTree> {
    let root: FixtureArea = serde_json::from_str(json).context("parsing fixture tree")?;
    let mut tree = AreaTree::new();
    let mut pending: Vec<(FixtureArea, Option<AreaId>)> = vec![(root, None)];
    while let Some((node, parent)) = pending.pop() {
        let mut area = Area::new(node.names, node.kind).with_estimates(node.estimates);
        if let Some(key) = node.key {
            area = area.with_key(key);
        }
        area.population = node.population;
        if let Some(simulator_id) = node.simulator_id {
            area = area.with_simulator_id(simulator_id);
        }
        if let (Some(lat), Some(lon)) = (node.lat, node.lon) {
            area = area.with_coordinates(lat, lon);
        }
        if let Some(zone) = node.iana_zone {
            area = area.with_iana_zone(zone);
        }
        let label = area.key().to_string();
        let id = tree
            .insert(area, parent)
            .with_context(|| format!("inserting fixture area {label:?}"))?;
        pending.extend(node.children.into_iter().rev().map(|child| (child, Some(id))));
    }
    Ok(tree)
}

pub fn load_tree(path: &Path) -> Result<AreaTree> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading fixture {}", path.display()))?;
    tree_from_json(&json)
}

/// `(key, active_estimate)` for every area, in arena order.
pub fn active_estimates(tree: &AreaTree) -> Vec<(String, Option<f64>)> {
    tree.iter()
        .map(|(_, area)| (area.key().to_string(), area.estimates.active_estimate))
        .collect()
}

/// Id of the area with `key`, panicking with the key when absent.
pub fn id(tree: &AreaTree, key: &str) -> AreaId {
    tree.lookup_by_key(key)
        .unwrap_or_else(|err| panic!("fixture lookup failed: {err}"))
}
