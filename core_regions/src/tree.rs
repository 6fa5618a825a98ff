use std::fmt::Write as _;
use std::ops::{Index, IndexMut};

use ahash::AHashMap;
use thiserror::Error;

use crate::area::{normalize_name, Area, AreaId, AreaKinds};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("area key {key:?} already indexed as {existing}")]
    DuplicateKey { key: String, existing: AreaId },
    #[error("area {key:?} already has a parent")]
    AlreadyParented { key: String },
    #[error("area {key:?} would be a second root (existing root {root})")]
    MultipleRoots { key: String, root: AreaId },
    #[error("parent {parent} of area {key:?} is not in the tree")]
    UnknownParent { key: String, parent: AreaId },
    #[error("area has an empty key (names: {names:?})")]
    EmptyKey { names: Vec<String> },
    #[error("tree has no root")]
    MissingRoot,
    #[error("area {key:?} is not reachable from the root")]
    Unreachable { key: String },
    #[error("cycle detected at area {key:?}")]
    Cycle { key: String },
    #[error("no area with key {key:?}")]
    NotFound { key: String },
}

impl TreeError {
    /// Whether the error means the hierarchy itself is malformed.
    pub fn is_structural(&self) -> bool {
        !matches!(self, TreeError::NotFound { .. })
    }
}

/// Result of resolving a name to a single area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameMatch {
    Unique(AreaId),
    Missing,
    Ambiguous(Vec<AreaId>),
}

/// Arena-backed area hierarchy with a single root.
///
/// Areas are appended once and never removed or reparented; an [`AreaId`]
/// stays valid for the lifetime of the tree.
#[derive(Debug, Clone, Default)]
pub struct AreaTree {
    areas: Vec<Area>,
    root: Option<AreaId>,
    by_key: AHashMap<String, AreaId>,
    by_name: AHashMap<String, Vec<AreaId>>,
}

impl AreaTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `area` under `parent`, or as the root when `parent` is `None`.
    pub fn insert(&mut self, mut area: Area, parent: Option<AreaId>) -> Result<AreaId, TreeError> {
        if area.key.is_empty() {
            return Err(TreeError::EmptyKey { names: area.names });
        }
        if let Some(&existing) = self.by_key.get(&area.key) {
            return Err(TreeError::DuplicateKey {
                key: area.key,
                existing,
            });
        }
        if area.parent.is_some() {
            return Err(TreeError::AlreadyParented { key: area.key });
        }
        match parent {
            Some(parent) if parent.index() >= self.areas.len() => {
                return Err(TreeError::UnknownParent {
                    key: area.key,
                    parent,
                });
            }
            None => {
                if let Some(root) = self.root {
                    return Err(TreeError::MultipleRoots {
                        key: area.key,
                        root,
                    });
                }
            }
            Some(_) => {}
        }

        let id = AreaId(self.areas.len() as u32);
        area.children.clear();
        area.parent = parent;
        self.by_key.insert(area.key.clone(), id);
        for name in &area.names {
            let ids = self.by_name.entry(normalize_name(name)).or_default();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        match parent {
            Some(parent) => self.areas[parent.index()].children.push(id),
            None => self.root = Some(id),
        }
        self.areas.push(area);
        Ok(id)
    }

    pub fn root(&self) -> Option<AreaId> {
        self.root
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    pub fn get(&self, id: AreaId) -> Option<&Area> {
        self.areas.get(id.index())
    }

    pub fn get_mut(&mut self, id: AreaId) -> Option<&mut Area> {
        self.areas.get_mut(id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = (AreaId, &Area)> {
        self.areas
            .iter()
            .enumerate()
            .map(|(idx, area)| (AreaId(idx as u32), area))
    }

    pub fn children(&self, id: AreaId) -> &[AreaId] {
        &self[id].children
    }

    pub fn parent(&self, id: AreaId) -> Option<AreaId> {
        self[id].parent
    }

    /// Exact lookup by key; the key is normalized first.
    pub fn lookup_by_key(&self, key: &str) -> Result<AreaId, TreeError> {
        self.by_key
            .get(key)
            .or_else(|| self.by_key.get(&normalize_name(key)))
            .copied()
            .ok_or_else(|| TreeError::NotFound {
                key: key.to_string(),
            })
    }

    /// All areas carrying `name` as an alias, optionally restricted to `kinds`.
    ///
    /// Zero or several matches are ordinary results; callers decide what to do
    /// with them.
    pub fn lookup_by_name(&self, name: &str, kinds: Option<AreaKinds>) -> Vec<AreaId> {
        let Some(ids) = self.by_name.get(&normalize_name(name)) else {
            return Vec::new();
        };
        ids.iter()
            .copied()
            .filter(|id| kinds.map_or(true, |kinds| kinds.matches(self[*id].kind)))
            .collect()
    }

    pub fn resolve_name(&self, name: &str, kinds: Option<AreaKinds>) -> NameMatch {
        let mut ids = self.lookup_by_name(name, kinds);
        match ids.len() {
            0 => NameMatch::Missing,
            1 => NameMatch::Unique(ids.remove(0)),
            _ => NameMatch::Ambiguous(ids),
        }
    }

    /// Check that there is exactly one root, that every area is reachable from
    /// it, and that parent/child links agree.
    pub fn validate(&self) -> Result<(), TreeError> {
        let root = self.root.ok_or(TreeError::MissingRoot)?;
        let mut seen = vec![false; self.areas.len()];
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let area = &self[id];
            if std::mem::replace(&mut seen[id.index()], true) {
                return Err(TreeError::Cycle {
                    key: area.key.clone(),
                });
            }
            for &child in &area.children {
                if self.get(child).and_then(Area::parent) != Some(id) {
                    return Err(TreeError::Cycle {
                        key: area.key.clone(),
                    });
                }
                stack.push(child);
            }
        }
        if let Some(idx) = seen.iter().position(|visited| !visited) {
            return Err(TreeError::Unreachable {
                key: self.areas[idx].key.clone(),
            });
        }
        Ok(())
    }

    /// Root first, children in insertion order.
    pub fn pre_order(&self) -> Vec<AreaId> {
        let mut order = Vec::with_capacity(self.areas.len());
        let mut stack: Vec<AreaId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self[id].children.iter().rev().copied());
        }
        order
    }

    /// Every child before its parent; the root comes last.
    pub fn post_order(&self) -> Vec<AreaId> {
        let mut order = Vec::with_capacity(self.areas.len());
        let mut stack: Vec<(AreaId, bool)> = self.root.map(|root| (root, false)).into_iter().collect();
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            stack.push((id, true));
            stack.extend(self[id].children.iter().rev().map(|&child| (child, false)));
        }
        order
    }

    /// Indented outline of the areas whose kind is in `kinds` (all areas when
    /// `None`), showing population and the reconciled active estimate.
    pub fn outline(&self, kinds: Option<AreaKinds>) -> String {
        let mut out = String::new();
        let Some(root) = self.root else {
            return out;
        };
        let mut stack = vec![(root, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let area = &self[id];
            if kinds.map_or(true, |kinds| kinds.matches(area.kind)) {
                let population = area
                    .population
                    .map_or_else(|| "?".to_string(), |pop| pop.to_string());
                let active = area
                    .estimates
                    .active_estimate
                    .map_or_else(|| "-".to_string(), |value| format!("{value:.1}"));
                let _ = writeln!(
                    out,
                    "{:indent$}{} [{}] pop={} active={}",
                    "",
                    area.name(),
                    area.kind,
                    population,
                    active,
                    indent = depth * 2
                );
            }
            stack.extend(area.children.iter().rev().map(|&child| (child, depth + 1)));
        }
        out
    }
}

impl Index<AreaId> for AreaTree {
    type Output = Area;

    fn index(&self, id: AreaId) -> &Self::Output {
        &self.areas[id.index()]
    }
}

impl IndexMut<AreaId> for AreaTree {
    fn index_mut(&mut self, id: AreaId) -> &mut Self::Output {
        &mut self.areas[id.index()]
    }
}
