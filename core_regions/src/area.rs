use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::estimates::Estimates;

/// Stable index of an [`Area`] inside its [`AreaTree`](crate::AreaTree) arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AreaId(pub u32);

impl AreaId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for AreaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaKind {
    World,
    Continent,
    Region,
    Country,
    State,
    City,
    /// Catch-all for irregular administrative splits used by some data sources.
    Subdivision,
}

impl AreaKind {
    pub const VARIANTS: [AreaKind; 7] = [
        AreaKind::World,
        AreaKind::Continent,
        AreaKind::Region,
        AreaKind::Country,
        AreaKind::State,
        AreaKind::City,
        AreaKind::Subdivision,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            AreaKind::World => "world",
            AreaKind::Continent => "continent",
            AreaKind::Region => "region",
            AreaKind::Country => "country",
            AreaKind::State => "state",
            AreaKind::City => "city",
            AreaKind::Subdivision => "subdivision",
        }
    }

    pub const fn flag(self) -> AreaKinds {
        match self {
            AreaKind::World => AreaKinds::WORLD,
            AreaKind::Continent => AreaKinds::CONTINENT,
            AreaKind::Region => AreaKinds::REGION,
            AreaKind::Country => AreaKinds::COUNTRY,
            AreaKind::State => AreaKinds::STATE,
            AreaKind::City => AreaKinds::CITY,
            AreaKind::Subdivision => AreaKinds::SUBDIVISION,
        }
    }
}

impl fmt::Display for AreaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AreaKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "world" => Ok(AreaKind::World),
            "continent" => Ok(AreaKind::Continent),
            "region" => Ok(AreaKind::Region),
            "country" => Ok(AreaKind::Country),
            "state" | "province" => Ok(AreaKind::State),
            "city" => Ok(AreaKind::City),
            "subdivision" | "admin" => Ok(AreaKind::Subdivision),
            _ => Err(()),
        }
    }
}

bitflags! {
    /// Set of [`AreaKind`]s used to restrict name lookups.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct AreaKinds: u8 {
        const WORLD = 1 << 0;
        const CONTINENT = 1 << 1;
        const REGION = 1 << 2;
        const COUNTRY = 1 << 3;
        const STATE = 1 << 4;
        const CITY = 1 << 5;
        const SUBDIVISION = 1 << 6;
    }
}

impl AreaKinds {
    pub fn matches(self, kind: AreaKind) -> bool {
        self.contains(kind.flag())
    }
}

impl From<AreaKind> for AreaKinds {
    fn from(kind: AreaKind) -> Self {
        kind.flag()
    }
}

impl FromIterator<AreaKind> for AreaKinds {
    fn from_iter<I: IntoIterator<Item = AreaKind>>(iter: I) -> Self {
        iter.into_iter()
            .fold(AreaKinds::empty(), |acc, kind| acc | kind.flag())
    }
}

/// Normalized form of an area name used for keys and alias lookup:
/// ASCII transliteration, `-` replaced by a space, lowercase.
pub fn normalize_name(name: &str) -> String {
    deunicode::deunicode(name.trim())
        .replace('-', " ")
        .to_lowercase()
}

/// One node of the geographic hierarchy.
///
/// `children` and `parent` are arena links maintained by
/// [`AreaTree::insert`](crate::AreaTree::insert); a freshly built area has
/// neither. Names, key and kind are fixed once the area is built, since the
/// tree indexes them on insertion:
///
/// ```compile_fail
/// use core_regions::{Area, AreaKind, AreaTree};
///
/// let mut tree = AreaTree::new();
/// let id = tree.insert(Area::new(["A"], AreaKind::Country), None).unwrap();
/// tree[id].key = "b".to_string();
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Area {
    pub(crate) names: Vec<String>,
    pub(crate) key: String,
    pub(crate) kind: AreaKind,
    pub population: Option<u64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub simulator_id: Option<u64>,
    pub iana_zone: Option<String>,
    pub estimates: Estimates,
    pub(crate) children: Vec<AreaId>,
    pub(crate) parent: Option<AreaId>,
}

impl Area {
    /// Build an area from its aliases; the first alias is the display name and
    /// the key is derived from it. Blank aliases are dropped.
    pub fn new<I, S>(names: I, kind: AreaKind) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names
            .into_iter()
            .map(Into::into)
            .filter(|name: &String| !name.trim().is_empty())
            .collect();
        let key = names.first().map(|n| normalize_name(n)).unwrap_or_default();
        Self {
            names,
            key,
            kind,
            population: None,
            lat: None,
            lon: None,
            simulator_id: None,
            iana_zone: None,
            estimates: Estimates::default(),
            children: Vec::new(),
            parent: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_population(mut self, population: u64) -> Self {
        self.population = Some(population);
        self
    }

    pub fn with_coordinates(mut self, lat: f64, lon: f64) -> Self {
        self.lat = Some(lat);
        self.lon = Some(lon);
        self
    }

    pub fn with_simulator_id(mut self, id: u64) -> Self {
        self.simulator_id = Some(id);
        self
    }

    pub fn with_iana_zone(mut self, zone: impl Into<String>) -> Self {
        self.iana_zone = Some(zone.into());
        self
    }

    pub fn with_estimates(mut self, estimates: Estimates) -> Self {
        self.estimates = estimates;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn kind(&self) -> AreaKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or("")
    }

    pub fn children(&self) -> &[AreaId] {
        &self.children
    }

    pub fn parent(&self) -> Option<AreaId> {
        self.parent
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}, {}]", self.name(), self.key, self.kind)
    }
}
