use std::fmt;

use foundation::{bucket_heading, direction_bucket};
use serde::{Deserialize, Serialize};

/// Map kinds the host application can show as primary or side view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapKind {
    /// Flat 2D map.
    Flat,
    /// 3D globe.
    Globe,
    /// Oblique aerial imagery, rendered against a collection.
    Oblique,
    /// Street-level panorama imagery.
    Panorama,
}

impl MapKind {
    pub const ALL: [MapKind; 4] = [
        MapKind::Flat,
        MapKind::Globe,
        MapKind::Panorama,
        MapKind::Oblique,
    ];

    pub fn class_name(self) -> &'static str {
        match self {
            MapKind::Flat => "OpenlayersMap",
            MapKind::Globe => "CesiumMap",
            MapKind::Oblique => "ObliqueMap",
            MapKind::Panorama => "PanoramaMap",
        }
    }

    pub fn from_class_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.class_name() == name)
    }

    /// Whether an oblique direction can match the heading of this kind.
    ///
    /// A flat map has no meaningful oblique direction.
    pub fn is_directional(self) -> bool {
        !matches!(self, MapKind::Flat)
    }
}

impl fmt::Display for MapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}

/// Everything that can be shown in a side view slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SideViewKind {
    Map(MapKind),
    /// Four oblique views locked to north, east, south and west.
    ObliqueQuad,
}

impl SideViewKind {
    pub const QUAD_CLASS_NAME: &'static str = "ObliqueMultiView";

    pub const ALL: [SideViewKind; 5] = [
        SideViewKind::Map(MapKind::Flat),
        SideViewKind::Map(MapKind::Globe),
        SideViewKind::Map(MapKind::Panorama),
        SideViewKind::Map(MapKind::Oblique),
        SideViewKind::ObliqueQuad,
    ];

    pub fn class_name(self) -> &'static str {
        match self {
            SideViewKind::Map(kind) => kind.class_name(),
            SideViewKind::ObliqueQuad => Self::QUAD_CLASS_NAME,
        }
    }

    pub fn from_class_name(name: &str) -> Option<Self> {
        if name == Self::QUAD_CLASS_NAME {
            return Some(SideViewKind::ObliqueQuad);
        }
        MapKind::from_class_name(name).map(SideViewKind::Map)
    }

    pub fn map_kind(self) -> Option<MapKind> {
        match self {
            SideViewKind::Map(kind) => Some(kind),
            SideViewKind::ObliqueQuad => None,
        }
    }

    /// Renders against a collection.
    pub fn is_oblique(self) -> bool {
        matches!(
            self,
            SideViewKind::Map(MapKind::Oblique) | SideViewKind::ObliqueQuad
        )
    }

    /// Has a terrain source that can supply missing elevations.
    pub fn is_elevation_aware(self) -> bool {
        self.is_oblique()
    }

    pub fn is_panorama(self) -> bool {
        matches!(self, SideViewKind::Map(MapKind::Panorama))
    }
}

impl From<MapKind> for SideViewKind {
    fn from(kind: MapKind) -> Self {
        SideViewKind::Map(kind)
    }
}

impl fmt::Display for SideViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}

/// Oblique viewing direction, numbered 1..4 like [`direction_bucket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Direction {
    North = 1,
    East = 2,
    South = 3,
    West = 4,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.index() == index)
    }

    /// Direction whose bucket contains `heading`.
    pub fn from_heading(heading: f64) -> Self {
        match direction_bucket(heading) {
            2 => Direction::East,
            3 => Direction::South,
            4 => Direction::West,
            _ => Direction::North,
        }
    }

    /// Heading a view locked to this direction looks along (degrees).
    pub fn heading(self) -> f64 {
        bucket_heading(self.index())
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::East => "east",
            Direction::South => "south",
            Direction::West => "west",
        }
    }
}

impl TryFrom<u8> for Direction {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Direction::from_index(value).ok_or_else(|| format!("invalid direction {value}, expected 1..=4"))
    }
}

impl From<Direction> for u8 {
    fn from(direction: Direction) -> Self {
        direction.index()
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Validated description of one side view slot.
///
/// Built once from configuration; the engine never re-inspects kind names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewDescriptor {
    pub kind: SideViewKind,
    /// Only set for oblique map slots.
    pub direction: Option<Direction>,
    /// `None` means "use the default collection".
    pub collection: Option<String>,
}

impl ViewDescriptor {
    pub fn oblique(direction: Direction) -> Self {
        Self {
            kind: SideViewKind::Map(MapKind::Oblique),
            direction: Some(direction),
            collection: None,
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Receives a heading locked to its direction instead of the primary heading.
    pub fn is_directional(&self) -> bool {
        self.kind == SideViewKind::Map(MapKind::Oblique) && self.direction.is_some()
    }

    pub fn uses_default_collection(&self) -> bool {
        self.kind.is_oblique() && self.collection.is_none()
    }
}
