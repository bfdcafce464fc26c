use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, MultiViewError};
use crate::kind::{Direction, MapKind, SideViewKind, ViewDescriptor};

/// Plugin configuration, as stored in the application config (camelCase JSON).
///
/// Every field has a default, so `{}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MultiViewConfig {
    /// Open the side panel when the application starts.
    pub active_on_startup: bool,
    /// Side view kind shown first, by class name.
    pub starting_side_map: Option<String>,
    /// Side view kinds offered to the user, by class name.
    pub allowed_side_maps: Vec<String>,
    /// Collection for side views that don't pin one.
    pub oblique_collection_name: Option<String>,
    /// Slots of the multi-view panel.
    pub views: Vec<ViewConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Class name of the view kind.
    pub map: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
}

impl ViewConfig {
    pub fn oblique(direction: Direction) -> Self {
        Self {
            map: MapKind::Oblique.class_name().to_owned(),
            collection: None,
            direction: Some(direction),
        }
    }
}

impl Default for MultiViewConfig {
    fn default() -> Self {
        Self {
            active_on_startup: false,
            starting_side_map: None,
            allowed_side_maps: SideViewKind::ALL
                .iter()
                .map(|k| k.class_name().to_owned())
                .collect(),
            oblique_collection_name: None,
            views: Direction::ALL.into_iter().map(ViewConfig::oblique).collect(),
        }
    }
}

impl MultiViewConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Only the settings that differ from the defaults.
    pub fn to_json(&self) -> serde_json::Value {
        let defaults = Self::default();
        let mut out = serde_json::Map::new();
        if self.active_on_startup != defaults.active_on_startup {
            out.insert("activeOnStartup".into(), self.active_on_startup.into());
        }
        if let Some(kind) = &self.starting_side_map {
            out.insert("startingSideMap".into(), kind.clone().into());
        }
        if self.allowed_side_maps != defaults.allowed_side_maps && !self.allowed_side_maps.is_empty() {
            out.insert("allowedSideMaps".into(), self.allowed_side_maps.clone().into());
        }
        if let Some(name) = &self.oblique_collection_name {
            out.insert("obliqueCollectionName".into(), name.clone().into());
        }
        if self.views != defaults.views && !self.views.is_empty() {
            if let Ok(views) = serde_json::to_value(&self.views) {
                out.insert("views".into(), views);
            }
        }
        serde_json::Value::Object(out)
    }

    /// Validated slot descriptors, in configuration order.
    pub fn descriptors(&self) -> Result<Vec<ViewDescriptor>, MultiViewError> {
        self.views
            .iter()
            .enumerate()
            .map(|(slot, view)| {
                let kind = SideViewKind::from_class_name(&view.map)
                    .ok_or_else(|| MultiViewError::UnsupportedKind(view.map.clone()))?;
                let direction = match kind {
                    SideViewKind::Map(MapKind::Oblique) => Some(
                        view.direction
                            .ok_or(MultiViewError::MissingDirection { slot })?,
                    ),
                    _ => None,
                };
                Ok(ViewDescriptor {
                    kind,
                    direction,
                    collection: view.collection.clone(),
                })
            })
            .collect()
    }

    /// Allowed side view kinds in [`SideViewKind::ALL`] order; unknown names
    /// are skipped.
    pub fn allowed_kinds(&self) -> Vec<SideViewKind> {
        SideViewKind::ALL
            .into_iter()
            .filter(|k| self.allowed_side_maps.iter().any(|n| n == k.class_name()))
            .collect()
    }

    pub fn starting_kind(&self) -> Option<SideViewKind> {
        self.starting_side_map
            .as_deref()
            .and_then(SideViewKind::from_class_name)
    }
}
