use crate::engine::colour::group::GroupSpec;
use crate::engine::colour::style::{StyleSpec, Stylesheet};
use constants::render_settings::DEFAULT_RESOLUTION;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root attributes of a chunk store, as written by the dataset exporter.
/// Unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub total: u64,
    #[serde(default = "default_resolution")]
    pub resolution: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks: Option<u32>,
    #[serde(default)]
    pub styles: Vec<String>,
    #[serde(default)]
    pub stylesheet: BTreeMap<String, StyleSpec>,
    #[serde(default)]
    pub groups: BTreeMap<String, GroupSpec>,
    /// World offset added back to positions on export.
    #[serde(default)]
    pub origin: [f64; 3],
}

fn default_resolution() -> f32 {
    DEFAULT_RESOLUTION
}

impl Default for DatasetMetadata {
    fn default() -> Self {
        Self {
            total: 0,
            resolution: DEFAULT_RESOLUTION,
            chunks: None,
            styles: Vec::new(),
            stylesheet: BTreeMap::new(),
            groups: BTreeMap::new(),
            origin: [0.0; 3],
        }
    }
}

impl DatasetMetadata {
    /// Stylesheet for rows with `attribute_count` columns.
    pub fn stylesheet(&self, attribute_count: usize, fallback: StyleSpec) -> Stylesheet {
        Stylesheet::new(
            self.styles.clone(),
            self.stylesheet.clone(),
            attribute_count,
            fallback,
        )
    }

    pub fn group(&self, name: &str) -> Option<&GroupSpec> {
        self.groups.get(name)
    }

    /// Group names in a stable order, one toggle each.
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }
}
