//! Immutable configuration generations.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::model::InterceptEntry;

/// Parser output before a generation number has been assigned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedConfig {
    pub by_layer: HashMap<String, InterceptEntry>,
    pub layers_with_default: BTreeSet<String>,
}

/// One fully parsed configuration generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigSnapshot {
    pub by_layer: HashMap<String, InterceptEntry>,
    pub layers_with_default: BTreeSet<String>,
    pub generation: u64,
}

impl ConfigSnapshot {
    /// The snapshot a registry starts from before anything is installed.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_parsed(parsed: ParsedConfig, generation: u64) -> Self {
        Self {
            by_layer: parsed.by_layer,
            layers_with_default: parsed.layers_with_default,
            generation,
        }
    }

    pub fn layer(&self, layer: &str) -> Option<&InterceptEntry> {
        self.by_layer.get(layer)
    }

    /// Configured layer names, sorted.
    pub fn layers(&self) -> Vec<&str> {
        let mut layers: Vec<&str> = self.by_layer.keys().map(String::as_str).collect();
        layers.sort_unstable();
        layers
    }
}
