//! The fixed set of model layers
//!
//! Every element lives in exactly one layer, and the layer is the first
//! segment of the element's id.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::id::IdError;

/// A named partition of the architecture model
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layer {
    Motivation,
    Business,
    Security,
    Application,
    Technology,
    Api,
    DataModel,
    DataStore,
    Ux,
    Navigation,
    Apm,
    Testing,
}

impl Layer {
    /// All layers, in model order
    pub const ALL: [Layer; 12] = [
        Layer::Motivation,
        Layer::Business,
        Layer::Security,
        Layer::Application,
        Layer::Technology,
        Layer::Api,
        Layer::DataModel,
        Layer::DataStore,
        Layer::Ux,
        Layer::Navigation,
        Layer::Apm,
        Layer::Testing,
    ];

    /// Returns the canonical (kebab-case) name of the layer
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Motivation => "motivation",
            Layer::Business => "business",
            Layer::Security => "security",
            Layer::Application => "application",
            Layer::Technology => "technology",
            Layer::Api => "api",
            Layer::DataModel => "data-model",
            Layer::DataStore => "data-store",
            Layer::Ux => "ux",
            Layer::Navigation => "navigation",
            Layer::Apm => "apm",
            Layer::Testing => "testing",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Layer {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Layer::ALL
            .iter()
            .copied()
            .find(|layer| layer.as_str() == s)
            .ok_or_else(|| IdError::UnknownLayer(s.to_string()))
    }
}
