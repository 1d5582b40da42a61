// ********* Configuration **********

use serde::{Deserialize, Serialize};

use crate::acta::Party;

/// Which preferential slots a category offers on its ballot.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PreferentialConfig {
    #[serde(rename = "hasPreferential1")]
    pub has_preferential1: bool,
    #[serde(rename = "hasPreferential2")]
    pub has_preferential2: bool,
}

impl PreferentialConfig {
    pub const NONE: PreferentialConfig = PreferentialConfig {
        has_preferential1: false,
        has_preferential2: false,
    };
    pub const SINGLE: PreferentialConfig = PreferentialConfig {
        has_preferential1: true,
        has_preferential2: false,
    };
    pub const DOUBLE: PreferentialConfig = PreferentialConfig {
        has_preferential1: true,
        has_preferential2: true,
    };

    pub fn both_enabled(&self) -> bool {
        self.has_preferential1 && self.has_preferential2
    }
}

/// Highest candidate number accepted in each preferential slot.
///
/// The limits depend on the category and, for district-based categories, on
/// the circunscripción (the number of seats differs from one district to the other).
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct VoteLimits {
    #[serde(rename = "preferential1")]
    pub preferential1: u32,
    #[serde(rename = "preferential2")]
    pub preferential2: u32,
}

impl VoteLimits {
    /// The largest candidate number any slot can hold. Used as the width of the
    /// preferential matrix.
    pub fn max_preferential_number(&self) -> u32 {
        self.preferential1.max(self.preferential2)
    }
}

/// An entry of the organization catalog.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub key: String,
    pub order: u32,
    pub name: String,
}

impl Organization {
    pub fn party(&self) -> Party {
        Party::from(self.key.clone())
    }

    /// BLANCO and NULO are listed in the catalog but are not political organizations.
    pub fn is_special(&self) -> bool {
        self.party().is_special()
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub name: String,
    pub preferential: PreferentialConfig,
}

/// Static configuration of the engine: the election categories open on this
/// workstation.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub categories: Vec<CategoryConfig>,
    #[serde(rename = "defaultCategory")]
    pub default_category: String,
}

impl EngineConfig {
    pub fn category(&self, name: &str) -> Option<&CategoryConfig> {
        self.categories.iter().find(|c| c.name == name)
    }

    pub fn has_category(&self, name: &str) -> bool {
        self.category(name).is_some()
    }

    /// Preferential slots for a category. Unknown categories have none.
    pub fn preferential_config(&self, category: &str) -> PreferentialConfig {
        self.category(category)
            .map(|c| c.preferential)
            .unwrap_or(PreferentialConfig::NONE)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        let category = |name: &str, preferential| CategoryConfig {
            name: name.to_string(),
            preferential,
        };
        EngineConfig {
            categories: vec![
                category("presidencial", PreferentialConfig::NONE),
                category("senadoresNacional", PreferentialConfig::DOUBLE),
                category("senadoresRegional", PreferentialConfig::SINGLE),
                category("diputados", PreferentialConfig::DOUBLE),
                category("parlamentoAndino", PreferentialConfig::DOUBLE),
            ],
            default_category: "presidencial".to_string(),
        }
    }
}
