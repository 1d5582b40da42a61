//! The geographic and catalog data the engine consults but does not own.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::{Organization, VoteLimits};

/// What the reference data knows about a mesa.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct MesaInfo {
    pub departamento: String,
    pub provincia: String,
    pub distrito: String,
    #[serde(rename = "circunscripcionElectoral")]
    pub circunscripcion: String,
    #[serde(rename = "totalElectores")]
    pub total_electores: u32,
    /// Not every source carries the jury; the operator picks it otherwise.
    #[serde(default)]
    pub jee: Option<String>,
}

pub trait ReferenceData: Send + Sync {
    fn lookup_mesa(&self, mesa_number: u32) -> Option<MesaInfo>;

    /// The circunscripciones in which a category is contested.
    fn circunscripciones(&self, category: &str) -> Vec<String>;

    fn vote_limits(&self, category: &str, circunscripcion: &str) -> VoteLimits;

    /// The organization catalog, BLANCO and NULO included, in display order.
    fn organizations(&self) -> Vec<Organization>;
}

/// Picks the circunscripción an acta is counted in.
///
/// The mesa's own circunscripción when the category is contested there; the
/// only circunscripción of a single-district (national) category otherwise.
/// An empty string when neither applies.
pub fn resolve_circunscripcion(
    reference: &dyn ReferenceData,
    category: &str,
    mesa_circunscripcion: &str,
) -> String {
    let valid = reference.circunscripciones(category);
    if valid.iter().any(|c| c == mesa_circunscripcion) {
        mesa_circunscripcion.to_string()
    } else if valid.len() == 1 {
        valid[0].clone()
    } else {
        String::new()
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct VoteLimitRule {
    pub category: String,
    /// None applies to every circunscripción of the category.
    #[serde(default)]
    pub circunscripcion: Option<String>,
    pub limits: VoteLimits,
}

/// Reference data held in memory, typically deserialized from a JSON document.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticReference {
    #[serde(default)]
    pub mesas: BTreeMap<u32, MesaInfo>,
    #[serde(default)]
    pub circunscripciones: BTreeMap<String, Vec<String>>,
    #[serde(rename = "voteLimits", default)]
    pub vote_limits: Vec<VoteLimitRule>,
    #[serde(default)]
    pub organizations: Vec<Organization>,
}

impl StaticReference {
    pub fn new() -> StaticReference {
        StaticReference::default()
    }

    pub fn with_mesa(mut self, mesa_number: u32, info: MesaInfo) -> StaticReference {
        self.mesas.insert(mesa_number, info);
        self
    }

    pub fn with_circunscripciones(mut self, category: &str, circs: &[&str]) -> StaticReference {
        self.circunscripciones.insert(
            category.to_string(),
            circs.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    pub fn with_vote_limits(
        mut self,
        category: &str,
        circunscripcion: Option<&str>,
        limits: VoteLimits,
    ) -> StaticReference {
        self.vote_limits.push(VoteLimitRule {
            category: category.to_string(),
            circunscripcion: circunscripcion.map(|c| c.to_string()),
            limits,
        });
        self
    }

    pub fn with_organizations(mut self, organizations: Vec<Organization>) -> StaticReference {
        self.organizations = organizations;
        self
    }
}

impl ReferenceData for StaticReference {
    fn lookup_mesa(&self, mesa_number: u32) -> Option<MesaInfo> {
        self.mesas.get(&mesa_number).cloned()
    }

    fn circunscripciones(&self, category: &str) -> Vec<String> {
        self.circunscripciones
            .get(category)
            .cloned()
            .unwrap_or_default()
    }

    fn vote_limits(&self, category: &str, circunscripcion: &str) -> VoteLimits {
        let specific = self.vote_limits.iter().find(|r| {
            r.category == category && r.circunscripcion.as_deref() == Some(circunscripcion)
        });
        let general = || {
            self.vote_limits
                .iter()
                .find(|r| r.category == category && r.circunscripcion.is_none())
        };
        specific
            .or_else(general)
            .map(|r| r.limits)
            .unwrap_or_default()
    }

    fn organizations(&self) -> Vec<Organization> {
        let mut orgs = self.organizations.clone();
        orgs.sort_by_key(|o| o.order);
        orgs
    }
}
