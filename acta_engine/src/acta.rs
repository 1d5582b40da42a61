// ********* Records *********

use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::VoteLimits;

pub const BLANCO: &str = "BLANCO";
pub const NULO: &str = "NULO";

/// The choice recorded on one ballot.
///
/// Persisted as the bare organization key, with the `BLANCO` / `NULO` literals
/// for the two special votes.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Party {
    Organization(String),
    Blanco,
    Nulo,
}

impl Party {
    pub fn key(&self) -> &str {
        match self {
            Party::Organization(key) => key.as_str(),
            Party::Blanco => BLANCO,
            Party::Nulo => NULO,
        }
    }

    /// Blank and null votes never carry preferential votes.
    pub fn is_special(&self) -> bool {
        matches!(self, Party::Blanco | Party::Nulo)
    }
}

impl From<String> for Party {
    fn from(key: String) -> Self {
        match key.as_str() {
            BLANCO => Party::Blanco,
            NULO => Party::Nulo,
            _ => Party::Organization(key),
        }
    }
}

impl From<&str> for Party {
    fn from(key: &str) -> Self {
        Party::from(key.to_string())
    }
}

impl From<Party> for String {
    fn from(party: Party) -> Self {
        party.key().to_string()
    }
}

impl Display for Party {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// One recorded ballot.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct VoteEntry {
    #[serde(rename = "tableNumber")]
    pub table_number: u32,
    pub party: Party,
    #[serde(rename = "preferentialVote1", default)]
    pub preferential_vote1: Option<u32>,
    #[serde(rename = "preferentialVote2", default)]
    pub preferential_vote2: Option<u32>,
}

/// A ballot as typed by the operator, before it is validated and numbered.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct VoteDraft {
    /// None while the operator has not picked an option.
    pub party: Option<Party>,
    pub preferential_vote1: Option<u32>,
    pub preferential_vote2: Option<u32>,
}

impl VoteDraft {
    pub fn party(party: impl Into<Party>) -> VoteDraft {
        VoteDraft {
            party: Some(party.into()),
            ..VoteDraft::default()
        }
    }

    pub fn with_preferential(mut self, vote1: Option<u32>, vote2: Option<u32>) -> VoteDraft {
        self.preferential_vote1 = vote1;
        self.preferential_vote2 = vote2;
        self
    }

    /// A zero in a preferential box means the box was left empty.
    pub fn preferential1(&self) -> Option<u32> {
        self.preferential_vote1.filter(|v| *v > 0)
    }

    pub fn preferential2(&self) -> Option<u32> {
        self.preferential_vote2.filter(|v| *v > 0)
    }
}

/// Where a mesa is, and which jury and electoral district it reports to.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectedLocation {
    #[serde(default)]
    pub departamento: String,
    #[serde(default)]
    pub provincia: String,
    #[serde(default)]
    pub distrito: String,
    #[serde(default)]
    pub jee: String,
    #[serde(rename = "circunscripcionElectoral", default)]
    pub circunscripcion_electoral: String,
}

/// The lifecycle state of an acta, as seen by the operator.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum ActaState {
    Empty,
    MesaLoaded,
    SessionActive,
    Paused,
    Finalized,
}

impl Display for ActaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ActaState::Empty => "empty",
            ActaState::MesaLoaded => "mesa loaded",
            ActaState::SessionActive => "session active",
            ActaState::Paused => "paused",
            ActaState::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

/// One ballot-count record: one mesa, one election category.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Acta {
    #[serde(rename = "mesaNumber", default)]
    pub mesa_number: u32,
    #[serde(rename = "actaNumber", default)]
    pub acta_number: String,
    #[serde(rename = "totalElectores", default)]
    pub total_electores: u32,
    #[serde(rename = "voteEntries", default)]
    pub vote_entries: Vec<VoteEntry>,
    #[serde(rename = "cedulasExcedentes", default)]
    pub cedulas_excedentes: u32,
    #[serde(default)]
    pub tcv: Option<u32>,
    /// Saved, non partial-recount actas of this mesa across every category,
    /// this one included, at the time its mesa data was committed.
    #[serde(rename = "counterMesa", default)]
    pub counter_mesa: u32,
    #[serde(rename = "isMesaDataSaved", default)]
    pub is_mesa_data_saved: bool,
    #[serde(rename = "isFormFinalized", default)]
    pub is_form_finalized: bool,
    #[serde(rename = "areMesaFieldsLocked", default)]
    pub are_mesa_fields_locked: bool,
    #[serde(rename = "isConformidadDownloaded", default)]
    pub is_conformidad_downloaded: bool,
    #[serde(rename = "isPartialRecount", default)]
    pub is_partial_recount: bool,
    #[serde(rename = "startTime", default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(rename = "endTime", default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(rename = "selectedLocation", default)]
    pub selected_location: SelectedLocation,
    #[serde(rename = "voteLimits", default)]
    pub vote_limits: VoteLimits,
}

impl Acta {
    /// The persisted part of the state. Pausing is a property of the running
    /// session, not of the record.
    pub fn state(&self) -> ActaState {
        if self.is_form_finalized {
            ActaState::Finalized
        } else if self.is_mesa_data_saved {
            ActaState::SessionActive
        } else if self.are_mesa_fields_locked {
            ActaState::MesaLoaded
        } else {
            ActaState::Empty
        }
    }

    /// True when this mesa is counted here for the first time: the tcv follows
    /// the number of entries.
    pub fn is_first_count(&self) -> bool {
        !self.is_partial_recount && self.counter_mesa == 1
    }

    /// True when another category already counted this mesa: the tcv is
    /// inherited and fixed.
    pub fn is_reused_mesa(&self) -> bool {
        !self.is_partial_recount && self.counter_mesa > 1
    }

    pub fn next_table_number(&self) -> u32 {
        self.vote_entries
            .iter()
            .map(|e| e.table_number)
            .max()
            .unwrap_or(0)
            + 1
    }

    pub fn last_entry(&self) -> Option<&VoteEntry> {
        self.vote_entries.last()
    }

    pub fn derive_acta_number(&self, category: &str) -> String {
        format!(
            "{:06}-{}-{}",
            self.mesa_number, self.selected_location.jee, category
        )
    }

    /// Checks the structural invariants a persisted acta must satisfy.
    pub(crate) fn check_integrity(&self) -> Result<(), String> {
        if self.vote_entries.len() > self.total_electores as usize {
            return Err(format!(
                "{} entries for {} electores",
                self.vote_entries.len(),
                self.total_electores
            ));
        }
        let mut previous = 0;
        for e in self.vote_entries.iter() {
            if e.table_number <= previous {
                return Err(format!(
                    "table number {} does not follow {}",
                    e.table_number, previous
                ));
            }
            previous = e.table_number;
            if e.party.is_special()
                && (e.preferential_vote1.unwrap_or(0) > 0 || e.preferential_vote2.unwrap_or(0) > 0)
            {
                return Err(format!(
                    "table number {} carries a preferential vote on {}",
                    e.table_number, e.party
                ));
            }
        }
        if self.is_form_finalized && !self.is_mesa_data_saved {
            return Err("finalized acta without saved mesa data".to_string());
        }
        Ok(())
    }
}

/// The actas recorded for one category, in creation order.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryData {
    #[serde(default)]
    pub actas: Vec<Acta>,
}
