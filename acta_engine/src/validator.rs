//! Rule checks for a prospective vote and for committing mesa data.
//!
//! Everything here is pure. The state machine decides what to do with the
//! outcome.

use snafu::{ensure, Snafu};

use crate::acta::{Party, SelectedLocation, VoteDraft};
use crate::config::{Organization, PreferentialConfig, VoteLimits};

#[derive(Eq, PartialEq, Debug, Clone, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ValidationError {
    #[snafu(display("Select an organization, BLANCO or NULO"))]
    PartyNotSelected,

    #[snafu(display("Preferential vote 1 ({value}) exceeds the limit of {limit}"))]
    Preferential1OverLimit { value: u32, limit: u32 },

    #[snafu(display("Preferential vote 2 ({value}) exceeds the limit of {limit}"))]
    Preferential2OverLimit { value: u32, limit: u32 },

    #[snafu(display("A {party} vote cannot carry preferential votes"))]
    PreferentialOnSpecialVote { party: Party },

    #[snafu(display("Both preferential votes are {value}: they must differ"))]
    DuplicatePreferential { value: u32 },

    #[snafu(display("All {total_electores} electores of this mesa have been counted"))]
    CapacityReached { total_electores: u32 },

    #[snafu(display("Enter a mesa number first"))]
    MissingMesaNumber,

    #[snafu(display("The {field} of the mesa is missing"))]
    MissingLocationField { field: &'static str },

    #[snafu(display("No circunscripción electoral is selected"))]
    MissingCircunscripcion,

    #[snafu(display("No political organization is enabled for {circunscripcion}"))]
    NoOrganizationsEnabled { circunscripcion: String },

    #[snafu(display("Mesa {mesa:06} has already been finalized for {category}"))]
    MesaAlreadyFinalized { mesa: u32, category: String },
}

pub type ValidationResult = Result<(), ValidationError>;

/// Checks a single vote before it is recorded.
///
/// The checks run in a fixed order and the first failure is returned:
/// party selected, preferential 1 within its limit, preferential 2 within its
/// limit, no preferential on BLANCO/NULO, distinct preferential values.
/// Disabled slots are not looked at.
pub fn validate_entry(
    draft: &VoteDraft,
    limits: &VoteLimits,
    preferential: &PreferentialConfig,
) -> ValidationResult {
    let party = draft.party.as_ref().ok_or(ValidationError::PartyNotSelected)?;

    let vote1 = if preferential.has_preferential1 {
        draft.preferential1()
    } else {
        None
    };
    let vote2 = if preferential.has_preferential2 {
        draft.preferential2()
    } else {
        None
    };

    if let Some(value) = vote1 {
        ensure!(
            value <= limits.preferential1,
            Preferential1OverLimitSnafu {
                value,
                limit: limits.preferential1
            }
        );
    }
    if let Some(value) = vote2 {
        ensure!(
            value <= limits.preferential2,
            Preferential2OverLimitSnafu {
                value,
                limit: limits.preferential2
            }
        );
    }

    ensure!(
        !(party.is_special() && (vote1.is_some() || vote2.is_some())),
        PreferentialOnSpecialVoteSnafu {
            party: party.clone()
        }
    );

    if preferential.both_enabled() {
        if let (Some(v1), Some(v2)) = (vote1, vote2) {
            ensure!(v1 != v2, DuplicatePreferentialSnafu { value: v1 });
        }
    }
    Ok(())
}

/// A new vote fits only while fewer votes than electores have been recorded.
pub fn can_add_entry(current_count: usize, total_electores: u32) -> ValidationResult {
    ensure!(
        current_count < total_electores as usize,
        CapacityReachedSnafu { total_electores }
    );
    Ok(())
}

/// Checks the mesa-level preconditions of a commit.
///
/// `enabled` is the organization selection in force for the circunscripción.
/// Uniqueness of the mesa across actas is checked separately, against the ledger.
pub fn validate_mesa_commit(
    mesa_number: u32,
    location: &SelectedLocation,
    enabled: &[Organization],
) -> ValidationResult {
    ensure!(mesa_number != 0, MissingMesaNumberSnafu);
    let fields: [(&'static str, &str); 4] = [
        ("departamento", &location.departamento),
        ("provincia", &location.provincia),
        ("distrito", &location.distrito),
        ("jee", &location.jee),
    ];
    for (field, value) in fields {
        ensure!(!value.trim().is_empty(), MissingLocationFieldSnafu { field });
    }
    let circunscripcion = location.circunscripcion_electoral.trim();
    ensure!(!circunscripcion.is_empty(), MissingCircunscripcionSnafu);
    ensure!(
        enabled.iter().any(|o| !o.is_special()),
        NoOrganizationsEnabledSnafu { circunscripcion }
    );
    Ok(())
}
