use snafu::Snafu;

use crate::acta::ActaState;
use crate::validator::ValidationError;

/// Failures of the key/value store underneath the repository.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StorageError {
    #[snafu(display("I/O error on {path}: {source}"))]
    Io {
        source: std::io::Error,
        path: String,
    },

    #[snafu(display("Could not encode the value for key {key}: {source}"))]
    Encode {
        source: serde_json::Error,
        key: String,
    },

    #[snafu(display("Stored value for key {key} is corrupted: {source}"))]
    Decode {
        source: serde_json::Error,
        key: String,
    },

    #[snafu(display("Acta {index} stored under {key} is malformed: {reason}"))]
    Malformed {
        key: String,
        index: usize,
        reason: String,
    },

    #[snafu(display("Store file {path} is not a valid document: {source}"))]
    Document {
        source: serde_json::Error,
        path: String,
    },

    #[snafu(display("Storage backend failure: {message}"))]
    Backend { message: String },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Why a state machine or navigation operation did not go through.
///
/// Every variant is recoverable: the operator corrects the input and retries.
/// Storage failures are reported as such so that a failed save is never taken
/// for a successful one.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ActaError {
    #[snafu(context(false), display("{source}"))]
    Rejected { source: ValidationError },

    #[snafu(display("Cannot {operation} while the acta is {state}"))]
    InvalidTransition {
        operation: &'static str,
        state: ActaState,
    },

    #[snafu(display("Mesa number {mesa} is not a 6-digit number"))]
    InvalidMesaNumber { mesa: u32 },

    #[snafu(display("Mesa {mesa:06} was not found in the reference data"))]
    MesaNotFound { mesa: u32 },

    #[snafu(display("Cannot finalize an acta without votes"))]
    NoEntries,

    #[snafu(display(
        "The acta has {entries} votes but this mesa's TCV is {}",
        tcv.map(|t| t.to_string()).unwrap_or_else(|| "unknown".to_string())
    ))]
    TcvMismatch { entries: usize, tcv: Option<u32> },

    #[snafu(display("Only the last vote (table number {last}) can be edited, not {table_number}"))]
    NotLastEntry { table_number: u32, last: u32 },

    #[snafu(display("There is no vote to edit yet"))]
    NothingToEdit,

    #[snafu(display(
        "Cédulas excedentes can only be entered once all {total_electores} votes are recorded ({entries} so far)"
    ))]
    CedulasBeforeComplete { entries: usize, total_electores: u32 },

    #[snafu(display("Unknown election category {category}"))]
    UnknownCategory { category: String },

    #[snafu(display("Category {category} has no acta at index {index} ({len} actas)"))]
    ActaIndexOutOfRange {
        category: String,
        index: usize,
        len: usize,
    },

    #[snafu(context(false), display("The acta could not be saved: {source}"))]
    Storage { source: StorageError },

    #[snafu(display(
        "The acta was finalized but partial recount mode for {circunscripcion} could not be turned off: {source}"
    ))]
    PartialRecountNotCleared {
        circunscripcion: String,
        source: StorageError,
    },
}

pub type ActaResult<T> = Result<T, ActaError>;
