/*!

Lifecycle engine for actas: the records of the manual count of one mesa for
one election category.

An [`ActaMachine`] drives one acta from the loading of its mesa to its
finalization. Each change is validated, then saved through an
[`ActaRepository`] before it becomes visible. The [`MesaLedger`] answers the
questions that span categories (has this mesa already been finalized, which
TCV does it carry), and [`tally_entries`] aggregates the ballots.

See the [manual] for the details.

*/

mod acta;
mod config;
mod context;
mod error;
mod ledger;
mod machine;
mod navigation;
mod reference;
mod report;
mod repository;
mod storage;
mod tally;
mod validator;

pub mod manual;

pub use crate::acta::*;
pub use crate::config::*;
pub use crate::context::AppContext;
pub use crate::error::{ActaError, ActaResult, StorageError, StorageResult};
pub use crate::ledger::{ActaRef, MesaLedger};
pub use crate::machine::{ActaMachine, MAX_MESA_NUMBER};
pub use crate::navigation::*;
pub use crate::reference::*;
pub use crate::report::{build_report, ActaReport};
pub use crate::repository::{ActaRepository, SelectionScope};
pub use crate::storage::{FileStorage, MemoryStorage, StorageAdapter};
pub use crate::tally::*;
pub use crate::validator::{
    can_add_entry, validate_entry, validate_mesa_commit, ValidationError, ValidationResult,
};
