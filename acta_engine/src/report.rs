use log::debug;
use serde::Serialize;

use crate::acta::Acta;
use crate::context::AppContext;
use crate::reference::ReferenceData;
use crate::storage::StorageAdapter;
use crate::tally::{tally_entries, TallyReport};

/// What is handed over for the printed acta: the record itself and its tally.
#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct ActaReport {
    pub category: String,
    pub acta: Acta,
    pub tally: TallyReport,
}

/// Tallies an acta against the organizations enabled for it.
///
/// The matrix is as wide as the largest preferential limit of the acta's
/// circunscripción.
pub async fn build_report<S: StorageAdapter, R: ReferenceData>(
    ctx: &AppContext<S, R>,
    category: &str,
    acta: &Acta,
) -> ActaReport {
    let organizations = ctx.tally_organizations(category, acta).await;
    let limits = ctx.reference.vote_limits(
        category,
        &acta.selected_location.circunscripcion_electoral,
    );
    debug!(
        "build_report: {} {} against {} organizations",
        category,
        acta.acta_number,
        organizations.len()
    );
    let tally = tally_entries(
        &acta.vote_entries,
        &organizations,
        limits.max_preferential_number(),
        acta.total_electores,
    );
    ActaReport {
        category: category.to_string(),
        acta: acta.clone(),
        tally,
    }
}
