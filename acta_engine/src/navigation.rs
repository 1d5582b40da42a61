//! Moving between election categories and between the actas of a category.
//!
//! Each category holds its own list of actas and remembers which one the
//! operator was working on. Opening a category that has no acta yet creates
//! an empty one, so there is always something to work on.

use log::{debug, info};
use serde::Serialize;
use snafu::ensure;

use crate::acta::{Acta, ActaState};
use crate::context::AppContext;
use crate::error::*;
use crate::machine::ActaMachine;
use crate::reference::ReferenceData;
use crate::storage::StorageAdapter;

/// One line of the acta list of a category.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct ActaSummary {
    pub index: usize,
    #[serde(rename = "mesaNumber")]
    pub mesa_number: u32,
    #[serde(rename = "actaNumber")]
    pub acta_number: String,
    pub state: ActaState,
    pub entries: usize,
}

fn require_category<S: StorageAdapter, R: ReferenceData>(
    ctx: &AppContext<S, R>,
    category: &str,
) -> ActaResult<()> {
    ensure!(
        ctx.config.has_category(category),
        UnknownCategorySnafu { category }
    );
    Ok(())
}

/// Opens the active acta of a category, creating an empty one when the
/// category has none.
async fn open_category<S: StorageAdapter, R: ReferenceData>(
    ctx: &AppContext<S, R>,
    category: &str,
) -> ActaResult<ActaMachine> {
    let actas = ctx.repository.actas(category).await;
    if actas.is_empty() {
        let index = ctx.repository.append_acta(category, &Acta::default()).await?;
        debug!("open_category: created the first acta of {}", category);
        return Ok(ActaMachine::new(category, index, Acta::default()));
    }
    let stored = ctx.repository.active_acta_index(category).await;
    let index = stored.min(actas.len() - 1);
    if index != stored {
        debug!(
            "open_category: active index {} of {} out of range, using {}",
            stored, category, index
        );
    }
    let acta = actas.into_iter().nth(index).unwrap_or_default();
    Ok(ActaMachine::new(category, index, acta))
}

/// Reopens where the operator left off: the active category (or the default
/// one) and its active acta.
pub async fn open_active<S: StorageAdapter, R: ReferenceData>(
    ctx: &AppContext<S, R>,
) -> ActaResult<ActaMachine> {
    let category = match ctx.repository.active_category().await {
        Some(c) if ctx.config.has_category(&c) => c,
        Some(c) => {
            info!(
                "Stored category {} is not configured, opening {}",
                c, ctx.config.default_category
            );
            ctx.config.default_category.clone()
        }
        None => ctx.config.default_category.clone(),
    };
    open_category(ctx, &category).await
}

pub async fn switch_category<S: StorageAdapter, R: ReferenceData>(
    ctx: &AppContext<S, R>,
    category: &str,
) -> ActaResult<ActaMachine> {
    require_category(ctx, category)?;
    ctx.repository.save_active_category(category).await?;
    info!("Switched to category {}", category);
    open_category(ctx, category).await
}

/// Starts a new, empty acta in a category and makes it the active one.
pub async fn new_acta<S: StorageAdapter, R: ReferenceData>(
    ctx: &AppContext<S, R>,
    category: &str,
) -> ActaResult<ActaMachine> {
    require_category(ctx, category)?;
    let index = ctx.repository.append_acta(category, &Acta::default()).await?;
    info!("New acta {} in {}", index, category);
    Ok(ActaMachine::new(category, index, Acta::default()))
}

pub async fn select_acta<S: StorageAdapter, R: ReferenceData>(
    ctx: &AppContext<S, R>,
    category: &str,
    index: usize,
) -> ActaResult<ActaMachine> {
    require_category(ctx, category)?;
    let actas = ctx.repository.actas(category).await;
    let len = actas.len();
    let acta = actas
        .into_iter()
        .nth(index)
        .ok_or_else(|| ActaError::ActaIndexOutOfRange {
            category: category.to_string(),
            index,
            len,
        })?;
    ctx.repository.save_active_acta_index(category, index).await?;
    Ok(ActaMachine::new(category, index, acta))
}

pub async fn list_actas<S: StorageAdapter, R: ReferenceData>(
    ctx: &AppContext<S, R>,
    category: &str,
) -> ActaResult<Vec<ActaSummary>> {
    require_category(ctx, category)?;
    let summaries = ctx
        .repository
        .actas(category)
        .await
        .into_iter()
        .enumerate()
        .map(|(index, acta)| ActaSummary {
            index,
            mesa_number: acta.mesa_number,
            state: acta.state(),
            entries: acta.vote_entries.len(),
            acta_number: acta.acta_number,
        })
        .collect();
    Ok(summaries)
}
