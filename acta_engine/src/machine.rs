//! The lifecycle of one acta.
//!
//! ```text
//! Empty ──load_mesa_info──▶ MesaLoaded ──commit_mesa_data──▶ SessionActive ──finalize──▶ Finalized
//!                                                              │      ▲
//!                                                        pause │      │ resume
//!                                                              ▼      │
//!                                                               Paused
//! ```
//!
//! `reinitialize` goes back to `Empty` from anywhere.
//!
//! Every persisted transition works on a copy of the acta. The copy is saved
//! through the repository and only replaces the machine's acta once the save
//! went through: a failed save leaves the machine exactly as it was.

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use snafu::{ensure, OptionExt};

use crate::acta::{Acta, ActaState, SelectedLocation, VoteDraft, VoteEntry};
use crate::context::AppContext;
use crate::error::*;
use crate::ledger::ActaRef;
use crate::reference::{resolve_circunscripcion, ReferenceData};
use crate::storage::StorageAdapter;
use crate::validator::{
    can_add_entry, validate_entry, validate_mesa_commit, MesaAlreadyFinalizedSnafu,
    ValidationError,
};

pub const MAX_MESA_NUMBER: u32 = 999_999;

/// Time spent paused during the current session. Display only: it does not
/// change any count.
#[derive(Eq, PartialEq, Debug, Clone)]
struct PauseClock {
    paused_since: Option<DateTime<Utc>>,
    paused_total: Duration,
}

impl Default for PauseClock {
    fn default() -> Self {
        PauseClock {
            paused_since: None,
            paused_total: Duration::zero(),
        }
    }
}

/// Drives one acta of one category through its lifecycle.
#[derive(Debug, Clone)]
pub struct ActaMachine {
    category: String,
    index: usize,
    acta: Acta,
    pause: PauseClock,
}

impl ActaMachine {
    pub fn new(category: &str, index: usize, acta: Acta) -> ActaMachine {
        ActaMachine {
            category: category.to_string(),
            index,
            acta,
            pause: PauseClock::default(),
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    /// Position of the acta in its category.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn acta(&self) -> &Acta {
        &self.acta
    }

    pub fn acta_ref(&self) -> ActaRef {
        ActaRef::new(&self.category, self.index)
    }

    pub fn state(&self) -> ActaState {
        match self.acta.state() {
            ActaState::SessionActive if self.pause.paused_since.is_some() => ActaState::Paused,
            s => s,
        }
    }

    fn require(&self, operation: &'static str, allowed: &[ActaState]) -> ActaResult<()> {
        let state = self.state();
        ensure!(
            allowed.contains(&state),
            InvalidTransitionSnafu { operation, state }
        );
        Ok(())
    }

    /// Saves the working copy and adopts it once the save succeeded.
    async fn commit<S: StorageAdapter, R: ReferenceData>(
        &mut self,
        ctx: &AppContext<S, R>,
        working: Acta,
    ) -> ActaResult<()> {
        let index = ctx
            .repository
            .save_acta(&self.category, self.index, &working)
            .await?;
        if index != self.index {
            debug!(
                "commit: acta of {} moved from index {} to {}",
                self.category, self.index, index
            );
        }
        self.index = index;
        self.acta = working;
        Ok(())
    }

    // **** Mesa ****

    /// Stages the data of a mesa from the reference data. Nothing is saved yet.
    pub fn load_mesa_info<S: StorageAdapter, R: ReferenceData>(
        &mut self,
        ctx: &AppContext<S, R>,
        mesa_number: u32,
    ) -> ActaResult<()> {
        self.require("load a mesa", &[ActaState::Empty, ActaState::MesaLoaded])?;
        ensure!(
            (1..=MAX_MESA_NUMBER).contains(&mesa_number),
            InvalidMesaNumberSnafu { mesa: mesa_number }
        );
        let info = ctx
            .reference
            .lookup_mesa(mesa_number)
            .context(MesaNotFoundSnafu { mesa: mesa_number })?;

        let circunscripcion =
            resolve_circunscripcion(&ctx.reference, &self.category, &info.circunscripcion);
        if circunscripcion.is_empty() {
            warn!(
                "load_mesa_info: {} is not contested in {} for {}",
                self.category, info.circunscripcion, mesa_number
            );
        }
        self.acta.vote_limits = ctx
            .reference
            .vote_limits(&self.category, &circunscripcion);
        self.acta.mesa_number = mesa_number;
        self.acta.total_electores = info.total_electores;
        self.acta.selected_location = SelectedLocation {
            departamento: info.departamento,
            provincia: info.provincia,
            distrito: info.distrito,
            jee: info.jee.unwrap_or_default(),
            circunscripcion_electoral: circunscripcion,
        };
        self.acta.are_mesa_fields_locked = true;
        info!(
            "Loaded mesa {:06} for {}: {} electores",
            mesa_number, self.category, self.acta.total_electores
        );
        Ok(())
    }

    /// Picks the JEE of a staged mesa.
    pub fn assign_jee(&mut self, jee: &str) -> ActaResult<()> {
        self.require("assign a JEE", &[ActaState::MesaLoaded])?;
        self.acta.selected_location.jee = jee.trim().to_string();
        Ok(())
    }

    /// Saves the staged mesa and opens the counting session.
    pub async fn commit_mesa_data<S: StorageAdapter, R: ReferenceData>(
        &mut self,
        ctx: &AppContext<S, R>,
    ) -> ActaResult<()> {
        self.require("save the mesa data", &[ActaState::MesaLoaded])?;
        let mesa_number = self.acta.mesa_number;
        let circunscripcion = self
            .acta
            .selected_location
            .circunscripcion_electoral
            .clone();

        let partial_recount = ctx.repository.is_partial_recount(&circunscripcion).await;
        let enabled = ctx
            .enabled_organizations(&circunscripcion, &self.category, partial_recount)
            .await;
        validate_mesa_commit(mesa_number, &self.acta.selected_location, &enabled)?;

        let ledger = ctx.ledger().await;
        ensure!(
            !ledger.is_mesa_finalized(mesa_number, &self.category, Some(self.index)),
            MesaAlreadyFinalizedSnafu {
                mesa: mesa_number,
                category: self.category.clone()
            }
        );

        let me = self.acta_ref();
        let mut working = self.acta.clone();
        working.start_time = Some(Utc::now());
        working.is_mesa_data_saved = true;
        working.is_partial_recount = partial_recount;
        working.acta_number = working.derive_acta_number(&self.category);
        if partial_recount {
            working.counter_mesa = 0;
            working.tcv = None;
        } else {
            working.counter_mesa = ledger.count_saved_actas(mesa_number, Some(&me)) as u32 + 1;
            if working.counter_mesa == 1 {
                working.tcv = Some(working.vote_entries.len() as u32);
            } else {
                working.tcv = ledger.find_tcv(mesa_number, Some(&me));
                if let Some(cedulas) = ledger.find_cedulas_excedentes(mesa_number, Some(&me)) {
                    working.cedulas_excedentes = cedulas;
                }
            }
        }
        info!(
            "Mesa {:06} saved for {} (acta {}): counter {}, tcv {:?}, partial recount {}",
            mesa_number,
            self.category,
            working.acta_number,
            working.counter_mesa,
            working.tcv,
            partial_recount
        );
        self.commit(ctx, working).await
    }

    // **** Votes ****

    fn entry_from_draft<S: StorageAdapter, R: ReferenceData>(
        &self,
        ctx: &AppContext<S, R>,
        draft: &VoteDraft,
        table_number: u32,
    ) -> ActaResult<VoteEntry> {
        let preferential = ctx.preferential_config(&self.category);
        validate_entry(draft, &self.acta.vote_limits, &preferential)?;
        let party = draft.party.clone().ok_or(ValidationError::PartyNotSelected)?;
        // Disabled slots are never stored, whatever the draft holds.
        let slot = |enabled: bool, value: Option<u32>| if enabled { value } else { None };
        Ok(VoteEntry {
            table_number,
            party,
            preferential_vote1: slot(preferential.has_preferential1, draft.preferential1()),
            preferential_vote2: slot(preferential.has_preferential2, draft.preferential2()),
        })
    }

    fn track_tcv(working: &mut Acta) {
        if working.is_first_count() {
            working.tcv = Some(working.vote_entries.len() as u32);
        }
    }

    /// Records the next ballot. Returns its table number.
    pub async fn add_vote_entry<S: StorageAdapter, R: ReferenceData>(
        &mut self,
        ctx: &AppContext<S, R>,
        draft: &VoteDraft,
    ) -> ActaResult<u32> {
        self.require("add a vote", &[ActaState::SessionActive])?;
        can_add_entry(self.acta.vote_entries.len(), self.acta.total_electores)?;
        let table_number = self.acta.next_table_number();
        let entry = self.entry_from_draft(ctx, draft, table_number)?;

        let mut working = self.acta.clone();
        working.vote_entries.push(entry);
        Self::track_tcv(&mut working);
        self.commit(ctx, working).await?;
        debug!(
            "add_vote_entry: {} vote {} recorded",
            self.category, table_number
        );
        Ok(table_number)
    }

    /// Corrects a ballot. Only the most recent one can be corrected.
    pub async fn edit_entry<S: StorageAdapter, R: ReferenceData>(
        &mut self,
        ctx: &AppContext<S, R>,
        table_number: u32,
        draft: &VoteDraft,
    ) -> ActaResult<()> {
        self.require("edit a vote", &[ActaState::SessionActive])?;
        let last = self
            .acta
            .last_entry()
            .map(|e| e.table_number)
            .context(NothingToEditSnafu)?;
        ensure!(
            last == table_number,
            NotLastEntrySnafu { table_number, last }
        );
        let entry = self.entry_from_draft(ctx, draft, table_number)?;

        let mut working = self.acta.clone();
        if let Some(slot) = working.vote_entries.last_mut() {
            *slot = entry;
        }
        Self::track_tcv(&mut working);
        self.commit(ctx, working).await
    }

    pub async fn edit_last_entry<S: StorageAdapter, R: ReferenceData>(
        &mut self,
        ctx: &AppContext<S, R>,
        draft: &VoteDraft,
    ) -> ActaResult<()> {
        let last = self
            .acta
            .last_entry()
            .map(|e| e.table_number)
            .context(NothingToEditSnafu)?;
        self.edit_entry(ctx, last, draft).await
    }

    /// Records the surplus ballots, once every elector of the mesa has been counted.
    pub async fn set_cedulas_excedentes<S: StorageAdapter, R: ReferenceData>(
        &mut self,
        ctx: &AppContext<S, R>,
        cedulas: u32,
    ) -> ActaResult<()> {
        self.require("enter the cédulas excedentes", &[ActaState::SessionActive])?;
        let entries = self.acta.vote_entries.len();
        let total_electores = self.acta.total_electores;
        ensure!(
            entries == total_electores as usize,
            CedulasBeforeCompleteSnafu {
                entries,
                total_electores
            }
        );
        let mut working = self.acta.clone();
        working.cedulas_excedentes = cedulas;
        self.commit(ctx, working).await
    }

    // **** Session clock ****

    pub fn pause(&mut self) -> ActaResult<()> {
        self.pause_at(Utc::now())
    }

    pub fn pause_at(&mut self, now: DateTime<Utc>) -> ActaResult<()> {
        self.require("pause", &[ActaState::SessionActive])?;
        self.pause.paused_since = Some(now);
        Ok(())
    }

    pub fn resume(&mut self) -> ActaResult<()> {
        self.resume_at(Utc::now())
    }

    pub fn resume_at(&mut self, now: DateTime<Utc>) -> ActaResult<()> {
        self.require("resume", &[ActaState::Paused])?;
        if let Some(since) = self.pause.paused_since.take() {
            self.pause.paused_total = self.pause.paused_total + (now - since);
        }
        Ok(())
    }

    /// Counting time since the session started, pauses excluded.
    pub fn active_duration(&self, now: DateTime<Utc>) -> Duration {
        let start = match self.acta.start_time {
            Some(start) => start,
            None => return Duration::zero(),
        };
        let end = self.acta.end_time.unwrap_or(now);
        let current_pause = self
            .pause
            .paused_since
            .map(|since| end - since)
            .unwrap_or_else(Duration::zero);
        (end - start) - self.pause.paused_total - current_pause
    }

    // **** Closing ****

    /// Closes the acta for good.
    pub async fn finalize<S: StorageAdapter, R: ReferenceData>(
        &mut self,
        ctx: &AppContext<S, R>,
    ) -> ActaResult<()> {
        self.require("finalize", &[ActaState::SessionActive])?;
        let entries = self.acta.vote_entries.len();
        ensure!(entries > 0, NoEntriesSnafu);
        if self.acta.is_reused_mesa() {
            ensure!(
                self.acta.tcv == Some(entries as u32),
                TcvMismatchSnafu {
                    entries,
                    tcv: self.acta.tcv
                }
            );
        }
        let mesa_number = self.acta.mesa_number;
        let ledger = ctx.ledger().await;
        ensure!(
            !ledger.is_mesa_finalized(mesa_number, &self.category, Some(self.index)),
            MesaAlreadyFinalizedSnafu {
                mesa: mesa_number,
                category: self.category.clone()
            }
        );

        let mut working = self.acta.clone();
        working.end_time = Some(Utc::now());
        working.is_form_finalized = true;
        self.commit(ctx, working).await?;
        info!(
            "Acta {} finalized with {} votes",
            self.acta.acta_number, entries
        );

        let circunscripcion = self.acta.selected_location.circunscripcion_electoral.clone();
        if self.acta.is_partial_recount && ctx.repository.is_partial_recount(&circunscripcion).await
        {
            info!("Partial recount mode turned off for {}", circunscripcion);
            if let Err(source) = ctx
                .repository
                .set_partial_recount(&circunscripcion, false)
                .await
            {
                return Err(ActaError::PartialRecountNotCleared {
                    circunscripcion,
                    source,
                });
            }
        }
        Ok(())
    }

    /// Records that the conformity document of a finalized acta was produced.
    pub async fn mark_conformidad_downloaded<S: StorageAdapter, R: ReferenceData>(
        &mut self,
        ctx: &AppContext<S, R>,
    ) -> ActaResult<()> {
        self.require("record the conformidad download", &[ActaState::Finalized])?;
        let mut working = self.acta.clone();
        working.is_conformidad_downloaded = true;
        self.commit(ctx, working).await
    }

    /// Resets the acta to an empty record, whatever its state. Operator confirmed.
    pub async fn reinitialize<S: StorageAdapter, R: ReferenceData>(
        &mut self,
        ctx: &AppContext<S, R>,
    ) -> ActaResult<()> {
        warn!(
            "Reinitializing acta {} of {} (mesa {:06}, {} votes)",
            self.index,
            self.category,
            self.acta.mesa_number,
            self.acta.vote_entries.len()
        );
        self.commit(ctx, Acta::default()).await?;
        self.pause = PauseClock::default();
        Ok(())
    }
}
