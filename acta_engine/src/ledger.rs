use log::debug;
use std::collections::HashMap;

use crate::acta::Acta;
use crate::repository::ActaRepository;
use crate::storage::StorageAdapter;

/// Names one acta: its category and its position in the category.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct ActaRef {
    pub category: String,
    pub index: usize,
}

impl ActaRef {
    pub fn new(category: &str, index: usize) -> ActaRef {
        ActaRef {
            category: category.to_string(),
            index,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
struct MesaRecord {
    acta: ActaRef,
    saved: bool,
    finalized: bool,
    partial_recount: bool,
    tcv: Option<u32>,
    cedulas_excedentes: u32,
}

impl MesaRecord {
    fn counts_as_saved(&self) -> bool {
        self.saved && !self.partial_recount
    }
}

/// Every acta of every category, indexed by mesa number.
///
/// A mesa is a physical table: the same mesa is counted once per category and
/// the turnout recorded by the first count holds for the others. The ledger
/// answers those cross-category questions from a single scan of the store.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct MesaLedger {
    records: HashMap<u32, Vec<MesaRecord>>,
}

impl MesaLedger {
    pub async fn load<S: StorageAdapter>(repository: &ActaRepository<S>) -> MesaLedger {
        let mut ledger = MesaLedger::default();
        for category in repository.list_categories().await {
            let actas = repository.actas(&category).await;
            ledger.add_category(&category, &actas);
        }
        debug!("MesaLedger: {} mesas", ledger.records.len());
        ledger
    }

    pub fn add_category(&mut self, category: &str, actas: &[Acta]) {
        for (index, acta) in actas.iter().enumerate() {
            if acta.mesa_number == 0 {
                continue;
            }
            self.records
                .entry(acta.mesa_number)
                .or_default()
                .push(MesaRecord {
                    acta: ActaRef::new(category, index),
                    saved: acta.is_mesa_data_saved,
                    finalized: acta.is_form_finalized,
                    partial_recount: acta.is_partial_recount,
                    tcv: acta.tcv,
                    cedulas_excedentes: acta.cedulas_excedentes,
                });
        }
    }

    fn others<'a>(
        &'a self,
        mesa_number: u32,
        exclude: Option<&'a ActaRef>,
    ) -> impl Iterator<Item = &'a MesaRecord> + 'a {
        self.records
            .get(&mesa_number)
            .into_iter()
            .flatten()
            .filter(move |r| Some(&r.acta) != exclude)
    }

    /// True when another acta of `category` already finalized this mesa.
    pub fn is_mesa_finalized(
        &self,
        mesa_number: u32,
        category: &str,
        exclude_index: Option<usize>,
    ) -> bool {
        let exclude = exclude_index.map(|index| ActaRef::new(category, index));
        let finalized = self
            .others(mesa_number, exclude.as_ref())
            .any(|r| r.acta.category == category && r.finalized);
        finalized
    }

    /// Saved actas of this mesa across all categories, partial recounts left out.
    pub fn count_saved_actas(&self, mesa_number: u32, exclude: Option<&ActaRef>) -> usize {
        self.others(mesa_number, exclude)
            .filter(|r| r.counts_as_saved())
            .count()
    }

    /// The turnout already recorded for this mesa by another acta.
    pub fn find_tcv(&self, mesa_number: u32, exclude: Option<&ActaRef>) -> Option<u32> {
        self.others(mesa_number, exclude).find_map(|r| r.tcv)
    }

    /// The surplus ballots already recorded for this mesa. Zero counts as not recorded.
    pub fn find_cedulas_excedentes(
        &self,
        mesa_number: u32,
        exclude: Option<&ActaRef>,
    ) -> Option<u32> {
        self.others(mesa_number, exclude)
            .filter(|r| r.counts_as_saved() && r.cedulas_excedentes > 0)
            .map(|r| r.cedulas_excedentes)
            .next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn acta(mesa_number: u32, saved: bool, finalized: bool, tcv: Option<u32>) -> Acta {
        Acta {
            mesa_number,
            is_mesa_data_saved: saved,
            is_form_finalized: finalized,
            tcv,
            ..Acta::default()
        }
    }

    #[test]
    fn finalized_is_per_category() {
        let mut ledger = MesaLedger::default();
        ledger.add_category("presidencial", &[acta(123456, true, true, Some(150))]);
        ledger.add_category("diputados", &[acta(123456, true, false, Some(150))]);
        assert!(ledger.is_mesa_finalized(123456, "presidencial", None));
        assert!(!ledger.is_mesa_finalized(123456, "diputados", None));
        assert!(!ledger.is_mesa_finalized(123456, "presidencial", Some(0)));
        assert!(!ledger.is_mesa_finalized(654321, "presidencial", None));
    }

    #[test]
    fn counts_saved_actas() {
        let mut partial = acta(123456, true, false, None);
        partial.is_partial_recount = true;
        let mut ledger = MesaLedger::default();
        ledger.add_category(
            "presidencial",
            &[acta(123456, true, true, Some(150)), partial],
        );
        ledger.add_category(
            "diputados",
            &[acta(123456, false, false, None), acta(123456, true, false, Some(150))],
        );
        assert_eq!(ledger.count_saved_actas(123456, None), 2);
        assert_eq!(
            ledger.count_saved_actas(123456, Some(&ActaRef::new("diputados", 1))),
            1
        );
        assert_eq!(ledger.count_saved_actas(1, None), 0);
    }

    #[test]
    fn finds_prior_values() {
        let mut first = acta(123456, true, true, Some(150));
        first.cedulas_excedentes = 2;
        let mut ledger = MesaLedger::default();
        ledger.add_category("diputados", &[acta(123456, false, false, None)]);
        ledger.add_category("presidencial", &[first]);
        assert_eq!(ledger.find_tcv(123456, None), Some(150));
        assert_eq!(ledger.find_cedulas_excedentes(123456, None), Some(2));
        let me = ActaRef::new("presidencial", 0);
        assert_eq!(ledger.find_tcv(123456, Some(&me)), None);
        assert_eq!(ledger.find_cedulas_excedentes(123456, Some(&me)), None);
    }

    #[tokio::test]
    async fn loads_every_category() {
        let repo = ActaRepository::new(MemoryStorage::new());
        repo.append_acta("presidencial", &acta(123456, true, true, Some(10)))
            .await
            .unwrap();
        repo.append_acta("diputados", &acta(123456, true, false, Some(10)))
            .await
            .unwrap();
        repo.append_acta("diputados", &Acta::default()).await.unwrap();
        let ledger = MesaLedger::load(&repo).await;
        assert_eq!(ledger.count_saved_actas(123456, None), 2);
        assert!(ledger.is_mesa_finalized(123456, "presidencial", None));
    }
}
