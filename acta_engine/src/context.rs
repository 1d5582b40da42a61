use log::debug;

use crate::acta::Acta;
use crate::config::{EngineConfig, Organization, PreferentialConfig};
use crate::ledger::MesaLedger;
use crate::reference::ReferenceData;
use crate::repository::{ActaRepository, SelectionScope};
use crate::storage::StorageAdapter;

/// Everything an operation needs: the repository, the reference data and the
/// engine configuration. Passed explicitly to every transition.
pub struct AppContext<S: StorageAdapter, R: ReferenceData> {
    pub repository: ActaRepository<S>,
    pub reference: R,
    pub config: EngineConfig,
}

impl<S: StorageAdapter, R: ReferenceData> AppContext<S, R> {
    pub fn new(storage: S, reference: R, config: EngineConfig) -> AppContext<S, R> {
        AppContext {
            repository: ActaRepository::new(storage),
            reference,
            config,
        }
    }

    pub fn preferential_config(&self, category: &str) -> PreferentialConfig {
        self.config.preferential_config(category)
    }

    pub async fn ledger(&self) -> MesaLedger {
        MesaLedger::load(&self.repository).await
    }

    /// The organization keys in force for a circunscripción and category.
    ///
    /// In partial recount mode only the partial recount selection counts.
    /// Otherwise the most specific non-empty selection wins: category, then
    /// circunscripción, then global.
    pub async fn enabled_organization_keys(
        &self,
        circunscripcion: &str,
        category: &str,
        partial_recount: bool,
    ) -> Vec<String> {
        if partial_recount {
            return self
                .repository
                .selected_organizations(&SelectionScope::PartialRecount {
                    circunscripcion: circunscripcion.to_string(),
                    category: category.to_string(),
                })
                .await;
        }
        let scopes = [
            SelectionScope::Category {
                circunscripcion: circunscripcion.to_string(),
                category: category.to_string(),
            },
            SelectionScope::Circunscripcion(circunscripcion.to_string()),
            SelectionScope::Global,
        ];
        for scope in scopes.iter() {
            let keys = self.repository.selected_organizations(scope).await;
            if !keys.is_empty() {
                debug!("enabled organizations from {:?}: {:?}", scope, keys);
                return keys;
            }
        }
        Vec::new()
    }

    /// The enabled organizations of the catalog, in catalog order. BLANCO and
    /// NULO are not included.
    pub async fn enabled_organizations(
        &self,
        circunscripcion: &str,
        category: &str,
        partial_recount: bool,
    ) -> Vec<Organization> {
        let keys = self
            .enabled_organization_keys(circunscripcion, category, partial_recount)
            .await;
        self.reference
            .organizations()
            .into_iter()
            .filter(|o| !o.is_special() && keys.contains(&o.key))
            .collect()
    }

    /// The parties an acta is tallied against: its enabled organizations
    /// followed by the special votes of the catalog.
    pub async fn tally_organizations(&self, category: &str, acta: &Acta) -> Vec<Organization> {
        let mut orgs = self
            .enabled_organizations(
                &acta.selected_location.circunscripcion_electoral,
                category,
                acta.is_partial_recount,
            )
            .await;
        orgs.extend(
            self.reference
                .organizations()
                .into_iter()
                .filter(|o| o.is_special()),
        );
        orgs
    }
}
