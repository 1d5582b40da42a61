//! Domain-shaped records on top of the key/value store.
//!
//! Every write replaces the whole value of a key: callers build the complete
//! new value (read-modify-write). Queries never fail: a missing, unreadable or
//! malformed value degrades to its default and is logged. Writes report their
//! failures, and so do the reads they are built on: a value that cannot be read
//! is never replaced.

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use snafu::ResultExt;
use std::collections::BTreeMap;

use crate::acta::{Acta, CategoryData};
use crate::error::{DecodeSnafu, EncodeSnafu, MalformedSnafu, StorageResult};
use crate::storage::StorageAdapter;

const ACTIVE_CATEGORY_KEY: &str = "activeCategory";
const ACTIVE_ACTA_INDEX_KEY: &str = "activeActaIndex";
const CATEGORY_PREFIX: &str = "category:";
const SELECTED_ORGANIZATIONS_KEY: &str = "selectedOrganizations";
const PARTIAL_RECOUNT_ORGANIZATIONS_KEY: &str = "partialRecountOrganizations";
const PARTIAL_RECOUNT_MODE_KEY: &str = "partialRecountMode";

/// The scopes at which the operator enables political organizations.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum SelectionScope {
    Global,
    Circunscripcion(String),
    Category {
        circunscripcion: String,
        category: String,
    },
    /// The subset of organizations recounted in partial recount mode.
    PartialRecount {
        circunscripcion: String,
        category: String,
    },
}

impl SelectionScope {
    pub fn key(&self) -> String {
        match self {
            SelectionScope::Global => SELECTED_ORGANIZATIONS_KEY.to_string(),
            SelectionScope::Circunscripcion(c) => format!("{}:{}", SELECTED_ORGANIZATIONS_KEY, c),
            SelectionScope::Category {
                circunscripcion,
                category,
            } => format!(
                "{}:{}:{}",
                SELECTED_ORGANIZATIONS_KEY, circunscripcion, category
            ),
            SelectionScope::PartialRecount {
                circunscripcion,
                category,
            } => format!(
                "{}:{}:{}",
                PARTIAL_RECOUNT_ORGANIZATIONS_KEY, circunscripcion, category
            ),
        }
    }
}

fn category_key(category: &str) -> String {
    format!("{}{}", CATEGORY_PREFIX, category)
}

pub struct ActaRepository<S: StorageAdapter> {
    storage: S,
}

impl<S: StorageAdapter> ActaRepository<S> {
    pub fn new(storage: S) -> ActaRepository<S> {
        ActaRepository { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Read for a write: failures are reported.
    async fn read_strict<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        match self.storage.get(key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .context(DecodeSnafu { key }),
            None => Ok(None),
        }
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.read_strict(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!("read {}: using defaults: {}", key, e);
                None
            }
        }
    }

    async fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StorageResult<()> {
        let raw = serde_json::to_string(value).context(EncodeSnafu { key })?;
        debug!("write {}: {} bytes", key, raw.len());
        self.storage.set(key, raw).await
    }

    // **** Categories ****

    pub async fn active_category(&self) -> Option<String> {
        self.read(ACTIVE_CATEGORY_KEY).await
    }

    pub async fn save_active_category(&self, category: &str) -> StorageResult<()> {
        self.write(ACTIVE_CATEGORY_KEY, category).await
    }

    /// The actas of a category, failing on a payload that cannot be read or that
    /// holds an acta breaking the record invariants.
    pub async fn load_category_data(&self, category: &str) -> StorageResult<CategoryData> {
        let key = category_key(category);
        let data: CategoryData = self.read_strict(&key).await?.unwrap_or_default();
        for (index, acta) in data.actas.iter().enumerate() {
            if let Err(reason) = acta.check_integrity() {
                return MalformedSnafu { key, index, reason }.fail();
            }
        }
        Ok(data)
    }

    /// The actas of a category. Anything `load_category_data` rejects reads as
    /// an empty category.
    pub async fn category_data(&self, category: &str) -> CategoryData {
        match self.load_category_data(category).await {
            Ok(data) => data,
            Err(e) => {
                warn!("read {}: using defaults: {}", category_key(category), e);
                CategoryData::default()
            }
        }
    }

    pub async fn save_category_data(&self, category: &str, data: &CategoryData) -> StorageResult<()> {
        self.write(&category_key(category), data).await
    }

    /// The categories that have stored data.
    pub async fn list_categories(&self) -> Vec<String> {
        match self.storage.list_keys().await {
            Ok(keys) => keys
                .iter()
                .filter_map(|k| k.strip_prefix(CATEGORY_PREFIX))
                .map(|c| c.to_string())
                .collect(),
            Err(e) => {
                warn!("list_categories: storage failure, using defaults: {}", e);
                Vec::new()
            }
        }
    }

    // **** Active acta per category ****

    pub async fn active_acta_indexes(&self) -> BTreeMap<String, usize> {
        self.read(ACTIVE_ACTA_INDEX_KEY).await.unwrap_or_default()
    }

    pub async fn active_acta_index(&self, category: &str) -> usize {
        self.active_acta_indexes()
            .await
            .get(category)
            .cloned()
            .unwrap_or(0)
    }

    pub async fn save_active_acta_index(&self, category: &str, index: usize) -> StorageResult<()> {
        let mut indexes: BTreeMap<String, usize> = self
            .read_strict(ACTIVE_ACTA_INDEX_KEY)
            .await?
            .unwrap_or_default();
        indexes.insert(category.to_string(), index);
        self.write(ACTIVE_ACTA_INDEX_KEY, &indexes).await
    }

    // **** Actas ****

    pub async fn actas(&self, category: &str) -> Vec<Acta> {
        self.category_data(category).await.actas
    }

    pub async fn acta(&self, category: &str, index: usize) -> Option<Acta> {
        self.category_data(category).await.actas.into_iter().nth(index)
    }

    /// Saves an acta and returns the index it was stored at.
    ///
    /// A known index is replaced in place. Any other index appends the acta at
    /// the end, so the list never has gaps, and makes it the active acta of the
    /// category. The active index is written before the actas: if the second
    /// write fails the index points past the end of the list, which
    /// `active_acta_index` readers clamp.
    pub async fn save_acta(&self, category: &str, index: usize, acta: &Acta) -> StorageResult<usize> {
        let mut data = self.load_category_data(category).await?;
        if let Some(slot) = data.actas.get_mut(index) {
            *slot = acta.clone();
            self.save_category_data(category, &data).await?;
            return Ok(index);
        }
        data.actas.push(acta.clone());
        let new_index = data.actas.len() - 1;
        if new_index != index {
            debug!(
                "save_acta: index {} unknown in {}, appended at {}",
                index, category, new_index
            );
        }
        self.save_active_acta_index(category, new_index).await?;
        self.save_category_data(category, &data).await?;
        Ok(new_index)
    }

    pub async fn append_acta(&self, category: &str, acta: &Acta) -> StorageResult<usize> {
        let len = self.load_category_data(category).await?.actas.len();
        self.save_acta(category, len, acta).await
    }

    // **** Organization selection ****

    pub async fn selected_organizations(&self, scope: &SelectionScope) -> Vec<String> {
        self.read(&scope.key()).await.unwrap_or_default()
    }

    /// An empty selection removes the scope altogether.
    pub async fn save_selected_organizations(
        &self,
        scope: &SelectionScope,
        keys: &[String],
    ) -> StorageResult<()> {
        if keys.is_empty() {
            return self.storage.remove(&scope.key()).await;
        }
        self.write(&scope.key(), keys).await
    }

    // **** Partial recount ****

    pub async fn partial_recount_modes(&self) -> BTreeMap<String, bool> {
        self.read(PARTIAL_RECOUNT_MODE_KEY).await.unwrap_or_default()
    }

    pub async fn is_partial_recount(&self, circunscripcion: &str) -> bool {
        self.partial_recount_modes()
            .await
            .get(circunscripcion)
            .cloned()
            .unwrap_or(false)
    }

    pub async fn set_partial_recount(&self, circunscripcion: &str, enabled: bool) -> StorageResult<()> {
        let mut modes: BTreeMap<String, bool> = self
            .read_strict(PARTIAL_RECOUNT_MODE_KEY)
            .await?
            .unwrap_or_default();
        modes.insert(circunscripcion.to_string(), enabled);
        self.write(PARTIAL_RECOUNT_MODE_KEY, &modes).await
    }

    /// Drops every stored record.
    pub async fn clear_all(&self) -> StorageResult<()> {
        self.storage.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acta::{Party, SelectedLocation, VoteEntry};
    use crate::error::StorageError;
    use crate::storage::MemoryStorage;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn repository() -> ActaRepository<MemoryStorage> {
        ActaRepository::new(MemoryStorage::new())
    }

    fn sample_acta() -> Acta {
        Acta {
            mesa_number: 123456,
            acta_number: "123456-LIMA CENTRO 1-diputados".to_string(),
            total_electores: 300,
            vote_entries: vec![
                VoteEntry {
                    table_number: 1,
                    party: Party::from("P01"),
                    preferential_vote1: Some(3),
                    preferential_vote2: Some(7),
                },
                VoteEntry {
                    table_number: 2,
                    party: Party::Blanco,
                    preferential_vote1: None,
                    preferential_vote2: None,
                },
            ],
            cedulas_excedentes: 0,
            tcv: Some(2),
            counter_mesa: 1,
            is_mesa_data_saved: true,
            are_mesa_fields_locked: true,
            start_time: Some(Utc.with_ymd_and_hms(2026, 4, 12, 16, 5, 0).unwrap()),
            selected_location: SelectedLocation {
                departamento: "LIMA".to_string(),
                provincia: "LIMA".to_string(),
                distrito: "MIRAFLORES".to_string(),
                jee: "LIMA CENTRO 1".to_string(),
                circunscripcion_electoral: "LIMA METROPOLITANA".to_string(),
            },
            ..Acta::default()
        }
    }

    #[tokio::test]
    async fn save_then_get_round_trip() {
        let repo = repository();
        let acta = sample_acta();
        let idx = repo.save_acta("diputados", 0, &acta).await.unwrap();
        assert_eq!(idx, 0);
        assert_eq!(repo.acta("diputados", 0).await, Some(acta));
    }

    #[tokio::test]
    async fn save_in_place_or_append() {
        let repo = repository();
        repo.append_acta("diputados", &Acta::default()).await.unwrap();
        repo.append_acta("diputados", &Acta::default()).await.unwrap();
        assert_eq!(repo.active_acta_index("diputados").await, 1);

        // Known index: replaced, pointer untouched.
        repo.save_active_acta_index("diputados", 0).await.unwrap();
        assert_eq!(repo.save_acta("diputados", 1, &sample_acta()).await.unwrap(), 1);
        assert_eq!(repo.actas("diputados").await.len(), 2);
        assert_eq!(repo.active_acta_index("diputados").await, 0);

        // Out of range: appended without gaps, pointer moved.
        assert_eq!(repo.save_acta("diputados", 7, &sample_acta()).await.unwrap(), 2);
        assert_eq!(repo.actas("diputados").await.len(), 3);
        assert_eq!(repo.active_acta_index("diputados").await, 2);
    }

    #[tokio::test]
    async fn active_category() {
        let repo = repository();
        assert_eq!(repo.active_category().await, None);
        repo.save_active_category("senadoresRegional").await.unwrap();
        assert_eq!(
            repo.active_category().await,
            Some("senadoresRegional".to_string())
        );
    }

    #[tokio::test]
    async fn corrupted_payloads_read_as_absent() {
        let repo = repository();
        repo.storage()
            .set("category:diputados", "{\"actas\": [".to_string())
            .await
            .unwrap();
        assert!(repo.actas("diputados").await.is_empty());

        repo.storage()
            .set(ACTIVE_ACTA_INDEX_KEY, "\"nope\"".to_string())
            .await
            .unwrap();
        assert_eq!(repo.active_acta_index("diputados").await, 0);
    }

    #[tokio::test]
    async fn malformed_actas_read_as_absent() {
        let repo = repository();
        let mut acta = sample_acta();
        acta.total_electores = 1;
        repo.save_acta("diputados", 0, &acta).await.unwrap();
        assert!(repo.actas("diputados").await.is_empty());
    }

    #[tokio::test]
    async fn lists_categories() {
        let repo = repository();
        repo.append_acta("diputados", &Acta::default()).await.unwrap();
        repo.append_acta("presidencial", &Acta::default()).await.unwrap();
        repo.save_active_category("diputados").await.unwrap();
        assert_eq!(
            repo.list_categories().await,
            vec!["diputados".to_string(), "presidencial".to_string()]
        );
    }

    #[tokio::test]
    async fn organization_selection_scopes() {
        let repo = repository();
        let circ = SelectionScope::Circunscripcion("LIMA".to_string());
        let cat = SelectionScope::Category {
            circunscripcion: "LIMA".to_string(),
            category: "diputados".to_string(),
        };
        let partial = SelectionScope::PartialRecount {
            circunscripcion: "LIMA".to_string(),
            category: "diputados".to_string(),
        };
        assert_eq!(cat.key(), "selectedOrganizations:LIMA:diputados");
        assert_eq!(partial.key(), "partialRecountOrganizations:LIMA:diputados");

        repo.save_selected_organizations(&circ, &["P01".to_string(), "P02".to_string()])
            .await
            .unwrap();
        repo.save_selected_organizations(&partial, &["P02".to_string()])
            .await
            .unwrap();
        assert_eq!(repo.selected_organizations(&circ).await.len(), 2);
        assert_eq!(repo.selected_organizations(&partial).await, vec!["P02".to_string()]);
        assert!(repo.selected_organizations(&cat).await.is_empty());
        assert!(repo.selected_organizations(&SelectionScope::Global).await.is_empty());

        repo.save_selected_organizations(&circ, &[]).await.unwrap();
        assert!(repo.storage().get(&circ.key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn partial_recount_flags() {
        let repo = repository();
        assert!(!repo.is_partial_recount("LIMA").await);
        repo.set_partial_recount("LIMA", true).await.unwrap();
        repo.set_partial_recount("CUSCO", false).await.unwrap();
        assert!(repo.is_partial_recount("LIMA").await);
        assert!(!repo.is_partial_recount("CUSCO").await);
        repo.set_partial_recount("LIMA", false).await.unwrap();
        assert!(!repo.is_partial_recount("LIMA").await);
    }

    /// Refuses every read while `failing_reads` is set, and writes of category
    /// data while `failing_category_writes` is set.
    #[derive(Default)]
    struct FaultyStorage {
        inner: MemoryStorage,
        failing_reads: AtomicBool,
        failing_category_writes: AtomicBool,
    }

    #[async_trait]
    impl StorageAdapter for FaultyStorage {
        async fn get(&self, key: &str) -> StorageResult<Option<String>> {
            if self.failing_reads.load(Ordering::SeqCst) {
                return Err(StorageError::Backend {
                    message: "device not ready".to_string(),
                });
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: String) -> StorageResult<()> {
            if key.starts_with(CATEGORY_PREFIX)
                && self.failing_category_writes.load(Ordering::SeqCst)
            {
                return Err(StorageError::Backend {
                    message: "disk full".to_string(),
                });
            }
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> StorageResult<()> {
            self.inner.remove(key).await
        }

        async fn clear(&self) -> StorageResult<()> {
            self.inner.clear().await
        }

        async fn list_keys(&self) -> StorageResult<Vec<String>> {
            self.inner.list_keys().await
        }
    }

    fn acta_for(mesa_number: u32) -> Acta {
        Acta {
            mesa_number,
            total_electores: 10,
            ..Acta::default()
        }
    }

    #[tokio::test]
    async fn failed_read_does_not_overwrite_the_category() {
        let repo = ActaRepository::new(FaultyStorage::default());
        for mesa_number in [100001, 100002, 100003] {
            repo.append_acta("diputados", &acta_for(mesa_number))
                .await
                .unwrap();
        }
        let before = repo.storage().inner.get("category:diputados").await.unwrap();

        repo.storage().failing_reads.store(true, Ordering::SeqCst);
        assert!(matches!(
            repo.save_acta("diputados", 2, &acta_for(100004)).await,
            Err(StorageError::Backend { .. })
        ));
        assert!(repo.append_acta("diputados", &acta_for(100005)).await.is_err());
        assert!(repo.set_partial_recount("LIMA", true).await.is_err());
        repo.storage().failing_reads.store(false, Ordering::SeqCst);

        assert_eq!(
            repo.storage().inner.get("category:diputados").await.unwrap(),
            before
        );
        let mesas: Vec<u32> = repo
            .actas("diputados")
            .await
            .iter()
            .map(|a| a.mesa_number)
            .collect();
        assert_eq!(mesas, vec![100001, 100002, 100003]);
        assert_eq!(repo.active_acta_index("diputados").await, 2);
    }

    #[tokio::test]
    async fn malformed_sibling_blocks_writes() {
        let repo = repository();
        let mut bad = acta_for(100002);
        bad.total_electores = 0;
        bad.vote_entries = vec![VoteEntry {
            table_number: 1,
            party: Party::from("P01"),
            preferential_vote1: None,
            preferential_vote2: None,
        }];
        let raw = serde_json::to_string(&CategoryData {
            actas: vec![acta_for(100001), bad],
        })
        .unwrap();
        repo.storage()
            .set("category:diputados", raw.clone())
            .await
            .unwrap();

        assert!(matches!(
            repo.append_acta("diputados", &acta_for(100003)).await,
            Err(StorageError::Malformed { index: 1, .. })
        ));
        assert!(repo.save_acta("diputados", 0, &acta_for(100009)).await.is_err());
        assert_eq!(
            repo.storage().get("category:diputados").await.unwrap(),
            Some(raw)
        );
        // Queries still degrade.
        assert!(repo.actas("diputados").await.is_empty());
    }

    #[tokio::test]
    async fn corrupted_payload_blocks_writes() {
        let repo = repository();
        let raw = "{\"actas\": [".to_string();
        repo.storage()
            .set("category:diputados", raw.clone())
            .await
            .unwrap();
        assert!(matches!(
            repo.append_acta("diputados", &acta_for(100001)).await,
            Err(StorageError::Decode { .. })
        ));
        assert_eq!(
            repo.storage().get("category:diputados").await.unwrap(),
            Some(raw)
        );
    }

    #[tokio::test]
    async fn failed_append_leaves_the_index_past_the_end() {
        let repo = ActaRepository::new(FaultyStorage::default());
        repo.append_acta("diputados", &acta_for(100001)).await.unwrap();

        repo.storage()
            .failing_category_writes
            .store(true, Ordering::SeqCst);
        assert!(repo.append_acta("diputados", &acta_for(100002)).await.is_err());
        repo.storage()
            .failing_category_writes
            .store(false, Ordering::SeqCst);

        assert_eq!(repo.actas("diputados").await.len(), 1);
        assert_eq!(repo.active_acta_index("diputados").await, 1);
        // The next append lands where the failed one was meant to go.
        assert_eq!(
            repo.append_acta("diputados", &acta_for(100002)).await.unwrap(),
            1
        );
    }
}
