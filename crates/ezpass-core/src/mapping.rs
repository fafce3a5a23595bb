//! Mapping store: per-origin role-to-locator assignments.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use ezpass_protocols::{
    Document, ElementRef, FieldLocator, FieldMapping, KeyValueStore, OriginKey, Role, StoreError,
};

/// Storage key holding every origin's mapping.
pub const MAPPINGS_KEY: &str = "fieldMappings";

/// The elements a mapping resolves to on a document.
#[derive(Default)]
pub struct MappedFields {
    pub username: Option<ElementRef>,
    pub password: Option<ElementRef>,
}

impl MappedFields {
    pub fn is_complete(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

/// Merge/overwrite logic over a [`KeyValueStore`]. Persisted as
/// `{ "<origin>": { "usernameSelector": ..., "passwordSelector": ... } }`.
pub struct MappingStore {
    store: Arc<dyn KeyValueStore>,
    /// Serializes read-modify-write cycles within this instance.
    write_lock: tokio::sync::Mutex<()>,
}

impl MappingStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Mapping for `origin`; empty when absent or unreadable.
    pub async fn get(&self, origin: &OriginKey) -> FieldMapping {
        match self.all().await {
            Ok(mut all) => all.remove(origin).unwrap_or_default(),
            Err(e) => {
                warn!("Failed to read field mappings for {}: {}", origin, e);
                FieldMapping::default()
            }
        }
    }

    /// Every stored mapping, ordered by origin.
    pub async fn all(&self) -> Result<BTreeMap<OriginKey, FieldMapping>, StoreError> {
        match self.store.get(MAPPINGS_KEY).await? {
            None | Some(Value::Null) => Ok(BTreeMap::new()),
            Some(value) => Ok(serde_json::from_value(value)?),
        }
    }

    /// Assign `locator` to `role` for `origin`, leaving the other role as is.
    pub async fn set_role(
        &self,
        origin: &OriginKey,
        role: Role,
        locator: FieldLocator,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut all = self.all().await?;
        all.entry(origin.clone())
            .or_default()
            .set(role, locator.clone());
        self.store
            .set(MAPPINGS_KEY, serde_json::to_value(&all)?)
            .await?;
        debug!("Mapped {} to {} under origin {}", role, locator, origin);
        Ok(())
    }

    /// Resolve the stored locators for `origin` against `document`.
    pub async fn resolve(&self, document: &dyn Document, origin: &OriginKey) -> MappedFields {
        let mapping = self.get(origin).await;
        if mapping.is_empty() {
            debug!("No mappings found for {}", origin);
            return MappedFields::default();
        }

        let lookup = |role: Role| {
            let locator = mapping.get(role)?;
            let found = document.query(locator);
            debug!("{} locator {} found: {}", role, locator, found.is_some());
            found
        };
        MappedFields {
            username: lookup(Role::Username),
            password: lookup(Role::Password),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotDocument;
    use crate::storage::MemoryKeyValueStore;
    use serde_json::json;

    fn store() -> (Arc<MemoryKeyValueStore>, MappingStore) {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let mappings = MappingStore::new(kv.clone());
        (kv, mappings)
    }

    fn origin() -> OriginKey {
        OriginKey::from_normalized("example.com")
    }

    #[tokio::test]
    async fn test_get_absent_is_empty() {
        let (_, mappings) = store();
        assert!(mappings.get(&origin()).await.is_empty());
    }

    #[tokio::test]
    async fn test_set_role_persists_extension_format() {
        let (kv, mappings) = store();
        mappings
            .set_role(&origin(), Role::Username, FieldLocator::new("#u"))
            .await
            .unwrap();
        mappings
            .set_role(&origin(), Role::Password, FieldLocator::new("#p"))
            .await
            .unwrap();

        let stored = kv.get(MAPPINGS_KEY).await.unwrap().unwrap();
        assert_eq!(
            stored,
            json!({"example.com": {"usernameSelector": "#u", "passwordSelector": "#p"}})
        );
    }

    #[tokio::test]
    async fn test_set_role_is_overwrite_idempotent() {
        let (kv, mappings) = store();
        let o = origin();
        mappings
            .set_role(&o, Role::Password, FieldLocator::new("#p"))
            .await
            .unwrap();
        mappings
            .set_role(&o, Role::Username, FieldLocator::new("#u"))
            .await
            .unwrap();
        let once = kv.get(MAPPINGS_KEY).await.unwrap();

        mappings
            .set_role(&o, Role::Username, FieldLocator::new("#u"))
            .await
            .unwrap();
        assert_eq!(kv.get(MAPPINGS_KEY).await.unwrap(), once);

        mappings
            .set_role(&o, Role::Username, FieldLocator::new("#login"))
            .await
            .unwrap();
        let mapping = mappings.get(&o).await;
        assert_eq!(mapping.username, Some(FieldLocator::new("#login")));
        assert_eq!(mapping.password, Some(FieldLocator::new("#p")));
    }

    #[tokio::test]
    async fn test_origins_are_independent() {
        let (_, mappings) = store();
        let other = OriginKey::from_normalized("other.org");
        mappings
            .set_role(&origin(), Role::Username, FieldLocator::new("#u"))
            .await
            .unwrap();
        mappings
            .set_role(&other, Role::Username, FieldLocator::new("#x"))
            .await
            .unwrap();

        let all = mappings.all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[&origin()].username, Some(FieldLocator::new("#u")));
        assert_eq!(all[&other].username, Some(FieldLocator::new("#x")));
    }

    #[tokio::test]
    async fn test_malformed_store_reads_as_empty_but_is_not_overwritten() {
        let (kv, mappings) = store();
        kv.set(MAPPINGS_KEY, json!("garbage")).await.unwrap();

        assert!(mappings.get(&origin()).await.is_empty());
        assert!(mappings
            .set_role(&origin(), Role::Username, FieldLocator::new("#u"))
            .await
            .is_err());
        assert_eq!(kv.get(MAPPINGS_KEY).await.unwrap(), Some(json!("garbage")));
    }

    #[tokio::test]
    async fn test_resolve_both_and_partial() {
        let (_, mappings) = store();
        let doc = SnapshotDocument::from_json(
            r#"{"url":"https://example.com","body":{"tag":"body","children":[
                {"tag":"input","attributes":{"id":"u"}},
                {"tag":"input","attributes":{"id":"p","type":"password"}}
            ]}}"#,
        )
        .unwrap();

        assert!(!mappings.resolve(&doc, &origin()).await.is_complete());

        mappings
            .set_role(&origin(), Role::Username, FieldLocator::new("#u"))
            .await
            .unwrap();
        let fields = mappings.resolve(&doc, &origin()).await;
        assert!(fields.username.is_some());
        assert!(fields.password.is_none());

        mappings
            .set_role(&origin(), Role::Password, FieldLocator::new("#p"))
            .await
            .unwrap();
        assert!(mappings.resolve(&doc, &origin()).await.is_complete());

        mappings
            .set_role(&origin(), Role::Password, FieldLocator::new("#gone"))
            .await
            .unwrap();
        assert!(!mappings.resolve(&doc, &origin()).await.is_complete());
    }
}
