//! In-memory settings store for tests and local development.

use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{PageSettings, SettingsError, SettingsStore};

/// A `HashMap`-backed [`SettingsStore`]. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    rows: RwLock<HashMap<Uuid, PageSettings>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly, bypassing the trait. Test convenience.
    pub async fn insert(&self, tenant_id: Uuid, settings: PageSettings) {
        self.rows.write().await.insert(tenant_id, settings);
    }
}

#[async_trait::async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn fetch(&self, tenant_id: Uuid) -> Result<Option<PageSettings>, SettingsError> {
        Ok(self.rows.read().await.get(&tenant_id).cloned())
    }

    async fn save(&self, tenant_id: Uuid, settings: &PageSettings) -> Result<(), SettingsError> {
        self.rows.write().await.insert(tenant_id, settings.clone());
        Ok(())
    }
}
