//! Persistence collaborator abstraction.
//!
//! The core defines the logical record shapes and access patterns, not a
//! file or database format. Every mutating operation that changes persisted
//! fields is followed by an explicit save before it is considered durable.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Durable image of one channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub color_code: String,
    #[serde(default)]
    pub broadcast: bool,
    #[serde(default)]
    pub force_join: bool,
    #[serde(default)]
    pub personal: bool,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default = "default_visible")]
    pub allow_cc: bool,
    #[serde(default)]
    pub private_message_to: Option<String>,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub moderators: Vec<String>,
    #[serde(default)]
    pub banned: Vec<String>,
    #[serde(default)]
    pub muted: Vec<String>,
    #[serde(default)]
    pub hided: Vec<String>,
    /// (member, unix seconds) pairs; entries must match `banned`/`muted`.
    #[serde(default)]
    pub ban_expires: Vec<(String, i64)>,
    #[serde(default)]
    pub mute_expires: Vec<(String, i64)>,
}

fn default_visible() -> bool {
    true
}

/// External store consumed by the registry. Implementations decide the
/// format; the registry decides when saves happen.
#[async_trait]
pub trait ChannelStore: Send + Sync {
    async fn save_channel(&self, snapshot: &ChannelSnapshot) -> Result<(), StoreError>;
    async fn remove_channel(&self, name: &str) -> Result<(), StoreError>;
    async fn load_channels(&self) -> Result<Vec<ChannelSnapshot>, StoreError>;

    async fn save_templates(&self, templates: &BTreeMap<String, String>)
    -> Result<(), StoreError>;
    async fn load_templates(&self) -> Result<BTreeMap<String, String>, StoreError>;

    async fn save_dictionary(
        &self,
        dictionary: &BTreeMap<String, String>,
    ) -> Result<(), StoreError>;
    async fn load_dictionary(&self) -> Result<BTreeMap<String, String>, StoreError>;
}

/// Store that persists nothing and loads nothing.
#[derive(Debug, Default)]
pub struct NoopStore;

#[async_trait]
impl ChannelStore for NoopStore {
    async fn save_channel(&self, _snapshot: &ChannelSnapshot) -> Result<(), StoreError> {
        Ok(())
    }

    async fn remove_channel(&self, _name: &str) -> Result<(), StoreError> {
        Ok(())
    }

    async fn load_channels(&self) -> Result<Vec<ChannelSnapshot>, StoreError> {
        Ok(Vec::new())
    }

    async fn save_templates(
        &self,
        _templates: &BTreeMap<String, String>,
    ) -> Result<(), StoreError> {
        Ok(())
    }

    async fn load_templates(&self) -> Result<BTreeMap<String, String>, StoreError> {
        Ok(BTreeMap::new())
    }

    async fn save_dictionary(
        &self,
        _dictionary: &BTreeMap<String, String>,
    ) -> Result<(), StoreError> {
        Ok(())
    }

    async fn load_dictionary(&self) -> Result<BTreeMap<String, String>, StoreError> {
        Ok(BTreeMap::new())
    }
}

/// In-memory store, for tests and embedders that supply their own durable
/// layer elsewhere.
#[derive(Debug, Default)]
pub struct MemoryStore {
    channels: Mutex<HashMap<String, ChannelSnapshot>>,
    templates: Mutex<BTreeMap<String, String>>,
    dictionary: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChannelStore for MemoryStore {
    async fn save_channel(&self, snapshot: &ChannelSnapshot) -> Result<(), StoreError> {
        self.channels
            .lock()
            .insert(snapshot.name.to_lowercase(), snapshot.clone());
        Ok(())
    }

    async fn remove_channel(&self, name: &str) -> Result<(), StoreError> {
        self.channels.lock().remove(&name.to_lowercase());
        Ok(())
    }

    async fn load_channels(&self) -> Result<Vec<ChannelSnapshot>, StoreError> {
        let mut all: Vec<ChannelSnapshot> = self.channels.lock().values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn save_templates(
        &self,
        templates: &BTreeMap<String, String>,
    ) -> Result<(), StoreError> {
        *self.templates.lock() = templates.clone();
        Ok(())
    }

    async fn load_templates(&self) -> Result<BTreeMap<String, String>, StoreError> {
        Ok(self.templates.lock().clone())
    }

    async fn save_dictionary(
        &self,
        dictionary: &BTreeMap<String, String>,
    ) -> Result<(), StoreError> {
        *self.dictionary.lock() = dictionary.clone();
        Ok(())
    }

    async fn load_dictionary(&self) -> Result<BTreeMap<String, String>, StoreError> {
        Ok(self.dictionary.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trips_channels() {
        let store = MemoryStore::new();
        let snap = ChannelSnapshot {
            name: "Town".to_string(),
            description: "the town square".to_string(),
            members: vec!["alice".to_string()],
            ..Default::default()
        };
        store.save_channel(&snap).await.unwrap();

        let loaded = store.load_channels().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].description, "the town square");

        store.remove_channel("TOWN").await.unwrap();
        assert!(store.load_channels().await.unwrap().is_empty());
    }

    #[test]
    fn snapshot_defaults_fill_missing_fields() {
        let snap: ChannelSnapshot = toml::from_str(r#"name = "town""#).unwrap();
        assert!(snap.visible);
        assert!(snap.allow_cc);
        assert!(!snap.broadcast);
        assert!(snap.members.is_empty());
    }
}
