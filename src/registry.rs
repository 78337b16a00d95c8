//! Channel registry: the authoritative map of channels plus the small
//! global tables that ride along with it (member defaults, format
//! templates, the transliteration dictionary, hide relations, and the
//! per-member transliteration switch).
//!
//! Channels live behind `Arc<RwLock<..>>` in a concurrent map, so chat
//! delivery takes a read lock while membership and option changes take the
//! write lock for that one channel. Structural mutations (create/remove)
//! are serialized by an async mutex so the exists-check and the insert are
//! one step.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use parking_lot::RwLock;
use regex::Regex;
use std::sync::LazyLock;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::channel::{Channel, personal_channel_name};
use crate::config::RelayConfig;
use crate::error::ChannelError;
use crate::event::EventHooks;
use crate::format::TemplateSource;
use crate::member::same_name;
use crate::store::ChannelStore;

const PERSONAL_CHAT_FORMAT: &str = "&7&o(%player > %to) %msg";

static CHANNEL_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[0-9A-Za-z_-]+$").expect("channel name regex"));

pub struct ChannelRegistry {
    config: Arc<RelayConfig>,
    store: Arc<dyn ChannelStore>,
    channels: DashMap<String, Arc<RwLock<Channel>>>,
    /// Member name (lowercased) to default channel name.
    defaults: DashMap<String, String>,
    templates: RwLock<BTreeMap<String, String>>,
    dictionary: RwLock<BTreeMap<String, String>>,
    /// Hidden member (lowercased) to the set of members hiding them.
    hides: DashMap<String, HashSet<String>>,
    /// Members who switched transliteration off for their own chat.
    japanize_off: DashSet<String>,
    mutation: Mutex<()>,
}

impl ChannelRegistry {
    pub fn new(config: Arc<RelayConfig>, store: Arc<dyn ChannelStore>) -> Self {
        Self {
            config,
            store,
            channels: DashMap::new(),
            defaults: DashMap::new(),
            templates: RwLock::new(BTreeMap::new()),
            dictionary: RwLock::new(BTreeMap::new()),
            hides: DashMap::new(),
            japanize_off: DashSet::new(),
            mutation: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Replace all in-memory state with what the store holds.
    pub async fn reload_all_data(&self) -> Result<(), ChannelError> {
        let _guard = self.mutation.lock().await;

        let snapshots = self.store.load_channels().await.map_err(store_error)?;
        self.channels.clear();
        for snapshot in snapshots {
            let channel = Channel::from_snapshot(snapshot, &self.config.log_dir);
            self.channels
                .insert(channel.name().to_lowercase(), Arc::new(RwLock::new(channel)));
        }

        *self.templates.write() = self.store.load_templates().await.map_err(store_error)?;
        *self.dictionary.write() = self.store.load_dictionary().await.map_err(store_error)?;

        info!(channels = self.channels.len(), "registry loaded");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Channel lifecycle
    // ------------------------------------------------------------------

    /// Create a channel. The name must satisfy the charset and length
    /// policy and must not collide case-insensitively with an existing
    /// channel; the create hook may veto.
    pub async fn create_channel(
        &self,
        name: &str,
        creator: Option<&str>,
        hooks: &dyn EventHooks,
    ) -> Result<Arc<RwLock<Channel>>, ChannelError> {
        self.validate_name(name)?;

        let _guard = self.mutation.lock().await;
        if self.channels.contains_key(&name.to_lowercase()) {
            return Err(ChannelError::AlreadyExists(name.to_string()));
        }
        if !hooks.channel_create(name, creator) {
            return Err(ChannelError::Cancelled);
        }

        let channel = Channel::new(
            name,
            self.config.default_format.clone(),
            creator,
            &self.config.log_dir,
        );
        let channel = Arc::new(RwLock::new(channel));
        self.channels
            .insert(name.to_lowercase(), Arc::clone(&channel));
        self.persist(&channel).await;
        info!(channel = %name, creator = ?creator, "channel created");
        Ok(channel)
    }

    /// Get or create the personal channel between two members. Personal
    /// channels bypass the name policy and the create hook.
    pub async fn create_personal_channel(
        &self,
        initiator: &str,
        peer: &str,
    ) -> Arc<RwLock<Channel>> {
        let name = personal_channel_name(initiator, peer);
        if let Some(existing) = self.channels.get(&name) {
            return Arc::clone(existing.value());
        }

        let _guard = self.mutation.lock().await;
        if let Some(existing) = self.channels.get(&name) {
            return Arc::clone(existing.value());
        }

        let mut channel = Channel::new(
            name.clone(),
            PERSONAL_CHAT_FORMAT,
            Some(initiator),
            &self.config.log_dir,
        );
        channel.set_personal(initiator, peer);
        let channel = Arc::new(RwLock::new(channel));
        self.channels.insert(name, Arc::clone(&channel));
        self.persist(&channel).await;
        channel
    }

    /// Remove a channel. Returns `Ok(false)` when the target is the global
    /// channel, which cannot be removed. The remove hook may veto.
    pub async fn remove_channel(
        &self,
        name: &str,
        actor: Option<&str>,
        hooks: &dyn EventHooks,
    ) -> Result<bool, ChannelError> {
        let key = name.to_lowercase();
        let _guard = self.mutation.lock().await;

        let Some(channel) = self.channels.get(&key).map(|e| Arc::clone(e.value())) else {
            return Err(ChannelError::NotFound(name.to_string()));
        };
        if channel.read().is_global_channel() {
            return Ok(false);
        }
        if !hooks.channel_remove(name, actor) {
            return Err(ChannelError::Cancelled);
        }

        {
            let mut guard = channel.write();
            let members: Vec<String> = guard.members().to_vec();
            for member in members {
                guard.remove_member(&member, hooks);
            }
        }
        self.defaults.retain(|_, default| !same_name(default, name));
        self.channels.remove(&key);
        if let Err(e) = self.store.remove_channel(&key).await {
            warn!(channel = %name, error = %e, "failed to remove channel from store");
        }
        info!(channel = %name, actor = ?actor, "channel removed");
        Ok(true)
    }

    pub fn get_channel(&self, name: &str) -> Option<Arc<RwLock<Channel>>> {
        self.channels
            .get(&name.to_lowercase())
            .map(|e| Arc::clone(e.value()))
    }

    /// Every channel, name-sorted for stable listings.
    pub fn get_channels(&self) -> Vec<Arc<RwLock<Channel>>> {
        let mut all: Vec<Arc<RwLock<Channel>>> = self
            .channels
            .iter()
            .map(|e| Arc::clone(e.value()))
            .collect();
        all.sort_by_key(|ch| ch.read().name().to_lowercase());
        all
    }

    /// Names of the channels `member` belongs to.
    pub fn channels_of(&self, member: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .channels
            .iter()
            .filter(|e| e.value().read().is_member(member))
            .map(|e| e.value().read().name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Get the configured global channel, creating it on first use. Returns
    /// `None` when no global channel is configured.
    pub async fn ensure_global_channel(
        &self,
        hooks: &dyn EventHooks,
    ) -> Option<Arc<RwLock<Channel>>> {
        if !self.config.has_global_channel() {
            return None;
        }
        let name = self.config.global_channel.clone();
        if let Some(existing) = self.get_channel(&name) {
            return Some(existing);
        }
        match self.create_channel(&name, None, hooks).await {
            Ok(channel) => {
                channel.write().set_broadcast(true);
                self.persist(&channel).await;
                Some(channel)
            }
            Err(ChannelError::AlreadyExists(_)) => self.get_channel(&name),
            Err(e) => {
                warn!(channel = %name, error = %e, "failed to create global channel");
                None
            }
        }
    }

    /// Re-save one channel's snapshot after a mutation.
    pub async fn save(&self, name: &str) {
        if let Some(channel) = self.get_channel(name) {
            self.persist(&channel).await;
        }
    }

    async fn persist(&self, channel: &Arc<RwLock<Channel>>) {
        let snapshot = channel.read().snapshot();
        if let Err(e) = self.store.save_channel(&snapshot).await {
            warn!(channel = %snapshot.name, error = %e, "failed to save channel");
        }
    }

    fn validate_name(&self, name: &str) -> Result<(), ChannelError> {
        let len = name.chars().count();
        if len < self.config.min_channel_name_length
            || len > self.config.max_channel_name_length
            || !CHANNEL_NAME.is_match(name)
        {
            return Err(ChannelError::InvalidName(name.to_string()));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Default channels
    // ------------------------------------------------------------------

    pub fn set_default_channel(&self, member: &str, channel: &str) {
        self.defaults
            .insert(member.to_lowercase(), channel.to_string());
    }

    pub fn get_default_channel(&self, member: &str) -> Option<String> {
        self.defaults
            .get(&member.to_lowercase())
            .map(|e| e.value().clone())
    }

    pub fn remove_default_channel(&self, member: &str) {
        self.defaults.remove(&member.to_lowercase());
    }

    // ------------------------------------------------------------------
    // Format templates
    // ------------------------------------------------------------------

    /// Set or clear the `%0`..`%9` template body for `id`.
    pub async fn set_template(&self, id: &str, body: Option<&str>) {
        {
            let mut templates = self.templates.write();
            match body {
                Some(body) => templates.insert(id.to_string(), body.to_string()),
                None => templates.remove(id),
            };
        }
        let snapshot = self.templates.read().clone();
        if let Err(e) = self.store.save_templates(&snapshot).await {
            warn!(error = %e, "failed to save templates");
        }
    }

    // ------------------------------------------------------------------
    // Transliteration dictionary
    // ------------------------------------------------------------------

    /// Set or clear one dictionary entry.
    pub async fn set_dictionary(&self, key: &str, value: Option<&str>) {
        {
            let mut dictionary = self.dictionary.write();
            match value {
                Some(value) => dictionary.insert(key.to_string(), value.to_string()),
                None => dictionary.remove(key),
            };
        }
        let snapshot = self.dictionary.read().clone();
        if let Err(e) = self.store.save_dictionary(&snapshot).await {
            warn!(error = %e, "failed to save dictionary");
        }
    }

    pub fn dictionary(&self) -> BTreeMap<String, String> {
        self.dictionary.read().clone()
    }

    // ------------------------------------------------------------------
    // Hide relations
    // ------------------------------------------------------------------

    /// Record that `hider` no longer wants to see `target`. Returns false
    /// if the relation already existed.
    pub fn hide(&self, hider: &str, target: &str) -> bool {
        self.hides
            .entry(target.to_lowercase())
            .or_default()
            .insert(hider.to_lowercase())
    }

    pub fn unhide(&self, hider: &str, target: &str) -> bool {
        let key = target.to_lowercase();
        let Some(mut entry) = self.hides.get_mut(&key) else {
            return false;
        };
        let removed = entry.remove(&hider.to_lowercase());
        if entry.is_empty() {
            drop(entry);
            self.hides.remove_if(&key, |_, hiders| hiders.is_empty());
        }
        removed
    }

    /// Members who have hidden `target`, for recipient filtering.
    pub fn hide_list(&self, target: &str) -> Vec<String> {
        self.hides
            .get(&target.to_lowercase())
            .map(|e| {
                let mut hiders: Vec<String> = e.value().iter().cloned().collect();
                hiders.sort();
                hiders
            })
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Per-member transliteration switch
    // ------------------------------------------------------------------

    pub fn set_japanize_enabled(&self, member: &str, enabled: bool) {
        if enabled {
            self.japanize_off.remove(&member.to_lowercase());
        } else {
            self.japanize_off.insert(member.to_lowercase());
        }
    }

    pub fn is_japanize_enabled(&self, member: &str) -> bool {
        !self.japanize_off.contains(&member.to_lowercase())
    }
}

impl TemplateSource for ChannelRegistry {
    fn template(&self, id: &str) -> Option<String> {
        self.templates.read().get(id).cloned()
    }
}

fn store_error(e: crate::error::StoreError) -> ChannelError {
    ChannelError::Store(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::NoopHooks;
    use crate::store::{MemoryStore, NoopStore};

    fn registry_with(config: RelayConfig) -> ChannelRegistry {
        ChannelRegistry::new(Arc::new(config), Arc::new(NoopStore))
    }

    fn registry() -> ChannelRegistry {
        registry_with(RelayConfig::default())
    }

    #[tokio::test]
    async fn create_rejects_bad_names_and_collisions() {
        let reg = registry();
        let hooks = NoopHooks;

        assert!(matches!(
            reg.create_channel("abc", None, &hooks).await,
            Err(ChannelError::InvalidName(_))
        ));
        assert!(matches!(
            reg.create_channel("has space", None, &hooks).await,
            Err(ChannelError::InvalidName(_))
        ));

        reg.create_channel("town", Some("alice"), &hooks).await.unwrap();
        assert!(matches!(
            reg.create_channel("TOWN", None, &hooks).await,
            Err(ChannelError::AlreadyExists(_))
        ));
        assert!(reg.get_channel("Town").is_some());
    }

    #[tokio::test]
    async fn create_hook_can_veto() {
        struct Veto;
        impl EventHooks for Veto {
            fn channel_create(&self, _channel: &str, _creator: Option<&str>) -> bool {
                false
            }
        }
        let reg = registry();
        assert!(matches!(
            reg.create_channel("town", None, &Veto).await,
            Err(ChannelError::Cancelled)
        ));
        assert!(reg.get_channel("town").is_none());
    }

    #[tokio::test]
    async fn remove_refuses_the_global_channel() {
        let config = RelayConfig {
            global_channel: "global".to_string(),
            ..Default::default()
        };
        let reg = registry_with(config);
        let hooks = NoopHooks;

        let global = reg.ensure_global_channel(&hooks).await.unwrap();
        assert!(global.read().is_global_channel());
        assert!(!reg.remove_channel("global", None, &hooks).await.unwrap());
        assert!(reg.get_channel("global").is_some());
    }

    #[tokio::test]
    async fn remove_detaches_members_and_defaults() {
        let reg = registry();
        let hooks = NoopHooks;

        let town = reg.create_channel("town", None, &hooks).await.unwrap();
        town.write().add_member("alice", &hooks);
        reg.set_default_channel("alice", "town");

        assert!(reg.remove_channel("town", Some("admin"), &hooks).await.unwrap());
        assert!(reg.get_channel("town").is_none());
        assert!(reg.get_default_channel("alice").is_none());

        assert!(matches!(
            reg.remove_channel("town", None, &hooks).await,
            Err(ChannelError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn personal_channels_are_shared_and_hidden() {
        let reg = registry();
        let a = reg.create_personal_channel("Alice", "bob").await;
        let b = reg.create_personal_channel("Bob", "alice").await;
        assert!(Arc::ptr_eq(&a, &b));

        let guard = a.read();
        assert!(guard.is_personal_chat());
        assert!(!guard.is_visible());
        assert!(guard.is_member("alice"));
        assert!(guard.is_member("bob"));
    }

    #[tokio::test]
    async fn reload_round_trips_through_the_store() {
        let store = Arc::new(MemoryStore::new());
        let config = Arc::new(RelayConfig::default());
        let reg = ChannelRegistry::new(Arc::clone(&config), store.clone());
        let hooks = NoopHooks;

        let town = reg.create_channel("town", Some("alice"), &hooks).await.unwrap();
        town.write().add_member("bob", &hooks);
        reg.save("town").await;
        reg.set_template("3", Some("[%ch] %username")).await;
        reg.set_dictionary("sword", Some("ソード")).await;

        let fresh = ChannelRegistry::new(config, store);
        fresh.reload_all_data().await.unwrap();
        let town = fresh.get_channel("town").unwrap();
        assert!(town.read().is_member("bob"));
        assert_eq!(fresh.template("3").as_deref(), Some("[%ch] %username"));
        assert_eq!(fresh.dictionary().get("sword").map(String::as_str), Some("ソード"));
    }

    #[tokio::test]
    async fn hide_relations_track_hiders_per_target() {
        let reg = registry();
        assert!(reg.hide("Alice", "Bob"));
        assert!(!reg.hide("alice", "bob"));
        assert!(reg.hide("carol", "bob"));
        assert_eq!(reg.hide_list("BOB"), vec!["alice", "carol"]);

        assert!(reg.unhide("alice", "bob"));
        assert!(!reg.unhide("alice", "bob"));
        assert_eq!(reg.hide_list("bob"), vec!["carol"]);
    }

    #[tokio::test]
    async fn japanize_switch_defaults_on() {
        let reg = registry();
        assert!(reg.is_japanize_enabled("alice"));
        reg.set_japanize_enabled("Alice", false);
        assert!(!reg.is_japanize_enabled("alice"));
        reg.set_japanize_enabled("alice", true);
        assert!(reg.is_japanize_enabled("alice"));
    }
}
