//! Shared harness for integration tests: scripted members, a fixed
//! session provider, and a config pointed at a temp directory.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tempfile::TempDir;

use chat_relay::{
    ChannelMember, ChannelRegistry, ChatRouter, EventHooks, JapanizeConfig, JapanizeType,
    MemberProvider, NoopHooks, RelayConfig, same_name,
};

pub struct TestMember {
    name: String,
    online: AtomicBool,
    permissions: Mutex<HashSet<String>>,
    inbox: Mutex<Vec<String>>,
}

impl TestMember {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            online: AtomicBool::new(true),
            permissions: Mutex::new(HashSet::new()),
            inbox: Mutex::new(Vec::new()),
        })
    }

    pub fn grant(self: &Arc<Self>, node: &str) -> Arc<Self> {
        self.permissions.lock().insert(node.to_string());
        Arc::clone(self)
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn received(&self) -> Vec<String> {
        self.inbox.lock().clone()
    }

    pub fn clear(&self) {
        self.inbox.lock().clear();
    }
}

impl ChannelMember for TestMember {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn send_message(&self, text: &str) {
        self.inbox.lock().push(text.to_string());
    }

    fn has_permission(&self, node: &str) -> bool {
        self.permissions.lock().contains(node)
    }
}

#[derive(Default)]
pub struct TestProvider {
    members: Mutex<Vec<Arc<TestMember>>>,
}

impl TestProvider {
    pub fn new(members: &[&Arc<TestMember>]) -> Arc<Self> {
        Arc::new(Self {
            members: Mutex::new(members.iter().map(|m| Arc::clone(m)).collect()),
        })
    }

    pub fn add(&self, member: &Arc<TestMember>) {
        self.members.lock().push(Arc::clone(member));
    }
}

impl MemberProvider for TestProvider {
    fn lookup(&self, name: &str) -> Option<Arc<dyn ChannelMember>> {
        self.members
            .lock()
            .iter()
            .find(|m| same_name(m.name(), name))
            .map(|m| Arc::clone(m) as Arc<dyn ChannelMember>)
    }

    fn online_members(&self) -> Vec<Arc<dyn ChannelMember>> {
        self.members
            .lock()
            .iter()
            .filter(|m| m.is_online())
            .map(|m| Arc::clone(m) as Arc<dyn ChannelMember>)
            .collect()
    }
}

/// A config rooted in `tmp`, with transliteration off so routing tests see
/// their text unmodified.
pub fn test_config(tmp: &TempDir) -> RelayConfig {
    RelayConfig {
        log_dir: tmp.path().to_path_buf(),
        japanize: JapanizeConfig {
            kind: JapanizeType::None,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Wire a router over a fresh registry backed by `NoopStore`.
pub fn build_router(
    config: RelayConfig,
    provider: Arc<TestProvider>,
    hooks: Arc<dyn EventHooks>,
) -> (Arc<ChatRouter>, Arc<ChannelRegistry>) {
    let config = Arc::new(config);
    let registry = Arc::new(ChannelRegistry::new(
        Arc::clone(&config),
        Arc::new(chat_relay::NoopStore),
    ));
    let router = Arc::new(ChatRouter::new(
        config,
        Arc::clone(&registry),
        provider,
        hooks,
    ));
    (router, registry)
}

pub fn noop_hooks() -> Arc<dyn EventHooks> {
    Arc::new(NoopHooks)
}

pub fn as_member(member: &Arc<TestMember>) -> Arc<dyn ChannelMember> {
    Arc::clone(member) as Arc<dyn ChannelMember>
}
