//! Integration tests for channel lifecycle: creation policy, removal,
//! join/quit handling, and store round-trips.

mod common;

use std::sync::Arc;

use common::{TestMember, TestProvider, as_member, build_router, noop_hooks, test_config};

use chat_relay::{
    ChannelError, ChannelRegistry, ChannelMember, ChatRouter, EventHooks, MemoryStore, NoopHooks,
};

#[tokio::test]
async fn lifecycle_survives_a_store_reload() {
    let tmp = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let config = Arc::new(test_config(&tmp));

    {
        let registry = ChannelRegistry::new(Arc::clone(&config), store.clone());
        let town = registry
            .create_channel("town", Some("alice"), &NoopHooks)
            .await
            .unwrap();
        {
            let mut guard = town.write();
            guard.add_member("alice", &NoopHooks);
            guard.add_member("bob", &NoopHooks);
            guard.set_description("the town square", &NoopHooks);
            guard.mute("bob", None).unwrap();
        }
        registry.save("town").await;
        registry.set_dictionary("sword", Some("ソード")).await;
        registry.set_template("3", Some("[%ch] %username")).await;
    }

    // A fresh registry over the same store sees the whole picture.
    let registry = ChannelRegistry::new(config, store);
    registry.reload_all_data().await.unwrap();

    let town = registry.get_channel("TOWN").expect("channel survived");
    let guard = town.read();
    assert_eq!(guard.description(), "the town square");
    assert!(guard.is_member("alice"));
    assert!(guard.moderation().is_muted("bob"));
    drop(guard);

    assert_eq!(
        registry.dictionary().get("sword").map(String::as_str),
        Some("ソード")
    );
}

#[tokio::test]
async fn removal_clears_members_and_default_bindings() {
    let tmp = tempfile::tempdir().unwrap();
    let config = Arc::new(test_config(&tmp));
    let registry = ChannelRegistry::new(config, Arc::new(chat_relay::NoopStore));

    let town = registry.create_channel("town", None, &NoopHooks).await.unwrap();
    town.write().add_member("alice", &NoopHooks);
    registry.set_default_channel("alice", "town");

    assert!(registry.remove_channel("town", Some("admin"), &NoopHooks).await.unwrap());
    assert!(registry.get_channel("town").is_none());
    assert!(registry.get_default_channel("alice").is_none());
}

#[tokio::test]
async fn remove_hook_vetoes_silently() {
    struct VetoRemove;
    impl EventHooks for VetoRemove {
        fn channel_remove(&self, _channel: &str, _actor: Option<&str>) -> bool {
            false
        }
    }

    let tmp = tempfile::tempdir().unwrap();
    let config = Arc::new(test_config(&tmp));
    let registry = ChannelRegistry::new(config, Arc::new(chat_relay::NoopStore));

    registry.create_channel("town", None, &NoopHooks).await.unwrap();
    let err = registry
        .remove_channel("town", None, &VetoRemove)
        .await
        .unwrap_err();
    assert!(err.is_cancellation());
    assert!(registry.get_channel("town").is_some());
}

#[tokio::test]
async fn name_policy_bounds_are_configurable() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = test_config(&tmp);
    config.min_channel_name_length = 2;
    config.max_channel_name_length = 6;
    let registry = ChannelRegistry::new(Arc::new(config), Arc::new(chat_relay::NoopStore));

    registry.create_channel("ok", None, &NoopHooks).await.unwrap();
    assert!(matches!(
        registry.create_channel("x", None, &NoopHooks).await,
        Err(ChannelError::InvalidName(_))
    ));
    assert!(matches!(
        registry.create_channel("toolongname", None, &NoopHooks).await,
        Err(ChannelError::InvalidName(_))
    ));
}

#[tokio::test]
async fn join_and_quit_lifecycle() {
    let tmp = tempfile::tempdir().unwrap();
    let alice = TestMember::new("alice");
    let bob = TestMember::new("bob");
    let provider = TestProvider::new(&[&alice, &bob]);

    let mut config = test_config(&tmp);
    config.global_channel = "global".to_string();
    config.force_join_channels = vec!["lobby".to_string()];
    let (router, registry): (Arc<ChatRouter>, _) =
        build_router(config, Arc::clone(&provider), noop_hooks());

    router.on_join(&as_member(&alice)).await;
    router.on_join(&as_member(&bob)).await;

    let lobby = registry.get_channel("lobby").unwrap();
    assert!(lobby.read().is_force_join_channel());
    assert!(lobby.read().is_member("alice"));
    assert!(lobby.read().is_member("bob"));
    assert_eq!(registry.get_default_channel("alice").as_deref(), Some("global"));

    // A personal chat between the two, then bob leaves while alice stays.
    registry.create_personal_channel("alice", "bob").await;
    bob.set_online(false);
    router.on_quit(&as_member(&bob)).await;
    // alice is still online, so the channel survives for her.
    assert!(registry.get_channel("alice>bob").is_some());

    alice.set_online(false);
    router.on_quit(&as_member(&alice)).await;
    assert!(registry.get_channel("alice>bob").is_none());
}

#[tokio::test]
async fn moderator_permission_covers_creator_set_and_node() {
    let tmp = tempfile::tempdir().unwrap();
    let config = Arc::new(test_config(&tmp));
    let registry = ChannelRegistry::new(config, Arc::new(chat_relay::NoopStore));

    let town = registry
        .create_channel("town", Some("alice"), &NoopHooks)
        .await
        .unwrap();
    town.write().add_moderator("bob");

    let alice: Arc<dyn ChannelMember> = as_member(&TestMember::new("alice"));
    let bob: Arc<dyn ChannelMember> = as_member(&TestMember::new("bob"));
    let carol: Arc<dyn ChannelMember> = as_member(&TestMember::new("carol"));
    let admin: Arc<dyn ChannelMember> =
        as_member(&TestMember::new("admin").grant(chat_relay::PERM_MOD_ALL));

    let guard = town.read();
    assert!(guard.has_moderator_permission(&alice));
    assert!(guard.has_moderator_permission(&bob));
    assert!(!guard.has_moderator_permission(&carol));
    assert!(guard.has_moderator_permission(&admin));
}
