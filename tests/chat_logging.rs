//! Integration tests for end-to-end chat logging and retrieval.

mod common;

use chrono::Local;
use common::{TestMember, TestProvider, as_member, build_router, noop_hooks, test_config};

use chat_relay::NoopHooks;

#[tokio::test]
async fn channel_chat_lands_in_the_date_bucket() {
    let tmp = tempfile::tempdir().unwrap();
    let alice = TestMember::new("alice");
    let bob = TestMember::new("bob");
    let provider = TestProvider::new(&[&alice, &bob]);
    let (router, registry) = build_router(test_config(&tmp), provider, noop_hooks());

    let town = registry.create_channel("town", None, &NoopHooks).await.unwrap();
    {
        let mut guard = town.write();
        guard.add_member("alice", &NoopHooks);
        guard.add_member("bob", &NoopHooks);
    }
    registry.set_default_channel("alice", "town");

    router.process_chat(&as_member(&alice), "for the record").await;
    router.process_chat(&as_member(&alice), "second, line").await;

    let guard = town.read();
    guard.logger().flush().await;

    // The file sits under logs/<today>/town.log.
    let bucket = Local::now().format("%Y-%m-%d").to_string();
    assert!(tmp.path().join("logs").join(&bucket).join("town.log").is_file());

    let lines = guard.logger().get_log(None, None, None, false);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with(",for the record,alice"));
    // The comma in the message was escaped to keep three fields.
    assert!(lines[1].contains("second， line"));

    let filtered = guard.logger().get_log(None, Some("record"), None, false);
    assert_eq!(filtered.len(), 1);
}

#[tokio::test]
async fn broadcast_path_uses_the_normal_chat_logger() {
    let tmp = tempfile::tempdir().unwrap();
    let alice = TestMember::new("alice");
    let provider = TestProvider::new(&[&alice]);
    let (router, _registry) = build_router(test_config(&tmp), provider, noop_hooks());

    // No default channel and no global channel: legacy broadcast.
    router.process_chat(&as_member(&alice), "hello everyone").await;
    router.normal_chat_logger().flush().await;

    let lines = router.normal_chat_logger().get_log(Some("alice"), None, None, false);
    assert_eq!(lines.len(), 1);
    // The broadcast path records the formatted line, speaker prefix and
    // all, color-stripped.
    assert!(lines[0].contains("alice: hello everyone"));
}

#[tokio::test]
async fn logging_can_be_switched_off() {
    let tmp = tempfile::tempdir().unwrap();
    let alice = TestMember::new("alice");
    let provider = TestProvider::new(&[&alice]);
    let mut config = test_config(&tmp);
    config.logging_chat = false;
    let (router, registry) = build_router(config, provider, noop_hooks());

    let town = registry.create_channel("town", None, &NoopHooks).await.unwrap();
    town.write().add_member("alice", &NoopHooks);
    registry.set_default_channel("alice", "town");

    router.process_chat(&as_member(&alice), "off the record").await;

    let guard = town.read();
    guard.logger().flush().await;
    assert!(guard.logger().get_log(None, None, None, false).is_empty());
}
