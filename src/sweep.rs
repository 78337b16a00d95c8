//! Periodic expiry sweep for timed bans and mutes.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::registry::ChannelRegistry;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Spawn the background task that clears expired moderation entries once a
/// minute. An entry may therefore outlive its expiry by up to one interval.
pub fn spawn_expire_check(registry: Arc<ChannelRegistry>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            sweep_once(&registry).await;
        }
    })
}

/// One sweep over every channel. Channels whose sets changed are re-saved.
pub async fn sweep_once(registry: &ChannelRegistry) {
    let now = Utc::now();
    for channel in registry.get_channels() {
        let (name, outcome) = {
            let mut guard = channel.write();
            (guard.name().to_string(), guard.check_expires(now))
        };
        if !outcome.is_empty() {
            debug!(channel = %name, "expiry sweep cleared entries");
            registry.save(&name).await;
        }
    }
}
