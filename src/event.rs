//! Event-hook surface at the crate boundary.
//!
//! External code observes and, at two points, cancels chat processing.
//! All hooks are synchronous from the core's point of view: a handler that
//! needs async work must finish it before returning, because downstream
//! delivery ordering depends on the result.

use std::sync::Arc;

use crate::member::ChannelMember;

/// Outcome of the pre-chat hook. May veto the utterance, redirect it to a
/// different channel, or rewrite its text.
#[derive(Debug, Clone)]
pub struct PreChatResult {
    pub cancelled: bool,
    pub message: String,
    /// Redirect target; `None` keeps the originally resolved channel.
    pub channel: Option<String>,
}

impl PreChatResult {
    pub fn pass(message: &str) -> Self {
        Self {
            cancelled: false,
            message: message.to_string(),
            channel: None,
        }
    }
}

/// Outcome of the post-japanize hook. May cancel the converted line or
/// rewrite the converted text.
#[derive(Debug, Clone)]
pub struct PostJapanizeResult {
    pub cancelled: bool,
    pub japanized: String,
}

impl PostJapanizeResult {
    pub fn pass(japanized: &str) -> Self {
        Self {
            cancelled: false,
            japanized: japanized.to_string(),
        }
    }
}

/// Outcome of the channel-message hook. Informational: it cannot cancel,
/// only rewrite the message text and the recipient list.
pub struct ChannelMessageResult {
    pub message: String,
    pub recipients: Vec<Arc<dyn ChannelMember>>,
}

/// Registered event handlers. Every method has a pass-through default, so
/// embedders implement only what they observe.
pub trait EventHooks: Send + Sync {
    /// Cancelable. Runs before any channel delivery.
    fn pre_chat(
        &self,
        _channel: &str,
        _speaker: &Arc<dyn ChannelMember>,
        message: &str,
    ) -> PreChatResult {
        PreChatResult::pass(message)
    }

    /// Cancelable. Runs after transliteration, before the converted line is
    /// rendered.
    fn post_japanize(
        &self,
        _channel: &str,
        _speaker: &Arc<dyn ChannelMember>,
        _original: &str,
        japanized: &str,
    ) -> PostJapanizeResult {
        PostJapanizeResult::pass(japanized)
    }

    /// Non-cancelable. Runs once the recipient set is resolved.
    fn channel_message(
        &self,
        _channel: &str,
        _speaker_display: &str,
        message: &str,
        recipients: Vec<Arc<dyn ChannelMember>>,
        _original: &str,
    ) -> ChannelMessageResult {
        ChannelMessageResult {
            message: message.to_string(),
            recipients,
        }
    }

    /// Cancelable. Returning `false` vetoes channel creation.
    fn channel_create(&self, _channel: &str, _creator: Option<&str>) -> bool {
        true
    }

    /// Cancelable. Returning `false` vetoes channel removal.
    fn channel_remove(&self, _channel: &str, _actor: Option<&str>) -> bool {
        true
    }

    /// Informational. Fired with before/after membership snapshots.
    fn member_changed(&self, _channel: &str, _before: &[String], _after: &[String]) {}

    /// Informational. Fired when a channel option is mutated.
    fn option_changed(&self, _channel: &str, _key: &str, _value: &str) {}
}

/// Default hook set: observes nothing, cancels nothing.
#[derive(Debug, Default)]
pub struct NoopHooks;

impl EventHooks for NoopHooks {}
