//! Chat routing.
//!
//! Every utterance enters through [`ChatRouter::process_chat`] and is
//! classified in order: the global marker, quick channel chat, the
//! speaker's default channel, then the configured fallback. Channel
//! delivery itself lives on [`crate::channel::Channel`]; this module owns
//! the classification, the transliteration step, and the legacy broadcast
//! path used when no global channel is configured.

use std::sync::Arc;

use regex::Regex;
use tracing::{info, warn};

use crate::channel::ChatContext;
use crate::config::RelayConfig;
use crate::error::ChannelError;
use crate::event::EventHooks;
use crate::format::ClickableFormat;
use crate::japanize::{ImeBackend, JapanizeConverter, JapanizeType, needs_no_conversion};
use crate::keyword::{mask_ng_words, strip_color_code};
use crate::logger::ChatLogger;
use crate::member::{ChannelMember, MemberProvider, same_name};
use crate::registry::ChannelRegistry;

/// Where [`ChatRouter::process_chat`] sent an utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatRoute {
    /// Delivered to the named channel.
    Channel(String),
    /// Took the global path (global channel or legacy broadcast).
    Global,
    /// Consumed without delivery (the speaker was notified why).
    Rejected,
    /// The relay did not handle it; the embedder's own chat applies.
    Unhandled,
}

pub struct ChatRouter {
    config: Arc<RelayConfig>,
    registry: Arc<ChannelRegistry>,
    provider: Arc<dyn MemberProvider>,
    hooks: Arc<dyn EventHooks>,
    ng_words: Vec<Regex>,
    normal_chat_logger: ChatLogger,
    japanize: JapanizeConverter,
}

impl ChatRouter {
    /// Build a router. Spawns the broadcast-path log writer; requires a
    /// tokio runtime.
    pub fn new(
        config: Arc<RelayConfig>,
        registry: Arc<ChannelRegistry>,
        provider: Arc<dyn MemberProvider>,
        hooks: Arc<dyn EventHooks>,
    ) -> Self {
        let ng_words = config.compile_ng_words();
        let normal_chat_logger = ChatLogger::new("normalchat", &config.log_dir);
        Self {
            config,
            registry,
            provider,
            hooks,
            ng_words,
            normal_chat_logger,
            japanize: JapanizeConverter::new(),
        }
    }

    /// Use an external IME stage for `JapanizeType::Ime` conversions.
    pub fn with_ime(mut self, backend: Arc<dyn ImeBackend>) -> Self {
        self.japanize = JapanizeConverter::with_ime(backend);
        self
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    pub fn normal_chat_logger(&self) -> &ChatLogger {
        &self.normal_chat_logger
    }

    /// Classify and deliver one utterance.
    ///
    /// Order of precedence: the global marker prefix, quick channel chat
    /// (`channel<sep>text`, membership required, no implicit join), the
    /// speaker's default channel, then either the global path or
    /// `Unhandled` depending on `no_join_as_global`.
    pub async fn process_chat(
        &self,
        speaker: &Arc<dyn ChannelMember>,
        message: &str,
    ) -> ChatRoute {
        let marker = self.config.global_marker.as_str();
        if !marker.is_empty()
            && let Some(rest) = message.strip_prefix(marker)
            && !rest.is_empty()
        {
            self.chat_global(speaker, rest).await;
            return ChatRoute::Global;
        }

        if self.config.enable_quick_channel_chat {
            let separator = self.config.quick_channel_chat_separator.as_str();
            if !separator.is_empty()
                && let Some((prefix, rest)) = message.split_once(separator)
                && !rest.is_empty()
                && let Some(channel) = self.registry.get_channel(prefix)
            {
                let (name, is_member) = {
                    let guard = channel.read();
                    (guard.name().to_string(), guard.is_member(speaker.name()))
                };
                if !is_member {
                    speaker.send_message(&format!("You are not a member of {name}."));
                    return ChatRoute::Rejected;
                }
                if let Err(e) = self.chat_to_channel(speaker, &name, rest).await {
                    warn!(channel = %name, error = %e, "quick channel chat failed");
                }
                return ChatRoute::Channel(name);
            }
        }

        if let Some(default) = self.registry.get_default_channel(speaker.name()) {
            match self.chat_to_channel(speaker, &default, message).await {
                Ok(()) => return ChatRoute::Channel(default),
                Err(ChannelError::NotFound(_)) => {
                    // Stale binding; drop it and fall through.
                    self.registry.remove_default_channel(speaker.name());
                }
                Err(e) => {
                    warn!(channel = %default, error = %e, "default channel chat failed");
                    return ChatRoute::Channel(default);
                }
            }
        }

        if self.config.no_join_as_global {
            self.chat_global(speaker, message).await;
            ChatRoute::Global
        } else {
            ChatRoute::Unhandled
        }
    }

    /// Deliver to a named channel, running the cancelable pre-chat hook
    /// first. The hook may rewrite the text or redirect to another channel.
    pub async fn chat_to_channel(
        &self,
        speaker: &Arc<dyn ChannelMember>,
        channel_name: &str,
        message: &str,
    ) -> Result<(), ChannelError> {
        let channel = self
            .registry
            .get_channel(channel_name)
            .ok_or_else(|| ChannelError::NotFound(channel_name.to_string()))?;
        let name = channel.read().name().to_string();

        let pre = self.hooks.pre_chat(&name, speaker, message);
        if pre.cancelled {
            return Ok(());
        }
        let (channel, name) = match pre.channel {
            Some(redirect) => {
                let target = self
                    .registry
                    .get_channel(&redirect)
                    .ok_or_else(|| ChannelError::NotFound(redirect.clone()))?;
                let name = target.read().name().to_string();
                (target, name)
            }
            None => (channel, name),
        };

        let message = self.apply_japanize(speaker, Some(&name), &pre.message).await;
        let ctx = self.context();
        channel.read().chat(speaker, &message, &ctx);
        Ok(())
    }

    /// The global path. With a global channel configured the utterance goes
    /// through it like any channel chat; otherwise the legacy broadcast
    /// path formats and fans out to every connected member directly.
    pub async fn chat_global(&self, speaker: &Arc<dyn ChannelMember>, message: &str) {
        if self.config.has_global_channel() {
            if let Some(channel) = self.registry.ensure_global_channel(self.hooks.as_ref()).await
            {
                let name = channel.read().name().to_string();
                // Global chat also adopts the channel as the speaker's
                // default when they have none yet.
                if self.registry.get_default_channel(speaker.name()).is_none() {
                    self.registry.set_default_channel(speaker.name(), &name);
                }
                if let Err(e) = self.chat_to_channel(speaker, &name, message).await {
                    warn!(channel = %name, error = %e, "global channel chat failed");
                }
            }
            return;
        }

        let message = self.apply_japanize(speaker, None, message).await;
        let message = mask_ng_words(&message, &self.ng_words);

        let mut format = ClickableFormat::make_format(
            &self.config.normal_chat_message_format,
            Some(speaker),
            None,
            Some(self.registry.as_ref()),
            true,
        );
        format.replace("%msg", &message);
        let plain = format.to_plain_text();
        let rendered = format.into_string();

        let mut recipients = self.provider.online_members();
        for hider in self.registry.hide_list(speaker.name()) {
            recipients.retain(|r| !same_name(r.name(), &hider));
        }
        for recipient in &recipients {
            recipient.send_message(&rendered);
        }

        if self.config.display_normal_chat_on_console {
            info!(target: "chat", "{}", strip_color_code(&plain));
        }
        if self.config.logging_chat {
            // The broadcast path records the formatted line, speaker prefix
            // included; channel logs record the bare message.
            self.normal_chat_logger.log(&plain, &speaker.display_name());
        }
    }

    /// Run an utterance through transliteration when it qualifies,
    /// returning the line to deliver (augmented per the display-line mode,
    /// or unchanged when conversion is skipped, empty, or cancelled).
    ///
    /// A leading no-conversion marker is consumed and suppresses the whole
    /// step.
    async fn apply_japanize(
        &self,
        speaker: &Arc<dyn ChannelMember>,
        channel: Option<&str>,
        message: &str,
    ) -> String {
        let jc = &self.config.japanize;

        let marker = jc.none_japanize_marker.as_str();
        if !marker.is_empty()
            && let Some(stripped) = message.strip_prefix(marker)
        {
            return stripped.to_string();
        }

        if jc.kind == JapanizeType::None
            || !self.registry.is_japanize_enabled(speaker.name())
            || needs_no_conversion(message)
        {
            return message.to_string();
        }

        let protected = if jc.ignore_player_name {
            self.provider.online_names()
        } else {
            Vec::new()
        };
        let dictionary = self.registry.dictionary();

        match self
            .japanize
            .run(
                message,
                jc.kind,
                &jc.display_format(),
                channel,
                speaker,
                &dictionary,
                &protected,
                &self.ng_words,
                self.hooks.as_ref(),
            )
            .await
        {
            Some(rendered) => rendered,
            None => message.to_string(),
        }
    }

    /// Connect-time lifecycle: bind the global channel as the default for
    /// members who have none, then join the force-join channels (creating
    /// them on first use), each of which also becomes the default when the
    /// member still has none.
    pub async fn on_join(&self, member: &Arc<dyn ChannelMember>) {
        if self.config.has_global_channel()
            && self.registry.get_default_channel(member.name()).is_none()
        {
            self.registry.ensure_global_channel(self.hooks.as_ref()).await;
            self.registry
                .set_default_channel(member.name(), &self.config.global_channel);
        }

        for name in &self.config.force_join_channels {
            let channel = match self.registry.get_channel(name) {
                Some(channel) => channel,
                None => match self
                    .registry
                    .create_channel(name, None, self.hooks.as_ref())
                    .await
                {
                    Ok(channel) => {
                        channel.write().set_force_join(true);
                        self.registry.save(name).await;
                        channel
                    }
                    Err(e) => {
                        if !e.is_cancellation() {
                            warn!(channel = %name, error = %e, "cannot create force-join channel");
                        }
                        continue;
                    }
                },
            };
            let added = channel.write().add_member(member.name(), self.hooks.as_ref());
            if added {
                self.registry.save(name).await;
            }
            if self.registry.get_default_channel(member.name()).is_none() {
                self.registry.set_default_channel(member.name(), name);
            }
        }
    }

    /// Disconnect-time lifecycle: tear down the member's personal channels
    /// whose peer is offline. Default bindings survive disconnects.
    pub async fn on_quit(&self, member: &Arc<dyn ChannelMember>) {
        let mut stale = Vec::new();
        for channel in self.registry.get_channels() {
            let guard = channel.read();
            if !guard.is_personal_chat() || !guard.is_member(member.name()) {
                continue;
            }
            let peer_online = guard.members().iter().any(|m| {
                !same_name(m, member.name())
                    && self.provider.lookup(m).is_some_and(|p| p.is_online())
            });
            if !peer_online {
                stale.push(guard.name().to_string());
            }
        }
        for name in stale {
            if let Err(e) = self
                .registry
                .remove_channel(&name, None, self.hooks.as_ref())
                .await
                && !e.is_cancellation()
            {
                warn!(channel = %name, error = %e, "failed to remove personal channel");
            }
        }
    }

    /// Fire-and-forget entry point for embedders whose chat event cannot
    /// await.
    pub fn spawn_chat(self: &Arc<Self>, speaker: Arc<dyn ChannelMember>, message: String) {
        let router = Arc::clone(self);
        tokio::spawn(async move {
            router.process_chat(&speaker, &message).await;
        });
    }

    fn context(&self) -> ChatContext<'_> {
        ChatContext {
            config: &self.config,
            provider: self.provider.as_ref(),
            hooks: self.hooks.as_ref(),
            ng_words: &self.ng_words,
            registry: &self.registry,
        }
    }
}
