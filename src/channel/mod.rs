//! A named chat room: membership, options, moderation, recipient
//! resolution, and delivery.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::info;

use crate::config::RelayConfig;
use crate::error::ChannelError;
use crate::event::EventHooks;
use crate::format::{ChannelFormatInfo, ClickableFormat};
use crate::keyword::{mask_ng_words, strip_color_code};
use crate::logger::ChatLogger;
use crate::member::{ChannelMember, MemberProvider, PERM_LISTEN_ALL, PERM_MOD_ALL, same_name};
use crate::registry::ChannelRegistry;
use crate::store::ChannelSnapshot;

mod moderation;

pub use moderation::{Moderation, SweepOutcome};

/// Everything a chat delivery needs besides the channel itself.
pub struct ChatContext<'a> {
    pub config: &'a RelayConfig,
    pub provider: &'a dyn MemberProvider,
    pub hooks: &'a dyn EventHooks,
    pub ng_words: &'a [Regex],
    pub registry: &'a ChannelRegistry,
}

/// Deterministic name for the personal channel between two members, so a
/// lookup needs no separate index.
pub fn personal_channel_name(a: &str, b: &str) -> String {
    let (a, b) = (a.to_lowercase(), b.to_lowercase());
    if a <= b { format!("{a}>{b}") } else { format!("{b}>{a}") }
}

/// A chat channel. Mutation is serialized by the registry's per-channel
/// lock; methods here assume exclusive access where they take `&mut self`.
pub struct Channel {
    name: String,
    description: String,
    format: String,
    color_code: String,
    broadcast: bool,
    force_join: bool,
    personal: bool,
    visible: bool,
    allow_cc: bool,
    private_message_to: Option<String>,
    creator: Option<String>,
    /// Member names, lowercased, in join order.
    members: Vec<String>,
    moderators: HashSet<String>,
    moderation: Moderation,
    logger: ChatLogger,
}

impl Channel {
    /// Create a fresh channel. Spawns its log writer; requires a runtime.
    pub fn new(
        name: impl Into<String>,
        format: impl Into<String>,
        creator: Option<&str>,
        log_base: &Path,
    ) -> Self {
        let name = name.into();
        let logger = ChatLogger::new(name.to_lowercase(), log_base);
        Self {
            name,
            description: String::new(),
            format: format.into(),
            color_code: String::new(),
            broadcast: false,
            force_join: false,
            personal: false,
            visible: true,
            allow_cc: true,
            private_message_to: None,
            creator: creator.map(|c| c.to_lowercase()),
            members: Vec::new(),
            moderators: HashSet::new(),
            moderation: Moderation::new(),
            logger,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn color_code(&self) -> &str {
        &self.color_code
    }

    pub fn is_global_channel(&self) -> bool {
        self.broadcast
    }

    pub fn is_force_join_channel(&self) -> bool {
        self.force_join
    }

    pub fn is_personal_chat(&self) -> bool {
        self.personal
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn moderation(&self) -> &Moderation {
        &self.moderation
    }

    pub fn is_member(&self, member: &str) -> bool {
        self.members.iter().any(|m| same_name(m, member))
    }

    pub fn logger(&self) -> &ChatLogger {
        &self.logger
    }

    // ------------------------------------------------------------------
    // Options
    // ------------------------------------------------------------------

    pub fn set_description(&mut self, description: &str, hooks: &dyn EventHooks) {
        self.description = description.to_string();
        hooks.option_changed(&self.name, "description", description);
    }

    pub fn set_format(&mut self, format: &str, hooks: &dyn EventHooks) {
        self.format = format.to_string();
        hooks.option_changed(&self.name, "format", format);
    }

    pub fn set_color_code(&mut self, color_code: &str, hooks: &dyn EventHooks) {
        self.color_code = color_code.to_string();
        hooks.option_changed(&self.name, "color", color_code);
    }

    pub fn set_visible(&mut self, visible: bool, hooks: &dyn EventHooks) {
        self.visible = visible;
        hooks.option_changed(&self.name, "visible", if visible { "true" } else { "false" });
    }

    pub fn set_allow_cc(&mut self, allow_cc: bool, hooks: &dyn EventHooks) {
        self.allow_cc = allow_cc;
        hooks.option_changed(&self.name, "allowcc", if allow_cc { "true" } else { "false" });
    }

    pub(crate) fn set_broadcast(&mut self, broadcast: bool) {
        self.broadcast = broadcast;
    }

    pub(crate) fn set_force_join(&mut self, force_join: bool) {
        self.force_join = force_join;
    }

    pub(crate) fn set_personal(&mut self, peer_a: &str, peer_b: &str) {
        self.personal = true;
        self.visible = false;
        self.private_message_to = Some(peer_b.to_string());
        self.members = vec![peer_a.to_lowercase(), peer_b.to_lowercase()];
    }

    // ------------------------------------------------------------------
    // Membership
    // ------------------------------------------------------------------

    /// Add a member. Idempotent: returns false without firing the hook if
    /// the member is already present.
    pub fn add_member(&mut self, member: &str, hooks: &dyn EventHooks) -> bool {
        if self.is_member(member) {
            return false;
        }
        let before = self.members.clone();
        self.members.push(member.to_lowercase());
        hooks.member_changed(&self.name, &before, &self.members);
        true
    }

    /// Remove a member. Idempotent. Callers must check
    /// [`is_global_channel`](Self::is_global_channel) and
    /// [`is_force_join_channel`](Self::is_force_join_channel) first; the
    /// refusal is theirs to signal.
    pub fn remove_member(&mut self, member: &str, hooks: &dyn EventHooks) -> bool {
        if !self.is_member(member) {
            return false;
        }
        let before = self.members.clone();
        self.members.retain(|m| !same_name(m, member));
        hooks.member_changed(&self.name, &before, &self.members);
        true
    }

    // ------------------------------------------------------------------
    // Moderation
    // ------------------------------------------------------------------

    /// Ban a member. Bans and membership are reconciled together: the
    /// member is forcibly removed from the channel in the same step.
    pub fn ban(
        &mut self,
        member: &str,
        expiry: Option<DateTime<Utc>>,
        hooks: &dyn EventHooks,
    ) -> Result<(), ChannelError> {
        self.moderation.ban(member, expiry)?;
        self.remove_member(member, hooks);
        Ok(())
    }

    pub fn pardon(&mut self, member: &str) -> Result<(), ChannelError> {
        self.moderation.pardon(member)
    }

    pub fn mute(
        &mut self,
        member: &str,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<(), ChannelError> {
        self.moderation.mute(member, expiry)
    }

    pub fn unmute(&mut self, member: &str) -> Result<(), ChannelError> {
        self.moderation.unmute(member)
    }

    /// Suppress this channel's traffic for `member` (their own choice, not
    /// a moderator action).
    pub fn hide(&mut self, member: &str) -> bool {
        self.moderation.hide(member)
    }

    pub fn unhide(&mut self, member: &str) -> bool {
        self.moderation.unhide(member)
    }

    /// Clear expired mute/ban entries. Invoked once per sweep tick, not on
    /// every chat event; an expired entry may stay enforced for up to one
    /// tick past expiry.
    pub fn check_expires(&mut self, now: DateTime<Utc>) -> SweepOutcome {
        let outcome = self.moderation.check_expires(now);
        if !outcome.is_empty() {
            info!(
                channel = %self.name,
                unbanned = ?outcome.unbanned,
                unmuted = ?outcome.unmuted,
                "moderation entries expired"
            );
        }
        outcome
    }

    /// True if `actor` created the channel, is in the moderators set, or
    /// holds the channel-admin capability.
    pub fn has_moderator_permission(&self, actor: &Arc<dyn ChannelMember>) -> bool {
        if let Some(creator) = &self.creator
            && same_name(creator, actor.name())
        {
            return true;
        }
        self.moderators.contains(&actor.name().to_lowercase())
            || actor.has_permission(PERM_MOD_ALL)
    }

    pub fn add_moderator(&mut self, member: &str) -> bool {
        self.moderators.insert(member.to_lowercase())
    }

    pub fn remove_moderator(&mut self, member: &str) -> bool {
        self.moderators.remove(&member.to_lowercase())
    }

    // ------------------------------------------------------------------
    // Counts
    // ------------------------------------------------------------------

    /// Online member count. Broadcast channels report the whole population.
    pub fn online_count(&self, provider: &dyn MemberProvider) -> usize {
        if self.broadcast {
            return provider.online_members().len();
        }
        self.members
            .iter()
            .filter(|name| provider.lookup(name).is_some_and(|m| m.is_online()))
            .count()
    }

    /// Total member count. Broadcast channels report the whole population.
    pub fn total_count(&self, provider: &dyn MemberProvider) -> usize {
        if self.broadcast {
            return provider.online_members().len();
        }
        self.members.len()
    }

    // ------------------------------------------------------------------
    // Chat
    // ------------------------------------------------------------------

    /// Compute this channel's recipient set for an utterance by `speaker`.
    ///
    /// Broadcast channels start from every connected member, normal
    /// channels from online members; both subtract the channel's hided set,
    /// add listen-all capability holders, and subtract members who have
    /// hidden the speaker. Order is stable for a given snapshot.
    pub fn resolve_recipients(
        &self,
        speaker: &str,
        ctx: &ChatContext<'_>,
    ) -> Vec<Arc<dyn ChannelMember>> {
        let mut recipients: Vec<Arc<dyn ChannelMember>> = Vec::new();

        if self.broadcast {
            for member in ctx.provider.online_members() {
                if !self.moderation.is_hided(member.name()) {
                    recipients.push(member);
                }
            }
        } else {
            for name in &self.members {
                if self.moderation.is_hided(name) {
                    continue;
                }
                if let Some(member) = ctx.provider.lookup(name)
                    && member.is_online()
                {
                    recipients.push(member);
                }
            }
        }

        if ctx.config.op_listen_all_channel {
            for member in ctx.provider.online_members() {
                if member.has_permission(PERM_LISTEN_ALL)
                    && !recipients.iter().any(|r| same_name(r.name(), member.name()))
                {
                    recipients.push(member);
                }
            }
        }

        for hider in ctx.registry.hide_list(speaker) {
            recipients.retain(|r| !same_name(r.name(), &hider));
        }

        recipients
    }

    /// Deliver an utterance to this channel.
    ///
    /// Masks NG words, renders the format template, runs the non-cancelable
    /// channel-message hook (which may rewrite text and recipients), sends,
    /// optionally echoes to the console sink, and always appends to the
    /// channel log — even with zero recipients.
    pub fn chat(&self, speaker: &Arc<dyn ChannelMember>, message: &str, ctx: &ChatContext<'_>) {
        if self.moderation.is_muted(speaker.name()) {
            speaker.send_message("You are muted in this channel.");
            return;
        }

        let original = message;
        let mut message = mask_ng_words(message, ctx.ng_words);
        if !self.allow_cc {
            message = strip_color_code(&message);
        }

        let recipients = self.resolve_recipients(speaker.name(), ctx);

        let result = ctx.hooks.channel_message(
            &self.name,
            &speaker.display_name(),
            &message,
            recipients,
            original,
        );
        let message = result.message;
        let recipients = result.recipients;

        let info = ChannelFormatInfo {
            name: &self.name,
            color_code: &self.color_code,
            private_message_to: self.private_message_to.as_deref(),
        };
        let mut format = ClickableFormat::make_format(
            &self.format,
            Some(speaker),
            Some(&info),
            Some(ctx.registry),
            true,
        );
        format.replace("%msg", &message);

        let plain = format.to_plain_text();
        let rendered = format.into_string();

        for recipient in &recipients {
            recipient.send_message(&rendered);
        }

        if ctx.config.display_chat_on_console {
            info!(target: "chat", "{}", strip_color_code(&plain));
        }

        if ctx.config.logging_chat {
            self.logger.log(&message, &speaker.display_name());
        }
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    pub fn snapshot(&self) -> ChannelSnapshot {
        let (banned, muted, hided, ban_expires, mute_expires) =
            self.moderation.snapshot_parts();
        let mut moderators: Vec<String> = self.moderators.iter().cloned().collect();
        moderators.sort();
        ChannelSnapshot {
            name: self.name.clone(),
            description: self.description.clone(),
            format: self.format.clone(),
            color_code: self.color_code.clone(),
            broadcast: self.broadcast,
            force_join: self.force_join,
            personal: self.personal,
            visible: self.visible,
            allow_cc: self.allow_cc,
            private_message_to: self.private_message_to.clone(),
            creator: self.creator.clone(),
            members: self.members.clone(),
            moderators,
            banned,
            muted,
            hided,
            ban_expires,
            mute_expires,
        }
    }

    pub fn from_snapshot(snapshot: ChannelSnapshot, log_base: &Path) -> Self {
        let logger = ChatLogger::new(snapshot.name.to_lowercase(), log_base);
        Self {
            name: snapshot.name,
            description: snapshot.description,
            format: snapshot.format,
            color_code: snapshot.color_code,
            broadcast: snapshot.broadcast,
            force_join: snapshot.force_join,
            personal: snapshot.personal,
            visible: snapshot.visible,
            allow_cc: snapshot.allow_cc,
            private_message_to: snapshot.private_message_to,
            creator: snapshot.creator,
            members: snapshot.members.into_iter().map(|m| m.to_lowercase()).collect(),
            moderators: snapshot
                .moderators
                .into_iter()
                .map(|m| m.to_lowercase())
                .collect(),
            moderation: Moderation::from_snapshot_parts(
                snapshot.banned,
                snapshot.muted,
                snapshot.hided,
                snapshot.ban_expires,
                snapshot.mute_expires,
            ),
            logger,
        }
    }
}
