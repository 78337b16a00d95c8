//! Polymorphic member identity.
//!
//! Players, the console, and remote senders all share one capability set:
//! a stable name, a display name, online status, message delivery, and the
//! permission oracle. The hosting platform's session registry stays behind
//! [`MemberProvider`], which the core calls by opaque identity string.

use std::sync::Arc;
use tracing::info;

/// Permission node granting receipt of every channel's traffic.
pub const PERM_LISTEN_ALL: &str = "chatrelay.admin.listen-all-channels";

/// Permission node granting moderator rights on every channel.
pub const PERM_MOD_ALL: &str = "chatrelay.admin.mod-all-channels";

/// A chat participant. Implemented by the embedding platform for players
/// and remote senders; [`ConsoleMember`] covers the local console.
pub trait ChannelMember: Send + Sync {
    /// Stable identity name. Channel membership and moderation sets key on
    /// this, case-insensitively.
    fn name(&self) -> &str;

    /// Name shown in formatted chat lines.
    fn display_name(&self) -> String {
        self.name().to_string()
    }

    /// Whether this member can currently receive messages.
    fn is_online(&self) -> bool;

    /// Deliver a rendered chat line. The text may contain clickable-format
    /// markers; flattening them is the rendering collaborator's job.
    fn send_message(&self, text: &str);

    /// Permission oracle keyed by a dotted node string. Opaque to the core.
    fn has_permission(&self, node: &str) -> bool;
}

/// Case-insensitive identity comparison used everywhere member names meet.
pub fn same_name(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Session collaborator: resolves opaque identity strings to live members
/// and enumerates the online population for broadcast resolution.
pub trait MemberProvider: Send + Sync {
    /// Resolve a member by identity name, online or not.
    fn lookup(&self, name: &str) -> Option<Arc<dyn ChannelMember>>;

    /// Every currently-connected member, in a stable snapshot order.
    fn online_members(&self) -> Vec<Arc<dyn ChannelMember>>;

    /// Names of all online members, for japanize keyword protection.
    fn online_names(&self) -> Vec<String> {
        self.online_members()
            .iter()
            .map(|m| m.name().to_string())
            .collect()
    }
}

/// The local console. Always online, holds every permission, and echoes
/// deliveries to the operational log.
#[derive(Debug, Default)]
pub struct ConsoleMember;

impl ChannelMember for ConsoleMember {
    fn name(&self) -> &str {
        "CONSOLE"
    }

    fn is_online(&self) -> bool {
        true
    }

    fn send_message(&self, text: &str) {
        info!(target: "chat", "{}", text);
    }

    fn has_permission(&self, _node: &str) -> bool {
        true
    }
}
