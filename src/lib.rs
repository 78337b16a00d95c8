//! chat-relay: an embeddable multi-channel chat relay core.
//!
//! The crate models named channels with membership, moderation (ban, mute,
//! hide, with optional expiry), a routing pipeline that classifies every
//! utterance (quick channel chat, global marker, default channel,
//! broadcast fallback), romaji-to-kana transliteration with keyword
//! protection, and append-only date-bucketed chat logs.
//!
//! The embedding platform supplies three collaborators: a
//! [`member::MemberProvider`] for live sessions, an [`event::EventHooks`]
//! implementation for observation and veto points, and a
//! [`store::ChannelStore`] for persistence. Everything else is owned here.

pub mod channel;
pub mod config;
pub mod error;
pub mod event;
pub mod format;
pub mod japanize;
pub mod keyword;
pub mod logger;
pub mod member;
pub mod registry;
pub mod router;
pub mod store;
pub mod sweep;

pub use channel::{Channel, ChatContext, Moderation, SweepOutcome, personal_channel_name};
pub use config::{ConfigError, JapanizeConfig, RelayConfig};
pub use error::{ChannelError, LogError, StoreError};
pub use event::{
    ChannelMessageResult, EventHooks, NoopHooks, PostJapanizeResult, PreChatResult,
};
pub use format::{ActionKind, ChannelFormatInfo, ClickableFormat, FormatSpan, TemplateSource};
pub use japanize::{GoogleImeBackend, ImeBackend, JapanizeConverter, JapanizeType};
pub use logger::ChatLogger;
pub use member::{
    ChannelMember, ConsoleMember, MemberProvider, PERM_LISTEN_ALL, PERM_MOD_ALL, same_name,
};
pub use registry::ChannelRegistry;
pub use router::{ChatRoute, ChatRouter};
pub use store::{ChannelSnapshot, ChannelStore, MemoryStore, NoopStore};
pub use sweep::spawn_expire_check;
