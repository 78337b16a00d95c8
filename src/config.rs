//! Relay configuration types and loading.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::japanize::JapanizeType;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level relay configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Name of the global channel. Empty disables the global channel and
    /// routes global chat through the legacy broadcast path.
    pub global_channel: String,

    /// Prefix marker forcing an utterance onto the global path.
    pub global_marker: String,

    /// Channels every member is joined to on connect.
    pub force_join_channels: Vec<String>,

    /// Quick-channel chat (`channel<sep>text` one-off utterances).
    pub enable_quick_channel_chat: bool,
    pub quick_channel_chat_separator: String,

    /// Route members without a default channel to the global path instead
    /// of dropping their chat.
    pub no_join_as_global: bool,

    /// Add holders of the listen-all permission to every recipient set.
    pub op_listen_all_channel: bool,

    /// Channel name policy bounds.
    pub min_channel_name_length: usize,
    pub max_channel_name_length: usize,

    /// Format template applied to newly created channels.
    pub default_format: String,

    /// Format for the legacy broadcast path (no global channel configured).
    pub normal_chat_message_format: String,

    /// Disallowed patterns, masked with asterisks rather than blocked.
    pub ng_words: Vec<String>,

    /// Echo channel chat to the console sink.
    pub display_chat_on_console: bool,
    /// Echo legacy broadcast chat to the console sink.
    pub display_normal_chat_on_console: bool,

    /// Append chat to the date-bucketed logs.
    pub logging_chat: bool,
    /// Base directory for chat logs.
    pub log_dir: PathBuf,

    /// Transliteration settings.
    pub japanize: JapanizeConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            global_channel: String::new(),
            global_marker: default_global_marker(),
            force_join_channels: Vec::new(),
            enable_quick_channel_chat: true,
            quick_channel_chat_separator: default_quick_separator(),
            no_join_as_global: true,
            op_listen_all_channel: false,
            min_channel_name_length: default_min_name_length(),
            max_channel_name_length: default_max_name_length(),
            default_format: default_channel_format(),
            normal_chat_message_format: default_normal_format(),
            ng_words: Vec::new(),
            display_chat_on_console: true,
            display_normal_chat_on_console: true,
            logging_chat: true,
            log_dir: PathBuf::from("logs"),
            japanize: JapanizeConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: RelayConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Compile the NG-word patterns, skipping (and tracing) invalid ones.
    pub fn compile_ng_words(&self) -> Vec<Regex> {
        self.ng_words
            .iter()
            .filter_map(|pattern| match Regex::new(pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(pattern = %pattern, error = %e, "skipping invalid NG-word pattern");
                    None
                }
            })
            .collect()
    }

    /// Whether a global channel is configured.
    pub fn has_global_channel(&self) -> bool {
        !self.global_channel.is_empty()
    }
}

/// Transliteration (japanize) settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JapanizeConfig {
    /// Conversion mode applied on the legacy broadcast path.
    pub kind: JapanizeType,

    /// 1 = converted text replaces the line via `line1_format`;
    /// 2 = original line plus a second line via `line2_format`.
    pub display_line: u8,
    pub line1_format: String,
    pub line2_format: String,

    /// Protect online player names from conversion.
    pub ignore_player_name: bool,

    /// Per-message marker suppressing conversion, e.g. `#`.
    pub none_japanize_marker: String,
}

impl Default for JapanizeConfig {
    fn default() -> Self {
        Self {
            kind: JapanizeType::Kana,
            display_line: 1,
            line1_format: "%msg &6(%japanize)".to_string(),
            line2_format: "&6[JP] %japanize".to_string(),
            ignore_player_name: false,
            none_japanize_marker: "#".to_string(),
        }
    }
}

impl JapanizeConfig {
    /// The display format for the configured line mode, with `%msg` and
    /// `%japanize` slots.
    pub fn display_format(&self) -> String {
        if self.display_line == 1 {
            self.line1_format.clone()
        } else {
            format!("%msg\n{}", self.line2_format)
        }
    }
}

fn default_global_marker() -> String {
    "!".to_string()
}

fn default_quick_separator() -> String {
    ":".to_string()
}

fn default_min_name_length() -> usize {
    4
}

fn default_max_name_length() -> usize {
    20
}

fn default_channel_format() -> String {
    "&f[%color%ch&f]%username&f: %msg".to_string()
}

fn default_normal_format() -> String {
    "&f%username&f: %msg".to_string()
}
