//! Asynchronous transliteration (japanize) pipeline.
//!
//! Romaji chat is rewritten into kana (optionally refined through an
//! external IME stage) with keyword protection: player names and dictionary
//! keys are locked behind sentinel tokens before conversion and restored
//! afterwards, so the conversion stages never see them. NG-word masking is
//! re-applied to the converted text only, and a cancelable post-japanize
//! hook runs before the display format is rendered.

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Deserialize;

use crate::event::EventHooks;
use crate::keyword::{mask_ng_words, strip_color_code};
use crate::member::ChannelMember;

pub mod ime;
pub mod kana;

pub use ime::{GoogleImeBackend, ImeBackend};

/// URL-shaped substrings are cut from the analysis text so they are never
/// transliterated.
static URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://[\w/:%#\$&\?\(\)~\.=\+\-]+").expect("url regex")
});

/// Half-width katakana plus spaces; text matching this in full needs no
/// conversion.
static HALFWIDTH_KANA_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ \x{FF61}-\x{FF9F}]+$").expect("halfwidth kana regex"));

/// Conversion mode selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JapanizeType {
    /// No conversion.
    None,
    /// Kana-rule conversion only.
    #[default]
    Kana,
    /// Kana rule followed by the external IME stage.
    Ime,
}

/// Whether `message` should skip conversion by policy: it already contains
/// multi-byte text, or consists solely of half-width katakana.
pub fn needs_no_conversion(message: &str) -> bool {
    let plain = strip_color_code(message);
    plain.len() > plain.chars().count() || HALFWIDTH_KANA_ONLY.is_match(&plain)
}

/// Keyword-protected transliteration pipeline.
pub struct JapanizeConverter {
    ime: Option<Arc<dyn ImeBackend>>,
}

impl Default for JapanizeConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl JapanizeConverter {
    /// A converter without an external IME stage; `JapanizeType::Ime`
    /// requests fall back to the kana result.
    pub fn new() -> Self {
        Self { ime: None }
    }

    pub fn with_ime(backend: Arc<dyn ImeBackend>) -> Self {
        Self { ime: Some(backend) }
    }

    /// Core conversion: strip markup and URLs for analysis, lock protected
    /// keywords, convert, optionally refine through the IME stage, unlock.
    ///
    /// The stripped text is only ever used to derive the converted line;
    /// the original message is not touched.
    pub async fn convert(
        &self,
        input: &str,
        kind: JapanizeType,
        dictionary: &BTreeMap<String, String>,
        protected_names: &[String],
    ) -> String {
        if kind == JapanizeType::None {
            return String::new();
        }

        let analysis = strip_color_code(&URL.replace_all(input, " "));
        let (locked, tokens) = lock_keywords(&analysis, dictionary, protected_names);

        let mut converted = kana::to_hiragana(&locked);

        if kind == JapanizeType::Ime
            && let Some(ime) = &self.ime
            && let Some(refined) = ime.convert(&converted).await
        {
            converted = refined;
        }

        unlock_keywords(converted, &tokens)
    }

    /// Full legacy-path pipeline: convert, mask NG words on the converted
    /// text, run the post-japanize hook, render the display format.
    ///
    /// Returns `None` when the conversion came out empty or a hook cancelled
    /// it; the caller must then suppress the transliteration line entirely.
    #[allow(clippy::too_many_arguments)]
    pub async fn run(
        &self,
        input: &str,
        kind: JapanizeType,
        display_format: &str,
        channel: Option<&str>,
        speaker: &Arc<dyn ChannelMember>,
        dictionary: &BTreeMap<String, String>,
        protected_names: &[String],
        ng_words: &[Regex],
        hooks: &dyn EventHooks,
    ) -> Option<String> {
        let japanized = self
            .convert(input, kind, dictionary, protected_names)
            .await;
        if japanized.is_empty() {
            return None;
        }

        let japanized = mask_ng_words(&japanized, ng_words);

        let result = hooks.post_japanize(channel.unwrap_or(""), speaker, input, &japanized);
        if result.cancelled {
            return None;
        }

        let rendered = display_format
            .replace("%msg", input)
            .replace("%japanize", &result.japanized);
        Some(rendered)
    }
}

/// Replace every occurrence of a protected keyword with a unique sentinel
/// token, returning the locked text and the token substitutions to apply
/// after conversion. Player names unlock to themselves; dictionary keys
/// unlock to their configured replacement.
fn lock_keywords(
    text: &str,
    dictionary: &BTreeMap<String, String>,
    protected_names: &[String],
) -> (String, Vec<(String, String)>) {
    let mut locked = text.to_string();
    let mut tokens: Vec<(String, String)> = Vec::new();
    let mut index = 0usize;

    for name in protected_names {
        if !name.is_empty() && locked.contains(name.as_str()) {
            index += 1;
            let token = sentinel_token(index);
            locked = locked.replace(name.as_str(), &token);
            tokens.push((token, name.clone()));
        }
    }

    for (key, replacement) in dictionary {
        if !key.is_empty() && locked.contains(key.as_str()) {
            index += 1;
            let token = sentinel_token(index);
            locked = locked.replace(key.as_str(), &token);
            tokens.push((token, replacement.clone()));
        }
    }

    (locked, tokens)
}

fn unlock_keywords(mut text: String, tokens: &[(String, String)]) -> String {
    for (token, original) in tokens {
        text = text.replace(token.as_str(), original);
    }
    text
}

/// Full-width bracketed ordinal, e.g. `＜１２＞`. The alphabet is kept
/// bit-compatible with existing dictionaries: characters this unlikely to
/// appear in chat cannot collide with user text.
fn sentinel_token(index: usize) -> String {
    let mut digits = String::new();
    for c in index.to_string().chars() {
        digits.push(match c {
            '0' => '０',
            '1' => '１',
            '2' => '２',
            '3' => '３',
            '4' => '４',
            '5' => '５',
            '6' => '６',
            '7' => '７',
            '8' => '８',
            _ => '９',
        });
    }
    format!("＜{digits}＞")
}
