//! Ordered text-substitution buffer and small text utilities shared by the
//! formatting and transliteration stages.

use std::sync::LazyLock;

use regex::Regex;

/// Legacy color markup: a section sign or ampersand followed by a color or
/// style character.
static COLOR_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[§&][0-9a-fk-or]").expect("color code regex"));

/// A mutable text buffer that applies keyword substitutions in the order
/// they are requested. Later replacements see the result of earlier ones.
#[derive(Debug, Clone)]
pub struct KeywordReplacer {
    buf: String,
}

impl KeywordReplacer {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            buf: initial.into(),
        }
    }

    /// Whether the buffer currently contains `keyword`.
    pub fn contains(&self, keyword: &str) -> bool {
        self.buf.contains(keyword)
    }

    /// Replace every occurrence of `keyword` with `value`.
    pub fn replace(&mut self, keyword: &str, value: &str) {
        if self.buf.contains(keyword) {
            self.buf = self.buf.replace(keyword, value);
        }
    }

    /// Rewrite `&x` style color markup into section-sign markup.
    pub fn translate_color_code(&mut self) {
        self.buf = translate_color_code(&self.buf);
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}

impl std::fmt::Display for KeywordReplacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.buf)
    }
}

/// Strip all legacy color markup from `text`.
pub fn strip_color_code(text: &str) -> String {
    COLOR_CODE.replace_all(text, "").into_owned()
}

/// Rewrite `&x` color markup into the section-sign form the renderer expects.
pub fn translate_color_code(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '&'
            && chars
                .peek()
                .is_some_and(|n| n.is_ascii_hexdigit() || matches!(n, 'k'..='o' | 'r' | 'K'..='O' | 'R'))
        {
            out.push('§');
        } else {
            out.push(c);
        }
    }
    out
}

/// A run of asterisks of the given length, for NG-word masking.
pub fn asterisk_string(len: usize) -> String {
    "*".repeat(len)
}

/// Mask every match of every NG pattern with asterisks of equal length.
pub fn mask_ng_words(text: &str, patterns: &[Regex]) -> String {
    let mut out = text.to_string();
    for pattern in patterns {
        out = pattern
            .replace_all(&out, |caps: &regex::Captures<'_>| {
                asterisk_string(caps[0].chars().count())
            })
            .into_owned();
    }
    out
}
