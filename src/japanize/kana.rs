//! Romaji to hiragana conversion.
//!
//! Longest-match transliteration over a fixed syllable table, with sokuon
//! (doubled consonant) and syllabic-n handling. Non-romaji characters pass
//! through untouched.

/// Convert romaji text to hiragana. ASCII letters are consumed by the
/// syllable table; everything else is copied through as-is.
pub fn to_hiragana(input: &str) -> String {
    let lower = input.to_lowercase();
    let chars: Vec<char> = lower.chars().collect();
    let mut out = String::with_capacity(input.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if !c.is_ascii_alphabetic() {
            out.push(if c == '-' { 'ー' } else { c });
            i += 1;
            continue;
        }

        // Doubled consonant becomes sokuon: "kitte" -> きって.
        if c != 'n'
            && is_consonant(c)
            && chars.get(i + 1) == Some(&c)
        {
            out.push('っ');
            i += 1;
            continue;
        }

        // Syllabic n: "kanji" -> かんじ, trailing "n" -> ん, "nn" -> ん.
        if c == 'n' {
            match chars.get(i + 1) {
                Some('n') => {
                    out.push('ん');
                    i += 2;
                    continue;
                }
                Some(&next) if is_vowel(next) || next == 'y' => {}
                _ => {
                    out.push('ん');
                    i += 1;
                    continue;
                }
            }
        }

        let mut matched = false;
        for len in (1..=3).rev() {
            if i + len > chars.len() {
                continue;
            }
            let seq: String = chars[i..i + len].iter().collect();
            if let Some(kana) = lookup(&seq) {
                out.push_str(kana);
                i += len;
                matched = true;
                break;
            }
        }

        if !matched {
            // Unconvertible letter (lone consonant); keep it visible.
            out.push(c);
            i += 1;
        }
    }

    out
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'i' | 'u' | 'e' | 'o')
}

fn is_consonant(c: char) -> bool {
    c.is_ascii_alphabetic() && !is_vowel(c)
}

fn lookup(seq: &str) -> Option<&'static str> {
    Some(match seq {
        // Vowels
        "a" => "あ",
        "i" => "い",
        "u" => "う",
        "e" => "え",
        "o" => "お",
        // K
        "ka" => "か",
        "ki" => "き",
        "ku" => "く",
        "ke" => "け",
        "ko" => "こ",
        "kya" => "きゃ",
        "kyu" => "きゅ",
        "kyo" => "きょ",
        // S
        "sa" => "さ",
        "si" => "し",
        "shi" => "し",
        "su" => "す",
        "se" => "せ",
        "so" => "そ",
        "sha" => "しゃ",
        "shu" => "しゅ",
        "sho" => "しょ",
        "sya" => "しゃ",
        "syu" => "しゅ",
        "syo" => "しょ",
        // T
        "ta" => "た",
        "ti" => "ち",
        "chi" => "ち",
        "tu" => "つ",
        "tsu" => "つ",
        "te" => "て",
        "to" => "と",
        "cha" => "ちゃ",
        "chu" => "ちゅ",
        "cho" => "ちょ",
        "tya" => "ちゃ",
        "tyu" => "ちゅ",
        "tyo" => "ちょ",
        // N
        "na" => "な",
        "ni" => "に",
        "nu" => "ぬ",
        "ne" => "ね",
        "no" => "の",
        "nya" => "にゃ",
        "nyu" => "にゅ",
        "nyo" => "にょ",
        // H
        "ha" => "は",
        "hi" => "ひ",
        "hu" => "ふ",
        "fu" => "ふ",
        "he" => "へ",
        "ho" => "ほ",
        "hya" => "ひゃ",
        "hyu" => "ひゅ",
        "hyo" => "ひょ",
        "fa" => "ふぁ",
        "fi" => "ふぃ",
        "fe" => "ふぇ",
        "fo" => "ふぉ",
        // M
        "ma" => "ま",
        "mi" => "み",
        "mu" => "む",
        "me" => "め",
        "mo" => "も",
        "mya" => "みゃ",
        "myu" => "みゅ",
        "myo" => "みょ",
        // Y
        "ya" => "や",
        "yu" => "ゆ",
        "yo" => "よ",
        // R
        "ra" => "ら",
        "ri" => "り",
        "ru" => "る",
        "re" => "れ",
        "ro" => "ろ",
        "rya" => "りゃ",
        "ryu" => "りゅ",
        "ryo" => "りょ",
        // W
        "wa" => "わ",
        "wi" => "うぃ",
        "we" => "うぇ",
        "wo" => "を",
        // G
        "ga" => "が",
        "gi" => "ぎ",
        "gu" => "ぐ",
        "ge" => "げ",
        "go" => "ご",
        "gya" => "ぎゃ",
        "gyu" => "ぎゅ",
        "gyo" => "ぎょ",
        // Z / J
        "za" => "ざ",
        "zi" => "じ",
        "ji" => "じ",
        "zu" => "ず",
        "ze" => "ぜ",
        "zo" => "ぞ",
        "ja" => "じゃ",
        "ju" => "じゅ",
        "jo" => "じょ",
        "jya" => "じゃ",
        "jyu" => "じゅ",
        "jyo" => "じょ",
        // D
        "da" => "だ",
        "di" => "ぢ",
        "du" => "づ",
        "de" => "で",
        "do" => "ど",
        // B
        "ba" => "ば",
        "bi" => "び",
        "bu" => "ぶ",
        "be" => "べ",
        "bo" => "ぼ",
        "bya" => "びゃ",
        "byu" => "びゅ",
        "byo" => "びょ",
        // P
        "pa" => "ぱ",
        "pi" => "ぴ",
        "pu" => "ぷ",
        "pe" => "ぺ",
        "po" => "ぽ",
        "pya" => "ぴゃ",
        "pyu" => "ぴゅ",
        "pyo" => "ぴょ",
        // V (approximated)
        "va" => "ゔぁ",
        "vi" => "ゔぃ",
        "vu" => "ゔ",
        "ve" => "ゔぇ",
        "vo" => "ゔぉ",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_basic_syllables() {
        assert_eq!(to_hiragana("aki"), "あき");
        assert_eq!(to_hiragana("sakura"), "さくら");
        assert_eq!(to_hiragana("konnnichiha"), "こんにちは");
    }

    #[test]
    fn handles_sokuon_and_syllabic_n() {
        assert_eq!(to_hiragana("kitte"), "きって");
        assert_eq!(to_hiragana("kanji"), "かんじ");
        assert_eq!(to_hiragana("hon"), "ほん");
        assert_eq!(to_hiragana("konnya"), "こんや");
    }

    #[test]
    fn digraphs_take_precedence_over_singles() {
        assert_eq!(to_hiragana("kyou"), "きょう");
        assert_eq!(to_hiragana("shashin"), "しゃしん");
        assert_eq!(to_hiragana("chotto"), "ちょっと");
    }

    #[test]
    fn passes_through_non_romaji() {
        assert_eq!(to_hiragana("abc ＜１＞ desu"), "あbc ＜１＞ です");
        assert_eq!(to_hiragana("123"), "123");
    }

    #[test]
    fn long_vowel_dash_becomes_choon() {
        assert_eq!(to_hiragana("ra-men"), "らーめん");
    }
}
