//! Chat format rendering.
//!
//! Format templates are flat strings with placeholder tokens. Spots that
//! become clickable spans are rendered as structured-action markers using
//! full-width brackets, `＜type=ACTION text="…" hover="…" command="…"＞`,
//! which the platform's rendering collaborator turns into native rich text.
//! [`parse_spans`] is the core's half of that contract.

use std::sync::{Arc, LazyLock};

use chrono::Local;
use regex::Regex;

use crate::keyword::KeywordReplacer;
use crate::member::ChannelMember;

const JOIN_COMMAND_TEMPLATE: &str = "/ch join {}";
const TELL_COMMAND_TEMPLATE: &str = "/tell {}";

static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        "＜type=(SUGGEST_COMMAND|RUN_COMMAND) text=\"([^\"]*)\" hover=\"([^\"]*)\" command=\"([^\"]*)\"＞",
    )
    .expect("marker regex")
});

/// What a clickable span does when activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    RunCommand,
    SuggestCommand,
}

/// One piece of a rendered chat line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatSpan {
    Text(String),
    Action {
        kind: ActionKind,
        text: String,
        hover: String,
        command: String,
    },
}

/// Channel fields consulted during format substitution.
#[derive(Debug, Clone, Copy)]
pub struct ChannelFormatInfo<'a> {
    pub name: &'a str,
    pub color_code: &'a str,
    /// Peer of a personal channel, for the `%to` placeholder.
    pub private_message_to: Option<&'a str>,
}

/// Source of `%0`–`%9` template expansions.
pub trait TemplateSource {
    fn template(&self, id: &str) -> Option<String>;
}

/// A format template mid-substitution. `%msg` is left for the caller to
/// fill last, after hooks have had their say.
#[derive(Debug, Clone)]
pub struct ClickableFormat {
    message: KeywordReplacer,
}

impl ClickableFormat {
    /// Substitute every placeholder except `%msg`.
    pub fn make_format(
        format: &str,
        member: Option<&Arc<dyn ChannelMember>>,
        channel: Option<&ChannelFormatInfo<'_>>,
        templates: Option<&dyn TemplateSource>,
        with_player_link: bool,
    ) -> Self {
        let mut msg = KeywordReplacer::new(format);

        if let Some(channel) = channel {
            // Template keywords expand first so their own placeholders get
            // substituted below.
            if let Some(templates) = templates {
                for i in 0..=9u8 {
                    let key = format!("%{i}");
                    if msg.contains(&key)
                        && let Some(body) = templates.template(&i.to_string())
                    {
                        msg.replace(&key, &body);
                        break;
                    }
                }
            }

            msg.replace(
                "%ch",
                &run_command_marker(
                    channel.name,
                    &format!("Join {}", channel.name),
                    &JOIN_COMMAND_TEMPLATE.replace("{}", channel.name),
                ),
            );
            msg.replace("%color", channel.color_code);

            if let Some(to) = channel.private_message_to {
                msg.replace(
                    "%to",
                    &suggest_command_marker(
                        to,
                        &format!("Message {to}"),
                        &TELL_COMMAND_TEMPLATE.replace("{}", to),
                    ),
                );
            }
        }

        if msg.contains("%date") {
            msg.replace("%date", &Local::now().format("%Y/%m/%d").to_string());
        }
        if msg.contains("%time") {
            msg.replace("%time", &Local::now().format("%H:%M:%S").to_string());
        }

        if let Some(member) = member {
            let display = member.display_name();
            let name = member.name();
            if with_player_link {
                let link = suggest_command_marker(
                    &display,
                    &format!("Message {name}"),
                    &TELL_COMMAND_TEMPLATE.replace("{}", name),
                );
                msg.replace("%displayname", &link);
                msg.replace("%username", &link);
                msg.replace(
                    "%player",
                    &suggest_command_marker(
                        name,
                        &format!("Message {name}"),
                        &TELL_COMMAND_TEMPLATE.replace("{}", name),
                    ),
                );
            } else {
                msg.replace("%displayname", &display);
                msg.replace("%username", &display);
                msg.replace("%player", name);
            }
        }

        Self { message: msg }
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.message.contains(keyword)
    }

    pub fn replace(&mut self, keyword: &str, value: &str) {
        self.message.replace(keyword, value);
    }

    /// The rendered line with markers intact, for delivery to members.
    pub fn into_string(mut self) -> String {
        self.message.translate_color_code();
        self.message.into_string()
    }

    /// The rendered line with every marker flattened to its visible text,
    /// for the console sink and the chat log.
    pub fn to_plain_text(&self) -> String {
        flatten_markers(self.message.as_str())
    }
}

impl std::fmt::Display for ClickableFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message.as_str())
    }
}

/// Replace every structured-action marker with its visible text.
pub fn flatten_markers(text: &str) -> String {
    MARKER.replace_all(text, "$2").into_owned()
}

/// Split a rendered line into plain-text and action spans for the rendering
/// collaborator.
pub fn parse_spans(text: &str) -> Vec<FormatSpan> {
    let mut spans = Vec::new();
    let mut last = 0;

    for caps in MARKER.captures_iter(text) {
        let whole = caps.get(0).expect("match group 0");
        if whole.start() > last {
            spans.push(FormatSpan::Text(text[last..whole.start()].to_string()));
        }
        let kind = if &caps[1] == "RUN_COMMAND" {
            ActionKind::RunCommand
        } else {
            ActionKind::SuggestCommand
        };
        spans.push(FormatSpan::Action {
            kind,
            text: caps[2].to_string(),
            hover: caps[3].to_string(),
            command: caps[4].to_string(),
        });
        last = whole.end();
    }

    if last < text.len() {
        spans.push(FormatSpan::Text(text[last..].to_string()));
    }

    spans
}

fn run_command_marker(text: &str, hover: &str, command: &str) -> String {
    format!("＜type=RUN_COMMAND text=\"{text}\" hover=\"{hover}\" command=\"{command}\"＞")
}

fn suggest_command_marker(text: &str, hover: &str, command: &str) -> String {
    format!("＜type=SUGGEST_COMMAND text=\"{text}\" hover=\"{hover}\" command=\"{command}\"＞")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::ConsoleMember;

    fn console() -> Arc<dyn ChannelMember> {
        Arc::new(ConsoleMember)
    }

    struct NoTemplates;
    impl TemplateSource for NoTemplates {
        fn template(&self, _id: &str) -> Option<String> {
            None
        }
    }

    struct OneTemplate;
    impl TemplateSource for OneTemplate {
        fn template(&self, id: &str) -> Option<String> {
            (id == "3").then(|| "[%ch] %username".to_string())
        }
    }

    #[test]
    fn substitutes_channel_and_member_placeholders() {
        let info = ChannelFormatInfo {
            name: "town",
            color_code: "&b",
            private_message_to: None,
        };
        let member = console();
        let format = ClickableFormat::make_format(
            "[%color%ch] %username: %msg",
            Some(&member),
            Some(&info),
            None,
            false,
        );
        let rendered = format.to_plain_text();
        assert_eq!(rendered, "[&btown] CONSOLE: %msg");
    }

    #[test]
    fn player_link_renders_a_suggest_command_marker() {
        let member = console();
        let format =
            ClickableFormat::make_format("%username: %msg", Some(&member), None, None, true);
        let raw = format.to_string();
        assert!(raw.contains("type=SUGGEST_COMMAND"));
        assert!(raw.contains("command=\"/tell CONSOLE\""));
        assert_eq!(format.to_plain_text(), "CONSOLE: %msg");
    }

    #[test]
    fn template_keyword_expands_before_other_placeholders() {
        let info = ChannelFormatInfo {
            name: "town",
            color_code: "",
            private_message_to: None,
        };
        let member = console();
        let format = ClickableFormat::make_format(
            "%3: %msg",
            Some(&member),
            Some(&info),
            Some(&OneTemplate),
            false,
        );
        assert_eq!(format.to_plain_text(), "[town] CONSOLE: %msg");
    }

    #[test]
    fn missing_templates_leave_the_keyword() {
        let info = ChannelFormatInfo {
            name: "town",
            color_code: "",
            private_message_to: None,
        };
        let format =
            ClickableFormat::make_format("%3 %msg", None, Some(&info), Some(&NoTemplates), false);
        assert_eq!(format.to_plain_text(), "%3 %msg");
    }

    #[test]
    fn parse_spans_round_trips_the_marker_grammar() {
        let line = format!(
            "hello {} world",
            run_command_marker("town", "Join town", "/ch join town")
        );
        let spans = parse_spans(&line);
        assert_eq!(spans.len(), 3);
        assert_eq!(spans[0], FormatSpan::Text("hello ".to_string()));
        assert_eq!(
            spans[1],
            FormatSpan::Action {
                kind: ActionKind::RunCommand,
                text: "town".to_string(),
                hover: "Join town".to_string(),
                command: "/ch join town".to_string(),
            }
        );
        assert_eq!(spans[2], FormatSpan::Text(" world".to_string()));
        assert_eq!(flatten_markers(&line), "hello town world");
    }
}
