use regex::Regex;

use crate::models::{Message, MessageId};
use crate::preferences::SpeechPreferences;

/// Patterns removed from assistant replies before they are shown or read
/// aloud. The backend embeds structured fragments meant for machines.
const STRUCTURED_PATTERNS: [&str; 3] = [
    r"(?s)```json.*?```",
    r"(?s)\{.*?\}",
    r"(?s)Meeting scheduled:.*$",
];

/// Stands in for a reply that was nothing but structured fragments.
pub const PROCESSED_FALLBACK: &str = "I've processed your request successfully!";

pub const SCHEDULED_NOTICE: &str = "\u{2705} Meeting successfully scheduled!";

fn strip_structured(content: &str, blank_run: &str) -> String {
    let mut text = content.to_string();
    for pattern in STRUCTURED_PATTERNS {
        if let Ok(re) = Regex::new(pattern) {
            text = re.replace_all(&text, "").into_owned();
        }
    }
    if let Ok(re) = Regex::new(r"\n\s*\n") {
        text = re.replace_all(&text, blank_run).into_owned();
    }
    text.trim().to_string()
}

/// True when the reply reports a booked meeting.
pub fn reports_scheduled_meeting(content: &str) -> bool {
    content.contains("Meeting scheduled:") || content.contains("\"status\": \"success\"")
}

/// Assistant reply as shown in the transcript: line breaks kept, a notice
/// appended for booked meetings, never empty.
pub fn display_text(content: &str) -> String {
    let mut text = strip_structured(content, "\n");
    if reports_scheduled_meeting(content) {
        text.push_str("\n\n");
        text.push_str(SCHEDULED_NOTICE);
    }
    if text.is_empty() {
        return PROCESSED_FALLBACK.to_string();
    }
    text
}

/// Assistant reply as read aloud. May be empty.
pub fn speakable_text(content: &str) -> String {
    strip_structured(content, " ")
}

/// Text for an explicit request to read a reply aloud; never empty.
pub fn spoken_reply(content: &str) -> String {
    let text = speakable_text(content);
    if text.is_empty() {
        return PROCESSED_FALLBACK.to_string();
    }
    text
}

/// Picks the text to speak for each new assistant reply, once per message.
#[derive(Debug, Default)]
pub struct AutoSpeaker {
    last_spoken: Option<MessageId>,
}

impl AutoSpeaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the current tail as already handled, e.g. after restoring history.
    pub fn prime(&mut self, messages: &[Message]) {
        self.last_spoken = messages.last().map(|m| m.id.clone());
    }

    /// Text to speak for a reply that just arrived, if any.
    pub fn next_utterance(
        &mut self,
        prefs: &SpeechPreferences,
        reply: &Message,
    ) -> Option<String> {
        if !prefs.should_auto_speak() {
            return None;
        }
        if !reply.is_assistant() || self.last_spoken.as_ref() == Some(&reply.id) {
            return None;
        }
        self.last_spoken = Some(reply.id.clone());

        let text = speakable_text(&reply.content);
        (!text.is_empty()).then_some(text)
    }
}
