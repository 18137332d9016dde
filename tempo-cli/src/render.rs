//! Terminal rendering for conversation and calendar data.

use chrono::{Local, NaiveDate, NaiveTime};
use tempo_core::models::{CalendarEvent, Message, Role};
use tempo_core::preferences::SpeechPreferences;
use tempo_core::speech::{display_text, Capability, Voice};

/// `"14:00"` -> `"2:00 PM"`. Unparseable input is returned as-is.
pub fn format_time(raw: &str) -> String {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map(|t| t.format("%-I:%M %p").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

/// `"2026-03-03"` -> `"Tue, Mar 3"`. Unparseable input is returned as-is.
pub fn format_date(raw: &str) -> String {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| d.format("%a, %b %-d").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

pub fn render_event(event: &CalendarEvent) -> String {
    let mut line = format!(
        "{}  {} - {}  {}",
        format_date(&event.date),
        format_time(&event.start_time),
        format_time(&event.end_time),
        event.title
    );
    if let Some(location) = event.location.as_deref().filter(|l| !l.is_empty()) {
        line.push_str(&format!(" @ {}", location));
    }
    line
}

pub fn render_events(events: &[CalendarEvent]) -> String {
    if events.is_empty() {
        return "No upcoming events".to_string();
    }
    events
        .iter()
        .map(render_event)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_message(message: &Message) -> String {
    let (speaker, content) = match message.role {
        Role::User => ("You", message.content.clone()),
        Role::Assistant => ("Assistant", display_text(&message.content)),
    };
    let at = message.created_at.with_timezone(&Local).format("%H:%M");
    format!("[{}] {}: {}", at, speaker, content)
}

pub fn render_preferences(prefs: &SpeechPreferences) -> String {
    let flag = |on: bool| if on { "on" } else { "off" };
    format!(
        "Auto-speak:     {}\nText-to-speech: {}\nSpeech input:   {}\nVoice:          {}",
        flag(prefs.auto_speak),
        flag(prefs.tts_enabled),
        flag(prefs.stt_enabled),
        prefs.selected_voice.as_deref().unwrap_or("default")
    )
}

pub fn render_voices(voices: &[Voice], selected: Option<&Voice>) -> String {
    if voices.is_empty() {
        return "No voices available".to_string();
    }
    voices
        .iter()
        .map(|v| {
            let marker = if Some(v) == selected { "*" } else { " " };
            format!("{} {} ({})", marker, v.name, v.lang)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn capability_label(capability: Capability) -> &'static str {
    match capability {
        Capability::Unsupported => "not available",
        Capability::Idle => "ready",
        Capability::Active => "busy",
    }
}
