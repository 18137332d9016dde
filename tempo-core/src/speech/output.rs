//! Speech output adapter: idle -> speaking -> idle, one utterance at a time.

use crate::speech::{Capability, SpeechError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub name: String,
    pub lang: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UtteranceId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub id: UtteranceId,
    pub text: String,
    pub voice: Option<Voice>,
}

/// Engine callbacks, tagged so a cancelled utterance can't affect its successor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UtteranceEvent {
    Started(UtteranceId),
    Ended(UtteranceId),
    Failed(UtteranceId, String),
}

pub trait SynthesisEngine: Send {
    fn is_available(&self) -> bool;
    fn speak(&mut self, utterance: Utterance) -> Result<(), SpeechError>;
    fn cancel(&mut self);
}

pub struct SpeechOutput<E> {
    engine: Option<E>,
    speaking: bool,
    current: Option<UtteranceId>,
    next_id: u64,
    voices: Vec<Voice>,
    selected: Option<Voice>,
}

impl<E: SynthesisEngine> SpeechOutput<E> {
    pub fn negotiate(engine: E) -> Self {
        let engine = engine.is_available().then_some(engine);
        if engine.is_none() {
            tracing::info!("Speech synthesis unavailable");
        }
        Self::with_engine(engine)
    }

    pub fn unsupported() -> Self {
        Self::with_engine(None)
    }

    fn with_engine(engine: Option<E>) -> Self {
        Self {
            engine,
            speaking: false,
            current: None,
            next_id: 0,
            voices: Vec::new(),
            selected: None,
        }
    }

    pub fn capability(&self) -> Capability {
        match (&self.engine, self.speaking) {
            (None, _) => Capability::Unsupported,
            (Some(_), false) => Capability::Idle,
            (Some(_), true) => Capability::Active,
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn selected_voice(&self) -> Option<&Voice> {
        self.selected.as_ref()
    }

    /// Voices can arrive after construction. The first English voice (or the
    /// first voice) becomes the default when nothing is selected yet.
    pub fn set_voices(&mut self, voices: Vec<Voice>) {
        if self.selected.is_none() {
            self.selected = voices
                .iter()
                .find(|v| v.lang.starts_with("en"))
                .or_else(|| voices.first())
                .cloned();
        }
        tracing::debug!(count = voices.len(), "Synthesis voices updated");
        self.voices = voices;
    }

    /// Select a voice by name; returns false if no such voice is known.
    pub fn select_voice(&mut self, name: &str) -> bool {
        match self.voices.iter().find(|v| v.name == name) {
            Some(voice) => {
                self.selected = Some(voice.clone());
                true
            }
            None => false,
        }
    }

    /// Cancel whatever is playing and start `text`. Blank text and missing
    /// engines are no-ops.
    pub fn speak(&mut self, text: &str) -> Result<Option<UtteranceId>, SpeechError> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let Some(engine) = self.engine.as_mut() else {
            return Ok(None);
        };

        engine.cancel();
        self.speaking = false;

        self.next_id += 1;
        let id = UtteranceId(self.next_id);
        self.current = Some(id);
        engine.speak(Utterance {
            id,
            text: text.to_string(),
            voice: self.selected.clone(),
        })?;
        Ok(Some(id))
    }

    pub fn stop(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.cancel();
        }
        self.current = None;
        self.speaking = false;
    }

    pub fn handle(&mut self, event: UtteranceEvent) {
        let (id, speaking) = match &event {
            UtteranceEvent::Started(id) => (*id, true),
            UtteranceEvent::Ended(id) => (*id, false),
            UtteranceEvent::Failed(id, reason) => {
                tracing::warn!(reason = %reason, "Utterance failed");
                (*id, false)
            }
        };
        if self.current == Some(id) {
            self.speaking = speaking;
        }
    }
}
