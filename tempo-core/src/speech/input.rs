//! Speech input adapter: idle -> listening -> idle.
//!
//! A listening session ends with at most one finalized transcript or one
//! error. The transcript stays put until the consumer drains it with
//! [`SpeechInput::take_transcript`].

use crate::speech::{Capability, SpeechError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    Started,
    Result(String),
    Error(String),
    Ended,
}

pub trait RecognitionEngine: Send {
    fn is_available(&self) -> bool;
    fn start(&mut self) -> Result<(), SpeechError>;
    fn stop(&mut self);
}

pub struct SpeechInput<E> {
    engine: Option<E>,
    listening: bool,
    finalized: bool,
    transcript: Option<String>,
    error: Option<String>,
}

impl<E: RecognitionEngine> SpeechInput<E> {
    /// Probe the engine once; an unavailable engine is dropped.
    pub fn negotiate(engine: E) -> Self {
        let engine = engine.is_available().then_some(engine);
        if engine.is_none() {
            tracing::info!("Speech recognition unavailable");
        }
        Self {
            engine,
            listening: false,
            finalized: false,
            transcript: None,
            error: None,
        }
    }

    pub fn unsupported() -> Self {
        Self {
            engine: None,
            listening: false,
            finalized: false,
            transcript: None,
            error: None,
        }
    }

    pub fn capability(&self) -> Capability {
        match (&self.engine, self.listening) {
            (None, _) => Capability::Unsupported,
            (Some(_), false) => Capability::Idle,
            (Some(_), true) => Capability::Active,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn transcript(&self) -> Option<&str> {
        self.transcript.as_deref()
    }

    pub fn start(&mut self) -> Result<(), SpeechError> {
        let Some(engine) = self.engine.as_mut() else {
            self.error = Some("Speech recognition is not supported on this system".to_string());
            return Err(SpeechError::Unsupported("Speech recognition"));
        };
        if self.listening {
            return Ok(());
        }

        self.transcript = None;
        self.error = None;
        self.finalized = false;
        engine.start()?;
        self.listening = true;
        Ok(())
    }

    /// Ends the listening session; events still queued from it are ignored.
    pub fn stop(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.stop();
        }
        self.listening = false;
        self.finalized = true;
    }

    pub fn handle(&mut self, event: RecognitionEvent) {
        match event {
            RecognitionEvent::Started => {
                if !self.finalized {
                    self.listening = true;
                    self.error = None;
                }
            }
            RecognitionEvent::Result(text) => {
                if !self.finalized {
                    self.finalized = true;
                    self.transcript = Some(text);
                }
                self.listening = false;
            }
            RecognitionEvent::Error(reason) => {
                if !self.finalized {
                    self.finalized = true;
                    self.error = Some(format!("Speech recognition error: {}", reason));
                }
                self.listening = false;
            }
            RecognitionEvent::Ended => self.listening = false,
        }
    }

    /// Hand the transcript to the caller exactly once.
    pub fn take_transcript(&mut self) -> Option<String> {
        self.transcript.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeEngine {
        available: bool,
        starts: usize,
        stops: usize,
    }

    impl RecognitionEngine for FakeEngine {
        fn is_available(&self) -> bool {
            self.available
        }

        fn start(&mut self) -> Result<(), SpeechError> {
            self.starts += 1;
            Ok(())
        }

        fn stop(&mut self) {
            self.stops += 1;
        }
    }

    fn available() -> SpeechInput<FakeEngine> {
        SpeechInput::negotiate(FakeEngine {
            available: true,
            ..Default::default()
        })
    }

    #[test]
    fn test_unavailable_engine_is_unsupported() {
        let mut input = SpeechInput::negotiate(FakeEngine::default());
        assert_eq!(input.capability(), Capability::Unsupported);
        assert!(matches!(input.start(), Err(SpeechError::Unsupported(_))));
        assert!(input.error().unwrap().contains("not supported"));
        assert!(!input.is_listening());
    }

    #[test]
    fn test_start_then_result_returns_to_idle_with_transcript() {
        let mut input = available();
        input.start().unwrap();
        assert_eq!(input.capability(), Capability::Active);

        input.handle(RecognitionEvent::Started);
        input.handle(RecognitionEvent::Result("book a room".to_string()));
        assert_eq!(input.capability(), Capability::Idle);
        assert_eq!(input.transcript(), Some("book a room"));
    }

    #[test]
    fn test_only_first_final_event_counts() {
        let mut input = available();
        input.start().unwrap();
        input.handle(RecognitionEvent::Result("first".to_string()));
        input.handle(RecognitionEvent::Result("second".to_string()));
        input.handle(RecognitionEvent::Error("no-speech".to_string()));
        assert_eq!(input.transcript(), Some("first"));
        assert!(input.error().is_none());
    }

    #[test]
    fn test_error_event_is_prefixed() {
        let mut input = available();
        input.start().unwrap();
        input.handle(RecognitionEvent::Error("no-speech".to_string()));
        assert_eq!(input.error(), Some("Speech recognition error: no-speech"));
        assert!(!input.is_listening());
        assert!(input.transcript().is_none());
    }

    #[test]
    fn test_take_transcript_drains_once() {
        let mut input = available();
        input.start().unwrap();
        input.handle(RecognitionEvent::Result("hello".to_string()));
        assert_eq!(input.take_transcript().as_deref(), Some("hello"));
        assert_eq!(input.take_transcript(), None);
    }

    #[test]
    fn test_start_clears_previous_transcript_and_double_start_is_noop() {
        let mut input = available();
        input.start().unwrap();
        input.handle(RecognitionEvent::Result("old".to_string()));
        input.start().unwrap();
        assert!(input.transcript().is_none());
        input.start().unwrap();
        assert_eq!(input.engine.as_ref().unwrap().starts, 2);
    }

    #[test]
    fn test_stop_forces_idle() {
        let mut input = available();
        input.start().unwrap();
        input.stop();
        assert_eq!(input.capability(), Capability::Idle);
        assert_eq!(input.engine.as_ref().unwrap().stops, 1);
    }

    #[test]
    fn test_events_queued_before_stop_are_ignored() {
        let mut input = available();
        input.start().unwrap();
        input.stop();

        input.handle(RecognitionEvent::Started);
        input.handle(RecognitionEvent::Result("book the big room".to_string()));
        input.handle(RecognitionEvent::Ended);
        assert!(!input.is_listening());
        assert_eq!(input.take_transcript(), None);
        assert!(input.error().is_none());

        input.start().unwrap();
        input.handle(RecognitionEvent::Result("book the small room".to_string()));
        assert_eq!(input.take_transcript().as_deref(), Some("book the small room"));
    }
}
