use crate::storage::{
    KeyValueStore, StorageError, AUTO_SPEAK_KEY, ENABLE_STT_KEY, ENABLE_TTS_KEY,
    SELECTED_VOICE_KEY,
};

/// Speech settings persisted as `"true"`/`"false"` strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechPreferences {
    pub auto_speak: bool,
    pub tts_enabled: bool,
    pub stt_enabled: bool,
    pub selected_voice: Option<String>,
}

impl Default for SpeechPreferences {
    fn default() -> Self {
        Self {
            auto_speak: false,
            tts_enabled: true,
            stt_enabled: true,
            selected_voice: None,
        }
    }
}

impl SpeechPreferences {
    /// Auto-speak is opt-in; TTS and STT are on unless explicitly `"false"`.
    pub fn load(store: &dyn KeyValueStore) -> Result<Self, StorageError> {
        let auto_speak = store.get(AUTO_SPEAK_KEY)?.as_deref() == Some("true");
        let tts_enabled = store.get(ENABLE_TTS_KEY)?.as_deref() != Some("false");
        let stt_enabled = store.get(ENABLE_STT_KEY)?.as_deref() != Some("false");
        let selected_voice = store.get(SELECTED_VOICE_KEY)?.filter(|v| !v.is_empty());
        Ok(Self {
            auto_speak,
            tts_enabled,
            stt_enabled,
            selected_voice,
        })
    }

    pub fn set_auto_speak(
        &mut self,
        store: &dyn KeyValueStore,
        enabled: bool,
    ) -> Result<(), StorageError> {
        store.set(AUTO_SPEAK_KEY, bool_str(enabled))?;
        self.auto_speak = enabled;
        Ok(())
    }

    pub fn set_tts_enabled(
        &mut self,
        store: &dyn KeyValueStore,
        enabled: bool,
    ) -> Result<(), StorageError> {
        store.set(ENABLE_TTS_KEY, bool_str(enabled))?;
        self.tts_enabled = enabled;
        Ok(())
    }

    pub fn set_stt_enabled(
        &mut self,
        store: &dyn KeyValueStore,
        enabled: bool,
    ) -> Result<(), StorageError> {
        store.set(ENABLE_STT_KEY, bool_str(enabled))?;
        self.stt_enabled = enabled;
        Ok(())
    }

    pub fn set_selected_voice(
        &mut self,
        store: &dyn KeyValueStore,
        name: &str,
    ) -> Result<(), StorageError> {
        store.set(SELECTED_VOICE_KEY, name)?;
        self.selected_voice = Some(name.to_string());
        Ok(())
    }

    /// Auto-speak only fires when synthesis itself is enabled.
    pub fn should_auto_speak(&self) -> bool {
        self.auto_speak && self.tts_enabled
    }
}

fn bool_str(v: bool) -> &'static str {
    if v {
        "true"
    } else {
        "false"
    }
}
