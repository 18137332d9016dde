use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::TempoError;

/// Environment variable that overrides `backend.url` regardless of file or prefix settings.
pub const BACKEND_URL_ENV: &str = "BACKEND_URL";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct TempoConfig {
    pub backend: BackendConfig,
    pub http: HttpConfig,
    pub client: ClientConfig,
    pub storage: StorageConfig,
    pub speech: SpeechConfig,
}

/// Where the forwarders send traffic.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BackendConfig {
    pub url: String,
    pub timeout_seconds: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Settings for front ends talking to the forwarder.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ClientConfig {
    pub server_url: String,
    pub timeout_seconds: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3000".to_string(),
            timeout_seconds: 60,
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: "~/.tempo".to_string(),
        }
    }
}

impl StorageConfig {
    /// Storage directory with `~` and environment variables expanded.
    pub fn resolved_dir(&self) -> PathBuf {
        PathBuf::from(expand_path(&self.dir))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SpeechConfig {
    /// Text-to-speech program, e.g. `espeak-ng`. Unset means synthesis is unsupported.
    pub synthesizer: Option<String>,
    /// Program that records one utterance and prints its transcript on stdout.
    pub recognizer: Option<String>,
    pub language: String,
    pub auto_speak_delay_ms: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            synthesizer: None,
            recognizer: None,
            language: "en-US".to_string(),
            auto_speak_delay_ms: 1000,
        }
    }
}

impl SpeechConfig {
    pub fn auto_speak_delay(&self) -> Duration {
        Duration::from_millis(self.auto_speak_delay_ms)
    }
}

impl TempoConfig {
    /// Load from an optional TOML file, then `TEMPO__SECTION__KEY` variables, then `BACKEND_URL`.
    pub fn load(path: &str) -> Result<Self, TempoError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("TEMPO")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("backend.url", std::env::var(BACKEND_URL_ENV).ok())?
            .build()?;
        let config: TempoConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TempoError> {
        for (name, url) in [
            ("backend.url", &self.backend.url),
            ("client.server_url", &self.client.server_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(TempoError::Invalid(format!(
                    "{} must be an http(s) URL, got '{}'",
                    name, url
                )));
            }
        }
        Ok(())
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http.host, self.http.port)
    }
}

/// Expand `~` and `$VARS` in a configured path, falling back to the raw text.
pub fn expand_path(raw: &str) -> String {
    match shellexpand::full(raw) {
        Ok(expanded) => expanded.into_owned(),
        Err(e) => {
            tracing::warn!(path = raw, error = %e, "Path expansion failed, using it verbatim");
            raw.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_point_at_local_backend() {
        let config = TempoConfig::default();
        assert_eq!(config.backend.url, "http://localhost:8000");
        assert_eq!(config.http_addr(), "127.0.0.1:3000");
        assert_eq!(config.speech.auto_speak_delay_ms, 1000);
        assert!(config.speech.synthesizer.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_reads_partial_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[http]\nport = 4100\n\n[speech]\nsynthesizer = \"espeak-ng\"\n"
        )
        .unwrap();

        let config = TempoConfig::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.http.port, 4100);
        assert_eq!(config.http.host, "127.0.0.1");
        assert_eq!(config.speech.synthesizer.as_deref(), Some("espeak-ng"));
        assert_eq!(config.client.timeout_seconds, 60);
    }

    #[test]
    fn test_validate_rejects_non_http_backend() {
        let mut config = TempoConfig::default();
        config.backend.url = "localhost:8000".to_string();
        match config.validate() {
            Err(TempoError::Invalid(msg)) => assert!(msg.contains("backend.url")),
            other => panic!("Expected Invalid error, got {:?}", other),
        }
    }

    #[test]
    fn test_expand_path_leaves_plain_paths_alone() {
        assert_eq!(expand_path("/var/lib/tempo"), "/var/lib/tempo");
    }
}
