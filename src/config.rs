use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: PathBuf,
    pub host: String,
    pub port: u16,
    /// Directory for daily-rotated log files; stdout when unset.
    pub log_dir: Option<PathBuf>,
    pub session_ttl_days: i64,
    pub tls: Option<TlsConfig>,
    pub google: Option<GoogleConfig>,
    pub tutor: TutorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: PathBuf::from("database/tutor.db"),
            host: "127.0.0.1".to_string(),
            port: 5000,
            log_dir: None,
            session_ttl_days: 5,
            tls: None,
            google: None,
            tutor: TutorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Must match the redirect URI registered with Google, e.g.
    /// `http://localhost:5000/auth/google/callback`.
    pub redirect_url: String,
}

impl std::fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_url", &self.redirect_url)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TutorConfig {
    pub model: String,
    pub session_capacity: u64,
    pub session_idle_minutes: u64,
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            session_capacity: 1000,
            session_idle_minutes: 60,
        }
    }
}

impl Config {
    /// Read `path` if it exists, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();
        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(path)?,
            _ => Self::default(),
        };
        config.apply_env(|key| dotenvy::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Overlay values from `var`; split out so tests can feed a map instead of the process env.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(database) = var("TUTOR_DATABASE") {
            self.database = database.into();
        }
        if let Some(host) = var("TUTOR_HOST") {
            self.host = host;
        }
        if let Some(port) = var("TUTOR_PORT") {
            self.port = port
                .parse()
                .with_context(|| format!("TUTOR_PORT is not a port number: {port}"))?;
        }
        if let Some(log_dir) = var("TUTOR_LOG_DIR") {
            self.log_dir = Some(log_dir.into());
        }
        if let Some(model) = var("TUTOR_MODEL") {
            self.tutor.model = model;
        }
        if let (Some(cert), Some(key)) = (var("TLS_CERT"), var("TLS_KEY")) {
            self.tls = Some(TlsConfig {
                cert: cert.into(),
                key: key.into(),
            });
        }
        match (
            var("GOOGLE_CLIENT_ID"),
            var("GOOGLE_CLIENT_SECRET"),
            var("GOOGLE_REDIRECT_URL"),
        ) {
            (Some(client_id), Some(client_secret), redirect_url) => {
                let redirect_url = redirect_url
                    .or_else(|| self.google.as_ref().map(|g| g.redirect_url.clone()))
                    .unwrap_or_else(|| {
                        format!("http://{}:{}/auth/google/callback", self.host, self.port)
                    });
                self.google = Some(GoogleConfig {
                    client_id,
                    client_secret,
                    redirect_url,
                });
            }
            (_, _, Some(redirect_url)) => {
                if let Some(google) = self.google.as_mut() {
                    google.redirect_url = redirect_url;
                }
            }
            _ => {}
        }
        Ok(())
    }
}
