use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use storyteller_core::summary::DEFAULT_SUMMARY_PATH;
use storyteller_core::{
    AgentProfile, ServiceAccountKey, ServiceAccountTokens, DEFAULT_COMPLETION_URL,
    DEFAULT_SUMMARY_MODEL,
};

const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
const AGENT_SERVER_TOKEN: &str = "AGENT_SERVER_TOKEN";
const FIREBASE_AUTH: &str = "FIREBASE_AUTH";
const FIREBASE_PROJECT_ID: &str = "FIREBASE_PROJECT_ID";
const FIREBASE_CLIENT_EMAIL: &str = "FIREBASE_CLIENT_EMAIL";
const FIREBASE_PRIVATE_KEY: &str = "FIREBASE_PRIVATE_KEY";
// Older deployments export the database URL under this name
const DATABASE_URL_VARS: [&str; 2] = ["FIREBASE_DATABASE_URL", "DATABSEURL"];

/// Contents of `storyteller.toml`.
///
/// Secrets may be left out of the file; each one falls back to an
/// environment variable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorytellerConfig {
    pub server: ServerConfig,
    pub summarizer: SummarizerConfig,
    pub agent: AgentConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP listen address
    pub http_addr: SocketAddr,
    /// Text file caching the active agent id
    pub agent_id_file: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 3001)),
            agent_id_file: PathBuf::from("perpetual_agent_id.txt"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    /// OpenAI-compatible API root, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    pub model: String,
    /// Falls back to `OPENAI_API_KEY`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_COMPLETION_URL.to_string(),
            model: DEFAULT_SUMMARY_MODEL.to_string(),
            api_key: None,
            timeout_secs: 60,
        }
    }
}

impl SummarizerConfig {
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve(&self.api_key, &[OPENAI_API_KEY], &process_env).map(|(v, _)| v)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Agent server root, e.g. `http://localhost:8083`
    pub server_url: String,
    /// Bearer credential. Falls back to `AGENT_SERVER_TOKEN`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub timeout_secs: u64,
    /// Persona and model for newly created agents
    pub profile: AgentProfile,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8083".to_string(),
            token: None,
            timeout_secs: 60,
            profile: AgentProfile::default(),
        }
    }
}

impl AgentConfig {
    pub fn resolved_token(&self) -> Option<String> {
        resolve(&self.token, &[AGENT_SERVER_TOKEN], &process_env).map(|(v, _)| v)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Firebase Realtime Database over REST
    Firebase,
    /// Local redb file
    Embedded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Realtime database root. Falls back to `FIREBASE_DATABASE_URL`, then `DATABSEURL`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    /// Collection the summaries are pushed under
    pub path: String,
    /// Service account key file. Without one, `FIREBASE_PROJECT_ID`,
    /// `FIREBASE_CLIENT_EMAIL` and `FIREBASE_PRIVATE_KEY` are used when all
    /// three are set. Takes precedence over `auth`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_file: Option<PathBuf>,
    /// Database secret or ID token. Falls back to `FIREBASE_AUTH`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
    pub timeout_secs: u64,
    /// redb file for the embedded backend
    pub embedded_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Embedded,
            database_url: None,
            path: DEFAULT_SUMMARY_PATH.to_string(),
            service_account_file: None,
            auth: None,
            timeout_secs: 30,
            embedded_path: PathBuf::from("data/summaries.redb"),
        }
    }
}

/// How the realtime database requests are authorized.
#[derive(Debug)]
pub enum StoreCredentials {
    ServiceAccount(ServiceAccountKey, Source),
    Secret(String, Source),
    None,
}

impl StoreConfig {
    pub fn resolved_database_url(&self) -> Option<String> {
        resolve(&self.database_url, &DATABASE_URL_VARS, &process_env).map(|(v, _)| v)
    }

    /// Service account first, then the `auth` secret.
    pub fn credentials(&self) -> anyhow::Result<StoreCredentials> {
        self.credentials_with(&process_env)
    }

    fn credentials_with(&self, env: EnvLookup) -> anyhow::Result<StoreCredentials> {
        if let Some(path) = &self.service_account_file {
            let key = ServiceAccountKey::from_file(path)
                .with_context(|| format!("[store] service_account_file {}", path.display()))?;
            return Ok(StoreCredentials::ServiceAccount(key, Source::File));
        }

        match [
            env(FIREBASE_PROJECT_ID),
            env(FIREBASE_CLIENT_EMAIL),
            env(FIREBASE_PRIVATE_KEY),
        ] {
            [Some(project_id), Some(client_email), Some(private_key)] => {
                let key = ServiceAccountKey::new(project_id, client_email, &private_key);
                return Ok(StoreCredentials::ServiceAccount(
                    key,
                    Source::Env(FIREBASE_PRIVATE_KEY),
                ));
            }
            [None, None, None] => {}
            _ => anyhow::bail!(
                "[store] {}, {} and {} must be set together",
                FIREBASE_PROJECT_ID,
                FIREBASE_CLIENT_EMAIL,
                FIREBASE_PRIVATE_KEY
            ),
        }

        Ok(match resolve(&self.auth, &[FIREBASE_AUTH], env) {
            Some((secret, source)) => StoreCredentials::Secret(secret, source),
            None => StoreCredentials::None,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Where the effective value of a setting came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    File,
    Env(&'static str),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::File => write!(f, "config file"),
            Source::Env(var) => write!(f, "env {}", var),
        }
    }
}

type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn process_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Non-empty file value, else the first non-empty environment variable.
fn resolve(
    value: &Option<String>,
    env_vars: &[&'static str],
    env: EnvLookup,
) -> Option<(String, Source)> {
    if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        return Some((v.to_string(), Source::File));
    }
    env_vars
        .iter()
        .find_map(|&var| env(var).map(|v| (v, Source::Env(var))))
}

impl StorytellerConfig {
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        Self::from_toml(&contents)
    }

    /// Load the file if present, defaults otherwise.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Every problem that would stop `serve` from starting.
    pub fn validate(&self) -> Vec<String> {
        self.validate_with(&process_env)
    }

    fn validate_with(&self, env: EnvLookup) -> Vec<String> {
        let mut errors = Vec::new();

        if self.summarizer.model.trim().is_empty() {
            errors.push("[summarizer] model must not be empty".to_string());
        }
        if !is_http_url(&self.summarizer.base_url) {
            errors.push(format!(
                "[summarizer] base_url must be an http(s) URL, got {:?}",
                self.summarizer.base_url
            ));
        }
        if resolve(&self.summarizer.api_key, &[OPENAI_API_KEY], env).is_none() {
            errors.push(format!(
                "[summarizer] no API key. Set api_key or the {} env var",
                OPENAI_API_KEY
            ));
        }

        if !is_http_url(&self.agent.server_url) {
            errors.push(format!(
                "[agent] server_url must be an http(s) URL, got {:?}",
                self.agent.server_url
            ));
        }
        if resolve(&self.agent.token, &[AGENT_SERVER_TOKEN], env).is_none() {
            errors.push(format!(
                "[agent] no bearer token. Set token or the {} env var",
                AGENT_SERVER_TOKEN
            ));
        }

        if self.store.backend == StoreBackend::Firebase {
            match resolve(&self.store.database_url, &DATABASE_URL_VARS, env) {
                Some((url, _)) if is_http_url(&url) => {}
                Some((url, source)) => errors.push(format!(
                    "[store] database_url from {} must be an http(s) URL, got {:?}",
                    source, url
                )),
                None => errors.push(format!(
                    "[store] firebase backend needs database_url or the {} env var",
                    DATABASE_URL_VARS.join(" / ")
                )),
            }
            if self.store.path.trim_matches('/').is_empty() {
                errors.push("[store] path must not be empty".to_string());
            }
            match self.store.credentials_with(env) {
                Ok(StoreCredentials::ServiceAccount(key, source)) => {
                    if let Err(e) = ServiceAccountTokens::new(key, self.store.timeout()) {
                        errors.push(format!("[store] service account from {}: {}", source, e));
                    }
                }
                Ok(_) => {}
                Err(e) => errors.push(format!("{:#}", e)),
            }
        }

        for (section, secs) in [
            ("summarizer", self.summarizer.timeout_secs),
            ("agent", self.agent.timeout_secs),
            ("store", self.store.timeout_secs),
        ] {
            if secs == 0 {
                errors.push(format!("[{}] timeout_secs must be greater than 0", section));
            }
        }

        errors
    }

    /// Where each credential `serve` would use comes from, `None` when unset.
    pub fn secret_sources(&self) -> Vec<(&'static str, Option<Source>)> {
        self.secret_sources_with(&process_env)
    }

    fn secret_sources_with(&self, env: EnvLookup) -> Vec<(&'static str, Option<Source>)> {
        let mut sources = vec![
            (
                "[summarizer] api_key",
                resolve(&self.summarizer.api_key, &[OPENAI_API_KEY], env).map(|(_, s)| s),
            ),
            (
                "[agent] token",
                resolve(&self.agent.token, &[AGENT_SERVER_TOKEN], env).map(|(_, s)| s),
            ),
        ];

        if self.store.backend == StoreBackend::Firebase {
            sources.push((
                "[store] database_url",
                resolve(&self.store.database_url, &DATABASE_URL_VARS, env).map(|(_, s)| s),
            ));
            let credential = match self.store.credentials_with(env) {
                Ok(StoreCredentials::ServiceAccount(_, source)) => {
                    ("[store] service account", Some(source))
                }
                Ok(StoreCredentials::Secret(_, source)) => ("[store] auth", Some(source)),
                Ok(StoreCredentials::None) | Err(_) => ("[store] credentials", None),
            };
            sources.push(credential);
        }

        sources
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
