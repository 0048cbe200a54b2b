use anyhow::{Result, anyhow, bail};
use std::env;
use std::path::PathBuf;

/// Which oracle backend to talk to. Selected via the `AI_BACKEND`
/// environment variable; defaults to the hosted OpenAI backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    OpenAi,
    Ollama,
}

/// Process-wide configuration resolved once at startup. Credential checks
/// happen here so a missing key fails before any network call is made.
#[derive(Debug, Clone)]
pub struct Config {
    pub backend: Backend,
    pub openai_api_key: Option<String>,
    pub ollama_host: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let backend = match env::var("AI_BACKEND")
            .unwrap_or_else(|_| "openai".to_string())
            .to_lowercase()
            .as_str()
        {
            "openai" => Backend::OpenAi,
            "ollama" => Backend::Ollama,
            other => bail!("Unknown AI_BACKEND: {other}. Must be 'openai' or 'ollama'."),
        };

        let openai_api_key = env::var("OPENAI_API_KEY").ok();
        if backend == Backend::OpenAi && openai_api_key.is_none() {
            bail!("OPENAI_API_KEY environment variable not set, but the openai backend is selected");
        }

        let ollama_host =
            env::var("OLLAMA_HOST").unwrap_or_else(|_| "http://localhost:11434".to_string());

        Ok(Config {
            backend,
            openai_api_key,
            ollama_host,
        })
    }

    pub fn openai_api_key(&self) -> Result<&str> {
        self.openai_api_key
            .as_deref()
            .ok_or_else(|| anyhow!("OPENAI_API_KEY environment variable not set"))
    }
}

/// Default directory for result bundles and overflow caches.
pub fn default_results_dir() -> PathBuf {
    // Use XDG data directory or fallback
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobscout") {
        proj_dirs.data_dir().join("cache")
    } else {
        PathBuf::from("data/cache")
    }
}
