use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{RagError, Result};

const DEFAULT_PERSONA_NAME: &str = "the site owner";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Device {
    Auto,
    Cpu,
    Gpu,
}

impl FromStr for Device {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Device::Auto),
            "cpu" => Ok(Device::Cpu),
            "gpu" | "cuda" => Ok(Device::Gpu),
            other => Err(RagError::Configuration(format!(
                "unknown device '{}', expected auto, cpu or cuda",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub source_dir: PathBuf,
    pub include_exts: Vec<String>,
    pub max_file_bytes: u64,
    pub ollama_url: String,
    pub embed_model: String,
    pub chat_model: String,
    pub auth_token: Option<String>,
    pub device: Device,
    pub max_new_tokens: usize,
    pub top_k: usize,
    pub embed_batch_size: usize,
    pub request_timeout: Duration,
    pub system_prompt: String,
    pub intents_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("personal_data"),
            include_exts: vec![".txt".to_string()],
            max_file_bytes: 500_000,
            ollama_url: "http://localhost:11434".to_string(),
            embed_model: "all-minilm".to_string(),
            chat_model: "llama3.2:3b-instruct-q4_K_M".to_string(),
            auth_token: None,
            device: Device::Auto,
            max_new_tokens: 300,
            top_k: 5,
            embed_batch_size: 32,
            request_timeout: Duration::from_secs(120),
            system_prompt: persona_directive(DEFAULT_PERSONA_NAME),
            intents_file: None,
        }
    }
}

impl Config {
    /// Reads settings from the process environment, loading `.env` first when present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        let persona_name =
            env::var("RAG_PERSONA_NAME").unwrap_or_else(|_| DEFAULT_PERSONA_NAME.to_string());
        let device = match env::var("RAG_DEVICE") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.device,
        };

        let cfg = Self {
            source_dir: env::var("RAG_SOURCE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.source_dir),
            include_exts: env::var("RAG_INCLUDE_EXTS")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.include_exts),
            max_file_bytes: parse_var("RAG_MAX_FILE_BYTES")?.unwrap_or(defaults.max_file_bytes),
            ollama_url: env::var("OLLAMA_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.ollama_url),
            embed_model: env::var("OLLAMA_EMBED_MODEL").unwrap_or(defaults.embed_model),
            chat_model: env::var("OLLAMA_CHAT_MODEL").unwrap_or(defaults.chat_model),
            auth_token: env::var("RAG_AUTH_TOKEN")
                .or_else(|_| env::var("HF_TOKEN"))
                .ok()
                .filter(|v| !v.trim().is_empty()),
            device,
            max_new_tokens: parse_var("RAG_MAX_NEW_TOKENS")?.unwrap_or(defaults.max_new_tokens),
            top_k: parse_var("RAG_TOP_K")?.unwrap_or(defaults.top_k),
            embed_batch_size: parse_var("RAG_EMBED_BATCH_SIZE")?
                .unwrap_or(defaults.embed_batch_size),
            request_timeout: parse_var("RAG_REQUEST_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            system_prompt: env::var("RAG_SYSTEM_PROMPT")
                .unwrap_or_else(|_| persona_directive(&persona_name)),
            intents_file: env::var("RAG_INTENTS_FILE")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(RagError::Configuration("RAG_TOP_K must be at least 1".to_string()));
        }
        if self.max_new_tokens == 0 {
            return Err(RagError::Configuration(
                "RAG_MAX_NEW_TOKENS must be at least 1".to_string(),
            ));
        }
        if self.embed_batch_size == 0 {
            return Err(RagError::Configuration(
                "RAG_EMBED_BATCH_SIZE must be at least 1".to_string(),
            ));
        }
        if self.include_exts.is_empty() {
            return Err(RagError::Configuration(
                "RAG_INCLUDE_EXTS must name at least one extension".to_string(),
            ));
        }
        Ok(())
    }
}

/// System directive given to the generation model.
pub fn persona_directive(name: &str) -> String {
    format!(
        "You are a friendly and knowledgeable assistant answering questions about {}. \
         Answer naturally with personality, without mentioning the context or how you found \
         the answer. If you don't know the answer, just say 'I don't know.'",
        name
    )
}

fn parse_var<T: FromStr>(key: &str) -> Result<Option<T>> {
    parse_value(key, env::var(key).ok())
}

// Unset or blank means "use the default"; anything else must parse.
fn parse_value<T: FromStr>(key: &str, raw: Option<String>) -> Result<Option<T>> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v.parse().map(Some).map_err(|_| {
            RagError::Configuration(format!("{} must be a number, got '{}'", key, v))
        }),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_devices() {
        assert_eq!("CPU".parse::<Device>().unwrap(), Device::Cpu);
        assert_eq!("cuda".parse::<Device>().unwrap(), Device::Gpu);
        assert_eq!("".parse::<Device>().unwrap(), Device::Auto);
        assert!(matches!(
            "tpu".parse::<Device>(),
            Err(RagError::Configuration(_))
        ));
    }

    #[test]
    fn rejects_zero_top_k() {
        let cfg = Config {
            top_k: 0,
            ..Config::default()
        };
        assert!(matches!(cfg.validate(), Err(RagError::Configuration(_))));
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn numeric_values_must_parse() {
        let top_k: Option<usize> = parse_value("RAG_TOP_K", Some(" 7 ".to_string())).unwrap();
        assert_eq!(top_k, Some(7));
        assert_eq!(parse_value::<usize>("RAG_TOP_K", None).unwrap(), None);
        assert_eq!(parse_value::<usize>("RAG_TOP_K", Some("  ".to_string())).unwrap(), None);

        match parse_value::<usize>("RAG_TOP_K", Some("ten".to_string())) {
            Err(RagError::Configuration(msg)) => {
                assert!(msg.contains("RAG_TOP_K"));
                assert!(msg.contains("ten"));
            }
            other => panic!("expected a configuration error, got {:?}", other),
        }
    }

    #[test]
    fn splits_extension_list() {
        assert_eq!(split_list(" .TXT, .md ,,"), vec![".txt", ".md"]);
    }

    #[test]
    fn persona_mentions_subject_and_fallback() {
        let directive = persona_directive("Ada");
        assert!(directive.contains("about Ada."));
        assert!(directive.contains("I don't know."));
    }
}
