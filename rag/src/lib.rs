mod answer;
mod build_prompt;
mod chunk_text;
mod config;
mod embed_chunks;
mod embed_query;
mod error;
mod generate;
mod http;
mod index;
mod intents;
mod retrieve_chunks;
mod scan_files;

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, info};

pub use answer::{extract_answer_line, AnswerOutcome, AnswerSource, FALLBACK_ANSWER};
pub use build_prompt::{build_prompt, Message};
pub use chunk_text::chunk_text;
pub use config::{persona_directive, Config, Device};
pub use embed_chunks::{embed_texts, Embedder, OllamaEmbedder};
pub use embed_query::embed_query;
pub use error::{RagError, Result};
pub use generate::{Generator, OllamaGenerator};
pub use http::{HttpClient, HttpError};
pub use index::{squared_l2, EmbeddingIndex, Neighbor};
pub use intents::{Intent, IntentTable};
pub use retrieve_chunks::retrieve_top;

use scan_files::scan_files;

/// Reads the corpus folder and returns every paragraph chunk in file order.
pub fn load_corpus(cfg: &Config) -> Result<Vec<String>> {
    let files = scan_files(cfg)?;
    let mut chunks = Vec::new();
    for (path, text) in files {
        let file_chunks = chunk_text(&text);
        debug!(path = %path, chunks = file_chunks.len(), "chunked file");
        chunks.extend(file_chunks);
    }
    if chunks.is_empty() {
        return Err(RagError::Data(format!(
            "no personal data loaded. Check folder: {}",
            cfg.source_dir.display()
        )));
    }
    Ok(chunks)
}

/// Per-request knobs for [`Assistant`].
#[derive(Clone, Debug)]
pub struct AnswerSettings {
    pub top_k: usize,
    pub max_new_tokens: usize,
    pub system_prompt: String,
}

impl AnswerSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            top_k: cfg.top_k,
            max_new_tokens: cfg.max_new_tokens,
            system_prompt: cfg.system_prompt.clone(),
        }
    }
}

/// Everything needed to answer questions, built once at startup.
///
/// The index is read-only after construction, so the assistant can be shared
/// behind an `Arc` by any number of request handlers. Calls into the generator
/// are serialized.
pub struct Assistant {
    settings: AnswerSettings,
    index: EmbeddingIndex,
    embedder: Box<dyn Embedder>,
    generator: Box<dyn Generator>,
    intents: IntentTable,
    generation_gate: Mutex<()>,
}

impl Assistant {
    pub fn new(
        settings: AnswerSettings,
        index: EmbeddingIndex,
        embedder: Box<dyn Embedder>,
        generator: Box<dyn Generator>,
        intents: IntentTable,
    ) -> Self {
        Self {
            settings,
            index,
            embedder,
            generator,
            intents,
            generation_gate: Mutex::new(()),
        }
    }

    /// Loads the corpus, builds the index and connects to the model backend.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        cfg.validate()?;
        let http = HttpClient::from_config(cfg)
            .map_err(|e| RagError::Model(format!("cannot create HTTP client: {}", e)))?;

        let intents = match &cfg.intents_file {
            Some(path) => IntentTable::load(path)?,
            None => IntentTable::builtin(),
        };

        let chunks = load_corpus(cfg)?;
        let embedder = OllamaEmbedder::from_config(cfg, http.clone());
        let index = EmbeddingIndex::build(&embedder, chunks, cfg.embed_batch_size)?;

        info!(model = %cfg.chat_model, url = %cfg.ollama_url, "connecting to generation model");
        let generator = OllamaGenerator::from_config(cfg, http);
        generator.ensure_available()?;

        Ok(Self::new(
            AnswerSettings::from_config(cfg),
            index,
            Box::new(embedder),
            Box::new(generator),
            intents,
        ))
    }

    pub fn index(&self) -> &EmbeddingIndex {
        &self.index
    }

    pub fn settings(&self) -> &AnswerSettings {
        &self.settings
    }

    pub fn answer(&self, question: &str) -> Result<String> {
        self.answer_with_context(question).map(|outcome| outcome.answer)
    }

    /// Like [`Assistant::answer`], but gives up with
    /// [`RagError::InferenceTimeout`] once `timeout` has elapsed. A request
    /// still waiting for the generation gate when its time runs out never
    /// reaches the generator.
    pub fn answer_within(&self, question: &str, timeout: Duration) -> Result<String> {
        let deadline = Instant::now().checked_add(timeout).map(|at| (at, timeout));
        self.answer_until(question, deadline)
            .map(|outcome| outcome.answer)
    }

    pub fn answer_with_context(&self, question: &str) -> Result<AnswerOutcome> {
        self.answer_until(question, None)
    }

    fn answer_until(
        &self,
        question: &str,
        deadline: Option<(Instant, Duration)>,
    ) -> Result<AnswerOutcome> {
        let check_deadline = || match deadline {
            Some((at, timeout)) if Instant::now() >= at => {
                Err(RagError::InferenceTimeout(timeout))
            }
            _ => Ok(()),
        };

        if let Some(intent) = self.intents.matches(question) {
            debug!(intent = %intent.name, "intent shortcut");
            return Ok(AnswerOutcome {
                answer: intent.response.clone(),
                context: Vec::new(),
                source: AnswerSource::Intent,
            });
        }

        let context = retrieve_top(
            self.embedder.as_ref(),
            &self.index,
            question,
            self.settings.top_k,
        )?;
        let messages = build_prompt(question, &context, &self.settings.system_prompt);
        check_deadline()?;

        let raw = {
            let _guard = self
                .generation_gate
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Err(err) = check_deadline() {
                debug!("deadline passed while waiting for the generator");
                return Err(err);
            }
            self.generator
                .generate(&messages, self.settings.max_new_tokens)?
        };
        debug!(raw = %raw, "generated text");

        Ok(match extract_answer_line(&raw) {
            Some(answer) => AnswerOutcome {
                answer,
                context,
                source: AnswerSource::Generated,
            },
            None => AnswerOutcome {
                answer: FALLBACK_ANSWER.to_string(),
                context,
                source: AnswerSource::Fallback,
            },
        })
    }
}
