use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::config::Config;
use crate::error::{RagError, Result};
use crate::http::{HttpClient, HttpError};

/// Text embedding backend. Must return one vector per input, in input order.
pub trait Embedder: Send + Sync {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Serialize)]
struct EmbedLegacyRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

/// Embeddings served by an Ollama-compatible `/api/embed` endpoint.
pub struct OllamaEmbedder {
    http: HttpClient,
    base_url: String,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(http: HttpClient, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    pub fn from_config(cfg: &Config, http: HttpClient) -> Self {
        Self::new(http, cfg.ollama_url.clone(), cfg.embed_model.clone())
    }

    // Older servers only expose `/api/embeddings`, which takes one prompt per call.
    fn embed_legacy(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            let req = EmbedLegacyRequest {
                model: &self.model,
                prompt: text,
            };
            let res = self
                .http
                .post_json::<Value, _>(&url, &req)
                .map_err(|e| RagError::Model(e.to_string()))?;
            out.extend(parse_embeddings(res)?);
        }
        Ok(out)
    }
}

// Only a server without `/api/embed` gets the legacy loop; any other failure
// is the real cause and is reported as is.
fn missing_endpoint(err: &HttpError) -> bool {
    matches!(
        err,
        HttpError::Status { status, .. }
            if *status == reqwest::StatusCode::NOT_FOUND
                || *status == reqwest::StatusCode::METHOD_NOT_ALLOWED
    )
}

impl Embedder for OllamaEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let url = format!("{}/api/embed", self.base_url);
        let req = EmbedRequest {
            model: &self.model,
            input: texts,
        };
        match self.http.post_json::<Value, _>(&url, &req) {
            Ok(res) => parse_embeddings(res),
            Err(err) if missing_endpoint(&err) => {
                warn!(error = %err, "falling back to legacy embeddings endpoint");
                self.embed_legacy(texts)
            }
            Err(err) => Err(RagError::Model(err.to_string())),
        }
    }
}

/// Embeds `texts` in consecutive batches, keeping the output aligned with the input.
pub fn embed_texts(
    embedder: &dyn Embedder,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut out = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        let vectors = embedder.embed(batch)?;
        if vectors.len() != batch.len() {
            return Err(RagError::Model(format!(
                "embedder returned {} vectors for {} inputs",
                vectors.len(),
                batch.len()
            )));
        }
        out.extend(vectors);
    }
    Ok(out)
}

fn parse_embeddings(value: Value) -> Result<Vec<Vec<f32>>> {
    if let Some(embeddings) = value.get("embeddings") {
        return parse_embeddings_value(embeddings);
    }
    if let Some(embedding) = value.get("embedding") {
        return parse_embeddings_value(embedding);
    }
    Err(RagError::Model("no embeddings in response".to_string()))
}

fn parse_embeddings_value(value: &Value) -> Result<Vec<Vec<f32>>> {
    let arr = value
        .as_array()
        .ok_or_else(|| RagError::Model("invalid embeddings format".to_string()))?;
    if arr.is_empty() {
        return Ok(vec![]);
    }
    if arr[0].is_array() {
        return arr.iter().map(parse_vec).collect();
    }
    Ok(vec![parse_vec(value)?])
}

fn parse_vec(value: &Value) -> Result<Vec<f32>> {
    let arr = value
        .as_array()
        .ok_or_else(|| RagError::Model("embedding is not an array".to_string()))?;
    arr.iter()
        .map(|v| {
            v.as_f64()
                .map(|n| n as f32)
                .ok_or_else(|| RagError::Model("embedding value is not a number".to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn only_missing_endpoint_falls_back_to_legacy() {
        let status = |status| HttpError::Status {
            method: "POST",
            url: "http://localhost:11434/api/embed".to_string(),
            status,
            body: String::new(),
        };
        assert!(missing_endpoint(&status(reqwest::StatusCode::NOT_FOUND)));
        assert!(missing_endpoint(&status(reqwest::StatusCode::METHOD_NOT_ALLOWED)));
        assert!(!missing_endpoint(&status(reqwest::StatusCode::UNAUTHORIZED)));
        assert!(!missing_endpoint(&status(reqwest::StatusCode::INTERNAL_SERVER_ERROR)));
        assert!(!missing_endpoint(&HttpError::Timeout {
            method: "POST",
            url: "http://localhost:11434/api/embed".to_string(),
        }));
    }

    #[test]
    fn parses_batch_and_single_shapes() {
        let batch = parse_embeddings(json!({"embeddings": [[1.0, 2.0], [3.0, 4.0]]})).unwrap();
        assert_eq!(batch, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);

        let single = parse_embeddings(json!({"embedding": [0.5, -0.5]})).unwrap();
        assert_eq!(single, vec![vec![0.5, -0.5]]);
    }

    #[test]
    fn rejects_malformed_payloads() {
        assert!(matches!(
            parse_embeddings(json!({"data": []})),
            Err(RagError::Model(_))
        ));
        assert!(matches!(
            parse_embeddings(json!({"embeddings": [["x"]]})),
            Err(RagError::Model(_))
        ));
    }

    struct CountingEmbedder {
        batches: Mutex<Vec<usize>>,
    }

    impl Embedder for CountingEmbedder {
        fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.batches.lock().unwrap().push(texts.len());
            Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
        }
    }

    #[test]
    fn batches_preserve_order() {
        let embedder = CountingEmbedder {
            batches: Mutex::new(Vec::new()),
        };
        let texts: Vec<String> = ["a", "bb", "ccc", "dddd", "eeeee"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let vectors = embed_texts(&embedder, &texts, 2).unwrap();
        assert_eq!(
            vectors,
            vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0], vec![5.0]]
        );
        assert_eq!(*embedder.batches.lock().unwrap(), vec![2, 2, 1]);
    }

    struct ShortEmbedder;

    impl Embedder for ShortEmbedder {
        fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![0.0]])
        }
    }

    #[test]
    fn count_mismatch_is_a_model_error() {
        let texts = vec!["a".to_string(), "b".to_string()];
        assert!(matches!(
            embed_texts(&ShortEmbedder, &texts, 8),
            Err(RagError::Model(_))
        ));
    }
}
