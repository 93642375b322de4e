use tracing::debug;

use crate::embed_chunks::Embedder;
use crate::embed_query::embed_query;
use crate::error::Result;
use crate::index::EmbeddingIndex;

/// Returns the text of the `k` chunks closest to `question`, most relevant first.
pub fn retrieve_top(
    embedder: &dyn Embedder,
    index: &EmbeddingIndex,
    question: &str,
    k: usize,
) -> Result<Vec<String>> {
    let query_vec = embed_query(embedder, question)?;
    let hits = index.query(&query_vec, k)?;
    debug!(?hits, "retrieved neighbors");
    Ok(hits
        .iter()
        .filter_map(|hit| index.chunk(hit.position))
        .map(str::to_string)
        .collect())
}
