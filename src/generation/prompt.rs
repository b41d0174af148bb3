//! Deterministic prompt construction for answer generation.

/// Build the chat prompt from retrieved context and the user question.
///
/// Chunks are concatenated in ranked order, separated by blank lines. The
/// template is fixed; given the same retrieval result and question the
/// prompt is byte-identical. An empty retrieval produces an empty context
/// section and the model is instructed to admit when it does not know.
pub(crate) fn compose_prompt(contexts: &[String], question: &str) -> String {
    let context = contexts.join("\n\n");
    format!(
        "You are a helpful AI assistant. Use the following context to answer the question.\n\
         If you don't know the answer, say so. Be concise and accurate.\n\
         \n\
         Context:\n\
         {context}\n\
         \n\
         Question: {question}\n\
         \n\
         Answer:"
    )
}
